//! Common error type.
//!

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    /// The subject could not be started at all.
    #[error("cannot spawn {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Readiness polling gave up before the subject accepted a connection.
    #[error("subject (pid {pid}) did not accept connections on {addr} within {waited:?}")]
    NotReady {
        pid: i32,
        addr: String,
        waited: Duration,
    },

    /// The subject exited while the harness was still waiting for it.
    #[error("subject (pid {pid}) exited during startup: {status}")]
    ExitedEarly { pid: i32, status: String },

    /// Forced termination or reaping failed; the subject may have leaked.
    #[error("failed to terminate subject (pid {pid}): {reason}")]
    Termination { pid: i32, reason: String },
}

impl ProcessError {
    pub(crate) fn spawn(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProcessError::Spawn {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn termination(pid: i32, reason: impl std::fmt::Display) -> Self {
        ProcessError::Termination {
            pid,
            reason: reason.to_string(),
        }
    }
}

/// Lookup failures become "not found" spawn errors.
pub(crate) fn from_which(path: impl Into<PathBuf>, e: which::Error) -> ProcessError {
    ProcessError::spawn(
        path,
        std::io::Error::new(std::io::ErrorKind::NotFound, e),
    )
}

/// Interior NULs can't be passed through `execve`.
pub(crate) fn from_nul(path: impl Into<PathBuf>, e: std::ffi::NulError) -> ProcessError {
    ProcessError::spawn(
        path,
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
    )
}
