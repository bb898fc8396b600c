//! Top-level error type.

use thiserror::Error;

use crate::runtime::error::ProcessError;

/// Errors that end a harness run early.
///
/// Probe failures are not here; they are collected per probe and never
/// abort the run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("invalid configuration: {0}")]
    Config(String),
}
