// SPDX-License-Identifier: MIT

//! General model for spawning the subject process and tracking its state.

use std::{collections::HashMap, ffi::OsString, fmt, path::PathBuf, time::Duration};

/// Describes how to launch the subject process.
#[derive(Debug, Clone)]
pub struct LaunchEnv {
    pub cmd: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
    pub env: HashMap<OsString, OsString>,
}

impl LaunchEnv {
    /// Launch `cmd` with `args` from the current directory, inheriting this
    /// process's environment.
    pub fn new<I, S>(cmd: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        LaunchEnv {
            cmd: cmd.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: PathBuf::from("."),
            env: std::env::vars_os().collect(),
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }
}

/// Where a subject is in its life.
///
/// `NotStarted -> Running -> Stopping -> Exited`.  A process that exits on
/// its own goes straight from `Running` to `Exited`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotStarted,
    Running,
    Stopping(StopPhase),
    Exited(SubjectExit),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopPhase {
    /// SIGTERM sent, still inside the grace period.
    GracefulPending,
    /// Grace period exceeded, SIGKILL sent.
    ForceKilled,
}

/// How the subject finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectExit {
    Code(i32),
    Signaled(i32),
    /// Reaped elsewhere; the status is gone.
    Unknown,
}

impl fmt::Display for SubjectExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectExit::Code(c) => write!(f, "exit code {c}"),
            SubjectExit::Signaled(s) => write!(f, "killed by signal {s}"),
            SubjectExit::Unknown => f.write_str("unknown exit status"),
        }
    }
}

/// Which path `stop` took to get the subject to `Exited`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopPath {
    /// The subject was already gone; no signal was sent.
    AlreadyExited,
    /// The subject exited within the grace period after SIGTERM.
    Graceful,
    /// The grace period ran out and the subject was killed.
    ForceKilled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopOutcome {
    /// `None` if the subject never started.
    pub pid: Option<i32>,
    pub path: StopPath,
    pub exit: SubjectExit,
    /// Time spent inside `stop`.
    pub took: Duration,
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let how = match self.path {
            StopPath::AlreadyExited => "had already exited",
            StopPath::Graceful => "stopped gracefully",
            StopPath::ForceKilled => "was force-killed",
        };
        write!(f, "subject {how} ({}) in {} ms", self.exit, self.took.as_millis())
    }
}
