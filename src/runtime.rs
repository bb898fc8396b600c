// SPDX-License-Identifier: MIT

//! Manages the lifetime of the subject process.
//!
//! The `with_subject` function is the main entry point.  It takes a
//! `LaunchEnv` structure that describes the command to run, its arguments,
//! environment variables and working directory, and a `SubjectHandler` that
//! works with the running subject.  When the handler returns, or unwinds, the
//! subject is stopped exactly once: SIGTERM, a grace period, then SIGKILL.

pub mod error;
pub mod ready;
pub mod spawn;

pub use ready::Readiness;
pub use spawn::{LaunchEnv, LifecycleState, StopOutcome, StopPath, StopPhase, SubjectExit};

use std::time::Duration;

use tracing::error;

#[cfg(target_os = "linux")]
mod spawn_linux;

#[cfg(target_os = "linux")]
pub use spawn_linux::{SubjectProcess, launch_subject};

/// Works with the subject while it is alive.
pub trait SubjectHandler {
    type Output;

    fn handle(self, subject: &mut SubjectProcess) -> Self::Output;
}

impl<F, T> SubjectHandler for F
where
    F: FnOnce(&mut SubjectProcess) -> T,
{
    type Output = T;

    fn handle(self, subject: &mut SubjectProcess) -> T {
        self(subject)
    }
}

/// What came out of a `with_subject` call once the subject was launched.
#[derive(Debug)]
pub struct SubjectRun<T> {
    pub output: T,
    /// How the subject was stopped.  An error here means it may still be
    /// running.
    pub stop: Result<StopOutcome, error::ProcessError>,
}

/// Launch the subject, run `handler` against it, and stop it.
///
/// The stop happens whatever the handler does.  A spawn failure returns
/// before the handler is called.
pub fn with_subject<H: SubjectHandler>(
    env: LaunchEnv,
    grace: Duration,
    handler: H,
) -> Result<SubjectRun<H::Output>, error::ProcessError> {
    let mut guard = SubjectGuard::new(launch_subject(env)?, grace);
    let output = handler.handle(&mut guard.subject);
    let stop = guard.stop();
    Ok(SubjectRun { output, stop })
}

/// Stops the subject when dropped, so a panicking handler can't leak it.
struct SubjectGuard {
    subject: SubjectProcess,
    grace: Duration,
    armed: bool,
}

impl SubjectGuard {
    fn new(subject: SubjectProcess, grace: Duration) -> Self {
        SubjectGuard {
            subject,
            grace,
            armed: true,
        }
    }

    /// The one explicit stop.  Whatever it returns, the drop won't try again.
    fn stop(mut self) -> Result<StopOutcome, error::ProcessError> {
        self.armed = false;
        self.subject.stop(self.grace)
    }
}

impl Drop for SubjectGuard {
    fn drop(&mut self) {
        if !self.armed || matches!(self.subject.state(), LifecycleState::Exited(_)) {
            return;
        }
        if let Err(e) = self.subject.stop(self.grace) {
            error!(error = %e, "failed to stop subject while unwinding");
        }
    }
}
