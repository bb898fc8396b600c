//! SubjectHandler implementation for the tests.

use std::thread;
use std::time::Duration;

use crate::SubjectProcess;
use crate::runtime::{LifecycleState, SubjectHandler, error::ProcessError};

/// What the handler saw while it held the subject.
#[derive(Debug, Clone, Copy)]
pub struct Observed {
    pub pid: i32,
    pub state_at_start: LifecycleState,
    pub state_at_end: LifecycleState,
}

/// Holds the subject for `hold`, noting its state before and after.
pub struct ObservingHandler {
    pub hold: Duration,
}

impl SubjectHandler for ObservingHandler {
    type Output = Result<Observed, ProcessError>;

    fn handle(self, subject: &mut SubjectProcess) -> Self::Output {
        let state_at_start = subject.state();
        let pid = subject.pid().unwrap_or(-1);
        println!("Holding subject {} for {:?}", pid, self.hold);
        thread::sleep(self.hold);
        // Collects the exit if the subject already finished on its own.
        subject.try_exit()?;
        Ok(Observed {
            pid,
            state_at_start,
            state_at_end: subject.state(),
        })
    }
}
