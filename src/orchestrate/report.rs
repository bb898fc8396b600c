// SPDX-License-Identifier: MIT

//! The aggregate outcome of a run.

use std::{fmt, time::Duration};

use crate::{error::HarnessError, probe::ProbeResult, runtime::StopOutcome};

/// Printed when every probe passed.
pub const ALL_PASSED: &str = "All Integration Tests Passed!";

#[derive(Debug)]
pub struct RunReport {
    /// In the order the probes ran.
    pub results: Vec<ProbeResult>,
    /// `None` when the subject never started.
    pub stop: Option<StopOutcome>,
    /// Set when the run could not be carried out properly.
    pub fatal: Option<HarnessError>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.fatal.is_none() && self.results.iter().all(ProbeResult::passed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| !r.passed())
    }

    /// 0 when everything passed, 1 when a probe failed, 2 when the run was
    /// aborted.
    pub fn exit_code(&self) -> u8 {
        if self.fatal.is_some() {
            2
        } else if self.success() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in &self.results {
            let verdict = if r.passed() { "PASS" } else { "FAIL" };
            write!(f, "{verdict} {} ({} ms)", r.spec, r.elapsed.as_millis())?;
            if let Some(status) = r.status {
                write!(f, " status {status}")?;
            }
            writeln!(f)?;
            for failure in &r.failures {
                writeln!(f, "    {failure}")?;
            }
        }
        if let Some(stop) = &self.stop {
            writeln!(f, "{stop}")?;
        }
        if let Some(fatal) = &self.fatal {
            return write!(f, "Integration run aborted: {fatal}");
        }
        if self.success() {
            return f.write_str(ALL_PASSED);
        }
        let failed: Vec<String> = self.failed().map(|r| r.spec.to_string()).collect();
        write!(
            f,
            "{} of {} probes failed: {}",
            failed.len(),
            self.results.len(),
            failed.join(", ")
        )
    }
}
