// SPDX-License-Identifier: MIT

//! Sequences a whole run: start, wait, probe, stop, report.

pub mod report;

pub use report::{ALL_PASSED, RunReport};

use std::time::Instant;

use tracing::{error, info};

use crate::{
    config::HarnessConfig,
    error::HarnessError,
    probe::{ProbeResult, ProbeRunner},
    runtime::{self, SubjectProcess, error::ProcessError},
};

/// Run the configured probes against a freshly launched subject.
///
/// The subject is stopped exactly once however the probe phase ends.  A bad
/// configuration is rejected before anything is spawned.
pub fn run(config: &HarnessConfig) -> RunReport {
    let began = Instant::now();
    let runner = match config
        .validate()
        .and_then(|base| ProbeRunner::new(base, config.client_timeout))
    {
        Ok(runner) => runner,
        Err(e) => return aborted(e, began),
    };

    info!(
        program = %config.launch.cmd.display(),
        base = %runner.base(),
        probes = config.probes.len(),
        "starting run"
    );
    let probe_phase = |subject: &mut SubjectProcess| -> Result<Vec<ProbeResult>, ProcessError> {
        config.readiness.await_ready(subject, runner.base())?;
        Ok(runner.run_all(&config.probes))
    };
    let outcome = match runtime::with_subject(config.launch.clone(), config.grace_period, probe_phase) {
        Ok(outcome) => outcome,
        Err(e) => return aborted(e.into(), began),
    };

    let (results, mut fatal) = match outcome.output {
        Ok(results) => (results, None),
        Err(e) => (Vec::new(), Some(HarnessError::from(e))),
    };
    let stop = match outcome.stop {
        Ok(stop) => Some(stop),
        Err(e) => {
            error!(error = %e, "subject may still be running");
            // A leaked subject outranks whatever else went wrong.
            fatal = Some(e.into());
            None
        }
    };
    let report = RunReport {
        results,
        stop,
        fatal,
        elapsed: began.elapsed(),
    };
    info!(
        success = report.success(),
        failed = report.failed().count(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "run finished"
    );
    report
}

fn aborted(e: HarnessError, began: Instant) -> RunReport {
    error!(error = %e, "run aborted");
    RunReport {
        results: Vec::new(),
        stop: None,
        fatal: Some(e),
        elapsed: began.elapsed(),
    }
}
