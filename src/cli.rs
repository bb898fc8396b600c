// SPDX-License-Identifier: MIT

//! Command line surface for the harness binary.
//!
//! The base address and the probe list are fixed; everything about how the
//! subject is launched, waited on and stopped can be tuned for slower
//! machines.

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::{
    config::{
        DEFAULT_CLIENT_TIMEOUT, DEFAULT_EXECUTABLE, DEFAULT_GRACE_PERIOD, DEFAULT_SETTLE_DELAY,
        DEFAULT_WORKERS, HarnessConfig,
    },
    runtime::{LaunchEnv, Readiness},
};

/// Launch a server, probe it over HTTP, and shut it down.
#[derive(Parser, Debug)]
#[command(name = "serverprobe", version, about, long_about = None)]
pub struct Cli {
    /// Server executable to launch
    #[arg(value_name = "EXECUTABLE", default_value = DEFAULT_EXECUTABLE)]
    pub executable: PathBuf,

    /// Arguments passed through to the server
    #[arg(
        value_name = "ARGS",
        default_value = DEFAULT_WORKERS,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub args: Vec<String>,

    /// Working directory for the server
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Fixed wait after launch before the first probe
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_SETTLE_DELAY.as_millis() as u64)]
    pub settle_ms: u64,

    /// Poll the server's port instead of waiting a fixed time
    #[arg(long)]
    pub poll: bool,

    /// Give up polling after this long
    #[arg(long, value_name = "MS", default_value_t = 10_000, requires = "poll")]
    pub ready_timeout_ms: u64,

    /// Time allowed for a graceful exit before SIGKILL
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_GRACE_PERIOD.as_millis() as u64)]
    pub grace_ms: u64,

    /// Per-request HTTP timeout
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_CLIENT_TIMEOUT.as_secs())]
    pub client_timeout_secs: u64,

    /// Log filter, e.g. `info` or `serverprobe=debug` (overrides RUST_LOG)
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,
}

impl Cli {
    pub fn into_config(self) -> HarnessConfig {
        let mut launch = LaunchEnv::new(self.executable, self.args);
        if let Some(cwd) = self.cwd {
            launch = launch.with_cwd(cwd);
        }
        let readiness = if self.poll {
            Readiness::PollConnect {
                max_wait: Duration::from_millis(self.ready_timeout_ms),
                initial_backoff: Duration::from_millis(50),
            }
        } else {
            Readiness::SettleDelay(Duration::from_millis(self.settle_ms))
        };
        HarnessConfig {
            launch,
            readiness,
            grace_period: Duration::from_millis(self.grace_ms),
            client_timeout: Duration::from_secs(self.client_timeout_secs),
            ..HarnessConfig::default()
        }
    }

    /// Log to stderr so the report on stdout stays clean.
    pub fn init_logging(&self) {
        let filter = match &self.log_level {
            Some(level) => EnvFilter::new(level),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        };
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
