// SPDX-License-Identifier: MIT

//! Harness configuration.
//!
//! The defaults reproduce the reference run: `../build/multi-server 4`,
//! probed at `http://127.0.0.1:7878/` after a one second settle delay, with
//! a five second grace period on shutdown.

use std::time::Duration;

use reqwest::Url;

use crate::{
    error::HarnessError,
    probe::ProbeSpec,
    runtime::{LaunchEnv, Readiness},
};

pub const DEFAULT_EXECUTABLE: &str = "../build/multi-server";
pub const DEFAULT_WORKERS: &str = "4";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7878/";
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything one harness run needs.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub launch: LaunchEnv,
    pub base_url: String,
    pub readiness: Readiness,
    pub grace_period: Duration,
    pub client_timeout: Duration,
    /// Run in this order.
    pub probes: Vec<ProbeSpec>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            launch: LaunchEnv::new(DEFAULT_EXECUTABLE, [DEFAULT_WORKERS]),
            base_url: DEFAULT_BASE_URL.to_string(),
            readiness: Readiness::SettleDelay(DEFAULT_SETTLE_DELAY),
            grace_period: DEFAULT_GRACE_PERIOD,
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
            probes: ProbeSpec::standard_suite(),
        }
    }
}

impl HarnessConfig {
    /// Check the configuration and return the parsed base address.
    pub fn validate(&self) -> Result<Url, HarnessError> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| HarnessError::Config(format!("base URL {:?}: {e}", self.base_url)))?;
        if !matches!(base.scheme(), "http" | "https") || base.host().is_none() {
            return Err(HarnessError::Config(format!(
                "base URL {:?} must be an http(s) URL with a host",
                self.base_url
            )));
        }
        if self.probes.is_empty() {
            return Err(HarnessError::Config("no probes to run".to_string()));
        }
        for probe in &self.probes {
            if !probe.path.starts_with('/') {
                return Err(HarnessError::Config(format!(
                    "probe path {:?} must start with '/'",
                    probe.path
                )));
            }
            if let Some(min) = probe.min_elapsed {
                if self.client_timeout <= min {
                    return Err(HarnessError::Config(format!(
                        "client timeout {:?} must exceed the {:?} that {probe} is expected to take",
                        self.client_timeout, min
                    )));
                }
            }
        }
        Ok(base)
    }
}
