// SPDX-License-Identifier: MIT

//! Issues the probe requests.

use std::time::{Duration, Instant};

use reqwest::{Url, blocking::Client};
use tracing::{debug, info, warn};

use super::{
    result::{NetworkErrorKind, ProbeResult},
    spec::ProbeSpec,
};
use crate::error::HarnessError;

/// Runs probes against one base address, one at a time.
#[derive(Debug, Clone)]
pub struct ProbeRunner {
    client: Client,
    base: Url,
}

impl ProbeRunner {
    /// `timeout` bounds each whole request.  It must be longer than the
    /// slowest response the suite expects, or a slow-but-correct server is
    /// reported as a network failure.
    pub fn new(base: Url, timeout: Duration) -> Result<Self, HarnessError> {
        // Probes go straight to the subject; proxy variables are ignored.
        let client = Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .map_err(|e| HarnessError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(ProbeRunner { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// GET `spec.path`, then check the response.  Never fails outright:
    /// every problem ends up in the returned result.
    pub fn run_probe(&self, spec: &ProbeSpec) -> ProbeResult {
        let url = match self.base.join(&spec.path) {
            Ok(url) => url,
            Err(e) => {
                return ProbeResult::from_network(
                    spec,
                    NetworkErrorKind::Other,
                    format!("invalid probe URL: {e}"),
                    Duration::ZERO,
                );
            }
        };
        debug!(%url, "probing");
        let began = Instant::now();
        let fetched = self
            .client
            .get(url.clone())
            .send()
            .and_then(|resp| {
                let status = resp.status().as_u16();
                resp.text().map(|body| (status, body))
            });
        let elapsed = began.elapsed();

        let result = match fetched {
            Ok((status, body)) => ProbeResult::from_response(spec, status, &body, elapsed),
            Err(e) => {
                warn!(%url, error = %e, "request failed");
                ProbeResult::from_network(spec, classify(&e), e.to_string(), elapsed)
            }
        };
        info!(
            probe = %spec,
            status = ?result.status,
            elapsed_ms = elapsed.as_millis() as u64,
            passed = result.passed(),
            "probe finished"
        );
        result
    }

    /// Run `specs` in order.  A failure never stops the ones after it.
    pub fn run_all(&self, specs: &[ProbeSpec]) -> Vec<ProbeResult> {
        specs.iter().map(|spec| self.run_probe(spec)).collect()
    }
}

fn classify(e: &reqwest::Error) -> NetworkErrorKind {
    // A connect timeout is both; the timeout is the more useful answer.
    if e.is_timeout() {
        NetworkErrorKind::Timeout
    } else if e.is_connect() {
        NetworkErrorKind::Connect
    } else {
        NetworkErrorKind::Other
    }
}
