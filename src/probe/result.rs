// SPDX-License-Identifier: MIT

//! Outcome of a single probe, and the checks that produce it.

use std::{fmt, time::Duration};

use thiserror::Error;

use super::spec::ProbeSpec;

/// Longest body excerpt kept for diagnostics, in characters.
const EXCERPT_CHARS: usize = 200;

/// Why the request itself never produced a full response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// Refused, reset, or unreachable: the server isn't there.
    Connect,
    /// The client gave up waiting.
    Timeout,
    Other,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NetworkErrorKind::Connect => "connect",
            NetworkErrorKind::Timeout => "timeout",
            NetworkErrorKind::Other => "other",
        })
    }
}

/// A single reason a probe failed.
///
/// `Network` means the server could not be reached.  The others mean it
/// answered, but wrongly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeFailure {
    #[error("network error ({kind}): {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    #[error("status: expected {expected}, observed {observed}")]
    Status { expected: u16, observed: u16 },

    #[error("body: expected to contain {expected:?}, not found")]
    Body { expected: String },

    #[error(
        "timing: expected at least {} ms, observed {} ms",
        .min.as_millis(),
        .observed.as_millis()
    )]
    Timing { min: Duration, observed: Duration },
}

/// What happened when one `ProbeSpec` ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub spec: ProbeSpec,
    pub status: Option<u16>,
    pub body_excerpt: String,
    pub elapsed: Duration,
    /// Empty when the probe passed.
    pub failures: Vec<ProbeFailure>,
}

impl ProbeResult {
    /// Build the result for a response that arrived in full.
    pub fn from_response(spec: &ProbeSpec, status: u16, body: &str, elapsed: Duration) -> Self {
        ProbeResult {
            spec: spec.clone(),
            status: Some(status),
            body_excerpt: excerpt(body),
            elapsed,
            failures: evaluate(spec, status, body, elapsed),
        }
    }

    /// Build the result for a request that never completed.
    pub fn from_network(
        spec: &ProbeSpec,
        kind: NetworkErrorKind,
        message: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        ProbeResult {
            spec: spec.clone(),
            status: None,
            body_excerpt: String::new(),
            elapsed,
            failures: vec![ProbeFailure::Network {
                kind,
                message: message.into(),
            }],
        }
    }

    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// The network failure, if the request never got a response.
    pub fn network_failure(&self) -> Option<NetworkErrorKind> {
        self.failures.iter().find_map(|f| match f {
            ProbeFailure::Network { kind, .. } => Some(*kind),
            _ => None,
        })
    }
}

/// Run every check that applies.  A failed status check does not hide a
/// bad body or a fast response.
pub fn evaluate(spec: &ProbeSpec, status: u16, body: &str, elapsed: Duration) -> Vec<ProbeFailure> {
    let mut failures = Vec::new();
    if status != spec.expect_status {
        failures.push(ProbeFailure::Status {
            expected: spec.expect_status,
            observed: status,
        });
    }
    for needle in &spec.expect_body {
        if !body.contains(needle.as_str()) {
            failures.push(ProbeFailure::Body {
                expected: needle.clone(),
            });
        }
    }
    if let Some(min) = spec.min_elapsed {
        if elapsed < min {
            failures.push(ProbeFailure::Timing {
                min,
                observed: elapsed,
            });
        }
    }
    failures
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
