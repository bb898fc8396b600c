// SPDX-License-Identifier: MIT

//! Static descriptions of the HTTP checks.

use std::{fmt, time::Duration};

/// One HTTP GET and what its response must look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSpec {
    /// Absolute path, joined onto the base address.
    pub path: String,
    pub expect_status: u16,
    /// Every one of these must appear in the body.
    pub expect_body: Vec<String>,
    /// The response must take at least this long.
    pub min_elapsed: Option<Duration>,
}

impl ProbeSpec {
    /// A GET of `path` expecting 200 and nothing else.
    pub fn get(path: impl Into<String>) -> Self {
        ProbeSpec {
            path: path.into(),
            expect_status: 200,
            expect_body: Vec::new(),
            min_elapsed: None,
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.expect_status = status;
        self
    }

    pub fn body_contains(mut self, needle: impl Into<String>) -> Self {
        self.expect_body.push(needle.into());
        self
    }

    pub fn min_elapsed(mut self, min: Duration) -> Self {
        self.min_elapsed = Some(min);
        self
    }

    /// The fixed battery run against the reference server, in order.
    /// Later probes assume the earlier ones proved the server is up.
    pub fn standard_suite() -> Vec<ProbeSpec> {
        vec![
            ProbeSpec::get("/").body_contains("Hello, world!"),
            ProbeSpec::get("/nonexistent")
                .status(404)
                .body_contains("404 Not Found"),
            ProbeSpec::get("/sleep")
                .body_contains("Hello, world!")
                .min_elapsed(Duration::from_secs(5)),
        ]
    }
}

impl fmt::Display for ProbeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GET {}", self.path)
    }
}
