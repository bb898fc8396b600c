//! # serverprobe
//!
//! Launches a server under test as a child process, probes it over HTTP,
//! and always tears it down again.

pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrate;
pub mod probe;
pub mod runtime;


pub use config::HarnessConfig;
pub use error::HarnessError;
pub use orchestrate::{RunReport, run};
pub use probe::{ProbeResult, ProbeSpec};
pub use runtime::{LaunchEnv, Readiness, SubjectProcess, with_subject};
