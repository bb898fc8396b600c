// SPDX-License-Identifier: MIT

//! HTTP probes and their assertions.
//!
//! A `ProbeSpec` says what to request and what the answer must look like.
//! The `ProbeRunner` sends it and returns a `ProbeResult` that lists every
//! check that failed, keeping "could not reach the server" apart from "the
//! server answered wrongly".

pub mod result;
pub mod runner;
pub mod spec;

pub use result::{NetworkErrorKind, ProbeFailure, ProbeResult};
pub use runner::ProbeRunner;
pub use spec::ProbeSpec;
