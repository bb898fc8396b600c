// SPDX-License-Identifier: MIT

//! Spawns and signals the subject process.
//! Specific to Linux.  Uses fork/execve and POSIX signals through `nix`.

mod fd;
mod launch;

pub use launch::{SubjectProcess, launch_subject};
