//! Utility helpers for running the tests.

use std::net::TcpListener;
use std::time::Duration;

use crate::{HarnessConfig, LaunchEnv, ProbeSpec, Readiness};

/// Run a shell script as the subject.
pub fn sh(script: &str) -> LaunchEnv {
    LaunchEnv::new("sh", ["-c", script])
}

/// A subject that stays up until told to stop.
pub fn sleeper() -> LaunchEnv {
    LaunchEnv::new("sleep", ["60"])
}

/// A subject that ignores SIGTERM.
/// The trap survives the exec, so there is one process and it is the pid we hold.
pub fn stubborn() -> LaunchEnv {
    sh("trap '' TERM; exec sleep 60")
}

/// True while `pid` names a process we could signal.
pub fn alive(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

/// A local port with nothing listening on it.
pub fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

/// A fast suite shaped like the standard one, for stubs that sleep briefly.
pub fn quick_suite(min: Duration) -> Vec<ProbeSpec> {
    vec![
        ProbeSpec::get("/").body_contains("Hello, world!"),
        ProbeSpec::get("/nonexistent")
            .status(404)
            .body_contains("404 Not Found"),
        ProbeSpec::get("/sleep")
            .body_contains("Hello, world!")
            .min_elapsed(min),
    ]
}

/// Config for a subject whose network side lives at `base_url`.
pub fn config(launch: LaunchEnv, base_url: String) -> HarnessConfig {
    HarnessConfig {
        launch,
        base_url,
        readiness: Readiness::SettleDelay(Duration::from_millis(100)),
        grace_period: Duration::from_secs(2),
        client_timeout: Duration::from_secs(10),
        probes: quick_suite(Duration::from_millis(200)),
    }
}
