//! Whole runs against stub servers and real subject processes.

use std::ffi::OsString;
use std::time::{Duration, Instant};

use tracing_test::traced_test;

use crate::probe::NetworkErrorKind;
use crate::runtime::error::ProcessError;
use crate::runtime::{LifecycleState, StopPath, SubjectExit, launch_subject, with_subject};
use crate::{HarnessConfig, HarnessError, LaunchEnv, ProbeSpec, Readiness, orchestrate};

use super::handler::{Observed, ObservingHandler};
use super::server::{Behavior, StubServer};
use super::state::{Expected, assert_all_refused, assert_report};
use super::util;

/// The reference battery, 5 second sleep included, against a well-behaved
/// server.
#[test]
fn standard_suite_passes() {
    let server = StubServer::new(Behavior::Reference {
        sleep: Duration::from_millis(5100),
    })
    .expect("failed to create the stub server");
    let config = HarnessConfig {
        probes: ProbeSpec::standard_suite(),
        ..util::config(util::sleeper(), server.base_url())
    };

    let report = orchestrate::run(&config);
    assert_report(&report, Expected::passes(3));
    assert!(report.to_string().ends_with(orchestrate::ALL_PASSED));
    assert_eq!(report.exit_code(), 0);
    let sleep = &report.results[2];
    assert!(sleep.elapsed >= Duration::from_secs(5), "{:?}", sleep.elapsed);

    let served = server.shutdown().expect("stub shutdown failed");
    assert_eq!(
        served,
        ["GET / HTTP/1.1", "GET /nonexistent HTTP/1.1", "GET /sleep HTTP/1.1"]
    );
}

/// The subject runs, but nothing ever listens on the probed port.
#[test]
fn unreachable_subject_reports_network_errors() {
    let base = format!("http://127.0.0.1:{}/", util::dead_port());
    let config = HarnessConfig {
        probes: ProbeSpec::standard_suite(),
        ..util::config(util::sleeper(), base)
    };

    let began = Instant::now();
    let report = orchestrate::run(&config);
    assert_report(&report, Expected::unreachable(3));
    assert_all_refused(&report);
    assert_eq!(report.exit_code(), 1);
    assert!(began.elapsed() < Duration::from_secs(10));
}

/// A wrong answer fails that probe only; the rest still run, in order, and
/// two identical runs agree.
#[test]
fn failures_do_not_stop_the_sequence_and_repeat_identically() {
    let mut patterns = Vec::new();
    for _ in 0..2 {
        let server = StubServer::new(Behavior::NeverNotFound).expect("failed to create the stub server");
        let report = orchestrate::run(&util::config(util::sleeper(), server.base_url()));
        assert_report(
            &report,
            Expected {
                success: false,
                passed: vec![true, false, false],
                network_failures: 0,
                stop: Some(StopPath::Graceful),
            },
        );
        let served = server.shutdown().expect("stub shutdown failed");
        assert_eq!(served.len(), 3);
        patterns.push(report.results.iter().map(|r| r.passed()).collect::<Vec<_>>());
    }
    assert_eq!(patterns[0], patterns[1]);
}

/// A proxy in the environment must not stand in for a subject that is down.
#[test]
fn proxy_variables_are_ignored() {
    let proxy = StubServer::new(Behavior::BadGateway).expect("failed to create the stub server");
    let previous = std::env::var_os("http_proxy");
    // SAFETY: no other test reads or writes proxy variables.
    unsafe { std::env::set_var("http_proxy", proxy.base_url()) };
    let config = util::config(
        util::sleeper(),
        format!("http://127.0.0.1:{}/", util::dead_port()),
    );
    let report = orchestrate::run(&config);
    unsafe {
        match previous {
            Some(v) => std::env::set_var("http_proxy", v),
            None => std::env::remove_var("http_proxy"),
        }
    }

    assert_report(&report, Expected::unreachable(3));
    assert_all_refused(&report);
    let served = proxy.shutdown().expect("stub shutdown failed");
    assert!(served.is_empty(), "went through the proxy: {served:?}");
}

/// A subject that accepts but never answers runs into the client timeout.
#[test]
fn silent_subject_times_out() {
    let server = StubServer::new(Behavior::Silent).expect("failed to create the stub server");
    let config = HarnessConfig {
        client_timeout: Duration::from_millis(500),
        ..util::config(util::sleeper(), server.base_url())
    };

    let report = orchestrate::run(&config);
    assert_report(&report, Expected::unreachable(3));
    for r in &report.results {
        assert_eq!(r.network_failure(), Some(NetworkErrorKind::Timeout), "{}", r.spec);
        assert!(r.elapsed >= Duration::from_millis(500), "{:?}", r.elapsed);
    }
    let served = server.shutdown().expect("stub shutdown failed");
    assert_eq!(served.len(), 3);
}

/// A connection closed mid-exchange is a network error, not a wrong answer.
#[test]
fn hang_up_is_a_network_error() {
    let server = StubServer::new(Behavior::HangUp).expect("failed to create the stub server");
    let report = orchestrate::run(&util::config(util::sleeper(), server.base_url()));
    assert_report(&report, Expected::unreachable(3));
    for r in &report.results {
        assert_eq!(r.status, None);
        assert_eq!(r.failures.len(), 1, "{:?}", r.failures);
        assert!(
            matches!(r.network_failure(), Some(kind) if kind != NetworkErrorKind::Timeout),
            "{}: {:?}",
            r.spec,
            r.failures
        );
    }
    server.shutdown().expect("stub shutdown failed");
}

/// Arguments and environment entries arrive intact in the subject.
#[test]
fn arguments_and_environment_reach_the_subject() {
    let dir = tempfile::tempdir().unwrap();
    let mut env = LaunchEnv::new(
        "sh",
        ["-c", "printf '%s|%s' \"$SERVERPROBE_MARK\" \"$0\" > seen; exec sleep 60", "first arg"],
    )
    .with_cwd(dir.path());
    env.env.insert("SERVERPROBE_MARK".into(), "marked".into());
    let mut subject = launch_subject(env).expect("spawn failed");
    std::thread::sleep(Duration::from_millis(300));
    subject.stop(Duration::from_secs(2)).expect("stop failed");

    let seen = std::fs::read_to_string(dir.path().join("seen")).unwrap();
    assert_eq!(seen, "marked|first arg");
}

#[test]
fn missing_executable_is_fatal() {
    let config = util::config(
        LaunchEnv::new("/no/such/dir/multi-server", ["4"]),
        format!("http://127.0.0.1:{}/", util::dead_port()),
    );
    let report = orchestrate::run(&config);
    assert_report(&report, Expected::doesnt_start());
    assert_eq!(report.exit_code(), 2);
    assert!(matches!(
        report.fatal,
        Some(HarnessError::Process(ProcessError::Spawn { .. }))
    ));
}

#[test]
fn missing_working_directory_is_a_spawn_error() {
    let env = util::sleeper().with_cwd("/no/such/working/dir");
    let err = launch_subject(env).unwrap_err();
    match err {
        ProcessError::Spawn { source, .. } => {
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
        }
        other => panic!("unexpected {other}"),
    }
}

/// The subject exits on its own before the harness stops it.
#[test]
fn early_exit_is_not_signaled() {
    let run = with_subject(
        LaunchEnv::new("true", Vec::<OsString>::new()),
        Duration::from_secs(2),
        ObservingHandler {
            hold: Duration::from_millis(300),
        },
    )
    .expect("spawn failed");
    let observed: Observed = run.output.expect("handler failed");
    assert_eq!(observed.state_at_start, LifecycleState::Running);
    assert_eq!(observed.state_at_end, LifecycleState::Exited(SubjectExit::Code(0)));

    let stop = run.stop.expect("stop failed");
    assert_eq!(stop.path, StopPath::AlreadyExited);
    assert_eq!(stop.exit, SubjectExit::Code(0));
    assert!(!util::alive(observed.pid));
}

#[test]
fn early_exit_still_gets_a_full_report() {
    let server = StubServer::new(Behavior::Reference {
        sleep: Duration::from_millis(250),
    })
    .expect("failed to create the stub server");
    let report = orchestrate::run(&util::config(util::sh("exit 0"), server.base_url()));
    assert_report(&report, Expected::passes(3).stopped_by(StopPath::AlreadyExited));
    server.shutdown().expect("stub shutdown failed");
}

/// SIGTERM is ignored; stop must still come back shortly after the grace period.
#[test]
fn stubborn_subject_is_force_killed() {
    let mut subject = launch_subject(util::stubborn()).expect("spawn failed");
    // Let the shell install its trap before we signal it.
    std::thread::sleep(Duration::from_millis(300));
    let pid = subject.pid().expect("started");

    let grace = Duration::from_millis(500);
    let began = Instant::now();
    let stop = subject.stop(grace).expect("stop failed");
    let took = began.elapsed();

    assert_eq!(stop.path, StopPath::ForceKilled);
    assert_eq!(stop.exit, SubjectExit::Signaled(nix::sys::signal::Signal::SIGKILL as i32));
    assert!(took >= grace);
    assert!(took < grace + Duration::from_secs(2), "stop took {:?}", took);
    assert!(!util::alive(pid));
}

#[test]
fn stop_is_idempotent() {
    let mut subject = launch_subject(util::sleeper()).expect("spawn failed");
    let first = subject.stop(Duration::from_secs(2)).expect("first stop failed");
    assert_eq!(first.path, StopPath::Graceful);
    assert_eq!(
        first.exit,
        SubjectExit::Signaled(nix::sys::signal::Signal::SIGTERM as i32)
    );

    let second = subject.stop(Duration::from_secs(2)).expect("second stop failed");
    assert_eq!(second.path, StopPath::AlreadyExited);
    assert_eq!(second.exit, first.exit);
}

#[test]
fn polling_readiness_waits_for_the_port() {
    let server = StubServer::new(Behavior::Reference {
        sleep: Duration::from_millis(250),
    })
    .expect("failed to create the stub server");
    let config = HarnessConfig {
        readiness: Readiness::PollConnect {
            max_wait: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(20),
        },
        ..util::config(util::sleeper(), server.base_url())
    };
    let report = orchestrate::run(&config);
    assert_report(&report, Expected::passes(3));
    // The readiness connection is accepted but carries no request.
    let served = server.shutdown().expect("stub shutdown failed");
    assert_eq!(served.iter().filter(|l| l.starts_with("GET ")).count(), 3);
}

#[test]
fn polling_readiness_gives_up_and_still_stops_the_subject() {
    let config = HarnessConfig {
        readiness: Readiness::PollConnect {
            max_wait: Duration::from_millis(400),
            initial_backoff: Duration::from_millis(20),
        },
        ..util::config(util::sleeper(), format!("http://127.0.0.1:{}/", util::dead_port()))
    };
    let report = orchestrate::run(&config);
    assert!(matches!(
        report.fatal,
        Some(HarnessError::Process(ProcessError::NotReady { .. }))
    ));
    assert!(report.results.is_empty());
    let stop = report.stop.expect("subject was started");
    assert_eq!(stop.path, StopPath::Graceful);
    assert!(!util::alive(stop.pid.expect("pid")));
    assert_eq!(report.exit_code(), 2);
}

#[test]
fn subject_runs_in_its_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let env = util::sh("pwd -P > where; exec sleep 60").with_cwd(dir.path());
    let mut subject = launch_subject(env).expect("spawn failed");
    std::thread::sleep(Duration::from_millis(300));
    subject.stop(Duration::from_secs(2)).expect("stop failed");

    let written = std::fs::read_to_string(dir.path().join("where")).unwrap();
    assert_eq!(
        std::path::Path::new(written.trim()),
        dir.path().canonicalize().unwrap()
    );
}

#[test]
#[traced_test]
fn lifecycle_is_logged() {
    let mut subject = launch_subject(util::sleeper()).expect("spawn failed");
    subject.stop(Duration::from_secs(2)).expect("stop failed");
    assert!(logs_contain("subject started"));
    assert!(logs_contain("sending SIGTERM"));
    assert!(logs_contain("subject stopped gracefully"));
}
