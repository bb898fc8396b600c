// SPDX-License-Identifier: MIT

//! Deciding when the subject is ready to be probed.

use std::{
    net::{SocketAddr, TcpStream},
    thread,
    time::{Duration, Instant},
};

use reqwest::Url;
use tracing::{debug, info};

use super::{SubjectProcess, error::ProcessError};

/// Longest pause between connection attempts while polling.
const MAX_BACKOFF: Duration = Duration::from_millis(500);

/// Connection attempts never wait less than this.
const MIN_CONNECT_TIMEOUT: Duration = Duration::from_millis(50);

/// How the harness waits between spawning the subject and the first probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Sleep for a fixed time and assume the subject is up.
    SettleDelay(Duration),

    /// Try to connect to the base address until it accepts, backing off
    /// exponentially from `initial_backoff`.  Gives up after `max_wait`.
    PollConnect {
        max_wait: Duration,
        initial_backoff: Duration,
    },
}

impl Readiness {
    /// Block until the subject is considered ready.  Returns the time spent.
    pub fn await_ready(
        &self,
        subject: &mut SubjectProcess,
        base: &Url,
    ) -> Result<Duration, ProcessError> {
        let began = Instant::now();
        match *self {
            Readiness::SettleDelay(delay) => {
                debug!(delay_ms = delay.as_millis() as u64, "settling");
                thread::sleep(delay);
                Ok(began.elapsed())
            }
            Readiness::PollConnect {
                max_wait,
                initial_backoff,
            } => poll_connect(subject, base, max_wait, initial_backoff, began),
        }
    }
}

fn poll_connect(
    subject: &mut SubjectProcess,
    base: &Url,
    max_wait: Duration,
    initial_backoff: Duration,
    began: Instant,
) -> Result<Duration, ProcessError> {
    let pid = subject.pid().unwrap_or(-1);
    let not_ready = |waited| ProcessError::NotReady {
        pid,
        addr: base.to_string(),
        waited,
    };
    let addrs: Vec<SocketAddr> = base.socket_addrs(|| None).map_err(|_| not_ready(Duration::ZERO))?;
    if addrs.is_empty() {
        return Err(not_ready(Duration::ZERO));
    }

    let deadline = began + max_wait;
    let mut backoff = initial_backoff;
    let mut attempts = 0u32;
    loop {
        if let Some(exit) = subject.try_exit()? {
            return Err(ProcessError::ExitedEarly {
                pid,
                status: exit.to_string(),
            });
        }
        for addr in &addrs {
            attempts += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            let timeout = remaining.max(MIN_CONNECT_TIMEOUT).min(MAX_BACKOFF);
            if TcpStream::connect_timeout(addr, timeout).is_ok() {
                let waited = began.elapsed();
                info!(pid, %addr, attempts, waited_ms = waited.as_millis() as u64, "subject accepting connections");
                return Ok(waited);
            }
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(not_ready(began.elapsed()));
        }
        thread::sleep(backoff.min(deadline - now));
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}
