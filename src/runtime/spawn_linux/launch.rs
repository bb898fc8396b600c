// SPDX-License-Identifier: MIT

//! Launch the subject process and own it until it is reaped.

use std::{
    ffi::{CString, OsStr, c_char},
    os::unix::ffi::OsStrExt as _,
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use nix::{
    errno::Errno,
    sys::{
        signal::{Signal, kill},
        wait::{WaitPidFlag, WaitStatus, waitpid},
    },
    unistd::{ForkResult, Pid},
};
use tracing::{debug, error, info, warn};

use crate::runtime::{
    error::{self, ProcessError},
    spawn::{LaunchEnv, LifecycleState, StopOutcome, StopPath, StopPhase, SubjectExit},
    spawn_linux::fd::{ExecErrorPipe, close_open_fds, keep_list},
};

/// How often `stop` checks whether the subject has gone away.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The externally launched server.
///
/// Owns the child's pid for its entire life.  Dropping a subject that is
/// still running kills it without a grace period, so a forgotten handle
/// cannot outlive the harness.
#[derive(Debug)]
pub struct SubjectProcess {
    env: LaunchEnv,
    pid: Option<Pid>,
    state: LifecycleState,
}

/// Spawn the subject described by `env`.
/// Returns as soon as the executable has been exec'd; readiness is the
/// caller's concern.
pub fn launch_subject(env: LaunchEnv) -> Result<SubjectProcess, ProcessError> {
    let mut subject = SubjectProcess::new(env);
    subject.start()?;
    Ok(subject)
}

impl SubjectProcess {
    pub fn new(env: LaunchEnv) -> Self {
        SubjectProcess {
            env,
            pid: None,
            state: LifecycleState::NotStarted,
        }
    }

    /// The raw pid, once started.
    pub fn pid(&self) -> Option<i32> {
        self.pid.map(Pid::as_raw)
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Fork and exec the subject.
    pub fn start(&mut self) -> Result<(), ProcessError> {
        if self.state != LifecycleState::NotStarted {
            return Err(ProcessError::spawn(
                &self.env.cmd,
                std::io::Error::new(std::io::ErrorKind::AlreadyExists, "subject already started"),
            ));
        }

        // Everything that allocates happens before the fork, down to the
        // argv/envp pointer arrays.  In a multithreaded parent the child may
        // only make async-signal-safe calls until `execve`.
        let cmd = &self.env.cmd;
        let cwd = std::env::current_dir()
            .map_err(|e| ProcessError::spawn(cmd, e))?
            .join(&self.env.cwd);
        let search_path = self.env.env.get(OsStr::new("PATH"));
        let exec_path =
            which::which_in(cmd, search_path, &cwd).map_err(|e| error::from_which(cmd, e))?;

        let c_exec = cstring(cmd, exec_path.as_os_str())?;
        let c_cwd = cstring(cmd, cwd.as_os_str())?;
        let mut c_args = Vec::with_capacity(self.env.args.len() + 1);
        c_args.push(c_exec.clone());
        for arg in &self.env.args {
            c_args.push(cstring(cmd, arg)?);
        }
        let mut c_env = Vec::with_capacity(self.env.env.len());
        for (key, val) in &self.env.env {
            let mut entry = key.clone();
            entry.push("=");
            entry.push(val);
            c_env.push(cstring(cmd, &entry)?);
        }
        let argv = exec_array(&c_args);
        let envp = exec_array(&c_env);
        let exec_error = ExecErrorPipe::new().map_err(|e| ProcessError::spawn(cmd, e))?;
        let keep = keep_list(exec_error.child_fd());

        match unsafe { nix::unistd::fork() } {
            Err(e) => Err(ProcessError::spawn(cmd, e.into())),
            Ok(ForkResult::Child) => {
                // Any errors in here must trigger an immediate exit.
                if let Err(e) = nix::unistd::chdir(c_cwd.as_c_str()) {
                    exec_error.child_report(e);
                    unsafe { nix::libc::_exit(126) };
                }
                close_open_fds(&keep);
                unsafe { nix::libc::execve(c_exec.as_ptr(), argv.as_ptr(), envp.as_ptr()) };
                let e = Errno::last();
                // To reach here means the exec failed.
                exec_error.child_report(e);
                unsafe { nix::libc::_exit(127) };
            }
            Ok(ForkResult::Parent { child }) => {
                self.pid = Some(child);
                self.state = LifecycleState::Running;
                let failure = match exec_error.parent_after_fork() {
                    Ok(None) => None,
                    Ok(Some(e)) => Some(e),
                    Err(e) => {
                        let _ = kill(child, Signal::SIGKILL);
                        Some(e)
                    }
                };
                match failure {
                    None => {
                        info!(
                            pid = child.as_raw(),
                            program = %exec_path.display(),
                            args = ?self.env.args,
                            "subject started"
                        );
                        Ok(())
                    }
                    Some(e) => {
                        // The child is already on its way out; collect it.
                        self.reap_blocking()?;
                        Err(ProcessError::spawn(exec_path, e))
                    }
                }
            }
        }
    }

    /// Non-blocking check for exit.  Reaps the child if it has finished.
    pub fn try_exit(&mut self) -> Result<Option<SubjectExit>, ProcessError> {
        let pid = match (self.state, self.pid) {
            (LifecycleState::Exited(exit), _) => return Ok(Some(exit)),
            (_, None) => return Ok(None),
            (_, Some(pid)) => pid,
        };
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(_, code)) => Ok(Some(self.exited(SubjectExit::Code(code)))),
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                Ok(Some(self.exited(SubjectExit::Signaled(sig as i32))))
            }
            // Still alive, or merely stopped/continued.
            Ok(_) | Err(Errno::EINTR) => Ok(None),
            // Somebody else reaped it.
            Err(Errno::ECHILD) => Ok(Some(self.exited(SubjectExit::Unknown))),
            Err(e) => Err(ProcessError::termination(pid.as_raw(), e)),
        }
    }

    /// Ask the subject to exit, then make it.
    ///
    /// Sends SIGTERM and waits up to `grace` for a voluntary exit.  After
    /// that the subject is sent SIGKILL and reaped with a blocking wait.
    /// Calling this on a subject that has already exited, or was never
    /// started, sends nothing and reports `StopPath::AlreadyExited`.
    pub fn stop(&mut self, grace: Duration) -> Result<StopOutcome, ProcessError> {
        let began = Instant::now();
        let pid_raw = self.pid();
        let outcome = |path, exit| StopOutcome {
            pid: pid_raw,
            path,
            exit,
            took: began.elapsed(),
        };

        let Some(pid) = self.pid else {
            debug!(program = %self.env.cmd.display(), "stop called on a subject that never started");
            let exit = self.exited(SubjectExit::Unknown);
            return Ok(outcome(StopPath::AlreadyExited, exit));
        };
        if let Some(exit) = self.try_exit()? {
            debug!(pid = pid.as_raw(), %exit, "subject already exited");
            return Ok(outcome(StopPath::AlreadyExited, exit));
        }

        self.state = LifecycleState::Stopping(StopPhase::GracefulPending);
        info!(pid = pid.as_raw(), grace_ms = grace.as_millis() as u64, "sending SIGTERM");
        match kill(pid, Signal::SIGTERM) {
            // ESRCH races with a concurrent exit; the wait below collects it.
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!(pid = pid.as_raw(), error = %e, "SIGTERM failed"),
        }

        let deadline = began + grace;
        loop {
            if let Some(exit) = self.try_exit()? {
                info!(pid = pid.as_raw(), %exit, "subject stopped gracefully");
                return Ok(outcome(StopPath::Graceful, exit));
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(EXIT_POLL_INTERVAL.min(deadline - now));
        }

        self.state = LifecycleState::Stopping(StopPhase::ForceKilled);
        warn!(pid = pid.as_raw(), grace_ms = grace.as_millis() as u64, "grace period exceeded, sending SIGKILL");
        if let Err(e) = kill(pid, Signal::SIGKILL) {
            if e != Errno::ESRCH {
                error!(pid = pid.as_raw(), error = %e, "SIGKILL failed; subject may be leaked");
                return Err(ProcessError::termination(pid.as_raw(), e));
            }
        }
        let exit = self.reap_blocking()?;
        Ok(outcome(StopPath::ForceKilled, exit))
    }

    /// Wait, without a timeout, for the child to be reaped.
    fn reap_blocking(&mut self) -> Result<SubjectExit, ProcessError> {
        let pid = match (self.state, self.pid) {
            (LifecycleState::Exited(exit), _) => return Ok(exit),
            (_, None) => return Ok(self.exited(SubjectExit::Unknown)),
            (_, Some(pid)) => pid,
        };
        loop {
            match waitpid(pid, None) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(self.exited(SubjectExit::Code(code))),
                Ok(WaitStatus::Signaled(_, sig, _)) => {
                    return Ok(self.exited(SubjectExit::Signaled(sig as i32)));
                }
                Ok(_) | Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => return Ok(self.exited(SubjectExit::Unknown)),
                Err(e) => {
                    error!(pid = pid.as_raw(), error = %e, "failed reaping subject");
                    return Err(ProcessError::termination(pid.as_raw(), e));
                }
            }
        }
    }

    fn exited(&mut self, exit: SubjectExit) -> SubjectExit {
        self.state = LifecycleState::Exited(exit);
        exit
    }
}

impl Drop for SubjectProcess {
    fn drop(&mut self) {
        if matches!(self.state, LifecycleState::Exited(_) | LifecycleState::NotStarted) {
            return;
        }
        if let Some(pid) = self.pid {
            warn!(pid = pid.as_raw(), "subject dropped while running; killing it");
            let _ = kill(pid, Signal::SIGKILL);
            if let Err(e) = self.reap_blocking() {
                error!(pid = pid.as_raw(), error = %e, "subject may be leaked");
            }
        }
    }
}

/// Null-terminated pointer array for `execve`.  Borrows from `strings`,
/// which must outlive the exec.
fn exec_array(strings: &[CString]) -> Vec<*const c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

fn cstring(cmd: &std::path::Path, s: &OsStr) -> Result<CString, ProcessError> {
    CString::new(s.as_bytes()).map_err(|e| error::from_nul(PathBuf::from(cmd), e))
}
