// SPDX-License-Identifier: MIT

//! File descriptor plumbing shared between the parent and the forked child.

use std::{
    collections::HashSet,
    fs::File,
    io::Read,
    os::fd::{AsRawFd, OwnedFd},
};

use nix::{errno::Errno, fcntl::OFlag, unistd::pipe2};

/// A close-on-exec pipe that carries an `execve` failure back to the parent.
///
/// If the exec succeeds, the kernel closes the child's write end and the
/// parent reads EOF.  If it fails, the child writes its errno before exiting.
pub struct ExecErrorPipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl ExecErrorPipe {
    pub fn new() -> Result<Self, std::io::Error> {
        let (read, write) = pipe2(OFlag::O_CLOEXEC)?;
        Ok(ExecErrorPipe { read, write })
    }

    /// The descriptor the child must keep open until exec.
    pub fn child_fd(&self) -> nix::libc::c_int {
        self.write.as_raw_fd()
    }

    /// Called by the child after a failed exec.
    /// Must not allocate; errors are ignored since the child is about to exit.
    pub fn child_report(&self, errno: Errno) {
        let bytes = (errno as i32).to_ne_bytes();
        let _ = nix::unistd::write(&self.write, &bytes);
    }

    /// Called by the parent after fork.  Blocks until the child has either
    /// exec'd or reported a failure, and returns that failure, if any.
    pub fn parent_after_fork(self) -> Result<Option<std::io::Error>, std::io::Error> {
        // Drop our copy of the write end, or the read below never sees EOF.
        drop(self.write);
        let mut stream = File::from(self.read);
        let mut buf = Vec::with_capacity(4);
        stream.read_to_end(&mut buf)?;
        match buf.len() {
            0 => Ok(None),
            4 => {
                let code = i32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]);
                Ok(Some(std::io::Error::from_raw_os_error(code)))
            }
            n => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("short exec status from child ({n} bytes)"),
            )),
        }
    }
}

/// Close all open file descriptors except those listed.
/// This method may be imperfect if the system has a very high limit on open
/// FDs.  Runs in the forked child, so it goes straight to libc and does not
/// allocate.
pub fn close_open_fds(except: &HashSet<nix::libc::c_int>) {
    let max_fd = match nix::unistd::sysconf(nix::unistd::SysconfVar::OPEN_MAX) {
        Ok(Some(n)) => n as nix::libc::c_int,
        _ => 1024,
    };
    for fd in 0..max_fd {
        if !except.contains(&fd) {
            // Ignore errors, in case the FD is already closed.
            let _ = unsafe { nix::libc::close(fd) };
        }
    }
}

/// Standard streams stay with the subject so its output lands in ours.
pub fn keep_list(extra: nix::libc::c_int) -> HashSet<nix::libc::c_int> {
    let mut keep = HashSet::with_capacity(4);
    keep.insert(nix::libc::STDIN_FILENO);
    keep.insert(nix::libc::STDOUT_FILENO);
    keep.insert(nix::libc::STDERR_FILENO);
    keep.insert(extra);
    keep
}
