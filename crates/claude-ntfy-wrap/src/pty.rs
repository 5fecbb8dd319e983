//! Pseudo-terminal session management.
//!
//! Spawns the wrapped process as the session leader of a fresh PTY so the
//! kernel treats it exactly like a program the user ran directly: keyboard
//! signals, window sizes, and line discipline all flow through the slave
//! side. The parent keeps only the master fd.

use std::ffi::CString;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use nix::errno::Errno;
use nix::pty::{openpty, Winsize};
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};
use tracing::{debug, warn};

use claude_ntfy_types::{WrapError, WRAP_MARKER_ENV};

use crate::term;

/// A child process running in a pseudo-terminal.
///
/// The slave side is handed to the child and closed here immediately after
/// fork; holding it open would rob the parent of EOF when the child exits.
/// The master fd closes when this value drops, after the child is reaped.
#[derive(Debug)]
pub struct PtySession {
    master: OwnedFd,
    child_pid: Pid,
}

impl PtySession {
    /// Spawn `program args...` as the session leader of a new PTY.
    ///
    /// The child inherits the parent environment plus the self-wrap marker.
    /// The initial window size is copied from the controlling terminal when
    /// there is one, else a plain 80x24.
    pub fn spawn(program: &Path, args: &[String]) -> Result<Self, WrapError> {
        // The common exec failure is a bad path; catch it while we can still
        // report it cleanly instead of as a 127 from a dead child.
        let meta = program
            .metadata()
            .map_err(|e| WrapError::Transport(format!("{}: {e}", program.display())))?;
        if !meta.is_file() || meta.permissions().mode() & 0o111 == 0 {
            return Err(WrapError::Transport(format!(
                "{} is not an executable file",
                program.display()
            )));
        }

        // Build the argv and environment images up front: after fork only
        // async-signal-safe calls are allowed until execve.
        let c_program = CString::new(program.as_os_str().as_bytes())
            .map_err(|e| WrapError::Transport(format!("invalid program path: {e}")))?;
        let mut c_args = vec![c_program.clone()];
        for arg in args {
            c_args.push(
                CString::new(arg.as_str())
                    .map_err(|e| WrapError::Transport(format!("invalid argument: {e}")))?,
            );
        }
        let marker = CString::new(format!("{WRAP_MARKER_ENV}=1"))
            .map_err(|e| WrapError::Transport(format!("invalid marker variable: {e}")))?;
        let mut c_env = Vec::new();
        for (key, value) in std::env::vars() {
            if key == WRAP_MARKER_ENV {
                continue;
            }
            if let Ok(entry) = CString::new(format!("{key}={value}")) {
                c_env.push(entry);
            }
        }
        c_env.push(marker);

        let ws = initial_winsize();
        let pty = openpty(Some(&ws), None)
            .map_err(|e| WrapError::Transport(format!("openpty failed: {e}")))?;

        // Safety: fork is unsafe but standard Unix practice for PTY
        // management. The child only makes async-signal-safe calls before
        // exec'ing.
        match unsafe { unistd::fork() } {
            Ok(ForkResult::Child) => {
                drop(pty.master);

                let slave_fd = pty.slave.as_raw_fd();

                // New session, with the slave as its controlling terminal.
                if unistd::setsid().is_err() {
                    unsafe { libc::_exit(127) };
                }
                unsafe {
                    if libc::ioctl(slave_fd, libc::TIOCSCTTY as _, 0) < 0 {
                        libc::_exit(127);
                    }
                }

                for target in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
                    if unistd::dup2(slave_fd, target).is_err() {
                        unsafe { libc::_exit(127) };
                    }
                }
                if slave_fd > libc::STDERR_FILENO {
                    drop(pty.slave);
                }

                let _ = unistd::execve(&c_program, &c_args, &c_env);
                unsafe { libc::_exit(127) };
            }
            Ok(ForkResult::Parent { child }) => {
                drop(pty.slave);
                debug!(pid = child.as_raw(), program = %program.display(), "child spawned");
                Ok(Self {
                    master: pty.master,
                    child_pid: child,
                })
            }
            Err(e) => Err(WrapError::Transport(format!("fork failed: {e}"))),
        }
    }

    /// Blocking read from the master.
    ///
    /// Returns `Ok(0)` on end of stream. `EIO` from a PTY master means the
    /// slave side is gone (the child exited) and is folded into EOF.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, WrapError> {
        loop {
            match unistd::read(self.master.as_raw_fd(), buf) {
                Ok(n) => return Ok(n),
                Err(Errno::EIO) => return Ok(0),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(WrapError::Transport(format!("pty read: {e}"))),
            }
        }
    }

    /// Write all bytes into the master (the child's input).
    pub fn write_all(&self, data: &[u8]) -> Result<(), WrapError> {
        let mut written = 0;
        while written < data.len() {
            match unistd::write(&self.master, &data[written..]) {
                Ok(n) => written += n,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(WrapError::Transport(format!("pty write: {e}"))),
            }
        }
        Ok(())
    }

    /// Copy the window size of `term_fd` onto the PTY.
    ///
    /// Errors are ignored: not every environment has a terminal, and a missed
    /// resize is cosmetic.
    pub fn resize_to_match(&self, term_fd: RawFd) {
        let mut ws = Winsize {
            ws_row: 0,
            ws_col: 0,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        unsafe {
            if libc::ioctl(term_fd, libc::TIOCGWINSZ, &mut ws) == 0 {
                libc::ioctl(self.master.as_raw_fd(), libc::TIOCSWINSZ, &ws);
            }
        }
    }

    /// Wait for the child to exit and return its exit code, with signal
    /// death mapped to `128 + signum`.
    pub fn wait(&self) -> i32 {
        loop {
            match waitpid(self.child_pid, None) {
                Ok(WaitStatus::Exited(_, code)) => return code,
                Ok(WaitStatus::Signaled(_, sig, _)) => return 128 + sig as i32,
                Ok(_) => continue, // stopped/continued, keep waiting
                Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => return 0, // already reaped
                Err(e) => {
                    warn!("waitpid failed: {e}");
                    return 1;
                }
            }
        }
    }

    /// Deliver a signal to the child's process group (it is a session
    /// leader, so group id == pid), falling back to the pid alone.
    pub fn forward_signal(&self, sig: Signal) {
        let group = Pid::from_raw(-self.child_pid.as_raw());
        if signal::kill(group, sig).is_err() {
            let _ = signal::kill(self.child_pid, sig);
        }
    }

    /// Best-effort graceful termination.
    pub fn terminate(&self) {
        self.forward_signal(Signal::SIGTERM);
    }

    /// The child's process ID.
    pub fn pid(&self) -> Pid {
        self.child_pid
    }
}

/// Window size for a fresh PTY: the controlling terminal's if stdin is one,
/// else a conventional default.
fn initial_winsize() -> Winsize {
    let mut ws = Winsize {
        ws_row: 24,
        ws_col: 80,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    if term::is_tty(libc::STDIN_FILENO) {
        unsafe {
            libc::ioctl(libc::STDIN_FILENO, libc::TIOCGWINSZ, &mut ws);
        }
    }
    ws
}
