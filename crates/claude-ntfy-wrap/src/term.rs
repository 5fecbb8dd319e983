//! Controlling-terminal raw mode with guaranteed restoration.
//!
//! The termios of the controlling terminal is process-global state: leave it
//! raw on exit and the user's shell is unusable. [`RawModeGuard`] models it
//! as a scoped acquisition -- the saved termios lives in the guard, and
//! restoration runs at most once, from whichever comes first of an explicit
//! [`restore`](RawModeGuard::restore) call or drop (which also covers panic
//! unwinding).

use std::os::fd::{BorrowedFd, RawFd};

use nix::sys::termios::{self, SetArg, Termios};
use tracing::debug;

use claude_ntfy_types::WrapError;

/// Whether the fd refers to a terminal.
pub fn is_tty(fd: RawFd) -> bool {
    unsafe { libc::isatty(fd) == 1 }
}

/// Whether the process has a controlling terminal on stdin.
pub fn stdin_is_tty() -> bool {
    is_tty(libc::STDIN_FILENO)
}

/// Saved termios of the controlling terminal, held while it is in raw mode.
pub struct RawModeGuard {
    fd: RawFd,
    saved: Termios,
    restored: bool,
}

impl RawModeGuard {
    /// Switch `fd` into raw mode (no echo, no canonical input, no keyboard
    /// signal translation) and remember its previous state.
    ///
    /// Fails when `fd` is not a terminal; the caller skips raw mode in that
    /// case and the transport stays line-buffered, which is what a pipe
    /// wants anyway.
    pub fn enter(fd: RawFd) -> Result<Self, WrapError> {
        // Safety: the caller owns fd for the lifetime of the guard; the
        // borrow never outlives the ioctl-style calls below.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let saved = termios::tcgetattr(borrowed)
            .map_err(|e| WrapError::Transport(format!("tcgetattr: {e}")))?;

        let mut raw = saved.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(borrowed, SetArg::TCSANOW, &raw)
            .map_err(|e| WrapError::Transport(format!("tcsetattr: {e}")))?;

        debug!(fd, "terminal switched to raw mode");
        Ok(Self {
            fd,
            saved,
            restored: false,
        })
    }

    /// Put the terminal back. Idempotent; safe to call from any exit path.
    pub fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        let borrowed = unsafe { BorrowedFd::borrow_raw(self.fd) };
        let _ = termios::tcsetattr(borrowed, SetArg::TCSANOW, &self.saved);
        debug!(fd = self.fd, "terminal mode restored");
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_tty_rejects_non_terminals() {
        assert!(!is_tty(-1));
        let devnull = std::fs::File::open("/dev/null").unwrap();
        use std::os::fd::AsRawFd;
        assert!(!is_tty(devnull.as_raw_fd()));
    }

    #[test]
    fn enter_fails_on_non_terminal() {
        let devnull = std::fs::File::open("/dev/null").unwrap();
        use std::os::fd::AsRawFd;
        assert!(RawModeGuard::enter(devnull.as_raw_fd()).is_err());
    }

    #[test]
    fn roundtrip_restores_saved_state() {
        // Only meaningful when the test runner itself has a terminal.
        if !is_tty(libc::STDIN_FILENO) {
            return;
        }
        let before = {
            let fd = unsafe { BorrowedFd::borrow_raw(libc::STDIN_FILENO) };
            termios::tcgetattr(fd).unwrap()
        };

        let mut guard = RawModeGuard::enter(libc::STDIN_FILENO).unwrap();
        guard.restore();
        // Second restore must be a no-op.
        guard.restore();

        let after = {
            let fd = unsafe { BorrowedFd::borrow_raw(libc::STDIN_FILENO) };
            termios::tcgetattr(fd).unwrap()
        };
        assert_eq!(before.input_flags, after.input_flags);
        assert_eq!(before.output_flags, after.output_flags);
        assert_eq!(before.control_flags, after.control_flags);
        assert_eq!(before.local_flags, after.local_flags);
        assert_eq!(before.control_chars, after.control_chars);
    }
}
