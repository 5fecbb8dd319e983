//! The transparent run loop.
//!
//! Two pump threads splice the controlling terminal to the PTY master while
//! the main thread blocks in child-wait. Bytes are copied verbatim and
//! unbuffered in both directions; the only side effect on the output path is
//! the synchronous [`OutputTap`] observation. The wrapper writes nothing of
//! its own to stdout -- diagnostics go to stderr via tracing.

use std::os::fd::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use nix::errno::Errno;
use nix::unistd;
use tracing::{debug, error, warn};

use claude_ntfy_types::WrapError;

use crate::monitor::OutputTap;
use crate::pty::PtySession;
use crate::term::{self, RawModeGuard};

const IO_BUFFER_SIZE: usize = 8192;

/// Owns the terminal state and the pump threads for one wrapped session.
pub struct Supervisor {
    pty: Arc<PtySession>,
    raw_guard: Mutex<Option<RawModeGuard>>,
    exit_code: AtomicI32,
}

impl Supervisor {
    pub fn new(pty: Arc<PtySession>) -> Self {
        Self {
            pty,
            raw_guard: Mutex::new(None),
            exit_code: AtomicI32::new(0),
        }
    }

    /// Run the session to completion and return the child's exit code.
    ///
    /// Enters raw mode (when stdin is a terminal), installs the initial
    /// window size, starts both pumps, blocks until the child is reaped,
    /// drains trailing output, and restores the terminal. Restoration also
    /// happens from [`stop`](Self::stop) and from the guard's drop, so every
    /// exit path puts the terminal back.
    pub fn run(&self, tap: OutputTap) -> Result<i32, WrapError> {
        if term::is_tty(libc::STDIN_FILENO) {
            match RawModeGuard::enter(libc::STDIN_FILENO) {
                Ok(guard) => {
                    *self.guard_slot() = Some(guard);
                }
                Err(e) => debug!("raw mode unavailable: {e}"),
            }
            self.pty.resize_to_match(libc::STDIN_FILENO);
        }

        // Input pump: controlling terminal -> master. Not joined: it spends
        // its life blocked in read(2) on stdin, and stdin EOF must end only
        // this pump, never the session.
        let pty_in = Arc::clone(&self.pty);
        thread::Builder::new()
            .name("input-pump".into())
            .spawn(move || input_pump(&pty_in))
            .map_err(|e| WrapError::Transport(format!("failed to spawn input pump: {e}")))?;

        let pty_out = Arc::clone(&self.pty);
        let output_handle = thread::Builder::new()
            .name("output-pump".into())
            .spawn(move || output_pump(&pty_out, &tap))
            .map_err(|e| WrapError::Transport(format!("failed to spawn output pump: {e}")))?;

        let exit_code = self.pty.wait();
        self.exit_code.store(exit_code, Ordering::SeqCst);
        debug!(exit_code, "child exited");

        // The pump sees EOF/EIO once the slave side is gone; joining here
        // guarantees the child's final bytes reached the terminal.
        let _ = output_handle.join();

        self.restore_terminal();
        Ok(exit_code)
    }

    /// Best-effort graceful shutdown: terminate the child and put the
    /// terminal back. `run` then unblocks through the normal path.
    pub fn stop(&self) {
        self.pty.terminate();
        self.restore_terminal();
    }

    /// The reaped child's exit code; zero until the child has been reaped.
    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::SeqCst)
    }

    /// Restore the controlling terminal's mode. Idempotent.
    pub fn restore_terminal(&self) {
        if let Some(guard) = self.guard_slot().as_mut() {
            guard.restore();
        }
    }

    fn guard_slot(&self) -> std::sync::MutexGuard<'_, Option<RawModeGuard>> {
        self.raw_guard.lock().expect("terminal guard lock poisoned")
    }
}

/// Controlling terminal -> PTY master.
///
/// EOF on stdin ends the pump and nothing else: a kernel PTY has no
/// half-close, so the master stays open for the output side and the child
/// simply stops receiving input.
fn input_pump(pty: &PtySession) {
    let mut buf = [0u8; IO_BUFFER_SIZE];
    loop {
        match unistd::read(libc::STDIN_FILENO, &mut buf) {
            Ok(0) => {
                debug!("stdin closed, input pump ending");
                return;
            }
            Ok(n) => {
                if let Err(e) = pty.write_all(&buf[..n]) {
                    debug!("master write failed, input pump ending: {e}");
                    return;
                }
            }
            Err(Errno::EINTR) => continue,
            Err(e) => {
                debug!("stdin read error, input pump ending: {e}");
                return;
            }
        }
    }
}

/// PTY master -> controlling terminal, with the activity tap on the side.
fn output_pump(pty: &PtySession, tap: &OutputTap) {
    let mut buf = [0u8; IO_BUFFER_SIZE];
    loop {
        match pty.read(&mut buf) {
            Ok(0) => {
                debug!("master closed, output pump ending");
                return;
            }
            Ok(n) => {
                let chunk = &buf[..n];
                if let Err(e) = write_all_fd(libc::STDOUT_FILENO, chunk) {
                    // The user can no longer see the session; bring it down.
                    error!("terminal write failed: {e}");
                    pty.terminate();
                    return;
                }
                tap.observe(chunk);
            }
            Err(e) => {
                warn!("master read error, output pump ending: {e}");
                return;
            }
        }
    }
}

fn write_all_fd(fd: RawFd, data: &[u8]) -> nix::Result<()> {
    // Safety: fd is one of the process's standard streams, open for the
    // process lifetime.
    let borrowed = unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) };
    let mut written = 0;
    while written < data.len() {
        match unistd::write(borrowed, &data[written..]) {
            Ok(n) => written += n,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
