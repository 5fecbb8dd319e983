//! Signal forwarding and window-resize propagation.
//!
//! A dedicated thread blocks on the signal iterator and relays what arrives:
//! SIGWINCH becomes a PTY resize, everything else is passed to the child's
//! process group so the wrapper behaves like the child would have.
//!
//! SIGINT is only watched when the controlling terminal is *not* a tty.
//! With a tty, the kernel already delivers Ctrl-C (and Ctrl-Z) to the child
//! through the PTY, and intercepting them here would break that.

use std::sync::Arc;
use std::thread::JoinHandle;

use nix::sys::signal::Signal;
use signal_hook::consts::signal::{
    SIGHUP, SIGINT, SIGQUIT, SIGTERM, SIGUSR1, SIGUSR2, SIGWINCH,
};
use signal_hook::iterator::Signals;
use tracing::{debug, warn};

use claude_ntfy_types::WrapError;

use crate::pty::PtySession;

/// Handle to the signal-watcher thread. Dropping it uninstalls the watcher
/// and joins the thread.
pub struct SignalForwarder {
    handle: signal_hook::iterator::Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalForwarder {
    /// Install handlers and start the watcher thread.
    pub fn install(pty: Arc<PtySession>, stdin_is_tty: bool) -> Result<Self, WrapError> {
        let mut watched = vec![SIGHUP, SIGTERM, SIGQUIT, SIGUSR1, SIGUSR2, SIGWINCH];
        if !stdin_is_tty {
            watched.push(SIGINT);
        }

        let mut signals = Signals::new(&watched)
            .map_err(|e| WrapError::Transport(format!("failed to install signal handlers: {e}")))?;
        let handle = signals.handle();

        let thread = std::thread::Builder::new()
            .name("signal-watch".into())
            .spawn(move || {
                for signum in signals.forever() {
                    if signum == SIGWINCH {
                        pty.resize_to_match(libc::STDIN_FILENO);
                        debug!("window size propagated to child");
                        continue;
                    }
                    match Signal::try_from(signum) {
                        Ok(sig) => {
                            debug!(signal = ?sig, "forwarding signal to child");
                            pty.forward_signal(sig);
                        }
                        Err(_) => warn!(signum, "unconvertible signal, dropping"),
                    }
                }
            })
            .map_err(|e| WrapError::Transport(format!("failed to spawn signal thread: {e}")))?;

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for SignalForwarder {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn install_and_teardown() {
        let pty = Arc::new(
            PtySession::spawn(Path::new("/bin/sh"), &["-c".into(), "exit 0".into()]).unwrap(),
        );
        let forwarder = SignalForwarder::install(Arc::clone(&pty), true).unwrap();
        // Dropping must close the iterator and join without hanging.
        drop(forwarder);
        pty.wait();
    }

    #[test]
    fn install_without_tty_also_watches_sigint() {
        let pty = Arc::new(
            PtySession::spawn(Path::new("/bin/sh"), &["-c".into(), "exit 0".into()]).unwrap(),
        );
        let forwarder = SignalForwarder::install(Arc::clone(&pty), false).unwrap();
        drop(forwarder);
        pty.wait();
    }
}
