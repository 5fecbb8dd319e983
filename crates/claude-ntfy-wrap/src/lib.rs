//! Transparent PTY transport and the attention-signaling engine.
//!
//! The wrapper splices the user's terminal to the wrapped `claude` process
//! through a pseudo-terminal, watches the child's output stream for signs of
//! life, and fires a single push notification when the session goes quiet.
//!
//! - [`pty`]: PTY pair allocation, child spawn, reaping
//! - [`term`]: raw-mode guard for the controlling terminal
//! - [`monitor`]: classifies child output into activity events
//! - [`backstop`]: the inactivity state machine and its timer
//! - [`signals`]: signal forwarding and window-resize propagation
//! - [`supervisor`]: the run loop tying it all together

pub mod backstop;
pub mod monitor;
pub mod pty;
pub mod signals;
pub mod supervisor;
pub mod term;

pub use backstop::BackstopEngine;
pub use monitor::{ActivityEvent, OutputTap};
pub use pty::PtySession;
pub use signals::SignalForwarder;
pub use supervisor::Supervisor;
pub use term::RawModeGuard;
