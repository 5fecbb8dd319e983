//! Output activity monitoring.
//!
//! The output pump hands every chunk it copies to [`OutputTap::observe`],
//! which classifies it and feeds the inactivity engine. Two rules:
//!
//! - Any output at all counts as activity. Even a pure escape sequence means
//!   the child is doing *something*, so the backstop timer is pushed out.
//! - The ASCII BEL (0x07) means the child already rang the local bell; the
//!   user has been notified locally and a remote push on top would be noise,
//!   so the bell disarms the backstop for the rest of the session.
//!
//! Keyboard input is deliberately not observed: terminal multiplexers and
//! window managers inject escape sequences (focus, paste, mouse) that are
//! indistinguishable from real typing and used to cause false disarms.

use std::sync::Arc;

use crate::backstop::BackstopEngine;

const BEL: u8 = 0x07;

/// What a chunk of child output means to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    /// The child wrote something.
    VisibleOutput,
    /// The child rang the terminal bell.
    TerminalBell,
}

/// Classify one output chunk: at most one `VisibleOutput`, plus one
/// `TerminalBell` per BEL byte.
pub fn classify(chunk: &[u8]) -> Vec<ActivityEvent> {
    let mut events = Vec::new();
    if chunk.is_empty() {
        return events;
    }
    events.push(ActivityEvent::VisibleOutput);
    events.extend(
        chunk
            .iter()
            .filter(|&&byte| byte == BEL)
            .map(|_| ActivityEvent::TerminalBell),
    );
    events
}

/// Borrowed view over the output stream, feeding the engine.
///
/// `observe` is synchronous and cheap (one scan, no I/O, no allocation
/// beyond the tiny event vec) so the output pump never stalls on it, and it
/// never retains the slice.
pub struct OutputTap {
    engine: Arc<BackstopEngine>,
}

impl OutputTap {
    pub fn new(engine: Arc<BackstopEngine>) -> Self {
        Self { engine }
    }

    /// Deliver the chunk's events to the engine, in order, before returning.
    pub fn observe(&self, chunk: &[u8]) {
        for event in classify(chunk) {
            match event {
                ActivityEvent::VisibleOutput => self.engine.output(),
                ActivityEvent::TerminalBell => self.engine.bell(),
            }
        }
    }
}
