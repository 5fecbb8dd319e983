//! Push notification sink for claude-ntfy.
//!
//! This crate owns the notification value type, the [`Notifier`] trait the
//! inactivity engine fires into, and the [`NtfyDispatcher`] that delivers
//! notifications to an ntfy server over HTTP without ever blocking the
//! caller:
//!
//! - [`Notification`]: one value per fire, tagged startup or backstop
//! - [`ntfy`]: the wire payload and publish URL
//! - [`dispatcher`]: background delivery thread with a bounded queue

pub mod dispatcher;
pub mod ntfy;

use chrono::{DateTime, Utc};

pub use dispatcher::NtfyDispatcher;

/// What triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// One-shot message when the wrapped session starts.
    Startup,
    /// The single inactivity message.
    Backstop,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Startup => "startup",
            NotificationKind::Backstop => "backstop",
        }
    }
}

/// A notification ready for delivery. Constructed once per fire and handed
/// to the sink; never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub kind: NotificationKind,
}

impl Notification {
    /// The session-start message, naming the working directory.
    pub fn startup(working_dir: &std::path::Path) -> Self {
        Self {
            title: "Claude Code Session Started".into(),
            body: format!("Working directory: {}", working_dir.display()),
            timestamp: Utc::now(),
            kind: NotificationKind::Startup,
        }
    }

    /// The inactivity message.
    pub fn backstop() -> Self {
        Self {
            title: "Claude Code: Inactive".into(),
            body: "No activity detected - task may be complete".into(),
            timestamp: Utc::now(),
            kind: NotificationKind::Backstop,
        }
    }
}

/// Anything that can deliver a [`Notification`].
///
/// Implementations must not block: the engine calls this from its timer
/// thread right after a state transition, and anything slow (like an HTTP
/// round-trip) belongs on a worker. The production implementation is
/// [`NtfyDispatcher`]; tests substitute recording sinks.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags() {
        assert_eq!(NotificationKind::Startup.as_str(), "startup");
        assert_eq!(NotificationKind::Backstop.as_str(), "backstop");
    }

    #[test]
    fn startup_names_working_dir() {
        let n = Notification::startup(std::path::Path::new("/home/me/project"));
        assert_eq!(n.kind, NotificationKind::Startup);
        assert_eq!(n.title, "Claude Code Session Started");
        assert!(n.body.ends_with("/home/me/project"));
    }

    #[test]
    fn backstop_message() {
        let n = Notification::backstop();
        assert_eq!(n.kind, NotificationKind::Backstop);
        assert_eq!(n.title, "Claude Code: Inactive");
    }
}
