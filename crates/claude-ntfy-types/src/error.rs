//! Error type shared across all claude-ntfy crates.

/// Errors that can occur across the wrapper.
///
/// Each variant corresponds to a subsystem: configuration loading and
/// validation, inner-binary discovery, the PTY transport, or notification
/// delivery.
#[derive(Debug, thiserror::Error)]
pub enum WrapError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// The real `claude` binary could not be located.
    #[error("could not locate the claude binary: {0}")]
    Discovery(String),

    /// PTY allocation, spawn, or copy-loop failure.
    #[error("pty transport error: {0}")]
    Transport(String),

    /// Notification delivery failure.
    #[error("notification error: {0}")]
    Notify(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            WrapError::Config("missing topic".into()).to_string(),
            "configuration error: missing topic"
        );
        assert_eq!(
            WrapError::Discovery("not in PATH".into()).to_string(),
            "could not locate the claude binary: not in PATH"
        );
        assert_eq!(
            WrapError::Transport("openpty failed".into()).to_string(),
            "pty transport error: openpty failed"
        );
        assert_eq!(
            WrapError::Notify("HTTP 500".into()).to_string(),
            "notification error: HTTP 500"
        );
    }
}
