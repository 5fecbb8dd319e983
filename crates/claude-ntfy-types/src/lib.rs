//! Shared types for the claude-ntfy workspace.
//!
//! This crate holds the pieces every other crate depends on: the [`Config`]
//! record, the [`ConfigLoader`] that assembles it from file + environment +
//! CLI overrides, the `claude` binary discovery logic, and the common
//! [`WrapError`] error type.

mod config;
mod discover;
mod error;
mod loader;

pub use config::{Config, WRAP_MARKER_ENV};
pub use discover::find_claude;
pub use error::WrapError;
pub use loader::{CliOverrides, ConfigLoader};
