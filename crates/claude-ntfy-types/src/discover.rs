//! Locating the real `claude` binary.
//!
//! The wrapper is commonly installed *as* `claude` earlier on `$PATH` than
//! the real CLI, so the search must skip any candidate that resolves back to
//! our own executable.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::WrapError;

const INNER_BINARY: &str = "claude";

/// Resolve the inner program to spawn.
///
/// An explicit path (from config or `NTFY_CLAUDE_PATH`) is taken as-is and
/// not validated; a wrong path surfaces at exec time. Otherwise `$PATH` is
/// searched for an executable named `claude` that is not this wrapper.
pub fn find_claude(explicit: Option<&Path>) -> Result<PathBuf, WrapError> {
    if let Some(path) = explicit {
        debug!(path = %path.display(), "using configured claude path");
        return Ok(path.to_path_buf());
    }

    let our_exe = std::env::current_exe()
        .and_then(|p| p.canonicalize())
        .map_err(|e| WrapError::Discovery(format!("cannot resolve own executable: {e}")))?;

    let path_env = std::env::var_os("PATH")
        .ok_or_else(|| WrapError::Discovery("PATH is not set".into()))?;

    for dir in std::env::split_paths(&path_env) {
        let candidate = dir.join(INNER_BINARY);
        let Ok(meta) = candidate.metadata() else {
            continue;
        };
        if !meta.is_file() || meta.permissions().mode() & 0o111 == 0 {
            continue;
        }
        // Resolve symlinks so an aliased install of this wrapper is skipped.
        let Ok(resolved) = candidate.canonicalize() else {
            continue;
        };
        if resolved == our_exe {
            continue;
        }
        debug!(path = %candidate.display(), "found claude in PATH");
        return Ok(candidate);
    }

    Err(WrapError::Discovery(
        "claude not found in PATH (excluding this wrapper). Fix by setting \
         claude_path in ~/.config/claude-ntfy/config.yaml, setting \
         NTFY_CLAUDE_PATH, or putting the real claude on your PATH"
            .into(),
    ))
}
