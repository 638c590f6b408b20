//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options accepted by [`crate::Gildash::open`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GildashOptions {
    /// Root directory to index.
    pub project_root: PathBuf,

    /// File extensions to include (without the leading dot).
    pub extensions: Vec<String>,

    /// Glob patterns excluded from discovery and watching.
    pub ignore_patterns: Vec<String>,

    /// Whether to start a filesystem watcher after opening.
    pub watch_mode: bool,

    /// Whether to attach an external type-checker bridge. Accepted for
    /// compatibility; the bridge is wired outside this engine.
    pub semantic: bool,

    /// LRU capacity for parsed syntax trees.
    pub parser_cache_capacity: usize,

    /// Ownership heartbeat age (seconds) after which an owner is stale.
    pub stale_after_seconds: i64,

    /// Owner heartbeat refresh period in seconds.
    pub heartbeat_interval: u64,

    /// Reader ownership re-probe period in seconds.
    pub reader_poll_interval: u64,

    /// Milliseconds a path must stay quiet before its events dispatch.
    pub debounce_ms: u64,
}

impl Default for GildashOptions {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            extensions: vec!["ts".to_string(), "mts".to_string(), "cts".to_string()],
            ignore_patterns: vec![
                "**/node_modules/**".to_string(),
                "**/dist/**".to_string(),
                "**/build/**".to_string(),
                "**/.git/**".to_string(),
                "**/.gildash/**".to_string(),
            ],
            watch_mode: false,
            semantic: false,
            parser_cache_capacity: 500,
            stale_after_seconds: 60,
            heartbeat_interval: 15,
            reader_poll_interval: 60,
            debounce_ms: 50,
        }
    }
}

impl GildashOptions {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    /// Directory holding the store and its WAL siblings.
    pub fn data_dir(&self) -> PathBuf {
        self.project_root.join(".gildash")
    }

    /// Path of the embedded store.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join("gildash.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_heartbeat_under_half_the_stale_window() {
        let opts = GildashOptions::default();
        assert!(opts.heartbeat_interval < opts.stale_after_seconds as u64 / 2);
        assert!(opts.reader_poll_interval <= opts.stale_after_seconds as u64);
    }

    #[test]
    fn db_path_lives_under_the_data_dir() {
        let opts = GildashOptions::new("/tmp/proj");
        assert_eq!(opts.db_path(), PathBuf::from("/tmp/proj/.gildash/gildash.db"));
    }
}
