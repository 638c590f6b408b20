//! Per-path debouncing of filesystem events.
//!
//! Editors save in bursts (write, rename, chmod in quick succession); a path
//! only dispatches after staying quiet for the configured window. Events
//! within the window coalesce to a single change, deletion winning over
//! modification.

use crate::indexing::{ChangeEvent, ChangeKind};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Debouncer {
    /// Pending changes: path -> (last event time, coalesced kind).
    pending: HashMap<PathBuf, (Instant, ChangeKind)>,
    window: Duration,
}

impl Debouncer {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            window: Duration::from_millis(debounce_ms),
        }
    }

    /// Record an event, resetting the window for its path.
    pub fn record(&mut self, path: PathBuf, kind: ChangeKind) {
        let now = Instant::now();
        self.pending
            .entry(path)
            .and_modify(|(at, prior)| {
                *at = now;
                *prior = coalesce(*prior, kind);
            })
            .or_insert((now, kind));
    }

    /// Take every path that has been quiet for the full window.
    pub fn take_ready(&mut self) -> Vec<ChangeEvent> {
        let now = Instant::now();
        let mut ready = Vec::new();
        self.pending.retain(|path, (at, kind)| {
            if now.duration_since(*at) >= self.window {
                ready.push(ChangeEvent {
                    path: path.clone(),
                    kind: *kind,
                });
                false
            } else {
                true
            }
        });
        ready.sort_by(|a, b| a.path.cmp(&b.path));
        ready
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Later events refine earlier ones; a delete always sticks, and a create
/// followed by writes is still a create.
fn coalesce(prior: ChangeKind, next: ChangeKind) -> ChangeKind {
    match (prior, next) {
        (_, ChangeKind::Deleted) => ChangeKind::Deleted,
        (ChangeKind::Created, ChangeKind::Modified) => ChangeKind::Created,
        (ChangeKind::Deleted, ChangeKind::Created) => ChangeKind::Modified,
        (prior, _) => prior,
    }
}
