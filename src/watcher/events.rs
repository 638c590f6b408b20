//! Filesystem event filtering and conversion.
//!
//! Turns raw notify events into change events for paths the index actually
//! tracks: matching extension, not ignored, inside the watched root.

use crate::indexing::{discovery, ChangeKind};
use notify::{Event, EventKind};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Convert one notify event into per-path changes, dropping paths the index
/// does not track.
pub fn relevant_changes(
    event: &Event,
    extensions: &[String],
    ignore: &[glob::Pattern],
) -> Vec<(PathBuf, ChangeKind)> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Deleted,
        _ => {
            debug!("Ignoring event kind: {:?}", event.kind);
            return Vec::new();
        }
    };

    event
        .paths
        .iter()
        .filter(|path| should_track(path, kind, extensions, ignore))
        .map(|path| (path.clone(), kind))
        .collect()
}

fn should_track(
    path: &Path,
    kind: ChangeKind,
    extensions: &[String],
    ignore: &[glob::Pattern],
) -> bool {
    if !discovery::has_source_extension(path, extensions) {
        return false;
    }
    if discovery::is_ignored(path, ignore) {
        return false;
    }
    // A deleted path no longer exists; only creations and writes can be
    // checked for being a regular file.
    if kind != ChangeKind::Deleted && !path.is_file() {
        return false;
    }
    true
}
