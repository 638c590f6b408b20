//! Index coordinator.
//!
//! Orchestrates full and incremental indexing over the discovered projects
//! in two passes inside one transaction: Pass 1 enumerates and upserts file
//! rows (parking parsed trees), then the known-files set is rebuilt, then
//! Pass 2 writes symbols and relations. The two-pass shape is load-bearing
//! even for tiny batches: a batch may contain mutually-referencing new
//! files, and relations can only land after both file rows exist.

pub mod discovery;
mod parse_cache;
mod relations;
mod symbols;

pub use discovery::{BoundaryTable, ProjectInfo};
pub use symbols::build_symbol_rows;

use crate::database::{FileRecord, IndexStore};
use crate::error::Result;
use crate::extractors::typescript::{self, TypeScriptExtractor};
use crate::graph::file_key;
use crate::resolver::AliasTable;
use chrono::Utc;
use parking_lot::Mutex;
use parse_cache::ParseCache;
use relations::RelationContext;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};

/// A coalesced filesystem change handed to [`IndexCoordinator::incremental`].
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// A recoverable per-file failure carried inside a batch outcome.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub file: String,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Parse,
    Io,
}

/// Result of one index run. Failures never poison the batch; the files they
/// name are simply absent from the symbol/relation updates.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// File keys (re)indexed in this run.
    pub changed: Vec<String>,
    /// File keys whose rows were removed.
    pub deleted: Vec<String>,
    pub failures: Vec<FileFailure>,
    pub files_seen: usize,
    pub symbols_written: usize,
    pub relations_written: usize,
    pub index_version: i64,
}

/// Discovered project layout, rebuilt on every full index.
#[derive(Debug, Clone, Default)]
struct ProjectLayout {
    projects: Vec<ProjectInfo>,
    boundaries: BoundaryTable,
    aliases: HashMap<String, AliasTable>,
}

/// A file upserted in Pass 1 and awaiting Pass 2.
struct PendingFile {
    project: String,
    rel: String,
    abs: PathBuf,
    hash: String,
    content: String,
}

pub struct IndexCoordinator {
    root: PathBuf,
    extensions: Vec<String>,
    ignore: Vec<glob::Pattern>,
    store: Arc<Mutex<IndexStore>>,
    parse_cache: Mutex<ParseCache>,
    layout: Mutex<Option<ProjectLayout>>,
}

impl IndexCoordinator {
    pub fn new(
        root: impl Into<PathBuf>,
        extensions: Vec<String>,
        ignore_patterns: &[String],
        parser_cache_capacity: usize,
        store: Arc<Mutex<IndexStore>>,
    ) -> Self {
        let root: PathBuf = root.into();
        let root = std::fs::canonicalize(&root).unwrap_or(root);
        let ignore = ignore_patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(err) => {
                    warn!("Ignoring invalid ignore pattern '{p}': {err}");
                    None
                }
            })
            .collect();

        Self {
            root,
            extensions,
            ignore,
            store,
            parse_cache: Mutex::new(ParseCache::new(parser_cache_capacity)),
            layout: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Index the whole tree: discover projects, enumerate files, drop rows
    /// for vanished files, then write symbols and relations for everything
    /// new or changed. One transaction end to end.
    pub fn full_index(&self) -> Result<BatchOutcome> {
        let layout = self.refresh_layout()?;
        let mut outcome = BatchOutcome::default();
        let store = self.store.lock();

        store.immediate_transaction(|s| {
            let mut pending: Vec<PendingFile> = Vec::new();

            for project in &layout.projects {
                let existing = s.file_map(&project.name)?;
                let mut seen: HashSet<String> = HashSet::new();

                for abs in
                    discovery::walk_source_files(&project.root, &self.extensions, &self.ignore)
                {
                    // Files under a nested project root belong to that project's walk.
                    let Some((owner, _)) = layout.boundaries.project_for(&abs) else {
                        continue;
                    };
                    if owner != project.name {
                        continue;
                    }
                    let Some(rel) = discovery::relative_unix_path(&abs, &project.root) else {
                        continue;
                    };
                    outcome.files_seen += 1;
                    seen.insert(rel.clone());

                    let content = match discovery::read_source(&abs) {
                        Ok(content) => content,
                        Err(err) => {
                            outcome.failures.push(FileFailure {
                                file: file_key(&project.name, &rel),
                                kind: FailureKind::Io,
                                message: err.to_string(),
                            });
                            continue;
                        }
                    };
                    let hash = blake3::hash(content.as_bytes()).to_hex().to_string();
                    let needs_reindex = existing
                        .get(&rel)
                        .is_none_or(|prior| prior.content_hash != hash);

                    s.upsert_file(&file_record(&project.name, &rel, &abs, &content, &hash))?;
                    if needs_reindex {
                        pending.push(PendingFile {
                            project: project.name.clone(),
                            rel,
                            abs,
                            hash,
                            content,
                        });
                    }
                }

                for rel in existing.keys() {
                    if !seen.contains(rel) {
                        s.delete_file(&project.name, rel)?;
                        outcome.deleted.push(file_key(&project.name, rel));
                    }
                }
            }

            let known = s.known_files()?;
            for file in &pending {
                self.run_pass2(s, &layout, file, &known, &mut outcome)?;
            }

            outcome.index_version = s.bump_index_version()?;
            Ok(())
        })?;

        info!(
            "Full index complete: {} files seen, {} reindexed, {} deleted, {} failures",
            outcome.files_seen,
            outcome.changed.len(),
            outcome.deleted.len(),
            outcome.failures.len()
        );
        Ok(outcome)
    }

    /// Apply a coalesced batch of filesystem changes. Same two-pass shape as
    /// the full index, inside one transaction, so a mid-batch failure leaves
    /// the store unchanged. An empty batch produces no writes.
    pub fn incremental(&self, changes: &[ChangeEvent]) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        if changes.is_empty() {
            outcome.index_version = self.store.lock().index_version()?;
            return Ok(outcome);
        }

        let layout = self.layout_or_refresh()?;
        let store = self.store.lock();

        store.immediate_transaction(|s| {
            let mut pending: Vec<PendingFile> = Vec::new();

            for change in changes {
                let abs = crate::resolver::normalize(&change.path);
                let Some((project, project_root)) = layout.boundaries.project_for(&abs) else {
                    debug!("Change outside project roots ignored: {}", abs.display());
                    continue;
                };
                let Some(rel) = discovery::relative_unix_path(&abs, project_root) else {
                    continue;
                };
                let key = file_key(project, &rel);

                match change.kind {
                    ChangeKind::Deleted => {
                        if s.delete_file(project, &rel)? {
                            outcome.deleted.push(key.clone());
                        }
                        self.parse_cache.lock().remove(&key);
                    }
                    ChangeKind::Created | ChangeKind::Modified => {
                        let content = match discovery::read_source(&abs) {
                            Ok(content) => content,
                            Err(err) => {
                                outcome.failures.push(FileFailure {
                                    file: key,
                                    kind: FailureKind::Io,
                                    message: err.to_string(),
                                });
                                continue;
                            }
                        };
                        let hash = blake3::hash(content.as_bytes()).to_hex().to_string();
                        outcome.files_seen += 1;
                        s.upsert_file(&file_record(project, &rel, &abs, &content, &hash))?;
                        pending.push(PendingFile {
                            project: project.to_string(),
                            rel,
                            abs,
                            hash,
                            content,
                        });
                    }
                }
            }

            // Known files reflect every upsert of this batch, so relations
            // between files that arrived together resolve in Pass 2.
            let known = s.known_files()?;
            for file in &pending {
                let before = s.get_file_symbols(&file.project, &file.rel)?;
                if self.run_pass2(s, &layout, file, &known, &mut outcome)? {
                    let after = s.get_file_symbols(&file.project, &file.rel)?;
                    if let Some((old_name, new_name)) = detect_rename(&before, &after) {
                        debug!(
                            "Symbol rename {} -> {} in {}::{}",
                            old_name, new_name, file.project, file.rel
                        );
                        s.retarget_relations(
                            &file.project,
                            &file.rel,
                            Some(&old_name),
                            &file.rel,
                            Some(&new_name),
                            None,
                        )?;
                    }
                }
            }

            outcome.index_version = s.bump_index_version()?;
            Ok(())
        })?;

        debug!(
            "Incremental batch complete: {} changed, {} deleted, {} failures",
            outcome.changed.len(),
            outcome.deleted.len(),
            outcome.failures.len()
        );
        Ok(outcome)
    }

    /// Pass 2 for one parked file: symbols then relations. Parse failures
    /// are recorded in the outcome and skip the file; true when indexed.
    fn run_pass2(
        &self,
        s: &IndexStore,
        layout: &ProjectLayout,
        file: &PendingFile,
        known: &HashSet<String>,
        outcome: &mut BatchOutcome,
    ) -> Result<bool> {
        let key = file_key(&file.project, &file.rel);
        let tree = {
            let mut cache = self.parse_cache.lock();
            match cache.get(&key, &file.hash) {
                Some(cached) => cached.tree.clone(),
                None => match typescript::parse(&file.content) {
                    Some(tree) => {
                        cache.insert(key.clone(), file.hash.clone(), tree.clone());
                        tree
                    }
                    None => {
                        outcome.failures.push(FileFailure {
                            file: key,
                            kind: FailureKind::Parse,
                            message: "parser produced no tree".to_string(),
                        });
                        return Ok(false);
                    }
                },
            }
        };

        let extractor = TypeScriptExtractor::new(&file.abs, file.content.clone());
        let descriptors = extractor.extract_symbols(&tree);
        outcome.symbols_written +=
            symbols::index_file_symbols(s, &file.project, &file.rel, &file.hash, &descriptors)?;

        let ctx = RelationContext {
            project: &file.project,
            file_path: &file.rel,
            root: &self.root,
            known_files: known,
            boundaries: &layout.boundaries,
            aliases: layout.aliases.get(&file.project),
        };
        outcome.relations_written +=
            relations::index_file_relations(s, &ctx, &file.abs, &file.content, &tree)?;

        outcome.changed.push(key);
        Ok(true)
    }

    fn refresh_layout(&self) -> Result<ProjectLayout> {
        let projects = discovery::discover_projects(&self.root, &self.ignore)?;
        let boundaries = BoundaryTable::from_projects(&projects);
        let mut aliases = HashMap::new();
        for project in &projects {
            if let Some(table) = discovery::load_alias_table(&project.root) {
                aliases.insert(project.name.clone(), table);
            }
        }
        let layout = ProjectLayout {
            projects,
            boundaries,
            aliases,
        };
        *self.layout.lock() = Some(layout.clone());
        Ok(layout)
    }

    fn layout_or_refresh(&self) -> Result<ProjectLayout> {
        if let Some(layout) = self.layout.lock().clone() {
            return Ok(layout);
        }
        self.refresh_layout()
    }
}

fn file_record(project: &str, rel: &str, abs: &Path, content: &str, hash: &str) -> FileRecord {
    let metadata = std::fs::metadata(abs).ok();
    let mtime_ms = metadata
        .as_ref()
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    let size = metadata.map(|m| m.len() as i64).unwrap_or(content.len() as i64);

    FileRecord {
        project: project.to_string(),
        file_path: rel.to_string(),
        mtime_ms,
        size,
        content_hash: hash.to_string(),
        updated_at: Utc::now().to_rfc3339(),
        line_count: Some(content.lines().count() as i64),
    }
}

/// Conservative rename detection: exactly one top-level name vanished and
/// one appeared, with matching kind and signature.
fn detect_rename(
    before: &[crate::database::SymbolRecord],
    after: &[crate::database::SymbolRecord],
) -> Option<(String, String)> {
    let top = |rows: &[crate::database::SymbolRecord]| -> HashMap<String, (String, Option<String>)> {
        rows.iter()
            .filter(|r| !r.name.contains('.'))
            .map(|r| {
                (
                    r.name.clone(),
                    (r.kind.as_str().to_string(), r.signature.clone()),
                )
            })
            .collect()
    };
    let before = top(before);
    let after = top(after);

    let removed: Vec<_> = before.iter().filter(|(n, _)| !after.contains_key(*n)).collect();
    let added: Vec<_> = after.iter().filter(|(n, _)| !before.contains_key(*n)).collect();

    match (removed.as_slice(), added.as_slice()) {
        ([(old_name, old_shape)], [(new_name, new_shape)]) if old_shape == new_shape => {
            Some(((*old_name).clone(), (*new_name).clone()))
        }
        _ => None,
    }
}
