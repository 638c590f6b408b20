//! Relation indexer: raw extractor relations to persisted rows.
//!
//! The extractor sees a filtering resolver: plain resolution first, bare
//! installed-package candidates as a fallback, and only candidates whose
//! `"<project>::<path>"` key exists in the known-files set survive. Every
//! persisted destination therefore references an existing file row, which
//! makes foreign-key violations impossible by construction.

use super::discovery::{relative_unix_path, BoundaryTable};
use crate::database::{IndexStore, RelationRecord};
use crate::error::Result;
use crate::extractors::typescript::TypeScriptExtractor;
use crate::resolver::{self, AliasTable};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tree_sitter::Tree;

/// Everything the relation indexer needs to place destinations.
pub struct RelationContext<'a> {
    pub project: &'a str,
    /// Source file path relative to its project root.
    pub file_path: &'a str,
    /// Root under which bare specifiers search installed packages.
    pub root: &'a Path,
    pub known_files: &'a HashSet<String>,
    pub boundaries: &'a BoundaryTable,
    pub aliases: Option<&'a AliasTable>,
}

/// Index one file's relations and replace its rows atomically. Returns the
/// number of rows written.
pub fn index_file_relations(
    store: &IndexStore,
    ctx: &RelationContext,
    abs_path: &Path,
    content: &str,
    tree: &Tree,
) -> Result<usize> {
    let extractor = TypeScriptExtractor::new(abs_path, content);

    let filtering = |file: &Path, specifier: &str| filter_candidates(ctx, file, specifier);
    let raw = extractor.extract_relations(tree, ctx.aliases, Some(&filtering));

    let mut rows = Vec::with_capacity(raw.len());
    for relation in raw {
        // Destinations outside every project root are discarded.
        let Some((dst_project, dst_root)) = ctx.boundaries.project_for(&relation.dst_file) else {
            continue;
        };
        let Some(dst_file_path) = relative_unix_path(&relation.dst_file, dst_root) else {
            continue;
        };
        rows.push(RelationRecord {
            id: 0,
            project: ctx.project.to_string(),
            kind: relation.kind,
            src_file_path: ctx.file_path.to_string(),
            src_symbol_name: relation.src_symbol,
            dst_project: dst_project.to_string(),
            dst_file_path,
            dst_symbol_name: relation.dst_symbol,
            meta: relation.meta,
        });
    }

    store.replace_file_relations(ctx.project, ctx.file_path, &rows)?;
    Ok(rows.len())
}

/// The filtering resolver. Candidates come from the plain resolver, or from
/// the bare-specifier builder when that yields nothing; the first candidate
/// present in the known-files set wins, everything else resolves to nothing.
fn filter_candidates(ctx: &RelationContext, file: &Path, specifier: &str) -> Vec<PathBuf> {
    let mut candidates = resolver::resolve(file, specifier, ctx.aliases);
    if candidates.is_empty() && !specifier.starts_with('.') && !specifier.starts_with('/') {
        candidates = resolver::bare_candidates(ctx.root, specifier);
    }

    for candidate in candidates {
        let Some((project, project_root)) = ctx.boundaries.project_for(&candidate) else {
            continue;
        };
        let Some(rel) = relative_unix_path(&candidate, project_root) else {
            continue;
        };
        if ctx.known_files.contains(&format!("{project}::{rel}")) {
            return vec![candidate];
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::discovery::ProjectInfo;

    fn context<'a>(
        known: &'a HashSet<String>,
        boundaries: &'a BoundaryTable,
        root: &'a Path,
    ) -> RelationContext<'a> {
        RelationContext {
            project: "app",
            file_path: "main.ts",
            root,
            known_files: known,
            boundaries,
            aliases: None,
        }
    }

    #[test]
    fn first_known_candidate_wins() {
        let root = Path::new("/proj");
        let boundaries = BoundaryTable::from_projects(&[ProjectInfo {
            name: "app".to_string(),
            root: root.to_path_buf(),
        }]);
        // Only the barrel file exists, so `./store` resolves to store/index.ts
        let known: HashSet<String> = ["app::store/index.ts".to_string()].into_iter().collect();
        let ctx = context(&known, &boundaries, root);

        let got = filter_candidates(&ctx, Path::new("/proj/main.ts"), "./store");
        assert_eq!(got, vec![PathBuf::from("/proj/store/index.ts")]);
    }

    #[test]
    fn unknown_candidates_resolve_to_nothing() {
        let root = Path::new("/proj");
        let boundaries = BoundaryTable::from_projects(&[ProjectInfo {
            name: "app".to_string(),
            root: root.to_path_buf(),
        }]);
        let known = HashSet::new();
        let ctx = context(&known, &boundaries, root);

        assert!(filter_candidates(&ctx, Path::new("/proj/main.ts"), "./config.json").is_empty());
    }

    #[test]
    fn bare_specifiers_fall_back_to_installed_packages() {
        let root = Path::new("/proj");
        let boundaries = BoundaryTable::from_projects(&[ProjectInfo {
            name: "app".to_string(),
            root: root.to_path_buf(),
        }]);
        let known: HashSet<String> = ["app::node_modules/pkg/index.ts".to_string()]
            .into_iter()
            .collect();
        let ctx = context(&known, &boundaries, root);

        let got = filter_candidates(&ctx, Path::new("/proj/main.ts"), "pkg");
        assert_eq!(got, vec![PathBuf::from("/proj/node_modules/pkg/index.ts")]);
    }
}
