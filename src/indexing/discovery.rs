//! Project discovery and file enumeration.
//!
//! Projects are rooted at directories holding a `package.json`; when the
//! tree has none, the root directory itself is the single project. The
//! boundary table maps absolute paths to their owning project by longest
//! prefix.

use crate::error::{Error, Result};
use crate::resolver::AliasTable;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Manifest file marking a project root.
const PROJECT_MANIFEST: &str = "package.json";

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectInfo {
    pub name: String,
    pub root: PathBuf,
}

/// Ordered directory-prefix to project mapping; longest prefix wins.
#[derive(Debug, Clone, Default)]
pub struct BoundaryTable {
    /// Sorted by path depth, deepest first.
    entries: Vec<(PathBuf, String)>,
}

impl BoundaryTable {
    pub fn from_projects(projects: &[ProjectInfo]) -> Self {
        let mut entries: Vec<(PathBuf, String)> = projects
            .iter()
            .map(|p| (p.root.clone(), p.name.clone()))
            .collect();
        entries.sort_by_key(|(root, _)| std::cmp::Reverse(root.components().count()));
        Self { entries }
    }

    /// Owning project of an absolute path, with its root. None when the path
    /// lies outside every project root.
    pub fn project_for(&self, path: &Path) -> Option<(&str, &Path)> {
        self.entries
            .iter()
            .find(|(root, _)| path.starts_with(root))
            .map(|(root, name)| (name.as_str(), root.as_path()))
    }
}

/// Discover projects under `root` by manifest lookup. A root without any
/// manifest is itself one project named after its directory.
pub fn discover_projects(root: &Path, ignore: &[glob::Pattern]) -> Result<Vec<ProjectInfo>> {
    let mut projects = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_ignored(e.path(), ignore))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping unreadable path during discovery: {err}");
                continue;
            }
        };
        if entry.file_type().is_file() && entry.file_name() == PROJECT_MANIFEST {
            let project_root = entry
                .path()
                .parent()
                .unwrap_or(root)
                .to_path_buf();
            let name = manifest_project_name(entry.path())
                .or_else(|| dir_name(&project_root))
                .unwrap_or_else(|| "root".to_string());
            debug!("Discovered project '{}' at {}", name, project_root.display());
            projects.push(ProjectInfo {
                name,
                root: project_root,
            });
        }
    }

    if projects.is_empty() {
        projects.push(ProjectInfo {
            name: dir_name(root).unwrap_or_else(|| "root".to_string()),
            root: root.to_path_buf(),
        });
    }

    // Parent projects first so nested roots shadow them in the table.
    projects.sort_by_key(|p| p.root.components().count());
    Ok(projects)
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_string())
}

/// Project name from the manifest's `name` field, tolerating comments.
fn manifest_project_name(manifest: &Path) -> Option<String> {
    let content = std::fs::read_to_string(manifest).ok()?;
    let value: serde_json::Value = serde_json5::from_str(&content).ok()?;
    value
        .get("name")
        .and_then(|n| n.as_str())
        .map(|n| n.to_string())
}

/// Enumerate source files under `root` matching the include extensions and
/// clearing the ignore patterns.
pub fn walk_source_files(
    root: &Path,
    extensions: &[String],
    ignore: &[glob::Pattern],
) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_ignored(e.path(), ignore))
    {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if has_source_extension(path, extensions) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    files
}

/// Extension check honoring multi-dot source suffixes (`.d.ts` counts as
/// `.ts`).
pub fn has_source_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e == ext))
}

pub fn is_ignored(path: &Path, patterns: &[glob::Pattern]) -> bool {
    let path_str = path.to_string_lossy();
    patterns.iter().any(|p| p.matches(&path_str))
}

/// Load the project's tsconfig path aliases when present.
pub fn load_alias_table(project_root: &Path) -> Option<AliasTable> {
    let manifest = project_root.join("tsconfig.json");
    let content = std::fs::read_to_string(&manifest).ok()?;
    let value: serde_json::Value = serde_json5::from_str(&content).ok()?;
    let options = value.get("compilerOptions")?;

    let base_url = options
        .get("baseUrl")
        .and_then(|b| b.as_str())
        .unwrap_or(".");
    let mut table = AliasTable::new(crate::resolver::normalize(&project_root.join(base_url)));

    if let Some(paths) = options.get("paths").and_then(|p| p.as_object()) {
        for (pattern, targets) in paths {
            let targets: Vec<String> = targets
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(|t| t.as_str().map(|t| t.to_string()))
                        .collect()
                })
                .unwrap_or_default();
            if !targets.is_empty() {
                table.add(pattern.clone(), targets);
            }
        }
    }

    if table.is_empty() {
        None
    } else {
        Some(table)
    }
}

/// Relative Unix-style form of `path` against `base`.
pub fn relative_unix_path(path: &Path, base: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Some(parts.join("/"))
}

/// Read file content, surfacing failures as typed per-file errors.
pub fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        file: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn root_without_manifest_is_one_project() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.ts"), "export const A = 1;").unwrap();
        let projects = discover_projects(dir.path(), &[]).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].root, dir.path());
    }

    #[test]
    fn nested_manifests_become_projects_with_boundaries() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"name": "app"}"#).unwrap();
        let lib = dir.path().join("packages/lib");
        std::fs::create_dir_all(&lib).unwrap();
        std::fs::write(lib.join("package.json"), r#"{"name": "lib"}"#).unwrap();

        let projects = discover_projects(dir.path(), &[]).unwrap();
        assert_eq!(projects.len(), 2);

        let boundaries = BoundaryTable::from_projects(&projects);
        let (owner, _) = boundaries.project_for(&lib.join("src/x.ts")).unwrap();
        assert_eq!(owner, "lib");
        let (owner, _) = boundaries.project_for(&dir.path().join("src/x.ts")).unwrap();
        assert_eq!(owner, "app");
        assert!(boundaries.project_for(Path::new("/elsewhere/x.ts")).is_none());
    }

    #[test]
    fn walk_honors_extensions_and_ignores() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.ts"), "").unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        let skipped = dir.path().join("node_modules/pkg");
        std::fs::create_dir_all(&skipped).unwrap();
        std::fs::write(skipped.join("c.ts"), "").unwrap();

        let ignore = vec![glob::Pattern::new("**/node_modules/**").unwrap()];
        let files = walk_source_files(dir.path(), &["ts".to_string()], &ignore);
        assert_eq!(files, vec![dir.path().join("a.ts")]);
    }

    #[test]
    fn relative_paths_are_unix_style() {
        let rel = relative_unix_path(Path::new("/proj/src/deep/a.ts"), Path::new("/proj")).unwrap();
        assert_eq!(rel, "src/deep/a.ts");
    }

    #[test]
    fn alias_table_reads_tsconfig_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("tsconfig.json"),
            r#"{
                // comments are legal in tsconfig
                "compilerOptions": {
                    "baseUrl": ".",
                    "paths": { "@app/*": ["src/app/*"] }
                }
            }"#,
        )
        .unwrap();
        let table = load_alias_table(dir.path()).unwrap();
        assert_eq!(table.entries.len(), 1);
        assert_eq!(table.entries[0].pattern, "@app/*");
    }
}
