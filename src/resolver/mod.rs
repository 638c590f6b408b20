//! Import specifier resolution.
//!
//! Maps a specifier written in a source file to an ordered list of candidate
//! absolute paths. Purely lexical: nothing here touches the filesystem, so
//! callers decide which candidate actually exists (the indexer layers a
//! known-file filter on top).

use std::path::{Component, Path, PathBuf};

/// Alias mappings loaded from a tsconfig/jsconfig `paths` block.
///
/// Entries are ordered; the first matching entry wins. A trailing `*` in the
/// pattern makes it a wildcard, and a `*` in a target is replaced by the
/// matched suffix.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    /// Directory alias targets are joined against (the config's base URL).
    pub base_dir: PathBuf,
    pub entries: Vec<AliasEntry>,
}

#[derive(Debug, Clone)]
pub struct AliasEntry {
    pub pattern: String,
    pub targets: Vec<String>,
}

impl AliasTable {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, pattern: impl Into<String>, targets: Vec<String>) {
        self.entries.push(AliasEntry {
            pattern: pattern.into(),
            targets,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expand `specifier` through the first matching entry, or None.
    fn expand(&self, specifier: &str) -> Option<Vec<PathBuf>> {
        for entry in &self.entries {
            if let Some(prefix) = entry.pattern.strip_suffix('*') {
                let Some(suffix) = specifier.strip_prefix(prefix) else {
                    continue;
                };
                let mut out = Vec::new();
                for target in &entry.targets {
                    let resolved = if target.contains('*') {
                        target.replace('*', suffix)
                    } else {
                        target.clone()
                    };
                    out.extend(candidates_for(normalize(&self.base_dir.join(resolved))));
                }
                return Some(out);
            }
            if entry.pattern == specifier {
                let mut out = Vec::new();
                for target in &entry.targets {
                    out.extend(candidates_for(normalize(&self.base_dir.join(target))));
                }
                return Some(out);
            }
        }
        None
    }
}

/// Resolve an import specifier to an ordered candidate list.
///
/// Relative (`./x`, `../x`) and absolute (`/x`) specifiers resolve against
/// the directory of `current_file`. Non-relative specifiers are tried against
/// the alias table; anything left over is a bare specifier and resolves to an
/// empty list at this layer (see [`bare_candidates`]).
pub fn resolve(current_file: &Path, specifier: &str, aliases: Option<&AliasTable>) -> Vec<PathBuf> {
    if specifier.starts_with('.') || specifier.starts_with('/') {
        let base = if specifier.starts_with('/') {
            PathBuf::from(specifier)
        } else {
            match current_file.parent() {
                Some(dir) => dir.join(specifier),
                None => PathBuf::from(specifier),
            }
        };
        return candidates_for(normalize(&base));
    }

    if let Some(table) = aliases
        && let Some(expanded) = table.expand(specifier)
    {
        return expanded;
    }

    Vec::new()
}

/// Candidate paths a bare specifier could denote inside an installed-package
/// tree under `root`. Subject to the caller's known-file filter, exactly like
/// the relative candidates.
pub fn bare_candidates(root: &Path, specifier: &str) -> Vec<PathBuf> {
    if specifier.is_empty() {
        return Vec::new();
    }
    candidates_for(normalize(&root.join("node_modules").join(specifier)))
}

/// Expand a resolved, extensionless-or-not path into the candidate ladder.
///
/// Extensionless paths try, in order: `.ts`, `.d.ts`, `/index.ts`,
/// `/index.d.ts`, `.mts`, `/index.mts`, `.cts`, `/index.cts`. `.ts` stays
/// strictly ahead of `.d.ts`. Emitted-JS extensions map back to their source
/// siblings before the literal path.
fn candidates_for(path: PathBuf) -> Vec<PathBuf> {
    match path.extension().and_then(|e| e.to_str()) {
        None => vec![
            with_suffix(&path, ".ts"),
            with_suffix(&path, ".d.ts"),
            path.join("index.ts"),
            path.join("index.d.ts"),
            with_suffix(&path, ".mts"),
            path.join("index.mts"),
            with_suffix(&path, ".cts"),
            path.join("index.cts"),
        ],
        Some("js") => vec![path.with_extension("ts"), path],
        Some("mjs") => vec![path.with_extension("mts"), path],
        Some("cjs") => vec![path.with_extension("cts"), path],
        Some(_) => vec![path],
    }
}

/// Append a literal suffix without `set_extension` semantics (the stem may
/// itself contain dots).
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

/// Lexically collapse `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(p: &str) -> PathBuf {
        PathBuf::from(p)
    }

    #[test]
    fn relative_specifier_candidate_order() {
        let got = resolve(&file("/proj/src/main.ts"), "./util", None);
        let expected = [
            "/proj/src/util.ts",
            "/proj/src/util.d.ts",
            "/proj/src/util/index.ts",
            "/proj/src/util/index.d.ts",
            "/proj/src/util.mts",
            "/proj/src/util/index.mts",
            "/proj/src/util.cts",
            "/proj/src/util/index.cts",
        ];
        assert_eq!(got, expected.map(PathBuf::from).to_vec());
    }

    #[test]
    fn parent_directory_specifiers_collapse() {
        let got = resolve(&file("/proj/src/deep/main.ts"), "../store", None);
        assert_eq!(got[0], file("/proj/src/store.ts"));
    }

    #[test]
    fn explicit_extension_is_a_single_candidate() {
        let got = resolve(&file("/proj/main.ts"), "./config.json", None);
        assert_eq!(got, vec![file("/proj/config.json")]);
    }

    #[test]
    fn emitted_js_maps_back_to_source() {
        let got = resolve(&file("/proj/main.ts"), "./util.js", None);
        assert_eq!(got, vec![file("/proj/util.ts"), file("/proj/util.js")]);
    }

    #[test]
    fn bare_specifier_is_empty_without_aliases() {
        assert!(resolve(&file("/proj/main.ts"), "lodash", None).is_empty());
    }

    #[test]
    fn exact_alias_wins() {
        let mut table = AliasTable::new("/proj");
        table.add("@app", vec!["src/app".to_string()]);
        let got = resolve(&file("/proj/main.ts"), "@app", Some(&table));
        assert_eq!(got[0], file("/proj/src/app.ts"));
    }

    #[test]
    fn wildcard_alias_substitutes_suffix() {
        let mut table = AliasTable::new("/proj");
        table.add("@lib/*", vec!["src/lib/*".to_string()]);
        let got = resolve(&file("/proj/main.ts"), "@lib/math/add", Some(&table));
        assert_eq!(got[0], file("/proj/src/lib/math/add.ts"));
        assert_eq!(got[2], file("/proj/src/lib/math/add/index.ts"));
    }

    #[test]
    fn first_matching_alias_entry_wins() {
        let mut table = AliasTable::new("/proj");
        table.add("@x/*", vec!["first/*".to_string()]);
        table.add("@x/*", vec!["second/*".to_string()]);
        let got = resolve(&file("/proj/main.ts"), "@x/y", Some(&table));
        assert_eq!(got[0], file("/proj/first/y.ts"));
    }

    #[test]
    fn bare_candidates_enumerate_node_modules() {
        let got = bare_candidates(&file("/proj"), "pkg/sub");
        assert_eq!(got[0], file("/proj/node_modules/pkg/sub.ts"));
        assert_eq!(got[2], file("/proj/node_modules/pkg/sub/index.ts"));
    }
}
