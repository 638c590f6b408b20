//! Relation candidate extraction.
//!
//! Import and re-export declarations resolve their specifier through the
//! injected resolver; calls, heritage, and type references route through the
//! per-file import map built from the same resolver.

use super::helpers::{enclosing_symbol, text, unquote};
use crate::extractors::base::{RawRelation, RelationKind};
use crate::extractors::typescript::{ResolveFn, TypeScriptExtractor};
use crate::resolver::AliasTable;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tree_sitter::{Node, Tree};

/// A local name introduced by an import declaration.
struct ImportBinding {
    file: PathBuf,
    /// Name on the destination side: the exported name, `default`, or `*`.
    imported: String,
    specifier: String,
}

pub(super) fn extract_relations(
    x: &TypeScriptExtractor,
    tree: &Tree,
    aliases: Option<&AliasTable>,
    resolve: Option<ResolveFn>,
) -> Vec<RawRelation> {
    let root = tree.root_node();
    let mut relations = Vec::new();
    let mut bindings: HashMap<String, ImportBinding> = HashMap::new();

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "import_statement" => {
                collect_import(x, child, aliases, resolve, &mut bindings, &mut relations);
            }
            "export_statement" => collect_reexport(x, child, aliases, resolve, &mut relations),
            _ => {}
        }
    }

    collect_code_relations(x, root, &bindings, &mut relations);
    dedupe(relations)
}

fn resolve_first(
    x: &TypeScriptExtractor,
    specifier: &str,
    aliases: Option<&AliasTable>,
    resolve: Option<ResolveFn>,
) -> Option<PathBuf> {
    let candidates = match resolve {
        Some(resolve) => resolve(x.file_path(), specifier),
        None => crate::resolver::resolve(x.file_path(), specifier, aliases),
    };
    candidates.into_iter().next()
}

fn collect_import(
    x: &TypeScriptExtractor,
    node: Node,
    aliases: Option<&AliasTable>,
    resolve: Option<ResolveFn>,
    bindings: &mut HashMap<String, ImportBinding>,
    out: &mut Vec<RawRelation>,
) {
    let Some(source) = node.child_by_field_name("source") else {
        return;
    };
    let specifier = unquote(&text(x, source));
    let Some(dst_file) = resolve_first(x, &specifier, aliases, resolve) else {
        return;
    };

    let mut found_clause = false;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "import_clause" {
            continue;
        }
        found_clause = true;
        let mut clause_cursor = child.walk();
        for part in child.named_children(&mut clause_cursor) {
            match part.kind() {
                "identifier" => {
                    add_import_binding(
                        &specifier, &dst_file, text(x, part), "default", bindings, out,
                    );
                }
                "named_imports" => {
                    let mut specs = part.walk();
                    for spec in part.named_children(&mut specs) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        let Some(name) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        let imported = text(x, name);
                        let local = spec
                            .child_by_field_name("alias")
                            .map(|a| text(x, a))
                            .unwrap_or_else(|| imported.clone());
                        add_import_binding(
                            &specifier, &dst_file, local, &imported, bindings, out,
                        );
                    }
                }
                "namespace_import" => {
                    let mut ns = part.walk();
                    if let Some(local) = part.named_children(&mut ns).find(|n| n.kind() == "identifier")
                    {
                        add_import_binding(
                            &specifier, &dst_file, text(x, local), "*", bindings, out,
                        );
                    }
                }
                _ => {}
            }
        }
    }

    if !found_clause {
        // side-effect import: file-level edge with no destination symbol
        out.push(RawRelation {
            kind: RelationKind::Imports,
            src_symbol: None,
            dst_file,
            dst_symbol: None,
            meta: json!({ "specifier": specifier }),
        });
    }
}

fn add_import_binding(
    specifier: &str,
    dst_file: &PathBuf,
    local: String,
    imported: &str,
    bindings: &mut HashMap<String, ImportBinding>,
    out: &mut Vec<RawRelation>,
) {
    out.push(RawRelation {
        kind: RelationKind::Imports,
        src_symbol: None,
        dst_file: dst_file.clone(),
        dst_symbol: Some(imported.to_string()),
        meta: json!({ "specifier": specifier, "local": local }),
    });
    bindings.insert(
        local,
        ImportBinding {
            file: dst_file.clone(),
            imported: imported.to_string(),
            specifier: specifier.to_string(),
        },
    );
}

fn collect_reexport(
    x: &TypeScriptExtractor,
    node: Node,
    aliases: Option<&AliasTable>,
    resolve: Option<ResolveFn>,
    out: &mut Vec<RawRelation>,
) {
    let Some(source) = node.child_by_field_name("source") else {
        return;
    };
    let specifier = unquote(&text(x, source));
    let Some(dst_file) = resolve_first(x, &specifier, aliases, resolve) else {
        return;
    };

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "export_clause" => {
                let mut specs = child.walk();
                for spec in child.named_children(&mut specs) {
                    if spec.kind() != "export_specifier" {
                        continue;
                    }
                    let Some(name) = spec.child_by_field_name("name") else {
                        continue;
                    };
                    let mut meta = json!({ "specifier": specifier });
                    if let Some(alias) = spec.child_by_field_name("alias") {
                        meta["alias"] = json!(text(x, alias));
                    }
                    out.push(RawRelation {
                        kind: RelationKind::ReExports,
                        src_symbol: None,
                        dst_file: dst_file.clone(),
                        dst_symbol: Some(text(x, name)),
                        meta,
                    });
                }
            }
            // `export * from './x'` and `export * as ns from './x'`
            "*" | "namespace_export" => {
                let mut meta = json!({ "specifier": specifier });
                if child.kind() == "namespace_export" {
                    let mut ns = child.walk();
                    if let Some(alias) =
                        child.named_children(&mut ns).find(|n| n.kind() == "identifier")
                    {
                        meta["alias"] = json!(text(x, alias));
                    }
                }
                out.push(RawRelation {
                    kind: RelationKind::ReExports,
                    src_symbol: None,
                    dst_file: dst_file.clone(),
                    dst_symbol: Some("*".to_string()),
                    meta,
                });
            }
            _ => {}
        }
    }
}

fn collect_code_relations(
    x: &TypeScriptExtractor,
    node: Node,
    bindings: &HashMap<String, ImportBinding>,
    out: &mut Vec<RawRelation>,
) {
    match node.kind() {
        // import internals and re-export clauses are already covered
        "import_statement" => return,
        "export_statement" => {
            if node.child_by_field_name("source").is_some() {
                return;
            }
        }
        "call_expression" => {
            if let Some(callee) = node.child_by_field_name("function") {
                push_call(x, node, callee, bindings, out);
            }
        }
        "new_expression" => {
            if let Some(constructor) = node.child_by_field_name("constructor") {
                push_call(x, node, constructor, bindings, out);
            }
        }
        "extends_clause" | "implements_clause" | "extends_type_clause" => {
            let kind = if node.kind() == "implements_clause" {
                RelationKind::Implements
            } else {
                RelationKind::Extends
            };
            push_heritage(x, node, kind, bindings, out);
            return;
        }
        "nested_type_identifier" => {
            // NS.Type through a namespace import
            if let (Some(module), Some(name)) = (
                node.child_by_field_name("module"),
                node.child_by_field_name("name"),
            ) && let Some(binding) = bindings.get(&text(x, module))
                && binding.imported == "*"
            {
                out.push(RawRelation {
                    kind: RelationKind::TypeReferences,
                    src_symbol: enclosing_symbol(x, node),
                    dst_file: binding.file.clone(),
                    dst_symbol: Some(text(x, name)),
                    meta: json!({ "specifier": binding.specifier }),
                });
            }
            return;
        }
        "type_identifier" => {
            push_type_reference(x, node, bindings, out);
            return;
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_code_relations(x, child, bindings, out);
    }
}

fn push_call(
    x: &TypeScriptExtractor,
    site: Node,
    callee: Node,
    bindings: &HashMap<String, ImportBinding>,
    out: &mut Vec<RawRelation>,
) {
    let resolved = match callee.kind() {
        "identifier" => bindings
            .get(&text(x, callee))
            .map(|b| (b, b.imported.clone())),
        "member_expression" => {
            let object = callee.child_by_field_name("object");
            let property = callee.child_by_field_name("property");
            match (object, property) {
                (Some(object), Some(property)) if object.kind() == "identifier" => bindings
                    .get(&text(x, object))
                    .filter(|b| b.imported == "*")
                    .map(|b| (b, text(x, property))),
                _ => None,
            }
        }
        _ => None,
    };
    if let Some((binding, dst_symbol)) = resolved {
        out.push(RawRelation {
            kind: RelationKind::Calls,
            src_symbol: enclosing_symbol(x, site),
            dst_file: binding.file.clone(),
            dst_symbol: Some(dst_symbol),
            meta: json!({ "specifier": binding.specifier }),
        });
    }
}

fn push_heritage(
    x: &TypeScriptExtractor,
    clause: Node,
    kind: RelationKind,
    bindings: &HashMap<String, ImportBinding>,
    out: &mut Vec<RawRelation>,
) {
    let mut cursor = clause.walk();
    for reference in clause.named_children(&mut cursor) {
        let name = match reference.kind() {
            "identifier" | "type_identifier" => text(x, reference),
            "generic_type" => match reference.child_by_field_name("name") {
                Some(name) => text(x, name),
                None => continue,
            },
            _ => continue,
        };
        if let Some(binding) = bindings.get(&name) {
            out.push(RawRelation {
                kind,
                src_symbol: enclosing_symbol(x, clause),
                dst_file: binding.file.clone(),
                dst_symbol: Some(binding.imported.clone()),
                meta: json!({ "specifier": binding.specifier }),
            });
        }
    }
}

fn push_type_reference(
    x: &TypeScriptExtractor,
    node: Node,
    bindings: &HashMap<String, ImportBinding>,
    out: &mut Vec<RawRelation>,
) {
    // declaration names are type_identifier nodes too; only usages count
    if let Some(parent) = node.parent()
        && parent
            .child_by_field_name("name")
            .is_some_and(|name| name.id() == node.id())
    {
        return;
    }
    if let Some(binding) = bindings.get(&text(x, node)) {
        out.push(RawRelation {
            kind: RelationKind::TypeReferences,
            src_symbol: enclosing_symbol(x, node),
            dst_file: binding.file.clone(),
            dst_symbol: Some(binding.imported.clone()),
            meta: json!({ "specifier": binding.specifier }),
        });
    }
}

/// Order-preserving dedup over (kind, src symbol, destination).
fn dedupe(relations: Vec<RawRelation>) -> Vec<RawRelation> {
    let mut seen = HashSet::new();
    relations
        .into_iter()
        .filter(|r| {
            seen.insert((
                r.kind,
                r.src_symbol.clone(),
                r.dst_file.clone(),
                r.dst_symbol.clone(),
            ))
        })
        .collect()
}
