//! Symbol indexer: extractor descriptors to persisted rows.
//!
//! Computes callable signatures and stable fingerprints, flattens container
//! members into dotted rows, and hands the batch to the repository's
//! hash-keyed replacement.

use crate::database::{IndexStore, SymbolRecord};
use crate::error::Result;
use crate::extractors::{MemberDescriptor, Modifiers, ParamInfo, SymbolDescriptor, SymbolKind};
use serde_json::json;

/// Index one file's symbols. Returns the number of rows submitted (the
/// repository elides the write when the content hash is unchanged).
pub fn index_file_symbols(
    store: &IndexStore,
    project: &str,
    file_path: &str,
    content_hash: &str,
    descriptors: &[SymbolDescriptor],
) -> Result<usize> {
    let rows = build_symbol_rows(project, file_path, content_hash, descriptors);
    store.replace_file_symbols(project, file_path, content_hash, &rows)?;
    Ok(rows.len())
}

/// Flatten descriptors (and their members) into symbol rows.
pub fn build_symbol_rows(
    project: &str,
    file_path: &str,
    content_hash: &str,
    descriptors: &[SymbolDescriptor],
) -> Vec<SymbolRecord> {
    let mut rows = Vec::new();

    for descriptor in descriptors {
        let signature = callable_signature(&descriptor.params, descriptor.modifiers);
        let detail = symbol_detail(descriptor);
        rows.push(SymbolRecord {
            id: 0,
            project: project.to_string(),
            file_path: file_path.to_string(),
            name: descriptor.name.clone(),
            kind: descriptor.kind,
            span_start: descriptor.span.start as i64,
            span_end: descriptor.span.end as i64,
            is_exported: descriptor.is_exported(),
            fingerprint: fingerprint(&descriptor.name, descriptor.kind, &signature, &detail),
            signature,
            detail,
            content_hash: content_hash.to_string(),
        });

        for member in &descriptor.members {
            let name = format!("{}.{}", descriptor.name, member.name);
            let signature = callable_signature(&member.params, member.modifiers);
            let detail = member_detail(member);
            rows.push(SymbolRecord {
                id: 0,
                project: project.to_string(),
                file_path: file_path.to_string(),
                name: name.clone(),
                kind: member.kind,
                span_start: member.span.start as i64,
                span_end: member.span.end as i64,
                is_exported: descriptor.is_exported(),
                fingerprint: fingerprint(&name, member.kind, &signature, &detail),
                signature,
                detail,
                content_hash: content_hash.to_string(),
            });
        }
    }

    rows
}

/// `params:<n>|async:<0|1>` for callables, None otherwise.
fn callable_signature(params: &Option<Vec<ParamInfo>>, modifiers: Modifiers) -> Option<String> {
    params.as_ref().map(|params| {
        format!(
            "params:{}|async:{}",
            params.len(),
            modifiers.contains(Modifiers::ASYNC) as u8
        )
    })
}

/// Stable hash over name, kind, signature, and detail. Detects semantic
/// change in a symbol independently of the file hash.
fn fingerprint(
    name: &str,
    kind: SymbolKind,
    signature: &Option<String>,
    detail: &serde_json::Value,
) -> String {
    let payload = format!(
        "{name}|{}|{}|{detail}",
        kind.as_str(),
        signature.as_deref().unwrap_or("")
    );
    blake3::hash(payload.as_bytes()).to_hex().to_string()
}

fn symbol_detail(descriptor: &SymbolDescriptor) -> serde_json::Value {
    let mut detail = json!({
        "modifiers": descriptor.modifiers.names(),
    });
    if let Some(params) = &descriptor.params {
        detail["params"] = json!(params);
    }
    if let Some(return_type) = &descriptor.return_type {
        detail["returnType"] = json!(return_type);
    }
    if !descriptor.members.is_empty() {
        detail["members"] = json!(
            descriptor
                .members
                .iter()
                .map(|m| m.name.as_str())
                .collect::<Vec<_>>()
        );
    }
    if !descriptor.heritage.is_empty() {
        detail["heritage"] = json!(descriptor.heritage);
    }
    if !descriptor.decorators.is_empty() {
        detail["decorators"] = json!(descriptor.decorators);
    }
    if let Some(jsdoc) = &descriptor.jsdoc {
        detail["jsdoc"] = json!(jsdoc);
    }
    detail
}

fn member_detail(member: &MemberDescriptor) -> serde_json::Value {
    let mut detail = json!({
        "visibility": member.modifiers.visibility(),
        "isStatic": member.modifiers.contains(Modifiers::STATIC),
        "isReadonly": member.modifiers.contains(Modifiers::READONLY),
    });
    if let Some(params) = &member.params {
        detail["params"] = json!(params);
    }
    if let Some(return_type) = &member.return_type {
        detail["returnType"] = json!(return_type);
    }
    detail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::typescript::{self, TypeScriptExtractor};

    fn descriptors(code: &str) -> Vec<SymbolDescriptor> {
        let tree = typescript::parse(code).unwrap();
        TypeScriptExtractor::new("/proj/a.ts", code).extract_symbols(&tree)
    }

    #[test]
    fn callables_get_param_and_async_signatures() {
        let rows = build_symbol_rows(
            "app",
            "a.ts",
            "h1",
            &descriptors("export async function f(a: number, b: number) {}"),
        );
        assert_eq!(rows[0].signature.as_deref(), Some("params:2|async:1"));
    }

    #[test]
    fn non_callables_have_no_signature() {
        let rows = build_symbol_rows("app", "a.ts", "h1", &descriptors("export const X = 1;"));
        assert_eq!(rows[0].signature, None);
    }

    #[test]
    fn members_flatten_with_dotted_names() {
        let code = "export class User { constructor() {} private static count: number; }";
        let rows = build_symbol_rows("app", "a.ts", "h1", &descriptors(code));
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["User", "User.constructor", "User.count"]);

        let ctor = rows.iter().find(|r| r.name == "User.constructor").unwrap();
        assert_eq!(ctor.kind, SymbolKind::Constructor);

        let count = rows.iter().find(|r| r.name == "User.count").unwrap();
        assert_eq!(count.detail["visibility"], "private");
        assert_eq!(count.detail["isStatic"], true);
    }

    #[test]
    fn fingerprint_tracks_name_and_signature() {
        let a = build_symbol_rows("app", "a.ts", "h1", &descriptors("function f(a: number) {}"));
        let same = build_symbol_rows("app", "a.ts", "h2", &descriptors("function f(a: number) {}"));
        let renamed = build_symbol_rows("app", "a.ts", "h3", &descriptors("function g(a: number) {}"));
        let rearity =
            build_symbol_rows("app", "a.ts", "h4", &descriptors("function f(a: number, b: number) {}"));

        // content hash does not participate in the fingerprint
        assert_eq!(a[0].fingerprint, same[0].fingerprint);
        assert_ne!(a[0].fingerprint, renamed[0].fingerprint);
        assert_ne!(a[0].fingerprint, rearity[0].fingerprint);
    }
}
