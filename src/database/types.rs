//! Row types for the three entities plus query shapes.

use crate::extractors::{RelationKind, SymbolKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An indexed source file. Paths are relative Unix-style against the owning
/// project's root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub project: String,
    pub file_path: String,
    pub mtime_ms: i64,
    pub size: i64,
    pub content_hash: String,
    pub updated_at: String,
    pub line_count: Option<i64>,
}

/// A named declaration within a file. Children of container symbols flatten
/// into their own rows with dotted names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    /// Row id; zero until persisted.
    #[serde(default)]
    pub id: i64,
    pub project: String,
    pub file_path: String,
    pub name: String,
    pub kind: SymbolKind,
    pub span_start: i64,
    pub span_end: i64,
    pub is_exported: bool,
    /// `params:<n>|async:<0|1>` for callables, absent otherwise.
    pub signature: Option<String>,
    /// Hash over name, kind, signature, and detail; survives whitespace-only
    /// file edits and pins semantic change detection.
    pub fingerprint: String,
    pub detail: serde_json::Value,
    /// Content hash of the file state these rows were extracted from.
    pub content_hash: String,
}

/// A directed edge from a file (optionally a symbol in it) to another file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRecord {
    #[serde(default)]
    pub id: i64,
    pub project: String,
    pub kind: RelationKind,
    pub src_file_path: String,
    pub src_symbol_name: Option<String>,
    pub dst_project: String,
    pub dst_file_path: String,
    pub dst_symbol_name: Option<String>,
    pub meta: serde_json::Value,
}

/// Filter for relation searches; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct RelationFilter {
    pub project: Option<String>,
    pub kind: Option<RelationKind>,
    pub src_file_path: Option<String>,
    pub dst_file_path: Option<String>,
    pub src_symbol_name: Option<String>,
    pub dst_symbol_name: Option<String>,
    pub limit: Option<usize>,
}

/// Prefix search over the symbol name index.
#[derive(Debug, Clone)]
pub struct SymbolQuery {
    pub text: String,
    pub kind: Option<SymbolKind>,
    pub project: Option<String>,
    pub limit: usize,
}

impl SymbolQuery {
    pub fn prefix(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: None,
            project: None,
            limit: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub total_files: i64,
    pub total_symbols: i64,
    pub total_relations: i64,
    pub symbols_by_kind: HashMap<String, i64>,
    pub db_size_mb: f64,
}
