//! Descriptor types shared by the extractor adapters and the indexers.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Byte span of a declaration within its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

/// Kind of a declared symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Interface,
    Enum,
    Type,
    Variable,
    Method,
    Property,
    Getter,
    Setter,
    Constructor,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Enum => "enum",
            SymbolKind::Type => "type",
            SymbolKind::Variable => "variable",
            SymbolKind::Method => "method",
            SymbolKind::Property => "property",
            SymbolKind::Getter => "getter",
            SymbolKind::Setter => "setter",
            SymbolKind::Constructor => "constructor",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "function" => SymbolKind::Function,
            "class" => SymbolKind::Class,
            "interface" => SymbolKind::Interface,
            "enum" => SymbolKind::Enum,
            "type" => SymbolKind::Type,
            "variable" => SymbolKind::Variable,
            "method" => SymbolKind::Method,
            "property" => SymbolKind::Property,
            "getter" => SymbolKind::Getter,
            "setter" => SymbolKind::Setter,
            "constructor" => SymbolKind::Constructor,
            _ => return None,
        })
    }
}

bitflags! {
    /// Declaration modifiers as a bitset.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u16 {
        const EXPORTED       = 1 << 0;
        const DEFAULT_EXPORT = 1 << 1;
        const ASYNC          = 1 << 2;
        const STATIC         = 1 << 3;
        const READONLY       = 1 << 4;
        const ABSTRACT       = 1 << 5;
        const PRIVATE        = 1 << 6;
        const PROTECTED      = 1 << 7;
        const PUBLIC         = 1 << 8;
        const DECLARE        = 1 << 9;
    }
}

impl Modifiers {
    /// Stable name list for detail blobs.
    pub fn names(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        for (flag, name) in [
            (Modifiers::EXPORTED, "exported"),
            (Modifiers::DEFAULT_EXPORT, "default"),
            (Modifiers::ASYNC, "async"),
            (Modifiers::STATIC, "static"),
            (Modifiers::READONLY, "readonly"),
            (Modifiers::ABSTRACT, "abstract"),
            (Modifiers::PRIVATE, "private"),
            (Modifiers::PROTECTED, "protected"),
            (Modifiers::PUBLIC, "public"),
            (Modifiers::DECLARE, "declare"),
        ] {
            if self.contains(flag) {
                out.push(name);
            }
        }
        out
    }

    /// Visibility keyword, defaulting to public when none is written.
    pub fn visibility(&self) -> &'static str {
        if self.contains(Modifiers::PRIVATE) {
            "private"
        } else if self.contains(Modifiers::PROTECTED) {
            "protected"
        } else {
            "public"
        }
    }
}

/// A single declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_text: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeritageKind {
    Extends,
    Implements,
}

/// An `extends` or `implements` reference by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeritageRef {
    pub kind: HeritageKind,
    pub name: String,
}

/// A member of a class, interface, or enum, later flattened into its own
/// symbol row with a dotted name.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDescriptor {
    pub name: String,
    pub kind: SymbolKind,
    pub span: Span,
    pub modifiers: Modifiers,
    pub params: Option<Vec<ParamInfo>>,
    pub return_type: Option<String>,
}

/// A top-level declaration extracted from one file.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolDescriptor {
    pub name: String,
    pub kind: SymbolKind,
    pub span: Span,
    pub modifiers: Modifiers,
    /// Present for callables, including variables holding function values.
    pub params: Option<Vec<ParamInfo>>,
    pub return_type: Option<String>,
    pub members: Vec<MemberDescriptor>,
    pub heritage: Vec<HeritageRef>,
    pub decorators: Vec<String>,
    pub jsdoc: Option<String>,
}

impl SymbolDescriptor {
    pub fn new(name: String, kind: SymbolKind, span: Span) -> Self {
        Self {
            name,
            kind,
            span,
            modifiers: Modifiers::default(),
            params: None,
            return_type: None,
            members: Vec::new(),
            heritage: Vec::new(),
            decorators: Vec::new(),
            jsdoc: None,
        }
    }

    pub fn is_exported(&self) -> bool {
        self.modifiers.contains(Modifiers::EXPORTED)
    }

    pub fn is_callable(&self) -> bool {
        self.params.is_some()
    }
}

/// Directed edge kinds persisted in the relations table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    Imports,
    TypeReferences,
    ReExports,
    Calls,
    Extends,
    Implements,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Imports => "imports",
            RelationKind::TypeReferences => "type-references",
            RelationKind::ReExports => "re-exports",
            RelationKind::Calls => "calls",
            RelationKind::Extends => "extends",
            RelationKind::Implements => "implements",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "imports" => RelationKind::Imports,
            "type-references" => RelationKind::TypeReferences,
            "re-exports" => RelationKind::ReExports,
            "calls" => RelationKind::Calls,
            "extends" => RelationKind::Extends,
            "implements" => RelationKind::Implements,
            _ => return None,
        })
    }
}

/// A candidate relation before the indexer assigns projects and persists it.
/// `dst_file` is absolute; the destination symbol is the imported binding
/// (`default` for default imports, `*` for namespace imports).
#[derive(Debug, Clone, PartialEq)]
pub struct RawRelation {
    pub kind: RelationKind,
    pub src_symbol: Option<String>,
    pub dst_file: PathBuf,
    pub dst_symbol: Option<String>,
    pub meta: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_strings() {
        for kind in [
            SymbolKind::Function,
            SymbolKind::Getter,
            SymbolKind::Constructor,
        ] {
            assert_eq!(SymbolKind::from_str(kind.as_str()), Some(kind));
        }
        for kind in [RelationKind::TypeReferences, RelationKind::ReExports] {
            assert_eq!(RelationKind::from_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn visibility_prefers_explicit_modifiers() {
        assert_eq!(Modifiers::PRIVATE.visibility(), "private");
        assert_eq!(Modifiers::STATIC.visibility(), "public");
    }
}
