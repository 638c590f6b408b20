//! Syntax-tree adapters.
//!
//! Converts parsed source files into flat symbol descriptors and raw
//! relations with unresolved destinations. Everything here is pure: the
//! adapters never touch the filesystem or the store.

pub mod base;
pub mod typescript;

pub use base::{
    HeritageKind, HeritageRef, MemberDescriptor, Modifiers, ParamInfo, RawRelation, RelationKind,
    Span, SymbolDescriptor, SymbolKind,
};
pub use typescript::TypeScriptExtractor;
