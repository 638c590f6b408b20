//! TypeScript symbol and relation extraction.
//!
//! Organized as a thin wrapper plus specialized submodules:
//!
//! - **symbols**: top-level declaration extraction with member collection
//! - **relations**: import/re-export/call/heritage/type-reference candidates
//! - **helpers**: tree navigation and text utilities

mod helpers;
mod relations;
mod symbols;

use crate::extractors::base::{RawRelation, SymbolDescriptor};
use crate::resolver::AliasTable;
use std::path::{Path, PathBuf};
use tree_sitter::Tree;

/// Resolver callback injected by the indexer: maps (current file, specifier)
/// to candidate destination paths.
pub type ResolveFn<'a> = &'a dyn Fn(&Path, &str) -> Vec<PathBuf>;

/// Parse TypeScript source into a syntax tree. Returns None when the parser
/// gives up entirely (tree-sitter tolerates most local errors).
pub fn parse(content: &str) -> Option<Tree> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
        .ok()?;
    parser.parse(content, None)
}

/// Extractor over one parsed file.
pub struct TypeScriptExtractor {
    file_path: PathBuf,
    content: String,
}

impl TypeScriptExtractor {
    pub fn new(file_path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            content: content.into(),
        }
    }

    /// Flat list of top-level declarations, members attached.
    pub fn extract_symbols(&self, tree: &Tree) -> Vec<SymbolDescriptor> {
        symbols::extract_symbols(self, tree)
    }

    /// Candidate relations with destinations picked through the injected
    /// resolver (the plain resolver over `aliases` when none is injected).
    /// Specifiers the resolver cannot place yield no relation.
    pub fn extract_relations(
        &self,
        tree: &Tree,
        aliases: Option<&AliasTable>,
        resolve: Option<ResolveFn>,
    ) -> Vec<RawRelation> {
        relations::extract_relations(self, tree, aliases, resolve)
    }

    pub(super) fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub(super) fn content(&self) -> &str {
        &self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::base::{Modifiers, RelationKind, SymbolKind};

    fn symbols_of(code: &str) -> Vec<SymbolDescriptor> {
        let tree = parse(code).unwrap();
        TypeScriptExtractor::new("/proj/test.ts", code).extract_symbols(&tree)
    }

    #[test]
    fn extracts_function_declarations() {
        let symbols = symbols_of("export async function getUserData(id: string) { return id; }");
        let f = symbols.iter().find(|s| s.name == "getUserData").unwrap();
        assert_eq!(f.kind, SymbolKind::Function);
        assert!(f.is_exported());
        assert!(f.modifiers.contains(Modifiers::ASYNC));
        assert_eq!(f.params.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn extracts_class_with_members() {
        let code = r#"
        export class User {
            private name: string;
            constructor(name: string) { this.name = name; }
            get displayName(): string { return this.name; }
            static create(): User { return new User("x"); }
        }
        "#;
        let symbols = symbols_of(code);
        let class = symbols.iter().find(|s| s.name == "User").unwrap();
        assert_eq!(class.kind, SymbolKind::Class);
        let kinds: Vec<_> = class.members.iter().map(|m| (m.name.as_str(), m.kind)).collect();
        assert!(kinds.contains(&("name", SymbolKind::Property)));
        assert!(kinds.contains(&("constructor", SymbolKind::Constructor)));
        assert!(kinds.contains(&("displayName", SymbolKind::Getter)));
        let create = class.members.iter().find(|m| m.name == "create").unwrap();
        assert!(create.modifiers.contains(Modifiers::STATIC));
        let name = class.members.iter().find(|m| m.name == "name").unwrap();
        assert!(name.modifiers.contains(Modifiers::PRIVATE));
    }

    #[test]
    fn extracts_interface_enum_and_type_alias() {
        let code = r#"
        interface Shape { area(): number; readonly sides: number; }
        enum Color { Red, Green }
        type Point = { x: number };
        "#;
        let symbols = symbols_of(code);
        let shape = symbols.iter().find(|s| s.name == "Shape").unwrap();
        assert_eq!(shape.kind, SymbolKind::Interface);
        assert_eq!(shape.members.len(), 2);
        let color = symbols.iter().find(|s| s.name == "Color").unwrap();
        assert_eq!(color.kind, SymbolKind::Enum);
        assert_eq!(color.members.len(), 2);
        assert!(symbols.iter().any(|s| s.name == "Point" && s.kind == SymbolKind::Type));
    }

    #[test]
    fn arrow_function_variables_are_callable() {
        let symbols = symbols_of("export const handler = async (req: Request) => req;");
        let v = symbols.iter().find(|s| s.name == "handler").unwrap();
        assert_eq!(v.kind, SymbolKind::Variable);
        assert!(v.is_callable());
        assert!(v.modifiers.contains(Modifiers::ASYNC));
    }

    #[test]
    fn captures_jsdoc_and_heritage() {
        let code = r#"
        /** Base shape. */
        export class Circle extends Shape implements Drawable {}
        "#;
        let symbols = symbols_of(code);
        let circle = symbols.iter().find(|s| s.name == "Circle").unwrap();
        assert!(circle.jsdoc.as_deref().unwrap().contains("Base shape"));
        assert_eq!(circle.heritage.len(), 2);
    }

    #[test]
    fn relations_track_import_bindings() {
        let code = r#"
        import Default, { A as B } from './a';
        import * as NS from './ns';
        import './side-effect';
        "#;
        let tree = parse(code).unwrap();
        let extractor = TypeScriptExtractor::new("/proj/main.ts", code);
        let relations = extractor.extract_relations(&tree, None, None);

        let imports: Vec<_> = relations
            .iter()
            .filter(|r| r.kind == RelationKind::Imports)
            .collect();
        assert_eq!(imports.len(), 4);
        assert!(imports.iter().any(|r| r.dst_symbol.as_deref() == Some("default")));
        assert!(imports.iter().any(|r| r.dst_symbol.as_deref() == Some("A")));
        assert!(imports.iter().any(|r| r.dst_symbol.as_deref() == Some("*")));
        assert!(imports.iter().any(|r| r.dst_symbol.is_none()));
    }

    #[test]
    fn relations_track_calls_and_heritage() {
        let code = r#"
        import { helper, Base } from './lib';
        export class Impl extends Base {
            run() { return helper(); }
        }
        "#;
        let tree = parse(code).unwrap();
        let extractor = TypeScriptExtractor::new("/proj/main.ts", code);
        let relations = extractor.extract_relations(&tree, None, None);

        let call = relations.iter().find(|r| r.kind == RelationKind::Calls).unwrap();
        assert_eq!(call.dst_symbol.as_deref(), Some("helper"));
        assert_eq!(call.src_symbol.as_deref(), Some("Impl.run"));
        let ext = relations.iter().find(|r| r.kind == RelationKind::Extends).unwrap();
        assert_eq!(ext.dst_symbol.as_deref(), Some("Base"));
        assert_eq!(ext.src_symbol.as_deref(), Some("Impl"));
    }

    #[test]
    fn unresolvable_specifiers_yield_no_relations() {
        let code = "import { x } from 'some-package';";
        let tree = parse(code).unwrap();
        let extractor = TypeScriptExtractor::new("/proj/main.ts", code);
        let relations = extractor.extract_relations(&tree, None, None);
        assert!(relations.is_empty());
    }
}
