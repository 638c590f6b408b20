//! Top-level declaration extraction.

use super::helpers::{
    annotation_text, has_child, jsdoc_for, member_modifiers, params_of, return_type_text, text,
    unquote,
};
use crate::extractors::base::{
    HeritageKind, HeritageRef, MemberDescriptor, Modifiers, Span, SymbolDescriptor, SymbolKind,
};
use crate::extractors::typescript::TypeScriptExtractor;
use tree_sitter::{Node, Tree};

pub(super) fn extract_symbols(x: &TypeScriptExtractor, tree: &Tree) -> Vec<SymbolDescriptor> {
    let mut symbols = Vec::new();
    let root = tree.root_node();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        visit_statement(x, child, Modifiers::default(), &mut symbols);
    }
    symbols
}

fn visit_statement(
    x: &TypeScriptExtractor,
    node: Node,
    inherited: Modifiers,
    out: &mut Vec<SymbolDescriptor>,
) {
    match node.kind() {
        "export_statement" => {
            let mut modifiers = inherited | Modifiers::EXPORTED;
            if has_child(node, "default") {
                modifiers |= Modifiers::DEFAULT_EXPORT;
            }
            if let Some(declaration) = node.child_by_field_name("declaration") {
                visit_statement(x, declaration, modifiers, out);
            } else if let Some(value) = node.child_by_field_name("value") {
                // `export default <expr>` with a function value
                if matches!(value.kind(), "arrow_function" | "function_expression" | "function") {
                    out.push(callable_symbol(x, value, "default".to_string(), modifiers));
                }
            }
        }
        "ambient_declaration" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                visit_statement(x, child, inherited | Modifiers::DECLARE, out);
            }
        }
        "function_declaration" | "generator_function_declaration" => {
            let name = node
                .child_by_field_name("name")
                .map(|n| text(x, n))
                .unwrap_or_else(|| "default".to_string());
            out.push(callable_symbol(x, node, name, inherited));
        }
        "class_declaration" | "abstract_class_declaration" => {
            out.push(class_symbol(x, node, inherited));
        }
        "interface_declaration" => out.push(interface_symbol(x, node, inherited)),
        "enum_declaration" => out.push(enum_symbol(x, node, inherited)),
        "type_alias_declaration" => {
            if let Some(name) = node.child_by_field_name("name") {
                let mut symbol =
                    SymbolDescriptor::new(text(x, name), SymbolKind::Type, span_of(node));
                symbol.modifiers = inherited;
                symbol.jsdoc = jsdoc_for(x, node);
                out.push(symbol);
            }
        }
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = node.walk();
            for declarator in node.named_children(&mut cursor) {
                if declarator.kind() == "variable_declarator"
                    && let Some(symbol) = variable_symbol(x, node, declarator, inherited)
                {
                    out.push(symbol);
                }
            }
        }
        _ => {}
    }
}

fn span_of(node: Node) -> Span {
    Span {
        start: node.start_byte() as u32,
        end: node.end_byte() as u32,
    }
}

/// Function declaration or function-valued expression.
fn callable_symbol(
    x: &TypeScriptExtractor,
    node: Node,
    name: String,
    inherited: Modifiers,
) -> SymbolDescriptor {
    let mut symbol = SymbolDescriptor::new(name, SymbolKind::Function, span_of(node));
    symbol.modifiers = inherited;
    if has_child(node, "async") {
        symbol.modifiers |= Modifiers::ASYNC;
    }
    symbol.params = Some(params_of(x, node));
    symbol.return_type = return_type_text(x, node);
    symbol.jsdoc = jsdoc_for(x, node);
    symbol
}

fn class_symbol(x: &TypeScriptExtractor, node: Node, inherited: Modifiers) -> SymbolDescriptor {
    let name = node
        .child_by_field_name("name")
        .map(|n| text(x, n))
        .unwrap_or_else(|| "default".to_string());
    let mut symbol = SymbolDescriptor::new(name, SymbolKind::Class, span_of(node));
    symbol.modifiers = inherited;
    if node.kind() == "abstract_class_declaration" || has_child(node, "abstract") {
        symbol.modifiers |= Modifiers::ABSTRACT;
    }
    symbol.jsdoc = jsdoc_for(x, node);

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "decorator" => {
                symbol.decorators.push(text(x, child).trim_start_matches('@').to_string());
            }
            "class_heritage" => collect_class_heritage(x, child, &mut symbol.heritage),
            _ => {}
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "method_definition" | "abstract_method_signature" => {
                    symbol.members.push(method_member(x, member));
                }
                "public_field_definition" => {
                    let Some(name) = member.child_by_field_name("name") else {
                        continue;
                    };
                    symbol.members.push(MemberDescriptor {
                        name: text(x, name),
                        kind: SymbolKind::Property,
                        span: span_of(member),
                        modifiers: member_modifiers(x, member),
                        params: None,
                        return_type: annotation_text(x, member),
                    });
                }
                _ => {}
            }
        }
    }
    symbol
}

fn method_member(x: &TypeScriptExtractor, node: Node) -> MemberDescriptor {
    let name = node
        .child_by_field_name("name")
        .map(|n| text(x, n))
        .unwrap_or_default();
    let kind = if name == "constructor" {
        SymbolKind::Constructor
    } else if has_child(node, "get") {
        SymbolKind::Getter
    } else if has_child(node, "set") {
        SymbolKind::Setter
    } else {
        SymbolKind::Method
    };
    let mut modifiers = member_modifiers(x, node);
    if node.kind() == "abstract_method_signature" {
        modifiers |= Modifiers::ABSTRACT;
    }
    MemberDescriptor {
        name,
        kind,
        span: span_of(node),
        modifiers,
        params: Some(params_of(x, node)),
        return_type: return_type_text(x, node),
    }
}

fn collect_class_heritage(x: &TypeScriptExtractor, node: Node, out: &mut Vec<HeritageRef>) {
    let mut cursor = node.walk();
    for clause in node.children(&mut cursor) {
        let kind = match clause.kind() {
            "extends_clause" => HeritageKind::Extends,
            "implements_clause" => HeritageKind::Implements,
            _ => continue,
        };
        let mut inner = clause.walk();
        for reference in clause.named_children(&mut inner) {
            if let Some(name) = heritage_name(x, reference) {
                out.push(HeritageRef { kind, name });
            }
        }
    }
}

/// Referenced base name from a heritage expression, unwrapping generics.
fn heritage_name(x: &TypeScriptExtractor, node: Node) -> Option<String> {
    match node.kind() {
        "identifier" | "type_identifier" | "member_expression" | "nested_type_identifier" => {
            Some(text(x, node))
        }
        "generic_type" => node.child_by_field_name("name").map(|n| text(x, n)),
        _ => None,
    }
}

fn interface_symbol(x: &TypeScriptExtractor, node: Node, inherited: Modifiers) -> SymbolDescriptor {
    let name = node
        .child_by_field_name("name")
        .map(|n| text(x, n))
        .unwrap_or_default();
    let mut symbol = SymbolDescriptor::new(name, SymbolKind::Interface, span_of(node));
    symbol.modifiers = inherited;
    symbol.jsdoc = jsdoc_for(x, node);

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "extends_type_clause" {
            let mut inner = child.walk();
            for reference in child.named_children(&mut inner) {
                if let Some(name) = heritage_name(x, reference) {
                    symbol.heritage.push(HeritageRef {
                        kind: HeritageKind::Extends,
                        name,
                    });
                }
            }
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "property_signature" => {
                    let Some(name) = member.child_by_field_name("name") else {
                        continue;
                    };
                    let mut modifiers = Modifiers::default();
                    if has_child(member, "readonly") {
                        modifiers |= Modifiers::READONLY;
                    }
                    symbol.members.push(MemberDescriptor {
                        name: text(x, name),
                        kind: SymbolKind::Property,
                        span: span_of(member),
                        modifiers,
                        params: None,
                        return_type: annotation_text(x, member),
                    });
                }
                "method_signature" => {
                    let Some(name) = member.child_by_field_name("name") else {
                        continue;
                    };
                    symbol.members.push(MemberDescriptor {
                        name: text(x, name),
                        kind: SymbolKind::Method,
                        span: span_of(member),
                        modifiers: Modifiers::default(),
                        params: Some(params_of(x, member)),
                        return_type: return_type_text(x, member),
                    });
                }
                _ => {}
            }
        }
    }
    symbol
}

fn enum_symbol(x: &TypeScriptExtractor, node: Node, inherited: Modifiers) -> SymbolDescriptor {
    let name = node
        .child_by_field_name("name")
        .map(|n| text(x, n))
        .unwrap_or_default();
    let mut symbol = SymbolDescriptor::new(name, SymbolKind::Enum, span_of(node));
    symbol.modifiers = inherited;
    symbol.jsdoc = jsdoc_for(x, node);

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            let name_node = match member.kind() {
                "property_identifier" | "string" => Some(member),
                "enum_assignment" => member.child_by_field_name("name"),
                _ => None,
            };
            if let Some(name_node) = name_node {
                symbol.members.push(MemberDescriptor {
                    name: unquote(&text(x, name_node)),
                    kind: SymbolKind::Property,
                    span: span_of(member),
                    modifiers: Modifiers::default(),
                    params: None,
                    return_type: None,
                });
            }
        }
    }
    symbol
}

fn variable_symbol(
    x: &TypeScriptExtractor,
    statement: Node,
    declarator: Node,
    inherited: Modifiers,
) -> Option<SymbolDescriptor> {
    let name = declarator.child_by_field_name("name")?;
    // Destructuring patterns do not declare a single nameable symbol
    if name.kind() != "identifier" {
        return None;
    }
    let mut symbol = SymbolDescriptor::new(text(x, name), SymbolKind::Variable, span_of(declarator));
    symbol.modifiers = inherited;
    symbol.return_type = annotation_text(x, declarator);
    symbol.jsdoc = jsdoc_for(x, statement);

    if let Some(value) = declarator.child_by_field_name("value")
        && matches!(value.kind(), "arrow_function" | "function_expression" | "function")
    {
        symbol.params = Some(params_of(x, value));
        if has_child(value, "async") {
            symbol.modifiers |= Modifiers::ASYNC;
        }
        if symbol.return_type.is_none() {
            symbol.return_type = return_type_text(x, value);
        }
    }
    Some(symbol)
}
