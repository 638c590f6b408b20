//! Tree navigation and text utilities.

use crate::extractors::base::{Modifiers, ParamInfo};
use crate::extractors::typescript::TypeScriptExtractor;
use tree_sitter::Node;

/// Source text of a node.
pub(super) fn text(x: &TypeScriptExtractor, node: Node) -> String {
    x.content()[node.byte_range()].to_string()
}

/// True when `node` has an anonymous child of the given kind (`async`,
/// `static`, `get`, ...).
pub(super) fn has_child(node: Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor).any(|c| c.kind() == kind)
}

/// Accessibility / mutability modifiers declared on a class member.
pub(super) fn member_modifiers(x: &TypeScriptExtractor, node: Node) -> Modifiers {
    let mut modifiers = Modifiers::default();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "accessibility_modifier" => match text(x, child).as_str() {
                "private" => modifiers |= Modifiers::PRIVATE,
                "protected" => modifiers |= Modifiers::PROTECTED,
                _ => modifiers |= Modifiers::PUBLIC,
            },
            "static" => modifiers |= Modifiers::STATIC,
            "readonly" => modifiers |= Modifiers::READONLY,
            "async" => modifiers |= Modifiers::ASYNC,
            "abstract" => modifiers |= Modifiers::ABSTRACT,
            _ => {}
        }
    }
    modifiers
}

/// Parameters of a callable node, reading either the `parameters` list or
/// the single bare `parameter` an arrow function may carry.
pub(super) fn params_of(x: &TypeScriptExtractor, node: Node) -> Vec<ParamInfo> {
    if let Some(single) = node.child_by_field_name("parameter") {
        return vec![ParamInfo {
            name: text(x, single),
            type_text: None,
            optional: false,
        }];
    }
    let Some(list) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut params = Vec::new();
    let mut cursor = list.walk();
    for child in list.named_children(&mut cursor) {
        match child.kind() {
            "required_parameter" | "optional_parameter" => {
                let name = child
                    .child_by_field_name("pattern")
                    .map(|p| text(x, p))
                    .unwrap_or_default();
                params.push(ParamInfo {
                    name,
                    type_text: annotation_text(x, child),
                    optional: child.kind() == "optional_parameter",
                });
            }
            // `this` pseudo-parameters and comments are skipped
            _ => {}
        }
    }
    params
}

/// Text of a `: T` annotation on the node's `type` field, without the colon.
pub(super) fn annotation_text(x: &TypeScriptExtractor, node: Node) -> Option<String> {
    let annotation = node.child_by_field_name("type")?;
    Some(text(x, annotation).trim_start_matches(':').trim().to_string())
}

/// Return type text from the `return_type` field.
pub(super) fn return_type_text(x: &TypeScriptExtractor, node: Node) -> Option<String> {
    let annotation = node.child_by_field_name("return_type")?;
    Some(text(x, annotation).trim_start_matches(':').trim().to_string())
}

/// JSDoc block immediately above a declaration. Climbs through an
/// `export_statement` wrapper so `/** .. */ export class X` attaches to `X`.
pub(super) fn jsdoc_for(x: &TypeScriptExtractor, node: Node) -> Option<String> {
    let mut anchor = node;
    if let Some(parent) = node.parent()
        && parent.kind() == "export_statement"
    {
        anchor = parent;
    }
    let prev = anchor.prev_sibling()?;
    if prev.kind() == "comment" {
        let comment = text(x, prev);
        if comment.starts_with("/**") {
            return Some(comment);
        }
    }
    None
}

/// Name of the innermost enclosing declaration, dotted for class members
/// (`Class.method`). None at module scope.
pub(super) fn enclosing_symbol(x: &TypeScriptExtractor, node: Node) -> Option<String> {
    let mut current = node.parent();
    while let Some(n) = current {
        match n.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = n.child_by_field_name("name") {
                    return Some(text(x, name));
                }
            }
            "method_definition" | "abstract_method_signature" | "public_field_definition" => {
                let member = n.child_by_field_name("name").map(|m| text(x, m))?;
                let class_name = enclosing_symbol(x, n);
                return Some(match class_name {
                    Some(class_name) => format!("{class_name}.{member}"),
                    None => member,
                });
            }
            "class_declaration" | "abstract_class_declaration" | "interface_declaration"
            | "enum_declaration" => {
                if let Some(name) = n.child_by_field_name("name") {
                    return Some(text(x, name));
                }
            }
            "variable_declarator" => {
                if let Some(name) = n.child_by_field_name("name") {
                    return Some(text(x, name));
                }
            }
            _ => {}
        }
        current = n.parent();
    }
    None
}

/// Strip matching string quotes from an import specifier literal.
pub(super) fn unquote(raw: &str) -> String {
    raw.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}
