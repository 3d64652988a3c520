//! Rust entity extraction.

use std::path::Path;

use reposcope_core::{CodeEntity, EntityKind, ScopeError};
use tree_sitter::Node;

use crate::analyzer::{
    entity_from_node, find_child_text, node_text, normalize_dependencies, parse, Analyzer,
};
use crate::walker::Language;

/// Analyzer for `.rs` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustAnalyzer;

impl Analyzer for RustAnalyzer {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn analyze_source(&self, path: &Path, source: &str) -> Result<Vec<CodeEntity>, ScopeError> {
        let Some(tree) = parse(tree_sitter_rust::LANGUAGE.into(), source)? else {
            return Ok(Vec::new());
        };
        let mut entities = Vec::new();
        collect_rust_entities(tree.root_node(), source.as_bytes(), path, false, &mut entities);
        Ok(entities)
    }

    fn detect_dependencies(&self, repo_root: &Path) -> Result<Vec<String>, ScopeError> {
        let manifest = repo_root.join("Cargo.toml");
        if !manifest.is_file() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&manifest)?;
        let value: toml::Value = toml::from_str(&content)?;
        let mut deps = Vec::new();
        for section in ["dependencies", "dev-dependencies", "build-dependencies"] {
            if let Some(table) = value.get(section).and_then(|t| t.as_table()) {
                deps.extend(table.keys().cloned());
            }
            if let Some(table) = value
                .get("workspace")
                .and_then(|w| w.get(section))
                .and_then(|t| t.as_table())
            {
                deps.extend(table.keys().cloned());
            }
        }
        Ok(normalize_dependencies(deps))
    }
}

fn collect_rust_entities(
    node: Node,
    source: &[u8],
    path: &Path,
    inside_impl: bool,
    entities: &mut Vec<CodeEntity>,
) {
    let named = |kind: &str| find_child_text(&node, kind, source);
    let entity = |name: String, kind: EntityKind| {
        entity_from_node(
            &node,
            source,
            path,
            Language::Rust,
            name,
            kind,
            doc_comment(&node, source),
        )
    };

    match node.kind() {
        "function_item" => {
            if let Some(name) = named("identifier") {
                let kind = if inside_impl {
                    EntityKind::Method
                } else {
                    EntityKind::Function
                };
                entities.push(entity(name, kind));
            }
            // Nested items inside a body are free functions again.
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                collect_rust_entities(child, source, path, false, entities);
            }
            return;
        }
        "struct_item" => {
            if let Some(name) = named("type_identifier") {
                entities.push(entity(name, EntityKind::Struct));
            }
        }
        "enum_item" => {
            if let Some(name) = named("type_identifier") {
                entities.push(entity(name, EntityKind::Enum));
            }
        }
        "trait_item" => {
            if let Some(name) = named("type_identifier") {
                entities.push(entity(name, EntityKind::Trait));
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                collect_rust_entities(child, source, path, true, entities);
            }
            return;
        }
        "impl_item" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                collect_rust_entities(child, source, path, true, entities);
            }
            return;
        }
        "mod_item" => {
            if node.child_by_field_name("body").is_none() {
                if let Some(name) = named("identifier") {
                    entities.push(entity(name, EntityKind::Module));
                }
            }
        }
        "use_declaration" => {
            if let Some(argument) = node.child_by_field_name("argument") {
                let text = node_text(&argument, source);
                entities.push(entity(text, EntityKind::Import));
            }
            return;
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_rust_entities(child, source, path, inside_impl, entities);
    }
}

/// Contiguous `///` lines directly above an item.
fn doc_comment(node: &Node, source: &[u8]) -> Option<String> {
    let mut lines = Vec::new();
    let mut sibling = node.prev_sibling();
    while let Some(prev) = sibling {
        if prev.kind() == "attribute_item" {
            sibling = prev.prev_sibling();
            continue;
        }
        if prev.kind() != "line_comment" {
            break;
        }
        let text = node_text(&prev, source);
        let Some(doc) = text.strip_prefix("///") else {
            break;
        };
        lines.push(doc.trim().to_string());
        sibling = prev.prev_sibling();
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"use std::collections::HashMap;
use crate::db::{Pool, Row};

mod handlers;

/// Stored user credentials.
#[derive(Debug)]
pub struct Credentials {
    pub user: String,
}

pub enum Role {
    Admin,
}

pub trait Verify {
    fn verify(&self, password: &str) -> bool;
}

impl Credentials {
    /// Build credentials
    /// for a user.
    pub fn new(user: String) -> Self {
        fn helper() {}
        Self { user }
    }
}

pub fn login(
    user: &str,
    password: &str,
) -> bool {
    true
}
"#;

    fn analyze() -> Vec<CodeEntity> {
        RustAnalyzer
            .analyze_source(Path::new("src/auth.rs"), SAMPLE)
            .unwrap()
    }

    fn names_of(entities: &[CodeEntity], kind: EntityKind) -> Vec<String> {
        entities
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.name.clone())
            .collect()
    }

    #[test]
    fn extracts_items() {
        let entities = analyze();
        assert_eq!(names_of(&entities, EntityKind::Struct), vec!["Credentials"]);
        assert_eq!(names_of(&entities, EntityKind::Enum), vec!["Role"]);
        assert_eq!(names_of(&entities, EntityKind::Trait), vec!["Verify"]);
        assert_eq!(names_of(&entities, EntityKind::Method), vec!["new"]);
        assert_eq!(
            names_of(&entities, EntityKind::Function),
            vec!["helper", "login"]
        );
        assert_eq!(names_of(&entities, EntityKind::Module), vec!["handlers"]);
        assert_eq!(
            names_of(&entities, EntityKind::Import),
            vec!["std::collections::HashMap", "crate::db::{Pool, Row}"]
        );
    }

    #[test]
    fn doc_comments_attach_across_attributes() {
        let entities = analyze();
        let creds = entities.iter().find(|e| e.name == "Credentials").unwrap();
        assert_eq!(creds.docstring.as_deref(), Some("Stored user credentials."));
        let new = entities.iter().find(|e| e.name == "new").unwrap();
        assert_eq!(new.docstring.as_deref(), Some("Build credentials\nfor a user."));
        let role = entities.iter().find(|e| e.name == "Role").unwrap();
        assert!(role.docstring.is_none());
    }

    #[test]
    fn multi_line_signature_is_collapsed() {
        let entities = analyze();
        let login = entities.iter().find(|e| e.name == "login").unwrap();
        assert_eq!(login.signature, "pub fn login( user: &str, password: &str, ) -> bool");
        assert_eq!(login.start_line, 29);
        assert_eq!(login.end_line, 34);
    }

    #[test]
    fn dependencies_from_cargo_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Cargo.toml"),
            r#"
[package]
name = "shop"

[dependencies]
serde = "1"
tokio = { version = "1" }

[dev-dependencies]
tempfile = "3"
"#,
        )
        .unwrap();
        let deps = RustAnalyzer.detect_dependencies(dir.path()).unwrap();
        assert_eq!(deps, vec!["serde", "tempfile", "tokio"]);
    }
}
