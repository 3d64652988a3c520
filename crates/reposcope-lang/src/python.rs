//! Python entity extraction.
//!
//! Functions, methods, classes and imports come from the tree-sitter parse;
//! Flask/FastAPI-style route decorators additionally yield `api_endpoint`
//! entities named `"<METHOD> <path>"`.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use reposcope_core::{CodeEntity, EntityKind, ScopeError};
use tree_sitter::Node;

use crate::analyzer::{
    entity_from_node, find_child_text, node_text, normalize_dependencies, parse, unquote,
    Analyzer,
};
use crate::walker::Language;

static ROUTE_DECORATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)^@\s*(?:[A-Za-z_]\w*\.)+(route|api_route|get|post|put|patch|delete|head|options)\s*\(\s*[rbuRBU]{0,2}["']([^"']*)["'](.*)$"#,
    )
    .expect("route decorator regex is valid")
});

static METHODS_ARG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"methods\s*=\s*[\[\(]([^\]\)]*)[\]\)]"#).expect("methods regex is valid")
});

static QUOTED_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["'](\w+)["']"#).expect("quoted word regex is valid"));

/// Analyzer for `.py` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonAnalyzer;

impl Analyzer for PythonAnalyzer {
    fn language(&self) -> Language {
        Language::Python
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn analyze_source(&self, path: &Path, source: &str) -> Result<Vec<CodeEntity>, ScopeError> {
        let Some(tree) = parse(tree_sitter_python::LANGUAGE.into(), source)? else {
            return Ok(Vec::new());
        };
        let mut entities = Vec::new();
        collect_python_entities(tree.root_node(), source.as_bytes(), path, false, &mut entities);
        Ok(entities)
    }

    fn detect_dependencies(&self, repo_root: &Path) -> Result<Vec<String>, ScopeError> {
        let mut deps = Vec::new();

        let requirements = repo_root.join("requirements.txt");
        if requirements.is_file() {
            let content = std::fs::read_to_string(&requirements)?;
            deps.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('-'))
                    .filter_map(requirement_name),
            );
        }

        let pyproject = repo_root.join("pyproject.toml");
        if pyproject.is_file() {
            let content = std::fs::read_to_string(&pyproject)?;
            let value: toml::Value = toml::from_str(&content)?;
            if let Some(list) = value
                .get("project")
                .and_then(|p| p.get("dependencies"))
                .and_then(|d| d.as_array())
            {
                deps.extend(list.iter().filter_map(|v| v.as_str()).filter_map(requirement_name));
            }
            if let Some(table) = value
                .get("tool")
                .and_then(|t| t.get("poetry"))
                .and_then(|p| p.get("dependencies"))
                .and_then(|d| d.as_table())
            {
                deps.extend(table.keys().filter(|k| *k != "python").cloned());
            }
        }

        Ok(normalize_dependencies(deps))
    }
}

/// Package name of a PEP 508 requirement, e.g. `"flask>=2.0"` -> `"flask"`.
fn requirement_name(spec: &str) -> Option<String> {
    let end = spec
        .find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_' || c == '.'))
        .unwrap_or(spec.len());
    let name = spec[..end].trim();
    (!name.is_empty()).then(|| name.to_lowercase())
}

fn collect_python_entities(
    node: Node,
    source: &[u8],
    path: &Path,
    inside_class: bool,
    entities: &mut Vec<CodeEntity>,
) {
    match node.kind() {
        "decorated_definition" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "decorator" {
                    if let Some(name) = route_from_decorator(&node_text(&child, source)) {
                        entities.push(entity_from_node(
                            &node,
                            source,
                            path,
                            Language::Python,
                            name,
                            EntityKind::ApiEndpoint,
                            None,
                        ));
                    }
                }
            }
        }
        "function_definition" => {
            if let Some(name) = find_child_text(&node, "identifier", source) {
                let kind = if inside_class {
                    EntityKind::Method
                } else {
                    EntityKind::Function
                };
                let docstring = docstring(&node, source);
                entities.push(entity_from_node(
                    &node,
                    source,
                    path,
                    Language::Python,
                    name,
                    kind,
                    docstring,
                ));
            }
            // Nested definitions are plain functions.
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                collect_python_entities(child, source, path, false, entities);
            }
            return;
        }
        "class_definition" => {
            if let Some(name) = find_child_text(&node, "identifier", source) {
                let docstring = docstring(&node, source);
                entities.push(entity_from_node(
                    &node,
                    source,
                    path,
                    Language::Python,
                    name,
                    EntityKind::Class,
                    docstring,
                ));
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                collect_python_entities(child, source, path, true, entities);
            }
            return;
        }
        "import_statement" | "import_from_statement" => {
            for module in imported_modules(&node, source) {
                entities.push(entity_from_node(
                    &node,
                    source,
                    path,
                    Language::Python,
                    module,
                    EntityKind::Import,
                    None,
                ));
            }
            return;
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_python_entities(child, source, path, inside_class, entities);
    }
}

fn imported_modules(node: &Node, source: &[u8]) -> Vec<String> {
    if node.kind() == "import_from_statement" {
        return node
            .child_by_field_name("module_name")
            .map(|m| vec![node_text(&m, source)])
            .unwrap_or_default();
    }
    let mut modules = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" => modules.push(node_text(&child, source)),
            "aliased_import" => {
                if let Some(name) = find_child_text(&child, "dotted_name", source) {
                    modules.push(name);
                }
            }
            _ => {}
        }
    }
    modules
}

/// First statement of the body, if it is a bare string literal.
fn docstring(definition: &Node, source: &[u8]) -> Option<String> {
    let body = definition.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let literal = first.named_child(0)?;
    if literal.kind() != "string" {
        return None;
    }
    let text = unquote(&node_text(&literal, source));
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// `"@app.route('/x', methods=['POST'])"` -> `Some("POST /x")`.
fn route_from_decorator(decorator: &str) -> Option<String> {
    let caps = ROUTE_DECORATOR.captures(decorator.trim())?;
    let verb = caps.get(1)?.as_str();
    let route = caps.get(2)?.as_str();
    let rest = caps.get(3).map(|m| m.as_str()).unwrap_or_default();

    let methods = match verb {
        "route" | "api_route" => {
            let listed: Vec<String> = METHODS_ARG
                .captures(rest)
                .and_then(|m| m.get(1))
                .map(|list| {
                    QUOTED_WORD
                        .captures_iter(list.as_str())
                        .filter_map(|c| c.get(1))
                        .map(|w| w.as_str().to_uppercase())
                        .collect()
                })
                .unwrap_or_default();
            if listed.is_empty() {
                "GET".to_string()
            } else {
                listed.join("|")
            }
        }
        other => other.to_uppercase(),
    };
    Some(format!("{methods} {route}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SAMPLE: &str = r#"import os
from flask import Flask, request

app = Flask(__name__)

@app.route("/login", methods=["POST"])
def login():
    """Authenticate a user with a password."""
    user = request.form["user"]
    return check_password(user)

class UserRepository:
    """Stores users in the database."""

    def find(self, user_id):
        return db.query(user_id)

async def fetch():
    def helper():
        pass
    return helper
"#;

    fn analyze(source: &str) -> Vec<CodeEntity> {
        PythonAnalyzer
            .analyze_source(Path::new("app.py"), source)
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
    fn extracts_functions_classes_and_methods() {
        let entities = analyze(SAMPLE);
        assert_eq!(
            names_of(&entities, EntityKind::Function),
            vec!["login", "fetch", "helper"]
        );
        assert_eq!(names_of(&entities, EntityKind::Class), vec!["UserRepository"]);
        assert_eq!(names_of(&entities, EntityKind::Method), vec!["find"]);
    }

    #[test]
    fn extracts_imports() {
        let entities = analyze(SAMPLE);
        assert_eq!(names_of(&entities, EntityKind::Import), vec!["os", "flask"]);
    }

    #[test]
    fn route_decorator_becomes_endpoint() {
        let entities = analyze(SAMPLE);
        let endpoint = entities
            .iter()
            .find(|e| e.kind == EntityKind::ApiEndpoint)
            .unwrap();
        assert_eq!(endpoint.name, "POST /login");
        assert_eq!(endpoint.start_line, 6);
        assert!(endpoint.content.contains("def login"));
    }

    #[test]
    fn docstrings_and_lines() {
        let entities = analyze(SAMPLE);
        let login = entities.iter().find(|e| e.name == "login").unwrap();
        assert_eq!(
            login.docstring.as_deref(),
            Some("Authenticate a user with a password.")
        );
        assert_eq!(login.start_line, 7);
        assert_eq!(login.end_line, 10);
        assert_eq!(login.signature, "def login()");
        assert_eq!(login.file, PathBuf::from("app.py"));
        assert_eq!(login.language, "python");

        let repo = entities.iter().find(|e| e.name == "UserRepository").unwrap();
        assert_eq!(repo.docstring.as_deref(), Some("Stores users in the database."));
    }

    #[test]
    fn decorator_variants() {
        assert_eq!(
            route_from_decorator("@router.get('/items/{id}')").as_deref(),
            Some("GET /items/{id}")
        );
        assert_eq!(
            route_from_decorator("@bp.route(\"/a\")").as_deref(),
            Some("GET /a")
        );
        assert_eq!(
            route_from_decorator("@app.route('/b', methods=['GET', 'post'])").as_deref(),
            Some("GET|POST /b")
        );
        assert_eq!(route_from_decorator("@staticmethod"), None);
        assert_eq!(route_from_decorator("@functools.lru_cache(maxsize=2)"), None);
    }

    #[test]
    fn empty_file_has_no_entities() {
        assert!(analyze("").is_empty());
    }

    #[test]
    fn syntax_errors_give_partial_results() {
        let entities = analyze("def ok():\n    return 1\n\ndef broken(:\n");
        assert!(entities.iter().any(|e| e.name == "ok"));
    }

    #[test]
    fn dependencies_from_requirements_and_pyproject() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("requirements.txt"),
            "# web\nFlask>=2.0\nrequests[socks]==2.31\n-r dev.txt\n\nsqlalchemy ; python_version > '3.8'\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("pyproject.toml"),
            r#"
[project]
dependencies = ["pydantic>=2", "flask"]

[tool.poetry.dependencies]
python = "^3.11"
uvicorn = "*"
"#,
        )
        .unwrap();

        let deps = PythonAnalyzer.detect_dependencies(dir.path()).unwrap();
        assert_eq!(
            deps,
            vec!["flask", "pydantic", "requests", "sqlalchemy", "uvicorn"]
        );
    }

    #[test]
    fn no_manifests_means_no_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PythonAnalyzer.detect_dependencies(dir.path()).unwrap().is_empty());
    }
}
