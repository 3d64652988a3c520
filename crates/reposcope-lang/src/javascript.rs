//! JavaScript and TypeScript entity extraction.

use std::path::Path;

use reposcope_core::{CodeEntity, EntityKind, ScopeError};
use tree_sitter::Node;

use crate::analyzer::{
    child_has_kind, entity_from_node, find_child_text, node_text, normalize_dependencies, parse,
    unquote, Analyzer,
};
use crate::walker::Language;

/// HTTP verbs recognised on Express-style routers.
const ROUTE_METHODS: &[&str] = &["get", "post", "put", "patch", "delete", "all"];

/// Objects whose `.get('/x')` calls are outgoing requests, not routes.
const HTTP_CLIENTS: &[&str] = &[
    "axios",
    "http",
    "https",
    "fetch",
    "client",
    "api",
    "request",
    "superagent",
    "ky",
    "$http",
];

/// Node kinds accepted as the final route handler argument.
const HANDLER_KINDS: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "identifier",
    "member_expression",
    "call_expression",
];

/// Analyzer for `.js`, `.jsx`, `.mjs`, `.cjs`, `.ts` and `.tsx` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct JavaScriptAnalyzer;

impl Analyzer for JavaScriptAnalyzer {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn languages(&self) -> Vec<Language> {
        vec![Language::JavaScript, Language::TypeScript]
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["js", "jsx", "mjs", "cjs", "ts", "tsx"]
    }

    fn analyze_source(&self, path: &Path, source: &str) -> Result<Vec<CodeEntity>, ScopeError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("js");
        let (grammar, language): (tree_sitter::Language, _) = match ext {
            "ts" => (
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
                Language::TypeScript,
            ),
            "tsx" => (tree_sitter_typescript::LANGUAGE_TSX.into(), Language::TypeScript),
            _ => (tree_sitter_javascript::LANGUAGE.into(), Language::JavaScript),
        };
        let Some(tree) = parse(grammar, source)? else {
            return Ok(Vec::new());
        };
        let mut entities = Vec::new();
        collect_js_ts_entities(
            tree.root_node(),
            source.as_bytes(),
            path,
            language,
            false,
            &mut entities,
        );
        Ok(entities)
    }

    fn detect_dependencies(&self, repo_root: &Path) -> Result<Vec<String>, ScopeError> {
        let manifest = repo_root.join("package.json");
        if !manifest.is_file() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&manifest)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        let deps = ["dependencies", "devDependencies", "peerDependencies"]
            .iter()
            .filter_map(|section| value.get(section).and_then(|s| s.as_object()))
            .flat_map(|table| table.keys().cloned());
        Ok(normalize_dependencies(deps))
    }
}

fn collect_js_ts_entities(
    node: Node,
    source: &[u8],
    path: &Path,
    language: Language,
    inside_class: bool,
    entities: &mut Vec<CodeEntity>,
) {
    let push = |entities: &mut Vec<CodeEntity>, node: &Node, name: String, kind: EntityKind| {
        entities.push(entity_from_node(
            node, source, path, language, name, kind, None,
        ));
    };

    match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name) = find_child_text(&node, "identifier", source) {
                push(entities, &node, name, EntityKind::Function);
            }
        }
        "class_declaration" | "abstract_class_declaration" => {
            let name = find_child_text(&node, "type_identifier", source)
                .or_else(|| find_child_text(&node, "identifier", source));
            if let Some(name) = name {
                push(entities, &node, name, EntityKind::Class);
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                collect_js_ts_entities(child, source, path, language, true, entities);
            }
            return;
        }
        "method_definition" => {
            if let Some(name) = find_child_text(&node, "property_identifier", source) {
                let kind = if inside_class {
                    EntityKind::Method
                } else {
                    EntityKind::Function
                };
                push(entities, &node, name, kind);
            }
            // Bodies of methods are ordinary code again.
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                collect_js_ts_entities(child, source, path, language, false, entities);
            }
            return;
        }
        "interface_declaration" => {
            if let Some(name) = find_child_text(&node, "type_identifier", source) {
                push(entities, &node, name, EntityKind::Interface);
            }
            return;
        }
        "enum_declaration" => {
            if let Some(name) = find_child_text(&node, "identifier", source) {
                push(entities, &node, name, EntityKind::Enum);
            }
            return;
        }
        "lexical_declaration" | "variable_declaration" => {
            // const handler = () => {} / const handler = function () {}
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() != "variable_declarator" {
                    continue;
                }
                let is_function = child_has_kind(&child, "arrow_function")
                    || child_has_kind(&child, "function_expression")
                    || child_has_kind(&child, "function");
                if is_function {
                    if let Some(name) = find_child_text(&child, "identifier", source) {
                        push(entities, &node, name, EntityKind::Function);
                    }
                }
            }
        }
        "import_statement" => {
            if let Some(module) = node.child_by_field_name("source") {
                push(
                    entities,
                    &node,
                    unquote(&node_text(&module, source)),
                    EntityKind::Import,
                );
            }
            return;
        }
        "call_expression" => {
            if let Some(route) = express_route(&node, source) {
                push(entities, &node, route, EntityKind::ApiEndpoint);
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_js_ts_entities(child, source, path, language, inside_class, entities);
    }
}

/// `app.get('/users', handler)` -> `Some("GET /users")`.
fn express_route(call: &Node, source: &[u8]) -> Option<String> {
    let function = call.child_by_field_name("function")?;
    if function.kind() != "member_expression" {
        return None;
    }
    let object = function.child_by_field_name("object")?;
    if object.kind() != "identifier" || HTTP_CLIENTS.contains(&node_text(&object, source).as_str()) {
        return None;
    }
    let method = node_text(&function.child_by_field_name("property")?, source);
    if !ROUTE_METHODS.contains(&method.as_str()) {
        return None;
    }
    let arguments = call.child_by_field_name("arguments")?;
    // A route needs a handler after the path.
    let count = arguments.named_child_count();
    if count < 2 || !HANDLER_KINDS.contains(&arguments.named_child(count - 1)?.kind()) {
        return None;
    }
    let first = arguments.named_child(0)?;
    if !matches!(first.kind(), "string" | "template_string") {
        return None;
    }
    let route = unquote(&node_text(&first, source));
    if !route.starts_with('/') {
        return None;
    }
    Some(format!("{} {route}", method.to_uppercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(file: &str, source: &str) -> Vec<CodeEntity> {
        JavaScriptAnalyzer
            .analyze_source(Path::new(file), source)
            .unwrap()
    }

    fn names_of(entities: &[CodeEntity], kind: EntityKind) -> Vec<String> {
        entities
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.name.clone())
            .collect()
    }

    const EXPRESS: &str = r#"import express from 'express';
const db = require('./db');

const app = express();

app.get('/products/:id', async (req, res) => {
  res.json(await db.findProduct(req.params.id));
});

router.post("/login", authenticate);

function authenticate(req, res, next) {
  next();
}

const hashPassword = (pw) => pw.split('').reverse().join('');

class ProductStore {
  constructor(pool) {
    this.pool = pool;
  }

  find(id) {
    return this.pool.query('SELECT * FROM products WHERE id = $1', [id]);
  }
}

cache.get('key');
"#;

    #[test]
    fn javascript_entities() {
        let entities = analyze("server.js", EXPRESS);
        assert_eq!(
            names_of(&entities, EntityKind::Function),
            vec!["authenticate", "hashPassword"]
        );
        assert_eq!(names_of(&entities, EntityKind::Class), vec!["ProductStore"]);
        assert_eq!(
            names_of(&entities, EntityKind::Method),
            vec!["constructor", "find"]
        );
        assert_eq!(names_of(&entities, EntityKind::Import), vec!["express"]);
        assert!(entities.iter().all(|e| e.language == "javascript"));
    }

    #[test]
    fn express_calls_become_endpoints() {
        let entities = analyze("server.js", EXPRESS);
        assert_eq!(
            names_of(&entities, EntityKind::ApiEndpoint),
            vec!["GET /products/:id", "POST /login"]
        );
        let get = entities
            .iter()
            .find(|e| e.name == "GET /products/:id")
            .unwrap();
        assert_eq!(get.start_line, 6);
        assert_eq!(get.end_line, 8);
    }

    #[test]
    fn http_client_calls_are_not_endpoints() {
        let source = r#"import axios from 'axios';

export async function loadUsers() {
  const users = await axios.get('/api/users');
  const one = await client.get('/api/users/1', handler);
  const cached = cache.get('/api/cache');
  const withOptions = await session.post('/api/login', { user: 'a' });
  return [users, one, cached, withOptions];
}

router.get('/health', (req, res) => res.send('ok'));
router.delete('/items/:id', requireAdmin, controller.remove);
"#;
        let entities = analyze("src/client.js", source);
        assert_eq!(
            names_of(&entities, EntityKind::ApiEndpoint),
            vec!["GET /health", "DELETE /items/:id"]
        );
    }

    #[test]
    fn typescript_entities() {
        let source = r#"
export interface User {
  id: number;
  email: string;
}

export enum Role { Admin, Member }

export class AuthService {
  private readonly secret: string;

  async login(email: string, password: string): Promise<User> {
    return verify(email, password);
  }
}

export function verify(email: string, password: string): User {
  return { id: 1, email };
}
"#;
        let entities = analyze("auth.ts", source);
        assert_eq!(names_of(&entities, EntityKind::Interface), vec!["User"]);
        assert_eq!(names_of(&entities, EntityKind::Enum), vec!["Role"]);
        assert_eq!(names_of(&entities, EntityKind::Class), vec!["AuthService"]);
        assert_eq!(names_of(&entities, EntityKind::Method), vec!["login"]);
        assert_eq!(names_of(&entities, EntityKind::Function), vec!["verify"]);
        assert!(entities.iter().all(|e| e.language == "typescript"));

        let verify = entities.iter().find(|e| e.name == "verify").unwrap();
        assert_eq!(
            verify.signature,
            "function verify(email: string, password: string): User"
        );
    }

    #[test]
    fn tsx_components_parse() {
        let source = "export const Button = () => <button>Go</button>;\n";
        let entities = analyze("Button.tsx", source);
        assert_eq!(names_of(&entities, EntityKind::Function), vec!["Button"]);
    }

    #[test]
    fn dependencies_from_package_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name":"shop","dependencies":{"express":"^4","pg":"^8"},"devDependencies":{"jest":"^29","express":"^4"}}"#,
        )
        .unwrap();
        let deps = JavaScriptAnalyzer.detect_dependencies(dir.path()).unwrap();
        assert_eq!(deps, vec!["express", "jest", "pg"]);
    }

    #[test]
    fn invalid_package_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{not json").unwrap();
        assert!(matches!(
            JavaScriptAnalyzer.detect_dependencies(dir.path()),
            Err(ScopeError::Serialization(_))
        ));
    }
}
