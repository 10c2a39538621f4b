//! Document loading: fetch, parse, dereference, normalize.
//!
//! The loader turns a URL or file into an [`ApiDocument`] plus a
//! [`SchemaGraph`]. Local `#/…` pointers are resolved while building the
//! arena; a pointer that is already being built reuses its reserved id, so
//! self-referential schemas come out as id cycles instead of infinite
//! recursion.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use serde_json::Value;
use tracing::{debug, info};

use crate::document::{
    ApiDocument, Method, OperationSpec, ParamLocation, ParameterSpec, PathItem, RequestBodySpec,
    SpecVersion, normalize_path,
};
use crate::error::SpecLoadError;
use crate::graph::{NodeId, PrimitiveKind, SchemaGraph, SchemaNode};

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecSource {
    Url(String),
    Path(PathBuf),
}

impl SpecSource {
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::Url(value.to_string())
        } else {
            Self::Path(PathBuf::from(value))
        }
    }
}

impl fmt::Display for SpecSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Path(path) => f.write_str(&path.to_string_lossy()),
        }
    }
}

/// A fully loaded and normalized document.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSpec {
    pub document: ApiDocument,
    pub graph: SchemaGraph,
}

/// Fetches, parses and dereferences a document, then runs the normalization
/// walk over every schema in the arena.
pub async fn load(source: &SpecSource) -> Result<LoadedSpec, SpecLoadError> {
    let source_name = source.to_string();
    let text = match source {
        SpecSource::Url(url) => fetch(url, &source_name).await?,
        SpecSource::Path(path) => {
            std::fs::read_to_string(path).map_err(|e| SpecLoadError::Read {
                source_name: source_name.clone(),
                source: e,
            })?
        }
    };
    let value = parse_text(&text, &source_name)?;
    let spec = build(&value, &source_name)?;
    info!(
        source = %source_name,
        paths = spec.document.paths.len(),
        nodes = spec.graph.len(),
        "loaded document"
    );
    Ok(spec)
}

async fn fetch(url: &str, source_name: &str) -> Result<String, SpecLoadError> {
    let map = |e: reqwest::Error| SpecLoadError::Fetch {
        source_name: source_name.to_string(),
        source: e,
    };
    let response = reqwest::get(url).await.map_err(map)?;
    let response = response.error_for_status().map_err(map)?;
    response.text().await.map_err(map)
}

/// Parses JSON, falling back to YAML.
fn parse_text(text: &str, source_name: &str) -> Result<Value, SpecLoadError> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(_) => {
            serde_yaml::from_str::<Value>(text).map_err(|e| SpecLoadError::InvalidDocument {
                source_name: source_name.to_string(),
                detail: e.to_string(),
            })
        }
    }
}

pub(crate) fn build(root: &Value, source_name: &str) -> Result<LoadedSpec, SpecLoadError> {
    let (version, base_path) = detect_version(root, source_name)?;
    let mut builder = Dereferencer {
        root,
        source_name,
        graph: SchemaGraph::new(),
        refs: HashMap::new(),
    };

    let mut paths = BTreeMap::new();
    if let Some(raw_paths) = root.get("paths").and_then(Value::as_object) {
        for (raw_path, item) in raw_paths {
            if raw_path.starts_with("x-") {
                continue;
            }
            let item = builder.resolve(item)?;
            paths.insert(normalize_path(raw_path), builder.path_item(item, version)?);
        }
    }

    let mut graph = builder.graph;
    let roots: Vec<NodeId> = (0..graph.len()).map(NodeId).collect();
    graph.normalize(&roots);
    debug!(version = ?version, base = %base_path, "document dereferenced");

    Ok(LoadedSpec {
        document: ApiDocument {
            version,
            base_path,
            paths,
        },
        graph,
    })
}

fn detect_version(root: &Value, source_name: &str) -> Result<(SpecVersion, String), SpecLoadError> {
    if let Some(swagger) = root.get("swagger").and_then(Value::as_str) {
        if swagger.starts_with('2') {
            let base = root
                .get("basePath")
                .and_then(Value::as_str)
                .unwrap_or("/")
                .to_string();
            return Ok((SpecVersion::V2, normalize_path(&base)));
        }
    }
    if let Some(openapi) = root.get("openapi").and_then(Value::as_str) {
        if openapi.starts_with('3') {
            return Ok((SpecVersion::V3, "/".to_string()));
        }
    }
    Err(SpecLoadError::UnsupportedVersion {
        source_name: source_name.to_string(),
    })
}

struct Dereferencer<'a> {
    root: &'a Value,
    source_name: &'a str,
    graph: SchemaGraph,
    /// Pointer → arena slot, populated before the target finishes building.
    refs: HashMap<String, NodeId>,
}

impl<'a> Dereferencer<'a> {
    fn unresolved(&self, pointer: &str) -> SpecLoadError {
        SpecLoadError::UnresolvedRef {
            source_name: self.source_name.to_string(),
            pointer: pointer.to_string(),
        }
    }

    fn pointer_target(&self, reference: &str) -> Result<&'a Value, SpecLoadError> {
        let pointer = reference.strip_prefix('#').unwrap_or(reference);
        self.root
            .pointer(pointer)
            .ok_or_else(|| self.unresolved(reference))
    }

    /// Follows `$ref` chains on non-schema objects (path items, parameters,
    /// responses). Chains revisiting a pointer are unresolvable.
    fn resolve(&self, value: &'a Value) -> Result<&'a Value, SpecLoadError> {
        let mut current = value;
        let mut seen = HashSet::new();
        while let Some(reference) = current.get("$ref").and_then(Value::as_str) {
            if !seen.insert(reference.to_string()) {
                return Err(self.unresolved(reference));
            }
            current = self.pointer_target(reference)?;
        }
        Ok(current)
    }

    /// Builds a schema value into the arena and returns its id.
    fn schema(&mut self, value: &'a Value) -> Result<NodeId, SpecLoadError> {
        if let Some(reference) = value.get("$ref").and_then(Value::as_str) {
            if let Some(id) = self.refs.get(reference) {
                return Ok(*id);
            }
            let id = self.graph.reserve();
            self.refs.insert(reference.to_string(), id);
            let target = self.pointer_target(reference)?;
            let node = self.schema_node(target)?;
            self.graph.set(id, node);
            return Ok(id);
        }
        let node = self.schema_node(value)?;
        Ok(self.graph.push(node))
    }

    fn schema_node(&mut self, value: &'a Value) -> Result<SchemaNode, SpecLoadError> {
        if let Some(members) = value.get("allOf").and_then(Value::as_array) {
            let members = self.member_ids(members)?;
            return Ok(SchemaNode::AllOf { members });
        }
        for keyword in ["anyOf", "oneOf"] {
            if let Some(members) = value.get(keyword).and_then(Value::as_array) {
                let members = self.member_ids(members)?;
                return Ok(SchemaNode::Union { members });
            }
        }

        let type_field = value.get("type");
        if let Some(types) = type_field.and_then(Value::as_array) {
            // JSON Schema style multi-type, e.g. ["string", "null"].
            let mut members = Vec::new();
            for ty in types {
                let kind = ty
                    .as_str()
                    .and_then(primitive_kind)
                    .unwrap_or(PrimitiveKind::Null);
                members.push(self.graph.push(SchemaNode::primitive(kind)));
            }
            return Ok(SchemaNode::Union { members });
        }

        let type_name = type_field.and_then(Value::as_str);
        if type_name == Some("array") {
            let items = match value.get("items") {
                Some(items) => self.schema(items)?,
                None => self.graph.push(SchemaNode::empty_object()),
            };
            return Ok(SchemaNode::Array { items });
        }
        if let Some(kind) = type_name.and_then(primitive_kind) {
            return Ok(SchemaNode::Primitive {
                kind,
                format: value
                    .get("format")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                annotation: None,
            });
        }

        // "object", or untyped: everything else is an object shape.
        let mut properties = BTreeMap::new();
        if let Some(props) = value.get("properties").and_then(Value::as_object) {
            for (name, prop) in props {
                properties.insert(name.clone(), self.schema(prop)?);
            }
        }
        let required: BTreeSet<String> = value
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let additional_properties = match value.get("additionalProperties") {
            Some(Value::Bool(flag)) => Some(*flag),
            Some(Value::Object(_)) => Some(true),
            _ => None,
        };
        let title = value
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(SchemaNode::Object {
            properties,
            required,
            additional_properties,
            title,
        })
    }

    fn member_ids(&mut self, members: &'a [Value]) -> Result<Vec<NodeId>, SpecLoadError> {
        members.iter().map(|m| self.schema(m)).collect()
    }

    fn path_item(&mut self, item: &'a Value, version: SpecVersion) -> Result<PathItem, SpecLoadError> {
        let parameters = self.parameters(item.get("parameters"))?;
        let mut operations = BTreeMap::new();
        for method in Method::ALL {
            if let Some(op) = item.get(method.as_str()) {
                let op = self.resolve(op)?;
                operations.insert(method, self.operation(op, version)?);
            }
        }
        Ok(PathItem {
            parameters,
            operations,
        })
    }

    fn parameters(
        &mut self,
        value: Option<&'a Value>,
    ) -> Result<Vec<ParameterSpec>, SpecLoadError> {
        let Some(list) = value.and_then(Value::as_array) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for param in list {
            let param = self.resolve(param)?;
            let location = param
                .get("in")
                .and_then(Value::as_str)
                .map(ParamLocation::parse)
                .unwrap_or(ParamLocation::Query);
            let schema = if let Some(schema) = param.get("schema") {
                Some(self.schema(schema)?)
            } else if param.get("type").is_some() {
                // Swagger v2 non-body parameters describe themselves inline.
                Some(self.schema(param)?)
            } else {
                None
            };
            out.push(ParameterSpec {
                name: param
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                location,
                required: param
                    .get("required")
                    .and_then(Value::as_bool)
                    .unwrap_or(location == ParamLocation::Path),
                schema,
            });
        }
        Ok(out)
    }

    fn operation(
        &mut self,
        op: &'a Value,
        version: SpecVersion,
    ) -> Result<OperationSpec, SpecLoadError> {
        let parameters = self.parameters(op.get("parameters"))?;
        let request_body = match op.get("requestBody") {
            Some(body) => {
                let body = self.resolve(body)?;
                Some(self.request_body(body)?)
            }
            None => None,
        };

        let mut responses = BTreeMap::new();
        if let Some(raw) = op.get("responses").and_then(Value::as_object) {
            for (status, response) in raw {
                if status.starts_with("x-") {
                    continue;
                }
                let response = self.resolve(response)?;
                let schema = match version {
                    SpecVersion::V3 => response
                        .get("content")
                        .and_then(|c| c.get("application/json"))
                        .and_then(|m| m.get("schema")),
                    SpecVersion::V2 => response.get("schema"),
                };
                let schema = match schema {
                    Some(schema) => Some(self.schema(schema)?),
                    None => None,
                };
                responses.insert(status.clone(), schema);
            }
        }

        Ok(OperationSpec {
            parameters,
            request_body,
            responses,
        })
    }

    fn request_body(&mut self, body: &'a Value) -> Result<RequestBodySpec, SpecLoadError> {
        let content = body.get("content").and_then(Value::as_object);
        let multipart = content.is_some_and(|c| c.contains_key("multipart/form-data"));
        let schema_value = content.and_then(|c| {
            c.get("application/json")
                .or_else(|| c.get("multipart/form-data"))
                .and_then(|m| m.get("schema"))
        });
        let schema = match schema_value {
            Some(schema) => Some(self.schema(schema)?),
            None => None,
        };
        Ok(RequestBodySpec { schema, multipart })
    }
}

fn primitive_kind(name: &str) -> Option<PrimitiveKind> {
    match name {
        "string" => Some(PrimitiveKind::String),
        "number" => Some(PrimitiveKind::Number),
        "integer" => Some(PrimitiveKind::Integer),
        "boolean" => Some(PrimitiveKind::Boolean),
        "null" => Some(PrimitiveKind::Null),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::document::OperationKey;

    fn load_json(text: &str) -> LoadedSpec {
        let value: Value = serde_json::from_str(text).unwrap();
        build(&value, "test").unwrap()
    }

    #[test]
    fn loads_v2_document_with_base_path() {
        let spec = load_json(
            r#"{
                "swagger": "2.0",
                "basePath": "/api/v1",
                "paths": {
                    "/items/{id}": {
                        "get": {
                            "parameters": [
                                { "name": "id", "in": "path", "required": true, "type": "integer" }
                            ],
                            "responses": {
                                "200": { "schema": { "type": "object" } }
                            }
                        }
                    },
                    "x-hidden": {}
                }
            }"#,
        );
        assert_eq!(spec.document.version, SpecVersion::V2);
        assert_eq!(spec.document.base_path, "/api/v1");
        assert_eq!(spec.document.paths.len(), 1);
        let key = OperationKey::new("/items/{id}", Method::Get, "/");
        assert!(spec.document.has_operation(&key, "/"));
    }

    #[test]
    fn loads_v3_request_body_and_marks_multipart() {
        let spec = load_json(
            r#"{
                "openapi": "3.0.1",
                "paths": {
                    "/upload": {
                        "post": {
                            "requestBody": {
                                "content": {
                                    "multipart/form-data": {
                                        "schema": {
                                            "type": "object",
                                            "properties": { "file": { "type": "string", "format": "binary" } }
                                        }
                                    }
                                }
                            },
                            "responses": {}
                        }
                    }
                }
            }"#,
        );
        let op = &spec.document.paths["/upload"].operations[&Method::Post];
        let body = op.request_body.expect("request body");
        assert!(body.multipart);
        assert!(body.schema.is_some());
    }

    #[test]
    fn resolves_refs_and_tolerates_cycles() {
        let spec = load_json(
            r##"{
                "openapi": "3.0.1",
                "components": {
                    "schemas": {
                        "Node": {
                            "type": "object",
                            "properties": {
                                "children": { "type": "array", "items": { "$ref": "#/components/schemas/Node" } }
                            }
                        }
                    }
                },
                "paths": {
                    "/tree": {
                        "get": {
                            "responses": {
                                "200": {
                                    "content": {
                                        "application/json": { "schema": { "$ref": "#/components/schemas/Node" } }
                                    }
                                }
                            }
                        }
                    }
                }
            }"##,
        );
        let op = &spec.document.paths["/tree"].operations[&Method::Get];
        let root = op.responses["200"].expect("schema");
        // The cycle serializes to a finite value.
        let json = spec.graph.to_json(root);
        assert_eq!(json["type"], "object");
    }

    #[test]
    fn unresolved_ref_is_an_error() {
        let value: Value = serde_json::from_str(
            r##"{
                "openapi": "3.0.1",
                "paths": {
                    "/x": {
                        "get": {
                            "responses": {
                                "200": {
                                    "content": {
                                        "application/json": { "schema": { "$ref": "#/components/schemas/Missing" } }
                                    }
                                }
                            }
                        }
                    }
                }
            }"##,
        )
        .unwrap();
        let err = build(&value, "test").unwrap_err();
        assert!(matches!(err, SpecLoadError::UnresolvedRef { .. }));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let value: Value = serde_json::from_str(r#"{ "swagger": "1.2", "paths": {} }"#).unwrap();
        assert!(matches!(
            build(&value, "test").unwrap_err(),
            SpecLoadError::UnsupportedVersion { .. }
        ));
    }

    #[test]
    fn yaml_documents_parse_too() {
        let value = parse_text("openapi: '3.0.1'\npaths: {}\n", "test").unwrap();
        assert_eq!(value["openapi"], "3.0.1");
    }

    #[tokio::test]
    async fn fetches_remote_documents() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openapi.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{ "openapi": "3.0.1", "paths": {} }"#),
            )
            .mount(&server)
            .await;

        let source = SpecSource::parse(&format!("{}/openapi.json", server.uri()));
        let spec = load(&source).await.unwrap();
        assert_eq!(spec.document.version, SpecVersion::V3);
    }
}
