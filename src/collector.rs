//! Per-operation schema collection.
//!
//! Folds an operation's scattered parameter declarations into one canonical
//! [`ParameterSet`]: four optional body-site schemas plus a response map,
//! all living in the shared graph.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::debug;

use crate::document::{
    ApiDocument, OperationKey, ParamLocation, ParameterSpec, SpecVersion, path_placeholders,
};
use crate::error::CollectError;
use crate::graph::{NodeId, PrimitiveKind, SchemaGraph, SchemaNode};

/// Canonical collected shape of one operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    pub path: Option<NodeId>,
    pub query: Option<NodeId>,
    pub header: Option<NodeId>,
    pub body: Option<NodeId>,
    /// The body is submitted as `multipart/form-data`.
    pub form_data: bool,
    /// JSON response schema per numeric status code.
    pub responses: BTreeMap<u16, NodeId>,
}

impl ParameterSet {
    pub fn slots(&self) -> [(Slot, Option<NodeId>); 4] {
        [
            (Slot::Path, self.path),
            (Slot::Query, self.query),
            (Slot::Header, self.header),
            (Slot::Body, self.body),
        ]
    }

    pub fn has_parameters(&self) -> bool {
        self.slots().iter().any(|(_, id)| id.is_some())
    }
}

/// The four parameter slots of a [`ParameterSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Path,
    Query,
    Header,
    Body,
}

impl Slot {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Body => "body",
        }
    }
}

/// Collects the canonical parameter set for `key`.
pub fn collect(
    document: &ApiDocument,
    graph: &mut SchemaGraph,
    key: &OperationKey,
    base_url: &str,
) -> Result<ParameterSet, CollectError> {
    let (raw_path, item) = document
        .find_path(&key.path, base_url)
        .ok_or_else(|| CollectError::UnknownOperation {
            key: key.to_string(),
        })?;
    let raw_path = raw_path.to_string();
    let op = item
        .operations
        .get(&key.method)
        .ok_or_else(|| CollectError::UnknownOperation {
            key: key.to_string(),
        })?;

    // Operation-level parameters override path-item ones by name + location.
    let mut merged: Vec<ParameterSpec> = item.parameters.clone();
    for param in &op.parameters {
        merged.retain(|p| !(p.name == param.name && p.location == param.location));
        merged.push(param.clone());
    }

    let mut set = ParameterSet::default();
    for param in &merged {
        match param.location {
            ParamLocation::Cookie => continue,
            ParamLocation::Body => {
                set.body = param.schema;
            }
            ParamLocation::FormData => {
                set.form_data = true;
                add_slot_property(graph, &mut set.body, param);
            }
            ParamLocation::Path => add_slot_property(graph, &mut set.path, param),
            ParamLocation::Query => add_slot_property(graph, &mut set.query, param),
            ParamLocation::Header => add_slot_property(graph, &mut set.header, param),
        }
    }

    if let Some(body) = op.request_body {
        if body.multipart {
            set.form_data = true;
        }
        if body.schema.is_some() {
            set.body = body.schema;
        }
    }
    for slot in [&mut set.path, &mut set.query, &mut set.header, &mut set.body] {
        if let Some(id) = *slot {
            *slot = Some(collapse_all_of(graph, id));
        }
    }
    if !key.method.admits_body() {
        set.body = None;
        set.form_data = false;
    }

    restrict_path_slot(graph, &mut set.path, &raw_path);
    coerce_to_string(graph, set.path);
    coerce_to_string(graph, set.header);
    widen_query_numbers(graph, set.query);

    for (status, schema) in &op.responses {
        let Ok(code) = status.parse::<u16>() else {
            continue;
        };
        if let Some(schema) = schema {
            let schema = collapse_all_of(graph, *schema);
            set.responses.insert(code, schema);
        }
    }

    debug!(key = %key, responses = set.responses.len(), "collected operation");
    Ok(set)
}

/// Whether the operation submits its body as `multipart/form-data`.
pub fn has_form_data(document: &ApiDocument, key: &OperationKey, base_url: &str) -> bool {
    let Some((_, item)) = document.find_path(&key.path, base_url) else {
        return false;
    };
    let Some(op) = item.operations.get(&key.method) else {
        return false;
    };
    match document.version {
        SpecVersion::V3 => op.request_body.is_some_and(|b| b.multipart),
        SpecVersion::V2 => item
            .parameters
            .iter()
            .chain(op.parameters.iter())
            .any(|p| p.location == ParamLocation::FormData),
    }
}

fn add_slot_property(graph: &mut SchemaGraph, slot: &mut Option<NodeId>, param: &ParameterSpec) {
    let slot_id = *slot.get_or_insert_with(|| {
        graph.push(SchemaNode::Object {
            properties: BTreeMap::new(),
            required: BTreeSet::new(),
            additional_properties: Some(false),
            title: None,
        })
    });
    let schema = param
        .schema
        .unwrap_or_else(|| graph.push(SchemaNode::primitive(PrimitiveKind::String)));
    if let SchemaNode::Object {
        properties,
        required,
        ..
    } = graph.node_mut(slot_id)
    {
        properties.insert(param.name.clone(), schema);
        if param.required {
            required.insert(param.name.clone());
        }
    }
}

/// Keeps only properties named by the url template's placeholders; a slot
/// left without properties is dropped.
fn restrict_path_slot(graph: &mut SchemaGraph, slot: &mut Option<NodeId>, raw_path: &str) {
    let Some(id) = *slot else {
        return;
    };
    let placeholders: BTreeSet<String> = path_placeholders(raw_path).into_iter().collect();
    let mut emptied = false;
    if let SchemaNode::Object {
        properties,
        required,
        ..
    } = graph.node_mut(id)
    {
        properties.retain(|name, _| placeholders.contains(name));
        required.retain(|name| placeholders.contains(name));
        emptied = properties.is_empty();
    }
    if emptied {
        *slot = None;
    }
}

/// Path and header values travel inside the url line; numeric declarations
/// become strings carrying a note about the source type.
fn coerce_to_string(graph: &mut SchemaGraph, slot: Option<NodeId>) {
    for (name, prop) in slot_properties(graph, slot) {
        if let Some(note) = numeric_note(graph, prop) {
            let coerced = graph.push(SchemaNode::Primitive {
                kind: PrimitiveKind::String,
                format: None,
                annotation: Some(note),
            });
            repoint_property(graph, slot, &name, coerced);
        }
    }
}

/// Query values may arrive pre-rendered; numeric declarations widen to
/// `number | string`.
fn widen_query_numbers(graph: &mut SchemaGraph, slot: Option<NodeId>) {
    for (name, prop) in slot_properties(graph, slot) {
        if numeric_note(graph, prop).is_some() {
            let rendered = graph.push(SchemaNode::primitive(PrimitiveKind::String));
            let widened = graph.push(SchemaNode::Union {
                members: vec![prop, rendered],
            });
            repoint_property(graph, slot, &name, widened);
        }
    }
}

fn slot_properties(graph: &SchemaGraph, slot: Option<NodeId>) -> Vec<(String, NodeId)> {
    match slot.map(|id| graph.node(id)) {
        Some(SchemaNode::Object { properties, .. }) => properties
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect(),
        _ => Vec::new(),
    }
}

fn repoint_property(graph: &mut SchemaGraph, slot: Option<NodeId>, name: &str, target: NodeId) {
    if let Some(SchemaNode::Object { properties, .. }) = slot.map(|id| graph.node_mut(id)) {
        properties.insert(name.to_string(), target);
    }
}

fn numeric_note(graph: &SchemaGraph, id: NodeId) -> Option<String> {
    match graph.node(id) {
        SchemaNode::Primitive { kind, format, .. } if kind.is_numeric() => Some(match format {
            Some(format) => format!("originally {}({format})", kind.as_str()),
            None => format!("originally {}", kind.as_str()),
        }),
        _ => None,
    }
}

/// Collapses every transient `AllOf` reachable from `id` into a plain
/// object: property union, required union. The walk descends through
/// object properties, array items and union members, so an `allOf` nested
/// inside another schema collapses too. Mixed-shape members degrade to a
/// `Union`.
pub fn collapse_all_of(graph: &mut SchemaGraph, id: NodeId) -> NodeId {
    let mut visiting = HashSet::new();
    collapse_inner(graph, id, &mut visiting)
}

fn collapse_inner(graph: &mut SchemaGraph, id: NodeId, visiting: &mut HashSet<NodeId>) -> NodeId {
    if !visiting.insert(id) {
        return id;
    }
    let out = match graph.node(id) {
        SchemaNode::AllOf { members } => {
            let members = members.clone();
            let resolved: Vec<NodeId> = members
                .iter()
                .map(|m| collapse_inner(graph, *m, visiting))
                .collect();
            merge_members(graph, resolved)
        }
        SchemaNode::Object { properties, .. } => {
            let props: Vec<(String, NodeId)> = properties
                .iter()
                .map(|(name, prop)| (name.clone(), *prop))
                .collect();
            for (name, prop) in props {
                let collapsed = collapse_inner(graph, prop, visiting);
                if collapsed != prop {
                    if let SchemaNode::Object { properties, .. } = graph.node_mut(id) {
                        properties.insert(name, collapsed);
                    }
                }
            }
            id
        }
        SchemaNode::Array { items } => {
            let items = *items;
            let collapsed = collapse_inner(graph, items, visiting);
            if collapsed != items {
                if let SchemaNode::Array { items } = graph.node_mut(id) {
                    *items = collapsed;
                }
            }
            id
        }
        SchemaNode::Union { members } => {
            let members = members.clone();
            let mut changed = false;
            let resolved: Vec<NodeId> = members
                .iter()
                .map(|m| {
                    let collapsed = collapse_inner(graph, *m, visiting);
                    changed |= collapsed != *m;
                    collapsed
                })
                .collect();
            if changed {
                if let SchemaNode::Union { members } = graph.node_mut(id) {
                    *members = resolved;
                }
            }
            id
        }
        _ => id,
    };
    visiting.remove(&id);
    out
}

fn merge_members(graph: &mut SchemaGraph, resolved: Vec<NodeId>) -> NodeId {
    let mut properties = BTreeMap::new();
    let mut required = BTreeSet::new();
    let mut additional = false;
    for member in &resolved {
        match graph.node(*member) {
            SchemaNode::Object {
                properties: p,
                required: r,
                additional_properties,
                ..
            } => {
                for (name, prop) in p {
                    properties.insert(name.clone(), *prop);
                }
                required.extend(r.iter().cloned());
                additional |= *additional_properties == Some(true);
            }
            _ => {
                return graph.push(SchemaNode::Union { members: resolved });
            }
        }
    }
    graph.push(SchemaNode::Object {
        properties,
        required,
        additional_properties: Some(additional),
        title: None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::document::Method;
    use crate::loader::LoadedSpec;

    fn load(text: &str) -> LoadedSpec {
        let value: serde_json::Value = serde_json::from_str(text).unwrap();
        crate::loader::build(&value, "test").unwrap()
    }

    fn object_parts(
        graph: &SchemaGraph,
        id: NodeId,
    ) -> (&BTreeMap<String, NodeId>, &BTreeSet<String>) {
        match graph.node(id) {
            SchemaNode::Object {
                properties,
                required,
                ..
            } => (properties, required),
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn merges_path_and_operation_parameters_with_override() {
        let mut spec = load(
            r#"{
                "swagger": "2.0",
                "paths": {
                    "/items": {
                        "parameters": [
                            { "name": "limit", "in": "query", "type": "integer" },
                            { "name": "offset", "in": "query", "type": "integer" }
                        ],
                        "get": {
                            "parameters": [
                                { "name": "limit", "in": "query", "required": true, "type": "string" }
                            ],
                            "responses": {}
                        }
                    }
                }
            }"#,
        );
        let key = OperationKey::new("/items", Method::Get, "/");
        let set = collect(&spec.document, &mut spec.graph, &key, "/").unwrap();
        let (props, required) = object_parts(&spec.graph, set.query.unwrap());
        assert_eq!(props.len(), 2);
        assert!(required.contains("limit"));
        // The override replaced the path-level integer with a plain string.
        match spec.graph.node(props["limit"]) {
            SchemaNode::Primitive { kind, .. } => assert_eq!(*kind, PrimitiveKind::String),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn numeric_path_property_becomes_annotated_string() {
        let mut spec = load(
            r#"{
                "swagger": "2.0",
                "paths": {
                    "/items/{id}": {
                        "get": {
                            "parameters": [
                                { "name": "id", "in": "path", "required": true, "type": "integer", "format": "int64" }
                            ],
                            "responses": {}
                        }
                    }
                }
            }"#,
        );
        let key = OperationKey::new("/items/{id}", Method::Get, "/");
        let set = collect(&spec.document, &mut spec.graph, &key, "/").unwrap();
        let (props, _) = object_parts(&spec.graph, set.path.unwrap());
        match spec.graph.node(props["id"]) {
            SchemaNode::Primitive {
                kind, annotation, ..
            } => {
                assert_eq!(*kind, PrimitiveKind::String);
                let note = annotation.as_deref().unwrap();
                assert!(!note.is_empty());
                assert!(note.contains("integer"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn numeric_query_property_widens_to_union() {
        let mut spec = load(
            r#"{
                "swagger": "2.0",
                "paths": {
                    "/items": {
                        "get": {
                            "parameters": [
                                { "name": "page", "in": "query", "type": "integer" }
                            ],
                            "responses": {}
                        }
                    }
                }
            }"#,
        );
        let key = OperationKey::new("/items", Method::Get, "/");
        let set = collect(&spec.document, &mut spec.graph, &key, "/").unwrap();
        let (props, _) = object_parts(&spec.graph, set.query.unwrap());
        match spec.graph.node(props["page"]) {
            SchemaNode::Union { members } => {
                assert_eq!(members.len(), 2);
                let kinds: Vec<PrimitiveKind> = members
                    .iter()
                    .map(|m| match spec.graph.node(*m) {
                        SchemaNode::Primitive { kind, .. } => *kind,
                        other => panic!("unexpected member: {other:?}"),
                    })
                    .collect();
                assert!(kinds.contains(&PrimitiveKind::Integer));
                assert!(kinds.contains(&PrimitiveKind::String));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn form_data_parameters_fold_into_body() {
        let mut spec = load(
            r#"{
                "swagger": "2.0",
                "paths": {
                    "/upload": {
                        "post": {
                            "parameters": [
                                { "name": "file", "in": "formData", "required": true, "type": "string" },
                                { "name": "label", "in": "formData", "type": "string" }
                            ],
                            "responses": {}
                        }
                    }
                }
            }"#,
        );
        let key = OperationKey::new("/upload", Method::Post, "/");
        let set = collect(&spec.document, &mut spec.graph, &key, "/").unwrap();
        assert!(set.form_data);
        let (props, required) = object_parts(&spec.graph, set.body.unwrap());
        assert_eq!(props.len(), 2);
        assert!(required.contains("file"));
        assert!(!required.contains("label"));
        assert!(has_form_data(&spec.document, &key, "/"));
    }

    #[test]
    fn v3_all_of_body_collapses_to_one_object() {
        let mut spec = load(
            r##"{
                "openapi": "3.0.1",
                "components": {
                    "schemas": {
                        "Base": {
                            "type": "object",
                            "properties": { "id": { "type": "string" } },
                            "required": ["id"]
                        }
                    }
                },
                "paths": {
                    "/items": {
                        "post": {
                            "requestBody": {
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "allOf": [
                                                { "$ref": "#/components/schemas/Base" },
                                                {
                                                    "type": "object",
                                                    "properties": { "name": { "type": "string" } },
                                                    "required": ["name"]
                                                }
                                            ]
                                        }
                                    }
                                }
                            },
                            "responses": {}
                        }
                    }
                }
            }"##,
        );
        let key = OperationKey::new("/items", Method::Post, "/");
        let set = collect(&spec.document, &mut spec.graph, &key, "/").unwrap();
        let (props, required) = object_parts(&spec.graph, set.body.unwrap());
        assert_eq!(props.len(), 2);
        assert!(required.contains("id") && required.contains("name"));
    }

    #[test]
    fn all_of_nested_inside_a_body_property_collapses_too() {
        let mut spec = load(
            r##"{
                "openapi": "3.0.1",
                "components": {
                    "schemas": {
                        "Base": {
                            "type": "object",
                            "properties": { "id": { "type": "string" } },
                            "required": ["id"]
                        }
                    }
                },
                "paths": {
                    "/items": {
                        "post": {
                            "requestBody": {
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "properties": {
                                                "inner": {
                                                    "allOf": [
                                                        { "$ref": "#/components/schemas/Base" },
                                                        {
                                                            "type": "object",
                                                            "properties": { "name": { "type": "string" } }
                                                        }
                                                    ]
                                                }
                                            }
                                        }
                                    }
                                }
                            },
                            "responses": {}
                        }
                    }
                }
            }"##,
        );
        let key = OperationKey::new("/items", Method::Post, "/");
        let set = collect(&spec.document, &mut spec.graph, &key, "/").unwrap();
        let body = set.body.unwrap();
        let (props, _) = object_parts(&spec.graph, body);
        let (inner_props, inner_required) = object_parts(&spec.graph, props["inner"]);
        assert_eq!(inner_props.len(), 2);
        assert!(inner_required.contains("id"));

        use crate::synthesizer::{TsSynthesizer, TypeSynthesizer};
        let rendered = TsSynthesizer
            .synthesize(&spec.graph, body, "IParametersBody")
            .unwrap();
        assert!(rendered.contains("inner?:"));
    }

    #[test]
    fn numeric_header_property_becomes_annotated_string() {
        let mut spec = load(
            r#"{
                "swagger": "2.0",
                "paths": {
                    "/items": {
                        "get": {
                            "parameters": [
                                { "name": "X-Page", "in": "header", "type": "integer", "format": "int32" }
                            ],
                            "responses": {}
                        }
                    }
                }
            }"#,
        );
        let key = OperationKey::new("/items", Method::Get, "/");
        let set = collect(&spec.document, &mut spec.graph, &key, "/").unwrap();
        let (props, _) = object_parts(&spec.graph, set.header.unwrap());
        match spec.graph.node(props["X-Page"]) {
            SchemaNode::Primitive {
                kind, annotation, ..
            } => {
                assert_eq!(*kind, PrimitiveKind::String);
                assert!(annotation.as_deref().unwrap().contains("integer"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn responses_skip_default_and_non_numeric_keys() {
        let mut spec = load(
            r#"{
                "swagger": "2.0",
                "paths": {
                    "/items": {
                        "get": {
                            "responses": {
                                "200": { "schema": { "type": "object" } },
                                "404": { "description": "missing" },
                                "default": { "schema": { "type": "object" } }
                            }
                        }
                    }
                }
            }"#,
        );
        let key = OperationKey::new("/items", Method::Get, "/");
        let set = collect(&spec.document, &mut spec.graph, &key, "/").unwrap();
        assert_eq!(set.responses.keys().copied().collect::<Vec<_>>(), vec![200]);
    }

    #[test]
    fn body_is_dropped_for_payloadless_methods() {
        let mut spec = load(
            r#"{
                "swagger": "2.0",
                "paths": {
                    "/items": {
                        "get": {
                            "parameters": [
                                { "name": "payload", "in": "body", "schema": { "type": "object" } }
                            ],
                            "responses": {}
                        }
                    }
                }
            }"#,
        );
        let key = OperationKey::new("/items", Method::Get, "/");
        let set = collect(&spec.document, &mut spec.graph, &key, "/").unwrap();
        assert!(set.body.is_none());
    }

    #[test]
    fn unknown_operation_is_an_error() {
        let mut spec = load(r#"{ "swagger": "2.0", "paths": {} }"#);
        let key = OperationKey::new("/nope", Method::Get, "/");
        assert!(collect(&spec.document, &mut spec.graph, &key, "/").is_err());
    }
}
