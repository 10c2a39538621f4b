//! Arena-backed schema graph.
//!
//! Every schema in a loaded document lives in one [`SchemaGraph`]; nodes refer
//! to each other by [`NodeId`], so `$ref` cycles are just id cycles and node
//! identity is the index, never the content.

use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Identity of a node inside a [`SchemaGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl PrimitiveKind {
    /// JSON Schema `type` keyword spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Number | Self::Integer)
    }
}

/// One canonical schema shape.
///
/// `AllOf` is transient: the loader produces it while dereferencing and the
/// collector collapses it into an `Object` before emission.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Object {
        properties: BTreeMap<String, NodeId>,
        required: BTreeSet<String>,
        /// `None` until the normalization walk assigns the default.
        additional_properties: Option<bool>,
        title: Option<String>,
    },
    Array {
        items: NodeId,
    },
    Primitive {
        kind: PrimitiveKind,
        format: Option<String>,
        /// Human-readable note about a coerced source type.
        annotation: Option<String>,
    },
    Union {
        members: Vec<NodeId>,
    },
    AllOf {
        members: Vec<NodeId>,
    },
}

impl SchemaNode {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::Primitive {
            kind,
            format: None,
            annotation: None,
        }
    }

    pub fn empty_object() -> Self {
        Self::Object {
            properties: BTreeMap::new(),
            required: BTreeSet::new(),
            additional_properties: None,
            title: None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SchemaGraph {
    nodes: Vec<SchemaNode>,
}

impl SchemaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: SchemaNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Allocates a placeholder slot so a `$ref` target under construction can
    /// already be pointed at. The caller fills it with [`Self::set`].
    pub fn reserve(&mut self) -> NodeId {
        self.push(SchemaNode::primitive(PrimitiveKind::Null))
    }

    pub fn set(&mut self, id: NodeId, node: SchemaNode) {
        self.nodes[id.0] = node;
    }

    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SchemaNode {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        match self.node(id) {
            SchemaNode::Object { properties, .. } => properties.values().copied().collect(),
            SchemaNode::Array { items } => vec![*items],
            SchemaNode::Primitive { .. } => Vec::new(),
            SchemaNode::Union { members } | SchemaNode::AllOf { members } => members.clone(),
        }
    }

    /// Normalizes every node reachable from `roots`, once each.
    ///
    /// Object nodes whose `additionalProperties` is still unset default to
    /// `true` iff they declare no properties, and lose their `title`. The
    /// visited set makes the walk terminate on cyclic graphs and keeps the
    /// pass idempotent.
    pub fn normalize(&mut self, roots: &[NodeId]) {
        let mut visited = HashSet::new();
        for &root in roots {
            self.normalize_node(root, &mut visited);
        }
    }

    fn normalize_node(&mut self, id: NodeId, visited: &mut HashSet<NodeId>) {
        if !visited.insert(id) {
            return;
        }
        for child in self.children(id) {
            self.normalize_node(child, visited);
        }
        if let SchemaNode::Object {
            properties,
            additional_properties,
            title,
            ..
        } = self.node_mut(id)
        {
            if additional_properties.is_none() {
                *additional_properties = Some(properties.is_empty());
            }
            *title = None;
        }
    }

    /// Renders the subtree rooted at `id` back to a JSON Schema value.
    ///
    /// A node already on the render stack is emitted as `{"type": "null"}`,
    /// so cyclic graphs serialize to finite documents.
    pub fn to_json(&self, id: NodeId) -> serde_json::Value {
        let mut stack = HashSet::new();
        self.to_json_inner(id, &mut stack)
    }

    fn to_json_inner(&self, id: NodeId, stack: &mut HashSet<NodeId>) -> serde_json::Value {
        use serde_json::{Map, Value, json};

        if !stack.insert(id) {
            return json!({ "type": "null" });
        }
        let value = match self.node(id) {
            SchemaNode::Object {
                properties,
                required,
                additional_properties,
                title,
            } => {
                let mut map = Map::new();
                map.insert("type".into(), Value::String("object".into()));
                if let Some(title) = title {
                    map.insert("title".into(), Value::String(title.clone()));
                }
                if !properties.is_empty() {
                    let props: Map<String, Value> = properties
                        .iter()
                        .map(|(name, child)| (name.clone(), self.to_json_inner(*child, stack)))
                        .collect();
                    map.insert("properties".into(), Value::Object(props));
                }
                if !required.is_empty() {
                    map.insert(
                        "required".into(),
                        Value::Array(required.iter().cloned().map(Value::String).collect()),
                    );
                }
                if let Some(extra) = additional_properties {
                    map.insert("additionalProperties".into(), Value::Bool(*extra));
                }
                Value::Object(map)
            }
            SchemaNode::Array { items } => {
                json!({ "type": "array", "items": self.to_json_inner(*items, stack) })
            }
            SchemaNode::Primitive {
                kind,
                format,
                annotation,
            } => {
                let mut map = Map::new();
                map.insert("type".into(), Value::String(kind.as_str().into()));
                if let Some(format) = format {
                    map.insert("format".into(), Value::String(format.clone()));
                }
                if let Some(annotation) = annotation {
                    map.insert("description".into(), Value::String(annotation.clone()));
                }
                Value::Object(map)
            }
            SchemaNode::Union { members } => {
                let rendered: Vec<Value> = members
                    .iter()
                    .map(|m| self.to_json_inner(*m, stack))
                    .collect();
                json!({ "anyOf": rendered })
            }
            SchemaNode::AllOf { members } => {
                let rendered: Vec<Value> = members
                    .iter()
                    .map(|m| self.to_json_inner(*m, stack))
                    .collect();
                json!({ "allOf": rendered })
            }
        };
        stack.remove(&id);
        value
    }
}
