//! Schema-to-declaration synthesis.
//!
//! [`TypeSynthesizer`] is the seam for the external declaration generator;
//! [`TsSynthesizer`] is the bundled implementation rendering straight from
//! the schema graph.

use std::collections::HashSet;

use thiserror::Error;

use crate::graph::{NodeId, PrimitiveKind, SchemaGraph, SchemaNode};

#[derive(Debug, Error)]
pub enum SynthesizeError {
    #[error("unsupported schema shape for `{type_name}`: {reason}")]
    Unsupported { type_name: String, reason: String },
}

/// Produces one exported TypeScript declaration for a schema subtree.
pub trait TypeSynthesizer {
    fn synthesize(
        &self,
        graph: &SchemaGraph,
        root: NodeId,
        name: &str,
    ) -> Result<String, SynthesizeError>;
}

/// Renders `export interface` for object roots and `export type` otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct TsSynthesizer;

impl TypeSynthesizer for TsSynthesizer {
    fn synthesize(
        &self,
        graph: &SchemaGraph,
        root: NodeId,
        name: &str,
    ) -> Result<String, SynthesizeError> {
        let mut stack = HashSet::new();
        match graph.node(root) {
            SchemaNode::Object { .. } => {
                let body = render_type(graph, root, 0, &mut stack, name)?;
                Ok(format!("export interface {name} {body}\n"))
            }
            _ => {
                let body = render_type(graph, root, 0, &mut stack, name)?;
                Ok(format!("export type {name} = {body};\n"))
            }
        }
    }
}

fn render_type(
    graph: &SchemaGraph,
    id: NodeId,
    indent: usize,
    stack: &mut HashSet<NodeId>,
    type_name: &str,
) -> Result<String, SynthesizeError> {
    if !stack.insert(id) {
        // Cycles fall back to `unknown` at the point of re-entry.
        return Ok("unknown".to_string());
    }
    let rendered = match graph.node(id) {
        SchemaNode::Object {
            properties,
            required,
            additional_properties,
            ..
        } => {
            let extra = *additional_properties == Some(true);
            if properties.is_empty() && !extra {
                "Record<string, never>".to_string()
            } else {
                let pad = " ".repeat(indent + 4);
                let mut out = String::from("{\n");
                for (name, prop) in properties {
                    let marker = if required.contains(name) { "" } else { "?" };
                    let ty = render_type(graph, *prop, indent + 4, stack, type_name)?;
                    out.push_str(&format!(
                        "{pad}{}{marker}: {ty};\n",
                        crate::emitter::ident::quote_if_needed(name)
                    ));
                }
                if extra {
                    out.push_str(&format!("{pad}[key: string]: unknown;\n"));
                }
                out.push_str(&" ".repeat(indent));
                out.push('}');
                out
            }
        }
        SchemaNode::Array { items } => {
            let inner = render_type(graph, *items, indent, stack, type_name)?;
            if matches!(graph.node(*items), SchemaNode::Union { .. }) {
                format!("({inner})[]")
            } else {
                format!("{inner}[]")
            }
        }
        SchemaNode::Primitive {
            kind, annotation, ..
        } => {
            let base = match kind {
                PrimitiveKind::String => "string",
                PrimitiveKind::Number | PrimitiveKind::Integer => "number",
                PrimitiveKind::Boolean => "boolean",
                PrimitiveKind::Null => "null",
            };
            match annotation {
                Some(note) => format!("{base} /* {note} */"),
                None => base.to_string(),
            }
        }
        SchemaNode::Union { members } => {
            let mut parts = Vec::new();
            for member in members {
                let text = render_type(graph, *member, indent, stack, type_name)?;
                if !parts.contains(&text) {
                    parts.push(text);
                }
            }
            if parts.is_empty() {
                "never".to_string()
            } else {
                parts.join(" | ")
            }
        }
        SchemaNode::AllOf { .. } => {
            return Err(SynthesizeError::Unsupported {
                type_name: type_name.to_string(),
                reason: "uncollapsed allOf reached the synthesizer".to_string(),
            });
        }
    };
    stack.remove(&id);
    Ok(rendered)
}
