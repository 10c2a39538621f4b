//! Builders for the three emitted artifact kinds.

use std::collections::BTreeMap;

use crate::collector::{ParameterSet, Slot};
use crate::document::OperationKey;
use crate::graph::{NodeId, SchemaGraph, SchemaNode};
use crate::synthesizer::{SynthesizeError, TypeSynthesizer};

use super::ident::{is_valid_identifier, method_upper, operation_ident, type_name};
use super::registry::{RegistryEntry, RegistryImport};
use super::ts::{Emit, TemplatePart, TsExpr, TsType};

const HANDS_OFF: &str =
    "/*\n    This file is generated; run the generator instead of editing it by hand.\n*/\n";

/// The once-only customization point next to the registry. Re-exports the
/// pieces the registry consumes, so projects swap the transport in one
/// place.
pub const EXTENSION_SOURCE: &str = r#"/*
    Customization point. This file is created once and never overwritten;
    adjust the base query or endpoint enhancement to fit the application.
*/
import { createApi as createApiBase, fetchBaseQuery } from "@reduxjs/toolkit/query/react";

export const createApi = createApiBase;

export const baseQuery = (baseUrl: string) => fetchBaseQuery({ baseUrl });

export const enhanceEndpoints = <T>(api: T): T => api;
"#;

fn is_object(graph: &SchemaGraph, id: NodeId) -> bool {
    matches!(graph.node(id), SchemaNode::Object { .. })
}

fn object_required_is_empty(graph: &SchemaGraph, id: NodeId) -> bool {
    match graph.node(id) {
        SchemaNode::Object { required, .. } => required.is_empty(),
        _ => true,
    }
}

fn slot_suffix(slot: Slot) -> &'static str {
    match slot {
        Slot::Path => "parameters-path",
        Slot::Query => "parameters-query",
        Slot::Header => "parameters-header",
        Slot::Body => "parameters-body",
    }
}

/// Builds the per-operation type module: one declaration per slot and per
/// response code, an `IParameters` composition, and a `TResponse` union over
/// the 2xx codes.
pub fn type_module(
    graph: &SchemaGraph,
    set: &ParameterSet,
    synthesizer: &dyn TypeSynthesizer,
) -> Result<String, SynthesizeError> {
    let mut sections: Vec<String> = Vec::new();
    let mut parameter_props: Vec<(Slot, String, bool)> = Vec::new();

    for (slot, id) in set.slots() {
        let Some(id) = id else {
            continue;
        };
        let object_like = is_object(graph, id);
        let optional = object_required_is_empty(graph, id);
        if slot == Slot::Body && set.form_data {
            let inner = type_name(object_like, "parameters-body-form-data");
            sections.push(synthesizer.synthesize(graph, id, &inner)?);
            sections.push(form_data_wrapper(&inner));
            parameter_props.push((slot, "IParametersBody".to_string(), optional));
        } else {
            let name = type_name(object_like, slot_suffix(slot));
            sections.push(synthesizer.synthesize(graph, id, &name)?);
            parameter_props.push((slot, name, optional));
        }
    }

    let mut success_names: Vec<String> = Vec::new();
    for (code, id) in &set.responses {
        let name = type_name(is_object(graph, *id), &format!("code-{code}"));
        sections.push(synthesizer.synthesize(graph, *id, &name)?);
        if (200..300).contains(code) {
            success_names.push(name);
        }
    }

    if !parameter_props.is_empty() {
        let mut block = String::from("export interface IParameters {\n");
        for (slot, name, optional) in &parameter_props {
            let marker = if *optional { "?" } else { "" };
            block.push_str(&format!("    {}{marker}: {name};\n", slot.as_str()));
        }
        block.push_str("}\n");
        sections.push(block);
    }

    let response = if success_names.is_empty() {
        "void".to_string()
    } else {
        success_names.join(" | ")
    };
    sections.push(format!("export type TResponse = {response};\n"));

    Ok(format!("{HANDS_OFF}\n{}", sections.join("\n")))
}

fn form_data_wrapper(inner: &str) -> String {
    format!(
        "export interface IParametersBody extends FormData {{\n\
         \x20   append<T extends keyof {inner}>(name: T, value: {inner}[T], fileName?: string): void;\n\
         \x20   get<T extends keyof {inner}>(name: T): {inner}[T];\n\
         \x20   has<T extends keyof {inner}>(name: T): boolean;\n\
         \x20   set<T extends keyof {inner}>(name: T, value: {inner}[T], fileName?: string): void;\n\
         \x20   delete<T extends keyof {inner}>(name: T): void;\n\
         }}\n"
    )
}

/// Builds the registry declaration for one operation, plus the namespace
/// import its types come from.
pub fn binding_entry(
    graph: &SchemaGraph,
    key: &OperationKey,
    set: &ParameterSet,
) -> (RegistryEntry, RegistryImport) {
    let name = operation_ident(key);
    let import = RegistryImport {
        ident: name.clone(),
        path: format!("./{}", super::ident::module_path(key)),
    };

    let build_kind = if key.method.is_mutation() {
        "mutation"
    } else {
        "query"
    };
    let has_params = set.has_parameters();
    let any_required = set
        .slots()
        .iter()
        .any(|(_, id)| id.is_some_and(|id| !object_required_is_empty(graph, id)));

    let mut type_args = vec![TsType::Ref(format!("{name}.TResponse"))];
    if has_params {
        let params_ref = TsType::Ref(format!("{name}.IParameters"));
        if any_required {
            type_args.push(params_ref);
        } else {
            type_args.push(TsType::Union(vec![params_ref, TsType::void()]));
        }
    } else {
        type_args.push(TsType::void());
    }

    let mut request = vec![(
        "method".to_string(),
        TsExpr::Str(method_upper(key.method)),
    )];
    request.push(("url".to_string(), url_expr(key, set)));
    for (slot, payload_key) in [(Slot::Body, "body"), (Slot::Query, "params"), (Slot::Header, "headers")] {
        if let Some(value) = payload_expr(graph, set, slot) {
            request.push((payload_key.to_string(), value));
        }
    }

    let arrow = TsExpr::Arrow {
        params: if has_params {
            vec!["params".to_string()]
        } else {
            Vec::new()
        },
        body: Box::new(TsExpr::Object(request)),
    };
    let expr = TsExpr::Call {
        callee: Box::new(TsExpr::member(TsExpr::ident("build"), build_kind)),
        type_args,
        args: vec![TsExpr::Object(vec![("query".to_string(), arrow)])],
    };

    let entry = RegistryEntry {
        source: format!("{name}: {}", expr.emit()),
        name,
    };
    (entry, import)
}

/// `/items/{id}` with a path slot becomes a template substituting
/// `params.path.id`; everything else stays a plain string.
fn url_expr(key: &OperationKey, set: &ParameterSet) -> TsExpr {
    if set.path.is_none() || !key.path.contains('{') {
        return TsExpr::Str(key.path.clone());
    }
    let mut parts = Vec::new();
    let mut rest = key.path.as_str();
    loop {
        let Some(open) = rest.find('{') else {
            if !rest.is_empty() {
                parts.push(TemplatePart::Static(rest.to_string()));
            }
            break;
        };
        let Some(close) = rest[open..].find('}') else {
            parts.push(TemplatePart::Static(rest.to_string()));
            break;
        };
        if open > 0 {
            parts.push(TemplatePart::Static(rest[..open].to_string()));
        }
        let placeholder = &rest[open + 1..open + close];
        let base = TsExpr::member(TsExpr::ident("params"), "path");
        let access = if is_valid_identifier(placeholder) {
            TsExpr::member(base, placeholder)
        } else {
            TsExpr::Index {
                object: Box::new(base),
                key: placeholder.to_string(),
                optional: false,
            }
        };
        parts.push(TemplatePart::Expr(access));
        rest = &rest[open + close + 1..];
    }
    TsExpr::Template(parts)
}

/// Request payload for one slot: object slots enumerate their declared
/// properties with optional chaining wherever something is not required;
/// array slots and form-data bodies pass the whole value.
fn payload_expr(graph: &SchemaGraph, set: &ParameterSet, slot: Slot) -> Option<TsExpr> {
    let id = match slot {
        Slot::Body => set.body,
        Slot::Query => set.query,
        Slot::Header => set.header,
        Slot::Path => None,
    }?;

    match graph.node(id) {
        SchemaNode::Object {
            properties,
            required,
            ..
        } => {
            if properties.is_empty() {
                return None;
            }
            if slot == Slot::Body && set.form_data {
                return Some(TsExpr::member(TsExpr::ident("params"), "body"));
            }
            let slot_optional = required.is_empty();
            let entries = properties
                .keys()
                .map(|prop| {
                    let base = TsExpr::Member {
                        object: Box::new(TsExpr::ident("params")),
                        property: slot.as_str().to_string(),
                        optional: slot_optional,
                    };
                    let optional = !required.contains(prop);
                    let access = if is_valid_identifier(prop) {
                        TsExpr::Member {
                            object: Box::new(base),
                            property: prop.clone(),
                            optional,
                        }
                    } else {
                        TsExpr::Index {
                            object: Box::new(base),
                            key: prop.clone(),
                            optional,
                        }
                    };
                    (prop.clone(), access)
                })
                .collect();
            Some(TsExpr::Object(entries))
        }
        SchemaNode::Array { .. } => Some(TsExpr::member(TsExpr::ident("params"), slot.as_str())),
        _ => None,
    }
}

/// Assembles the registry module source from its imports and entries.
///
/// Imports sort by path; entries sort lexicographically by name. Duplicate
/// names keep their first occurrence (fresh entries are pushed before
/// spliced prior-generation ones).
pub fn registry_module(
    api_name: &str,
    base_url: &str,
    imports: &[RegistryImport],
    entries: &[RegistryEntry],
) -> String {
    let mut unique_imports: BTreeMap<&str, &RegistryImport> = BTreeMap::new();
    for import in imports {
        unique_imports.entry(import.path.as_str()).or_insert(import);
    }
    let mut unique_entries: BTreeMap<&str, &RegistryEntry> = BTreeMap::new();
    for entry in entries {
        unique_entries.entry(entry.name.as_str()).or_insert(entry);
    }

    let mut out = String::from(HANDS_OFF);
    out.push_str("import { createApi, baseQuery, enhanceEndpoints } from \"./extension\";\n");
    for import in unique_imports.values() {
        out.push_str(&format!(
            "import type * as {} from \"{}\";\n",
            import.ident, import.path
        ));
    }
    out.push_str("\nexport const api = createApi({\n");
    out.push_str(&format!("    reducerPath: \"api/{api_name}\",\n"));
    out.push_str(&format!(
        "    baseQuery: baseQuery(\"{}\"),\n",
        super::ident::escape_js_string(base_url)
    ));
    out.push_str("    endpoints: (build) => ({\n");
    for entry in unique_entries.values() {
        out.push_str("        ");
        out.push_str(&entry.source);
        out.push_str(",\n");
    }
    out.push_str("    }),\n});\n\nenhanceEndpoints(api);\n\nexport default api;\n");
    out
}
