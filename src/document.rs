//! In-memory shape of a loaded OpenAPI document.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecVersion {
    V2,
    V3,
}

/// HTTP methods an OpenAPI path item can carry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl Method {
    pub const ALL: [Self; 8] = [
        Self::Get,
        Self::Put,
        Self::Post,
        Self::Delete,
        Self::Options,
        Self::Head,
        Self::Patch,
        Self::Trace,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::Post => "post",
            Self::Delete => "delete",
            Self::Options => "options",
            Self::Head => "head",
            Self::Patch => "patch",
            Self::Trace => "trace",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(value))
    }

    /// Whether the generated binding is an RTK `mutation` rather than `query`.
    pub fn is_mutation(self) -> bool {
        matches!(self, Self::Put | Self::Post | Self::Delete | Self::Patch)
    }

    /// Methods that never carry a request payload.
    pub fn admits_body(self) -> bool {
        !matches!(self, Self::Get | Self::Head | Self::Options | Self::Trace)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical name of one operation: base-url-stripped path + method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationKey {
    pub path: String,
    pub method: Method,
}

impl OperationKey {
    /// Builds the canonical key for a raw document path.
    ///
    /// The configured base url prefix is stripped once; the remainder gets
    /// its slashes collapsed and a leading `/` ensured.
    pub fn new(raw_path: &str, method: Method, base_url: &str) -> Self {
        Self {
            path: canonical_path(raw_path, base_url),
            method,
        }
    }

    /// Re-normalizes a key whose path came from outside (the state file).
    ///
    /// Only slash normalization happens here. Base stripping is a
    /// construction-time step; applying it again would eat path segments
    /// that merely repeat the base prefix.
    pub fn canonicalize(&self) -> Self {
        Self {
            path: normalize_path(&self.path),
            method: self.method,
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method.as_str().to_uppercase(), self.path)
    }
}

/// Collapses duplicate slashes, drops a trailing slash, ensures a leading one.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    let mut prev_slash = true;
    for ch in path.chars() {
        if ch == '/' {
            if !prev_slash {
                out.push('/');
            }
            prev_slash = true;
        } else {
            out.push(ch);
            prev_slash = false;
        }
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Strips the base url prefix (at most once) and normalizes the remainder.
///
/// This runs when a key is built from a raw document path, never on an
/// already canonical path: `/a/a/b` under base `/a` canonicalizes to
/// `/a/b`, and stripping again would lose the real `/a` segment.
pub fn canonical_path(raw_path: &str, base_url: &str) -> String {
    let path = normalize_path(raw_path);
    let base = normalize_path(base_url);
    if base == "/" {
        return path;
    }
    match path.strip_prefix(&base) {
        Some(rest) if rest.is_empty() => "/".to_string(),
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => path,
    }
}

/// Placeholder names appearing as `{name}` segments of a path template.
pub fn path_placeholders(path: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        names.push(rest[open + 1..open + close].to_string());
        rest = &rest[open + close + 1..];
    }
    names
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    FormData,
    Body,
    Cookie,
}

impl ParamLocation {
    pub fn parse(value: &str) -> Self {
        match value {
            "path" => Self::Path,
            "header" => Self::Header,
            "formData" => Self::FormData,
            "body" => Self::Body,
            "cookie" => Self::Cookie,
            _ => Self::Query,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
    pub schema: Option<NodeId>,
}

/// v3 request body, already reduced to the one media type the generator uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestBodySpec {
    pub schema: Option<NodeId>,
    /// Whether the body declared a `multipart/form-data` media type.
    pub multipart: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationSpec {
    pub parameters: Vec<ParameterSpec>,
    pub request_body: Option<RequestBodySpec>,
    /// Response schema per raw status key (`"200"`, `"default"`, …).
    pub responses: BTreeMap<String, Option<NodeId>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathItem {
    pub parameters: Vec<ParameterSpec>,
    pub operations: BTreeMap<Method, OperationSpec>,
}

/// A dereferenced document: paths keyed by normalized raw path.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiDocument {
    pub version: SpecVersion,
    /// v2 `basePath` (or `/`); v3 documents always get `/`.
    pub base_path: String,
    pub paths: BTreeMap<String, PathItem>,
}

impl ApiDocument {
    /// Looks a canonical key back up in the document.
    ///
    /// The stored path keys may or may not carry the stripped base prefix,
    /// so the prefixed spelling is tried first with a bare fallback.
    pub fn find_path(&self, key_path: &str, base_url: &str) -> Option<(&str, &PathItem)> {
        let prefixed = normalize_path(&format!("{base_url}/{key_path}"));
        if let Some((raw, item)) = self.paths.get_key_value(&prefixed) {
            return Some((raw.as_str(), item));
        }
        let bare = normalize_path(key_path);
        self.paths
            .get_key_value(&bare)
            .map(|(raw, item)| (raw.as_str(), item))
    }

    pub fn find_operation(&self, key: &OperationKey, base_url: &str) -> Option<&OperationSpec> {
        self.find_path(&key.path, base_url)
            .and_then(|(_, item)| item.operations.get(&key.method))
    }

    pub fn has_operation(&self, key: &OperationKey, base_url: &str) -> bool {
        self.find_operation(key, base_url).is_some()
    }

    /// Every operation in the document, as canonical keys in path order.
    pub fn operation_keys(&self, base_url: &str) -> Vec<OperationKey> {
        let mut keys = Vec::new();
        for (raw_path, item) in &self.paths {
            for method in item.operations.keys() {
                keys.push(OperationKey::new(raw_path, *method, base_url));
            }
        }
        keys
    }
}
