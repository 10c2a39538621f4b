//! Persisted endpoint selection and staleness tracking.
//!
//! The selection state is a JSON object keyed by API alias. Endpoint entries
//! keep their insertion order across load/rewrite/save; the tracker never
//! reorders them (alphabetizing is the registry emitter's concern).

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::document::{ApiDocument, Method, OperationKey};

/// Ordered `path → methods` map. A plain map type would alphabetize on
/// (de)serialization, so this is a `Vec` of pairs behind map syntax.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointMap(Vec<(String, Vec<Method>)>);

impl EndpointMap {
    pub fn len(&self) -> usize {
        self.0.iter().map(|(_, methods)| methods.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &[Method])> {
        self.0
            .iter()
            .map(|(path, methods)| (path.as_str(), methods.as_slice()))
    }

    /// Flattens to operation keys in stored order.
    pub fn keys(&self) -> Vec<OperationKey> {
        let mut keys = Vec::new();
        for (path, methods) in &self.0 {
            for method in methods {
                keys.push(OperationKey {
                    path: path.clone(),
                    method: *method,
                });
            }
        }
        keys
    }

    pub fn contains(&self, key: &OperationKey) -> bool {
        self.0
            .iter()
            .any(|(path, methods)| *path == key.path && methods.contains(&key.method))
    }

    /// Appends a key, merging into an existing path entry when present.
    pub fn push(&mut self, key: &OperationKey) {
        if let Some((_, methods)) = self.0.iter_mut().find(|(path, _)| *path == key.path) {
            if !methods.contains(&key.method) {
                methods.push(key.method);
            }
        } else {
            self.0.push((key.path.clone(), vec![key.method]));
        }
    }

    pub fn retain_keys(&mut self, keep: impl Fn(&OperationKey) -> bool) {
        for (path, methods) in &mut self.0 {
            let path = path.clone();
            methods.retain(|method| {
                keep(&OperationKey {
                    path: path.clone(),
                    method: *method,
                })
            });
        }
        self.0.retain(|(_, methods)| !methods.is_empty());
    }
}

impl Serialize for EndpointMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (path, methods) in &self.0 {
            map.serialize_entry(path, methods)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EndpointMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapOrder;

        impl<'de> Visitor<'de> for MapOrder {
            type Value = EndpointMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of endpoint path to method list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some((path, methods)) = access.next_entry::<String, Vec<Method>>()? {
                    entries.push((path, methods));
                }
                Ok(EndpointMap(entries))
            }
        }

        deserializer.deserialize_map(MapOrder)
    }
}

/// One API alias inside the state file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiSelection {
    #[serde(rename = "base-url", default)]
    pub base_url: String,
    #[serde(default)]
    pub endpoints: EndpointMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    #[serde(flatten)]
    pub apis: BTreeMap<String, ApiSelection>,
}

impl SelectionState {
    /// Reads the state file. A missing file is an empty state; a malformed
    /// one is reported and treated as empty (it gets rewritten at the end of
    /// the run).
    pub fn load(path: &Path) -> Self {
        let Ok(text) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&text) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "selection state is malformed, starting empty");
                Self::default()
            }
        }
    }

    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self).map(|mut text| {
            text.push('\n');
            text
        })
    }
}

/// Three disjoint views of one API's operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionDiff {
    /// Selected and present in the document.
    pub confirmed: Vec<OperationKey>,
    /// Present in the document but not selected.
    pub available: Vec<OperationKey>,
    /// Selected earlier, gone from the document now.
    pub missing: Vec<OperationKey>,
}

/// Splits the document's operations against a stored selection.
pub fn resolve(document: &ApiDocument, selection: &ApiSelection) -> SelectionDiff {
    let base = selection.base_url.as_str();
    let mut diff = SelectionDiff::default();
    for key in selection.endpoints.keys() {
        // Stored keys are already canonical; this only tidies slashes a
        // hand edit may have introduced, it never strips the base again.
        let key = key.canonicalize();
        if document.has_operation(&key, base) {
            diff.confirmed.push(key);
        } else {
            diff.missing.push(key);
        }
    }
    let selected: HashSet<&OperationKey> =
        diff.confirmed.iter().chain(diff.missing.iter()).collect();
    diff.available = document
        .operation_keys(base)
        .into_iter()
        .filter(|key| !selected.contains(key))
        .collect();
    diff
}

/// End-of-run rewrite: missing entries are kept verbatim (pinned until
/// removed by hand), confirmed ones are appended after them.
pub fn rewritten(selection: &ApiSelection, diff: &SelectionDiff) -> ApiSelection {
    let mut endpoints = EndpointMap::default();
    for key in &diff.missing {
        endpoints.push(key);
    }
    for key in &diff.confirmed {
        endpoints.push(key);
    }
    ApiSelection {
        base_url: selection.base_url.clone(),
        endpoints,
    }
}

/// Replaces the selection with the user's picks: entries still picked keep
/// their stored position, new picks append.
pub fn apply_choices(selection: &mut ApiSelection, chosen: &[OperationKey]) {
    let chosen_set: HashSet<&OperationKey> = chosen.iter().collect();
    selection
        .endpoints
        .retain_keys(|key| chosen_set.contains(key));
    for key in chosen {
        if !selection.endpoints.contains(key) {
            selection.endpoints.push(key);
        }
    }
}
