//! Identifier and naming helpers for emitted TypeScript.

use crate::document::{Method, OperationKey};

const TS_RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "enum", "export", "extends", "false", "finally", "for", "function", "if", "import",
    "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw", "true",
    "try", "typeof", "var", "void", "while", "with", "yield", "let", "static", "implements",
    "interface", "package", "private", "protected", "public", "await",
];

pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_' || first == '$') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return false;
    }
    !TS_RESERVED.contains(&name)
}

/// Quotes a property name unless it is already a valid identifier.
pub fn quote_if_needed(name: &str) -> String {
    if is_valid_identifier(name) {
        name.to_string()
    } else {
        format!("\"{}\"", escape_js_string(name))
    }
}

pub fn escape_js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

fn case_words(input: &str) -> Vec<String> {
    input
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn lower_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// `items/{id}/get` → `itemsIdGet`.
pub fn camel_case(input: &str) -> String {
    let words = case_words(input);
    let mut out = String::new();
    for (index, word) in words.iter().enumerate() {
        if index == 0 {
            out.push_str(&lower_first(word));
        } else {
            out.push_str(&capitalize(word));
        }
    }
    out
}

/// `i-parameters-path` → `IParametersPath`.
pub fn pascal_case(input: &str) -> String {
    case_words(input).iter().map(|w| capitalize(w)).collect()
}

/// Name of an operation's registry entry and of its namespace import.
/// Both come from the same path + method spelling, so they always agree.
pub fn operation_ident(key: &OperationKey) -> String {
    camel_case(&format!("{}/{}", key.path, key.method.as_str()))
}

/// Relative module path of an operation's type module, braces kept.
pub fn module_path(key: &OperationKey) -> String {
    format!("{}/{}", key.path.trim_start_matches('/'), key.method.as_str())
}

/// Type name for a parameter slot or response code, `I` for object shapes
/// and `T` for everything else.
pub fn type_name(object_like: bool, suffix: &str) -> String {
    let prefix = if object_like { "i" } else { "t" };
    pascal_case(&format!("{prefix}-{suffix}"))
}

pub fn method_upper(method: Method) -> String {
    method.as_str().to_uppercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_strips_placeholders_and_separators() {
        assert_eq!(camel_case("items/{id}/get"), "itemsIdGet");
        assert_eq!(camel_case("user-pets/list"), "userPetsList");
        assert_eq!(camel_case("/"), "");
    }

    #[test]
    fn pascal_case_builds_type_names() {
        assert_eq!(pascal_case("i-parameters-path"), "IParametersPath");
        assert_eq!(type_name(true, "parameters-query"), "IParametersQuery");
        assert_eq!(type_name(false, "code-200"), "TCode200");
    }

    #[test]
    fn operation_ident_matches_module_import() {
        let key = OperationKey {
            path: "/items/{id}".to_string(),
            method: Method::Get,
        };
        assert_eq!(operation_ident(&key), "itemsIdGet");
        assert_eq!(module_path(&key), "items/{id}/get");
    }

    #[test]
    fn quoting_respects_identifier_rules() {
        assert_eq!(quote_if_needed("plain"), "plain");
        assert_eq!(quote_if_needed("x-token"), "\"x-token\"");
        assert_eq!(quote_if_needed("new"), "\"new\"");
    }
}
