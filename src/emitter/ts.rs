//! A small TypeScript syntax tree.
//!
//! Artifacts are assembled as trees and rendered through [`Emit`]; no string
//! concatenation of code fragments happens outside this module.

use super::ident::{escape_js_string, quote_if_needed};

pub trait Emit {
    fn emit(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TsPrimitive {
    String,
    Number,
    Boolean,
    Null,
    Void,
    Unknown,
}

impl Emit for TsPrimitive {
    fn emit(&self) -> String {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Void => "void",
            Self::Unknown => "unknown",
        }
        .to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TsType {
    Primitive(TsPrimitive),
    /// A (possibly qualified) type reference, e.g. `itemsIdGet.IParameters`.
    Ref(String),
    Array(Box<TsType>),
    Union(Vec<TsType>),
}

impl TsType {
    pub fn void() -> Self {
        Self::Primitive(TsPrimitive::Void)
    }
}

impl Emit for TsType {
    fn emit(&self) -> String {
        match self {
            Self::Primitive(p) => p.emit(),
            Self::Ref(name) => name.clone(),
            Self::Array(inner) => match inner.as_ref() {
                TsType::Union(_) => format!("({})[]", inner.emit()),
                _ => format!("{}[]", inner.emit()),
            },
            Self::Union(members) => members
                .iter()
                .map(Emit::emit)
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Static(String),
    Expr(TsExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TsExpr {
    Ident(String),
    Str(String),
    /// Backtick template literal.
    Template(Vec<TemplatePart>),
    Member {
        object: Box<TsExpr>,
        property: String,
        optional: bool,
    },
    /// Bracket access for names that are not valid identifiers.
    Index {
        object: Box<TsExpr>,
        key: String,
        optional: bool,
    },
    Call {
        callee: Box<TsExpr>,
        type_args: Vec<TsType>,
        args: Vec<TsExpr>,
    },
    Arrow {
        params: Vec<String>,
        body: Box<TsExpr>,
    },
    Object(Vec<(String, TsExpr)>),
    /// Pre-rendered source, used when splicing prior-generation entries.
    Raw(String),
}

impl TsExpr {
    pub fn ident(name: &str) -> Self {
        Self::Ident(name.to_string())
    }

    pub fn member(object: TsExpr, property: &str) -> Self {
        Self::Member {
            object: Box::new(object),
            property: property.to_string(),
            optional: false,
        }
    }
}

impl Emit for TsExpr {
    fn emit(&self) -> String {
        match self {
            Self::Ident(name) => name.clone(),
            Self::Str(value) => format!("\"{}\"", escape_js_string(value)),
            Self::Template(parts) => {
                let mut out = String::from("`");
                for part in parts {
                    match part {
                        TemplatePart::Static(text) => {
                            out.push_str(&text.replace('`', "\\`").replace("${", "\\${"));
                        }
                        TemplatePart::Expr(expr) => {
                            out.push_str("${");
                            out.push_str(&expr.emit());
                            out.push('}');
                        }
                    }
                }
                out.push('`');
                out
            }
            Self::Member {
                object,
                property,
                optional,
            } => {
                let dot = if *optional { "?." } else { "." };
                format!("{}{dot}{property}", object.emit())
            }
            Self::Index {
                object,
                key,
                optional,
            } => {
                let bracket = if *optional { "?.[" } else { "[" };
                format!("{}{bracket}\"{}\"]", object.emit(), escape_js_string(key))
            }
            Self::Call {
                callee,
                type_args,
                args,
            } => {
                let generics = if type_args.is_empty() {
                    String::new()
                } else {
                    format!(
                        "<{}>",
                        type_args
                            .iter()
                            .map(Emit::emit)
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                };
                let args = args.iter().map(Emit::emit).collect::<Vec<_>>().join(", ");
                format!("{}{generics}({args})", callee.emit())
            }
            Self::Arrow { params, body } => {
                let params = params.join(", ");
                // Object bodies need parentheses to not parse as a block.
                let body = match body.as_ref() {
                    TsExpr::Object(_) => format!("({})", body.emit()),
                    _ => body.emit(),
                };
                format!("({params}) => {body}")
            }
            Self::Object(entries) => {
                if entries.is_empty() {
                    return "{}".to_string();
                }
                let rendered: Vec<String> = entries
                    .iter()
                    .map(|(name, value)| format!("{}: {}", quote_if_needed(name), value.emit()))
                    .collect();
                format!("{{ {} }}", rendered.join(", "))
            }
            Self::Raw(source) => source.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn emits_union_and_array_types() {
        let ty = TsType::Array(Box::new(TsType::Union(vec![
            TsType::Primitive(TsPrimitive::Number),
            TsType::Primitive(TsPrimitive::String),
        ])));
        assert_eq!(ty.emit(), "(number | string)[]");
        assert_eq!(
            TsType::Array(Box::new(TsType::Ref("ICode200".into()))).emit(),
            "ICode200[]"
        );
    }

    #[test]
    fn emits_optional_member_chains() {
        let expr = TsExpr::Member {
            object: Box::new(TsExpr::Member {
                object: Box::new(TsExpr::ident("params")),
                property: "query".to_string(),
                optional: true,
            }),
            property: "page".to_string(),
            optional: true,
        };
        assert_eq!(expr.emit(), "params?.query?.page");
    }

    #[test]
    fn emits_bracket_access_for_invalid_identifiers() {
        let expr = TsExpr::Index {
            object: Box::new(TsExpr::member(TsExpr::ident("params"), "header")),
            key: "x-token".to_string(),
            optional: true,
        };
        assert_eq!(expr.emit(), "params.header?.[\"x-token\"]");
    }

    #[test]
    fn emits_template_literals() {
        let expr = TsExpr::Template(vec![
            TemplatePart::Static("/items/".to_string()),
            TemplatePart::Expr(TsExpr::member(
                TsExpr::member(TsExpr::ident("params"), "path"),
                "id",
            )),
        ]);
        assert_eq!(expr.emit(), "`/items/${params.path.id}`");
    }

    #[test]
    fn emits_generic_calls_with_arrow_object_bodies() {
        let expr = TsExpr::Call {
            callee: Box::new(TsExpr::member(TsExpr::ident("build"), "query")),
            type_args: vec![TsType::Ref("m.TResponse".into()), TsType::void()],
            args: vec![TsExpr::Object(vec![(
                "query".to_string(),
                TsExpr::Arrow {
                    params: vec![],
                    body: Box::new(TsExpr::Object(vec![(
                        "method".to_string(),
                        TsExpr::Str("GET".to_string()),
                    )])),
                },
            )])],
        };
        assert_eq!(
            expr.emit(),
            "build.query<m.TResponse, void>({ query: () => ({ method: \"GET\" }) })"
        );
    }
}
