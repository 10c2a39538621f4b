//! Parsing of a previously emitted registry module.
//!
//! The generational merge needs the prior `index.ts` as structure, not text:
//! its namespace imports and its named endpoint declarations. Entries are
//! recovered with a small scanner that tracks bracket depth and string
//! state, so declarations spanning several lines splice out intact.

use crate::emitter::ident::is_valid_identifier;

/// One `name: build.…(…)` declaration, with its source text verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub name: String,
    pub source: String,
}

/// One `import type * as ident from "path";` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryImport {
    pub ident: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRegistry {
    pub imports: Vec<RegistryImport>,
    pub entries: Vec<RegistryEntry>,
}

impl ParsedRegistry {
    pub fn entry(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn import(&self, ident: &str) -> Option<&RegistryImport> {
        self.imports.iter().find(|i| i.ident == ident)
    }
}

/// Extracts imports and endpoint declarations from registry source.
///
/// Tolerant by design: anything it cannot recognize is skipped, so a
/// hand-mangled registry degrades to fewer recovered entries, never an
/// error.
pub fn parse(source: &str) -> ParsedRegistry {
    let mut parsed = ParsedRegistry::default();
    for line in source.lines() {
        if let Some(import) = parse_import(line) {
            parsed.imports.push(import);
        }
    }
    parsed.entries = parse_entries(source);
    parsed
}

fn parse_import(line: &str) -> Option<RegistryImport> {
    let rest = line.trim().strip_prefix("import type * as ")?;
    let (ident, rest) = rest.split_once(" from ")?;
    let ident = ident.trim();
    if !is_valid_identifier(ident) {
        return None;
    }
    let rest = rest.trim().trim_end_matches(';');
    let path = rest.strip_prefix('"')?.strip_suffix('"')?;
    Some(RegistryImport {
        ident: ident.to_string(),
        path: path.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum StrState {
    None,
    Single,
    Double,
    Template,
}

/// Scans for `ident: build.` at any depth and captures the balanced
/// expression that follows, up to the comma (or closing brace) that ends
/// the declaration.
fn parse_entries(source: &str) -> Vec<RegistryEntry> {
    let chars: Vec<char> = source.chars().collect();
    let mut entries = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let Some((name, value_start)) = match_entry_head(&chars, index) else {
            index += 1;
            continue;
        };
        let Some(value_end) = balanced_end(&chars, value_start) else {
            break;
        };
        let source: String = chars[index..value_end].iter().collect();
        entries.push(RegistryEntry {
            name,
            source: source.trim_end().to_string(),
        });
        index = value_end;
    }
    entries
}

/// Matches `ident \s* : \s* build .` starting at a word boundary; returns the
/// name and the offset where the value expression starts.
fn match_entry_head(chars: &[char], start: usize) -> Option<(String, usize)> {
    let first = *chars.get(start)?;
    if !(first.is_ascii_alphabetic() || first == '_' || first == '$') {
        return None;
    }
    if start > 0 {
        let prev = chars[start - 1];
        if prev.is_ascii_alphanumeric() || prev == '_' || prev == '$' || prev == '.' {
            return None;
        }
    }
    let mut pos = start;
    while pos < chars.len()
        && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_' || chars[pos] == '$')
    {
        pos += 1;
    }
    let name: String = chars[start..pos].iter().collect();
    while pos < chars.len() && chars[pos].is_whitespace() {
        pos += 1;
    }
    if chars.get(pos) != Some(&':') {
        return None;
    }
    let value_start = pos + 1;
    let mut probe = value_start;
    while probe < chars.len() && chars[probe].is_whitespace() {
        probe += 1;
    }
    let keyword: String = chars
        .get(probe..probe + 6)
        .map(|w| w.iter().collect())
        .unwrap_or_default();
    if keyword != "build." {
        return None;
    }
    Some((name, value_start))
}

/// Finds the end of the expression beginning at `start`: the position of the
/// first `,` or `}` met at the starting depth, outside strings and outside
/// `<…>` type-argument lists.
fn balanced_end(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0_i32;
    let mut angle = 0_i32;
    let mut string = StrState::None;
    let mut pos = start;
    while pos < chars.len() {
        let ch = chars[pos];
        match string {
            StrState::None => match ch {
                '\'' => string = StrState::Single,
                '"' => string = StrState::Double,
                '`' => string = StrState::Template,
                '(' | '{' | '[' => depth += 1,
                ')' | ']' => depth -= 1,
                '<' => angle += 1,
                // `=>` is an arrow, not a closer.
                '>' => {
                    if angle > 0 && chars.get(pos.wrapping_sub(1)) != Some(&'=') {
                        angle -= 1;
                    }
                }
                '}' => {
                    if depth == 0 {
                        return Some(pos);
                    }
                    depth -= 1;
                }
                ',' if depth == 0 && angle == 0 => return Some(pos),
                _ => {}
            },
            StrState::Single => match ch {
                '\\' => pos += 1,
                '\'' => string = StrState::None,
                _ => {}
            },
            StrState::Double => match ch {
                '\\' => pos += 1,
                '"' => string = StrState::None,
                _ => {}
            },
            StrState::Template => match ch {
                '\\' => pos += 1,
                '`' => string = StrState::None,
                _ => {}
            },
        }
        pos += 1;
    }
    None
}
