//! Regex specs (`^...` or `regex|...`).

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use regex::Regex;

use super::PathSpecError;

/// An anchored regular expression over the whole path.
///
/// The declaration is normalized to start with `^` and end with `$`, so
/// `regex|/a` and `^/a$` compare equal. Matching always covers the full
/// path, even for alternations such as `^/a|/b$`.
#[derive(Debug, Clone)]
pub struct RegexSpec {
    declaration: String,
    regex: Regex,
    literal_len: usize,
}

impl RegexSpec {
    pub(super) fn parse(expr: &str) -> Result<Self, PathSpecError> {
        if expr.is_empty() {
            return Err(PathSpecError::Empty);
        }

        let mut declaration = String::with_capacity(expr.len() + 2);
        if !expr.starts_with('^') {
            declaration.push('^');
        }
        declaration.push_str(expr);
        if !ends_with_anchor(expr) {
            declaration.push('$');
        }

        let regex = Regex::new(&format!("^(?:{})$", declaration)).map_err(|e| {
            PathSpecError::InvalidRegex {
                spec: expr.to_string(),
                reason: e.to_string(),
            }
        })?;

        let literal_len = literal_len(&declaration);
        Ok(Self {
            declaration,
            regex,
            literal_len,
        })
    }

    /// Normalized declaration, always starting with `^`.
    pub fn as_str(&self) -> &str {
        &self.declaration
    }

    pub(super) fn literal_len(&self) -> usize {
        self.literal_len
    }

    pub(super) fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub(super) fn captures(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let caps = self.regex.captures(path)?;
        let params = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
            .collect();
        Some(params)
    }
}

impl PartialEq for RegexSpec {
    fn eq(&self, other: &Self) -> bool {
        self.declaration == other.declaration
    }
}

impl Eq for RegexSpec {}

impl Hash for RegexSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.declaration.hash(state);
    }
}

/// A trailing `$` counts only when it is not escaped.
fn ends_with_anchor(expr: &str) -> bool {
    match expr.strip_suffix('$') {
        Some(head) => head.chars().rev().take_while(|c| *c == '\\').count() % 2 == 0,
        None => false,
    }
}

/// Characters of the declaration that match themselves.
///
/// Class bodies, group headers and counted repetitions contribute nothing.
fn literal_len(declaration: &str) -> usize {
    let mut count = 0;
    let mut chars = declaration.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                // `\p{Greek}`, `\x{41}`: the braces belong to the escape.
                Some('p' | 'P' | 'x' | 'u' | 'U') => {
                    if chars.peek() == Some(&'{') {
                        skip_past(&mut chars, '}');
                    }
                }
                // `\.` is a literal dot, `\d` is a class.
                Some(escaped) if !escaped.is_ascii_alphanumeric() => count += 1,
                _ => {}
            },
            '[' => skip_class(&mut chars),
            '{' => skip_past(&mut chars, '}'),
            '(' => {
                if chars.peek() == Some(&'?') {
                    chars.next();
                    skip_group_header(&mut chars);
                }
            }
            '^' | '$' | '.' | '|' | '?' | '*' | '+' | ')' => {}
            _ => count += 1,
        }
    }
    count
}

type Chars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

fn skip_past(chars: &mut Chars<'_>, end: char) {
    for c in chars.by_ref() {
        if c == end {
            break;
        }
    }
}

/// Consumes a bracket class after its opening `[`, nested classes included.
fn skip_class(chars: &mut Chars<'_>) {
    if chars.peek() == Some(&'^') {
        chars.next();
    }
    // A leading `]` is a member, not the end.
    if chars.peek() == Some(&']') {
        chars.next();
    }
    let mut depth = 1;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return;
                }
            }
            _ => {}
        }
    }
}

/// Consumes what follows `(?`: a `P<name>` / `<name>` capture name, or
/// flags up to `:` or `)`.
fn skip_group_header(chars: &mut Chars<'_>) {
    if chars.peek() == Some(&'P') {
        chars.next();
    }
    if chars.peek() == Some(&'<') {
        skip_past(chars, '>');
        return;
    }
    for c in chars.by_ref() {
        if c == ':' || c == ')' {
            break;
        }
    }
}
