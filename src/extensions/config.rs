//! Extension offers as they appear in `Sec-WebSocket-Extensions`.
//!
//! ```text
//! permessage-deflate; client_max_window_bits, x-custom; mode="fast"
//! ```

use std::fmt;

/// One extension token with its parameters, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionConfig {
    pub name: String,
    pub params: Vec<(String, Option<String>)>,
}

impl ExtensionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Option<&str>) -> Self {
        self.params.push((key.into(), value.map(str::to_string)));
        self
    }

    pub fn has_param(&self, key: &str) -> bool {
        self.params.iter().any(|(k, _)| k == key)
    }

    /// Value of `key`; `None` when absent or given as a bare flag.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Parse a single `name; k; k=v` element. Returns `None` for an empty name.
    pub fn parse(element: &str) -> Option<Self> {
        let mut parts = split_unquoted(element, ';').into_iter();
        let name = parts.next()?.trim();
        if name.is_empty() {
            return None;
        }

        let params = parts
            .filter_map(|part| {
                let part = part.trim();
                if part.is_empty() {
                    return None;
                }
                Some(match part.split_once('=') {
                    Some((key, value)) => (key.trim().to_string(), Some(unquote(value.trim()))),
                    None => (part.to_string(), None),
                })
            })
            .collect();

        Some(Self {
            name: name.to_string(),
            params,
        })
    }

    /// Parse a full header value into offers, preserving order.
    pub fn parse_header(value: &str) -> Vec<Self> {
        split_unquoted(value, ',')
            .into_iter()
            .filter_map(ExtensionConfig::parse)
            .collect()
    }

    /// Render a negotiated chain back into a header value.
    pub fn render_header(configs: &[ExtensionConfig]) -> String {
        configs
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ExtensionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (key, value) in &self.params {
            match value {
                Some(value) if is_token(value) => write!(f, "; {}={}", key, value)?,
                Some(value) => write!(f, "; {}={}", key, quote(value))?,
                None => write!(f, "; {}", key)?,
            }
        }
        Ok(())
    }
}

/// Split on `sep`, ignoring separators inside double quotes.
fn split_unquoted(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (idx, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            c if c == sep && !quoted => {
                parts.push(&input[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Strip surrounding quotes and resolve `\"` / `\\` escapes.
fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

/// RFC 7230 `token`: values that can be written without quotes.
fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c))
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
