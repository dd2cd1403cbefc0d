//! Path specification subsystem.
//!
//! # Data Flow
//! ```text
//! raw spec string (config file, programmatic registration)
//!     → parse() selects a syntax by prefix:
//!         "regex|..." or "^..."   → pattern.rs  (anchored regex)
//!         "uri-template|..."      → template.rs (single-level {name} segments)
//!         "servlet|..." or bare   → servlet.rs  (exact, "/prefix/*", "*.ext")
//!     → PathSpec (immutable, structurally comparable)
//!     → stored as the key of a mapping registration
//! ```
//!
//! # Design Decisions
//! - One sum type, one match arm per syntax on the hot path
//! - Equality is structural: `servlet|/a` and `/a` are the same spec
//! - Parsing is pure; the same input always yields an equal value
//! - Precedence is a total order: group rank, then literal length

mod pattern;
mod servlet;
mod template;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

pub use pattern::RegexSpec;
pub use template::UriTemplate;

const REGEX_PREFIX: &str = "regex|";
const TEMPLATE_PREFIX: &str = "uri-template|";
const SERVLET_PREFIX: &str = "servlet|";

/// Reasons a raw specification cannot be turned into a [`PathSpec`].
///
/// Every variant is a malformed specification; the registry itself never
/// produces one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathSpecError {
    #[error("path spec is empty")]
    Empty,

    #[error("path spec `{0}` must start with '/' or '*.'")]
    Unclassified(String),

    #[error("suffix path spec `{0}` must name an extension without '/' or '*'")]
    InvalidSuffix(String),

    #[error("regex path spec `{spec}` does not compile: {reason}")]
    InvalidRegex { spec: String, reason: String },

    #[error("uri-template path spec `{spec}` is invalid: {reason}")]
    InvalidTemplate { spec: String, reason: String },
}

/// Syntax family of a spec, ordered from least to most specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSpecGroup {
    Regex,
    Template,
    Suffix,
    Prefix,
    Exact,
}

impl PathSpecGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathSpecGroup::Regex => "regex",
            PathSpecGroup::Template => "template",
            PathSpecGroup::Suffix => "suffix",
            PathSpecGroup::Prefix => "prefix",
            PathSpecGroup::Exact => "exact",
        }
    }
}

/// Precedence key. Compares group first, then the length of the literal
/// portion of the declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    pub group: PathSpecGroup,
    pub literal_len: usize,
}

/// A parsed, immutable matcher over request paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSpec {
    /// Matches one literal path.
    Exact(String),
    /// `"/a/*"` stored as `"/a"`; `"/*"` stored as `""`.
    Prefix(String),
    /// `"*.ext"` stored as `"ext"`.
    Suffix(String),
    Template(UriTemplate),
    Regex(RegexSpec),
}

impl PathSpec {
    /// Parse a raw specification.
    ///
    /// Recognized syntaxes, checked in this order:
    /// - `regex|{expr}` or `^{expr}`: anchored regular expression
    /// - `uri-template|{template}`: literal segments and `{name}` segments
    /// - `servlet|{spec}` or a bare spec: `/exact`, `/prefix/*`, `*.ext`
    pub fn parse(raw: &str) -> Result<Self, PathSpecError> {
        if let Some(expr) = raw.strip_prefix(REGEX_PREFIX) {
            return RegexSpec::parse(expr).map(PathSpec::Regex);
        }
        if raw.starts_with('^') {
            return RegexSpec::parse(raw).map(PathSpec::Regex);
        }
        if let Some(template) = raw.strip_prefix(TEMPLATE_PREFIX) {
            return UriTemplate::parse(template).map(PathSpec::Template);
        }
        servlet::parse(raw.strip_prefix(SERVLET_PREFIX).unwrap_or(raw))
    }

    /// The spec registered by `register` and `set_creator`.
    pub fn root() -> Self {
        PathSpec::Exact("/".to_string())
    }

    pub fn is_root(&self) -> bool {
        matches!(self, PathSpec::Exact(path) if path == "/")
    }

    pub fn group(&self) -> PathSpecGroup {
        match self {
            PathSpec::Exact(_) => PathSpecGroup::Exact,
            PathSpec::Prefix(_) => PathSpecGroup::Prefix,
            PathSpec::Suffix(_) => PathSpecGroup::Suffix,
            PathSpec::Template(_) => PathSpecGroup::Template,
            PathSpec::Regex(_) => PathSpecGroup::Regex,
        }
    }

    pub fn specificity(&self) -> Specificity {
        let literal_len = match self {
            PathSpec::Exact(path) => path.len(),
            PathSpec::Prefix(prefix) => prefix.len(),
            PathSpec::Suffix(ext) => ext.len(),
            PathSpec::Template(template) => template.literal_len(),
            PathSpec::Regex(regex) => regex.literal_len(),
        };
        Specificity {
            group: self.group(),
            literal_len,
        }
    }

    /// Returns true if `path` is matched by this spec.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathSpec::Exact(exact) => exact == path,
            PathSpec::Prefix(prefix) => servlet::prefix_matches(prefix, path),
            PathSpec::Suffix(ext) => servlet::suffix_matches(ext, path),
            PathSpec::Template(template) => template.matches(path),
            PathSpec::Regex(regex) => regex.matches(path),
        }
    }

    /// Named captures of `path`: template variables or regex named groups.
    ///
    /// `None` when the path does not match; an empty map for servlet specs.
    pub fn path_params(&self, path: &str) -> Option<BTreeMap<String, String>> {
        match self {
            PathSpec::Template(template) => template.captures(path),
            PathSpec::Regex(regex) => regex.captures(path),
            _ if self.matches(path) => Some(BTreeMap::new()),
            _ => None,
        }
    }

    /// Portion of `path` after a prefix spec's literal, e.g. `/x/y` for
    /// `/a/*` against `/a/x/y`.
    pub fn path_info<'p>(&self, path: &'p str) -> Option<&'p str> {
        match self {
            PathSpec::Prefix(prefix) if servlet::prefix_matches(prefix, path) => {
                Some(&path[prefix.len()..])
            }
            _ => None,
        }
    }
}

impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSpec::Exact(path) => f.write_str(path),
            PathSpec::Prefix(prefix) => write!(f, "{}/*", prefix),
            PathSpec::Suffix(ext) => write!(f, "*.{}", ext),
            PathSpec::Template(template) => write!(f, "{}{}", TEMPLATE_PREFIX, template),
            PathSpec::Regex(regex) => f.write_str(regex.as_str()),
        }
    }
}

impl FromStr for PathSpec {
    type Err = PathSpecError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        PathSpec::parse(raw)
    }
}

/// Parse a raw specification string. See [`PathSpec::parse`].
pub fn parse_path_spec(raw: &str) -> Result<PathSpec, PathSpecError> {
    PathSpec::parse(raw)
}

/// Accepts either a raw specification or an already parsed [`PathSpec`].
pub trait IntoPathSpec {
    fn into_path_spec(self) -> Result<PathSpec, PathSpecError>;
}

impl IntoPathSpec for PathSpec {
    fn into_path_spec(self) -> Result<PathSpec, PathSpecError> {
        Ok(self)
    }
}

impl IntoPathSpec for &PathSpec {
    fn into_path_spec(self) -> Result<PathSpec, PathSpecError> {
        Ok(self.clone())
    }
}

impl IntoPathSpec for &str {
    fn into_path_spec(self) -> Result<PathSpec, PathSpecError> {
        PathSpec::parse(self)
    }
}

impl IntoPathSpec for String {
    fn into_path_spec(self) -> Result<PathSpec, PathSpecError> {
        PathSpec::parse(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_selection() {
        assert_eq!(PathSpec::parse("/a/b").unwrap().group(), PathSpecGroup::Exact);
        assert_eq!(PathSpec::parse("/a/*").unwrap().group(), PathSpecGroup::Prefix);
        assert_eq!(PathSpec::parse("*.do").unwrap().group(), PathSpecGroup::Suffix);
        assert_eq!(PathSpec::parse("^/a/.*$").unwrap().group(), PathSpecGroup::Regex);
        assert_eq!(PathSpec::parse("regex|/a/[0-9]+").unwrap().group(), PathSpecGroup::Regex);
        assert_eq!(
            PathSpec::parse("uri-template|/a/{id}").unwrap().group(),
            PathSpecGroup::Template
        );
        assert_eq!(PathSpec::parse("servlet|/a/*").unwrap().group(), PathSpecGroup::Prefix);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let raws = [
            "/",
            "/chat",
            "/chat/*",
            "/*",
            "*.json",
            "^/room/[a-z]+$",
            "regex|/room/(?P<id>[0-9]+)",
            "uri-template|/room/{id}/log",
            "servlet|/x",
        ];
        for raw in raws {
            assert_eq!(PathSpec::parse(raw).unwrap(), PathSpec::parse(raw).unwrap(), "{}", raw);
        }
    }

    #[test]
    fn test_structural_equality_ignores_syntax_prefix() {
        assert_eq!(PathSpec::parse("servlet|/a").unwrap(), PathSpec::parse("/a").unwrap());
        assert_eq!(
            PathSpec::parse("regex|^/a$").unwrap(),
            PathSpec::parse("^/a$").unwrap()
        );
        assert_eq!(PathSpec::parse("regex|/a").unwrap(), PathSpec::parse("^/a$").unwrap());
        assert_ne!(PathSpec::parse("/a").unwrap(), PathSpec::parse("/a/*").unwrap());
    }

    #[test]
    fn test_display_reparses_to_equal_spec() {
        for raw in ["/a", "/a/*", "/*", "*.txt", "regex|/x/.*", "uri-template|/u/{name}"] {
            let spec = PathSpec::parse(raw).unwrap();
            let again: PathSpec = spec.to_string().parse().unwrap();
            assert_eq!(spec, again, "{}", raw);
        }
    }

    #[test]
    fn test_precedence_order() {
        let exact = PathSpec::parse("/a/b").unwrap().specificity();
        let prefix = PathSpec::parse("/a/b/c/*").unwrap().specificity();
        let suffix = PathSpec::parse("*.html").unwrap().specificity();
        let template = PathSpec::parse("uri-template|/a/{b}").unwrap().specificity();
        let regex = PathSpec::parse("^/a/b$").unwrap().specificity();
        assert!(exact > prefix);
        assert!(prefix > suffix);
        assert!(suffix > template);
        assert!(template > regex);

        let short = PathSpec::parse("/a/*").unwrap().specificity();
        assert!(prefix > short);
    }

    #[test]
    fn test_malformed_specs() {
        assert_eq!(PathSpec::parse(""), Err(PathSpecError::Empty));
        assert!(matches!(PathSpec::parse("chat"), Err(PathSpecError::Unclassified(_))));
        assert!(matches!(PathSpec::parse("*."), Err(PathSpecError::InvalidSuffix(_))));
        assert!(matches!(PathSpec::parse("^/a/(unclosed"), Err(PathSpecError::InvalidRegex { .. })));
        assert!(matches!(
            PathSpec::parse("uri-template|/a/{b"),
            Err(PathSpecError::InvalidTemplate { .. })
        ));
    }

    #[test]
    fn test_path_info_and_params() {
        let prefix = PathSpec::parse("/files/*").unwrap();
        assert_eq!(prefix.path_info("/files/a/b.txt"), Some("/a/b.txt"));
        assert_eq!(prefix.path_info("/files"), Some(""));
        assert_eq!(prefix.path_info("/other"), None);

        let template = PathSpec::parse("uri-template|/room/{id}").unwrap();
        let params = template.path_params("/room/42").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
        assert!(template.path_params("/room").is_none());

        let exact = PathSpec::parse("/a").unwrap();
        assert_eq!(exact.path_params("/a"), Some(BTreeMap::new()));
    }

    #[test]
    fn test_into_path_spec() {
        assert!("/a".into_path_spec().is_ok());
        assert!(String::from("nope").into_path_spec().is_err());
        assert!(PathSpec::root().into_path_spec().unwrap().is_root());
    }
}
