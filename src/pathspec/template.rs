//! URI template specs (`uri-template|/room/{id}`).
//!
//! Only level-1 templates are supported: every segment is either a literal
//! or a single `{name}` placeholder spanning the whole segment.

use std::collections::BTreeMap;
use std::fmt;

use super::PathSpecError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed URI template. `/` alone is the template with no segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UriTemplate {
    segments: Vec<Segment>,
}

impl UriTemplate {
    pub(super) fn parse(template: &str) -> Result<Self, PathSpecError> {
        let invalid = |reason: &str| PathSpecError::InvalidTemplate {
            spec: template.to_string(),
            reason: reason.to_string(),
        };

        if template.is_empty() {
            return Err(PathSpecError::Empty);
        }
        let body = template
            .strip_prefix('/')
            .ok_or_else(|| invalid("template must start with '/'"))?;
        if body.is_empty() {
            return Ok(Self {
                segments: Vec::new(),
            });
        }

        let mut segments = Vec::new();
        for raw in body.split('/') {
            if raw.is_empty() {
                return Err(invalid("empty path segment"));
            }
            if let Some(inner) = raw.strip_prefix('{') {
                let name = inner
                    .strip_suffix('}')
                    .ok_or_else(|| invalid("unterminated placeholder"))?;
                if !is_variable_name(name) {
                    return Err(invalid("placeholder name must be [A-Za-z0-9_.-]+"));
                }
                if segments.contains(&Segment::Variable(name.to_string())) {
                    return Err(invalid("duplicate placeholder name"));
                }
                segments.push(Segment::Variable(name.to_string()));
            } else if raw.contains(['{', '}']) {
                return Err(invalid("placeholder must span a whole segment"));
            } else if raw.contains('*') {
                return Err(invalid("wildcards are not supported"));
            } else {
                segments.push(Segment::Literal(raw.to_string()));
            }
        }

        Ok(Self { segments })
    }

    pub(super) fn literal_len(&self) -> usize {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(literal) => literal.len(),
                Segment::Variable(_) => 0,
            })
            .sum()
    }

    /// Names of the placeholders, in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Variable(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub(super) fn matches(&self, path: &str) -> bool {
        self.walk(path, |_, _| {})
    }

    pub(super) fn captures(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let mut params = BTreeMap::new();
        let matched = self.walk(path, |name, value| {
            params.insert(name.to_string(), value.to_string());
        });
        matched.then_some(params)
    }

    /// Compares `path` segment by segment, reporting each variable binding.
    fn walk<'p>(&self, path: &'p str, mut bind: impl FnMut(&str, &'p str)) -> bool {
        let Some(body) = path.strip_prefix('/') else {
            return false;
        };
        if self.segments.is_empty() {
            return body.is_empty();
        }

        let mut parts = body.split('/');
        for segment in &self.segments {
            let Some(part) = parts.next() else {
                return false;
            };
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Variable(name) if !part.is_empty() => bind(name, part),
                _ => return false,
            }
        }
        parts.next().is_none()
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => write!(f, "/{}", literal)?,
                Segment::Variable(name) => write!(f, "/{{{}}}", name)?,
            }
        }
        Ok(())
    }
}

fn is_variable_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
