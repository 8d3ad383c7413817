//! URL template compilation and matching.
//!
//! # Responsibilities
//! - Compile templates such as `/items/{id}.{format}` into segment matchers
//! - Match concrete paths, extracting named parameters
//! - Split a trailing `.format` token off the path
//!
//! # Design Decisions
//! - Segment-by-segment comparison, no regex, O(segments) per match
//! - Literal comparison is case-sensitive against the decoded segment
//! - A `.token` suffix is tried as a format first and only kept in the
//!   segment when the bare path does not match
//! - Parameter values are percent-decoded; invalid UTF-8 keeps the raw text

use std::collections::HashMap;

use thiserror::Error;

/// Placeholder that captures the format suffix.
const FORMAT_SUFFIX: &str = ".{format}";

/// Errors raised while compiling a URL template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("URL template must start with '/': {0}")]
    MissingLeadingSlash(String),

    #[error("unbalanced braces in URL template segment '{0}'")]
    UnbalancedBraces(String),

    #[error("invalid placeholder name '{name}' in URL template {template}")]
    InvalidName { template: String, name: String },

    #[error("placeholder '{name}' appears more than once in URL template {template}")]
    DuplicateName { template: String, name: String },
}

/// One compiled template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// The result of matching a path against a pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlMatch {
    params: HashMap<String, String>,
    format: Option<String>,
}

impl UrlMatch {
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Format token from the path suffix, if any.
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }
}

/// A compiled URL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPattern {
    template: String,
    pattern: String,
    segments: Vec<Segment>,
    declares_format: bool,
}

impl UrlPattern {
    /// Compile a template.
    pub fn compile(template: &str) -> Result<Self, PatternError> {
        if !template.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(template.to_string()));
        }

        let (pattern, declares_format) = match template.strip_suffix(FORMAT_SUFFIX) {
            Some(stripped) => (stripped, true),
            None => (template, false),
        };

        let mut segments: Vec<Segment> = Vec::new();
        for raw in split_segments(pattern) {
            let segment = parse_segment(template, raw)?;
            if let Segment::Param(name) = &segment {
                if segments.contains(&segment) {
                    return Err(PatternError::DuplicateName {
                        template: template.to_string(),
                        name: name.clone(),
                    });
                }
            }
            segments.push(segment);
        }

        let pattern = if pattern.is_empty() { "/" } else { pattern };

        Ok(Self {
            template: template.to_string(),
            pattern: pattern.to_string(),
            segments,
            declares_format,
        })
    }

    /// The template as registered, including any `.{format}` suffix.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The template without its `.{format}` suffix.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether the template declares a `.{format}` suffix.
    pub fn declares_format(&self) -> bool {
        self.declares_format
    }

    /// Placeholder names in template order.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Match a concrete path (without query string).
    pub fn matches(&self, path: &str) -> Option<UrlMatch> {
        let mut segments: Vec<&str> = split_segments(path).collect();

        if let Some(last) = segments.last().copied() {
            if let Some((bare, format)) = split_format(last) {
                let index = segments.len() - 1;
                segments[index] = bare;
                if let Some(params) = self.match_segments(&segments) {
                    return Some(UrlMatch {
                        params,
                        format: Some(format.to_string()),
                    });
                }
                segments[index] = last;
            }
        }

        self.match_segments(&segments).map(|params| UrlMatch {
            params,
            format: None,
        })
    }

    /// Whether every path this pattern matches is also matched by `other`.
    pub(crate) fn is_shadowed_by(&self, other: &UrlPattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(mine, theirs)| match (mine, theirs) {
                    (_, Segment::Param(_)) => true,
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Param(_), Segment::Literal(_)) => false,
                })
    }

    /// Same segment shape, ignoring placeholder names.
    pub(crate) fn same_shape(&self, other: &UrlPattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| match (a, b) {
                    (Segment::Param(_), Segment::Param(_)) => true,
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    _ => false,
                })
    }

    fn match_segments(&self, path: &[&str]) -> Option<HashMap<String, String>> {
        if path.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::with_capacity(self.segments.len());
        for (segment, raw) in self.segments.iter().zip(path) {
            let value = decode(raw);
            match segment {
                Segment::Literal(literal) => {
                    if *literal != value {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if raw.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), value);
                }
            }
        }
        Some(params)
    }
}

impl std::fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.template)
    }
}

/// Split a path into segments, ignoring the leading and one trailing slash.
fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    let skip = usize::from(trimmed.is_empty());
    trimmed.split('/').skip(skip)
}

fn parse_segment(template: &str, raw: &str) -> Result<Segment, PatternError> {
    let opens = raw.matches('{').count();
    let closes = raw.matches('}').count();

    if opens == 0 && closes == 0 {
        return Ok(Segment::Literal(raw.to_string()));
    }
    if opens != 1 || closes != 1 || !raw.starts_with('{') || !raw.ends_with('}') {
        return Err(PatternError::UnbalancedBraces(raw.to_string()));
    }

    let name = &raw[1..raw.len() - 1];
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(PatternError::InvalidName {
            template: template.to_string(),
            name: name.to_string(),
        });
    }
    Ok(Segment::Param(name.to_string()))
}

/// Split `name.json` into `("name", "json")` when the suffix is a word token.
fn split_format(segment: &str) -> Option<(&str, &str)> {
    let dot = segment.rfind('.')?;
    let (bare, format) = (&segment[..dot], &segment[dot + 1..]);
    let is_token = !format.is_empty()
        && format
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if bare.is_empty() || !is_token {
        return None;
    }
    Some((bare, format))
}

/// Percent-decode a path segment. `+` is left alone (it is literal in paths).
fn decode(raw: &str) -> String {
    if !raw.contains('%') {
        return raw.to_string();
    }

    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8(out).unwrap_or_else(|_| raw.to_string())
}

fn hex(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
