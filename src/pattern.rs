//! Content-type pattern matching.
//!
//! Parsers and the text fallback allowlist declare the media types they
//! accept as patterns: an exact `type/subtype`, a `type/*` wildcard, or a
//! `+suffix` structured-syntax suffix (so `+json` matches
//! `application/problem+json`). A few bare shorthands common in middleware
//! configuration (`json`, `urlencoded`, `multipart`, `text`, `xml`, `html`)
//! are expanded to their canonical form.

use thiserror::Error;

/// A pattern string that could not be understood at setup time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid mime pattern: \"{0}\"")]
pub struct InvalidMimePattern(pub String);

/// A single media-type matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimePattern {
    kind: PatternKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternKind {
    /// Full `type/subtype` equality.
    Exact(String),
    /// `type/*`: any subtype of the given type.
    Type(String),
    /// `+suffix`: any subtype carrying the structured-syntax suffix.
    Suffix(String),
    /// `*/*`: any media type at all.
    Any,
}

impl MimePattern {
    /// An exact `type/subtype` pattern.
    pub fn exact<S: AsRef<str>>(essence: S) -> Self {
        Self { kind: PatternKind::Exact(essence.as_ref().to_ascii_lowercase()) }
    }

    /// A `type/*` wildcard pattern.
    pub fn type_wildcard<S: AsRef<str>>(r#type: S) -> Self {
        Self { kind: PatternKind::Type(r#type.as_ref().to_ascii_lowercase()) }
    }

    /// A `+suffix` structured-syntax pattern.
    pub fn suffix<S: AsRef<str>>(suffix: S) -> Self {
        Self { kind: PatternKind::Suffix(suffix.as_ref().to_ascii_lowercase()) }
    }

    /// The `*/*` pattern, matching any media type.
    pub fn any() -> Self {
        Self { kind: PatternKind::Any }
    }

    /// Parses a pattern string, expanding shorthands.
    pub fn parse(pattern: &str) -> Result<Self, InvalidMimePattern> {
        let pattern = pattern.trim().to_ascii_lowercase();
        if pattern.is_empty() {
            return Err(InvalidMimePattern(pattern));
        }

        if let Some(suffix) = pattern.strip_prefix("*/*+").or_else(|| pattern.strip_prefix('+')) {
            return if suffix.is_empty() || suffix.contains('/') {
                Err(InvalidMimePattern(pattern.clone()))
            } else {
                Ok(Self::suffix(suffix))
            };
        }

        match pattern.split_once('/') {
            Some(("*", "*")) => Ok(Self::any()),
            Some((r#type, "*")) if !r#type.is_empty() => Ok(Self::type_wildcard(r#type)),
            Some((r#type, subtype))
                if !r#type.is_empty() && !subtype.is_empty() && !subtype.contains('/') =>
            {
                Ok(Self::exact(&pattern))
            }
            Some(_) => Err(InvalidMimePattern(pattern)),
            // bare shorthands, as accepted by middleware configuration
            None => match pattern.as_str() {
                "json" => Ok(Self::exact("application/json")),
                "urlencoded" => Ok(Self::exact("application/x-www-form-urlencoded")),
                "multipart" => Ok(Self::type_wildcard("multipart")),
                "text" => Ok(Self::exact("text/plain")),
                "xml" => Ok(Self::exact("application/xml")),
                "html" => Ok(Self::exact("text/html")),
                _ => Err(InvalidMimePattern(pattern)),
            },
        }
    }

    /// Tests a content type essence (`type/subtype`, lowercase, no
    /// parameters) against this pattern.
    pub fn matches(&self, essence: &str) -> bool {
        match &self.kind {
            PatternKind::Exact(exact) => essence == exact,
            PatternKind::Type(r#type) => {
                essence.split_once('/').is_some_and(|(t, _)| t == r#type)
            }
            PatternKind::Suffix(suffix) => essence
                .split_once('/')
                .is_some_and(|(_, subtype)| {
                    subtype.strip_suffix(suffix.as_str()).is_some_and(|rest| rest.ends_with('+'))
                }),
            PatternKind::Any => true,
        }
    }
}
