//! Pluggable body parsers.
//!
//! A parser is a capability record: the media types it accepts, whether its
//! output is object-shaped (eligible for the structured view), and a parse
//! function. Two variants exist, one consuming decoded text and one
//! consuming raw bytes; [`ParserDescriptor`] tags which is which so the
//! dispatcher knows what input to prepare.
//!
//! Parsers are registered once at setup and shared read-only across
//! requests; they must hold no per-request state.

use crate::error::BodyError;
use crate::pattern::MimePattern;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A parser operating on charset-decoded text.
pub trait TextParser: Send + Sync {
    /// Structural type name this parser declares (e.g. `json`).
    fn name(&self) -> &'static str;

    /// Media-type patterns the parser accepts.
    fn accepted_types(&self) -> &[MimePattern];

    /// Whether a successful parse yields a key-value mapping.
    fn objected(&self) -> bool {
        false
    }

    fn parse(&self, text: &str) -> Result<Value, BodyError>;
}

/// A parser operating on the raw (post-inflate) byte buffer.
pub trait RawParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn accepted_types(&self) -> &[MimePattern];

    fn objected(&self) -> bool {
        false
    }

    fn parse(&self, bytes: &[u8]) -> Result<Value, BodyError>;
}

/// A registered parser, tagged by the input it consumes.
#[derive(Clone)]
pub enum ParserDescriptor {
    Text(Arc<dyn TextParser>),
    Raw(Arc<dyn RawParser>),
}

impl ParserDescriptor {
    /// Wraps a text parser.
    pub fn text<P: TextParser + 'static>(parser: P) -> Self {
        Self::Text(Arc::new(parser))
    }

    /// Wraps a raw parser.
    pub fn raw<P: RawParser + 'static>(parser: P) -> Self {
        Self::Raw(Arc::new(parser))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Text(parser) => parser.name(),
            Self::Raw(parser) => parser.name(),
        }
    }

    pub fn objected(&self) -> bool {
        match self {
            Self::Text(parser) => parser.objected(),
            Self::Raw(parser) => parser.objected(),
        }
    }

    pub(crate) fn matches(&self, essence: &str) -> bool {
        let types = match self {
            Self::Text(parser) => parser.accepted_types(),
            Self::Raw(parser) => parser.accepted_types(),
        };
        types.iter().any(|pattern| pattern.matches(essence))
    }
}

impl fmt::Debug for ParserDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Text(_) => "text",
            Self::Raw(_) => "raw",
        };
        f.debug_struct("ParserDescriptor")
            .field("name", &self.name())
            .field("kind", &kind)
            .field("objected", &self.objected())
            .finish()
    }
}

/// Strict JSON parser: the root must be an object or an array.
///
/// Accepts `application/json` and any `+json` structured syntax. The root
/// check admits only RFC 7159 whitespace before the opening `{` or `[`,
/// which rejects primitives and the various "JSON-ish" payloads browsers
/// can be tricked into sending cross-origin.
#[derive(Debug)]
pub struct JsonParser {
    types: [MimePattern; 2],
}

impl JsonParser {
    pub fn new() -> Self {
        Self { types: [MimePattern::exact("application/json"), MimePattern::suffix("json")] }
    }
}

impl Default for JsonParser {
    fn default() -> Self {
        Self::new()
    }
}

fn is_rfc7159_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

impl TextParser for JsonParser {
    fn name(&self) -> &'static str {
        "json"
    }

    fn accepted_types(&self) -> &[MimePattern] {
        &self.types
    }

    fn objected(&self) -> bool {
        true
    }

    fn parse(&self, text: &str) -> Result<Value, BodyError> {
        let trimmed = text.trim_start_matches(is_rfc7159_whitespace);
        if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
            return Err(BodyError::JsonStrict);
        }
        serde_json::from_str(text).map_err(BodyError::json_parse)
    }
}

/// `application/x-www-form-urlencoded` parser.
///
/// Decoded as a flat string map; a repeated key keeps its last value.
#[derive(Debug)]
pub struct UrlEncodedParser {
    types: [MimePattern; 1],
}

impl UrlEncodedParser {
    pub fn new() -> Self {
        Self { types: [MimePattern::exact("application/x-www-form-urlencoded")] }
    }
}

impl Default for UrlEncodedParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TextParser for UrlEncodedParser {
    fn name(&self) -> &'static str {
        "form"
    }

    fn accepted_types(&self) -> &[MimePattern] {
        &self.types
    }

    fn objected(&self) -> bool {
        true
    }

    fn parse(&self, text: &str) -> Result<Value, BodyError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(text)
            .map_err(|e| BodyError::parse_failed(self.name(), e))?;
        let mut map = serde_json::Map::with_capacity(pairs.len());
        for (key, value) in pairs {
            map.insert(key, Value::String(value));
        }
        Ok(Value::Object(map))
    }
}
