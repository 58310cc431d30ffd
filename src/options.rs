//! Process-wide body ingestion configuration.
//!
//! Built once at startup and shared read-only across requests, usually
//! behind an `Arc`. The registered parsers are consulted in insertion
//! order; the first one whose accepted types match wins.

use crate::parser::{JsonParser, ParserDescriptor, UrlEncodedParser};
use crate::pattern::{InvalidMimePattern, MimePattern};
use http::Method;

/// Default body size limit: 1 MiB.
pub const DEFAULT_LIMIT: usize = 1024 * 1024;

/// Configuration for the body ingestion pipeline.
#[derive(Debug)]
pub struct BodyOptions {
    limit: Option<usize>,
    default_charset: String,
    inflate: bool,
    text_types: Vec<MimePattern>,
    parsers: Vec<ParserDescriptor>,
    methods: Vec<Method>,
}

impl Default for BodyOptions {
    fn default() -> Self {
        Self {
            limit: Some(DEFAULT_LIMIT),
            default_charset: "utf-8".to_owned(),
            inflate: true,
            text_types: vec![
                MimePattern::type_wildcard("text"),
                MimePattern::exact("application/xml"),
            ],
            parsers: vec![
                ParserDescriptor::text(JsonParser::new()),
                ParserDescriptor::text(UrlEncodedParser::new()),
            ],
            methods: vec![Method::POST, Method::PUT, Method::PATCH],
        }
    }
}

impl BodyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the byte-size limit applied to (inflated) request bodies.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Removes the size limit entirely.
    #[must_use]
    pub fn without_limit(mut self) -> Self {
        self.limit = None;
        self
    }

    /// Sets the charset used when the request declares none.
    #[must_use]
    pub fn with_default_charset<S: Into<String>>(mut self, charset: S) -> Self {
        self.default_charset = charset.into();
        self
    }

    /// Enables or disables transparent gzip/deflate decompression.
    #[must_use]
    pub fn with_inflate(mut self, inflate: bool) -> Self {
        self.inflate = inflate;
        self
    }

    /// Replaces the text fallback allowlist with the given patterns.
    pub fn with_text_types<I, S>(mut self, patterns: I) -> Result<Self, InvalidMimePattern>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.text_types =
            patterns.into_iter().map(|p| MimePattern::parse(p.as_ref())).collect::<Result<_, _>>()?;
        Ok(self)
    }

    /// Replaces the parser registry.
    #[must_use]
    pub fn with_parsers<I: IntoIterator<Item = ParserDescriptor>>(mut self, parsers: I) -> Self {
        self.parsers = parsers.into_iter().collect();
        self
    }

    /// Appends a parser after the currently registered ones.
    #[must_use]
    pub fn add_parser(mut self, parser: ParserDescriptor) -> Self {
        self.parsers.push(parser);
        self
    }

    /// Replaces the set of methods whose bodies are processed.
    #[must_use]
    pub fn with_methods<I: IntoIterator<Item = Method>>(mut self, methods: I) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn default_charset(&self) -> &str {
        &self.default_charset
    }

    pub fn inflate(&self) -> bool {
        self.inflate
    }

    pub fn text_types(&self) -> &[MimePattern] {
        &self.text_types
    }

    pub fn parsers(&self) -> &[ParserDescriptor] {
        &self.parsers
    }

    pub(crate) fn method_eligible(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }
}
