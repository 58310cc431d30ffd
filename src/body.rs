//! Per-request body ingestion context.
//!
//! [`BodyContext`] owns one request's body stream and drives it through
//! the pipeline stages on demand: raw bytes, decoded text, content-type
//! dispatch, structured view. Each stage runs at most once; its result
//! (success or failure) is memoized for the lifetime of the context, so
//! repeated access never re-reads the stream. The context is destroyed
//! with the request and shares nothing mutable with other requests.

use crate::charset;
use crate::error::BodyError;
use crate::options::BodyOptions;
use crate::parser::ParserDescriptor;
use crate::reader;
use bytes::Bytes;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, Method, Request};
use http_body::Body;
use mime::Mime;
use serde_json::{Map, Value};
use std::fmt::{self, Display};
use std::sync::Arc;
use tracing::debug;

/// The structural kind of a dispatched body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// No body, empty body, or method not eligible for body processing.
    None,
    /// Unmatched content type; the value is the raw byte buffer.
    Raw,
    /// Text fallback; the value is the decoded string.
    Text,
    /// A registered parser matched; carries its declared type name.
    Parsed(&'static str),
}

impl Display for BodyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Raw => f.write_str("raw"),
            Self::Text => f.write_str("text"),
            Self::Parsed(name) => f.write_str(name),
        }
    }
}

/// The payload of a dispatched body.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyValue {
    Raw(Bytes),
    Text(String),
    Parsed(Value),
}

/// Outcome of content-type dispatch for one request.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    kind: BodyKind,
    value: Option<BodyValue>,
    parser: Option<ParserDescriptor>,
}

impl DispatchResult {
    fn none() -> Self {
        Self { kind: BodyKind::None, value: None, parser: None }
    }

    fn raw(bytes: Bytes) -> Self {
        Self { kind: BodyKind::Raw, value: Some(BodyValue::Raw(bytes)), parser: None }
    }

    fn text(text: String) -> Self {
        Self { kind: BodyKind::Text, value: Some(BodyValue::Text(text)), parser: None }
    }

    fn parsed(value: Value, parser: ParserDescriptor) -> Self {
        Self {
            kind: BodyKind::Parsed(parser.name()),
            value: Some(BodyValue::Parsed(value)),
            parser: Some(parser),
        }
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn value(&self) -> Option<&BodyValue> {
        self.value.as_ref()
    }

    /// The parser that produced the value, if any matched.
    pub fn parser(&self) -> Option<&ParserDescriptor> {
        self.parser.as_ref()
    }
}

/// Per-request ingestion context over a body stream `B`.
pub struct BodyContext<B> {
    method: Method,
    headers: HeaderMap,
    options: Arc<BodyOptions>,
    stream: Option<B>,
    raw: Option<Result<Option<Bytes>, BodyError>>,
    text: Option<Result<Option<String>, BodyError>>,
    dispatched: Option<Result<DispatchResult, BodyError>>,
}

impl<B> fmt::Debug for BodyContext<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyContext")
            .field("method", &self.method)
            .field("raw", &self.raw.is_some())
            .field("text", &self.text.is_some())
            .field("dispatched", &self.dispatched.is_some())
            .finish()
    }
}

impl<B> BodyContext<B> {
    pub fn new(method: Method, headers: HeaderMap, stream: B, options: Arc<BodyOptions>) -> Self {
        Self { method, headers, options, stream: Some(stream), raw: None, text: None, dispatched: None }
    }

    /// Splits an `http::Request` into its header state and body stream.
    pub fn from_request(request: Request<B>, options: Arc<BodyOptions>) -> Self {
        let (parts, body) = request.into_parts();
        Self::new(parts.method, parts.headers, body, options)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The declared `Content-Length`, if present and well-formed.
    fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    fn content_type(&self) -> Option<Mime> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }

    /// The charset label to decode with: the `Content-Type` charset
    /// parameter, else the configured default.
    fn charset_label(&self) -> String {
        self.content_type()
            .as_ref()
            .and_then(|ct| ct.get_param(mime::CHARSET))
            .map(|cs| cs.as_str().to_owned())
            .unwrap_or_else(|| self.options.default_charset().to_owned())
    }
}

impl<B> BodyContext<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Display,
{
    /// The full (inflated) body bytes, or `None` when the request carries
    /// no body or its method is not configured for body processing.
    /// Reads the stream on first call, memoized afterwards.
    pub async fn raw(&mut self) -> Result<Option<Bytes>, BodyError> {
        if let Some(memo) = &self.raw {
            return memo.clone();
        }
        let result = self.read_raw().await;
        self.raw = Some(result.clone());
        result
    }

    async fn read_raw(&mut self) -> Result<Option<Bytes>, BodyError> {
        // bodies on ineligible methods are never read
        if !self.options.method_eligible(&self.method) {
            return Ok(None);
        }

        let declared = self.content_length();
        // zero-length short-circuit, nothing to pull off the stream
        if declared == Some(0) {
            return Ok(None);
        }

        let Some(stream) = self.stream.take() else {
            return Err(BodyError::stream_not_readable());
        };
        if declared.is_none() && stream.is_end_stream() {
            return Ok(None);
        }

        let encoding = self
            .headers
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let buf = reader::read_to_end(
            stream,
            declared,
            self.options.limit(),
            encoding.as_deref(),
            self.options.inflate(),
        )
        .await?;
        Ok(Some(buf))
    }

    /// The charset-decoded body text, or `None` when there is no body.
    ///
    /// Charset resolution happens here, not earlier: a request whose body
    /// is never demanded as text can carry an unknown charset without
    /// failing.
    pub async fn text(&mut self) -> Result<Option<String>, BodyError> {
        if let Some(memo) = &self.text {
            return memo.clone();
        }
        let result = self.decode_text().await;
        self.text = Some(result.clone());
        result
    }

    async fn decode_text(&mut self) -> Result<Option<String>, BodyError> {
        let Some(bytes) = self.raw().await? else {
            return Ok(None);
        };
        let label = self.charset_label();
        charset::decode(&bytes, &label).map(Some)
    }

    /// Runs content-type dispatch: the first registered parser whose
    /// accepted types match wins; otherwise the text-type fallback, the
    /// raw fallback, or `none`. Memoized per request.
    pub async fn dispatch(&mut self) -> Result<DispatchResult, BodyError> {
        if let Some(memo) = &self.dispatched {
            return memo.clone();
        }
        let result = self.run_dispatch().await;
        self.dispatched = Some(result.clone());
        result
    }

    async fn run_dispatch(&mut self) -> Result<DispatchResult, BodyError> {
        if !self.options.method_eligible(&self.method) {
            return Ok(DispatchResult::none());
        }

        let options = Arc::clone(&self.options);
        if let Some(content_type) = self.content_type() {
            let essence = content_type.essence_str().to_ascii_lowercase();

            for descriptor in options.parsers() {
                if !descriptor.matches(&essence) {
                    continue;
                }
                debug!(parser = descriptor.name(), content_type = %essence, "body parser matched");
                return match descriptor {
                    ParserDescriptor::Text(parser) => match self.text().await? {
                        None => Ok(DispatchResult::none()),
                        Some(text) => {
                            let value = parser.parse(&text)?;
                            Ok(DispatchResult::parsed(value, descriptor.clone()))
                        }
                    },
                    ParserDescriptor::Raw(parser) => match self.raw().await? {
                        None => Ok(DispatchResult::none()),
                        Some(bytes) => {
                            let value = parser.parse(&bytes)?;
                            Ok(DispatchResult::parsed(value, descriptor.clone()))
                        }
                    },
                };
            }

            if options.text_types().iter().any(|pattern| pattern.matches(&essence)) {
                debug!(content_type = %essence, "text fallback matched");
                return match self.text().await? {
                    None => Ok(DispatchResult::none()),
                    Some(text) => Ok(DispatchResult::text(text)),
                };
            }
        }

        match self.raw().await? {
            Some(bytes) if !bytes.is_empty() => Ok(DispatchResult::raw(bytes)),
            _ => Ok(DispatchResult::none()),
        }
    }

    /// Projects the dispatched body as a key-value mapping.
    ///
    /// Only the output of an object-capable (`objected`) parser qualifies;
    /// `text` and `raw` dispatches fail with `ObjectedOnly`. An absent
    /// body is valid and projects to an empty map: the client simply sent
    /// nothing, which is different from sending something malformed.
    pub async fn structured(&mut self) -> Result<Map<String, Value>, BodyError> {
        let result = self.dispatch().await?;
        match (&result.kind, &result.parser, &result.value) {
            (BodyKind::None, _, _) => Ok(Map::new()),
            (BodyKind::Parsed(_), Some(parser), Some(BodyValue::Parsed(value)))
                if parser.objected() =>
            {
                match value {
                    Value::Object(map) => Ok(map.clone()),
                    _ => Err(BodyError::objected_only(result.kind)),
                }
            }
            _ => Err(BodyError::objected_only(result.kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::RawParser;
    use crate::pattern::MimePattern;
    use bytes::Bytes;
    use http_body_util::Full;
    use serde_json::json;

    fn context(
        method: &str,
        content_type: Option<&str>,
        body: &'static [u8],
        options: BodyOptions,
    ) -> BodyContext<Full<Bytes>> {
        let mut builder = Request::builder()
            .method(method)
            .header(CONTENT_LENGTH, body.len());
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        let request = builder.body(Full::new(Bytes::from_static(body))).unwrap();
        BodyContext::from_request(request, Arc::new(options))
    }

    #[tokio::test]
    async fn json_dispatch() {
        let mut ctx =
            context("POST", Some("application/json"), b"  {\"a\":1}", BodyOptions::default());
        let result = ctx.dispatch().await.unwrap();
        assert_eq!(result.kind(), BodyKind::Parsed("json"));
        assert_eq!(result.value(), Some(&BodyValue::Parsed(json!({"a": 1}))));
        assert!(result.parser().is_some_and(ParserDescriptor::objected));
    }

    #[tokio::test]
    async fn json_array_passes_strict_check() {
        let mut ctx =
            context("POST", Some("application/json"), b"[1,2,3]", BodyOptions::default());
        let result = ctx.dispatch().await.unwrap();
        assert_eq!(result.value(), Some(&BodyValue::Parsed(json!([1, 2, 3]))));
    }

    #[tokio::test]
    async fn json_strict_violation() {
        let mut ctx =
            context("POST", Some("application/json"), b"not json", BodyOptions::default());
        assert_eq!(ctx.dispatch().await.unwrap_err(), BodyError::JsonStrict);
    }

    #[tokio::test]
    async fn suffix_type_hits_json_parser() {
        let mut ctx = context(
            "POST",
            Some("application/problem+json; charset=utf-8"),
            b"{\"title\":\"nope\"}",
            BodyOptions::default(),
        );
        let result = ctx.dispatch().await.unwrap();
        assert_eq!(result.kind(), BodyKind::Parsed("json"));
    }

    #[tokio::test]
    async fn form_dispatch() {
        let mut ctx = context(
            "POST",
            Some("application/x-www-form-urlencoded"),
            b"a=1&b=2",
            BodyOptions::default(),
        );
        let result = ctx.dispatch().await.unwrap();
        assert_eq!(result.kind(), BodyKind::Parsed("form"));
        assert_eq!(result.value(), Some(&BodyValue::Parsed(json!({"a": "1", "b": "2"}))));
    }

    #[tokio::test]
    async fn text_fallback() {
        let mut ctx = context("POST", Some("text/plain"), b"plain text", BodyOptions::default());
        let result = ctx.dispatch().await.unwrap();
        assert_eq!(result.kind(), BodyKind::Text);
        assert_eq!(result.value(), Some(&BodyValue::Text("plain text".to_owned())));
        assert!(result.parser().is_none());
    }

    #[tokio::test]
    async fn unmatched_type_falls_back_to_raw() {
        let options = BodyOptions::default().with_text_types(["text/*"]).unwrap();
        let mut ctx = context("POST", Some("application/octet-stream"), b"\x00\x01\x02", options);
        let result = ctx.dispatch().await.unwrap();
        assert_eq!(result.kind(), BodyKind::Raw);
        assert_eq!(result.value(), Some(&BodyValue::Raw(Bytes::from_static(b"\x00\x01\x02"))));
    }

    #[tokio::test]
    async fn text_plain_outside_allowlist_is_raw() {
        let options = BodyOptions::default().with_text_types(["application/xml"]).unwrap();
        let mut ctx = context("POST", Some("text/plain"), b"hello", options);
        let result = ctx.dispatch().await.unwrap();
        assert_eq!(result.kind(), BodyKind::Raw);
    }

    #[tokio::test]
    async fn missing_content_type_is_raw() {
        let mut ctx = context("POST", None, b"opaque", BodyOptions::default());
        let result = ctx.dispatch().await.unwrap();
        assert_eq!(result.kind(), BodyKind::Raw);
    }

    #[tokio::test]
    async fn empty_body_dispatches_none() {
        let mut ctx = context("POST", Some("application/json"), b"", BodyOptions::default());
        let result = ctx.dispatch().await.unwrap();
        assert_eq!(result.kind(), BodyKind::None);
        assert!(result.value().is_none());
    }

    #[tokio::test]
    async fn ineligible_method_never_reads() {
        let mut ctx =
            context("GET", Some("application/json"), b"{\"a\":1}", BodyOptions::default());
        let result = ctx.dispatch().await.unwrap();
        assert_eq!(result.kind(), BodyKind::None);
        // the stream was never taken
        assert!(ctx.stream.is_some());
    }

    #[tokio::test]
    async fn direct_raw_access_respects_method_gating() {
        let mut ctx =
            context("GET", Some("application/json"), b"{\"a\":1}", BodyOptions::default());
        assert_eq!(ctx.raw().await.unwrap(), None);
        assert_eq!(ctx.text().await.unwrap(), None);
        // the stream was never taken
        assert!(ctx.stream.is_some());
    }

    #[tokio::test]
    async fn raw_and_text_are_memoized() {
        let mut ctx = context("POST", Some("text/plain"), b"memo", BodyOptions::default());
        let first = ctx.raw().await.unwrap();
        let second = ctx.raw().await.unwrap();
        assert_eq!(first, second);
        // the stream is consumed exactly once
        assert!(ctx.stream.is_none());
        assert_eq!(ctx.text().await.unwrap(), Some("memo".to_owned()));
        assert_eq!(ctx.text().await.unwrap(), Some("memo".to_owned()));
    }

    #[tokio::test]
    async fn errors_are_memoized_too() {
        let mut ctx =
            context("POST", Some("application/json"), b"not json", BodyOptions::default());
        let first = ctx.dispatch().await.unwrap_err();
        let second = ctx.dispatch().await.unwrap_err();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn structured_view_of_json_object() {
        let mut ctx = context(
            "POST",
            Some("application/json"),
            b"{\"a\":1,\"b\":\"x\"}",
            BodyOptions::default(),
        );
        let map = ctx.structured().await.unwrap();
        assert_eq!(map.get("a"), Some(&json!(1)));
        assert_eq!(map.get("b"), Some(&json!("x")));
    }

    #[tokio::test]
    async fn structured_view_of_empty_body_is_empty_map() {
        let mut ctx = context("POST", Some("application/json"), b"", BodyOptions::default());
        assert!(ctx.structured().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn structured_view_rejects_text() {
        let mut ctx = context("POST", Some("text/plain"), b"words", BodyOptions::default());
        let err = ctx.structured().await.unwrap_err();
        assert_eq!(err, BodyError::objected_only("text"));
    }

    #[tokio::test]
    async fn structured_view_rejects_raw() {
        let mut ctx = context("POST", Some("application/octet-stream"), b"\x01", BodyOptions::default());
        let err = ctx.structured().await.unwrap_err();
        assert_eq!(err, BodyError::objected_only("raw"));
    }

    #[tokio::test]
    async fn structured_view_rejects_array_root() {
        let mut ctx =
            context("POST", Some("application/json"), b"[1,2]", BodyOptions::default());
        let err = ctx.structured().await.unwrap_err();
        assert_eq!(err, BodyError::objected_only("json"));
    }

    #[tokio::test]
    async fn charset_param_drives_decoding() {
        // "你好" in GBK
        let mut ctx = context(
            "POST",
            Some("text/plain; charset=gbk"),
            &[0xc4, 0xe3, 0xba, 0xc3],
            BodyOptions::default(),
        );
        assert_eq!(ctx.text().await.unwrap(), Some("你好".to_owned()));
    }

    #[tokio::test]
    async fn unknown_charset_fails_only_when_text_is_demanded() {
        let options = BodyOptions::default().with_text_types(["text/*"]).unwrap();
        // raw dispatch never decodes, the bogus charset goes unnoticed
        let mut ctx = context(
            "POST",
            Some("application/octet-stream; charset=klingon-8"),
            b"\x01\x02",
            options,
        );
        assert_eq!(ctx.dispatch().await.unwrap().kind(), BodyKind::Raw);

        let mut ctx = context(
            "POST",
            Some("text/plain; charset=klingon-8"),
            b"hi",
            BodyOptions::default(),
        );
        let err = ctx.dispatch().await.unwrap_err();
        assert_eq!(err, BodyError::charset_unsupported("klingon-8"));
    }

    struct EchoRaw {
        types: [MimePattern; 1],
    }

    impl RawParser for EchoRaw {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn accepted_types(&self) -> &[MimePattern] {
            &self.types
        }

        fn objected(&self) -> bool {
            true
        }

        fn parse(&self, bytes: &[u8]) -> Result<Value, BodyError> {
            Ok(json!({ "len": bytes.len() }))
        }
    }

    #[tokio::test]
    async fn custom_raw_parser_takes_priority_by_order() {
        let echo = ParserDescriptor::raw(EchoRaw { types: [MimePattern::exact("application/vnd.echo")] });
        let options = BodyOptions::default().add_parser(echo);
        let mut ctx = context("POST", Some("application/vnd.echo"), b"12345", options);
        let result = ctx.dispatch().await.unwrap();
        assert_eq!(result.kind(), BodyKind::Parsed("echo"));
        assert_eq!(result.value(), Some(&BodyValue::Parsed(json!({"len": 5}))));
        let map = ctx.structured().await.unwrap();
        assert_eq!(map.get("len"), Some(&json!(5)));
    }

    #[tokio::test]
    async fn consumed_stream_is_not_readable() {
        let request = Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from_static(b"{}")))
            .unwrap();
        let (parts, body) = request.into_parts();
        let mut ctx: BodyContext<Full<Bytes>> =
            BodyContext::new(parts.method, parts.headers, body, Arc::new(BodyOptions::default()));
        // simulate a host that already drained the stream
        ctx.stream = None;
        assert_eq!(ctx.raw().await.unwrap_err(), BodyError::stream_not_readable());
    }
}
