//! Typed, limit-enforced HTTP request body ingestion
//!
//! This crate turns an attacker-controlled request body stream into a
//! typed, structured value for application code. It sits between an HTTP
//! server (which owns the connection and hands over headers plus a byte
//! stream) and application handlers, and covers:
//!
//! - Streaming reads with a byte-size limit enforced on every chunk, so a
//!   lying or absent `Content-Length` cannot buffer unbounded data
//! - Transparent gzip/deflate decompression, with the limit applied to the
//!   inflated size
//! - Charset decoding driven by the `Content-Type` charset parameter
//! - Content-type dispatch over an ordered registry of pluggable parsers
//!   (strict JSON and URL-encoded forms built in), with a `text/*`
//!   fallback allowlist and a raw-bytes fallback
//! - A structured key-value view over object-shaped results
//!
//! Each request gets its own [`BodyContext`]; every pipeline stage runs at
//! most once per request and is memoized, including failures. All errors
//! are terminal for the request and carry a status code plus a stable
//! machine-readable tag for the host to act on.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use http::Request;
//! use http_body_util::Full;
//! use reqbody::{BodyContext, BodyKind, BodyOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), reqbody::BodyError> {
//! // shared once per process
//! let options = Arc::new(BodyOptions::default().with_limit(64 * 1024));
//!
//! // per request: split the request into header state and body stream
//! let request = Request::builder()
//!     .method("POST")
//!     .header("content-type", "application/json")
//!     .header("content-length", "9")
//!     .body(Full::new(Bytes::from_static(b"{\"id\":42}")))
//!     .unwrap();
//!
//! let mut body = BodyContext::from_request(request, options);
//!
//! let result = body.dispatch().await?;
//! assert_eq!(result.kind(), BodyKind::Parsed("json"));
//!
//! let view = body.structured().await?;
//! assert_eq!(view.get("id"), Some(&serde_json::json!(42)));
//! # Ok(())
//! # }
//! ```
//!
//! # Custom parsers
//!
//! Formats beyond the built-ins are added by implementing [`TextParser`]
//! or [`RawParser`] and registering a [`ParserDescriptor`] before the
//! first request. The registry is consulted in order, first match wins.

mod body;
mod charset;
mod error;
mod options;
mod parser;
mod pattern;
mod reader;

pub use body::{BodyContext, BodyKind, BodyValue, DispatchResult};
pub use error::BodyError;
pub use options::{BodyOptions, DEFAULT_LIMIT};
pub use parser::{JsonParser, ParserDescriptor, RawParser, TextParser, UrlEncodedParser};
pub use pattern::{InvalidMimePattern, MimePattern};
