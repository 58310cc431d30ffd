use http::StatusCode;
use thiserror::Error;

/// Errors produced by the body ingestion pipeline.
///
/// Every variant is terminal for the request it occurred in: a partially
/// consumed stream cannot be retried. Variants carry the diagnostic fields
/// the host needs to render a response (expected/received byte counts, the
/// offending charset or encoding name).
///
/// The enum is `Clone` so per-request stages can memoize a failure and
/// surface the identical error on repeated access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BodyError {
    #[error("request entity too large, content length {declared} exceed the limit {limit}")]
    DeclaredTooLarge { limit: usize, declared: u64 },

    #[error("request entity too large, received {received} exceed the limit {limit}")]
    EntityTooLarge { limit: usize, received: u64 },

    #[error("unsupported content encoding \"{encoding}\"")]
    EncodingUnsupported { encoding: String },

    #[error("request body stream is not readable")]
    StreamNotReadable,

    #[error("request aborted, received {received} of {expected:?} bytes")]
    RequestAborted { expected: Option<u64>, received: u64 },

    #[error("request size did not match content length, expected {expected} but received {received}")]
    RequestSizeInvalid { expected: u64, received: u64 },

    #[error("inflate failed: {reason}")]
    InflateFailed { reason: String },

    #[error("unsupported charset \"{charset}\"")]
    CharsetUnsupported { charset: String },

    #[error("failed to decode body as {charset}")]
    DecodeFailed { charset: String },

    #[error("invalid JSON, only supports object or array")]
    JsonStrict,

    #[error("invalid JSON: {reason}")]
    JsonParse { reason: String },

    #[error("{parser} parser failed: {reason}")]
    ParseFailed { parser: &'static str, reason: String },

    #[error("body of kind \"{kind}\" is not an object")]
    ObjectedOnly { kind: String },
}

impl BodyError {
    /// The declared `Content-Length` already exceeds the limit; no bytes
    /// were read.
    pub fn declared_too_large(limit: usize, declared: u64) -> Self {
        Self::DeclaredTooLarge { limit, declared }
    }

    pub fn entity_too_large(limit: usize, received: u64) -> Self {
        Self::EntityTooLarge { limit, received }
    }

    pub fn encoding_unsupported<S: ToString>(encoding: S) -> Self {
        Self::EncodingUnsupported { encoding: encoding.to_string() }
    }

    pub fn stream_not_readable() -> Self {
        Self::StreamNotReadable
    }

    pub fn request_aborted(expected: Option<u64>, received: u64) -> Self {
        Self::RequestAborted { expected, received }
    }

    pub fn request_size_invalid(expected: u64, received: u64) -> Self {
        Self::RequestSizeInvalid { expected, received }
    }

    pub fn inflate_failed<S: ToString>(reason: S) -> Self {
        Self::InflateFailed { reason: reason.to_string() }
    }

    pub fn charset_unsupported<S: ToString>(charset: S) -> Self {
        Self::CharsetUnsupported { charset: charset.to_string() }
    }

    pub fn decode_failed<S: ToString>(charset: S) -> Self {
        Self::DecodeFailed { charset: charset.to_string() }
    }

    pub fn json_parse<S: ToString>(reason: S) -> Self {
        Self::JsonParse { reason: reason.to_string() }
    }

    pub fn parse_failed<S: ToString>(parser: &'static str, reason: S) -> Self {
        Self::ParseFailed { parser, reason: reason.to_string() }
    }

    pub fn objected_only<S: ToString>(kind: S) -> Self {
        Self::ObjectedOnly { kind: kind.to_string() }
    }

    /// The status code a host would typically respond with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::DeclaredTooLarge { .. } | Self::EntityTooLarge { .. } => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            Self::EncodingUnsupported { .. }
            | Self::CharsetUnsupported { .. }
            | Self::JsonStrict => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::StreamNotReadable => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RequestAborted { .. }
            | Self::RequestSizeInvalid { .. }
            | Self::InflateFailed { .. }
            | Self::DecodeFailed { .. }
            | Self::JsonParse { .. }
            | Self::ParseFailed { .. }
            | Self::ObjectedOnly { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// A stable machine-readable tag for host-side matching and logging.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::DeclaredTooLarge { .. } | Self::EntityTooLarge { .. } => "entity.too.large",
            Self::EncodingUnsupported { .. } => "encoding.unsupported",
            Self::StreamNotReadable => "stream.not.readable",
            Self::RequestAborted { .. } => "request.aborted",
            Self::RequestSizeInvalid { .. } => "request.size.invalid",
            Self::InflateFailed { .. } => "inflate.failed",
            Self::CharsetUnsupported { .. } => "charset.unsupported",
            Self::DecodeFailed { .. } => "decode.failed",
            Self::JsonStrict => "json.strict",
            Self::JsonParse { .. } => "json.parse-error",
            Self::ParseFailed { .. } => "body.parse-error",
            Self::ObjectedOnly { .. } => "body.type-not-object",
        }
    }
}
