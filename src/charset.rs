//! Charset decoding of buffered body bytes.
//!
//! The charset label comes from the request's `Content-Type` parameter,
//! falling back to the configured default. Decoding is strict: byte
//! sequences invalid for the claimed charset fail instead of being
//! replaced, since a lying charset on an attacker-controlled body should
//! surface as an error rather than silently mangled text.

use crate::error::BodyError;
use encoding_rs::Encoding;

/// Resolves a charset label (e.g. `utf-8`, `gbk`, `latin1`) to an encoding.
pub(crate) fn resolve(label: &str) -> Result<&'static Encoding, BodyError> {
    Encoding::for_label_no_replacement(label.trim().as_bytes())
        .ok_or_else(|| BodyError::charset_unsupported(label))
}

/// Decodes `bytes` using the charset named by `label`.
pub(crate) fn decode(bytes: &[u8], label: &str) -> Result<String, BodyError> {
    let encoding = resolve(label)?;
    match encoding.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => Ok(text.into_owned()),
        None => Err(BodyError::decode_failed(encoding.name())),
    }
}
