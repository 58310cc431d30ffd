//! Streaming body reader.
//!
//! Drains a request body stream into a single buffer while enforcing the
//! configured size limit on every chunk, optionally inflating gzip/deflate
//! transfer encodings on the fly. The declared `Content-Length` is treated
//! as untrustworthy: an understated length is caught by the running-total
//! check, an overstated one by the end-of-stream comparison.
//!
//! The reader owns the stream for the duration of the read; every exit
//! path (success, each failure kind, abort) drops it, releasing the
//! underlying connection resources without any manual cleanup step.

use crate::error::BodyError;
use bytes::{Bytes, BytesMut};
use flate2::write::{GzDecoder, ZlibDecoder};
use http_body::Body;
use http_body_util::BodyExt;
use std::fmt::Display;
use std::io::Write as _;
use tracing::trace;

/// Transfer encodings the reader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentCoding {
    Identity,
    Gzip,
    Deflate,
}

impl ContentCoding {
    /// Resolves a `Content-Encoding` header value, defaulting to identity.
    ///
    /// With `inflate` disabled any non-identity encoding is rejected, so a
    /// compressed body never reaches the accumulator.
    fn resolve(value: Option<&str>, inflate: bool) -> Result<Self, BodyError> {
        let name = value.unwrap_or("identity").trim().to_ascii_lowercase();
        if !inflate && name != "identity" {
            return Err(BodyError::encoding_unsupported(name));
        }
        match name.as_str() {
            "identity" => Ok(Self::Identity),
            "gzip" => Ok(Self::Gzip),
            "deflate" => Ok(Self::Deflate),
            _ => Err(BodyError::encoding_unsupported(name)),
        }
    }
}

/// `io::Write` adapter collecting decoder output into a `BytesMut`.
struct Writer {
    buf: BytesMut,
}

impl Writer {
    fn new() -> Self {
        Self { buf: BytesMut::with_capacity(4096) }
    }
}

impl std::io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Byte accumulator, inflating on write when the body is compressed.
enum Sink {
    Identity(BytesMut),
    Gzip(GzDecoder<Writer>),
    Deflate(ZlibDecoder<Writer>),
}

impl Sink {
    fn new(coding: ContentCoding) -> Self {
        match coding {
            ContentCoding::Identity => Self::Identity(BytesMut::with_capacity(4096)),
            ContentCoding::Gzip => Self::Gzip(GzDecoder::new(Writer::new())),
            ContentCoding::Deflate => Self::Deflate(ZlibDecoder::new(Writer::new())),
        }
    }

    fn push(&mut self, chunk: &[u8]) -> Result<(), BodyError> {
        match self {
            Self::Identity(buf) => {
                buf.extend_from_slice(chunk);
                Ok(())
            }
            Self::Gzip(decoder) => {
                decoder.write_all(chunk).map_err(BodyError::inflate_failed)
            }
            Self::Deflate(decoder) => {
                decoder.write_all(chunk).map_err(BodyError::inflate_failed)
            }
        }
    }

    /// Bytes accumulated so far, after decompression.
    fn len(&self) -> usize {
        match self {
            Self::Identity(buf) => buf.len(),
            Self::Gzip(decoder) => decoder.get_ref().buf.len(),
            Self::Deflate(decoder) => decoder.get_ref().buf.len(),
        }
    }

    fn finish(self) -> Result<Bytes, BodyError> {
        match self {
            Self::Identity(buf) => Ok(buf.freeze()),
            Self::Gzip(decoder) => {
                decoder.finish().map(|w| w.buf.freeze()).map_err(BodyError::inflate_failed)
            }
            Self::Deflate(decoder) => {
                decoder.finish().map(|w| w.buf.freeze()).map_err(BodyError::inflate_failed)
            }
        }
    }
}

/// Reads `body` to completion, returning the (inflated) payload.
///
/// `declared` is the parsed `Content-Length`; `content_encoding` the raw
/// `Content-Encoding` header value, if any. The size limit applies to the
/// bytes that reach the accumulator, i.e. after decompression, which is
/// what guards against decompression bombs.
pub(crate) async fn read_to_end<B>(
    mut body: B,
    declared: Option<u64>,
    limit: Option<usize>,
    content_encoding: Option<&str>,
    inflate: bool,
) -> Result<Bytes, BodyError>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Display,
{
    // a declared length already over the limit fails before any read
    if let (Some(limit), Some(declared)) = (limit, declared) {
        if declared > limit as u64 {
            return Err(BodyError::declared_too_large(limit, declared));
        }
    }

    let coding = ContentCoding::resolve(content_encoding, inflate)?;

    let mut sink = Sink::new(coding);
    let mut received: u64 = 0;

    while let Some(frame) = body.frame().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(cause) => {
                trace!(%cause, received, "request body stream failed");
                return Err(BodyError::request_aborted(declared, received));
            }
        };
        let Ok(data) = frame.into_data() else {
            // trailers carry no payload bytes
            continue;
        };

        received += data.len() as u64;
        sink.push(&data)?;
        if let Some(limit) = limit {
            if sink.len() > limit {
                trace!(limit, received, "request body exceeded limit mid-stream");
                return Err(BodyError::entity_too_large(limit, sink.len() as u64));
            }
        }
    }

    let buf = sink.finish()?;
    if let Some(limit) = limit {
        // a compressed tail can flush more output on finish
        if buf.len() > limit {
            return Err(BodyError::entity_too_large(limit, buf.len() as u64));
        }
    }

    if coding == ContentCoding::Identity {
        if let Some(declared) = declared {
            if received != declared {
                return Err(BodyError::request_size_invalid(declared, received));
            }
        }
    }

    trace!(received, inflated = buf.len(), "request body read complete");
    Ok(buf)
}
