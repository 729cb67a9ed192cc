//! Response decompression for HTTP content encoding.
//!
//! Requests are always sent uncompressed; responses advertise their
//! encoding chain through `Content-Encoding` and are unwrapped here.

use anyhow::Result;
use async_compression::tokio::bufread::{BrotliDecoder, GzipDecoder, ZstdDecoder};
use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::BodyStream;
use hyper::body::Incoming;
use hyper::{HeaderMap, header, http};
use tokio::io::{AsyncBufRead, AsyncReadExt, BufReader};
use tokio_util::io::StreamReader;

/// Content encodings understood by the decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Br,
    Gzip,
    Zstd,
}

impl ContentEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncoding::Br => "br",
            ContentEncoding::Gzip => "gzip",
            ContentEncoding::Zstd => "zstd",
        }
    }
}

/// Read the response `Content-Encoding` chain, outermost first.
///
/// Unknown tokens and `identity` are skipped; an empty result means the body
/// is not encoded.
pub fn detect_encodings(headers: &HeaderMap) -> Vec<ContentEncoding> {
    let Some(raw) = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
    else {
        return Vec::new();
    };

    raw.split(',')
        .filter_map(|token| match token.trim().to_ascii_lowercase().as_str() {
            "br" => Some(ContentEncoding::Br),
            "gzip" | "x-gzip" => Some(ContentEncoding::Gzip),
            "zstd" | "zst" => Some(ContentEncoding::Zstd),
            _ => None,
        })
        .collect()
}

/// Insert `Accept-Encoding: br, zstd, gzip` unless the caller set one.
pub fn add_accept_encoding(h: &mut HeaderMap) {
    if !h.contains_key(header::ACCEPT_ENCODING) {
        h.insert(
            header::ACCEPT_ENCODING,
            http::HeaderValue::from_static("br, zstd, gzip"),
        );
    }
}

/// Wrap a body in the decoders for `encodings`, innermost last.
pub fn decompress_stream(
    body: Incoming,
    encodings: &[ContentEncoding],
) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    let stream = BodyStream::new(body)
        .map_ok(|frame| frame.into_data().unwrap_or_default())
        .map_err(std::io::Error::other);
    let mut current: Box<dyn AsyncBufRead + Unpin + Send> =
        Box::new(BufReader::new(StreamReader::new(stream)));

    for encoding in encodings.iter().rev() {
        current = match encoding {
            ContentEncoding::Br => Box::new(BufReader::new(BrotliDecoder::new(current))),
            ContentEncoding::Gzip => Box::new(BufReader::new(GzipDecoder::new(current))),
            ContentEncoding::Zstd => Box::new(BufReader::new(ZstdDecoder::new(current))),
        };
    }

    Ok(current)
}

/// Aggregate and decode a whole response body.
pub async fn decompress_body(body: Incoming, encodings: &[ContentEncoding]) -> Result<Bytes> {
    let mut decoder = decompress_stream(body, encodings)?;
    let mut out = Vec::with_capacity(32 * 1024);
    decoder.read_to_end(&mut out).await?;
    Ok(Bytes::from(out))
}
