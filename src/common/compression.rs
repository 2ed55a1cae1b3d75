//! Response content-coding support for the HTTP transport.
//!
//! Requests advertise `br, zstd, gzip`; responses are decoded transparently
//! before they reach the session layer.

use anyhow::Result;
use async_compression::tokio::bufread::{BrotliDecoder, GzipDecoder, ZstdDecoder};
use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::BodyStream;
use hyper::body::Incoming;
use hyper::{HeaderMap, header};
use tokio::io::{AsyncBufRead, AsyncReadExt, BufReader};
use tokio_util::io::StreamReader;

pub const ACCEPT_ENCODING_VALUE: &str = "br, zstd, gzip";

/// A content coding the transport knows how to undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Br,
    Gzip,
    Zstd,
}

impl ContentEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentEncoding::Br => "br",
            ContentEncoding::Gzip => "gzip",
            ContentEncoding::Zstd => "zstd",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "br" => Some(ContentEncoding::Br),
            "gzip" | "x-gzip" => Some(ContentEncoding::Gzip),
            "zstd" | "zst" => Some(ContentEncoding::Zstd),
            _ => None,
        }
    }
}

/// Codings applied to a response body, in the order the server applied them.
///
/// `identity` and unknown tokens are skipped.
pub fn detect_encodings(headers: &HeaderMap) -> Vec<ContentEncoding> {
    headers
        .get_all(header::CONTENT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(','))
        .filter_map(ContentEncoding::from_token)
        .collect()
}

pub fn add_accept_encoding(headers: &mut HeaderMap) {
    if !headers.contains_key(header::ACCEPT_ENCODING) {
        headers.insert(
            header::ACCEPT_ENCODING,
            header::HeaderValue::from_static(ACCEPT_ENCODING_VALUE),
        );
    }
}

/// Aggregate a response body, undoing `encodings` from the outermost inwards.
pub async fn decompress_body(body: Incoming, encodings: &[ContentEncoding]) -> Result<Bytes> {
    let frames = BodyStream::new(body)
        .map_ok(|frame| frame.into_data().unwrap_or_default())
        .map_err(std::io::Error::other);

    let mut reader: Box<dyn AsyncBufRead + Unpin + Send> =
        Box::new(BufReader::new(StreamReader::new(frames)));
    for encoding in encodings.iter().rev() {
        reader = match encoding {
            ContentEncoding::Br => Box::new(BufReader::new(BrotliDecoder::new(reader))),
            ContentEncoding::Gzip => Box::new(BufReader::new(GzipDecoder::new(reader))),
            ContentEncoding::Zstd => Box::new(BufReader::new(ZstdDecoder::new(reader))),
        };
    }

    let mut out = Vec::with_capacity(16 * 1024);
    reader.read_to_end(&mut out).await?;
    Ok(Bytes::from(out))
}

/// Rewrite framing headers once the body has been decoded.
pub fn normalize_decoded_headers(headers: &mut HeaderMap, body_len: usize) {
    headers.remove(header::CONTENT_ENCODING);
    headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(body_len));
}
