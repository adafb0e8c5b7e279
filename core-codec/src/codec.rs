//! Pure encode/decode functions.
//!
//! Everything here is synchronous and referentially transparent. Malformed
//! input is reported through [`CodecError`], never replaced by a default.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{de::DeserializeOwned, Serialize};
use std::io::{Read, Write};

use crate::error::Result;

pub fn to_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn from_base64(text: &str) -> Result<Bytes> {
    Ok(Bytes::from(STANDARD.decode(text.trim())?))
}

pub fn gzip(data: &[u8]) -> Result<Bytes> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    Ok(Bytes::from(encoder.finish()?))
}

pub fn gunzip(data: &[u8]) -> Result<Bytes> {
    let mut decoder = GzDecoder::new(data);
    let mut inflated = Vec::with_capacity(data.len() * 2);
    decoder.read_to_end(&mut inflated)?;
    Ok(Bytes::from(inflated))
}

/// Decode content handed back by a transport: base64, then gunzip when
/// `compress` is set. Empty content decodes to an empty body.
pub fn decode_response(content: &str, compress: bool) -> Result<Bytes> {
    if content.is_empty() {
        return Ok(Bytes::new());
    }

    let raw = from_base64(content)?;
    if compress {
        gunzip(&raw)
    } else {
        Ok(raw)
    }
}

/// Serialize `value` to JSON, gzip it and base64 the result.
pub fn encode_request<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)?;
    encode_payload(&json)
}

/// Gzip and base64 an already serialized payload.
pub fn encode_payload(json: &[u8]) -> Result<String> {
    Ok(to_base64(&gzip(json)?))
}

/// Inverse of [`encode_request`].
pub fn decode_request<T: DeserializeOwned>(text: &str) -> Result<T> {
    let json = decode_response(text, true)?;
    Ok(serde_json::from_slice(&json)?)
}
