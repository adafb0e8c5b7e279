//! # Codec
//!
//! Payloads cross an isolation boundary (host service, companion server,
//! cache worker) as text-safe data. This crate converts between raw bytes
//! and that representation: base64 for transport, gzip for size.
//!
//! The free functions in [`codec`] are pure and synchronous. [`CodecPool`]
//! wraps them and moves large payloads onto the blocking thread pool.

pub mod codec;
pub mod error;
pub mod offload;

pub use codec::{
    decode_request, decode_response, encode_payload, encode_request, from_base64, gunzip, gzip,
    to_base64,
};
pub use error::{CodecError, Result};
pub use offload::{CodecPool, DEFAULT_OFFLOAD_THRESHOLD};
