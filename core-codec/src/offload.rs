//! Blocking-pool offload for large payloads.
//!
//! Small payloads are handled inline on the calling task. Anything larger
//! than the threshold runs on `spawn_blocking` so gzip and base64 work does
//! not stall the async workers.

use bytes::Bytes;
use serde::Serialize;
use tracing::trace;

use crate::codec;
use crate::error::{CodecError, Result};

/// Default size above which work is moved off the async runtime.
pub const DEFAULT_OFFLOAD_THRESHOLD: usize = 64 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct CodecPool {
    threshold: usize,
}

impl Default for CodecPool {
    fn default() -> Self {
        Self::new(DEFAULT_OFFLOAD_THRESHOLD)
    }
}

impl CodecPool {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    fn should_offload(&self, len: usize) -> bool {
        len > self.threshold
    }

    pub async fn decode_response(&self, content: String, compress: bool) -> Result<Bytes> {
        if !self.should_offload(content.len()) {
            return codec::decode_response(&content, compress);
        }
        trace!(len = content.len(), "offloading response decode");
        run_blocking(move || codec::decode_response(&content, compress)).await
    }

    pub async fn encode_request<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let json = serde_json::to_vec(value)?;
        if !self.should_offload(json.len()) {
            return codec::encode_payload(&json);
        }
        trace!(len = json.len(), "offloading request encode");
        run_blocking(move || codec::encode_payload(&json)).await
    }

    pub async fn to_base64(&self, data: Bytes) -> Result<String> {
        if !self.should_offload(data.len()) {
            return Ok(codec::to_base64(&data));
        }
        run_blocking(move || Ok(codec::to_base64(&data))).await
    }

    pub async fn gunzip(&self, data: Bytes) -> Result<Bytes> {
        if !self.should_offload(data.len()) {
            return codec::gunzip(&data);
        }
        run_blocking(move || codec::gunzip(&data)).await
    }
}

async fn run_blocking<F, R>(job: F) -> Result<R>
where
    F: FnOnce() -> Result<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| CodecError::Offload(e.to_string()))?
}
