//! Transport-neutral response representation.

use bridge_traits::http::find_header;
use bytes::Bytes;
use core_codec::CodecPool;
use std::collections::HashMap;

/// Download progress, reported after every received chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub loaded: u64,
    /// Advertised total, when the sender announced one
    pub total: Option<u64>,
}

impl Progress {
    pub fn new(loaded: u64, total: Option<u64>) -> Self {
        Self { loaded, total }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.total, Some(total) if self.loaded >= total)
    }
}

/// A response as produced by a transport and kept by the cache.
///
/// When `compressed` is set, `content` is still gzip; [`ResponseSnapshot::inflate`]
/// produces the surfaced form. Entries are cached in whichever form the
/// transport delivered, so compressed bodies count their compressed size
/// against the budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub status_text: String,
    pub content: Bytes,
    pub headers: HashMap<String, String>,
    /// Resolved URL after redirects
    pub url: String,
    pub compressed: bool,
    pub progress: Option<Progress>,
}

impl ResponseSnapshot {
    pub fn new(status: u16, url: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: String::new(),
            content: content.into(),
            headers: HashMap::new(),
            url: url.into(),
            compressed: false,
            progress: None,
        }
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Bytes this snapshot occupies in the cache.
    pub fn size_bytes(&self) -> u64 {
        let headers: usize = self.headers.iter().map(|(k, v)| k.len() + v.len()).sum();
        (self.content.len() + headers + self.url.len() + self.status_text.len()) as u64
    }

    /// Return the snapshot with its content gunzipped.
    pub async fn inflate(self, codec: &CodecPool) -> core_codec::Result<Self> {
        if !self.compressed {
            return Ok(self);
        }
        let content = codec.gunzip(self.content.clone()).await?;
        Ok(Self {
            content,
            compressed: false,
            ..self
        })
    }
}
