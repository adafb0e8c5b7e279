//! Privileged Host Service Abstraction
//!
//! On platforms that embed the core inside a host application, outgoing
//! requests are forwarded to a privileged host-side service instead of going
//! over a socket. Every call is bound to the concurrency slot the dispatcher
//! acquired for it, so the host can keep one RPC channel per slot.
//!
//! Payloads cross the boundary as text: the request is JSON, gzip-compressed
//! and base64 encoded; reply content is base64 and optionally gzip-compressed
//! (signalled by [`HostReply::compress`]).

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::device::DeviceProfile;
use crate::error::Result;
use crate::http::find_header;

/// Identifier of a concurrency slot. Pools hand out disjoint id ranges.
pub type SlotId = u32;

/// Reply produced by the host for a forwarded request, or one chunk of a
/// streamed reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostReply {
    pub status: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    /// Final URL after redirects, if the host tracked it
    pub url: Option<String>,
    /// Base64 body (or body chunk)
    pub content: String,
    /// Whether `content` is gzip-compressed underneath the base64 layer
    pub compress: bool,
    /// Total decoded length of a streamed body
    pub total: Option<u64>,
    /// Host asks the caller to try again
    pub retry: bool,
    /// Host-side failure description
    pub error: Option<String>,
}

impl HostReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

pub type HostReplyStream = BoxStream<'static, Result<HostReply>>;

/// Host-side request forwarding service.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::host::HostService;
///
/// async fn forward(host: &dyn HostService, slot: u32, payload: String) {
///     let reply = host.forward(slot, payload).await?;
///     assert!(reply.is_success());
/// }
/// ```
#[async_trait]
pub trait HostService: Send + Sync {
    /// Forward an encoded request over the RPC channel bound to `slot`.
    async fn forward(&self, slot: SlotId, payload: String) -> Result<HostReply>;

    /// Forward an encoded request and subscribe to its reply chunks.
    async fn forward_stream(&self, slot: SlotId, payload: String) -> Result<HostReplyStream>;

    /// Device characteristics used to size the response cache.
    fn device_profile(&self) -> Option<DeviceProfile> {
        None
    }
}
