//! # Transports
//!
//! Two interchangeable senders behind [`Transport`]:
//!
//! - [`HostTransport`] forwards the encoded request to a privileged
//!   [`HostService`](bridge_traits::host::HostService) over the RPC channel of
//!   the acquired slot.
//! - [`NetworkTransport`] posts the request as JSON to a local companion
//!   server through an [`HttpClient`](bridge_traits::http::HttpClient).
//!
//! Both produce the same [`ResponseSnapshot`] for the same upstream
//! response and normalize failures into [`TransportError`].
//!
//! ## Progress units
//!
//! Progress counts body bytes as the transport delivers them, against a
//! total in the same unit, so the last report always has `loaded == total`.
//! The host decodes each chunk before counting it and announces a decoded
//! total. The companion server streams a gzip body as-is: `loaded` and the
//! `Content-Length` total are both compressed sizes, and the body is
//! inflated only once it is complete.

mod assemble;
mod host;
mod network;

pub use host::HostTransport;
pub use network::NetworkTransport;

use async_trait::async_trait;
use bridge_traits::host::SlotId;
use core_cache::ResponseSnapshot;
use core_codec::CodecPool;
use core_runtime::{CoreConfig, Error as RuntimeError};
use std::sync::Arc;
use tracing::info;

use crate::error::TransportError;
use crate::types::{ProgressCallback, WireRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    HostService,
    Network,
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Send `request` on `slot`. With `progress`, the body is read
    /// progressively and the callback fires after every chunk, in the
    /// units described in the module docs.
    async fn send(
        &self,
        slot: SlotId,
        request: &WireRequest,
        progress: Option<ProgressCallback>,
    ) -> Result<ResponseSnapshot, TransportError>;
}

/// Pick the transport the configuration calls for.
pub fn select_transport(config: &CoreConfig) -> Result<Arc<dyn Transport>, RuntimeError> {
    if config.uses_host_service() {
        if let Some(host) = &config.host_service {
            let codec = CodecPool::new(config.offload_threshold);
            info!("using host service transport");
            return Ok(Arc::new(HostTransport::new(Arc::clone(host), codec)));
        }
    }

    match &config.http_client {
        Some(client) => {
            info!(endpoint = %config.companion_url, "using network transport");
            Ok(Arc::new(NetworkTransport::new(
                Arc::clone(client),
                config.companion_url.clone(),
            )))
        }
        None => Err(RuntimeError::CapabilityMissing {
            capability: "transport".to_string(),
            message: "Neither a host service nor an HTTP client is configured".to_string(),
        }),
    }
}
