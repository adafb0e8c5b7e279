//! Host service transport.

use async_trait::async_trait;
use bridge_traits::host::{HostReply, HostService, SlotId};
use bytes::Bytes;
use core_cache::ResponseSnapshot;
use core_codec::CodecPool;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::assemble::ChunkAssembler;
use super::{Transport, TransportKind};
use crate::error::TransportError;
use crate::types::{ProgressCallback, WireRequest};

pub struct HostTransport {
    host: Arc<dyn HostService>,
    codec: CodecPool,
}

impl HostTransport {
    pub fn new(host: Arc<dyn HostService>, codec: CodecPool) -> Self {
        Self { host, codec }
    }

    async fn send_whole(
        &self,
        slot: SlotId,
        payload: String,
        request: &WireRequest,
    ) -> Result<ResponseSnapshot, TransportError> {
        let mut reply = self.host.forward(slot, payload).await?;
        check_signals(&reply)?;

        // keep gzip as delivered; the dispatcher inflates when surfacing
        let content = std::mem::take(&mut reply.content);
        let raw = self.codec.decode_response(content, false).await?;
        let snapshot = snapshot_from(reply, raw, request);

        if !snapshot.is_success() {
            return Err(TransportError::status(snapshot.status, snapshot));
        }
        Ok(snapshot)
    }

    async fn send_progressive(
        &self,
        slot: SlotId,
        payload: String,
        request: &WireRequest,
        progress: ProgressCallback,
    ) -> Result<ResponseSnapshot, TransportError> {
        let mut stream = self.host.forward_stream(slot, payload).await?;
        let mut assembler = ChunkAssembler::new(None, Some(progress));
        let mut head: Option<HostReply> = None;

        while let Some(chunk) = stream.next().await {
            let mut chunk = chunk?;
            check_signals(&chunk)?;

            let content = std::mem::take(&mut chunk.content);
            let data = self.codec.decode_response(content, chunk.compress).await?;

            // continuation chunks may leave the status unset; the head may not
            let status_unset = head.is_some() && chunk.status == 0;
            if !status_unset && !chunk.is_success() {
                debug!(status = chunk.status, "host stream reported failure status");
                let snapshot = snapshot_from(chunk, data, request).with_compressed(false);
                return Err(TransportError::status(snapshot.status, snapshot));
            }

            assembler.set_total_if_unknown(chunk.total);
            let progress = assembler.push(&data);
            trace!(loaded = progress.loaded, total = ?progress.total, "host chunk");

            if head.is_none() {
                head = Some(chunk);
            }
            if assembler.is_complete() {
                break;
            }
        }

        let Some(head) = head else {
            return Err(TransportError::Network(
                "Host stream ended without a reply".to_string(),
            ));
        };
        if let Some(missing) = assembler.shortfall() {
            warn!(missing, "host stream ended early");
            return Err(TransportError::Network(format!(
                "Host stream ended {missing} bytes short"
            )));
        }

        let (body, progress) = assembler.finish();
        let mut snapshot = snapshot_from(head, body, request).with_compressed(false);
        snapshot.progress = Some(progress);
        Ok(snapshot)
    }
}

#[async_trait]
impl Transport for HostTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::HostService
    }

    async fn send(
        &self,
        slot: SlotId,
        request: &WireRequest,
        progress: Option<ProgressCallback>,
    ) -> Result<ResponseSnapshot, TransportError> {
        let payload = self.codec.encode_request(request).await?;
        debug!(slot, id = %request.id, bytes = payload.len(), "forwarding to host");

        match progress {
            None => self.send_whole(slot, payload, request).await,
            Some(progress) => self.send_progressive(slot, payload, request, progress).await,
        }
    }
}

/// Host-side failures and retry requests come before any status handling.
fn check_signals(reply: &HostReply) -> Result<(), TransportError> {
    if reply.retry {
        let reason = reply
            .error
            .clone()
            .unwrap_or_else(|| "host asked for a retry".to_string());
        return Err(TransportError::Retry(reason));
    }
    if let Some(error) = &reply.error {
        return Err(TransportError::Network(error.clone()));
    }
    Ok(())
}

fn snapshot_from(reply: HostReply, content: Bytes, request: &WireRequest) -> ResponseSnapshot {
    ResponseSnapshot {
        status: reply.status,
        status_text: reply.status_text,
        content,
        headers: reply.headers,
        url: reply.url.unwrap_or_else(|| request.url.clone()),
        compressed: reply.compress,
        progress: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::host::HostReplyStream;
    use core_codec::to_base64;
    use futures::stream;
    use parking_lot::Mutex;

    /// Host replaying a fixed chunk sequence.
    struct ChunkedHost {
        chunks: Mutex<Vec<HostReply>>,
    }

    #[async_trait]
    impl HostService for ChunkedHost {
        async fn forward(&self, _slot: SlotId, _payload: String) -> BridgeResult<HostReply> {
            Ok(self.chunks.lock()[0].clone())
        }

        async fn forward_stream(
            &self,
            _slot: SlotId,
            _payload: String,
        ) -> BridgeResult<HostReplyStream> {
            let chunks: Vec<BridgeResult<HostReply>> =
                self.chunks.lock().drain(..).map(Ok).collect();
            Ok(stream::iter(chunks).boxed())
        }
    }

    fn chunk(status: u16, data: &[u8]) -> HostReply {
        HostReply {
            status,
            content: to_base64(data),
            total: Some(6),
            ..Default::default()
        }
    }

    fn transport(chunks: Vec<HostReply>) -> HostTransport {
        let host = Arc::new(ChunkedHost {
            chunks: Mutex::new(chunks),
        });
        HostTransport::new(host, CodecPool::default())
    }

    fn wire_request() -> WireRequest {
        WireRequest {
            id: "1".to_string(),
            url: "https://api.example.com/x".to_string(),
            method: bridge_traits::http::HttpMethod::Get,
            headers: Default::default(),
            body: None,
            body_encoding: None,
            timeout_ms: 10,
        }
    }

    fn ignore_progress() -> ProgressCallback {
        Arc::new(|_| {})
    }

    #[tokio::test]
    async fn test_continuation_chunks_may_omit_status() {
        let transport = transport(vec![chunk(200, b"abc"), chunk(0, b"def")]);
        let snapshot = transport
            .send(0, &wire_request(), Some(ignore_progress()))
            .await
            .unwrap();
        assert_eq!(snapshot.status, 200);
        assert_eq!(snapshot.content.as_ref(), b"abcdef");
    }

    #[tokio::test]
    async fn test_head_chunk_without_status_is_a_failure() {
        let transport = transport(vec![chunk(0, b"abc"), chunk(0, b"def")]);
        let err = transport
            .send(0, &wire_request(), Some(ignore_progress()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 0, .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_whole_reply_without_status_is_a_failure() {
        let whole = transport(vec![chunk(0, b"abcdef")])
            .send(0, &wire_request(), None)
            .await
            .unwrap_err();
        assert!(matches!(whole, TransportError::Status { status: 0, .. }));
    }

    #[test]
    fn test_retry_wins_over_error_text() {
        let reply = HostReply {
            retry: true,
            error: Some("slot busy".to_string()),
            ..Default::default()
        };
        match check_signals(&reply) {
            Err(TransportError::Retry(reason)) => assert_eq!(reason, "slot busy"),
            other => panic!("expected retry, got {other:?}"),
        }
    }

    #[test]
    fn test_host_error_is_network_failure() {
        let reply = HostReply {
            error: Some("channel closed".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            check_signals(&reply),
            Err(TransportError::Network(_))
        ));
    }

    #[test]
    fn test_missing_url_falls_back_to_request() {
        let request = WireRequest {
            id: "1".to_string(),
            url: "https://api.example.com/x".to_string(),
            method: bridge_traits::http::HttpMethod::Get,
            headers: Default::default(),
            body: None,
            body_encoding: None,
            timeout_ms: 10,
        };
        let reply = HostReply {
            status: 200,
            compress: true,
            ..Default::default()
        };
        let snapshot = snapshot_from(reply, Bytes::new(), &request);
        assert_eq!(snapshot.url, "https://api.example.com/x");
        assert!(snapshot.compressed);
    }
}
