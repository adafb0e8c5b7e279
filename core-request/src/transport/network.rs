//! Companion server transport.
//!
//! The companion server performs the upstream request on our behalf. It
//! answers with the upstream status, headers and body, plus a few headers of
//! its own:
//!
//! - `x-final-url`: URL after redirects
//! - `x-status-text`: upstream reason phrase
//! - `x-retry`: present and truthy when the request should be retried

use async_trait::async_trait;
use bridge_traits::host::SlotId;
use bridge_traits::http::{find_header, HttpClient, HttpMethod, HttpRequest};
use bytes::Bytes;
use core_cache::ResponseSnapshot;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::assemble::ChunkAssembler;
use super::{Transport, TransportKind};
use crate::error::TransportError;
use crate::types::{ProgressCallback, WireRequest};

pub struct NetworkTransport {
    client: Arc<dyn HttpClient>,
    endpoint: String,
}

impl NetworkTransport {
    pub fn new(client: Arc<dyn HttpClient>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build(&self, request: &WireRequest) -> Result<HttpRequest, TransportError> {
        let http = HttpRequest::new(HttpMethod::Post, &self.endpoint)
            .header("X-Request-Id", request.id.clone())
            .json(request)?
            .timeout(Duration::from_millis(request.timeout_ms));
        Ok(http)
    }

    async fn send_whole(
        &self,
        http: HttpRequest,
        request: &WireRequest,
    ) -> Result<ResponseSnapshot, TransportError> {
        let response = self.client.execute(http).await?;
        check_retry(&response.headers)?;

        let snapshot = snapshot_from(response.status, response.headers, response.body, request);
        if !snapshot.is_success() {
            return Err(TransportError::status(snapshot.status, snapshot));
        }
        Ok(snapshot)
    }

    async fn send_progressive(
        &self,
        http: HttpRequest,
        request: &WireRequest,
        progress: ProgressCallback,
    ) -> Result<ResponseSnapshot, TransportError> {
        let mut stream = self.client.execute_streaming(http).await?;
        check_retry(&stream.headers)?;

        if !stream.is_success() {
            // failure bodies are read in full, without progress reports
            let mut assembler = ChunkAssembler::new(stream.content_length, None);
            while let Some(chunk) = stream.body.next().await {
                assembler.push(&chunk?);
            }
            let (body, _) = assembler.finish();
            let snapshot = snapshot_from(stream.status, stream.headers, body, request);
            return Err(TransportError::status(snapshot.status, snapshot));
        }

        // gzip bodies are counted compressed, matching Content-Length
        let mut assembler = ChunkAssembler::new(stream.content_length, Some(progress));
        while let Some(chunk) = stream.body.next().await {
            let chunk = chunk?;
            let progress = assembler.push(&chunk);
            trace!(loaded = progress.loaded, total = ?progress.total, "network chunk");
            if assembler.is_complete() {
                break;
            }
        }

        if let Some(missing) = assembler.shortfall() {
            warn!(missing, "companion stream ended early");
            return Err(TransportError::Network(format!(
                "Response body ended {missing} bytes short"
            )));
        }

        let (body, progress) = assembler.finish();
        let mut snapshot = snapshot_from(stream.status, stream.headers, body, request);
        snapshot.progress = Some(progress);
        Ok(snapshot)
    }
}

#[async_trait]
impl Transport for NetworkTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Network
    }

    async fn send(
        &self,
        _slot: SlotId,
        request: &WireRequest,
        progress: Option<ProgressCallback>,
    ) -> Result<ResponseSnapshot, TransportError> {
        let http = self.build(request)?;
        debug!(id = %request.id, endpoint = %self.endpoint, "posting to companion server");

        match progress {
            None => self.send_whole(http, request).await,
            Some(progress) => self.send_progressive(http, request, progress).await,
        }
    }
}

fn check_retry(headers: &HashMap<String, String>) -> Result<(), TransportError> {
    match find_header(headers, "x-retry") {
        Some(value) if !matches!(value.trim(), "" | "0" | "false") => Err(TransportError::Retry(
            format!("companion server asked for a retry ({value})"),
        )),
        _ => Ok(()),
    }
}

fn snapshot_from(
    status: u16,
    headers: HashMap<String, String>,
    content: Bytes,
    request: &WireRequest,
) -> ResponseSnapshot {
    let url = find_header(&headers, "x-final-url")
        .map(str::to_string)
        .unwrap_or_else(|| request.url.clone());
    let status_text = find_header(&headers, "x-status-text")
        .unwrap_or_default()
        .to_string();
    let compressed = find_header(&headers, "content-encoding")
        .is_some_and(|encoding| encoding.eq_ignore_ascii_case("gzip"));

    ResponseSnapshot {
        status,
        status_text,
        content,
        headers,
        url,
        compressed,
        progress: None,
    }
}
