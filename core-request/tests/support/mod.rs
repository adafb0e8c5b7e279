//! Shared fakes for the integration suites.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::host::{HostReply, HostReplyStream, HostService, SlotId};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, HttpStream};
use bridge_traits::time::{Clock, ManualClock};
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use core_cache::ResponseSnapshot;
use core_codec::{gzip, to_base64};
use core_request::{ProgressCallback, Transport, TransportError, TransportKind, WireRequest};
use core_runtime::CoreConfig;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ))
}

/// HTTP client that must never be called.
pub struct UnusedHttpClient;

#[async_trait]
impl HttpClient for UnusedHttpClient {
    async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
        Err(BridgeError::NotAvailable("unused".to_string()))
    }

    async fn execute_streaming(&self, _request: HttpRequest) -> BridgeResult<HttpStream> {
        Err(BridgeError::NotAvailable("unused".to_string()))
    }
}

pub fn config(clock: Arc<ManualClock>) -> CoreConfig {
    CoreConfig::builder()
        .http_client(Arc::new(UnusedHttpClient))
        .clock(clock as Arc<dyn Clock>)
        .build()
        .unwrap()
}

/// Transport answering from a script and recording what it was sent.
pub struct ScriptedTransport {
    kind: TransportKind,
    script: Mutex<VecDeque<Result<ResponseSnapshot, TransportError>>>,
    pub sent: Mutex<Vec<(SlotId, WireRequest)>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            script: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, outcome: Result<ResponseSnapshot, TransportError>) {
        self.script.lock().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn last_request(&self) -> WireRequest {
        self.sent.lock().last().cloned().unwrap().1
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn send(
        &self,
        slot: SlotId,
        request: &WireRequest,
        _progress: Option<ProgressCallback>,
    ) -> Result<ResponseSnapshot, TransportError> {
        self.sent.lock().push((slot, request.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("script exhausted".to_string())))
    }
}

/// One upstream response, delivered in chunks.
#[derive(Clone)]
pub struct Upstream {
    pub status: u16,
    pub final_url: String,
    pub headers: HashMap<String, String>,
    pub chunks: Vec<Vec<u8>>,
    /// Announced total; defaults to the sum of the chunks
    pub total: Option<u64>,
    pub gzip: bool,
    pub retry: bool,
}

impl Upstream {
    pub fn ok(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            status: 200,
            final_url: "https://cdn.example.com/final".to_string(),
            headers: HashMap::new(),
            chunks,
            total: None,
            gzip: false,
            retry: false,
        }
    }

    pub fn body(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    pub fn announced_total(&self) -> u64 {
        self.total.unwrap_or(self.body().len() as u64)
    }
}

/// Host service replaying an [`Upstream`].
pub struct FakeHost {
    pub upstream: Upstream,
    pub slots: Mutex<Vec<SlotId>>,
    pub payloads: Mutex<Vec<String>>,
}

impl FakeHost {
    pub fn new(upstream: Upstream) -> Self {
        Self {
            upstream,
            slots: Mutex::new(Vec::new()),
            payloads: Mutex::new(Vec::new()),
        }
    }

    fn reply(&self, content: &[u8]) -> HostReply {
        let (content, compress) = if self.upstream.gzip {
            (to_base64(&gzip(content).unwrap()), true)
        } else {
            (to_base64(content), false)
        };
        HostReply {
            status: self.upstream.status,
            status_text: "OK".to_string(),
            headers: self.upstream.headers.clone(),
            url: Some(self.upstream.final_url.clone()),
            content,
            compress,
            total: Some(self.upstream.announced_total()),
            retry: self.upstream.retry,
            error: None,
        }
    }
}

#[async_trait]
impl HostService for FakeHost {
    async fn forward(&self, slot: SlotId, payload: String) -> BridgeResult<HostReply> {
        self.slots.lock().push(slot);
        self.payloads.lock().push(payload);
        Ok(self.reply(&self.upstream.body()))
    }

    async fn forward_stream(&self, slot: SlotId, payload: String) -> BridgeResult<HostReplyStream> {
        self.slots.lock().push(slot);
        self.payloads.lock().push(payload);
        let replies: Vec<BridgeResult<HostReply>> = self
            .upstream
            .chunks
            .iter()
            .map(|chunk| Ok(self.reply(chunk)))
            .collect();
        Ok(stream::iter(replies).boxed())
    }
}

/// Companion server replaying an [`Upstream`].
pub struct FakeCompanion {
    pub upstream: Upstream,
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl FakeCompanion {
    pub fn new(upstream: Upstream) -> Self {
        Self {
            upstream,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn headers(&self) -> HashMap<String, String> {
        let mut headers = self.upstream.headers.clone();
        headers.insert("X-Final-Url".to_string(), self.upstream.final_url.clone());
        headers.insert("X-Status-Text".to_string(), "OK".to_string());
        if self.upstream.gzip {
            headers.insert("Content-Encoding".to_string(), "gzip".to_string());
        }
        if self.upstream.retry {
            headers.insert("X-Retry".to_string(), "1".to_string());
        }
        headers
    }

    fn encode(&self, data: &[u8]) -> Bytes {
        if self.upstream.gzip {
            gzip(data).unwrap()
        } else {
            Bytes::copy_from_slice(data)
        }
    }
}

#[async_trait]
impl HttpClient for FakeCompanion {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests.lock().push(request);
        Ok(HttpResponse {
            status: self.upstream.status,
            headers: self.headers(),
            body: self.encode(&self.upstream.body()),
        })
    }

    async fn execute_streaming(&self, request: HttpRequest) -> BridgeResult<HttpStream> {
        self.requests.lock().push(request);
        let (chunks, content_length): (Vec<Bytes>, u64) = if self.upstream.gzip {
            // one gzip body, cut into as many pieces as the upstream has chunks
            let packed = self.encode(&self.upstream.body());
            let piece = packed.len().div_ceil(self.upstream.chunks.len().max(1)).max(1);
            let chunks = packed.chunks(piece).map(Bytes::copy_from_slice).collect();
            (chunks, packed.len() as u64)
        } else {
            let chunks = self
                .upstream
                .chunks
                .iter()
                .map(|chunk| Bytes::copy_from_slice(chunk))
                .collect();
            (chunks, self.upstream.announced_total())
        };
        let chunks: Vec<BridgeResult<Bytes>> = chunks.into_iter().map(Ok).collect();
        Ok(HttpStream {
            status: self.upstream.status,
            headers: self.headers(),
            content_length: Some(content_length),
            body: stream::iter(chunks).boxed(),
        })
    }
}
