//! Request and response types.

use bridge_traits::http::{find_header, HttpMethod};
use bytes::Bytes;
use core_cache::{Progress, ResponseSnapshot};
use core_codec::CodecPool;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;

/// Called after every received chunk of a progressive download.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Text(String),
    Binary(Bytes),
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
}

impl RequestBody {
    fn content_type(&self) -> Option<&'static str> {
        match self {
            RequestBody::Empty | RequestBody::Binary(_) => None,
            RequestBody::Text(_) => Some("text/plain; charset=utf-8"),
            RequestBody::Form(_) => Some("application/x-www-form-urlencoded"),
            RequestBody::Json(_) => Some("application/json"),
        }
    }
}

/// What a caller asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub body: RequestBody,
    /// Overrides the configured request timeout
    pub timeout: Option<Duration>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HashMap::new(),
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self> {
        self.body = RequestBody::Json(serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl From<&str> for RequestDescriptor {
    fn from(url: &str) -> Self {
        Self::get(url)
    }
}

impl From<String> for RequestDescriptor {
    fn from(url: String) -> Self {
        Self::get(url)
    }
}

/// Per-request behaviour switches.
#[derive(Clone, Default)]
pub struct RequestFlags {
    /// Return the raw body instead of a [`Response`]
    pub direct: bool,
    /// `Some(false)` bypasses the cache; `None` uses the configured default
    pub cache: Option<bool>,
    /// Encode binary bodies on the calling task
    pub sync: bool,
    /// Use the priority lane
    pub priority: bool,
    pub on_progress: Option<ProgressCallback>,
    pub abort: Option<CancellationToken>,
}

impl RequestFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn direct(mut self) -> Self {
        self.direct = true;
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = Some(enabled);
        self
    }

    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }

    pub fn priority(mut self) -> Self {
        self.priority = true;
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn abort_on(mut self, token: CancellationToken) -> Self {
        self.abort = Some(token);
        self
    }
}

impl fmt::Debug for RequestFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestFlags")
            .field("direct", &self.direct)
            .field("cache", &self.cache)
            .field("sync", &self.sync)
            .field("priority", &self.priority)
            .field("on_progress", &self.on_progress.is_some())
            .field("abort", &self.abort.is_some())
            .finish()
    }
}

/// Lifecycle of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Queued,
    SlotWait,
    InFlight,
    Done,
    Fail,
    Timeout,
    Abort,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Done | RequestStatus::Fail | RequestStatus::Timeout | RequestStatus::Abort
        )
    }
}

/// The dispatcher's private view of one request.
#[derive(Debug)]
pub struct RequestConfig {
    pub id: Uuid,
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub body: RequestBody,
    pub timeout: Duration,
    status: RequestStatus,
}

impl RequestConfig {
    pub fn new(descriptor: RequestDescriptor, default_timeout: Duration) -> Self {
        let RequestDescriptor {
            url,
            method,
            mut headers,
            body,
            timeout,
        } = descriptor;

        if let Some(content_type) = body.content_type() {
            if find_header(&headers, "content-type").is_none() {
                headers.insert("Content-Type".to_string(), content_type.to_string());
            }
        }

        Self {
            id: Uuid::new_v4(),
            url,
            method,
            headers,
            body,
            timeout: timeout.unwrap_or(default_timeout),
            status: RequestStatus::Queued,
        }
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    /// Move to `next`. Terminal states are final.
    pub fn transition(&mut self, next: RequestStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        debug!(id = %self.id, from = ?self.status, to = ?next, "request status");
        self.status = next;
        true
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Set a header, replacing any existing spelling of the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.into());
    }

    /// Build the transport-facing form. Binary bodies are base64 encoded,
    /// inline when `sync` is set, on the codec pool otherwise.
    pub async fn to_wire(&self, codec: &CodecPool, sync: bool) -> Result<WireRequest> {
        let (body, body_encoding) = match &self.body {
            RequestBody::Empty => (None, None),
            RequestBody::Text(text) => (Some(text.clone()), None),
            RequestBody::Json(value) => (Some(serde_json::to_string(value)?), None),
            RequestBody::Form(pairs) => {
                let encoded = serde_urlencoded::to_string(pairs).map_err(|e| {
                    crate::error::RequestError::Config(format!("Invalid form body: {e}"))
                })?;
                (Some(encoded), None)
            }
            RequestBody::Binary(bytes) => {
                let encoded = if sync {
                    core_codec::to_base64(bytes)
                } else {
                    codec.to_base64(bytes.clone()).await?
                };
                (Some(encoded), Some(BodyEncoding::Base64))
            }
        };

        Ok(WireRequest {
            id: self.id.to_string(),
            url: self.url.clone(),
            method: self.method,
            headers: self.headers.clone(),
            body,
            body_encoding,
            timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    Base64,
}

/// Request parameters as they travel to the host service or companion server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequest {
    pub id: String,
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub body_encoding: Option<BodyEncoding>,
    pub timeout_ms: u64,
}

/// Response surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub url: String,
    pub body: Bytes,
    /// Served from the cache, either directly or after a 304
    pub from_cache: bool,
    pub progress: Option<Progress>,
}

impl Response {
    pub(crate) fn from_snapshot(snapshot: ResponseSnapshot, from_cache: bool) -> Self {
        Self {
            status: snapshot.status,
            status_text: snapshot.status_text,
            headers: snapshot.headers,
            url: snapshot.url,
            body: snapshot.content,
            from_cache,
            progress: snapshot.progress,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Response(Response),
    /// Raw body, returned for `direct` requests
    Bytes(Bytes),
}

impl Reply {
    pub fn into_bytes(self) -> Bytes {
        match self {
            Reply::Response(response) => response.body,
            Reply::Bytes(bytes) => bytes,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Reply::Response(response) => Some(response),
            Reply::Bytes(_) => None,
        }
    }
}
