//! # Dispatcher
//!
//! Single entry point for callers. Per request it:
//!
//! 1. Looks the URL up in the cache (GET only). Fresh entries are returned
//!    without touching the network; entries with validators turn into
//!    conditional headers.
//! 2. Acquires a slot from the normal or priority lane.
//! 3. Sends through the configured [`Transport`], retrying on retry signals.
//! 4. Persists cacheable responses, or serves the cached body on a 304.
//!
//! The timeout covers everything after the request is queued, slot wait
//! included. Expiry or abort drops the in-flight work, which releases the
//! slot.

use bridge_traits::device::DeviceProfile;
use bridge_traits::host::SlotId;
use bridge_traits::http::HttpMethod;
use core_cache::{
    CacheClient, CacheConfig, CacheEntry, CacheLookup, CacheStats, ResponseSnapshot, SaveOutcome,
};
use core_codec::CodecPool;
use core_runtime::logging::redact_headers;
use core_runtime::{ByteBudget, CoreConfig};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{RequestError, Result, TransportError};
use crate::pool::SlotLanes;
use crate::transport::{select_transport, Transport, TransportKind};
use crate::types::{
    ProgressCallback, Reply, RequestConfig, RequestDescriptor, RequestFlags, RequestStatus,
    Response, WireRequest,
};

enum Interrupted {
    Timeout,
    Abort,
}

pub struct Dispatcher {
    lanes: SlotLanes,
    transport: Arc<dyn Transport>,
    cache: Option<CacheClient>,
    codec: CodecPool,
    request_timeout: Duration,
    retry_attempts: u32,
    /// Budget fixed by configuration; device profiles do not override it
    fixed_budget: bool,
    initialized: AtomicBool,
}

impl Dispatcher {
    /// Build a dispatcher with the transport the configuration selects.
    ///
    /// Must be called inside a Tokio runtime; the cache worker is spawned
    /// here.
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;
        let transport = select_transport(&config)?;
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: CoreConfig, transport: Arc<dyn Transport>) -> Self {
        let cache = config.cache_enabled.then(|| {
            CacheClient::spawn(CacheConfig::from(&config), Arc::clone(&config.clock))
        });

        info!(
            transport = ?transport.kind(),
            normal_slots = config.normal_slots,
            priority_slots = config.priority_slots,
            cache = cache.is_some(),
            "request dispatcher ready"
        );

        Self {
            lanes: SlotLanes::new(config.normal_slots, config.priority_slots),
            transport,
            cache,
            codec: CodecPool::new(config.offload_threshold),
            request_timeout: config.request_timeout,
            retry_attempts: config.retry_attempts,
            fixed_budget: config.cache_budget.is_some(),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn lanes(&self) -> &SlotLanes {
        &self.lanes
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Size the cache from the host's device profile. Only the first call
    /// has an effect; later calls are rejected.
    ///
    /// Returns the budget now in force, or `None` when the cache keeps its
    /// configured or fallback budget.
    #[instrument(skip(self))]
    pub async fn initialize(&self, profile: &DeviceProfile) -> Result<Option<ByteBudget>> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RequestError::Config(
                "Dispatcher already initialized".to_string(),
            ));
        }

        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        if self.fixed_budget || self.transport.kind() != TransportKind::HostService {
            debug!("keeping configured cache budget");
            return Ok(None);
        }

        let budget = ByteBudget::from_device(profile);
        let evicted = cache.set_budget(budget).await?;
        info!(%budget, evicted, "cache budget sized from device profile");
        Ok(Some(budget))
    }

    /// Issue a request.
    pub async fn request(
        &self,
        descriptor: impl Into<RequestDescriptor>,
        flags: RequestFlags,
    ) -> Result<Reply> {
        self.dispatch(descriptor.into(), flags).await
    }

    #[instrument(
        skip(self, descriptor, flags),
        fields(method = %descriptor.method, url = %descriptor.url)
    )]
    async fn dispatch(&self, descriptor: RequestDescriptor, flags: RequestFlags) -> Result<Reply> {
        let mut request = RequestConfig::new(descriptor, self.request_timeout);
        let after = request.timeout;
        debug!(
            id = %request.id,
            headers = %redact_headers(&request.headers),
            ?flags,
            "request queued"
        );

        let outcome = {
            let work = tokio::time::timeout(after, self.execute(&mut request, &flags));
            match &flags.abort {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(Interrupted::Abort),
                    result = work => result.map_err(|_| Interrupted::Timeout),
                },
                None => work.await.map_err(|_| Interrupted::Timeout),
            }
        };

        match outcome {
            Ok(Ok(reply)) => {
                request.transition(RequestStatus::Done);
                Ok(reply)
            }
            Ok(Err(err)) => {
                request.transition(RequestStatus::Fail);
                debug!(id = %request.id, error = %err, "request failed");
                Err(err)
            }
            Err(Interrupted::Timeout) => {
                request.transition(RequestStatus::Timeout);
                warn!(id = %request.id, ?after, "request timed out");
                Err(RequestError::Timeout { after })
            }
            Err(Interrupted::Abort) => {
                request.transition(RequestStatus::Abort);
                debug!(id = %request.id, "request aborted");
                Err(RequestError::Aborted)
            }
        }
    }

    async fn execute(&self, request: &mut RequestConfig, flags: &RequestFlags) -> Result<Reply> {
        let cacheable = self.cache_eligible(request.method, flags);

        let mut revalidating: Option<CacheEntry> = None;
        if cacheable {
            match self.lookup(&request.url).await {
                CacheLookup::Fresh(entry) => {
                    debug!(url = %request.url, "served from cache");
                    return self.surface(entry.response, true, flags).await;
                }
                CacheLookup::Revalidate(entry) => {
                    if let Some(etag) = &entry.etag {
                        request.set_header("If-None-Match", etag.clone());
                    }
                    if let Some(modified) = &entry.last_modified {
                        request.set_header("If-Modified-Since", modified.clone());
                    }
                    trace!(url = %request.url, "revalidating cached entry");
                    revalidating = Some(entry);
                }
                CacheLookup::Miss => {}
            }
        }

        let wire = request.to_wire(&self.codec, flags.sync).await?;

        request.transition(RequestStatus::SlotWait);
        let slot = self.lanes.lane(flags.priority).acquire().await;
        request.transition(RequestStatus::InFlight);

        let outcome = self
            .send_with_retry(slot.id(), &wire, flags.on_progress.clone())
            .await;
        drop(slot);

        match (outcome, revalidating) {
            (Ok(snapshot), _) => {
                if cacheable {
                    self.persist(&request.url, snapshot.clone()).await;
                }
                self.surface(snapshot, false, flags).await
            }
            (Err(TransportError::Status { status: 304, .. }), Some(entry)) => {
                debug!(url = %request.url, "not modified, serving cached body");
                self.surface(entry.response, true, flags).await
            }
            (Err(TransportError::Status { status, response }), _) => {
                let response = (*response).inflate(&self.codec).await?;
                Err(RequestError::HttpStatus {
                    status,
                    status_text: response.status_text,
                    body: response.content,
                })
            }
            (Err(err), _) => Err(err.into()),
        }
    }

    async fn send_with_retry(
        &self,
        slot: SlotId,
        wire: &WireRequest,
        progress: Option<ProgressCallback>,
    ) -> std::result::Result<ResponseSnapshot, TransportError> {
        let mut attempt = 0;
        loop {
            match self.transport.send(slot, wire, progress.clone()).await {
                Err(err) if err.is_retry() && attempt < self.retry_attempts => {
                    attempt += 1;
                    debug!(id = %wire.id, attempt, reason = %err, "retrying request");
                }
                other => return other,
            }
        }
    }

    fn cache_eligible(&self, method: HttpMethod, flags: &RequestFlags) -> bool {
        self.cache.is_some() && method == HttpMethod::Get && flags.cache != Some(false)
    }

    async fn lookup(&self, url: &str) -> CacheLookup {
        let Some(cache) = &self.cache else {
            return CacheLookup::Miss;
        };
        match cache.get(url).await {
            Ok(lookup) => lookup,
            Err(err) => {
                warn!(url, error = %err, "cache lookup failed, treating as miss");
                CacheLookup::Miss
            }
        }
    }

    async fn persist(&self, url: &str, snapshot: ResponseSnapshot) {
        let Some(cache) = &self.cache else {
            return;
        };
        match cache.save(url, snapshot).await {
            Ok(SaveOutcome::Stored { size, evicted }) => {
                trace!(url, size, evicted, "response cached");
            }
            Ok(outcome) => trace!(url, ?outcome, "response not cached"),
            Err(err) => warn!(url, error = %err, "cache save failed"),
        }
    }

    async fn surface(
        &self,
        snapshot: ResponseSnapshot,
        from_cache: bool,
        flags: &RequestFlags,
    ) -> Result<Reply> {
        let snapshot = snapshot.inflate(&self.codec).await?;
        if flags.direct {
            return Ok(Reply::Bytes(snapshot.content));
        }
        Ok(Reply::Response(Response::from_snapshot(snapshot, from_cache)))
    }

    /// GET with default flags.
    pub async fn get(&self, url: &str) -> Result<Response> {
        match self.request(url, RequestFlags::default()).await? {
            Reply::Response(response) => Ok(response),
            Reply::Bytes(_) => Err(RequestError::Config(
                "Unexpected raw reply for a non-direct request".to_string(),
            )),
        }
    }

    /// GET and parse the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.get(url).await?.json()
    }

    pub async fn get_custom_cache<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match &self.cache {
            Some(cache) => Ok(cache.get_custom(key).await?),
            None => Ok(None),
        }
    }

    /// Store `value` under `key` for `max_age_seconds` (default 60).
    pub async fn save_custom_cache<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        max_age_seconds: Option<i64>,
    ) -> Result<()> {
        let cache = self
            .cache
            .as_ref()
            .ok_or_else(|| RequestError::Config("Response cache is disabled".to_string()))?;
        Ok(cache.save_custom(key, value, max_age_seconds).await?)
    }

    pub async fn clear_cache(&self) -> Result<usize> {
        match &self.cache {
            Some(cache) => Ok(cache.clear().await?),
            None => Ok(0),
        }
    }

    pub async fn cache_stats(&self) -> Result<Option<CacheStats>> {
        match &self.cache {
            Some(cache) => Ok(Some(cache.stats().await?)),
            None => Ok(None),
        }
    }

    /// Stop the cache worker. Requests issued afterwards bypass the cache.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(cache) = &self.cache {
            cache.shutdown().await?;
        }
        info!("request dispatcher shut down");
        Ok(())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("transport", &self.transport.kind())
            .field("lanes", &self.lanes)
            .field("cache", &self.cache.is_some())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
