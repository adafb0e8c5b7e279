//! # Core Configuration Module
//!
//! Provides configuration management for the request/cache core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance holding every dependency and tuning knob the dispatcher needs. It
//! enforces fail-fast validation so a misconfigured core never starts.
//!
//! ## Transports
//!
//! At least one transport bridge must be available:
//!
//! - `HostService` - privileged per-slot RPC into the embedding host
//! - `HttpClient` - plain HTTP against the local companion server
//!   (desktop default: reqwest, injected by the `desktop-shims` feature)
//!
//! With [`TransportPreference::Auto`] the host service wins when both are present.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .host_service(Arc::new(MyHostService))
//!     .normal_slots(8)
//!     .priority_slots(2)
//!     .request_timeout(Duration::from_secs(5))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! Missing transports produce [`Error::CapabilityMissing`] with an actionable
//! message; out-of-range values produce [`Error::Config`].

use crate::budget::ByteBudget;
use crate::error::{Error, Result};
use bridge_traits::{Clock, DeviceProfile, HostService, HttpClient, SystemClock};
use std::sync::Arc;
use std::time::Duration;

/// Default companion endpoint used by the network transport.
pub const DEFAULT_COMPANION_URL: &str = "http://127.0.0.1:8787/request";

/// Upper bound on the slots in either lane.
pub const MAX_SLOTS_PER_LANE: usize = 256;

/// Which transport the dispatcher should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportPreference {
    /// Host service when injected, otherwise the companion server
    #[default]
    Auto,
    /// Always the privileged host service
    HostService,
    /// Always the companion server over HTTP
    Network,
}

/// Core configuration for the request/cache core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Slots in the normal lane
    pub normal_slots: usize,

    /// Slots in the priority lane
    pub priority_slots: usize,

    /// Per-request timeout, covering slot wait and transport time
    pub request_timeout: Duration,

    /// How many times a request is re-sent after a transport asks for a retry
    pub retry_attempts: u32,

    /// Freshness lifetime for responses without `Cache-Control: max-age`
    pub default_max_age: Duration,

    /// Interval of the background expiry sweep
    pub sweep_interval: Duration,

    /// Payloads larger than this are encoded/decoded on the blocking pool
    pub offload_threshold: usize,

    /// Endpoint of the local companion server
    pub companion_url: String,

    /// Whether GET requests participate in the response cache by default
    pub cache_enabled: bool,

    /// Explicit cache budget; overrides device-derived sizing
    pub cache_budget: Option<ByteBudget>,

    /// Device characteristics to size the cache from
    pub device_profile: Option<DeviceProfile>,

    pub transport: TransportPreference,

    /// Companion-server HTTP client (optional with desktop default)
    pub http_client: Option<Arc<dyn HttpClient>>,

    /// Privileged host service (optional)
    pub host_service: Option<Arc<dyn HostService>>,

    /// Time source for cache expiry
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("normal_slots", &self.normal_slots)
            .field("priority_slots", &self.priority_slots)
            .field("request_timeout", &self.request_timeout)
            .field("retry_attempts", &self.retry_attempts)
            .field("default_max_age", &self.default_max_age)
            .field("sweep_interval", &self.sweep_interval)
            .field("offload_threshold", &self.offload_threshold)
            .field("companion_url", &self.companion_url)
            .field("cache_enabled", &self.cache_enabled)
            .field("cache_budget", &self.cache_budget)
            .field("device_profile", &self.device_profile)
            .field("transport", &self.transport)
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field(
                "host_service",
                &self.host_service.as_ref().map(|_| "HostService { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// True when requests go through the privileged host service.
    pub fn uses_host_service(&self) -> bool {
        match self.transport {
            TransportPreference::HostService => true,
            TransportPreference::Network => false,
            TransportPreference::Auto => self.host_service.is_some(),
        }
    }

    /// Budget the cache starts with.
    ///
    /// An explicit budget wins. Host-service builds derive it from the device
    /// profile (configured, or reported by the host); everything else uses
    /// [`ByteBudget::FALLBACK`].
    pub fn resolved_budget(&self) -> ByteBudget {
        if let Some(budget) = self.cache_budget {
            return budget;
        }

        if self.uses_host_service() {
            let profile = self.device_profile.or_else(|| {
                self.host_service
                    .as_ref()
                    .and_then(|host| host.device_profile())
            });
            if let Some(profile) = profile {
                return ByteBudget::from_device(&profile);
            }
        }

        ByteBudget::FALLBACK
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Both slot lanes have between 1 and [`MAX_SLOTS_PER_LANE`] slots
    /// - Timeout, sweep interval and max-age are within sane bounds
    /// - The preferred transport has a bridge behind it
    pub fn validate(&self) -> Result<()> {
        if self.normal_slots == 0 {
            return Err(Error::Config(
                "Normal lane must have at least 1 slot".to_string(),
            ));
        }

        if self.priority_slots == 0 {
            return Err(Error::Config(
                "Priority lane must have at least 1 slot".to_string(),
            ));
        }

        if self.normal_slots > MAX_SLOTS_PER_LANE || self.priority_slots > MAX_SLOTS_PER_LANE {
            return Err(Error::Config(format!(
                "Slot lanes are limited to {} slots each",
                MAX_SLOTS_PER_LANE
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout > Duration::from_secs(600) {
            return Err(Error::Config(
                "Request timeout exceeds maximum of 10 minutes".to_string(),
            ));
        }

        if self.retry_attempts > 5 {
            return Err(Error::Config(
                "Retry attempts exceed maximum of 5".to_string(),
            ));
        }

        if self.sweep_interval.is_zero() {
            return Err(Error::Config(
                "Sweep interval must be greater than 0".to_string(),
            ));
        }

        if self.default_max_age.is_zero() {
            return Err(Error::Config(
                "Default max-age must be greater than 0".to_string(),
            ));
        }

        if let Some(budget) = self.cache_budget {
            if budget.as_bytes() == 0 {
                return Err(Error::Config(
                    "Cache budget must be greater than 0 bytes".to_string(),
                ));
            }
        }

        match self.transport {
            TransportPreference::HostService if self.host_service.is_none() => {
                return Err(host_service_missing_error());
            }
            TransportPreference::Network if self.http_client.is_none() => {
                return Err(http_client_missing_error());
            }
            TransportPreference::Auto
                if self.host_service.is_none() && self.http_client.is_none() =>
            {
                return Err(http_client_missing_error());
            }
            _ => {}
        }

        if !self.uses_host_service() && self.companion_url.is_empty() {
            return Err(Error::Config(
                "Companion URL cannot be empty when using the network transport".to_string(),
            ));
        }

        Ok(())
    }
}

fn host_service_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HostService".to_string(),
        message: "Host-service transport requested but no HostService was injected. \
                 Embedded hosts: pass the host bridge via .host_service(). \
                 Desktop: use TransportPreference::Auto or ::Network."
            .to_string(),
    }
}

fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No transport available for the companion server. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                 Embedded hosts: inject a HostService instead."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Option<Arc<dyn HttpClient>>> {
    let client = bridge_desktop::ReqwestHttpClient::with_timeout(timeout).map_err(|e| {
        Error::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: format!("Failed to create default desktop HTTP client: {}", e),
        }
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(Some(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Option<Arc<dyn HttpClient>>> {
    Ok(None)
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) to validate and create the
/// final config. Unset values take the documented defaults.
#[derive(Default)]
pub struct CoreConfigBuilder {
    normal_slots: Option<usize>,
    priority_slots: Option<usize>,
    request_timeout: Option<Duration>,
    retry_attempts: Option<u32>,
    default_max_age: Option<Duration>,
    sweep_interval: Option<Duration>,
    offload_threshold: Option<usize>,
    companion_url: Option<String>,
    cache_enabled: Option<bool>,
    cache_budget: Option<ByteBudget>,
    device_profile: Option<DeviceProfile>,
    transport: TransportPreference,
    http_client: Option<Arc<dyn HttpClient>>,
    host_service: Option<Arc<dyn HostService>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoreConfigBuilder {
    /// Sets the size of the normal lane (default: 8).
    pub fn normal_slots(mut self, slots: usize) -> Self {
        self.normal_slots = Some(slots);
        self
    }

    /// Sets the size of the priority lane (default: 2).
    pub fn priority_slots(mut self, slots: usize) -> Self {
        self.priority_slots = Some(slots);
        self
    }

    /// Sets the per-request timeout (default: 5 seconds).
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets how often a retry signal from a transport is honoured (default: 1).
    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = Some(attempts);
        self
    }

    /// Sets the fallback freshness lifetime (default: 30 minutes).
    pub fn default_max_age(mut self, max_age: Duration) -> Self {
        self.default_max_age = Some(max_age);
        self
    }

    /// Sets the background expiry sweep interval (default: 60 seconds).
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Sets the payload size above which codec work is offloaded (default: 64 KiB).
    pub fn offload_threshold(mut self, bytes: usize) -> Self {
        self.offload_threshold = Some(bytes);
        self
    }

    /// Sets the companion server endpoint.
    pub fn companion_url(mut self, url: impl Into<String>) -> Self {
        self.companion_url = Some(url.into());
        self
    }

    /// Enables or disables response caching for GET requests (default: enabled).
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = Some(enabled);
        self
    }

    /// Sets an explicit cache budget.
    pub fn cache_budget(mut self, budget: ByteBudget) -> Self {
        self.cache_budget = Some(budget);
        self
    }

    /// Sets the device profile used to size the cache.
    pub fn device_profile(mut self, profile: DeviceProfile) -> Self {
        self.device_profile = Some(profile);
        self
    }

    pub fn transport(mut self, preference: TransportPreference) -> Self {
        self.transport = preference;
        self
    }

    /// Sets the companion-server HTTP client.
    ///
    /// If not provided, the `desktop-shims` feature injects a reqwest client.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the privileged host service.
    pub fn host_service(mut self, host: Arc<dyn HostService>) -> Self {
        self.host_service = Some(host);
        self
    }

    /// Sets the time source (default: system clock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if a required transport is missing or a value is out
    /// of range.
    pub fn build(self) -> Result<CoreConfig> {
        let request_timeout = self.request_timeout.unwrap_or(Duration::from_secs(5));

        let http_client = match self.http_client {
            Some(client) => Some(client),
            None if self.transport != TransportPreference::HostService
                && (self.host_service.is_none()
                    || self.transport == TransportPreference::Network) =>
            {
                provide_default_http_client(request_timeout)?
            }
            None => None,
        };

        let config = CoreConfig {
            normal_slots: self.normal_slots.unwrap_or(8),
            priority_slots: self.priority_slots.unwrap_or(2),
            request_timeout,
            retry_attempts: self.retry_attempts.unwrap_or(1),
            default_max_age: self
                .default_max_age
                .unwrap_or(Duration::from_secs(30 * 60)),
            sweep_interval: self.sweep_interval.unwrap_or(Duration::from_secs(60)),
            offload_threshold: self.offload_threshold.unwrap_or(64 * 1024),
            companion_url: self
                .companion_url
                .unwrap_or_else(|| DEFAULT_COMPANION_URL.to_string()),
            cache_enabled: self.cache_enabled.unwrap_or(true),
            cache_budget: self.cache_budget,
            device_profile: self.device_profile,
            transport: self.transport,
            http_client,
            host_service: self.host_service,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };

        config.validate()?;

        Ok(config)
    }
}
