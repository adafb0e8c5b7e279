//! # Host Bridge Traits
//!
//! Contracts between the request/cache core and the platform it runs on.
//!
//! ## Overview
//!
//! Each trait represents a capability the core requires but that must be
//! implemented differently per platform:
//!
//! ### Transports
//! - [`HttpClient`](http::HttpClient) - Plain HTTP against the local companion
//!   server, with chunked body streaming
//! - [`HostService`](host::HostService) - Privileged per-slot RPC into the host
//!   application, with streamed replies
//!
//! ### Platform information
//! - [`DeviceProfile`](device::DeviceProfile) - Memory/display characteristics
//!   used to size the response cache
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic cache expiry tests
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Transport | Implementation Crate |
//! |----------|-----------|---------------------|
//! | Desktop  | `HttpClient` | `bridge-desktop` |
//! | Embedded host | `HostService` | provided by the host |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should map platform errors onto it and keep messages actionable.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single instance can serve every
//! concurrent request.

pub mod device;
pub mod error;
pub mod host;
pub mod http;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use device::{DeviceProfile, DisplayClass};
pub use host::{HostReply, HostReplyStream, HostService, SlotId};
pub use http::{find_header, HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpStream};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
