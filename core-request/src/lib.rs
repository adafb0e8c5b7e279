//! # Request Core
//!
//! Concurrent HTTP-like request handling with bounded slots, two
//! interchangeable transports and a shared response cache.
//!
//! ## Overview
//!
//! ```text
//! caller ──> Dispatcher ──> CacheClient (lookup)
//!                │
//!                ├──> SlotLanes (normal | priority)
//!                ├──> Transport (HostTransport | NetworkTransport)
//!                └──> CacheClient (save / 304)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_request::{Dispatcher, RequestFlags};
//! use core_runtime::CoreConfig;
//!
//! let config = CoreConfig::builder().build()?;
//! let dispatcher = Dispatcher::new(config)?;
//!
//! let items: Vec<Item> = dispatcher.get_json("https://api.example.com/items").await?;
//! let image = dispatcher
//!     .request("https://cdn.example.com/a.png", RequestFlags::new().direct().priority())
//!     .await?
//!     .into_bytes();
//! ```

pub mod dispatcher;
pub mod error;
pub mod pool;
pub mod transport;
pub mod types;

pub use core_cache::{Progress, ResponseSnapshot};
pub use dispatcher::Dispatcher;
pub use error::{RequestError, Result, TransportError};
pub use pool::{SlotGuard, SlotLanes, SlotLease, SlotPool};
pub use transport::{select_transport, HostTransport, NetworkTransport, Transport, TransportKind};
pub use types::{
    BodyEncoding, ProgressCallback, Reply, RequestBody, RequestConfig, RequestDescriptor,
    RequestFlags, RequestStatus, Response, WireRequest,
};
