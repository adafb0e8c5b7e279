//! Workspace façade crate.
//!
//! Exposes feature flags that map onto the member crates so host applications
//! can depend on `request-core-workspace` alone. With the default
//! `desktop-shims` feature the dispatcher is wired to the reqwest-backed
//! companion transport; `host-service` builds expect the host to inject a
//! `HostService` bridge instead.

#[cfg(any(feature = "desktop-shims", feature = "host-service"))]
pub use core_request::{
    Dispatcher, Reply, RequestDescriptor, RequestError, RequestFlags, Response,
};

#[cfg(feature = "cache")]
pub use core_cache::{CacheClient, CacheLookup};

#[cfg(feature = "codec")]
pub use core_codec::{decode_response, encode_request, CodecError};
