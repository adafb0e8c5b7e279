//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the request/cache core:
//! - Logging and tracing infrastructure
//! - Configuration management and cache budget sizing
//!
//! ## Overview
//!
//! Every other `core-*` crate depends on this one for its configuration type
//! and logging conventions. Nothing here holds process-wide mutable state
//! apart from the global `tracing` subscriber installed by
//! [`logging::init_logging`].

pub mod budget;
pub mod config;
pub mod error;
pub mod logging;

pub use budget::ByteBudget;
pub use config::{CoreConfig, CoreConfigBuilder, TransportPreference};
pub use error::{Error, Result};
