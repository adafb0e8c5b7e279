//! # Request Error Types

use bridge_traits::error::BridgeError;
use bytes::Bytes;
use core_cache::{CacheError, ResponseSnapshot};
use core_codec::CodecError;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Nothing usable came back: connection, stream or host failure.
    #[error("Network failure: {0}")]
    Network(String),

    /// A complete response with a non-2xx status.
    #[error("HTTP {status}")]
    Status {
        status: u16,
        response: Box<ResponseSnapshot>,
    },

    /// Structured "please retry" signal; distinct from a hard failure.
    #[error("Retry requested: {0}")]
    Retry(String),

    #[error("Payload decode failed: {0}")]
    Decode(#[from] CodecError),
}

impl TransportError {
    pub fn is_retry(&self) -> bool {
        matches!(self, TransportError::Retry(_))
    }

    pub fn status(status: u16, response: ResponseSnapshot) -> Self {
        TransportError::Status {
            status,
            response: Box::new(response),
        }
    }
}

impl From<BridgeError> for TransportError {
    fn from(err: BridgeError) -> Self {
        TransportError::Network(err.to_string())
    }
}

/// Errors surfaced to callers of the dispatcher.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} {status_text}")]
    HttpStatus {
        status: u16,
        status_text: String,
        body: Bytes,
    },

    /// Retry signal persisted after every allowed attempt.
    #[error("Request should be retried: {0}")]
    Retryable(String),

    #[error("Request timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Decode error: {0}")]
    Decode(#[from] CodecError),

    #[error("Invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request aborted")]
    Aborted,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl RequestError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RequestError::Retryable(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<TransportError> for RequestError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(message) => RequestError::Network(message),
            TransportError::Status { status, response } => RequestError::HttpStatus {
                status,
                status_text: response.status_text,
                body: response.content,
            },
            TransportError::Retry(message) => RequestError::Retryable(message),
            TransportError::Decode(err) => RequestError::Decode(err),
        }
    }
}

impl From<core_runtime::Error> for RequestError {
    fn from(err: core_runtime::Error) -> Self {
        RequestError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RequestError>;
