use thiserror::Error;

/// Failure to decode (or encode) a payload crossing a context boundary.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Gzip stream error: {0}")]
    Gzip(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Codec worker failed: {0}")]
    Offload(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;
