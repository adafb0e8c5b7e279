use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    /// The worker task has stopped or dropped the request.
    #[error("Cache worker unavailable")]
    WorkerUnavailable,

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache rejected entry for {key}: {reason}")]
    Rejected { key: String, reason: String },

    #[error("Cache worker answered {0} with an unexpected reply")]
    UnexpectedReply(&'static str),

    #[error("Stored content could not be decoded: {0}")]
    Codec(#[from] core_codec::CodecError),
}

pub type Result<T> = std::result::Result<T, CacheError>;
