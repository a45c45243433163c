use thiserror::Error;

/// Behavioral error categories for the rendezvous/messaging core.
///
/// Variants map onto the categories from the design's error-handling section:
/// transport, protocol, state, and timing failures.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("resolve failed for `{0}`: {1}")]
    ResolveFailed(String, std::io::Error),

    #[error("bind failed on `{0}`: {1}")]
    BindFailed(String, std::io::Error),

    #[error("send failed: {0}")]
    SendFailed(#[from] std::io::Error),

    #[error("encode failed: {0}")]
    EncodeFailed(#[from] serde_json::Error),

    #[error("unknown action `{0}`")]
    UnknownAction(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("{0}")]
    RemoteError(String),

    #[error("peer is not initialized")]
    NotInitialized,

    #[error("collector is already listening")]
    AlreadyListening,

    #[error("peer `{0}` already registered")]
    AlreadyRegistered(String),

    #[error("peer `{0}` not found")]
    NotFound(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("socket already closed")]
    AlreadyClosed,
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
