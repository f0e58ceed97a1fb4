//! Error types for the Stratum RPC codec.

use thiserror::Error;

/// Stratum RPC codec errors.
#[derive(Error, Debug)]
pub enum StratumRpcError {
    /// Network I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame, or a body that doesn't fit the requested type
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A single line exceeded the configured frame limit
    #[error("Frame exceeds {0} bytes")]
    FrameTooLarge(usize),

    /// Request body was asked for but the request carried no params
    #[error("Request body missing params")]
    MissingParams,

    /// Response id is not a sequence number this side could have issued
    #[error("Invalid response id: {0}")]
    InvalidId(String),

    /// Error field is neither a string nor a `[code, message, ...]` array
    #[error("Invalid error {0}")]
    InvalidError(serde_json::Value),

    /// Body read without a matching header
    #[error("No {0} body to read")]
    NoBody(&'static str),

    /// Response written for a request that is not pending (never seen, or
    /// already answered)
    #[error("Invalid sequence number in response: {0}")]
    UnknownSequence(u64),

    /// Inbound sequence numbers ran out
    #[error("Sequence numbers exhausted")]
    SequenceExhausted,
}

/// Convenient Result type for codec operations.
pub type StratumRpcResult<T> = Result<T, StratumRpcError>;
