//! Error types for the unified API.

use ledgertx_client::ClientError;
use ledgertx_core::{BuildError, CodecError, ValidationError};
use ledgertx_private::PrivateError;
use thiserror::Error;

/// Errors that can occur anywhere between building and confirming a
/// transaction.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Building or signing failed.
    #[error("build error: {0}")]
    Build(#[from] BuildError),

    /// The transaction is not ready for submission.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Submission or confirmation failed.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// The private-data flow failed.
    #[error("private flow error: {0}")]
    Private(#[from] PrivateError),
}

impl LedgerError {
    /// Whether the same call may succeed if repeated later.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Client(e) => e.is_retryable(),
            LedgerError::Private(PrivateError::Client(e)) => e.is_retryable(),
            LedgerError::Private(PrivateError::Transport(_)) => true,
            _ => false,
        }
    }
}

/// Result type for unified API operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
