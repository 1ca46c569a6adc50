//! Error types for submission and confirmation.

use std::time::Duration;

use thiserror::Error;

use ledgertx_core::{CodecError, TransactionId, ValidationError};

use crate::messages::RejectCode;

/// Errors that can occur while submitting or confirming a transaction.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transaction is not ready; nothing was sent.
    #[error("transaction not ready: {0}")]
    Validation(#[from] ValidationError),

    /// Connectivity failure talking to the ledger. Never retried here.
    #[error("transport error: {0}")]
    Transport(String),

    /// The confirmation deadline passed while the result was still pending.
    #[error("timed out after {waited:?} waiting for {id}")]
    TimedOut { id: TransactionId, waited: Duration },

    /// The caller cancelled the wait.
    #[error("wait for {id} cancelled")]
    Cancelled { id: TransactionId },

    /// The ledger reported a terminal rejection.
    #[error("transaction {id} rejected: {code:?}")]
    Rejected { id: TransactionId, code: RejectCode },

    /// The ledger acknowledged a different id than the one computed locally.
    #[error("ledger returned id {got}, expected {expected}")]
    IdMismatch {
        expected: TransactionId,
        got: TransactionId,
    },

    /// The submitted bytes could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl ClientError {
    /// Whether the caller may reasonably retry the same transaction.
    ///
    /// Resubmission is safe because ids are content-derived.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::TimedOut { .. }
        )
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
