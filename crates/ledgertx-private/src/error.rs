//! Error types for private-data transactions.

use thiserror::Error;

use ledgertx_client::ClientError;
use ledgertx_core::{BuildError, CodecError, SignatureCredential};

use crate::coordinator::FlowState;

/// Errors that can occur while coordinating a private transaction.
#[derive(Debug, Error)]
pub enum PrivateError {
    /// A private-data owner declined to issue evidence.
    #[error("evidence rejected by {owner}: {reason}")]
    EvidenceRejected {
        owner: SignatureCredential,
        reason: String,
    },

    /// An owner was supplied that the transaction does not designate.
    #[error("owner {0} is not designated by this transaction")]
    UnknownOwner(SignatureCredential),

    /// A designated owner was not supplied.
    #[error("no endpoint supplied for designated owner {0}")]
    MissingOwner(SignatureCredential),

    /// Evidence did not carry a valid attestation for this transaction.
    #[error("invalid attestation from {0}")]
    InvalidAttestation(SignatureCredential),

    /// An operation was called out of order.
    #[error("invalid state: expected {expected:?}, flow is {actual:?}")]
    InvalidState { expected: FlowState, actual: FlowState },

    /// The flow input is unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Connectivity failure talking to an owner.
    #[error("owner transport error: {0}")]
    Transport(String),

    /// Payload or attestation serialization failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Result type for private-data operations.
pub type Result<T> = std::result::Result<T, PrivateError>;
