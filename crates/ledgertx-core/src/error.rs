//! Error types for LedgerTx core.

use thiserror::Error;

use crate::address::SignatureCredential;
use crate::types::TransactionId;

/// Errors from key parsing, signature checks and the canonical codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("unsupported wire version: {0}")]
    UnsupportedVersion(u64),

    #[error("unknown operation kind: {0:#06x}")]
    UnknownOperation(u64),

    #[error("malformed transaction: {0}")]
    Malformed(String),

    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("non-canonical encoding")]
    NonCanonical,
}

/// Errors raised while building or signing a transaction.
///
/// All of these are detected locally, before any network call.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("credential {0} is not required by this transaction")]
    UnauthorizedCredential(SignatureCredential),

    #[error("transaction already signed by {0}")]
    DuplicateSignature(SignatureCredential),

    #[error("evidence must be attached before any signature")]
    EvidenceAfterSignature,

    #[error("evidence from {0} is already attached")]
    DuplicateEvidence(SignatureCredential),

    #[error("cannot merge transaction {theirs} into {ours}")]
    TransactionMismatch {
        ours: TransactionId,
        theirs: TransactionId,
    },

    #[error("conflicting signatures for {0}")]
    ConflictingSignature(SignatureCredential),

    #[error("signature from {0} does not verify")]
    InvalidSignature(SignatureCredential),
}

/// Validation errors for a transaction about to be submitted.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("incomplete credentials: {missing} of {required} required signatures missing")]
    IncompleteCredentials { missing: usize, required: usize },

    #[error("missing evidence from {missing} private-data owner(s)")]
    MissingEvidence { missing: usize },

    #[error("signature from {0} failed verification")]
    SignatureFailed(SignatureCredential),

    #[error("signature from {0} is not a required credential")]
    UnexpectedSignature(SignatureCredential),
}

impl From<hex::FromHexError> for CodecError {
    fn from(e: hex::FromHexError) -> Self {
        CodecError::InvalidHex(e.to_string())
    }
}
