//! Ledger result types.
//!
//! Results are observed by polling, never pushed.

use serde::{Deserialize, Serialize};

/// Wire size limits enforced by the in-memory ledger.
pub mod limits {
    /// Max encoded size of a submitted transaction.
    pub const MAX_TRANSACTION_BYTES: usize = 1024 * 1024;
    /// Max operations in one transaction.
    pub const MAX_OPERATIONS: usize = 256;
}

/// Outcome of a transaction as reported by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionResult {
    /// Not yet decided. Keep polling.
    Pending,
    /// Included in the ledger.
    Committed,
    /// Terminally rejected. Not retryable without building a new transaction.
    Rejected(RejectCode),
}

impl TransactionResult {
    /// Whether polling can stop.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionResult::Pending)
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, TransactionResult::Committed)
    }
}

/// Rejection codes reported by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum RejectCode {
    /// Unknown/unspecified error.
    Unknown = 0,
    /// A signature did not verify.
    InvalidSignature = 1,
    /// A required credential did not sign.
    MissingCredential = 2,
    /// Required private-data evidence was not attached.
    MissingEvidence = 3,
    /// The source account cannot cover the amount.
    InsufficientBalance = 4,
    /// The target table does not exist.
    TableNotFound = 5,
    /// The key or token already exists.
    DuplicateEntry = 6,
    /// The signer lacks permission for the operation.
    PermissionDenied = 7,
    /// The contract method failed.
    ContractFailure = 8,
    /// The transaction could not be decoded or exceeds limits.
    MalformedTransaction = 9,
}

impl RejectCode {
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Codes this client does not know map to [`RejectCode::Unknown`].
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::InvalidSignature,
            2 => Self::MissingCredential,
            3 => Self::MissingEvidence,
            4 => Self::InsufficientBalance,
            5 => Self::TableNotFound,
            6 => Self::DuplicateEntry,
            7 => Self::PermissionDenied,
            8 => Self::ContractFailure,
            9 => Self::MalformedTransaction,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_code_mapping_is_stable() {
        for n in 0..=9u16 {
            assert_eq!(RejectCode::from_u16(n).to_u16(), n);
        }
        assert_eq!(RejectCode::from_u16(4242), RejectCode::Unknown);
    }

    #[test]
    fn test_terminal_results() {
        assert!(!TransactionResult::Pending.is_terminal());
        assert!(TransactionResult::Committed.is_terminal());
        assert!(TransactionResult::Rejected(RejectCode::DuplicateEntry).is_terminal());
        assert!(!TransactionResult::Rejected(RejectCode::Unknown).is_committed());
    }
}
