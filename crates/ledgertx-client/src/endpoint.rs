//! Ledger endpoint abstraction.
//!
//! The endpoint is the external ledger as seen by this client: it accepts an
//! encoded transaction and answers result queries. Implementations may use
//! HTTP, gRPC, or any other transport.

use async_trait::async_trait;
use bytes::Bytes;

use ledgertx_core::TransactionId;

use crate::error::Result;
use crate::messages::TransactionResult;

/// The ledger's request/response interface.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait LedgerEndpoint: Send + Sync {
    /// Submit a transaction in canonical wire form.
    ///
    /// Resubmitting identical bytes is safe and returns the same id.
    async fn submit(&self, transaction: Bytes) -> Result<TransactionId>;

    /// Query the current result. Read-only and safe to call repeatedly.
    async fn transaction_result(&self, id: &TransactionId) -> Result<TransactionResult>;
}

/// A simple in-memory ledger for testing.
///
/// Decodes and checks submissions the way a real ledger would, then reports
/// a configurable number of `Pending` polls before the terminal result.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    use ledgertx_core::{check_ready, verify_signatures, Transaction, ValidationError};
    use tokio::sync::RwLock;

    use crate::error::ClientError;
    use crate::messages::{limits, RejectCode};

    /// Configuration for the in-memory ledger.
    #[derive(Debug, Clone)]
    pub struct MemoryLedgerConfig {
        /// Number of `Pending` answers before the terminal result.
        pub pending_polls: u32,
        /// Whether to verify signatures on submission.
        pub verify_signatures: bool,
    }

    impl Default for MemoryLedgerConfig {
        fn default() -> Self {
            Self {
                pending_polls: 0,
                verify_signatures: true,
            }
        }
    }

    /// A submitted transaction and the outcome it will settle on.
    #[derive(Debug)]
    struct Entry {
        transaction: Transaction,
        outcome: TransactionResult,
        polls_remaining: u32,
    }

    #[derive(Debug, Default)]
    struct LedgerState {
        entries: HashMap<TransactionId, Entry>,
        scripted: HashMap<TransactionId, RejectCode>,
        submissions: usize,
        polls: usize,
    }

    /// In-memory ledger implementation.
    #[derive(Debug)]
    pub struct MemoryLedger {
        config: MemoryLedgerConfig,
        state: RwLock<LedgerState>,
        online: AtomicBool,
    }

    impl MemoryLedger {
        pub fn new(config: MemoryLedgerConfig) -> Self {
            Self {
                config,
                state: RwLock::new(LedgerState::default()),
                online: AtomicBool::new(true),
            }
        }

        /// Simulate losing (or regaining) connectivity.
        pub fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }

        /// Make the transaction with this id settle on `Rejected(code)`.
        pub async fn script_rejection(&self, id: TransactionId, code: RejectCode) {
            self.state.write().await.scripted.insert(id, code);
        }

        /// The transaction accepted under this id, if any.
        pub async fn transaction(&self, id: &TransactionId) -> Option<Transaction> {
            self.state
                .read()
                .await
                .entries
                .get(id)
                .map(|e| e.transaction.clone())
        }

        /// Number of submit calls that reached the ledger.
        pub async fn submission_count(&self) -> usize {
            self.state.read().await.submissions
        }

        /// Number of result queries that reached the ledger.
        pub async fn poll_count(&self) -> usize {
            self.state.read().await.polls
        }

        /// Ids of every committed transaction.
        pub async fn committed(&self) -> Vec<TransactionId> {
            let state = self.state.read().await;
            let mut ids: Vec<_> = state
                .entries
                .iter()
                .filter(|(_, e)| e.outcome.is_committed())
                .map(|(id, _)| *id)
                .collect();
            ids.sort();
            ids
        }

        fn ensure_online(&self) -> Result<()> {
            if self.online.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(ClientError::Transport("ledger unreachable".into()))
            }
        }

        /// Decide the outcome a real ledger would reach for this transaction.
        fn judge(&self, tx: &Transaction, size: usize) -> TransactionResult {
            if size > limits::MAX_TRANSACTION_BYTES
                || tx.operations().len() > limits::MAX_OPERATIONS
            {
                return TransactionResult::Rejected(RejectCode::MalformedTransaction);
            }
            match check_ready(tx) {
                Err(ValidationError::IncompleteCredentials { .. }) => {
                    return TransactionResult::Rejected(RejectCode::MissingCredential);
                }
                Err(ValidationError::MissingEvidence { .. }) => {
                    return TransactionResult::Rejected(RejectCode::MissingEvidence);
                }
                Err(_) => return TransactionResult::Rejected(RejectCode::Unknown),
                Ok(()) => {}
            }
            if self.config.verify_signatures && verify_signatures(tx).is_err() {
                return TransactionResult::Rejected(RejectCode::InvalidSignature);
            }
            TransactionResult::Committed
        }
    }

    impl Default for MemoryLedger {
        fn default() -> Self {
            Self::new(MemoryLedgerConfig::default())
        }
    }

    #[async_trait]
    impl LedgerEndpoint for MemoryLedger {
        async fn submit(&self, transaction: Bytes) -> Result<TransactionId> {
            self.ensure_online()?;
            let tx = Transaction::from_bytes(&transaction)?;
            let id = tx.id();

            let mut state = self.state.write().await;
            state.submissions += 1;
            if state.entries.contains_key(&id) {
                return Ok(id);
            }

            let outcome = match state.scripted.get(&id) {
                Some(code) => TransactionResult::Rejected(*code),
                None => self.judge(&tx, transaction.len()),
            };
            state.entries.insert(
                id,
                Entry {
                    transaction: tx,
                    outcome,
                    polls_remaining: self.config.pending_polls,
                },
            );
            Ok(id)
        }

        async fn transaction_result(&self, id: &TransactionId) -> Result<TransactionResult> {
            self.ensure_online()?;
            let mut state = self.state.write().await;
            state.polls += 1;
            // Not seen yet: a real ledger may still be propagating it.
            let Some(entry) = state.entries.get_mut(id) else {
                return Ok(TransactionResult::Pending);
            };
            if entry.polls_remaining > 0 {
                entry.polls_remaining -= 1;
                return Ok(TransactionResult::Pending);
            }
            Ok(entry.outcome)
        }
    }
}
