//! Submission and commit confirmation.
//!
//! [`Submitter`] sends a ready transaction to a [`LedgerEndpoint`] and polls
//! for its result at a fixed interval until the ledger reports something
//! other than `Pending`. Every wait is bounded by a deadline or a caller
//! supplied cancellation future, unless the caller explicitly opts into
//! [`Wait::Unbounded`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use ledgertx_core::{check_ready, Transaction, TransactionId};

use crate::endpoint::LedgerEndpoint;
use crate::error::{ClientError, Result};
use crate::messages::TransactionResult;

/// Configuration for polling behavior.
#[derive(Debug, Clone)]
pub struct ConfirmConfig {
    /// Delay between two result queries.
    pub poll_interval: Duration,
    /// Deadline used by [`Submitter::wait`].
    pub default_timeout: Duration,
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            default_timeout: Duration::from_secs(30),
        }
    }
}

/// How long to keep polling.
pub enum Wait {
    /// Give up with [`ClientError::TimedOut`] after this long.
    Deadline(Duration),
    /// Give up with [`ClientError::Cancelled`] once the future completes.
    Until(Pin<Box<dyn Future<Output = ()> + Send>>),
    /// Poll until a terminal result, however long it takes.
    Unbounded,
}

impl Wait {
    /// Cancel when `signal` completes.
    pub fn until(signal: impl Future<Output = ()> + Send + 'static) -> Self {
        Wait::Until(Box::pin(signal))
    }
}

impl fmt::Debug for Wait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wait::Deadline(d) => write!(f, "Wait::Deadline({d:?})"),
            Wait::Until(_) => f.write_str("Wait::Until(..)"),
            Wait::Unbounded => f.write_str("Wait::Unbounded"),
        }
    }
}

/// Sends transactions and waits for their results.
pub struct Submitter<E: LedgerEndpoint + ?Sized> {
    endpoint: Arc<E>,
    config: ConfirmConfig,
}

impl<E: LedgerEndpoint + ?Sized> Clone for Submitter<E> {
    fn clone(&self) -> Self {
        Self {
            endpoint: Arc::clone(&self.endpoint),
            config: self.config.clone(),
        }
    }
}

impl<E: LedgerEndpoint + ?Sized> Submitter<E> {
    pub fn new(endpoint: Arc<E>, config: ConfirmConfig) -> Self {
        Self { endpoint, config }
    }

    pub fn endpoint(&self) -> &Arc<E> {
        &self.endpoint
    }

    pub fn config(&self) -> &ConfirmConfig {
        &self.config
    }

    /// Send a transaction that passes [`check_ready`].
    ///
    /// Incomplete transactions fail locally without a network call.
    /// Connectivity failures are returned as-is; nothing is retried.
    pub async fn submit(&self, tx: &Transaction) -> Result<TransactionId> {
        check_ready(tx)?;

        let id = tx.id();
        let bytes = Bytes::from(tx.to_bytes());
        let size = bytes.len();
        let returned = self.endpoint.submit(bytes).await.map_err(|e| {
            warn!(%id, error = %e, "submission failed");
            e
        })?;

        if returned != id {
            warn!(expected = %id, got = %returned, "ledger acknowledged a different id");
            return Err(ClientError::IdMismatch {
                expected: id,
                got: returned,
            });
        }

        info!(
            %id,
            operations = tx.operations().len(),
            signatures = tx.signatures().len(),
            size,
            "transaction submitted"
        );
        Ok(id)
    }

    /// Poll until the ledger reports a terminal result for `id`.
    pub async fn wait_for_result(&self, id: TransactionId, wait: Wait) -> Result<TransactionResult> {
        let polling = self.poll_until_terminal(id);
        match wait {
            Wait::Deadline(limit) => match tokio::time::timeout(limit, polling).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(%id, waited = ?limit, "confirmation timed out");
                    Err(ClientError::TimedOut { id, waited: limit })
                }
            },
            Wait::Until(signal) => {
                tokio::select! {
                    result = polling => result,
                    _ = signal => {
                        debug!(%id, "confirmation wait cancelled");
                        Err(ClientError::Cancelled { id })
                    }
                }
            }
            Wait::Unbounded => polling.await,
        }
    }

    /// [`Self::wait_for_result`] bounded by the configured default timeout.
    pub async fn wait(&self, id: TransactionId) -> Result<TransactionResult> {
        self.wait_for_result(id, Wait::Deadline(self.config.default_timeout))
            .await
    }

    /// Submit, wait, and turn a ledger rejection into an error.
    pub async fn submit_and_confirm(&self, tx: &Transaction, wait: Wait) -> Result<TransactionId> {
        let id = self.submit(tx).await?;
        match self.wait_for_result(id, wait).await? {
            TransactionResult::Committed => Ok(id),
            TransactionResult::Rejected(code) => Err(ClientError::Rejected { id, code }),
            // Unreachable: polling only returns terminal results.
            TransactionResult::Pending => Err(ClientError::TimedOut {
                id,
                waited: Duration::ZERO,
            }),
        }
    }

    async fn poll_until_terminal(&self, id: TransactionId) -> Result<TransactionResult> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result = self.endpoint.transaction_result(&id).await.map_err(|e| {
                warn!(%id, attempt, error = %e, "result query failed");
                e
            })?;
            debug!(%id, attempt, ?result, "polled transaction result");

            match result {
                TransactionResult::Pending => {
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                TransactionResult::Committed => {
                    info!(%id, attempts = attempt, "transaction committed");
                    return Ok(result);
                }
                TransactionResult::Rejected(code) => {
                    warn!(%id, attempts = attempt, ?code, "transaction rejected");
                    return Ok(result);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::memory::{MemoryLedger, MemoryLedgerConfig};
    use crate::messages::RejectCode;
    use async_trait::async_trait;
    use ledgertx_core::{Address, KeyPair, Operation, SignatureCredential, ValidationError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn admin() -> KeyPair {
        KeyPair::from_seed(&[0x01; 32])
    }

    fn signed_tx() -> Transaction {
        let admin = admin();
        Transaction::simple_signed(
            Operation::asset_gen("coins", 10, Address::from(&admin)),
            admin.private_key(),
        )
        .unwrap()
    }

    fn submitter(pending_polls: u32) -> (Arc<MemoryLedger>, Submitter<MemoryLedger>) {
        let ledger = Arc::new(MemoryLedger::new(MemoryLedgerConfig {
            pending_polls,
            ..Default::default()
        }));
        let submitter = Submitter::new(Arc::clone(&ledger), ConfirmConfig::default());
        (ledger, submitter)
    }

    /// Endpoint that acknowledges every submission with a fixed id.
    struct Liar;

    #[async_trait]
    impl LedgerEndpoint for Liar {
        async fn submit(&self, _transaction: Bytes) -> Result<TransactionId> {
            Ok(TransactionId::ZERO)
        }

        async fn transaction_result(&self, _id: &TransactionId) -> Result<TransactionResult> {
            Ok(TransactionResult::Pending)
        }
    }

    /// Endpoint that counts calls and never answers anything but `Pending`.
    #[derive(Default)]
    struct Stuck {
        polls: AtomicUsize,
    }

    #[async_trait]
    impl LedgerEndpoint for Stuck {
        async fn submit(&self, _transaction: Bytes) -> Result<TransactionId> {
            Err(ClientError::Transport("not used".into()))
        }

        async fn transaction_result(&self, _id: &TransactionId) -> Result<TransactionResult> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(TransactionResult::Pending)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_and_wait_committed() {
        let (_ledger, submitter) = submitter(0);
        let tx = signed_tx();
        let id = submitter.submit(&tx).await.unwrap();
        let result = submitter.wait(id).await.unwrap();
        assert_eq!(result, TransactionResult::Committed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_observes_first_terminal_result() {
        let (ledger, submitter) = submitter(2);
        let id = submitter.submit(&signed_tx()).await.unwrap();

        let result = submitter
            .wait_for_result(id, Wait::Deadline(Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(result, TransactionResult::Committed);
        // Two pending answers, then the terminal one; no extra polls.
        assert_eq!(ledger.poll_count().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_incomplete_transaction_never_reaches_ledger() {
        let (ledger, submitter) = submitter(0);
        let admin = admin();
        let tx = Transaction::create(
            vec![Operation::asset_gen("coins", 1, Address::from(&admin))],
            [SignatureCredential::derive(&admin)],
        )
        .unwrap();

        let err = submitter.submit(&tx).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::IncompleteCredentials { missing: 1, required: 1 })
        ));
        assert_eq!(ledger.submission_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_is_not_retried() {
        let (ledger, submitter) = submitter(0);
        ledger.set_online(false);
        let err = submitter.submit(&signed_tx()).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert!(err.is_retryable());

        ledger.set_online(true);
        let id = submitter.submit(&signed_tx()).await.unwrap();
        assert_eq!(ledger.submission_count().await, 1);
        assert_eq!(id, signed_tx().id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires_into_timed_out() {
        let stuck = Arc::new(Stuck::default());
        let submitter = Submitter::new(
            Arc::clone(&stuck),
            ConfirmConfig {
                poll_interval: Duration::from_millis(100),
                default_timeout: Duration::from_secs(1),
            },
        );

        let err = submitter.wait(TransactionId::ZERO).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::TimedOut { waited, .. } if waited == Duration::from_secs(1)
        ));
        assert!(stuck.polls.load(Ordering::SeqCst) >= 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_future_stops_polling() {
        let stuck = Arc::new(Stuck::default());
        let submitter = Submitter::new(Arc::clone(&stuck), ConfirmConfig::default());

        let (cancel_tx, cancel_rx) = tokio::sync::oneshot::channel::<()>();
        let wait = Wait::until(async move {
            let _ = cancel_rx.await;
        });
        let task = tokio::spawn(async move {
            submitter.wait_for_result(TransactionId::ZERO, wait).await
        });

        tokio::time::sleep(Duration::from_secs(2)).await;
        let _ = cancel_tx.send(());
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::Cancelled { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_and_confirm_maps_rejection() {
        let (ledger, submitter) = submitter(1);
        let tx = signed_tx();
        ledger.script_rejection(tx.id(), RejectCode::TableNotFound).await;

        let err = submitter
            .submit_and_confirm(&tx, Wait::Deadline(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Rejected { code: RejectCode::TableNotFound, id } if id == tx.id()
        ));
        assert!(!err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_id_mismatch_detected() {
        let submitter = Submitter::new(Arc::new(Liar), ConfirmConfig::default());
        let err = submitter.submit(&signed_tx()).await.unwrap_err();
        assert!(matches!(err, ClientError::IdMismatch { got, .. } if got == TransactionId::ZERO));
    }
}
