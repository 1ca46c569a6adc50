//! The LedgerClient: unified API for building, submitting and confirming
//! transactions.
//!
//! The client brings together the transaction builder, the submission
//! pipeline and the private-data coordinator. Key material is always passed
//! in by the caller at call time.

use std::sync::Arc;

use tracing::{info, warn};

use ledgertx_client::{
    ClientError, ConfirmConfig, LedgerEndpoint, Submitter, TransactionResult, Wait,
};
use ledgertx_core::{
    Operation, PrivateKey, SignatureCredential, Transaction, TransactionBuilder, TransactionId,
};
use ledgertx_private::{PrivateDataOwner, PrivateFlow, PrivatePayload};

use crate::error::Result;

/// Configuration for the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Polling configuration.
    pub confirm: ConfirmConfig,
    /// Whether owner attestations are verified before evidence is attached.
    pub verify_attestations: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            confirm: ConfirmConfig::default(),
            verify_attestations: true,
        }
    }
}

/// The main client struct.
///
/// Provides a unified API for:
/// - Submitting signed transactions
/// - Waiting for their results
/// - Building, signing and confirming in one call
/// - Running private-data flows
pub struct LedgerClient<E: LedgerEndpoint + ?Sized> {
    submitter: Submitter<E>,
    config: ClientConfig,
}

impl<E: LedgerEndpoint + ?Sized> Clone for LedgerClient<E> {
    fn clone(&self) -> Self {
        Self {
            submitter: self.submitter.clone(),
            config: self.config.clone(),
        }
    }
}

impl<E: LedgerEndpoint + ?Sized> LedgerClient<E> {
    pub fn new(endpoint: Arc<E>, config: ClientConfig) -> Self {
        Self {
            submitter: Submitter::new(endpoint, config.confirm.clone()),
            config,
        }
    }

    pub fn endpoint(&self) -> &Arc<E> {
        self.submitter.endpoint()
    }

    pub fn submitter(&self) -> &Submitter<E> {
        &self.submitter
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Submission
    // ─────────────────────────────────────────────────────────────────────────

    /// Submit a ready transaction. Fails locally if it is incomplete.
    pub async fn send(&self, tx: &Transaction) -> Result<TransactionId> {
        Ok(self.submitter.submit(tx).await?)
    }

    /// Wait for the terminal result of a submitted transaction.
    pub async fn wait(&self, id: TransactionId, wait: Wait) -> Result<TransactionResult> {
        Ok(self.submitter.wait_for_result(id, wait).await?)
    }

    /// Submit, then wait for the terminal result.
    ///
    /// A ledger rejection is a result here, not an error.
    pub async fn send_and_wait(&self, tx: &Transaction, wait: Wait) -> Result<TransactionResult> {
        let id = self.send(tx).await?;
        self.wait(id, wait).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // One-call flows
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a transaction requiring exactly the signers' credentials, sign
    /// it with every key, submit it and wait for it to commit.
    ///
    /// Waits at most the configured default timeout. A rejection is returned
    /// as [`ClientError::Rejected`].
    pub async fn execute(
        &self,
        operations: Vec<Operation>,
        signers: &[&PrivateKey],
    ) -> Result<TransactionId> {
        let required = signers.iter().map(|k| SignatureCredential::from_private(k));
        let tx = TransactionBuilder::new(operations, required)?
            .sign_all(signers.iter().copied())?
            .build();

        let wait = Wait::Deadline(self.config.confirm.default_timeout);
        let id = self.submitter.submit_and_confirm(&tx, wait).await?;
        info!(%id, signers = signers.len(), "transaction executed");
        Ok(id)
    }

    /// Run a private transaction through evidence collection, signing,
    /// submission and confirmation.
    ///
    /// `owners` must be exactly the designated private-data owners. Waits at
    /// most the configured default timeout; a rejection is returned as
    /// [`ClientError::Rejected`].
    pub async fn execute_private(
        &self,
        tx: Transaction,
        payloads: &[PrivatePayload],
        owners: &[Arc<dyn PrivateDataOwner>],
        keys: &[&PrivateKey],
    ) -> Result<TransactionId> {
        let mut flow =
            PrivateFlow::new(tx, payloads)?.verify_attestations(self.config.verify_attestations);
        let id = flow.id();

        let wait = Wait::Deadline(self.config.confirm.default_timeout);
        let result = match flow
            .run(owners, keys.iter().copied(), &self.submitter, wait)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(%id, state = ?flow.state(), error = %e, "private transaction failed");
                return Err(e.into());
            }
        };

        match result {
            TransactionResult::Committed => {
                info!(%id, owners = owners.len(), "private transaction executed");
                Ok(id)
            }
            TransactionResult::Rejected(code) => Err(ClientError::Rejected { id, code }.into()),
            // Unreachable: waiting only returns terminal results.
            TransactionResult::Pending => Err(ClientError::TimedOut {
                id,
                waited: self.config.confirm.default_timeout,
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use ledgertx_client::{MemoryLedger, RejectCode};
    use ledgertx_core::{Address, KeyPair};

    fn admin() -> KeyPair {
        KeyPair::from_seed(&[0x01; 32])
    }

    fn client(ledger: &Arc<MemoryLedger>) -> LedgerClient<MemoryLedger> {
        LedgerClient::new(Arc::clone(ledger), ClientConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_commits() {
        let ledger = Arc::new(MemoryLedger::default());
        let admin = admin();

        let id = client(&ledger)
            .execute(
                vec![Operation::asset_gen("coins", 100, Address::from(&admin))],
                &[admin.private_key()],
            )
            .await
            .unwrap();
        assert_eq!(ledger.committed().await, vec![id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_surfaces_rejection() {
        let ledger = Arc::new(MemoryLedger::default());
        let admin = admin();
        let op = Operation::asset_gen("coins", 100, Address::from(&admin));
        let expected = Transaction::simple_signed(op.clone(), admin.private_key())
            .unwrap()
            .id();
        ledger
            .script_rejection(expected, RejectCode::InsufficientBalance)
            .await;

        let err = client(&ledger)
            .execute(vec![op], &[admin.private_key()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Client(ClientError::Rejected { id, code: RejectCode::InsufficientBalance }) if id == expected
        ));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_execute_without_operations_fails_locally() {
        let ledger = Arc::new(MemoryLedger::default());
        let admin = admin();
        let err = client(&ledger)
            .execute(vec![], &[admin.private_key()])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Build(_)));
        assert_eq!(ledger.submission_count().await, 0);
    }

    #[tokio::test]
    async fn test_transport_errors_are_retryable() {
        let ledger = Arc::new(MemoryLedger::default());
        ledger.set_online(false);
        let admin = admin();
        let tx = Transaction::simple_signed(
            Operation::asset_gen("coins", 1, Address::from(&admin)),
            admin.private_key(),
        )
        .unwrap();

        let err = client(&ledger).send(&tx).await.unwrap_err();
        assert!(matches!(err, LedgerError::Client(ClientError::Transport(_))));
        assert!(err.is_retryable());
    }
}
