//! Private transaction state machine.
//!
//! ```text
//! Unsigned -> EvidenceRequested -> EvidenceAttached -> Signed -> Submitted -> Terminal
//!                    |                  |
//!                    +------------------+--> Aborted (an owner declines)
//! ```
//!
//! Each step is an explicit call; calling one out of order fails with
//! [`PrivateError::InvalidState`] and leaves the flow unchanged. Owners are
//! told how the flow ended: an abort releases their attestations, a terminal
//! ledger result settles them.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use ledgertx_client::{LedgerEndpoint, Submitter, TransactionResult, Wait};
use ledgertx_core::{
    Digest, Evidence, PrivateKey, SignatureCredential, Transaction, TransactionBuilder,
    TransactionId,
};

use crate::attestation::Attestation;
use crate::error::{PrivateError, Result};
use crate::owner::PrivateDataOwner;
use crate::payload::{PrivatePayload, PrivateTransaction};

/// Where a [`PrivateFlow`] currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Unsigned,
    EvidenceRequested,
    EvidenceAttached,
    Signed,
    Submitted,
    Terminal,
    /// An owner declined or could not be reached. The flow is finished.
    Aborted,
}

/// Coordinates one private transaction from evidence collection to result.
pub struct PrivateFlow {
    state: FlowState,
    transaction: Transaction,
    request: PrivateTransaction,
    owners: Vec<Arc<dyn PrivateDataOwner>>,
    verify_attestations: bool,
    result: Option<TransactionResult>,
}

impl std::fmt::Debug for PrivateFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateFlow")
            .field("state", &self.state)
            .field("id", &self.transaction.id())
            .field("owners", &self.owners.len())
            .field("result", &self.result)
            .finish()
    }
}

impl PrivateFlow {
    /// Start a flow for an unsigned transaction and its private payloads.
    pub fn new(transaction: Transaction, payloads: &[PrivatePayload]) -> Result<Self> {
        if transaction.is_signed() || !transaction.evidence().is_empty() {
            return Err(PrivateError::InvalidArgument(
                "a private flow starts from an unsigned transaction without evidence".into(),
            ));
        }
        if transaction.required_evidence().is_empty() {
            return Err(PrivateError::InvalidArgument(
                "transaction designates no private-data owners".into(),
            ));
        }
        let request = PrivateTransaction::new(&transaction, payloads)?;
        Ok(Self {
            state: FlowState::Unsigned,
            transaction,
            request,
            owners: Vec::new(),
            verify_attestations: true,
            result: None,
        })
    }

    /// Whether returned evidence is decoded and checked before attaching.
    pub fn verify_attestations(mut self, verify: bool) -> Self {
        self.verify_attestations = verify;
        self
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn id(&self) -> TransactionId {
        self.transaction.id()
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// The terminal ledger result, once observed.
    pub fn result(&self) -> Option<TransactionResult> {
        self.result
    }

    fn expect(&self, expected: FlowState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PrivateError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    /// Ask every designated owner for evidence, concurrently.
    ///
    /// `owners` must be exactly the transaction's designated owners. The first
    /// rejection aborts the flow; outstanding requests are cancelled.
    pub async fn request_evidence(&mut self, owners: &[Arc<dyn PrivateDataOwner>]) -> Result<()> {
        self.expect(FlowState::Unsigned)?;

        let designated = self.transaction.required_evidence();
        let provided: BTreeSet<SignatureCredential> = owners.iter().map(|o| o.credential()).collect();
        if let Some(unknown) = provided.difference(&designated).next() {
            return Err(PrivateError::UnknownOwner(*unknown));
        }
        if let Some(missing) = designated.difference(&provided).next() {
            return Err(PrivateError::MissingOwner(*missing));
        }

        self.state = FlowState::EvidenceRequested;
        let id = self.transaction.id();
        let payload_digest = self.request.payload_digest();

        let mut requests = JoinSet::new();
        for owner in owners {
            let owner = Arc::clone(owner);
            let request = self.request.clone();
            debug!(%id, owner = %owner.credential(), "requesting evidence");
            requests.spawn(async move {
                let credential = owner.credential();
                (credential, owner.request_evidence(&request).await)
            });
        }

        let mut collected = Vec::with_capacity(owners.len());
        while let Some(joined) = requests.join_next().await {
            let outcome = match joined {
                Ok((credential, Ok(evidence))) => self
                    .check_evidence(credential, &evidence, payload_digest)
                    .map(|()| evidence),
                Ok((_, Err(e))) => Err(e),
                Err(e) => Err(PrivateError::Transport(format!("evidence request failed: {e}"))),
            };
            match outcome {
                Ok(evidence) => collected.push(evidence),
                Err(e) => {
                    requests.abort_all();
                    while requests.join_next().await.is_some() {}
                    warn!(%id, error = %e, "private flow aborted");
                    self.state = FlowState::Aborted;
                    settle_owners(owners, id, false).await;
                    return Err(e);
                }
            }
        }

        let mut tx = self.transaction.clone();
        for evidence in collected {
            tx = tx.add_evidence(evidence)?;
        }
        self.transaction = tx;
        self.owners = owners.to_vec();
        self.state = FlowState::EvidenceAttached;
        info!(%id, owners = self.owners.len(), "evidence attached");
        Ok(())
    }

    fn check_evidence(
        &self,
        credential: SignatureCredential,
        evidence: &Evidence,
        payload_digest: Digest,
    ) -> Result<()> {
        if evidence.issuer != credential {
            return Err(PrivateError::InvalidAttestation(credential));
        }
        if self.verify_attestations {
            Attestation::from_evidence(evidence)?.verify(&self.transaction.id(), &payload_digest)?;
        }
        Ok(())
    }

    /// Sign with the caller's keys, then collect countersignatures from the
    /// owners that are required credentials and did not sign locally.
    ///
    /// Local signing errors and owner transport failures leave the flow in
    /// `EvidenceAttached` so the call can be repeated. Any other owner
    /// failure aborts the flow.
    pub async fn sign<'a>(&mut self, keys: impl IntoIterator<Item = &'a PrivateKey>) -> Result<()> {
        self.expect(FlowState::EvidenceAttached)?;

        let builder = TransactionBuilder::from_transaction(self.transaction.clone()).sign_all(keys)?;
        let signed = match self.countersigned(builder).await {
            Ok(tx) => tx,
            Err(e @ PrivateError::Transport(_)) => {
                warn!(id = %self.id(), error = %e, "countersigning interrupted");
                return Err(e);
            }
            Err(e) => {
                warn!(id = %self.id(), error = %e, "private flow aborted");
                self.state = FlowState::Aborted;
                settle_owners(&self.owners, self.id(), false).await;
                return Err(e);
            }
        };

        self.transaction = signed;
        self.state = FlowState::Signed;
        Ok(())
    }

    async fn countersigned(&self, mut builder: TransactionBuilder) -> Result<Transaction> {
        let signed_locally = builder.clone().build();

        for owner in &self.owners {
            let credential = owner.credential();
            if !signed_locally.required_credentials().contains(&credential)
                || signed_locally.signatures().contains_key(&credential)
            {
                continue;
            }
            let signature = owner.countersign(&signed_locally).await?;
            builder = builder.attach_signature(credential, signature)?;
            debug!(id = %self.id(), owner = %credential, "countersignature attached");
        }
        Ok(builder.build())
    }

    /// Submit the signed transaction.
    pub async fn submit<E: LedgerEndpoint + ?Sized>(
        &mut self,
        submitter: &Submitter<E>,
    ) -> Result<TransactionId> {
        self.expect(FlowState::Signed)?;
        let id = submitter.submit(&self.transaction).await?;
        self.state = FlowState::Submitted;
        Ok(id)
    }

    /// Wait for the terminal result.
    pub async fn wait<E: LedgerEndpoint + ?Sized>(
        &mut self,
        submitter: &Submitter<E>,
        wait: Wait,
    ) -> Result<TransactionResult> {
        self.expect(FlowState::Submitted)?;
        let result = submitter.wait_for_result(self.id(), wait).await?;
        self.result = Some(result);
        self.state = FlowState::Terminal;
        settle_owners(&self.owners, self.id(), result.is_committed()).await;
        Ok(result)
    }

    /// Run every step in order.
    pub async fn run<'a, E: LedgerEndpoint + ?Sized>(
        &mut self,
        owners: &[Arc<dyn PrivateDataOwner>],
        keys: impl IntoIterator<Item = &'a PrivateKey>,
        submitter: &Submitter<E>,
        wait: Wait,
    ) -> Result<TransactionResult> {
        self.request_evidence(owners).await?;
        self.sign(keys).await?;
        self.submit(submitter).await?;
        self.wait(submitter, wait).await
    }
}

/// Tell every owner how a transaction ended. Failures are logged; the
/// outcome on the ledger does not depend on them.
async fn settle_owners(owners: &[Arc<dyn PrivateDataOwner>], id: TransactionId, committed: bool) {
    for owner in owners {
        if let Err(e) = owner.settle(id, committed).await {
            warn!(%id, owner = %owner.credential(), error = %e, "owner could not settle");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::MemoryOwner;
    use async_trait::async_trait;
    use ledgertx_client::{ConfirmConfig, MemoryLedger, MemoryLedgerConfig, RejectCode};
    use ledgertx_core::{Address, KeyPair, Signature};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn admin() -> KeyPair {
        KeyPair::from_seed(&[0x01; 32])
    }

    fn pdo(n: u8) -> KeyPair {
        KeyPair::from_seed(&[0x30 + n; 32])
    }

    /// A table-creation flow designating the given PDO members.
    fn create_table_flow(members: &[KeyPair], payload_name: &str) -> PrivateFlow {
        let committed = PrivatePayload::create_table("secrets");
        let op = committed.commitment_operation(
            vec![Address::from(&admin())],
            members.iter().map(Address::from).collect(),
        );
        let required = members
            .iter()
            .map(SignatureCredential::derive)
            .chain([SignatureCredential::derive(&admin())]);
        let tx = Transaction::create(vec![op], required).unwrap();
        PrivateFlow::new(tx, &[PrivatePayload::create_table(payload_name)]).unwrap()
    }

    fn owners(members: &[KeyPair]) -> Vec<Arc<dyn PrivateDataOwner>> {
        members
            .iter()
            .map(|k| Arc::new(MemoryOwner::new(k)) as Arc<dyn PrivateDataOwner>)
            .collect()
    }

    /// Owner that counts calls and always declines.
    struct Declining {
        credential: SignatureCredential,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PrivateDataOwner for Declining {
        fn credential(&self) -> SignatureCredential {
            self.credential
        }

        async fn request_evidence(&self, _request: &PrivateTransaction) -> Result<Evidence> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PrivateError::EvidenceRejected {
                owner: self.credential,
                reason: "declined".into(),
            })
        }

        async fn countersign(&self, _tx: &Transaction) -> Result<Signature> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PrivateError::Transport("unreachable".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_flow_commits() {
        let members = [pdo(1), pdo(2)];
        let mut flow = create_table_flow(&members, "secrets");
        let ledger = Arc::new(MemoryLedger::new(MemoryLedgerConfig {
            pending_polls: 1,
            ..Default::default()
        }));
        let submitter = Submitter::new(ledger, ConfirmConfig::default());

        let result = flow
            .run(
                &owners(&members),
                [admin().private_key()],
                &submitter,
                Wait::Deadline(Duration::from_secs(5)),
            )
            .await
            .unwrap();
        assert_eq!(result, TransactionResult::Committed);
        assert_eq!(flow.state(), FlowState::Terminal);
        assert_eq!(flow.transaction().evidence().len(), 2);
        assert_eq!(flow.transaction().signatures().len(), 3);
    }

    #[tokio::test]
    async fn test_mismatched_payload_aborts_before_signing() {
        let members = [pdo(1)];
        let mut flow = create_table_flow(&members, "not-secrets");

        let err = flow.request_evidence(&owners(&members)).await.unwrap_err();
        assert!(matches!(err, PrivateError::EvidenceRejected { .. }));
        assert_eq!(flow.state(), FlowState::Aborted);
        assert!(!flow.transaction().is_signed());

        let err = flow.sign([admin().private_key()]).await.unwrap_err();
        assert!(matches!(
            err,
            PrivateError::InvalidState {
                expected: FlowState::EvidenceAttached,
                actual: FlowState::Aborted
            }
        ));
    }

    #[tokio::test]
    async fn test_any_single_rejection_aborts() {
        let members = [pdo(1), pdo(2)];
        let mut flow = create_table_flow(&members, "secrets");
        let declining = Arc::new(Declining {
            credential: SignatureCredential::derive(&members[1]),
            calls: AtomicUsize::new(0),
        });
        let accepting = Arc::new(MemoryOwner::new(&members[0]));
        let owners: Vec<Arc<dyn PrivateDataOwner>> = vec![
            accepting.clone() as Arc<dyn PrivateDataOwner>,
            declining.clone() as Arc<dyn PrivateDataOwner>,
        ];

        let err = flow.request_evidence(&owners).await.unwrap_err();
        assert!(matches!(err, PrivateError::EvidenceRejected { .. }));
        assert_eq!(flow.state(), FlowState::Aborted);
        assert!(flow.transaction().evidence().is_empty());
        assert_eq!(declining.calls.load(Ordering::SeqCst), 1);
        // Whatever the accepting owner attested was released.
        assert_eq!(accepting.pending_attestations().await, 0);
    }

    /// Owner whose first countersignature fails, then behaves.
    struct Interrupted {
        inner: MemoryOwner,
        transient: bool,
        failures: AtomicUsize,
    }

    impl Interrupted {
        fn new(key: &KeyPair, transient: bool) -> Self {
            Self {
                inner: MemoryOwner::new(key),
                transient,
                failures: AtomicUsize::new(1),
            }
        }
    }

    #[async_trait]
    impl PrivateDataOwner for Interrupted {
        fn credential(&self) -> SignatureCredential {
            self.inner.credential()
        }

        async fn request_evidence(&self, request: &PrivateTransaction) -> Result<Evidence> {
            self.inner.request_evidence(request).await
        }

        async fn countersign(&self, tx: &Transaction) -> Result<Signature> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(if self.transient {
                    PrivateError::Transport("connection reset".into())
                } else {
                    PrivateError::EvidenceRejected {
                        owner: self.credential(),
                        reason: "changed its mind".into(),
                    }
                });
            }
            self.inner.countersign(tx).await
        }

        async fn settle(&self, id: TransactionId, committed: bool) -> Result<()> {
            self.inner.settle(id, committed).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupted_countersign_can_be_retried() {
        let members = [pdo(1), pdo(2)];
        let mut flow = create_table_flow(&members, "secrets");
        let first = Arc::new(MemoryOwner::new(&members[0]));
        let second = Arc::new(Interrupted::new(&members[1], true));
        let owners: Vec<Arc<dyn PrivateDataOwner>> = vec![
            first.clone() as Arc<dyn PrivateDataOwner>,
            second.clone() as Arc<dyn PrivateDataOwner>,
        ];
        flow.request_evidence(&owners).await.unwrap();

        let err = flow.sign([admin().private_key()]).await.unwrap_err();
        assert!(matches!(err, PrivateError::Transport(_)));
        assert_eq!(flow.state(), FlowState::EvidenceAttached);
        assert!(!flow.transaction().is_signed());
        assert!(!first.has_table("secrets").await);

        flow.sign([admin().private_key()]).await.unwrap();
        assert_eq!(flow.state(), FlowState::Signed);
        assert!(!first.has_table("secrets").await);

        let ledger = Arc::new(MemoryLedger::default());
        let submitter = Submitter::new(ledger, ConfirmConfig::default());
        flow.submit(&submitter).await.unwrap();
        let result = flow
            .wait(&submitter, Wait::Deadline(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(result, TransactionResult::Committed);
        assert!(first.has_table("secrets").await);
        assert!(second.inner.has_table("secrets").await);
    }

    #[tokio::test]
    async fn test_wrong_local_key_keeps_flow_open() {
        let members = [pdo(1)];
        let mut flow = create_table_flow(&members, "secrets");
        flow.request_evidence(&owners(&members)).await.unwrap();

        let stranger = KeyPair::from_seed(&[0x77; 32]);
        let err = flow.sign([stranger.private_key()]).await.unwrap_err();
        assert!(matches!(err, PrivateError::Build(_)));
        assert_eq!(flow.state(), FlowState::EvidenceAttached);

        flow.sign([admin().private_key()]).await.unwrap();
        assert_eq!(flow.state(), FlowState::Signed);
    }

    #[tokio::test]
    async fn test_refused_countersign_aborts_and_releases() {
        let members = [pdo(1), pdo(2)];
        let mut flow = create_table_flow(&members, "secrets");
        let first = Arc::new(MemoryOwner::new(&members[0]));
        let second = Arc::new(Interrupted::new(&members[1], false));
        let owners: Vec<Arc<dyn PrivateDataOwner>> = vec![
            first.clone() as Arc<dyn PrivateDataOwner>,
            second.clone() as Arc<dyn PrivateDataOwner>,
        ];
        flow.request_evidence(&owners).await.unwrap();

        let err = flow.sign([admin().private_key()]).await.unwrap_err();
        assert!(matches!(err, PrivateError::EvidenceRejected { .. }));
        assert_eq!(flow.state(), FlowState::Aborted);
        assert_eq!(first.pending_attestations().await, 0);
        assert_eq!(second.inner.pending_attestations().await, 0);
        assert!(!first.has_table("secrets").await);

        assert!(matches!(
            flow.sign([admin().private_key()]).await,
            Err(PrivateError::InvalidState {
                actual: FlowState::Aborted,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_transaction_releases_attestations() {
        let members = [pdo(1)];
        let mut flow = create_table_flow(&members, "secrets");
        let owner = Arc::new(MemoryOwner::new(&members[0]));
        let ledger = Arc::new(MemoryLedger::default());
        let submitter = Submitter::new(Arc::clone(&ledger), ConfirmConfig::default());

        flow.request_evidence(&[owner.clone() as Arc<dyn PrivateDataOwner>])
            .await
            .unwrap();
        flow.sign([admin().private_key()]).await.unwrap();
        ledger
            .script_rejection(flow.id(), RejectCode::PermissionDenied)
            .await;
        flow.submit(&submitter).await.unwrap();

        let result = flow
            .wait(&submitter, Wait::Deadline(Duration::from_secs(5)))
            .await
            .unwrap();
        assert!(matches!(result, TransactionResult::Rejected(_)));
        assert_eq!(owner.pending_attestations().await, 0);
        assert!(!owner.has_table("secrets").await);
    }

    #[tokio::test]
    async fn test_owner_coverage_checked() {
        let members = [pdo(1), pdo(2)];
        let mut flow = create_table_flow(&members, "secrets");

        let err = flow.request_evidence(&owners(&members[..1])).await.unwrap_err();
        assert!(matches!(err, PrivateError::MissingOwner(c) if c == SignatureCredential::derive(&members[1])));
        assert_eq!(flow.state(), FlowState::Unsigned);

        let mut with_stranger = owners(&members);
        with_stranger.push(Arc::new(MemoryOwner::new(&pdo(9))));
        let err = flow.request_evidence(&with_stranger).await.unwrap_err();
        assert!(matches!(err, PrivateError::UnknownOwner(_)));
    }

    #[tokio::test]
    async fn test_out_of_order_calls_rejected() {
        let members = [pdo(1)];
        let mut flow = create_table_flow(&members, "secrets");
        let submitter = Submitter::new(Arc::new(MemoryLedger::default()), ConfirmConfig::default());

        assert!(matches!(
            flow.submit(&submitter).await,
            Err(PrivateError::InvalidState { expected: FlowState::Signed, .. })
        ));
        assert!(matches!(
            flow.sign([admin().private_key()]).await,
            Err(PrivateError::InvalidState { .. })
        ));
        assert_eq!(flow.state(), FlowState::Unsigned);
    }

    #[test]
    fn test_flow_requires_unsigned_private_transaction() {
        let a = admin();
        let public = Transaction::simple_signed(
            ledgertx_core::Operation::asset_gen("coins", 1, Address::from(&a)),
            a.private_key(),
        )
        .unwrap();
        assert!(matches!(
            PrivateFlow::new(public, &[]),
            Err(PrivateError::InvalidArgument(_))
        ));
    }
}
