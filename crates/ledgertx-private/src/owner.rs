//! Private-data owners.
//!
//! An owner is a ledger member designated to hold the raw data of private
//! tables. It inspects each private transaction before anyone signs it and
//! either attests to it (evidence) or declines.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use ledgertx_core::{
    commitment, Digest, Evidence, KeyPair, PrivateKey, Signature, SignatureCredential,
    Transaction, TransactionId,
};

use crate::attestation::Attestation;
use crate::error::{PrivateError, Result};
use crate::payload::{check_payloads, PrivatePayload, PrivateTransaction};

/// A designated private-data owner, as seen by the coordinator.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait PrivateDataOwner: Send + Sync {
    /// The credential this owner attests and signs with.
    fn credential(&self) -> SignatureCredential;

    /// Validate the payloads against the transaction's commitments and
    /// return evidence, or fail with [`PrivateError::EvidenceRejected`].
    async fn request_evidence(&self, request: &PrivateTransaction) -> Result<Evidence>;

    /// Sign a transaction this owner has already attested, once all evidence
    /// is attached. Must not change what the owner holds, so a failed signing
    /// round can be repeated.
    async fn countersign(&self, tx: &Transaction) -> Result<Signature>;

    /// Learn how an attested transaction ended. Payloads of a committed
    /// transaction become visible; otherwise the attestation is released.
    async fn settle(&self, _id: TransactionId, _committed: bool) -> Result<()> {
        Ok(())
    }
}

/// Private state of an in-memory owner.
#[derive(Debug, Default)]
struct OwnerState {
    /// Payloads accepted per attested transaction, awaiting the ledger result.
    attested: HashMap<TransactionId, Vec<PrivatePayload>>,
    tables: HashSet<String>,
    rows: HashMap<(String, Bytes), Bytes>,
}

/// An in-memory private-data owner for testing.
///
/// Accepted rows become visible once the attested transaction is settled as
/// committed.
pub struct MemoryOwner {
    key: PrivateKey,
    credential: SignatureCredential,
    state: RwLock<OwnerState>,
}

impl MemoryOwner {
    pub fn new(keypair: &KeyPair) -> Self {
        Self {
            key: keypair.private_key().clone(),
            credential: SignatureCredential::derive(keypair),
            state: RwLock::new(OwnerState::default()),
        }
    }

    pub async fn has_table(&self, table_name: &str) -> bool {
        self.state.read().await.tables.contains(table_name)
    }

    /// Raw value of a private row.
    pub async fn get(&self, table_name: &str, key: &[u8]) -> Option<Bytes> {
        let state = self.state.read().await;
        state
            .rows
            .get(&(table_name.to_owned(), Bytes::copy_from_slice(key)))
            .cloned()
    }

    /// Transactions attested but not yet settled.
    pub async fn pending_attestations(&self) -> usize {
        self.state.read().await.attested.len()
    }

    /// The public commitment of a private row's value.
    pub async fn get_hashed(&self, table_name: &str, key: &[u8]) -> Option<Digest> {
        self.get(table_name, key).await.map(|v| commitment(&v))
    }

    fn reject(&self, reason: impl Into<String>) -> PrivateError {
        let reason = reason.into();
        warn!(owner = %self.credential, %reason, "declining private transaction");
        PrivateError::EvidenceRejected {
            owner: self.credential,
            reason,
        }
    }

    /// Tables referenced by add-data payloads must exist, or be created earlier
    /// in the same transaction.
    fn check_tables(&self, state: &OwnerState, payloads: &[PrivatePayload]) -> Result<()> {
        let mut created: HashSet<&str> = HashSet::new();
        for payload in payloads {
            match payload {
                PrivatePayload::CreatePrivateDataTable { table_name } => {
                    if state.tables.contains(table_name) || !created.insert(table_name) {
                        return Err(self.reject(format!("table {table_name} already exists")));
                    }
                }
                PrivatePayload::AddPrivateData { table_name, .. } => {
                    if !state.tables.contains(table_name) && !created.contains(table_name.as_str()) {
                        return Err(self.reject(format!("unknown table {table_name}")));
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PrivateDataOwner for MemoryOwner {
    fn credential(&self) -> SignatureCredential {
        self.credential
    }

    async fn request_evidence(&self, request: &PrivateTransaction) -> Result<Evidence> {
        let (tx, payloads) = request
            .decode()
            .map_err(|e| self.reject(format!("undecodable request: {e}")))?;
        debug!(owner = %self.credential, id = %tx.id(), payloads = payloads.len(), "evidence requested");

        if tx.is_signed() {
            return Err(self.reject("transaction is already signed"));
        }
        if !tx.required_evidence().contains(&self.credential) {
            return Err(self.reject("not a designated owner of this transaction"));
        }
        check_payloads(&tx, &payloads).map_err(|reason| self.reject(reason))?;

        let mut state = self.state.write().await;
        self.check_tables(&state, &payloads)?;
        state.attested.insert(tx.id(), payloads);
        drop(state);

        let attestation = Attestation::sign(&self.key, tx.id(), request.payload_digest());
        info!(owner = %self.credential, id = %tx.id(), "evidence issued");
        attestation.to_evidence()
    }

    async fn countersign(&self, tx: &Transaction) -> Result<Signature> {
        if !self.state.read().await.attested.contains_key(&tx.id()) {
            return Err(self.reject("transaction was never attested"));
        }

        let attested = tx
            .evidence()
            .get(&self.credential)
            .map(|blob| Evidence::new(self.credential, blob.clone()))
            .and_then(|evidence| Attestation::from_evidence(&evidence).ok())
            .is_some_and(|a| a.transaction_id == tx.id());
        if !attested {
            return Err(self.reject("own evidence missing from transaction"));
        }

        debug!(owner = %self.credential, id = %tx.id(), "countersigned");
        Ok(self.key.sign(&tx.signing_message()))
    }

    async fn settle(&self, id: TransactionId, committed: bool) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(payloads) = state.attested.remove(&id) else {
            return Ok(());
        };
        if !committed {
            debug!(owner = %self.credential, %id, "attestation released");
            return Ok(());
        }

        for payload in payloads {
            match payload {
                PrivatePayload::CreatePrivateDataTable { table_name } => {
                    state.tables.insert(table_name);
                }
                PrivatePayload::AddPrivateData {
                    table_name,
                    key,
                    value,
                } => {
                    state.rows.insert((table_name, key), value);
                }
            }
        }
        info!(owner = %self.credential, %id, "private rows applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgertx_core::Address;

    fn admin() -> KeyPair {
        KeyPair::from_seed(&[0x01; 32])
    }

    fn pdo() -> KeyPair {
        KeyPair::from_seed(&[0x30; 32])
    }

    fn private_tx(payload: &PrivatePayload) -> Transaction {
        let op = payload.commitment_operation(vec![Address::from(&admin())], vec![Address::from(&pdo())]);
        Transaction::create(
            vec![op],
            [SignatureCredential::derive(&admin()), SignatureCredential::derive(&pdo())],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_owner_attests_matching_payload() {
        let owner = MemoryOwner::new(&pdo());
        let payload = PrivatePayload::create_table("secrets");
        let tx = private_tx(&payload);
        let request = PrivateTransaction::new(&tx, &[payload]).unwrap();

        let evidence = owner.request_evidence(&request).await.unwrap();
        let attestation = Attestation::from_evidence(&evidence).unwrap();
        assert!(attestation.verify(&tx.id(), &request.payload_digest()).is_ok());
    }

    #[tokio::test]
    async fn test_owner_rejects_mismatched_commitment() {
        let owner = MemoryOwner::new(&pdo());
        let tx = private_tx(&PrivatePayload::create_table("secrets"));
        let request = PrivateTransaction::new(&tx, &[PrivatePayload::create_table("other")]).unwrap();

        let err = owner.request_evidence(&request).await.unwrap_err();
        assert!(matches!(err, PrivateError::EvidenceRejected { .. }));
    }

    #[tokio::test]
    async fn test_owner_rejects_undesignated_request() {
        let stranger = MemoryOwner::new(&KeyPair::from_seed(&[0x77; 32]));
        let payload = PrivatePayload::create_table("secrets");
        let tx = private_tx(&payload);
        let request = PrivateTransaction::new(&tx, &[payload]).unwrap();
        assert!(stranger.request_evidence(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_owner_rejects_rows_for_unknown_table() {
        let owner = MemoryOwner::new(&pdo());
        let payload = PrivatePayload::add_data("missing", &b"k"[..], &b"v"[..]);
        let tx = private_tx(&payload);
        let request = PrivateTransaction::new(&tx, &[payload]).unwrap();
        assert!(matches!(
            owner.request_evidence(&request).await,
            Err(PrivateError::EvidenceRejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_rows_applied_only_after_commit() {
        let owner = MemoryOwner::new(&pdo());

        let create = PrivatePayload::create_table("secrets");
        let row = PrivatePayload::add_data("secrets", &b"key"[..], &b"value"[..]);
        let ops = vec![
            create.commitment_operation(vec![], vec![Address::from(&pdo())]),
            row.commitment_operation(vec![], vec![Address::from(&pdo())]),
        ];
        let tx = Transaction::create(ops, [SignatureCredential::derive(&pdo())]).unwrap();
        let request = PrivateTransaction::new(&tx, &[create, row]).unwrap();

        let evidence = owner.request_evidence(&request).await.unwrap();
        assert!(owner.get("secrets", b"key").await.is_none());

        let with_evidence = tx.add_evidence(evidence).unwrap();
        let signature = owner.countersign(&with_evidence).await.unwrap();
        let signed = with_evidence
            .attach_signature(owner.credential(), signature)
            .unwrap();
        assert!(ledgertx_core::check_ready(&signed).is_ok());
        assert!(!owner.has_table("secrets").await);

        // Countersigning again is harmless.
        assert!(owner.countersign(&with_evidence).await.is_ok());

        owner.settle(tx.id(), true).await.unwrap();
        assert_eq!(owner.pending_attestations().await, 0);
        assert!(owner.has_table("secrets").await);
        assert_eq!(
            owner.get("secrets", b"key").await,
            Some(Bytes::from_static(b"value"))
        );
        assert_eq!(
            owner.get_hashed("secrets", b"key").await,
            Some(commitment(b"value"))
        );
    }

    #[tokio::test]
    async fn test_countersign_requires_own_evidence() {
        let owner = MemoryOwner::new(&pdo());
        let payload = PrivatePayload::create_table("secrets");
        let tx = private_tx(&payload);
        let request = PrivateTransaction::new(&tx, &[payload]).unwrap();
        owner.request_evidence(&request).await.unwrap();

        let forged = tx
            .add_evidence(Evidence::new(owner.credential(), &b"forged"[..]))
            .unwrap();
        assert!(owner.countersign(&forged).await.is_err());
        assert!(!owner.has_table("secrets").await);
    }

    #[tokio::test]
    async fn test_settle_without_commit_releases_attestation() {
        let owner = MemoryOwner::new(&pdo());
        let payload = PrivatePayload::create_table("secrets");
        let tx = private_tx(&payload);
        let request = PrivateTransaction::new(&tx, &[payload]).unwrap();
        let evidence = owner.request_evidence(&request).await.unwrap();
        assert_eq!(owner.pending_attestations().await, 1);

        owner.settle(tx.id(), false).await.unwrap();
        assert_eq!(owner.pending_attestations().await, 0);
        assert!(!owner.has_table("secrets").await);

        let with_evidence = tx.add_evidence(evidence).unwrap();
        assert!(matches!(
            owner.countersign(&with_evidence).await,
            Err(PrivateError::EvidenceRejected { .. })
        ));
    }
}
