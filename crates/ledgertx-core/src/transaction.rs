//! Transaction: an ordered list of operations plus the credentials that must
//! sign it.
//!
//! A [`Transaction`] is a persistent value. Signing or attaching evidence
//! returns a new value and leaves the original untouched. The identifier is
//! computed once from the operations and required credentials and never
//! changes afterwards.

use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};

use crate::address::SignatureCredential;
use crate::canonical;
use crate::crypto::{Digest, PrivateKey, Signature};
use crate::error::{BuildError, CodecError};
use crate::operation::Operation;
use crate::types::TransactionId;

/// An opaque attestation blob issued by a private-data owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Evidence {
    pub issuer: SignatureCredential,
    pub blob: Bytes,
}

impl Evidence {
    pub fn new(issuer: SignatureCredential, blob: impl Into<Bytes>) -> Self {
        Self {
            issuer,
            blob: blob.into(),
        }
    }
}

/// A transaction under construction or ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    operations: Vec<Operation>,
    required: BTreeSet<SignatureCredential>,
    id: TransactionId,
    evidence: BTreeMap<SignatureCredential, Bytes>,
    signatures: BTreeMap<SignatureCredential, Signature>,
}

impl Transaction {
    /// Assemble an unsigned transaction.
    ///
    /// Fails with [`BuildError::InvalidArgument`] if `operations` is empty. An
    /// empty credential set is allowed.
    pub fn create(
        operations: Vec<Operation>,
        required: impl IntoIterator<Item = SignatureCredential>,
    ) -> Result<Self, BuildError> {
        if operations.is_empty() {
            return Err(BuildError::InvalidArgument(
                "a transaction needs at least one operation".into(),
            ));
        }
        let required: BTreeSet<_> = required.into_iter().collect();
        let id = canonical::compute_id(&operations, &required);
        Ok(Self {
            operations,
            required,
            id,
            evidence: BTreeMap::new(),
            signatures: BTreeMap::new(),
        })
    }

    /// One operation, signed by the only required credential.
    pub fn simple_signed(operation: Operation, key: &PrivateKey) -> Result<Self, BuildError> {
        Self::create(vec![operation], [SignatureCredential::from_private(key)])?.sign(key)
    }

    /// Rebuild a decoded transaction, recomputing its id.
    pub(crate) fn from_parts(
        operations: Vec<Operation>,
        required: BTreeSet<SignatureCredential>,
        evidence: BTreeMap<SignatureCredential, Bytes>,
        signatures: BTreeMap<SignatureCredential, Signature>,
    ) -> Result<Self, CodecError> {
        if operations.is_empty() {
            return Err(CodecError::Malformed("no operations".into()));
        }
        let id = canonical::compute_id(&operations, &required);
        Ok(Self {
            operations,
            required,
            id,
            evidence,
            signatures,
        })
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn required_credentials(&self) -> &BTreeSet<SignatureCredential> {
        &self.required
    }

    pub fn evidence(&self) -> &BTreeMap<SignatureCredential, Bytes> {
        &self.evidence
    }

    pub fn signatures(&self) -> &BTreeMap<SignatureCredential, Signature> {
        &self.signatures
    }

    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }

    /// Whether any operation touches private data.
    pub fn is_private(&self) -> bool {
        self.operations.iter().any(Operation::is_private)
    }

    /// Issuers whose evidence must be attached before submission.
    pub fn required_evidence(&self) -> BTreeSet<SignatureCredential> {
        self.operations
            .iter()
            .flat_map(Operation::pdo_credentials)
            .collect()
    }

    pub fn evidence_digest(&self) -> Digest {
        canonical::evidence_digest(&self.evidence)
    }

    /// The message every required credential signs.
    pub fn signing_message(&self) -> Vec<u8> {
        canonical::signing_message(&self.id, &self.evidence_digest())
    }

    /// Return a copy signed by `key`.
    pub fn sign(&self, key: &PrivateKey) -> Result<Self, BuildError> {
        let mut next = self.clone();
        next.insert_signature(key)?;
        Ok(next)
    }

    /// Return a copy carrying a signature produced elsewhere.
    ///
    /// The signature is verified against the current signing message.
    pub fn attach_signature(
        &self,
        credential: SignatureCredential,
        signature: Signature,
    ) -> Result<Self, BuildError> {
        let mut next = self.clone();
        next.insert_external_signature(credential, signature)?;
        Ok(next)
    }

    /// Return a copy with `evidence` attached. Only valid before signing.
    pub fn add_evidence(&self, evidence: Evidence) -> Result<Self, BuildError> {
        let mut next = self.clone();
        next.insert_evidence(evidence)?;
        Ok(next)
    }

    /// Combine two independently signed copies of the same transaction.
    pub fn merge(&self, other: &Transaction) -> Result<Self, BuildError> {
        if self.id != other.id {
            return Err(BuildError::TransactionMismatch {
                ours: self.id,
                theirs: other.id,
            });
        }
        if self.evidence != other.evidence {
            return Err(BuildError::InvalidArgument(
                "cannot merge copies carrying different evidence".into(),
            ));
        }

        let mut merged = self.clone();
        for (cred, sig) in &other.signatures {
            match merged.signatures.get(cred) {
                Some(existing) if existing != sig => {
                    return Err(BuildError::ConflictingSignature(*cred));
                }
                Some(_) => {}
                None => {
                    merged.signatures.insert(*cred, *sig);
                }
            }
        }
        Ok(merged)
    }

    /// Encode in canonical wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        canonical::encode_transaction(self)
    }

    /// Decode from canonical wire form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        canonical::decode_transaction(bytes)
    }

    fn insert_signature(&mut self, key: &PrivateKey) -> Result<(), BuildError> {
        let cred = SignatureCredential::from_private(key);
        if !self.required.contains(&cred) {
            return Err(BuildError::UnauthorizedCredential(cred));
        }
        if self.signatures.contains_key(&cred) {
            return Err(BuildError::DuplicateSignature(cred));
        }
        let signature = key.sign(&self.signing_message());
        self.signatures.insert(cred, signature);
        Ok(())
    }

    fn insert_external_signature(
        &mut self,
        cred: SignatureCredential,
        signature: Signature,
    ) -> Result<(), BuildError> {
        if !self.required.contains(&cred) {
            return Err(BuildError::UnauthorizedCredential(cred));
        }
        if self.signatures.contains_key(&cred) {
            return Err(BuildError::DuplicateSignature(cred));
        }
        cred.public_key()
            .verify(&self.signing_message(), &signature)
            .map_err(|_| BuildError::InvalidSignature(cred))?;
        self.signatures.insert(cred, signature);
        Ok(())
    }

    fn insert_evidence(&mut self, evidence: Evidence) -> Result<(), BuildError> {
        if self.is_signed() {
            return Err(BuildError::EvidenceAfterSignature);
        }
        if self.evidence.contains_key(&evidence.issuer) {
            return Err(BuildError::DuplicateEvidence(evidence.issuer));
        }
        self.evidence.insert(evidence.issuer, evidence.blob);
        Ok(())
    }
}

/// Accumulator for building a transaction step by step.
///
/// `build` does not check completeness; run the validator before submitting.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    tx: Transaction,
}

impl TransactionBuilder {
    /// Start from a fresh unsigned transaction.
    pub fn new(
        operations: Vec<Operation>,
        required: impl IntoIterator<Item = SignatureCredential>,
    ) -> Result<Self, BuildError> {
        Transaction::create(operations, required).map(Self::from_transaction)
    }

    /// Continue from an existing transaction value.
    pub fn from_transaction(tx: Transaction) -> Self {
        Self { tx }
    }

    pub fn id(&self) -> TransactionId {
        self.tx.id
    }

    /// Attach evidence.
    pub fn add_evidence(mut self, evidence: Evidence) -> Result<Self, BuildError> {
        self.tx.insert_evidence(evidence)?;
        Ok(self)
    }

    /// Sign with one key.
    pub fn sign(mut self, key: &PrivateKey) -> Result<Self, BuildError> {
        self.tx.insert_signature(key)?;
        Ok(self)
    }

    /// Sign with every key, stopping at the first failure.
    pub fn sign_all<'a>(
        mut self,
        keys: impl IntoIterator<Item = &'a PrivateKey>,
    ) -> Result<Self, BuildError> {
        for key in keys {
            self.tx.insert_signature(key)?;
        }
        Ok(self)
    }

    /// Attach a signature produced elsewhere.
    pub fn attach_signature(
        mut self,
        credential: SignatureCredential,
        signature: Signature,
    ) -> Result<Self, BuildError> {
        self.tx.insert_external_signature(credential, signature)?;
        Ok(self)
    }

    pub fn build(self) -> Transaction {
        self.tx
    }
}
