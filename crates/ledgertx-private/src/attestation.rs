//! Owner attestations: the content of an evidence blob.
//!
//! An owner that accepts a private transaction signs
//! `ATTEST_DOMAIN || transaction_id || payload_digest` with its own key. The
//! signed statement is CBOR-encoded into the [`Evidence`] blob.

use serde::{Deserialize, Serialize};

use ledgertx_core::{Digest, Evidence, PrivateKey, Signature, SignatureCredential, TransactionId};

use crate::error::{PrivateError, Result};

/// Domain tag prepended to every attested message.
pub const ATTEST_DOMAIN: &[u8] = b"ledgertx-attest-v0:";

/// An owner's signed statement that the payloads match the commitments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub issuer: SignatureCredential,
    pub transaction_id: TransactionId,
    pub payload_digest: Digest,
    pub signature: Signature,
}

impl Attestation {
    /// The message an owner signs.
    pub fn message(transaction_id: &TransactionId, payload_digest: &Digest) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ATTEST_DOMAIN.len() + 64);
        buf.extend_from_slice(ATTEST_DOMAIN);
        buf.extend_from_slice(transaction_id.as_bytes());
        buf.extend_from_slice(payload_digest.as_bytes());
        buf
    }

    pub fn sign(key: &PrivateKey, transaction_id: TransactionId, payload_digest: Digest) -> Self {
        let signature = key.sign(&Self::message(&transaction_id, &payload_digest));
        Self {
            issuer: SignatureCredential::from_private(key),
            transaction_id,
            payload_digest,
            signature,
        }
    }

    /// Check the signature, the transaction id and the payload digest.
    pub fn verify(&self, transaction_id: &TransactionId, payload_digest: &Digest) -> Result<()> {
        if &self.transaction_id != transaction_id || &self.payload_digest != payload_digest {
            return Err(PrivateError::InvalidAttestation(self.issuer));
        }
        self.issuer
            .public_key()
            .verify(
                &Self::message(&self.transaction_id, &self.payload_digest),
                &self.signature,
            )
            .map_err(|_| PrivateError::InvalidAttestation(self.issuer))
    }

    pub fn to_evidence(&self) -> Result<Evidence> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| PrivateError::Encoding(e.to_string()))?;
        Ok(Evidence::new(self.issuer, buf))
    }

    /// Decode the attestation carried by `evidence`.
    ///
    /// The embedded issuer must match the evidence issuer.
    pub fn from_evidence(evidence: &Evidence) -> Result<Self> {
        let attestation: Self = ciborium::from_reader(evidence.blob.as_ref())
            .map_err(|_| PrivateError::InvalidAttestation(evidence.issuer))?;
        if attestation.issuer != evidence.issuer {
            return Err(PrivateError::InvalidAttestation(evidence.issuer));
        }
        Ok(attestation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgertx_core::KeyPair;

    #[test]
    fn test_attestation_through_evidence() {
        let owner = KeyPair::from_seed(&[0x30; 32]);
        let id = TransactionId::from_bytes([7; 32]);
        let digest = Digest::hash(b"payloads");

        let evidence = Attestation::sign(owner.private_key(), id, digest)
            .to_evidence()
            .unwrap();
        assert_eq!(evidence.issuer, SignatureCredential::derive(&owner));

        let decoded = Attestation::from_evidence(&evidence).unwrap();
        assert!(decoded.verify(&id, &digest).is_ok());
        assert!(decoded.verify(&TransactionId::ZERO, &digest).is_err());
        assert!(decoded.verify(&id, &Digest::hash(b"other")).is_err());
    }

    #[test]
    fn test_evidence_issuer_must_match() {
        let owner = KeyPair::from_seed(&[0x30; 32]);
        let impostor = SignatureCredential::derive(&KeyPair::from_seed(&[0x31; 32]));
        let mut evidence = Attestation::sign(owner.private_key(), TransactionId::ZERO, Digest::hash(b""))
            .to_evidence()
            .unwrap();
        evidence.issuer = impostor;
        assert!(matches!(
            Attestation::from_evidence(&evidence),
            Err(PrivateError::InvalidAttestation(c)) if c == impostor
        ));
    }

    #[test]
    fn test_garbage_blob_rejected() {
        let issuer = SignatureCredential::derive(&KeyPair::from_seed(&[0x30; 32]));
        let evidence = Evidence::new(issuer, &b"not cbor"[..]);
        assert!(Attestation::from_evidence(&evidence).is_err());
    }
}
