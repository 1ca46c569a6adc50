//! Transaction validation: credential coverage, evidence coverage and
//! signature verification.
//!
//! The coverage checks are structural and cheap; [`check_ready`] is what the
//! submitter runs before any network call. [`verify_signatures`] is the
//! cryptographic check a ledger performs on receipt.

use std::collections::BTreeSet;

use crate::address::SignatureCredential;
use crate::error::ValidationError;
use crate::transaction::Transaction;

/// True iff the attached signatures cover every required credential.
pub fn validate_credentials(tx: &Transaction) -> bool {
    tx.required_credentials()
        .iter()
        .all(|c| tx.signatures().contains_key(c))
}

/// Required credentials with no attached signature.
pub fn missing_credentials(tx: &Transaction) -> BTreeSet<SignatureCredential> {
    tx.required_credentials()
        .iter()
        .filter(|c| !tx.signatures().contains_key(c))
        .copied()
        .collect()
}

/// True iff evidence from every required issuer is attached.
pub fn validate_evidence(tx: &Transaction) -> bool {
    missing_evidence(tx).is_empty()
}

/// Required evidence issuers with nothing attached.
pub fn missing_evidence(tx: &Transaction) -> BTreeSet<SignatureCredential> {
    tx.required_evidence()
        .into_iter()
        .filter(|issuer| !tx.evidence().contains_key(issuer))
        .collect()
}

/// Check that a transaction may be submitted.
pub fn check_ready(tx: &Transaction) -> Result<(), ValidationError> {
    let missing = missing_credentials(tx);
    if !missing.is_empty() {
        return Err(ValidationError::IncompleteCredentials {
            missing: missing.len(),
            required: tx.required_credentials().len(),
        });
    }

    let missing = missing_evidence(tx);
    if !missing.is_empty() {
        return Err(ValidationError::MissingEvidence {
            missing: missing.len(),
        });
    }

    Ok(())
}

/// Verify every attached signature against the signing message.
///
/// Signatures from credentials outside the required set are rejected.
pub fn verify_signatures(tx: &Transaction) -> Result<(), ValidationError> {
    let message = tx.signing_message();
    for (cred, signature) in tx.signatures() {
        if !tx.required_credentials().contains(cred) {
            return Err(ValidationError::UnexpectedSignature(*cred));
        }
        cred.public_key()
            .verify(&message, signature)
            .map_err(|_| ValidationError::SignatureFailed(*cred))?;
    }
    Ok(())
}
