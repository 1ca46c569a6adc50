//! # LedgerTx Core
//!
//! Pure primitives for building ledger transactions: keys and credentials,
//! operations, transactions, canonical encoding and validation.
//!
//! This crate contains no I/O and no networking. It is pure computation over
//! cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`Operation`] - Closed set of ledger operations
//! - [`Transaction`] - Persistent value: operations, required credentials,
//!   evidence and signatures
//! - [`TransactionId`] - Content-derived identifier (Blake3 hash)
//! - [`SignatureCredential`] - A public key that must sign
//!
//! ## Canonicalization
//!
//! Transactions are encoded using deterministic CBOR. See [`canonical`] module.

pub mod address;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod operation;
pub mod transaction;
pub mod types;
pub mod validation;

pub use address::{Address, ContractAddress, SignatureCredential};
pub use crypto::{Digest, KeyPair, PrivateKey, PublicKey, Signature};
pub use error::{BuildError, CodecError, ValidationError};
pub use operation::{
    assembly_id, commitment, Operation, OperationKind, ParentReference, PermissionModel,
    SignerRole, TableKind,
};
pub use transaction::{Evidence, Transaction, TransactionBuilder};
pub use types::TransactionId;
pub use validation::{
    check_ready, missing_credentials, missing_evidence, validate_credentials, validate_evidence,
    verify_signatures,
};
