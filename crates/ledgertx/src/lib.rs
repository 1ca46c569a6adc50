//! # LedgerTx
//!
//! The unified API for building, signing, submitting and confirming
//! transactions against a permissioned ledger.
//!
//! ## Overview
//!
//! - **Transactions**: ordered operations, a required-credential set and
//!   content-derived ids
//! - **Signing**: every required credential signs; evidence first
//! - **Submission**: local validation, then submit and poll for a result
//! - **Private data**: designated owners attest to raw payloads before
//!   anyone signs
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ledgertx::{ClientConfig, LedgerClient, MemoryLedger};
//! use ledgertx::core::{Address, KeyPair, Operation};
//!
//! async fn example() -> ledgertx::Result<()> {
//!     // Keys are supplied by the caller
//!     let admin = KeyPair::generate();
//!
//!     let ledger = Arc::new(MemoryLedger::default());
//!     let client = LedgerClient::new(ledger, ClientConfig::default());
//!
//!     // Build, sign, submit and wait for the commit
//!     let op = Operation::asset_gen("coins", 100, Address::from(&admin));
//!     let id = client.execute(vec![op], &[admin.private_key()]).await?;
//!     println!("committed {id}");
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `ledgertx::core` - Transactions, operations, credentials, validation
//! - `ledgertx::client` - Endpoints, submission and polling
//! - `ledgertx::private` - Private-data flows

pub mod error;
pub mod ledger;

// Re-export component crates
pub use ledgertx_client as client;
pub use ledgertx_core as core;
pub use ledgertx_private as private;

// Re-export main types for convenience
pub use error::{LedgerError, Result};
pub use ledger::{ClientConfig, LedgerClient};

// Re-export commonly used types
pub use ledgertx_client::{
    ConfirmConfig, LedgerEndpoint, MemoryLedger, MemoryLedgerConfig, RejectCode,
    TransactionResult, Wait,
};
pub use ledgertx_core::{
    check_ready, validate_credentials, Address, KeyPair, Operation, PrivateKey,
    SignatureCredential, Transaction, TransactionBuilder, TransactionId,
};
pub use ledgertx_private::{FlowState, MemoryOwner, PrivateDataOwner, PrivateFlow, PrivatePayload};
