//! # LedgerTx Client
//!
//! Submission and commit confirmation for signed transactions.
//!
//! ## Overview
//!
//! A transaction that passes local validation is encoded in canonical wire
//! form and handed to a [`LedgerEndpoint`]. The ledger decides its fate
//! asynchronously; the client polls for the result until it is no longer
//! `Pending`.
//!
//! ## Key Properties
//!
//! - **Local first**: incomplete transactions fail before any network call
//! - **No implicit retries**: transport errors go straight to the caller
//! - **Idempotent resubmission**: ids are content-derived
//! - **Bounded waits**: polling takes a deadline or a cancellation future
//!
//! ## Message Flow
//!
//! ```text
//! Client                              Ledger
//!   |-------- submit(bytes) ---------->|
//!   |<------- id ----------------------|
//!   |-------- result(id) ------------->|
//!   |<------- Pending -----------------|
//!   |          ... poll_interval ...   |
//!   |-------- result(id) ------------->|
//!   |<------- Committed | Rejected ----|
//! ```

pub mod confirm;
pub mod endpoint;
pub mod error;
pub mod messages;

pub use confirm::{ConfirmConfig, Submitter, Wait};
pub use endpoint::{
    memory::{MemoryLedger, MemoryLedgerConfig},
    LedgerEndpoint,
};
pub use error::{ClientError, Result};
pub use messages::{limits, RejectCode, TransactionResult};
