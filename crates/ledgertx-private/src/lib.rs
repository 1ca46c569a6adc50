//! # LedgerTx Private
//!
//! Private-data transactions: the public transaction carries only Blake3
//! commitments, while the raw payloads go to the designated private-data
//! owners, who attest to them before anyone signs.
//!
//! ## Flow
//!
//! ```text
//! Coordinator                      Owner (each, concurrently)
//!   |---- PrivateTransaction ------->|  check payloads vs commitments
//!   |<--- Evidence | rejection ------|
//!   |  attach evidence, sign locally |
//!   |---- Transaction -------------->|  countersign
//!   |<--- Signature -----------------|
//!   |  submit + wait (ledgertx-client)
//!   |---- settle(committed) -------->|  apply rows or release
//! ```

pub mod attestation;
pub mod coordinator;
pub mod error;
pub mod owner;
pub mod payload;

pub use attestation::{Attestation, ATTEST_DOMAIN};
pub use coordinator::{FlowState, PrivateFlow};
pub use error::{PrivateError, Result};
pub use owner::{MemoryOwner, PrivateDataOwner};
pub use payload::{check_payloads, PrivatePayload, PrivateTransaction};
