//! # LedgerTx Testkit
//!
//! Testing utilities for LedgerTx.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known transactions with their derived outputs for
//!   cross-implementation verification
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: The sample cast of key holders and an in-memory ledger
//!
//! ## Golden Vectors
//!
//! ```rust
//! use ledgertx_testkit::vectors::{all_vectors, transaction_from_vector};
//!
//! for vector in all_vectors() {
//!     let tx = transaction_from_vector(&vector).unwrap();
//!     println!("{}: {}", vector.name, tx.id().to_hex());
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use ledgertx_testkit::generators::{unsigned_from_params, TransactionParams};
//!
//! proptest! {
//!     #[test]
//!     fn id_is_deterministic(params: TransactionParams) {
//!         let a = unsigned_from_params(&params).unwrap();
//!         let b = unsigned_from_params(&params).unwrap();
//!         prop_assert_eq!(a.id(), b.id());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use ledgertx_testkit::fixtures::Parties;
//!
//! let parties = Parties::sample();
//! let tx = parties.create_asset_table("coins").unwrap();
//! assert!(tx.is_signed());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{as_owners, LedgerFixture, Parties};
pub use generators::{signed_from_params, unsigned_from_params, TransactionParams};
pub use vectors::{all_vectors, transaction_from_vector, verify_all_vectors, GoldenVector};
