//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a fixed cast of key holders and
//! an in-memory ledger to submit to.

use std::sync::Arc;

use ledgertx_client::{ConfirmConfig, MemoryLedger, MemoryLedgerConfig, Submitter};
use ledgertx_core::{
    Address, BuildError, KeyPair, Operation, SignatureCredential, TableKind, Transaction,
};
use ledgertx_private::{MemoryOwner, PrivateDataOwner, PrivatePayload};

/// Seed of the table administrator in the sample network configuration.
pub const TABLE_ADMIN_SEED: [u8; 32] = [
    0x10, 0x42, 0x5b, 0x7e, 0x6e, 0xbf, 0x5e, 0x0d, 0x59, 0x18, 0x71, 0x7f, 0x77, 0xce, 0x8a, 0x66,
    0xaa, 0xf9, 0x2b, 0xc6, 0x4b, 0x65, 0x99, 0x6f, 0x88, 0x5f, 0xf1, 0x2b, 0xd9, 0x4e, 0xf5, 0x29,
];

/// Seed of the contract administrator in the sample network configuration.
pub const CONTRACT_ADMIN_SEED: [u8; 32] = [
    0x14, 0xe3, 0xa2, 0xd1, 0x6c, 0x8a, 0x43, 0xa4, 0xeb, 0x1b, 0x08, 0x8b, 0x32, 0xbc, 0xa2, 0xab,
    0xaf, 0x27, 0x4e, 0x3f, 0x18, 0x5a, 0xfc, 0x9c, 0x15, 0xb3, 0x34, 0x91, 0xc8, 0xde, 0xb9, 0xa6,
];

/// Seed whose last byte is `n`, all others zero.
pub const fn small_seed(n: u8) -> [u8; 32] {
    let mut seed = [0u8; 32];
    seed[31] = n;
    seed
}

/// The key holders of the sample scenarios.
#[derive(Debug, Clone)]
pub struct Parties {
    pub table_admin: KeyPair,
    pub contract_admin: KeyPair,
    /// Owner of tables and contract instances.
    pub owner: KeyPair,
    pub user0: KeyPair,
    pub user1: KeyPair,
    /// Private-data owners.
    pub pdo_members: Vec<KeyPair>,
}

impl Parties {
    /// The fixed sample cast with two private-data owners.
    pub fn sample() -> Self {
        Self {
            table_admin: KeyPair::from_seed(&TABLE_ADMIN_SEED),
            contract_admin: KeyPair::from_seed(&CONTRACT_ADMIN_SEED),
            owner: KeyPair::from_seed(&small_seed(0x01)),
            user0: KeyPair::from_seed(&small_seed(0x10)),
            user1: KeyPair::from_seed(&small_seed(0x20)),
            pdo_members: vec![
                KeyPair::from_seed(&small_seed(0x30)),
                KeyPair::from_seed(&small_seed(0x31)),
            ],
        }
    }

    /// A fresh cast with random keys.
    pub fn random(pdo_members: usize) -> Self {
        Self {
            table_admin: KeyPair::generate(),
            contract_admin: KeyPair::generate(),
            owner: KeyPair::generate(),
            user0: KeyPair::generate(),
            user1: KeyPair::generate(),
            pdo_members: (0..pdo_members).map(|_| KeyPair::generate()).collect(),
        }
    }

    pub fn pdo_addresses(&self) -> Vec<Address> {
        self.pdo_members.iter().map(Address::from).collect()
    }

    pub fn pdo_credentials(&self) -> Vec<SignatureCredential> {
        self.pdo_members
            .iter()
            .map(SignatureCredential::derive)
            .collect()
    }

    /// One in-memory owner per private-data owner key.
    pub fn memory_owners(&self) -> Vec<Arc<MemoryOwner>> {
        self.pdo_members
            .iter()
            .map(|k| Arc::new(MemoryOwner::new(k)))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sample transactions
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an asset table owned by `owner`, signed by the table admin.
    pub fn create_asset_table(&self, table: &str) -> Result<Transaction, BuildError> {
        let op = Operation::create_table(TableKind::Asset, table, vec![Address::from(&self.owner)]);
        Transaction::simple_signed(op, self.table_admin.private_key())
    }

    /// Mint `amount` to user0, signed by the table owner.
    pub fn mint_to_user0(&self, table: &str, amount: u64) -> Result<Transaction, BuildError> {
        let op = Operation::asset_gen(table, amount, Address::from(&self.user0));
        Transaction::simple_signed(op, self.owner.private_key())
    }

    /// An unsigned swap of assets between user0 and user1, requiring both.
    pub fn swap(
        &self,
        (table0, amount0): (&str, u64),
        (table1, amount1): (&str, u64),
    ) -> Result<Transaction, BuildError> {
        let (a, b) = (Address::from(&self.user0), Address::from(&self.user1));
        Transaction::create(
            vec![
                Operation::asset_move(table0, amount0, a, b),
                Operation::asset_move(table1, amount1, b, a),
            ],
            [
                SignatureCredential::derive(&self.user0),
                SignatureCredential::derive(&self.user1),
            ],
        )
    }

    /// An unsigned private transaction for `payloads`, owned by the table
    /// admin and designating every private-data owner.
    pub fn private(&self, payloads: &[PrivatePayload]) -> Result<Transaction, BuildError> {
        let owners = vec![Address::from(&self.table_admin)];
        let ops = payloads
            .iter()
            .map(|p| p.commitment_operation(owners.clone(), self.pdo_addresses()))
            .collect();
        let required = self
            .pdo_credentials()
            .into_iter()
            .chain([SignatureCredential::derive(&self.table_admin)]);
        Transaction::create(ops, required)
    }
}

impl Default for Parties {
    fn default() -> Self {
        Self::sample()
    }
}

/// Erase owner types for the coordinator.
pub fn as_owners(owners: &[Arc<MemoryOwner>]) -> Vec<Arc<dyn PrivateDataOwner>> {
    owners
        .iter()
        .map(|o| Arc::clone(o) as Arc<dyn PrivateDataOwner>)
        .collect()
}

/// An in-memory ledger and a submitter bound to it.
pub struct LedgerFixture {
    pub ledger: Arc<MemoryLedger>,
    pub submitter: Submitter<MemoryLedger>,
}

impl LedgerFixture {
    /// A ledger answering `Pending` this many times per transaction.
    pub fn new(pending_polls: u32) -> Self {
        let ledger = Arc::new(MemoryLedger::new(MemoryLedgerConfig {
            pending_polls,
            ..Default::default()
        }));
        Self {
            submitter: Submitter::new(Arc::clone(&ledger), ConfirmConfig::default()),
            ledger,
        }
    }
}

impl Default for LedgerFixture {
    fn default() -> Self {
        Self::new(0)
    }
}
