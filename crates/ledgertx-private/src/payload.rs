//! Private payloads: the raw data behind a private operation's commitments.
//!
//! The public transaction only carries Blake3 commitments of table names,
//! keys and values. The raw data travels separately, to the designated
//! private-data owners only, as a [`PrivateTransaction`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use ledgertx_core::{commitment, Address, Digest, Operation, PermissionModel, Transaction};

use crate::error::{PrivateError, Result};

/// Raw data for one private operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrivatePayload {
    CreatePrivateDataTable {
        table_name: String,
    },
    AddPrivateData {
        table_name: String,
        key: Bytes,
        value: Bytes,
    },
}

impl PrivatePayload {
    pub fn create_table(table_name: impl Into<String>) -> Self {
        PrivatePayload::CreatePrivateDataTable {
            table_name: table_name.into(),
        }
    }

    pub fn add_data(
        table_name: impl Into<String>,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> Self {
        PrivatePayload::AddPrivateData {
            table_name: table_name.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        match self {
            PrivatePayload::CreatePrivateDataTable { table_name }
            | PrivatePayload::AddPrivateData { table_name, .. } => table_name,
        }
    }

    /// The public operation committing to this payload.
    pub fn commitment_operation(
        &self,
        owners: Vec<Address>,
        pdo_members: Vec<Address>,
    ) -> Operation {
        match self {
            PrivatePayload::CreatePrivateDataTable { table_name } => {
                Operation::CreatePrivateDataTable {
                    hashed_name: commitment(table_name.as_bytes()),
                    tracked: false,
                    proof_enabled: false,
                    owners,
                    permission: PermissionModel::TableOrRow,
                    pdo_members,
                }
            }
            PrivatePayload::AddPrivateData {
                table_name,
                key,
                value,
            } => Operation::AddPrivateData {
                hashed_table: commitment(table_name.as_bytes()),
                hashed_key: commitment(key),
                hashed_value: commitment(value),
                row_owners: owners,
                pdo_members,
            },
        }
    }

    /// Check this payload against the commitments in `op`.
    ///
    /// Returns a human-readable reason on mismatch.
    pub fn check(&self, op: &Operation) -> std::result::Result<(), String> {
        match (self, op) {
            (
                PrivatePayload::CreatePrivateDataTable { table_name },
                Operation::CreatePrivateDataTable { hashed_name, .. },
            ) => expect_commitment("table name", table_name.as_bytes(), hashed_name),
            (
                PrivatePayload::AddPrivateData {
                    table_name,
                    key,
                    value,
                },
                Operation::AddPrivateData {
                    hashed_table,
                    hashed_key,
                    hashed_value,
                    ..
                },
            ) => {
                expect_commitment("table name", table_name.as_bytes(), hashed_table)?;
                expect_commitment("key", key, hashed_key)?;
                expect_commitment("value", value, hashed_value)
            }
            (payload, op) => Err(format!(
                "payload for {} does not fit operation {:?}",
                payload.table_name(),
                op.kind()
            )),
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| PrivateError::Encoding(e.to_string()))?;
        Ok(Bytes::from(buf))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| PrivateError::Encoding(e.to_string()))
    }
}

fn expect_commitment(what: &str, raw: &[u8], committed: &Digest) -> std::result::Result<(), String> {
    if commitment(raw) == *committed {
        Ok(())
    } else {
        Err(format!("{what} does not match its commitment"))
    }
}

/// Check every private operation of `tx` against the payloads, in order.
pub fn check_payloads(tx: &Transaction, payloads: &[PrivatePayload]) -> std::result::Result<(), String> {
    let private_ops: Vec<&Operation> = tx.operations().iter().filter(|op| op.is_private()).collect();
    if private_ops.len() != payloads.len() {
        return Err(format!(
            "{} private operation(s) but {} payload(s)",
            private_ops.len(),
            payloads.len()
        ));
    }
    for (op, payload) in private_ops.into_iter().zip(payloads) {
        payload.check(op)?;
    }
    Ok(())
}

/// An unsigned transaction plus the raw payloads, as sent to owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateTransaction {
    /// Canonical wire form of the unsigned transaction.
    pub transaction: Bytes,
    /// One encoded [`PrivatePayload`] per private operation, in order.
    pub payloads: Vec<Bytes>,
}

impl PrivateTransaction {
    pub fn new(tx: &Transaction, payloads: &[PrivatePayload]) -> Result<Self> {
        Ok(Self {
            transaction: Bytes::from(tx.to_bytes()),
            payloads: payloads
                .iter()
                .map(PrivatePayload::to_bytes)
                .collect::<Result<Vec<_>>>()?,
        })
    }

    /// Decode both halves.
    pub fn decode(&self) -> Result<(Transaction, Vec<PrivatePayload>)> {
        let tx = Transaction::from_bytes(&self.transaction)?;
        let payloads = self
            .payloads
            .iter()
            .map(|b| PrivatePayload::from_bytes(b))
            .collect::<Result<Vec<_>>>()?;
        Ok((tx, payloads))
    }

    /// Digest binding the payload blobs, as attested by owners.
    pub fn payload_digest(&self) -> Digest {
        let parts: Vec<&[u8]> = self.payloads.iter().map(|b| b.as_ref()).collect();
        Digest::hash_parts(b"ledgertx-payloads-v0:", &parts)
    }
}
