//! Canonical CBOR encoding for deterministic serialization.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (amounts are u64)
//!
//! Two encodings are defined. The *body* (operations and required
//! credentials) is hashed into the [`TransactionId`]. The *wire form* adds
//! attached evidence and signatures and is what gets submitted. Decoding
//! re-encodes and rejects any input that is not byte-identical to the
//! canonical form, so `encode(decode(b)) == b` always holds.

use bytes::Bytes;
use ciborium::value::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::address::{Address, SignatureCredential};
use crate::crypto::{Digest, PublicKey, Signature};
use crate::error::CodecError;
use crate::operation::{Operation, OperationKind, ParentReference, PermissionModel, TableKind};
use crate::transaction::Transaction;
use crate::types::{TransactionId, ID_DOMAIN, SIGN_DOMAIN};

/// Current wire version.
pub const WIRE_VERSION: u64 = 0;

/// Transaction field keys (integer keys for compact encoding).
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const VERSION: u64 = 0;
    pub const OPERATIONS: u64 = 1;
    pub const CREDENTIALS: u64 = 2;
    pub const EVIDENCE: u64 = 3;
    pub const SIGNATURES: u64 = 4;

    /// Every operation map carries its kind under key 0; fields start at 1.
    pub const OP_KIND: u64 = 0;
}

/// Encode the id-bearing body: version, operations and required credentials.
pub fn body_bytes(operations: &[Operation], required: &BTreeSet<SignatureCredential>) -> Vec<u8> {
    let entries = vec![
        (uint(keys::VERSION), uint(WIRE_VERSION)),
        (uint(keys::OPERATIONS), operations_value(operations)),
        (uint(keys::CREDENTIALS), credentials_value(required)),
    ];
    encode_cbor_value_canonical(&Value::Map(entries))
}

/// Compute `Blake3(ID_DOMAIN || body_bytes)`.
pub fn compute_id(
    operations: &[Operation],
    required: &BTreeSet<SignatureCredential>,
) -> TransactionId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(ID_DOMAIN);
    hasher.update(&body_bytes(operations, required));
    TransactionId(*hasher.finalize().as_bytes())
}

/// Digest binding every attached evidence blob, in issuer order.
///
/// An empty evidence set has a fixed digest, so public transactions sign the
/// same shape of message as private ones.
pub fn evidence_digest(evidence: &BTreeMap<SignatureCredential, Bytes>) -> Digest {
    let mut parts: Vec<&[u8]> = Vec::with_capacity(evidence.len() * 2);
    for (issuer, blob) in evidence {
        parts.push(issuer.0.as_bytes());
        parts.push(blob);
    }
    Digest::hash_parts(b"ledgertx-evidence-v0:", &parts)
}

/// Construct the signed message: `SIGN_DOMAIN || id || evidence_digest`.
pub fn signing_message(id: &TransactionId, evidence: &Digest) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SIGN_DOMAIN.len() + 64);
    buf.extend_from_slice(SIGN_DOMAIN);
    buf.extend_from_slice(id.as_bytes());
    buf.extend_from_slice(evidence.as_bytes());
    buf
}

/// Encode a transaction in its full wire form.
pub fn encode_transaction(tx: &Transaction) -> Vec<u8> {
    let evidence = tx
        .evidence()
        .iter()
        .map(|(issuer, blob)| {
            Value::Array(vec![
                Value::Bytes(issuer.0.as_bytes().to_vec()),
                Value::Bytes(blob.to_vec()),
            ])
        })
        .collect();
    let signatures = tx
        .signatures()
        .iter()
        .map(|(cred, sig)| {
            Value::Array(vec![
                Value::Bytes(cred.0.as_bytes().to_vec()),
                Value::Bytes(sig.as_bytes().to_vec()),
            ])
        })
        .collect();

    let entries = vec![
        (uint(keys::VERSION), uint(WIRE_VERSION)),
        (uint(keys::OPERATIONS), operations_value(tx.operations())),
        (uint(keys::CREDENTIALS), credentials_value(tx.required_credentials())),
        (uint(keys::EVIDENCE), Value::Array(evidence)),
        (uint(keys::SIGNATURES), Value::Array(signatures)),
    ];
    encode_cbor_value_canonical(&Value::Map(entries))
}

/// Decode a transaction from its wire form.
///
/// The identifier is recomputed from the decoded body. Input that does not
/// re-encode to the same bytes is rejected with [`CodecError::NonCanonical`].
pub fn decode_transaction(bytes: &[u8]) -> Result<Transaction, CodecError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CodecError::Decoding(e.to_string()))?;
    let map = Fields::of(&value, "transaction")?;

    let version = map.uint(keys::VERSION, "version")?;
    if version != WIRE_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let operations = match map.get(keys::OPERATIONS) {
        Some(Value::Array(items)) => items
            .iter()
            .map(value_to_operation)
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(CodecError::Malformed("missing operations".into())),
    };

    let required = match map.get(keys::CREDENTIALS) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| bytes_array::<32>(v, "credential").map(|b| SignatureCredential(PublicKey(b))))
            .collect::<Result<BTreeSet<_>, _>>()?,
        _ => return Err(CodecError::Malformed("missing credentials".into())),
    };

    let mut evidence = BTreeMap::new();
    for (issuer, blob) in pairs(map.get(keys::EVIDENCE), "evidence")? {
        let issuer = SignatureCredential(PublicKey(bytes_array::<32>(issuer, "evidence issuer")?));
        let blob = match blob {
            Value::Bytes(b) => Bytes::copy_from_slice(b),
            _ => return Err(CodecError::Malformed("invalid evidence blob".into())),
        };
        evidence.insert(issuer, blob);
    }

    let mut signatures = BTreeMap::new();
    for (cred, sig) in pairs(map.get(keys::SIGNATURES), "signatures")? {
        let cred = SignatureCredential(PublicKey(bytes_array::<32>(cred, "signer")?));
        let sig = Signature(bytes_array::<64>(sig, "signature")?);
        signatures.insert(cred, sig);
    }

    let tx = Transaction::from_parts(operations, required, evidence, signatures)?;
    if encode_transaction(&tx) != bytes {
        return Err(CodecError::NonCanonical);
    }
    Ok(tx)
}

/// Encode a single operation to canonical bytes.
pub fn encode_operation(op: &Operation) -> Vec<u8> {
    encode_cbor_value_canonical(&operation_to_value(op))
}

/// Decode a single operation from canonical bytes.
pub fn decode_operation(bytes: &[u8]) -> Result<Operation, CodecError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CodecError::Decoding(e.to_string()))?;
    let op = value_to_operation(&value)?;
    if encode_operation(&op) != bytes {
        return Err(CodecError::NonCanonical);
    }
    Ok(op)
}

fn uint(n: u64) -> Value {
    Value::Integer(n.into())
}

fn text(s: &str) -> Value {
    Value::Text(s.to_owned())
}

fn digest(d: &Digest) -> Value {
    Value::Bytes(d.as_bytes().to_vec())
}

fn address(a: &Address) -> Value {
    Value::Bytes(a.to_bytes().to_vec())
}

fn addresses(list: &[Address]) -> Value {
    Value::Array(list.iter().map(address).collect())
}

fn texts(list: &[String]) -> Value {
    Value::Array(list.iter().map(|s| text(s)).collect())
}

fn operations_value(operations: &[Operation]) -> Value {
    Value::Array(operations.iter().map(operation_to_value).collect())
}

fn credentials_value(required: &BTreeSet<SignatureCredential>) -> Value {
    Value::Array(
        required
            .iter()
            .map(|c| Value::Bytes(c.0.as_bytes().to_vec()))
            .collect(),
    )
}

/// Convert an operation to a CBOR map with integer keys.
fn operation_to_value(op: &Operation) -> Value {
    let mut entries = vec![(uint(keys::OP_KIND), uint(op.kind().to_u16().into()))];
    let mut field = |key: u64, value: Value| entries.push((uint(key), value));

    match op {
        Operation::CreateTable {
            kind,
            name,
            tracked,
            proof_enabled,
            owners,
        } => {
            field(1, uint(kind.to_u8().into()));
            field(2, text(name));
            field(3, Value::Bool(*tracked));
            field(4, Value::Bool(*proof_enabled));
            field(5, addresses(owners));
        }
        Operation::CreatePrivateDataTable {
            hashed_name,
            tracked,
            proof_enabled,
            owners,
            permission,
            pdo_members,
        } => {
            field(1, digest(hashed_name));
            field(2, Value::Bool(*tracked));
            field(3, Value::Bool(*proof_enabled));
            field(4, addresses(owners));
            field(5, uint(permission.to_u8().into()));
            field(6, addresses(pdo_members));
        }
        Operation::AssetGen { table, amount, to } => {
            field(1, text(table));
            field(2, uint(*amount));
            field(3, address(to));
        }
        Operation::AssetMove {
            table,
            amount,
            from,
            to,
        } => {
            field(1, text(table));
            field(2, uint(*amount));
            field(3, address(from));
            field(4, address(to));
        }
        Operation::AddEntity {
            table,
            key,
            data,
            parent,
        } => {
            field(1, text(table));
            field(2, Value::Bytes(key.to_vec()));
            field(3, text(data));
            let parent = match parent {
                Some(p) => Value::Array(vec![
                    text(&p.table),
                    Value::Bytes(p.key.to_vec()),
                    text(&p.tag),
                ]),
                None => Value::Null,
            };
            field(4, parent);
        }
        Operation::NftAdd {
            table,
            token_id,
            owner,
        } => {
            field(1, text(table));
            field(2, text(token_id));
            field(3, address(owner));
        }
        Operation::NftMove {
            table,
            token_id,
            to,
        } => {
            field(1, text(table));
            field(2, text(token_id));
            field(3, address(to));
        }
        Operation::AddPrivateData {
            hashed_table,
            hashed_key,
            hashed_value,
            row_owners,
            pdo_members,
        } => {
            field(1, digest(hashed_table));
            field(2, digest(hashed_key));
            field(3, digest(hashed_value));
            field(4, addresses(row_owners));
            field(5, addresses(pdo_members));
        }
        Operation::ContractDeploy {
            sources,
            instantiators,
        } => {
            field(1, texts(sources));
            field(2, addresses(instantiators));
        }
        Operation::ContractInstantiate {
            assembly_id,
            contract_name,
            instance_name,
            owners,
        } => {
            field(1, digest(assembly_id));
            field(2, text(contract_name));
            field(3, text(instance_name));
            field(4, addresses(owners));
        }
        Operation::ContractInvoke {
            assembly_id,
            contract_name,
            instance_name,
            method,
            params,
        } => {
            field(1, digest(assembly_id));
            field(2, text(contract_name));
            field(3, text(instance_name));
            field(4, text(method));
            field(5, texts(params));
        }
        Operation::ContractInstanceDelete {
            assembly_id,
            contract_name,
            instance_name,
        } => {
            field(1, digest(assembly_id));
            field(2, text(contract_name));
            field(3, text(instance_name));
        }
    }

    Value::Map(entries)
}

/// Convert a CBOR map back to an operation.
fn value_to_operation(value: &Value) -> Result<Operation, CodecError> {
    let f = Fields::of(value, "operation")?;
    let code = f.uint(keys::OP_KIND, "operation kind")?;
    let kind = u16::try_from(code)
        .ok()
        .and_then(OperationKind::from_u16)
        .ok_or(CodecError::UnknownOperation(code))?;

    let op = match kind {
        OperationKind::CreateTable => {
            let code = f.uint(1, "table kind")?;
            let kind = u8::try_from(code)
                .ok()
                .and_then(TableKind::from_u8)
                .ok_or_else(|| CodecError::Malformed(format!("invalid table kind: {code}")))?;
            Operation::CreateTable {
                kind,
                name: f.text(2, "name")?,
                tracked: f.boolean(3, "tracked")?,
                proof_enabled: f.boolean(4, "proof_enabled")?,
                owners: f.addresses(5, "owners")?,
            }
        }
        OperationKind::CreatePrivateDataTable => {
            let code = f.uint(5, "permission")?;
            let permission = u8::try_from(code)
                .ok()
                .and_then(PermissionModel::from_u8)
                .ok_or_else(|| CodecError::Malformed(format!("invalid permission: {code}")))?;
            Operation::CreatePrivateDataTable {
                hashed_name: f.digest(1, "hashed_name")?,
                tracked: f.boolean(2, "tracked")?,
                proof_enabled: f.boolean(3, "proof_enabled")?,
                owners: f.addresses(4, "owners")?,
                permission,
                pdo_members: f.addresses(6, "pdo_members")?,
            }
        }
        OperationKind::AssetGen => Operation::AssetGen {
            table: f.text(1, "table")?,
            amount: f.uint(2, "amount")?,
            to: f.address(3, "to")?,
        },
        OperationKind::AssetMove => Operation::AssetMove {
            table: f.text(1, "table")?,
            amount: f.uint(2, "amount")?,
            from: f.address(3, "from")?,
            to: f.address(4, "to")?,
        },
        OperationKind::AddEntity => {
            let parent = match f.get(4) {
                Some(Value::Null) | None => None,
                Some(Value::Array(items)) => match items.as_slice() {
                    [Value::Text(table), Value::Bytes(key), Value::Text(tag)] => {
                        Some(ParentReference {
                            table: table.clone(),
                            key: Bytes::copy_from_slice(key),
                            tag: tag.clone(),
                        })
                    }
                    _ => return Err(CodecError::Malformed("invalid parent".into())),
                },
                Some(_) => return Err(CodecError::Malformed("invalid parent".into())),
            };
            Operation::AddEntity {
                table: f.text(1, "table")?,
                key: f.bytes(2, "key")?,
                data: f.text(3, "data")?,
                parent,
            }
        }
        OperationKind::NftAdd => Operation::NftAdd {
            table: f.text(1, "table")?,
            token_id: f.text(2, "token_id")?,
            owner: f.address(3, "owner")?,
        },
        OperationKind::NftMove => Operation::NftMove {
            table: f.text(1, "table")?,
            token_id: f.text(2, "token_id")?,
            to: f.address(3, "to")?,
        },
        OperationKind::AddPrivateData => Operation::AddPrivateData {
            hashed_table: f.digest(1, "hashed_table")?,
            hashed_key: f.digest(2, "hashed_key")?,
            hashed_value: f.digest(3, "hashed_value")?,
            row_owners: f.addresses(4, "row_owners")?,
            pdo_members: f.addresses(5, "pdo_members")?,
        },
        OperationKind::ContractDeploy => Operation::ContractDeploy {
            sources: f.texts(1, "sources")?,
            instantiators: f.addresses(2, "instantiators")?,
        },
        OperationKind::ContractInstantiate => Operation::ContractInstantiate {
            assembly_id: f.digest(1, "assembly_id")?,
            contract_name: f.text(2, "contract_name")?,
            instance_name: f.text(3, "instance_name")?,
            owners: f.addresses(4, "owners")?,
        },
        OperationKind::ContractInvoke => Operation::ContractInvoke {
            assembly_id: f.digest(1, "assembly_id")?,
            contract_name: f.text(2, "contract_name")?,
            instance_name: f.text(3, "instance_name")?,
            method: f.text(4, "method")?,
            params: f.texts(5, "params")?,
        },
        OperationKind::ContractInstanceDelete => Operation::ContractInstanceDelete {
            assembly_id: f.digest(1, "assembly_id")?,
            contract_name: f.text(2, "contract_name")?,
            instance_name: f.text(3, "instance_name")?,
        },
    };
    Ok(op)
}

/// Integer-keyed view over a decoded CBOR map.
struct Fields<'a>(&'a [(Value, Value)]);

impl<'a> Fields<'a> {
    fn of(value: &'a Value, what: &str) -> Result<Self, CodecError> {
        match value {
            Value::Map(entries) => Ok(Self(entries)),
            _ => Err(CodecError::Malformed(format!("{what}: expected map"))),
        }
    }

    fn get(&self, key: u64) -> Option<&'a Value> {
        self.0
            .iter()
            .find(|(k, _)| as_u64(k) == Some(key))
            .map(|(_, v)| v)
    }

    fn missing(name: &str) -> CodecError {
        CodecError::Malformed(format!("missing or invalid {name}"))
    }

    fn uint(&self, key: u64, name: &str) -> Result<u64, CodecError> {
        self.get(key).and_then(as_u64).ok_or_else(|| Self::missing(name))
    }

    fn boolean(&self, key: u64, name: &str) -> Result<bool, CodecError> {
        match self.get(key) {
            Some(Value::Bool(b)) => Ok(*b),
            _ => Err(Self::missing(name)),
        }
    }

    fn text(&self, key: u64, name: &str) -> Result<String, CodecError> {
        match self.get(key) {
            Some(Value::Text(s)) => Ok(s.clone()),
            _ => Err(Self::missing(name)),
        }
    }

    fn bytes(&self, key: u64, name: &str) -> Result<Bytes, CodecError> {
        match self.get(key) {
            Some(Value::Bytes(b)) => Ok(Bytes::copy_from_slice(b)),
            _ => Err(Self::missing(name)),
        }
    }

    fn digest(&self, key: u64, name: &str) -> Result<Digest, CodecError> {
        let value = self.get(key).ok_or_else(|| Self::missing(name))?;
        bytes_array::<32>(value, name).map(Digest)
    }

    fn address(&self, key: u64, name: &str) -> Result<Address, CodecError> {
        match self.get(key) {
            Some(Value::Bytes(b)) => Address::from_bytes(b),
            _ => Err(Self::missing(name)),
        }
    }

    fn addresses(&self, key: u64, name: &str) -> Result<Vec<Address>, CodecError> {
        match self.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    Value::Bytes(b) => Address::from_bytes(b),
                    _ => Err(Self::missing(name)),
                })
                .collect(),
            _ => Err(Self::missing(name)),
        }
    }

    fn texts(&self, key: u64, name: &str) -> Result<Vec<String>, CodecError> {
        match self.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    Value::Text(s) => Ok(s.clone()),
                    _ => Err(Self::missing(name)),
                })
                .collect(),
            _ => Err(Self::missing(name)),
        }
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Integer(i) => u64::try_from(*i).ok(),
        _ => None,
    }
}

fn bytes_array<const N: usize>(value: &Value, name: &str) -> Result<[u8; N], CodecError> {
    match value {
        Value::Bytes(b) => b.as_slice().try_into().map_err(|_| CodecError::InvalidLength {
            expected: N,
            got: b.len(),
        }),
        _ => Err(CodecError::Malformed(format!("invalid {name}"))),
    }
}

/// Read an array of two-element arrays.
fn pairs<'a>(
    value: Option<&'a Value>,
    name: &str,
) -> Result<Vec<(&'a Value, &'a Value)>, CodecError> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Array(pair) if pair.len() == 2 => Ok((&pair[0], &pair[1])),
                _ => Err(CodecError::Malformed(format!("invalid {name} entry"))),
            })
            .collect(),
        _ => Err(CodecError::Malformed(format!("missing {name}"))),
    }
}

/// Encode a CBOR Value to canonical bytes.
fn encode_cbor_value_canonical(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

/// Recursively encode a CBOR value.
///
/// Only the value types produced by this module are reachable here.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item);
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        // Floats, tags and other simple values never appear in a
        // transaction; null is the only remaining case we emit.
        _ => buf.push(0xf6),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n = i128::from(i);
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| (encode_cbor_value_canonical(k), v))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}
