//! Proptest generators for property-based testing.

use bytes::Bytes;
use proptest::prelude::*;

use ledgertx_core::{
    Address, BuildError, ContractAddress, Digest, KeyPair, Operation, ParentReference,
    PermissionModel, SignatureCredential, TableKind, Transaction,
};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = KeyPair> {
    any::<[u8; 32]>().prop_map(|seed| KeyPair::from_seed(&seed))
}

/// Generate between `min` and `max` keypairs with distinct seeds.
pub fn distinct_keypairs(min: usize, max: usize) -> impl Strategy<Value = Vec<KeyPair>> {
    prop::collection::btree_set(any::<[u8; 32]>(), min..=max)
        .prop_map(|seeds| seeds.iter().map(KeyPair::from_seed).collect())
}

/// Generate a random Digest.
pub fn digest() -> impl Strategy<Value = Digest> {
    any::<[u8; 32]>().prop_map(Digest)
}

/// Generate a public-key or contract address.
pub fn address() -> impl Strategy<Value = Address> {
    prop_oneof![
        3 => keypair().prop_map(|kp| Address::from(&kp)),
        1 => digest().prop_map(|d| Address::from(ContractAddress(d))),
    ]
}

fn addresses() -> impl Strategy<Value = Vec<Address>> {
    prop::collection::vec(address(), 0..4)
}

/// Generate a table name.
pub fn table_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}".prop_map(String::from)
}

fn short_text() -> impl Strategy<Value = String> {
    "[ -~]{0,24}".prop_map(String::from)
}

fn blob(max_len: usize) -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 0..=max_len).prop_map(Bytes::from)
}

fn table_kind() -> impl Strategy<Value = TableKind> {
    prop_oneof![
        Just(TableKind::Asset),
        Just(TableKind::Entity),
        Just(TableKind::Nft),
        Just(TableKind::Binary),
    ]
}

fn permission() -> impl Strategy<Value = PermissionModel> {
    prop_oneof![
        Just(PermissionModel::Table),
        Just(PermissionModel::Row),
        Just(PermissionModel::TableOrRow),
    ]
}

fn parent() -> impl Strategy<Value = Option<ParentReference>> {
    prop::option::of(
        (table_name(), blob(16), short_text())
            .prop_map(|(table, key, tag)| ParentReference { table, key, tag }),
    )
}

/// Generate a public (non-private) operation.
pub fn public_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        (table_kind(), table_name(), any::<bool>(), any::<bool>(), addresses()).prop_map(
            |(kind, name, tracked, proof_enabled, owners)| Operation::CreateTable {
                kind,
                name,
                tracked,
                proof_enabled,
                owners,
            }
        ),
        (table_name(), any::<u64>(), address())
            .prop_map(|(table, amount, to)| Operation::AssetGen { table, amount, to }),
        (table_name(), any::<u64>(), address(), address()).prop_map(|(table, amount, from, to)| {
            Operation::AssetMove {
                table,
                amount,
                from,
                to,
            }
        }),
        (table_name(), blob(32), short_text(), parent()).prop_map(|(table, key, data, parent)| {
            Operation::AddEntity {
                table,
                key,
                data,
                parent,
            }
        }),
        (table_name(), short_text(), address()).prop_map(|(table, token_id, owner)| {
            Operation::NftAdd {
                table,
                token_id,
                owner,
            }
        }),
        (table_name(), short_text(), address())
            .prop_map(|(table, token_id, to)| Operation::NftMove { table, token_id, to }),
        (prop::collection::vec(short_text(), 1..3), addresses()).prop_map(
            |(sources, instantiators)| Operation::ContractDeploy {
                sources,
                instantiators,
            }
        ),
        (digest(), table_name(), table_name(), addresses()).prop_map(
            |(assembly_id, contract_name, instance_name, owners)| Operation::ContractInstantiate {
                assembly_id,
                contract_name,
                instance_name,
                owners,
            }
        ),
        (
            digest(),
            table_name(),
            table_name(),
            table_name(),
            prop::collection::vec(short_text(), 0..4)
        )
            .prop_map(|(assembly_id, contract_name, instance_name, method, params)| {
                Operation::ContractInvoke {
                    assembly_id,
                    contract_name,
                    instance_name,
                    method,
                    params,
                }
            }),
        (digest(), table_name(), table_name()).prop_map(
            |(assembly_id, contract_name, instance_name)| Operation::ContractInstanceDelete {
                assembly_id,
                contract_name,
                instance_name,
            }
        ),
    ]
}

/// Generate a private-data operation.
pub fn private_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        (
            digest(),
            any::<bool>(),
            any::<bool>(),
            addresses(),
            permission(),
            addresses()
        )
            .prop_map(
                |(hashed_name, tracked, proof_enabled, owners, permission, pdo_members)| {
                    Operation::CreatePrivateDataTable {
                        hashed_name,
                        tracked,
                        proof_enabled,
                        owners,
                        permission,
                        pdo_members,
                    }
                }
            ),
        (digest(), digest(), digest(), addresses(), addresses()).prop_map(
            |(hashed_table, hashed_key, hashed_value, row_owners, pdo_members)| {
                Operation::AddPrivateData {
                    hashed_table,
                    hashed_key,
                    hashed_value,
                    row_owners,
                    pdo_members,
                }
            }
        ),
    ]
}

/// Generate any operation.
pub fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![4 => public_operation(), 1 => private_operation()]
}

/// Parameters for generating a public multi-party transaction.
#[derive(Debug, Clone)]
pub struct TransactionParams {
    pub operations: Vec<Operation>,
    /// Holders of the required credentials, distinct.
    pub signers: Vec<KeyPair>,
}

impl TransactionParams {
    pub fn credentials(&self) -> Vec<SignatureCredential> {
        self.signers.iter().map(SignatureCredential::derive).collect()
    }
}

impl Arbitrary for TransactionParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            prop::collection::vec(public_operation(), 1..6),
            distinct_keypairs(1, 5),
        )
            .prop_map(|(operations, signers)| TransactionParams {
                operations,
                signers,
            })
            .boxed()
    }
}

/// Generate the unsigned transaction described by `params`.
pub fn unsigned_from_params(params: &TransactionParams) -> Result<Transaction, BuildError> {
    Transaction::create(params.operations.clone(), params.credentials())
}

/// Generate the transaction described by `params`, signed by every signer in
/// the given order.
pub fn signed_from_params(
    params: &TransactionParams,
    order: &[usize],
) -> Result<Transaction, BuildError> {
    let mut tx = unsigned_from_params(params)?;
    for &i in order {
        tx = tx.sign(params.signers[i].private_key())?;
    }
    Ok(tx)
}

/// Parameters plus a permutation of signer indices.
pub fn params_with_order() -> impl Strategy<Value = (TransactionParams, Vec<usize>)> {
    any::<TransactionParams>().prop_flat_map(|params| {
        let order: Vec<usize> = (0..params.signers.len()).collect();
        (Just(params), Just(order).prop_shuffle())
    })
}

/// Parameters plus a signing mask of the same length as the signers.
pub fn params_with_mask() -> impl Strategy<Value = (TransactionParams, Vec<bool>)> {
    any::<TransactionParams>().prop_flat_map(|params| {
        let n = params.signers.len();
        (Just(params), prop::collection::vec(any::<bool>(), n))
    })
}
