//! Golden test vectors for deterministic verification.
//!
//! Every implementation of the transaction format must produce identical:
//! - body bytes (the id preimage, without the domain tag)
//! - transaction id
//! - signing message
//! - signatures (deterministic Ed25519)
//! - wire bytes

use serde::Serialize;

use ledgertx_core::canonical::body_bytes;
use ledgertx_core::{
    assembly_id, commitment, Address, BuildError, Evidence, KeyPair, Operation, PermissionModel,
    SignatureCredential, TableKind, Transaction,
};

use crate::fixtures::{small_seed, TABLE_ADMIN_SEED};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Seeds of the required credentials, in signing order.
    pub signer_seeds: Vec<[u8; 32]>,
    pub operations: Vec<Operation>,
    /// Evidence attached before signing, as (issuer seed, blob).
    pub evidence: Vec<([u8; 32], &'static [u8])>,
    /// Expected transaction id (hex).
    pub expected_id: &'static str,
}

/// Derived outputs of a vector, all hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VectorOutput {
    pub name: String,
    pub body: String,
    pub id: String,
    pub signing_message: String,
    /// (credential, signature) in credential order.
    pub signatures: Vec<(String, String)>,
    pub wire: String,
}

fn address(seed: [u8; 32]) -> Address {
    Address::from(&KeyPair::from_seed(&seed))
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    let owner = small_seed(0x01);
    let user0 = small_seed(0x10);
    let user1 = small_seed(0x20);
    let pdo = small_seed(0x30);
    let sources = ["contract Counter {}".to_string()];

    vec![
        GoldenVector {
            name: "create asset table",
            signer_seeds: vec![TABLE_ADMIN_SEED],
            operations: vec![Operation::create_table(
                TableKind::Asset,
                "coins",
                vec![address(owner)],
            )],
            evidence: vec![],
            expected_id: "bd5ab979f20a2dff7d307db24cf38148a653a48fba57b063eb0578ad78f0076e",
        },
        GoldenVector {
            name: "two-party swap",
            signer_seeds: vec![user1, user0],
            operations: vec![
                Operation::asset_move("coins", 10, address(user0), address(user1)),
                Operation::asset_move("tokens", 3, address(user1), address(user0)),
            ],
            evidence: vec![],
            expected_id: "4b4a9077ea684d0ca977176c6a42c2c39a5eef4965c1adbbc714bb19657a15a0",
        },
        GoldenVector {
            name: "private table with evidence",
            signer_seeds: vec![TABLE_ADMIN_SEED, pdo],
            operations: vec![Operation::CreatePrivateDataTable {
                hashed_name: commitment(b"medical"),
                tracked: false,
                proof_enabled: false,
                owners: vec![address(TABLE_ADMIN_SEED)],
                permission: PermissionModel::TableOrRow,
                pdo_members: vec![address(pdo)],
            }],
            evidence: vec![(pdo, b"attested")],
            expected_id: "0f4cbbe2fe8419bb57854774461e1f6baba4d1e8621ce1b50cf3d9f6abb39f39",
        },
        GoldenVector {
            name: "contract invoke",
            signer_seeds: vec![owner],
            operations: vec![Operation::contract_invoke(
                assembly_id(&sources),
                "Counter",
                "counter-1",
                "increment",
                vec!["1".into()],
            )],
            evidence: vec![],
            expected_id: "b4087d0b65873576a5f52d5ab8063aafea11ab48f882be73c213c056e93bde90",
        },
    ]
}

/// Build the fully signed transaction a vector describes.
pub fn transaction_from_vector(vector: &GoldenVector) -> Result<Transaction, BuildError> {
    let signers: Vec<KeyPair> = vector.signer_seeds.iter().map(KeyPair::from_seed).collect();
    let mut tx = Transaction::create(
        vector.operations.clone(),
        signers.iter().map(SignatureCredential::derive),
    )?;
    for (seed, blob) in &vector.evidence {
        let issuer = SignatureCredential::derive(&KeyPair::from_seed(seed));
        tx = tx.add_evidence(Evidence::new(issuer, *blob))?;
    }
    for signer in &signers {
        tx = tx.sign(signer.private_key())?;
    }
    Ok(tx)
}

/// Compute every derived output of a vector.
pub fn vector_output(vector: &GoldenVector) -> Result<VectorOutput, BuildError> {
    let tx = transaction_from_vector(vector)?;
    Ok(VectorOutput {
        name: vector.name.to_string(),
        body: hex::encode(body_bytes(tx.operations(), tx.required_credentials())),
        id: tx.id().to_hex(),
        signing_message: hex::encode(tx.signing_message()),
        signatures: tx
            .signatures()
            .iter()
            .map(|(cred, sig)| (cred.encode(), sig.to_hex()))
            .collect(),
        wire: hex::encode(tx.to_bytes()),
    })
}

/// Verify all golden vectors produce their pinned ids.
///
/// Returns (name, matches, computed id).
pub fn verify_all_vectors() -> Result<Vec<(String, bool, String)>, BuildError> {
    all_vectors()
        .iter()
        .map(|v| {
            let id = transaction_from_vector(v)?.id().to_hex();
            let matches = id == v.expected_id;
            Ok((v.name.to_string(), matches, id))
        })
        .collect()
}

/// Every vector's outputs as pretty JSON, for other implementations.
pub fn vectors_json() -> Result<String, BuildError> {
    let outputs = all_vectors()
        .iter()
        .map(vector_output)
        .collect::<Result<Vec<_>, _>>()?;
    serde_json::to_string_pretty(&outputs)
        .map_err(|e| BuildError::InvalidArgument(format!("vector serialization failed: {e}")))
}
