//! Operations: the typed entries a transaction carries.
//!
//! Operations are pure data. Who must sign for each kind is domain knowledge
//! supplied by the caller when building the transaction; [`SignerRole`]
//! documents the expectation per kind but nothing here enforces it.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::address::{Address, SignatureCredential};
use crate::crypto::Digest;

/// Kind of table created by [`Operation::CreateTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TableKind {
    Asset = 1,
    Entity = 2,
    Nft = 3,
    Binary = 4,
}

impl TableKind {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Asset),
            2 => Some(Self::Entity),
            3 => Some(Self::Nft),
            4 => Some(Self::Binary),
            _ => None,
        }
    }
}

/// Permission model of a private-data table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PermissionModel {
    /// Only table owners may write.
    Table = 1,
    /// Only row owners may write their rows.
    Row = 2,
    /// Either table owners or row owners may write.
    TableOrRow = 3,
}

impl PermissionModel {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Table),
            2 => Some(Self::Row),
            3 => Some(Self::TableOrRow),
            _ => None,
        }
    }
}

/// Link from an entity to a parent entry in another table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentReference {
    pub table: String,
    pub key: Bytes,
    pub tag: String,
}

/// A single ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    CreateTable {
        kind: TableKind,
        name: String,
        tracked: bool,
        proof_enabled: bool,
        owners: Vec<Address>,
    },
    /// The table name is only ever published as its commitment.
    CreatePrivateDataTable {
        hashed_name: Digest,
        tracked: bool,
        proof_enabled: bool,
        owners: Vec<Address>,
        permission: PermissionModel,
        pdo_members: Vec<Address>,
    },
    AssetGen {
        table: String,
        amount: u64,
        to: Address,
    },
    AssetMove {
        table: String,
        amount: u64,
        from: Address,
        to: Address,
    },
    AddEntity {
        table: String,
        key: Bytes,
        data: String,
        parent: Option<ParentReference>,
    },
    NftAdd {
        table: String,
        token_id: String,
        owner: Address,
    },
    NftMove {
        table: String,
        token_id: String,
        to: Address,
    },
    /// Table, key and value are published as commitments only.
    AddPrivateData {
        hashed_table: Digest,
        hashed_key: Digest,
        hashed_value: Digest,
        row_owners: Vec<Address>,
        pdo_members: Vec<Address>,
    },
    ContractDeploy {
        sources: Vec<String>,
        instantiators: Vec<Address>,
    },
    ContractInstantiate {
        assembly_id: Digest,
        contract_name: String,
        instance_name: String,
        owners: Vec<Address>,
    },
    ContractInvoke {
        assembly_id: Digest,
        contract_name: String,
        instance_name: String,
        method: String,
        params: Vec<String>,
    },
    ContractInstanceDelete {
        assembly_id: Digest,
        contract_name: String,
        instance_name: String,
    },
}

/// Stable numeric discriminator of an [`Operation`] on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum OperationKind {
    // Tables (0x0000 - 0x00FF)
    CreateTable = 0x0001,

    // Assets (0x0100 - 0x01FF)
    AssetGen = 0x0100,
    AssetMove = 0x0101,

    // Entities (0x0200 - 0x02FF)
    AddEntity = 0x0200,

    // NFTs (0x0300 - 0x03FF)
    NftAdd = 0x0300,
    NftMove = 0x0301,

    // Private data (0x0400 - 0x04FF)
    CreatePrivateDataTable = 0x0400,
    AddPrivateData = 0x0401,

    // Contracts (0x0500 - 0x05FF)
    ContractDeploy = 0x0500,
    ContractInstantiate = 0x0501,
    ContractInvoke = 0x0502,
    ContractInstanceDelete = 0x0503,
}

impl OperationKind {
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::CreateTable),
            0x0100 => Some(Self::AssetGen),
            0x0101 => Some(Self::AssetMove),
            0x0200 => Some(Self::AddEntity),
            0x0300 => Some(Self::NftAdd),
            0x0301 => Some(Self::NftMove),
            0x0400 => Some(Self::CreatePrivateDataTable),
            0x0401 => Some(Self::AddPrivateData),
            0x0500 => Some(Self::ContractDeploy),
            0x0501 => Some(Self::ContractInstantiate),
            0x0502 => Some(Self::ContractInvoke),
            0x0503 => Some(Self::ContractInstanceDelete),
            _ => None,
        }
    }

    pub fn is_private(self) -> bool {
        (self.to_u16() & 0xFF00) == 0x0400
    }

    pub fn is_contract(self) -> bool {
        (self.to_u16() & 0xFF00) == 0x0500
    }
}

/// Who is expected to sign an operation of a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignerRole {
    /// The ledger's table administrator.
    TableAdmin,
    /// The table administrator plus every designated private-data owner.
    TableAdminAndPdoMembers,
    /// An owner of the target table.
    TableOwner,
    /// A table owner plus every designated private-data owner.
    TableOwnerAndPdoMembers,
    /// The account assets are moved out of.
    SourceAccount,
    /// The current holder of the token.
    TokenHolder,
    /// The ledger's contract administrator.
    ContractAdmin,
    /// The table administrator plus the new instance's owner.
    TableAdminAndInstanceOwner,
    /// An owner of the contract instance.
    InstanceOwner,
    /// Decided by the contract method being invoked; may be nobody.
    CallerChosen,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::CreateTable { .. } => OperationKind::CreateTable,
            Operation::CreatePrivateDataTable { .. } => OperationKind::CreatePrivateDataTable,
            Operation::AssetGen { .. } => OperationKind::AssetGen,
            Operation::AssetMove { .. } => OperationKind::AssetMove,
            Operation::AddEntity { .. } => OperationKind::AddEntity,
            Operation::NftAdd { .. } => OperationKind::NftAdd,
            Operation::NftMove { .. } => OperationKind::NftMove,
            Operation::AddPrivateData { .. } => OperationKind::AddPrivateData,
            Operation::ContractDeploy { .. } => OperationKind::ContractDeploy,
            Operation::ContractInstantiate { .. } => OperationKind::ContractInstantiate,
            Operation::ContractInvoke { .. } => OperationKind::ContractInvoke,
            Operation::ContractInstanceDelete { .. } => OperationKind::ContractInstanceDelete,
        }
    }

    pub fn signer_role(&self) -> SignerRole {
        match self {
            Operation::CreateTable { .. } => SignerRole::TableAdmin,
            Operation::CreatePrivateDataTable { .. } => SignerRole::TableAdminAndPdoMembers,
            Operation::AssetGen { .. } => SignerRole::TableOwner,
            Operation::AssetMove { .. } => SignerRole::SourceAccount,
            Operation::AddEntity { .. } => SignerRole::TableOwner,
            Operation::NftAdd { .. } => SignerRole::TableOwner,
            Operation::NftMove { .. } => SignerRole::TokenHolder,
            Operation::AddPrivateData { .. } => SignerRole::TableOwnerAndPdoMembers,
            Operation::ContractDeploy { .. } => SignerRole::ContractAdmin,
            Operation::ContractInstantiate { .. } => SignerRole::TableAdminAndInstanceOwner,
            Operation::ContractInvoke { .. } => SignerRole::CallerChosen,
            Operation::ContractInstanceDelete { .. } => SignerRole::InstanceOwner,
        }
    }

    /// Private-data owners named by this operation (empty for public ones).
    pub fn pdo_members(&self) -> &[Address] {
        match self {
            Operation::CreatePrivateDataTable { pdo_members, .. }
            | Operation::AddPrivateData { pdo_members, .. } => pdo_members,
            _ => &[],
        }
    }

    /// Credentials of the private-data owners named by this operation.
    pub fn pdo_credentials(&self) -> impl Iterator<Item = SignatureCredential> + '_ {
        self.pdo_members()
            .iter()
            .filter_map(SignatureCredential::from_address)
    }

    pub fn is_private(&self) -> bool {
        self.kind().is_private()
    }

    /// Create a table with default flags.
    pub fn create_table(kind: TableKind, name: impl Into<String>, owners: Vec<Address>) -> Self {
        Operation::CreateTable {
            kind,
            name: name.into(),
            tracked: false,
            proof_enabled: false,
            owners,
        }
    }

    pub fn asset_gen(table: impl Into<String>, amount: u64, to: Address) -> Self {
        Operation::AssetGen {
            table: table.into(),
            amount,
            to,
        }
    }

    pub fn asset_move(table: impl Into<String>, amount: u64, from: Address, to: Address) -> Self {
        Operation::AssetMove {
            table: table.into(),
            amount,
            from,
            to,
        }
    }

    /// Invoke a contract method on a named instance.
    pub fn contract_invoke(
        assembly_id: Digest,
        contract_name: impl Into<String>,
        instance_name: impl Into<String>,
        method: impl Into<String>,
        params: Vec<String>,
    ) -> Self {
        Operation::ContractInvoke {
            assembly_id,
            contract_name: contract_name.into(),
            instance_name: instance_name.into(),
            method: method.into(),
            params,
        }
    }

    /// Address of the contract instance this operation targets, if any.
    pub fn contract_address(&self) -> Option<crate::address::ContractAddress> {
        match self {
            Operation::ContractInstantiate {
                assembly_id,
                contract_name,
                instance_name,
                ..
            }
            | Operation::ContractInvoke {
                assembly_id,
                contract_name,
                instance_name,
                ..
            }
            | Operation::ContractInstanceDelete {
                assembly_id,
                contract_name,
                instance_name,
            } => Some(crate::address::ContractAddress::derive(
                assembly_id,
                contract_name,
                instance_name,
            )),
            _ => None,
        }
    }
}

/// Derive a contract assembly id from its source files.
pub fn assembly_id(sources: &[String]) -> Digest {
    let parts: Vec<&[u8]> = sources.iter().map(|s| s.as_bytes()).collect();
    Digest::hash_parts(b"ledgertx-assembly-v0:", &parts)
}

/// Hashed commitment published in place of private data.
pub fn commitment(data: &[u8]) -> Digest {
    Digest::hash_parts(b"ledgertx-commit-v0:", &[data])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    const ALL_KINDS: [OperationKind; 12] = [
        OperationKind::CreateTable,
        OperationKind::AssetGen,
        OperationKind::AssetMove,
        OperationKind::AddEntity,
        OperationKind::NftAdd,
        OperationKind::NftMove,
        OperationKind::CreatePrivateDataTable,
        OperationKind::AddPrivateData,
        OperationKind::ContractDeploy,
        OperationKind::ContractInstantiate,
        OperationKind::ContractInvoke,
        OperationKind::ContractInstanceDelete,
    ];

    #[test]
    fn test_operation_kind_codes() {
        for kind in ALL_KINDS {
            assert_eq!(OperationKind::from_u16(kind.to_u16()), Some(kind));
        }
        assert_eq!(OperationKind::from_u16(0xFFFF), None);
    }

    #[test]
    fn test_operation_kind_groups() {
        assert!(OperationKind::AddPrivateData.is_private());
        assert!(OperationKind::CreatePrivateDataTable.is_private());
        assert!(!OperationKind::AssetMove.is_private());
        assert!(OperationKind::ContractInvoke.is_contract());
        assert!(!OperationKind::NftAdd.is_contract());
    }

    #[test]
    fn test_signer_roles() {
        let user = Address::from(&KeyPair::from_seed(&[0x10; 32]));
        assert_eq!(
            Operation::create_table(TableKind::Asset, "t", vec![user]).signer_role(),
            SignerRole::TableAdmin
        );
        assert_eq!(
            Operation::asset_move("t", 1, user, user).signer_role(),
            SignerRole::SourceAccount
        );
        assert_eq!(
            Operation::contract_invoke(Digest::hash(b"a"), "C", "I", "m", vec![]).signer_role(),
            SignerRole::CallerChosen
        );
    }

    #[test]
    fn test_pdo_credentials_skip_contract_addresses() {
        let pdo = KeyPair::from_seed(&[0x33; 32]);
        let contract = Address::from(crate::address::ContractAddress::derive(
            &Digest::hash(b"a"),
            "C",
            "I",
        ));
        let op = Operation::AddPrivateData {
            hashed_table: commitment(b"t"),
            hashed_key: commitment(b"k"),
            hashed_value: commitment(b"v"),
            row_owners: vec![],
            pdo_members: vec![Address::from(&pdo), contract],
        };
        let creds: Vec<_> = op.pdo_credentials().collect();
        assert_eq!(creds, vec![SignatureCredential::derive(&pdo)]);
        assert!(op.is_private());
    }

    #[test]
    fn test_assembly_id_depends_on_source_boundaries() {
        let a = assembly_id(&["ab".to_string(), "c".to_string()]);
        let b = assembly_id(&["a".to_string(), "bc".to_string()]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_contract_address_matches_across_operations() {
        let asm = Digest::hash(b"asm");
        let invoke = Operation::contract_invoke(asm, "C", "I", "m", vec![]);
        let delete = Operation::ContractInstanceDelete {
            assembly_id: asm,
            contract_name: "C".into(),
            instance_name: "I".into(),
        };
        assert_eq!(invoke.contract_address(), delete.contract_address());
        assert!(Operation::asset_gen("t", 1, Address::from(KeyPair::from_seed(&[1; 32]).public_key()))
            .contract_address()
            .is_none());
    }
}
