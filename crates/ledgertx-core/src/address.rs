//! Addresses and signature credentials.
//!
//! An [`Address`] names a signer, an account, or a table/contract owner. A
//! [`SignatureCredential`] names a public key that must sign a transaction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{Digest, KeyPair, PrivateKey, PublicKey};
use crate::error::CodecError;

const TAG_PUBLIC_KEY: u8 = 0x01;
const TAG_CONTRACT: u8 = 0x02;

/// Encoded length of an address: one tag byte plus 32 bytes.
pub const ADDRESS_LEN: usize = 33;

/// Address of a deployed contract instance.
///
/// Derived from Blake3(domain || assembly_id || contract_name || instance_name).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractAddress(pub Digest);

impl ContractAddress {
    pub fn derive(assembly_id: &Digest, contract_name: &str, instance_name: &str) -> Self {
        Self(Digest::hash_parts(
            b"ledgertx-contract-v0:",
            &[
                assembly_id.as_bytes(),
                contract_name.as_bytes(),
                instance_name.as_bytes(),
            ],
        ))
    }
}

impl fmt::Debug for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractAddress({})", &self.0.to_hex()[..16])
    }
}

/// An address on the ledger. Immutable once constructed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Address {
    PublicKey(PublicKey),
    Contract(ContractAddress),
}

impl Address {
    /// Canonical byte form: tag byte followed by 32 bytes.
    pub fn to_bytes(&self) -> [u8; ADDRESS_LEN] {
        let mut out = [0u8; ADDRESS_LEN];
        match self {
            Address::PublicKey(pk) => {
                out[0] = TAG_PUBLIC_KEY;
                out[1..].copy_from_slice(pk.as_bytes());
            }
            Address::Contract(ca) => {
                out[0] = TAG_CONTRACT;
                out[1..].copy_from_slice(ca.0.as_bytes());
            }
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() != ADDRESS_LEN {
            return Err(CodecError::InvalidLength {
                expected: ADDRESS_LEN,
                got: bytes.len(),
            });
        }
        let mut body = [0u8; 32];
        body.copy_from_slice(&bytes[1..]);
        match bytes[0] {
            TAG_PUBLIC_KEY => Ok(Address::PublicKey(PublicKey(body))),
            TAG_CONTRACT => Ok(Address::Contract(ContractAddress(Digest(body)))),
            tag => Err(CodecError::Malformed(format!("unknown address tag {tag:#04x}"))),
        }
    }

    pub fn encode(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn decode(s: &str) -> Result<Self, CodecError> {
        Self::from_bytes(&hex::decode(s)?)
    }

    /// The public key behind this address, if it is a key address.
    pub fn public_key(&self) -> Option<&PublicKey> {
        match self {
            Address::PublicKey(pk) => Some(pk),
            Address::Contract(_) => None,
        }
    }
}

impl From<PublicKey> for Address {
    fn from(pk: PublicKey) -> Self {
        Address::PublicKey(pk)
    }
}

impl From<&KeyPair> for Address {
    fn from(keypair: &KeyPair) -> Self {
        Address::PublicKey(keypair.public_key())
    }
}

impl From<ContractAddress> for Address {
    fn from(ca: ContractAddress) -> Self {
        Address::Contract(ca)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::PublicKey(pk) => write!(f, "Address::{:?}", pk),
            Address::Contract(ca) => write!(f, "Address::{:?}", ca),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// A public key that must be matched by a signature before a transaction is
/// valid. Two credentials are equal iff their public keys are equal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SignatureCredential(pub PublicKey);

impl SignatureCredential {
    pub const fn new(public_key: PublicKey) -> Self {
        Self(public_key)
    }

    pub fn derive(keypair: &KeyPair) -> Self {
        Self(keypair.public_key())
    }

    pub fn from_private(private_key: &PrivateKey) -> Self {
        Self(private_key.public_key())
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.0
    }

    pub fn encode(&self) -> String {
        self.0.to_hex()
    }

    pub fn decode(s: &str) -> Result<Self, CodecError> {
        PublicKey::from_hex(s).map(Self)
    }

    /// The credential matching a key address; contract addresses cannot sign.
    pub fn from_address(address: &Address) -> Option<Self> {
        address.public_key().copied().map(Self)
    }
}

impl From<PublicKey> for SignatureCredential {
    fn from(pk: PublicKey) -> Self {
        Self(pk)
    }
}

impl fmt::Debug for SignatureCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", &self.0.to_hex()[..16])
    }
}

impl fmt::Display for SignatureCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_is_pure_function_of_public_key() {
        let a = KeyPair::from_seed(&[0x01; 32]);
        let b = KeyPair::from_seed(&[0x01; 32]);
        assert_eq!(SignatureCredential::derive(&a), SignatureCredential::derive(&b));
        assert_eq!(
            SignatureCredential::derive(&a),
            SignatureCredential::from_private(a.private_key())
        );
    }

    #[test]
    fn test_address_encode_decode() {
        let kp = KeyPair::from_seed(&[0x10; 32]);
        let key_addr = Address::from(&kp);
        assert_eq!(Address::decode(&key_addr.encode()).unwrap(), key_addr);

        let contract = Address::from(ContractAddress::derive(
            &Digest::hash(b"assembly"),
            "Sample",
            "instance",
        ));
        assert_eq!(Address::decode(&contract.encode()).unwrap(), contract);
        assert_ne!(contract.to_bytes()[0], key_addr.to_bytes()[0]);
    }

    #[test]
    fn test_address_unknown_tag() {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[0] = 0x7f;
        assert!(matches!(Address::from_bytes(&bytes), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_contract_address_cannot_sign() {
        let contract = Address::from(ContractAddress::derive(&Digest::hash(b"asm"), "c", "i"));
        assert!(SignatureCredential::from_address(&contract).is_none());
    }

    #[test]
    fn test_credential_decode() {
        let kp = KeyPair::from_seed(&[0x20; 32]);
        let cred = SignatureCredential::derive(&kp);
        assert_eq!(SignatureCredential::decode(&cred.encode()).unwrap(), cred);
    }
}
