//! Strong type definitions for LedgerTx.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::fixed_bytes;
use crate::error::CodecError;

/// Domain tag prepended to the canonical body when computing a transaction id.
pub const ID_DOMAIN: &[u8] = b"ledgertx-id-v0:";

/// Domain tag prepended to every signed message.
pub const SIGN_DOMAIN: &[u8] = b"ledgertx-sign-v0:";

/// A 32-byte transaction identifier.
///
/// Computed as `Blake3(ID_DOMAIN || canonical_body_bytes)`, where the body
/// holds only the operations and the required-credential set. Attaching
/// evidence or signatures never changes it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(#[serde(with = "fixed_bytes")] pub [u8; 32]);

impl TransactionId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CodecError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| CodecError::InvalidLength {
            expected: 32,
            got: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// The zero id (used as a sentinel).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for TransactionId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for TransactionId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for TransactionId {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_id_hex_roundtrip() {
        let id = TransactionId::from_bytes([0x42; 32]);
        let recovered = TransactionId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_transaction_id_display_is_short() {
        let id = TransactionId::from_bytes([0xab; 32]);
        assert_eq!(format!("{}", id), "abababababababab");
    }

    #[test]
    fn test_transaction_id_from_hex_wrong_length() {
        assert!(matches!(
            TransactionId::from_hex("abab"),
            Err(CodecError::InvalidLength { expected: 32, got: 2 })
        ));
    }
}
