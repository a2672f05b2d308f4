//! Hash newtypes for ledger transactions and anchor payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte transaction hash returned by the ledger.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash([u8; 32]);

impl TxHash {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse a 64-character lowercase hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let raw = hex::decode(s)?;
        let bytes: [u8; 32] = raw.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// Blake2b-256 content hash of a canonical anchor payload.
///
/// Doubles as the idempotency key for ledger submission: two payloads
/// with identical canonical encodings hash to the same key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayloadHash([u8; 32]);

impl PayloadHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a 64-character lowercase hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let raw = hex::decode(s)?;
        let bytes: [u8; 32] = raw.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Debug for PayloadHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PayloadHash({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for PayloadHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

// Inline hex codec to avoid adding the `hex` crate as a dependency of types.
mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn decode(s: &str) -> Option<Vec<u8>> {
        if s.len() % 2 != 0 {
            return None;
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_hash_displays_as_full_hex() {
        let hash = TxHash::new([0xab; 32]);
        assert_eq!(hash.to_string(), "ab".repeat(32));
    }

    #[test]
    fn tx_hash_parses_its_own_display() {
        let hash = TxHash::new([7u8; 32]);
        assert_eq!(TxHash::from_hex(&hash.to_string()), Some(hash));
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert_eq!(TxHash::from_hex("zz"), None);
        assert_eq!(TxHash::from_hex("abcd"), None);
        assert_eq!(TxHash::from_hex(&"g".repeat(64)), None);
    }

    #[test]
    fn zero_hash_is_zero() {
        assert!(TxHash::ZERO.is_zero());
        assert!(!TxHash::new([1u8; 32]).is_zero());
    }
}
