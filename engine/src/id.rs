//! Stable 16-byte identifiers (C2): entity ids, attribute ids, and their
//! hex rendering.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An opaque 16-byte identifier, rendered textually as 32 lowercase hex
/// characters. Used both for entity ids (random) and attribute ids
/// (deterministic hash of `entityName/fieldName`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Id(pub [u8; 16]);

impl Id {
    /// 16 random bytes from a cryptographically strong source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Id(bytes)
    }

    /// Deterministic 128-bit hash of `"entityName/fieldName"`. Equal inputs
    /// always produce equal bytes; distinct inputs differ with overwhelming
    /// probability. Built from two 64-bit non-cryptographic hashes of the
    /// same input with distinct seeds, concatenated.
    pub fn attribute(entity_name: &str, field_name: &str) -> Self {
        let path = format!("{entity_name}/{field_name}");
        let high = fnv1a_64(path.as_bytes(), FNV_SEED_HIGH);
        let low = fnv1a_64(path.as_bytes(), FNV_SEED_LOW);
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&high.to_be_bytes());
        bytes[8..].copy_from_slice(&low.to_be_bytes());
        Id(bytes)
    }

    pub fn to_hex(self) -> String {
        bytes_to_hex(&self.0)
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        let bytes = hex_to_bytes(hex)?;
        Ok(Id(bytes))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.to_hex())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        id.to_hex()
    }
}

impl TryFrom<String> for Id {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Id::from_hex(&value)
    }
}

/// A 32-bit node identifier distinguishing HLC instances. Generated from a
/// cryptographic RNG at construction; two distinct instances must produce
/// distinct ids with negligible collision probability.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn generate() -> Self {
        NodeId(rand::rngs::OsRng.next_u32())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({:08x})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

const FNV_SEED_HIGH: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_SEED_LOW: u64 = 0x1000_0000_01b3_fb47;
const FNV_PRIME: u64 = 0x1000_0000_01b3;

fn fnv1a_64(bytes: &[u8], seed: u64) -> u64 {
    let mut hash = seed;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// 16 bytes -> 32 lowercase hex characters.
pub fn bytes_to_hex(bytes: &[u8; 16]) -> String {
    let mut out = String::with_capacity(32);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// 32 hex characters -> 16 bytes. Strict length check.
pub fn hex_to_bytes(hex: &str) -> Result<[u8; 16]> {
    if hex.len() != 32 {
        return Err(Error::validation(format!(
            "identifier must be 32 hex characters, got {}",
            hex.len()
        )));
    }
    let mut bytes = [0u8; 16];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let s = std::str::from_utf8(chunk)
            .map_err(|_| Error::validation("identifier is not valid hex"))?;
        bytes[i] = u8::from_str_radix(s, 16)
            .map_err(|_| Error::validation("identifier is not valid hex"))?;
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ids_are_random() {
        let a = Id::generate();
        let b = Id::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn attribute_id_determinism() {
        let a = Id::attribute("users", "name");
        let b = Id::attribute("users", "name");
        assert_eq!(a, b);
    }

    #[test]
    fn attribute_id_distinctness_corpus() {
        let mut seen = std::collections::HashSet::new();
        for i in 0..1000 {
            let id = Id::attribute("entity", &format!("field_{i}"));
            assert!(seen.insert(id), "collision at field_{i}");
        }
    }

    #[test]
    fn hex_round_trip() {
        let id = Id::generate();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 32);
        let back = Id::from_hex(&hex).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn hex_strict_length() {
        assert!(Id::from_hex("abc").is_err());
        assert!(Id::from_hex(&"a".repeat(33)).is_err());
    }
}
