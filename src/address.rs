//! Canonical 20-byte checksum-cased account/token addresses.
//!
//! Every public entry point that accepts an address argument normalizes it through
//! [`Address::parse_checksum`] before use; this is the single guard applied at the interface
//! boundary that the distillation source expressed as a per-method decorator (see SPEC_FULL.md
//! §9). A token is also an account, so the same type names both.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::error::LedgerError;

/// A canonical 20-byte address, displayed and parsed in checksum-cased hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(#[serde(with = "hex_bytes")] [u8; 20]);

impl Address {
    /// Builds an address directly from raw bytes, skipping hex parsing. Used internally and by
    /// tests that construct addresses from fixed byte patterns.
    pub fn from_bytes(bytes: [u8; 20]) -> Address {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parses a `0x`-prefixed or bare hex string, requiring correct checksum casing, and returns
    /// the canonical `Address`. Rejects anything that is not exactly 20 bytes of hex.
    pub fn parse_checksum(s: &str) -> Result<Address, LedgerError> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed)
            .map_err(|_| LedgerError::validation(format!("address is not valid hex: {s}")))?;
        let array: [u8; 20] = bytes.as_slice().try_into().map_err(|_| {
            LedgerError::validation(format!(
                "address must be exactly 20 bytes, got {} bytes: {s}",
                bytes.len()
            ))
        })?;
        let candidate = Address(array);
        let expected = candidate.to_checksum_hex();
        let lower = expected.to_ascii_lowercase();
        let upper = expected.to_ascii_uppercase();
        let full_input = if s.starts_with("0x") || s.starts_with("0X") {
            s.to_string()
        } else {
            format!("0x{trimmed}")
        };
        if full_input != expected && full_input != lower && full_input != upper {
            return Err(LedgerError::validation(format!(
                "address checksum mismatch for {s}, expected {expected}"
            )));
        }
        Ok(candidate)
    }

    /// Renders the address in EIP-55-style checksum casing: each hex digit that is a letter is
    /// uppercased iff the corresponding nibble of `keccak256(lowercase_hex_ascii)` is >= 8.
    pub fn to_checksum_hex(&self) -> String {
        let lower_hex = hex::encode(self.0);
        let digest = Keccak256::digest(lower_hex.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower_hex.chars().enumerate() {
            if c.is_ascii_alphabetic() {
                let byte = digest[i / 2];
                let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
                if nibble >= 8 {
                    out.push(c.to_ascii_uppercase());
                } else {
                    out.push(c);
                }
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_checksum_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum_hex())
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 20], s: S) -> Result<S::Ok, S::Error> {
        hex::encode(bytes).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 20], D::Error> {
        let s = String::deserialize(d)?;
        let trimmed = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(trimmed).map_err(serde::de::Error::custom)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| serde::de::Error::custom("address must be 20 bytes"))
    }
}
