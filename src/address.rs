//! 20-byte address hash newtype shared by every assembler and locking
//! condition that needs to construct, compare or print an address.
//!
//! Derivation from a public key is not performed here — that is the
//! `AddressManager` capability's job — this type only carries the
//! already-derived bytes and their hex wire form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const ADDRESS_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(#[serde(with = "serde_bytes_array")] [u8; ADDRESS_LEN]);

impl Address {
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)
            .map_err(|e| CoreError::FormatInvalid(format!("invalid address hex: {e}")))?;
        let array: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| CoreError::FormatInvalid(format!("address must be {ADDRESS_LEN} bytes")))?;
        Ok(Address(array))
    }
}

/// `serde` doesn't derive `Serialize`/`Deserialize` for `[u8; 20]` directly
/// in a way that round-trips through non-self-describing formats like
/// `bincode`, so we hand it a fixed-size byte-array helper.
mod serde_bytes_array {
    use serde::de::Error;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; super::ADDRESS_LEN], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; super::ADDRESS_LEN], D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = serde::Deserialize::deserialize(deserializer)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("address must be exactly 20 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trips() {
        let addr = Address::from_bytes([7u8; ADDRESS_LEN]);
        let rendered = addr.to_string();
        assert_eq!(rendered.len(), ADDRESS_LEN * 2);
        assert_eq!(addr, rendered.parse().unwrap());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("aabb".parse::<Address>().is_err());
    }
}
