//! Account identities
//!
//! An [`Address`] is a 20-byte identity that is never all zeros. The null
//! identity only exists as the [`Account::Null`] variant, and the native
//! chain currency only exists as the [`Asset::Native`] variant. Both encode
//! to the zero address on the wire.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of an address in bytes
pub const ADDRESS_LEN: usize = 20;

/// Hex form of the zero address
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Address parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address encoding: {0}")]
    InvalidHex(String),
    #[error("Invalid address length: expected {ADDRESS_LEN} bytes, got {0}")]
    InvalidLength(usize),
    #[error("The zero address is not a valid account")]
    ZeroAddress,
}

/// A non-null 20-byte account identity
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Build an address from raw bytes, rejecting the zero address
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Result<Self, AddressError> {
        if bytes.iter().all(|b| *b == 0) {
            return Err(AddressError::ZeroAddress);
        }
        Ok(Self(bytes))
    }

    /// Build an address from the first 20 bytes of a digest
    pub fn from_digest(digest: &[u8]) -> Result<Self, AddressError> {
        if digest.len() < ADDRESS_LEN {
            return Err(AddressError::InvalidLength(digest.len()));
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest[..ADDRESS_LEN]);
        Self::from_bytes(bytes)
    }

    /// Parse a `0x`-prefixed (or bare) hex address
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        Self::from_bytes(decode_hex(s)?)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

fn decode_hex(s: &str) -> Result<[u8; ADDRESS_LEN], AddressError> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let raw = hex::decode(digits).map_err(|_| AddressError::InvalidHex(s.to_string()))?;
    if raw.len() != ADDRESS_LEN {
        return Err(AddressError::InvalidLength(raw.len()));
    }
    let mut bytes = [0u8; ADDRESS_LEN];
    bytes.copy_from_slice(&raw);
    Ok(bytes)
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A possibly-null account, as supplied by callers for recipients and spenders
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Account {
    /// The null identity (zero address)
    Null,
    Address(Address),
}

impl Account {
    /// Parse a hex address, mapping the zero address to [`Account::Null`]
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        match Address::parse(s) {
            Ok(address) => Ok(Account::Address(address)),
            Err(AddressError::ZeroAddress) => Ok(Account::Null),
            Err(e) => Err(e),
        }
    }

    pub fn address(&self) -> Option<Address> {
        match self {
            Account::Null => None,
            Account::Address(address) => Some(*address),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Account::Null)
    }
}

impl From<Address> for Account {
    fn from(address: Address) -> Self {
        Account::Address(address)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Account::Null => f.write_str(ZERO_ADDRESS),
            Account::Address(address) => address.fmt(f),
        }
    }
}

impl FromStr for Account {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Account {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Account {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Account::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Identity of an asset held by the exchange
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Asset {
    /// The chain's native currency
    Native,
    /// A token ledger deployed at this address
    Token(Address),
}

impl Asset {
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        Ok(match Account::parse(s)? {
            Account::Null => Asset::Native,
            Account::Address(address) => Asset::Token(address),
        })
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => f.write_str(ZERO_ADDRESS),
            Asset::Token(address) => address.fmt(f),
        }
    }
}

impl FromStr for Asset {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Asset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Asset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Asset::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

    #[test]
    fn test_parse_address() {
        let address = Address::parse(ALICE).unwrap();
        assert_eq!(address.to_hex(), ALICE);
        assert_eq!(Address::parse(&ALICE[2..]).unwrap(), address);
        assert_eq!(Address::parse(&ALICE.to_uppercase().replace("0X", "0x")).unwrap(), address);
    }

    #[test]
    fn test_zero_address_is_not_an_address() {
        assert_eq!(Address::parse(ZERO_ADDRESS), Err(AddressError::ZeroAddress));
        assert_eq!(Account::parse(ZERO_ADDRESS).unwrap(), Account::Null);
        assert_eq!(Asset::parse(ZERO_ADDRESS).unwrap(), Asset::Native);
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(matches!(
            Address::parse("0x1234"),
            Err(AddressError::InvalidLength(2))
        ));
        assert!(matches!(
            Address::parse("0xzz997970c51812dc3a010c7d01b50e0d17dc79c8"),
            Err(AddressError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_serde_as_strings() {
        let account = Account::parse(ALICE).unwrap();
        let json = serde_json::to_string(&account).unwrap();
        assert_eq!(json, format!("\"{}\"", ALICE));

        let null: Account = serde_json::from_str(&format!("\"{}\"", ZERO_ADDRESS)).unwrap();
        assert!(null.is_null());

        let native = serde_json::to_string(&Asset::Native).unwrap();
        assert_eq!(native, format!("\"{}\"", ZERO_ADDRESS));
    }

    #[test]
    fn test_address_as_map_key() {
        let mut map = std::collections::HashMap::new();
        map.insert(Address::parse(ALICE).unwrap(), 5u64);
        let json = serde_json::to_string(&map).unwrap();
        let back: std::collections::HashMap<Address, u64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
