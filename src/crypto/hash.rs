//! Hashing utilities
//!
//! SHA-256 backs transaction hashes, signing digests and contract address
//! derivation.

use crate::core::{Address, AddressError};
use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Derive the address of a contract deployed by `deployer`
///
/// The address is the first 20 bytes of `SHA-256(deployer:label:nonce)`.
pub fn contract_address(
    deployer: &Address,
    label: &str,
    nonce: u64,
) -> Result<Address, AddressError> {
    let input = format!("{}:{}:{}", deployer, label, nonce);
    Address::from_digest(&sha256(input.as_bytes()))
}
