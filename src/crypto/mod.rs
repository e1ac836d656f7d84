//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 hashing and contract address derivation
//! - ECDSA key management (secp256k1) and account addresses

pub mod hash;
pub mod keys;

pub use hash::{contract_address, sha256, sha256_hex};
pub use keys::{
    public_key_from_hex, public_key_to_address, sign_message, verify_signature, KeyError, KeyPair,
};
