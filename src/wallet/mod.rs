//! Wallet module for signer keys

pub mod wallet;

pub use wallet::{Keyring, Wallet, WalletError};
