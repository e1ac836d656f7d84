//! Signer wallets
//!
//! A [`Wallet`] holds one key pair and signs transactions. A [`Keyring`]
//! holds the ordered set of signers a provider exposes as its accounts.

use crate::chain::{Call, SignedTransaction, Transaction};
use crate::core::Address;
use crate::crypto::{KeyError, KeyPair};
use thiserror::Error;

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Unknown signer: {0}")]
    UnknownSigner(String),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

/// A single signer
#[derive(Clone)]
pub struct Wallet {
    key_pair: KeyPair,
    address: Address,
    pub label: Option<String>,
}

impl Wallet {
    /// Create a new wallet with a fresh key pair
    pub fn new() -> Result<Self, WalletError> {
        Self::from_key_pair(KeyPair::generate(), None)
    }

    pub fn from_key_pair(key_pair: KeyPair, label: Option<String>) -> Result<Self, WalletError> {
        let address = key_pair.address()?;
        Ok(Self {
            key_pair,
            address,
            label,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Get the wallet's private key (hex)
    /// WARNING: Keep this secret!
    pub fn private_key(&self) -> String {
        self.key_pair.private_key_hex()
    }

    /// Build and sign a transaction for `call`
    pub fn sign_call(&self, chain_id: u64, nonce: u64, call: Call) -> Result<SignedTransaction, WalletError> {
        Ok(Transaction::new(chain_id, nonce, call).sign(&self.key_pair)?)
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("label", &self.label)
            .finish()
    }
}

/// Ordered set of signers
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    wallets: Vec<Wallet>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive `count` deterministic signers from `seed`
    pub fn from_seed(seed: &str, count: u32) -> Result<Self, WalletError> {
        let mut keyring = Self::new();
        for index in 0..count {
            let key_pair = KeyPair::from_seed(seed, index)?;
            keyring.add(Wallet::from_key_pair(key_pair, Some(format!("account {}", index)))?);
        }
        Ok(keyring)
    }

    pub fn add(&mut self, wallet: Wallet) {
        if self.get(&wallet.address()).is_none() {
            self.wallets.push(wallet);
        }
    }

    pub fn get(&self, address: &Address) -> Option<&Wallet> {
        self.wallets.iter().find(|w| w.address() == *address)
    }

    pub fn require(&self, address: &Address) -> Result<&Wallet, WalletError> {
        self.get(address)
            .ok_or_else(|| WalletError::UnknownSigner(address.to_string()))
    }

    pub fn by_index(&self, index: usize) -> Option<&Wallet> {
        self.wallets.get(index)
    }

    /// Resolve a signer given either an account index or an address
    pub fn resolve(&self, signer: &str) -> Result<&Wallet, WalletError> {
        if let Ok(index) = signer.parse::<usize>() {
            return self
                .by_index(index)
                .ok_or_else(|| WalletError::UnknownSigner(signer.to_string()));
        }
        let address =
            Address::parse(signer).map_err(|_| WalletError::UnknownSigner(signer.to_string()))?;
        self.require(&address)
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.wallets.iter().map(|w| w.address()).collect()
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::DEFAULT_CHAIN_ID;
    use crate::core::{tokens, Asset};

    #[test]
    fn test_wallet_from_key_pair() {
        let key_pair = KeyPair::generate();
        let wallet = Wallet::from_key_pair(key_pair.clone(), Some("Trader".to_string())).unwrap();
        assert_eq!(wallet.address(), key_pair.address().unwrap());
        assert_eq!(wallet.private_key(), key_pair.private_key_hex());
        assert_eq!(wallet.label.as_deref(), Some("Trader"));
    }

    #[test]
    fn test_signed_call_recovers_to_wallet() {
        let wallet = Wallet::new().unwrap();
        let signed = wallet
            .sign_call(
                DEFAULT_CHAIN_ID,
                0,
                Call::DepositToken {
                    token: Asset::Native,
                    amount: tokens(1),
                },
            )
            .unwrap();
        assert_eq!(signed.recover_signer().unwrap(), wallet.address());
    }

    #[test]
    fn test_keyring_from_seed() {
        let keyring = Keyring::from_seed("keyring-test", 3).unwrap();
        assert_eq!(keyring.len(), 3);

        let second = keyring.by_index(1).unwrap().address();
        assert_eq!(keyring.resolve("1").unwrap().address(), second);
        assert_eq!(keyring.resolve(&second.to_hex()).unwrap().address(), second);
        assert!(keyring.resolve("7").is_err());
        assert!(keyring.resolve("not-an-address").is_err());

        let again = Keyring::from_seed("keyring-test", 3).unwrap();
        assert_eq!(again.addresses(), keyring.addresses());
    }
}
