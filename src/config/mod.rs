//! Configuration
//!
//! - [`DevnetConfig`]: how the local chain is bootstrapped
//! - [`Deployments`]: contract addresses per chain id, the file front ends
//!   read to find the tokens and the exchange

use crate::chain::DEFAULT_CHAIN_ID;
use crate::core::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A token deployed at genesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpec {
    pub name: String,
    pub symbol: String,
    /// Supply in whole tokens (scaled by 10^18 at deployment)
    pub supply: String,
}

impl TokenSpec {
    pub fn new(name: &str, symbol: &str, supply: &str) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            supply: supply.to_string(),
        }
    }
}

/// Devnet bootstrap configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevnetConfig {
    pub chain_id: u64,
    /// Seed for deterministic signer keys
    pub seed: String,
    /// Number of signer accounts
    pub accounts: u32,
    /// Native currency per account, in whole units
    pub native_balance: String,
    /// Account index that receives exchange fees
    pub fee_account_index: u32,
    pub fee_percent: u8,
    pub tokens: Vec<TokenSpec>,
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            seed: "dapp-exchange devnet".to_string(),
            accounts: 10,
            native_balance: "10000".to_string(),
            fee_account_index: 1,
            fee_percent: 10,
            tokens: vec![
                TokenSpec::new("Dapp University", "DAPP", "1000000"),
                TokenSpec::new("mETH", "mETH", "1000000"),
                TokenSpec::new("mDAI", "mDAI", "1000000"),
            ],
        }
    }
}

impl DevnetConfig {
    /// Load from a JSON file; missing fields fall back to defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accounts < 2 {
            return Err(ConfigError::Invalid(
                "at least two accounts are required (deployer and fee account)".to_string(),
            ));
        }
        if self.fee_account_index >= self.accounts {
            return Err(ConfigError::Invalid(format!(
                "fee account index {} out of range (accounts: {})",
                self.fee_account_index, self.accounts
            )));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// A deployed contract address entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEntry {
    pub address: Address,
}

/// Contracts deployed on one network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDeployment {
    /// Exchange contract, if deployed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<ContractEntry>,
    /// Token contracts keyed by symbol
    #[serde(flatten)]
    pub tokens: BTreeMap<String, ContractEntry>,
}

impl NetworkDeployment {
    pub fn token(&self, symbol: &str) -> Option<Address> {
        self.tokens.get(symbol).map(|entry| entry.address)
    }
}

/// Deployments keyed by chain id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deployments(pub BTreeMap<String, NetworkDeployment>);

impl Deployments {
    pub fn network(&self, chain_id: u64) -> Option<&NetworkDeployment> {
        self.0.get(&chain_id.to_string())
    }

    pub fn insert(&mut self, chain_id: u64, deployment: NetworkDeployment) {
        self.0.insert(chain_id.to_string(), deployment);
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DevnetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chain_id, 31337);
        assert_eq!(config.fee_percent, 10);
        assert_eq!(config.tokens[0].symbol, "DAPP");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: DevnetConfig = serde_json::from_str(r#"{"chain_id": 5, "accounts": 3}"#).unwrap();
        assert_eq!(config.chain_id, 5);
        assert_eq!(config.accounts, 3);
        assert_eq!(config.fee_percent, 10);
    }

    #[test]
    fn test_invalid_fee_account_index() {
        let config = DevnetConfig {
            accounts: 2,
            fee_account_index: 2,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_deployments_json_shape() {
        let dapp = Address::parse("0x5fbdb2315678afecb367f032d93f642f64180aa3").unwrap();
        let exchange = Address::parse("0xe7f1725e7734ce288f8367e1bb143e90bb3f0512").unwrap();

        let mut network = NetworkDeployment {
            exchange: Some(ContractEntry { address: exchange }),
            ..Default::default()
        };
        network
            .tokens
            .insert("DApp".to_string(), ContractEntry { address: dapp });

        let mut deployments = Deployments::default();
        deployments.insert(31337, network);

        let json = serde_json::to_value(&deployments).unwrap();
        assert_eq!(json["31337"]["DApp"]["address"], dapp.to_hex());
        assert_eq!(json["31337"]["exchange"]["address"], exchange.to_hex());

        let back: Deployments = serde_json::from_value(json).unwrap();
        assert_eq!(back.network(31337).unwrap().token("DApp"), Some(dapp));
        assert!(back.network(1).is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devnet.json");
        let config = DevnetConfig {
            chain_id: 1337,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(DevnetConfig::load(&path).unwrap(), config);
    }
}
