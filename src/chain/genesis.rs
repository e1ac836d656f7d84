//! Devnet bootstrap
//!
//! Builds a fresh chain from a [`DevnetConfig`]: deterministic signer
//! accounts funded with native currency, the configured tokens deployed by
//! account 0, and the exchange.

use crate::chain::state::{ChainError, ChainState};
use crate::config::{ConfigError, ContractEntry, Deployments, DevnetConfig, NetworkDeployment};
use crate::core::{parse_units, UnitsError, DECIMALS};
use crate::wallet::{Keyring, WalletError};
use thiserror::Error;

/// Genesis errors
#[derive(Error, Debug)]
pub enum GenesisError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error("Invalid amount in config: {0}")]
    Units(#[from] UnitsError),
}

/// Everything a freshly bootstrapped devnet consists of
#[derive(Debug)]
pub struct Devnet {
    pub state: ChainState,
    pub keyring: Keyring,
    pub deployments: Deployments,
}

/// Build the devnet described by `config`
pub fn devnet(config: &DevnetConfig) -> Result<Devnet, GenesisError> {
    config.validate()?;

    let keyring = Keyring::from_seed(&config.seed, config.accounts)?;
    let accounts = keyring.addresses();
    let deployer = accounts[0];
    let fee_account = accounts[config.fee_account_index as usize];

    let mut state = ChainState::new(config.chain_id);
    let native = parse_units(&config.native_balance, DECIMALS)?;
    for account in &accounts {
        state.fund(*account, native)?;
    }

    let mut network = NetworkDeployment::default();
    for spec in &config.tokens {
        let supply = parse_units(&spec.supply, DECIMALS)?;
        let token = state.deploy_token(deployer, &spec.name, &spec.symbol, supply)?;
        network
            .tokens
            .insert(spec.symbol.clone(), ContractEntry { address: token.address });
    }

    let exchange = state.deploy_exchange(deployer, fee_account, config.fee_percent)?;
    network.exchange = Some(ContractEntry { address: exchange });

    let mut deployments = Deployments::default();
    deployments.insert(config.chain_id, network);

    log::info!(
        "Devnet {} ready: {} accounts, {} tokens, exchange at {}",
        config.chain_id,
        accounts.len(),
        config.tokens.len(),
        exchange
    );

    Ok(Devnet {
        state,
        keyring,
        deployments,
    })
}
