//! Wallet/provider adapter
//!
//! The [`Provider`] trait is everything a front end needs from a wallet:
//! the network it is on, the accounts it can sign for, read access to
//! contract state, and a way to submit calls and get their receipts.
//! [`LocalProvider`] implements it in-process over a [`ChainHandle`].

use crate::chain::{Call, ChainError, ChainHandle, Receipt};
use crate::core::{Address, Asset};
use crate::token::TokenError;
use crate::wallet::{Keyring, WalletError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};

/// Provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("No exchange at {0}")]
    ExchangeNotFound(Address),
}

/// Read-only token description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(with = "crate::core::event::amount_string")]
    pub total_supply: u128,
}

/// Read-only exchange description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeInfo {
    pub address: Address,
    pub fee_account: Address,
    pub fee_percent: u8,
}

/// A connection to a chain plus a set of signers
pub trait Provider {
    fn chain_id(&self) -> impl Future<Output = Result<u64, ProviderError>> + Send;

    /// Accounts the provider can sign for, primary account first
    fn accounts(&self) -> impl Future<Output = Result<Vec<Address>, ProviderError>> + Send;

    fn native_balance(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<u128, ProviderError>> + Send;

    fn token_info(
        &self,
        token: Address,
    ) -> impl Future<Output = Result<TokenInfo, ProviderError>> + Send;

    fn balance_of(
        &self,
        token: Address,
        account: Address,
    ) -> impl Future<Output = Result<u128, ProviderError>> + Send;

    fn exchange_info(
        &self,
        exchange: Address,
    ) -> impl Future<Output = Result<ExchangeInfo, ProviderError>> + Send;

    /// Deposit record of `account` for `asset` on the exchange
    fn exchange_balance(
        &self,
        exchange: Address,
        asset: Asset,
        account: Address,
    ) -> impl Future<Output = Result<u128, ProviderError>> + Send;

    /// Sign `call` as `from`, submit it and wait for the receipt
    fn send(
        &self,
        from: Address,
        call: Call,
    ) -> impl Future<Output = Result<Receipt, ProviderError>> + Send;

    /// Receipts of calls applied after subscribing
    fn subscribe(&self) -> broadcast::Receiver<Receipt>;
}

/// In-process provider backed by a [`ChainHandle`] and a [`Keyring`]
#[derive(Clone)]
pub struct LocalProvider {
    chain: ChainHandle,
    keyring: Arc<Keyring>,
    /// Held across nonce lookup and submission so concurrent sends from
    /// one provider never race for the same nonce
    send_lock: Arc<Mutex<()>>,
}

impl LocalProvider {
    pub fn new(chain: ChainHandle, keyring: Keyring) -> Self {
        Self {
            chain,
            keyring: Arc::new(keyring),
            send_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn chain(&self) -> &ChainHandle {
        &self.chain
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }
}

impl Provider for LocalProvider {
    async fn chain_id(&self) -> Result<u64, ProviderError> {
        Ok(self.chain.read().await.chain_id)
    }

    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        Ok(self.keyring.addresses())
    }

    async fn native_balance(&self, account: Address) -> Result<u128, ProviderError> {
        Ok(self.chain.read().await.native_balance(&account))
    }

    async fn token_info(&self, token: Address) -> Result<TokenInfo, ProviderError> {
        let state = self.chain.read().await;
        let token = state.tokens.require(&token)?;
        Ok(TokenInfo {
            address: token.address,
            name: token.name().to_string(),
            symbol: token.symbol().to_string(),
            decimals: token.decimals(),
            total_supply: token.total_supply(),
        })
    }

    async fn balance_of(&self, token: Address, account: Address) -> Result<u128, ProviderError> {
        Ok(self.chain.read().await.tokens.balance_of(&token, &account)?)
    }

    async fn exchange_info(&self, exchange: Address) -> Result<ExchangeInfo, ProviderError> {
        let state = self.chain.read().await;
        match state.exchange() {
            Some(ex) if ex.address == exchange => Ok(ExchangeInfo {
                address: ex.address,
                fee_account: ex.fee_account(),
                fee_percent: ex.fee_percent(),
            }),
            _ => Err(ProviderError::ExchangeNotFound(exchange)),
        }
    }

    async fn exchange_balance(
        &self,
        exchange: Address,
        asset: Asset,
        account: Address,
    ) -> Result<u128, ProviderError> {
        let state = self.chain.read().await;
        match state.exchange() {
            Some(ex) if ex.address == exchange => Ok(ex.tokens(&asset, &account)),
            _ => Err(ProviderError::ExchangeNotFound(exchange)),
        }
    }

    async fn send(&self, from: Address, call: Call) -> Result<Receipt, ProviderError> {
        let wallet = self.keyring.require(&from)?;
        let _guard = self.send_lock.lock().await;

        let (chain_id, nonce) = {
            let state = self.chain.read().await;
            (state.chain_id, state.nonce(&from))
        };
        let signed = wallet.sign_call(chain_id, nonce, call)?;
        Ok(self.chain.submit(&signed).await?)
    }

    fn subscribe(&self) -> broadcast::Receiver<Receipt> {
        self.chain.subscribe()
    }
}
