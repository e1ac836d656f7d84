//! Front-end session store
//!
//! Mirrors what a dApp front end keeps in memory: which network and account
//! it is connected to, the loaded token pair, the exchange, and the exchange
//! events seen so far. State only changes through [`Store::dispatch`].
//!
//! The `load_*` functions query a [`Provider`] and dispatch the results, in
//! the order a front end runs them on startup (see [`load_blockchain_data`]).

use crate::chain::Receipt;
use crate::config::Deployments;
use crate::core::{Address, Event};
use crate::provider::provider::{ExchangeInfo, Provider, ProviderError, TokenInfo};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Market loaded when nothing else is asked for
pub const DEFAULT_MARKET: [&str; 2] = ["DAPP", "mETH"];

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("No deployments for chain {0}")]
    UnknownNetwork(u64),
    #[error("Token {symbol} not deployed on chain {chain_id}")]
    UnknownToken { symbol: String, chain_id: u64 },
    #[error("No exchange deployed on chain {0}")]
    NoExchange(u64),
    #[error("Provider has no accounts")]
    NoAccounts,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderState {
    pub connected: bool,
    pub chain_id: Option<u64>,
    pub account: Option<Address>,
    #[serde(with = "option_amount")]
    pub balance: Option<u128>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokensState {
    pub loaded: bool,
    pub contracts: Vec<TokenInfo>,
}

impl TokensState {
    pub fn symbols(&self) -> Vec<&str> {
        self.contracts.iter().map(|t| t.symbol.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExchangeState {
    pub loaded: bool,
    pub contract: Option<ExchangeInfo>,
    pub events: Vec<Event>,
}

/// Everything the session knows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Store {
    pub provider: ProviderState,
    pub tokens: TokensState,
    pub exchange: ExchangeState,
}

/// State transitions of the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ProviderLoaded,
    NetworkLoaded(u64),
    AccountLoaded(Address),
    BalanceLoaded(u128),
    TokensLoaded(Vec<TokenInfo>),
    ExchangeLoaded(ExchangeInfo),
    ExchangeEvent(Event),
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&mut self, action: Action) {
        log::debug!("dispatch {:?}", action);
        match action {
            Action::ProviderLoaded => self.provider.connected = true,
            Action::NetworkLoaded(chain_id) => self.provider.chain_id = Some(chain_id),
            Action::AccountLoaded(account) => {
                self.provider.account = Some(account);
                self.provider.balance = None;
            }
            Action::BalanceLoaded(balance) => self.provider.balance = Some(balance),
            Action::TokensLoaded(contracts) => {
                self.tokens.loaded = true;
                self.tokens.contracts = contracts;
            }
            Action::ExchangeLoaded(contract) => {
                self.exchange.loaded = true;
                self.exchange.contract = Some(contract);
                self.exchange.events.clear();
            }
            Action::ExchangeEvent(event) => self.exchange.events.push(event),
        }
    }

    /// Dispatch every event of `receipt` emitted by the loaded exchange
    pub fn apply_receipt(&mut self, receipt: &Receipt) {
        let Some(exchange) = self.exchange.contract.map(|c| c.address) else {
            return;
        };
        for event in &receipt.events {
            if event.emitter() == exchange {
                self.dispatch(Action::ExchangeEvent(event.clone()));
            }
        }
    }
}

pub fn load_provider(store: &mut Store) {
    store.dispatch(Action::ProviderLoaded);
}

pub async fn load_network<P: Provider>(provider: &P, store: &mut Store) -> Result<u64, SessionError> {
    let chain_id = provider.chain_id().await?;
    store.dispatch(Action::NetworkLoaded(chain_id));
    Ok(chain_id)
}

/// Load the provider's primary account and its native balance
pub async fn load_account<P: Provider>(provider: &P, store: &mut Store) -> Result<Address, SessionError> {
    let account = provider
        .accounts()
        .await?
        .first()
        .copied()
        .ok_or(SessionError::NoAccounts)?;
    store.dispatch(Action::AccountLoaded(account));

    let balance = provider.native_balance(account).await?;
    store.dispatch(Action::BalanceLoaded(balance));
    Ok(account)
}

pub async fn load_tokens<P: Provider>(
    provider: &P,
    addresses: &[Address],
    store: &mut Store,
) -> Result<(), SessionError> {
    let mut contracts = Vec::with_capacity(addresses.len());
    for address in addresses {
        contracts.push(provider.token_info(*address).await?);
    }
    store.dispatch(Action::TokensLoaded(contracts));
    Ok(())
}

pub async fn load_exchange<P: Provider>(
    provider: &P,
    address: Address,
    store: &mut Store,
) -> Result<(), SessionError> {
    let info = provider.exchange_info(address).await?;
    store.dispatch(Action::ExchangeLoaded(info));
    Ok(())
}

/// Full startup sequence: connect, read the network, pick the account,
/// then load the `market` tokens and the exchange deployed on that network
pub async fn load_blockchain_data<P: Provider>(
    provider: &P,
    deployments: &Deployments,
    market: &[&str],
    store: &mut Store,
) -> Result<(), SessionError> {
    load_provider(store);
    let chain_id = load_network(provider, store).await?;
    let network = deployments
        .network(chain_id)
        .ok_or(SessionError::UnknownNetwork(chain_id))?;

    load_account(provider, store).await?;

    let addresses = market
        .iter()
        .map(|symbol| {
            network.token(symbol).ok_or_else(|| SessionError::UnknownToken {
                symbol: symbol.to_string(),
                chain_id,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    load_tokens(provider, &addresses, store).await?;

    let exchange = network
        .exchange
        .as_ref()
        .ok_or(SessionError::NoExchange(chain_id))?;
    load_exchange(provider, exchange.address, store).await?;

    log::info!(
        "Session loaded on chain {}: market {}",
        chain_id,
        store.tokens.symbols().join("/")
    );
    Ok(())
}

/// Apply receipts that arrived on `receipts` since the last call.
/// Returns the number of receipts consumed.
pub fn sync_events(receipts: &mut broadcast::Receiver<Receipt>, store: &mut Store) -> usize {
    let mut consumed = 0;
    loop {
        match receipts.try_recv() {
            Ok(receipt) => {
                store.apply_receipt(&receipt);
                consumed += 1;
            }
            Err(TryRecvError::Lagged(skipped)) => {
                log::warn!("Session lagged behind, {} receipts dropped", skipped);
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return consumed,
        }
    }
}

mod option_amount {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Option<u128>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{devnet, Call, ChainHandle};
    use crate::config::DevnetConfig;
    use crate::core::{tokens, Asset};
    use crate::provider::LocalProvider;

    fn setup() -> (LocalProvider, Deployments) {
        let net = devnet(&DevnetConfig::default()).unwrap();
        (
            LocalProvider::new(ChainHandle::new(net.state), net.keyring),
            net.deployments,
        )
    }

    #[tokio::test]
    async fn test_load_blockchain_data() {
        let (provider, deployments) = setup();
        let mut store = Store::new();

        load_blockchain_data(&provider, &deployments, &DEFAULT_MARKET, &mut store)
            .await
            .unwrap();

        assert!(store.provider.connected);
        assert_eq!(store.provider.chain_id, Some(31337));
        assert_eq!(store.provider.balance, Some(tokens(10_000)));
        assert!(store.tokens.loaded);
        assert_eq!(store.tokens.symbols(), vec!["DAPP", "mETH"]);
        assert!(store.exchange.loaded);
        assert_eq!(store.exchange.contract.unwrap().fee_percent, 10);
    }

    #[tokio::test]
    async fn test_unknown_network() {
        let (provider, _) = setup();
        let mut store = Store::new();

        let result =
            load_blockchain_data(&provider, &Deployments::default(), &DEFAULT_MARKET, &mut store).await;
        assert!(matches!(result, Err(SessionError::UnknownNetwork(31337))));
        assert_eq!(store.provider.chain_id, Some(31337));
        assert!(!store.tokens.loaded);
    }

    #[tokio::test]
    async fn test_unknown_market_symbol() {
        let (provider, deployments) = setup();
        let mut store = Store::new();

        let result = load_blockchain_data(&provider, &deployments, &["DAPP", "XYZ"], &mut store).await;
        assert!(matches!(result, Err(SessionError::UnknownToken { .. })));
    }

    #[tokio::test]
    async fn test_sync_exchange_events() {
        let (provider, deployments) = setup();
        let mut store = Store::new();
        load_blockchain_data(&provider, &deployments, &DEFAULT_MARKET, &mut store)
            .await
            .unwrap();

        let mut receipts = provider.subscribe();
        let account = store.provider.account.unwrap();
        let dapp = store.tokens.contracts[0].address;
        let exchange = store.exchange.contract.unwrap().address;

        provider
            .send(
                account,
                Call::Approve {
                    token: dapp,
                    spender: exchange.into(),
                    amount: tokens(10),
                },
            )
            .await
            .unwrap();
        provider
            .send(
                account,
                Call::DepositToken {
                    token: Asset::Token(dapp),
                    amount: tokens(10),
                },
            )
            .await
            .unwrap();

        assert_eq!(sync_events(&mut receipts, &mut store), 2);
        // Only the Deposit is emitted by the exchange; Approval and Transfer
        // come from the token
        assert_eq!(store.exchange.events.len(), 1);
        assert!(matches!(
            store.exchange.events[0],
            Event::Deposit { amount, .. } if amount == tokens(10)
        ));
        assert_eq!(sync_events(&mut receipts, &mut store), 0);
    }

    #[test]
    fn test_account_change_clears_balance() {
        let mut store = Store::new();
        let a = Address::from_bytes([1u8; 20]).unwrap();
        let b = Address::from_bytes([2u8; 20]).unwrap();

        store.dispatch(Action::AccountLoaded(a));
        store.dispatch(Action::BalanceLoaded(5));
        store.dispatch(Action::AccountLoaded(b));

        assert_eq!(store.provider.account, Some(b));
        assert_eq!(store.provider.balance, None);
    }
}
