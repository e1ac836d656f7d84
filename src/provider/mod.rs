//! Wallet provider and front-end session
//!
//! [`Provider`] abstracts the wallet connection a front end talks to;
//! [`session`] holds the reducer-style store and its startup loaders.

pub mod provider;
pub mod session;

pub use provider::{ExchangeInfo, LocalProvider, Provider, ProviderError, TokenInfo};
pub use session::{
    load_account, load_blockchain_data, load_exchange, load_network, load_provider, load_tokens,
    sync_events, Action, ExchangeState, ProviderState, SessionError, Store, TokensState,
    DEFAULT_MARKET,
};
