//! Deposit-tracking exchange
//!
//! Holds assets in custody on behalf of accounts, keyed by asset identity.
//! [`Asset::Native`](crate::core::Asset::Native) stands for the chain's own
//! currency; every other asset is a token ledger managed by
//! [`TokenManager`](crate::token::TokenManager).

pub mod exchange;

pub use exchange::{Exchange, ExchangeError, MAX_FEE_PERCENT};
