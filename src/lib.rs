//! dapp-exchange: ERC-20 style token ledgers and a deposit-tracking exchange
//!
//! This crate provides:
//! - Fungible token ledgers with transfer, approve and transferFrom
//! - An exchange that records per-user deposits of tokens and native currency
//! - A single-writer chain runtime applying signed calls (secp256k1)
//! - A provider adapter and front-end session store
//! - JSON persistence, a REST/WebSocket API and a CLI
//!
//! # Example
//!
//! ```rust
//! use dapp_exchange::chain::{devnet, Call};
//! use dapp_exchange::config::DevnetConfig;
//! use dapp_exchange::core::{tokens, Asset};
//!
//! let mut net = devnet(&DevnetConfig::default()).unwrap();
//! let deployer = net.keyring.addresses()[0];
//!
//! // Deposit native currency into the exchange
//! net.state
//!     .execute(deployer, Call::DepositToken { token: Asset::Native, amount: tokens(1) })
//!     .unwrap();
//!
//! let exchange = net.state.require_exchange().unwrap();
//! assert_eq!(exchange.tokens(&Asset::Native, &deployer), tokens(1));
//! ```

pub mod api;
pub mod chain;
pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod exchange;
pub mod provider;
pub mod storage;
pub mod token;
pub mod wallet;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use chain::{devnet, Call, ChainHandle, ChainState, Receipt, SignedTransaction};
pub use config::{Deployments, DevnetConfig};
pub use core::{Account, Address, Asset, Event};
pub use crypto::KeyPair;
pub use exchange::Exchange;
pub use provider::{LocalProvider, Provider, Store};
pub use storage::Storage;
pub use token::{Token, TokenManager, TokenMetadata};
pub use wallet::{Keyring, Wallet};
