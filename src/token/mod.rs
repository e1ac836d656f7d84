//! ERC-20 style fungible token ledgers
//!
//! Provides a standard interface for fungible tokens with:
//! - Balances per address
//! - Allowances for delegated transfers
//! - Transfer, approve and transfer-from operations that return their events
//!
//! # Example
//!
//! ```rust
//! use dapp_exchange::core::{tokens, Address};
//! use dapp_exchange::token::TokenManager;
//!
//! let deployer = Address::parse("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266").unwrap();
//! let receiver = Address::parse("0x70997970c51812dc3a010c7d01b50e0d17dc79c8").unwrap();
//!
//! let mut manager = TokenManager::new();
//! let token = manager
//!     .create_token("Dapp University".into(), "DAPP".into(), tokens(1_000_000), deployer)
//!     .unwrap();
//!
//! manager
//!     .transfer(&token.address, &deployer, &receiver.into(), tokens(100))
//!     .unwrap();
//! assert_eq!(manager.balance_of(&token.address, &receiver).unwrap(), tokens(100));
//! ```

pub mod manager;
pub mod token;

pub use manager::TokenManager;
pub use token::{Token, TokenError, TokenMetadata};
