//! Token manager for deploying and routing calls to token ledgers

use crate::core::{Account, Address, Event, DECIMALS};
use crate::crypto::contract_address;
use crate::token::token::{Token, TokenError, TokenMetadata};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Manages every token ledger on the chain
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TokenManager {
    /// All tokens by address
    tokens: BTreeMap<Address, Token>,
    /// Deployment counter for address generation
    nonce: u64,
}

impl TokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy a new 18-decimal token
    ///
    /// `total_supply` is in base units; all of it goes to `creator`.
    pub fn create_token(
        &mut self,
        name: String,
        symbol: String,
        total_supply: u128,
        creator: Address,
    ) -> Result<Token, TokenError> {
        let metadata = TokenMetadata::new(name, symbol, DECIMALS, total_supply, creator)?;

        let address = contract_address(&creator, &metadata.symbol, self.nonce)
            .map_err(|_| TokenError::InvalidSymbol)?;
        self.nonce += 1;

        if self.tokens.contains_key(&address) {
            return Err(TokenError::TokenAlreadyExists(address));
        }

        let token = Token::new(address, metadata);
        self.tokens.insert(address, token.clone());

        log::info!(
            "Token deployed: {} ({}) at {} by {}",
            token.name(),
            token.symbol(),
            address,
            creator
        );

        Ok(token)
    }

    /// Get a token by address
    pub fn get(&self, address: &Address) -> Option<&Token> {
        self.tokens.get(address)
    }

    /// Get a token by address or fail with `TokenNotFound`
    pub fn require(&self, address: &Address) -> Result<&Token, TokenError> {
        self.tokens
            .get(address)
            .ok_or(TokenError::TokenNotFound(*address))
    }

    fn require_mut(&mut self, address: &Address) -> Result<&mut Token, TokenError> {
        self.tokens
            .get_mut(address)
            .ok_or(TokenError::TokenNotFound(*address))
    }

    /// Find a token by its symbol
    pub fn find_by_symbol(&self, symbol: &str) -> Option<&Token> {
        self.tokens
            .values()
            .find(|t| t.symbol().eq_ignore_ascii_case(symbol))
    }

    /// List all tokens in address order
    pub fn list(&self) -> Vec<&Token> {
        self.tokens.values().collect()
    }

    pub fn count(&self) -> usize {
        self.tokens.len()
    }

    pub fn exists(&self, address: &Address) -> bool {
        self.tokens.contains_key(address)
    }

    pub fn transfer(
        &mut self,
        token_address: &Address,
        sender: &Address,
        to: &Account,
        amount: u128,
    ) -> Result<Event, TokenError> {
        self.require_mut(token_address)?.transfer(sender, to, amount)
    }

    pub fn approve(
        &mut self,
        token_address: &Address,
        owner: &Address,
        spender: &Account,
        amount: u128,
    ) -> Result<Event, TokenError> {
        self.require_mut(token_address)?.approve(owner, spender, amount)
    }

    /// Delegated transfer, consuming `spender`'s allowance on `from`
    pub fn transfer_from(
        &mut self,
        token_address: &Address,
        spender: &Address,
        from: &Address,
        to: &Account,
        amount: u128,
    ) -> Result<Event, TokenError> {
        self.require_mut(token_address)?
            .transfer_from(spender, from, to, amount)
    }

    pub fn balance_of(&self, token_address: &Address, holder: &Address) -> Result<u128, TokenError> {
        Ok(self.require(token_address)?.balance_of(holder))
    }

    pub fn allowance(
        &self,
        token_address: &Address,
        owner: &Address,
        spender: &Address,
    ) -> Result<u128, TokenError> {
        Ok(self.require(token_address)?.allowance(owner, spender))
    }

    /// Get all tokens held by an address
    pub fn tokens_for_holder(&self, holder: &Address) -> Vec<(&Token, u128)> {
        self.tokens
            .values()
            .filter_map(|token| {
                let balance = token.balance_of(holder);
                if balance > 0 {
                    Some((token, balance))
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tokens;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::from_bytes(bytes).unwrap()
    }

    fn deploy(manager: &mut TokenManager, symbol: &str, creator: Address) -> Address {
        manager
            .create_token(
                format!("{} Token", symbol),
                symbol.to_string(),
                tokens(1_000_000),
                creator,
            )
            .unwrap()
            .address
    }

    #[test]
    fn test_manager_creation() {
        let manager = TokenManager::new();
        assert_eq!(manager.count(), 0);
    }

    #[test]
    fn test_token_creation() {
        let mut manager = TokenManager::new();
        let address = deploy(&mut manager, "DAPP", addr(1));

        assert!(manager.exists(&address));
        assert_eq!(manager.balance_of(&address, &addr(1)).unwrap(), tokens(1_000_000));
        assert_eq!(manager.count(), 1);
        assert_eq!(manager.find_by_symbol("dapp").unwrap().address, address);
    }

    #[test]
    fn test_same_symbol_gets_distinct_addresses() {
        let mut manager = TokenManager::new();
        let a = deploy(&mut manager, "DAPP", addr(1));
        let b = deploy(&mut manager, "DAPP", addr(1));
        assert_ne!(a, b);
        assert_eq!(manager.count(), 2);
    }

    #[test]
    fn test_approve_and_transfer_from() {
        let mut manager = TokenManager::new();
        let address = deploy(&mut manager, "DAPP", addr(1));

        manager
            .approve(&address, &addr(1), &addr(3).into(), tokens(100))
            .unwrap();
        assert_eq!(
            manager.allowance(&address, &addr(1), &addr(3)).unwrap(),
            tokens(100)
        );

        manager
            .transfer_from(&address, &addr(3), &addr(1), &addr(2).into(), tokens(100))
            .unwrap();

        assert_eq!(manager.balance_of(&address, &addr(1)).unwrap(), tokens(999_900));
        assert_eq!(manager.balance_of(&address, &addr(2)).unwrap(), tokens(100));
        assert_eq!(manager.allowance(&address, &addr(1), &addr(3)).unwrap(), 0);
    }

    #[test]
    fn test_tokens_for_holder() {
        let mut manager = TokenManager::new();
        let dapp = deploy(&mut manager, "DAPP", addr(1));
        deploy(&mut manager, "mETH", addr(1));

        assert_eq!(manager.tokens_for_holder(&addr(1)).len(), 2);
        assert!(manager.tokens_for_holder(&addr(2)).is_empty());

        manager
            .transfer(&dapp, &addr(1), &addr(2).into(), tokens(500))
            .unwrap();

        let held = manager.tokens_for_holder(&addr(2));
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].1, tokens(500));
    }

    #[test]
    fn test_unknown_token() {
        let mut manager = TokenManager::new();

        let result = manager.transfer(&addr(9), &addr(1), &addr(2).into(), 100);
        assert_eq!(result, Err(TokenError::TokenNotFound(addr(9))));
        assert!(manager.balance_of(&addr(9), &addr(1)).is_err());
    }
}
