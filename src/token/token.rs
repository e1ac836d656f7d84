//! ERC-20 style token ledger
//!
//! Balances and allowances for a single fungible token. Every mutating
//! operation validates all of its preconditions before touching state, so a
//! rejected call leaves the ledger exactly as it was.

use crate::core::{Account, Address, Event, DECIMALS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Token-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid recipient")]
    InvalidRecipient,
    #[error("Invalid spender")]
    InvalidSpender,
    #[error("Not enough tokens")]
    InsufficientBalance { have: u128, need: u128 },
    #[error("Insufficient allowance")]
    InsufficientAllowance { have: u128, need: u128 },
    #[error("Balance overflow for {0}")]
    BalanceOverflow(Address),
    #[error("Token not found: {0}")]
    TokenNotFound(Address),
    #[error("Token already exists: {0}")]
    TokenAlreadyExists(Address),
    #[error("Invalid symbol: must be 1-10 characters")]
    InvalidSymbol,
    #[error("Invalid name: must be 1-50 characters")]
    InvalidName,
    #[error("Invalid decimals: must be 0-18")]
    InvalidDecimals,
    #[error("Invalid supply: must be greater than 0")]
    InvalidSupply,
}

/// Token metadata (immutable after creation)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TokenMetadata {
    /// Token name (e.g., "Dapp University")
    pub name: String,
    /// Token symbol (e.g., "DAPP")
    pub symbol: String,
    pub decimals: u8,
    /// Total supply in base units (fixed at creation)
    #[serde(with = "crate::core::event::amount_string")]
    pub total_supply: u128,
    /// Deployer, who receives the whole supply
    pub creator: Address,
    pub created_at: DateTime<Utc>,
}

impl TokenMetadata {
    /// Create new token metadata with validation
    pub fn new(
        name: String,
        symbol: String,
        decimals: u8,
        total_supply: u128,
        creator: Address,
    ) -> Result<Self, TokenError> {
        if name.is_empty() || name.chars().count() > 50 {
            return Err(TokenError::InvalidName);
        }

        if symbol.is_empty() || symbol.chars().count() > 10 {
            return Err(TokenError::InvalidSymbol);
        }

        if decimals > DECIMALS {
            return Err(TokenError::InvalidDecimals);
        }

        if total_supply == 0 {
            return Err(TokenError::InvalidSupply);
        }

        Ok(Self {
            name,
            symbol,
            decimals,
            total_supply,
            creator,
            created_at: Utc::now(),
        })
    }
}

/// A fungible token ledger
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
    /// Address the token is deployed at
    pub address: Address,
    pub metadata: TokenMetadata,
    /// Balances: address -> amount
    #[serde(with = "amount_map")]
    balances: HashMap<Address, u128>,
    /// Allowances: owner -> (spender -> amount)
    #[serde(with = "allowance_map")]
    allowances: HashMap<Address, HashMap<Address, u128>>,
}

impl Token {
    /// Create a new token with all supply allocated to the creator
    pub fn new(address: Address, metadata: TokenMetadata) -> Self {
        let mut balances = HashMap::new();
        balances.insert(metadata.creator, metadata.total_supply);

        Self {
            address,
            metadata,
            balances,
            allowances: HashMap::new(),
        }
    }

    // =========================================================================
    // View Functions
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    pub fn total_supply(&self) -> u128 {
        self.metadata.total_supply
    }

    /// Get balance of an address
    pub fn balance_of(&self, address: &Address) -> u128 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// Get the amount `spender` may still move out of `owner`'s balance
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Get all holders with non-zero balances
    pub fn holders(&self) -> Vec<(Address, u128)> {
        let mut holders: Vec<(Address, u128)> = self
            .balances
            .iter()
            .filter(|(_, &b)| b > 0)
            .map(|(a, b)| (*a, *b))
            .collect();
        holders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        holders
    }

    pub fn holder_count(&self) -> usize {
        self.balances.values().filter(|&&b| b > 0).count()
    }

    /// Sum of every balance; equals `total_supply()` at all times
    ///
    /// `None` if the balances do not fit in a `u128`.
    pub fn circulating(&self) -> Option<u128> {
        self.balances
            .values()
            .try_fold(0u128, |total, balance| total.checked_add(*balance))
    }

    // =========================================================================
    // Mutating Functions
    // =========================================================================

    /// Transfer `amount` from `sender` to `to`
    pub fn transfer(&mut self, sender: &Address, to: &Account, amount: u128) -> Result<Event, TokenError> {
        let to = to.address().ok_or(TokenError::InvalidRecipient)?;
        self.check_balance(sender, amount)?;
        self.move_balance(sender, &to, amount)?;

        Ok(self.transfer_event(sender, &to, amount))
    }

    /// Approve `spender` to move up to `amount` of `owner`'s tokens
    ///
    /// The allowance is overwritten, not added to. Approving 0 revokes.
    pub fn approve(&mut self, owner: &Address, spender: &Account, amount: u128) -> Result<Event, TokenError> {
        let spender = spender.address().ok_or(TokenError::InvalidSpender)?;

        self.allowances
            .entry(*owner)
            .or_default()
            .insert(spender, amount);

        Ok(Event::Approval {
            token: self.address,
            owner: *owner,
            spender: Account::Address(spender),
            value: amount,
        })
    }

    /// Move `amount` from `from` to `to` on behalf of `from`, consuming
    /// `spender`'s allowance
    pub fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Account,
        amount: u128,
    ) -> Result<Event, TokenError> {
        let to = to.address().ok_or(TokenError::InvalidRecipient)?;
        self.check_balance(from, amount)?;

        let current_allowance = self.allowance(from, spender);
        if current_allowance < amount {
            return Err(TokenError::InsufficientAllowance {
                have: current_allowance,
                need: amount,
            });
        }

        self.move_balance(from, &to, amount)?;

        if let Some(allowance) = self
            .allowances
            .get_mut(from)
            .and_then(|spenders| spenders.get_mut(spender))
        {
            *allowance -= amount;
        }

        Ok(self.transfer_event(from, &to, amount))
    }

    fn check_balance(&self, holder: &Address, amount: u128) -> Result<(), TokenError> {
        let have = self.balance_of(holder);
        if have < amount {
            return Err(TokenError::InsufficientBalance { have, need: amount });
        }
        Ok(())
    }

    /// Debit and credit in one step. The caller has checked the debit side;
    /// the credit side is checked here before anything is written.
    fn move_balance(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), TokenError> {
        if from == to {
            return Ok(());
        }

        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TokenError::BalanceOverflow(*to))?;

        *self.balances.entry(*from).or_insert(0) -= amount;
        self.balances.insert(*to, credited);
        Ok(())
    }

    fn transfer_event(&self, from: &Address, to: &Address, amount: u128) -> Event {
        Event::Transfer {
            token: self.address,
            from: *from,
            to: Account::Address(*to),
            value: amount,
        }
    }
}

mod amount_map {
    use crate::core::Address;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::{BTreeMap, HashMap};

    pub fn serialize<S: Serializer>(
        map: &HashMap<Address, u128>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let sorted: BTreeMap<&Address, String> =
            map.iter().map(|(k, v)| (k, v.to_string())).collect();
        sorted.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<Address, u128>, D::Error> {
        let raw = HashMap::<Address, String>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(k, v)| {
                v.parse::<u128>()
                    .map(|v| (k, v))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

mod allowance_map {
    use crate::core::Address;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::{BTreeMap, HashMap};

    pub fn serialize<S: Serializer>(
        map: &HashMap<Address, HashMap<Address, u128>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let sorted: BTreeMap<&Address, BTreeMap<&Address, String>> = map
            .iter()
            .map(|(owner, spenders)| {
                let spenders = spenders.iter().map(|(s, v)| (s, v.to_string())).collect();
                (owner, spenders)
            })
            .collect();
        sorted.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<Address, HashMap<Address, u128>>, D::Error> {
        let raw = HashMap::<Address, HashMap<Address, String>>::deserialize(deserializer)?;
        let mut allowances = HashMap::new();
        for (owner, spenders) in raw {
            let mut parsed = HashMap::new();
            for (spender, value) in spenders {
                let value = value.parse::<u128>().map_err(serde::de::Error::custom)?;
                parsed.insert(spender, value);
            }
            allowances.insert(owner, parsed);
        }
        Ok(allowances)
    }
}
