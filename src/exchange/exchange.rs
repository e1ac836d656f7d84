//! Deposit-tracking exchange
//!
//! Records how much of each asset every account holds in exchange custody.
//! Token deposits pull funds with `transfer_from`, so the depositor must
//! have approved the exchange first. Native-currency deposits are credited
//! as given; moving the value itself is the runtime's job.

use crate::core::{Account, Address, Asset, Event};
use crate::token::{TokenError, TokenManager};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Upper bound for the trading fee percentage
pub const MAX_FEE_PERCENT: u8 = 100;

/// Exchange errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("Insufficient deposit: have {have}, need {need}")]
    InsufficientDeposit { have: u128, need: u128 },
    #[error("Deposit record overflow for {user} in {asset}")]
    DepositOverflow { asset: Asset, user: Address },
    #[error("Deposit total overflow in {0}")]
    TotalOverflow(Asset),
    #[error("Invalid fee percent: {0} (max {MAX_FEE_PERCENT})")]
    InvalidFeePercent(u8),
}

/// A deposit-tracking exchange
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Exchange {
    pub address: Address,
    fee_account: Address,
    fee_percent: u8,
    /// Deposit records: asset -> (user -> amount)
    #[serde(with = "deposit_map")]
    deposits: HashMap<Asset, HashMap<Address, u128>>,
}

impl Exchange {
    /// Create an exchange charging `fee_percent` into `fee_account`
    pub fn new(address: Address, fee_account: Address, fee_percent: u8) -> Result<Self, ExchangeError> {
        if fee_percent > MAX_FEE_PERCENT {
            return Err(ExchangeError::InvalidFeePercent(fee_percent));
        }

        Ok(Self {
            address,
            fee_account,
            fee_percent,
            deposits: HashMap::new(),
        })
    }

    pub fn fee_account(&self) -> Address {
        self.fee_account
    }

    pub fn fee_percent(&self) -> u8 {
        self.fee_percent
    }

    /// Current deposit record of `user` for `asset`
    pub fn tokens(&self, asset: &Asset, user: &Address) -> u128 {
        self.deposits
            .get(asset)
            .and_then(|users| users.get(user))
            .copied()
            .unwrap_or(0)
    }

    /// Alias of [`Exchange::tokens`]
    pub fn balance_of(&self, asset: &Asset, user: &Address) -> u128 {
        self.tokens(asset, user)
    }

    /// Sum of all deposit records for `asset`
    ///
    /// Each record fits in a `u128` but their sum may not.
    pub fn total_deposits(&self, asset: &Asset) -> Result<u128, ExchangeError> {
        self.deposits
            .get(asset)
            .into_iter()
            .flat_map(|users| users.values())
            .try_fold(0u128, |total, amount| total.checked_add(*amount))
            .ok_or(ExchangeError::TotalOverflow(*asset))
    }

    /// Totals of every asset with non-zero deposits
    pub fn summary(&self) -> Result<BTreeMap<Asset, u128>, ExchangeError> {
        let mut summary = BTreeMap::new();
        for asset in self.deposits.keys() {
            let total = self.total_deposits(asset)?;
            if total > 0 {
                summary.insert(*asset, total);
            }
        }
        Ok(summary)
    }

    /// Deposit `amount` of `asset` for `caller`
    ///
    /// For token assets the returned events are the ledger's `Transfer`
    /// followed by `Deposit`; native deposits only emit `Deposit`.
    pub fn deposit_token(
        &mut self,
        ledgers: &mut TokenManager,
        caller: &Address,
        asset: Asset,
        amount: u128,
    ) -> Result<Vec<Event>, ExchangeError> {
        let balance = self
            .tokens(&asset, caller)
            .checked_add(amount)
            .ok_or(ExchangeError::DepositOverflow {
                asset,
                user: *caller,
            })?;

        let mut events = Vec::with_capacity(2);
        if let Asset::Token(token) = asset {
            events.push(ledgers.transfer_from(
                &token,
                &self.address,
                caller,
                &Account::Address(self.address),
                amount,
            )?);
        }

        self.deposits.entry(asset).or_default().insert(*caller, balance);
        events.push(Event::Deposit {
            exchange: self.address,
            token: asset,
            user: *caller,
            amount,
            balance,
        });

        log::debug!("Deposit: {} of {} for {} (now {})", amount, asset, caller, balance);
        Ok(events)
    }

    /// Withdraw `amount` of `asset` back to `caller`
    pub fn withdraw_token(
        &mut self,
        ledgers: &mut TokenManager,
        caller: &Address,
        asset: Asset,
        amount: u128,
    ) -> Result<Vec<Event>, ExchangeError> {
        let have = self.tokens(&asset, caller);
        if have < amount {
            return Err(ExchangeError::InsufficientDeposit { have, need: amount });
        }
        let balance = have - amount;

        let mut events = Vec::with_capacity(2);
        if let Asset::Token(token) = asset {
            events.push(ledgers.transfer(
                &token,
                &self.address,
                &Account::Address(*caller),
                amount,
            )?);
        }

        self.deposits.entry(asset).or_default().insert(*caller, balance);
        events.push(Event::Withdraw {
            exchange: self.address,
            token: asset,
            user: *caller,
            amount,
            balance,
        });

        log::debug!("Withdraw: {} of {} for {} (now {})", amount, asset, caller, balance);
        Ok(events)
    }
}

mod deposit_map {
    use crate::core::{Address, Asset};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::{BTreeMap, HashMap};

    pub fn serialize<S: Serializer>(
        map: &HashMap<Asset, HashMap<Address, u128>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let sorted: BTreeMap<&Asset, BTreeMap<&Address, String>> = map
            .iter()
            .map(|(asset, users)| {
                let users = users.iter().map(|(u, v)| (u, v.to_string())).collect();
                (asset, users)
            })
            .collect();
        sorted.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<Asset, HashMap<Address, u128>>, D::Error> {
        let raw = HashMap::<Asset, HashMap<Address, String>>::deserialize(deserializer)?;
        let mut deposits = HashMap::new();
        for (asset, users) in raw {
            let mut parsed = HashMap::new();
            for (user, value) in users {
                let value = value.parse::<u128>().map_err(serde::de::Error::custom)?;
                parsed.insert(user, value);
            }
            deposits.insert(asset, parsed);
        }
        Ok(deposits)
    }
}
