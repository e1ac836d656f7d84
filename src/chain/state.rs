//! Authoritative chain state
//!
//! `ChainState` owns every token ledger, the exchange, native balances and
//! the event log. Calls are applied one at a time: a call either applies
//! completely and produces a [`Receipt`], or fails and leaves no trace.

use crate::chain::transaction::{Call, Receipt, SignedTransaction};
use crate::core::{Address, Asset, Event, EventKind};
use crate::crypto::{contract_address, sha256_hex, KeyError};
use crate::exchange::{Exchange, ExchangeError};
use crate::token::{Token, TokenError, TokenManager};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Chain errors
#[derive(Error, Debug)]
pub enum ChainError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
    #[error("Signature error: {0}")]
    Key(#[from] KeyError),
    #[error("Wrong chain ID: expected {expected}, got {got}")]
    WrongChainId { expected: u64, got: u64 },
    #[error("Invalid nonce for {account}: expected {expected}, got {got}")]
    InvalidNonce { account: Address, expected: u64, got: u64 },
    #[error("Insufficient native balance: have {have}, need {need}")]
    InsufficientNativeBalance { have: u128, need: u128 },
    #[error("Native balance overflow for {0}")]
    NativeOverflow(Address),
    #[error("No exchange deployed")]
    NoExchange,
    #[error("Exchange already deployed at {0}")]
    ExchangeAlreadyDeployed(Address),
}

/// Filter for event log queries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only events emitted by this contract
    pub emitter: Option<Address>,
    pub kind: Option<EventKind>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        self.emitter.map_or(true, |e| event.emitter() == e)
            && self.kind.map_or(true, |k| event.kind() == k)
    }
}

/// Summary statistics of the chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainStats {
    pub chain_id: u64,
    pub height: u64,
    pub tokens: usize,
    pub events: usize,
    /// Accounts with a non-zero native balance
    pub native_holders: usize,
}

/// The whole ledger world of one chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainState {
    pub chain_id: u64,
    pub tokens: TokenManager,
    exchange: Option<Exchange>,
    /// Native currency balances
    #[serde(with = "native_map")]
    native: BTreeMap<Address, u128>,
    /// Next nonce per account (signed transactions only)
    nonces: BTreeMap<Address, u64>,
    /// Applied calls, oldest first
    receipts: Vec<Receipt>,
}

impl ChainState {
    /// Create an empty chain
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            tokens: TokenManager::new(),
            exchange: None,
            native: BTreeMap::new(),
            nonces: BTreeMap::new(),
            receipts: Vec::new(),
        }
    }

    /// Number of applied calls
    pub fn height(&self) -> u64 {
        self.receipts.len() as u64
    }

    pub fn exchange(&self) -> Option<&Exchange> {
        self.exchange.as_ref()
    }

    pub fn require_exchange(&self) -> Result<&Exchange, ChainError> {
        self.exchange.as_ref().ok_or(ChainError::NoExchange)
    }

    pub fn native_balance(&self, account: &Address) -> u128 {
        self.native.get(account).copied().unwrap_or(0)
    }

    pub fn nonce(&self, account: &Address) -> u64 {
        self.nonces.get(account).copied().unwrap_or(0)
    }

    /// Credit native currency at genesis
    pub fn fund(&mut self, account: Address, amount: u128) -> Result<(), ChainError> {
        let funded = self
            .native_balance(&account)
            .checked_add(amount)
            .ok_or(ChainError::NativeOverflow(account))?;
        self.native.insert(account, funded);
        Ok(())
    }

    /// Deploy a token ledger; the whole supply goes to `deployer`
    pub fn deploy_token(
        &mut self,
        deployer: Address,
        name: &str,
        symbol: &str,
        total_supply: u128,
    ) -> Result<Token, ChainError> {
        Ok(self
            .tokens
            .create_token(name.to_string(), symbol.to_string(), total_supply, deployer)?)
    }

    /// Deploy the exchange
    pub fn deploy_exchange(
        &mut self,
        deployer: Address,
        fee_account: Address,
        fee_percent: u8,
    ) -> Result<Address, ChainError> {
        if let Some(existing) = &self.exchange {
            return Err(ChainError::ExchangeAlreadyDeployed(existing.address));
        }

        let address = contract_address(&deployer, "exchange", 0)
            .map_err(|e| ChainError::Key(KeyError::Address(e)))?;
        self.exchange = Some(Exchange::new(address, fee_account, fee_percent)?);

        log::info!(
            "Exchange deployed at {} (fee account {}, fee {}%)",
            address,
            fee_account,
            fee_percent
        );
        Ok(address)
    }

    /// Verify and apply a signed transaction
    pub fn submit(&mut self, signed: &SignedTransaction) -> Result<Receipt, ChainError> {
        let tx = &signed.transaction;
        if tx.chain_id != self.chain_id {
            return Err(ChainError::WrongChainId {
                expected: self.chain_id,
                got: tx.chain_id,
            });
        }

        let caller = signed.recover_signer()?;
        let expected = self.nonce(&caller);
        if tx.nonce != expected {
            return Err(ChainError::InvalidNonce {
                account: caller,
                expected,
                got: tx.nonce,
            });
        }

        let receipt = self.apply(caller, tx.call.clone(), signed.hash())?;
        self.nonces.insert(caller, expected + 1);
        Ok(receipt)
    }

    /// Apply a call on behalf of `caller` without a signature
    ///
    /// Used by trusted in-process callers such as genesis and tests.
    pub fn execute(&mut self, caller: Address, call: Call) -> Result<Receipt, ChainError> {
        let hash = sha256_hex(format!("{}:{}:{:?}", caller, self.height(), call).as_bytes());
        self.apply(caller, call, hash)
    }

    fn apply(&mut self, caller: Address, call: Call, hash: String) -> Result<Receipt, ChainError> {
        let events = match self.dispatch(&caller, &call) {
            Ok(events) => events,
            Err(e) => {
                log::warn!("{} from {} rejected: {}", call.method(), caller, e);
                return Err(e);
            }
        };

        let receipt = Receipt {
            hash,
            height: self.height() + 1,
            caller,
            call,
            events,
            timestamp: Utc::now(),
        };

        log::info!(
            "{} from {} applied at height {} ({} events)",
            receipt.call.method(),
            caller,
            receipt.height,
            receipt.events.len()
        );

        self.receipts.push(receipt.clone());
        Ok(receipt)
    }

    fn dispatch(&mut self, caller: &Address, call: &Call) -> Result<Vec<Event>, ChainError> {
        match call {
            Call::Transfer { token, to, amount } => {
                Ok(vec![self.tokens.transfer(token, caller, to, *amount)?])
            }
            Call::Approve {
                token,
                spender,
                amount,
            } => Ok(vec![self.tokens.approve(token, caller, spender, *amount)?]),
            Call::TransferFrom {
                token,
                from,
                to,
                amount,
            } => Ok(vec![self
                .tokens
                .transfer_from(token, caller, from, to, *amount)?]),
            Call::DepositToken { token, amount } => self.deposit(caller, *token, *amount),
            Call::WithdrawToken { token, amount } => self.withdraw(caller, *token, *amount),
        }
    }

    fn deposit(&mut self, caller: &Address, asset: Asset, amount: u128) -> Result<Vec<Event>, ChainError> {
        let exchange = self.exchange.as_mut().ok_or(ChainError::NoExchange)?;

        // Native value travels with the call; check it before the exchange
        // credits anything so a failure leaves both sides untouched.
        let remaining = match asset {
            Asset::Native => {
                let have = self.native.get(caller).copied().unwrap_or(0);
                Some(have.checked_sub(amount).ok_or(
                    ChainError::InsufficientNativeBalance { have, need: amount },
                )?)
            }
            Asset::Token(_) => None,
        };

        let events = exchange.deposit_token(&mut self.tokens, caller, asset, amount)?;
        if let Some(remaining) = remaining {
            self.native.insert(*caller, remaining);
        }
        Ok(events)
    }

    fn withdraw(&mut self, caller: &Address, asset: Asset, amount: u128) -> Result<Vec<Event>, ChainError> {
        let exchange = self.exchange.as_mut().ok_or(ChainError::NoExchange)?;

        let credited = match asset {
            Asset::Native => Some(
                self.native
                    .get(caller)
                    .copied()
                    .unwrap_or(0)
                    .checked_add(amount)
                    .ok_or(ChainError::NativeOverflow(*caller))?,
            ),
            Asset::Token(_) => None,
        };

        let events = exchange.withdraw_token(&mut self.tokens, caller, asset, amount)?;
        if let Some(credited) = credited {
            self.native.insert(*caller, credited);
        }
        Ok(events)
    }

    /// All applied receipts, oldest first
    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    /// Events matching `filter`, in emission order
    pub fn events(&self, filter: &EventFilter) -> Vec<Event> {
        self.receipts
            .iter()
            .flat_map(|r| r.events.iter())
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> ChainStats {
        ChainStats {
            chain_id: self.chain_id,
            height: self.height(),
            tokens: self.tokens.count(),
            events: self.receipts.iter().map(|r| r.events.len()).sum(),
            native_holders: self.native.values().filter(|&&balance| balance > 0).count(),
        }
    }
}

mod native_map {
    use crate::core::Address;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<Address, u128>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let as_strings: BTreeMap<&Address, String> =
            map.iter().map(|(k, v)| (k, v.to_string())).collect();
        as_strings.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Address, u128>, D::Error> {
        let raw = BTreeMap::<Address, String>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(k, v)| {
                v.parse::<u128>()
                    .map(|v| (k, v))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}
