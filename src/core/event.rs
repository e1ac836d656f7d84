//! Structured event records
//!
//! Operations return the events they emit instead of pushing them through a
//! side channel. The chain appends them to its log in emission order.

use crate::core::address::{Account, Address, Asset};
use serde::{Deserialize, Serialize};

/// Amounts are serialized as decimal strings so JSON clients never see
/// values above 2^53 as lossy numbers.
pub(crate) mod amount_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An event emitted by a token ledger or by the exchange
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    /// Tokens moved between accounts
    Transfer {
        token: Address,
        from: Address,
        to: Account,
        #[serde(with = "amount_string")]
        value: u128,
    },
    /// An allowance was set
    Approval {
        token: Address,
        owner: Address,
        spender: Account,
        #[serde(with = "amount_string")]
        value: u128,
    },
    /// An asset was deposited into the exchange
    Deposit {
        exchange: Address,
        token: Asset,
        user: Address,
        #[serde(with = "amount_string")]
        amount: u128,
        #[serde(with = "amount_string")]
        balance: u128,
    },
    /// An asset was withdrawn from the exchange
    Withdraw {
        exchange: Address,
        token: Asset,
        user: Address,
        #[serde(with = "amount_string")]
        amount: u128,
        #[serde(with = "amount_string")]
        balance: u128,
    },
}

/// Event names, used to filter the log
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Transfer,
    Approval,
    Deposit,
    Withdraw,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Transfer { .. } => EventKind::Transfer,
            Event::Approval { .. } => EventKind::Approval,
            Event::Deposit { .. } => EventKind::Deposit,
            Event::Withdraw { .. } => EventKind::Withdraw,
        }
    }

    /// Address of the contract that emitted this event
    pub fn emitter(&self) -> Address {
        match self {
            Event::Transfer { token, .. } | Event::Approval { token, .. } => *token,
            Event::Deposit { exchange, .. } | Event::Withdraw { exchange, .. } => *exchange,
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transfer" => Ok(EventKind::Transfer),
            "approval" => Ok(EventKind::Approval),
            "deposit" => Ok(EventKind::Deposit),
            "withdraw" => Ok(EventKind::Withdraw),
            other => Err(format!("Unknown event kind: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let token = Address::parse("0x5fbdb2315678afecb367f032d93f642f64180aa3").unwrap();
        let from = Address::parse("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266").unwrap();
        let event = Event::Transfer {
            token,
            from,
            to: Account::Null,
            value: 100_000_000_000_000_000_000,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"Transfer\""));
        assert!(json.contains("\"value\":\"100000000000000000000\""));

        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.kind(), EventKind::Transfer);
        assert_eq!(back.emitter(), token);
    }

    #[test]
    fn test_event_kind_from_str() {
        assert_eq!("deposit".parse::<EventKind>().unwrap(), EventKind::Deposit);
        assert_eq!("Approval".parse::<EventKind>().unwrap(), EventKind::Approval);
        assert!("order".parse::<EventKind>().is_err());
    }
}
