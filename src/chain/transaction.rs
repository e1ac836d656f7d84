//! Calls, signed transactions and receipts
//!
//! A [`Call`] names one ledger or exchange operation. Wrapped in a
//! [`Transaction`] with a chain id and nonce it can be signed, which gives
//! replay protection across chains and within one chain.

use crate::core::event::amount_string;
use crate::core::{Account, Address, Asset, Event};
use crate::crypto::{public_key_from_hex, sha256, sha256_hex, verify_signature, KeyError, KeyPair};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default devnet chain id
pub const DEFAULT_CHAIN_ID: u64 = 31337;

/// One state-changing operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Call {
    Transfer {
        token: Address,
        to: Account,
        #[serde(with = "amount_string")]
        amount: u128,
    },
    Approve {
        token: Address,
        spender: Account,
        #[serde(with = "amount_string")]
        amount: u128,
    },
    TransferFrom {
        token: Address,
        from: Address,
        to: Account,
        #[serde(with = "amount_string")]
        amount: u128,
    },
    DepositToken {
        token: Asset,
        #[serde(with = "amount_string")]
        amount: u128,
    },
    WithdrawToken {
        token: Asset,
        #[serde(with = "amount_string")]
        amount: u128,
    },
}

impl Call {
    /// Method name as used in logs
    pub fn method(&self) -> &'static str {
        match self {
            Call::Transfer { .. } => "transfer",
            Call::Approve { .. } => "approve",
            Call::TransferFrom { .. } => "transferFrom",
            Call::DepositToken { .. } => "depositToken",
            Call::WithdrawToken { .. } => "withdrawToken",
        }
    }
}

/// An unsigned transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub call: Call,
}

impl Transaction {
    pub fn new(chain_id: u64, nonce: u64, call: Call) -> Self {
        Self {
            chain_id,
            nonce,
            call,
        }
    }

    /// Digest that gets signed: SHA-256 of the canonical JSON encoding
    pub fn signing_hash(&self) -> Vec<u8> {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        sha256(&encoded)
    }

    /// Sign with `key_pair`
    pub fn sign(self, key_pair: &KeyPair) -> Result<SignedTransaction, KeyError> {
        let signature = key_pair.sign(&self.signing_hash())?;
        Ok(SignedTransaction {
            transaction: self,
            public_key: key_pair.public_key_hex(),
            signature: hex::encode(signature),
        })
    }
}

/// A transaction with the signer's public key and compact signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    /// Compressed secp256k1 public key (hex)
    pub public_key: String,
    /// Compact ECDSA signature (hex)
    pub signature: String,
}

impl SignedTransaction {
    /// Verify the signature and return the signer's address
    pub fn recover_signer(&self) -> Result<Address, KeyError> {
        let public_key = public_key_from_hex(&self.public_key)?;
        let signature = hex::decode(&self.signature).map_err(|_| KeyError::InvalidSignature)?;
        if !verify_signature(&public_key, &self.transaction.signing_hash(), &signature)? {
            return Err(KeyError::InvalidSignature);
        }
        crate::crypto::public_key_to_address(&public_key)
    }

    pub fn hash(&self) -> String {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        sha256_hex(&encoded)
    }
}

/// Result of an applied call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction hash
    pub hash: String,
    /// Height (1-based position of the call in the chain's history)
    pub height: u64,
    pub caller: Address,
    pub call: Call,
    /// Events in emission order
    pub events: Vec<Event>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tokens;

    fn token() -> Address {
        Address::parse("0x5fbdb2315678afecb367f032d93f642f64180aa3").unwrap()
    }

    #[test]
    fn test_call_json_shape() {
        let call = Call::TransferFrom {
            token: token(),
            from: Address::parse("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266").unwrap(),
            to: Account::Null,
            amount: tokens(100),
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["method"], "transferFrom");
        assert_eq!(json["amount"], "100000000000000000000");
        assert_eq!(json["to"], crate::core::ZERO_ADDRESS);

        let back: Call = serde_json::from_value(json).unwrap();
        assert_eq!(back, call);
        assert_eq!(back.method(), "transferFrom");
    }

    #[test]
    fn test_sign_and_recover() {
        let key_pair = KeyPair::generate();
        let tx = Transaction::new(
            DEFAULT_CHAIN_ID,
            0,
            Call::DepositToken {
                token: Asset::Native,
                amount: tokens(10),
            },
        );

        let signed = tx.sign(&key_pair).unwrap();
        assert_eq!(signed.recover_signer().unwrap(), key_pair.address().unwrap());
    }

    #[test]
    fn test_tampered_transaction_fails() {
        let key_pair = KeyPair::generate();
        let tx = Transaction::new(
            DEFAULT_CHAIN_ID,
            0,
            Call::Approve {
                token: token(),
                spender: Account::Null,
                amount: tokens(1),
            },
        );

        let mut signed = tx.sign(&key_pair).unwrap();
        signed.transaction.nonce = 1;
        assert!(matches!(
            signed.recover_signer(),
            Err(KeyError::InvalidSignature)
        ));
    }
}
