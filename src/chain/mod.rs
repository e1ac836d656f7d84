//! Ledger runtime
//!
//! Hosts every token ledger and the exchange, applies calls one at a time,
//! and keeps receipts plus the event log.
//!
//! Mutations go through [`ChainHandle`], which wraps the state in a
//! `tokio::sync::RwLock`: readers run concurrently, writers are serialized,
//! so no two calls ever interleave.

pub mod genesis;
pub mod state;
pub mod transaction;

pub use genesis::{devnet, Devnet, GenesisError};
pub use state::{ChainError, ChainState, ChainStats, EventFilter};
pub use transaction::{Call, Receipt, SignedTransaction, Transaction, DEFAULT_CHAIN_ID};

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock, RwLockReadGuard};

/// Receipts buffered per subscriber
const RECEIPT_CHANNEL_CAPACITY: usize = 256;

/// Shared, single-writer access to a [`ChainState`]
#[derive(Clone)]
pub struct ChainHandle {
    state: Arc<RwLock<ChainState>>,
    receipts: broadcast::Sender<Receipt>,
}

impl ChainHandle {
    pub fn new(state: ChainState) -> Self {
        let (receipts, _) = broadcast::channel(RECEIPT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(state)),
            receipts,
        }
    }

    /// Read access for queries
    pub async fn read(&self) -> RwLockReadGuard<'_, ChainState> {
        self.state.read().await
    }

    /// Verify and apply a signed transaction
    pub async fn submit(&self, signed: &SignedTransaction) -> Result<Receipt, ChainError> {
        let receipt = self.state.write().await.submit(signed)?;
        let _ = self.receipts.send(receipt.clone());
        Ok(receipt)
    }

    /// Apply a call for a trusted caller
    pub async fn execute(&self, caller: crate::core::Address, call: Call) -> Result<Receipt, ChainError> {
        let receipt = self.state.write().await.execute(caller, call)?;
        let _ = self.receipts.send(receipt.clone());
        Ok(receipt)
    }

    /// Subscribe to receipts of calls applied from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Receipt> {
        self.receipts.subscribe()
    }

    /// Clone of the current state, for persistence
    pub async fn snapshot(&self) -> ChainState {
        self.state.read().await.clone()
    }
}
