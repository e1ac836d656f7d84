//! WebSocket push of applied calls
//!
//! Every receipt the chain applies is fanned out to connected clients, so
//! front ends can follow Transfer, Approval, Deposit and Withdraw events
//! without polling. Server events (welcome, heartbeat) share the socket.

use crate::chain::Receipt;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events buffered per subscriber
const BROADCAST_CAPACITY: usize = 100;

/// WebSocket events that can be broadcast to clients
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsEvent {
    /// A call was applied
    Receipt { receipt: Receipt },
    /// Connection established
    Connected { message: String },
    /// Heartbeat to keep connection alive
    Ping,
}

/// Broadcaster for WebSocket events
#[derive(Debug)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsEvent>,
}

impl WsBroadcaster {
    /// Create a new broadcaster
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    /// Broadcast an event to all connected clients
    pub fn broadcast(&self, event: WsEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<crate::api::handlers::ApiState>,
) -> impl IntoResponse {
    let broadcaster = state.ws_broadcaster.clone();
    let receipts = state.provider.chain().subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, broadcaster, receipts))
}

/// Next event for a client: a receipt from the chain or a server event
async fn next_event(
    events: &mut broadcast::Receiver<WsEvent>,
    receipts: &mut broadcast::Receiver<Receipt>,
) -> Option<WsEvent> {
    loop {
        let received = tokio::select! {
            event = events.recv() => event,
            receipt = receipts.recv() => receipt.map(|receipt| WsEvent::Receipt { receipt }),
        };
        match received {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("WebSocket client lagged, {} events dropped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

/// Handle a WebSocket connection
async fn handle_socket(
    socket: WebSocket,
    broadcaster: Arc<WsBroadcaster>,
    mut receipts: broadcast::Receiver<Receipt>,
) {
    let (mut sender, mut receiver) = socket.split();

    let mut rx = broadcaster.subscribe();

    // Send welcome message
    let welcome = WsEvent::Connected {
        message: "Connected to dapp-exchange".to_string(),
    };
    if let Ok(json) = serde_json::to_string(&welcome) {
        let _ = sender.send(Message::Text(json.into())).await;
    }

    // Forward receipts and server events to this client
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = next_event(&mut rx, &mut receipts).await {
            if let Ok(json) = serde_json::to_string(&event) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages (for ping/pong and graceful close)
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(Message::Text(text)) => {
                    log::debug!("Ignoring client message: {}", text);
                }
                Err(e) => {
                    log::warn!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    log::info!("WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcaster_creation() {
        let broadcaster = WsBroadcaster::new();
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_broadcast_with_no_subscribers() {
        let broadcaster = WsBroadcaster::new();
        // Should not panic even with no subscribers
        broadcaster.broadcast(WsEvent::Ping);
    }

    #[test]
    fn test_receipt_event_serialization() {
        let net = crate::chain::devnet(&crate::config::DevnetConfig::default()).unwrap();
        let mut state = net.state;
        let caller = net.keyring.addresses()[0];
        let receipt = state
            .execute(
                caller,
                crate::chain::Call::DepositToken {
                    token: crate::core::Asset::Native,
                    amount: 7,
                },
            )
            .unwrap();

        let json = serde_json::to_value(WsEvent::Receipt { receipt }).unwrap();
        assert_eq!(json["type"], "Receipt");
        assert_eq!(json["data"]["receipt"]["events"][0]["event"], "Deposit");
        assert_eq!(json["data"]["receipt"]["events"][0]["amount"], "7");
    }

    #[tokio::test]
    async fn test_chain_receipts_reach_clients() {
        let net = crate::chain::devnet(&crate::config::DevnetConfig::default()).unwrap();
        let caller = net.keyring.addresses()[0];
        let chain = crate::chain::ChainHandle::new(net.state);
        let broadcaster = WsBroadcaster::new();
        let mut events = broadcaster.subscribe();
        let mut receipts = chain.subscribe();

        // Applied outside the HTTP handlers
        chain
            .execute(
                caller,
                crate::chain::Call::DepositToken {
                    token: crate::core::Asset::Native,
                    amount: 3,
                },
            )
            .await
            .unwrap();

        match next_event(&mut events, &mut receipts).await {
            Some(WsEvent::Receipt { receipt }) => assert_eq!(receipt.caller, caller),
            other => panic!("expected a receipt, got {:?}", other),
        }

        broadcaster.broadcast(WsEvent::Ping);
        assert!(matches!(
            next_event(&mut events, &mut receipts).await,
            Some(WsEvent::Ping)
        ));
    }

    #[tokio::test]
    async fn test_subscriber_receives_broadcast() {
        let broadcaster = WsBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);

        broadcaster.broadcast(WsEvent::Ping);
        assert!(matches!(rx.recv().await.unwrap(), WsEvent::Ping));
    }
}
