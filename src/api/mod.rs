//! REST API module
//!
//! HTTP access to the token ledgers and the exchange.
//!
//! # Endpoints
//!
//! ## Network
//! - `GET /health` - Liveness, chain id and height
//! - `GET /api/network` - Chain stats and unlocked accounts
//!
//! ## Tokens
//! - `GET /api/tokens` - List tokens
//! - `GET /api/tokens/{address}` - Token metadata
//! - `GET /api/tokens/{address}/balance/{holder}` - Balance
//! - `GET /api/tokens/{address}/allowance?owner=&spender=` - Allowance
//! - `GET /api/accounts/{holder}/tokens` - Non-zero balances of a holder
//!
//! ## Exchange
//! - `GET /api/exchange` - Fee parameters and deposit totals
//! - `GET /api/exchange/balance/{token}/{user}` - Deposit record
//!
//! ## Calls
//! - `POST /api/transactions` - Submit a signed transaction
//! - `POST /api/send` - Sign with an unlocked account and submit
//! - `GET /api/events?emitter=&kind=` - Event log
//!
//! ## WebSocket
//! - `GET /ws` - Receipts of applied calls

pub mod handlers;
pub mod routes;
pub mod websocket;

pub use handlers::ApiState;
pub use routes::create_router;
pub use websocket::{WsBroadcaster, WsEvent};
