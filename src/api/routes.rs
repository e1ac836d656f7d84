//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use crate::api::websocket::ws_handler;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// JSON 404 for unknown routes
async fn fallback_handler(uri: axum::http::Uri) -> Response {
    log::debug!("No route for {}", uri.path());
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "application/json")],
        Body::from(r#"{"error":"Not Found"}"#),
    )
        .into_response()
}

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // WebSocket for receipts
        .route("/ws", get(ws_handler))
        .route("/api/network", get(handlers::get_network))
        // Tokens
        .route("/api/tokens", get(handlers::list_tokens))
        .route("/api/tokens/{address}", get(handlers::get_token))
        .route(
            "/api/tokens/{address}/balance/{holder}",
            get(handlers::get_token_balance),
        )
        .route(
            "/api/tokens/{address}/allowance",
            get(handlers::get_token_allowance),
        )
        .route("/api/accounts/{holder}/tokens", get(handlers::get_holdings))
        // Exchange
        .route("/api/exchange", get(handlers::get_exchange))
        .route(
            "/api/exchange/balance/{token}/{user}",
            get(handlers::get_exchange_balance),
        )
        // Calls
        .route("/api/transactions", post(handlers::submit_transaction))
        .route("/api/send", post(handlers::send_call))
        .route("/api/events", get(handlers::get_events))
        .fallback(fallback_handler)
        .with_state(state)
        .layer(cors)
}
