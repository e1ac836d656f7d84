//! REST API handlers for ledger and exchange operations

use crate::api::websocket::WsBroadcaster;
use crate::chain::{Call, ChainError, ChainStats, EventFilter, Receipt, SignedTransaction};
use crate::core::{Account, Address, Asset, Event, EventKind};
use crate::exchange::ExchangeError;
use crate::provider::{LocalProvider, Provider, ProviderError};
use crate::storage::Storage;
use crate::token::{Token, TokenError};
use crate::wallet::WalletError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub provider: LocalProvider,
    pub storage: Arc<Storage>,
    pub ws_broadcaster: Arc<WsBroadcaster>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

fn api_error(status: StatusCode, error: impl ToString) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: error.to_string(),
        }),
    )
}

fn bad_address(e: impl ToString) -> (StatusCode, Json<ApiError>) {
    api_error(StatusCode::BAD_REQUEST, format!("Invalid address: {}", e.to_string()))
}

/// Status code for a rejected call
fn chain_status(error: &ChainError) -> StatusCode {
    match error {
        ChainError::Token(TokenError::TokenNotFound(_))
        | ChainError::Exchange(ExchangeError::Token(TokenError::TokenNotFound(_)))
        | ChainError::NoExchange => StatusCode::NOT_FOUND,
        ChainError::Key(_) => StatusCode::UNAUTHORIZED,
        ChainError::WrongChainId { .. } | ChainError::InvalidNonce { .. } => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn provider_error(error: ProviderError) -> (StatusCode, Json<ApiError>) {
    let status = match &error {
        ProviderError::Chain(e) => chain_status(e),
        ProviderError::Wallet(WalletError::UnknownSigner(_)) => StatusCode::NOT_FOUND,
        ProviderError::Token(TokenError::TokenNotFound(_)) => StatusCode::NOT_FOUND,
        ProviderError::ExchangeNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    api_error(status, error)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub chain_id: u64,
    pub height: u64,
}

#[derive(Serialize)]
pub struct NetworkResponse {
    pub accounts: Vec<Address>,
    #[serde(flatten)]
    pub stats: ChainStats,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: String,
    pub creator: Address,
    pub created_at: DateTime<Utc>,
    pub holder_count: usize,
}

impl From<&Token> for TokenResponse {
    fn from(token: &Token) -> Self {
        Self {
            address: token.address,
            name: token.name().to_string(),
            symbol: token.symbol().to_string(),
            decimals: token.decimals(),
            total_supply: token.total_supply().to_string(),
            creator: token.metadata.creator,
            created_at: token.metadata.created_at,
            holder_count: token.holder_count(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenBalanceResponse {
    pub token: Address,
    pub holder: Address,
    pub balance: String,
}

#[derive(Debug, Serialize)]
pub struct HoldingResponse {
    pub token: Address,
    pub symbol: String,
    pub balance: String,
}

#[derive(Debug, Serialize)]
pub struct AllowanceResponse {
    pub token: Address,
    pub owner: Address,
    pub spender: Account,
    pub allowance: String,
}

#[derive(Debug, Serialize)]
pub struct ExchangeResponse {
    pub address: Address,
    pub fee_account: Address,
    pub fee_percent: u8,
    /// Total recorded deposits per asset
    pub deposits: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct ExchangeBalanceResponse {
    pub exchange: Address,
    pub token: Asset,
    pub user: Address,
    pub balance: String,
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct AllowanceQuery {
    pub owner: String,
    pub spender: String,
}

/// Unlocked-account send: the server signs with its keyring
#[derive(Deserialize)]
pub struct SendRequest {
    /// Account index or address
    pub from: String,
    pub call: Call,
}

#[derive(Deserialize, Default)]
pub struct EventsQuery {
    pub emitter: Option<String>,
    pub kind: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let chain = state.provider.chain().read().await;
    Json(HealthResponse {
        status: "ok",
        chain_id: chain.chain_id,
        height: chain.height(),
    })
}

/// GET /api/network - Chain id, height and unlocked accounts
pub async fn get_network(State(state): State<ApiState>) -> Json<NetworkResponse> {
    let stats = state.provider.chain().read().await.stats();
    Json(NetworkResponse {
        accounts: state.provider.keyring().addresses(),
        stats,
    })
}

/// GET /api/tokens - List all tokens
pub async fn list_tokens(State(state): State<ApiState>) -> Json<Vec<TokenResponse>> {
    let chain = state.provider.chain().read().await;
    Json(chain.tokens.list().into_iter().map(TokenResponse::from).collect())
}

/// GET /api/tokens/{address} - Get token info
pub async fn get_token(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> ApiResult<TokenResponse> {
    let address = Address::parse(&address).map_err(bad_address)?;
    let chain = state.provider.chain().read().await;

    match chain.tokens.get(&address) {
        Some(token) => Ok(Json(TokenResponse::from(token))),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Token not found: {}", address),
        )),
    }
}

/// GET /api/tokens/{address}/balance/{holder} - Get token balance
pub async fn get_token_balance(
    State(state): State<ApiState>,
    Path((token, holder)): Path<(String, String)>,
) -> ApiResult<TokenBalanceResponse> {
    let token = Address::parse(&token).map_err(bad_address)?;
    let holder = Address::parse(&holder).map_err(bad_address)?;

    let balance = state
        .provider
        .balance_of(token, holder)
        .await
        .map_err(provider_error)?;

    Ok(Json(TokenBalanceResponse {
        token,
        holder,
        balance: balance.to_string(),
    }))
}

/// GET /api/tokens/{address}/allowance?owner=&spender= - Get allowance
pub async fn get_token_allowance(
    State(state): State<ApiState>,
    Path(token): Path<String>,
    Query(query): Query<AllowanceQuery>,
) -> ApiResult<AllowanceResponse> {
    let token = Address::parse(&token).map_err(bad_address)?;
    let owner = Address::parse(&query.owner).map_err(bad_address)?;
    let spender = Account::parse(&query.spender).map_err(bad_address)?;

    let chain = state.provider.chain().read().await;
    let ledger = chain
        .tokens
        .require(&token)
        .map_err(|e| api_error(StatusCode::NOT_FOUND, e))?;
    let allowance = spender.address().map_or(0, |s| ledger.allowance(&owner, &s));

    Ok(Json(AllowanceResponse {
        token,
        owner,
        spender,
        allowance: allowance.to_string(),
    }))
}

/// GET /api/accounts/{holder}/tokens - Every token the holder has a balance in
pub async fn get_holdings(
    State(state): State<ApiState>,
    Path(holder): Path<String>,
) -> ApiResult<Vec<HoldingResponse>> {
    let holder = Address::parse(&holder).map_err(bad_address)?;
    let chain = state.provider.chain().read().await;

    Ok(Json(
        chain
            .tokens
            .tokens_for_holder(&holder)
            .into_iter()
            .map(|(token, balance)| HoldingResponse {
                token: token.address,
                symbol: token.symbol().to_string(),
                balance: balance.to_string(),
            })
            .collect(),
    ))
}

/// GET /api/exchange - Exchange parameters and deposit totals
pub async fn get_exchange(State(state): State<ApiState>) -> ApiResult<ExchangeResponse> {
    let chain = state.provider.chain().read().await;
    let exchange = chain
        .require_exchange()
        .map_err(|e| api_error(StatusCode::NOT_FOUND, e))?;

    let summary = exchange
        .summary()
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    Ok(Json(ExchangeResponse {
        address: exchange.address,
        fee_account: exchange.fee_account(),
        fee_percent: exchange.fee_percent(),
        deposits: summary
            .into_iter()
            .map(|(asset, total)| (asset.to_string(), total.to_string()))
            .collect(),
    }))
}

/// GET /api/exchange/balance/{token}/{user} - Deposit record of a user
///
/// `token` may be the zero address for the native currency.
pub async fn get_exchange_balance(
    State(state): State<ApiState>,
    Path((token, user)): Path<(String, String)>,
) -> ApiResult<ExchangeBalanceResponse> {
    let asset = Asset::parse(&token).map_err(bad_address)?;
    let user = Address::parse(&user).map_err(bad_address)?;

    let chain = state.provider.chain().read().await;
    let exchange = chain
        .require_exchange()
        .map_err(|e| api_error(StatusCode::NOT_FOUND, e))?;

    Ok(Json(ExchangeBalanceResponse {
        exchange: exchange.address,
        token: asset,
        user,
        balance: exchange.tokens(&asset, &user).to_string(),
    }))
}

/// POST /api/transactions - Submit a signed transaction
pub async fn submit_transaction(
    State(state): State<ApiState>,
    Json(signed): Json<SignedTransaction>,
) -> ApiResult<Receipt> {
    let receipt = state
        .provider
        .chain()
        .submit(&signed)
        .await
        .map_err(|e| {
            log::warn!("Rejected transaction {}: {}", signed.hash(), e);
            api_error(chain_status(&e), e)
        })?;

    after_receipt(&state).await;
    Ok(Json(receipt))
}

/// POST /api/send - Sign with an unlocked devnet account and submit
pub async fn send_call(
    State(state): State<ApiState>,
    Json(req): Json<SendRequest>,
) -> ApiResult<Receipt> {
    let from = state
        .provider
        .keyring()
        .resolve(&req.from)
        .map_err(|e| api_error(StatusCode::NOT_FOUND, e))?
        .address();

    let method = req.call.method();
    let receipt = state.provider.send(from, req.call).await.map_err(|e| {
        log::warn!("Rejected {} from {}: {}", method, from, e);
        provider_error(e)
    })?;

    after_receipt(&state).await;
    Ok(Json(receipt))
}

/// GET /api/events?emitter=&kind= - Query the event log
pub async fn get_events(
    State(state): State<ApiState>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Vec<Event>> {
    let emitter = query
        .emitter
        .as_deref()
        .map(Address::parse)
        .transpose()
        .map_err(bad_address)?;
    let kind = query
        .kind
        .as_deref()
        .map(str::parse::<EventKind>)
        .transpose()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    let chain = state.provider.chain().read().await;
    Ok(Json(chain.events(&EventFilter { emitter, kind })))
}

/// Persist the state after an applied call
///
/// Websocket clients get the receipt from the chain's own broadcast.
async fn after_receipt(state: &ApiState) {
    let snapshot = state.provider.chain().snapshot().await;
    let storage = state.storage.clone();
    match tokio::task::spawn_blocking(move || storage.save(&snapshot)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => log::error!("Failed to save chain state: {}", e),
        Err(e) => log::error!("Save task failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{devnet, ChainHandle};
    use crate::config::{Deployments, DevnetConfig};
    use crate::core::tokens;
    use crate::storage::StorageConfig;

    fn setup(dir: &std::path::Path) -> (ApiState, Deployments) {
        setup_with(dir, &DevnetConfig::default())
    }

    fn setup_with(dir: &std::path::Path, config: &DevnetConfig) -> (ApiState, Deployments) {
        let net = devnet(config).unwrap();
        let storage = Storage::new(StorageConfig {
            data_dir: dir.to_path_buf(),
            ..Default::default()
        })
        .unwrap();
        let state = ApiState {
            provider: LocalProvider::new(ChainHandle::new(net.state), net.keyring),
            storage: Arc::new(storage),
            ws_broadcaster: Arc::new(WsBroadcaster::new()),
        };
        (state, net.deployments)
    }

    #[tokio::test]
    async fn test_token_queries() {
        let dir = tempfile::tempdir().unwrap();
        let (state, deployments) = setup(dir.path());
        let dapp = deployments.network(31337).unwrap().token("DAPP").unwrap();
        let deployer = state.provider.keyring().addresses()[0];

        let Json(list) = list_tokens(State(state.clone())).await;
        assert_eq!(list.len(), 3);

        let Json(network) = get_network(State(state.clone())).await;
        let network = serde_json::to_value(&network).unwrap();
        assert_eq!(network["accounts"].as_array().unwrap().len(), 10);
        assert_eq!(network["native_holders"], 10);
        assert_eq!(network["chain_id"], 31337);

        let Json(balance) = get_token_balance(
            State(state.clone()),
            Path((dapp.to_string(), deployer.to_string())),
        )
        .await
        .unwrap();
        assert_eq!(balance.balance, tokens(1_000_000).to_string());

        let Json(holdings) = get_holdings(State(state.clone()), Path(deployer.to_string()))
            .await
            .unwrap();
        assert_eq!(holdings.len(), 3);
        assert!(holdings.iter().any(|h| h.token == dapp && h.symbol == "DAPP"));

        let receiver = state.provider.keyring().addresses()[5];
        let Json(holdings) = get_holdings(State(state.clone()), Path(receiver.to_string()))
            .await
            .unwrap();
        assert!(holdings.is_empty());

        let err = get_token(State(state.clone()), Path(deployer.to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);

        let err = get_token(State(state), Path("0xnothex".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_send_and_query_events() {
        let dir = tempfile::tempdir().unwrap();
        let (state, deployments) = setup(dir.path());
        let dapp = deployments.network(31337).unwrap().token("DAPP").unwrap();
        let receiver = state.provider.keyring().addresses()[1];
        let mut receipts = state.provider.chain().subscribe();

        let Json(receipt) = send_call(
            State(state.clone()),
            Json(SendRequest {
                from: "0".to_string(),
                call: Call::Transfer {
                    token: dapp,
                    to: receiver.into(),
                    amount: tokens(5),
                },
            }),
        )
        .await
        .unwrap();
        assert_eq!(receipt.events.len(), 1);
        assert!(state.storage.exists());
        assert_eq!(receipts.try_recv().unwrap().hash, receipt.hash);

        let Json(events) = get_events(
            State(state.clone()),
            Query(EventsQuery {
                emitter: Some(dapp.to_string()),
                kind: Some("transfer".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_sends_keep_state_file_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = setup(dir.path());

        let mut tasks = Vec::new();
        for account in 0..10 {
            let state = state.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..5 {
                    send_call(
                        State(state.clone()),
                        Json(SendRequest {
                            from: account.to_string(),
                            call: Call::DepositToken {
                                token: Asset::Native,
                                amount: 1,
                            },
                        }),
                    )
                    .await
                    .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let loaded = state.storage.load().unwrap();
        assert_eq!(loaded.height(), 50);
        assert_eq!(
            loaded.require_exchange().unwrap().total_deposits(&Asset::Native).unwrap(),
            50
        );
    }

    #[tokio::test]
    async fn test_exchange_totals_overflow_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = DevnetConfig {
            accounts: 2,
            native_balance: "200000000000000000000".to_string(),
            ..Default::default()
        };
        let (state, _) = setup_with(dir.path(), &config);

        // Each record fits, their sum does not
        for from in ["0", "1"] {
            send_call(
                State(state.clone()),
                Json(SendRequest {
                    from: from.to_string(),
                    call: Call::DepositToken {
                        token: Asset::Native,
                        amount: 200_000_000_000_000_000_000 * crate::core::ONE_TOKEN,
                    },
                }),
            )
            .await
            .unwrap();
        }

        let (status, Json(body)) = get_exchange(State(state)).await.unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.error.contains("overflow"));
    }

    #[tokio::test]
    async fn test_rejected_send_maps_status() {
        let dir = tempfile::tempdir().unwrap();
        let (state, deployments) = setup(dir.path());
        let dapp = deployments.network(31337).unwrap().token("DAPP").unwrap();
        let receiver = state.provider.keyring().addresses()[1];

        // Account 2 holds no DAPP
        let (status, Json(body)) = send_call(
            State(state.clone()),
            Json(SendRequest {
                from: "2".to_string(),
                call: Call::Transfer {
                    token: dapp,
                    to: receiver.into(),
                    amount: 1,
                },
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Not enough tokens");

        let (status, _) = send_call(
            State(state),
            Json(SendRequest {
                from: "42".to_string(),
                call: Call::Transfer {
                    token: dapp,
                    to: receiver.into(),
                    amount: 1,
                },
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_exchange_balance_native() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = setup(dir.path());
        let user = state.provider.keyring().addresses()[3];

        send_call(
            State(state.clone()),
            Json(SendRequest {
                from: "3".to_string(),
                call: Call::DepositToken {
                    token: Asset::Native,
                    amount: tokens(2),
                },
            }),
        )
        .await
        .unwrap();

        let Json(balance) = get_exchange_balance(
            State(state.clone()),
            Path((crate::core::ZERO_ADDRESS.to_string(), user.to_string())),
        )
        .await
        .unwrap();
        assert_eq!(balance.token, Asset::Native);
        assert_eq!(balance.balance, tokens(2).to_string());

        let Json(exchange) = get_exchange(State(state)).await.unwrap();
        assert_eq!(exchange.fee_percent, 10);
        assert_eq!(exchange.deposits.len(), 1);
    }
}
