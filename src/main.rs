//! dapp-exchange CLI Application
//!
//! A command-line interface for the token ledgers and the exchange.

use clap::{Parser, Subcommand};
use dapp_exchange::api::{create_router, ApiState, WsBroadcaster, WsEvent};
use dapp_exchange::chain::ChainHandle;
use dapp_exchange::cli::{self, AppState};
use dapp_exchange::provider::LocalProvider;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Interval between websocket heartbeats
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "dex")]
#[command(version)]
#[command(about = "ERC-20 style token ledgers with a deposit-tracking exchange", long_about = None)]
struct Cli {
    /// Data directory for chain storage
    #[arg(short, long, default_value = ".dex_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap a new devnet
    Init {
        /// Devnet configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the chain id
        #[arg(long)]
        chain_id: Option<u64>,

        /// Replace an existing chain
        #[arg(long)]
        force: bool,
    },

    /// List devnet accounts
    Accounts {
        /// Also print private keys, for importing into a browser wallet
        #[arg(long)]
        keys: bool,
    },

    /// Token ledger operations
    Token {
        #[command(subcommand)]
        action: TokenCommands,
    },

    /// Exchange operations
    Exchange {
        #[command(subcommand)]
        action: ExchangeCommands,
    },

    /// Show the event log
    Events {
        /// Emitting contract: a token symbol/address or "exchange"
        #[arg(short, long)]
        emitter: Option<String>,

        /// Event kind (transfer, approval, deposit, withdraw)
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// List state backups
    Backups,

    /// Replace the chain state with a backup
    Restore {
        /// Backup index (0 is the newest)
        index: usize,
    },

    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// List all tokens
    List,

    /// Show token metadata
    Info {
        /// Token symbol or address
        token: String,
    },

    /// Show a holder's balance
    Balance {
        token: String,
        /// Account index or address
        holder: String,
    },

    /// List every token an account holds
    Holdings {
        /// Account index or address
        holder: String,
    },

    /// Show an allowance
    Allowance {
        token: String,
        owner: String,
        spender: String,
    },

    /// Transfer tokens
    Transfer {
        /// Signer (account index or address)
        #[arg(short, long, default_value = "0")]
        from: String,
        token: String,
        to: String,
        /// Amount in whole tokens (decimals allowed)
        amount: String,
    },

    /// Approve a spender
    Approve {
        #[arg(short, long, default_value = "0")]
        from: String,
        token: String,
        spender: String,
        amount: String,
    },

    /// Spend an allowance: move tokens from `owner` to `to`
    TransferFrom {
        /// Signer spending the allowance
        #[arg(short, long)]
        from: String,
        token: String,
        owner: String,
        to: String,
        amount: String,
    },
}

#[derive(Subcommand)]
enum ExchangeCommands {
    /// Show exchange parameters and deposits
    Info,

    /// Deposit a token (approve the exchange first) or ETH
    Deposit {
        #[arg(short, long, default_value = "0")]
        from: String,
        /// Token symbol/address, or ETH for the native currency
        token: String,
        amount: String,
    },

    /// Withdraw a deposit
    Withdraw {
        #[arg(short, long, default_value = "0")]
        from: String,
        token: String,
        amount: String,
    },

    /// Show a user's deposit record
    Balance { token: String, user: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Handle init command separately (doesn't need full state)
    if let Commands::Init {
        config,
        chain_id,
        force,
    } = &cli.command
    {
        return cli::cmd_init(&cli.data_dir, config.as_deref(), *chain_id, *force);
    }

    // Initialize application state
    let mut state = AppState::new(cli.data_dir.clone())?;

    match cli.command {
        Commands::Init { .. } => unreachable!(),

        Commands::Accounts { keys } => cli::cmd_accounts(&state, keys)?,

        Commands::Token { action } => match action {
            TokenCommands::List => cli::cmd_token_list(&state)?,
            TokenCommands::Info { token } => cli::cmd_token_info(&state, &token)?,
            TokenCommands::Balance { token, holder } => {
                cli::cmd_token_balance(&state, &token, &holder)?
            }
            TokenCommands::Holdings { holder } => cli::cmd_token_holdings(&state, &holder)?,
            TokenCommands::Allowance {
                token,
                owner,
                spender,
            } => cli::cmd_token_allowance(&state, &token, &owner, &spender)?,
            TokenCommands::Transfer {
                from,
                token,
                to,
                amount,
            } => cli::cmd_token_transfer(&mut state, &from, &token, &to, &amount)?,
            TokenCommands::Approve {
                from,
                token,
                spender,
                amount,
            } => cli::cmd_token_approve(&mut state, &from, &token, &spender, &amount)?,
            TokenCommands::TransferFrom {
                from,
                token,
                owner,
                to,
                amount,
            } => cli::cmd_token_transfer_from(&mut state, &from, &token, &owner, &to, &amount)?,
        },

        Commands::Exchange { action } => match action {
            ExchangeCommands::Info => cli::cmd_exchange_info(&state)?,
            ExchangeCommands::Deposit {
                from,
                token,
                amount,
            } => cli::cmd_exchange_deposit(&mut state, &from, &token, &amount)?,
            ExchangeCommands::Withdraw {
                from,
                token,
                amount,
            } => cli::cmd_exchange_withdraw(&mut state, &from, &token, &amount)?,
            ExchangeCommands::Balance { token, user } => {
                cli::cmd_exchange_balance(&state, &token, &user)?
            }
        },

        Commands::Events { emitter, kind } => {
            cli::cmd_events(&state, emitter.as_deref(), kind.as_deref())?
        }

        Commands::Backups => cli::cmd_backups(&state)?,
        Commands::Restore { index } => cli::cmd_restore(&mut state, index)?,

        Commands::Serve { port } => run_server(state, port)?,
    }

    Ok(())
}

fn run_server(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let AppState {
            chain,
            keyring,
            storage,
            ..
        } = state;

        let api_state = ApiState {
            provider: LocalProvider::new(ChainHandle::new(chain), keyring),
            storage: Arc::new(storage),
            ws_broadcaster: Arc::new(WsBroadcaster::new()),
        };

        // Keep idle websocket clients alive
        let heartbeat = api_state.ws_broadcaster.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
            loop {
                interval.tick().await;
                heartbeat.broadcast(WsEvent::Ping);
            }
        });

        // Handle Ctrl+C with graceful shutdown
        let shutdown_state = api_state.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            println!("\n📴 Shutting down API server...");

            let snapshot = shutdown_state.provider.chain().snapshot().await;
            match shutdown_state.storage.save(&snapshot) {
                Ok(_) => println!("✅ Chain state saved (height {})", snapshot.height()),
                Err(e) => log::error!("Failed to save chain state: {}", e),
            }
            std::process::exit(0);
        });

        let app = create_router(api_state);

        let addr = format!("0.0.0.0:{}", port);
        println!("🚀 REST API server starting on http://localhost:{}", port);
        println!();
        println!("📖 Available endpoints:");
        println!("   GET  /health                                  - Health check");
        println!("   GET  /ws                                      - WebSocket receipts");
        println!("   GET  /api/network                             - Chain stats, accounts");
        println!("   GET  /api/tokens                              - List tokens");
        println!("   GET  /api/tokens/{{addr}}/balance/{{holder}}      - Token balance");
        println!("   GET  /api/tokens/{{addr}}/allowance?owner=&spender= - Allowance");
        println!("   GET  /api/accounts/{{holder}}/tokens             - Holdings");
        println!("   GET  /api/exchange                            - Exchange info");
        println!("   GET  /api/exchange/balance/{{token}}/{{user}}     - Deposit record");
        println!("   POST /api/transactions                        - Submit signed tx");
        println!("   POST /api/send                                - Send from unlocked account");
        println!("   GET  /api/events                              - Event log");
        println!();

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}
