//! CLI commands for the ledger and the exchange
//!
//! Implements all command handlers for the CLI interface. Every mutating
//! command signs a transaction with a devnet account and persists the state.

use crate::chain::{devnet, Call, ChainState, EventFilter, Receipt};
use crate::config::{Deployments, DevnetConfig};
use crate::core::{format_units, parse_units, Account, Address, Asset, Event, EventKind, DECIMALS};
use crate::storage::{Storage, StorageConfig};
use crate::wallet::Keyring;
use std::path::{Path, PathBuf};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// File inside the data directory holding the devnet configuration
pub const DEVNET_CONFIG_FILE: &str = "devnet.json";

/// Application state
pub struct AppState {
    pub chain: ChainState,
    pub keyring: Keyring,
    pub deployments: Deployments,
    pub storage: Storage,
    pub config: DevnetConfig,
}

fn open_storage(data_dir: &Path) -> CliResult<Storage> {
    Ok(Storage::new(StorageConfig {
        data_dir: data_dir.to_path_buf(),
        ..Default::default()
    })?)
}

fn load_config(data_dir: &Path) -> CliResult<DevnetConfig> {
    let path = data_dir.join(DEVNET_CONFIG_FILE);
    if path.exists() {
        Ok(DevnetConfig::load(&path)?)
    } else {
        Ok(DevnetConfig::default())
    }
}

impl AppState {
    /// Load the chain from `data_dir`, bootstrapping a devnet if there is none
    pub fn new(data_dir: PathBuf) -> CliResult<Self> {
        let storage = open_storage(&data_dir)?;

        if !storage.exists() {
            println!("🆕 No chain found, bootstrapping devnet...");
            cmd_init(&data_dir, None, None, false)?;
        }

        let config = load_config(&data_dir)?;
        let keyring = Keyring::from_seed(&config.seed, config.accounts)?;
        let chain = storage.load()?;
        let deployments = storage.load_deployments()?;

        Ok(Self {
            chain,
            keyring,
            deployments,
            storage,
            config,
        })
    }

    /// Save the current state
    pub fn save(&self) -> CliResult<()> {
        self.storage.save(&self.chain)?;
        Ok(())
    }

    /// Token address from a symbol or an address
    pub fn resolve_token(&self, token: &str) -> CliResult<Address> {
        if let Some(found) = self.chain.tokens.find_by_symbol(token) {
            return Ok(found.address);
        }
        let address = Address::parse(token)?;
        self.chain.tokens.require(&address)?;
        Ok(address)
    }

    /// Asset from "ETH"/"native", the zero address, or a token
    pub fn resolve_asset(&self, asset: &str) -> CliResult<Asset> {
        if asset.eq_ignore_ascii_case("eth") || asset.eq_ignore_ascii_case("native") {
            return Ok(Asset::Native);
        }
        if let Ok(Asset::Native) = Asset::parse(asset) {
            return Ok(Asset::Native);
        }
        Ok(Asset::Token(self.resolve_token(asset)?))
    }

    /// Account from a keyring index or an address (the zero address is null)
    pub fn resolve_account(&self, account: &str) -> CliResult<Account> {
        if account.parse::<usize>().is_ok() {
            return Ok(self.keyring.resolve(account)?.address().into());
        }
        Ok(Account::parse(account)?)
    }

    pub fn resolve_address(&self, address: &str) -> CliResult<Address> {
        match self.resolve_account(address)? {
            Account::Address(address) => Ok(address),
            Account::Null => Err("the zero address is not an account".into()),
        }
    }

    /// Sign `call` as `from`, apply it and persist the result
    pub fn send(&mut self, from: &str, call: Call) -> CliResult<Receipt> {
        let wallet = self.keyring.resolve(from)?;
        let nonce = self.chain.nonce(&wallet.address());
        let signed = wallet.sign_call(self.chain.chain_id, nonce, call)?;

        let receipt = self.chain.submit(&signed)?;
        self.save()?;
        Ok(receipt)
    }

    fn symbol_of(&self, asset: &Asset) -> String {
        match asset {
            Asset::Native => "ETH".to_string(),
            Asset::Token(address) => self
                .chain
                .tokens
                .get(address)
                .map(|t| t.symbol().to_string())
                .unwrap_or_else(|| address.to_string()),
        }
    }
}

fn amount(value: &str) -> CliResult<u128> {
    Ok(parse_units(value, DECIMALS)?)
}

fn print_event(state: &AppState, event: &Event) {
    match event {
        Event::Transfer {
            token,
            from,
            to,
            value,
        } => println!(
            "   ├─ Transfer {} {} from {} to {}",
            format_units(*value, DECIMALS),
            state.symbol_of(&Asset::Token(*token)),
            from,
            to
        ),
        Event::Approval {
            token,
            owner,
            spender,
            value,
        } => println!(
            "   ├─ Approval {} {} owner {} spender {}",
            format_units(*value, DECIMALS),
            state.symbol_of(&Asset::Token(*token)),
            owner,
            spender
        ),
        Event::Deposit {
            token,
            user,
            amount,
            balance,
            ..
        } => println!(
            "   ├─ Deposit {} {} by {} (balance {})",
            format_units(*amount, DECIMALS),
            state.symbol_of(token),
            user,
            format_units(*balance, DECIMALS)
        ),
        Event::Withdraw {
            token,
            user,
            amount,
            balance,
            ..
        } => println!(
            "   ├─ Withdraw {} {} by {} (balance {})",
            format_units(*amount, DECIMALS),
            state.symbol_of(token),
            user,
            format_units(*balance, DECIMALS)
        ),
    }
}

fn print_receipt(state: &AppState, receipt: &Receipt) {
    println!("✅ {} applied at height {}", receipt.call.method(), receipt.height);
    for event in &receipt.events {
        print_event(state, event);
    }
    println!("   └─ Tx: {}", receipt.hash);
}

/// Bootstrap a new devnet in `data_dir`
///
/// `chain_id` overrides the value from the config file.
pub fn cmd_init(
    data_dir: &Path,
    config_path: Option<&Path>,
    chain_id: Option<u64>,
    force: bool,
) -> CliResult<()> {
    let storage = open_storage(data_dir)?;

    if storage.exists() && !force {
        println!("⚠️  Chain already exists at {:?}", data_dir);
        println!("   Use --force to reinitialize (this will delete existing data)");
        return Ok(());
    }

    let mut config = match config_path {
        Some(path) => DevnetConfig::load(path)?,
        None => DevnetConfig::default(),
    };
    if let Some(chain_id) = chain_id {
        config.chain_id = chain_id;
    }
    let net = devnet(&config)?;

    config.save(&data_dir.join(DEVNET_CONFIG_FILE))?;
    storage.save(&net.state)?;
    storage.save_deployments(&net.deployments)?;

    println!("✅ Devnet initialized!");
    println!("   📁 Data directory: {:?}", data_dir);
    println!("   🔗 Chain ID: {}", net.state.chain_id);
    if let Some(network) = net.deployments.network(net.state.chain_id) {
        for (symbol, entry) in &network.tokens {
            println!("   🪙 {}: {}", symbol, entry.address);
        }
        if let Some(exchange) = &network.exchange {
            println!("   🏦 Exchange: {}", exchange.address);
        }
    }

    Ok(())
}

/// List devnet accounts with their native balances
pub fn cmd_accounts(state: &AppState, show_keys: bool) -> CliResult<()> {
    println!("👛 Accounts ({}):", state.keyring.len());
    for (index, address) in state.keyring.addresses().iter().enumerate() {
        let marker = if index as u32 == state.config.fee_account_index {
            " (fee account)"
        } else {
            ""
        };
        println!(
            "   [{}] {}  {} ETH  nonce {}{}",
            index,
            address,
            format_units(state.chain.native_balance(address), DECIMALS),
            state.chain.nonce(address),
            marker
        );
        if show_keys {
            let wallet = state.keyring.require(address)?;
            println!("       Private key: {}", wallet.private_key());
        }
    }
    if show_keys {
        println!("⚠️  Devnet keys only. Never use them on a real network.");
    }
    Ok(())
}

pub fn cmd_token_list(state: &AppState) -> CliResult<()> {
    let tokens = state.chain.tokens.list();
    if tokens.is_empty() {
        println!("🪙 No tokens deployed.");
        return Ok(());
    }

    println!("🪙 Tokens ({}):", tokens.len());
    for token in tokens {
        println!(
            "   {:<6} {}  supply {}",
            token.symbol(),
            token.address,
            format_units(token.total_supply(), token.decimals())
        );
    }
    Ok(())
}

pub fn cmd_token_info(state: &AppState, token: &str) -> CliResult<()> {
    let address = state.resolve_token(token)?;
    let token = state.chain.tokens.require(&address)?;

    println!("🪙 {} ({})", token.name(), token.symbol());
    println!("   Address: {}", token.address);
    println!("   Decimals: {}", token.decimals());
    println!(
        "   Total supply: {}",
        format_units(token.total_supply(), token.decimals())
    );
    println!("   Creator: {}", token.metadata.creator);
    println!("   Holders: {}", token.holder_count());
    Ok(())
}

pub fn cmd_token_balance(state: &AppState, token: &str, holder: &str) -> CliResult<()> {
    let token = state.resolve_token(token)?;
    let holder = state.resolve_address(holder)?;
    let balance = state.chain.tokens.balance_of(&token, &holder)?;

    println!(
        "💰 {} {}",
        format_units(balance, DECIMALS),
        state.symbol_of(&Asset::Token(token))
    );
    Ok(())
}

/// List every token `holder` has a balance in
pub fn cmd_token_holdings(state: &AppState, holder: &str) -> CliResult<()> {
    let holder = state.resolve_address(holder)?;
    let holdings = state.chain.tokens.tokens_for_holder(&holder);
    if holdings.is_empty() {
        println!("💰 {} holds no tokens.", holder);
        return Ok(());
    }

    println!("💰 Holdings of {}:", holder);
    for (token, balance) in holdings {
        println!(
            "   {:<6} {}",
            token.symbol(),
            format_units(balance, token.decimals())
        );
    }
    Ok(())
}

pub fn cmd_token_allowance(state: &AppState, token: &str, owner: &str, spender: &str) -> CliResult<()> {
    let token = state.resolve_token(token)?;
    let owner = state.resolve_address(owner)?;
    let spender = state.resolve_account(spender)?;
    let allowance = match spender.address() {
        Some(spender) => state.chain.tokens.allowance(&token, &owner, &spender)?,
        None => 0,
    };

    println!(
        "🔓 {} may spend {} {} of {}",
        spender,
        format_units(allowance, DECIMALS),
        state.symbol_of(&Asset::Token(token)),
        owner
    );
    Ok(())
}

pub fn cmd_token_transfer(
    state: &mut AppState,
    from: &str,
    token: &str,
    to: &str,
    value: &str,
) -> CliResult<()> {
    let call = Call::Transfer {
        token: state.resolve_token(token)?,
        to: state.resolve_account(to)?,
        amount: amount(value)?,
    };
    let receipt = state.send(from, call)?;
    print_receipt(state, &receipt);
    Ok(())
}

pub fn cmd_token_approve(
    state: &mut AppState,
    from: &str,
    token: &str,
    spender: &str,
    value: &str,
) -> CliResult<()> {
    let call = Call::Approve {
        token: state.resolve_token(token)?,
        spender: state.resolve_account(spender)?,
        amount: amount(value)?,
    };
    let receipt = state.send(from, call)?;
    print_receipt(state, &receipt);
    Ok(())
}

/// Move `owner`'s tokens to `to`, spending the allowance of signer `from`
pub fn cmd_token_transfer_from(
    state: &mut AppState,
    from: &str,
    token: &str,
    owner: &str,
    to: &str,
    value: &str,
) -> CliResult<()> {
    let call = Call::TransferFrom {
        token: state.resolve_token(token)?,
        from: state.resolve_address(owner)?,
        to: state.resolve_account(to)?,
        amount: amount(value)?,
    };
    let receipt = state.send(from, call)?;
    print_receipt(state, &receipt);
    Ok(())
}

pub fn cmd_exchange_info(state: &AppState) -> CliResult<()> {
    let exchange = state.chain.require_exchange()?;

    println!("🏦 Exchange: {}", exchange.address);
    println!("   Fee account: {}", exchange.fee_account());
    println!("   Fee percent: {}%", exchange.fee_percent());

    let summary = exchange.summary()?;
    if summary.is_empty() {
        println!("   No deposits yet.");
    }
    for (asset, total) in summary {
        println!(
            "   Deposits: {} {}",
            format_units(total, DECIMALS),
            state.symbol_of(&asset)
        );
    }
    Ok(())
}

/// Deposit into the exchange. Token deposits need a prior approval of the
/// exchange address.
pub fn cmd_exchange_deposit(state: &mut AppState, from: &str, asset: &str, value: &str) -> CliResult<()> {
    let call = Call::DepositToken {
        token: state.resolve_asset(asset)?,
        amount: amount(value)?,
    };
    let receipt = state.send(from, call)?;
    print_receipt(state, &receipt);
    Ok(())
}

pub fn cmd_exchange_withdraw(state: &mut AppState, from: &str, asset: &str, value: &str) -> CliResult<()> {
    let call = Call::WithdrawToken {
        token: state.resolve_asset(asset)?,
        amount: amount(value)?,
    };
    let receipt = state.send(from, call)?;
    print_receipt(state, &receipt);
    Ok(())
}

pub fn cmd_exchange_balance(state: &AppState, asset: &str, user: &str) -> CliResult<()> {
    let asset = state.resolve_asset(asset)?;
    let user = state.resolve_address(user)?;
    let exchange = state.chain.require_exchange()?;

    println!(
        "🏦 {} {} deposited by {}",
        format_units(exchange.tokens(&asset, &user), DECIMALS),
        state.symbol_of(&asset),
        user
    );
    Ok(())
}

/// List the state backups kept in the data directory
pub fn cmd_backups(state: &AppState) -> CliResult<()> {
    let backups = state.storage.list_backups();
    if backups.is_empty() {
        println!("🗄️  No backups.");
        return Ok(());
    }

    println!("🗄️  Backups (0 is the newest):");
    for index in backups {
        println!("   [{}]", index);
    }
    Ok(())
}

/// Replace the current chain state with backup `index`
pub fn cmd_restore(state: &mut AppState, index: usize) -> CliResult<()> {
    let current = state.chain.height();
    state.chain = state.storage.restore_backup(index)?;

    println!(
        "✅ Restored backup {}: height {} (was {})",
        index,
        state.chain.height(),
        current
    );
    Ok(())
}

/// Print the event log, optionally filtered by emitter and kind
pub fn cmd_events(state: &AppState, emitter: Option<&str>, kind: Option<&str>) -> CliResult<()> {
    let emitter = match emitter {
        Some("exchange") => Some(state.chain.require_exchange()?.address),
        Some(other) => Some(state.resolve_token(other)?),
        None => None,
    };
    let kind = kind.map(str::parse::<EventKind>).transpose()?;

    let events = state.chain.events(&EventFilter { emitter, kind });
    if events.is_empty() {
        println!("📜 No matching events.");
        return Ok(());
    }

    println!("📜 Events ({}):", events.len());
    for event in &events {
        print_event(state, event);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tokens;

    fn state_in(dir: &Path) -> AppState {
        cmd_init(dir, None, None, false).unwrap();
        AppState::new(dir.to_path_buf()).unwrap()
    }

    #[test]
    fn test_init_and_reload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = state_in(temp_dir.path());

        assert!(temp_dir.path().join(DEVNET_CONFIG_FILE).exists());
        assert_eq!(state.chain.chain_id, 31337);
        assert_eq!(state.keyring.len(), 10);
        assert!(state.deployments.network(31337).is_some());
        cmd_accounts(&state, true).unwrap();

        // A second init without --force keeps the existing chain
        cmd_init(temp_dir.path(), None, Some(1), false).unwrap();
        assert_eq!(AppState::new(temp_dir.path().to_path_buf()).unwrap().chain.chain_id, 31337);

        cmd_init(temp_dir.path(), None, Some(1), true).unwrap();
        let state = AppState::new(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(state.chain.chain_id, 1);
        assert!(state.deployments.network(1).is_some());
    }

    #[test]
    fn test_resolvers() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = state_in(temp_dir.path());
        let dapp = state.resolve_token("dapp").unwrap();

        assert_eq!(state.resolve_token(&dapp.to_string()).unwrap(), dapp);
        assert!(state.resolve_token("NOPE").is_err());
        assert_eq!(state.resolve_asset("ETH").unwrap(), Asset::Native);
        assert_eq!(
            state.resolve_asset(crate::core::ZERO_ADDRESS).unwrap(),
            Asset::Native
        );
        let meth = state.resolve_token("mETH").unwrap();
        assert_eq!(state.resolve_asset("mETH").unwrap(), Asset::Token(meth));
        assert_eq!(
            state.resolve_account("1").unwrap(),
            Account::Address(state.keyring.addresses()[1])
        );
        assert_eq!(
            state.resolve_account(crate::core::ZERO_ADDRESS).unwrap(),
            Account::Null
        );
        assert!(state.resolve_address(crate::core::ZERO_ADDRESS).is_err());
    }

    #[test]
    fn test_approve_deposit_withdraw_persist() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = state_in(temp_dir.path());
        let exchange = state.chain.require_exchange().unwrap().address.to_string();
        let user = state.keyring.addresses()[0];

        cmd_token_approve(&mut state, "0", "DAPP", &exchange, "100").unwrap();
        cmd_exchange_deposit(&mut state, "0", "DAPP", "100").unwrap();
        cmd_exchange_withdraw(&mut state, "0", "DAPP", "40").unwrap();

        let reloaded = AppState::new(temp_dir.path().to_path_buf()).unwrap();
        let dapp = Asset::Token(reloaded.resolve_token("DAPP").unwrap());
        assert_eq!(reloaded.chain.height(), 3);
        assert_eq!(reloaded.chain.nonce(&user), 3);
        assert_eq!(
            reloaded.chain.require_exchange().unwrap().tokens(&dapp, &user),
            tokens(60)
        );
    }

    #[test]
    fn test_rejected_transfer_is_not_persisted() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = state_in(temp_dir.path());

        let err = cmd_token_transfer(&mut state, "2", "DAPP", "3", "1").unwrap_err();
        assert_eq!(err.to_string(), "Not enough tokens");

        let err = cmd_token_transfer(&mut state, "0", "DAPP", crate::core::ZERO_ADDRESS, "1")
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid recipient");

        let reloaded = AppState::new(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(reloaded.chain.height(), 0);
    }

    #[test]
    fn test_restore_rolls_back_last_call() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = state_in(temp_dir.path());

        cmd_exchange_deposit(&mut state, "0", "ETH", "1").unwrap();
        cmd_exchange_deposit(&mut state, "0", "ETH", "2").unwrap();
        assert_eq!(state.storage.list_backups(), vec![0, 1]);

        cmd_restore(&mut state, 0).unwrap();
        assert_eq!(state.chain.height(), 1);

        let reloaded = AppState::new(temp_dir.path().to_path_buf()).unwrap();
        let user = reloaded.keyring.addresses()[0];
        assert_eq!(reloaded.chain.height(), 1);
        assert_eq!(
            reloaded.chain.require_exchange().unwrap().tokens(&Asset::Native, &user),
            tokens(1)
        );

        assert!(cmd_restore(&mut state, 4).is_err());
    }

    #[test]
    fn test_holdings_follow_transfers() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = state_in(temp_dir.path());
        let receiver = state.keyring.addresses()[4];

        assert!(state.chain.tokens.tokens_for_holder(&receiver).is_empty());
        cmd_token_transfer(&mut state, "0", "mETH", "4", "7").unwrap();
        cmd_token_holdings(&state, "4").unwrap();

        let held = state.chain.tokens.tokens_for_holder(&receiver);
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].0.symbol(), "mETH");
        assert_eq!(held[0].1, tokens(7));
    }

    #[test]
    fn test_transfer_from_uses_allowance() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = state_in(temp_dir.path());
        let spender = state.keyring.addresses()[1].to_string();

        cmd_token_approve(&mut state, "0", "mDAI", &spender, "10").unwrap();
        cmd_token_transfer_from(&mut state, "1", "mDAI", "0", "2", "4").unwrap();

        let mdai = state.resolve_token("mDAI").unwrap();
        let accounts = state.keyring.addresses();
        assert_eq!(state.chain.tokens.balance_of(&mdai, &accounts[2]).unwrap(), tokens(4));
        assert_eq!(
            state.chain.tokens.allowance(&mdai, &accounts[0], &accounts[1]).unwrap(),
            tokens(6)
        );
    }
}
