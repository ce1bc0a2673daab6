use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use staking_engine::config::loader::load_or_default;
use staking_engine::engine::amount::format_units;
use staking_engine::engine::projector;
use staking_engine::ledger::wallet::Wallet;
use staking_engine::observability::logging;
use staking_engine::session::resolve_account;
use staking_engine::{
    AlloyLedger, EngineConfig, LedgerClient, OperationRequest, OperationStatus, RemoteLedger,
    Session, SessionProvider, StakingEngine,
};

#[derive(Parser)]
#[command(name = "stake-cli")]
#[command(about = "Stake, unstake, and claim rewards from the command line", long_about = None)]
struct Cli {
    /// Config file (falls back to STAKING_CONFIG, then defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Account to read in watch-only mode (no wallet key set)
    #[arg(short, long)]
    address: Option<Address>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project rewards for a principal at the configured emission rate
    Project { amount: String },
    /// Show native, staked, and pending reward balances
    Balance,
    /// Stake an amount of the native asset
    Stake { amount: String },
    /// Unstake an amount, or "max" for the full staked balance
    Unstake { amount: String },
    /// Claim all pending rewards
    Claim,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;
    logging::init_logging("warn");

    if let Commands::Project { amount } = &cli.command {
        let output = match projector::project(amount, config.rewards.rate_per_second) {
            Some(projection) => json!({
                "principal": amount,
                "rate_per_second": config.rewards.rate_per_second,
                "reward_symbol": config.rewards.reward_symbol,
                "projection": projection.formatted(),
            }),
            None => json!({ "principal": amount, "projection": null }),
        };
        return print_json(&output);
    }

    let reader = LedgerClient::connect(config.ledger.clone())?;
    let wallet = Wallet::from_env(config.ledger.chain_id).ok();
    let session = resolve_account(wallet.as_ref().map(Wallet::address), cli.address)?;

    match wallet {
        Some(wallet) => {
            let ledger = AlloyLedger::new(reader, &wallet)?;
            execute(ledger, session, &config, cli.command).await
        }
        None => execute(reader, session, &config, cli.command).await,
    }
}

async fn execute<L: RemoteLedger>(
    ledger: L,
    session: Session,
    config: &EngineConfig,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = StakingEngine::new(
        Arc::new(ledger),
        SessionProvider::new(session),
        config.rewards.clone(),
    );

    // Unstake validation needs the staked balance; a failed read is
    // reported through the operation's own error.
    if let Err(e) = engine.refresh().await {
        tracing::warn!(error = %e, "Balance refresh failed");
    }

    let request = match command {
        Commands::Project { .. } => return Ok(()),
        Commands::Balance => return print_balance(&engine, config),
        Commands::Stake { amount } => OperationRequest::stake(amount),
        Commands::Unstake { amount } if amount.eq_ignore_ascii_case("max") => {
            OperationRequest::unstake(engine.max_unstake_input().unwrap_or_else(|| "0".to_string()))
        }
        Commands::Unstake { amount } => OperationRequest::unstake(amount),
        Commands::Claim => OperationRequest::claim(),
    };

    let mut updates = engine.submit(request);
    let mut last = None;
    while let Some(record) = updates.next_update().await {
        eprintln!("{}: {}", record.kind, record.status.as_str());
        last = Some(record);
    }
    let Some(record) = last else {
        return Err("operation produced no result".into());
    };

    print_json(&json!({
        "operation": record,
        "error": record.error_message(),
    }))?;
    if record.status == OperationStatus::Confirmed {
        print_balance(&engine, config)
    } else {
        std::process::exit(1);
    }
}

fn print_balance<L: RemoteLedger>(
    engine: &StakingEngine<L>,
    config: &EngineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let decimals = config.rewards.asset_decimals;
    let output = match engine.snapshot() {
        Some(snapshot) => json!({
            "address": snapshot.address,
            "native_balance": format_units(snapshot.native_balance, decimals),
            "staked_balance": format_units(snapshot.staked_balance, decimals),
            "pending_rewards": format_units(snapshot.pending_rewards, decimals),
            "asset_symbol": config.rewards.asset_symbol,
            "reward_symbol": config.rewards.reward_symbol,
            "staked_projection": engine.staked_projection().map(|p| p.formatted()),
        }),
        None => json!({ "connected": engine.session().current().connected, "balances": null }),
    };
    print_json(&output)
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
