//! Staking balance daemon.
//!
//! ```text
//!   config (TOML) ──▶ LedgerClient ──▶ AlloyLedger (wallet key in env)
//!                          │               │
//!                          └──── or ───────┘  watch-only without a key
//!                                  │
//!   SessionProvider ──▶ StakingEngine ──▶ BalancePoller (interval + backoff)
//!                                  │
//!                                  ▼
//!                    EngineEvent log lines + Prometheus gauges
//! ```
//!
//! Usage: `staking-engine [CONFIG_PATH]`. Without a path, `STAKING_CONFIG`
//! is consulted, then built-in defaults.

use std::path::PathBuf;

use alloy::primitives::Address;
use tokio::sync::broadcast::error::RecvError;

use staking_engine::config::loader::{load_or_default, CONFIG_PATH_ENV_VAR};
use staking_engine::config::watcher::ConfigWatcher;
use staking_engine::engine::amount::format_units;
use staking_engine::ledger::wallet::Wallet;
use staking_engine::lifecycle::{wait_for_signal, Shutdown, ShutdownSignal};
use staking_engine::observability::{logging, metrics};
use staking_engine::session::resolve_account;
use staking_engine::{
    AlloyLedger, BalancePoller, EngineConfig, EngineEvent, LedgerClient, RemoteLedger, Session,
    SessionProvider, StakingEngine,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path: Option<PathBuf> = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_PATH_ENV_VAR).ok())
        .map(PathBuf::from);

    let config = load_or_default(config_path.as_deref())?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!("staking-engine v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        rpc_url = %config.ledger.rpc_url,
        chain_id = config.ledger.chain_id,
        contract = %config.ledger.contract_address,
        rate_per_second = config.rewards.rate_per_second,
        interval_ms = config.polling.interval_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let reader = LedgerClient::new(config.ledger.clone()).await?;

    match Wallet::from_env(config.ledger.chain_id) {
        Ok(wallet) => {
            let session = resolve_session(&config, Some(wallet.address()))?;
            let ledger = AlloyLedger::new(reader, &wallet)?;
            run(ledger, session, config, config_path).await
        }
        Err(e) => {
            tracing::info!(reason = %e, "No signing wallet, running watch-only");
            let session = resolve_session(&config, None)?;
            run(reader, session, config, config_path).await
        }
    }
}

/// The wallet's account when signing; otherwise `[session].address`; otherwise disconnected.
fn resolve_session(
    config: &EngineConfig,
    wallet_address: Option<Address>,
) -> Result<Session, Box<dyn std::error::Error>> {
    let configured = config
        .session
        .address
        .as_deref()
        .map(str::parse::<Address>)
        .transpose()?;

    let session = resolve_account(wallet_address, configured)?;
    if session.account().is_none() {
        tracing::warn!("No account to watch; balances stay empty until a session connects");
    }
    Ok(session)
}

async fn run<L: RemoteLedger>(
    ledger: L,
    session: Session,
    config: EngineConfig,
    config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = Shutdown::new();
    let sessions = SessionProvider::new(session);
    let engine = StakingEngine::new(std::sync::Arc::new(ledger), sessions, config.rewards.clone());

    let poller = BalancePoller::new(engine.clone(), config.polling.clone());
    let poller_task = tokio::spawn(poller.run(shutdown.subscribe()));

    let reporter_task = tokio::spawn(report_events(engine.clone(), shutdown.subscribe()));

    // The watcher handle must outlive the reload loop.
    let _watcher = match config_path {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(&path);
            let handle = watcher.run()?;
            let engine = engine.clone();
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        Some(update) = updates.recv() => {
                            engine.update_rewards(update.rewards);
                        }
                        _ = stop.recv() => break,
                    }
                }
            });
            Some(handle)
        }
        None => None,
    };

    wait_for_signal().await;
    shutdown.trigger();

    let _ = poller_task.await;
    let _ = reporter_task.await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Log every engine event until shutdown.
async fn report_events<L: RemoteLedger>(
    engine: StakingEngine<L>,
    mut shutdown: ShutdownSignal,
) {
    let mut events = engine.subscribe();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(EngineEvent::SnapshotUpdated(Some(snapshot))) => {
                    let rewards = engine.rewards();
                    let projection = engine.staked_projection().map(|p| p.formatted());
                    tracing::info!(
                        address = %snapshot.address,
                        native = %format_units(snapshot.native_balance, rewards.asset_decimals),
                        staked = %format_units(snapshot.staked_balance, rewards.asset_decimals),
                        pending_rewards = %format_units(snapshot.pending_rewards, rewards.asset_decimals),
                        daily_rewards = ?projection.map(|p| p.daily),
                        asset = %rewards.asset_symbol,
                        reward = %rewards.reward_symbol,
                        "Balances"
                    );
                }
                Ok(EngineEvent::SnapshotUpdated(None)) => {
                    tracing::info!("Balances cleared");
                }
                Ok(EngineEvent::OperationUpdated(record)) => {
                    tracing::info!(
                        id = %record.id,
                        kind = %record.kind,
                        status = record.status.as_str(),
                        error = ?record.error_message(),
                        "Operation update"
                    );
                }
                Ok(EngineEvent::RefreshFailed(e)) => {
                    tracing::warn!(error = %e, "Balance refresh failed, keeping last snapshot");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event reporter lagged");
                }
                Err(RecvError::Closed) => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}
