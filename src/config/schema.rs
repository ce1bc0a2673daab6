//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the engine.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Staking contract used when none is configured.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x078d379431F6a0b375B63eFD7745C180217854b7";

/// Root configuration for the staking engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Remote ledger connection and contract settings.
    pub ledger: LedgerConfig,

    /// Emission rate and display units.
    pub rewards: RewardsConfig,

    /// Balance polling cadence.
    pub polling: PollingConfig,

    /// Optional read-only session for the watch daemon.
    pub session: SessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Remote ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs (reads only).
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations before an operation counts as confirmed.
    pub confirmation_blocks: u64,

    /// Upper bound on waiting for a submitted transaction, in seconds.
    pub confirmation_timeout_secs: u64,

    /// Address of the staking contract.
    pub contract_address: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 31337,
            rpc_timeout_secs: 10,
            confirmation_blocks: 1,
            confirmation_timeout_secs: 120,
            contract_address: DEFAULT_CONTRACT_ADDRESS.to_string(),
        }
    }
}

/// Reward emission configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RewardsConfig {
    /// Reward units emitted per second per staked unit.
    pub rate_per_second: f64,

    /// Decimals of the staked native asset (18 for ETH).
    pub asset_decimals: u8,

    /// Symbol of the staked asset, for display.
    pub asset_symbol: String,

    /// Symbol of the reward token, for display.
    pub reward_symbol: String,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            rate_per_second: 0.001,
            asset_decimals: 18,
            asset_symbol: "ETH".to_string(),
            reward_symbol: "TRUMP".to_string(),
        }
    }
}

/// Balance polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Interval between successful refreshes in milliseconds.
    pub interval_ms: u64,

    /// Base delay for exponential backoff after a failed refresh.
    pub backoff_base_ms: u64,

    /// Maximum backoff delay in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 4000,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

/// Read-only session configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Account to watch when no wallet key is available.
    pub address: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
