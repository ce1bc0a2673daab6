//! Read-side ledger RPC client with timeout and failover.
//!
//! # Responsibilities
//! - Connect to JSON-RPC endpoints (primary + failovers)
//! - Query chain state (chain id, block number, native balance)
//! - Query the staking contract's read-only functions
//! - Handle timeouts and network errors gracefully

use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::ledger::contract::{IStaking, RemoteLedger};
use crate::ledger::types::{ChainId, LedgerConfig, LedgerError, LedgerResult, TxConfirmation};

/// Read-only ledger client with failover support.
#[derive(Clone)]
pub struct LedgerClient {
    /// List of providers (primary + failovers).
    providers: Vec<DynProvider>,
    /// Staking contract address.
    contract: Address,
    /// Configuration.
    config: LedgerConfig,
    /// Request timeout duration.
    timeout_duration: Duration,
}

impl LedgerClient {
    /// Create a new ledger client.
    ///
    /// Chain-id verification failures are logged, not fatal: the node may come
    /// up later and reads will simply fail until it does.
    pub async fn new(config: LedgerConfig) -> LedgerResult<Self> {
        let client = Self::connect(config)?;

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %client.config.rpc_url,
                    chain_id = client.config.chain_id,
                    contract = %client.contract,
                    "Ledger client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Ledger client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Build providers without touching the network.
    pub fn connect(config: LedgerConfig) -> LedgerResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let contract: Address = config.contract_address.parse().map_err(|e| {
            LedgerError::NotAvailable(format!(
                "Invalid contract address '{}': {}",
                config.contract_address, e
            ))
        })?;

        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            LedgerError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(ProviderBuilder::new().connect_http(primary_url).erased());

        for url_str in &config.failover_urls {
            match url_str.parse::<url::Url>() {
                Ok(url) => providers.push(ProviderBuilder::new().connect_http(url).erased()),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        Ok(Self {
            providers,
            contract,
            config,
            timeout_duration,
        })
    }

    /// Run `op` against each provider in turn until one answers in time.
    async fn with_failover<T, F, Fut>(&self, what: &str, op: F) -> LedgerResult<T>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = Result<T, String>>,
    {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, op(provider.clone())).await {
                Ok(result) => match result {
                    Ok(value) => return Ok(value),
                    Err(e) => tracing::warn!(provider_idx = i, error = %e, what, "RPC error, trying next provider"),
                },
                Err(_) => tracing::warn!(provider_idx = i, what, "RPC timeout, trying next provider"),
            }
        }
        if self.providers.len() == 1 {
            return Err(LedgerError::Rpc(format!("RPC provider failed to {}", what)));
        }
        Err(LedgerError::Rpc(format!("All RPC providers failed to {}", what)))
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> LedgerResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.config.chain_id {
            return Err(LedgerError::ChainMismatch {
                expected: self.config.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    /// Get the chain ID from the RPC.
    pub async fn get_chain_id(&self) -> LedgerResult<ChainId> {
        self.with_failover("get chain id", |p| async move {
            p.get_chain_id().await.map(ChainId).map_err(|e| e.to_string())
        })
        .await
    }

    /// Get the latest block number.
    pub async fn get_block_number(&self) -> LedgerResult<u64> {
        self.with_failover("get block number", |p| async move {
            p.get_block_number().await.map_err(|e| e.to_string())
        })
        .await
    }

    /// Native balance of an address.
    pub async fn get_balance(&self, address: Address) -> LedgerResult<U256> {
        self.with_failover("get balance", |p| async move {
            p.get_balance(address).await.map_err(|e| e.to_string())
        })
        .await
    }

    /// Staked balance of an address (`balanceOf`).
    pub async fn get_staked_balance(&self, address: Address) -> LedgerResult<U256> {
        let contract = self.contract;
        self.with_failover("get staked balance", |p| async move {
            IStaking::new(contract, p)
                .balanceOf(address)
                .call()
                .await
                .map_err(|e| e.to_string())
        })
        .await
    }

    /// Pending rewards of an address (`getRewards`).
    pub async fn get_pending_rewards(&self, address: Address) -> LedgerResult<U256> {
        let contract = self.contract;
        self.with_failover("get pending rewards", |p| async move {
            IStaking::new(contract, p)
                .getRewards(address)
                .call()
                .await
                .map_err(|e| e.to_string())
        })
        .await
    }

    /// Check if the ledger is reachable.
    pub async fn is_healthy(&self) -> bool {
        self.get_block_number().await.is_ok()
    }

    /// Staking contract address.
    pub fn contract_address(&self) -> Address {
        self.contract
    }

    /// Get the configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }
}

/// Watch-only ledger: reads work, writes are refused because nothing can sign.
impl RemoteLedger for LedgerClient {
    async fn native_balance_of(&self, account: Address) -> LedgerResult<U256> {
        self.get_balance(account).await
    }

    async fn staked_balance_of(&self, account: Address) -> LedgerResult<U256> {
        self.get_staked_balance(account).await
    }

    async fn pending_rewards_of(&self, account: Address) -> LedgerResult<U256> {
        self.get_pending_rewards(account).await
    }

    async fn stake(&self, _value: U256) -> LedgerResult<TxConfirmation> {
        Err(read_only())
    }

    async fn unstake(&self, _amount: U256) -> LedgerResult<TxConfirmation> {
        Err(read_only())
    }

    async fn claim_rewards(&self) -> LedgerResult<TxConfirmation> {
        Err(read_only())
    }
}

fn read_only() -> LedgerError {
    LedgerError::Wallet("no signing wallet configured".to_string())
}

impl std::fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("contract", &self.contract)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> LedgerConfig {
        LedgerConfig {
            rpc_url: "http://127.0.0.1:1".to_string(),
            failover_urls: Vec::new(),
            chain_id: 31337,
            rpc_timeout_secs: 2,
            confirmation_blocks: 1,
            confirmation_timeout_secs: 10,
            contract_address: crate::config::schema::DEFAULT_CONTRACT_ADDRESS.to_string(),
        }
    }

    #[tokio::test]
    async fn test_client_creation_survives_unreachable_node() {
        let result = LedgerClient::new(test_config()).await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_invalid_contract_address() {
        let mut config = test_config();
        config.contract_address = "0xnope".to_string();
        let err = LedgerClient::connect(config).unwrap_err();
        assert!(err.to_string().contains("Invalid contract address"));
    }

    #[test]
    fn test_invalid_failover_ignored() {
        let mut config = test_config();
        config.failover_urls.push("::not a url::".to_string());
        config.failover_urls.push("http://127.0.0.1:2".to_string());
        let client = LedgerClient::connect(config).unwrap();
        assert_eq!(client.providers.len(), 2);
    }

    #[tokio::test]
    async fn test_watch_only_refuses_writes() {
        let client = LedgerClient::connect(test_config()).unwrap();
        let err = client.claim_rewards().await.unwrap_err();
        assert!(matches!(err, LedgerError::Wallet(_)));
        assert!(!err.is_rejection());
    }

    #[tokio::test]
    async fn test_rpc_failover() {
        let mut config = test_config();
        config.failover_urls.push("http://127.0.0.1:2".to_string());

        let client = LedgerClient::connect(config).unwrap();
        let result = client.get_chain_id().await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("All RPC providers failed"));
    }
}
