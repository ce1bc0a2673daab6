//! Signing ledger: sends staking transactions and waits for confirmation.
//!
//! # Responsibilities
//! - Build contract calls for stake / unstake / claimRewards
//! - Sign and broadcast through a wallet-enabled provider
//! - Monitor confirmations with a deadline
//! - Classify failures as rejections or availability problems

use alloy::contract::{CallBuilder, CallDecoder, Error as ContractError};
use alloy::network::Ethereum;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::transports::RpcError;
use std::time::Duration;

use crate::ledger::client::LedgerClient;
use crate::ledger::contract::{IStaking, RemoteLedger};
use crate::ledger::types::{LedgerError, LedgerResult, TxConfirmation};
use crate::ledger::wallet::Wallet;

/// Production [`RemoteLedger`] over JSON-RPC.
///
/// Reads go through the failover-capable [`LedgerClient`]; writes go through
/// the primary endpoint with the wallet attached.
#[derive(Clone)]
pub struct AlloyLedger {
    reader: LedgerClient,
    signer: DynProvider,
    account: Address,
    confirmations: u64,
    confirmation_timeout: Duration,
}

impl AlloyLedger {
    /// Attach a signing wallet to a read client.
    pub fn new(reader: LedgerClient, wallet: &Wallet) -> LedgerResult<Self> {
        let config = reader.config();
        if wallet.chain_id() != config.chain_id {
            return Err(LedgerError::ChainMismatch {
                expected: config.chain_id,
                actual: wallet.chain_id(),
            });
        }

        let url: url::Url = config.rpc_url.parse().map_err(|e| {
            LedgerError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        let signer = ProviderBuilder::new()
            .wallet(wallet.ethereum_wallet())
            .connect_http(url)
            .erased();

        Ok(Self {
            signer,
            account: wallet.address(),
            confirmations: config.confirmation_blocks.max(1),
            confirmation_timeout: Duration::from_secs(config.confirmation_timeout_secs),
            reader,
        })
    }

    /// Account that signs the transactions.
    pub fn account(&self) -> Address {
        self.account
    }

    /// Read-side client.
    pub fn reader(&self) -> &LedgerClient {
        &self.reader
    }

    fn contract(&self) -> IStaking::IStakingInstance<DynProvider> {
        IStaking::new(self.reader.contract_address(), self.signer.clone())
    }

    /// Broadcast a prepared call and wait for its receipt.
    async fn send_and_confirm<D>(
        &self,
        operation: &'static str,
        call: CallBuilder<&DynProvider, D, Ethereum>,
    ) -> LedgerResult<TxConfirmation>
    where
        D: CallDecoder,
    {
        let pending = call.send().await.map_err(classify_send_error)?;
        let tx_hash = *pending.tx_hash();

        tracing::info!(operation, tx_hash = %tx_hash, "Transaction broadcast");

        let receipt = pending
            .with_required_confirmations(self.confirmations)
            .with_timeout(Some(self.confirmation_timeout))
            .get_receipt()
            .await
            .map_err(|e| LedgerError::Confirmation(e.to_string()))?;

        if !receipt.status() {
            return Err(LedgerError::Reverted(format!("transaction {} reverted", tx_hash)));
        }

        tracing::info!(
            operation,
            tx_hash = %tx_hash,
            block_number = ?receipt.block_number,
            "Transaction confirmed"
        );

        Ok(TxConfirmation {
            tx_hash,
            block_number: receipt.block_number,
        })
    }
}

/// Map a failed send onto the ledger error taxonomy.
///
/// Node error responses (simulation reverts, underpriced, nonce issues) and
/// local signer failures are refusals; everything else on the transport is
/// an availability problem.
fn classify_send_error(err: ContractError) -> LedgerError {
    match err {
        ContractError::TransportError(RpcError::ErrorResp(payload)) => {
            LedgerError::Rejected(payload.message.to_string())
        }
        ContractError::TransportError(RpcError::LocalUsageError(e)) => {
            LedgerError::Rejected(e.to_string())
        }
        ContractError::TransportError(e) => LedgerError::Rpc(e.to_string()),
        other => LedgerError::Rejected(other.to_string()),
    }
}

impl RemoteLedger for AlloyLedger {
    async fn native_balance_of(&self, account: Address) -> LedgerResult<U256> {
        self.reader.get_balance(account).await
    }

    async fn staked_balance_of(&self, account: Address) -> LedgerResult<U256> {
        self.reader.get_staked_balance(account).await
    }

    async fn pending_rewards_of(&self, account: Address) -> LedgerResult<U256> {
        self.reader.get_pending_rewards(account).await
    }

    async fn stake(&self, value: U256) -> LedgerResult<TxConfirmation> {
        let contract = self.contract();
        self.send_and_confirm("stake", contract.stake().value(value)).await
    }

    async fn unstake(&self, amount: U256) -> LedgerResult<TxConfirmation> {
        let contract = self.contract();
        self.send_and_confirm("unstake", contract.unstake(amount)).await
    }

    async fn claim_rewards(&self) -> LedgerResult<TxConfirmation> {
        let contract = self.contract();
        self.send_and_confirm("claimRewards", contract.claimRewards()).await
    }
}

impl std::fmt::Debug for AlloyLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlloyLedger")
            .field("reader", &self.reader)
            .field("account", &self.account)
            .field("confirmations", &self.confirmations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use alloy::transports::TransportErrorKind;

    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_chain_mismatch_rejected() {
        let reader = LedgerClient::connect(LedgerConfig::default()).unwrap();
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 1).unwrap();
        let err = AlloyLedger::new(reader, &wallet).unwrap_err();
        assert!(matches!(err, LedgerError::ChainMismatch { expected: 31337, actual: 1 }));
    }

    #[test]
    fn test_account_is_wallet_address() {
        let reader = LedgerClient::connect(LedgerConfig::default()).unwrap();
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 31337).unwrap();
        let ledger = AlloyLedger::new(reader, &wallet).unwrap();
        assert_eq!(ledger.account(), wallet.address());
        assert_eq!(ledger.confirmations, 1);
    }

    #[test]
    fn test_error_response_is_rejection() {
        let payload = serde_json::from_str(
            r#"{"code":3,"message":"execution reverted: Insufficient balance"}"#,
        )
        .unwrap();
        let err = classify_send_error(ContractError::TransportError(RpcError::ErrorResp(payload)));
        assert!(err.is_rejection());
        assert_eq!(err.to_string(), "execution reverted: Insufficient balance");
    }

    #[test]
    fn test_transport_failure_is_unavailable() {
        let err = classify_send_error(ContractError::TransportError(RpcError::Transport(
            TransportErrorKind::BackendGone,
        )));
        assert!(!err.is_rejection());
        assert!(matches!(err, LedgerError::Rpc(_)));
    }
}
