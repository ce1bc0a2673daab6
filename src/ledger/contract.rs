//! Staking contract binding and the ledger seam used by the engine.

use std::future::Future;

use alloy::primitives::{Address, U256};
use alloy::sol;

use crate::ledger::types::{LedgerResult, TxConfirmation};

sol! {
    /// Staking contract: native-asset deposits accrue reward tokens per second.
    #[sol(rpc)]
    interface IStaking {
        /// Staked balance of `account`.
        function balanceOf(address account) external view returns (uint256);

        /// Accrued but unclaimed rewards of `account`.
        function getRewards(address account) external view returns (uint256);

        /// Stake the attached native value.
        function stake() external payable;

        /// Withdraw `amount` of previously staked value.
        function unstake(uint256 amount) external;

        /// Transfer accrued rewards to the caller.
        function claimRewards() external;
    }
}

/// The remote ledger as seen by the staking engine.
///
/// Reads return base-unit integers. Mutating calls resolve once the
/// transaction is confirmed, or fail with the remote error.
pub trait RemoteLedger: Send + Sync + 'static {
    /// Native (unstaked) balance of `account`.
    fn native_balance_of(&self, account: Address) -> impl Future<Output = LedgerResult<U256>> + Send;

    /// Staked balance of `account` (`balanceOf`).
    fn staked_balance_of(&self, account: Address) -> impl Future<Output = LedgerResult<U256>> + Send;

    /// Pending rewards of `account` (`getRewards`).
    fn pending_rewards_of(&self, account: Address) -> impl Future<Output = LedgerResult<U256>> + Send;

    /// Stake `value` base units of the native asset.
    fn stake(&self, value: U256) -> impl Future<Output = LedgerResult<TxConfirmation>> + Send;

    /// Unstake `amount` base units.
    fn unstake(&self, amount: U256) -> impl Future<Output = LedgerResult<TxConfirmation>> + Send;

    /// Claim all pending rewards.
    fn claim_rewards(&self) -> impl Future<Output = LedgerResult<TxConfirmation>> + Send;
}
