//! Staking interaction engine
//!
//! Keeps a consistent view of one account's native, staked, and reward
//! balances on a remote ledger, projects reward accrual, and drives
//! stake / unstake / claim operations through an explicit state machine.

pub mod config;
pub mod engine;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod session;

pub use config::schema::EngineConfig;
pub use engine::{
    BalancePoller, BalanceSnapshot, EngineEvent, OperationError, OperationKind, OperationRecord,
    OperationRequest, OperationStatus, OperationUpdates, RewardProjection, StakingEngine,
};
pub use ledger::{AlloyLedger, LedgerClient, LedgerError, RemoteLedger};
pub use lifecycle::Shutdown;
pub use session::{Session, SessionProvider};
