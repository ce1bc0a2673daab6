//! Staking interaction engine.
//!
//! # Data Flow
//! ```text
//! SessionProvider (connect / disconnect)
//!     → poller.rs (invalidate + refresh on change, refresh on tick)
//!     → balance.rs (coalesced read set → freshest snapshot wins)
//!     → projector.rs (principal × emission rate → hourly..monthly)
//!
//! OperationRequest
//!     → machine.rs validate (session, amount.rs, cached staked balance)
//!     → one RemoteLedger call per accepted request
//!     → Confirmed → one balance refresh
//!     → events.rs broadcast to subscribers
//! ```
//!
//! # Design Decisions
//! - Displayed values come only from snapshots and records, never from form input
//! - No optimistic balance updates: only ledger reads change a snapshot
//! - Kinds are independent: a Claim may run while a Stake is in flight

pub mod amount;
pub mod balance;
pub mod events;
pub mod machine;
pub mod operation;
pub mod poller;
pub mod projector;

pub use balance::{BalanceCache, BalanceSnapshot, ReadError};
pub use events::EngineEvent;
pub use machine::{OperationUpdates, StakingEngine};
pub use operation::{OperationError, OperationKind, OperationRecord, OperationRequest, OperationStatus};
pub use poller::BalancePoller;
pub use projector::{FormattedProjection, RewardProjection};
