//! Remote ledger integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (private key) + [ledger] config
//!     → wallet.rs (key loading, network wallet)
//!     → client.rs (read RPC with timeouts and failover)
//!     → transaction.rs (sign, broadcast, confirm)
//!     → contract.rs RemoteLedger trait (what the engine sees)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod contract;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::LedgerClient;
pub use contract::{IStaking, RemoteLedger};
pub use transaction::AlloyLedger;
pub use types::{ChainId, LedgerError, LedgerResult, TxConfirmation};
pub use wallet::Wallet;
