//! Ledger-facing types and error definitions.

use alloy::primitives::TxHash;
use thiserror::Error;

// Re-export LedgerConfig from config module to avoid duplication
pub use crate::config::schema::LedgerConfig;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors that can occur while talking to the remote ledger.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The node, the contract, or the signer refused the call before broadcast.
    #[error("{0}")]
    Rejected(String),

    /// Transaction was mined but reverted on-chain.
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    /// The transaction was broadcast but its receipt never arrived.
    #[error("Confirmation failed: {0}")]
    Confirmation(String),

    /// Invalid private key format or derivation error.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Ledger client not initialized or misconfigured.
    #[error("Ledger not available: {0}")]
    NotAvailable(String),
}

impl LedgerError {
    /// Whether the remote side actively refused the operation, as opposed to
    /// being unreachable or slow.
    pub fn is_rejection(&self) -> bool {
        matches!(self, LedgerError::Rejected(_) | LedgerError::Reverted(_))
    }

    /// Message carried by the error, without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            LedgerError::Rpc(msg)
            | LedgerError::Rejected(msg)
            | LedgerError::Reverted(msg)
            | LedgerError::Confirmation(msg)
            | LedgerError::Wallet(msg)
            | LedgerError::NotAvailable(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Acknowledgement that a mutating call completed on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxConfirmation {
    /// Hash of the confirmed transaction.
    pub tx_hash: TxHash,
    /// Block the transaction was included in, when the node reports it.
    pub block_number: Option<u64>,
}
