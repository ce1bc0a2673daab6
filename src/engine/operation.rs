//! Operation requests, records, and the per-record state machine.
//!
//! # State Transitions
//! ```text
//! Idle → Validating: submission attempt
//! Validating → Failed: NotConnected / InvalidAmount / InsufficientBalance /
//!                      OperationInProgress (nothing sent to the ledger)
//! Validating → Submitted: exactly one mutating call issued
//! Submitted → Confirmed: ledger acknowledged completion
//! Submitted → Failed: ledger rejected or was unreachable
//! ```
//! Confirmed and Failed are terminal. A new request always starts a new
//! record with a fresh id.

use std::fmt;

use alloy::primitives::{TxHash, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::engine::amount::AmountError;
use crate::ledger::{LedgerError, TxConfirmation};

/// Kind of mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Stake,
    Unstake,
    Claim,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [OperationKind::Stake, OperationKind::Unstake, OperationKind::Claim];

    /// Stake and Unstake carry an amount; Claim does not.
    pub fn requires_amount(self) -> bool {
        !matches!(self, OperationKind::Claim)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Stake => "stake",
            OperationKind::Unstake => "unstake",
            OperationKind::Claim => "claim",
        }
    }

    /// Shown when the ledger fails without saying why.
    pub fn fallback_message(self) -> &'static str {
        match self {
            OperationKind::Stake => "Failed to stake. Please try again.",
            OperationKind::Unstake => "Unstaking failed.",
            OperationKind::Claim => "Failed to claim rewards.",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's intent to stake, unstake, or claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub kind: OperationKind,
    /// Decimal amount as entered. Ignored for Claim.
    pub amount: Option<String>,
}

impl OperationRequest {
    pub fn stake(amount: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Stake,
            amount: Some(amount.into()),
        }
    }

    pub fn unstake(amount: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Unstake,
            amount: Some(amount.into()),
        }
    }

    pub fn claim() -> Self {
        Self {
            kind: OperationKind::Claim,
            amount: None,
        }
    }
}

/// Lifecycle position of an [`OperationRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Idle,
    Validating,
    Submitted,
    Confirmed,
    Failed,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationStatus::Confirmed | OperationStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationStatus::Idle => "idle",
            OperationStatus::Validating => "validating",
            OperationStatus::Submitted => "submitted",
            OperationStatus::Confirmed => "confirmed",
            OperationStatus::Failed => "failed",
        }
    }

    /// Whether `self → next` is an edge of the state machine.
    pub fn can_transition_to(self, next: OperationStatus) -> bool {
        use OperationStatus::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Submitted)
                | (Validating, Failed)
                | (Submitted, Confirmed)
                | (Submitted, Failed)
        )
    }
}

/// Why an operation failed. Every variant renders a non-empty message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum OperationError {
    #[error("Please connect your wallet first.")]
    NotConnected,

    #[error("Invalid amount: {0}")]
    InvalidAmount(AmountError),

    #[error("Insufficient staked balance: requested {requested}, staked {available}.")]
    InsufficientBalance { requested: String, available: String },

    #[error("A {0} operation is already in progress.")]
    OperationInProgress(OperationKind),

    #[error("{0}")]
    RemoteRejected(String),

    #[error("{0}")]
    RemoteUnavailable(String),
}

impl OperationError {
    /// Wrap a ledger failure, keeping its message verbatim when it has one.
    pub fn from_ledger(kind: OperationKind, err: &LedgerError) -> Self {
        let mut message = err.message();
        if message.trim().is_empty() {
            message = kind.fallback_message().to_string();
        }
        if err.is_rejection() {
            OperationError::RemoteRejected(message)
        } else {
            OperationError::RemoteUnavailable(message)
        }
    }

    /// Detected locally, before the ledger was contacted.
    pub fn is_local(&self) -> bool {
        !matches!(
            self,
            OperationError::RemoteRejected(_) | OperationError::RemoteUnavailable(_)
        )
    }
}

/// The engine's view of one operation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationRecord {
    pub id: Uuid,
    pub kind: OperationKind,
    pub status: OperationStatus,
    /// Base-unit amount, known once validation passed.
    pub amount: Option<U256>,
    pub error: Option<OperationError>,
    pub tx_hash: Option<TxHash>,
    pub block_number: Option<u64>,
}

impl OperationRecord {
    /// A fresh Idle record with a new id.
    pub fn new(kind: OperationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            status: OperationStatus::Idle,
            amount: None,
            error: None,
            tx_hash: None,
            block_number: None,
        }
    }

    fn advance(&mut self, next: OperationStatus) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::warn!(
                id = %self.id,
                kind = %self.kind,
                from = self.status.as_str(),
                to = next.as_str(),
                "Ignoring invalid operation transition"
            );
            return false;
        }
        self.status = next;
        true
    }

    pub(crate) fn begin_validation(&mut self) -> bool {
        self.advance(OperationStatus::Validating)
    }

    pub(crate) fn submit(&mut self, amount: Option<U256>) -> bool {
        if !self.advance(OperationStatus::Submitted) {
            return false;
        }
        self.amount = amount;
        true
    }

    pub(crate) fn confirm(&mut self, confirmation: &TxConfirmation) -> bool {
        if !self.advance(OperationStatus::Confirmed) {
            return false;
        }
        self.tx_hash = Some(confirmation.tx_hash);
        self.block_number = confirmation.block_number;
        true
    }

    pub(crate) fn fail(&mut self, error: OperationError) -> bool {
        if !self.advance(OperationStatus::Failed) {
            return false;
        }
        self.error = Some(error);
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Human-readable failure, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}
