//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that addresses and URLs actually parse
//! - Validate value ranges (timeouts > 0, finite emission rate)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use alloy::primitives::Address;

use crate::config::schema::EngineConfig;

/// Largest decimal count whose scale factor still fits in a U256.
pub const MAX_ASSET_DECIMALS: u8 = 77;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `ledger.rpc_url`.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let ledger = &config.ledger;
    if let Err(e) = ledger.rpc_url.parse::<url::Url>() {
        errors.push(ValidationError::new("ledger.rpc_url", format!("invalid URL: {}", e)));
    }
    for failover in &ledger.failover_urls {
        if failover.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new(
                "ledger.failover_urls",
                format!("invalid URL '{}'", failover),
            ));
        }
    }
    if ledger.contract_address.parse::<Address>().is_err() {
        errors.push(ValidationError::new(
            "ledger.contract_address",
            format!("invalid address '{}'", ledger.contract_address),
        ));
    }
    if ledger.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("ledger.rpc_timeout_secs", "must be > 0"));
    }
    if ledger.confirmation_timeout_secs == 0 {
        errors.push(ValidationError::new("ledger.confirmation_timeout_secs", "must be > 0"));
    }

    let rewards = &config.rewards;
    if !rewards.rate_per_second.is_finite() || rewards.rate_per_second < 0.0 {
        errors.push(ValidationError::new(
            "rewards.rate_per_second",
            "must be a finite, non-negative number",
        ));
    }
    if rewards.asset_decimals > MAX_ASSET_DECIMALS {
        errors.push(ValidationError::new(
            "rewards.asset_decimals",
            format!("must be <= {}", MAX_ASSET_DECIMALS),
        ));
    }

    let polling = &config.polling;
    if polling.interval_ms == 0 {
        errors.push(ValidationError::new("polling.interval_ms", "must be > 0"));
    }
    if polling.backoff_base_ms > polling.backoff_max_ms {
        errors.push(ValidationError::new(
            "polling.backoff_base_ms",
            "must not exceed polling.backoff_max_ms",
        ));
    }

    if let Some(address) = &config.session.address {
        if address.parse::<Address>().is_err() {
            errors.push(ValidationError::new(
                "session.address",
                format!("invalid address '{}'", address),
            ));
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
