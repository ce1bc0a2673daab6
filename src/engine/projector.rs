//! Reward projection from a fixed emission rate.
//!
//! Pure arithmetic: no network, no state. Anything that is not a positive,
//! finite number yields `None` so a caller can hide the projection instead
//! of showing an error.

use serde::Serialize;

pub const SECONDS_PER_HOUR: f64 = 3600.0;
pub const HOURS_PER_DAY: f64 = 24.0;
pub const DAYS_PER_WEEK: f64 = 7.0;
/// Months are counted as 30 days.
pub const DAYS_PER_MONTH: f64 = 30.0;

/// Decimal places shown for projected rewards.
pub const DISPLAY_PRECISION: usize = 3;

/// Expected rewards over common horizons, unrounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RewardProjection {
    pub hourly: f64,
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
}

/// A [`RewardProjection`] rounded for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedProjection {
    pub hourly: String,
    pub daily: String,
    pub weekly: String,
    pub monthly: String,
}

impl RewardProjection {
    /// Derive every horizon from the hourly figure.
    pub fn from_hourly(hourly: f64) -> Self {
        let daily = hourly * HOURS_PER_DAY;
        Self {
            hourly,
            daily,
            weekly: daily * DAYS_PER_WEEK,
            monthly: daily * DAYS_PER_MONTH,
        }
    }

    /// Round each horizon to [`DISPLAY_PRECISION`] places.
    pub fn formatted(&self) -> FormattedProjection {
        let fmt = |v: f64| format!("{:.*}", DISPLAY_PRECISION, v);
        FormattedProjection {
            hourly: fmt(self.hourly),
            daily: fmt(self.daily),
            weekly: fmt(self.weekly),
            monthly: fmt(self.monthly),
        }
    }
}

/// Parse a principal the way a number input would, keeping only positive finite values.
pub fn parse_principal(input: &str) -> Option<f64> {
    let value: f64 = input.trim().parse().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Project rewards for `principal` staked units at `rate_per_second` per unit.
pub fn project(principal: &str, rate_per_second: f64) -> Option<RewardProjection> {
    project_amount(parse_principal(principal)?, rate_per_second)
}

/// Same as [`project`] for an already-numeric principal.
pub fn project_amount(principal: f64, rate_per_second: f64) -> Option<RewardProjection> {
    if !(principal.is_finite() && principal > 0.0) {
        return None;
    }
    if !(rate_per_second.is_finite() && rate_per_second >= 0.0) {
        return None;
    }
    let projection = RewardProjection::from_hourly(principal * rate_per_second * SECONDS_PER_HOUR);
    projection.monthly.is_finite().then_some(projection)
}
