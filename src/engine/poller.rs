//! Poll-driven balance refresh.
//!
//! # Responsibilities
//! - Refresh immediately on start and whenever the session changes
//! - Refresh every `interval_ms` while connected
//! - Back off exponentially (with jitter) after failed refreshes
//! - Stop when the shutdown signal fires

use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::config::PollingConfig;
use crate::engine::machine::StakingEngine;
use crate::ledger::RemoteLedger;
use crate::lifecycle::ShutdownSignal;

/// Delay before the next attempt after `failures` consecutive failures.
///
/// Zero failures means the regular interval. Otherwise the delay doubles from
/// `backoff_base_ms` up to `backoff_max_ms`, plus up to 10% jitter.
pub fn next_delay(failures: u32, config: &PollingConfig) -> Duration {
    if failures == 0 {
        return Duration::from_millis(config.interval_ms);
    }

    let factor = 2u64.saturating_pow(failures - 1);
    let delay_ms = config
        .backoff_base_ms
        .saturating_mul(factor)
        .min(config.backoff_max_ms);

    let jitter_range = delay_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter)
}

/// Background task keeping the engine's balance snapshot current.
pub struct BalancePoller<L> {
    engine: StakingEngine<L>,
    config: PollingConfig,
}

impl<L: RemoteLedger> BalancePoller<L> {
    pub fn new(engine: StakingEngine<L>, config: PollingConfig) -> Self {
        Self { engine, config }
    }

    /// Run until `shutdown` fires or the session provider goes away.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        let mut sessions = self.engine.session().subscribe();
        sessions.borrow_and_update();

        tracing::info!(interval_ms = self.config.interval_ms, "Balance poller starting");

        let mut failures = self.poll_once(0).await;

        loop {
            let delay = next_delay(failures, &self.config);
            tokio::select! {
                _ = sleep(delay) => {}
                changed = sessions.changed() => {
                    if changed.is_err() {
                        tracing::info!("Session provider dropped, stopping balance poller");
                        break;
                    }
                    sessions.borrow_and_update();
                    self.engine.invalidate();
                    failures = 0;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Balance poller received shutdown signal, exiting loop");
                    break;
                }
            }

            failures = self.poll_once(failures).await;
        }
    }

    /// One refresh attempt; returns the updated consecutive-failure count.
    async fn poll_once(&self, failures: u32) -> u32 {
        if self.engine.session().current().account().is_none() {
            return 0;
        }
        match self.engine.refresh().await {
            Ok(_) => 0,
            Err(e) => {
                let failures = failures.saturating_add(1);
                tracing::debug!(failures, error = %e, "Balance poll failed");
                failures
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PollingConfig {
        PollingConfig {
            interval_ms: 4000,
            backoff_base_ms: 100,
            backoff_max_ms: 1000,
        }
    }

    #[test]
    fn test_regular_interval_without_failures() {
        assert_eq!(next_delay(0, &config()), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let b1 = next_delay(1, &config());
        assert!(b1 >= Duration::from_millis(100) && b1 < Duration::from_millis(110));

        let b2 = next_delay(2, &config());
        assert!(b2 >= Duration::from_millis(200) && b2 < Duration::from_millis(220));

        let capped = next_delay(30, &config());
        assert!(capped >= Duration::from_millis(1000) && capped < Duration::from_millis(1100));
    }

    #[test]
    fn test_huge_failure_count_does_not_overflow() {
        let d = next_delay(u32::MAX, &config());
        assert!(d >= Duration::from_millis(1000));
    }
}
