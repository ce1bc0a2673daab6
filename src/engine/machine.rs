//! The staking engine: validation, submission, and lifecycle tracking.
//!
//! # Responsibilities
//! - Validate requests against the session and the cached balances
//! - Allow at most one Submitted record per operation kind
//! - Issue exactly one ledger call per accepted request
//! - Refresh balances once after every confirmation
//! - Publish snapshots and record transitions to subscribers

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use alloy::primitives::U256;
use arc_swap::ArcSwap;
use dashmap::DashMap;
use futures_util::Stream;
use tokio::sync::{broadcast, mpsc};

use crate::config::RewardsConfig;
use crate::engine::amount::{format_units, parse_units, to_f64_lossy};
use crate::engine::balance::{BalanceCache, BalanceSnapshot, ReadError};
use crate::engine::events::{EngineEvent, EventBus};
use crate::engine::operation::{
    OperationError, OperationKind, OperationRecord, OperationRequest, OperationStatus,
};
use crate::engine::projector::{self, RewardProjection};
use crate::ledger::RemoteLedger;
use crate::observability::metrics;
use crate::session::{Session, SessionProvider};

/// States of one submitted request, ending with a terminal record.
///
/// After a Confirmed record the stream stays open until the follow-up
/// balance refresh has been attempted, then closes.
#[derive(Debug)]
pub struct OperationUpdates {
    rx: mpsc::UnboundedReceiver<OperationRecord>,
}

impl OperationUpdates {
    /// Next state, or `None` once the operation is finished.
    pub async fn next_update(&mut self) -> Option<OperationRecord> {
        self.rx.recv().await
    }

    /// Drain the stream and return the final state.
    pub async fn finish(mut self) -> Option<OperationRecord> {
        let mut last = None;
        while let Some(record) = self.rx.recv().await {
            last = Some(record);
        }
        last
    }
}

impl Stream for OperationUpdates {
    type Item = OperationRecord;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

struct Inner<L> {
    ledger: Arc<L>,
    session: SessionProvider,
    /// Session epoch the cache contents belong to.
    cache_epoch: AtomicU64,
    cache: BalanceCache<L>,
    rewards: ArcSwap<RewardsConfig>,
    records: DashMap<OperationKind, OperationRecord>,
    events: EventBus,
}

/// Cloneable handle to the staking engine.
pub struct StakingEngine<L> {
    inner: Arc<Inner<L>>,
}

impl<L> Clone for StakingEngine<L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<L: RemoteLedger> StakingEngine<L> {
    /// Build an engine over `ledger`, reading sessions from `session`.
    pub fn new(ledger: Arc<L>, session: SessionProvider, rewards: RewardsConfig) -> Self {
        let events = EventBus::new();
        let cache = BalanceCache::new(ledger.clone(), events.clone(), rewards.asset_decimals);
        let (_, epoch) = session.current_with_epoch();
        Self {
            inner: Arc::new(Inner {
                ledger,
                cache_epoch: AtomicU64::new(epoch),
                session,
                cache,
                rewards: ArcSwap::from_pointee(rewards),
                records: DashMap::new(),
                events,
            }),
        }
    }

    pub fn session(&self) -> &SessionProvider {
        &self.inner.session
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.inner.ledger
    }

    /// Subscribe to snapshot, record, and refresh-failure events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// Current emission and display settings.
    pub fn rewards(&self) -> Arc<RewardsConfig> {
        self.inner.rewards.load_full()
    }

    /// Swap in new emission settings without restarting.
    ///
    /// `asset_decimals` is fixed for the engine's lifetime: balances and
    /// submitted amounts are scaled by it. A reload that changes it keeps the
    /// old value.
    pub fn update_rewards(&self, mut rewards: RewardsConfig) {
        let held = self.inner.rewards.load().asset_decimals;
        if rewards.asset_decimals != held {
            tracing::warn!(
                configured = rewards.asset_decimals,
                kept = held,
                "Ignoring asset_decimals change on reload; restart to apply"
            );
            rewards.asset_decimals = held;
        }
        let previous = self.inner.rewards.swap(Arc::new(rewards));
        let current = self.inner.rewards.load();
        if previous.rate_per_second != current.rate_per_second {
            tracing::info!(
                old_rate = previous.rate_per_second,
                new_rate = current.rate_per_second,
                "Reward emission rate updated"
            );
        }
    }

    // ---- balances -------------------------------------------------------

    /// Current session, invalidating the cache first if it belongs to an
    /// earlier one. Reconnecting the same account still counts as a change.
    fn sync_session(&self) -> Session {
        let (session, epoch) = self.inner.session.current_with_epoch();
        let seen = self.inner.cache_epoch.load(Ordering::SeqCst);
        if seen != epoch
            && self
                .inner
                .cache_epoch
                .compare_exchange(seen, epoch, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            tracing::debug!(epoch, "Session changed, invalidating balances");
            self.inner.cache.invalidate();
        }
        session
    }

    /// Snapshot for the connected account; `None` when disconnected or not yet read.
    pub fn snapshot(&self) -> Option<Arc<BalanceSnapshot>> {
        let account = self.sync_session().account()?;
        self.inner
            .cache
            .snapshot()
            .filter(|snapshot| snapshot.address == account)
    }

    /// Refresh balances for the current session.
    pub async fn refresh(&self) -> Result<Arc<BalanceSnapshot>, ReadError> {
        let session = self.sync_session();
        self.inner.cache.refresh(&session).await
    }

    /// Refresh using only a read set issued after `watermark`.
    async fn refresh_issued_after(&self, watermark: u64) -> Result<Arc<BalanceSnapshot>, ReadError> {
        let session = self.sync_session();
        self.inner.cache.refresh_issued_after(&session, watermark).await
    }

    /// Forget cached balances and adopt the current session epoch.
    pub fn invalidate(&self) {
        let (_, epoch) = self.inner.session.current_with_epoch();
        self.inner.cache_epoch.store(epoch, Ordering::SeqCst);
        self.inner.cache.invalidate();
    }

    /// Staked balance formatted for an amount field ("MAX").
    pub fn max_unstake_input(&self) -> Option<String> {
        let snapshot = self.snapshot()?;
        if snapshot.staked_balance.is_zero() {
            return None;
        }
        Some(format_units(snapshot.staked_balance, self.inner.rewards.load().asset_decimals))
    }

    // ---- projections ----------------------------------------------------

    /// Projected rewards for a principal as typed by the user.
    pub fn projection(&self, principal_input: &str) -> Option<RewardProjection> {
        projector::project(principal_input, self.inner.rewards.load().rate_per_second)
    }

    /// Projected rewards for what is currently staked.
    pub fn staked_projection(&self) -> Option<RewardProjection> {
        let snapshot = self.snapshot()?;
        let rewards = self.inner.rewards.load();
        projector::project_amount(
            to_f64_lossy(snapshot.staked_balance, rewards.asset_decimals),
            rewards.rate_per_second,
        )
    }

    // ---- operations -----------------------------------------------------

    /// Live record for `kind`, if one exists.
    pub fn record(&self, kind: OperationKind) -> Option<OperationRecord> {
        self.inner.records.get(&kind).map(|r| r.value().clone())
    }

    /// Return `kind` to Idle. Refused while a record is Submitted.
    pub fn reset(&self, kind: OperationKind) -> bool {
        let removed = self
            .inner
            .records
            .remove_if(&kind, |_, record| record.status != OperationStatus::Submitted);
        removed.is_some() || !self.inner.records.contains_key(&kind)
    }

    /// Validate and submit a request.
    ///
    /// Validation failures are already in the returned stream when this
    /// returns; the ledger outcome arrives later from a spawned task.
    /// Must be called inside a Tokio runtime.
    pub fn submit(&self, request: OperationRequest) -> OperationUpdates {
        let (tx, rx) = mpsc::unbounded_channel();
        let kind = request.kind;

        let mut record = OperationRecord::new(kind);
        record.begin_validation();
        self.emit(&tx, &record);

        let amount = match self.validate(&request) {
            Ok(amount) => amount,
            Err(error) => {
                self.reject(&tx, record, error);
                return OperationUpdates { rx };
            }
        };

        let mut submitted = record.clone();
        submitted.submit(amount);
        if let Err(error) = self.claim_slot(&submitted) {
            self.reject(&tx, record, error);
            return OperationUpdates { rx };
        }
        let record = submitted;

        tracing::info!(
            id = %record.id,
            kind = %kind,
            amount = ?amount,
            "Operation submitted"
        );
        self.emit(&tx, &record);

        let engine = self.clone();
        tokio::spawn(async move {
            engine.drive(record, tx).await;
        });

        OperationUpdates { rx }
    }

    fn validate(&self, request: &OperationRequest) -> Result<Option<U256>, OperationError> {
        let Some(account) = self.sync_session().account() else {
            return Err(OperationError::NotConnected);
        };

        if !request.kind.requires_amount() {
            return Ok(None);
        }

        let decimals = self.inner.rewards.load().asset_decimals;
        let input = request.amount.as_deref().unwrap_or_default();
        let amount = parse_units(input, decimals).map_err(OperationError::InvalidAmount)?;

        if request.kind == OperationKind::Unstake {
            let staked = self
                .inner
                .cache
                .snapshot()
                .filter(|snapshot| snapshot.address == account)
                .map(|snapshot| snapshot.staked_balance)
                .unwrap_or(U256::ZERO);
            if amount > staked {
                return Err(OperationError::InsufficientBalance {
                    requested: format_units(amount, decimals),
                    available: format_units(staked, decimals),
                });
            }
        }

        Ok(Some(amount))
    }

    /// Install `record` as the live Submitted record for its kind.
    fn claim_slot(&self, record: &OperationRecord) -> Result<(), OperationError> {
        let mut slot = self
            .inner
            .records
            .entry(record.kind)
            .or_insert_with(|| OperationRecord::new(record.kind));
        if slot.status == OperationStatus::Submitted {
            return Err(OperationError::OperationInProgress(record.kind));
        }
        *slot = record.clone();
        Ok(())
    }

    fn reject(&self, tx: &mpsc::UnboundedSender<OperationRecord>, mut record: OperationRecord, error: OperationError) {
        tracing::info!(id = %record.id, kind = %record.kind, error = %error, "Operation rejected locally");
        record.fail(error);
        self.emit(tx, &record);
    }

    async fn drive(&self, mut record: OperationRecord, tx: mpsc::UnboundedSender<OperationRecord>) {
        let ledger = &self.inner.ledger;
        let amount = record.amount.unwrap_or_default();
        let outcome = match record.kind {
            OperationKind::Stake => ledger.stake(amount).await,
            OperationKind::Unstake => ledger.unstake(amount).await,
            OperationKind::Claim => ledger.claim_rewards().await,
        };

        // Reads issued before this point may predate the confirmation.
        let watermark = self.inner.cache.last_issued();

        let confirmed = match outcome {
            Ok(confirmation) => {
                record.confirm(&confirmation);
                tracing::info!(
                    id = %record.id,
                    kind = %record.kind,
                    tx_hash = %confirmation.tx_hash,
                    "Operation confirmed"
                );
                true
            }
            Err(e) => {
                let error = OperationError::from_ledger(record.kind, &e);
                tracing::warn!(id = %record.id, kind = %record.kind, error = %error, "Operation failed");
                record.fail(error);
                false
            }
        };

        self.settle(&record);
        self.emit(&tx, &record);

        if confirmed {
            // Confirmation does not guarantee the new balances are visible yet,
            // and a failed read must not undo the confirmation.
            if let Err(e) = self.refresh_issued_after(watermark).await {
                tracing::warn!(id = %record.id, error = %e, "Post-confirmation refresh failed");
            }
        }
    }

    /// Write a terminal state into the live slot if it still holds this record.
    fn settle(&self, record: &OperationRecord) {
        if let Some(mut slot) = self.inner.records.get_mut(&record.kind) {
            if slot.id == record.id && slot.status == OperationStatus::Submitted {
                *slot = record.clone();
            }
        }
    }

    fn emit(&self, tx: &mpsc::UnboundedSender<OperationRecord>, record: &OperationRecord) {
        metrics::record_operation(record.kind, record.status);
        let _ = tx.send(record.clone());
        self.inner
            .events
            .publish(EngineEvent::OperationUpdated(record.clone()));
    }
}

impl<L> std::fmt::Debug for StakingEngine<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StakingEngine")
            .field("session", &self.inner.session.current())
            .field("rewards", &self.inner.rewards.load_full())
            .field("records", &self.inner.records.len())
            .finish()
    }
}
