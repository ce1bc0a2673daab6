//! Balance cache: the latest consistent read of an account's balances.
//!
//! # Responsibilities
//! - Read native balance, staked balance, and pending rewards together
//! - Coalesce concurrent refreshes for the same account into one read set
//! - Adopt a snapshot only if it is fresher than the one held
//! - Forget everything when the session changes
//!
//! # Design Decisions
//! - Snapshots are immutable and swapped atomically (`ArcSwapOption`)
//! - Freshness is the read-issue sequence number, not completion order
//! - A failed read keeps the previous snapshot and reports the failure

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};

use alloy::primitives::{Address, U256};
use arc_swap::ArcSwapOption;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use thiserror::Error;

use crate::engine::events::{EngineEvent, EventBus};
use crate::ledger::{LedgerError, RemoteLedger};
use crate::observability::metrics;
use crate::session::Session;

/// A consistent, timestamped read of one account's balances (base units).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    pub address: Address,
    pub native_balance: U256,
    pub staked_balance: U256,
    pub pending_rewards: U256,
    /// Wall-clock time of adoption; strictly increases across adopted snapshots.
    pub fetched_at: SystemTime,
    /// Read-issue order. A higher sequence always wins.
    pub sequence: u64,
}

/// Why a refresh produced no snapshot.
#[derive(Debug, Clone, Error)]
pub enum ReadError {
    #[error("No wallet connected")]
    NotConnected,

    #[error("Failed to read {what}: {source}")]
    Ledger {
        what: &'static str,
        source: LedgerError,
    },
}

type RefreshResult = Result<Arc<BalanceSnapshot>, ReadError>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;

struct InFlight {
    address: Address,
    epoch: u64,
    sequence: u64,
    future: SharedRefresh,
}

struct CacheState {
    current: ArcSwapOption<BalanceSnapshot>,
    /// Bumped on invalidation; reads issued under an older epoch are dropped.
    epoch: AtomicU64,
    /// Last issued read set; assigned when the read is started, not when it first runs.
    sequence: AtomicU64,
    inflight: Mutex<Option<InFlight>>,
    events: EventBus,
    decimals: u8,
}

impl CacheState {
    fn inflight(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.inflight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn finish(&self, sequence: u64) {
        let mut inflight = self.inflight();
        if inflight.as_ref().is_some_and(|f| f.sequence == sequence) {
            *inflight = None;
        }
    }

    /// Adopt `draft` if its epoch is current and it is fresher than what is held.
    fn apply(&self, draft: &BalanceSnapshot, epoch: u64) -> Option<Arc<BalanceSnapshot>> {
        let mut adopted = None;
        self.current.rcu(|current| {
            adopted = None;
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return current.clone();
            }
            let mut next = draft.clone();
            if let Some(held) = current {
                if held.sequence >= next.sequence {
                    return current.clone();
                }
                if next.fetched_at <= held.fetched_at {
                    next.fetched_at = held.fetched_at + Duration::from_nanos(1);
                }
            }
            let next = Arc::new(next);
            adopted = Some(next.clone());
            Some(next)
        });
        adopted
    }
}

/// Shared, cloneable balance cache over a [`RemoteLedger`].
pub struct BalanceCache<L> {
    ledger: Arc<L>,
    state: Arc<CacheState>,
}

impl<L> Clone for BalanceCache<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            state: self.state.clone(),
        }
    }
}

impl<L: RemoteLedger> BalanceCache<L> {
    /// Create an empty cache. `decimals` is only used for gauges.
    pub fn new(ledger: Arc<L>, events: EventBus, decimals: u8) -> Self {
        Self {
            ledger,
            state: Arc::new(CacheState {
                current: ArcSwapOption::empty(),
                epoch: AtomicU64::new(0),
                sequence: AtomicU64::new(0),
                inflight: Mutex::new(None),
                events,
                decimals,
            }),
        }
    }

    /// The snapshot currently held, if any.
    pub fn snapshot(&self) -> Option<Arc<BalanceSnapshot>> {
        self.state.current.load_full()
    }

    /// Drop the held snapshot and any in-flight read.
    pub fn invalidate(&self) {
        self.state.epoch.fetch_add(1, Ordering::SeqCst);
        *self.state.inflight() = None;
        if self.state.current.swap(None).is_some() {
            tracing::debug!("Balance snapshot invalidated");
            self.state.events.publish(EngineEvent::SnapshotUpdated(None));
        }
    }

    /// Read all balances for the session's account.
    ///
    /// Joins an in-flight read for the same account instead of starting a
    /// second one. Returns the snapshot this read produced, which may have
    /// been discarded if something fresher was adopted meanwhile.
    pub async fn refresh(&self, session: &Session) -> RefreshResult {
        self.refresh_issued_after(session, 0).await
    }

    /// Sequence of the most recently issued read set.
    pub fn last_issued(&self) -> u64 {
        self.state.sequence.load(Ordering::SeqCst)
    }

    /// Like [`refresh`](Self::refresh), but only joins a read set issued after
    /// `watermark`. An older in-flight read is left to finish on its own and
    /// can no longer win against the read started here.
    pub async fn refresh_issued_after(&self, session: &Session, watermark: u64) -> RefreshResult {
        let Some(address) = session.account() else {
            return Err(ReadError::NotConnected);
        };

        let future = {
            let mut inflight = self.state.inflight();
            let epoch = self.state.epoch.load(Ordering::SeqCst);
            let joinable = inflight
                .as_ref()
                .filter(|f| f.address == address && f.epoch == epoch && f.sequence > watermark)
                .map(|f| f.future.clone());
            match joinable {
                Some(future) => {
                    tracing::trace!(address = %address, "Joining in-flight balance refresh");
                    future
                }
                None => {
                    let sequence = self.state.sequence.fetch_add(1, Ordering::SeqCst) + 1;
                    let future = read_and_apply(
                        self.ledger.clone(),
                        self.state.clone(),
                        address,
                        epoch,
                        sequence,
                    )
                    .boxed()
                    .shared();
                    *inflight = Some(InFlight {
                        address,
                        epoch,
                        sequence,
                        future: future.clone(),
                    });
                    future
                }
            }
        };

        future.await
    }
}

impl<L> std::fmt::Debug for BalanceCache<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceCache")
            .field("snapshot", &self.state.current.load_full())
            .field("epoch", &self.state.epoch.load(Ordering::Relaxed))
            .finish()
    }
}

async fn read_and_apply<L: RemoteLedger>(
    ledger: Arc<L>,
    state: Arc<CacheState>,
    address: Address,
    epoch: u64,
    sequence: u64,
) -> RefreshResult {
    let started = Instant::now();

    let result = tokio::try_join!(
        async {
            ledger
                .native_balance_of(address)
                .await
                .map_err(|source| ReadError::Ledger { what: "native balance", source })
        },
        async {
            ledger
                .staked_balance_of(address)
                .await
                .map_err(|source| ReadError::Ledger { what: "staked balance", source })
        },
        async {
            ledger
                .pending_rewards_of(address)
                .await
                .map_err(|source| ReadError::Ledger { what: "pending rewards", source })
        },
    );

    state.finish(sequence);
    metrics::record_refresh(result.is_ok(), started);

    let (native_balance, staked_balance, pending_rewards) = match result {
        Ok(balances) => balances,
        Err(e) => {
            tracing::warn!(address = %address, error = %e, "Balance refresh failed, keeping previous snapshot");
            state.events.publish(EngineEvent::RefreshFailed(e.clone()));
            return Err(e);
        }
    };

    let draft = BalanceSnapshot {
        address,
        native_balance,
        staked_balance,
        pending_rewards,
        fetched_at: SystemTime::now(),
        sequence,
    };

    match state.apply(&draft, epoch) {
        Some(adopted) => {
            tracing::debug!(
                address = %address,
                sequence,
                staked = %adopted.staked_balance,
                pending = %adopted.pending_rewards,
                "Balance snapshot updated"
            );
            metrics::record_snapshot(&adopted, state.decimals);
            state.events.publish(EngineEvent::SnapshotUpdated(Some(adopted.clone())));
            Ok(adopted)
        }
        None => {
            tracing::debug!(address = %address, sequence, "Discarding stale balance snapshot");
            Ok(Arc::new(draft))
        }
    }
}
