//! Shared utilities for engine integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use tokio::sync::Semaphore;

use staking_engine::config::RewardsConfig;
use staking_engine::ledger::{LedgerError, LedgerResult, RemoteLedger, TxConfirmation};
use staking_engine::{Session, SessionProvider, StakingEngine};

pub const ONE: u128 = 1_000_000_000_000_000_000;

pub fn alice() -> Address {
    Address::repeat_byte(0xa1)
}

pub fn bob() -> Address {
    Address::repeat_byte(0xb0)
}

/// `whole` units of an 18-decimal asset.
pub fn units(whole: u64) -> U256 {
    U256::from(whole) * U256::from(ONE)
}

/// When closed, callers block until permits are released.
pub struct Gate {
    closed: AtomicBool,
    permits: Semaphore,
    waiting: AtomicU32,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            closed: AtomicBool::new(false),
            permits: Semaphore::new(0),
            waiting: AtomicU32::new(0),
        }
    }
}

impl Gate {
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn open(&self) {
        self.closed.store(false, Ordering::SeqCst);
        self.permits.add_permits(1024);
    }

    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }

    pub fn waiting(&self) -> u32 {
        self.waiting.load(Ordering::SeqCst)
    }

    async fn pass(&self) {
        if !self.closed.load(Ordering::SeqCst) {
            return;
        }
        self.waiting.fetch_add(1, Ordering::SeqCst);
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Balances {
    pub native: U256,
    pub staked: U256,
    pub rewards: U256,
}

/// Programmable in-memory ledger for one signing account.
#[derive(Default)]
pub struct MockLedger {
    signer: Address,
    balances: Mutex<HashMap<Address, Balances>>,
    read_failure: Mutex<Option<LedgerError>>,
    write_failure: Mutex<Option<LedgerError>>,
    pub reads: Gate,
    pub writes: Gate,
    pub staked_reads: AtomicU32,
    pub stake_calls: AtomicU32,
    pub unstake_calls: AtomicU32,
    pub claim_calls: AtomicU32,
    blocks: AtomicU32,
}

impl MockLedger {
    pub fn new(signer: Address) -> Self {
        Self {
            signer,
            ..Default::default()
        }
    }

    pub fn set_balances(&self, account: Address, balances: Balances) {
        self.balances.lock().unwrap().insert(account, balances);
    }

    pub fn balances(&self, account: Address) -> Balances {
        self.balances.lock().unwrap().get(&account).copied().unwrap_or_default()
    }

    /// Make the staked-balance read fail (the other two reads still succeed).
    pub fn fail_staked_reads(&self, error: Option<LedgerError>) {
        *self.read_failure.lock().unwrap() = error;
    }

    pub fn fail_writes(&self, error: Option<LedgerError>) {
        *self.write_failure.lock().unwrap() = error;
    }

    pub fn write_calls(&self) -> u32 {
        self.stake_calls.load(Ordering::SeqCst)
            + self.unstake_calls.load(Ordering::SeqCst)
            + self.claim_calls.load(Ordering::SeqCst)
    }

    async fn write(&self, apply: impl FnOnce(&mut Balances)) -> LedgerResult<TxConfirmation> {
        self.writes.pass().await;
        if let Some(error) = self.write_failure.lock().unwrap().clone() {
            return Err(error);
        }
        apply(self.balances.lock().unwrap().entry(self.signer).or_default());
        let block = self.blocks.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TxConfirmation {
            tx_hash: TxHash::repeat_byte(block as u8),
            block_number: Some(block as u64),
        })
    }
}

/// Reads see the ledger as of the moment they are issued; the gate only
/// delays the answer.
impl RemoteLedger for MockLedger {
    async fn native_balance_of(&self, account: Address) -> LedgerResult<U256> {
        let value = self.balances(account).native;
        self.reads.pass().await;
        Ok(value)
    }

    async fn staked_balance_of(&self, account: Address) -> LedgerResult<U256> {
        self.staked_reads.fetch_add(1, Ordering::SeqCst);
        let value = self.balances(account).staked;
        self.reads.pass().await;
        if let Some(error) = self.read_failure.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(value)
    }

    async fn pending_rewards_of(&self, account: Address) -> LedgerResult<U256> {
        let value = self.balances(account).rewards;
        self.reads.pass().await;
        Ok(value)
    }

    async fn stake(&self, value: U256) -> LedgerResult<TxConfirmation> {
        self.stake_calls.fetch_add(1, Ordering::SeqCst);
        self.write(|b| {
            b.native -= value;
            b.staked += value;
        })
        .await
    }

    async fn unstake(&self, amount: U256) -> LedgerResult<TxConfirmation> {
        self.unstake_calls.fetch_add(1, Ordering::SeqCst);
        self.write(|b| {
            b.staked -= amount;
            b.native += amount;
        })
        .await
    }

    async fn claim_rewards(&self) -> LedgerResult<TxConfirmation> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        self.write(|b| b.rewards = U256::ZERO).await
    }
}

/// Engine over a mock ledger with `account` connected.
pub fn engine_for(account: Address) -> (StakingEngine<MockLedger>, Arc<MockLedger>) {
    let ledger = Arc::new(MockLedger::new(account));
    let session = SessionProvider::new(Session::connected(account));
    let engine = StakingEngine::new(ledger.clone(), session, RewardsConfig::default());
    (engine, ledger)
}

/// Engine with no wallet connected.
pub fn disconnected_engine() -> (StakingEngine<MockLedger>, Arc<MockLedger>) {
    let ledger = Arc::new(MockLedger::new(alice()));
    let session = SessionProvider::new(Session::disconnected());
    let engine = StakingEngine::new(ledger.clone(), session, RewardsConfig::default());
    (engine, ledger)
}

/// Poll `cond` until it holds or a second passes.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
