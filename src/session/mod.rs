//! Session provider: which account is connected, if any.
//!
//! The engine only reads sessions. Whoever owns the wallet connection (the
//! CLI, the watch daemon, a UI shell) drives `connect` / `disconnect`, and
//! every change is published on a watch channel so dependents can
//! invalidate cached state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy::primitives::Address;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

/// Current account and connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Session {
    pub address: Option<Address>,
    pub connected: bool,
}

impl Session {
    /// No wallet connected.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Wallet connected as `address`.
    pub fn connected(address: Address) -> Self {
        Self {
            address: Some(address),
            connected: true,
        }
    }

    /// The usable account: only present when connected with an address.
    pub fn account(&self) -> Option<Address> {
        if self.connected {
            self.address
        } else {
            None
        }
    }
}

/// The signing wallet and the requested watch address disagree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("address {requested} does not match the signing wallet {signer}; drop it or unset the wallet key")]
pub struct AccountMismatch {
    pub signer: Address,
    pub requested: Address,
}

/// Pick the session account for a process.
///
/// With a signer, the session is always the signer's account: reads and
/// writes must concern the same address. A watch address is only honoured
/// without a signer.
pub fn resolve_account(
    signer: Option<Address>,
    requested: Option<Address>,
) -> Result<Session, AccountMismatch> {
    match (signer, requested) {
        (Some(signer), Some(requested)) if signer != requested => {
            Err(AccountMismatch { signer, requested })
        }
        (Some(account), _) | (None, Some(account)) => Ok(Session::connected(account)),
        (None, None) => Ok(Session::disconnected()),
    }
}

/// Shared handle that owns the current [`Session`].
#[derive(Clone, Debug)]
pub struct SessionProvider {
    tx: Arc<watch::Sender<Session>>,
    /// Bumped on every change, inside the channel's write lock.
    epoch: Arc<AtomicU64>,
}

impl SessionProvider {
    /// Create a provider holding `initial`.
    pub fn new(initial: Session) -> Self {
        let (tx, _) = watch::channel(initial);
        Self {
            tx: Arc::new(tx),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Snapshot of the current session.
    pub fn current(&self) -> Session {
        *self.tx.borrow()
    }

    /// Current session with its change counter. Both come from the same
    /// change, so an equal epoch means the same session instance.
    pub fn current_with_epoch(&self) -> (Session, u64) {
        let session = self.tx.borrow();
        (*session, self.epoch.load(Ordering::SeqCst))
    }

    /// Receive change notifications.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Connect as `address`. No notification if nothing changes.
    pub fn connect(&self, address: Address) {
        self.set(Session::connected(address));
    }

    /// Drop the connection.
    pub fn disconnect(&self) {
        self.set(Session::disconnected());
    }

    fn set(&self, next: Session) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            self.epoch.fetch_add(1, Ordering::SeqCst);
            true
        });
        if changed {
            tracing::info!(address = ?next.address, connected = next.connected, "Session changed");
        }
    }
}

impl Default for SessionProvider {
    fn default() -> Self {
        Self::new(Session::disconnected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_requires_connection() {
        let addr = Address::repeat_byte(0x11);
        assert_eq!(Session::connected(addr).account(), Some(addr));
        assert_eq!(Session::disconnected().account(), None);

        let stale = Session {
            address: Some(addr),
            connected: false,
        };
        assert_eq!(stale.account(), None);
    }

    #[tokio::test]
    async fn test_change_notifications() {
        let provider = SessionProvider::default();
        let mut rx = provider.subscribe();
        let addr = Address::repeat_byte(0x22);

        provider.connect(addr);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Session::connected(addr));

        // Reconnecting the same account is not a change.
        provider.connect(addr);
        assert!(!rx.has_changed().unwrap());

        provider.disconnect();
        rx.changed().await.unwrap();
        assert_eq!(provider.current(), Session::disconnected());
    }

    #[test]
    fn test_epoch_counts_changes_only() {
        let provider = SessionProvider::default();
        let addr = Address::repeat_byte(0x33);
        assert_eq!(provider.current_with_epoch().1, 0);

        provider.connect(addr);
        provider.connect(addr);
        assert_eq!(provider.current_with_epoch(), (Session::connected(addr), 1));

        provider.disconnect();
        provider.connect(addr);
        assert_eq!(provider.current_with_epoch(), (Session::connected(addr), 3));
    }

    #[test]
    fn test_signer_decides_the_account() {
        let signer = Address::repeat_byte(0x44);
        let other = Address::repeat_byte(0x55);

        assert_eq!(resolve_account(Some(signer), None), Ok(Session::connected(signer)));
        assert_eq!(resolve_account(Some(signer), Some(signer)), Ok(Session::connected(signer)));
        assert_eq!(
            resolve_account(Some(signer), Some(other)),
            Err(AccountMismatch { signer, requested: other })
        );
        assert_eq!(resolve_account(None, Some(other)), Ok(Session::connected(other)));
        assert_eq!(resolve_account(None, None), Ok(Session::disconnected()));
    }
}
