//! Observable sync state shared by the sync manager and realtime merge.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use ireport_core::models::Incident;

/// Snapshot of the console's sync state, published to observers after every
/// pass and on every connection transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Whether the cloud (and its change feed) is reachable
    pub connected: bool,
    /// When the last successful pass finished (Unix ms)
    pub last_sync: Option<i64>,
    /// Outbound changes awaiting push
    pub pending: usize,
    /// Changes dropped after exhausting push retries
    pub dead_letter: usize,
    /// Whether a pass is currently running
    pub syncing: bool,
}

/// Receives sync engine notifications.
///
/// The console UI layer implements this; core logic never depends on any UI
/// toolkit.
pub trait SyncObserver: Send + Sync {
    /// The aggregate sync status changed
    fn on_status_changed(&self, _status: &SyncStatus) {}

    /// A cloud-side change was merged into the local mirror
    fn on_incident_updated(&self, _incident: &Incident) {}
}

/// Registered observers, notified in registration order.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    observers: Mutex<Vec<Arc<dyn SyncObserver>>>,
}

impl ObserverRegistry {
    pub fn register(&self, observer: Arc<dyn SyncObserver>) {
        self.observers
            .lock()
            .expect("observer registry lock poisoned")
            .push(observer);
    }

    pub fn notify_status(&self, status: &SyncStatus) {
        let observers = self
            .observers
            .lock()
            .expect("observer registry lock poisoned")
            .clone();
        for observer in observers {
            observer.on_status_changed(status);
        }
    }

    pub fn notify_incident(&self, incident: &Incident) {
        let observers = self
            .observers
            .lock()
            .expect("observer registry lock poisoned")
            .clone();
        for observer in observers {
            observer.on_incident_updated(incident);
        }
    }
}

#[derive(Debug, Default)]
struct StatusInner {
    connected: bool,
    last_sync: Option<i64>,
    pending: usize,
    dead_letter: usize,
}

/// Mutable sync state owned by the sync manager and shared with the realtime
/// merge handler. The `syncing` flag doubles as the re-entry guard.
#[derive(Debug, Default)]
pub(crate) struct StatusCell {
    syncing: AtomicBool,
    inner: Mutex<StatusInner>,
}

impl StatusCell {
    /// Claim the pass guard. Returns `false` when a pass is already running.
    pub fn begin_pass(&self) -> bool {
        self.syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_pass(&self) {
        self.syncing.store(false, Ordering::Release);
    }

    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    pub fn set_last_sync(&self, timestamp: i64) {
        self.lock().last_sync = Some(timestamp);
    }

    pub fn set_counts(&self, pending: usize, dead_letter: usize) {
        let mut inner = self.lock();
        inner.pending = pending;
        inner.dead_letter = dead_letter;
    }

    pub fn snapshot(&self) -> SyncStatus {
        let inner = self.lock();
        SyncStatus {
            connected: inner.connected,
            last_sync: inner.last_sync,
            pending: inner.pending,
            dead_letter: inner.dead_letter,
            syncing: self.syncing.load(Ordering::Acquire),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatusInner> {
        self.inner.lock().expect("status lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_begin_pass_is_exclusive() {
        let cell = StatusCell::default();
        assert!(cell.begin_pass());
        assert!(!cell.begin_pass());

        cell.end_pass();
        assert!(cell.begin_pass());
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let cell = StatusCell::default();
        cell.set_connected(true);
        cell.set_last_sync(42);
        cell.set_counts(3, 1);

        assert_eq!(
            cell.snapshot(),
            SyncStatus {
                connected: true,
                last_sync: Some(42),
                pending: 3,
                dead_letter: 1,
                syncing: false,
            }
        );
    }
}
