//! Connectivity watcher.
//!
//! Platform shells feed online/offline transitions into a [`Connectivity`]
//! handle; the sync engines subscribe and use the transitions purely as
//! replay/sync triggers — a push can still fail even when reported online.

use tokio::sync::watch;

/// Observable online/offline flag shared between a platform shell and the
/// sync engines.
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: watch::Sender<bool>,
}

impl Connectivity {
    /// Create a watcher with an initial state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    /// Report a connectivity transition. No-op when the state is unchanged.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    /// Current state as last reported.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribe to transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_transitions_are_observed() {
        let connectivity = Connectivity::new(false);
        let mut rx = connectivity.subscribe();

        assert!(!connectivity.is_online());
        connectivity.set_online(true);

        rx.changed().await.unwrap();
        assert!(*rx.borrow());
        assert!(connectivity.is_online());
    }

    #[test]
    fn test_redundant_report_does_not_signal() {
        let connectivity = Connectivity::new(true);
        let rx = connectivity.subscribe();

        connectivity.set_online(true);
        assert!(!rx.has_changed().unwrap());
    }
}
