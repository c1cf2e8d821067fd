//! Connectivity tracker.
//!
//! A two-state machine, Online and Offline, fed by the host's platform
//! connectivity signal and read by the UI and by the tile resolver's
//! fallback decision. Transitions publish on a watch channel so
//! interested parties can subscribe instead of polling; tests drive
//! transitions directly without touching platform globals.
//!
//! No debouncing or hysteresis is applied: a flapping connection
//! produces a flapping state.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnlineStatus {
    Online,
    Offline,
}

impl OnlineStatus {
    pub fn from_online(online: bool) -> Self {
        if online {
            OnlineStatus::Online
        } else {
            OnlineStatus::Offline
        }
    }

    pub fn is_online(self) -> bool {
        matches!(self, OnlineStatus::Online)
    }
}

/// Shared connectivity state. Clone is cheap; all clones observe and
/// drive the same underlying channel.
#[derive(Clone)]
pub struct ConnectivityTracker {
    tx: Arc<watch::Sender<OnlineStatus>>,
}

impl ConnectivityTracker {
    /// The initial state comes from the platform's current connectivity
    /// signal at startup, supplied by the host.
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(OnlineStatus::from_online(initially_online));
        Self { tx: Arc::new(tx) }
    }

    /// Record a platform online/offline transition.
    pub fn set_status(&self, status: OnlineStatus) {
        let previous = self.tx.send_replace(status);
        if previous != status {
            debug!(?previous, current = ?status, "Connectivity changed");
        }
    }

    pub fn set_online(&self, online: bool) {
        self.set_status(OnlineStatus::from_online(online));
    }

    pub fn status(&self) -> OnlineStatus {
        *self.tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.status().is_online()
    }

    /// Subscribe to status transitions.
    pub fn subscribe(&self) -> watch::Receiver<OnlineStatus> {
        self.tx.subscribe()
    }
}
