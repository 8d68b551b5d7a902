//! Connectivity state derived from collaborator reachability.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    /// The identity/storage backend answered the last request.
    Online,
    /// The last request failed to reach the backend.
    Offline,
}

/// Shared online/offline flag.
///
/// Flipped by the outcome of collaborator calls; while offline the client
/// keeps serving the locally restored session.
#[derive(Debug)]
pub struct OfflineMode {
    offline: AtomicBool,
}

impl Default for OfflineMode {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflineMode {
    pub fn new() -> Self {
        Self {
            offline: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ConnectivityState {
        if self.is_offline() {
            ConnectivityState::Offline
        } else {
            ConnectivityState::Online
        }
    }

    pub fn set_offline(&self) {
        if !self.offline.swap(true, Ordering::SeqCst) {
            tracing::warn!("backend unreachable; working offline");
        }
    }

    pub fn set_online(&self) {
        if self.offline.swap(false, Ordering::SeqCst) {
            tracing::info!("backend reachable again");
        }
    }

    /// Record whether the last collaborator call got through.
    pub fn observe(&self, reachable: bool) {
        if reachable {
            self.set_online();
        } else {
            self.set_offline();
        }
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }
}
