//! Authorized nonce windows.
//!
//! A node may only seal with nonces it has been authorized to claim. The
//! registry maps a plot identifier to its `[min_nonce, max_nonce]` window;
//! the miner consults it before scoring any stored nonce. Updates arrive
//! from outside the mining path, so the map is read-mostly.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Inclusive nonce window a plot id is authorized to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceWindow {
    pub min_nonce: u64,
    pub max_nonce: u64,
}

impl NonceWindow {
    pub fn contains(&self, nonce: u64) -> bool {
        nonce >= self.min_nonce && nonce <= self.max_nonce
    }
}

/// Registry of authorized nonce windows, keyed by plot id.
#[derive(Default)]
pub struct NonceRegistry {
    windows: RwLock<HashMap<u64, NonceWindow>>,
}

impl NonceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authorize(&self, plot_id: u64, window: NonceWindow) {
        self.windows.write().insert(plot_id, window);
    }

    pub fn revoke(&self, plot_id: u64) {
        self.windows.write().remove(&plot_id);
    }

    /// Window for a plot id, or `None` when the node is not authorized.
    pub fn window(&self, plot_id: u64) -> Option<NonceWindow> {
        self.windows.read().get(&plot_id).copied()
    }
}
