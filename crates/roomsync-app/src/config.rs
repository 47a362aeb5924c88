//! Synchronization settings.

use roomsync_client::{DEFAULT_BOTTOM_THRESHOLD, ReconnectPolicy};

/// Tunables of the synchronization layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    /// Distance from the bottom (px) under which appends auto-scroll.
    pub bottom_threshold: f64,
    /// What to do when the channel drops unexpectedly.
    pub reconnect: ReconnectPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { bottom_threshold: DEFAULT_BOTTOM_THRESHOLD, reconnect: ReconnectPolicy::Never }
    }
}
