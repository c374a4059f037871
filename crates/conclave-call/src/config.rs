//! Runtime configuration for chain synchronization.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timer intervals of the per-chain synchronization state machine.
///
/// Both timers are single-shot and re-armed on every relevant transition;
/// see [`ChainStats`](crate::ChainStats) for observing where a chain stands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How long a chain waits for a missing predecessor block to arrive on
    /// its own before asking the transport for it.
    pub wait_for_blocks: Duration,
    /// Interval between health polls while a chain is caught up.
    pub health_poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            wait_for_blocks: Duration::from_secs(1),
            health_poll_interval: Duration::from_secs(60),
        }
    }
}
