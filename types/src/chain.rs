//! Chain identifiers and execution capabilities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// EIP-155 chain id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChainId(u64);

impl ChainId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the target chain can guarantee about multi-call execution.
///
/// Resolved once from the environment; deployment strategy is chosen from
/// these flags, never from the chain id itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainCapabilities {
    pub chain_id: ChainId,
    /// A batched write is applied all-or-nothing in a single block.
    pub supports_atomic_batch: bool,
    /// Confirmations to wait for on each submitted transaction.
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// Pause between sequential submissions, in milliseconds.
    #[serde(default)]
    pub inter_step_pause_ms: u64,
}

fn default_confirmations() -> u64 {
    1
}

impl ChainCapabilities {
    /// A chain that executes batched calls atomically.
    pub fn atomic(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            supports_atomic_batch: true,
            confirmations: default_confirmations(),
            inter_step_pause_ms: 0,
        }
    }

    /// A chain where calls must be submitted one at a time, e.g. a
    /// single-producer development node.
    pub fn sequential(chain_id: ChainId, inter_step_pause: Duration) -> Self {
        Self {
            chain_id,
            supports_atomic_batch: false,
            confirmations: default_confirmations(),
            inter_step_pause_ms: inter_step_pause.as_millis() as u64,
        }
    }

    pub fn inter_step_pause(&self) -> Duration {
        Duration::from_millis(self.inter_step_pause_ms)
    }
}
