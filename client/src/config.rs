//! Client configuration with TOML file support.

use alloy_primitives::Address;
use powers_rpc::RpcConfig;
use powers_types::{ChainCapabilities, ChainId};
use powers_utils::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ClientError;

/// Configuration for a [`PowersClient`](crate::PowersClient).
///
/// Loaded from a TOML file via [`ClientConfig::from_toml_file`] or built
/// programmatically. Missing keys take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// JSON-RPC endpoint of the chain's node.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Account used for deployments. Read-only commands work without one.
    #[serde(default)]
    pub sender: Option<Address>,

    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Whether the chain applies batched writes atomically. Selects the
    /// deployment wiring strategy.
    #[serde(default)]
    pub supports_atomic_batch: bool,

    #[serde(default = "default_confirmations")]
    pub confirmations: u64,

    /// Pause between sequential wiring calls, in milliseconds.
    #[serde(default)]
    pub inter_step_pause_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Print the Prometheus text exposition after each command.
    #[serde(default)]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_chain_id() -> u64 {
    31337
}

fn default_confirmations() -> u64 {
    1
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_confirmation_timeout_ms() -> u64 {
    120_000
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl ClientConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ClientError> {
        toml::from_str(s).map_err(|e| ClientError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, ClientError> {
        toml::to_string_pretty(self).map_err(|e| ClientError::Config(e.to_string()))
    }

    pub fn chain(&self) -> ChainId {
        ChainId::new(self.chain_id)
    }

    pub fn capabilities(&self) -> ChainCapabilities {
        ChainCapabilities {
            chain_id: self.chain(),
            supports_atomic_batch: self.supports_atomic_batch,
            confirmations: self.confirmations,
            inter_step_pause_ms: self.inter_step_pause_ms,
        }
    }

    pub fn rpc(&self) -> RpcConfig {
        RpcConfig {
            url: self.rpc_url.clone(),
            sender: self.sender,
            request_timeout_ms: self.request_timeout_ms,
            poll_interval_ms: self.poll_interval_ms,
            confirmation_timeout_ms: self.confirmation_timeout_ms,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            sender: None,
            chain_id: default_chain_id(),
            supports_atomic_batch: false,
            confirmations: default_confirmations(),
            inter_step_pause_ms: 0,
            request_timeout_ms: default_request_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            confirmation_timeout_ms: default_confirmation_timeout_ms(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            enable_metrics: false,
        }
    }
}
