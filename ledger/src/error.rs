use powers_crypto::AbiError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The request never got a usable answer (connection, timeout, HTTP status).
    #[error("transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transaction {tx} reverted")]
    Reverted { tx: String },

    #[error("decode error: {0}")]
    Decode(#[from] AbiError),

    #[error("unsupported by this ledger: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Other(String),
}

impl LedgerError {
    /// Failures of the infrastructure rather than of the request itself.
    ///
    /// Nothing in this workspace retries automatically; callers use this to
    /// decide what to show an operator.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
