//! Errors raised while constructing shared types from untrusted input.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("calldata is not ABI word aligned: {len} bytes")]
    NonCanonicalCallData { len: usize },

    #[error("unknown action state code {0}")]
    UnknownActionState(u8),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
