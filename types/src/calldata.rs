//! Law calldata: the ABI-encoded parameter tuple a law is invoked with.

use alloy_primitives::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// ABI word size in bytes.
pub const WORD: usize = 32;

/// Canonical law calldata.
///
/// Always empty or a whole number of 32-byte ABI words. Constructing one from
/// anything else fails instead of silently hashing a malformed payload.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Bytes", into = "Bytes")]
pub struct CallData(Bytes);

impl CallData {
    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    /// Wrap raw bytes, rejecting payloads that are not word aligned.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, TypesError> {
        let bytes = bytes.into();
        if bytes.len() % WORD != 0 {
            return Err(TypesError::NonCanonicalCallData { len: bytes.len() });
        }
        Ok(Self(Bytes::from(bytes)))
    }

    /// Parse a `0x`-prefixed hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypesError> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| TypesError::InvalidHex(format!("missing 0x prefix: {s:?}")))?;
        if digits.len() % 2 != 0 {
            return Err(TypesError::InvalidHex(format!(
                "odd number of hex digits ({})",
                digits.len()
            )));
        }
        let bytes = hex::decode(digits).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
        Self::from_bytes(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl TryFrom<Bytes> for CallData {
    type Error = TypesError;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes.to_vec())
    }
}

impl From<CallData> for Bytes {
    fn from(data: CallData) -> Self {
        data.0
    }
}

impl fmt::Debug for CallData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallData({} bytes)", self.0.len())
    }
}

impl fmt::Display for CallData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
