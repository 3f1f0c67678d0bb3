//! Identifiers for laws, actions, and roles.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable index of a law within an organization.
///
/// Index `0` is never assigned to a law. Condition fields that reference
/// another law use `0` to mean "no dependency".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LawId(u16);

impl LawId {
    /// The "not applicable" reference.
    pub const NONE: Self = Self(0);

    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    pub const fn get(&self) -> u16 {
        self.0
    }

    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// `Some(self)` for a real law reference, `None` for index `0`.
    pub fn dependency(self) -> Option<Self> {
        if self.is_none() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for LawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "law#{}", self.0)
    }
}

impl From<u16> for LawId {
    fn from(index: u16) -> Self {
        Self(index)
    }
}

/// Content address of an action: `keccak256(abi.encode(lawId, callData, nonce))`
/// read as a big-endian `uint256`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionId(U256);

impl ActionId {
    pub const fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Self(U256::from_be_bytes(bytes))
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0.to_be_bytes::<32>()
    }

    /// `0x`-prefixed, zero-padded hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_be_bytes()))
    }
}

impl fmt::Debug for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionId({})", &self.to_hex()[..10])
    }
}

/// Decimal, matching how the ledger and its explorers print `uint256` ids.
impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A role identifier as stored by the organization contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleId(U256);

impl RoleId {
    /// Role `0` is held by the organization's admin.
    pub const ADMIN: Self = Self(U256::ZERO);
    /// The maximum role id is held by every account.
    pub const PUBLIC: Self = Self(U256::MAX);

    pub const fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }

    pub fn is_public(&self) -> bool {
        *self == Self::PUBLIC
    }
}

impl From<u64> for RoleId {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_public() {
            write!(f, "role:public")
        } else {
            write!(f, "role:{}", self.0)
        }
    }
}
