//! Laws and the conditions gating their execution.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{LawId, RoleId};

/// Gating parameters attached to a law.
///
/// Block intervals are counted in ledger blocks. Law references of `0` mean
/// "no dependency".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    /// Role an account must hold to call the law.
    pub allowed_role: RoleId,
    /// Minimum participation (percent). `0` means the law runs without a vote.
    #[serde(default)]
    pub quorum: u8,
    /// Approval threshold (percent).
    #[serde(default)]
    pub succeed_at: u8,
    #[serde(default)]
    pub voting_period: u64,
    /// Minimum blocks between successive fulfillments.
    #[serde(default)]
    pub throttle_execution: u64,
    /// Minimum blocks between vote end and execution.
    #[serde(default)]
    pub delay_execution: u64,
    #[serde(default = "no_law")]
    pub need_fulfilled: LawId,
    #[serde(default = "no_law")]
    pub need_not_fulfilled: LawId,
    /// Informational only; never produces a predicate.
    #[serde(default = "no_law")]
    pub read_state_from: LawId,
}

fn no_law() -> LawId {
    LawId::NONE
}

impl Conditions {
    /// Conditions for a law any holder of `role` may run immediately.
    pub fn open(role: RoleId) -> Self {
        Self {
            allowed_role: role,
            quorum: 0,
            succeed_at: 0,
            voting_period: 0,
            throttle_execution: 0,
            delay_execution: 0,
            need_fulfilled: LawId::NONE,
            need_not_fulfilled: LawId::NONE,
            read_state_from: LawId::NONE,
        }
    }

    /// Whether the law's actions must pass a vote before execution.
    pub fn requires_vote(&self) -> bool {
        self.quorum > 0
    }

    pub fn has_delay(&self) -> bool {
        self.delay_execution > 0
    }

    pub fn has_throttle(&self) -> bool {
        self.throttle_execution > 0
    }

    /// Laws this law depends on, in field order, skipping empty references.
    pub fn dependencies(&self) -> Vec<LawId> {
        [
            self.need_fulfilled,
            self.need_not_fulfilled,
            self.read_state_from,
        ]
        .into_iter()
        .filter_map(LawId::dependency)
        .collect()
    }
}

/// An executable rule module adopted by an organization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Law {
    pub index: LawId,
    pub address: Address,
    pub conditions: Conditions,
    /// Declared ABI types of the law's input tuple, e.g. `["address", "uint256"]`.
    #[serde(default)]
    pub input_params: Vec<String>,
    #[serde(default)]
    pub description: String,
    /// The ledger may flip this when the law is revoked or re-adopted.
    pub active: bool,
}
