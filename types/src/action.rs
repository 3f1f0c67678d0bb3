//! Actions and their ledger-owned lifecycle.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CallData, LawId, TypesError};

/// Lifecycle of an action as classified from the ledger's raw state code.
///
/// The discriminants are the codes the organization contract returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ActionState {
    /// No proposal or request has been recorded for this id.
    NonExistent = 0,
    /// Voting is open.
    Active = 1,
    /// Withdrawn by its proposer.
    Cancelled = 2,
    /// Voting closed without reaching quorum or threshold.
    Defeated = 3,
    /// Voting closed and the proposal passed.
    Succeeded = 4,
    /// Queued for execution after the vote.
    Requested = 5,
    /// Executed.
    Fulfilled = 6,
}

impl ActionState {
    pub fn from_code(code: u8) -> Result<Self, TypesError> {
        Ok(match code {
            0 => Self::NonExistent,
            1 => Self::Active,
            2 => Self::Cancelled,
            3 => Self::Defeated,
            4 => Self::Succeeded,
            5 => Self::Requested,
            6 => Self::Fulfilled,
            other => return Err(TypesError::UnknownActionState(other)),
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// No further transition is possible from this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Defeated | Self::Fulfilled)
    }

    /// The vote behind this action has passed (or it has already run).
    pub fn has_passed_vote(self) -> bool {
        matches!(self, Self::Succeeded | Self::Requested | Self::Fulfilled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NonExistent => "non_existent",
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Defeated => "defeated",
            Self::Succeeded => "succeeded",
            Self::Requested => "requested",
            Self::Fulfilled => "fulfilled",
        }
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate invocation of a law.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    pub law_id: LawId,
    pub call_data: CallData,
    /// Caller-chosen salt distinguishing otherwise identical invocations.
    pub nonce: U256,
}

impl Action {
    pub fn new(law_id: LawId, call_data: CallData, nonce: U256) -> Self {
        Self {
            law_id,
            call_data,
            nonce,
        }
    }

    /// The same calldata and nonce addressed to another law.
    ///
    /// Dependency predicates look up the referenced law's action this way.
    pub fn for_law(&self, law_id: LawId) -> Self {
        Self {
            law_id,
            call_data: self.call_data.clone(),
            nonce: self.nonce,
        }
    }
}
