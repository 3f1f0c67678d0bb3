//! Immutable readiness snapshots.

use alloy_primitives::Address;
use powers_types::{ActionId, ActionState, BlockNumber, ChainId, LawId, Organization};
use serde::{Deserialize, Serialize};

use crate::{Evaluation, GovernanceError, Outcome, Predicate, Predicates};

/// Identifies whose readiness a [`Checks`] describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChecksKey {
    pub chain_id: ChainId,
    pub organization: Address,
    pub action_id: ActionId,
    pub account: Address,
}

impl ChecksKey {
    pub fn new(org: &Organization, action_id: ActionId, account: Address) -> Self {
        Self {
            chain_id: org.chain_id,
            organization: org.address,
            action_id,
            account,
        }
    }
}

/// Readiness of one action for one account at one point in time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checks {
    pub law: LawId,
    pub action_id: ActionId,
    pub account: Address,
    pub action_state: ActionState,
    pub block_number: Option<BlockNumber>,
    #[serde(flatten)]
    pub predicates: Predicates,
    pub all_passed: bool,
}

/// Build a snapshot from an evaluation.
pub fn aggregate(law: LawId, account: Address, evaluation: Evaluation) -> Checks {
    let all_passed = gates_pass(&evaluation.predicates);
    Checks {
        law,
        action_id: evaluation.action_id,
        account,
        action_state: evaluation.action_state,
        block_number: evaluation.block_number,
        predicates: evaluation.predicates,
        all_passed,
    }
}

/// No gating predicate failed. Informational and inapplicable ones are skipped.
fn gates_pass(predicates: &Predicates) -> bool {
    predicates
        .iter()
        .filter(|(p, _)| !p.is_informational())
        .all(|(_, outcome)| !outcome.is_fail())
}

impl Checks {
    pub fn outcome(&self, predicate: Predicate) -> Outcome {
        self.predicates.get(predicate)
    }

    /// Every failing gating predicate as an error, in predicate order.
    pub fn failures(&self) -> Vec<GovernanceError> {
        self.predicates
            .iter()
            .filter(|(_, outcome)| outcome.is_fail())
            .filter_map(|(p, _)| failure(p))
            .collect()
    }

    /// `Ok` if the action may execute now, else the first failure.
    pub fn ensure_executable(&self) -> Result<(), GovernanceError> {
        match self.failures().into_iter().next() {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

/// `None` for informational predicates.
fn failure(predicate: Predicate) -> Option<GovernanceError> {
    Some(match predicate {
        Predicate::Authorised => GovernanceError::AuthorizationDenied,
        Predicate::ActionNotFulfilled => GovernanceError::AlreadyExecuted,
        Predicate::ActionExists | Predicate::ProposalPassed => {
            GovernanceError::ProposalNotPassed(predicate)
        }
        Predicate::DelayPassed | Predicate::ThrottlePassed => {
            GovernanceError::ThrottledOrDelayed(predicate)
        }
        Predicate::NeedFulfilled | Predicate::NeedNotFulfilled => {
            GovernanceError::DependencyUnmet(predicate)
        }
        Predicate::VoteActive | Predicate::HasVoted => return None,
    })
}
