//! Named predicates and their outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One gating (or informational) condition on executing an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Predicate {
    Authorised,
    ActionExists,
    ProposalPassed,
    ActionNotFulfilled,
    DelayPassed,
    ThrottlePassed,
    NeedFulfilled,
    NeedNotFulfilled,
    VoteActive,
    HasVoted,
}

impl Predicate {
    pub const ALL: [Predicate; 10] = [
        Self::Authorised,
        Self::ActionExists,
        Self::ProposalPassed,
        Self::ActionNotFulfilled,
        Self::DelayPassed,
        Self::ThrottlePassed,
        Self::NeedFulfilled,
        Self::NeedNotFulfilled,
        Self::VoteActive,
        Self::HasVoted,
    ];

    /// Reported to the user but excluded from `all_passed`.
    pub fn is_informational(self) -> bool {
        matches!(self, Self::VoteActive | Self::HasVoted)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Authorised => "authorised",
            Self::ActionExists => "actionExists",
            Self::ProposalPassed => "proposalPassed",
            Self::ActionNotFulfilled => "actionNotFulfilled",
            Self::DelayPassed => "delayPassed",
            Self::ThrottlePassed => "throttlePassed",
            Self::NeedFulfilled => "needFulfilled",
            Self::NeedNotFulfilled => "needNotFulfilled",
            Self::VoteActive => "voteActive",
            Self::HasVoted => "hasVoted",
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one predicate.
///
/// `NotApplicable` is trivially satisfied: the law's conditions do not ask
/// for this check, so it is left out of the conjunction instead of counting
/// as a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail,
    NotApplicable,
}

impl Outcome {
    pub fn from_bool(passed: bool) -> Self {
        if passed {
            Self::Pass
        } else {
            Self::Fail
        }
    }

    /// Applicable only when `applicable` holds; otherwise `NotApplicable`.
    pub fn when(applicable: bool, passed: impl FnOnce() -> bool) -> Self {
        if applicable {
            Self::from_bool(passed())
        } else {
            Self::NotApplicable
        }
    }

    pub fn is_fail(self) -> bool {
        self == Self::Fail
    }

    pub fn is_applicable(self) -> bool {
        self != Self::NotApplicable
    }

    /// Boolean view for display; inapplicable predicates read as `true`.
    pub fn as_bool(self) -> bool {
        !self.is_fail()
    }
}

/// Every predicate for one evaluation, by name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Predicates {
    pub authorised: Outcome,
    pub action_exists: Outcome,
    pub proposal_passed: Outcome,
    pub action_not_fulfilled: Outcome,
    pub delay_passed: Outcome,
    pub throttle_passed: Outcome,
    pub need_fulfilled: Outcome,
    pub need_not_fulfilled: Outcome,
    pub vote_active: Outcome,
    pub has_voted: Outcome,
}

impl Predicates {
    pub fn get(&self, predicate: Predicate) -> Outcome {
        match predicate {
            Predicate::Authorised => self.authorised,
            Predicate::ActionExists => self.action_exists,
            Predicate::ProposalPassed => self.proposal_passed,
            Predicate::ActionNotFulfilled => self.action_not_fulfilled,
            Predicate::DelayPassed => self.delay_passed,
            Predicate::ThrottlePassed => self.throttle_passed,
            Predicate::NeedFulfilled => self.need_fulfilled,
            Predicate::NeedNotFulfilled => self.need_not_fulfilled,
            Predicate::VoteActive => self.vote_active,
            Predicate::HasVoted => self.has_voted,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Predicate, Outcome)> + '_ {
        Predicate::ALL.into_iter().map(move |p| (p, self.get(p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn informational_predicates() {
        let informational: Vec<_> = Predicate::ALL
            .into_iter()
            .filter(|p| p.is_informational())
            .collect();
        assert_eq!(informational, vec![Predicate::VoteActive, Predicate::HasVoted]);
    }

    #[test]
    fn not_applicable_reads_as_true() {
        assert!(Outcome::NotApplicable.as_bool());
        assert!(!Outcome::NotApplicable.is_applicable());
        assert!(!Outcome::Fail.as_bool());
    }

    #[test]
    fn when_skips_closure_if_inapplicable() {
        let outcome = Outcome::when(false, || panic!("must not be evaluated"));
        assert_eq!(outcome, Outcome::NotApplicable);
        assert_eq!(Outcome::when(true, || false), Outcome::Fail);
    }

    #[test]
    fn names_are_camel_case() {
        assert_eq!(Predicate::ActionNotFulfilled.to_string(), "actionNotFulfilled");
        assert_eq!(
            serde_json::to_string(&Predicate::NeedNotFulfilled).unwrap(),
            "\"needNotFulfilled\""
        );
    }
}
