//! Condition evaluation: one concurrent pass of ledger reads per action.

use alloy_primitives::Address;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use powers_crypto::hash_action;
use powers_ledger::{powers, LedgerClient, VoteData};
use powers_types::{Action, ActionId, ActionState, BlockNumber, Conditions, Law, LawId, Organization};
use std::sync::Arc;

use crate::{
    ActionStateResolver, GovernanceError, Outcome, Predicates, Read, ReadResults, ReadSet,
    ReadValue,
};

/// Everything one evaluation learned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Evaluation {
    pub action_id: ActionId,
    pub action_state: ActionState,
    /// Only read when a delay or throttle predicate applies.
    pub block_number: Option<BlockNumber>,
    pub predicates: Predicates,
}

/// What the reads are about.
struct Subject<'a> {
    org: &'a Organization,
    law: LawId,
    action: &'a Action,
    id: ActionId,
    account: Address,
}

/// Computes the predicate record for a law, an action, and an account.
pub struct ConditionEvaluator<L: ?Sized> {
    ledger: Arc<L>,
    resolver: ActionStateResolver<L>,
}

impl<L: LedgerClient + ?Sized> ConditionEvaluator<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self {
            resolver: ActionStateResolver::new(Arc::clone(&ledger)),
            ledger,
        }
    }

    /// Reads needed by the predicates that apply under `conditions`.
    ///
    /// Without a vote (`quorum == 0`) no vote-state read is planned.
    pub fn plan(conditions: &Conditions) -> Vec<Read> {
        let voting = conditions.requires_vote();
        let timed_vote = voting && conditions.has_delay();
        let mut reads = vec![Read::Role, Read::ActionState];
        if voting {
            reads.push(Read::HasVoted);
        }
        if timed_vote {
            reads.push(Read::VoteEnd);
        }
        if conditions.has_throttle() {
            reads.push(Read::LatestFulfillment);
        }
        if timed_vote || conditions.has_throttle() {
            reads.push(Read::CurrentBlock);
        }
        for dep in [conditions.need_fulfilled, conditions.need_not_fulfilled]
            .into_iter()
            .filter_map(LawId::dependency)
        {
            if !reads.contains(&Read::DependencyState(dep)) {
                reads.push(Read::DependencyState(dep));
            }
        }
        reads
    }

    /// Evaluate every predicate for `action` under `law`.
    ///
    /// All planned reads run concurrently; if any of them fails the whole
    /// evaluation fails and no predicates are returned.
    pub async fn evaluate(
        &self,
        law: &Law,
        action: &Action,
        account: Address,
        org: &Organization,
    ) -> Result<Evaluation, GovernanceError> {
        if action.law_id != law.index {
            return Err(GovernanceError::InvalidAction(format!(
                "action targets {} but was evaluated against {}",
                action.law_id, law.index
            )));
        }
        let id = hash_action(action.law_id, &action.call_data, action.nonce);
        let subject = Subject {
            org,
            law: law.index,
            action,
            id,
            account,
        };

        let mut reads = ReadSet::new();
        for read in Self::plan(&law.conditions) {
            reads.request(read, self.issue(read, &subject));
        }
        tracing::debug!(
            law = %law.index,
            action_id = %id,
            account = %account,
            reads = reads.len(),
            "evaluating conditions"
        );
        let results = reads.join().await?;

        let predicates = predicates(&law.conditions, &results)?;
        let block_number = results.block(Read::CurrentBlock).ok();
        Ok(Evaluation {
            action_id: id,
            action_state: results.state(Read::ActionState)?,
            block_number,
            predicates,
        })
    }

    fn issue<'a>(
        &'a self,
        read: Read,
        s: &'a Subject<'a>,
    ) -> BoxFuture<'a, Result<ReadValue, GovernanceError>> {
        let chain = s.org.chain_id;
        match read {
            Read::Role => async move {
                let allowed = self
                    .ledger
                    .can_act(s.account, s.org.address, s.law, chain)
                    .await?;
                Ok(ReadValue::Bool(allowed))
            }
            .boxed(),
            Read::ActionState => async move {
                Ok(ReadValue::State(self.resolver.resolve(s.org, s.id).await?))
            }
            .boxed(),
            Read::VoteEnd => async move {
                let call = powers::action_vote_data(s.org.address, s.id);
                let values = self.ledger.call_view(&call, chain).await?;
                Ok(ReadValue::Block(VoteData::decode(&values)?.vote_end))
            }
            .boxed(),
            Read::HasVoted => async move {
                let call = powers::has_voted(s.org.address, s.id, s.account);
                let values = self.ledger.call_view(&call, chain).await?;
                Ok(ReadValue::Bool(powers::single(&values)?.as_bool()?))
            }
            .boxed(),
            Read::LatestFulfillment => async move {
                let call = powers::latest_fulfillment(s.org.address, s.law);
                let values = self.ledger.call_view(&call, chain).await?;
                Ok(ReadValue::Block(powers::single(&values)?.as_u64()?))
            }
            .boxed(),
            Read::CurrentBlock => async move {
                Ok(ReadValue::Block(self.ledger.current_block_number(chain).await?))
            }
            .boxed(),
            Read::DependencyState(dep) => async move {
                let dep_id = hash_action(dep, &s.action.call_data, s.action.nonce);
                Ok(ReadValue::State(self.resolver.resolve(s.org, dep_id).await?))
            }
            .boxed(),
        }
    }
}

/// Fold joined reads into predicate outcomes.
fn predicates(c: &Conditions, r: &ReadResults) -> Result<Predicates, GovernanceError> {
    let state = r.state(Read::ActionState)?;
    let voting = c.requires_vote();

    let delay_passed = if !c.has_delay() {
        Outcome::NotApplicable
    } else if !voting {
        // No vote was ever held, so there is no vote end to count from.
        Outcome::Fail
    } else {
        let vote_end = r.block(Read::VoteEnd)?;
        let now = r.block(Read::CurrentBlock)?;
        Outcome::from_bool(vote_end > 0 && vote_end.saturating_add(c.delay_execution) < now)
    };

    let throttle_passed = if c.has_throttle() {
        let last = r.block(Read::LatestFulfillment)?;
        let now = r.block(Read::CurrentBlock)?;
        Outcome::from_bool(last.saturating_add(c.throttle_execution) < now)
    } else {
        Outcome::NotApplicable
    };

    let dependency = |law: LawId, want_fulfilled: bool| -> Result<Outcome, GovernanceError> {
        match law.dependency() {
            None => Ok(Outcome::NotApplicable),
            Some(dep) => {
                let fulfilled = r.state(Read::DependencyState(dep))? == ActionState::Fulfilled;
                Ok(Outcome::from_bool(fulfilled == want_fulfilled))
            }
        }
    };

    let has_voted = if voting {
        Outcome::from_bool(r.flag(Read::HasVoted)?)
    } else {
        Outcome::NotApplicable
    };

    Ok(Predicates {
        authorised: Outcome::from_bool(r.flag(Read::Role)?),
        action_exists: Outcome::when(voting, || state != ActionState::NonExistent),
        proposal_passed: Outcome::when(voting, || state.has_passed_vote()),
        action_not_fulfilled: Outcome::from_bool(state != ActionState::Fulfilled),
        delay_passed,
        throttle_passed,
        need_fulfilled: dependency(c.need_fulfilled, true)?,
        need_not_fulfilled: dependency(c.need_not_fulfilled, false)?,
        vote_active: Outcome::when(voting, || state == ActionState::Active),
        has_voted,
    })
}
