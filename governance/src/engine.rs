//! Checks engine: evaluate, aggregate, commit.

use alloy_primitives::Address;
use powers_crypto::hash_action;
use powers_ledger::LedgerClient;
use powers_types::{Action, Law, Organization};
use std::sync::Arc;

use crate::{aggregate, Checks, ChecksCache, ChecksKey, ConditionEvaluator, GovernanceError};

pub struct ChecksEngine<L: ?Sized> {
    evaluator: ConditionEvaluator<L>,
    cache: Arc<ChecksCache>,
}

impl<L: LedgerClient + ?Sized> ChecksEngine<L> {
    pub fn new(ledger: Arc<L>, cache: Arc<ChecksCache>) -> Self {
        Self {
            evaluator: ConditionEvaluator::new(ledger),
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<ChecksCache> {
        &self.cache
    }

    /// Last committed checks for `key`, if any.
    pub fn cached(&self, key: &ChecksKey) -> Option<Arc<Checks>> {
        self.cache.get(key)
    }

    /// Evaluate `action` and commit the resulting snapshot.
    ///
    /// Returns [`GovernanceError::Superseded`] if another evaluation for the
    /// same key started while this one was reading; its result is dropped.
    pub async fn evaluate_checks(
        &self,
        law: &Law,
        action: &Action,
        account: Address,
        org: &Organization,
    ) -> Result<Arc<Checks>, GovernanceError> {
        let action_id = hash_action(action.law_id, &action.call_data, action.nonce);
        let ticket = self.cache.begin(ChecksKey::new(org, action_id, account));

        let evaluation = self.evaluator.evaluate(law, action, account, org).await?;
        let checks = Arc::new(aggregate(law.index, account, evaluation));

        if let Err(stale) = self.cache.commit(ticket, Arc::clone(&checks)) {
            tracing::debug!(
                action_id = %action_id,
                generation = stale.generation,
                current = stale.current,
                "discarding superseded evaluation"
            );
            return Err(GovernanceError::Superseded(action_id));
        }

        tracing::debug!(
            law = %law.index,
            action_id = %action_id,
            all_passed = checks.all_passed,
            tracked = self.cache.tracked(),
            "checks committed"
        );
        Ok(checks)
    }
}
