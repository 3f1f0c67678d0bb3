//! Raw lifecycle codes to [`ActionState`].

use powers_ledger::powers;
use powers_ledger::LedgerClient;
use powers_types::{ActionId, ActionState, Organization};
use std::sync::Arc;
use tracing::trace;

use crate::GovernanceError;

/// Reads action states from the organization contract.
///
/// Nothing is cached: each call is a fresh ledger read.
pub struct ActionStateResolver<L: ?Sized> {
    ledger: Arc<L>,
}

impl<L: ?Sized> Clone for ActionStateResolver<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl<L: LedgerClient + ?Sized> ActionStateResolver<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    pub async fn resolve(
        &self,
        org: &Organization,
        id: ActionId,
    ) -> Result<ActionState, GovernanceError> {
        let values = self
            .ledger
            .call_view(&powers::action_state(org.address, id), org.chain_id)
            .await?;
        let raw = powers::single(&values)?.as_uint()?;
        let code = u8::try_from(raw).map_err(|_| {
            GovernanceError::UnknownActionState(u64::try_from(raw).unwrap_or(u64::MAX))
        })?;
        let state = ActionState::from_code(code)?;
        trace!(action_id = %id, state = %state, "resolved action state");
        Ok(state)
    }
}
