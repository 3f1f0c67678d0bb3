use powers_crypto::AbiError;
use powers_ledger::LedgerError;
use powers_types::{ActionId, LawId, TypesError};
use thiserror::Error;

use crate::Predicate;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    /// A ledger read failed. No checks were produced.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("decode error: {0}")]
    Decode(#[from] AbiError),

    #[error("account does not hold the role required by the law")]
    AuthorizationDenied,

    #[error("dependency not met: {0}")]
    DependencyUnmet(Predicate),

    #[error("action has already been executed")]
    AlreadyExecuted,

    #[error("execution is throttled or still in its timelock ({0})")]
    ThrottledOrDelayed(Predicate),

    #[error("proposal has not passed ({0})")]
    ProposalNotPassed(Predicate),

    #[error("ledger returned unknown action state code {0}")]
    UnknownActionState(u64),

    #[error("{0} is not adopted by this organization")]
    LawNotFound(LawId),

    #[error("evaluation for action {0} was superseded by a newer one")]
    Superseded(ActionId),

    #[error("invalid action: {0}")]
    InvalidAction(String),
}

impl From<TypesError> for GovernanceError {
    fn from(e: TypesError) -> Self {
        match e {
            TypesError::UnknownActionState(code) => Self::UnknownActionState(code as u64),
            other => Self::InvalidAction(other.to_string()),
        }
    }
}
