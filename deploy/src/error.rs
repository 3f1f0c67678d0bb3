use powers_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeployError {
    /// A write for this step failed or reverted. Earlier steps stay deployed.
    #[error("step '{step}' ({contract}) failed: {cause}")]
    StepFailed {
        step: String,
        contract: String,
        #[source]
        cause: LedgerError,
    },

    /// The deploy transaction confirmed but no contract address came back.
    #[error("step '{step}' confirmed without a contract address")]
    AddressResolutionFailed { step: String },

    #[error("unresolved address reference: {0}")]
    UnresolvedReference(String),

    #[error("invalid deployment plan: {0}")]
    InvalidPlan(String),

    /// The background task running the deployment panicked or was cancelled.
    #[error("deployment task aborted: {0}")]
    Aborted(String),
}

impl DeployError {
    /// Name of the step that failed, if the failure belongs to one.
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::StepFailed { step, .. } | Self::AddressResolutionFailed { step } => Some(step),
            _ => None,
        }
    }
}
