use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("config error: {0}")]
    Config(String),

    #[error("governance error: {0}")]
    Governance(#[from] powers_governance::GovernanceError),

    #[error("deployment error: {0}")]
    Deploy(#[from] powers_deploy::DeployError),

    #[error("ledger error: {0}")]
    Ledger(#[from] powers_ledger::LedgerError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
