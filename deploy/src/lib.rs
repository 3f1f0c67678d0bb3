//! Deployment of an organization and its dependency contracts.
//!
//! A [`DeploymentPlan`] names one primary contract, zero or more dependency
//! contracts, and the initialization call that wires them together. The
//! [`DeploymentSequencer`] deploys the contracts one at a time, then hands
//! the wiring calls to an [`Executor`] chosen from the chain's capabilities:
//! one atomic batch where the chain supports it, or confirmed one-by-one
//! calls with a pause in between where it does not.
//!
//! Progress is published as [`DeploymentProgress`] snapshots on a
//! `tokio::sync::watch` channel. A failed step halts the run; steps that
//! already succeeded keep their status and nothing is retried.

pub mod error;
pub mod executor;
pub mod plan;
pub mod sequencer;
pub mod step;

pub use error::DeployError;
pub use executor::{
    for_chain, AtomicBatchExecutor, Executor, SequentialExecutor, WiringCall, WiringStep,
};
pub use plan::{
    AddressRef, ContractSpec, DependencySpec, DeploymentPlan, InitCall, PlanArg, ResolvedAddresses,
};
pub use sequencer::{DeploymentHandle, DeploymentOutcome, DeploymentSequencer};
pub use step::{
    DeploymentProgress, DeploymentStep, ProgressTracker, RunStatus, StepKind, StepStatus,
    BATCH_STEP, INITIALIZE_STEP, TRANSFER_STEP_PREFIX,
};
