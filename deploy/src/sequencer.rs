//! The deployment run: contracts first, then wiring.

use alloy_primitives::Address;
use powers_ledger::{powers, LedgerClient, LedgerError, Transaction};
use powers_types::ChainCapabilities;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::executor::for_chain;
use crate::plan::ResolvedAddresses;
use crate::{
    AddressRef, ContractSpec, DeployError, DeploymentPlan, DeploymentProgress, DeploymentStep,
    Executor, ProgressTracker, RunStatus, StepKind, WiringCall,
};

/// Addresses produced by a completed run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentOutcome {
    pub organization: Address,
    /// Dependency addresses in declared order.
    pub dependencies: Vec<(String, Address)>,
    pub progress: DeploymentProgress,
}

/// A run in progress on a background task.
pub struct DeploymentHandle {
    progress: watch::Receiver<DeploymentProgress>,
    task: JoinHandle<Result<DeploymentOutcome, DeployError>>,
}

impl DeploymentHandle {
    /// Latest snapshot.
    pub fn progress(&self) -> DeploymentProgress {
        self.progress.borrow().clone()
    }

    /// A receiver that is notified on every step transition.
    pub fn subscribe(&self) -> watch::Receiver<DeploymentProgress> {
        self.progress.clone()
    }

    pub async fn join(self) -> Result<DeploymentOutcome, DeployError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(DeployError::Aborted(e.to_string())),
        }
    }
}

pub struct DeploymentSequencer<L: ?Sized> {
    ledger: Arc<L>,
    capabilities: ChainCapabilities,
}

impl<L: LedgerClient + ?Sized + 'static> DeploymentSequencer<L> {
    pub fn new(ledger: Arc<L>, capabilities: ChainCapabilities) -> Self {
        Self {
            ledger,
            capabilities,
        }
    }

    pub fn capabilities(&self) -> &ChainCapabilities {
        &self.capabilities
    }

    fn executor(&self) -> Box<dyn Executor> {
        for_chain(Arc::clone(&self.ledger), &self.capabilities)
    }

    /// Every row the run will report, all idle.
    pub fn step_table(&self, plan: &DeploymentPlan) -> Vec<DeploymentStep> {
        step_table(plan, self.executor().as_ref())
    }

    /// Run `plan` on a background task.
    pub fn start(&self, plan: DeploymentPlan) -> DeploymentHandle {
        let executor = self.executor();
        let (tracker, progress) = ProgressTracker::new(step_table(&plan, executor.as_ref()));
        let sequencer = Self::new(Arc::clone(&self.ledger), self.capabilities.clone());
        let task = tokio::spawn(async move {
            sequencer
                .run_with(&plan, executor.as_ref(), &tracker)
                .await
        });
        DeploymentHandle { progress, task }
    }

    /// Run `plan` to completion on the current task.
    pub async fn run(&self, plan: &DeploymentPlan) -> Result<DeploymentOutcome, DeployError> {
        let executor = self.executor();
        let (tracker, _progress) = ProgressTracker::new(step_table(plan, executor.as_ref()));
        self.run_with(plan, executor.as_ref(), &tracker).await
    }

    async fn run_with(
        &self,
        plan: &DeploymentPlan,
        executor: &dyn Executor,
        tracker: &ProgressTracker,
    ) -> Result<DeploymentOutcome, DeployError> {
        tracing::info!(
            primary = %plan.primary.name,
            dependencies = plan.dependencies.len(),
            strategy = executor.name(),
            chain = %self.capabilities.chain_id,
            "deployment started"
        );
        match self.sequence(plan, executor, tracker).await {
            Ok((organization, dependencies)) => {
                tracker.finish(RunStatus::Completed { organization });
                tracing::info!(organization = %organization, "deployment completed");
                Ok(DeploymentOutcome {
                    organization,
                    dependencies,
                    progress: tracker.snapshot(),
                })
            }
            Err(e) => {
                tracing::warn!(step = e.step().unwrap_or("-"), error = %e, "deployment failed");
                tracker.finish(RunStatus::Failed {
                    step: e.step().map(str::to_string),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn sequence(
        &self,
        plan: &DeploymentPlan,
        executor: &dyn Executor,
        tracker: &ProgressTracker,
    ) -> Result<(Address, Vec<(String, Address)>), DeployError> {
        plan.validate()?;
        let mut addresses = ResolvedAddresses::default();

        let primary = self.deploy(0, &plan.primary, &addresses, tracker).await?;
        addresses.primary = Some(primary);

        let mut dependencies = Vec::with_capacity(plan.dependencies.len());
        for (i, dep) in plan.dependencies.iter().enumerate() {
            let address = self.deploy(1 + i, &dep.contract, &addresses, tracker).await?;
            addresses.dependencies.insert(dep.contract.name.clone(), address);
            dependencies.push((dep.contract.name.clone(), address));
        }

        let wiring = plan.wiring_steps();
        let mut calls = Vec::with_capacity(wiring.len());
        let mut steps = wiring.into_iter();
        if let Some(step) = steps.next() {
            calls.push(WiringCall {
                step,
                call: plan.init_call(&addresses)?,
            });
        }
        for (step, dep) in steps.zip(plan.ownership_transfers()) {
            let target = addresses.resolve(&AddressRef::Dependency(dep.contract.name.clone()))?;
            calls.push(WiringCall {
                step,
                call: powers::transfer_ownership(target, primary),
            });
        }

        executor
            .execute(&calls, tracker, 1 + plan.dependencies.len())
            .await?;
        Ok((primary, dependencies))
    }

    /// Deploy one contract and wait for its address.
    async fn deploy(
        &self,
        row: usize,
        spec: &ContractSpec,
        addresses: &ResolvedAddresses,
        tracker: &ProgressTracker,
    ) -> Result<Address, DeployError> {
        tracker.pending(row);
        let result = self.deploy_inner(row, spec, addresses, tracker).await;
        if let Err(e) = &result {
            tracker.fail(row, &e.to_string());
        }
        result
    }

    async fn deploy_inner(
        &self,
        row: usize,
        spec: &ContractSpec,
        addresses: &ResolvedAddresses,
        tracker: &ProgressTracker,
    ) -> Result<Address, DeployError> {
        let step_failed = |cause: LedgerError| DeployError::StepFailed {
            step: spec.name.clone(),
            contract: spec.name.clone(),
            cause,
        };
        let request = DeploymentPlan::deploy_request(spec, addresses)?;
        let handle = self
            .ledger
            .submit_transaction(&Transaction::Deploy(request), self.capabilities.chain_id)
            .await
            .map_err(step_failed)?;
        let receipt = self
            .ledger
            .await_confirmation(&handle, self.capabilities.confirmations)
            .await
            .map_err(step_failed)?;
        if !receipt.success {
            return Err(step_failed(LedgerError::Reverted {
                tx: receipt.tx_hash.to_string(),
            }));
        }
        let address = receipt
            .contract_address
            .ok_or_else(|| DeployError::AddressResolutionFailed {
                step: spec.name.clone(),
            })?;
        tracing::info!(contract = %spec.name, address = %address, "contract deployed");
        tracker.succeed(row, Some(receipt.tx_hash), Some(address));
        Ok(address)
    }
}

fn step_table(plan: &DeploymentPlan, executor: &dyn Executor) -> Vec<DeploymentStep> {
    let mut steps = vec![DeploymentStep::new(&plan.primary.name, StepKind::DeployPrimary)];
    steps.extend(
        plan.dependencies
            .iter()
            .map(|dep| DeploymentStep::new(&dep.contract.name, StepKind::DeployDependency)),
    );
    steps.extend(executor.steps(&plan.wiring_steps()));
    steps
}
