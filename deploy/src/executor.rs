//! Strategies for the wiring phase: initialization plus ownership transfers.

use async_trait::async_trait;
use powers_ledger::{ContractCall, LedgerClient, LedgerError, Receipt, Transaction};
use powers_types::ChainCapabilities;
use std::sync::Arc;
use std::time::Duration;

use crate::{DeployError, DeploymentStep, ProgressTracker, StepKind, BATCH_STEP};

/// A wiring call as it appears in the step table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WiringStep {
    pub name: String,
    pub kind: StepKind,
    /// Name of the contract the call is sent to.
    pub contract: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WiringCall {
    pub step: WiringStep,
    pub call: ContractCall,
}

#[async_trait]
pub trait Executor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rows this executor adds to the step table for `wiring`.
    fn steps(&self, wiring: &[WiringStep]) -> Vec<DeploymentStep>;

    /// Send `calls`. Rows from [`steps`](Self::steps) start at `first_row`.
    async fn execute(
        &self,
        calls: &[WiringCall],
        progress: &ProgressTracker,
        first_row: usize,
    ) -> Result<(), DeployError>;
}

/// Pick the wiring strategy from what the chain guarantees.
pub fn for_chain<L>(ledger: Arc<L>, capabilities: &ChainCapabilities) -> Box<dyn Executor>
where
    L: LedgerClient + ?Sized + 'static,
{
    if capabilities.supports_atomic_batch {
        Box::new(AtomicBatchExecutor::new(ledger, capabilities.clone()))
    } else {
        Box::new(SequentialExecutor::new(ledger, capabilities.clone()))
    }
}

/// Every call in one all-or-nothing `multicall`.
pub struct AtomicBatchExecutor<L: ?Sized> {
    ledger: Arc<L>,
    capabilities: ChainCapabilities,
}

impl<L: LedgerClient + ?Sized> AtomicBatchExecutor<L> {
    pub const STEP: &'static str = BATCH_STEP;

    pub fn new(ledger: Arc<L>, capabilities: ChainCapabilities) -> Self {
        Self {
            ledger,
            capabilities,
        }
    }
}

#[async_trait]
impl<L: LedgerClient + ?Sized> Executor for AtomicBatchExecutor<L> {
    fn name(&self) -> &'static str {
        "atomic-batch"
    }

    fn steps(&self, _wiring: &[WiringStep]) -> Vec<DeploymentStep> {
        vec![DeploymentStep::new(Self::STEP, StepKind::Batch)]
    }

    async fn execute(
        &self,
        calls: &[WiringCall],
        progress: &ProgressTracker,
        first_row: usize,
    ) -> Result<(), DeployError> {
        let contract = calls
            .iter()
            .map(|c| c.step.contract.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let batch: Vec<ContractCall> = calls.iter().map(|c| c.call.clone()).collect();

        progress.pending(first_row);
        tracing::info!(
            calls = batch.len(),
            chain = %self.capabilities.chain_id,
            "submitting batch"
        );
        let result = self
            .ledger
            .multicall(&batch, self.capabilities.chain_id)
            .await
            .and_then(|receipts| all_succeeded(receipts, batch.len()));

        match result {
            Ok(receipt) => {
                progress.succeed(first_row, receipt.map(|r| r.tx_hash), None);
                Ok(())
            }
            Err(cause) => {
                progress.fail(first_row, &cause.to_string());
                Err(DeployError::StepFailed {
                    step: Self::STEP.to_string(),
                    contract,
                    cause,
                })
            }
        }
    }
}

/// First receipt of a batch, if every call in it succeeded.
fn all_succeeded(
    receipts: Vec<Receipt>,
    expected: usize,
) -> Result<Option<Receipt>, LedgerError> {
    if receipts.len() != expected {
        return Err(LedgerError::Other(format!(
            "batch returned {} receipts for {expected} calls",
            receipts.len()
        )));
    }
    if let Some(failed) = receipts.iter().find(|r| !r.success) {
        return Err(LedgerError::Reverted {
            tx: failed.tx_hash.to_string(),
        });
    }
    Ok(receipts.into_iter().next())
}

/// One call at a time, each confirmed before the next is submitted.
///
/// For chains without reliable same-block ordering, such as a local
/// single-producer node.
pub struct SequentialExecutor<L: ?Sized> {
    ledger: Arc<L>,
    capabilities: ChainCapabilities,
}

impl<L: LedgerClient + ?Sized> SequentialExecutor<L> {
    pub fn new(ledger: Arc<L>, capabilities: ChainCapabilities) -> Self {
        Self {
            ledger,
            capabilities,
        }
    }

    fn pause(&self) -> Duration {
        self.capabilities.inter_step_pause()
    }

    /// Submit one call and wait for a successful receipt.
    async fn send(&self, call: &ContractCall) -> Result<Receipt, LedgerError> {
        let tx = Transaction::Call(call.clone());
        let handle = self
            .ledger
            .submit_transaction(&tx, self.capabilities.chain_id)
            .await?;
        let receipt = self
            .ledger
            .await_confirmation(&handle, self.capabilities.confirmations)
            .await?;
        if receipt.success {
            Ok(receipt)
        } else {
            Err(LedgerError::Reverted {
                tx: receipt.tx_hash.to_string(),
            })
        }
    }
}

#[async_trait]
impl<L: LedgerClient + ?Sized> Executor for SequentialExecutor<L> {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn steps(&self, wiring: &[WiringStep]) -> Vec<DeploymentStep> {
        wiring
            .iter()
            .map(|w| DeploymentStep::new(w.name.clone(), w.kind))
            .collect()
    }

    async fn execute(
        &self,
        calls: &[WiringCall],
        progress: &ProgressTracker,
        first_row: usize,
    ) -> Result<(), DeployError> {
        for (offset, wiring) in calls.iter().enumerate() {
            let row = first_row + offset;
            if offset > 0 && !self.pause().is_zero() {
                tokio::time::sleep(self.pause()).await;
            }
            progress.pending(row);
            tracing::info!(step = %wiring.step.name, call = %wiring.call, "submitting call");

            let result = self.send(&wiring.call).await;

            match result {
                Ok(receipt) => progress.succeed(row, Some(receipt.tx_hash), None),
                Err(cause) => {
                    progress.fail(row, &cause.to_string());
                    return Err(DeployError::StepFailed {
                        step: wiring.step.name.clone(),
                        contract: wiring.step.contract.clone(),
                        cause,
                    });
                }
            }
        }
        Ok(())
    }
}
