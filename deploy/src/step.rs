//! Step table and progress reporting.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Idle,
    Pending,
    Success,
    Error,
}

/// Row names owned by wiring steps. No contract may be named after one.
pub const INITIALIZE_STEP: &str = "initialize";
pub const BATCH_STEP: &str = "batch";
pub const TRANSFER_STEP_PREFIX: &str = "transferOwnership:";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    DeployPrimary,
    DeployDependency,
    Initialize,
    TransferOwnership,
    /// Initialization and every ownership transfer in one atomic write.
    Batch,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStep {
    pub name: String,
    pub kind: StepKind,
    pub status: StepStatus,
    /// Set by successful deploy steps.
    pub address: Option<Address>,
    pub tx_hash: Option<B256>,
    pub error: Option<String>,
}

impl DeploymentStep {
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
            status: StepStatus::Idle,
            address: None,
            tx_hash: None,
            error: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    /// Every step succeeded; the organization is configured.
    Completed { organization: Address },
    Failed { step: Option<String>, error: String },
}

/// Snapshot of a run: the step table plus overall status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentProgress {
    pub steps: Vec<DeploymentStep>,
    pub status: RunStatus,
}

impl DeploymentProgress {
    pub fn new(steps: Vec<DeploymentStep>) -> Self {
        Self {
            steps,
            status: RunStatus::Running,
        }
    }

    pub fn step(&self, name: &str) -> Option<&DeploymentStep> {
        self.steps.iter().find(|step| step.name == name)
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self.status, RunStatus::Running)
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|step| step.status == status).count()
    }
}

/// Write side of the progress channel.
///
/// Every transition publishes a fresh snapshot. Updates to an index outside
/// the table are ignored.
pub struct ProgressTracker {
    tx: watch::Sender<DeploymentProgress>,
}

impl ProgressTracker {
    pub fn new(steps: Vec<DeploymentStep>) -> (Self, watch::Receiver<DeploymentProgress>) {
        let (tx, rx) = watch::channel(DeploymentProgress::new(steps));
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<DeploymentProgress> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> DeploymentProgress {
        self.tx.borrow().clone()
    }

    fn update(&self, index: usize, f: impl FnOnce(&mut DeploymentStep)) {
        self.tx.send_modify(|progress| {
            if let Some(step) = progress.steps.get_mut(index) {
                f(step);
            }
        });
    }

    pub fn pending(&self, index: usize) {
        self.update(index, |step| step.status = StepStatus::Pending);
    }

    pub fn succeed(&self, index: usize, tx_hash: Option<B256>, address: Option<Address>) {
        self.update(index, |step| {
            step.status = StepStatus::Success;
            step.tx_hash = tx_hash;
            step.address = address;
        });
    }

    pub fn fail(&self, index: usize, error: &str) {
        self.update(index, |step| {
            step.status = StepStatus::Error;
            step.error = Some(error.to_string());
        });
    }

    pub fn finish(&self, status: RunStatus) {
        self.tx.send_modify(|progress| progress.status = status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_published() {
        let (tracker, rx) = ProgressTracker::new(vec![
            DeploymentStep::new("Powers", StepKind::DeployPrimary),
            DeploymentStep::new("initialize", StepKind::Initialize),
        ]);
        tracker.pending(0);
        assert_eq!(rx.borrow().steps[0].status, StepStatus::Pending);

        tracker.succeed(0, None, Some(Address::repeat_byte(1)));
        tracker.fail(1, "reverted");
        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.step("Powers").unwrap().address, Some(Address::repeat_byte(1)));
        assert_eq!(snapshot.step("initialize").unwrap().error.as_deref(), Some("reverted"));
        assert_eq!(snapshot.count(StepStatus::Success), 1);
        assert!(!snapshot.is_finished());
    }

    #[test]
    fn out_of_range_update_is_ignored() {
        let (tracker, rx) = ProgressTracker::new(Vec::new());
        tracker.fail(3, "nothing here");
        assert!(rx.borrow().steps.is_empty());
    }

    #[test]
    fn run_status_serializes_tagged() {
        let json = serde_json::to_value(RunStatus::Completed {
            organization: Address::ZERO,
        })
        .unwrap();
        assert_eq!(json["status"], "completed");
    }
}
