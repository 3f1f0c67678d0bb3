use alloy_primitives::{Address, Bytes};
use powers_deploy::{
    ContractSpec, DependencySpec, DeployError, DeploymentPlan, DeploymentSequencer, PlanArg,
    RunStatus, StepKind, StepStatus,
};
use powers_ledger::LedgerError;
use powers_nullables::{LedgerEvent, NullLedger};
use powers_types::{ChainCapabilities, ChainId};
use std::sync::Arc;
use std::time::{Duration, Instant};

const CHAIN: ChainId = ChainId::new(31337);

fn contract(name: &str) -> ContractSpec {
    ContractSpec {
        name: name.to_string(),
        bytecode: Bytes::from(vec![0x60, 0x80]),
        constructor_args: Vec::new(),
    }
}

fn dependency(name: &str, transfer_ownership: bool) -> DependencySpec {
    DependencySpec {
        contract: contract(name),
        transfer_ownership,
    }
}

fn plan(dependencies: Vec<DependencySpec>) -> DeploymentPlan {
    DeploymentPlan {
        primary: contract("Powers"),
        dependencies,
        initialize: None,
    }
}

fn atomic() -> ChainCapabilities {
    ChainCapabilities::atomic(CHAIN)
}

fn sequential(pause: Duration) -> ChainCapabilities {
    ChainCapabilities::sequential(CHAIN, pause)
}

fn submitted(ledger: &NullLedger) -> Vec<String> {
    ledger
        .events()
        .into_iter()
        .filter_map(|e| match e {
            LedgerEvent::Submitted(label) => Some(label),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn atomic_run_wires_everything_in_one_batch() {
    let ledger = Arc::new(NullLedger::new());
    let sequencer = DeploymentSequencer::new(ledger.clone(), atomic());
    let outcome = sequencer
        .run(&plan(vec![dependency("Token", true), dependency("OpenAction", false)]))
        .await
        .unwrap();

    let token = outcome.dependencies[0].1;
    let open_action = outcome.dependencies[1].1;
    assert_eq!(
        ledger.constituted_laws(outcome.organization),
        Some(vec![token, open_action])
    );
    assert_eq!(ledger.owner_of(token), Some(outcome.organization));
    assert!(ledger.events().contains(&LedgerEvent::Multicall(vec![
        "constitute".into(),
        "transferOwnership".into(),
    ])));

    let progress = outcome.progress;
    assert_eq!(progress.steps.len(), 4);
    assert_eq!(progress.steps[3].kind, StepKind::Batch);
    assert_eq!(progress.count(StepStatus::Success), 4);
    assert_eq!(
        progress.status,
        RunStatus::Completed {
            organization: outcome.organization
        }
    );
}

#[tokio::test]
async fn failed_batch_leaves_contracts_deployed_but_unconfigured() {
    let ledger = Arc::new(NullLedger::new());
    ledger.fail_multicall();
    let sequencer = DeploymentSequencer::new(ledger.clone(), atomic());
    let handle = sequencer.start(plan(vec![dependency("LawA", false), dependency("LawB", true)]));
    let progress = handle.subscribe();

    let err = handle.join().await.unwrap_err();
    assert!(matches!(
        &err,
        DeployError::StepFailed { step, cause: LedgerError::Reverted { .. }, .. } if step == "batch"
    ));

    let deployed: Vec<String> = ledger
        .events()
        .into_iter()
        .filter_map(|e| match e {
            LedgerEvent::Deployed { name, .. } => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(deployed, vec!["Powers", "LawA", "LawB"]);

    let snapshot = progress.borrow().clone();
    let primary = snapshot.step("Powers").unwrap();
    assert_eq!(primary.status, StepStatus::Success);
    assert!(ledger.constituted_laws(primary.address.unwrap()).is_none());
    assert_eq!(snapshot.count(StepStatus::Error), 1);
    assert_eq!(snapshot.step("batch").unwrap().status, StepStatus::Error);
    assert!(matches!(
        snapshot.status,
        RunStatus::Failed { step: Some(ref s), .. } if s == "batch"
    ));
}

#[tokio::test]
async fn sequential_run_confirms_each_call_before_the_next() {
    let ledger = Arc::new(NullLedger::new());
    let sequencer = DeploymentSequencer::new(ledger.clone(), sequential(Duration::ZERO));
    let outcome = sequencer
        .run(&plan(vec![dependency("Token", true)]))
        .await
        .unwrap();

    let writes: Vec<LedgerEvent> = ledger
        .writes()
        .into_iter()
        .filter(|e| !matches!(e, LedgerEvent::Deployed { .. }))
        .collect();
    assert_eq!(
        writes,
        vec![
            LedgerEvent::Submitted("Powers".into()),
            LedgerEvent::Confirmed("Powers".into()),
            LedgerEvent::Submitted("Token".into()),
            LedgerEvent::Confirmed("Token".into()),
            LedgerEvent::Submitted("constitute".into()),
            LedgerEvent::Confirmed("constitute".into()),
            LedgerEvent::Submitted("transferOwnership".into()),
            LedgerEvent::Confirmed("transferOwnership".into()),
        ]
    );

    let token = outcome.dependencies[0].1;
    assert_eq!(ledger.owner_of(token), Some(outcome.organization));
    let kinds: Vec<StepKind> = outcome.progress.steps.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            StepKind::DeployPrimary,
            StepKind::DeployDependency,
            StepKind::Initialize,
            StepKind::TransferOwnership,
        ]
    );
    assert!(outcome
        .progress
        .steps
        .iter()
        .all(|s| s.status == StepStatus::Success && s.tx_hash.is_some()));
}

#[tokio::test]
async fn sequential_run_pauses_between_calls() {
    let ledger = Arc::new(NullLedger::new());
    let sequencer =
        DeploymentSequencer::new(ledger.clone(), sequential(Duration::from_millis(30)));
    let started = Instant::now();
    sequencer
        .run(&plan(vec![dependency("A", true), dependency("B", true)]))
        .await
        .unwrap();
    // three wiring calls, two pauses
    assert!(started.elapsed() >= Duration::from_millis(60));
}

#[tokio::test]
async fn failing_dependency_stops_the_run() {
    let ledger = Arc::new(NullLedger::new());
    ledger.fail_submit("Law2");
    let sequencer = DeploymentSequencer::new(ledger.clone(), atomic());
    let handle = sequencer.start(plan(vec![
        dependency("Law1", false),
        dependency("Law2", false),
        dependency("Law3", false),
    ]));
    let progress = handle.subscribe();

    let err = handle.join().await.unwrap_err();
    assert_eq!(err.step(), Some("Law2"));
    assert!(matches!(
        err,
        DeployError::StepFailed { cause: LedgerError::Transport(_), .. }
    ));

    assert_eq!(submitted(&ledger), vec!["Powers", "Law1", "Law2"]);
    let snapshot = progress.borrow().clone();
    assert_eq!(snapshot.step("Powers").unwrap().status, StepStatus::Success);
    assert_eq!(snapshot.step("Law1").unwrap().status, StepStatus::Success);
    assert_eq!(snapshot.step("Law2").unwrap().status, StepStatus::Error);
    assert_eq!(snapshot.step("Law3").unwrap().status, StepStatus::Idle);
    assert_eq!(snapshot.step("batch").unwrap().status, StepStatus::Idle);
}

#[tokio::test]
async fn deploy_without_address_fails_resolution() {
    let ledger = Arc::new(NullLedger::new());
    ledger.omit_contract_address("Token");
    let sequencer = DeploymentSequencer::new(ledger.clone(), atomic());
    let err = sequencer
        .run(&plan(vec![dependency("Token", true)]))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DeployError::AddressResolutionFailed {
            step: "Token".into()
        }
    );
    assert!(!ledger
        .events()
        .iter()
        .any(|e| matches!(e, LedgerEvent::Multicall(_))));
}

#[tokio::test]
async fn reverted_primary_deploy_attempts_nothing_else() {
    let ledger = Arc::new(NullLedger::new());
    ledger.revert_on_confirm("Powers");
    let sequencer = DeploymentSequencer::new(ledger.clone(), sequential(Duration::ZERO));
    let err = sequencer
        .run(&plan(vec![dependency("Token", false)]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DeployError::StepFailed { ref step, cause: LedgerError::Reverted { .. }, .. } if step == "Powers"
    ));
    assert_eq!(submitted(&ledger), vec!["Powers"]);
}

#[tokio::test]
async fn reverted_transfer_fails_its_own_step() {
    let ledger = Arc::new(NullLedger::new());
    ledger.revert_on_confirm("transferOwnership");
    let sequencer = DeploymentSequencer::new(ledger.clone(), sequential(Duration::ZERO));
    let handle = sequencer.start(plan(vec![dependency("Token", true)]));
    let progress = handle.subscribe();
    let err = handle.join().await.unwrap_err();
    assert_eq!(err.step(), Some("transferOwnership:Token"));

    let snapshot = progress.borrow().clone();
    assert_eq!(snapshot.step("initialize").unwrap().status, StepStatus::Success);
    assert_eq!(
        snapshot.step("transferOwnership:Token").unwrap().status,
        StepStatus::Error
    );
}

#[tokio::test]
async fn constructor_args_resolve_earlier_addresses() {
    let ledger = Arc::new(NullLedger::new());
    let mut law = dependency("OpenAction", false);
    law.contract.constructor_args = vec![PlanArg::Ref("primary".parse().unwrap())];
    let sequencer = DeploymentSequencer::new(ledger.clone(), atomic());
    let outcome = sequencer.run(&plan(vec![law])).await.unwrap();
    assert_eq!(outcome.dependencies.len(), 1);
    assert_ne!(outcome.organization, Address::ZERO);
}

#[tokio::test]
async fn invalid_plan_writes_nothing() {
    let ledger = Arc::new(NullLedger::new());
    let mut law = dependency("Law", false);
    law.contract.constructor_args = vec![PlanArg::Ref("dependency:Missing".parse().unwrap())];
    let sequencer = DeploymentSequencer::new(ledger.clone(), atomic());
    let err = sequencer.run(&plan(vec![law])).await.unwrap_err();
    assert_eq!(
        err,
        DeployError::UnresolvedReference("dependency:Missing".into())
    );
    assert!(ledger.writes().is_empty());
}

#[tokio::test]
async fn plan_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.toml");
    std::fs::write(
        &path,
        r#"
            [primary]
            name = "Powers"
            bytecode = "0x6080"

            [[dependencies]]
            name = "Token"
            bytecode = "0x6081"
            transfer_ownership = true
        "#,
    )
    .unwrap();
    let plan = DeploymentPlan::from_file(&path).unwrap();

    let ledger = Arc::new(NullLedger::new());
    let sequencer = DeploymentSequencer::new(ledger.clone(), atomic());
    let table = sequencer.step_table(&plan);
    assert_eq!(table.len(), 3);
    assert!(table.iter().all(|s| s.status == StepStatus::Idle));
    sequencer.run(&plan).await.unwrap();
}
