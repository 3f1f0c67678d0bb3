use alloy_primitives::{Address, Bytes, U256};
use powers_client::{ClientError, ClientMetrics, PowersClient};
use powers_deploy::{ContractSpec, DependencySpec, DeploymentPlan, RunStatus};
use powers_governance::GovernanceError;
use powers_nullables::NullLedger;
use powers_types::{Action, CallData, ChainCapabilities, ChainId, Conditions, LawId, RoleId};
use std::sync::Arc;

const CHAIN: ChainId = ChainId::new(31337);
const ORG: Address = Address::repeat_byte(0xaa);
const ALICE: Address = Address::repeat_byte(0xa1);
const LAW: LawId = LawId::new(1);

fn client() -> (Arc<NullLedger>, PowersClient<NullLedger>, Arc<ClientMetrics>) {
    let ledger = Arc::new(NullLedger::at_block(500));
    ledger.set_organization(ORG, "Test DAO", Address::repeat_byte(0x77));
    ledger.adopt_law(ORG, LAW, Address::repeat_byte(0x01), Conditions::open(RoleId::from(1)));
    ledger.grant(ORG, ALICE, LAW);
    let metrics = Arc::new(ClientMetrics::new().unwrap());
    let client = PowersClient::new(ledger.clone(), ChainCapabilities::atomic(CHAIN))
        .with_metrics(metrics.clone());
    (ledger, client, metrics)
}

fn action(law: LawId) -> Action {
    Action::new(law, CallData::from_bytes(vec![0u8; 32]).unwrap(), U256::from(42))
}

#[tokio::test]
async fn organization_is_fetched_once() {
    let (ledger, client, _) = client();
    let org = client.organization(ORG).await.unwrap();
    assert_eq!(org.name, "Test DAO");
    assert!(org.law(LAW).is_some());
    client.organization(ORG).await.unwrap();
    assert_eq!(ledger.view_count("name"), 1);

    client.refresh_organization(ORG);
    client.organization(ORG).await.unwrap();
    assert_eq!(ledger.view_count("name"), 2);
}

#[tokio::test]
async fn checks_for_open_law_are_executable_and_cached() {
    let (_, client, metrics) = client();
    let action = action(LAW);
    let checks = client.checks_for(ORG, &action, ALICE).await.unwrap();
    assert!(checks.all_passed);
    assert_eq!(checks.action_id, client.hash_action(LAW, &action.call_data, action.nonce));

    let org = client.organization(ORG).await.unwrap();
    let cached = client.cached_checks(&org, &action, ALICE).unwrap();
    assert!(Arc::ptr_eq(&cached, &checks));
    client.invalidate_checks(&org, &action, ALICE);
    assert!(client.cached_checks(&org, &action, ALICE).is_none());

    assert_eq!(metrics.evaluations.get(), 1);
    assert_eq!(metrics.executable.get(), 1);
}

#[tokio::test]
async fn unknown_law_is_reported() {
    let (_, client, metrics) = client();
    let err = client
        .checks_for(ORG, &action(LawId::new(9)), ALICE)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Governance(GovernanceError::LawNotFound(law)) if law == LawId::new(9)
    ));
    assert_eq!(metrics.evaluations.get(), 0);
}

#[tokio::test]
async fn denied_account_counts_as_committed_evaluation() {
    let (_, client, metrics) = client();
    let checks = client
        .checks_for(ORG, &action(LAW), Address::repeat_byte(0xbb))
        .await
        .unwrap();
    assert!(!checks.all_passed);
    assert_eq!(metrics.evaluations.get(), 1);
    assert_eq!(metrics.executable.get(), 0);
}

#[tokio::test]
async fn deploy_records_outcome() {
    let (ledger, client, metrics) = client();
    let plan = DeploymentPlan {
        primary: ContractSpec {
            name: "Powers".into(),
            bytecode: Bytes::from(vec![0x60]),
            constructor_args: Vec::new(),
        },
        dependencies: vec![DependencySpec {
            contract: ContractSpec {
                name: "Token".into(),
                bytecode: Bytes::from(vec![0x61]),
                constructor_args: Vec::new(),
            },
            transfer_ownership: true,
        }],
        initialize: None,
    };
    let outcome = client.deploy(plan).await.unwrap();
    assert_eq!(
        outcome.progress.status,
        RunStatus::Completed {
            organization: outcome.organization
        }
    );
    assert_eq!(ledger.owner_of(outcome.dependencies[0].1), Some(outcome.organization));

    assert_eq!(metrics.deployments_started.get(), 1);
    assert_eq!(metrics.deployments_completed.get(), 1);
    assert_eq!(
        metrics.deployment_steps.with_label_values(&["success"]).get(),
        3
    );
}

#[tokio::test]
async fn failed_deploy_is_counted() {
    let (ledger, client, metrics) = client();
    ledger.fail_submit("Powers");
    let plan = DeploymentPlan {
        primary: ContractSpec {
            name: "Powers".into(),
            bytecode: Bytes::from(vec![0x60]),
            constructor_args: Vec::new(),
        },
        dependencies: Vec::new(),
        initialize: None,
    };
    let handle = client.run_deployment(plan);
    let err = client.finish_deployment(handle).await.unwrap_err();
    assert!(matches!(err, ClientError::Deploy(_)));
    assert_eq!(metrics.deployments_failed.get(), 1);
    assert_eq!(metrics.deployment_steps.with_label_values(&["error"]).get(), 1);
}
