//! The upward API: readiness checks, organizations, deployments.

use alloy_primitives::{Address, U256};
use powers_deploy::{DeploymentHandle, DeploymentOutcome, DeploymentPlan, DeploymentSequencer};
use powers_governance::{
    Checks, ChecksCache, ChecksEngine, ChecksKey, GovernanceError, OrganizationRegistry,
};
use powers_ledger::LedgerClient;
use powers_rpc::JsonRpcLedger;
use powers_types::{Action, ActionId, CallData, ChainCapabilities, ChainId, Law, LawId, Organization};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use crate::{tracing_spans, ClientConfig, ClientError, ClientMetrics};

/// One client per chain. Cheap to share behind an `Arc`; every cache inside
/// is internally synchronized.
pub struct PowersClient<L: ?Sized> {
    capabilities: ChainCapabilities,
    engine: ChecksEngine<L>,
    registry: OrganizationRegistry<L>,
    sequencer: DeploymentSequencer<L>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl PowersClient<JsonRpcLedger> {
    /// A client talking JSON-RPC to the endpoint in `config`.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(Arc::new(JsonRpcLedger::new(config.rpc())), config.capabilities())
    }
}

impl<L: LedgerClient + ?Sized + 'static> PowersClient<L> {
    pub fn new(ledger: Arc<L>, capabilities: ChainCapabilities) -> Self {
        Self {
            engine: ChecksEngine::new(Arc::clone(&ledger), Arc::new(ChecksCache::new())),
            registry: OrganizationRegistry::new(Arc::clone(&ledger)),
            sequencer: DeploymentSequencer::new(ledger, capabilities.clone()),
            capabilities,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn chain(&self) -> ChainId {
        self.capabilities.chain_id
    }

    pub fn capabilities(&self) -> &ChainCapabilities {
        &self.capabilities
    }

    pub fn metrics(&self) -> Option<&Arc<ClientMetrics>> {
        self.metrics.as_ref()
    }

    pub fn hash_action(&self, law: LawId, call_data: &CallData, nonce: U256) -> ActionId {
        powers_crypto::hash_action(law, call_data, nonce)
    }

    /// Organization at `address`, fetched once and then served from cache.
    pub async fn organization(&self, address: Address) -> Result<Organization, ClientError> {
        let chain = self.chain();
        Ok(self
            .registry
            .get(address, chain)
            .instrument(tracing_spans::organization_span(address, chain))
            .await?)
    }

    /// Drop the cached organization so the next lookup re-reads the ledger.
    pub fn refresh_organization(&self, address: Address) {
        self.registry.invalidate(address, self.chain());
    }

    /// Evaluate every readiness check for `action` and cache the snapshot.
    pub async fn evaluate_checks(
        &self,
        law: &Law,
        action: &Action,
        account: Address,
        organization: &Organization,
    ) -> Result<Arc<Checks>, GovernanceError> {
        let action_id = self.hash_action(action.law_id, &action.call_data, action.nonce);
        let span = tracing_spans::checks_span(organization.address, law.index, action_id, account);
        let started = Instant::now();
        let result = self
            .engine
            .evaluate_checks(law, action, account, organization)
            .instrument(span)
            .await;
        if let Some(metrics) = &self.metrics {
            metrics.record_evaluation(&result, started.elapsed());
        }
        result
    }

    /// [`evaluate_checks`](Self::evaluate_checks) for an action on an
    /// organization's adopted law, looked up by index.
    pub async fn checks_for(
        &self,
        organization: Address,
        action: &Action,
        account: Address,
    ) -> Result<Arc<Checks>, ClientError> {
        let org = self.organization(organization).await?;
        let law = org
            .law(action.law_id)
            .cloned()
            .ok_or(GovernanceError::LawNotFound(action.law_id))?;
        Ok(self.evaluate_checks(&law, action, account, &org).await?)
    }

    /// Last committed snapshot for `action`, without touching the ledger.
    pub fn cached_checks(
        &self,
        organization: &Organization,
        action: &Action,
        account: Address,
    ) -> Option<Arc<Checks>> {
        let id = self.hash_action(action.law_id, &action.call_data, action.nonce);
        self.engine.cached(&ChecksKey::new(organization, id, account))
    }

    /// Forget the snapshot for `action`. Evaluations already in flight for it
    /// will not commit.
    pub fn invalidate_checks(&self, organization: &Organization, action: &Action, account: Address) {
        let id = self.hash_action(action.law_id, &action.call_data, action.nonce);
        self.engine
            .cache()
            .invalidate(&ChecksKey::new(organization, id, account));
    }

    /// Start deploying `plan` in the background.
    pub fn run_deployment(&self, plan: DeploymentPlan) -> DeploymentHandle {
        if let Some(metrics) = &self.metrics {
            metrics.deployments_started.inc();
        }
        self.sequencer.start(plan)
    }

    /// Wait for a run started by [`run_deployment`](Self::run_deployment).
    pub async fn finish_deployment(
        &self,
        handle: DeploymentHandle,
    ) -> Result<DeploymentOutcome, ClientError> {
        let progress = handle.subscribe();
        let result = handle.join().await;
        if let Some(metrics) = &self.metrics {
            metrics.record_deployment(&progress.borrow());
        }
        Ok(result?)
    }

    /// Run `plan` to completion under a deployment span.
    pub async fn deploy(&self, plan: DeploymentPlan) -> Result<DeploymentOutcome, ClientError> {
        let strategy = if self.capabilities.supports_atomic_batch {
            "atomic-batch"
        } else {
            "sequential"
        };
        let span = tracing_spans::deployment_span(&plan.primary.name, self.chain(), strategy);
        let handle = self.run_deployment(plan);
        self.finish_deployment(handle).instrument(span).await
    }
}
