//! Prometheus metrics for readiness checks and deployments.
//!
//! [`ClientMetrics`] owns a dedicated [`Registry`]; [`ClientMetrics::encode`]
//! renders it in the Prometheus text exposition format.

use powers_deploy::{DeploymentProgress, RunStatus, StepStatus};
use powers_governance::{Checks, GovernanceError};
use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, Encoder, Histogram, HistogramOpts, IntCounter,
    IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

use crate::ClientError;

pub struct ClientMetrics {
    pub registry: Registry,

    // ── Checks ──────────────────────────────────────────────────────────
    /// Evaluations that produced a committed snapshot.
    pub evaluations: IntCounter,
    /// Committed snapshots with `all_passed`.
    pub executable: IntCounter,
    /// Evaluations that failed before producing a snapshot.
    pub evaluation_failures: IntCounter,
    /// Evaluations overtaken by a newer one for the same key.
    pub superseded: IntCounter,
    pub evaluation_latency_ms: Histogram,

    // ── Deployments ─────────────────────────────────────────────────────
    pub deployments_started: IntCounter,
    pub deployments_completed: IntCounter,
    pub deployments_failed: IntCounter,
    /// Final step outcomes, labelled by `status`.
    pub deployment_steps: IntCounterVec,
}

impl ClientMetrics {
    pub fn new() -> Result<Self, ClientError> {
        let registry = Registry::new();

        let evaluations = register_int_counter_with_registry!(
            Opts::new("powers_checks_evaluations_total", "Committed readiness evaluations"),
            registry
        )?;
        let executable = register_int_counter_with_registry!(
            Opts::new(
                "powers_checks_executable_total",
                "Committed evaluations where every gating check passed"
            ),
            registry
        )?;
        let evaluation_failures = register_int_counter_with_registry!(
            Opts::new(
                "powers_checks_failures_total",
                "Evaluations that failed before producing checks"
            ),
            registry
        )?;
        let superseded = register_int_counter_with_registry!(
            Opts::new(
                "powers_checks_superseded_total",
                "Evaluations discarded because a newer one started"
            ),
            registry
        )?;
        // 1 ms to ~16 s
        let evaluation_latency_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "powers_checks_latency_ms",
                "Readiness evaluation latency in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(1.0, 2.0, 15)?),
            registry
        )?;

        let deployments_started = register_int_counter_with_registry!(
            Opts::new("powers_deployments_started_total", "Deployment runs started"),
            registry
        )?;
        let deployments_completed = register_int_counter_with_registry!(
            Opts::new("powers_deployments_completed_total", "Deployment runs completed"),
            registry
        )?;
        let deployments_failed = register_int_counter_with_registry!(
            Opts::new("powers_deployments_failed_total", "Deployment runs that failed"),
            registry
        )?;
        let deployment_steps = register_int_counter_vec_with_registry!(
            Opts::new("powers_deployment_steps_total", "Deployment step outcomes"),
            &["status"],
            registry
        )?;

        Ok(Self {
            registry,
            evaluations,
            executable,
            evaluation_failures,
            superseded,
            evaluation_latency_ms,
            deployments_started,
            deployments_completed,
            deployments_failed,
            deployment_steps,
        })
    }

    pub fn record_evaluation(
        &self,
        result: &Result<Arc<Checks>, GovernanceError>,
        elapsed: Duration,
    ) {
        self.evaluation_latency_ms
            .observe(elapsed.as_secs_f64() * 1000.0);
        match result {
            Ok(checks) => {
                self.evaluations.inc();
                if checks.all_passed {
                    self.executable.inc();
                }
            }
            Err(GovernanceError::Superseded(_)) => self.superseded.inc(),
            Err(_) => self.evaluation_failures.inc(),
        }
    }

    /// Count a finished run from its final snapshot.
    pub fn record_deployment(&self, progress: &DeploymentProgress) {
        match progress.status {
            RunStatus::Running => return,
            RunStatus::Completed { .. } => self.deployments_completed.inc(),
            RunStatus::Failed { .. } => self.deployments_failed.inc(),
        }
        for step in &progress.steps {
            let status = match step.status {
                StepStatus::Idle => "idle",
                StepStatus::Pending => "pending",
                StepStatus::Success => "success",
                StepStatus::Error => "error",
            };
            self.deployment_steps.with_label_values(&[status]).inc();
        }
    }

    /// Text exposition of every registered metric.
    pub fn encode(&self) -> Result<String, ClientError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| ClientError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powers_types::{ActionId, U256};

    #[test]
    fn evaluation_outcomes_land_in_separate_counters() {
        let metrics = ClientMetrics::new().unwrap();
        let id = ActionId::new(U256::from(1));
        metrics.record_evaluation(&Err(GovernanceError::Superseded(id)), Duration::from_millis(3));
        metrics.record_evaluation(
            &Err(GovernanceError::AuthorizationDenied),
            Duration::from_millis(3),
        );
        assert_eq!(metrics.superseded.get(), 1);
        assert_eq!(metrics.evaluation_failures.get(), 1);
        assert_eq!(metrics.evaluations.get(), 0);
        assert_eq!(metrics.evaluation_latency_ms.get_sample_count(), 2);
    }

    #[test]
    fn exposition_names_every_family() {
        let metrics = ClientMetrics::new().unwrap();
        metrics.deployments_started.inc();
        metrics.deployment_steps.with_label_values(&["success"]).inc();
        let text = metrics.encode().unwrap();
        assert!(text.contains("powers_deployments_started_total 1"));
        assert!(text.contains("powers_deployment_steps_total{status=\"success\"} 1"));
    }
}
