//! `powers`: compute action ids, evaluate readiness checks, run deployments.

use alloy_primitives::{Address, U256};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use powers_client::{ClientConfig, ClientMetrics, PowersClient};
use powers_deploy::{DeploymentPlan, DeploymentProgress, StepStatus};
use powers_governance::{Checks, Predicate};
use powers_rpc::JsonRpcLedger;
use powers_types::{Action, CallData, LawId};
use powers_utils::{format_duration, init_logging, LogFormat};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "powers", version, about = "Powers governance client")]
struct Cli {
    /// Path to a TOML configuration file. CLI flags and env vars override it.
    #[arg(long, env = "POWERS_CONFIG")]
    config: Option<PathBuf>,

    /// JSON-RPC endpoint of the chain's node.
    #[arg(long, env = "POWERS_RPC_URL")]
    rpc_url: Option<String>,

    #[arg(long, env = "POWERS_CHAIN_ID")]
    chain_id: Option<u64>,

    /// Account the node signs deployment transactions with.
    #[arg(long, env = "POWERS_SENDER")]
    sender: Option<Address>,

    /// Whether the chain applies batched writes atomically.
    #[arg(long, env = "POWERS_ATOMIC_BATCH")]
    atomic_batch: Option<bool>,

    /// Pause between sequential wiring calls, in milliseconds.
    #[arg(long, env = "POWERS_STEP_PAUSE_MS")]
    step_pause_ms: Option<u64>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "POWERS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "POWERS_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Print Prometheus metrics to stderr when the command finishes.
    #[arg(long, env = "POWERS_METRICS")]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute the id of an action.
    ActionId {
        #[command(flatten)]
        action: ActionArgs,
    },
    /// Evaluate the readiness checks of an action.
    Checks {
        /// Organization contract address.
        #[arg(long)]
        org: Address,
        /// Account that would execute the action.
        #[arg(long)]
        account: Address,
        #[command(flatten)]
        action: ActionArgs,
        /// Print the checks as JSON.
        #[arg(long)]
        json: bool,
        /// Exit with an error unless every gating check passes.
        #[arg(long)]
        strict: bool,
    },
    /// Deploy an organization and its dependencies from a plan file.
    Deploy {
        /// Plan in TOML or JSON.
        #[arg(long)]
        plan: PathBuf,
        /// Print the final step table as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[derive(Args)]
struct ActionArgs {
    /// Law index.
    #[arg(long)]
    law: u16,
    /// ABI-encoded law input as hex.
    #[arg(long, conflicts_with_all = ["input_types", "input_values"])]
    calldata: Option<String>,
    /// Law input types, comma-separated (e.g. "uint256,address"). `checks`
    /// falls back to the law's declared input types when omitted.
    #[arg(long, value_delimiter = ',', requires = "input_values")]
    input_types: Vec<String>,
    /// One law input value; repeat in input order. `[1,2]` is a single array value.
    #[arg(long = "input-value")]
    input_values: Vec<String>,
    /// Decimal or 0x-prefixed nonce.
    #[arg(long, value_parser = parse_u256)]
    nonce: U256,
}

impl ActionArgs {
    fn law_id(&self) -> LawId {
        LawId::new(self.law)
    }

    /// Values were given without `--input-types`.
    fn needs_declared_types(&self) -> bool {
        self.calldata.is_none() && self.input_types.is_empty() && !self.input_values.is_empty()
    }

    /// `declared` is used when `--input-types` is absent.
    fn action(&self, declared: &[String]) -> anyhow::Result<Action> {
        let types = if self.input_types.is_empty() {
            declared
        } else {
            self.input_types.as_slice()
        };
        let call_data = match &self.calldata {
            Some(hex) => CallData::from_hex(hex).context("invalid --calldata")?,
            None if self.input_values.is_empty() => CallData::empty(),
            None => powers_crypto::encode_law_input(types, &self.input_values).with_context(|| {
                format!("invalid law input for types [{}]", types.join(","))
            })?,
        };
        Ok(Action::new(self.law_id(), call_data, self.nonce))
    }
}

fn parse_u256(s: &str) -> Result<U256, String> {
    s.parse::<U256>().map_err(|e| format!("invalid number '{s}': {e}"))
}

impl Cli {
    /// File settings as the base, CLI flags and env vars on top.
    fn resolve_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ClientConfig::default(),
        };
        if let Some(url) = &self.rpc_url {
            config.rpc_url = url.clone();
        }
        if let Some(chain_id) = self.chain_id {
            config.chain_id = chain_id;
        }
        if let Some(sender) = self.sender {
            config.sender = Some(sender);
        }
        if let Some(atomic) = self.atomic_batch {
            config.supports_atomic_batch = atomic;
        }
        if let Some(pause) = self.step_pause_ms {
            config.inter_step_pause_ms = pause;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        config.enable_metrics |= self.metrics;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    init_logging(config.log_format, &config.log_level);

    let metrics = Arc::new(ClientMetrics::new()?);
    let client = PowersClient::from_config(&config).with_metrics(Arc::clone(&metrics));

    let result = run(cli.command, &client, &config).await;
    if config.enable_metrics {
        eprintln!("{}", metrics.encode()?);
    }
    result
}

async fn run(
    command: Command,
    client: &PowersClient<JsonRpcLedger>,
    config: &ClientConfig,
) -> anyhow::Result<()> {
    match command {
        Command::ActionId { action } => {
            let action = action.action(&[])?;
            println!(
                "{}",
                client.hash_action(action.law_id, &action.call_data, action.nonce)
            );
        }
        Command::Checks {
            org,
            account,
            action,
            json,
            strict,
        } => {
            let declared = if action.needs_declared_types() {
                let organization = client.organization(org).await?;
                organization
                    .law(action.law_id())
                    .map(|law| law.input_params.clone())
                    .with_context(|| format!("law {} is not adopted by {org}", action.law))?
            } else {
                Vec::new()
            };
            let action = action.action(&declared)?;
            let checks = client.checks_for(org, &action, account).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(checks.as_ref())?);
            } else {
                print_checks(&checks);
            }
            if strict {
                checks.ensure_executable()?;
            }
        }
        Command::Deploy { plan, json } => {
            let plan = DeploymentPlan::from_file(&plan)
                .with_context(|| format!("loading plan {}", plan.display()))?;
            tracing::info!(
                primary = %plan.primary.name,
                dependencies = plan.dependencies.len(),
                chain = %client.chain(),
                atomic = client.capabilities().supports_atomic_batch,
                "deploying"
            );
            let started = Instant::now();
            let handle = client.run_deployment(plan);
            let watcher = tokio::spawn(report_progress(handle.subscribe()));
            let result = client.finish_deployment(handle).await;
            // the sender is gone once the run ends, which stops the watcher
            let last = watcher.await.ok();

            if json {
                if let Some(progress) = &last {
                    println!("{}", serde_json::to_string_pretty(progress)?);
                }
            }
            let outcome = result?;
            println!(
                "deployed {} at {} in {}",
                outcome.progress.steps.first().map_or("organization", |s| s.name.as_str()),
                outcome.organization,
                format_duration(started.elapsed())
            );
            for (name, address) in &outcome.dependencies {
                println!("  {name:<24} {address}");
            }
        }
        Command::Config => print!("{}", config.to_toml_string()?),
    }
    Ok(())
}

/// Log every step transition until the run ends. Returns the final snapshot.
async fn report_progress(
    mut rx: tokio::sync::watch::Receiver<DeploymentProgress>,
) -> DeploymentProgress {
    let mut seen: Vec<StepStatus> = rx.borrow().steps.iter().map(|s| s.status).collect();
    while rx.changed().await.is_ok() {
        let progress = rx.borrow_and_update().clone();
        for (step, last) in progress.steps.iter().zip(seen.iter_mut()) {
            if step.status == *last {
                continue;
            }
            *last = step.status;
            match step.status {
                StepStatus::Error => tracing::error!(
                    step = %step.name,
                    error = step.error.as_deref().unwrap_or(""),
                    "step failed"
                ),
                status => tracing::info!(
                    step = %step.name,
                    status = ?status,
                    address = ?step.address,
                    tx = ?step.tx_hash,
                    "step"
                ),
            }
        }
        if progress.is_finished() {
            return progress;
        }
    }
    rx.borrow().clone()
}

fn print_checks(checks: &Checks) {
    println!("law          {}", checks.law);
    println!("action       {}", checks.action_id);
    println!("account      {}", checks.account);
    println!("state        {}", checks.action_state);
    if let Some(block) = checks.block_number {
        println!("block        {block}");
    }
    println!();
    for predicate in Predicate::ALL {
        let outcome = checks.outcome(predicate);
        let marker = if predicate.is_informational() { " (info)" } else { "" };
        println!("  {:<20} {:?}{marker}", predicate.name(), outcome);
    }
    println!();
    if checks.all_passed {
        println!("executable");
    } else {
        println!("not executable:");
        for failure in checks.failures() {
            println!("  - {failure}");
        }
    }
}
