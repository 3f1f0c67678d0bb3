//! Deployment plans.
//!
//! Plans are written in TOML or JSON:
//!
//! ```toml
//! [primary]
//! name = "Powers"
//! bytecode = "0x6080..."
//! constructor_args = [{ type = "string", value = "My DAO" }]
//!
//! [[dependencies]]
//! name = "Erc20Taxed"
//! bytecode = "0x6080..."
//! transfer_ownership = true
//!
//! [[dependencies]]
//! name = "OpenAction"
//! bytecode = "0x6080..."
//! constructor_args = ["primary"]
//! ```
//!
//! Address arguments are references resolved during deployment:
//! `"primary"`, `"dependency:<name>"`, or a literal `0x` address. Without an
//! `[initialize]` table the primary is initialized with
//! `constitute(address[])` over every dependency address.

use alloy_primitives::{Address, Bytes};
use powers_crypto::AbiValue;
use powers_ledger::powers;
use powers_ledger::{ContractCall, DeployRequest};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::{
    DeployError, StepKind, WiringStep, BATCH_STEP, INITIALIZE_STEP, TRANSFER_STEP_PREFIX,
};

/// Where an address argument comes from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AddressRef {
    Primary,
    Dependency(String),
    Literal(Address),
}

impl FromStr for AddressRef {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "primary" {
            return Ok(Self::Primary);
        }
        if let Some(name) = s.strip_prefix("dependency:") {
            if name.is_empty() {
                return Err(DeployError::InvalidPlan("empty dependency reference".into()));
            }
            return Ok(Self::Dependency(name.to_string()));
        }
        if s.starts_with("0x") {
            return Address::from_str(s)
                .map(Self::Literal)
                .map_err(|_| DeployError::InvalidPlan(format!("invalid address literal {s}")));
        }
        Err(DeployError::InvalidPlan(format!("unknown address reference {s}")))
    }
}

impl TryFrom<String> for AddressRef {
    type Error = DeployError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AddressRef> for String {
    fn from(r: AddressRef) -> Self {
        r.to_string()
    }
}

impl fmt::Display for AddressRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Dependency(name) => write!(f, "dependency:{name}"),
            Self::Literal(address) => write!(f, "{address}"),
        }
    }
}

/// A constructor or call argument.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanArg {
    Ref(AddressRef),
    Refs(Vec<AddressRef>),
    Value(AbiValue),
}

impl PlanArg {
    fn refs(&self) -> Vec<&AddressRef> {
        match self {
            Self::Ref(r) => vec![r],
            Self::Refs(refs) => refs.iter().collect(),
            Self::Value(_) => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSpec {
    pub name: String,
    /// Creation bytecode.
    pub bytecode: Bytes,
    #[serde(default)]
    pub constructor_args: Vec<PlanArg>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    #[serde(flatten)]
    pub contract: ContractSpec,
    /// Hand ownership of this contract to the primary once wired.
    #[serde(default)]
    pub transfer_ownership: bool,
}

/// The call that wires the deployed contracts together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitCall {
    #[serde(default = "primary_ref")]
    pub target: AddressRef,
    pub signature: String,
    #[serde(default)]
    pub args: Vec<PlanArg>,
}

fn primary_ref() -> AddressRef {
    AddressRef::Primary
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub primary: ContractSpec,
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    #[serde(default)]
    pub initialize: Option<InitCall>,
}

/// Addresses known so far in a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedAddresses {
    pub primary: Option<Address>,
    pub dependencies: HashMap<String, Address>,
}

impl ResolvedAddresses {
    pub fn resolve(&self, r: &AddressRef) -> Result<Address, DeployError> {
        match r {
            AddressRef::Primary => self.primary,
            AddressRef::Dependency(name) => self.dependencies.get(name).copied(),
            AddressRef::Literal(address) => Some(*address),
        }
        .ok_or_else(|| DeployError::UnresolvedReference(r.to_string()))
    }

    pub fn resolve_args(&self, args: &[PlanArg]) -> Result<Vec<AbiValue>, DeployError> {
        args.iter()
            .map(|arg| match arg {
                PlanArg::Ref(r) => self.resolve(r).map(AbiValue::Address),
                PlanArg::Refs(refs) => refs
                    .iter()
                    .map(|r| self.resolve(r).map(AbiValue::Address))
                    .collect::<Result<Vec<_>, _>>()
                    .map(AbiValue::Array),
                PlanArg::Value(value) => Ok(value.clone()),
            })
            .collect()
    }
}

impl DeploymentPlan {
    pub fn from_toml_str(s: &str) -> Result<Self, DeployError> {
        let plan: Self = toml::from_str(s).map_err(|e| DeployError::InvalidPlan(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn from_json_str(s: &str) -> Result<Self, DeployError> {
        let plan: Self =
            serde_json::from_str(s).map_err(|e| DeployError::InvalidPlan(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Load a plan, choosing the format by extension (`.json`, else TOML).
    pub fn from_file(path: &Path) -> Result<Self, DeployError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DeployError::InvalidPlan(format!("{}: {e}", path.display())))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            _ => Self::from_toml_str(&contents),
        }
    }

    /// Reject plans that could only fail part-way through a run.
    ///
    /// Names must be unique and non-empty, bytecode non-empty, and every
    /// reference must point at a contract deployed before it is needed.
    pub fn validate(&self) -> Result<(), DeployError> {
        let mut names: HashSet<&str> = HashSet::from([self.primary.name.as_str()]);
        let mut known: HashSet<&str> = HashSet::new();
        check_contract(&self.primary, &known, false)?;

        for dep in &self.dependencies {
            check_contract(&dep.contract, &known, true)?;
            if !names.insert(dep.contract.name.as_str()) {
                return Err(DeployError::InvalidPlan(format!(
                    "duplicate contract name {}",
                    dep.contract.name
                )));
            }
            known.insert(dep.contract.name.as_str());
        }

        if let Some(init) = &self.initialize {
            if init.signature.trim().is_empty() || !init.signature.contains('(') {
                return Err(DeployError::InvalidPlan(format!(
                    "invalid initialization signature '{}'",
                    init.signature
                )));
            }
            let refs = init.args.iter().flat_map(PlanArg::refs);
            for r in std::iter::once(&init.target).chain(refs) {
                check_ref(r, &known, true)?;
            }
        }
        Ok(())
    }

    /// Deploy request for a contract, with constructor arguments resolved.
    pub fn deploy_request(
        spec: &ContractSpec,
        addresses: &ResolvedAddresses,
    ) -> Result<DeployRequest, DeployError> {
        Ok(DeployRequest {
            name: spec.name.clone(),
            bytecode: spec.bytecode.clone(),
            constructor_args: addresses.resolve_args(&spec.constructor_args)?,
        })
    }

    /// The initialization call with every reference resolved.
    pub fn init_call(&self, addresses: &ResolvedAddresses) -> Result<ContractCall, DeployError> {
        match &self.initialize {
            Some(init) => Ok(ContractCall::new(
                addresses.resolve(&init.target)?,
                &init.signature,
                addresses.resolve_args(&init.args)?,
            )),
            None => {
                let primary = addresses.resolve(&AddressRef::Primary)?;
                let laws = self
                    .dependencies
                    .iter()
                    .map(|dep| {
                        addresses.resolve(&AddressRef::Dependency(dep.contract.name.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(powers::constitute(primary, &laws))
            }
        }
    }

    /// Wiring rows: initialization first, then one transfer per flagged
    /// dependency.
    pub fn wiring_steps(&self) -> Vec<WiringStep> {
        let target = match self.initialize.as_ref().map(|init| &init.target) {
            None | Some(AddressRef::Primary) => self.primary.name.clone(),
            Some(AddressRef::Dependency(name)) => name.clone(),
            Some(AddressRef::Literal(address)) => address.to_string(),
        };
        let mut steps = vec![WiringStep {
            name: INITIALIZE_STEP.to_string(),
            kind: StepKind::Initialize,
            contract: target,
        }];
        steps.extend(self.ownership_transfers().map(|dep| WiringStep {
            name: format!("{TRANSFER_STEP_PREFIX}{}", dep.contract.name),
            kind: StepKind::TransferOwnership,
            contract: dep.contract.name.clone(),
        }));
        steps
    }

    /// Dependencies whose ownership moves to the primary, in declared order.
    pub fn ownership_transfers(&self) -> impl Iterator<Item = &DependencySpec> {
        self.dependencies.iter().filter(|dep| dep.transfer_ownership)
    }
}

fn check_contract(
    spec: &ContractSpec,
    known: &HashSet<&str>,
    primary_known: bool,
) -> Result<(), DeployError> {
    if spec.name.trim().is_empty() {
        return Err(DeployError::InvalidPlan("contract without a name".into()));
    }
    if spec.name == INITIALIZE_STEP
        || spec.name == BATCH_STEP
        || spec.name.starts_with(TRANSFER_STEP_PREFIX)
    {
        return Err(DeployError::InvalidPlan(format!(
            "contract name '{}' is reserved for a wiring step",
            spec.name
        )));
    }
    if spec.bytecode.is_empty() {
        return Err(DeployError::InvalidPlan(format!("{} has no bytecode", spec.name)));
    }
    for r in spec.constructor_args.iter().flat_map(PlanArg::refs) {
        check_ref(r, known, primary_known)?;
    }
    Ok(())
}

fn check_ref(
    r: &AddressRef,
    known: &HashSet<&str>,
    primary_known: bool,
) -> Result<(), DeployError> {
    let resolvable = match r {
        AddressRef::Primary => primary_known,
        AddressRef::Dependency(name) => known.contains(name.as_str()),
        AddressRef::Literal(_) => true,
    };
    if resolvable {
        Ok(())
    } else {
        Err(DeployError::UnresolvedReference(r.to_string()))
    }
}
