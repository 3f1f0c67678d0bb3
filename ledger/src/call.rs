//! Shapes of reads, writes, and their results.

use alloy_primitives::{Address, Bytes, B256};
use powers_crypto::abi::{encode, encode_call};
use powers_crypto::{AbiType, AbiValue};
use powers_types::{BlockNumber, ChainId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A read-only contract call with its expected return types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewCall {
    pub to: Address,
    /// Canonical signature, e.g. `getActionState(uint256)`.
    pub signature: String,
    pub args: Vec<AbiValue>,
    pub returns: Vec<AbiType>,
}

impl ViewCall {
    pub fn new(to: Address, signature: &str, args: Vec<AbiValue>, returns: Vec<AbiType>) -> Self {
        Self {
            to,
            signature: signature.to_string(),
            args,
            returns,
        }
    }

    /// Function name without the parameter list.
    pub fn method(&self) -> &str {
        method_name(&self.signature)
    }

    pub fn calldata(&self) -> Vec<u8> {
        encode_call(&self.signature, &self.args)
    }
}

/// A state-changing contract call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub to: Address,
    pub signature: String,
    #[serde(default)]
    pub args: Vec<AbiValue>,
}

impl ContractCall {
    pub fn new(to: Address, signature: &str, args: Vec<AbiValue>) -> Self {
        Self {
            to,
            signature: signature.to_string(),
            args,
        }
    }

    pub fn method(&self) -> &str {
        method_name(&self.signature)
    }

    pub fn calldata(&self) -> Vec<u8> {
        encode_call(&self.signature, &self.args)
    }
}

impl fmt::Display for ContractCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.to, self.method())
    }
}

/// Contract creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    /// Contract name, for logs and step labels.
    pub name: String,
    pub bytecode: Bytes,
    #[serde(default)]
    pub constructor_args: Vec<AbiValue>,
}

impl DeployRequest {
    /// Creation bytecode followed by the encoded constructor arguments.
    pub fn init_code(&self) -> Vec<u8> {
        let mut code = self.bytecode.to_vec();
        code.extend_from_slice(&encode(&self.constructor_args));
        code
    }
}

/// Anything submitted through [`LedgerClient::submit_transaction`](crate::LedgerClient::submit_transaction).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transaction {
    Call(ContractCall),
    Deploy(DeployRequest),
}

impl Transaction {
    /// Short label: the contract name for deploys, the method for calls.
    pub fn label(&self) -> &str {
        match self {
            Self::Call(call) => call.method(),
            Self::Deploy(deploy) => &deploy.name,
        }
    }
}

/// A submitted, not necessarily confirmed, transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TxHandle {
    pub hash: B256,
    pub chain_id: ChainId,
}

/// Outcome of a confirmed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: B256,
    pub block_number: BlockNumber,
    pub success: bool,
    /// Set for contract creations.
    pub contract_address: Option<Address>,
}

fn method_name(signature: &str) -> &str {
    signature.split('(').next().unwrap_or(signature)
}
