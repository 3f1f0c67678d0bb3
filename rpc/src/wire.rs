//! JSON-RPC envelopes and the Ethereum object shapes this crate exchanges.

use alloy_primitives::{Address, B256};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> Request<'a> {
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<ErrorObject>,
}

impl Response {
    pub fn into_result(self) -> Result<Value, ErrorObject> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A hex-encoded unsigned quantity (`"0x1b4"`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quantity(pub u64);

impl Quantity {
    pub fn parse(s: &str) -> Result<Self, String> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| format!("quantity '{s}' is missing the 0x prefix"))?;
        if digits.is_empty() {
            return Err("empty quantity".to_string());
        }
        u64::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|e| format!("invalid quantity '{s}': {e}"))
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:#x}", self.0))
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}

pub fn hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn decode_hex_data(s: &str) -> Result<Vec<u8>, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| format!("invalid hex data: {e}"))
}

/// Parameter object of `eth_call` and `eth_sendTransaction`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Absent for contract creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptObject {
    pub transaction_hash: B256,
    pub block_number: Quantity,
    /// `0x1` on success. Pre-Byzantium receipts omit it.
    #[serde(default)]
    pub status: Option<Quantity>,
    #[serde(default)]
    pub contract_address: Option<Address>,
}

impl ReceiptObject {
    pub fn succeeded(&self) -> bool {
        self.status.map_or(true, |s| s.0 == 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCall {
    pub to: Address,
    pub data: String,
    pub value: Quantity,
}

/// Parameter object of `wallet_sendCalls`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCalls {
    pub version: &'static str,
    pub chain_id: Quantity,
    pub from: Address,
    pub atomic_required: bool,
    pub calls: Vec<BatchCall>,
}

/// `wallet_sendCalls` returns a bare id in early wallets and `{ id }` later.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SendCallsResult {
    Id(String),
    Object { id: String },
}

impl SendCallsResult {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) | Self::Object { id } => id,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    Confirmed,
    Failed,
}

/// Numeric (`100`, `200`, `4xx`...) or legacy string (`"PENDING"`, `"CONFIRMED"`) status.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CallsStatusCode {
    Code(u16),
    Label(String),
}

impl CallsStatusCode {
    pub fn state(&self) -> BatchState {
        match self {
            Self::Code(100..=199) => BatchState::Pending,
            Self::Code(200..=299) => BatchState::Confirmed,
            Self::Code(_) => BatchState::Failed,
            Self::Label(label) => match label.to_ascii_uppercase().as_str() {
                "PENDING" => BatchState::Pending,
                "CONFIRMED" => BatchState::Confirmed,
                _ => BatchState::Failed,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReceipt {
    pub transaction_hash: B256,
    pub block_number: Quantity,
    #[serde(default)]
    pub status: Option<Quantity>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallsStatus {
    pub status: CallsStatusCode,
    #[serde(default)]
    pub receipts: Vec<BatchReceipt>,
}
