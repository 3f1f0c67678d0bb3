//! [`LedgerClient`] over HTTP JSON-RPC.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use powers_crypto::{decode, AbiValue};
use powers_ledger::{
    powers, ContractCall, LedgerClient, LedgerError, Receipt, Transaction, TxHandle, ViewCall,
};
use powers_types::{BlockNumber, ChainId, LawId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::wire::{
    decode_hex_data, hex_data, BatchCall, BatchState, CallObject, CallsStatus, Quantity,
    ReceiptObject, Request, Response, SendCalls, SendCallsResult,
};

/// Connection settings for [`JsonRpcLedger`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    pub url: String,
    /// Account the node signs writes with. Reads work without one.
    #[serde(default)]
    pub sender: Option<Address>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Give up waiting for a receipt after this long.
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_confirmation_timeout_ms() -> u64 {
    120_000
}

impl RpcConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sender: None,
            request_timeout_ms: default_request_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            confirmation_timeout_ms: default_confirmation_timeout_ms(),
        }
    }

    pub fn with_sender(mut self, sender: Address) -> Self {
        self.sender = Some(sender);
        self
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }
}

/// Default connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct JsonRpcLedger {
    http_client: reqwest::Client,
    config: RpcConfig,
    next_id: AtomicU64,
    /// Chain id reported by the endpoint, fetched on first use.
    chain: OnceCell<ChainId>,
}

impl JsonRpcLedger {
    pub fn new(config: RpcConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            config,
            next_id: AtomicU64::new(1),
            chain: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Send one request and deserialize its `result`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(id, method, "json-rpc request");
        let response = self
            .http_client
            .post(&self.config.url)
            .json(&Request::new(id, method, params))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(LedgerError::Transport(format!(
                "{method}: HTTP status {}",
                response.status()
            )));
        }

        let envelope: Response = response.json().await.map_err(|e| {
            LedgerError::Transport(format!("{method}: unreadable response: {e}"))
        })?;
        let result = envelope.into_result().map_err(|e| {
            tracing::debug!(method, code = e.code, message = %e.message, "json-rpc error");
            LedgerError::Rpc {
                code: e.code,
                message: e.message,
            }
        })?;
        serde_json::from_value(result)
            .map_err(|e| LedgerError::Other(format!("{method}: unexpected result: {e}")))
    }

    /// Chain id of the endpoint.
    pub async fn chain_id(&self) -> Result<ChainId, LedgerError> {
        self.chain
            .get_or_try_init(|| async {
                let id: Quantity = self.request("eth_chainId", json!([])).await?;
                Ok::<_, LedgerError>(ChainId::new(id.0))
            })
            .await
            .copied()
    }

    /// Refuse to talk to an endpoint that serves a different chain.
    async fn ensure_chain(&self, chain: ChainId) -> Result<(), LedgerError> {
        let actual = self.chain_id().await?;
        if actual == chain {
            Ok(())
        } else {
            Err(LedgerError::Unsupported(format!(
                "endpoint serves chain {actual}, not {chain}"
            )))
        }
    }

    fn sender(&self) -> Result<Address, LedgerError> {
        self.config
            .sender
            .ok_or_else(|| LedgerError::Unsupported("no sender account configured".to_string()))
    }

    async fn receipt(&self, hash: B256) -> Result<Option<ReceiptObject>, LedgerError> {
        self.request("eth_getTransactionReceipt", json!([hash])).await
    }

    /// Poll until `head >= block + confirmations - 1`. The receipt's own
    /// block is the first confirmation.
    async fn wait_for_depth(&self, block: BlockNumber, confirmations: u64) -> Result<(), LedgerError> {
        if confirmations <= 1 {
            return Ok(());
        }
        let target = block + confirmations - 1;
        loop {
            let head: Quantity = self.request("eth_blockNumber", json!([])).await?;
            if head.0 >= target {
                return Ok(());
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    async fn poll_batch(&self, id: &str) -> Result<CallsStatus, LedgerError> {
        loop {
            let status: CallsStatus = self.request("wallet_getCallsStatus", json!([id])).await?;
            match status.status.state() {
                BatchState::Pending => tokio::time::sleep(self.config.poll_interval()).await,
                BatchState::Confirmed => return Ok(status),
                BatchState::Failed => {
                    return Err(LedgerError::Reverted {
                        tx: format!("batch {id}"),
                    })
                }
            }
        }
    }
}

#[async_trait]
impl LedgerClient for JsonRpcLedger {
    async fn call_view(
        &self,
        call: &ViewCall,
        chain: ChainId,
    ) -> Result<Vec<AbiValue>, LedgerError> {
        self.ensure_chain(chain).await?;
        let object = CallObject {
            from: None,
            to: Some(call.to),
            data: hex_data(&call.calldata()),
        };
        let data: String = self.request("eth_call", json!([object, "latest"])).await?;
        let bytes = decode_hex_data(&data).map_err(LedgerError::Other)?;
        Ok(decode(&call.returns, &bytes)?)
    }

    async fn submit_transaction(
        &self,
        tx: &Transaction,
        chain: ChainId,
    ) -> Result<TxHandle, LedgerError> {
        let from = self.sender()?;
        self.ensure_chain(chain).await?;
        let object = match tx {
            Transaction::Call(call) => CallObject {
                from: Some(from),
                to: Some(call.to),
                data: hex_data(&call.calldata()),
            },
            Transaction::Deploy(deploy) => CallObject {
                from: Some(from),
                to: None,
                data: hex_data(&deploy.init_code()),
            },
        };
        let hash: B256 = self.request("eth_sendTransaction", json!([object])).await?;
        tracing::debug!(label = tx.label(), tx = %hash, "transaction submitted");
        Ok(TxHandle {
            hash,
            chain_id: chain,
        })
    }

    async fn await_confirmation(
        &self,
        handle: &TxHandle,
        confirmations: u64,
    ) -> Result<Receipt, LedgerError> {
        let wait = async {
            let receipt = loop {
                if let Some(receipt) = self.receipt(handle.hash).await? {
                    break receipt;
                }
                tokio::time::sleep(self.config.poll_interval()).await;
            };
            self.wait_for_depth(receipt.block_number.0, confirmations)
                .await?;
            Ok::<_, LedgerError>(receipt)
        };
        let receipt = tokio::time::timeout(self.config.confirmation_timeout(), wait)
            .await
            .map_err(|_| {
                LedgerError::Transport(format!("no receipt for {} in time", handle.hash))
            })??;
        Ok(Receipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.0,
            success: receipt.succeeded(),
            contract_address: receipt.contract_address,
        })
    }

    async fn multicall(
        &self,
        calls: &[ContractCall],
        chain: ChainId,
    ) -> Result<Vec<Receipt>, LedgerError> {
        let from = self.sender()?;
        self.ensure_chain(chain).await?;
        let request = SendCalls {
            version: "2.0.0",
            chain_id: Quantity(chain.get()),
            from,
            atomic_required: true,
            calls: calls
                .iter()
                .map(|call| BatchCall {
                    to: call.to,
                    data: hex_data(&call.calldata()),
                    value: Quantity(0),
                })
                .collect(),
        };
        let sent: SendCallsResult = self.request("wallet_sendCalls", json!([request])).await?;
        tracing::debug!(id = sent.id(), calls = calls.len(), "batch submitted");

        let status = tokio::time::timeout(self.config.confirmation_timeout(), self.poll_batch(sent.id()))
            .await
            .map_err(|_| LedgerError::Transport(format!("batch {} not settled in time", sent.id())))??;

        let receipts: Vec<Receipt> = status
            .receipts
            .iter()
            .map(|r| Receipt {
                tx_hash: r.transaction_hash,
                block_number: r.block_number.0,
                success: r.status.map_or(true, |s| s.0 == 1),
                contract_address: None,
            })
            .collect();
        // An atomic batch may land as a single transaction with one receipt.
        match receipts.as_slice() {
            [single] if calls.len() > 1 => Ok(vec![single.clone(); calls.len()]),
            _ => Ok(receipts),
        }
    }

    async fn current_block_number(&self, chain: ChainId) -> Result<BlockNumber, LedgerError> {
        self.ensure_chain(chain).await?;
        let head: Quantity = self.request("eth_blockNumber", json!([])).await?;
        Ok(head.0)
    }

    async fn can_act(
        &self,
        account: Address,
        organization: Address,
        law: LawId,
        chain: ChainId,
    ) -> Result<bool, LedgerError> {
        let values = self
            .call_view(&powers::can_call_law(organization, account, law), chain)
            .await?;
        Ok(powers::single(&values)?.as_bool()?)
    }
}

fn transport_error(e: reqwest::Error) -> LedgerError {
    if e.is_timeout() {
        LedgerError::Transport(format!("request timed out: {e}"))
    } else if e.is_connect() {
        LedgerError::Transport(format!("connection failed: {e}"))
    } else {
        LedgerError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_fills_defaults() {
        let config: RpcConfig = serde_json::from_value(json!({ "url": "http://localhost:8545" })).unwrap();
        assert_eq!(config, RpcConfig::new("http://localhost:8545"));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn writes_need_a_sender() {
        let ledger = JsonRpcLedger::new(RpcConfig::new("http://127.0.0.1:9"));
        let call = ContractCall::new(Address::ZERO, "constitute(address[])", Vec::new());
        let err = ledger
            .submit_transaction(&Transaction::Call(call.clone()), ChainId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unsupported(_)));
        let err = ledger.multicall(&[call], ChainId::new(1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Unsupported(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transient() {
        let ledger = JsonRpcLedger::new(RpcConfig::new("http://127.0.0.1:9"));
        let err = ledger.current_block_number(ChainId::new(1)).await.unwrap_err();
        assert!(err.is_transient(), "{err}");
    }
}
