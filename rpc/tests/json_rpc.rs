//! `JsonRpcLedger` against a canned in-process endpoint.

use alloy_primitives::{Address, B256, U256};
use powers_crypto::{encode, AbiValue};
use powers_ledger::{powers, ContractCall, LedgerClient, LedgerError, Transaction, TxHandle};
use powers_rpc::{JsonRpcLedger, RpcConfig};
use powers_types::{ActionId, ChainId, LawId};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const CHAIN: ChainId = ChainId::new(31337);

/// Answers each JSON-RPC method with a fixed response object and records the
/// requests it saw.
#[derive(Clone, Default)]
struct Endpoint {
    responses: Arc<Mutex<HashMap<String, Value>>>,
    seen: Arc<Mutex<Vec<Value>>>,
}

impl Endpoint {
    fn result(&self, method: &str, result: Value) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .insert(method.to_string(), json!({ "result": result }));
        self
    }

    fn error(&self, method: &str, code: i64, message: &str) -> &Self {
        self.responses.lock().unwrap().insert(
            method.to_string(),
            json!({ "error": { "code": code, "message": message } }),
        );
        self
    }

    fn requests(&self, method: &str) -> Vec<Value> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r["method"] == method)
            .cloned()
            .collect()
    }

    async fn serve(&self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let endpoint = self.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let endpoint = endpoint.clone();
                tokio::spawn(async move { endpoint.answer(stream).await });
            }
        });
        url
    }

    async fn answer(&self, mut stream: TcpStream) {
        let Some(body) = read_body(&mut stream).await else {
            return;
        };
        let request: Value = serde_json::from_slice(&body).unwrap();
        self.seen.lock().unwrap().push(request.clone());
        let method = request["method"].as_str().unwrap_or_default().to_string();
        let mut response = self
            .responses
            .lock()
            .unwrap()
            .get(&method)
            .cloned()
            .unwrap_or_else(|| json!({ "error": { "code": -32601, "message": "method not found" } }));
        response["jsonrpc"] = json!("2.0");
        response["id"] = request["id"].clone();

        let payload = response.to_string();
        let reply = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            payload.len(),
            payload
        );
        let _ = stream.write_all(reply.as_bytes()).await;
        let _ = stream.shutdown().await;
    }
}

async fn read_body(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length: usize = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0);
            let start = end + 4;
            while buf.len() < start + length {
                let n = stream.read(&mut chunk).await.ok()?;
                if n == 0 {
                    return None;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            return Some(buf[start..start + length].to_vec());
        }
    }
}

fn word_hex(values: &[AbiValue]) -> String {
    format!("0x{}", hex::encode(encode(values)))
}

fn fast(url: String) -> RpcConfig {
    RpcConfig {
        poll_interval_ms: 5,
        confirmation_timeout_ms: 2_000,
        ..RpcConfig::new(url)
    }
}

#[tokio::test]
async fn reads_block_number_and_views() {
    let endpoint = Endpoint::default();
    endpoint
        .result("eth_chainId", json!("0x7a69"))
        .result("eth_blockNumber", json!("0x3e8"))
        .result("eth_call", json!(word_hex(&[AbiValue::uint(4)])));
    let ledger = JsonRpcLedger::new(fast(endpoint.serve().await));

    assert_eq!(ledger.current_block_number(CHAIN).await.unwrap(), 1000);
    let org = Address::repeat_byte(0x42);
    let state = ledger
        .call_view(&powers::action_state(org, ActionId::new(U256::from(7))), CHAIN)
        .await
        .unwrap();
    assert_eq!(state, vec![AbiValue::uint(4)]);

    let calls = endpoint.requests("eth_call");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["params"][1], "latest");
    assert_eq!(
        calls[0]["params"][0]["to"].as_str().unwrap().to_lowercase(),
        format!("{org:?}").to_lowercase()
    );
    // chain id is fetched once per ledger
    assert_eq!(endpoint.requests("eth_chainId").len(), 1);
}

#[tokio::test]
async fn wrong_chain_is_refused() {
    let endpoint = Endpoint::default();
    endpoint.result("eth_chainId", json!("0x1"));
    let ledger = JsonRpcLedger::new(fast(endpoint.serve().await));
    let err = ledger.current_block_number(CHAIN).await.unwrap_err();
    assert!(matches!(err, LedgerError::Unsupported(_)));
    assert!(endpoint.requests("eth_blockNumber").is_empty());
}

#[tokio::test]
async fn rpc_errors_keep_code_and_message() {
    let endpoint = Endpoint::default();
    endpoint
        .result("eth_chainId", json!("0x7a69"))
        .error("eth_call", 3, "execution reverted");
    let ledger = JsonRpcLedger::new(fast(endpoint.serve().await));
    let err = ledger
        .can_act(Address::repeat_byte(1), Address::repeat_byte(2), LawId::new(1), CHAIN)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::Rpc {
            code: 3,
            message: "execution reverted".into()
        }
    );
}

#[tokio::test]
async fn can_act_decodes_bool() {
    let endpoint = Endpoint::default();
    endpoint
        .result("eth_chainId", json!("0x7a69"))
        .result("eth_call", json!(word_hex(&[AbiValue::Bool(true)])));
    let ledger = JsonRpcLedger::new(fast(endpoint.serve().await));
    assert!(ledger
        .can_act(Address::repeat_byte(1), Address::repeat_byte(2), LawId::new(1), CHAIN)
        .await
        .unwrap());
}

#[tokio::test]
async fn submit_then_confirm() {
    let hash = B256::repeat_byte(0xaa);
    let created = Address::repeat_byte(0xc0);
    let endpoint = Endpoint::default();
    endpoint
        .result("eth_chainId", json!("0x7a69"))
        .result("eth_sendTransaction", json!(hash))
        .result(
            "eth_getTransactionReceipt",
            json!({
                "transactionHash": hash,
                "blockNumber": "0x10",
                "status": "0x1",
                "contractAddress": created
            }),
        )
        .result("eth_blockNumber", json!("0x11"));
    let sender = Address::repeat_byte(0x05);
    let ledger = JsonRpcLedger::new(fast(endpoint.serve().await).with_sender(sender));

    let call = powers::transfer_ownership(Address::repeat_byte(9), Address::repeat_byte(8));
    let handle = ledger
        .submit_transaction(&Transaction::Call(call), CHAIN)
        .await
        .unwrap();
    assert_eq!(handle, TxHandle { hash, chain_id: CHAIN });

    let receipt = ledger.await_confirmation(&handle, 2).await.unwrap();
    assert!(receipt.success);
    assert_eq!(receipt.block_number, 16);
    assert_eq!(receipt.contract_address, Some(created));

    let sent = endpoint.requests("eth_sendTransaction");
    assert!(sent[0]["params"][0]["data"]
        .as_str()
        .unwrap()
        .starts_with("0xf2fde38b"));
}

#[tokio::test]
async fn reverted_receipt_is_reported() {
    let hash = B256::repeat_byte(0xbb);
    let endpoint = Endpoint::default();
    endpoint.result(
        "eth_getTransactionReceipt",
        json!({ "transactionHash": hash, "blockNumber": "0x2", "status": "0x0" }),
    );
    let ledger = JsonRpcLedger::new(fast(endpoint.serve().await));
    let receipt = ledger
        .await_confirmation(&TxHandle { hash, chain_id: CHAIN }, 1)
        .await
        .unwrap();
    assert!(!receipt.success);
    // one confirmation is the receipt itself, no head polling needed
    assert!(endpoint.requests("eth_blockNumber").is_empty());
}

#[tokio::test]
async fn missing_receipt_times_out() {
    let endpoint = Endpoint::default();
    endpoint.result("eth_getTransactionReceipt", Value::Null);
    let config = RpcConfig {
        confirmation_timeout_ms: 50,
        ..fast(endpoint.serve().await)
    };
    let ledger = JsonRpcLedger::new(config);
    let err = ledger
        .await_confirmation(
            &TxHandle {
                hash: B256::ZERO,
                chain_id: CHAIN,
            },
            1,
        )
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn batch_with_single_receipt_covers_every_call() {
    let hash = B256::repeat_byte(0xcc);
    let endpoint = Endpoint::default();
    endpoint
        .result("eth_chainId", json!("0x7a69"))
        .result("wallet_sendCalls", json!({ "id": "0xbatch" }))
        .result(
            "wallet_getCallsStatus",
            json!({
                "status": 200,
                "receipts": [{ "transactionHash": hash, "blockNumber": "0x5", "status": "0x1" }]
            }),
        );
    let ledger = JsonRpcLedger::new(
        fast(endpoint.serve().await).with_sender(Address::repeat_byte(0x05)),
    );
    let calls = vec![
        ContractCall::new(Address::repeat_byte(1), powers::CONSTITUTE, vec![AbiValue::Array(vec![])]),
        powers::transfer_ownership(Address::repeat_byte(2), Address::repeat_byte(1)),
    ];
    let receipts = ledger.multicall(&calls, CHAIN).await.unwrap();
    assert_eq!(receipts.len(), 2);
    assert!(receipts.iter().all(|r| r.success && r.tx_hash == hash));

    let sent = endpoint.requests("wallet_sendCalls");
    assert_eq!(sent[0]["params"][0]["atomicRequired"], true);
    assert_eq!(sent[0]["params"][0]["chainId"], "0x7a69");
    assert_eq!(sent[0]["params"][0]["calls"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn failed_batch_is_a_revert() {
    let endpoint = Endpoint::default();
    endpoint
        .result("eth_chainId", json!("0x7a69"))
        .result("wallet_sendCalls", json!("0xbatch"))
        .result("wallet_getCallsStatus", json!({ "status": 500 }));
    let ledger = JsonRpcLedger::new(
        fast(endpoint.serve().await).with_sender(Address::repeat_byte(0x05)),
    );
    let call = powers::transfer_ownership(Address::repeat_byte(2), Address::repeat_byte(1));
    let err = ledger.multicall(&[call], CHAIN).await.unwrap_err();
    assert!(matches!(err, LedgerError::Reverted { .. }));
}
