//! JSON-RPC implementation of [`LedgerClient`](powers_ledger::LedgerClient).
//!
//! Reads go through `eth_call`, writes through `eth_sendTransaction` from a
//! node-managed sender, and atomic batches through the wallet call-batching
//! methods (`wallet_sendCalls` / `wallet_getCallsStatus`).

pub mod ledger;
pub mod wire;

pub use ledger::{JsonRpcLedger, RpcConfig};
