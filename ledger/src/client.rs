use alloy_primitives::Address;
use async_trait::async_trait;
use powers_crypto::AbiValue;
use powers_types::{BlockNumber, ChainId, LawId};

use crate::{ContractCall, LedgerError, Receipt, Transaction, TxHandle, ViewCall};

/// Read/write access to the ledger.
///
/// Implementations talk to a node (see `powers-rpc`) or fake one in memory
/// (see `powers-nullables`). Every method may suspend; none retries on its own.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Execute a read-only call and decode its return values per `call.returns`.
    async fn call_view(&self, call: &ViewCall, chain: ChainId)
        -> Result<Vec<AbiValue>, LedgerError>;

    /// Sign and broadcast a transaction. Returns once the ledger has accepted it.
    async fn submit_transaction(
        &self,
        tx: &Transaction,
        chain: ChainId,
    ) -> Result<TxHandle, LedgerError>;

    /// Wait until `handle` has at least `confirmations` confirmations.
    async fn await_confirmation(
        &self,
        handle: &TxHandle,
        confirmations: u64,
    ) -> Result<Receipt, LedgerError>;

    /// Submit `calls` as one all-or-nothing batch and wait for it to land.
    ///
    /// Returns one receipt per call, in order.
    async fn multicall(
        &self,
        calls: &[ContractCall],
        chain: ChainId,
    ) -> Result<Vec<Receipt>, LedgerError>;

    async fn current_block_number(&self, chain: ChainId) -> Result<BlockNumber, LedgerError>;

    /// Whether `account` holds the role that `law` on `organization` requires.
    async fn can_act(
        &self,
        account: Address,
        organization: Address,
        law: LawId,
        chain: ChainId,
    ) -> Result<bool, LedgerError>;
}
