//! Recorded ledger traffic.

use alloy_primitives::Address;

/// One observable interaction with a [`NullLedger`](crate::NullLedger), in call order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerEvent {
    /// A read. Carries the method name (`getActionState`, `canAct`, `blockNumber`, ...).
    View(String),
    /// A transaction was accepted. Carries the deploy name or call method.
    Submitted(String),
    /// A submitted transaction was confirmed.
    Confirmed(String),
    /// A batch was applied atomically. Carries each call's method.
    Multicall(Vec<String>),
    /// A contract was created at this address.
    Deployed { name: String, address: Address },
}

impl LedgerEvent {
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::View(_))
    }
}
