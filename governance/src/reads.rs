//! Named fan-out of ledger reads.
//!
//! Reads are requested by name, run concurrently, and joined into a map of
//! named results. A read requested twice is issued once.

use futures_util::future::{try_join_all, BoxFuture};
use powers_types::{ActionState, BlockNumber, LawId};
use std::collections::BTreeMap;
use std::future::Future;

use crate::GovernanceError;

/// A ledger read the evaluator may need.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Read {
    /// Whether the account may call the law.
    Role,
    ActionState,
    /// The `voteEnd` word of the action's vote data.
    VoteEnd,
    HasVoted,
    /// Block of the law's most recent fulfillment.
    LatestFulfillment,
    CurrentBlock,
    /// State of the same call data and nonce under another law.
    DependencyState(LawId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadValue {
    Bool(bool),
    State(ActionState),
    Block(BlockNumber),
}

/// Pending reads, keyed by name.
pub struct ReadSet<'a> {
    pending: BTreeMap<Read, BoxFuture<'a, Result<ReadValue, GovernanceError>>>,
}

impl<'a> ReadSet<'a> {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
        }
    }

    /// Register `read`. Returns `false` (dropping `fut` unpolled) if it is
    /// already registered.
    pub fn request<F>(&mut self, read: Read, fut: F) -> bool
    where
        F: Future<Output = Result<ReadValue, GovernanceError>> + Send + 'a,
    {
        if self.pending.contains_key(&read) {
            return false;
        }
        self.pending.insert(read, Box::pin(fut));
        true
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Run every read concurrently. The first failure aborts the rest.
    pub async fn join(self) -> Result<ReadResults, GovernanceError> {
        let (names, futures): (Vec<_>, Vec<_>) = self.pending.into_iter().unzip();
        let values = try_join_all(futures).await?;
        Ok(ReadResults {
            values: names.into_iter().zip(values).collect(),
        })
    }
}

impl Default for ReadSet<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Joined results of a [`ReadSet`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadResults {
    values: BTreeMap<Read, ReadValue>,
}

impl ReadResults {
    pub fn get(&self, read: Read) -> Option<ReadValue> {
        self.values.get(&read).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn flag(&self, read: Read) -> Result<bool, GovernanceError> {
        match self.get(read) {
            Some(ReadValue::Bool(value)) => Ok(value),
            other => Err(missing(read, other)),
        }
    }

    pub fn state(&self, read: Read) -> Result<ActionState, GovernanceError> {
        match self.get(read) {
            Some(ReadValue::State(state)) => Ok(state),
            other => Err(missing(read, other)),
        }
    }

    pub fn block(&self, read: Read) -> Result<BlockNumber, GovernanceError> {
        match self.get(read) {
            Some(ReadValue::Block(block)) => Ok(block),
            other => Err(missing(read, other)),
        }
    }
}

fn missing(read: Read, found: Option<ReadValue>) -> GovernanceError {
    match found {
        None => GovernanceError::InvalidAction(format!("read {read:?} was not requested")),
        Some(value) => {
            GovernanceError::InvalidAction(format!("read {read:?} returned unexpected {value:?}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::ready;
    use powers_ledger::LedgerError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn joins_results_by_name() {
        let mut reads = ReadSet::new();
        reads.request(Read::Role, ready(Ok(ReadValue::Bool(true))));
        reads.request(Read::CurrentBlock, ready(Ok(ReadValue::Block(42))));
        reads.request(
            Read::DependencyState(LawId::new(2)),
            ready(Ok(ReadValue::State(ActionState::Fulfilled))),
        );

        let results = reads.join().await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.flag(Read::Role).unwrap());
        assert_eq!(results.block(Read::CurrentBlock).unwrap(), 42);
        assert_eq!(
            results.state(Read::DependencyState(LawId::new(2))).unwrap(),
            ActionState::Fulfilled
        );
    }

    #[tokio::test]
    async fn duplicate_request_is_issued_once() {
        let issued = AtomicUsize::new(0);
        let mut reads = ReadSet::new();
        for _ in 0..3 {
            let issued = &issued;
            reads.request(Read::ActionState, async move {
                issued.fetch_add(1, Ordering::SeqCst);
                Ok(ReadValue::State(ActionState::Active))
            });
        }
        assert_eq!(reads.len(), 1);
        reads.join().await.unwrap();
        assert_eq!(issued.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_failing_read_fails_the_join() {
        let mut reads = ReadSet::new();
        reads.request(Read::Role, ready(Ok(ReadValue::Bool(true))));
        reads.request(
            Read::ActionState,
            ready(Err(GovernanceError::Ledger(LedgerError::Transport(
                "reset".into(),
            )))),
        );
        let err = reads.join().await.unwrap_err();
        assert!(matches!(err, GovernanceError::Ledger(LedgerError::Transport(_))));
    }

    #[tokio::test]
    async fn wrong_kind_is_reported() {
        let mut reads = ReadSet::new();
        reads.request(Read::Role, ready(Ok(ReadValue::Block(1))));
        let results = reads.join().await.unwrap();
        assert!(results.flag(Read::Role).is_err());
        assert!(results.block(Read::VoteEnd).is_err());
    }
}
