//! Generation-stamped cache of [`Checks`].
//!
//! Every evaluation takes a [`Ticket`] before it starts reading. Taking a
//! ticket for a key invalidates all earlier tickets for that key, and only a
//! current ticket may commit. An evaluation that was overtaken while its
//! reads were in flight is therefore discarded on arrival.
//!
//! Generations come from one counter shared by all keys, so a key that was
//! evicted or invalidated never hands out a generation an older ticket holds.
//! The map is bounded: once `capacity` keys are tracked the oldest is evicted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::{Checks, ChecksKey};

/// Keys tracked by [`ChecksCache::new`].
pub const DEFAULT_CAPACITY: usize = 4096;

/// Permission to commit one evaluation result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    key: ChecksKey,
    generation: u64,
}

impl Ticket {
    pub fn key(&self) -> &ChecksKey {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// `current` is 0 when the key is no longer tracked.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("ticket generation {generation} is stale (current {current})")]
pub struct StaleTicket {
    pub generation: u64,
    pub current: u64,
}

struct Entry {
    issued: u64,
    committed: Option<Arc<Checks>>,
}

struct Inner {
    next_generation: u64,
    entries: HashMap<ChecksKey, Entry>,
    order: VecDeque<ChecksKey>,
}

pub struct ChecksCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Default for ChecksCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ChecksCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_generation: 1,
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity,
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start an evaluation for `key`, superseding any in flight.
    pub fn begin(&self, key: ChecksKey) -> Ticket {
        let mut inner = self.inner();
        let generation = inner.next_generation;
        inner.next_generation += 1;
        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.issued = generation;
        } else if self.capacity > 0 {
            if inner.order.len() >= self.capacity {
                if let Some(evicted) = inner.order.pop_front() {
                    inner.entries.remove(&evicted);
                    tracing::trace!(?evicted, "checks cache full, oldest key evicted");
                }
            }
            inner.entries.insert(
                key,
                Entry {
                    issued: generation,
                    committed: None,
                },
            );
            inner.order.push_back(key);
        }
        Ticket { key, generation }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.inner()
            .entries
            .get(&ticket.key)
            .is_some_and(|entry| entry.issued == ticket.generation)
    }

    /// Store `checks` if `ticket` is still the newest for its key.
    pub fn commit(&self, ticket: Ticket, checks: Arc<Checks>) -> Result<(), StaleTicket> {
        let mut inner = self.inner();
        match inner.entries.get_mut(&ticket.key) {
            Some(entry) if entry.issued == ticket.generation => {
                entry.committed = Some(checks);
                Ok(())
            }
            entry => Err(StaleTicket {
                generation: ticket.generation,
                current: entry.map_or(0, |entry| entry.issued),
            }),
        }
    }

    pub fn get(&self, key: &ChecksKey) -> Option<Arc<Checks>> {
        self.inner()
            .entries
            .get(key)
            .and_then(|entry| entry.committed.clone())
    }

    /// Forget `key`, e.g. after the action was executed. Evaluations still
    /// in flight for it can no longer commit.
    pub fn invalidate(&self, key: &ChecksKey) -> Option<Arc<Checks>> {
        let mut inner = self.inner();
        let entry = inner.entries.remove(key)?;
        inner.order.retain(|tracked| tracked != key);
        entry.committed
    }

    /// Number of keys with a committed result.
    pub fn len(&self) -> usize {
        self.inner()
            .entries
            .values()
            .filter(|entry| entry.committed.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys tracked, including those with only a ticket out.
    pub fn tracked(&self) -> usize {
        self.inner().entries.len()
    }
}
