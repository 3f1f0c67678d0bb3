//! Readiness of governance actions.
//!
//! Whether an action may execute right now is decided by a set of independent
//! predicates over ledger state (role, vote outcome, timelock, throttle,
//! cross-law dependencies). The [`ConditionEvaluator`] fans the required reads
//! out concurrently, the aggregator folds the predicates into an immutable
//! [`Checks`] snapshot, and the [`ChecksEngine`] stores it in a versioned
//! cache so a stale evaluation can never overwrite a newer one.
//!
//! Informational predicates (`voteActive`, `hasVoted`) are reported but never
//! gate execution.

pub mod cache;
pub mod checks;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod predicate;
pub mod reads;
pub mod registry;
pub mod resolver;

pub use cache::{ChecksCache, StaleTicket, Ticket};
pub use checks::{aggregate, Checks, ChecksKey};
pub use engine::ChecksEngine;
pub use error::GovernanceError;
pub use evaluator::{ConditionEvaluator, Evaluation};
pub use predicate::{Outcome, Predicate, Predicates};
pub use reads::{Read, ReadResults, ReadSet, ReadValue};
pub use registry::OrganizationRegistry;
pub use resolver::ActionStateResolver;
