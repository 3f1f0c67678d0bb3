//! [`tracing::Span`] constructors for the client's top-level operations.
//!
//! Consistent span names and fields make runs easy to filter and correlate
//! across the JSON and human log formats.

use alloy_primitives::Address;
use powers_types::{ActionId, ChainId, LawId};
use tracing::{info_span, Span};

/// One readiness evaluation of an action.
pub fn checks_span(org: Address, law: LawId, action_id: ActionId, account: Address) -> Span {
    info_span!("checks", org = %org, law = %law, action_id = %action_id, account = %account)
}

/// Fetching an organization and its laws.
pub fn organization_span(org: Address, chain: ChainId) -> Span {
    info_span!("organization", org = %org, chain = %chain)
}

/// A whole deployment run.
pub fn deployment_span(primary: &str, chain: ChainId, strategy: &str) -> Span {
    info_span!("deployment", primary = %primary, chain = %chain, strategy = %strategy)
}
