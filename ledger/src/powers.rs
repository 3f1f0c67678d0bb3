//! Typed builders for the organization contract's read/write surface.
//!
//! Every signature the workspace sends lives here, so ledger implementations
//! and tests agree on names and return shapes.

use alloy_primitives::{Address, U256};
use powers_crypto::{AbiError, AbiType, AbiValue};
use powers_types::{ActionId, BlockNumber, Conditions, LawId, RoleId};

use crate::{ContractCall, ViewCall};

pub const GET_ACTION_STATE: &str = "getActionState(uint256)";
pub const GET_ACTION_VOTE_DATA: &str = "getActionVoteData(uint256)";
pub const HAS_VOTED: &str = "hasVoted(uint256,address)";
pub const GET_LATEST_FULFILLMENT: &str = "getLatestFulfillment(uint16)";
pub const CAN_CALL_LAW: &str = "canCallLaw(address,uint16)";
pub const LAW_COUNTER: &str = "lawCounter()";
pub const GET_ADOPTED_LAW: &str = "getAdoptedLaw(uint16)";
pub const GET_CONDITIONS: &str = "getConditions(uint16)";
pub const NAME: &str = "name()";
pub const TREASURY: &str = "treasury()";
pub const GET_INPUT_PARAMS: &str = "getInputParams(uint16)";
pub const GET_NAME_DESCRIPTION: &str = "getNameDescription(uint16)";
pub const GET_ROLE_LABEL: &str = "getRoleLabel(uint256)";
pub const CONSTITUTE: &str = "constitute(address[])";
pub const TRANSFER_OWNERSHIP: &str = "transferOwnership(address)";

fn law_arg(law: LawId) -> AbiValue {
    AbiValue::Uint(U256::from(law.get()))
}

fn action_arg(id: ActionId) -> AbiValue {
    AbiValue::Uint(id.as_u256())
}

pub fn action_state(org: Address, id: ActionId) -> ViewCall {
    ViewCall::new(org, GET_ACTION_STATE, vec![action_arg(id)], vec![AbiType::Uint(8)])
}

pub fn action_vote_data(org: Address, id: ActionId) -> ViewCall {
    ViewCall::new(
        org,
        GET_ACTION_VOTE_DATA,
        vec![action_arg(id)],
        vec![
            AbiType::Uint(48),
            AbiType::Uint(32),
            AbiType::Uint(256),
            AbiType::Uint(32),
            AbiType::Uint(32),
            AbiType::Uint(32),
        ],
    )
}

pub fn has_voted(org: Address, id: ActionId, account: Address) -> ViewCall {
    ViewCall::new(
        org,
        HAS_VOTED,
        vec![action_arg(id), AbiValue::Address(account)],
        vec![AbiType::Bool],
    )
}

pub fn latest_fulfillment(org: Address, law: LawId) -> ViewCall {
    ViewCall::new(org, GET_LATEST_FULFILLMENT, vec![law_arg(law)], vec![AbiType::Uint(48)])
}

pub fn can_call_law(org: Address, account: Address, law: LawId) -> ViewCall {
    ViewCall::new(
        org,
        CAN_CALL_LAW,
        vec![AbiValue::Address(account), law_arg(law)],
        vec![AbiType::Bool],
    )
}

pub fn law_counter(org: Address) -> ViewCall {
    ViewCall::new(org, LAW_COUNTER, Vec::new(), vec![AbiType::Uint(16)])
}

/// Returns `(address law, bool active)`.
pub fn adopted_law(org: Address, law: LawId) -> ViewCall {
    ViewCall::new(
        org,
        GET_ADOPTED_LAW,
        vec![law_arg(law)],
        vec![AbiType::Address, AbiType::Bool],
    )
}

pub fn conditions(org: Address, law: LawId) -> ViewCall {
    ViewCall::new(
        org,
        GET_CONDITIONS,
        vec![law_arg(law)],
        vec![
            AbiType::Uint(256),
            AbiType::Uint(8),
            AbiType::Uint(8),
            AbiType::Uint(32),
            AbiType::Uint(48),
            AbiType::Uint(48),
            AbiType::Uint(16),
            AbiType::Uint(16),
            AbiType::Uint(16),
        ],
    )
}

pub fn name(org: Address) -> ViewCall {
    ViewCall::new(org, NAME, Vec::new(), vec![AbiType::String])
}

pub fn treasury(org: Address) -> ViewCall {
    ViewCall::new(org, TREASURY, Vec::new(), vec![AbiType::Address])
}

/// Comma-separated ABI type names of the law's input tuple, e.g. `"address,uint256"`.
pub fn input_params(org: Address, law: LawId) -> ViewCall {
    ViewCall::new(org, GET_INPUT_PARAMS, vec![law_arg(law)], vec![AbiType::String])
}

pub fn name_description(org: Address, law: LawId) -> ViewCall {
    ViewCall::new(org, GET_NAME_DESCRIPTION, vec![law_arg(law)], vec![AbiType::String])
}

/// Empty for roles that were never labelled.
pub fn role_label(org: Address, role: RoleId) -> ViewCall {
    ViewCall::new(
        org,
        GET_ROLE_LABEL,
        vec![AbiValue::Uint(role.as_u256())],
        vec![AbiType::String],
    )
}

/// Split a [`input_params`] result into type names, checking each one parses.
pub fn decode_input_params(values: &[AbiValue]) -> Result<Vec<String>, AbiError> {
    single(values)?
        .as_str()?
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| AbiType::parse(name).map(|ty| ty.to_string()))
        .collect()
}

pub fn constitute(org: Address, laws: &[Address]) -> ContractCall {
    ContractCall::new(
        org,
        CONSTITUTE,
        vec![AbiValue::Array(laws.iter().copied().map(AbiValue::Address).collect())],
    )
}

pub fn transfer_ownership(target: Address, new_owner: Address) -> ContractCall {
    ContractCall::new(target, TRANSFER_OWNERSHIP, vec![AbiValue::Address(new_owner)])
}

/// Vote bookkeeping for one action.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoteData {
    pub vote_start: BlockNumber,
    pub vote_duration: u64,
    pub vote_end: BlockNumber,
    pub against: u64,
    pub for_votes: u64,
    pub abstain: u64,
}

impl VoteData {
    pub fn decode(values: &[AbiValue]) -> Result<Self, AbiError> {
        let field = |i: usize| {
            values.get(i).ok_or(AbiError::ArityMismatch {
                expected: 6,
                got: values.len(),
            })
        };
        Ok(Self {
            vote_start: field(0)?.as_u64()?,
            vote_duration: field(1)?.as_u64()?,
            vote_end: field(2)?.as_u64()?,
            against: field(3)?.as_u64()?,
            for_votes: field(4)?.as_u64()?,
            abstain: field(5)?.as_u64()?,
        })
    }
}

/// Decode the nine words returned by [`conditions`].
pub fn decode_conditions(values: &[AbiValue]) -> Result<Conditions, AbiError> {
    if values.len() != 9 {
        return Err(AbiError::ArityMismatch {
            expected: 9,
            got: values.len(),
        });
    }
    let small = |i: usize| -> Result<u64, AbiError> { values[i].as_u64() };
    let law = |i: usize| -> Result<LawId, AbiError> {
        let raw = values[i].as_u64()?;
        u16::try_from(raw).map(LawId::new).map_err(|_| AbiError::OutOfRange {
            ty: "uint16".to_string(),
            value: raw.to_string(),
        })
    };
    let percent = |i: usize| -> Result<u8, AbiError> {
        let raw = values[i].as_u64()?;
        u8::try_from(raw).map_err(|_| AbiError::OutOfRange {
            ty: "uint8".to_string(),
            value: raw.to_string(),
        })
    };
    Ok(Conditions {
        allowed_role: RoleId::new(values[0].as_uint()?),
        quorum: percent(1)?,
        succeed_at: percent(2)?,
        voting_period: small(3)?,
        throttle_execution: small(4)?,
        delay_execution: small(5)?,
        need_fulfilled: law(6)?,
        need_not_fulfilled: law(7)?,
        read_state_from: law(8)?,
    })
}

/// First return value of a single-output call.
pub fn single(values: &[AbiValue]) -> Result<&AbiValue, AbiError> {
    match values {
        [value] => Ok(value),
        _ => Err(AbiError::ArityMismatch {
            expected: 1,
            got: values.len(),
        }),
    }
}
