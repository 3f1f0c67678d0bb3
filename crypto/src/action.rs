//! Action identity.
//!
//! The organization contract derives an action's id as
//! `uint256(keccak256(abi.encode(uint16 lawId, bytes callData, uint256 nonce)))`.
//! Ids computed here must agree with it byte for byte, otherwise the client
//! would look up the wrong action record.

use alloy_primitives::{Bytes, U256};
use powers_types::{Action, ActionId, CallData, LawId};

use crate::abi::{encode, AbiValue};
use crate::hash::keccak256;

/// Compute the id of `(law_id, call_data, nonce)`.
pub fn hash_action(law_id: LawId, call_data: &CallData, nonce: U256) -> ActionId {
    let encoded = encode(&[
        AbiValue::Uint(U256::from(law_id.get())),
        AbiValue::Bytes(Bytes::copy_from_slice(call_data.as_bytes())),
        AbiValue::Uint(nonce),
    ]);
    ActionId::from_be_bytes(keccak256(&encoded))
}

pub fn action_id(action: &Action) -> ActionId {
    hash_action(action.law_id, &action.call_data, action.nonce)
}
