//! Hashing and encoding primitives shared with the organization contracts.
//!
//! - **Keccak-256** for selectors and action ids (same as the EVM)
//! - **ABI encoding** of parameter tuples, byte-compatible with `abi.encode`
//! - **Action identity**: `keccak256(abi.encode(uint16 lawId, bytes callData, uint256 nonce))`

pub mod abi;
pub mod action;
pub mod hash;

pub use abi::{decode, encode, encode_call, encode_law_input, AbiError, AbiType, AbiValue};
pub use action::{action_id, hash_action};
pub use hash::{keccak256, selector};
