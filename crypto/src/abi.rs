//! Solidity ABI encoding (`abi.encode` layout) and return decoding.
//!
//! Only the subset the organization contracts use is supported: unsigned
//! integers, addresses, booleans, `bytes32`, `bytes`, `string`, dynamic arrays
//! of those, and tuples. Encoding uses the Solidity head/tail layout, so
//! hashes computed here match hashes computed on chain.

use alloy_primitives::{Address, Bytes, B256, U256};
use powers_types::{CallData, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::hash::selector;

const WORD: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("unsupported ABI type: {0}")]
    UnsupportedType(String),

    #[error("expected {expected} values, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("invalid {ty} literal: {literal:?}")]
    InvalidLiteral { ty: String, literal: String },

    #[error("value {value} does not fit in {ty}")]
    OutOfRange { ty: String, value: String },

    #[error("return data truncated: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },

    #[error("cannot decode dynamic return type {0}")]
    DynamicReturn(String),

    #[error("expected {expected} value, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    CallData(#[from] TypesError),
}

/// A parsed ABI type name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbiType {
    Uint(u16),
    Address,
    Bool,
    Bytes32,
    Bytes,
    String,
    Array(Box<AbiType>),
}

impl AbiType {
    /// Parse a canonical Solidity type name such as `uint48` or `address[]`.
    pub fn parse(name: &str) -> Result<Self, AbiError> {
        let name = name.trim();
        if let Some(inner) = name.strip_suffix("[]") {
            let inner = Self::parse(inner)?;
            if matches!(inner, Self::Array(_)) {
                return Err(AbiError::UnsupportedType(name.to_string()));
            }
            return Ok(Self::Array(Box::new(inner)));
        }
        match name {
            "address" => Ok(Self::Address),
            "bool" => Ok(Self::Bool),
            "bytes32" => Ok(Self::Bytes32),
            "bytes" => Ok(Self::Bytes),
            "string" => Ok(Self::String),
            "uint" => Ok(Self::Uint(256)),
            other => {
                let bits = other
                    .strip_prefix("uint")
                    .and_then(|b| b.parse::<u16>().ok())
                    .filter(|b| *b >= 8 && *b <= 256 && b % 8 == 0)
                    .ok_or_else(|| AbiError::UnsupportedType(other.to_string()))?;
                Ok(Self::Uint(bits))
            }
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Bytes | Self::String | Self::Array(_))
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint(bits) => write!(f, "uint{bits}"),
            Self::Address => f.write_str("address"),
            Self::Bool => f.write_str("bool"),
            Self::Bytes32 => f.write_str("bytes32"),
            Self::Bytes => f.write_str("bytes"),
            Self::String => f.write_str("string"),
            Self::Array(inner) => write!(f, "{inner}[]"),
        }
    }
}

/// A typed ABI value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AbiValue {
    Uint(U256),
    Address(Address),
    Bool(bool),
    Bytes32(B256),
    Bytes(Bytes),
    String(String),
    Array(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    pub fn uint(value: u64) -> Self {
        Self::Uint(U256::from(value))
    }

    /// Parse a CLI/form literal as a value of type `ty`.
    ///
    /// Arrays are written `[a,b,c]`.
    pub fn parse(ty: &AbiType, literal: &str) -> Result<Self, AbiError> {
        let literal = literal.trim();
        let invalid = || AbiError::InvalidLiteral {
            ty: ty.to_string(),
            literal: literal.to_string(),
        };
        match ty {
            AbiType::Uint(bits) => {
                let value = U256::from_str(literal).map_err(|_| invalid())?;
                if *bits < 256 && value.bit_len() > *bits as usize {
                    return Err(AbiError::OutOfRange {
                        ty: ty.to_string(),
                        value: value.to_string(),
                    });
                }
                Ok(Self::Uint(value))
            }
            AbiType::Address => Address::from_str(literal)
                .map(Self::Address)
                .map_err(|_| invalid()),
            AbiType::Bool => match literal {
                "true" => Ok(Self::Bool(true)),
                "false" => Ok(Self::Bool(false)),
                _ => Err(invalid()),
            },
            AbiType::Bytes32 => B256::from_str(literal)
                .map(Self::Bytes32)
                .map_err(|_| invalid()),
            AbiType::Bytes => Bytes::from_str(literal)
                .map(Self::Bytes)
                .map_err(|_| invalid()),
            AbiType::String => Ok(Self::String(literal.to_string())),
            AbiType::Array(inner) => {
                let body = literal
                    .strip_prefix('[')
                    .and_then(|s| s.strip_suffix(']'))
                    .ok_or_else(invalid)?;
                if body.trim().is_empty() {
                    return Ok(Self::Array(Vec::new()));
                }
                body.split(',')
                    .map(|item| Self::parse(inner, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::Array)
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Uint(_) => "uint",
            Self::Address(_) => "address",
            Self::Bool(_) => "bool",
            Self::Bytes32(_) => "bytes32",
            Self::Bytes(_) => "bytes",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Tuple(_) => "tuple",
        }
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::Bytes(_) | Self::String(_) | Self::Array(_) => true,
            Self::Tuple(items) => items.iter().any(Self::is_dynamic),
            _ => false,
        }
    }

    pub fn as_uint(&self) -> Result<U256, AbiError> {
        match self {
            Self::Uint(v) => Ok(*v),
            other => Err(AbiError::TypeMismatch {
                expected: "uint",
                found: other.kind(),
            }),
        }
    }

    /// Narrow a `uint` to `u64`, failing on overflow.
    pub fn as_u64(&self) -> Result<u64, AbiError> {
        let value = self.as_uint()?;
        u64::try_from(value).map_err(|_| AbiError::OutOfRange {
            ty: "uint64".to_string(),
            value: value.to_string(),
        })
    }

    pub fn as_bool(&self) -> Result<bool, AbiError> {
        match self {
            Self::Bool(v) => Ok(*v),
            other => Err(AbiError::TypeMismatch {
                expected: "bool",
                found: other.kind(),
            }),
        }
    }

    pub fn as_address(&self) -> Result<Address, AbiError> {
        match self {
            Self::Address(v) => Ok(*v),
            other => Err(AbiError::TypeMismatch {
                expected: "address",
                found: other.kind(),
            }),
        }
    }

    pub fn as_str(&self) -> Result<&str, AbiError> {
        match self {
            Self::String(v) => Ok(v),
            other => Err(AbiError::TypeMismatch {
                expected: "string",
                found: other.kind(),
            }),
        }
    }

    fn head_len(&self) -> usize {
        match self {
            Self::Tuple(items) if !self.is_dynamic() => items.iter().map(Self::head_len).sum(),
            _ => WORD,
        }
    }
}

/// `abi.encode(values...)`.
pub fn encode(values: &[AbiValue]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_tuple(values, &mut out);
    out
}

/// Selector followed by the encoded arguments, as sent in a transaction's `data`.
pub fn encode_call(signature: &str, args: &[AbiValue]) -> Vec<u8> {
    let mut out = selector(signature).to_vec();
    encode_tuple(args, &mut out);
    out
}

/// Encode law input from its declared parameter types and string arguments.
pub fn encode_law_input(params: &[String], args: &[String]) -> Result<CallData, AbiError> {
    if params.len() != args.len() {
        return Err(AbiError::ArityMismatch {
            expected: params.len(),
            got: args.len(),
        });
    }
    let values = params
        .iter()
        .zip(args)
        .map(|(ty, arg)| AbiValue::parse(&AbiType::parse(ty)?, arg))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CallData::from_bytes(encode(&values))?)
}

fn encode_tuple(values: &[AbiValue], out: &mut Vec<u8>) {
    let heads_len: usize = values.iter().map(AbiValue::head_len).sum();
    let mut head = Vec::with_capacity(heads_len);
    let mut tail = Vec::new();
    for value in values {
        if value.is_dynamic() {
            push_word(&mut head, U256::from(heads_len + tail.len()));
            encode_value(value, &mut tail);
        } else {
            encode_value(value, &mut head);
        }
    }
    out.extend_from_slice(&head);
    out.extend_from_slice(&tail);
}

fn encode_value(value: &AbiValue, out: &mut Vec<u8>) {
    match value {
        AbiValue::Uint(v) => push_word(out, *v),
        AbiValue::Address(a) => {
            out.extend_from_slice(&[0u8; 12]);
            out.extend_from_slice(a.as_slice());
        }
        AbiValue::Bool(b) => push_word(out, U256::from(*b as u8)),
        AbiValue::Bytes32(b) => out.extend_from_slice(b.as_slice()),
        AbiValue::Bytes(b) => push_packed(out, b),
        AbiValue::String(s) => push_packed(out, s.as_bytes()),
        AbiValue::Array(items) => {
            push_word(out, U256::from(items.len()));
            encode_tuple(items, out);
        }
        AbiValue::Tuple(items) => encode_tuple(items, out),
    }
}

fn push_word(out: &mut Vec<u8>, value: U256) {
    out.extend_from_slice(&value.to_be_bytes::<32>());
}

/// Length word, then the bytes right-padded to a word boundary.
fn push_packed(out: &mut Vec<u8>, bytes: &[u8]) {
    push_word(out, U256::from(bytes.len()));
    out.extend_from_slice(bytes);
    let rem = bytes.len() % WORD;
    if rem != 0 {
        out.resize(out.len() + WORD - rem, 0);
    }
}

/// Decode a tuple of return values.
///
/// Static types and top-level `bytes`/`string` are supported; dynamic arrays
/// are not.
pub fn decode(types: &[AbiType], data: &[u8]) -> Result<Vec<AbiValue>, AbiError> {
    let needed = types.len() * WORD;
    if data.len() < needed {
        return Err(AbiError::Truncated {
            needed,
            have: data.len(),
        });
    }
    types
        .iter()
        .zip(data.chunks_exact(WORD))
        .map(|(ty, word)| match ty {
            AbiType::Uint(_) => Ok(AbiValue::Uint(U256::from_be_slice(word))),
            AbiType::Address => Ok(AbiValue::Address(Address::from_slice(&word[12..]))),
            AbiType::Bool => Ok(AbiValue::Bool(word.iter().any(|b| *b != 0))),
            AbiType::Bytes32 => Ok(AbiValue::Bytes32(B256::from_slice(word))),
            AbiType::Bytes => decode_packed(data, word).map(|b| AbiValue::Bytes(Bytes::from(b))),
            AbiType::String => decode_packed(data, word).and_then(|b| {
                String::from_utf8(b).map_err(|e| AbiError::InvalidLiteral {
                    ty: "string".to_string(),
                    literal: e.to_string(),
                })
            })
            .map(AbiValue::String),
            array => Err(AbiError::DynamicReturn(array.to_string())),
        })
        .collect()
}

/// Follow a head offset to a length-prefixed tail.
fn decode_packed(data: &[u8], head: &[u8]) -> Result<Vec<u8>, AbiError> {
    let offset = word_to_usize(head)?;
    let start = offset.checked_add(WORD).ok_or(AbiError::Truncated {
        needed: usize::MAX,
        have: data.len(),
    })?;
    let len_word = data.get(offset..start).ok_or(AbiError::Truncated {
        needed: start,
        have: data.len(),
    })?;
    let len = word_to_usize(len_word)?;
    let end = start.saturating_add(len);
    data.get(start..end)
        .map(<[u8]>::to_vec)
        .ok_or(AbiError::Truncated {
            needed: end,
            have: data.len(),
        })
}

fn word_to_usize(word: &[u8]) -> Result<usize, AbiError> {
    let value = U256::from_be_slice(word);
    usize::try_from(value).map_err(|_| AbiError::OutOfRange {
        ty: "usize".to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(n: u64) -> [u8; 32] {
        U256::from(n).to_be_bytes::<32>()
    }

    #[test]
    fn parses_type_names() {
        assert_eq!(AbiType::parse("uint48").unwrap(), AbiType::Uint(48));
        assert_eq!(AbiType::parse("uint").unwrap(), AbiType::Uint(256));
        assert_eq!(
            AbiType::parse("address[]").unwrap(),
            AbiType::Array(Box::new(AbiType::Address))
        );
        assert!(AbiType::parse("uint7").is_err());
        assert!(AbiType::parse("int256").is_err());
        assert!(AbiType::parse("uint256[][]").is_err());
        assert_eq!(AbiType::parse("address[]").unwrap().to_string(), "address[]");
    }

    #[test]
    fn static_values_are_one_word_each() {
        let encoded = encode(&[
            AbiValue::uint(7),
            AbiValue::Bool(true),
            AbiValue::Address(Address::repeat_byte(0x11)),
        ]);
        assert_eq!(encoded.len(), 96);
        assert_eq!(&encoded[..32], &word(7));
        assert_eq!(&encoded[32..64], &word(1));
        assert_eq!(&encoded[64..76], &[0u8; 12]);
        assert_eq!(&encoded[76..96], &[0x11u8; 20]);
    }

    #[test]
    fn dynamic_bytes_use_offset_and_padding() {
        let encoded = encode(&[
            AbiValue::uint(1),
            AbiValue::Bytes(Bytes::from(vec![0xaa; 3])),
            AbiValue::uint(42),
        ]);
        // head: 3 words, tail: length word + one padded word
        assert_eq!(encoded.len(), 5 * 32);
        assert_eq!(&encoded[32..64], &word(0x60));
        assert_eq!(&encoded[64..96], &word(42));
        assert_eq!(&encoded[96..128], &word(3));
        assert_eq!(&encoded[128..131], &[0xaa; 3]);
        assert!(encoded[131..].iter().all(|b| *b == 0));
    }

    #[test]
    fn second_dynamic_offset_skips_first_tail() {
        let encoded = encode(&[
            AbiValue::String("hi".into()),
            AbiValue::Array(vec![AbiValue::uint(5), AbiValue::uint(6)]),
        ]);
        assert_eq!(&encoded[..32], &word(0x40));
        // first tail = length word + one data word
        assert_eq!(&encoded[32..64], &word(0x80));
        assert_eq!(&encoded[0x80..0xa0], &word(2));
        assert_eq!(&encoded[0xa0..0xc0], &word(5));
        assert_eq!(&encoded[0xc0..0xe0], &word(6));
    }

    #[test]
    fn encode_call_prefixes_selector() {
        let data = encode_call(
            "transferOwnership(address)",
            &[AbiValue::Address(Address::repeat_byte(1))],
        );
        assert_eq!(&data[..4], &[0xf2, 0xfd, 0xe3, 0x8b]);
        assert_eq!(data.len(), 36);
    }

    #[test]
    fn literal_parsing() {
        assert_eq!(
            AbiValue::parse(&AbiType::Uint(256), "0x10").unwrap(),
            AbiValue::uint(16)
        );
        assert!(matches!(
            AbiValue::parse(&AbiType::Uint(8), "256"),
            Err(AbiError::OutOfRange { .. })
        ));
        assert!(AbiValue::parse(&AbiType::Bool, "yes").is_err());
        let arr = AbiValue::parse(&AbiType::Array(Box::new(AbiType::Uint(256))), "[1, 2,3]").unwrap();
        assert_eq!(
            arr,
            AbiValue::Array(vec![AbiValue::uint(1), AbiValue::uint(2), AbiValue::uint(3)])
        );
        assert_eq!(
            AbiValue::parse(&AbiType::Array(Box::new(AbiType::Address)), "[]").unwrap(),
            AbiValue::Array(Vec::new())
        );
    }

    #[test]
    fn law_input_is_canonical_calldata() {
        let params = vec!["address".to_string(), "uint256".to_string()];
        let args = vec![
            "0x0000000000000000000000000000000000000001".to_string(),
            "5".to_string(),
        ];
        let data = encode_law_input(&params, &args).unwrap();
        assert_eq!(data.len(), 64);
        assert_eq!(&data.as_bytes()[32..], &word(5));
    }

    #[test]
    fn law_input_arity_is_checked() {
        let err = encode_law_input(&["bool".to_string()], &[]).unwrap_err();
        assert_eq!(err, AbiError::ArityMismatch { expected: 1, got: 0 });
    }

    #[test]
    fn decodes_static_words() {
        let mut data = Vec::new();
        data.extend_from_slice(&word(6));
        data.extend_from_slice(&word(1));
        let mut addr = [0u8; 32];
        addr[12..].copy_from_slice(&[0x22; 20]);
        data.extend_from_slice(&addr);
        let values =
            decode(&[AbiType::Uint(8), AbiType::Bool, AbiType::Address], &data).unwrap();
        assert_eq!(values[0].as_u64().unwrap(), 6);
        assert!(values[1].as_bool().unwrap());
        assert_eq!(values[2].as_address().unwrap(), Address::repeat_byte(0x22));
    }

    #[test]
    fn decodes_string_return() {
        let encoded = encode(&[AbiValue::String("Powers DAO".into()), AbiValue::uint(3)]);
        let values = decode(&[AbiType::String, AbiType::Uint(16)], &encoded).unwrap();
        assert_eq!(values[0], AbiValue::String("Powers DAO".into()));
        assert_eq!(values[1].as_u64().unwrap(), 3);
    }

    #[test]
    fn decode_rejects_short_and_arrays() {
        assert!(matches!(
            decode(&[AbiType::Uint(256)], &[0u8; 31]),
            Err(AbiError::Truncated { needed: 32, have: 31 })
        ));
        assert!(matches!(
            decode(&[AbiType::Array(Box::new(AbiType::Uint(256)))], &[0u8; 32]),
            Err(AbiError::DynamicReturn(_))
        ));
    }

    #[test]
    fn decode_rejects_offset_past_end() {
        let mut data = U256::from(0x40u64).to_be_bytes::<32>().to_vec();
        data.extend_from_slice(&[0u8; 32]);
        assert!(matches!(
            decode(&[AbiType::Bytes], &data),
            Err(AbiError::Truncated { .. })
        ));
    }

    #[test]
    fn accessor_type_mismatch() {
        assert!(matches!(
            AbiValue::Bool(true).as_uint(),
            Err(AbiError::TypeMismatch { expected: "uint", found: "bool" })
        ));
    }
}
