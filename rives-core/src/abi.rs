//! Minimal Solidity ABI encoder covering the types the verification call and
//! the input box entry point need.

use crate::constants::WORD_BYTES;
use crate::error::AbiError;
use crate::ids::{decode_hex, keccak256};

const ADDRESS_BYTES: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Address([u8; ADDRESS_BYTES]),
    /// `bytesN` with N <= 32, right-padded with zeros.
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    Int(i128),
    Uint(u128),
    Array(Vec<Token>),
}

impl Token {
    pub fn address_from_hex(value: &str) -> Result<Self, AbiError> {
        let bytes = decode_hex("address", value).map_err(|_| AbiError::InvalidAddress {
            value: value.to_string(),
        })?;
        let address: [u8; ADDRESS_BYTES] =
            bytes.try_into().map_err(|_| AbiError::InvalidAddress {
                value: value.to_string(),
            })?;
        Ok(Self::Address(address))
    }

    pub fn fixed_bytes_from_hex(field: &'static str, value: &str) -> Result<Self, AbiError> {
        let bytes = decode_hex(field, value)?;
        if bytes.len() > WORD_BYTES {
            return Err(AbiError::FixedBytesTooLong {
                field,
                len: bytes.len(),
            });
        }
        Ok(Self::FixedBytes(bytes))
    }

    fn is_dynamic(&self) -> bool {
        matches!(self, Self::Bytes(_) | Self::Array(_))
    }
}

pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encodes `tokens` as the components of a tuple (head/tail layout).
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD_BYTES;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
            encode_dynamic(token, &mut tail);
        } else {
            encode_static(token, &mut head);
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Selector of `signature` followed by the encoded arguments.
pub fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut out = function_selector(signature).to_vec();
    out.extend_from_slice(&encode(tokens));
    out
}

fn encode_static(token: &Token, out: &mut Vec<u8>) {
    match token {
        Token::Address(address) => {
            out.extend_from_slice(&[0u8; WORD_BYTES - ADDRESS_BYTES]);
            out.extend_from_slice(address);
        }
        Token::FixedBytes(bytes) => {
            out.extend_from_slice(bytes);
            out.resize(out.len() + WORD_BYTES - bytes.len(), 0);
        }
        Token::Int(value) => out.extend_from_slice(&int_word(*value)),
        Token::Uint(value) => out.extend_from_slice(&uint_word(*value)),
        Token::Bytes(_) | Token::Array(_) => unreachable!("dynamic token in static position"),
    }
}

fn encode_dynamic(token: &Token, out: &mut Vec<u8>) {
    match token {
        Token::Bytes(bytes) => {
            out.extend_from_slice(&uint_word(bytes.len() as u128));
            out.extend_from_slice(bytes);
            out.resize(out.len() + padding_for(bytes.len()), 0);
        }
        Token::Array(items) => {
            out.extend_from_slice(&uint_word(items.len() as u128));
            out.extend_from_slice(&encode(items));
        }
        _ => encode_static(token, out),
    }
}

fn padding_for(len: usize) -> usize {
    (WORD_BYTES - len % WORD_BYTES) % WORD_BYTES
}

fn uint_word(value: u128) -> [u8; WORD_BYTES] {
    let mut word = [0u8; WORD_BYTES];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn int_word(value: i128) -> [u8; WORD_BYTES] {
    let fill = if value < 0 { 0xff } else { 0x00 };
    let mut word = [fill; WORD_BYTES];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}
