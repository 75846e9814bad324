//! Fixed-width content identifiers derived from hashes.
//!
//! Rule ids are content hashes truncated to 20 bytes. Tape ids bind a tape to
//! its rule: the 20-byte rule id followed by the first 12 bytes of the tape's
//! keccak256. All helpers work on hex strings and tolerate a `0x` prefix.

use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

use crate::constants::{RULE_ID_BYTES, TRUNCATED_TAPE_ID_BYTES, WORD_BYTES};
use crate::error::AbiError;

const ADDRESS_HEX_LEN: usize = 42;
const RULE_ID_HEX_LEN: usize = 2 * RULE_ID_BYTES;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn strip_hex_prefix(value: &str) -> &str {
    value.strip_prefix("0x").unwrap_or(value)
}

/// `0x`-prefixed string of hex digits (the prefix is mandatory).
pub fn is_hex(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .is_some_and(|digits| digits.bytes().all(|b| b.is_ascii_hexdigit()))
}

pub fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>, AbiError> {
    hex::decode(strip_hex_prefix(value)).map_err(|_| AbiError::InvalidHex {
        field,
        value: value.to_string(),
    })
}

pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// First `n_bytes` bytes of `hash` as unprefixed hex.
pub fn truncate_hash(hash: &str, n_bytes: usize) -> String {
    strip_hex_prefix(hash).chars().take(2 * n_bytes).collect()
}

pub fn rule_id_from_identifier(id: &str) -> String {
    truncate_hash(id, RULE_ID_BYTES)
}

pub fn truncate_tape_hash(hash: &str) -> String {
    truncate_hash(hash, TRUNCATED_TAPE_ID_BYTES)
}

/// Right-pads a rule id to a full ABI word, returned `0x`-prefixed.
pub fn pad_rule_id_to_word(id: &str) -> String {
    format!(
        "0x{}{}",
        rule_id_from_identifier(id),
        "0".repeat(2 * (WORD_BYTES - RULE_ID_BYTES))
    )
}

pub fn derive_tape_id(rule_id: &str, tape: &[u8]) -> String {
    let tape_hash = hex::encode(keccak256(tape));
    format!(
        "{}{}",
        rule_id_from_identifier(rule_id),
        truncate_tape_hash(&tape_hash)
    )
}

/// Per-player, per-rule emulator seed: `sha256(address || rule_id)` over the
/// decoded bytes. Returns an empty string when either input is malformed.
pub fn derive_entropy(user_address: &str, rule_id: &str) -> String {
    if user_address.len() != ADDRESS_HEX_LEN || !is_hex(user_address) {
        return String::new();
    }
    if rule_id.len() != RULE_ID_HEX_LEN || !rule_id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return String::new();
    }

    let mut seed = Vec::with_capacity(2 * RULE_ID_BYTES);
    for part in [strip_hex_prefix(user_address), rule_id] {
        match hex::decode(part) {
            Ok(bytes) => seed.extend_from_slice(&bytes),
            Err(_) => return String::new(),
        }
    }
    hex::encode(sha256(&seed))
}
