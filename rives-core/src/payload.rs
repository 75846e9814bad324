use crate::abi::{encode_call, Token};
use crate::constants::verification_signature;
use crate::error::PayloadError;
use crate::ids::{pad_rule_id_to_word, strip_hex_prefix, to_hex_prefixed};
use crate::score::calculate_score;
use crate::types::{GameplayResult, Rule};

/// Call-data asserting a gameplay outcome. Empty means "nothing to submit".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationPayload(Vec<u8>);

impl VerificationPayload {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn to_hex(&self) -> String {
        to_hex_prefixed(&self.0)
    }
}

impl From<Vec<u8>> for VerificationPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Builds the `register_external_verification` payload for a finished run.
///
/// Returns the empty payload when the emulator did not finish or no rule is
/// loaded. The proof list and extra data are always empty.
pub fn process_gameplay(
    rule: Option<&Rule>,
    gameplay: &GameplayResult,
) -> Result<VerificationPayload, PayloadError> {
    if !gameplay.rivemu_on_finish {
        return Ok(VerificationPayload::empty());
    }
    let Some(rule) = rule else {
        return Ok(VerificationPayload::empty());
    };

    let score = calculate_score(&rule.score_function, &gameplay.outcard)?;

    let tokens = [
        Token::fixed_bytes_from_hex("rule_id", &pad_rule_id_to_word(&rule.id))?,
        Token::fixed_bytes_from_hex(
            "outhash",
            &format!("0x{}", strip_hex_prefix(&gameplay.outhash)),
        )?,
        Token::Bytes(gameplay.tape.clone()),
        Token::Int(score),
        Token::Array(Vec::new()),
        Token::Bytes(Vec::new()),
    ];

    Ok(VerificationPayload(encode_call(&verification_signature(), &tokens)))
}
