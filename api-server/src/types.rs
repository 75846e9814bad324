use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use host::{ConnectionState, SubmissionOutcome, SubmitSetup};
use rives_arcade_core::{GameplayResult, Rule};
use serde::{Deserialize, Serialize};

use crate::response::ErrorCode;

/// The emulator's finish message with its byte fields base64 encoded.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct GameplayMessage {
    #[serde(default)]
    pub(crate) outcard_b64: String,
    #[serde(default)]
    pub(crate) outhash: String,
    #[serde(default)]
    pub(crate) tape_b64: String,
    #[serde(default, rename = "rivemuOnFinish")]
    pub(crate) rivemu_on_finish: bool,
}

impl GameplayMessage {
    pub(crate) fn decode(
        self,
        max_tape_bytes: usize,
    ) -> Result<GameplayResult, (ErrorCode, String)> {
        let outcard = BASE64_STANDARD
            .decode(self.outcard_b64.as_bytes())
            .map_err(|err| (ErrorCode::InvalidBase64, format!("invalid base64 outcard: {err}")))?;
        let tape = BASE64_STANDARD
            .decode(self.tape_b64.as_bytes())
            .map_err(|err| (ErrorCode::InvalidBase64, format!("invalid base64 tape: {err}")))?;
        if tape.len() > max_tape_bytes {
            return Err((
                ErrorCode::TapeTooLarge,
                format!(
                    "tape payload too large: {} bytes (max {max_tape_bytes})",
                    tape.len()
                ),
            ));
        }

        Ok(GameplayResult {
            outcard,
            outhash: self.outhash,
            tape,
            rivemu_on_finish: self.rivemu_on_finish,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PayloadRequest {
    /// Inline rule. Takes precedence over `rule_id`.
    #[serde(default)]
    pub(crate) rule: Option<Rule>,
    #[serde(default)]
    pub(crate) rule_id: Option<String>,
    pub(crate) gameplay: GameplayMessage,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReplayQuery {
    #[serde(default)]
    pub(crate) tape_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) service: &'static str,
    pub(crate) node_url: String,
    pub(crate) chain_id: u64,
    pub(crate) wallet_configured: bool,
    pub(crate) contest_id: Option<String>,
    pub(crate) max_tape_bytes: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct UrlResponse {
    pub(crate) success: bool,
    pub(crate) url: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct RuleResponse {
    pub(crate) success: bool,
    pub(crate) rule: Rule,
}

#[derive(Debug, Serialize)]
pub(crate) struct PayloadResponse {
    pub(crate) success: bool,
    pub(crate) payload: String,
    pub(crate) empty: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct FinishedResponse {
    pub(crate) success: bool,
    pub(crate) outcome: SubmissionOutcome,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionResponse {
    pub(crate) success: bool,
    pub(crate) connection: ConnectionState,
}

#[derive(Debug, Serialize)]
pub(crate) struct SetupResponse {
    pub(crate) success: bool,
    pub(crate) setup: SubmitSetup,
}
