use serde::{Deserialize, Serialize};

/// Contest rule as reported by the rives node inspect API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cartridge_id: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_index: Option<u64>,
    #[serde(default)]
    pub args: String,
    #[serde(default)]
    pub in_card: String,
    #[serde(default)]
    pub score_function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_tapes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_in_card: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_tapes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_out_cards: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tapes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivated: Option<bool>,
}

impl Rule {
    pub fn is_deactivated(&self) -> bool {
        self.deactivated.unwrap_or(false)
    }

    /// Whether `now` (unix seconds) falls inside the rule's activity window.
    /// Open-ended bounds are treated as unbounded.
    pub fn is_active_at(&self, now: u64) -> bool {
        if self.is_deactivated() {
            return false;
        }
        let started = self.start.map_or(true, |start| now >= start);
        let not_ended = self.end.map_or(true, |end| now <= end);
        started && not_ended
    }
}

/// Decoded report payload of `inspect/core/rules`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesOutput {
    #[serde(default)]
    pub data: Vec<Rule>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u64,
}

/// Message posted by the emulator when a gameplay session ends.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameplayResult {
    #[serde(default)]
    pub outcard: Vec<u8>,
    #[serde(default)]
    pub outhash: String,
    #[serde(default)]
    pub tape: Vec<u8>,
    #[serde(default, rename = "rivemuOnFinish")]
    pub rivemu_on_finish: bool,
}
