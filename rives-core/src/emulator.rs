//! Emulator iframe URL assembly.
//!
//! Fragments are appended in a fixed order:
//! `#light=100`, `cartridge`, `rule`, `simple`, `autoplay`, `replay`,
//! `fullTape`, `args`, `incard`, `entropy`, then the free-form extra
//! fragment. Absent, false or empty fields are omitted. Only `args` is
//! percent-encoded; every other value is inserted verbatim.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::constants::EMULATOR_LIGHT_LEVEL;

/// Characters `encodeURIComponent` leaves untouched.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmulatorUrls {
    pub emulator: String,
    pub cartridges: String,
    pub tapes: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmulatorParams {
    #[serde(default)]
    pub cartridge_id: Option<String>,
    #[serde(default)]
    pub rule_id: Option<String>,
    #[serde(default)]
    pub tape_id: Option<String>,
    #[serde(default)]
    pub simple: bool,
    #[serde(default)]
    pub autoplay: bool,
    #[serde(default)]
    pub replay: bool,
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default)]
    pub incard_url: Option<String>,
    #[serde(default)]
    pub entropy: Option<String>,
    #[serde(default)]
    pub extra: Option<String>,
}

pub fn encode_args(args: &str) -> String {
    utf8_percent_encode(args, URI_COMPONENT).to_string()
}

pub fn build_emulator_url(urls: &EmulatorUrls, params: &EmulatorParams) -> String {
    let mut url = format!(
        "{}/#light={EMULATOR_LIGHT_LEVEL}",
        urls.emulator.trim_end_matches('/')
    );

    if let Some(cartridge_id) = present(&params.cartridge_id) {
        url.push_str(&format!("&cartridge={}/{cartridge_id}", urls.cartridges));
    }
    if let Some(rule_id) = present(&params.rule_id) {
        url.push_str(&format!("&rule={rule_id}"));
    }
    if params.simple {
        url.push_str("&simple=true");
    }
    if params.autoplay {
        url.push_str("&autoplay=true");
    }
    if params.replay {
        url.push_str("&replay=true");
    }
    if let Some(tape_id) = present(&params.tape_id) {
        url.push_str(&format!("&fullTape={}/{tape_id}", urls.tapes));
    }
    if let Some(args) = present(&params.args) {
        url.push_str(&format!("&args={}", encode_args(args)));
    }
    if let Some(incard_url) = present(&params.incard_url) {
        url.push_str(&format!("&incard={incard_url}"));
    }
    if let Some(entropy) = present(&params.entropy) {
        url.push_str(&format!("&entropy={entropy}"));
    }
    if let Some(extra) = present(&params.extra) {
        let extra = extra.trim_start_matches('&');
        if !extra.is_empty() {
            url.push('&');
            url.push_str(extra);
        }
    }

    url
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}
