// Identifier widths
pub const RULE_ID_BYTES: usize = 20;
pub const TRUNCATED_TAPE_ID_BYTES: usize = 12;
pub const WORD_BYTES: usize = 32;

/// Outcards starting with this marker carry a JSON document after it.
pub const OUTCARD_JSON_MARKER: &[u8; 4] = b"JSON";

// Verification call routed through the rives dapp
pub const VERIFICATION_FUNCTION_NAME: &str = "core.register_external_verification";
pub const VERIFICATION_PARAMETERS: &str = "bytes32,bytes32,bytes,int,bytes32[],bytes";

// World input box entry point
pub const ADD_INPUT_SIGNATURE: &str = "addInput(address,bytes)";

// Emulator defaults
pub const EMULATOR_LIGHT_LEVEL: u32 = 100;

pub fn verification_signature() -> String {
    format!("{VERIFICATION_FUNCTION_NAME}({VERIFICATION_PARAMETERS})")
}
