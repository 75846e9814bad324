//! RIVES arcade core - pure logic for gameplay verification payloads.
//!
//! Everything in this crate is deterministic and I/O free: identifier
//! derivation, score evaluation over outcards, ABI call-data encoding and
//! emulator URL assembly. Network and wallet access live in the `host` crate.

pub mod abi;
pub mod constants;
pub mod emulator;
pub mod error;
pub mod expr;
pub mod ids;
pub mod payload;
pub mod score;
pub mod types;

pub use emulator::{build_emulator_url, EmulatorParams, EmulatorUrls};
pub use error::{AbiError, PayloadError, ScoreError};
pub use ids::{
    derive_entropy, derive_tape_id, pad_rule_id_to_word, rule_id_from_identifier, truncate_hash,
};
pub use payload::{process_gameplay, VerificationPayload};
pub use score::{calculate_score, Score};
pub use types::{GameplayResult, Rule, RulesOutput};
