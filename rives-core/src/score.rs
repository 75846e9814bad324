use crate::constants::OUTCARD_JSON_MARKER;
use crate::error::ScoreError;
use crate::expr::{self, Value};

pub type Score = i128;

/// Scores an outcard with a rule's score function.
///
/// Outcards without the `JSON` marker score 0 and the expression is never
/// looked at. A blank expression also scores 0. Malformed expressions,
/// malformed JSON and failed evaluations are errors.
pub fn calculate_score(score_function: &str, outcard: &[u8]) -> Result<Score, ScoreError> {
    let Some(document) = outcard.strip_prefix(OUTCARD_JSON_MARKER.as_slice()) else {
        return Ok(0);
    };

    let Some(expression) = expr::parse(score_function).map_err(|err| ScoreError::Expression {
        position: err.position,
        message: err.message,
    })?
    else {
        return Ok(0);
    };

    let bindings: serde_json::Value =
        serde_json::from_slice(document).map_err(|err| ScoreError::Outcard {
            message: err.to_string(),
        })?;

    let value = expr::evaluate(&expression, &bindings).map_err(|err| ScoreError::Evaluation {
        message: err.message,
    })?;

    match value {
        Value::Number(n) => to_integer(n),
        Value::Bool(b) => Ok(Score::from(b)),
        other => Err(ScoreError::Evaluation {
            message: format!("score function produced a non-numeric value: {other:?}"),
        }),
    }
}

fn to_integer(value: f64) -> Result<Score, ScoreError> {
    // i128::MAX as f64 rounds up to 2^127, which is itself out of range.
    const LIMIT: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;
    if !value.is_finite() || value.fract() != 0.0 || value >= LIMIT || value < -LIMIT {
        return Err(ScoreError::NotAnInteger { value });
    }
    Ok(value as Score)
}
