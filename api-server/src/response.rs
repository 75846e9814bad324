use actix_web::{http::StatusCode, HttpResponse};

/// Machine-readable failure reasons, each with a fixed HTTP status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    Unauthorized,
    InvalidBase64,
    TapeTooLarge,
    TapeIdRequired,
    RuleNotFound,
    RuleFetchFailed,
    ScoreFailed,
    InvalidGameplay,
    SubmissionInFlight,
    WalletUnavailable,
    SubmissionFailed,
}

impl ErrorCode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::InvalidBase64 => "invalid_base64",
            Self::TapeTooLarge => "tape_too_large",
            Self::TapeIdRequired => "tape_id_required",
            Self::RuleNotFound => "rule_not_found",
            Self::RuleFetchFailed => "rule_fetch_failed",
            Self::ScoreFailed => "score_failed",
            Self::InvalidGameplay => "invalid_gameplay",
            Self::SubmissionInFlight => "submission_in_flight",
            Self::WalletUnavailable => "wallet_unavailable",
            Self::SubmissionFailed => "submission_failed",
        }
    }

    pub(crate) fn status(self) -> StatusCode {
        match self {
            Self::InvalidBase64 | Self::TapeTooLarge | Self::TapeIdRequired => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RuleNotFound => StatusCode::NOT_FOUND,
            Self::ScoreFailed | Self::InvalidGameplay => StatusCode::UNPROCESSABLE_ENTITY,
            Self::SubmissionInFlight | Self::WalletUnavailable => StatusCode::CONFLICT,
            Self::RuleFetchFailed | Self::SubmissionFailed => StatusCode::BAD_GATEWAY,
        }
    }
}

pub(crate) fn json_error(code: ErrorCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(code.status()).json(serde_json::json!({
        "success": false,
        "error": message.into(),
        "error_code": code.as_str(),
    }))
}
