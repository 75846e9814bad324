use actix_web::{
    web::{Data, Json, Path, Query},
    HttpRequest, HttpResponse, Responder,
};
use host::{ArcadeError, FetchError, WalletError};
use rives_arcade_core::{process_gameplay, PayloadError, Rule};

use crate::auth::is_request_authorized;
use crate::config::AppState;
use crate::response::{json_error, ErrorCode};
use crate::types::{
    FinishedResponse, GameplayMessage, HealthResponse, PayloadRequest, PayloadResponse,
    ReplayQuery, RuleResponse, SessionResponse, SetupResponse, UrlResponse,
};

pub(crate) async fn health(state: Data<AppState>) -> impl Responder {
    let config = state.arcade.config();
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        service: "rives-arcade-api",
        node_url: config.node_url.clone(),
        chain_id: config.chain_id,
        wallet_configured: state.arcade.wallet().wallet().is_some(),
        contest_id: config.contest_id.clone(),
        max_tape_bytes: state.max_tape_bytes,
    })
}

pub(crate) async fn play_url(state: Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(UrlResponse {
        success: true,
        url: state.arcade.play_url(),
    })
}

pub(crate) async fn replay_url(
    state: Data<AppState>,
    query: Query<ReplayQuery>,
) -> impl Responder {
    let tape_id = query
        .tape_id
        .as_deref()
        .or(state.arcade.config().tape_id.as_deref());
    let Some(tape_id) = tape_id else {
        return json_error(
            ErrorCode::TapeIdRequired,
            "no tape id given and TAPE_ID is not set",
        );
    };

    HttpResponse::Ok().json(UrlResponse {
        success: true,
        url: state.arcade.replay_url_for(Some(tape_id)),
    })
}

pub(crate) async fn get_rule(state: Data<AppState>, path: Path<String>) -> impl Responder {
    let rule_id = path.into_inner();
    match fetch_rule(&state, &rule_id).await {
        Ok(rule) => HttpResponse::Ok().json(RuleResponse {
            success: true,
            rule,
        }),
        Err(response) => response,
    }
}

/// Builds the verification payload without submitting it. The rule is the
/// inline one, else `rule_id` from the node, else the loaded contest.
pub(crate) async fn gameplay_payload(
    state: Data<AppState>,
    req: Json<PayloadRequest>,
) -> impl Responder {
    let PayloadRequest {
        rule,
        rule_id,
        gameplay,
    } = req.into_inner();

    let gameplay = match gameplay.decode(state.max_tape_bytes) {
        Ok(gameplay) => gameplay,
        Err((code, msg)) => return json_error(code, msg),
    };

    let rule = match (rule, rule_id) {
        (Some(rule), _) => Some(rule),
        (None, Some(rule_id)) => match fetch_rule(&state, &rule_id).await {
            Ok(rule) => Some(rule),
            Err(response) => return response,
        },
        (None, None) => state.arcade.contest().await,
    };

    match process_gameplay(rule.as_ref(), &gameplay) {
        Ok(payload) => HttpResponse::Ok().json(PayloadResponse {
            success: true,
            empty: payload.is_empty(),
            payload: payload.to_hex(),
        }),
        Err(e) => payload_error(&e),
    }
}

pub(crate) async fn gameplay_finished(
    http: HttpRequest,
    state: Data<AppState>,
    req: Json<GameplayMessage>,
) -> impl Responder {
    if let Err(response) = authorize(&http, &state) {
        return response;
    }
    let gameplay = match req.into_inner().decode(state.max_tape_bytes) {
        Ok(gameplay) => gameplay,
        Err((code, msg)) => return json_error(code, msg),
    };

    match state.arcade.on_gameplay_finished(&gameplay).await {
        Ok(outcome) => HttpResponse::Ok().json(FinishedResponse {
            success: true,
            outcome,
        }),
        Err(ArcadeError::Payload(e)) => payload_error(&e),
        Err(e) => {
            tracing::warn!("gameplay submission rejected: {e}");
            json_error(submission_error_code(&e), e.user_message())
        }
    }
}

pub(crate) async fn session(state: Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(SessionResponse {
        success: true,
        connection: state.arcade.wallet().state().await,
    })
}

pub(crate) async fn connect_session(http: HttpRequest, state: Data<AppState>) -> impl Responder {
    if let Err(response) = authorize(&http, &state) {
        return response;
    }
    match state.arcade.setup_submit().await {
        Ok(setup) => HttpResponse::Ok().json(SetupResponse {
            success: true,
            setup,
        }),
        Err(e) => {
            tracing::error!("setup_submit failed: {e}");
            json_error(ErrorCode::RuleFetchFailed, e.user_message())
        }
    }
}

fn authorize(http: &HttpRequest, state: &AppState) -> Result<(), HttpResponse> {
    if is_request_authorized(http.headers(), state.api_key.as_deref()) {
        Ok(())
    } else {
        tracing::warn!(path = http.path(), "rejected request without a valid api key");
        Err(json_error(ErrorCode::Unauthorized, "unauthorized"))
    }
}

async fn fetch_rule(state: &AppState, rule_id: &str) -> Result<Rule, HttpResponse> {
    match state.arcade.rules().fetch_rule(rule_id).await {
        Ok(Some(rule)) => Ok(rule),
        Ok(None) => Err(json_error(
            ErrorCode::RuleNotFound,
            format!("rule not found: {rule_id}"),
        )),
        Err(e) => {
            tracing::error!(rule_id, "rule lookup failed: {e}");
            let message = match e {
                FetchError::Http(_) => "rule lookup failed",
                _ => "rule lookup returned an unreadable report",
            };
            Err(json_error(ErrorCode::RuleFetchFailed, message))
        }
    }
}

fn submission_error_code(err: &ArcadeError) -> ErrorCode {
    match err {
        ArcadeError::SubmissionInFlight => ErrorCode::SubmissionInFlight,
        ArcadeError::Wallet(
            WalletError::WalletNotFound
            | WalletError::ChainNotFound { .. }
            | WalletError::WrongChain { .. }
            | WalletError::NoConnectedWallet
            | WalletError::StaleSession
            | WalletError::NoAccounts,
        ) => ErrorCode::WalletUnavailable,
        _ => ErrorCode::SubmissionFailed,
    }
}

fn payload_error(err: &PayloadError) -> HttpResponse {
    let code = match err {
        PayloadError::Score(_) => ErrorCode::ScoreFailed,
        PayloadError::Abi(_) => ErrorCode::InvalidGameplay,
    };
    json_error(code, err.to_string())
}
