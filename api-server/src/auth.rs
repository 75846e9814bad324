//! Shared-secret check for the routes that make the wallet sign.

use actix_web::http::header::{HeaderMap, AUTHORIZATION};

const API_KEY_HEADER: &str = "x-api-key";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let (scheme, token) = header_value(headers, AUTHORIZATION.as_str())?.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Every request passes when no key is configured. Otherwise the key must
/// arrive as `x-api-key` or as an `Authorization: Bearer` token.
pub(crate) fn is_request_authorized(headers: &HeaderMap, api_key: Option<&str>) -> bool {
    let Some(api_key) = api_key else {
        return true;
    };
    [header_value(headers, API_KEY_HEADER), bearer_token(headers)]
        .into_iter()
        .flatten()
        .any(|presented| presented == api_key)
}
