//! Rule metadata from the rives node inspect endpoint.

use rives_arcade_core::ids::strip_hex_prefix;
use rives_arcade_core::{Rule, RulesOutput};
use serde::Deserialize;

const ACCEPTED: &str = "Accepted";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("rule request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("report payload is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("report payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("report payload is not a rules document: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspectResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub reports: Vec<InspectReport>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspectReport {
    pub payload: String,
}

#[derive(Clone)]
pub struct RuleFetcher {
    http: reqwest::Client,
    node_url: String,
}

impl RuleFetcher {
    pub fn new(node_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), node_url)
    }

    pub fn with_client(http: reqwest::Client, node_url: impl Into<String>) -> Self {
        Self {
            http,
            node_url: node_url.into(),
        }
    }

    pub fn rules_url(&self, rule_id: &str) -> String {
        format!(
            "{}/inspect/core/rules?id={rule_id}",
            self.node_url.trim_end_matches('/')
        )
    }

    /// Single best-effort lookup. `Ok(None)` means the rule is unavailable.
    pub async fn fetch_rule(&self, rule_id: &str) -> Result<Option<Rule>, FetchError> {
        let url = self.rules_url(rule_id);
        tracing::debug!(%url, "fetching rule");

        let response: InspectResponse = self.http.get(&url).send().await?.json().await?;
        let rule = decode_rules_response(&response)?;
        if rule.is_none() {
            tracing::warn!(rule_id, status = %response.status, "rule unavailable");
        }
        Ok(rule)
    }
}

pub fn decode_rules_response(response: &InspectResponse) -> Result<Option<Rule>, FetchError> {
    if response.status != ACCEPTED {
        return Ok(None);
    }
    let Some(report) = response.reports.first() else {
        return Ok(None);
    };

    let bytes = hex::decode(strip_hex_prefix(&report.payload))?;
    let text = String::from_utf8(bytes)?;
    let output: RulesOutput = serde_json::from_str(&text)?;
    Ok(output.data.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(json: &str) -> InspectResponse {
        InspectResponse {
            status: ACCEPTED.to_string(),
            reports: vec![InspectReport {
                payload: format!("0x{}", hex::encode(json)),
            }],
        }
    }

    #[test]
    fn builds_inspect_url() {
        let fetcher = RuleFetcher::new("https://app.rives.io/");
        assert_eq!(
            fetcher.rules_url("abc"),
            "https://app.rives.io/inspect/core/rules?id=abc"
        );
    }

    #[test]
    fn decodes_first_rule_of_first_report() {
        let response = report(
            r#"{"data":[{"id":"r1","score_function":"score"},{"id":"r2"}],"total":2,"page":1}"#,
        );
        let rule = decode_rules_response(&response).unwrap().unwrap();
        assert_eq!(rule.id, "r1");
        assert_eq!(rule.score_function, "score");
    }

    #[test]
    fn rejected_status_means_unavailable() {
        let mut response = report(r#"{"data":[{"id":"r1"}]}"#);
        response.status = "Rejected".to_string();
        assert!(decode_rules_response(&response).unwrap().is_none());
    }

    #[test]
    fn empty_reports_or_data_mean_unavailable() {
        let response = InspectResponse {
            status: ACCEPTED.to_string(),
            reports: vec![],
        };
        assert!(decode_rules_response(&response).unwrap().is_none());

        let response = report(r#"{"data":[],"total":0,"page":1}"#);
        assert!(decode_rules_response(&response).unwrap().is_none());
    }

    #[test]
    fn malformed_payloads_are_errors() {
        let mut response = report("{}");
        response.reports[0].payload = "0xzz".to_string();
        assert!(matches!(
            decode_rules_response(&response),
            Err(FetchError::InvalidHex(_))
        ));

        response.reports[0].payload = "0xc328".to_string();
        assert!(matches!(
            decode_rules_response(&response),
            Err(FetchError::InvalidUtf8(_))
        ));

        let response = report("not json");
        assert!(matches!(
            decode_rules_response(&response),
            Err(FetchError::InvalidJson(_))
        ));
    }

    #[test]
    fn inspect_envelope_parses() {
        let response: InspectResponse = serde_json::from_str(
            r#"{"status":"Accepted","exception_payload":null,"reports":[{"payload":"0x7b7d"}],"processed_input_count":3}"#,
        )
        .unwrap();
        assert_eq!(response.reports.len(), 1);
        assert_eq!(decode_rules_response(&response).unwrap(), None);
    }
}
