//! Response classification.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::transport::{RawResponse, TransportError};

/// Decoded GraphQL response body: `{data, errors?}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphResponse {
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphError>,
}

/// One application-level error entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphError {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphResponse {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Error messages joined for a single log line.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Walk a dotted path (`"projects"`, `"user.backedProjects"`) under `data`.
    pub fn data_at(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.data, |value, segment| value.get(segment))
            .filter(|value| !value.is_null())
    }

    /// Degraded payload for bodies that are not a GraphQL response.
    fn degraded(raw: &RawResponse) -> Self {
        Self {
            data: Value::Null,
            errors: vec![GraphError {
                message: format!("unexpected response (status {})", raw.status),
                path: None,
                extensions: Some(json!({ "status": raw.status, "raw": raw.body })),
            }],
        }
    }
}

/// Exactly one classification per attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(GraphResponse),
    /// Parsed, but carrying error entries. Treated as a degraded success.
    ProtocolErrors(GraphResponse),
    /// HTTP 401 / 403.
    AuthRejected { status: u16 },
    /// HTTP 429.
    RateLimited,
    /// No usable HTTP exchange: connection errors and 5xx.
    TransportFailure(String),
}

impl Outcome {
    pub fn classify(result: Result<RawResponse, TransportError>) -> Self {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => return Self::TransportFailure(e.to_string()),
        };

        match raw.status {
            401 | 403 => return Self::AuthRejected { status: raw.status },
            429 => return Self::RateLimited,
            500..=599 => return Self::TransportFailure(format!("server error {}", raw.status)),
            _ => {}
        }

        match serde_json::from_str::<GraphResponse>(&raw.body) {
            Ok(response) if response.has_errors() => Self::ProtocolErrors(response),
            Ok(response) if (200..300).contains(&raw.status) => Self::Success(response),
            _ => Self::ProtocolErrors(GraphResponse::degraded(&raw)),
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::ProtocolErrors(_) => "protocol_errors",
            Self::AuthRejected { .. } => "auth_rejected",
            Self::RateLimited => "rate_limited",
            Self::TransportFailure(_) => "transport_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(200, r#"{"data":{"me":null}}"#, "success")]
    #[case(200, r#"{"data":null,"errors":[{"message":"boom"}]}"#, "protocol_errors")]
    #[case(200, "<html>not json</html>", "protocol_errors")]
    #[case(404, r#"{"data":{}}"#, "protocol_errors")]
    #[case(401, "", "auth_rejected")]
    #[case(403, "Forbidden", "auth_rejected")]
    #[case(429, "", "rate_limited")]
    #[case(502, "Bad gateway", "transport_failure")]
    fn test_classify_status(#[case] status: u16, #[case] body: &str, #[case] expected: &str) {
        let outcome = Outcome::classify(Ok(RawResponse::new(status, body)));
        assert_eq!(outcome.label(), expected);
    }

    #[test]
    fn test_classify_connection_error() {
        let outcome = Outcome::classify(Err(TransportError::Connection("reset".into())));
        assert!(matches!(outcome, Outcome::TransportFailure(reason) if reason.contains("reset")));
    }

    #[test]
    fn test_degraded_payload_keeps_status_and_body() {
        let Outcome::ProtocolErrors(response) =
            Outcome::classify(Ok(RawResponse::new(200, "oops")))
        else {
            panic!("expected protocol errors");
        };
        let extensions = response.errors[0].extensions.as_ref().unwrap();
        assert_eq!(extensions["status"], 200);
        assert_eq!(extensions["raw"], "oops");
    }

    #[test]
    fn test_data_at_walks_dotted_path() {
        let response: GraphResponse = serde_json::from_str(
            r#"{"data":{"user":{"backedProjects":{"edges":[]}},"empty":null}}"#,
        )
        .unwrap();
        assert!(response.data_at("user.backedProjects").is_some());
        assert!(response.data_at("empty").is_none());
        assert!(response.data_at("missing.field").is_none());
    }
}
