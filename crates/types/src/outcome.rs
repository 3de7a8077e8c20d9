//! Outcomes reported back to the oracle after each executed command

use crate::command::{CommandKind, Header, Lane};
use crate::method::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request as it actually left the client, after target rewriting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub headers: Vec<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Body decoded as JSON, when it is JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
}

/// One archived request/response transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub request: RecordedRequest,
    pub response: RecordedResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub kind: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lane: Option<Lane>,
    pub elapsed_micros: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl Outcome {
    pub fn request(lane: Lane, elapsed_micros: u64, result: Result<Evidence, String>) -> Self {
        let (evidence, failure_reason) = match result {
            Ok(evidence) => (Some(evidence), None),
            Err(reason) => (None, Some(reason)),
        };
        Self {
            kind: CommandKind::Req,
            lane: Some(lane),
            elapsed_micros,
            evidence,
            failure_reason,
        }
    }

    pub fn hook(kind: CommandKind, elapsed_micros: u64, failure_reason: Option<String>) -> Self {
        Self {
            kind,
            lane: None,
            elapsed_micros,
            evidence: None,
            failure_reason,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure_reason.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_request_outcome_wire_form() {
        let lane = Lane {
            test_index: 1,
            request_index: 2,
        };
        let outcome = Outcome::request(lane, 1500, Err("connection refused".into()));
        assert!(outcome.is_failure());
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "kind": "req",
                "lane": {"testIndex": 1, "requestIndex": 2},
                "elapsedMicros": 1500,
                "failureReason": "connection refused"
            })
        );
    }

    #[test]
    fn test_hook_outcome_wire_form() {
        let outcome = Outcome::hook(CommandKind::Reset, 42, None);
        assert!(!outcome.is_failure());
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"kind": "reset", "elapsedMicros": 42})
        );
    }
}
