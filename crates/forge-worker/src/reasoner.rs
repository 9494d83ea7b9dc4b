//! HTTP transport to the reasoning collaborator
//!
//! Each invocation is stateless: the full phase-scoped context travels with
//! every request, and the service answers with the next batch of tool calls.
//! Rate limits are honored in here (retry-after aware); other transport
//! failures surface as transient errors for the orchestrator's retry policy.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use forge_core::{
    ApprovalState, ForgeError, HistoryEntry, Phase, Plan, Result, ToolCall, ToolResult,
};
use forge_orchestrator::{Reasoner, ReasonerTurn, TurnContext, TurnDirective};

const MAX_RATE_LIMIT_RETRIES: u32 = 5;
const INITIAL_BACKOFF_SECS: u64 = 5;
const MAX_BACKOFF_SECS: u64 = 120;

#[derive(Debug, Serialize)]
struct TurnRequest<'a> {
    session_id: &'a str,
    task: &'a str,
    phase: Phase,
    approval: ApprovalState,
    plan: &'a Option<Plan>,
    allowed_tools: &'a [&'static str],
    recent_history: &'a [HistoryEntry],
    last_results: &'a [ToolResult],
    user_input: &'a Option<String>,
}

#[derive(Debug, Deserialize)]
struct TurnResponse {
    #[serde(default)]
    calls: Vec<WireCall>,
    #[serde(default)]
    directive: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCall {
    tool: String,
    #[serde(default)]
    args: serde_json::Map<String, serde_json::Value>,
}

pub struct HttpReasoner {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpReasoner {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Reasoner for HttpReasoner {
    async fn next_turn(&self, ctx: &TurnContext) -> Result<ReasonerTurn> {
        let request = TurnRequest {
            session_id: &ctx.session_id,
            task: &ctx.task,
            phase: ctx.phase,
            approval: ctx.approval,
            plan: &ctx.plan,
            allowed_tools: &ctx.allowed_tools,
            recent_history: &ctx.recent_history,
            last_results: &ctx.last_results,
            user_input: &ctx.user_input,
        };

        let mut retries = 0u32;
        let mut backoff_secs = INITIAL_BACKOFF_SECS;
        loop {
            let response = self
                .client
                .post(&self.endpoint)
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    ForgeError::CollaboratorUnavailable(format!("Request failed: {}", e))
                })?;

            let status = response.status();
            if status.as_u16() == 429 {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ForgeError::CollaboratorUnavailable(format!(
                        "Rate limited after {} retries",
                        MAX_RATE_LIMIT_RETRIES
                    )));
                }
                let wait_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(backoff_secs);
                tracing::warn!(
                    wait_secs,
                    retry = retries,
                    "Reasoner rate limited, waiting"
                );
                tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                continue;
            }
            if !status.is_success() {
                return Err(ForgeError::CollaboratorUnavailable(format!(
                    "Reasoner returned HTTP {}",
                    status
                )));
            }

            let body: TurnResponse = response.json().await.map_err(|e| {
                ForgeError::CollaboratorUnavailable(format!("Malformed turn response: {}", e))
            })?;
            return parse_turn(body);
        }
    }
}

fn parse_turn(body: TurnResponse) -> Result<ReasonerTurn> {
    let directive = match body.directive.as_deref() {
        None => None,
        Some("request_verification") => Some(TurnDirective::RequestVerification),
        Some("verification_passed") => Some(TurnDirective::VerificationPassed),
        Some("verification_failed") => Some(TurnDirective::VerificationFailed),
        Some(other) => {
            return Err(ForgeError::Other(format!(
                "Unknown turn directive '{}'",
                other
            )));
        }
    };
    let calls = body
        .calls
        .into_iter()
        .map(|call| ToolCall {
            tool: call.tool,
            args: call.args,
        })
        .collect();
    Ok(ReasonerTurn { calls, directive })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_turn_maps_calls_and_directive() {
        let body: TurnResponse = serde_json::from_value(json!({
            "calls": [
                {"tool": "read_file", "args": {"path": "src/lib.rs"}},
                {"tool": "list_files"},
            ],
            "directive": "verification_passed",
        }))
        .unwrap();
        let turn = parse_turn(body).unwrap();
        assert_eq!(turn.calls.len(), 2);
        assert_eq!(turn.calls[0].tool, "read_file");
        assert!(turn.calls[1].args.is_empty());
        assert_eq!(turn.directive, Some(TurnDirective::VerificationPassed));
    }

    #[test]
    fn test_parse_turn_empty_response() {
        let body: TurnResponse = serde_json::from_value(json!({})).unwrap();
        let turn = parse_turn(body).unwrap();
        assert!(turn.calls.is_empty());
        assert!(turn.directive.is_none());
    }

    #[test]
    fn test_parse_turn_rejects_unknown_directive() {
        let body: TurnResponse = serde_json::from_value(json!({
            "directive": "take_a_nap",
        }))
        .unwrap();
        assert!(parse_turn(body).is_err());
    }
}
