use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use cadence_core::config::ToolsConfig;

use crate::protocol::{ErrorCode, ToolCallRequest, ToolCallResponse};

/// Which upstream serves a tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Data,
    Prompts,
}

/// Static routing table. Every tool the controller may call is listed here;
/// an unknown name never reaches the network.
pub const TOOL_ROUTES: &[(&str, Route)] = &[
    ("load_context", Route::Data),
    ("save_context", Route::Data),
    ("load_progress", Route::Data),
    ("save_progress", Route::Data),
    ("get_recent_activities", Route::Data),
    ("save_planned_sessions", Route::Data),
    ("plan_race_build", Route::Data),
    ("plan_season", Route::Data),
    ("weekly_plan", Route::Data),
    ("add_workout", Route::Data),
    ("modify_day", Route::Data),
    ("modify_week", Route::Data),
    ("link_session", Route::Data),
    ("race_plan_exists", Route::Data),
    ("load_orchestrator_prompt", Route::Prompts),
    ("load_prompt", Route::Prompts),
];

pub fn route_for(tool: &str) -> Option<Route> {
    TOOL_ROUTES.iter().find(|(name, _)| *name == tool).map(|(_, route)| *route)
}

#[derive(Debug, Error)]
pub enum ToolError {
    /// Connection failures and timeouts.
    #[error("transport error calling `{tool}`: {message}")]
    Transport { tool: String, message: String },
    /// The upstream answered, but not in the protocol shape.
    #[error("protocol error calling `{tool}`: {message}")]
    Protocol { tool: String, message: String },
    /// The tool itself reported a coded failure.
    #[error("tool `{tool}` failed with {code}: {message}")]
    Remote { tool: String, code: ErrorCode, message: String },
    #[error("tool `{0}` is not in the routing table")]
    UnknownTool(String),
    #[error("tool client configuration invalid: {0}")]
    Configuration(String),
}

impl ToolError {
    pub fn remote_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// In-process client enforcing the tool boundary. All side effects flow
/// through [`ToolClient::call`]; there is no caching and no automatic
/// retry; a caller that wants a retry issues another explicit call.
#[derive(Clone, Debug)]
pub struct ToolClient {
    http: reqwest::Client,
    data_endpoint: String,
    prompt_endpoint: String,
    timeout: Duration,
}

impl ToolClient {
    /// Fail-closed constructor: refuses to build unless both endpoints are
    /// configured, so nothing downstream can fall back to direct access.
    pub fn from_config(tools: &ToolsConfig) -> Result<Self, ToolError> {
        let data_endpoint = normalized_endpoint("tools.data_endpoint", &tools.data_endpoint)?;
        let prompt_endpoint =
            normalized_endpoint("tools.prompt_endpoint", &tools.prompt_endpoint)?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(|error| ToolError::Configuration(error.to_string()))?;

        Ok(Self {
            http,
            data_endpoint,
            prompt_endpoint,
            timeout: Duration::from_secs(tools.call_timeout_secs),
        })
    }

    pub async fn call(
        &self,
        tool: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let route = route_for(tool).ok_or_else(|| ToolError::UnknownTool(tool.to_string()))?;
        let base = match route {
            Route::Data => &self.data_endpoint,
            Route::Prompts => &self.prompt_endpoint,
        };
        let url = format!("{base}/mcp/tools/call");

        debug!(event_name = "tool.call_started", tool, route = ?route, "tool call dispatched");

        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&ToolCallRequest { tool: tool.to_string(), arguments })
            .send()
            .await
            .map_err(|error| ToolError::Transport {
                tool: tool.to_string(),
                message: error.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Transport {
                tool: tool.to_string(),
                message: format!("unexpected HTTP status {status}"),
            });
        }

        let body: ToolCallResponse =
            response.json().await.map_err(|error| ToolError::Protocol {
                tool: tool.to_string(),
                message: format!("malformed response body: {error}"),
            })?;

        match body {
            ToolCallResponse::Success { result } => {
                debug!(event_name = "tool.call_succeeded", tool, "tool call succeeded");
                Ok(result)
            }
            ToolCallResponse::Failure { error } => {
                warn!(
                    event_name = "tool.call_failed",
                    tool,
                    code = error.code.as_str(),
                    message = %error.message,
                    "tool returned an error"
                );
                Err(ToolError::Remote {
                    tool: tool.to_string(),
                    code: error.code,
                    message: error.message,
                })
            }
        }
    }
}

fn normalized_endpoint(key: &str, value: &str) -> Result<String, ToolError> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ToolError::Configuration(format!(
            "{key} is not configured; refusing to start (fail-closed)"
        )));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(ToolError::Configuration(format!("{key} must be an http(s) URL")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use cadence_core::config::ToolsConfig;

    use super::{route_for, Route, ToolClient, ToolError};

    fn tools_config(data: &str, prompts: &str) -> ToolsConfig {
        ToolsConfig {
            data_endpoint: data.to_string(),
            prompt_endpoint: prompts.to_string(),
            call_timeout_secs: 30,
        }
    }

    #[test]
    fn routing_table_covers_both_servers() {
        assert_eq!(route_for("load_context"), Some(Route::Data));
        assert_eq!(route_for("plan_race_build"), Some(Route::Data));
        assert_eq!(route_for("load_prompt"), Some(Route::Prompts));
        assert_eq!(route_for("load_orchestrator_prompt"), Some(Route::Prompts));
        assert_eq!(route_for("drop_tables"), None);
    }

    #[test]
    fn missing_data_endpoint_refuses_construction() {
        let error = ToolClient::from_config(&tools_config("", "http://127.0.0.1:8092"))
            .expect_err("must fail closed");
        assert!(matches!(error, ToolError::Configuration(_)));
    }

    #[test]
    fn missing_prompt_endpoint_refuses_construction() {
        let error = ToolClient::from_config(&tools_config("http://127.0.0.1:8091", "  "))
            .expect_err("must fail closed");
        assert!(matches!(error, ToolError::Configuration(_)));
    }

    #[test]
    fn non_http_endpoint_is_rejected() {
        let error =
            ToolClient::from_config(&tools_config("ftp://x", "http://127.0.0.1:8092"))
                .expect_err("must reject non-http scheme");
        assert!(matches!(error, ToolError::Configuration(_)));
    }

    #[tokio::test]
    async fn unknown_tool_never_reaches_the_network() {
        let client = ToolClient::from_config(&tools_config(
            "http://127.0.0.1:1",
            "http://127.0.0.1:1",
        ))
        .expect("client builds");

        let error = client
            .call("drop_tables", serde_json::json!({}))
            .await
            .expect_err("unknown tool must fail locally");
        assert!(matches!(error, ToolError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        // Port 9 (discard) is not listening in the test environment.
        let client = ToolClient::from_config(&tools_config(
            "http://127.0.0.1:9",
            "http://127.0.0.1:9",
        ))
        .expect("client builds");

        let error = client
            .call("load_context", serde_json::json!({"conversation_id": "c-1"}))
            .await
            .expect_err("nothing is listening");
        assert!(matches!(error, ToolError::Transport { .. }));
    }
}
