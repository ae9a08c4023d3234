//! Prompt tool server: read-only access to prompt files under a fixed
//! root. Filenames are validated against `^[A-Za-z0-9_.-]+$`, so path
//! traversal never reaches the filesystem.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::error;

use crate::protocol::{ErrorCode, ToolCallRequest, ToolCallResponse, ToolErrorBody};

pub const ORCHESTRATOR_PROMPT_FILENAME: &str = "orchestrator.md";

pub struct PromptServerState {
    root: PathBuf,
}

impl PromptServerState {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

pub fn router(state: Arc<PromptServerState>) -> Router {
    Router::new()
        .route("/mcp/tools/call", post(call_tool))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "server": "cadence-prompt-tools"}))
}

async fn call_tool(
    State(state): State<Arc<PromptServerState>>,
    Json(request): Json<ToolCallRequest>,
) -> Json<ToolCallResponse> {
    Json(dispatch(&state, request))
}

pub fn dispatch(state: &PromptServerState, request: ToolCallRequest) -> ToolCallResponse {
    let result = match request.tool.as_str() {
        "load_orchestrator_prompt" => load_prompt_file(state, ORCHESTRATOR_PROMPT_FILENAME),
        "load_prompt" => match serde_json::from_value::<LoadPromptRequest>(request.arguments) {
            Ok(args) => load_prompt_file(state, &args.filename),
            Err(err) => Err(ToolErrorBody {
                code: ErrorCode::InvalidInput,
                message: format!("invalid arguments: {err}"),
            }),
        },
        other => Err(ToolErrorBody {
            code: ErrorCode::InvalidInput,
            message: format!("tool `{other}` is not served here"),
        }),
    };

    match result {
        Ok(value) => ToolCallResponse::success(value),
        Err(body) => {
            error!(
                event_name = "tool.request_failed",
                tool = %request.tool,
                code = body.code.as_str(),
                message = %body.message,
                "prompt tool request failed"
            );
            ToolCallResponse::Failure { error: body }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoadPromptRequest {
    filename: String,
}

fn valid_filename(filename: &str) -> bool {
    !filename.is_empty()
        && filename
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'))
}

fn load_prompt_file(
    state: &PromptServerState,
    filename: &str,
) -> Result<serde_json::Value, ToolErrorBody> {
    if !valid_filename(filename) {
        return Err(ToolErrorBody {
            code: ErrorCode::InvalidFilename,
            message: format!(
                "filename `{filename}` is not allowed; only [A-Za-z0-9_.-]+ filenames are served"
            ),
        });
    }

    let path = state.root.join(filename);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ToolErrorBody {
                code: ErrorCode::FileNotFound,
                message: format!("prompt file `{filename}` does not exist"),
            });
        }
        Err(err) => {
            return Err(ToolErrorBody {
                code: ErrorCode::ReadError,
                message: format!("could not read prompt file `{filename}`: {err}"),
            });
        }
    };

    let content = String::from_utf8(bytes).map_err(|_| ToolErrorBody {
        code: ErrorCode::EncodingError,
        message: format!("prompt file `{filename}` is not valid UTF-8"),
    })?;

    Ok(serde_json::json!({ "content": content, "filename": filename }))
}
