//! Conversation-store client (context, progress, summary) over the tool
//! boundary. Reads degrade to empty with a log line; writes propagate.
//! Never the other way around, and never via direct database access.

use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use cadence_core::domain::conversation::Progress;
use cadence_mcp::{ToolClient, ToolError};

#[derive(Debug)]
pub struct ConversationClient {
    tools: Arc<ToolClient>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContextMessage {
    pub role: String,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadedProgress {
    pub progress: Progress,
    pub version: i64,
}

impl ConversationClient {
    pub fn new(tools: Arc<ToolClient>) -> Self {
        Self { tools }
    }

    /// Loads recent history; a boundary failure degrades to empty history.
    pub async fn load_context(&self, conversation_id: &str, limit: u32) -> Vec<ContextMessage> {
        #[derive(Deserialize)]
        struct ContextPayload {
            messages: Vec<RawMessage>,
        }
        #[derive(Deserialize)]
        struct RawMessage {
            role: String,
            content: String,
        }

        let result = self
            .tools
            .call(
                "load_context",
                serde_json::json!({ "conversation_id": conversation_id, "limit": limit }),
            )
            .await;

        match result {
            Ok(value) => match serde_json::from_value::<ContextPayload>(value) {
                Ok(payload) => payload
                    .messages
                    .into_iter()
                    .map(|message| ContextMessage { role: message.role, content: message.content })
                    .collect(),
                Err(error) => {
                    warn!(
                        event_name = "conversation.context_degraded",
                        conversation_id,
                        error = %error,
                        "context payload malformed, continuing with empty history"
                    );
                    Vec::new()
                }
            },
            Err(error) => {
                warn!(
                    event_name = "conversation.context_degraded",
                    conversation_id,
                    error = %error,
                    "context load failed, continuing with empty history"
                );
                Vec::new()
            }
        }
    }

    /// Loads slot progress; a boundary failure degrades to no progress.
    pub async fn load_progress(&self, conversation_id: &str) -> Option<LoadedProgress> {
        #[derive(Deserialize)]
        struct ProgressPayload {
            progress: Option<Progress>,
            version: i64,
        }

        let result = self
            .tools
            .call("load_progress", serde_json::json!({ "conversation_id": conversation_id }))
            .await;

        match result {
            Ok(value) => match serde_json::from_value::<ProgressPayload>(value) {
                Ok(payload) => payload
                    .progress
                    .map(|progress| LoadedProgress { progress, version: payload.version }),
                Err(error) => {
                    warn!(
                        event_name = "conversation.progress_degraded",
                        conversation_id,
                        error = %error,
                        "progress payload malformed, starting fresh"
                    );
                    None
                }
            },
            Err(error) => {
                warn!(
                    event_name = "conversation.progress_degraded",
                    conversation_id,
                    error = %error,
                    "progress load failed, starting fresh"
                );
                None
            }
        }
    }

    /// Persists progress in one atomic write. On a version conflict the
    /// caller-level recovery is a single explicit re-read and re-write; the
    /// tool layer itself never retries.
    pub async fn save_progress(
        &self,
        conversation_id: &str,
        user_id: &str,
        progress: &Progress,
        expected_version: Option<i64>,
    ) -> Result<(), ToolError> {
        let first = self
            .try_save_progress(conversation_id, user_id, progress, expected_version)
            .await;

        match first {
            Err(ToolError::Remote { ref message, .. }) if message.contains("version conflict") => {
                let current = self.load_progress(conversation_id).await;
                let version = current.map(|loaded| loaded.version);
                self.try_save_progress(conversation_id, user_id, progress, version).await
            }
            other => other,
        }
    }

    async fn try_save_progress(
        &self,
        conversation_id: &str,
        user_id: &str,
        progress: &Progress,
        expected_version: Option<i64>,
    ) -> Result<(), ToolError> {
        self.tools
            .call(
                "save_progress",
                serde_json::json!({
                    "conversation_id": conversation_id,
                    "user_id": user_id,
                    "progress": progress,
                    "expected_version": expected_version,
                }),
            )
            .await
            .map(|_| ())
    }

    /// Appends the turn's message pair; failures propagate and fail the
    /// turn, because a write that silently vanishes corrupts the history
    /// invariant.
    pub async fn save_context(
        &self,
        conversation_id: &str,
        user_id: &str,
        model_name: &str,
        user_message: &str,
        assistant_message: &str,
    ) -> Result<(), ToolError> {
        self.tools
            .call(
                "save_context",
                serde_json::json!({
                    "conversation_id": conversation_id,
                    "user_id": user_id,
                    "model_name": model_name,
                    "user_message": user_message,
                    "assistant_message": assistant_message,
                }),
            )
            .await
            .map(|_| ())
    }
}

/// Deterministic rolling summary over loaded context messages.
pub fn summarize_context(messages: &[ContextMessage], max_chars: usize) -> Option<String> {
    if messages.is_empty() {
        return None;
    }
    let mut summary = String::new();
    for message in messages {
        if !summary.is_empty() {
            summary.push('\n');
        }
        summary.push_str(&format!("{}: {}", message.role, message.content));
    }
    if summary.chars().count() > max_chars {
        let tail: String = summary
            .chars()
            .rev()
            .take(max_chars)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        summary = match tail.find('\n') {
            Some(index) => tail[index + 1..].to_string(),
            None => tail,
        };
    }
    Some(summary)
}

#[cfg(test)]
mod tests {
    use super::{summarize_context, ContextMessage};

    #[test]
    fn summary_is_none_for_empty_history() {
        assert_eq!(summarize_context(&[], 500), None);
    }

    #[test]
    fn summary_keeps_latest_lines_under_the_cap() {
        let messages: Vec<ContextMessage> = (0..30)
            .map(|index| ContextMessage {
                role: "user".to_string(),
                content: format!("message number {index}"),
            })
            .collect();

        let summary = summarize_context(&messages, 100).expect("summary");
        assert!(summary.chars().count() <= 100);
        assert!(summary.contains("message number 29"));
    }
}
