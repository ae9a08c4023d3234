use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

/// Abstract structured-completion capability. Implementations return a JSON
/// value shaped by `schema_name`; callers validate before trusting it.
/// Provider mechanics live outside this crate.
#[async_trait]
pub trait StructuredCompletion: Send + Sync {
    async fn complete(&self, prompt: &str, schema_name: &str) -> Result<serde_json::Value>;
}

/// Deterministic scripted completion used by tests and offline runs:
/// responses are popped from a queue in call order.
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    responses: Mutex<VecDeque<serde_json::Value>>,
}

impl ScriptedCompletion {
    pub fn new(responses: Vec<serde_json::Value>) -> Self {
        Self { responses: Mutex::new(responses.into()) }
    }

    pub fn push(&self, response: serde_json::Value) {
        self.responses.lock().expect("scripted completion lock").push_back(response);
    }
}

#[async_trait]
impl StructuredCompletion for ScriptedCompletion {
    async fn complete(&self, _prompt: &str, schema_name: &str) -> Result<serde_json::Value> {
        self.responses
            .lock()
            .expect("scripted completion lock")
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted response left for schema `{schema_name}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::{ScriptedCompletion, StructuredCompletion};

    #[tokio::test]
    async fn scripted_responses_come_back_in_order() {
        let completion = ScriptedCompletion::new(vec![
            serde_json::json!({"target_action": "plan_race_build"}),
            serde_json::json!({"target_action": null}),
        ]);

        let first = completion.complete("p", "target").await.expect("first");
        assert_eq!(first["target_action"], "plan_race_build");

        let second = completion.complete("p", "target").await.expect("second");
        assert!(second["target_action"].is_null());

        assert!(completion.complete("p", "target").await.is_err(), "queue exhausted");
    }
}
