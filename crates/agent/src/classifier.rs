use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use cadence_core::domain::conversation::TargetAction;

use crate::llm::StructuredCompletion;

/// Stage-1 decision: which single planning tool fits the message. The
/// classifier never extracts values; that is the extractor's job.
#[async_trait]
pub trait TargetClassifier: Send + Sync {
    async fn classify(&self, message: &str) -> Result<Option<TargetAction>>;
}

/// Deterministic keyword classifier; also the fallback behind the
/// completion-backed one.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn classify_message(message: &str) -> Option<TargetAction> {
        let lowered = message.to_ascii_lowercase();

        if lowered.contains("season") {
            return Some(TargetAction::PlanSeason);
        }
        if lowered.contains("add") && (lowered.contains("workout") || lowered.contains("run")) {
            return Some(TargetAction::AddWorkout);
        }
        if (lowered.contains("change") || lowered.contains("move") || lowered.contains("swap"))
            && !lowered.contains("week")
        {
            return Some(TargetAction::ModifyDay);
        }
        if (lowered.contains("easier") || lowered.contains("harder") || lowered.contains("adjust"))
            && lowered.contains("week")
        {
            return Some(TargetAction::ModifyWeek);
        }
        if lowered.contains("next week") || lowered.contains("this week") || lowered.contains("weekly plan")
        {
            return Some(TargetAction::WeeklyPlan);
        }
        if lowered.contains("race")
            || lowered.contains("marathon")
            || lowered.contains("half")
            || lowered.contains("10k")
            || lowered.contains("5k")
            || lowered.contains("ultra")
            || (lowered.contains("training") && lowered.contains("for"))
        {
            return Some(TargetAction::PlanRaceBuild);
        }
        None
    }
}

#[async_trait]
impl TargetClassifier for KeywordClassifier {
    async fn classify(&self, message: &str) -> Result<Option<TargetAction>> {
        Ok(Self::classify_message(message))
    }
}

/// Completion-backed classifier constrained to a one-field schema. Any
/// output outside the closed target set falls back to the keyword rules;
/// the turn never depends on well-behaved model output.
pub struct CompletionClassifier {
    completion: Arc<dyn StructuredCompletion>,
    instructions: String,
}

impl CompletionClassifier {
    pub fn new(completion: Arc<dyn StructuredCompletion>, instructions: String) -> Self {
        Self { completion, instructions }
    }
}

#[async_trait]
impl TargetClassifier for CompletionClassifier {
    async fn classify(&self, message: &str) -> Result<Option<TargetAction>> {
        let prompt = format!("{}\n\nUser message:\n{message}", self.instructions);

        match self.completion.complete(&prompt, "target_action").await {
            Ok(value) => match value.get("target_action") {
                Some(serde_json::Value::Null) | None => Ok(None),
                Some(serde_json::Value::String(name)) => match TargetAction::parse(name) {
                    Some(target) => Ok(Some(target)),
                    None => {
                        warn!(
                            event_name = "controller.classifier_fallback",
                            proposed = %name,
                            "completion proposed an unknown target, using keyword rules"
                        );
                        Ok(KeywordClassifier::classify_message(message))
                    }
                },
                Some(other) => {
                    warn!(
                        event_name = "controller.classifier_fallback",
                        proposed = %other,
                        "completion returned a non-string target, using keyword rules"
                    );
                    Ok(KeywordClassifier::classify_message(message))
                }
            },
            Err(error) => {
                warn!(
                    event_name = "controller.classifier_fallback",
                    error = %error,
                    "completion failed, using keyword rules"
                );
                Ok(KeywordClassifier::classify_message(message))
            }
        }
    }
}

const CONFIRMATION_PHRASES: [&str; 15] = [
    "yes",
    "yeah",
    "yep",
    "yup",
    "sure",
    "ok",
    "okay",
    "go ahead",
    "do it",
    "build it",
    "create it",
    "let's do it",
    "let's go",
    "proceed",
    "start",
];

/// Short affirmations count as execution confirmation; stating goals or
/// providing information does not.
pub fn is_execution_confirmation(message: &str) -> bool {
    let lowered = message.trim().to_ascii_lowercase();
    if lowered.len() >= 20 {
        return false;
    }
    CONFIRMATION_PHRASES
        .iter()
        .any(|phrase| lowered == *phrase || lowered.contains(phrase))
}

const EXECUTABLE_VERBS: [&str; 6] = ["create", "build", "generate", "make", "plan", "schedule"];

/// Imperative creation verbs mark a message as an explicit execution
/// request.
pub fn is_executable_request(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    EXECUTABLE_VERBS.iter().any(|verb| lowered.contains(verb))
}
