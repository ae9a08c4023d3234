//! The execution controller (stage-1 agent). Every turn produces exactly
//! one of three outcomes: fill-and-ask for a missing slot, execute the
//! armed planning tool, or an informational reply when no tool applies.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;
use tracing::{info, warn};

use cadence_core::domain::conversation::{Progress, TargetAction};
use cadence_core::domain::slot::{names, validate_slot, SlotValue};
use cadence_mcp::{ToolClient, ToolError};

use crate::classifier::{
    is_executable_request, is_execution_confirmation, KeywordClassifier, TargetClassifier,
};
use crate::conversation::{summarize_context, ConversationClient, LoadedProgress};
use crate::extractor::{AttributeExtractor, ExtractionRequest};
use crate::validators::{
    fallback_question, slot_question_fragment, validate_decision, DecisionView, ValidatorConfig,
};

const CONTEXT_LIMIT: u32 = 20;
const SUMMARY_MAX_CHARS: usize = 1200;

#[derive(Debug, Error)]
pub enum TurnError {
    /// Boundary failure on a write path, or at initialization. The turn
    /// fails; progress is not updated.
    #[error(transparent)]
    Boundary(#[from] ToolError),
    #[error("turn deadline of {0:?} exceeded; progress was not updated")]
    Deadline(Duration),
}

#[derive(Clone, Debug)]
pub struct TurnRequest {
    pub conversation_id: String,
    pub user_id: String,
    pub message: String,
    /// The conversation's "today"; relative dates resolve against it.
    pub today: NaiveDate,
}

/// Exactly one of the three turn outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    Question,
    Execution,
    Informational,
}

#[derive(Clone, Debug)]
pub struct TurnResponse {
    pub message: String,
    pub kind: ResponseKind,
    pub target_action: Option<TargetAction>,
    pub filled_slots: BTreeMap<String, SlotValue>,
    pub missing_slots: Vec<String>,
    pub should_execute: bool,
    pub execution_result: Option<serde_json::Value>,
}

impl TurnResponse {
    pub fn asks_question(&self) -> bool {
        self.kind == ResponseKind::Question
    }
}

pub struct ExecutionController {
    tools: Arc<ToolClient>,
    conversation: ConversationClient,
    classifier: Box<dyn TargetClassifier>,
    extractor: AttributeExtractor,
    validators: ValidatorConfig,
    turn_deadline: Duration,
    model_name: String,
    orchestrator_instructions: String,
}

impl std::fmt::Debug for ExecutionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionController")
            .field("tools", &self.tools)
            .field("conversation", &self.conversation)
            .field("extractor", &self.extractor)
            .field("validators", &self.validators)
            .field("turn_deadline", &self.turn_deadline)
            .field("model_name", &self.model_name)
            .field("orchestrator_instructions", &self.orchestrator_instructions)
            .finish_non_exhaustive()
    }
}

impl ExecutionController {
    /// Connects the controller to its tool boundary. Loading the
    /// orchestrator prompt here doubles as the fail-closed probe: if the
    /// prompt server is unreachable, no controller exists to run turns.
    pub async fn connect(
        tools: Arc<ToolClient>,
        classifier: Box<dyn TargetClassifier>,
        turn_deadline: Duration,
        model_name: String,
    ) -> Result<Self, TurnError> {
        let prompt = tools.call("load_orchestrator_prompt", serde_json::json!({})).await?;
        let orchestrator_instructions = prompt
            .get("content")
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            conversation: ConversationClient::new(tools.clone()),
            tools,
            classifier,
            extractor: AttributeExtractor::new(),
            validators: ValidatorConfig::default(),
            turn_deadline,
            model_name,
            orchestrator_instructions,
        })
    }

    pub fn instructions(&self) -> &str {
        &self.orchestrator_instructions
    }

    /// Runs one turn under the turn deadline. On deadline, in-flight tool
    /// calls are dropped and no progress is persisted.
    pub async fn run_turn(&self, request: &TurnRequest) -> Result<TurnResponse, TurnError> {
        match tokio::time::timeout(self.turn_deadline, self.run_turn_inner(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    event_name = "controller.turn_deadline",
                    conversation_id = %request.conversation_id,
                    "turn deadline exceeded; reporting failed turn"
                );
                Err(TurnError::Deadline(self.turn_deadline))
            }
        }
    }

    async fn run_turn_inner(&self, request: &TurnRequest) -> Result<TurnResponse, TurnError> {
        // LOAD_PROGRESS and context (reads degrade, never block the turn).
        let prior = self.conversation.load_progress(&request.conversation_id).await;
        let context =
            self.conversation.load_context(&request.conversation_id, CONTEXT_LIMIT).await;
        let summary = summarize_context(&context, SUMMARY_MAX_CHARS);

        // CLASSIFY_TARGET.
        let classified = match self.classifier.classify(&request.message).await {
            Ok(target) => target,
            Err(error) => {
                warn!(
                    event_name = "controller.classifier_fallback",
                    error = %error,
                    "classifier failed, using keyword rules"
                );
                KeywordClassifier::classify_message(&request.message)
            }
        };
        let target =
            self.resolve_target(classified, prior.as_ref(), &request.message, &request.user_id).await;

        let Some(target) = target else {
            return self.finish_chat_turn(request, prior).await;
        };

        // Build the working progress record. A changed target clears old
        // slots so a new plan never inherits a stale race date; a locked
        // record stops accepting writes until the intent changes.
        let prior_matches =
            prior.as_ref().map(|loaded| loaded.progress.target_action == Some(target));
        let (mut working, expected_version, locked) = match (prior, prior_matches) {
            (Some(loaded), Some(true)) => {
                let locked = loaded.progress.is_locked();
                (loaded.progress, Some(loaded.version), locked)
            }
            (Some(loaded), _) => {
                info!(
                    event_name = "controller.intent_changed",
                    conversation_id = %request.conversation_id,
                    previous = ?loaded.progress.target_action,
                    next = target.as_str(),
                    "target changed; clearing stale slots"
                );
                (Progress::for_target(target), Some(loaded.version), false)
            }
            (None, _) => (Progress::for_target(target), None, false),
        };
        working.target_action = Some(target);

        // EXTRACT + MERGE, skipped entirely for a locked record.
        if !locked {
            let unit_prompted = working
                .awaiting_slots
                .first()
                .map(|slot| slot == names::WEEKLY_MILEAGE)
                .unwrap_or(false);

            let mut requested: Vec<String> = working.required_attributes.clone();
            requested.extend(working.optional_attributes.iter().cloned());

            let extraction = self.extractor.extract(&ExtractionRequest {
                message: &request.message,
                attributes_requested: &requested,
                known_slots: &working.filled_slots,
                conversation_summary: summary.as_deref(),
                today: request.today,
                unit_prompted,
            });

            for (name, value) in extraction.values {
                if validate_slot(&name, &value, request.today).is_ok() {
                    working.filled_slots.insert(name, value);
                }
            }
            // Ambiguous fields count as missing, never as filled.
            for name in &extraction.ambiguous_fields {
                working.filled_slots.remove(name);
            }

            working.awaiting_slots = working
                .required_attributes
                .iter()
                .filter(|name| !working.filled_slots.contains_key(*name))
                .cloned()
                .collect();
        }

        // DECIDE.
        let missing = working.awaiting_slots.clone();
        let should_execute = missing.is_empty();

        let (mut message, kind, execution_result) = if should_execute {
            let (message, result) = self.execute(target, &working, request).await?;
            (message, ResponseKind::Execution, Some(result))
        } else {
            (question_for_slot(&missing[0]), ResponseKind::Question, None)
        };

        // Response validators, all of them; a failure is fatal for the
        // drafted text and replaced by the deterministic fallback question.
        let view = DecisionView {
            message: &message,
            target_action: Some(target),
            missing_slots: &missing,
            should_execute,
        };
        if validate_decision(&self.validators, &view).is_err() {
            let slot = missing
                .first()
                .cloned()
                .unwrap_or_else(|| working.required_attributes.first().cloned().unwrap_or_default());
            message = fallback_question(&slot);
        }

        // PERSIST_PROGRESS, then the message pair. Both are authoritative
        // writes, so failures propagate and fail the turn.
        self.conversation
            .save_progress(&request.conversation_id, &request.user_id, &working, expected_version)
            .await?;
        // An empty user message carries nothing worth appending; the
        // re-ask still goes out, the history stays clean.
        if !request.message.trim().is_empty() {
            self.conversation
                .save_context(
                    &request.conversation_id,
                    &request.user_id,
                    &self.model_name,
                    &request.message,
                    &message,
                )
                .await?;
        }

        info!(
            event_name = "controller.turn_completed",
            conversation_id = %request.conversation_id,
            target_action = target.as_str(),
            missing_slots = ?missing,
            should_execute,
            kind = ?kind,
            "turn completed"
        );

        Ok(TurnResponse {
            message,
            kind,
            target_action: Some(target),
            filled_slots: working.filled_slots,
            missing_slots: missing,
            should_execute,
            execution_result,
        })
    }

    /// A classified target wins outright. Without one, an in-flight prior
    /// target continues the slot conversation; a locked (already executed)
    /// target only resumes on an explicit confirmation or creation verb.
    async fn resolve_target(
        &self,
        classified: Option<TargetAction>,
        prior: Option<&LoadedProgress>,
        message: &str,
        user_id: &str,
    ) -> Option<TargetAction> {
        let candidate = match classified {
            Some(target) => Some(target),
            None => {
                let prior = prior?;
                let prior_target = prior.progress.target_action?;
                if !prior.progress.is_locked()
                    || is_execution_confirmation(message)
                    || is_executable_request(message)
                {
                    Some(prior_target)
                } else {
                    None
                }
            }
        }?;

        // Dependency gating: a weekly plan needs a race plan under it.
        if candidate == TargetAction::WeeklyPlan && !self.race_plan_exists(user_id).await {
            info!(
                event_name = "controller.weekly_plan_gated",
                "weekly plan requested without a race plan; rewriting to plan_race_build"
            );
            return Some(TargetAction::PlanRaceBuild);
        }

        Some(candidate)
    }

    /// The gating check is a read: a boundary failure degrades to "no race
    /// plan", which routes to the stricter path.
    async fn race_plan_exists(&self, user_id: &str) -> bool {
        match self
            .tools
            .call("race_plan_exists", serde_json::json!({ "user_id": user_id }))
            .await
        {
            Ok(value) => value.get("exists").and_then(|value| value.as_bool()).unwrap_or(false),
            Err(error) => {
                warn!(
                    event_name = "controller.gating_degraded",
                    error = %error,
                    "race-plan gating check failed; assuming no race plan"
                );
                false
            }
        }
    }

    async fn finish_chat_turn(
        &self,
        request: &TurnRequest,
        prior: Option<LoadedProgress>,
    ) -> Result<TurnResponse, TurnError> {
        let message = "I can plan a race build, a full season, a training week, or a single \
                       workout. Tell me what you're training for."
            .to_string();

        // Chat turns leave stored progress untouched; only the message pair
        // is appended, and only when the user actually said something.
        if request.message.trim().is_empty() {
            return Ok(TurnResponse {
                message,
                kind: ResponseKind::Informational,
                target_action: None,
                filled_slots: prior.map(|loaded| loaded.progress.filled_slots).unwrap_or_default(),
                missing_slots: Vec::new(),
                should_execute: false,
                execution_result: None,
            });
        }
        self.conversation
            .save_context(
                &request.conversation_id,
                &request.user_id,
                &self.model_name,
                &request.message,
                &message,
            )
            .await?;

        Ok(TurnResponse {
            message,
            kind: ResponseKind::Informational,
            target_action: None,
            filled_slots: prior.map(|loaded| loaded.progress.filled_slots).unwrap_or_default(),
            missing_slots: Vec::new(),
            should_execute: false,
            execution_result: None,
        })
    }

    /// EXECUTE_TOOL: one call to the armed planning tool with canonical
    /// slot values. Remote failures propagate and fail the turn.
    async fn execute(
        &self,
        target: TargetAction,
        progress: &Progress,
        request: &TurnRequest,
    ) -> Result<(String, serde_json::Value), TurnError> {
        let arguments = self.execution_arguments(target, progress, request);
        let tool = target.as_str();

        let result = self.tools.call(tool, arguments).await?;
        let message = result
            .get("message")
            .and_then(|value| value.as_str())
            .map(|text| text.to_string())
            .unwrap_or_else(|| "Done. Your plan is on the calendar.".to_string());

        Ok((message, result))
    }

    fn execution_arguments(
        &self,
        target: TargetAction,
        progress: &Progress,
        request: &TurnRequest,
    ) -> serde_json::Value {
        let slot = |name: &str| progress.filled_slots.get(name);

        match target {
            TargetAction::PlanRaceBuild => serde_json::json!({
                "user_id": request.user_id,
                "conversation_id": request.conversation_id,
                "race_distance": slot(names::RACE_DISTANCE)
                    .map(SlotValue::canonical_string),
                "race_date": slot(names::RACE_DATE).map(SlotValue::canonical_string),
                "target_time": slot(names::TARGET_TIME).map(SlotValue::canonical_string),
                "weekly_mileage": slot(names::WEEKLY_MILEAGE).and_then(SlotValue::as_mileage),
            }),
            TargetAction::PlanSeason => serde_json::json!({
                "user_id": request.user_id,
                "season_start": slot(names::SEASON_START).map(SlotValue::canonical_string),
                "season_end": slot(names::SEASON_END).map(SlotValue::canonical_string),
                "weekly_mileage": slot(names::WEEKLY_MILEAGE).and_then(SlotValue::as_mileage),
            }),
            TargetAction::WeeklyPlan => serde_json::json!({
                "user_id": request.user_id,
                "weekly_mileage": slot(names::WEEKLY_MILEAGE).and_then(SlotValue::as_mileage),
            }),
            TargetAction::AddWorkout => serde_json::json!({
                "user_id": request.user_id,
                "workout_description": slot(names::WORKOUT_DESCRIPTION)
                    .map(SlotValue::canonical_string),
            }),
            TargetAction::ModifyDay => serde_json::json!({
                "user_id": request.user_id,
                "day": slot(names::DAY_DATE).map(SlotValue::canonical_string),
                "description": slot(names::WORKOUT_DESCRIPTION)
                    .map(SlotValue::canonical_string),
            }),
            TargetAction::ModifyWeek => serde_json::json!({
                "user_id": request.user_id,
                "week_start": monday_of(request.today).format("%Y-%m-%d").to_string(),
                "workout_description": slot(names::WORKOUT_DESCRIPTION)
                    .map(SlotValue::canonical_string),
            }),
        }
    }
}

fn monday_of(day: NaiveDate) -> NaiveDate {
    day - chrono::Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

pub(crate) fn question_for_slot(slot: &str) -> String {
    let fragment = slot_question_fragment(slot);
    let mut chars = fragment.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    };
    format!("{capitalized}?")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{monday_of, question_for_slot};

    #[test]
    fn slot_questions_contain_exactly_one_question_mark() {
        for slot in ["race_date", "race_distance", "weekly_mileage", "season_start"] {
            let question = question_for_slot(slot);
            assert_eq!(question.matches('?').count(), 1, "{question}");
            assert!(question.chars().next().expect("non-empty").is_uppercase());
        }
    }

    #[test]
    fn monday_of_rolls_back_to_the_week_start() {
        // 2026-01-10 is a Saturday.
        let saturday = NaiveDate::from_ymd_opt(2026, 1, 10).expect("valid date");
        assert_eq!(monday_of(saturday), NaiveDate::from_ymd_opt(2026, 1, 5).expect("valid date"));

        let monday = NaiveDate::from_ymd_opt(2026, 1, 5).expect("valid date");
        assert_eq!(monday_of(monday), monday);
    }
}
