use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::athlete::format_pace;
use crate::domain::session::{
    meters_to_miles, MaterializedSession, SessionIntent, StepType, WorkoutStep,
};

/// Pace offsets from the athlete's race-goal pace, in seconds per mile.
/// Paces are always derived from the stored goal pace, never parsed from
/// free text.
const EASY_PACE_OFFSET: i64 = 75;
const LONG_PACE_OFFSET: i64 = 45;
const QUALITY_PACE_OFFSET: i64 = -15;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionText {
    pub description: String,
    pub steps: Vec<WorkoutStep>,
}

/// Abstract structured-completion capability for B6. Implementations return
/// schema-shaped output; the pipeline validates it and falls back to the
/// deterministic generator when validation fails.
#[async_trait]
pub trait SessionTextGenerator: Send + Sync {
    async fn generate(
        &self,
        session: &MaterializedSession,
        goal_pace_secs_per_mile: Option<u32>,
    ) -> anyhow::Result<SessionText>;
}

/// Schema validation applied to every generated session text.
pub fn validate_session_text(text: &SessionText) -> Result<(), String> {
    if text.description.trim().is_empty() {
        return Err("description must not be empty".to_string());
    }
    if text.steps.is_empty() {
        return Err("workout must contain at least one step".to_string());
    }
    for (position, step) in text.steps.iter().enumerate() {
        if step.step_index as usize != position {
            return Err(format!(
                "step_index {} at position {position} breaks contiguous ordering",
                step.step_index
            ));
        }
        if !step.targets.is_object() {
            return Err(format!("step {} targets must be a JSON object", step.step_index));
        }
        if step.instructions.trim().is_empty() {
            return Err(format!("step {} has empty instructions", step.step_index));
        }
        if step.purpose.trim().is_empty() {
            return Err(format!("step {} has empty purpose", step.step_index));
        }
    }
    Ok(())
}

/// Runs the generator and validates its output; any failure falls back to
/// the deterministic template. The fallback output always validates.
pub async fn generate_with_fallback(
    generator: &dyn SessionTextGenerator,
    session: &MaterializedSession,
    goal_pace_secs_per_mile: Option<u32>,
) -> SessionText {
    match generator.generate(session, goal_pace_secs_per_mile).await {
        Ok(text) => match validate_session_text(&text) {
            Ok(()) => text,
            Err(reason) => {
                warn!(
                    event_name = "plan.session_text_fallback",
                    session_type = %session.session_type,
                    reason = %reason,
                    "generated session text failed schema validation, using fallback"
                );
                deterministic_text(session, goal_pace_secs_per_mile)
            }
        },
        Err(error) => {
            warn!(
                event_name = "plan.session_text_fallback",
                session_type = %session.session_type,
                reason = %error,
                "session text generation failed, using fallback"
            );
            deterministic_text(session, goal_pace_secs_per_mile)
        }
    }
}

/// Deterministic fallback generator; also the default implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicTextGenerator;

#[async_trait]
impl SessionTextGenerator for DeterministicTextGenerator {
    async fn generate(
        &self,
        session: &MaterializedSession,
        goal_pace_secs_per_mile: Option<u32>,
    ) -> anyhow::Result<SessionText> {
        Ok(deterministic_text(session, goal_pace_secs_per_mile))
    }
}

pub fn pace_for_intent(intent: SessionIntent, goal_pace_secs_per_mile: u32) -> u32 {
    let offset = match intent {
        SessionIntent::Easy | SessionIntent::Rest => EASY_PACE_OFFSET,
        SessionIntent::Long => LONG_PACE_OFFSET,
        SessionIntent::Quality => QUALITY_PACE_OFFSET,
    };
    (goal_pace_secs_per_mile as i64 + offset).max(240) as u32
}

fn pace_phrase(intent: SessionIntent, goal_pace_secs_per_mile: Option<u32>) -> String {
    match goal_pace_secs_per_mile {
        Some(goal) => format!("at {}", format_pace(pace_for_intent(intent, goal))),
        None => match intent {
            SessionIntent::Quality => "at hard effort".to_string(),
            SessionIntent::Long => "at steady aerobic effort".to_string(),
            _ => "at easy conversational effort".to_string(),
        },
    }
}

pub fn deterministic_text(
    session: &MaterializedSession,
    goal_pace_secs_per_mile: Option<u32>,
) -> SessionText {
    let miles = session
        .metric
        .distance_meters()
        .map(meters_to_miles)
        .unwrap_or_else(|| {
            session.metric.duration_seconds().map(|secs| secs as f64 / 600.0).unwrap_or(0.0)
        });
    let pace = pace_phrase(session.intent, goal_pace_secs_per_mile);

    let mut steps = Vec::new();
    let mut index = 0u32;

    if session.intent.is_hard() {
        steps.push(WorkoutStep {
            step_index: index,
            step_type: StepType::WarmUp,
            targets: serde_json::json!({"distance_mi": 1.5, "effort": "easy"}),
            instructions: "Warm up with easy jogging and a few strides".to_string(),
            purpose: "prepare for the hard work".to_string(),
        });
        index += 1;

        let work_miles = (miles - 3.0).max(1.0);
        steps.push(WorkoutStep {
            step_index: index,
            step_type: StepType::Interval,
            targets: serde_json::json!({"distance_mi": round_tenth(work_miles), "effort": "hard"}),
            instructions: format!("{} {pace}", session.description),
            purpose: "raise race-specific fitness".to_string(),
        });
        index += 1;

        steps.push(WorkoutStep {
            step_index: index,
            step_type: StepType::CoolDown,
            targets: serde_json::json!({"distance_mi": 1.5, "effort": "easy"}),
            instructions: "Cool down with relaxed jogging".to_string(),
            purpose: "flush out the effort".to_string(),
        });
    } else {
        steps.push(WorkoutStep {
            step_index: index,
            step_type: StepType::Steady,
            targets: serde_json::json!({"distance_mi": round_tenth(miles), "effort": "easy"}),
            instructions: format!("{} {pace}", session.description),
            purpose: match session.intent {
                SessionIntent::Long => "build endurance".to_string(),
                _ => "aerobic volume and recovery".to_string(),
            },
        });
    }

    let description = format!("{}: {:.1} mi {}", session.description, miles, pace);

    SessionText { description, steps }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
