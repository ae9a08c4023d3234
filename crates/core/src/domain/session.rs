use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sport {
    Run,
}

impl Sport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "run",
        }
    }
}

/// Session-level purpose. Immutable during modifications unless the user
/// explicitly requests an intent change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionIntent {
    Rest,
    Easy,
    Long,
    Quality,
}

impl SessionIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Easy => "easy",
            Self::Long => "long",
            Self::Quality => "quality",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rest" => Some(Self::Rest),
            "easy" => Some(Self::Easy),
            "long" => Some(Self::Long),
            "quality" => Some(Self::Quality),
            _ => None,
        }
    }

    /// A hard day is a day whose session intent is `quality`.
    pub fn is_hard(&self) -> bool {
        matches!(self, Self::Quality)
    }
}

/// Exactly one primary metric per session: distance XOR duration. Encoding
/// the exclusive-or in the type makes the invariant unrepresentable to break.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryMetric {
    DistanceMeters(f64),
    DurationSeconds(i64),
}

impl PrimaryMetric {
    pub fn distance_meters(&self) -> Option<f64> {
        match self {
            Self::DistanceMeters(meters) => Some(*meters),
            Self::DurationSeconds(_) => None,
        }
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        match self {
            Self::DurationSeconds(seconds) => Some(*seconds),
            Self::DistanceMeters(_) => None,
        }
    }

    pub fn from_columns(
        distance_meters: Option<f64>,
        duration_seconds: Option<i64>,
    ) -> Result<Self, String> {
        match (distance_meters, duration_seconds) {
            (Some(meters), None) => Ok(Self::DistanceMeters(meters)),
            (None, Some(seconds)) => Ok(Self::DurationSeconds(seconds)),
            (Some(_), Some(_)) => {
                Err("session carries both distance and duration metrics".to_string())
            }
            (None, None) => Err("session carries no primary metric".to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    WarmUp,
    Steady,
    Interval,
    Recovery,
    CoolDown,
}

/// One ordered element of a workout. `step_index` is the canonical ordinal,
/// contiguous from zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkoutStep {
    pub step_index: u32,
    pub step_type: StepType,
    pub targets: serde_json::Value,
    pub instructions: String,
    pub purpose: String,
}

/// A concrete planned session for one calendar day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterializedSession {
    pub starts_at: DateTime<Utc>,
    pub sport: Sport,
    pub session_type: String,
    pub intent: SessionIntent,
    pub metric: PrimaryMetric,
    pub description: String,
    pub steps: Vec<WorkoutStep>,
}

impl MaterializedSession {
    /// Validates the step list: indices contiguous from zero, instructions
    /// present, targets an object.
    pub fn validate_steps(&self) -> Result<(), String> {
        for (position, step) in self.steps.iter().enumerate() {
            if step.step_index as usize != position {
                return Err(format!(
                    "step_index {} at position {position} breaks contiguous ordering",
                    step.step_index
                ));
            }
            if step.instructions.trim().is_empty() {
                return Err(format!("step {} has empty instructions", step.step_index));
            }
            if !step.targets.is_object() {
                return Err(format!("step {} targets must be a JSON object", step.step_index));
            }
        }
        Ok(())
    }
}

/// A modification request against one planned day. `intent` is copied from
/// the existing session unless `explicit_intent_change` is set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DayModification {
    pub session_type: Option<String>,
    pub metric: Option<PrimaryMetric>,
    pub description: Option<String>,
    pub intent: Option<SessionIntent>,
    #[serde(default)]
    pub explicit_intent_change: bool,
}

pub const MILE_IN_METERS: f64 = 1609.344;

pub fn miles_to_meters(miles: f64) -> f64 {
    miles * MILE_IN_METERS
}

pub fn meters_to_miles(meters: f64) -> f64 {
    meters / MILE_IN_METERS
}
