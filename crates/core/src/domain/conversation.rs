use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::slot::{names, SlotValue};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Archived,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
    System,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: ConversationId,
    pub sender: Sender,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: String,
    pub title: Option<String>,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The single planning tool the controller has decided is appropriate for
/// the current conversation intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetAction {
    PlanRaceBuild,
    PlanSeason,
    AddWorkout,
    WeeklyPlan,
    ModifyDay,
    ModifyWeek,
}

impl TargetAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlanRaceBuild => "plan_race_build",
            Self::PlanSeason => "plan_season",
            Self::AddWorkout => "add_workout",
            Self::WeeklyPlan => "weekly_plan",
            Self::ModifyDay => "modify_day",
            Self::ModifyWeek => "modify_week",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "plan_race_build" => Some(Self::PlanRaceBuild),
            "plan_season" => Some(Self::PlanSeason),
            "add_workout" => Some(Self::AddWorkout),
            "weekly_plan" => Some(Self::WeeklyPlan),
            "modify_day" => Some(Self::ModifyDay),
            "modify_week" => Some(Self::ModifyWeek),
            _ => None,
        }
    }

    /// The ordered attribute list the controller must fill before this
    /// action can execute. Order determines which slot is asked for first.
    pub fn required_attributes(&self) -> &'static [&'static str] {
        match self {
            Self::PlanRaceBuild => &[names::RACE_DISTANCE, names::RACE_DATE],
            Self::PlanSeason => &[names::SEASON_START, names::SEASON_END],
            Self::AddWorkout => &[names::WORKOUT_DESCRIPTION],
            Self::WeeklyPlan => &[],
            Self::ModifyDay => &[names::DAY_DATE, names::WORKOUT_DESCRIPTION],
            Self::ModifyWeek => &[names::WORKOUT_DESCRIPTION],
        }
    }

    pub fn optional_attributes(&self) -> &'static [&'static str] {
        match self {
            Self::PlanRaceBuild => &[names::TARGET_TIME, names::WEEKLY_MILEAGE],
            Self::PlanSeason => &[names::WEEKLY_MILEAGE],
            _ => &[],
        }
    }
}

/// Per-conversation slot progress, rewritten once per turn.
///
/// Serialization is deterministic (`BTreeMap`, stable field order) so a
/// load → save → load cycle yields byte-identical JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub target_action: Option<TargetAction>,
    pub required_attributes: Vec<String>,
    pub optional_attributes: Vec<String>,
    pub filled_slots: BTreeMap<String, SlotValue>,
    pub awaiting_slots: Vec<String>,
}

impl Progress {
    pub fn for_target(target: TargetAction) -> Self {
        Self {
            target_action: Some(target),
            required_attributes: target
                .required_attributes()
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
            optional_attributes: target
                .optional_attributes()
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
            filled_slots: BTreeMap::new(),
            awaiting_slots: Vec::new(),
        }
    }

    /// Slots are locked once nothing is awaited for an armed target: the
    /// record stops accepting writes until the intent changes.
    pub fn is_locked(&self) -> bool {
        self.target_action.is_some()
            && self.awaiting_slots.is_empty()
            && !self.filled_slots.is_empty()
    }

    /// Invariant check: awaiting ⊆ required and filled ∩ awaiting = ∅.
    pub fn check_invariants(&self) -> Result<(), String> {
        for awaiting in &self.awaiting_slots {
            if !self.required_attributes.contains(awaiting) {
                return Err(format!(
                    "awaiting slot `{awaiting}` is not among required attributes"
                ));
            }
            if self.filled_slots.contains_key(awaiting) {
                return Err(format!("slot `{awaiting}` is both filled and awaited"));
            }
        }
        Ok(())
    }
}
