use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    Imperial,
    Metric,
}

/// Athlete profile as seen by the controller and the planning pipeline.
/// Immutable for the lifetime of a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AthleteProfile {
    pub user_id: UserId,
    pub units: Units,
    pub timezone: String,
    /// Race-goal pace in seconds per mile. All derived paces come from this
    /// value, never from free text.
    pub race_goal_pace_secs_per_mile: Option<u32>,
    /// Gating tags matched against philosophy `requires` / `prohibits`.
    pub tags: Vec<String>,
}

impl AthleteProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            units: Units::Imperial,
            timezone: "UTC".to_string(),
            race_goal_pace_secs_per_mile: None,
            tags: Vec::new(),
        }
    }

    pub fn with_goal_pace(mut self, secs_per_mile: u32) -> Self {
        self.race_goal_pace_secs_per_mile = Some(secs_per_mile);
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|tag| (*tag).to_string()).collect();
        self
    }
}

/// Formats a per-mile pace as `M:SS/mi`.
pub fn format_pace(secs_per_mile: u32) -> String {
    format!("{}:{:02}/mi", secs_per_mile / 60, secs_per_mile % 60)
}
