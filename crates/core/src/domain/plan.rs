use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::athlete::AthleteProfile;
use crate::domain::slot::RaceDistance;

/// Training phase, in its only legal order: base → build → peak → taper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Base,
    Build,
    Peak,
    Taper,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Build => "build",
            Self::Peak => "peak",
            Self::Taper => "taper",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "base" => Some(Self::Base),
            "build" => Some(Self::Build),
            "peak" => Some(Self::Peak),
            "taper" => Some(Self::Taper),
            _ => None,
        }
    }

    /// Phase never moves backwards within a plan.
    pub fn can_transition_to(&self, next: Phase) -> bool {
        next >= *self
    }
}

/// One week of the macro plan produced by the week-structuring stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MacroWeek {
    pub index: u32,
    pub phase: Phase,
    pub focus: String,
    pub target_weekly_miles: f64,
    pub start: NaiveDate,
    pub days_to_race: i64,
    #[serde(default)]
    pub is_recovery: bool,
}

/// Immutable input to one plan-generation invocation, assembled from filled
/// slots, the athlete profile, and a recent-activity summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanningContext {
    pub athlete: AthleteProfile,
    pub race_distance: RaceDistance,
    pub race_date: NaiveDate,
    pub plan_start: NaiveDate,
    pub target_time_secs: Option<u32>,
    pub weekly_mileage: Option<f64>,
    pub audience: String,
    /// Bounded fatigue scaling supplied by the caller from recent activity
    /// load; clamped into `[0.7, 1.0]` before use.
    pub fatigue_factor: Option<f64>,
}

impl PlanningContext {
    pub fn days_to_race(&self) -> i64 {
        (self.race_date - self.plan_start).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::Phase;

    #[test]
    fn phases_only_move_forward() {
        assert!(Phase::Base.can_transition_to(Phase::Base));
        assert!(Phase::Base.can_transition_to(Phase::Build));
        assert!(Phase::Build.can_transition_to(Phase::Taper));
        assert!(!Phase::Taper.can_transition_to(Phase::Peak));
        assert!(!Phase::Build.can_transition_to(Phase::Base));
    }
}
