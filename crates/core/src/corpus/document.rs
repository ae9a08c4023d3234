use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::plan::Phase;
use crate::domain::session::SessionIntent;

/// Shared front-matter metadata carried by every corpus document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocMeta {
    pub id: String,
    pub domain: String,
    pub race_types: Vec<String>,
    pub audience: String,
    pub phase: Phase,
    pub priority: i32,
    pub version: u32,
    pub last_reviewed: NaiveDate,
}

/// Intensity-distribution ranges declared by a philosophy, as percentages
/// of weekly volume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntensityDistribution {
    pub easy_pct_min: f64,
    pub easy_pct_max: f64,
    pub hard_pct_max: f64,
}

/// A training doctrine with gating predicates and a precomputed embedding.
#[derive(Clone, Debug, PartialEq)]
pub struct PhilosophyDoc {
    pub meta: DocMeta,
    pub philosophy_id: String,
    pub intensity: IntensityDistribution,
    pub max_hard_days: u32,
    /// Athlete tags that must all be present for this philosophy to apply.
    pub requires: Vec<String>,
    /// Athlete tags that disqualify this philosophy.
    pub prohibits: Vec<String>,
    pub embedding: Vec<f32>,
    pub summary: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LongRunRule {
    pub required_count: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructureRules {
    pub hard_days_max: u32,
    pub no_consecutive_hard_days: bool,
    pub long_run: LongRunRule,
}

/// Monday-first 7-day pattern mapping weekday to session type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeekPattern {
    pub days: [String; 7],
}

pub const WEEKDAY_NAMES: [&str; 7] =
    ["monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday"];

impl WeekPattern {
    pub fn session_type(&self, day_index: usize) -> &str {
        &self.days[day_index]
    }

    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, String> {
        let mut days: [String; 7] = Default::default();
        for (index, name) in WEEKDAY_NAMES.iter().enumerate() {
            let value = map
                .get(*name)
                .ok_or_else(|| format!("week_pattern is missing `{name}`"))?;
            days[index] = value.clone();
        }
        Ok(Self { days })
    }
}

/// A 7-day week structure produced by a philosophy for a phase and race
/// type, valid within a days-to-race window.
#[derive(Clone, Debug, PartialEq)]
pub struct StructureDoc {
    pub meta: DocMeta,
    pub philosophy_id: String,
    pub days_to_race_min: i64,
    pub days_to_race_max: i64,
    /// When present and `days_to_race <= taper_days_to_race_le`, taper
    /// structures are preferred over phase matching alone.
    pub taper_days_to_race_le: Option<i64>,
    pub week_pattern: WeekPattern,
    pub rules: StructureRules,
    pub session_groups: BTreeMap<String, Vec<String>>,
}

impl StructureDoc {
    /// Maps a session type to its intent. Hard-group members are `quality`
    /// at load time; the long group maps to `long`; `rest` is rest;
    /// everything else is easy.
    pub fn intent_for(&self, session_type: &str) -> SessionIntent {
        if session_type == "rest" {
            return SessionIntent::Rest;
        }
        if self.group_contains("hard", session_type) {
            return SessionIntent::Quality;
        }
        if self.group_contains("long", session_type) || session_type == "long_run" {
            return SessionIntent::Long;
        }
        SessionIntent::Easy
    }

    fn group_contains(&self, group: &str, session_type: &str) -> bool {
        self.session_groups
            .get(group)
            .map(|members| members.iter().any(|member| member == session_type))
            .unwrap_or(false)
    }

    pub fn contains_days_to_race(&self, days_to_race: i64) -> bool {
        (self.days_to_race_min..=self.days_to_race_max).contains(&days_to_race)
    }
}

/// Parameter bounds for one session template. Bounds are inclusive; a
/// template with no distance bounds is duration-based.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateParams {
    pub distance_mi_min: Option<f64>,
    pub distance_mi_max: Option<f64>,
    pub duration_min_min: Option<f64>,
    pub duration_min_max: Option<f64>,
    pub hard_minutes_max: Option<f64>,
}

/// A parameter-bounded session description keyed by
/// (philosophy, race_type, audience, phase, session_type).
#[derive(Clone, Debug, PartialEq)]
pub struct SessionTemplate {
    pub id: String,
    pub philosophy_id: String,
    pub race_types: Vec<String>,
    pub audience: String,
    pub phase: Phase,
    pub session_type: String,
    pub priority: i32,
    pub params: TemplateParams,
    pub description: String,
}

impl SessionTemplate {
    pub fn matches(
        &self,
        philosophy_id: &str,
        race_type: &str,
        audience: &str,
        phase: Phase,
        session_type: &str,
    ) -> bool {
        self.philosophy_id == philosophy_id
            && self.race_types.iter().any(|rt| rt == race_type)
            && self.audience == audience
            && self.phase == phase
            && self.session_type == session_type
    }

    /// Deterministic parameter resolution: start from the range midpoint and
    /// move toward the closest bound to exactly meet the allocation, which
    /// collapses to clamping the target into the range.
    pub fn resolve_distance_mi(&self, target_mi: f64) -> Option<f64> {
        let lo = self.params.distance_mi_min?;
        let hi = self.params.distance_mi_max?;
        Some(target_mi.clamp(lo, hi))
    }

    pub fn resolve_duration_min(&self, target_min: f64) -> Option<f64> {
        let lo = self.params.duration_min_min?;
        let hi = self.params.duration_min_max?;
        Some(target_min.clamp(lo, hi))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CorpusDocument {
    Philosophy(PhilosophyDoc),
    Structure(StructureDoc),
    Templates(Vec<SessionTemplate>),
}
