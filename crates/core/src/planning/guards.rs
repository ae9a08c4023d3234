use thiserror::Error;

use crate::corpus::StructureDoc;
use crate::domain::plan::MacroWeek;
use crate::domain::session::{MaterializedSession, SessionIntent};
use crate::planning::volume::DayAllocation;

/// Pipeline stages in execution order. Guard violations name the stage they
/// fired between, and the pipeline surfaces the first violation unchanged.
/// No retries, no repair loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    MacroPlan,
    PhilosophySelection,
    StructureLoading,
    VolumeAllocation,
    TemplateSelection,
    SessionText,
    Persistence,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MacroPlan => "macro_plan",
            Self::PhilosophySelection => "philosophy_selection",
            Self::StructureLoading => "structure_loading",
            Self::VolumeAllocation => "volume_allocation",
            Self::TemplateSelection => "template_selection",
            Self::SessionText => "session_text",
            Self::Persistence => "persistence",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error("stage {stage:?} guard `{guard}` violated: {message}")]
pub struct PipelineError {
    pub stage: Stage,
    pub guard: &'static str,
    pub message: String,
}

impl PipelineError {
    pub fn new(stage: Stage, guard: &'static str, message: impl Into<String>) -> Self {
        Self { stage, guard, message: message.into() }
    }
}

const VOLUME_TOLERANCE: f64 = 0.01;
const RAMP_LIMIT: f64 = 1.10;
const RECOVERY_MIN_CUT: f64 = 0.20;
const RECOVERY_MAX_CUT: f64 = 0.30;

/// B2 → B3 guard: contiguous indices, legal phase order, bounded ramp,
/// recovery cuts in range, monotonic taper.
pub fn check_macro_plan(weeks: &[MacroWeek]) -> Result<(), PipelineError> {
    if weeks.is_empty() {
        return Err(PipelineError::new(Stage::MacroPlan, "weeks_present", "macro plan is empty"));
    }

    let mut previous: Option<&MacroWeek> = None;
    let mut last_progression_volume: Option<f64> = None;

    for week in weeks {
        if let Some(prev) = previous {
            if week.index != prev.index + 1 {
                return Err(PipelineError::new(
                    Stage::MacroPlan,
                    "weeks_contiguous",
                    format!("week index jumps from {} to {}", prev.index, week.index),
                ));
            }
            if !prev.phase.can_transition_to(week.phase) {
                return Err(PipelineError::new(
                    Stage::MacroPlan,
                    "phase_order",
                    format!(
                        "phase moves backwards from {} to {} at week {}",
                        prev.phase.as_str(),
                        week.phase.as_str(),
                        week.index
                    ),
                ));
            }

            if week.is_recovery {
                let cut = 1.0 - week.target_weekly_miles / prev.target_weekly_miles;
                if !(RECOVERY_MIN_CUT - 1e-9..=RECOVERY_MAX_CUT + 1e-9).contains(&cut) {
                    return Err(PipelineError::new(
                        Stage::MacroPlan,
                        "recovery_cut",
                        format!(
                            "recovery week {} cuts volume by {:.0}%, expected 20-30%",
                            week.index,
                            cut * 100.0
                        ),
                    ));
                }
            } else if week.phase == crate::domain::plan::Phase::Taper
                && prev.phase == crate::domain::plan::Phase::Taper
            {
                if week.target_weekly_miles >= prev.target_weekly_miles {
                    return Err(PipelineError::new(
                        Stage::MacroPlan,
                        "taper_monotonic",
                        format!("taper week {} does not decrease volume", week.index),
                    ));
                }
            } else if let Some(track) = last_progression_volume {
                // Ramp measured against the last non-recovery week so a
                // post-recovery rebound to the progression track is legal.
                // Weekly volumes are stored rounded to a tenth of a mile;
                // the limit carries that quantum (both sides) as an
                // allowance.
                if week.target_weekly_miles > track * RAMP_LIMIT + 0.11 {
                    return Err(PipelineError::new(
                        Stage::MacroPlan,
                        "ramp_limit",
                        format!(
                            "week {} volume {:.1} exceeds 10% ramp over {:.1}",
                            week.index, week.target_weekly_miles, track
                        ),
                    ));
                }
            }
        }

        if !week.is_recovery {
            last_progression_volume = Some(week.target_weekly_miles);
        }
        previous = Some(week);
    }

    Ok(())
}

/// Structure sanity at load: no two hard-group sessions adjacent in the
/// 7-day pattern, and the pattern carries the required long-run count.
pub fn check_structure(structure: &StructureDoc) -> Result<(), PipelineError> {
    let mut hard_flags = [false; 7];
    let mut long_count = 0u32;
    let mut hard_count = 0u32;

    for day_index in 0..7 {
        let session_type = structure.week_pattern.session_type(day_index);
        let intent = structure.intent_for(session_type);
        hard_flags[day_index] = intent.is_hard();
        if intent.is_hard() {
            hard_count += 1;
        }
        if intent == SessionIntent::Long {
            long_count += 1;
        }
    }

    if structure.rules.no_consecutive_hard_days {
        for day_index in 0..6 {
            if hard_flags[day_index] && hard_flags[day_index + 1] {
                return Err(PipelineError::new(
                    Stage::StructureLoading,
                    "no_consecutive_hard_days",
                    format!(
                        "structure `{}` schedules hard sessions on adjacent days",
                        structure.meta.id
                    ),
                ));
            }
        }
    }

    if hard_count > structure.rules.hard_days_max {
        return Err(PipelineError::new(
            Stage::StructureLoading,
            "hard_days_max",
            format!(
                "structure `{}` has {} hard days, cap is {}",
                structure.meta.id, hard_count, structure.rules.hard_days_max
            ),
        ));
    }

    if long_count != structure.rules.long_run.required_count {
        return Err(PipelineError::new(
            Stage::StructureLoading,
            "long_run_count",
            format!(
                "structure `{}` has {} long runs, rules require {}",
                structure.meta.id, long_count, structure.rules.long_run.required_count
            ),
        ));
    }

    Ok(())
}

/// B4 → B5 guard: allocated distance sums to the weekly target within ±1%.
pub fn check_week_volume(
    allocations: &[DayAllocation],
    target_weekly_miles: f64,
) -> Result<(), PipelineError> {
    let total: f64 = allocations.iter().map(|allocation| allocation.miles).sum();
    let tolerance = target_weekly_miles * VOLUME_TOLERANCE;
    if (total - target_weekly_miles).abs() > tolerance {
        return Err(PipelineError::new(
            Stage::VolumeAllocation,
            "volume_sum",
            format!(
                "allocated {total:.2} mi differs from target {target_weekly_miles:.2} mi by more than 1%"
            ),
        ));
    }
    Ok(())
}

/// Week-level session guards between B5 and B6: exactly one long run when
/// required, no consecutive hard intents, every session carries exactly one
/// primary metric (the type already guarantees the latter; steps are checked
/// again after text generation).
pub fn check_week_sessions(
    sessions: &[MaterializedSession],
    structure: &StructureDoc,
) -> Result<(), PipelineError> {
    let long_count =
        sessions.iter().filter(|session| session.intent == SessionIntent::Long).count() as u32;
    if long_count != structure.rules.long_run.required_count {
        return Err(PipelineError::new(
            Stage::TemplateSelection,
            "long_run_count",
            format!(
                "week materializes {} long runs, structure requires {}",
                long_count, structure.rules.long_run.required_count
            ),
        ));
    }

    let mut previous_hard_day: Option<i64> = None;
    for session in sessions {
        let day = session.starts_at.timestamp() / 86_400;
        if session.intent.is_hard() {
            if let Some(previous) = previous_hard_day {
                if day == previous + 1 {
                    return Err(PipelineError::new(
                        Stage::TemplateSelection,
                        "no_consecutive_hard_days",
                        "two hard-intent sessions fall on consecutive days".to_string(),
                    ));
                }
            }
            previous_hard_day = Some(day);
        }
    }

    Ok(())
}

/// B7 pre-write guard: no two sessions share the same user+starts_at second.
pub fn check_unique_start_times(sessions: &[MaterializedSession]) -> Result<(), PipelineError> {
    let mut seen = std::collections::BTreeSet::new();
    for session in sessions {
        if !seen.insert(session.starts_at.timestamp()) {
            return Err(PipelineError::new(
                Stage::Persistence,
                "unique_start_times",
                format!("two sessions start at {}", session.starts_at),
            ));
        }
    }
    Ok(())
}
