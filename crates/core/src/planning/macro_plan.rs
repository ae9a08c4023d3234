use chrono::Duration;
use tracing::debug;

use crate::domain::plan::{MacroWeek, Phase, PlanningContext};
use crate::domain::slot::RaceDistance;
use crate::planning::guards::{check_macro_plan, PipelineError, Stage};

const MIN_PLAN_WEEKS: i64 = 4;
const RAMP: f64 = 1.10;
const RECOVERY_FACTOR: f64 = 0.75;
/// A recovery week lands after every third consecutive build-direction week.
const RECOVERY_CADENCE: u32 = 4;
const TAPER_FIRST_FACTOR: f64 = 0.70;
const TAPER_DECAY: f64 = 0.78;

/// Distance-keyed volume defaults, in miles, for athletes who do not state
/// their current weekly mileage.
fn default_volumes(distance: RaceDistance) -> (f64, f64) {
    match distance {
        RaceDistance::FiveK => (25.0, 35.0),
        RaceDistance::TenK => (35.0, 50.0),
        RaceDistance::Half => (40.0, 65.0),
        RaceDistance::Marathon => (50.0, 80.0),
        RaceDistance::Ultra => (60.0, 100.0),
    }
}

/// Phase from relative position in the plan: first half base, to 80% build,
/// to 90% peak, then taper. The final week is always taper.
pub fn phase_for_week(week_number: u32, total_weeks: u32) -> Phase {
    let progress = week_number as f64 / total_weeks as f64;
    if week_number == total_weeks {
        Phase::Taper
    } else if progress <= 0.5 {
        Phase::Base
    } else if progress <= 0.8 {
        Phase::Build
    } else if progress <= 0.9 {
        Phase::Peak
    } else {
        Phase::Taper
    }
}

fn focus_for(phase: Phase) -> &'static str {
    match phase {
        Phase::Base => "aerobic base",
        Phase::Build => "race-specific work",
        Phase::Peak => "sharpening",
        Phase::Taper => "freshen up",
    }
}

/// B2: the macro plan. Weekly volume starts from the athlete's stated
/// mileage (or a distance default), ramps at most 10% per week toward a
/// peak, inserts a recovery week every third build-direction week, and
/// tapers monotonically into the race.
pub fn build_macro_plan(ctx: &PlanningContext) -> Result<Vec<MacroWeek>, PipelineError> {
    let total_days = ctx.days_to_race();
    let total_weeks = total_days / 7;

    if total_weeks < MIN_PLAN_WEEKS {
        return Err(PipelineError::new(
            Stage::MacroPlan,
            "minimum_weeks",
            format!(
                "only {total_weeks} full weeks between {} and {}; at least {MIN_PLAN_WEEKS} are required",
                ctx.plan_start, ctx.race_date
            ),
        ));
    }
    let total_weeks = total_weeks as u32;

    let (default_start, default_peak) = default_volumes(ctx.race_distance);
    let start_volume = ctx.weekly_mileage.unwrap_or(default_start);

    // Peak is bounded both by the doctrine default and by what a 10% ramp
    // can actually reach in the available build-direction weeks.
    let progression_weeks = ((total_weeks as f64) * 0.9).floor() as i32 - 1;
    let reachable_peak = start_volume * RAMP.powi(progression_weeks.max(0));
    let peak_volume = default_peak.max(start_volume).min(reachable_peak);

    let mut weeks = Vec::with_capacity(total_weeks as usize);
    let mut track = start_volume;
    let mut weeks_since_recovery = 1u32;
    let mut taper_volume = 0.0f64;

    for week_number in 1..=total_weeks {
        let phase = phase_for_week(week_number, total_weeks);
        let start = ctx.plan_start + Duration::weeks(i64::from(week_number) - 1);
        let days_to_race = (ctx.race_date - start).num_days();

        let (volume, is_recovery) = match phase {
            Phase::Taper => {
                taper_volume = if taper_volume == 0.0 {
                    track * TAPER_FIRST_FACTOR
                } else {
                    taper_volume * TAPER_DECAY
                };
                (taper_volume, false)
            }
            _ => {
                if week_number > 1 && weeks_since_recovery >= RECOVERY_CADENCE {
                    weeks_since_recovery = 1;
                    (track * RECOVERY_FACTOR, true)
                } else {
                    if week_number > 1 {
                        track = (track * RAMP).min(peak_volume);
                    }
                    weeks_since_recovery += 1;
                    (track, false)
                }
            }
        };

        weeks.push(MacroWeek {
            index: week_number,
            phase,
            focus: focus_for(phase).to_string(),
            target_weekly_miles: round_tenth(volume),
            start,
            days_to_race,
            is_recovery,
        });
    }

    check_macro_plan(&weeks)?;

    debug!(
        event_name = "plan.macro_plan_built",
        weeks = weeks.len(),
        start_volume,
        peak_volume,
        race_distance = ctx.race_distance.as_str(),
        "macro plan built"
    );

    Ok(weeks)
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::domain::athlete::AthleteProfile;
    use crate::domain::plan::{Phase, PlanningContext};
    use crate::domain::slot::RaceDistance;

    use super::{build_macro_plan, phase_for_week};

    fn context(weeks: i64, mileage: Option<f64>) -> PlanningContext {
        let plan_start = NaiveDate::from_ymd_opt(2026, 1, 5).expect("valid date");
        PlanningContext {
            athlete: AthleteProfile::new("user-1"),
            race_distance: RaceDistance::Marathon,
            race_date: plan_start + chrono::Duration::weeks(weeks),
            plan_start,
            target_time_secs: Some(3 * 3600),
            weekly_mileage: mileage,
            audience: "intermediate".to_string(),
            fatigue_factor: None,
        }
    }

    #[test]
    fn sixteen_week_plan_passes_its_own_guards() {
        let weeks = build_macro_plan(&context(16, Some(55.0))).expect("macro plan");
        assert_eq!(weeks.len(), 16);
        assert_eq!(weeks[0].target_weekly_miles, 55.0);
        assert_eq!(weeks.last().expect("last week").phase, Phase::Taper);
    }

    #[test]
    fn too_short_a_runway_is_rejected() {
        let error = build_macro_plan(&context(3, Some(40.0))).expect_err("3 weeks must fail");
        assert_eq!(error.guard, "minimum_weeks");
    }

    #[test]
    fn ramp_never_exceeds_ten_percent_between_progression_weeks() {
        let weeks = build_macro_plan(&context(20, Some(40.0))).expect("macro plan");

        let mut last_progression: Option<f64> = None;
        for week in &weeks {
            if week.is_recovery || week.phase == Phase::Taper {
                continue;
            }
            if let Some(previous) = last_progression {
                assert!(
                    week.target_weekly_miles <= previous * 1.10 + 0.11,
                    "week {} ramps from {previous} to {}",
                    week.index,
                    week.target_weekly_miles
                );
            }
            last_progression = Some(week.target_weekly_miles);
        }
    }

    #[test]
    fn recovery_weeks_appear_on_cadence() {
        let weeks = build_macro_plan(&context(16, Some(50.0))).expect("macro plan");
        let recovery_indices: Vec<u32> =
            weeks.iter().filter(|week| week.is_recovery).map(|week| week.index).collect();
        assert!(!recovery_indices.is_empty(), "a 16-week plan needs recovery weeks");
        assert!(recovery_indices.contains(&4), "first recovery lands on week 4");
    }

    #[test]
    fn taper_decreases_monotonically() {
        let weeks = build_macro_plan(&context(16, Some(55.0))).expect("macro plan");
        let tapers: Vec<f64> = weeks
            .iter()
            .filter(|week| week.phase == Phase::Taper)
            .map(|week| week.target_weekly_miles)
            .collect();
        assert!(!tapers.is_empty());
        for pair in tapers.windows(2) {
            assert!(pair[1] < pair[0], "taper must decrease: {pair:?}");
        }
    }

    #[test]
    fn default_volume_is_used_when_mileage_unknown() {
        let weeks = build_macro_plan(&context(16, None)).expect("macro plan");
        assert_eq!(weeks[0].target_weekly_miles, 50.0);
    }

    #[test]
    fn phase_boundaries_follow_plan_fractions() {
        assert_eq!(phase_for_week(1, 16), Phase::Base);
        assert_eq!(phase_for_week(8, 16), Phase::Base);
        assert_eq!(phase_for_week(9, 16), Phase::Build);
        assert_eq!(phase_for_week(12, 16), Phase::Build);
        assert_eq!(phase_for_week(13, 16), Phase::Peak);
        assert_eq!(phase_for_week(14, 16), Phase::Peak);
        assert_eq!(phase_for_week(15, 16), Phase::Taper);
        assert_eq!(phase_for_week(16, 16), Phase::Taper);
    }
}
