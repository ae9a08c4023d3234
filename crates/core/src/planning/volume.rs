use tracing::debug;

use crate::corpus::StructureDoc;
use crate::domain::session::SessionIntent;
use crate::planning::guards::{check_week_volume, PipelineError, Stage};

const LONG_RUN_SHARE: f64 = 0.30;
const LONG_RUN_SHARE_MIN: f64 = 0.25;
const LONG_RUN_SHARE_MAX: f64 = 0.35;
const EASY_FLOOR_MI: f64 = 2.0;
const HARD_FLOOR_MI: f64 = 1.0;
pub const FATIGUE_MIN: f64 = 0.7;
pub const FATIGUE_MAX: f64 = 1.0;

#[derive(Clone, Debug, PartialEq)]
pub struct DayAllocation {
    pub day_index: usize,
    pub session_type: String,
    pub intent: SessionIntent,
    pub miles: f64,
}

/// B4: deterministic weekly volume allocation.
///
/// The long run takes 25–35% of weekly volume, easy days keep a 2-mile
/// floor, rest days stay at zero, and hard days absorb the residual. When
/// the target is too small to honor every floor, trailing easy days become
/// rest days. Fatigue feedback scales the target by a factor clamped into
/// `[0.7, 1.0]` before allocation.
pub fn allocate_week(
    structure: &StructureDoc,
    target_weekly_miles: f64,
    fatigue_factor: Option<f64>,
) -> Result<Vec<DayAllocation>, PipelineError> {
    if target_weekly_miles <= 0.0 {
        return Err(PipelineError::new(
            Stage::VolumeAllocation,
            "positive_target",
            format!("weekly target {target_weekly_miles} must be positive"),
        ));
    }

    let scale = fatigue_factor.map(|f| f.clamp(FATIGUE_MIN, FATIGUE_MAX)).unwrap_or(1.0);
    let target = target_weekly_miles * scale;

    let mut days: Vec<(usize, String, SessionIntent)> = (0..7)
        .map(|day_index| {
            let session_type = structure.week_pattern.session_type(day_index).to_string();
            let intent = structure.intent_for(&session_type);
            (day_index, session_type, intent)
        })
        .collect();

    let long_required = structure.rules.long_run.required_count > 0;
    let long_miles = if long_required {
        (target * LONG_RUN_SHARE)
            .clamp(target * LONG_RUN_SHARE_MIN, target * LONG_RUN_SHARE_MAX)
    } else {
        0.0
    };
    let residual = target - long_miles;

    // Feasibility: demote trailing easy days to rest until the floors fit.
    loop {
        let easy_count = days.iter().filter(|(_, _, intent)| *intent == SessionIntent::Easy).count();
        let hard_count = days.iter().filter(|(_, _, intent)| intent.is_hard()).count();
        let floor_demand = EASY_FLOOR_MI * easy_count as f64 + HARD_FLOOR_MI * hard_count as f64;
        if residual >= floor_demand || easy_count == 0 {
            break;
        }
        if let Some(last_easy) = days
            .iter()
            .rposition(|(_, _, intent)| *intent == SessionIntent::Easy)
        {
            days[last_easy].1 = "rest".to_string();
            days[last_easy].2 = SessionIntent::Rest;
        }
    }

    let easy_count =
        days.iter().filter(|(_, _, intent)| *intent == SessionIntent::Easy).count();
    let hard_count = days.iter().filter(|(_, _, intent)| intent.is_hard()).count();
    let active = easy_count + hard_count;

    let (easy_each, hard_each) = if active == 0 {
        (0.0, 0.0)
    } else if hard_count == 0 {
        (residual / easy_count as f64, 0.0)
    } else if easy_count == 0 {
        (0.0, residual / hard_count as f64)
    } else {
        // Ideal is an even split; easy days keep their floor, hard days
        // absorb whatever remains.
        let ideal = residual / active as f64;
        let easy_each = ideal.max(EASY_FLOOR_MI);
        let hard_each = (residual - easy_each * easy_count as f64) / hard_count as f64;
        (easy_each, hard_each)
    };

    if hard_count > 0 && hard_each < 0.0 {
        return Err(PipelineError::new(
            Stage::VolumeAllocation,
            "hard_day_nonnegative",
            format!("hard-day allocation went negative for target {target:.1}"),
        ));
    }

    let mut allocations: Vec<DayAllocation> = Vec::with_capacity(7);
    let mut allocated_except_long = 0.0f64;

    for (day_index, session_type, intent) in &days {
        let miles = match intent {
            SessionIntent::Rest => 0.0,
            SessionIntent::Long => continue,
            SessionIntent::Easy => round_tenth(easy_each),
            SessionIntent::Quality => round_tenth(hard_each),
        };
        allocated_except_long += miles;
        allocations.push(DayAllocation {
            day_index: *day_index,
            session_type: session_type.clone(),
            intent: *intent,
            miles,
        });
    }

    // The long run absorbs rounding drift so the week sums exactly.
    if long_required {
        for (day_index, session_type, intent) in &days {
            if *intent == SessionIntent::Long {
                allocations.push(DayAllocation {
                    day_index: *day_index,
                    session_type: session_type.clone(),
                    intent: *intent,
                    miles: target - allocated_except_long,
                });
            }
        }
    } else if let Some(first_easy) =
        allocations.iter_mut().find(|allocation| allocation.intent == SessionIntent::Easy)
    {
        first_easy.miles += target - allocated_except_long;
    }

    allocations.sort_by_key(|allocation| allocation.day_index);
    check_week_volume(&allocations, target)?;

    debug!(
        event_name = "plan.volume_allocated",
        structure_id = %structure.meta.id,
        target = target,
        scale = scale,
        days = allocations.len(),
        "weekly volume allocated"
    );

    Ok(allocations)
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use crate::corpus::fixtures;
    use crate::corpus::StructureDoc;
    use crate::domain::session::SessionIntent;

    use super::{allocate_week, FATIGUE_MIN};

    fn build_structure() -> StructureDoc {
        let store = fixtures::seeded_store();
        store
            .structures()
            .iter()
            .find(|doc| doc.meta.id == "struct-pol-build")
            .expect("build structure seeded")
            .clone()
    }

    #[test]
    fn allocation_sums_to_target_within_one_percent() {
        let structure = build_structure();
        for target in [10.0, 22.5, 40.0, 55.0, 80.0, 120.0] {
            let allocations = allocate_week(&structure, target, None).expect("allocation");
            let total: f64 = allocations.iter().map(|allocation| allocation.miles).sum();
            assert!(
                (total - target).abs() <= target * 0.01,
                "target {target}: allocated {total}"
            );
        }
    }

    #[test]
    fn long_run_takes_a_quarter_to_a_third_of_the_week() {
        let structure = build_structure();
        let allocations = allocate_week(&structure, 50.0, None).expect("allocation");
        let long = allocations
            .iter()
            .find(|allocation| allocation.intent == SessionIntent::Long)
            .expect("long run allocated");
        assert!(long.miles >= 50.0 * 0.25 - 0.5 && long.miles <= 50.0 * 0.35 + 0.5);
    }

    #[test]
    fn rest_days_stay_at_zero() {
        let structure = build_structure();
        let allocations = allocate_week(&structure, 50.0, None).expect("allocation");
        for allocation in &allocations {
            if allocation.intent == SessionIntent::Rest {
                assert_eq!(allocation.miles, 0.0);
            }
        }
    }

    #[test]
    fn easy_days_keep_their_floor_at_moderate_volume() {
        let structure = build_structure();
        let allocations = allocate_week(&structure, 30.0, None).expect("allocation");
        for allocation in &allocations {
            if allocation.intent == SessionIntent::Easy {
                assert!(allocation.miles >= 2.0, "easy day below floor: {allocation:?}");
            }
        }
    }

    #[test]
    fn tiny_weeks_demote_easy_days_instead_of_failing() {
        let structure = build_structure();
        let allocations = allocate_week(&structure, 8.0, None).expect("allocation");
        let total: f64 = allocations.iter().map(|allocation| allocation.miles).sum();
        assert!((total - 8.0).abs() <= 8.0 * 0.01);

        let active_easy = allocations
            .iter()
            .filter(|allocation| {
                allocation.intent == SessionIntent::Easy && allocation.miles > 0.0
            })
            .count();
        assert!(active_easy < 3, "tiny week should drop easy days");
    }

    #[test]
    fn fatigue_factor_scales_and_clamps() {
        let structure = build_structure();

        let scaled = allocate_week(&structure, 50.0, Some(0.8)).expect("allocation");
        let total: f64 = scaled.iter().map(|allocation| allocation.miles).sum();
        assert!((total - 40.0).abs() <= 40.0 * 0.01);

        // Below the clamp floor, 0.5 behaves as 0.7.
        let clamped = allocate_week(&structure, 50.0, Some(0.5)).expect("allocation");
        let total: f64 = clamped.iter().map(|allocation| allocation.miles).sum();
        assert!((total - 50.0 * FATIGUE_MIN).abs() <= 50.0 * FATIGUE_MIN * 0.01);
    }

    #[test]
    fn allocation_is_deterministic() {
        let structure = build_structure();
        let first = allocate_week(&structure, 47.3, None).expect("allocation");
        let second = allocate_week(&structure, 47.3, None).expect("allocation");
        assert_eq!(first, second);
    }

    #[test]
    fn zero_target_is_rejected() {
        let structure = build_structure();
        let error = allocate_week(&structure, 0.0, None).expect_err("zero target must fail");
        assert_eq!(error.guard, "positive_target");
    }
}
