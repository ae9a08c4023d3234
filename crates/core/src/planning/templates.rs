use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::debug;

use crate::corpus::{CorpusStore, SessionTemplate, StructureDoc};
use crate::domain::plan::MacroWeek;
use crate::domain::session::{
    miles_to_meters, MaterializedSession, PrimaryMetric, SessionIntent, Sport,
};
use crate::planning::guards::{check_week_sessions, PipelineError, Stage};
use crate::planning::volume::DayAllocation;

/// Planned sessions start at a fixed local-morning hour; the idempotency
/// key includes `starts_at`, so this must stay stable across regenerations.
const SESSION_START_HOUR: u32 = 7;

/// B5: select the highest-priority matching template for each allocated
/// day and instantiate its parameters against the allocated distance.
/// Ties break lexicographically by template id.
pub fn materialize_week(
    store: &CorpusStore,
    philosophy_id: &str,
    race_type: &str,
    audience: &str,
    week: &MacroWeek,
    structure: &StructureDoc,
    allocations: &[DayAllocation],
) -> Result<Vec<MaterializedSession>, PipelineError> {
    let mut sessions = Vec::new();

    for allocation in allocations {
        if allocation.intent == SessionIntent::Rest {
            continue;
        }

        let template = pick_template(
            store,
            philosophy_id,
            race_type,
            audience,
            week,
            &allocation.session_type,
        )?;

        let resolved_miles =
            template.resolve_distance_mi(allocation.miles).unwrap_or(allocation.miles);

        sessions.push(MaterializedSession {
            starts_at: session_start(week, allocation.day_index),
            sport: Sport::Run,
            session_type: allocation.session_type.clone(),
            intent: allocation.intent,
            metric: PrimaryMetric::DistanceMeters(miles_to_meters(resolved_miles)),
            description: template.description.clone(),
            steps: Vec::new(),
        });
    }

    rebalance_clamped_distance(&mut sessions, store, philosophy_id, race_type, audience, week, allocations)?;
    check_week_sessions(&sessions, structure)?;

    debug!(
        event_name = "plan.templates_selected",
        week_index = week.index,
        sessions = sessions.len(),
        "templates selected and sessions materialized"
    );

    Ok(sessions)
}

fn pick_template<'a>(
    store: &'a CorpusStore,
    philosophy_id: &str,
    race_type: &str,
    audience: &str,
    week: &MacroWeek,
    session_type: &str,
) -> Result<&'a SessionTemplate, PipelineError> {
    store
        .templates_for(philosophy_id, race_type, audience, week.phase, session_type)
        .into_iter()
        .max_by(|a, b| a.priority.cmp(&b.priority).then_with(|| b.id.cmp(&a.id)))
        .ok_or_else(|| {
            PipelineError::new(
                Stage::TemplateSelection,
                "template_available",
                format!(
                    "no template for philosophy={philosophy_id} race_type={race_type} \
                     audience={audience} phase={} session_type={session_type}",
                    week.phase.as_str()
                ),
            )
        })
}

/// If template bounds clamped any day away from its allocation, push the
/// difference onto the long run (within its own bounds) so the weekly sum
/// survives template instantiation.
#[allow(clippy::too_many_arguments)]
fn rebalance_clamped_distance(
    sessions: &mut [MaterializedSession],
    store: &CorpusStore,
    philosophy_id: &str,
    race_type: &str,
    audience: &str,
    week: &MacroWeek,
    allocations: &[DayAllocation],
) -> Result<(), PipelineError> {
    let allocated: f64 = allocations.iter().map(|allocation| allocation.miles).sum();
    let materialized: f64 = sessions
        .iter()
        .filter_map(|session| session.metric.distance_meters())
        .map(crate::domain::session::meters_to_miles)
        .sum();
    let drift = allocated - materialized;
    if drift.abs() < 0.05 {
        return Ok(());
    }

    let Some(long_session) =
        sessions.iter_mut().find(|session| session.intent == SessionIntent::Long)
    else {
        return Ok(());
    };
    let current = long_session
        .metric
        .distance_meters()
        .map(crate::domain::session::meters_to_miles)
        .unwrap_or(0.0);

    let template =
        pick_template(store, philosophy_id, race_type, audience, week, &long_session.session_type)?;
    let adjusted = template.resolve_distance_mi(current + drift).unwrap_or(current + drift);
    long_session.metric = PrimaryMetric::DistanceMeters(miles_to_meters(adjusted));
    Ok(())
}

fn session_start(week: &MacroWeek, day_index: usize) -> DateTime<Utc> {
    let date = week.start + Duration::days(day_index as i64);
    let time = chrono::NaiveTime::from_hms_opt(SESSION_START_HOUR, 0, 0)
        .expect("fixed session start hour is a valid time");
    Utc.from_utc_datetime(&date.and_time(time))
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate};

    use crate::corpus::fixtures;
    use crate::domain::plan::{MacroWeek, Phase};
    use crate::domain::session::{meters_to_miles, SessionIntent};
    use crate::planning::volume::allocate_week;

    use super::materialize_week;

    fn week(target: f64) -> MacroWeek {
        MacroWeek {
            index: 6,
            phase: Phase::Build,
            focus: "race-specific work".to_string(),
            target_weekly_miles: target,
            start: NaiveDate::from_ymd_opt(2026, 2, 9).expect("valid date"),
            days_to_race: 70,
            is_recovery: false,
        }
    }

    #[test]
    fn materialized_week_keeps_the_allocated_total() {
        let store = fixtures::seeded_store();
        let structure = store
            .structures()
            .iter()
            .find(|doc| doc.meta.id == "struct-pol-build")
            .expect("build structure");

        let week = week(55.0);
        let allocations = allocate_week(structure, 55.0, None).expect("allocation");
        let sessions = materialize_week(
            &store,
            "polarized",
            "marathon",
            "intermediate",
            &week,
            structure,
            &allocations,
        )
        .expect("materialize");

        let total: f64 = sessions
            .iter()
            .filter_map(|session| session.metric.distance_meters())
            .map(meters_to_miles)
            .sum();
        assert!((total - 55.0).abs() <= 0.6, "materialized total {total}");
    }

    #[test]
    fn exactly_one_long_run_per_week() {
        let store = fixtures::seeded_store();
        let structure = store
            .structures()
            .iter()
            .find(|doc| doc.meta.id == "struct-pol-build")
            .expect("build structure");

        let week = week(50.0);
        let allocations = allocate_week(structure, 50.0, None).expect("allocation");
        let sessions = materialize_week(
            &store,
            "polarized",
            "marathon",
            "intermediate",
            &week,
            structure,
            &allocations,
        )
        .expect("materialize");

        let long_runs =
            sessions.iter().filter(|session| session.intent == SessionIntent::Long).count();
        assert_eq!(long_runs, 1);
    }

    #[test]
    fn rest_days_produce_no_sessions() {
        let store = fixtures::seeded_store();
        let structure = store
            .structures()
            .iter()
            .find(|doc| doc.meta.id == "struct-pol-build")
            .expect("build structure");

        let week = week(50.0);
        let allocations = allocate_week(structure, 50.0, None).expect("allocation");
        let sessions = materialize_week(
            &store,
            "polarized",
            "marathon",
            "intermediate",
            &week,
            structure,
            &allocations,
        )
        .expect("materialize");

        // Monday is rest in the build structure.
        assert_eq!(sessions.len(), 6);
        assert!(sessions
            .iter()
            .all(|session| session.starts_at.weekday() != chrono::Weekday::Mon));
    }

    #[test]
    fn sessions_start_at_the_fixed_morning_hour() {
        let store = fixtures::seeded_store();
        let structure = store
            .structures()
            .iter()
            .find(|doc| doc.meta.id == "struct-pol-build")
            .expect("build structure");

        let week = week(50.0);
        let allocations = allocate_week(structure, 50.0, None).expect("allocation");
        let sessions = materialize_week(
            &store,
            "polarized",
            "marathon",
            "intermediate",
            &week,
            structure,
            &allocations,
        )
        .expect("materialize");

        for session in &sessions {
            assert_eq!(chrono::Timelike::hour(&session.starts_at), 7);
        }
    }

    #[test]
    fn missing_template_is_a_guard_violation() {
        let store = fixtures::seeded_store();
        let structure = store
            .structures()
            .iter()
            .find(|doc| doc.meta.id == "struct-pol-build")
            .expect("build structure");

        let week = week(50.0);
        let allocations = allocate_week(structure, 50.0, None).expect("allocation");
        let error = materialize_week(
            &store,
            "polarized",
            "marathon",
            "advanced",
            &week,
            structure,
            &allocations,
        )
        .expect_err("no advanced templates seeded");
        assert_eq!(error.guard, "template_available");
    }
}
