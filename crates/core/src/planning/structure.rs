use tracing::debug;

use crate::corpus::{CorpusStore, StructureDoc};
use crate::domain::plan::MacroWeek;
use crate::planning::guards::{check_structure, PipelineError, Stage};

/// B3: pick the week structure for one macro week.
///
/// Taper structures win whenever the week is inside their
/// `taper_days_to_race_le` horizon; otherwise the phase/window match
/// applies. Highest priority wins, ties break lexicographically by id.
pub fn structure_for_week<'a>(
    store: &'a CorpusStore,
    philosophy_id: &str,
    race_type: &str,
    audience: &str,
    week: &MacroWeek,
) -> Result<&'a StructureDoc, PipelineError> {
    let taper_candidates: Vec<&StructureDoc> = store
        .taper_structures_for(philosophy_id, race_type, audience)
        .into_iter()
        .filter(|doc| {
            doc.taper_days_to_race_le
                .map(|threshold| week.days_to_race <= threshold)
                .unwrap_or(false)
        })
        .filter(|doc| doc.contains_days_to_race(week.days_to_race))
        .collect();

    let candidates = if taper_candidates.is_empty() {
        store
            .structures_for(philosophy_id, race_type, audience, week.phase)
            .into_iter()
            .filter(|doc| doc.contains_days_to_race(week.days_to_race))
            .collect()
    } else {
        taper_candidates
    };

    let winner = candidates
        .into_iter()
        .max_by(|a, b| {
            a.meta
                .priority
                .cmp(&b.meta.priority)
                .then_with(|| b.meta.id.cmp(&a.meta.id))
        })
        .ok_or_else(|| {
            PipelineError::new(
                Stage::StructureLoading,
                "structure_available",
                format!(
                    "no structure for philosophy={philosophy_id} race_type={race_type} \
                     audience={audience} phase={} days_to_race={}",
                    week.phase.as_str(),
                    week.days_to_race
                ),
            )
        })?;

    check_structure(winner)?;

    debug!(
        event_name = "plan.structure_loaded",
        week_index = week.index,
        structure_id = %winner.meta.id,
        phase = week.phase.as_str(),
        days_to_race = week.days_to_race,
        "week structure loaded"
    );

    Ok(winner)
}

/// Resolves a structure for every macro week, in order.
pub fn load_structures<'a>(
    store: &'a CorpusStore,
    philosophy_id: &str,
    race_type: &str,
    audience: &str,
    weeks: &[MacroWeek],
) -> Result<Vec<&'a StructureDoc>, PipelineError> {
    weeks
        .iter()
        .map(|week| structure_for_week(store, philosophy_id, race_type, audience, week))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::corpus::fixtures;
    use crate::domain::plan::{MacroWeek, Phase};

    use super::{load_structures, structure_for_week};

    fn week(index: u32, phase: Phase, days_to_race: i64) -> MacroWeek {
        MacroWeek {
            index,
            phase,
            focus: "test".to_string(),
            target_weekly_miles: 50.0,
            start: NaiveDate::from_ymd_opt(2026, 1, 5).expect("valid date"),
            days_to_race,
            is_recovery: false,
        }
    }

    #[test]
    fn build_week_matches_the_build_structure() {
        let store = fixtures::seeded_store();
        let structure = structure_for_week(
            &store,
            "polarized",
            "marathon",
            "intermediate",
            &week(6, Phase::Build, 70),
        )
        .expect("structure");
        assert_eq!(structure.meta.id, "struct-pol-build");
    }

    #[test]
    fn taper_structure_wins_inside_its_horizon() {
        let store = fixtures::seeded_store();

        // Even with phase peak, 18 days out falls inside the taper horizon.
        let structure = structure_for_week(
            &store,
            "polarized",
            "marathon",
            "intermediate",
            &week(15, Phase::Peak, 18),
        )
        .expect("structure");
        assert_eq!(structure.meta.id, "struct-pol-taper");
    }

    #[test]
    fn missing_structure_is_a_guard_violation() {
        let store = fixtures::seeded_store();
        let error = structure_for_week(
            &store,
            "nonexistent",
            "marathon",
            "intermediate",
            &week(1, Phase::Base, 100),
        )
        .expect_err("unknown philosophy has no structures");
        assert_eq!(error.guard, "structure_available");
    }

    #[test]
    fn every_macro_week_resolves_for_the_seeded_corpus() {
        let store = fixtures::seeded_store();
        let weeks = vec![
            week(1, Phase::Base, 112),
            week(2, Phase::Base, 105),
            week(3, Phase::Build, 56),
            week(4, Phase::Peak, 28),
            week(5, Phase::Taper, 14),
        ];

        let structures =
            load_structures(&store, "polarized", "marathon", "intermediate", &weeks)
                .expect("all weeks resolve");
        assert_eq!(structures.len(), 5);
        assert_eq!(structures[4].meta.id, "struct-pol-taper");
    }
}
