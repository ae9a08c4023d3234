use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::corpus::CorpusStore;
use crate::domain::athlete::AthleteProfile;
use crate::domain::plan::{MacroWeek, Phase, PlanningContext};
use crate::domain::session::MaterializedSession;
use crate::domain::slot::RaceDistance;
use crate::planning::guards::{
    check_macro_plan, check_unique_start_times, PipelineError, Stage,
};
use crate::planning::macro_plan::build_macro_plan;
use crate::planning::philosophy::select_philosophy;
use crate::planning::session_text::{generate_with_fallback, SessionTextGenerator};
use crate::planning::structure::structure_for_week;
use crate::planning::templates::materialize_week;
use crate::planning::volume::allocate_week;

/// A session that could not be written because a completed session already
/// occupies the same day. The planned session is skipped, never overwritten.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub starts_at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanWriteReport {
    pub inserted: u32,
    pub updated: u32,
    pub conflicts: Vec<ConflictRecord>,
}

/// B7 seam: persists one plan's sessions atomically under the plan's
/// idempotency keys. The pipeline issues exactly one write per invocation.
#[async_trait]
pub trait PlannedSessionWriter: Send + Sync {
    async fn write_plan(
        &self,
        user_id: &str,
        plan_id: &str,
        plan_type: &str,
        sessions: &[MaterializedSession],
    ) -> anyhow::Result<PlanWriteReport>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlanOutcome {
    pub plan_id: String,
    pub philosophy_id: String,
    pub weeks: Vec<MacroWeek>,
    pub sessions: Vec<MaterializedSession>,
    pub report: PlanWriteReport,
}

/// Inputs for season materialization: a base/build season across a date
/// span, reusing the weekly pipeline without a race-day taper.
#[derive(Clone, Debug, PartialEq)]
pub struct SeasonContext {
    pub athlete: AthleteProfile,
    pub season_start: NaiveDate,
    pub season_end: NaiveDate,
    pub weekly_mileage: Option<f64>,
    pub audience: String,
}

/// Inputs for materializing one standalone training week, used when a
/// weekly plan is requested on top of an existing race build.
#[derive(Clone, Debug, PartialEq)]
pub struct WeekContext {
    pub athlete: AthleteProfile,
    pub week_start: NaiveDate,
    pub weekly_mileage: Option<f64>,
    pub audience: String,
}

const SEASON_RAMP: f64 = 1.08;
const SEASON_PEAK_FACTOR: f64 = 1.25;
const SEASON_RECOVERY_CADENCE: u32 = 4;
const SEASON_RECOVERY_FACTOR: f64 = 0.75;

/// The deterministic planning pipeline, stages B2 through B7. Stages are
/// pure functions over the corpus; the only suspension points are text
/// generation and the final persistence call, and no stage mutates an
/// earlier stage's output.
pub struct PlanningPipeline<'a> {
    corpus: &'a CorpusStore,
}

impl<'a> PlanningPipeline<'a> {
    pub fn new(corpus: &'a CorpusStore) -> Self {
        Self { corpus }
    }

    pub async fn run_race_build(
        &self,
        ctx: &PlanningContext,
        plan_id: &str,
        text_generator: &dyn SessionTextGenerator,
        writer: &dyn PlannedSessionWriter,
    ) -> Result<PlanOutcome, PipelineError> {
        let weeks = build_macro_plan(ctx)?;
        stage_completed(Stage::MacroPlan, 15, plan_id);

        let selection = select_philosophy(self.corpus, ctx)?;
        stage_completed(Stage::PhilosophySelection, 25, plan_id);

        let race_type = ctx.race_distance.as_str();
        let sessions = self
            .materialize_weeks(
                &weeks,
                &selection.philosophy_id,
                race_type,
                &ctx.audience,
                ctx.fatigue_factor,
                plan_id,
            )?;

        let sessions = self
            .generate_text(sessions, ctx.athlete.race_goal_pace_secs_per_mile, text_generator)
            .await?;
        stage_completed(Stage::SessionText, 85, plan_id);

        let report = self
            .persist(&ctx.athlete.user_id.0, plan_id, "race_build", &sessions, writer)
            .await?;
        stage_completed(Stage::Persistence, 100, plan_id);

        Ok(PlanOutcome {
            plan_id: plan_id.to_string(),
            philosophy_id: selection.philosophy_id,
            weeks,
            sessions,
            report,
        })
    }

    pub async fn run_season(
        &self,
        ctx: &SeasonContext,
        plan_id: &str,
        text_generator: &dyn SessionTextGenerator,
        writer: &dyn PlannedSessionWriter,
    ) -> Result<PlanOutcome, PipelineError> {
        let weeks = build_season_macro(ctx)?;
        stage_completed(Stage::MacroPlan, 15, plan_id);

        // Season structure and templates come from the same doctrine as a
        // marathon build; seasons have no race-type slot of their own.
        let planning_ctx = PlanningContext {
            athlete: ctx.athlete.clone(),
            race_distance: RaceDistance::Marathon,
            race_date: ctx.season_end,
            plan_start: ctx.season_start,
            target_time_secs: None,
            weekly_mileage: ctx.weekly_mileage,
            audience: ctx.audience.clone(),
            fatigue_factor: None,
        };
        let selection = select_philosophy(self.corpus, &planning_ctx)?;
        stage_completed(Stage::PhilosophySelection, 25, plan_id);

        let sessions = self.materialize_weeks(
            &weeks,
            &selection.philosophy_id,
            RaceDistance::Marathon.as_str(),
            &ctx.audience,
            None,
            plan_id,
        )?;

        let sessions = self
            .generate_text(sessions, ctx.athlete.race_goal_pace_secs_per_mile, text_generator)
            .await?;
        stage_completed(Stage::SessionText, 85, plan_id);

        let report =
            self.persist(&ctx.athlete.user_id.0, plan_id, "season", &sessions, writer).await?;
        stage_completed(Stage::Persistence, 100, plan_id);

        Ok(PlanOutcome {
            plan_id: plan_id.to_string(),
            philosophy_id: selection.philosophy_id,
            weeks,
            sessions,
            report,
        })
    }

    /// Materializes and persists a single build-structured week. The week
    /// is treated as mid-build: far enough from any race that taper
    /// structures never apply.
    pub async fn run_week(
        &self,
        ctx: &WeekContext,
        plan_id: &str,
        text_generator: &dyn SessionTextGenerator,
        writer: &dyn PlannedSessionWriter,
    ) -> Result<PlanOutcome, PipelineError> {
        let volume = ctx.weekly_mileage.unwrap_or(40.0);
        let weeks = vec![MacroWeek {
            index: 1,
            phase: Phase::Build,
            focus: "sustained development".to_string(),
            target_weekly_miles: volume,
            start: ctx.week_start,
            days_to_race: 60,
            is_recovery: false,
        }];

        let planning_ctx = PlanningContext {
            athlete: ctx.athlete.clone(),
            race_distance: RaceDistance::Marathon,
            race_date: ctx.week_start + Duration::days(60),
            plan_start: ctx.week_start,
            target_time_secs: None,
            weekly_mileage: ctx.weekly_mileage,
            audience: ctx.audience.clone(),
            fatigue_factor: None,
        };
        let selection = select_philosophy(self.corpus, &planning_ctx)?;

        let sessions = self.materialize_weeks(
            &weeks,
            &selection.philosophy_id,
            RaceDistance::Marathon.as_str(),
            &ctx.audience,
            None,
            plan_id,
        )?;
        let sessions = self
            .generate_text(sessions, ctx.athlete.race_goal_pace_secs_per_mile, text_generator)
            .await?;
        stage_completed(Stage::SessionText, 85, plan_id);

        let report =
            self.persist(&ctx.athlete.user_id.0, plan_id, "weekly", &sessions, writer).await?;
        stage_completed(Stage::Persistence, 100, plan_id);

        Ok(PlanOutcome {
            plan_id: plan_id.to_string(),
            philosophy_id: selection.philosophy_id,
            weeks,
            sessions,
            report,
        })
    }

    fn materialize_weeks(
        &self,
        weeks: &[MacroWeek],
        philosophy_id: &str,
        race_type: &str,
        audience: &str,
        fatigue_factor: Option<f64>,
        plan_id: &str,
    ) -> Result<Vec<MaterializedSession>, PipelineError> {
        let mut sessions = Vec::new();

        for week in weeks {
            let structure =
                structure_for_week(self.corpus, philosophy_id, race_type, audience, week)?;
            let allocations =
                allocate_week(structure, week.target_weekly_miles, fatigue_factor)?;
            let mut week_sessions = materialize_week(
                self.corpus,
                philosophy_id,
                race_type,
                audience,
                week,
                structure,
                &allocations,
            )?;
            sessions.append(&mut week_sessions);
        }

        stage_completed(Stage::StructureLoading, 40, plan_id);
        stage_completed(Stage::VolumeAllocation, 55, plan_id);
        stage_completed(Stage::TemplateSelection, 70, plan_id);

        Ok(sessions)
    }

    async fn generate_text(
        &self,
        mut sessions: Vec<MaterializedSession>,
        goal_pace: Option<u32>,
        text_generator: &dyn SessionTextGenerator,
    ) -> Result<Vec<MaterializedSession>, PipelineError> {
        for session in &mut sessions {
            let text = generate_with_fallback(text_generator, session, goal_pace).await;
            session.description = text.description;
            session.steps = text.steps;
            session.validate_steps().map_err(|message| {
                PipelineError::new(Stage::SessionText, "step_schema", message)
            })?;
        }
        Ok(sessions)
    }

    async fn persist(
        &self,
        user_id: &str,
        plan_id: &str,
        plan_type: &str,
        sessions: &[MaterializedSession],
        writer: &dyn PlannedSessionWriter,
    ) -> Result<PlanWriteReport, PipelineError> {
        check_unique_start_times(sessions)?;

        writer.write_plan(user_id, plan_id, plan_type, sessions).await.map_err(|error| {
            PipelineError::new(
                Stage::Persistence,
                "write_applied",
                format!("plan persistence failed: {error}"),
            )
        })
    }
}

fn build_season_macro(ctx: &SeasonContext) -> Result<Vec<MacroWeek>, PipelineError> {
    let total_days = (ctx.season_end - ctx.season_start).num_days();
    let total_weeks = total_days / 7;
    if total_weeks < 4 {
        return Err(PipelineError::new(
            Stage::MacroPlan,
            "minimum_weeks",
            format!("season spans only {total_weeks} full weeks; at least 4 are required"),
        ));
    }
    let total_weeks = total_weeks as u32;

    let start_volume = ctx.weekly_mileage.unwrap_or(40.0);
    let peak_volume = start_volume * SEASON_PEAK_FACTOR;

    let mut weeks = Vec::with_capacity(total_weeks as usize);
    let mut track = start_volume;
    let mut weeks_since_recovery = 1u32;

    for week_number in 1..=total_weeks {
        let phase = if (week_number as f64 / total_weeks as f64) <= 0.4 {
            Phase::Base
        } else {
            Phase::Build
        };
        let start = ctx.season_start + Duration::weeks(i64::from(week_number) - 1);
        let days_to_race = (ctx.season_end - start).num_days();

        let (volume, is_recovery) =
            if week_number > 1 && weeks_since_recovery >= SEASON_RECOVERY_CADENCE {
                weeks_since_recovery = 1;
                (track * SEASON_RECOVERY_FACTOR, true)
            } else {
                if week_number > 1 {
                    track = (track * SEASON_RAMP).min(peak_volume);
                }
                weeks_since_recovery += 1;
                (track, false)
            };

        weeks.push(MacroWeek {
            index: week_number,
            phase,
            focus: if phase == Phase::Base { "aerobic base" } else { "sustained development" }
                .to_string(),
            target_weekly_miles: (volume * 10.0).round() / 10.0,
            start,
            days_to_race,
            is_recovery,
        });
    }

    check_macro_plan(&weeks)?;
    Ok(weeks)
}

fn stage_completed(stage: Stage, percent: u8, plan_id: &str) {
    info!(
        event_name = "plan.stage_completed",
        stage = stage.as_str(),
        percent,
        plan_id,
        "pipeline stage completed"
    );
}
