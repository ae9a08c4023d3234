//! Data tool server: conversation, progress, activity, and planning tools
//! over `POST /mcp/tools/call`.
//!
//! Every tool has a typed request struct with `deny_unknown_fields`; the
//! dynamic `arguments` value is validated at this boundary and nowhere else.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{error, info};

use cadence_core::corpus::CorpusStore;
use cadence_core::domain::athlete::AthleteProfile;
use cadence_core::domain::conversation::{ConversationId, Progress};
use cadence_core::domain::plan::PlanningContext;
use cadence_core::domain::session::{
    DayModification, MaterializedSession, PrimaryMetric, SessionIntent, Sport, WorkoutStep,
};
use cadence_core::domain::slot::RaceDistance;
use cadence_core::planning::{
    PlanWriteReport, PlannedSessionWriter, PlanningPipeline, SeasonContext, SessionTextGenerator,
};
use cadence_db::repositories::{
    ActivityRepository, ConversationRepository, PlannedSessionRepository, ProgressRepository,
    RepositoryError, SessionLinkRepository, SqlActivityRepository, SqlConversationRepository,
    SqlPlannedSessionRepository, SqlProgressRepository, SqlSessionLinkRepository,
};
use cadence_db::DbPool;

use crate::protocol::{ErrorCode, ToolCallRequest, ToolCallResponse, ToolErrorBody};

pub struct DataServerState {
    conversations: SqlConversationRepository,
    progress: SqlProgressRepository,
    sessions: SqlPlannedSessionRepository,
    activities: SqlActivityRepository,
    links: SqlSessionLinkRepository,
    corpus: Arc<CorpusStore>,
    text_generator: Arc<dyn SessionTextGenerator>,
    plan_deadline: Duration,
}

impl DataServerState {
    pub fn new(
        pool: DbPool,
        corpus: Arc<CorpusStore>,
        text_generator: Arc<dyn SessionTextGenerator>,
        plan_deadline: Duration,
    ) -> Self {
        Self {
            conversations: SqlConversationRepository::new(pool.clone()),
            progress: SqlProgressRepository::new(pool.clone()),
            sessions: SqlPlannedSessionRepository::new(pool.clone()),
            activities: SqlActivityRepository::new(pool.clone()),
            links: SqlSessionLinkRepository::new(pool),
            corpus,
            text_generator,
            plan_deadline,
        }
    }
}

pub fn router(state: Arc<DataServerState>) -> Router {
    Router::new()
        .route("/mcp/tools/call", post(call_tool))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "server": "cadence-data-tools"}))
}

async fn call_tool(
    State(state): State<Arc<DataServerState>>,
    Json(request): Json<ToolCallRequest>,
) -> Json<ToolCallResponse> {
    Json(dispatch(&state, request).await)
}

/// Routes one request to its typed handler. Unknown tools and malformed
/// argument shapes never touch the repositories.
pub async fn dispatch(state: &DataServerState, request: ToolCallRequest) -> ToolCallResponse {
    let tool = request.tool.as_str();
    let result = match tool {
        "load_context" => load_context(state, request.arguments).await,
        "save_context" => save_context(state, request.arguments).await,
        "load_progress" => load_progress(state, request.arguments).await,
        "save_progress" => save_progress(state, request.arguments).await,
        "get_recent_activities" => get_recent_activities(state, request.arguments).await,
        "save_planned_sessions" => save_planned_sessions(state, request.arguments).await,
        "plan_race_build" => plan_race_build(state, request.arguments).await,
        "plan_season" => plan_season(state, request.arguments).await,
        "weekly_plan" => weekly_plan(state, request.arguments).await,
        "add_workout" => add_workout(state, request.arguments).await,
        "modify_day" => modify_day(state, request.arguments).await,
        "modify_week" => modify_week(state, request.arguments).await,
        "link_session" => link_session(state, request.arguments).await,
        "race_plan_exists" => race_plan_exists(state, request.arguments).await,
        other => Err(ToolErrorBody {
            code: ErrorCode::InvalidInput,
            message: format!("tool `{other}` is not served here"),
        }),
    };

    match result {
        Ok(value) => ToolCallResponse::success(value),
        Err(body) => {
            error!(
                event_name = "tool.request_failed",
                tool,
                code = body.code.as_str(),
                message = %body.message,
                "tool request failed"
            );
            ToolCallResponse::Failure { error: body }
        }
    }
}

fn reject(code: ErrorCode, message: impl Into<String>) -> ToolErrorBody {
    ToolErrorBody { code, message: message.into() }
}

fn parse_arguments<T: serde::de::DeserializeOwned>(
    arguments: serde_json::Value,
    code: ErrorCode,
) -> Result<T, ToolErrorBody> {
    serde_json::from_value(arguments)
        .map_err(|err| reject(code, format!("invalid arguments: {err}")))
}

fn db_error(error: RepositoryError) -> ToolErrorBody {
    reject(ErrorCode::DbError, error.to_string())
}

// ---------------------------------------------------------------------------
// Conversation context
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoadContextRequest {
    conversation_id: String,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    20
}

async fn load_context(
    state: &DataServerState,
    arguments: serde_json::Value,
) -> Result<serde_json::Value, ToolErrorBody> {
    let request: LoadContextRequest = parse_arguments(arguments, ErrorCode::InvalidInput)?;
    if request.limit == 0 || request.limit > 200 {
        return Err(reject(ErrorCode::InvalidLimit, "limit must be in range 1..=200"));
    }

    let messages = state
        .conversations
        .load_recent_messages(&ConversationId(request.conversation_id), request.limit)
        .await
        .map_err(db_error)?;

    let rendered: Vec<serde_json::Value> = messages
        .iter()
        .map(|message| {
            serde_json::json!({
                "role": message.sender.as_str(),
                "content": message.content,
                "created_at": message.created_at.to_rfc3339(),
            })
        })
        .collect();

    Ok(serde_json::json!({ "messages": rendered }))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SaveContextRequest {
    conversation_id: String,
    user_id: String,
    model_name: String,
    user_message: String,
    assistant_message: String,
}

async fn save_context(
    state: &DataServerState,
    arguments: serde_json::Value,
) -> Result<serde_json::Value, ToolErrorBody> {
    let request: SaveContextRequest = parse_arguments(arguments, ErrorCode::InvalidInput)?;
    if request.user_id.trim().is_empty() {
        return Err(reject(ErrorCode::UserNotFound, "user_id must not be empty"));
    }
    if request.user_message.trim().is_empty() || request.assistant_message.trim().is_empty() {
        return Err(reject(
            ErrorCode::InvalidMessage,
            "user_message and assistant_message must not be empty",
        ));
    }
    if request.model_name.trim().is_empty() {
        return Err(reject(ErrorCode::InvalidInput, "model_name must not be empty"));
    }

    let conversation_id = ConversationId(request.conversation_id);
    state
        .conversations
        .ensure_conversation(&conversation_id, &request.user_id)
        .await
        .map_err(db_error)?;
    state
        .conversations
        .append_turn(
            &conversation_id,
            request.user_message.trim(),
            request.assistant_message.trim(),
            &request.model_name,
        )
        .await
        .map_err(db_error)?;

    Ok(serde_json::json!({ "success": true }))
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoadProgressRequest {
    conversation_id: String,
}

async fn load_progress(
    state: &DataServerState,
    arguments: serde_json::Value,
) -> Result<serde_json::Value, ToolErrorBody> {
    let request: LoadProgressRequest = parse_arguments(arguments, ErrorCode::InvalidInput)?;
    let stored = state
        .progress
        .load(&ConversationId(request.conversation_id))
        .await
        .map_err(db_error)?;

    Ok(match stored {
        Some(stored) => serde_json::json!({
            "progress": stored.progress,
            "version": stored.version,
        }),
        None => serde_json::json!({ "progress": null, "version": 0 }),
    })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SaveProgressRequest {
    conversation_id: String,
    user_id: String,
    progress: Progress,
    expected_version: Option<i64>,
}

async fn save_progress(
    state: &DataServerState,
    arguments: serde_json::Value,
) -> Result<serde_json::Value, ToolErrorBody> {
    let request: SaveProgressRequest = parse_arguments(arguments, ErrorCode::InvalidInput)?;
    if let Err(message) = request.progress.check_invariants() {
        return Err(reject(ErrorCode::InvalidInput, message));
    }

    let conversation_id = ConversationId(request.conversation_id);
    state
        .conversations
        .ensure_conversation(&conversation_id, &request.user_id)
        .await
        .map_err(db_error)?;

    let version = state
        .progress
        .save(&conversation_id, &request.progress, request.expected_version)
        .await
        .map_err(|err| match err {
            RepositoryError::VersionConflict { stored, expected } => reject(
                ErrorCode::InvalidInput,
                format!("progress version conflict: stored {stored}, expected {expected}"),
            ),
            other => db_error(other),
        })?;

    Ok(serde_json::json!({ "version": version }))
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecentActivitiesRequest {
    user_id: String,
    #[serde(default = "default_days")]
    days: u32,
}

fn default_days() -> u32 {
    7
}

async fn get_recent_activities(
    state: &DataServerState,
    arguments: serde_json::Value,
) -> Result<serde_json::Value, ToolErrorBody> {
    let request: RecentActivitiesRequest = parse_arguments(arguments, ErrorCode::InvalidInput)?;
    if request.days == 0 || request.days > 365 {
        return Err(reject(ErrorCode::InvalidDays, "days must be in range 1..=365"));
    }

    let activities = state
        .activities
        .recent_for_user(&request.user_id, request.days, Utc::now())
        .await
        .map_err(db_error)?;

    Ok(serde_json::json!({ "activities": activities }))
}

// ---------------------------------------------------------------------------
// Planned sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SessionPayload {
    starts_at: String,
    session_type: String,
    intent: String,
    distance_meters: Option<f64>,
    duration_seconds: Option<i64>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    steps: Vec<WorkoutStep>,
}

impl SessionPayload {
    fn into_session(self) -> Result<MaterializedSession, ToolErrorBody> {
        let starts_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&self.starts_at)
            .map(|value| value.with_timezone(&Utc))
            .map_err(|err| {
                reject(
                    ErrorCode::InvalidDateFormat,
                    format!("starts_at `{}` is not RFC 3339: {err}", self.starts_at),
                )
            })?;
        let intent = SessionIntent::parse(&self.intent).ok_or_else(|| {
            reject(
                ErrorCode::InvalidSessionData,
                format!("intent `{}` is not one of rest|easy|long|quality", self.intent),
            )
        })?;
        let metric = PrimaryMetric::from_columns(self.distance_meters, self.duration_seconds)
            .map_err(|message| reject(ErrorCode::InvalidSessionData, message))?;

        Ok(MaterializedSession {
            starts_at,
            sport: Sport::Run,
            session_type: self.session_type,
            intent,
            metric,
            description: self.description,
            steps: self.steps,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SavePlannedSessionsRequest {
    user_id: String,
    plan_id: String,
    plan_type: String,
    sessions: Vec<SessionPayload>,
}

async fn save_planned_sessions(
    state: &DataServerState,
    arguments: serde_json::Value,
) -> Result<serde_json::Value, ToolErrorBody> {
    let request: SavePlannedSessionsRequest =
        parse_arguments(arguments, ErrorCode::InvalidSessionData)?;
    if request.user_id.trim().is_empty() || request.plan_id.trim().is_empty() {
        return Err(reject(ErrorCode::InvalidInput, "user_id and plan_id are required"));
    }

    let mut sessions = Vec::with_capacity(request.sessions.len());
    for payload in request.sessions {
        sessions.push(payload.into_session()?);
    }

    let report = state
        .sessions
        .upsert_plan(&request.user_id, &request.plan_id, &request.plan_type, &sessions)
        .await
        .map_err(db_error)?;

    Ok(write_report_json(&report))
}

fn write_report_json(report: &PlanWriteReport) -> serde_json::Value {
    serde_json::json!({
        "saved_count": report.inserted,
        "updated_count": report.updated,
        "conflicts": report.conflicts,
    })
}

// ---------------------------------------------------------------------------
// Planning tools
// ---------------------------------------------------------------------------

struct RepositoryPlanWriter<'a> {
    sessions: &'a SqlPlannedSessionRepository,
}

#[async_trait]
impl PlannedSessionWriter for RepositoryPlanWriter<'_> {
    async fn write_plan(
        &self,
        user_id: &str,
        plan_id: &str,
        plan_type: &str,
        sessions: &[MaterializedSession],
    ) -> anyhow::Result<PlanWriteReport> {
        Ok(self.sessions.upsert_plan(user_id, plan_id, plan_type, sessions).await?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanRaceBuildRequest {
    user_id: String,
    #[serde(default)]
    conversation_id: Option<String>,
    race_distance: String,
    race_date: String,
    #[serde(default)]
    target_time: Option<String>,
    #[serde(default)]
    weekly_mileage: Option<f64>,
    #[serde(default)]
    goal_pace_secs_per_mile: Option<u32>,
    #[serde(default = "default_audience")]
    audience: String,
    #[serde(default)]
    athlete_tags: Vec<String>,
}

fn default_audience() -> String {
    "intermediate".to_string()
}

async fn plan_race_build(
    state: &DataServerState,
    arguments: serde_json::Value,
) -> Result<serde_json::Value, ToolErrorBody> {
    let request: PlanRaceBuildRequest = parse_arguments(arguments, ErrorCode::MissingRaceInfo)?;

    let race_distance = RaceDistance::parse(&request.race_distance).ok_or_else(|| {
        reject(
            ErrorCode::MissingRaceInfo,
            format!("race_distance `{}` is not a known distance", request.race_distance),
        )
    })?;
    let race_date = NaiveDate::parse_from_str(&request.race_date, "%Y-%m-%d").map_err(|err| {
        reject(
            ErrorCode::InvalidDateFormat,
            format!("race_date `{}` is not YYYY-MM-DD: {err}", request.race_date),
        )
    })?;
    let today = Utc::now().date_naive();
    if race_date <= today {
        return Err(reject(
            ErrorCode::InvalidRaceDate,
            format!("race date {race_date} is in the past; a future date is required"),
        ));
    }

    let target_time_secs = match &request.target_time {
        Some(raw) => Some(parse_hms(raw).ok_or_else(|| {
            reject(
                ErrorCode::InvalidInput,
                format!("target_time `{raw}` is not HH:MM:SS"),
            )
        })?),
        None => None,
    };

    let fatigue_factor = fatigue_from_recent(state, &request.user_id, request.weekly_mileage)
        .await
        .map_err(db_error)?;

    let mut athlete = AthleteProfile::new(request.user_id.clone());
    athlete.race_goal_pace_secs_per_mile = request
        .goal_pace_secs_per_mile
        .or_else(|| target_time_secs.map(|secs| goal_pace_from_target(secs, race_distance)));
    athlete.tags = request.athlete_tags.clone();

    let ctx = PlanningContext {
        athlete,
        race_distance,
        race_date,
        plan_start: today,
        target_time_secs,
        weekly_mileage: request.weekly_mileage,
        audience: request.audience.clone(),
        fatigue_factor,
    };

    let plan_id = format!("race_{}_{}", race_distance.as_str(), race_date.format("%Y%m%d"));
    let pipeline = PlanningPipeline::new(&state.corpus);
    let writer = RepositoryPlanWriter { sessions: &state.sessions };

    let outcome = tokio::time::timeout(
        state.plan_deadline,
        pipeline.run_race_build(&ctx, &plan_id, state.text_generator.as_ref(), &writer),
    )
    .await
    .map_err(|_| {
        reject(
            ErrorCode::DbError,
            format!("plan deadline of {:?} exceeded; no sessions were persisted", state.plan_deadline),
        )
    })?
    .map_err(|err| reject(ErrorCode::DbError, format!("failed to plan race build: {err}")))?;

    info!(
        event_name = "tool.plan_race_build_completed",
        user_id = %request.user_id,
        conversation_id = request.conversation_id.as_deref().unwrap_or("none"),
        plan_id = %outcome.plan_id,
        weeks = outcome.weeks.len(),
        sessions = outcome.sessions.len(),
        "race build planned"
    );

    Ok(serde_json::json!({
        "success": true,
        "plan_id": outcome.plan_id,
        "philosophy_id": outcome.philosophy_id,
        "total_weeks": outcome.weeks.len(),
        "race_distance": race_distance.as_str(),
        "race_date": race_date.format("%Y-%m-%d").to_string(),
        "saved_count": outcome.report.inserted,
        "updated_count": outcome.report.updated,
        "conflicts": outcome.report.conflicts,
        "message": format!(
            "Planned a {}-week {} build with {} training sessions.",
            outcome.weeks.len(),
            race_distance.as_str(),
            outcome.sessions.len()
        ),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanSeasonRequest {
    user_id: String,
    season_start: String,
    season_end: String,
    #[serde(default)]
    weekly_mileage: Option<f64>,
    #[serde(default = "default_audience")]
    audience: String,
}

async fn plan_season(
    state: &DataServerState,
    arguments: serde_json::Value,
) -> Result<serde_json::Value, ToolErrorBody> {
    let request: PlanSeasonRequest = parse_arguments(arguments, ErrorCode::MissingSeasonInfo)?;

    let season_start =
        NaiveDate::parse_from_str(&request.season_start, "%Y-%m-%d").map_err(|err| {
            reject(
                ErrorCode::InvalidSeasonDates,
                format!("season_start `{}` is not YYYY-MM-DD: {err}", request.season_start),
            )
        })?;
    let season_end =
        NaiveDate::parse_from_str(&request.season_end, "%Y-%m-%d").map_err(|err| {
            reject(
                ErrorCode::InvalidSeasonDates,
                format!("season_end `{}` is not YYYY-MM-DD: {err}", request.season_end),
            )
        })?;
    if season_end <= season_start {
        return Err(reject(
            ErrorCode::InvalidSeasonDates,
            "season_end must be after season_start",
        ));
    }

    let ctx = SeasonContext {
        athlete: AthleteProfile::new(request.user_id.clone()),
        season_start,
        season_end,
        weekly_mileage: request.weekly_mileage,
        audience: request.audience.clone(),
    };

    let plan_id =
        format!("season_{}_{}", season_start.format("%Y%m%d"), season_end.format("%Y%m%d"));
    let pipeline = PlanningPipeline::new(&state.corpus);
    let writer = RepositoryPlanWriter { sessions: &state.sessions };

    let outcome = tokio::time::timeout(
        state.plan_deadline,
        pipeline.run_season(&ctx, &plan_id, state.text_generator.as_ref(), &writer),
    )
    .await
    .map_err(|_| {
        reject(
            ErrorCode::DbError,
            format!("plan deadline of {:?} exceeded; no sessions were persisted", state.plan_deadline),
        )
    })?
    .map_err(|err| reject(ErrorCode::DbError, format!("failed to plan season: {err}")))?;

    Ok(serde_json::json!({
        "success": true,
        "plan_id": outcome.plan_id,
        "total_weeks": outcome.weeks.len(),
        "season_start": season_start.format("%Y-%m-%d").to_string(),
        "season_end": season_end.format("%Y-%m-%d").to_string(),
        "saved_count": outcome.report.inserted,
        "updated_count": outcome.report.updated,
        "message": format!(
            "Planned a {}-week season with {} training sessions.",
            outcome.weeks.len(),
            outcome.sessions.len()
        ),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WeeklyPlanRequest {
    user_id: String,
    #[serde(default)]
    week_start: Option<String>,
    #[serde(default)]
    weekly_mileage: Option<f64>,
    #[serde(default = "default_audience")]
    audience: String,
}

async fn weekly_plan(
    state: &DataServerState,
    arguments: serde_json::Value,
) -> Result<serde_json::Value, ToolErrorBody> {
    let request: WeeklyPlanRequest = parse_arguments(arguments, ErrorCode::InvalidInput)?;

    let week_start = match &request.week_start {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|err| {
            reject(
                ErrorCode::InvalidDateFormat,
                format!("week_start `{raw}` is not YYYY-MM-DD: {err}"),
            )
        })?,
        // Default to tomorrow so today's completed training stays untouched.
        None => Utc::now().date_naive().succ_opt().ok_or_else(|| {
            reject(ErrorCode::InvalidInput, "cannot compute a default week start")
        })?,
    };

    let ctx = cadence_core::planning::WeekContext {
        athlete: AthleteProfile::new(request.user_id.clone()),
        week_start,
        weekly_mileage: request.weekly_mileage,
        audience: request.audience.clone(),
    };

    let plan_id = format!("week_{}", week_start.format("%Y%m%d"));
    let pipeline = PlanningPipeline::new(&state.corpus);
    let writer = RepositoryPlanWriter { sessions: &state.sessions };

    let outcome = tokio::time::timeout(
        state.plan_deadline,
        pipeline.run_week(&ctx, &plan_id, state.text_generator.as_ref(), &writer),
    )
    .await
    .map_err(|_| {
        reject(
            ErrorCode::DbError,
            format!("plan deadline of {:?} exceeded; no sessions were persisted", state.plan_deadline),
        )
    })?
    .map_err(|err| reject(ErrorCode::DbError, format!("failed to plan week: {err}")))?;

    Ok(serde_json::json!({
        "success": true,
        "plan_id": outcome.plan_id,
        "week_start": week_start.format("%Y-%m-%d").to_string(),
        "saved_count": outcome.report.inserted,
        "updated_count": outcome.report.updated,
        "conflicts": outcome.report.conflicts,
        "message": format!(
            "Planned your training week starting {} with {} sessions.",
            week_start.format("%B %d"),
            outcome.sessions.len()
        ),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AddWorkoutRequest {
    user_id: String,
    workout_description: String,
}

async fn add_workout(
    state: &DataServerState,
    arguments: serde_json::Value,
) -> Result<serde_json::Value, ToolErrorBody> {
    let request: AddWorkoutRequest =
        parse_arguments(arguments, ErrorCode::InvalidWorkoutDescription)?;
    if request.workout_description.trim().is_empty() {
        return Err(reject(
            ErrorCode::InvalidWorkoutDescription,
            "workout_description must not be empty",
        ));
    }

    let session = parse_workout_description(&request.workout_description, Utc::now())
        .ok_or_else(|| {
            reject(
                ErrorCode::InvalidWorkoutDescription,
                format!(
                    "could not extract a workout from `{}`",
                    request.workout_description
                ),
            )
        })?;

    let plan_id = format!("single_{}", session.starts_at.format("%Y%m%d"));
    let report = state
        .sessions
        .upsert_plan(&request.user_id, &plan_id, "single", &[session.clone()])
        .await
        .map_err(db_error)?;

    let date_label = session.starts_at.format("%B %d, %Y").to_string();
    Ok(serde_json::json!({
        "success": true,
        "saved_count": report.inserted,
        "updated_count": report.updated,
        "conflicts": report.conflicts,
        "message": format!("Workout added to your calendar for {date_label}."),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModifyDayRequest {
    user_id: String,
    day: String,
    #[serde(default)]
    session_type: Option<String>,
    #[serde(default)]
    distance_meters: Option<f64>,
    #[serde(default)]
    duration_seconds: Option<i64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    explicit_intent_change: bool,
}

async fn modify_day(
    state: &DataServerState,
    arguments: serde_json::Value,
) -> Result<serde_json::Value, ToolErrorBody> {
    let request: ModifyDayRequest = parse_arguments(arguments, ErrorCode::InvalidInput)?;

    let day = NaiveDate::parse_from_str(&request.day, "%Y-%m-%d").map_err(|err| {
        reject(
            ErrorCode::InvalidDateFormat,
            format!("day `{}` is not YYYY-MM-DD: {err}", request.day),
        )
    })?;

    let metric = match (request.distance_meters, request.duration_seconds) {
        (None, None) => None,
        (distance, duration) => Some(
            PrimaryMetric::from_columns(distance, duration)
                .map_err(|message| reject(ErrorCode::InvalidSessionData, message))?,
        ),
    };
    let intent = match &request.intent {
        Some(raw) => Some(SessionIntent::parse(raw).ok_or_else(|| {
            reject(
                ErrorCode::InvalidSessionData,
                format!("intent `{raw}` is not one of rest|easy|long|quality"),
            )
        })?),
        None => None,
    };

    let modification = DayModification {
        session_type: request.session_type.clone(),
        metric,
        description: request.description.clone(),
        intent,
        explicit_intent_change: request.explicit_intent_change,
    };

    let record = state
        .sessions
        .modify_day(&request.user_id, day, &modification)
        .await
        .map_err(|err| match err {
            RepositoryError::NotFound(message) => reject(ErrorCode::InvalidInput, message),
            other => db_error(other),
        })?;

    Ok(serde_json::json!({
        "success": true,
        "session_id": record.id,
        "session_type": record.session.session_type,
        "intent": record.session.intent.as_str(),
        "description": record.session.description,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModifyWeekRequest {
    user_id: String,
    week_start: String,
    workout_description: String,
}

async fn modify_week(
    state: &DataServerState,
    arguments: serde_json::Value,
) -> Result<serde_json::Value, ToolErrorBody> {
    let request: ModifyWeekRequest = parse_arguments(arguments, ErrorCode::InvalidInput)?;

    let week_start =
        NaiveDate::parse_from_str(&request.week_start, "%Y-%m-%d").map_err(|err| {
            reject(
                ErrorCode::InvalidDateFormat,
                format!("week_start `{}` is not YYYY-MM-DD: {err}", request.week_start),
            )
        })?;

    let lowered = request.workout_description.to_ascii_lowercase();
    let factor = if ["easier", "reduce", "cut back", "lighter", "tired"]
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        0.85
    } else if ["harder", "more", "increase", "bigger"].iter().any(|marker| lowered.contains(marker))
    {
        1.1
    } else {
        return Err(reject(
            ErrorCode::InvalidWorkoutDescription,
            "week modifications must say whether to go easier or harder",
        ));
    };

    let from = week_start
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| reject(ErrorCode::InvalidDateFormat, "invalid week_start"))?;
    let to = from + chrono::Duration::days(7);

    let modified = state
        .sessions
        .scale_range(&request.user_id, from, to, factor)
        .await
        .map_err(db_error)?;

    Ok(serde_json::json!({
        "success": true,
        "modified_count": modified,
        "scale_factor": factor,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RacePlanExistsRequest {
    user_id: String,
}

async fn race_plan_exists(
    state: &DataServerState,
    arguments: serde_json::Value,
) -> Result<serde_json::Value, ToolErrorBody> {
    let request: RacePlanExistsRequest = parse_arguments(arguments, ErrorCode::InvalidInput)?;
    let exists = state.sessions.race_plan_exists(&request.user_id).await.map_err(db_error)?;
    Ok(serde_json::json!({ "exists": exists }))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinkSessionRequest {
    planned_session_id: i64,
    activity_id: i64,
    method: String,
    confidence: f64,
}

async fn link_session(
    state: &DataServerState,
    arguments: serde_json::Value,
) -> Result<serde_json::Value, ToolErrorBody> {
    let request: LinkSessionRequest = parse_arguments(arguments, ErrorCode::InvalidInput)?;
    if !(0.0..=1.0).contains(&request.confidence) {
        return Err(reject(ErrorCode::InvalidInput, "confidence must be in [0, 1]"));
    }

    let link = state
        .links
        .link(
            request.planned_session_id,
            request.activity_id,
            &request.method,
            request.confidence,
        )
        .await
        .map_err(|err| match err {
            RepositoryError::DuplicateLink { .. } => reject(ErrorCode::InvalidInput, err.to_string()),
            other => db_error(other),
        })?;

    Ok(serde_json::json!({ "success": true, "link": link }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_hms(text: &str) -> Option<u32> {
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: u32 = parts[0].parse().ok()?;
    let minutes: u32 = parts[1].parse().ok()?;
    let seconds: u32 = parts[2].parse().ok()?;
    if minutes >= 60 || seconds >= 60 {
        return None;
    }
    Some(hours * 3600 + minutes * 60 + seconds)
}

fn goal_pace_from_target(target_secs: u32, distance: RaceDistance) -> u32 {
    let miles = match distance {
        RaceDistance::FiveK => 3.107,
        RaceDistance::TenK => 6.214,
        RaceDistance::Half => 13.109,
        RaceDistance::Marathon => 26.219,
        RaceDistance::Ultra => 31.07,
    };
    ((target_secs as f64) / miles).round() as u32
}

/// Bounded fatigue factor from the last week of completed activities: the
/// further recent volume sits above the stated weekly mileage, the lower
/// the factor, clamped to `[0.7, 1.0]` downstream.
async fn fatigue_from_recent(
    state: &DataServerState,
    user_id: &str,
    weekly_mileage: Option<f64>,
) -> Result<Option<f64>, RepositoryError> {
    let Some(weekly_mileage) = weekly_mileage else {
        return Ok(None);
    };
    let activities = state.activities.recent_for_user(user_id, 7, Utc::now()).await?;
    if activities.is_empty() {
        return Ok(None);
    }

    let recent_miles: f64 = activities
        .iter()
        .filter_map(|activity| activity.distance_meters)
        .map(cadence_core::domain::session::meters_to_miles)
        .sum();
    let load_ratio = recent_miles / weekly_mileage.max(1.0);

    Ok(Some(if load_ratio > 1.5 {
        0.7
    } else if load_ratio > 1.2 {
        0.85
    } else {
        1.0
    }))
}

const WORKOUT_TYPES: [(&str, &str, SessionIntent); 6] = [
    ("interval", "intervals", SessionIntent::Quality),
    ("tempo", "tempo", SessionIntent::Quality),
    ("threshold", "tempo", SessionIntent::Quality),
    ("long", "long_run", SessionIntent::Long),
    ("recovery", "easy", SessionIntent::Easy),
    ("easy", "easy", SessionIntent::Easy),
];

/// One-line workout parser for ad-hoc additions: a session type keyword, an
/// optional `N min` duration or `N mile` distance, and an optional
/// `today`/`tomorrow` day word (default tomorrow).
fn parse_workout_description(
    description: &str,
    now: DateTime<Utc>,
) -> Option<MaterializedSession> {
    let lowered = description.to_ascii_lowercase();

    let (session_type, intent) = WORKOUT_TYPES
        .iter()
        .find(|(keyword, _, _)| lowered.contains(keyword))
        .map(|(_, session_type, intent)| ((*session_type).to_string(), *intent))
        .unwrap_or_else(|| ("easy".to_string(), SessionIntent::Easy));

    let tokens: Vec<&str> = lowered.split_whitespace().collect();
    let mut duration_minutes: Option<i64> = None;
    let mut distance_miles: Option<f64> = None;
    for (index, token) in tokens.iter().enumerate() {
        let Some(next) = tokens.get(index + 1) else {
            continue;
        };
        if next.starts_with("min") {
            duration_minutes = token.parse::<i64>().ok();
        } else if next.starts_with("mile") || *next == "mi" {
            distance_miles = token.parse::<f64>().ok();
        }
    }

    let day = if lowered.contains("today") { now.date_naive() } else { now.date_naive().succ_opt()? };
    let starts_at = day.and_hms_opt(7, 0, 0)?.and_utc();

    let metric = match (distance_miles, duration_minutes) {
        (Some(miles), _) => {
            PrimaryMetric::DistanceMeters(cadence_core::domain::session::miles_to_meters(miles))
        }
        (None, Some(minutes)) => PrimaryMetric::DurationSeconds(minutes * 60),
        (None, None) => PrimaryMetric::DurationSeconds(45 * 60),
    };

    let label = format!("{} on {}", session_type, day.format("%A, %B %d"));

    Some(MaterializedSession {
        starts_at,
        sport: Sport::Run,
        session_type,
        intent,
        metric,
        description: label,
        steps: Vec::new(),
    })
}
