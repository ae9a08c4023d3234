use cadence_core::chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use cadence_core::domain::session::{
    DayModification, MaterializedSession, PrimaryMetric, SessionIntent, Sport, WorkoutStep,
};
use cadence_core::planning::{ConflictRecord, PlanWriteReport};

use super::conversation::parse_datetime;
use super::{PlannedSessionRepository, RepositoryError};
use crate::DbPool;

pub const STATUS_PLANNED: &str = "planned";
pub const STATUS_COMPLETED: &str = "completed";

#[derive(Clone, Debug, PartialEq)]
pub struct PlannedSessionRecord {
    pub id: i64,
    pub user_id: String,
    pub plan_id: String,
    pub plan_type: String,
    pub status: String,
    pub session: MaterializedSession,
}

pub struct SqlPlannedSessionRepository {
    pool: DbPool,
}

impl SqlPlannedSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Marks an existing session completed. Used by tests and by activity
    /// reconciliation, which lives outside this system.
    pub async fn mark_completed(&self, session_id: i64) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE planned_sessions SET status = ?, updated_at = ? WHERE id = ?")
            .bind(STATUS_COMPLETED)
            .bind(Utc::now().to_rfc3339())
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn decode_record(row: &SqliteRow) -> Result<PlannedSessionRecord, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(RepositoryError::Database)?;
    let user_id: String = row.try_get("user_id").map_err(RepositoryError::Database)?;
    let plan_id: String = row.try_get("plan_id").map_err(RepositoryError::Database)?;
    let plan_type: String = row.try_get("plan_type").map_err(RepositoryError::Database)?;
    let status: String = row.try_get("status").map_err(RepositoryError::Database)?;
    let starts_raw: String = row.try_get("starts_at").map_err(RepositoryError::Database)?;
    let session_type: String = row.try_get("session_type").map_err(RepositoryError::Database)?;
    let intent_raw: String = row.try_get("intent").map_err(RepositoryError::Database)?;
    let duration_seconds: Option<i64> =
        row.try_get("duration_seconds").map_err(RepositoryError::Database)?;
    let distance_meters: Option<f64> =
        row.try_get("distance_meters").map_err(RepositoryError::Database)?;
    let description: String = row.try_get("description").map_err(RepositoryError::Database)?;
    let steps_raw: String = row.try_get("steps").map_err(RepositoryError::Database)?;

    let intent = SessionIntent::parse(&intent_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown session intent `{intent_raw}`"))
    })?;
    let metric =
        PrimaryMetric::from_columns(distance_meters, duration_seconds).map_err(|message| {
            RepositoryError::Decode(format!("session {id}: {message}"))
        })?;
    let steps: Vec<WorkoutStep> = serde_json::from_str(&steps_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid steps JSON: {error}")))?;

    Ok(PlannedSessionRecord {
        id,
        user_id,
        plan_id,
        plan_type,
        status,
        session: MaterializedSession {
            starts_at: parse_datetime("starts_at", &starts_raw)?,
            sport: Sport::Run,
            session_type,
            intent,
            metric,
            description,
            steps,
        },
    })
}

const RECORD_COLUMNS: &str = "id, user_id, plan_id, plan_type, status, starts_at, session_type, \
                              intent, duration_seconds, distance_meters, description, steps";

#[async_trait::async_trait]
impl PlannedSessionRepository for SqlPlannedSessionRepository {
    async fn upsert_plan(
        &self,
        user_id: &str,
        plan_id: &str,
        plan_type: &str,
        sessions: &[MaterializedSession],
    ) -> Result<PlanWriteReport, RepositoryError> {
        let mut report = PlanWriteReport::default();
        let now = Utc::now().to_rfc3339();

        // One transaction per plan: the whole write becomes visible
        // atomically or not at all.
        let mut tx = self.pool.begin().await?;

        for session in sessions {
            let day = session.starts_at.date_naive();
            let day_start = format!("{day}T00:00:00");
            let day_end = format!("{day}T23:59:59.999");

            let completed: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM planned_sessions \
                 WHERE user_id = ? AND status = ? AND starts_at BETWEEN ? AND ?",
            )
            .bind(user_id)
            .bind(STATUS_COMPLETED)
            .bind(&day_start)
            .bind(&day_end)
            .fetch_one(&mut *tx)
            .await?;

            if completed > 0 {
                report.conflicts.push(ConflictRecord {
                    starts_at: session.starts_at,
                    reason: format!("completed session already exists on {day}"),
                });
                continue;
            }

            let starts_at = session.starts_at.to_rfc3339();
            let existing: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM planned_sessions \
                 WHERE user_id = ? AND plan_id = ? AND starts_at = ? AND session_type = ?",
            )
            .bind(user_id)
            .bind(plan_id)
            .bind(&starts_at)
            .bind(&session.session_type)
            .fetch_optional(&mut *tx)
            .await?;

            let steps = serde_json::to_string(&session.steps).map_err(|error| {
                RepositoryError::Decode(format!("steps serialization failed: {error}"))
            })?;

            sqlx::query(
                r#"
                INSERT INTO planned_sessions (
                    user_id, plan_id, plan_type, starts_at, sport, session_type, intent,
                    duration_seconds, distance_meters, description, steps, status,
                    created_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(user_id, plan_id, starts_at, session_type) DO UPDATE SET
                    intent = excluded.intent,
                    duration_seconds = excluded.duration_seconds,
                    distance_meters = excluded.distance_meters,
                    description = excluded.description,
                    steps = excluded.steps,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(user_id)
            .bind(plan_id)
            .bind(plan_type)
            .bind(&starts_at)
            .bind(session.sport.as_str())
            .bind(&session.session_type)
            .bind(session.intent.as_str())
            .bind(session.metric.duration_seconds())
            .bind(session.metric.distance_meters())
            .bind(&session.description)
            .bind(&steps)
            .bind(STATUS_PLANNED)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            if existing.is_some() {
                report.updated += 1;
            } else {
                report.inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(report)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PlannedSessionRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM planned_sessions \
             WHERE user_id = ? AND starts_at >= ? AND starts_at < ? \
             ORDER BY starts_at ASC"
        ))
        .bind(user_id)
        .bind(from.to_rfc3339())
        .bind(to.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_record).collect()
    }

    async fn modify_day(
        &self,
        user_id: &str,
        day: NaiveDate,
        modification: &DayModification,
    ) -> Result<PlannedSessionRecord, RepositoryError> {
        let day_start = format!("{day}T00:00:00");
        let day_end = format!("{day}T23:59:59.999");

        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM planned_sessions \
             WHERE user_id = ? AND starts_at BETWEEN ? AND ? AND status = ? \
             ORDER BY starts_at ASC LIMIT 1"
        ))
        .bind(user_id)
        .bind(&day_start)
        .bind(&day_end)
        .bind(STATUS_PLANNED)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            RepositoryError::NotFound(format!("no planned session for {user_id} on {day}"))
        })?;

        let mut record = decode_record(&row)?;

        // The MODIFY rule: metrics and text may change, but intent is copied
        // verbatim unless the caller explicitly asked for an intent change.
        if let Some(session_type) = &modification.session_type {
            record.session.session_type = session_type.clone();
        }
        if let Some(metric) = modification.metric {
            record.session.metric = metric;
        }
        if let Some(description) = &modification.description {
            record.session.description = description.clone();
        }
        if modification.explicit_intent_change {
            if let Some(intent) = modification.intent {
                record.session.intent = intent;
            }
        }

        sqlx::query(
            r#"
            UPDATE planned_sessions
            SET session_type = ?, intent = ?, duration_seconds = ?, distance_meters = ?,
                description = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.session.session_type)
        .bind(record.session.intent.as_str())
        .bind(record.session.metric.duration_seconds())
        .bind(record.session.metric.distance_meters())
        .bind(&record.session.description)
        .bind(Utc::now().to_rfc3339())
        .bind(record.id)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn scale_range(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        factor: f64,
    ) -> Result<u32, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE planned_sessions
            SET distance_meters = CASE WHEN distance_meters IS NULL THEN NULL
                                       ELSE distance_meters * ? END,
                duration_seconds = CASE WHEN duration_seconds IS NULL THEN NULL
                                        ELSE CAST(duration_seconds * ? AS INTEGER) END,
                updated_at = ?
            WHERE user_id = ? AND status = ? AND starts_at >= ? AND starts_at < ?
            "#,
        )
        .bind(factor)
        .bind(factor)
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .bind(STATUS_PLANNED)
        .bind(from.to_rfc3339())
        .bind(to.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() as u32)
    }

    async fn race_plan_exists(&self, user_id: &str) -> Result<bool, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM planned_sessions WHERE user_id = ? AND plan_type = 'race_build'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn count_for_plan(
        &self,
        user_id: &str,
        plan_id: &str,
    ) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM planned_sessions WHERE user_id = ? AND plan_id = ?",
        )
        .bind(user_id)
        .bind(plan_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
