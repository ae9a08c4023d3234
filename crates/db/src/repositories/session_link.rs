use cadence_core::chrono::Utc;
use sqlx::Row;

use cadence_core::domain::link::{LinkStatus, SessionLink};

use super::conversation::parse_datetime;
use super::{RepositoryError, SessionLinkRepository};
use crate::DbPool;

pub struct SqlSessionLinkRepository {
    pool: DbPool,
}

impl SqlSessionLinkRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionLinkRepository for SqlSessionLinkRepository {
    async fn link(
        &self,
        planned_session_id: i64,
        activity_id: i64,
        method: &str,
        confidence: f64,
    ) -> Result<SessionLink, RepositoryError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO session_links (planned_session_id, activity_id, status, method, confidence, created_at)
            VALUES (?, ?, 'proposed', ?, ?, ?)
            "#,
        )
        .bind(planned_session_id)
        .bind(activity_id)
        .bind(method)
        .bind(confidence)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(SessionLink {
                planned_session_id,
                activity_id,
                status: LinkStatus::Proposed,
                method: method.to_string(),
                confidence,
                created_at,
            }),
            Err(error) => {
                let unique_violation = error
                    .as_database_error()
                    .map(|db_error| db_error.is_unique_violation())
                    .unwrap_or(false);
                if unique_violation {
                    Err(RepositoryError::DuplicateLink { planned_session_id, activity_id })
                } else {
                    Err(RepositoryError::Database(error))
                }
            }
        }
    }

    async fn find_for_planned_session(
        &self,
        planned_session_id: i64,
    ) -> Result<Option<SessionLink>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT planned_session_id, activity_id, status, method, confidence, created_at
            FROM session_links
            WHERE planned_session_id = ?
            "#,
        )
        .bind(planned_session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status_raw: String = row.try_get("status").map_err(RepositoryError::Database)?;
        let status = LinkStatus::parse(&status_raw).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown link status `{status_raw}`"))
        })?;
        let created_raw: String =
            row.try_get("created_at").map_err(RepositoryError::Database)?;

        Ok(Some(SessionLink {
            planned_session_id: row
                .try_get("planned_session_id")
                .map_err(RepositoryError::Database)?,
            activity_id: row.try_get("activity_id").map_err(RepositoryError::Database)?,
            status,
            method: row.try_get("method").map_err(RepositoryError::Database)?,
            confidence: row.try_get("confidence").map_err(RepositoryError::Database)?,
            created_at: parse_datetime("created_at", &created_raw)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use cadence_core::chrono::{TimeZone, Utc};
    use cadence_core::domain::link::Activity;
    use cadence_core::domain::session::{
        miles_to_meters, MaterializedSession, PrimaryMetric, SessionIntent, Sport,
    };

    use crate::repositories::{
        ActivityRepository, PlannedSessionRepository, RepositoryError, SessionLinkRepository,
        SqlActivityRepository, SqlPlannedSessionRepository, SqlSessionLinkRepository,
    };
    use crate::{connect_with_settings, migrations, DbPool};

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn seed_session_and_activities(pool: &DbPool) -> (i64, i64, i64) {
        let sessions = SqlPlannedSessionRepository::new(pool.clone());
        sessions
            .upsert_plan(
                "user-1",
                "plan-1",
                "race_build",
                &[MaterializedSession {
                    starts_at: Utc
                        .with_ymd_and_hms(2026, 3, 3, 7, 0, 0)
                        .single()
                        .expect("timestamp"),
                    sport: Sport::Run,
                    session_type: "easy".to_string(),
                    intent: SessionIntent::Easy,
                    metric: PrimaryMetric::DistanceMeters(miles_to_meters(5.0)),
                    description: "Easy run".to_string(),
                    steps: Vec::new(),
                }],
            )
            .await
            .expect("seed session");
        let listed = sessions
            .list_for_user(
                "user-1",
                Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).single().expect("from"),
                Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).single().expect("to"),
            )
            .await
            .expect("list");
        let planned_id = listed[0].id;

        let activities = SqlActivityRepository::new(pool.clone());
        let mut ids = Vec::new();
        for hour in [8, 9] {
            ids.push(
                activities
                    .insert(&Activity {
                        id: 0,
                        user_id: "user-1".to_string(),
                        sport: "run".to_string(),
                        started_at: Utc
                            .with_ymd_and_hms(2026, 3, 3, hour, 0, 0)
                            .single()
                            .expect("timestamp"),
                        duration_seconds: 2400,
                        distance_meters: Some(8000.0),
                    })
                    .await
                    .expect("insert activity"),
            );
        }
        (planned_id, ids[0], ids[1])
    }

    #[tokio::test]
    async fn link_round_trips() {
        let pool = pool().await;
        let (planned_id, activity_id, _) = seed_session_and_activities(&pool).await;
        let links = SqlSessionLinkRepository::new(pool);

        let link = links.link(planned_id, activity_id, "time_overlap", 0.92).await.expect("link");
        assert_eq!(link.planned_session_id, planned_id);

        let found = links
            .find_for_planned_session(planned_id)
            .await
            .expect("find")
            .expect("link exists");
        assert_eq!(found.activity_id, activity_id);
        assert_eq!(found.method, "time_overlap");
    }

    #[tokio::test]
    async fn second_link_for_the_same_planned_session_is_rejected() {
        let pool = pool().await;
        let (planned_id, first_activity, second_activity) =
            seed_session_and_activities(&pool).await;
        let links = SqlSessionLinkRepository::new(pool);

        links.link(planned_id, first_activity, "time_overlap", 0.9).await.expect("first link");
        let error = links
            .link(planned_id, second_activity, "time_overlap", 0.8)
            .await
            .expect_err("second link must fail");
        assert!(matches!(error, RepositoryError::DuplicateLink { .. }));
    }

    #[tokio::test]
    async fn second_link_for_the_same_activity_is_rejected() {
        let pool = pool().await;
        let (planned_id, activity_id, _) = seed_session_and_activities(&pool).await;

        // A second planned session to link against the same activity.
        let sessions = SqlPlannedSessionRepository::new(pool.clone());
        sessions
            .upsert_plan(
                "user-1",
                "plan-1",
                "race_build",
                &[MaterializedSession {
                    starts_at: Utc
                        .with_ymd_and_hms(2026, 3, 4, 7, 0, 0)
                        .single()
                        .expect("timestamp"),
                    sport: Sport::Run,
                    session_type: "tempo".to_string(),
                    intent: SessionIntent::Quality,
                    metric: PrimaryMetric::DistanceMeters(miles_to_meters(6.0)),
                    description: "Tempo run".to_string(),
                    steps: Vec::new(),
                }],
            )
            .await
            .expect("second session");
        let listed = sessions
            .list_for_user(
                "user-1",
                Utc.with_ymd_and_hms(2026, 3, 4, 0, 0, 0).single().expect("from"),
                Utc.with_ymd_and_hms(2026, 3, 5, 0, 0, 0).single().expect("to"),
            )
            .await
            .expect("list");
        let second_planned = listed[0].id;

        let links = SqlSessionLinkRepository::new(pool);
        links.link(planned_id, activity_id, "time_overlap", 0.9).await.expect("first link");
        let error = links
            .link(second_planned, activity_id, "time_overlap", 0.8)
            .await
            .expect_err("activity reuse must fail");
        assert!(matches!(error, RepositoryError::DuplicateLink { .. }));
    }
}
