use cadence_core::chrono::{DateTime, Duration, Utc};
use sqlx::Row;

use cadence_core::domain::link::Activity;

use super::conversation::parse_datetime;
use super::{ActivityRepository, RepositoryError};
use crate::DbPool;

pub struct SqlActivityRepository {
    pool: DbPool,
}

impl SqlActivityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ActivityRepository for SqlActivityRepository {
    async fn insert(&self, activity: &Activity) -> Result<i64, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO activities (user_id, sport, started_at, duration_seconds, distance_meters, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&activity.user_id)
        .bind(&activity.sport)
        .bind(activity.started_at.to_rfc3339())
        .bind(activity.duration_seconds)
        .bind(activity.distance_meters)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn recent_for_user(
        &self,
        user_id: &str,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Activity>, RepositoryError> {
        let since = now - Duration::days(i64::from(days));
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, sport, started_at, duration_seconds, distance_meters
            FROM activities
            WHERE user_id = ? AND started_at >= ?
            ORDER BY started_at DESC
            "#,
        )
        .bind(user_id)
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        let mut activities = Vec::with_capacity(rows.len());
        for row in rows {
            let started_raw: String =
                row.try_get("started_at").map_err(RepositoryError::Database)?;
            activities.push(Activity {
                id: row.try_get("id").map_err(RepositoryError::Database)?,
                user_id: row.try_get("user_id").map_err(RepositoryError::Database)?,
                sport: row.try_get("sport").map_err(RepositoryError::Database)?,
                started_at: parse_datetime("started_at", &started_raw)?,
                duration_seconds: row
                    .try_get("duration_seconds")
                    .map_err(RepositoryError::Database)?,
                distance_meters: row
                    .try_get("distance_meters")
                    .map_err(RepositoryError::Database)?,
            });
        }
        Ok(activities)
    }
}

#[cfg(test)]
mod tests {
    use cadence_core::chrono::{Duration, TimeZone, Utc};
    use cadence_core::domain::link::Activity;

    use crate::repositories::{ActivityRepository, SqlActivityRepository};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn recent_window_filters_old_activities() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlActivityRepository::new(pool);

        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).single().expect("timestamp");
        for days_ago in [1, 3, 20] {
            repo.insert(&Activity {
                id: 0,
                user_id: "user-1".to_string(),
                sport: "run".to_string(),
                started_at: now - Duration::days(days_ago),
                duration_seconds: 3600,
                distance_meters: Some(10_000.0),
            })
            .await
            .expect("insert activity");
        }

        let recent = repo.recent_for_user("user-1", 7, now).await.expect("recent");
        assert_eq!(recent.len(), 2);
        assert!(recent[0].started_at > recent[1].started_at, "newest first");
    }
}
