use cadence_core::chrono::{DateTime, Utc};
use sqlx::Row;

use cadence_core::domain::conversation::{ConversationId, Progress};

use super::conversation::parse_datetime;
use super::{ProgressRepository, RepositoryError};
use crate::DbPool;

#[derive(Clone, Debug, PartialEq)]
pub struct StoredProgress {
    pub progress: Progress,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

pub struct SqlProgressRepository {
    pool: DbPool,
}

impl SqlProgressRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProgressRepository for SqlProgressRepository {
    async fn load(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<StoredProgress>, RepositoryError> {
        let row = sqlx::query(
            "SELECT progress, version, updated_at FROM conversation_progress \
             WHERE conversation_id = ?",
        )
        .bind(&conversation_id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row.try_get("progress").map_err(RepositoryError::Database)?;
        let version: i64 = row.try_get("version").map_err(RepositoryError::Database)?;
        let updated_raw: String =
            row.try_get("updated_at").map_err(RepositoryError::Database)?;

        let progress: Progress = serde_json::from_str(&raw).map_err(|error| {
            RepositoryError::Decode(format!("invalid progress JSON: {error}"))
        })?;

        Ok(Some(StoredProgress {
            progress,
            version,
            updated_at: parse_datetime("updated_at", &updated_raw)?,
        }))
    }

    async fn save(
        &self,
        conversation_id: &ConversationId,
        progress: &Progress,
        expected_version: Option<i64>,
    ) -> Result<i64, RepositoryError> {
        let encoded = serde_json::to_string(progress).map_err(|error| {
            RepositoryError::Decode(format!("progress serialization failed: {error}"))
        })?;
        let now = Utc::now().to_rfc3339();

        match expected_version {
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO conversation_progress (conversation_id, progress, version, updated_at)
                    VALUES (?, ?, 1, ?)
                    ON CONFLICT(conversation_id) DO NOTHING
                    "#,
                )
                .bind(&conversation_id.0)
                .bind(&encoded)
                .bind(&now)
                .execute(&self.pool)
                .await?;

                if result.rows_affected() == 0 {
                    let stored = self
                        .load(conversation_id)
                        .await?
                        .map(|stored| stored.version)
                        .unwrap_or(0);
                    return Err(RepositoryError::VersionConflict { stored, expected: 0 });
                }
                Ok(1)
            }
            Some(expected) => {
                let result = sqlx::query(
                    r#"
                    UPDATE conversation_progress
                    SET progress = ?, version = version + 1, updated_at = ?
                    WHERE conversation_id = ? AND version = ?
                    "#,
                )
                .bind(&encoded)
                .bind(&now)
                .bind(&conversation_id.0)
                .bind(expected)
                .execute(&self.pool)
                .await?;

                if result.rows_affected() == 0 {
                    let stored = self
                        .load(conversation_id)
                        .await?
                        .map(|stored| stored.version)
                        .unwrap_or(0);
                    return Err(RepositoryError::VersionConflict { stored, expected });
                }
                Ok(expected + 1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cadence_core::domain::conversation::{ConversationId, Progress, TargetAction};
    use cadence_core::domain::slot::{names, RaceDistance, SlotValue};

    use crate::repositories::{
        ConversationRepository, ProgressRepository, RepositoryError, SqlConversationRepository,
        SqlProgressRepository,
    };
    use crate::{connect_with_settings, migrations, DbPool};

    async fn pool_with_conversation(conversation: &ConversationId) -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlConversationRepository::new(pool.clone())
            .ensure_conversation(conversation, "user-1")
            .await
            .expect("ensure conversation");
        pool
    }

    fn sample_progress() -> Progress {
        let mut progress = Progress::for_target(TargetAction::PlanRaceBuild);
        progress
            .filled_slots
            .insert(names::RACE_DISTANCE.to_string(), SlotValue::Distance(RaceDistance::Marathon));
        progress.awaiting_slots.push(names::RACE_DATE.to_string());
        progress
    }

    #[tokio::test]
    async fn load_save_load_round_trips_byte_identical_json() {
        let conversation = ConversationId("c-progress-1".to_string());
        let pool = pool_with_conversation(&conversation).await;
        let repo = SqlProgressRepository::new(pool);

        let progress = sample_progress();
        let first_json = serde_json::to_string(&progress).expect("serialize");

        repo.save(&conversation, &progress, None).await.expect("initial save");
        let loaded = repo.load(&conversation).await.expect("load").expect("present");
        let second_json = serde_json::to_string(&loaded.progress).expect("serialize loaded");

        assert_eq!(first_json, second_json);
        assert_eq!(loaded.version, 1);

        repo.save(&conversation, &loaded.progress, Some(loaded.version))
            .await
            .expect("second save");
        let reloaded = repo.load(&conversation).await.expect("load").expect("present");
        let third_json = serde_json::to_string(&reloaded.progress).expect("serialize reloaded");

        assert_eq!(first_json, third_json);
        assert_eq!(reloaded.version, 2);
    }

    #[tokio::test]
    async fn stale_version_write_fails_and_leaves_row_unchanged() {
        let conversation = ConversationId("c-progress-2".to_string());
        let pool = pool_with_conversation(&conversation).await;
        let repo = SqlProgressRepository::new(pool);

        let progress = sample_progress();
        repo.save(&conversation, &progress, None).await.expect("initial save");
        repo.save(&conversation, &progress, Some(1)).await.expect("bump to v2");

        let mut stale = progress.clone();
        stale.awaiting_slots.clear();
        let error = repo
            .save(&conversation, &stale, Some(1))
            .await
            .expect_err("stale write must fail");
        assert!(matches!(
            error,
            RepositoryError::VersionConflict { stored: 2, expected: 1 }
        ));

        let current = repo.load(&conversation).await.expect("load").expect("present");
        assert_eq!(current.version, 2);
        assert_eq!(current.progress.awaiting_slots, progress.awaiting_slots);
    }

    #[tokio::test]
    async fn double_insert_is_a_version_conflict() {
        let conversation = ConversationId("c-progress-3".to_string());
        let pool = pool_with_conversation(&conversation).await;
        let repo = SqlProgressRepository::new(pool);

        repo.save(&conversation, &sample_progress(), None).await.expect("first insert");
        let error = repo
            .save(&conversation, &sample_progress(), None)
            .await
            .expect_err("second insert must conflict");
        assert!(matches!(error, RepositoryError::VersionConflict { .. }));
    }
}
