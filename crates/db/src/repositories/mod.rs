use async_trait::async_trait;
use cadence_core::chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use cadence_core::domain::conversation::{ConversationId, Message, Progress};
use cadence_core::domain::link::{Activity, SessionLink};
use cadence_core::domain::session::{DayModification, MaterializedSession};
use cadence_core::planning::PlanWriteReport;

pub mod activity;
pub mod conversation;
pub mod planned_session;
pub mod progress;
pub mod session_link;

pub use activity::SqlActivityRepository;
pub use conversation::SqlConversationRepository;
pub use planned_session::{PlannedSessionRecord, SqlPlannedSessionRepository};
pub use progress::{SqlProgressRepository, StoredProgress};
pub use session_link::SqlSessionLinkRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("progress version conflict: stored {stored}, expected {expected}")]
    VersionConflict { stored: i64, expected: i64 },
    #[error("session link already exists for planned_session={planned_session_id} or activity={activity_id}")]
    DuplicateLink { planned_session_id: i64, activity_id: i64 },
    #[error("not found: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn ensure_conversation(
        &self,
        conversation_id: &ConversationId,
        user_id: &str,
    ) -> Result<(), RepositoryError>;

    /// Appends one user/assistant turn. `created_at` stays strictly
    /// increasing within the conversation.
    async fn append_turn(
        &self,
        conversation_id: &ConversationId,
        user_message: &str,
        assistant_message: &str,
        model_name: &str,
    ) -> Result<(), RepositoryError>;

    /// Most recent messages in chronological order (oldest first).
    async fn load_recent_messages(
        &self,
        conversation_id: &ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    async fn load(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<StoredProgress>, RepositoryError>;

    /// Optimistic single-writer write: `expected_version` None inserts a
    /// fresh row, Some(v) updates only if the stored version is still v.
    async fn save(
        &self,
        conversation_id: &ConversationId,
        progress: &Progress,
        expected_version: Option<i64>,
    ) -> Result<i64, RepositoryError>;
}

#[async_trait]
pub trait PlannedSessionRepository: Send + Sync {
    /// Idempotent plan write keyed on
    /// `(user_id, plan_id, starts_at, session_type)`. Existing keys are
    /// updated in place; days already holding a completed session are
    /// skipped and reported as conflicts. All-or-nothing per plan.
    async fn upsert_plan(
        &self,
        user_id: &str,
        plan_id: &str,
        plan_type: &str,
        sessions: &[MaterializedSession],
    ) -> Result<PlanWriteReport, RepositoryError>;

    async fn list_for_user(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PlannedSessionRecord>, RepositoryError>;

    /// Applies a modification to the planned session on `day`, preserving
    /// `intent` unless the modification sets `explicit_intent_change`.
    async fn modify_day(
        &self,
        user_id: &str,
        day: NaiveDate,
        modification: &DayModification,
    ) -> Result<PlannedSessionRecord, RepositoryError>;

    /// Whether any race-build plan exists for the user (weekly-plan gating).
    async fn race_plan_exists(&self, user_id: &str) -> Result<bool, RepositoryError>;

    /// Scales the distance/duration of planned sessions in `[from, to)` by
    /// `factor`, preserving every session's intent. Returns the number of
    /// sessions touched.
    async fn scale_range(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        factor: f64,
    ) -> Result<u32, RepositoryError>;

    async fn count_for_plan(&self, user_id: &str, plan_id: &str)
        -> Result<i64, RepositoryError>;
}

#[async_trait]
pub trait SessionLinkRepository: Send + Sync {
    /// Creates the unique planned-session/activity pairing. A second link
    /// for either side fails with `DuplicateLink`.
    async fn link(
        &self,
        planned_session_id: i64,
        activity_id: i64,
        method: &str,
        confidence: f64,
    ) -> Result<SessionLink, RepositoryError>;

    async fn find_for_planned_session(
        &self,
        planned_session_id: i64,
    ) -> Result<Option<SessionLink>, RepositoryError>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn insert(&self, activity: &Activity) -> Result<i64, RepositoryError>;

    async fn recent_for_user(
        &self,
        user_id: &str,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Activity>, RepositoryError>;
}
