use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Proposed,
    Confirmed,
    Rejected,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "proposed" => Some(Self::Proposed),
            "confirmed" => Some(Self::Confirmed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Unique pairing between a planned session and a completed activity.
/// At most one link may exist per planned session and per activity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionLink {
    pub planned_session_id: i64,
    pub activity_id: i64,
    pub status: LinkStatus,
    pub method: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// A completed activity as consumed from the abstract activity source.
/// Ingestion itself lives outside this system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub user_id: String,
    pub sport: String,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub distance_meters: Option<f64>,
}
