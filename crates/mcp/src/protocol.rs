//! Wire types for the tool-call protocol spoken on `POST /mcp/tools/call`.
//!
//! Success and failure share one endpoint and one HTTP status; the body
//! carries either `result` or `error { code, message }`. The error-code set
//! is closed: servers never invent codes outside this enum.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolCallResponse {
    Success { result: serde_json::Value },
    Failure { error: ToolErrorBody },
}

impl ToolCallResponse {
    pub fn success(result: serde_json::Value) -> Self {
        Self::Success { result }
    }

    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Failure { error: ToolErrorBody { code, message: message.into() } }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

/// The closed error-code taxonomy shared by both tool servers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AthleteNotFound,
    UserNotFound,
    DbError,
    InvalidInput,
    InvalidLimit,
    InvalidDays,
    InvalidSessionData,
    InvalidDateFormat,
    InvalidWorkoutDescription,
    MissingRaceInfo,
    InvalidRaceDate,
    MissingSeasonInfo,
    InvalidSeasonDates,
    InvalidMessage,
    FileNotFound,
    ReadError,
    EncodingError,
    InvalidFilename,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AthleteNotFound => "ATHLETE_NOT_FOUND",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::DbError => "DB_ERROR",
            Self::InvalidInput => "INVALID_INPUT",
            Self::InvalidLimit => "INVALID_LIMIT",
            Self::InvalidDays => "INVALID_DAYS",
            Self::InvalidSessionData => "INVALID_SESSION_DATA",
            Self::InvalidDateFormat => "INVALID_DATE_FORMAT",
            Self::InvalidWorkoutDescription => "INVALID_WORKOUT_DESCRIPTION",
            Self::MissingRaceInfo => "MISSING_RACE_INFO",
            Self::InvalidRaceDate => "INVALID_RACE_DATE",
            Self::MissingSeasonInfo => "MISSING_SEASON_INFO",
            Self::InvalidSeasonDates => "INVALID_SEASON_DATES",
            Self::InvalidMessage => "INVALID_MESSAGE",
            Self::FileNotFound => "FILE_NOT_FOUND",
            Self::ReadError => "READ_ERROR",
            Self::EncodingError => "ENCODING_ERROR",
            Self::InvalidFilename => "INVALID_FILENAME",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, ToolCallRequest, ToolCallResponse};

    #[test]
    fn request_round_trips() {
        let request = ToolCallRequest {
            tool: "load_context".to_string(),
            arguments: serde_json::json!({"conversation_id": "c-1", "limit": 20}),
        };
        let encoded = serde_json::to_string(&request).expect("serialize");
        let decoded: ToolCallRequest = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(decoded, request);
    }

    #[test]
    fn success_and_failure_have_the_documented_shapes() {
        let success = ToolCallResponse::success(serde_json::json!({"messages": []}));
        let encoded = serde_json::to_value(&success).expect("serialize");
        assert!(encoded.get("result").is_some());
        assert!(encoded.get("error").is_none());

        let failure = ToolCallResponse::failure(ErrorCode::InvalidLimit, "limit must be positive");
        let encoded = serde_json::to_value(&failure).expect("serialize");
        assert_eq!(encoded["error"]["code"], "INVALID_LIMIT");
        assert_eq!(encoded["error"]["message"], "limit must be positive");
    }

    #[test]
    fn error_codes_serialize_screaming_snake() {
        for (code, expected) in [
            (ErrorCode::InvalidFilename, "\"INVALID_FILENAME\""),
            (ErrorCode::MissingRaceInfo, "\"MISSING_RACE_INFO\""),
            (ErrorCode::DbError, "\"DB_ERROR\""),
        ] {
            assert_eq!(serde_json::to_string(&code).expect("serialize"), expected);
            assert_eq!(code.as_str(), expected.trim_matches('"'));
        }
    }

    #[test]
    fn missing_arguments_default_to_null() {
        let decoded: ToolCallRequest =
            serde_json::from_str(r#"{"tool": "load_orchestrator_prompt"}"#).expect("deserialize");
        assert_eq!(decoded.arguments, serde_json::Value::Null);
    }
}
