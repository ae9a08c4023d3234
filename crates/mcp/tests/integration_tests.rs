//! End-to-end tests: both tool servers on ephemeral ports, driven through
//! the tool client exactly as the controller drives them.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use cadence_core::config::ToolsConfig;
use cadence_core::corpus::fixtures;
use cadence_core::planning::DeterministicTextGenerator;
use cadence_mcp::data_server::{self, DataServerState};
use cadence_mcp::prompt_server::{self, PromptServerState};
use cadence_mcp::{ErrorCode, ToolClient, ToolError};

struct TestHarness {
    client: ToolClient,
    // Keeps the prompt directory alive for the duration of the test.
    _prompt_dir: TempDir,
}

async fn spawn_harness() -> TestHarness {
    // A named shared-cache memory database per harness keeps concurrent
    // tests isolated while letting the pool share one store.
    static DB_COUNTER: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);
    let db_index = DB_COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    let url = format!("sqlite:file:mcp_wire_{db_index}?mode=memory&cache=shared");
    let pool = cadence_db::connect_with_settings(&url, 5, 30).await.expect("connect");
    cadence_db::migrations::run_pending(&pool).await.expect("migrations");

    let data_state = Arc::new(DataServerState::new(
        pool,
        Arc::new(fixtures::seeded_store()),
        Arc::new(DeterministicTextGenerator),
        Duration::from_secs(120),
    ));
    let data_listener =
        tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind data server");
    let data_address = data_listener.local_addr().expect("data address");
    tokio::spawn(async move {
        axum::serve(data_listener, data_server::router(data_state)).await.expect("data server");
    });

    let prompt_dir = TempDir::new().expect("tempdir");
    fs::write(
        prompt_dir.path().join("orchestrator.md"),
        "You are an execution controller. Fill a slot, ask for a slot, or execute.",
    )
    .expect("write prompt");
    let prompt_state = Arc::new(PromptServerState::new(prompt_dir.path().to_path_buf()));
    let prompt_listener =
        tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind prompt server");
    let prompt_address = prompt_listener.local_addr().expect("prompt address");
    tokio::spawn(async move {
        axum::serve(prompt_listener, prompt_server::router(prompt_state))
            .await
            .expect("prompt server");
    });

    let client = ToolClient::from_config(&ToolsConfig {
        data_endpoint: format!("http://{data_address}"),
        prompt_endpoint: format!("http://{prompt_address}"),
        call_timeout_secs: 30,
    })
    .expect("tool client");

    TestHarness { client, _prompt_dir: prompt_dir }
}

#[tokio::test]
async fn context_save_and_load_round_trips_through_the_wire() {
    let harness = spawn_harness().await;

    harness
        .client
        .call(
            "save_context",
            serde_json::json!({
                "conversation_id": "c-wire-1",
                "user_id": "user-1",
                "model_name": "scripted-v1",
                "user_message": "I'm training for a marathon",
                "assistant_message": "When is the race?",
            }),
        )
        .await
        .expect("save_context");

    let result = harness
        .client
        .call(
            "load_context",
            serde_json::json!({"conversation_id": "c-wire-1", "limit": 10}),
        )
        .await
        .expect("load_context");

    let messages = result["messages"].as_array().expect("messages array");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
}

#[tokio::test]
async fn progress_round_trip_preserves_json_bytes() {
    let harness = spawn_harness().await;

    let progress = serde_json::json!({
        "target_action": "plan_race_build",
        "required_attributes": ["race_distance", "race_date"],
        "optional_attributes": ["target_time", "weekly_mileage"],
        "filled_slots": {"race_distance": "marathon"},
        "awaiting_slots": ["race_date"],
    });

    harness
        .client
        .call(
            "save_progress",
            serde_json::json!({
                "conversation_id": "c-wire-2",
                "user_id": "user-1",
                "progress": progress,
                "expected_version": null,
            }),
        )
        .await
        .expect("save_progress");

    let loaded = harness
        .client
        .call("load_progress", serde_json::json!({"conversation_id": "c-wire-2"}))
        .await
        .expect("load_progress");

    assert_eq!(loaded["version"], 1);
    assert_eq!(
        serde_json::to_string(&loaded["progress"]).expect("serialize"),
        serde_json::to_string(&progress).expect("serialize"),
    );
}

#[tokio::test]
async fn save_planned_sessions_twice_is_a_no_op() {
    let harness = spawn_harness().await;

    let payload = serde_json::json!({
        "user_id": "user-1",
        "plan_id": "plan-wire-1",
        "plan_type": "race_build",
        "sessions": [
            {
                "starts_at": "2026-03-03T07:00:00+00:00",
                "session_type": "intervals",
                "intent": "quality",
                "distance_meters": 9656.0,
                "duration_seconds": null,
            },
            {
                "starts_at": "2026-03-07T07:00:00+00:00",
                "session_type": "long_run",
                "intent": "long",
                "distance_meters": 22530.0,
                "duration_seconds": null,
            },
        ],
    });

    let first = harness
        .client
        .call("save_planned_sessions", payload.clone())
        .await
        .expect("first save");
    assert_eq!(first["saved_count"], 2);
    assert_eq!(first["updated_count"], 0);

    let second = harness
        .client
        .call("save_planned_sessions", payload)
        .await
        .expect("second save");
    assert_eq!(second["saved_count"], 0);
    assert_eq!(second["updated_count"], 2);
}

#[tokio::test]
async fn plan_race_build_materializes_and_persists_a_full_plan() {
    let harness = spawn_harness().await;

    let result = harness
        .client
        .call(
            "plan_race_build",
            serde_json::json!({
                "user_id": "user-plan",
                "race_distance": "marathon",
                "race_date": future_date_weeks(16),
                "target_time": "03:00:00",
                "weekly_mileage": 55.0,
            }),
        )
        .await
        .expect("plan_race_build");

    assert_eq!(result["success"], true);
    assert_eq!(result["total_weeks"], 16);
    assert!(result["saved_count"].as_u64().expect("saved_count") >= 80);

    // Idempotency: replanning the same race updates rather than duplicates.
    let again = harness
        .client
        .call(
            "plan_race_build",
            serde_json::json!({
                "user_id": "user-plan",
                "race_distance": "marathon",
                "race_date": future_date_weeks(16),
                "target_time": "03:00:00",
                "weekly_mileage": 55.0,
            }),
        )
        .await
        .expect("second plan_race_build");
    assert_eq!(again["saved_count"], 0);
    assert!(again["updated_count"].as_u64().expect("updated_count") >= 80);
}

#[tokio::test]
async fn past_race_date_is_rejected_with_invalid_race_date() {
    let harness = spawn_harness().await;

    let error = harness
        .client
        .call(
            "plan_race_build",
            serde_json::json!({
                "user_id": "user-1",
                "race_distance": "marathon",
                "race_date": "2020-04-25",
            }),
        )
        .await
        .expect_err("past date must fail");

    assert_eq!(error.remote_code(), Some(ErrorCode::InvalidRaceDate));
}

#[tokio::test]
async fn missing_race_fields_are_missing_race_info() {
    let harness = spawn_harness().await;

    let error = harness
        .client
        .call("plan_race_build", serde_json::json!({"user_id": "user-1"}))
        .await
        .expect_err("missing fields must fail");

    assert_eq!(error.remote_code(), Some(ErrorCode::MissingRaceInfo));
}

#[tokio::test]
async fn invalid_limit_is_surfaced_with_its_code() {
    let harness = spawn_harness().await;

    let error = harness
        .client
        .call(
            "load_context",
            serde_json::json!({"conversation_id": "c-1", "limit": 0}),
        )
        .await
        .expect_err("zero limit must fail");

    assert_eq!(error.remote_code(), Some(ErrorCode::InvalidLimit));
}

#[tokio::test]
async fn orchestrator_prompt_loads_over_the_wire() {
    let harness = spawn_harness().await;

    let result = harness
        .client
        .call("load_orchestrator_prompt", serde_json::json!({}))
        .await
        .expect("load prompt");

    let content = result["content"].as_str().expect("content string");
    assert!(content.contains("execution controller"));
}

#[tokio::test]
async fn prompt_path_traversal_is_rejected() {
    let harness = spawn_harness().await;

    let error = harness
        .client
        .call("load_prompt", serde_json::json!({"filename": "../../etc/passwd"}))
        .await
        .expect_err("traversal must fail");

    assert_eq!(error.remote_code(), Some(ErrorCode::InvalidFilename));
}

#[tokio::test]
async fn add_workout_saves_a_single_session() {
    let harness = spawn_harness().await;

    let result = harness
        .client
        .call(
            "add_workout",
            serde_json::json!({
                "user_id": "user-1",
                "workout_description": "add a 40 min tempo run tomorrow",
            }),
        )
        .await
        .expect("add_workout");

    assert_eq!(result["success"], true);
    assert_eq!(result["saved_count"], 1);
}

#[tokio::test]
async fn unknown_tool_fails_locally_before_any_request() {
    let harness = spawn_harness().await;

    let error = harness
        .client
        .call("make_coffee", serde_json::json!({}))
        .await
        .expect_err("unknown tool");
    assert!(matches!(error, ToolError::UnknownTool(_)));
}

fn future_date_weeks(weeks: i64) -> String {
    let date = cadence_core::chrono::Utc::now().date_naive()
        + cadence_core::chrono::Duration::weeks(weeks);
    date.format("%Y-%m-%d").to_string()
}
