use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;

use cadence_mcp::ToolClient;

async fn health(tools: Arc<ToolClient>) -> Json<serde_json::Value> {
    // The runtime is healthy only while its tool boundary answers.
    let prompts_ok =
        tools.call("load_orchestrator_prompt", serde_json::json!({})).await.is_ok();

    Json(serde_json::json!({
        "status": if prompts_ok { "healthy" } else { "degraded" },
        "server": "cadence-runtime",
        "prompt_tools_reachable": prompts_ok,
    }))
}

pub async fn spawn(bind_address: &str, port: u16, tools: Arc<ToolClient>) -> Result<()> {
    let router = Router::new().route(
        "/health",
        get({
            let tools = tools.clone();
            move || health(tools.clone())
        }),
    );

    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("could not bind health endpoint to {address}"))?;

    info!(event_name = "system.health_started", address = %address, "health endpoint listening");

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router).await {
            tracing::error!(
                event_name = "system.health_failed",
                error = %error,
                "health endpoint stopped"
            );
        }
    });

    Ok(())
}
