use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use cadence_agent::{ExecutionController, KeywordClassifier, TurnError};
use cadence_core::config::{AppConfig, ConfigError, LoadOptions};
use cadence_mcp::{ToolClient, ToolError};

pub struct Application {
    pub config: AppConfig,
    pub tools: Arc<ToolClient>,
    pub controller: Arc<ExecutionController>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("tool client initialization failed: {0}")]
    ToolClient(#[from] ToolError),
    #[error("controller initialization failed: {0}")]
    Controller(#[from] TurnError),
}

/// Builds the runtime: configuration, the fail-closed tool client, and the
/// execution controller. There is no database handle here: every side
/// effect the runtime performs goes through the tool boundary.
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting runtime bootstrap"
    );
    let config = AppConfig::load(options)?;

    let tools = Arc::new(ToolClient::from_config(&config.tools)?);
    info!(
        event_name = "system.bootstrap.tool_client_ready",
        correlation_id = "bootstrap",
        data_endpoint = %config.tools.data_endpoint,
        prompt_endpoint = %config.tools.prompt_endpoint,
        "tool client constructed"
    );

    let controller = ExecutionController::connect(
        tools.clone(),
        Box::new(KeywordClassifier),
        Duration::from_secs(config.deadlines.turn_seconds),
        config.llm.model.clone(),
    )
    .await?;
    info!(
        event_name = "system.bootstrap.controller_ready",
        correlation_id = "bootstrap",
        "execution controller connected"
    );

    Ok(Application { config, tools, controller: Arc::new(controller) })
}
