use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use cadence_core::config::{AppConfig, LoadOptions};
use cadence_core::corpus::CorpusStore;
use cadence_core::planning::DeterministicTextGenerator;
use cadence_mcp::{data_server, prompt_server};

#[derive(Debug, Parser)]
#[command(
    name = "cadence-mcp",
    about = "Cadence tool servers",
    long_about = "Serve the data and prompt tool endpoints consumed by the execution controller."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Serve conversation, activity, and planning tools backed by the database")]
    Data,
    #[command(about = "Serve prompt-file tools from the configured prompts directory")]
    Prompts,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).compact().init();

    let cli = Cli::parse();
    let config = AppConfig::load(LoadOptions::default()).context("configuration load failed")?;

    match cli.command {
        Command::Data => serve_data(config).await,
        Command::Prompts => serve_prompts(config).await,
    }
}

async fn serve_data(config: AppConfig) -> Result<()> {
    let pool = cadence_db::connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .context("database connection failed")?;
    cadence_db::migrations::run_pending(&pool).await.context("database migration failed")?;

    let corpus = CorpusStore::load_from_dir(&config.corpus.root).context("corpus load failed")?;
    let state = Arc::new(data_server::DataServerState::new(
        pool,
        Arc::new(corpus),
        Arc::new(DeterministicTextGenerator),
        std::time::Duration::from_secs(config.deadlines.plan_seconds),
    ));

    let address = format!("{}:{}", config.server.bind_address, config.server.data_port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("could not bind data tool server to {address}"))?;

    info!(
        event_name = "system.data_tools_started",
        address = %address,
        "data tool server listening"
    );
    axum::serve(listener, data_server::router(state)).await.context("data tool server failed")
}

async fn serve_prompts(config: AppConfig) -> Result<()> {
    let state = Arc::new(prompt_server::PromptServerState::new(config.prompts.root.clone()));

    let address = format!("{}:{}", config.server.bind_address, config.server.prompt_port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("could not bind prompt tool server to {address}"))?;

    info!(
        event_name = "system.prompt_tools_started",
        address = %address,
        prompts_root = %config.prompts.root.display(),
        "prompt tool server listening"
    );
    axum::serve(listener, prompt_server::router(state)).await.context("prompt tool server failed")
}
