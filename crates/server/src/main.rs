mod bootstrap;
mod health;
mod turns;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};

use cadence_agent::{TurnError, TurnRequest};
use cadence_core::config::LoadOptions;
use cadence_core::errors::ApplicationError;

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).compact().init();

    let app = bootstrap::bootstrap(LoadOptions::default()).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_port,
        app.tools.clone(),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "cadence runtime started"
    );

    // Local conversational loop on stdin. The outer chat surface is an
    // external collaborator; this shell exists so the runtime can be driven
    // end to end from a terminal.
    let runner = Arc::new(turns::TurnRunner::new(app.controller.clone()));
    let conversation_id = format!("local-{}", uuid::Uuid::new_v4());
    let user_id = std::env::var("CADENCE_USER_ID").unwrap_or_else(|_| "local-user".to_string());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("cadence ready. Describe what you're training for (ctrl-c to quit)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let message = line.trim();
                if message.is_empty() {
                    continue;
                }

                let request = TurnRequest {
                    conversation_id: conversation_id.clone(),
                    user_id: user_id.clone(),
                    message: message.to_string(),
                    today: Utc::now().date_naive(),
                };

                match runner.run_turn(request).await {
                    Ok(response) => println!("{}", response.message),
                    Err(error) => {
                        tracing::error!(
                            event_name = "controller.turn_failed",
                            error = %error,
                            "turn failed"
                        );
                        let mapped = match &error {
                            TurnError::Boundary(_) => {
                                ApplicationError::Boundary(error.to_string())
                            }
                            TurnError::Deadline(_) => {
                                ApplicationError::Deadline(error.to_string())
                            }
                        };
                        println!("{}", mapped.into_interface(&conversation_id).user_message());
                    }
                }
            }
        }
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "cadence runtime stopping"
    );
    Ok(())
}
