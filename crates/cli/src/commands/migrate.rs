use cadence_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct MigrateReport {
    status: &'static str,
    details: String,
}

pub fn run() -> CommandResult {
    let report = apply();
    let exit_code = if report.status == "ok" { 0 } else { 1 };
    let output = serde_json::to_string_pretty(&report)
        .unwrap_or_else(|_| format!("{{\"status\":\"{}\"}}", report.status));
    CommandResult { exit_code, output }
}

fn apply() -> MigrateReport {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return MigrateReport {
                status: "config_error",
                details: error.to_string(),
            };
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return MigrateReport {
                status: "runtime_error",
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = cadence_db::connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        cadence_db::migrations::run_pending(&pool)
            .await
            .map_err(|error| format!("migration failed: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => MigrateReport {
            status: "ok",
            details: "all pending migrations applied".to_string(),
        },
        Err(details) => MigrateReport { status: "migration_error", details },
    }
}
