use cadence_core::config::{AppConfig, LoadOptions};
use cadence_db::connect_with_settings;
use cadence_mcp::ToolClient;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('"', "'")
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_tool_client(&config));
            checks.push(check_database_connectivity(&config));
            checks.push(check_corpus(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["tool_client_readiness", "database_connectivity", "corpus_parse"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_tool_client(config: &AppConfig) -> DoctorCheck {
    match ToolClient::from_config(&config.tools) {
        Ok(_) => DoctorCheck {
            name: "tool_client_readiness",
            status: CheckStatus::Pass,
            details: "both tool endpoints configured; client constructs".to_string(),
        },
        Err(error) => DoctorCheck {
            name: "tool_client_readiness",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: "database reachable".to_string(),
        },
        Err(details) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Fail,
            details,
        },
    }
}

fn check_corpus(config: &AppConfig) -> DoctorCheck {
    match cadence_core::corpus::CorpusStore::load_from_dir(&config.corpus.root) {
        Ok(store) if store.is_empty() => DoctorCheck {
            name: "corpus_parse",
            status: CheckStatus::Fail,
            details: format!("corpus at `{}` is empty", config.corpus.root.display()),
        },
        Ok(store) => DoctorCheck {
            name: "corpus_parse",
            status: CheckStatus::Pass,
            details: format!(
                "{} philosophies, {} structures, {} templates",
                store.philosophies().len(),
                store.structures().len(),
                store.templates().len()
            ),
        },
        Err(error) => DoctorCheck {
            name: "corpus_parse",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];
    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("  [{marker}] {}: {}", check.name, check.details));
    }
    lines.join("\n")
}
