use cadence_core::config::{AppConfig, LoadOptions};
use cadence_core::corpus::CorpusStore;
use serde::Serialize;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct CorpusReport {
    status: &'static str,
    philosophies: usize,
    structures: usize,
    templates: usize,
    details: String,
}

pub fn run() -> CommandResult {
    let report = inspect();
    let exit_code = if report.status == "ok" { 0 } else { 1 };
    let output = serde_json::to_string_pretty(&report)
        .unwrap_or_else(|_| format!("{{\"status\":\"{}\"}}", report.status));
    CommandResult { exit_code, output }
}

fn inspect() -> CorpusReport {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CorpusReport {
                status: "config_error",
                philosophies: 0,
                structures: 0,
                templates: 0,
                details: error.to_string(),
            };
        }
    };

    match CorpusStore::load_from_dir(&config.corpus.root) {
        Ok(store) => CorpusReport {
            status: if store.is_empty() { "empty" } else { "ok" },
            philosophies: store.philosophies().len(),
            structures: store.structures().len(),
            templates: store.templates().len(),
            details: format!("corpus root: {}", config.corpus.root.display()),
        },
        Err(error) => CorpusReport {
            status: "parse_error",
            philosophies: 0,
            structures: 0,
            templates: 0,
            details: error.to_string(),
        },
    }
}
