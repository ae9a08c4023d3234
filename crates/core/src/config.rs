use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub tools: ToolsConfig,
    pub deadlines: DeadlineConfig,
    pub llm: LlmConfig,
    pub corpus: CorpusConfig,
    pub prompts: PromptsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Tool-server endpoints. Both are required: the controller refuses to start
/// when either is missing (fail-closed rule, no in-process fallback).
#[derive(Clone, Debug)]
pub struct ToolsConfig {
    pub data_endpoint: String,
    pub prompt_endpoint: String,
    pub call_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DeadlineConfig {
    pub turn_seconds: u64,
    pub plan_seconds: u64,
    pub sync_recent_user_window_hours: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CorpusConfig {
    pub root: PathBuf,
}

#[derive(Clone, Debug)]
pub struct PromptsConfig {
    pub root: PathBuf,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub data_port: u16,
    pub prompt_port: u16,
    pub health_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Deterministic scripted completions, used by tests and offline runs.
    Scripted,
    OpenAi,
    Anthropic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub data_endpoint: Option<String>,
    pub prompt_endpoint: Option<String>,
    pub corpus_root: Option<PathBuf>,
    pub prompts_root: Option<PathBuf>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://cadence.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            tools: ToolsConfig {
                data_endpoint: String::new(),
                prompt_endpoint: String::new(),
                call_timeout_secs: 30,
            },
            deadlines: DeadlineConfig {
                turn_seconds: 60,
                plan_seconds: 120,
                sync_recent_user_window_hours: 2,
            },
            llm: LlmConfig {
                provider: LlmProvider::Scripted,
                api_key: None,
                model: "scripted-v1".to_string(),
                timeout_secs: 30,
            },
            corpus: CorpusConfig { root: PathBuf::from("corpus") },
            prompts: PromptsConfig { root: PathBuf::from("prompts") },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                data_port: 8091,
                prompt_port: 8092,
                health_port: 8090,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scripted" => Ok(Self::Scripted),
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected scripted|openai|anthropic)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("cadence.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(tools) = patch.tools {
            if let Some(data_endpoint) = tools.data_endpoint {
                self.tools.data_endpoint = data_endpoint;
            }
            if let Some(prompt_endpoint) = tools.prompt_endpoint {
                self.tools.prompt_endpoint = prompt_endpoint;
            }
            if let Some(call_timeout_secs) = tools.call_timeout_secs {
                self.tools.call_timeout_secs = call_timeout_secs;
            }
        }

        if let Some(deadlines) = patch.deadlines {
            if let Some(turn_seconds) = deadlines.turn_seconds {
                self.deadlines.turn_seconds = turn_seconds;
            }
            if let Some(plan_seconds) = deadlines.plan_seconds {
                self.deadlines.plan_seconds = plan_seconds;
            }
            if let Some(hours) = deadlines.sync_recent_user_window_hours {
                self.deadlines.sync_recent_user_window_hours = hours;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = Some(api_key_value.into());
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(corpus) = patch.corpus {
            if let Some(root) = corpus.root {
                self.corpus.root = PathBuf::from(root);
            }
        }

        if let Some(prompts) = patch.prompts {
            if let Some(root) = prompts.root {
                self.prompts.root = PathBuf::from(root);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(data_port) = server.data_port {
                self.server.data_port = data_port;
            }
            if let Some(prompt_port) = server.prompt_port {
                self.server.prompt_port = prompt_port;
            }
            if let Some(health_port) = server.health_port {
                self.server.health_port = health_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CADENCE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CADENCE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("CADENCE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CADENCE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CADENCE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CADENCE_DATA_TOOL_ENDPOINT") {
            self.tools.data_endpoint = value;
        }
        if let Some(value) = read_env("CADENCE_PROMPT_TOOL_ENDPOINT") {
            self.tools.prompt_endpoint = value;
        }
        if let Some(value) = read_env("CADENCE_TOOL_CALL_TIMEOUT_SECS") {
            self.tools.call_timeout_secs = parse_u64("CADENCE_TOOL_CALL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CADENCE_TURN_DEADLINE_SECS") {
            self.deadlines.turn_seconds = parse_u64("CADENCE_TURN_DEADLINE_SECS", &value)?;
        }
        if let Some(value) = read_env("CADENCE_PLAN_DEADLINE_SECS") {
            self.deadlines.plan_seconds = parse_u64("CADENCE_PLAN_DEADLINE_SECS", &value)?;
        }

        if let Some(value) = read_env("CADENCE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("CADENCE_LLM_API_KEY") {
            self.llm.api_key = Some(value.into());
        }
        if let Some(value) = read_env("CADENCE_LLM_MODEL") {
            self.llm.model = value;
        }

        if let Some(value) = read_env("CADENCE_CORPUS_ROOT") {
            self.corpus.root = PathBuf::from(value);
        }
        if let Some(value) = read_env("CADENCE_PROMPTS_ROOT") {
            self.prompts.root = PathBuf::from(value);
        }

        if let Some(value) = read_env("CADENCE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CADENCE_SERVER_DATA_PORT") {
            self.server.data_port = parse_u16("CADENCE_SERVER_DATA_PORT", &value)?;
        }
        if let Some(value) = read_env("CADENCE_SERVER_PROMPT_PORT") {
            self.server.prompt_port = parse_u16("CADENCE_SERVER_PROMPT_PORT", &value)?;
        }

        let log_level = read_env("CADENCE_LOGGING_LEVEL").or_else(|| read_env("CADENCE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CADENCE_LOGGING_FORMAT").or_else(|| read_env("CADENCE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(data_endpoint) = overrides.data_endpoint {
            self.tools.data_endpoint = data_endpoint;
        }
        if let Some(prompt_endpoint) = overrides.prompt_endpoint {
            self.tools.prompt_endpoint = prompt_endpoint;
        }
        if let Some(corpus_root) = overrides.corpus_root {
            self.corpus.root = corpus_root;
        }
        if let Some(prompts_root) = overrides.prompts_root {
            self.prompts.root = prompts_root;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_tools(&self.tools)?;
        validate_deadlines(&self.deadlines)?;
        validate_llm(&self.llm)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("cadence.toml"), PathBuf::from("config/cadence.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    toml::from_str::<ConfigPatch>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_tools(tools: &ToolsConfig) -> Result<(), ConfigError> {
    validate_endpoint("tools.data_endpoint", &tools.data_endpoint)?;
    validate_endpoint("tools.prompt_endpoint", &tools.prompt_endpoint)?;

    if tools.call_timeout_secs == 0 || tools.call_timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "tools.call_timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    Ok(())
}

fn validate_endpoint(key: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{key} is required; the controller does not start without both tool endpoints"
        )));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn validate_deadlines(deadlines: &DeadlineConfig) -> Result<(), ConfigError> {
    if deadlines.turn_seconds == 0 {
        return Err(ConfigError::Validation(
            "deadlines.turn_seconds must be greater than zero".to_string(),
        ));
    }
    if deadlines.plan_seconds == 0 {
        return Err(ConfigError::Validation(
            "deadlines.plan_seconds must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers".to_string(),
                ));
            }
        }
        LlmProvider::Scripted => {}
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    tools: Option<ToolsPatch>,
    deadlines: Option<DeadlinesPatch>,
    llm: Option<LlmPatch>,
    corpus: Option<CorpusPatch>,
    prompts: Option<PromptsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolsPatch {
    data_endpoint: Option<String>,
    prompt_endpoint: Option<String>,
    call_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DeadlinesPatch {
    turn_seconds: Option<u64>,
    plan_seconds: Option<u64>,
    sync_recent_user_window_hours: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CorpusPatch {
    root: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PromptsPatch {
    root: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    data_port: Option<u16>,
    prompt_port: Option<u16>,
    health_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn endpoint_overrides() -> ConfigOverrides {
        ConfigOverrides {
            data_endpoint: Some("http://127.0.0.1:8091".to_string()),
            prompt_endpoint: Some("http://127.0.0.1:8092".to_string()),
            ..ConfigOverrides::default()
        }
    }

    #[test]
    fn missing_data_endpoint_fails_closed() {
        let _guard = env_lock().lock().expect("env lock");
        clear_vars(&["CADENCE_DATA_TOOL_ENDPOINT", "CADENCE_PROMPT_TOOL_ENDPOINT"]);

        let error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                prompt_endpoint: Some("http://127.0.0.1:8092".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect_err("config must not load without the data endpoint");

        assert!(matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("tools.data_endpoint")
        ));
    }

    #[test]
    fn missing_prompt_endpoint_fails_closed() {
        let _guard = env_lock().lock().expect("env lock");
        clear_vars(&["CADENCE_DATA_TOOL_ENDPOINT", "CADENCE_PROMPT_TOOL_ENDPOINT"]);

        let error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                data_endpoint: Some("http://127.0.0.1:8091".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect_err("config must not load without the prompt endpoint");

        assert!(matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("tools.prompt_endpoint")
        ));
    }

    #[test]
    fn defaults_match_documented_values() {
        let _guard = env_lock().lock().expect("env lock");
        clear_vars(&["CADENCE_DATA_TOOL_ENDPOINT", "CADENCE_PROMPT_TOOL_ENDPOINT"]);

        let config = AppConfig::load(LoadOptions {
            overrides: endpoint_overrides(),
            ..LoadOptions::default()
        })
        .expect("config should load with endpoint overrides");

        assert_eq!(config.tools.call_timeout_secs, 30);
        assert_eq!(config.deadlines.turn_seconds, 60);
        assert_eq!(config.deadlines.plan_seconds, 120);
        assert_eq!(config.deadlines.sync_recent_user_window_hours, 2);
        assert!(matches!(config.logging.format, LogFormat::Compact));
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CADENCE_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("CADENCE_DATA_TOOL_ENDPOINT", "http://env-data:8091");
        env::set_var("CADENCE_PROMPT_TOOL_ENDPOINT", "http://env-prompt:8092");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("cadence.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[tools]
data_endpoint = "http://file-data:8091"
prompt_endpoint = "http://file-prompt:8092"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            if config.database.url != "sqlite://from-override.db" {
                return Err("override database url should win".to_string());
            }
            if config.logging.level != "debug" {
                return Err("overridden log level should be debug".to_string());
            }
            if config.tools.data_endpoint != "http://env-data:8091" {
                return Err("env data endpoint should win over file".to_string());
            }
            Ok(())
        })();

        clear_vars(&[
            "CADENCE_DATABASE_URL",
            "CADENCE_DATA_TOOL_ENDPOINT",
            "CADENCE_PROMPT_TOOL_ENDPOINT",
        ]);
        result
    }

    #[test]
    fn endpoint_must_be_http() {
        let _guard = env_lock().lock().expect("env lock");
        clear_vars(&["CADENCE_DATA_TOOL_ENDPOINT", "CADENCE_PROMPT_TOOL_ENDPOINT"]);

        let error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                data_endpoint: Some("tcp://127.0.0.1:8091".to_string()),
                prompt_endpoint: Some("http://127.0.0.1:8092".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect_err("non-http endpoint should be rejected");

        assert!(matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("http://")
        ));
    }

    #[test]
    fn api_key_is_not_leaked_by_debug() {
        let _guard = env_lock().lock().expect("env lock");

        env::set_var("CADENCE_DATA_TOOL_ENDPOINT", "http://127.0.0.1:8091");
        env::set_var("CADENCE_PROMPT_TOOL_ENDPOINT", "http://127.0.0.1:8092");
        env::set_var("CADENCE_LLM_API_KEY", "sk-secret-value");

        let config = AppConfig::load(LoadOptions::default()).expect("config should load");
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret-value"), "debug output must not contain the api key");

        clear_vars(&[
            "CADENCE_DATA_TOOL_ENDPOINT",
            "CADENCE_PROMPT_TOOL_ENDPOINT",
            "CADENCE_LLM_API_KEY",
        ]);
    }
}
