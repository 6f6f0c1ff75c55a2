use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flows::TransitionMode;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub ticketing: TicketingConfig,
    pub llm: LlmConfig,
    pub workflow: WorkflowConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct TicketingConfig {
    pub instance: String,
    pub incident_url: String,
    pub kb_url: Option<String>,
    pub api_key: SecretString,
    pub timeout_secs: u64,
    pub kb_limit: u32,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub step_limit: u32,
    pub transition_mode: TransitionMode,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
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
    pub ticketing_instance: Option<String>,
    pub ticketing_incident_url: Option<String>,
    pub ticketing_kb_url: Option<String>,
    pub ticketing_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub step_limit: Option<u32>,
    pub transition_mode: Option<TransitionMode>,
    pub log_level: Option<String>,
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
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_CONFIG_FILE: &str = "deskpilot.toml";
pub const NESTED_CONFIG_FILE: &str = "config/deskpilot.toml";
pub const DEFAULT_KB_LIMIT: u32 = 5;
pub const DEFAULT_STEP_LIMIT: u32 = 100;

const KB_TABLE_PATH: &str = "/api/now/table/kb_template_known_error_article";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ticketing: TicketingConfig {
                instance: String::new(),
                incident_url: String::new(),
                kb_url: None,
                api_key: String::new().into(),
                timeout_secs: 30,
                kb_limit: DEFAULT_KB_LIMIT,
            },
            llm: LlmConfig {
                base_url: "https://api.groq.com/openai/v1".to_string(),
                api_key: String::new().into(),
                model: "llama3-70b-8192".to_string(),
                max_tokens: 1024,
                timeout_secs: 30,
            },
            workflow: WorkflowConfig {
                step_limit: DEFAULT_STEP_LIMIT,
                transition_mode: TransitionMode::Tagged,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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

impl TicketingConfig {
    /// Knowledge-base table endpoint; derived from the instance host when unset.
    pub fn kb_endpoint(&self) -> String {
        if let Some(kb_url) = self.kb_url.as_deref().filter(|url| !url.trim().is_empty()) {
            return kb_url.trim().to_string();
        }
        let host = self
            .instance
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        format!("https://{host}{KB_TABLE_PATH}")
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
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(ticketing) = patch.ticketing {
            if let Some(instance) = ticketing.instance {
                self.ticketing.instance = instance;
            }
            if let Some(incident_url) = ticketing.incident_url {
                self.ticketing.incident_url = incident_url;
            }
            if let Some(kb_url) = ticketing.kb_url {
                self.ticketing.kb_url = Some(kb_url);
            }
            if let Some(api_key_value) = ticketing.api_key {
                self.ticketing.api_key = secret_value(api_key_value);
            }
            if let Some(timeout_secs) = ticketing.timeout_secs {
                self.ticketing.timeout_secs = timeout_secs;
            }
            if let Some(kb_limit) = ticketing.kb_limit {
                self.ticketing.kb_limit = kb_limit;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = secret_value(api_key_value);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(workflow) = patch.workflow {
            if let Some(step_limit) = workflow.step_limit {
                self.workflow.step_limit = step_limit;
            }
            if let Some(transition_mode) = workflow.transition_mode {
                self.workflow.transition_mode = transition_mode;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
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
        if let Some(value) = read_env("DESKPILOT_TICKETING_INSTANCE") {
            self.ticketing.instance = value;
        }
        if let Some(value) = read_env("DESKPILOT_TICKETING_INCIDENT_URL") {
            self.ticketing.incident_url = value;
        }
        if let Some(value) = read_env("DESKPILOT_TICKETING_KB_URL") {
            self.ticketing.kb_url = Some(value);
        }
        if let Some(value) = read_env("DESKPILOT_TICKETING_API_KEY") {
            self.ticketing.api_key = secret_value(value);
        }
        if let Some(value) = read_env("DESKPILOT_TICKETING_TIMEOUT_SECS") {
            self.ticketing.timeout_secs = parse_u64("DESKPILOT_TICKETING_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("DESKPILOT_TICKETING_KB_LIMIT") {
            self.ticketing.kb_limit = parse_u32("DESKPILOT_TICKETING_KB_LIMIT", &value)?;
        }

        if let Some(value) = read_env("DESKPILOT_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("DESKPILOT_LLM_API_KEY") {
            self.llm.api_key = secret_value(value);
        }
        if let Some(value) = read_env("DESKPILOT_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("DESKPILOT_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("DESKPILOT_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("DESKPILOT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("DESKPILOT_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DESKPILOT_WORKFLOW_STEP_LIMIT") {
            self.workflow.step_limit = parse_u32("DESKPILOT_WORKFLOW_STEP_LIMIT", &value)?;
        }
        if let Some(value) = read_env("DESKPILOT_WORKFLOW_TRANSITION_MODE") {
            self.workflow.transition_mode =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "DESKPILOT_WORKFLOW_TRANSITION_MODE".to_string(),
                    value: value.clone(),
                })?;
        }

        if let Some(value) = read_env("DESKPILOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DESKPILOT_SERVER_PORT") {
            self.server.port = parse_u16("DESKPILOT_SERVER_PORT", &value)?;
        }

        let log_level =
            read_env("DESKPILOT_LOGGING_LEVEL").or_else(|| read_env("DESKPILOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("DESKPILOT_LOGGING_FORMAT").or_else(|| read_env("DESKPILOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(instance) = overrides.ticketing_instance {
            self.ticketing.instance = instance;
        }
        if let Some(incident_url) = overrides.ticketing_incident_url {
            self.ticketing.incident_url = incident_url;
        }
        if let Some(kb_url) = overrides.ticketing_kb_url {
            self.ticketing.kb_url = Some(kb_url);
        }
        if let Some(api_key) = overrides.ticketing_api_key {
            self.ticketing.api_key = secret_value(api_key);
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = base_url;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = secret_value(api_key);
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(step_limit) = overrides.step_limit {
            self.workflow.step_limit = step_limit;
        }
        if let Some(transition_mode) = overrides.transition_mode {
            self.workflow.transition_mode = transition_mode;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ticketing(&self.ticketing)?;
        validate_llm(&self.llm)?;
        validate_workflow(&self.workflow)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_ticketing(ticketing: &TicketingConfig) -> Result<(), ConfigError> {
    if ticketing.instance.trim().is_empty() {
        return Err(ConfigError::Validation(
            "ticketing.instance is required (e.g. `dev12345.service-now.com`)".to_string(),
        ));
    }

    let incident_url = ticketing.incident_url.trim();
    if incident_url.is_empty() {
        return Err(ConfigError::Validation(
            "ticketing.incident_url is required (e.g. `https://<instance>/api/now/table/incident`)"
                .to_string(),
        ));
    }
    if !is_http_url(incident_url) {
        return Err(ConfigError::Validation(
            "ticketing.incident_url must start with http:// or https://".to_string(),
        ));
    }

    if let Some(kb_url) = ticketing.kb_url.as_deref().map(str::trim) {
        if !kb_url.is_empty() && !is_http_url(kb_url) {
            return Err(ConfigError::Validation(
                "ticketing.kb_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if ticketing.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "ticketing.api_key is required (sent as the `x-sn-apikey` header)".to_string(),
        ));
    }

    if ticketing.timeout_secs == 0 || ticketing.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "ticketing.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if ticketing.kb_limit == 0 {
        return Err(ConfigError::Validation(
            "ticketing.kb_limit must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation("llm.api_key is required".to_string()));
    }

    if !is_http_url(llm.base_url.trim()) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_workflow(workflow: &WorkflowConfig) -> Result<(), ConfigError> {
    if workflow.step_limit == 0 {
        return Err(ConfigError::Validation(
            "workflow.step_limit must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
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
    ticketing: Option<TicketingPatch>,
    llm: Option<LlmPatch>,
    workflow: Option<WorkflowPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TicketingPatch {
    instance: Option<String>,
    incident_url: Option<String>,
    kb_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
    kb_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowPatch {
    step_limit: Option<u32>,
    transition_mode: Option<TransitionMode>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
