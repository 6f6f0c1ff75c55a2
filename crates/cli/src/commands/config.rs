use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use deskpilot_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE, NESTED_CONFIG_FILE};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::CommandResult;

struct FieldSpec {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

impl FieldSpec {
    fn new(key_path: &'static str, env_keys: &'static [&'static str], value: String) -> Self {
        Self { key_path, env_keys, value }
    }
}

pub fn run() -> CommandResult {
    run_with_options(LoadOptions::default())
}

pub fn run_with_options(options: LoadOptions) -> CommandResult {
    let explicit_path = options.config_path.clone();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::config_failure(
                "config",
                format!("config validation failed: {error}"),
            )
        }
    };

    let config_file_path = detect_config_path(explicit_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<FieldSpec> {
    vec![
        FieldSpec::new(
            "ticketing.instance",
            &["DESKPILOT_TICKETING_INSTANCE"],
            config.ticketing.instance.clone(),
        ),
        FieldSpec::new(
            "ticketing.incident_url",
            &["DESKPILOT_TICKETING_INCIDENT_URL"],
            config.ticketing.incident_url.clone(),
        ),
        FieldSpec::new("ticketing.kb_url", &["DESKPILOT_TICKETING_KB_URL"], config.ticketing.kb_endpoint()),
        FieldSpec::new(
            "ticketing.api_key",
            &["DESKPILOT_TICKETING_API_KEY"],
            redact_secret(&config.ticketing.api_key),
        ),
        FieldSpec::new(
            "ticketing.timeout_secs",
            &["DESKPILOT_TICKETING_TIMEOUT_SECS"],
            config.ticketing.timeout_secs.to_string(),
        ),
        FieldSpec::new(
            "ticketing.kb_limit",
            &["DESKPILOT_TICKETING_KB_LIMIT"],
            config.ticketing.kb_limit.to_string(),
        ),
        FieldSpec::new("llm.base_url", &["DESKPILOT_LLM_BASE_URL"], config.llm.base_url.clone()),
        FieldSpec::new("llm.api_key", &["DESKPILOT_LLM_API_KEY"], redact_secret(&config.llm.api_key)),
        FieldSpec::new("llm.model", &["DESKPILOT_LLM_MODEL"], config.llm.model.clone()),
        FieldSpec::new(
            "llm.max_tokens",
            &["DESKPILOT_LLM_MAX_TOKENS"],
            config.llm.max_tokens.to_string(),
        ),
        FieldSpec::new(
            "llm.timeout_secs",
            &["DESKPILOT_LLM_TIMEOUT_SECS"],
            config.llm.timeout_secs.to_string(),
        ),
        FieldSpec::new(
            "workflow.step_limit",
            &["DESKPILOT_WORKFLOW_STEP_LIMIT"],
            config.workflow.step_limit.to_string(),
        ),
        FieldSpec::new(
            "workflow.transition_mode",
            &["DESKPILOT_WORKFLOW_TRANSITION_MODE"],
            format!("{:?}", config.workflow.transition_mode),
        ),
        FieldSpec::new(
            "server.bind_address",
            &["DESKPILOT_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        FieldSpec::new("server.port", &["DESKPILOT_SERVER_PORT"], config.server.port.to_string()),
        FieldSpec::new(
            "logging.level",
            &["DESKPILOT_LOGGING_LEVEL", "DESKPILOT_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        FieldSpec::new(
            "logging.format",
            &["DESKPILOT_LOGGING_FORMAT", "DESKPILOT_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn detect_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    toml::from_str::<Value>(&raw).ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in env_keys {
        let present = env::var(env_key).is_ok_and(|value| !value.trim().is_empty());
        if present {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a short prefix (e.g. `gsk_`) so operators can tell keys apart.
fn redact_secret(secret: &SecretString) -> String {
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.find(['-', '_']) {
        Some(index) if index <= 6 => format!("{}***", &trimmed[..=index]),
        _ => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::{contains_path, redact_secret};

    #[test]
    fn redaction_keeps_only_short_prefix() {
        let groq: SecretString = "gsk_abcdef123456".to_string().into();
        let plain: SecretString = "abcdef123456".to_string().into();
        let empty: SecretString = String::new().into();

        assert_eq!(redact_secret(&groq), "gsk_***");
        assert_eq!(redact_secret(&plain), "<redacted>");
        assert_eq!(redact_secret(&empty), "<empty>");
    }

    #[test]
    fn nested_key_lookup_walks_tables() {
        let doc: toml::Value = toml::from_str("[llm]\nmodel = \"x\"\n").expect("valid toml");

        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.api_key"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
