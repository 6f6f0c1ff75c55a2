use std::env;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use deskpilot_cli::commands::{ask, config, doctor};
use deskpilot_core::config::LoadOptions;
use serde_json::Value;

const VALID_ENV: [(&str, &str); 5] = [
    ("DESKPILOT_TICKETING_INSTANCE", "dev0001.service-now.com"),
    ("DESKPILOT_TICKETING_INCIDENT_URL", "https://dev0001.service-now.com/api/now/table/incident"),
    ("DESKPILOT_TICKETING_API_KEY", "sn-key-value"),
    ("DESKPILOT_LLM_API_KEY", "gsk_llm-value"),
    ("DESKPILOT_LLM_MODEL", "llama3-70b-8192"),
];

#[test]
fn ask_returns_config_failure_without_credentials() {
    with_env(&[], || {
        let result = ask::run_with_options("hello", false, isolated_options());
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or_default().contains("ticketing.instance"));
    });
}

#[test]
fn config_returns_config_failure_without_credentials() {
    with_env(&[], || {
        let result = config::run_with_options(isolated_options());
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_fails() {
    with_env(&[], || {
        let result = doctor::run_with_options(true, isolated_options());
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");

        let checks = payload["checks"].as_array().expect("checks array");
        assert_eq!(checks[0]["name"], "config_validation");
        assert_eq!(checks[0]["status"], "fail");
        assert!(checks[1..].iter().all(|check| check["status"] == "skipped"));
    });
}

#[test]
fn doctor_passes_with_complete_env() {
    with_env(&VALID_ENV, || {
        let result = doctor::run_with_options(true, isolated_options());
        assert_eq!(result.exit_code, 0, "doctor output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let names: Vec<&str> = payload["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .filter_map(|check| check["name"].as_str())
            .collect();
        assert_eq!(
            names,
            ["config_validation", "ticketing_endpoints", "ticketing_api_key", "llm_endpoint"]
        );
    });
}

#[test]
fn doctor_flags_plain_http_llm_endpoint() {
    let mut vars = VALID_ENV.to_vec();
    vars.push(("DESKPILOT_LLM_BASE_URL", "http://127.0.0.1:9/v1"));

    with_env(&vars, || {
        let result = doctor::run_with_options(false, isolated_options());
        assert_eq!(result.exit_code, 1);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] llm_endpoint: llm.base_url `http://127.0.0.1:9/v1` is not https"));
    });
}

#[test]
fn config_redacts_keys_and_reports_sources() {
    with_env(&VALID_ENV, || {
        let result = config::run_with_options(isolated_options());
        assert_eq!(result.exit_code, 0);

        let output = &result.output;
        assert!(output.contains("- ticketing.api_key = sn-*** (source: env (DESKPILOT_TICKETING_API_KEY))"));
        assert!(output.contains("- llm.api_key = gsk_*** (source: env (DESKPILOT_LLM_API_KEY))"));
        assert!(output.contains("- workflow.step_limit = 100 (source: default)"));
        assert!(!output.contains("sn-key-value"));
        assert!(!output.contains("llm-value"));
    });
}

#[test]
fn ask_reports_unreachable_ticketing_in_reply() {
    let mut vars = VALID_ENV.to_vec();
    vars.extend([
        ("DESKPILOT_TICKETING_INCIDENT_URL", "http://127.0.0.1:9/api/now/table/incident"),
        ("DESKPILOT_TICKETING_KB_URL", "http://127.0.0.1:9/api/now/table/kb"),
        ("DESKPILOT_TICKETING_TIMEOUT_SECS", "1"),
        ("DESKPILOT_LLM_BASE_URL", "http://127.0.0.1:9/v1"),
        ("DESKPILOT_LLM_TIMEOUT_SECS", "1"),
        ("DESKPILOT_WORKFLOW_STEP_LIMIT", "2"),
    ]);

    with_env(&vars, || {
        let result = ask::run_with_options("Process incident INC0000059", true, isolated_options());
        assert_eq!(result.exit_code, 0, "ask output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["intent"]["action_type"], "incident");
        assert_eq!(payload["intent"]["incident_number"], "INC0000059");
        assert!(payload["reply"].as_str().unwrap_or_default().contains("Error querying incident:"));
        assert!(payload["correlation_id"].as_str().is_some_and(|id| !id.is_empty()));
    });
}

fn isolated_options() -> LoadOptions {
    LoadOptions {
        config_path: Some(missing_config_path()),
        ..LoadOptions::default()
    }
}

fn missing_config_path() -> PathBuf {
    env::temp_dir().join("deskpilot-cli-tests").join("absent.toml")
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "DESKPILOT_TICKETING_INSTANCE",
        "DESKPILOT_TICKETING_INCIDENT_URL",
        "DESKPILOT_TICKETING_KB_URL",
        "DESKPILOT_TICKETING_API_KEY",
        "DESKPILOT_TICKETING_TIMEOUT_SECS",
        "DESKPILOT_TICKETING_KB_LIMIT",
        "DESKPILOT_LLM_BASE_URL",
        "DESKPILOT_LLM_API_KEY",
        "DESKPILOT_LLM_MODEL",
        "DESKPILOT_LLM_MAX_TOKENS",
        "DESKPILOT_LLM_TIMEOUT_SECS",
        "DESKPILOT_WORKFLOW_STEP_LIMIT",
        "DESKPILOT_WORKFLOW_TRANSITION_MODE",
        "DESKPILOT_SERVER_BIND_ADDRESS",
        "DESKPILOT_SERVER_PORT",
        "DESKPILOT_LOGGING_LEVEL",
        "DESKPILOT_LOGGING_FORMAT",
        "DESKPILOT_LOG_LEVEL",
        "DESKPILOT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
