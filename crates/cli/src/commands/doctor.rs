use deskpilot_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_CONFIG_FAILURE, EXIT_RUNTIME_FAILURE};

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

const DEPENDENT_CHECKS: [&str; 3] = ["ticketing_endpoints", "ticketing_api_key", "llm_endpoint"];

pub fn run(json_output: bool) -> CommandResult {
    run_with_options(json_output, LoadOptions::default())
}

pub fn run_with_options(json_output: bool, options: LoadOptions) -> CommandResult {
    let report = build_report(options);
    let config_failed =
        report.checks.first().is_some_and(|check| check.status == CheckStatus::Fail);
    let exit_code = match report.overall_status {
        CheckStatus::Pass => 0,
        _ if config_failed => EXIT_CONFIG_FAILURE,
        _ => EXIT_RUNTIME_FAILURE,
    };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_ticketing_endpoints(&config));
            checks.push(check_secret("ticketing_api_key", &config.ticketing.api_key));
            checks.push(check_llm_endpoint(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
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

fn check_ticketing_endpoints(config: &AppConfig) -> DoctorCheck {
    let incident_url = config.ticketing.incident_url.trim();
    let kb_url = config.ticketing.kb_endpoint();

    let problems: Vec<String> = [("incident_url", incident_url), ("kb_url", kb_url.as_str())]
        .into_iter()
        .filter(|(_, url)| !url.starts_with("https://"))
        .map(|(key, url)| format!("ticketing.{key} `{url}` is not https"))
        .collect();

    if problems.is_empty() {
        DoctorCheck {
            name: "ticketing_endpoints",
            status: CheckStatus::Pass,
            details: format!("incidents at `{incident_url}`, kb at `{kb_url}`"),
        }
    } else {
        DoctorCheck {
            name: "ticketing_endpoints",
            status: CheckStatus::Fail,
            details: problems.join("; "),
        }
    }
}

fn check_llm_endpoint(config: &AppConfig) -> DoctorCheck {
    let base_url = config.llm.base_url.trim();
    if !base_url.starts_with("https://") {
        return DoctorCheck {
            name: "llm_endpoint",
            status: CheckStatus::Fail,
            details: format!("llm.base_url `{base_url}` is not https"),
        };
    }
    if config.llm.api_key.expose_secret().trim().is_empty() {
        return DoctorCheck {
            name: "llm_endpoint",
            status: CheckStatus::Fail,
            details: "llm.api_key is empty".to_string(),
        };
    }

    DoctorCheck {
        name: "llm_endpoint",
        status: CheckStatus::Pass,
        details: format!("model `{}` at `{base_url}`", config.llm.model),
    }
}

fn check_secret(name: &'static str, secret: &SecretString) -> DoctorCheck {
    let value = secret.expose_secret().trim();
    if value.is_empty() {
        return DoctorCheck { name, status: CheckStatus::Fail, details: "key is empty".to_string() };
    }
    if value.chars().any(char::is_whitespace) {
        return DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: "key contains whitespace".to_string(),
        };
    }

    DoctorCheck { name, status: CheckStatus::Pass, details: "key present".to_string() }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::{check_secret, CheckStatus};

    #[test]
    fn secret_check_flags_whitespace_and_empty_keys() {
        let cases = [("sn-key", CheckStatus::Pass), ("", CheckStatus::Fail), ("sn key", CheckStatus::Fail)];

        for (value, expected) in cases {
            let secret: SecretString = value.to_string().into();
            assert_eq!(check_secret("ticketing_api_key", &secret).status, expected, "value: {value:?}");
        }
    }
}
