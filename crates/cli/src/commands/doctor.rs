use std::path::Path;

use recipebot_core::config::{AppConfig, LoadOptions};
use recipebot_core::SystemPrompt;
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_CONFIG};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
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

/// Offline readiness checks; no request is sent to the model provider.
pub fn run(config_path: Option<&Path>, json_output: bool) -> CommandResult {
    let report = build_report(config_path);
    let exit_code = if report.overall_status == CheckStatus::Fail { EXIT_CONFIG } else { 0 };

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

fn build_report(config_path: Option<&Path>) -> DoctorReport {
    let mut checks = Vec::new();
    let options = LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        require_file: config_path.is_some(),
        ..LoadOptions::default()
    };

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_system_prompt(&config));
            checks.push(check_credentials(&config));
            checks.push(check_input_source(&config));
            checks.push(check_results_dir(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["system_prompt", "llm_credentials", "bulk_input", "results_dir"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_system_prompt(config: &AppConfig) -> DoctorCheck {
    match SystemPrompt::from_config(&config.agent) {
        Ok(prompt) => {
            let origin = config
                .agent
                .system_prompt_path
                .as_ref()
                .map(|path| format!("`{}`", path.display()))
                .unwrap_or_else(|| "built-in prompt".to_string());
            DoctorCheck {
                name: "system_prompt",
                status: CheckStatus::Pass,
                details: format!("{origin} loaded ({} chars)", prompt.as_str().chars().count()),
            }
        }
        Err(error) => DoctorCheck {
            name: "system_prompt",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_credentials(config: &AppConfig) -> DoctorCheck {
    match config.llm.require_api_key() {
        Ok(Some(_)) => DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Pass,
            details: format!(
                "{} api key present; endpoint {}",
                config.llm.provider.as_str(),
                config.llm.base_url()
            ),
        },
        Ok(None) => DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Pass,
            details: format!("{} needs no api key", config.llm.provider.as_str()),
        },
        Err(error) => DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_input_source(config: &AppConfig) -> DoctorCheck {
    let path = &config.bulk.input_path;
    if path.is_file() {
        DoctorCheck {
            name: "bulk_input",
            status: CheckStatus::Pass,
            details: format!("`{}` found", path.display()),
        }
    } else {
        DoctorCheck {
            name: "bulk_input",
            status: CheckStatus::Warn,
            details: format!("`{}` not found; pass --csv to `bulk`", path.display()),
        }
    }
}

fn check_results_dir(config: &AppConfig) -> DoctorCheck {
    let dir = &config.bulk.results_dir;
    let details = if dir.is_dir() {
        format!("`{}` exists", dir.display())
    } else {
        format!("`{}` will be created on the first bulk run", dir.display())
    };
    DoctorCheck { name: "results_dir", status: CheckStatus::Pass, details }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
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
