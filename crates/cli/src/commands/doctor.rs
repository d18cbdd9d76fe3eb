use serde::Serialize;

use showroom_agent::ChatCompletionsOracle;
use showroom_core::config::{AppConfig, LoadOptions};
use showroom_core::inventory::InventoryStore;

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
                escape_json(&error.to_string())
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
            checks.push(check_inventory(&config));
            checks.push(check_oracle(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "inventory_readiness",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "oracle_endpoint",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
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

fn check_inventory(config: &AppConfig) -> DoctorCheck {
    match InventoryStore::load(&config.inventory.path) {
        Ok(inventory) => DoctorCheck {
            name: "inventory_readiness",
            status: CheckStatus::Pass,
            details: format!(
                "loaded {} vehicles ({} available) for `{}`",
                inventory.vehicles().len(),
                inventory.available().len(),
                inventory.profile().name
            ),
        },
        Err(error) => DoctorCheck {
            name: "inventory_readiness",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_oracle(config: &AppConfig) -> DoctorCheck {
    // Endpoint construction only; no network round-trip.
    match ChatCompletionsOracle::from_config(&config.llm) {
        Ok(_) => DoctorCheck {
            name: "oracle_endpoint",
            status: CheckStatus::Pass,
            details: format!(
                "oracle configured for provider {:?} with model `{}`",
                config.llm.provider, config.llm.model
            ),
        },
        Err(error) => DoctorCheck {
            name: "oracle_endpoint",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
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
