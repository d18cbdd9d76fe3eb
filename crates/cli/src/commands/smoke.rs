use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::json;

use showroom_agent::{
    Decision, DispatchLimits, ScriptedOracle, SessionOrchestrator, ToolCall,
};
use showroom_core::config::{AppConfig, LoadOptions};
use showroom_core::inventory::InventoryStore;
use showroom_core::ledger::{AvailabilityLedger, BookingPolicy};

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

/// Offline end-to-end validation: config, catalog, and one scripted
/// conversation through the real dispatch loop and ledger. No network; the
/// oracle is replaced with a fixed script.
pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config = match timed_check(|| AppConfig::load(LoadOptions::default())) {
        Ok((elapsed_ms, config)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Pass,
                elapsed_ms,
                message: "configuration loaded and validated".to_string(),
            });
            config
        }
        Err((elapsed_ms, error)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Fail,
                elapsed_ms,
                message: error.to_string(),
            });
            checks.push(skipped("inventory_load"));
            checks.push(skipped("scripted_conversation"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let inventory = match timed_check(|| InventoryStore::load(&config.inventory.path)) {
        Ok((elapsed_ms, inventory)) => {
            checks.push(SmokeCheck {
                name: "inventory_load",
                status: SmokeStatus::Pass,
                elapsed_ms,
                message: format!(
                    "loaded {} vehicles for `{}`",
                    inventory.vehicles().len(),
                    inventory.profile().name
                ),
            });
            Arc::new(inventory)
        }
        Err((elapsed_ms, error)) => {
            checks.push(SmokeCheck {
                name: "inventory_load",
                status: SmokeStatus::Fail,
                elapsed_ms,
                message: error.to_string(),
            });
            checks.push(skipped("scripted_conversation"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck {
                name: "scripted_conversation",
                status: SmokeStatus::Fail,
                elapsed_ms: 0,
                message: format!("failed to initialize async runtime: {error}"),
            });
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let conversation_started = Instant::now();
    let result = runtime.block_on(scripted_conversation(&config, inventory));
    checks.push(match result {
        Ok(message) => SmokeCheck {
            name: "scripted_conversation",
            status: SmokeStatus::Pass,
            elapsed_ms: conversation_started.elapsed().as_millis() as u64,
            message,
        },
        Err(message) => SmokeCheck {
            name: "scripted_conversation",
            status: SmokeStatus::Fail,
            elapsed_ms: conversation_started.elapsed().as_millis() as u64,
            message,
        },
    });

    finalize_report(checks, started.elapsed().as_millis() as u64)
}

/// Drives a two-turn scripted session: a catalog listing, then a booking for
/// the first available vehicle tomorrow at 10:00.
async fn scripted_conversation(
    config: &AppConfig,
    inventory: Arc<InventoryStore>,
) -> Result<String, String> {
    let vehicle = inventory
        .available()
        .first()
        .map(|vehicle| vehicle.id.clone())
        .ok_or_else(|| "catalog has no available vehicles to book".to_string())?;

    let tomorrow = chrono::Utc::now()
        .date_naive()
        .succ_opt()
        .ok_or_else(|| "calendar overflow computing tomorrow".to_string())?
        .format("%Y-%m-%d")
        .to_string();

    let oracle = Arc::new(ScriptedOracle::new(vec![
        Ok(Decision::ToolCalls(vec![ToolCall {
            id: "smoke-1".to_string(),
            name: "list_available_vehicles".to_string(),
            arguments: json!({}),
        }])),
        Ok(Decision::Reply("Here is what we have in stock.".to_string())),
        Ok(Decision::ToolCalls(vec![ToolCall {
            id: "smoke-2".to_string(),
            name: "book_test_drive".to_string(),
            arguments: json!({
                "customer_name": "Smoke Test",
                "customer_phone": "555-0000",
                "vehicle_id": vehicle.0,
                "date": tomorrow,
                "time": "10:00"
            }),
        }])),
        Ok(Decision::Reply("Your test drive is booked.".to_string())),
    ]));

    let ledger = Arc::new(AvailabilityLedger::new(BookingPolicy {
        horizon_days: config.booking.horizon_days,
    }));
    let orchestrator = SessionOrchestrator::new(
        inventory,
        ledger,
        oracle,
        DispatchLimits { max_tool_calls: config.agent.max_tool_calls },
    );

    let listing = orchestrator.process("smoke", "what can I test drive?").await;
    if listing != "Here is what we have in stock." {
        return Err(format!("unexpected listing reply: {listing}"));
    }

    let booked = orchestrator.process("smoke", "book the first one tomorrow at 10").await;
    if booked != "Your test drive is booked." {
        return Err(format!("unexpected booking reply: {booked}"));
    }

    let bookings = orchestrator.bookings();
    if bookings.len() != 1 {
        return Err(format!("expected exactly one booking, found {}", bookings.len()));
    }
    if !bookings[0].id.0.starts_with("TD-") {
        return Err(format!("booking id has unexpected shape: {}", bookings[0].id.0));
    }

    Ok(format!("scripted conversation booked `{}`", bookings[0].id.0))
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((started.elapsed().as_millis() as u64, value)),
        Err(error) => Err((started.elapsed().as_millis() as u64, error)),
    }
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due previous failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
