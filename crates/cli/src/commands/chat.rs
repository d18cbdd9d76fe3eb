use std::io::{self, BufRead, Write};
use std::sync::Arc;

use showroom_agent::{ChatCompletionsOracle, DispatchLimits, SessionOrchestrator};
use showroom_core::config::{AppConfig, LoadOptions};
use showroom_core::inventory::InventoryStore;
use showroom_core::ledger::{AvailabilityLedger, BookingPolicy};

use crate::commands::CommandResult;

/// Interactive REPL against the configured oracle. One session per
/// invocation; `exit` or end-of-input leaves the loop.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("chat", "config_validation", error.to_string(), 2)
        }
    };

    let inventory = match InventoryStore::load(&config.inventory.path) {
        Ok(inventory) => Arc::new(inventory),
        Err(error) => {
            return CommandResult::failure("chat", "inventory_load", error.to_string(), 3)
        }
    };

    let oracle = match ChatCompletionsOracle::from_config(&config.llm) {
        Ok(oracle) => Arc::new(oracle),
        Err(error) => return CommandResult::failure("chat", "oracle_setup", error.to_string(), 4),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => return CommandResult::failure("chat", "runtime", error.to_string(), 5),
    };

    let ledger = Arc::new(AvailabilityLedger::new(BookingPolicy {
        horizon_days: config.booking.horizon_days,
    }));
    let orchestrator = SessionOrchestrator::new(
        inventory.clone(),
        ledger,
        oracle,
        DispatchLimits { max_tool_calls: config.agent.max_tool_calls },
    );

    println!("Welcome to {}. Type 'exit' to leave.", inventory.profile().name);

    let stdin = io::stdin();
    let session_id = "cli".to_string();
    loop {
        print!("you> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(error) => return CommandResult::failure("chat", "stdin", error.to_string(), 5),
        }

        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        let reply = runtime.block_on(orchestrator.process(&session_id, message));
        println!("assistant> {reply}");
    }

    let bookings = orchestrator.bookings();
    if !bookings.is_empty() {
        println!("\nBookings made this session:");
        for booking in &bookings {
            println!(
                "- {} | {} | {} at {} | {}",
                booking.id,
                booking.vehicle_label,
                booking.date,
                booking.time.format("%H:%M"),
                booking.customer_name
            );
        }
    }

    CommandResult::success(
        "chat",
        format!("chat session ended with {} booking(s)", bookings.len()),
    )
}
