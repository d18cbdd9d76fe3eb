use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use showroom_core::domain::booking::{BookingDraft, Slot};
use showroom_core::domain::vehicle::{Vehicle, VehicleId};
use showroom_core::errors::ToolError;
use showroom_core::inventory::InventoryStore;
use showroom_core::ledger::{AvailabilityLedger, SlotCheck};

use crate::llm::ToolSpec;

/// One callable operation the oracle may request. Read-only tools must be
/// idempotent; the booking tool is the only write path and routes through the
/// ledger's `reserve`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the argument map.
    fn parameters(&self) -> Value;
    async fn execute(&self, args: &Value) -> Result<String, ToolError>;
}

/// Fixed, enumerable set of named operations. Unknown names are rejected
/// explicitly with `ToolError::UnknownTool` rather than panicking or falling
/// through to dynamic behavior.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    /// Schema list advertised to the oracle, sorted by name so prompts are
    /// stable across runs.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub async fn call(&self, name: &str, args: &Value) -> Result<String, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(args).await
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Builds the registry with the full dealership tool set wired over the
/// shared inventory store and availability ledger.
pub fn dealership_tools(
    inventory: Arc<InventoryStore>,
    ledger: Arc<AvailabilityLedger>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::default();
    registry.register(SearchVehiclesByType { inventory: Arc::clone(&inventory) });
    registry.register(GetVehicleDetails { inventory: Arc::clone(&inventory) });
    registry.register(ListAvailableVehicles { inventory: Arc::clone(&inventory) });
    registry.register(CheckAvailability { ledger: Arc::clone(&ledger) });
    registry.register(BookTestDrive { inventory: Arc::clone(&inventory), ledger });
    registry.register(GetDealershipInfo { inventory });
    registry
}

fn require_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    args.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ToolError::InvalidInput(format!("missing required field `{field}`")))
}

fn optional_str(args: &Value, field: &str) -> Option<String> {
    args.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn summary_line(vehicle: &Vehicle) -> String {
    format!(
        "- {} {} ({}): ${}",
        vehicle.brand, vehicle.model, vehicle.year, vehicle.price_range
    )
}

struct SearchVehiclesByType {
    inventory: Arc<InventoryStore>,
}

#[async_trait]
impl Tool for SearchVehiclesByType {
    fn name(&self) -> &'static str {
        "search_vehicles_by_type"
    }

    fn description(&self) -> &'static str {
        "Search the catalog for vehicles by type (sedan, SUV, truck, compact, electric)"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "type": { "type": "string", "description": "Vehicle type to search for" }
            },
            "required": ["type"]
        })
    }

    async fn execute(&self, args: &Value) -> Result<String, ToolError> {
        let category = require_str(args, "type")?;
        let matches = self.inventory.search_by_category(category);

        if matches.is_empty() {
            return Ok(format!("No vehicles found of type '{category}'"));
        }

        let mut response =
            format!("Found {} vehicle(s) of type '{category}':\n", matches.len());
        for vehicle in matches {
            response.push_str(&summary_line(vehicle));
            response.push('\n');
        }
        Ok(response)
    }
}

struct GetVehicleDetails {
    inventory: Arc<InventoryStore>,
}

#[async_trait]
impl Tool for GetVehicleDetails {
    fn name(&self) -> &'static str {
        "get_vehicle_details"
    }

    fn description(&self) -> &'static str {
        "Get detailed information about a specific vehicle by its catalog ID"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "vehicle_id": { "type": "string", "description": "Catalog ID, e.g. sedan_001" }
            },
            "required": ["vehicle_id"]
        })
    }

    async fn execute(&self, args: &Value) -> Result<String, ToolError> {
        let id = require_str(args, "vehicle_id")?;
        let vehicle = self
            .inventory
            .vehicle(&VehicleId(id.to_string()))
            .ok_or_else(|| ToolError::VehicleNotFound(id.to_string()))?;

        let mut response = format!("**{}**\n", vehicle.label());
        response.push_str(&format!("Type: {}\n", vehicle.category));
        response.push_str(&format!("Price: ${}\n", vehicle.price_range));
        let features: Vec<&str> =
            vehicle.features.iter().take(5).map(String::as_str).collect();
        response.push_str(&format!("Features: {}\n", features.join(", ")));
        response.push_str(&format!("Fuel Type: {}\n", vehicle.fuel_type));
        response.push_str(&format!("Seating: {}\n", vehicle.seating_capacity));
        response.push_str(&format!(
            "Test drive duration: {} minutes\n",
            vehicle.test_drive_duration_minutes
        ));
        Ok(response)
    }
}

struct ListAvailableVehicles {
    inventory: Arc<InventoryStore>,
}

#[async_trait]
impl Tool for ListAvailableVehicles {
    fn name(&self) -> &'static str {
        "list_available_vehicles"
    }

    fn description(&self) -> &'static str {
        "List all vehicles currently available for a test drive"
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: &Value) -> Result<String, ToolError> {
        let available = self.inventory.available();
        if available.is_empty() {
            return Ok("No vehicles are currently available".to_string());
        }

        let mut response = String::from("Available vehicles for test drive:\n");
        for vehicle in available {
            response.push_str(&summary_line(vehicle));
            response.push('\n');
        }
        Ok(response)
    }
}

struct CheckAvailability {
    ledger: Arc<AvailabilityLedger>,
}

#[async_trait]
impl Tool for CheckAvailability {
    fn name(&self) -> &'static str {
        "check_availability"
    }

    fn description(&self) -> &'static str {
        "Check whether a specific date and time is free for a test drive of a vehicle"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "vehicle_id": { "type": "string", "description": "Catalog ID of the vehicle" },
                "date": { "type": "string", "description": "Requested date, YYYY-MM-DD" },
                "time": { "type": "string", "description": "Requested start time, HH:MM" }
            },
            "required": ["vehicle_id", "date", "time"]
        })
    }

    async fn execute(&self, args: &Value) -> Result<String, ToolError> {
        let vehicle_id = require_str(args, "vehicle_id")?;
        let date = require_str(args, "date")?;
        let time = require_str(args, "time")?;
        let slot = Slot::parse(VehicleId(vehicle_id.to_string()), date, time)?;

        Ok(match self.ledger.check(&slot) {
            SlotCheck::Free => {
                format!("Great! {date} at {time} is available for booking.")
            }
            SlotCheck::Taken => format!(
                "Sorry, {date} at {time} is already booked for that vehicle. Please choose another time."
            ),
            SlotCheck::InPast => {
                format!("Sorry, {date} is in the past and cannot be booked.")
            }
            SlotCheck::BeyondHorizon => format!(
                "Sorry, {date} is too far ahead; bookings are only accepted up to {} days out.",
                self.ledger.policy().horizon_days
            ),
        })
    }
}

struct BookTestDrive {
    inventory: Arc<InventoryStore>,
    ledger: Arc<AvailabilityLedger>,
}

#[async_trait]
impl Tool for BookTestDrive {
    fn name(&self) -> &'static str {
        "book_test_drive"
    }

    fn description(&self) -> &'static str {
        "Book a test drive for a customer on a specific date and time"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "customer_name": { "type": "string", "description": "Customer full name" },
                "customer_phone": { "type": "string", "description": "Customer phone number" },
                "customer_email": { "type": "string", "description": "Customer email (optional)" },
                "vehicle_id": { "type": "string", "description": "Catalog ID of the vehicle" },
                "date": { "type": "string", "description": "Preferred date, YYYY-MM-DD" },
                "time": { "type": "string", "description": "Preferred start time, HH:MM" }
            },
            "required": ["customer_name", "customer_phone", "vehicle_id", "date", "time"]
        })
    }

    async fn execute(&self, args: &Value) -> Result<String, ToolError> {
        let customer_name = require_str(args, "customer_name")?;
        let customer_phone = require_str(args, "customer_phone")?;
        let vehicle_id = require_str(args, "vehicle_id")?;
        let date = require_str(args, "date")?;
        let time = require_str(args, "time")?;

        let vehicle = self
            .inventory
            .vehicle(&VehicleId(vehicle_id.to_string()))
            .ok_or_else(|| ToolError::VehicleNotFound(vehicle_id.to_string()))?;

        let slot = Slot::parse(vehicle.id.clone(), date, time)?;
        let draft = BookingDraft {
            customer_name: customer_name.to_string(),
            customer_phone: customer_phone.to_string(),
            customer_email: optional_str(args, "customer_email"),
            vehicle_label: vehicle.label(),
            duration_minutes: vehicle.test_drive_duration_minutes,
        };

        let booking = self.ledger.reserve(slot, draft)?;

        Ok(format!(
            "Test drive booked successfully!\n\
             Booking ID: {}\n\
             Vehicle: {}\n\
             Date: {} at {}\n\
             Duration: {} minutes\n\
             Confirmation will be sent to {}",
            booking.id,
            booking.vehicle_label,
            booking.date,
            booking.time.format("%H:%M"),
            booking.duration_minutes,
            booking.customer_phone
        ))
    }
}

struct GetDealershipInfo {
    inventory: Arc<InventoryStore>,
}

#[async_trait]
impl Tool for GetDealershipInfo {
    fn name(&self) -> &'static str {
        "get_dealership_info"
    }

    fn description(&self) -> &'static str {
        "Get dealership contact information and working hours"
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: &Value) -> Result<String, ToolError> {
        let profile = self.inventory.profile();

        let mut response = format!("**{}**\n", profile.name);
        response.push_str(&format!("Location: {}\n", profile.location));
        response.push_str(&format!("Contact: {}\n", profile.contact));
        if let Some(email) = &profile.email {
            response.push_str(&format!("Email: {email}\n"));
        }

        if !profile.working_hours.is_empty() {
            response.push_str("\nWorking Hours:\n");
            for (day, hours) in profile.working_hours.entries() {
                let mut label = day.to_string();
                if let Some(first) = label.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                response.push_str(&format!("- {label}: {hours}\n"));
            }
        }

        Ok(response)
    }
}
