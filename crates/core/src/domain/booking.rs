use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::vehicle::VehicleId;
use crate::errors::ToolError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(pub String);

impl std::fmt::Display for BookingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The key a reservation is checked and stored under: one vehicle, one date,
/// one start time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub vehicle_id: VehicleId,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Slot {
    /// Builds a slot from wire-format strings (`YYYY-MM-DD`, `HH:MM`).
    /// Malformed input is an `InvalidInput` tool error, not a panic.
    pub fn parse(vehicle_id: VehicleId, date: &str, time: &str) -> Result<Self, ToolError> {
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| {
            ToolError::InvalidInput(format!("date `{date}` is not in YYYY-MM-DD format"))
        })?;
        let time = NaiveTime::parse_from_str(time.trim(), "%H:%M").map_err(|_| {
            ToolError::InvalidInput(format!("time `{time}` is not in HH:MM format"))
        })?;

        Ok(Self { vehicle_id, date, time })
    }
}

/// Booking lifecycle status. Only `Confirmed` is produced today; the other
/// variants are reserved for cancellation/rescheduling support and have no
/// transition logic yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Completed,
}

/// Customer details handed to the ledger when reserving a slot. The ledger
/// turns a draft into a `Booking` only after the slot check passes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingDraft {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub vehicle_label: String,
    pub duration_minutes: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub vehicle_id: VehicleId,
    pub vehicle_label: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn slot(&self) -> Slot {
        Slot { vehicle_id: self.vehicle_id.clone(), date: self.date, time: self.time }
    }
}
