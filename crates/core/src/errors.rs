use std::path::PathBuf;

use thiserror::Error;

use crate::domain::booking::Slot;

/// Fatal startup failures. This is the only error class allowed to terminate
/// the process; everything else is recovered at the dispatch boundary.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("could not read inventory file `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse inventory file `{path}`: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("invalid inventory: {0}")]
    Invalid(String),
}

/// Booking conflicts raised by the availability ledger.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReserveError {
    #[error("slot {} is already booked", format_slot(.0))]
    SlotTaken(Slot),
    #[error("slot {} is outside the booking window: {reason}", format_slot(slot))]
    SlotOutOfWindow { slot: Slot, reason: String },
}

fn format_slot(slot: &Slot) -> String {
    format!("{} on {} at {}", slot.vehicle_id, slot.date, slot.time.format("%H:%M"))
}

/// Failures surfaced by tool execution. None of these are fatal: the dispatch
/// loop reports them back to the decision oracle as tool output so it can
/// correct its input or apologize to the customer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("vehicle `{0}` was not found in the catalog")]
    VehicleNotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error(transparent)]
    Reserve(#[from] ReserveError),
}

impl ToolError {
    /// Conversational rendering, suitable for feeding back to the oracle or
    /// showing directly to a customer.
    pub fn user_message(&self) -> String {
        match self {
            Self::VehicleNotFound(id) => {
                format!("Sorry, I couldn't find a vehicle with ID '{id}' in our catalog.")
            }
            Self::InvalidInput(reason) => {
                format!("I couldn't process that request: {reason}.")
            }
            Self::UnknownTool(name) => {
                format!("Tool `{name}` does not exist. Pick one of the listed tools.")
            }
            Self::Reserve(ReserveError::SlotTaken(slot)) => format!(
                "Sorry, {} at {} is already booked for that vehicle. Please choose another time.",
                slot.date,
                slot.time.format("%H:%M")
            ),
            Self::Reserve(ReserveError::SlotOutOfWindow { slot, reason }) => format!(
                "Sorry, {} at {} can't be booked: {reason}.",
                slot.date,
                slot.time.format("%H:%M")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use crate::domain::booking::Slot;
    use crate::domain::vehicle::VehicleId;

    use super::{ReserveError, ToolError};

    fn slot() -> Slot {
        Slot {
            vehicle_id: VehicleId("sedan_001".to_string()),
            date: NaiveDate::from_ymd_opt(2030, 6, 15).expect("valid date"),
            time: NaiveTime::from_hms_opt(10, 0, 0).expect("valid time"),
        }
    }

    #[test]
    fn reserve_errors_convert_into_tool_errors() {
        let error = ToolError::from(ReserveError::SlotTaken(slot()));
        assert!(matches!(error, ToolError::Reserve(ReserveError::SlotTaken(_))));
    }

    #[test]
    fn slot_taken_message_names_the_requested_time() {
        let message = ToolError::from(ReserveError::SlotTaken(slot())).user_message();
        assert!(message.contains("2030-06-15"));
        assert!(message.contains("10:00"));
    }

    #[test]
    fn unknown_tool_message_invites_a_retry() {
        let message = ToolError::UnknownTool("telepathy".to_string()).user_message();
        assert!(message.contains("telepathy"));
        assert!(message.contains("does not exist"));
    }
}
