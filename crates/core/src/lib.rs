pub mod config;
pub mod domain;
pub mod errors;
pub mod inventory;
pub mod ledger;

pub use domain::booking::{Booking, BookingDraft, BookingId, BookingStatus, Slot};
pub use domain::vehicle::{DealershipProfile, Vehicle, VehicleId, WorkingHours};
pub use errors::{InventoryError, ReserveError, ToolError};
pub use inventory::{InventoryDocument, InventoryStore};
pub use ledger::{AvailabilityLedger, BookingPolicy, Clock, SlotCheck, SystemClock};
