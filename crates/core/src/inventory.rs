use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::vehicle::{DealershipProfile, Vehicle, VehicleId, WorkingHours};
use crate::errors::InventoryError;

/// Wire shape of the catalog document: dealership profile, working hours, and
/// the vehicle list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InventoryDocument {
    pub dealership: DealershipSection,
    #[serde(default)]
    pub working_hours: WorkingHours,
    pub inventory: Vec<Vehicle>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DealershipSection {
    pub name: String,
    pub location: String,
    pub contact: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Read-only vehicle catalog plus dealership metadata. Loaded eagerly at
/// startup and shared behind an `Arc`; any number of concurrent readers.
#[derive(Debug)]
pub struct InventoryStore {
    profile: DealershipProfile,
    vehicles: Vec<Vehicle>,
    by_id: HashMap<String, usize>,
}

impl InventoryStore {
    /// Loads and validates the catalog document. Fails fast: a missing or
    /// malformed file is a startup error, never a partially loaded store.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InventoryError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|source| InventoryError::Read { path: path.to_path_buf(), source })?;
        let document: InventoryDocument = serde_json::from_str(&raw)
            .map_err(|source| InventoryError::Parse { path: path.to_path_buf(), source })?;

        Self::from_document(document)
    }

    pub fn from_document(document: InventoryDocument) -> Result<Self, InventoryError> {
        let profile = DealershipProfile {
            name: document.dealership.name,
            location: document.dealership.location,
            contact: document.dealership.contact,
            email: document.dealership.email,
            working_hours: document.working_hours,
        };

        if profile.name.trim().is_empty() {
            return Err(InventoryError::Invalid("dealership.name must not be empty".to_string()));
        }

        let mut by_id = HashMap::with_capacity(document.inventory.len());
        for (index, vehicle) in document.inventory.iter().enumerate() {
            if vehicle.id.0.trim().is_empty() {
                return Err(InventoryError::Invalid(format!(
                    "vehicle at position {index} has an empty id"
                )));
            }
            if by_id.insert(vehicle.id.0.clone(), index).is_some() {
                return Err(InventoryError::Invalid(format!(
                    "duplicate vehicle id `{}`",
                    vehicle.id
                )));
            }
        }

        Ok(Self { profile, vehicles: document.inventory, by_id })
    }

    /// Case-insensitive substring match on the vehicle category, catalog order.
    pub fn search_by_category(&self, query: &str) -> Vec<&Vehicle> {
        let needle = query.trim().to_lowercase();
        self.vehicles
            .iter()
            .filter(|vehicle| vehicle.category.to_lowercase().contains(&needle))
            .collect()
    }

    /// Case-insensitive substring match on the brand, catalog order.
    pub fn search_by_brand(&self, query: &str) -> Vec<&Vehicle> {
        let needle = query.trim().to_lowercase();
        self.vehicles
            .iter()
            .filter(|vehicle| vehicle.brand.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn vehicle(&self, id: &VehicleId) -> Option<&Vehicle> {
        self.by_id.get(&id.0).map(|&index| &self.vehicles[index])
    }

    /// Vehicles whose availability flag is set, catalog order.
    pub fn available(&self) -> Vec<&Vehicle> {
        self.vehicles.iter().filter(|vehicle| vehicle.availability).collect()
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn profile(&self) -> &DealershipProfile {
        &self.profile
    }
}
