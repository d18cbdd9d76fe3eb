use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub String);

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One catalog entry. Immutable after the inventory store is constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub brand: String,
    pub model: String,
    pub year: u16,
    #[serde(rename = "type")]
    pub category: String,
    pub price_range: String,
    #[serde(default)]
    pub features: Vec<String>,
    pub fuel_type: String,
    pub seating_capacity: u8,
    #[serde(default = "default_test_drive_minutes")]
    pub test_drive_duration_minutes: u32,
    pub availability: bool,
}

fn default_test_drive_minutes() -> u32 {
    60
}

impl Vehicle {
    /// Human-facing label, e.g. `Aurora Elegance (2024)`.
    pub fn label(&self) -> String {
        format!("{} {} ({})", self.brand, self.model, self.year)
    }
}

/// Working-hours table, kept in weekday order regardless of how the catalog
/// document happens to order its keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkingHours(Vec<(String, String)>);

impl WorkingHours {
    pub fn new(mut entries: Vec<(String, String)>) -> Self {
        entries.sort_by_key(|(day, _)| weekday_rank(day));
        Self(entries)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(day, hours)| (day.as_str(), hours.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn weekday_rank(day: &str) -> (u8, String) {
    let normalized = day.trim().to_ascii_lowercase();
    let rank = match normalized.as_str() {
        "monday" => 0,
        "tuesday" => 1,
        "wednesday" => 2,
        "thursday" => 3,
        "friday" => 4,
        "saturday" => 5,
        "sunday" => 6,
        _ => 7,
    };
    (rank, normalized)
}

impl Serialize for WorkingHours {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (day, hours) in &self.0 {
            map.serialize_entry(day, hours)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for WorkingHours {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Catalog documents write hours as a JSON object; key order is not
        // preserved by serde maps, so re-sort into weekday order.
        let entries = std::collections::HashMap::<String, String>::deserialize(deserializer)?;
        Ok(Self::new(entries.into_iter().collect()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealershipProfile {
    pub name: String,
    pub location: String,
    pub contact: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub working_hours: WorkingHours,
}

#[cfg(test)]
mod tests {
    use super::{Vehicle, VehicleId, WorkingHours};

    #[test]
    fn working_hours_deserialize_into_weekday_order() {
        let hours: WorkingHours = serde_json::from_value(serde_json::json!({
            "sunday": "closed",
            "monday": "9:00-18:00",
            "saturday": "10:00-16:00",
        }))
        .expect("object form should deserialize");

        let days: Vec<&str> = hours.entries().map(|(day, _)| day).collect();
        assert_eq!(days, vec!["monday", "saturday", "sunday"]);
    }

    #[test]
    fn label_combines_brand_model_and_year() {
        let vehicle = Vehicle {
            id: VehicleId("sedan_001".to_string()),
            brand: "Aurora".to_string(),
            model: "Elegance".to_string(),
            year: 2024,
            category: "sedan".to_string(),
            price_range: "28,000-32,000".to_string(),
            features: vec!["sunroof".to_string()],
            fuel_type: "hybrid".to_string(),
            seating_capacity: 5,
            test_drive_duration_minutes: 45,
            availability: true,
        };

        assert_eq!(vehicle.label(), "Aurora Elegance (2024)");
    }
}
