use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use showroom_agent::{ChatCompletionsOracle, DispatchLimits, OracleError, SessionOrchestrator};
use showroom_core::config::{AppConfig, ConfigError, LoadOptions};
use showroom_core::inventory::InventoryStore;
use showroom_core::ledger::{AvailabilityLedger, BookingPolicy};
use showroom_core::InventoryError;

pub struct Application {
    pub config: AppConfig,
    pub orchestrator: Arc<SessionOrchestrator>,
    pub inventory: Arc<InventoryStore>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("inventory load failed: {0}")]
    Inventory(#[from] InventoryError),
    #[error("oracle setup failed: {0}")]
    Oracle(#[from] OracleError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        inventory_path = %config.inventory.path.display(),
        "starting application bootstrap"
    );

    // Fail fast on a bad catalog rather than serving an empty showroom.
    let inventory = Arc::new(InventoryStore::load(&config.inventory.path)?);
    info!(
        event_name = "system.bootstrap.inventory_loaded",
        vehicle_count = inventory.vehicles().len(),
        dealership = %inventory.profile().name,
        "inventory catalog loaded"
    );

    let ledger = Arc::new(AvailabilityLedger::new(BookingPolicy {
        horizon_days: config.booking.horizon_days,
    }));
    let oracle = Arc::new(ChatCompletionsOracle::from_config(&config.llm)?);
    let orchestrator = Arc::new(SessionOrchestrator::new(
        Arc::clone(&inventory),
        ledger,
        oracle,
        DispatchLimits { max_tool_calls: config.agent.max_tool_calls },
    ));

    Ok(Application { config, orchestrator, inventory })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use showroom_core::config::{ConfigOverrides, LoadOptions};

    use super::{bootstrap, BootstrapError};

    fn isolated_options() -> LoadOptions {
        LoadOptions {
            config_path: Some("/nonexistent/showroom.toml".into()),
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_when_the_catalog_is_missing() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                inventory_path: Some("/nonexistent/inventory.json".into()),
                ..ConfigOverrides::default()
            },
            ..isolated_options()
        })
        .await;

        assert!(matches!(result, Err(BootstrapError::Inventory(_))));
    }

    #[tokio::test]
    async fn bootstrap_succeeds_with_a_valid_catalog() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{
                "dealership": {{
                    "name": "Premium Auto Dealership",
                    "location": "123 Main Street, Springfield",
                    "contact": "+1-555-0100"
                }},
                "working_hours": {{ "monday": "9:00-18:00" }},
                "inventory": [{{
                    "id": "sedan_001",
                    "brand": "Aurora",
                    "model": "Elegance",
                    "year": 2024,
                    "type": "sedan",
                    "price_range": "28,000-32,000",
                    "fuel_type": "hybrid",
                    "seating_capacity": 5,
                    "availability": true
                }}]
            }}"#
        )
        .expect("write fixture");

        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                inventory_path: Some(file.path().to_path_buf()),
                ..ConfigOverrides::default()
            },
            ..isolated_options()
        })
        .await
        .expect("bootstrap should succeed with a valid catalog");

        assert_eq!(app.inventory.vehicles().len(), 1);
        assert_eq!(app.orchestrator.bookings().len(), 0);
    }
}
