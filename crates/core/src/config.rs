use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub inventory: InventoryConfig,
    pub llm: LlmConfig,
    pub booking: BookingConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct InventoryConfig {
    pub path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct BookingConfig {
    /// Rolling booking horizon in days, counted from "today".
    pub horizon_days: u32,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Per-turn ceiling on oracle-requested tool calls.
    pub max_tool_calls: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub inventory_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub booking_horizon_days: Option<u32>,
    pub agent_max_tool_calls: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            inventory: InventoryConfig { path: PathBuf::from("data/inventory.json") },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            booking: BookingConfig { horizon_days: 30 },
            agent: AgentConfig { max_tool_calls: 6 },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("showroom.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(inventory) = patch.inventory {
            if let Some(path) = inventory.path {
                self.inventory.path = PathBuf::from(path);
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(booking) = patch.booking {
            if let Some(horizon_days) = booking.horizon_days {
                self.booking.horizon_days = horizon_days;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(max_tool_calls) = agent.max_tool_calls {
                self.agent.max_tool_calls = max_tool_calls;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SHOWROOM_INVENTORY_PATH") {
            self.inventory.path = PathBuf::from(value);
        }

        if let Some(value) = read_env("SHOWROOM_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("SHOWROOM_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SHOWROOM_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("SHOWROOM_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("SHOWROOM_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SHOWROOM_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SHOWROOM_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("SHOWROOM_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("SHOWROOM_BOOKING_HORIZON_DAYS") {
            self.booking.horizon_days = parse_u32("SHOWROOM_BOOKING_HORIZON_DAYS", &value)?;
        }
        if let Some(value) = read_env("SHOWROOM_AGENT_MAX_TOOL_CALLS") {
            self.agent.max_tool_calls = parse_u32("SHOWROOM_AGENT_MAX_TOOL_CALLS", &value)?;
        }

        if let Some(value) = read_env("SHOWROOM_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SHOWROOM_SERVER_PORT") {
            self.server.port = parse_u16("SHOWROOM_SERVER_PORT", &value)?;
        }

        let log_level =
            read_env("SHOWROOM_LOGGING_LEVEL").or_else(|| read_env("SHOWROOM_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SHOWROOM_LOGGING_FORMAT").or_else(|| read_env("SHOWROOM_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(inventory_path) = overrides.inventory_path {
            self.inventory.path = inventory_path;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
        if let Some(horizon_days) = overrides.booking_horizon_days {
            self.booking.horizon_days = horizon_days;
        }
        if let Some(max_tool_calls) = overrides.agent_max_tool_calls {
            self.agent.max_tool_calls = max_tool_calls;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_inventory(&self.inventory)?;
        validate_llm(&self.llm)?;
        validate_booking(&self.booking)?;
        validate_agent(&self.agent)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("showroom.toml"), PathBuf::from("config/showroom.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_inventory(inventory: &InventoryConfig) -> Result<(), ConfigError> {
    if inventory.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("inventory.path must not be empty".to_string()));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation("llm.timeout_secs must be in range 1..=300".to_string()));
    }

    match llm.provider {
        LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the openai provider".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for the ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_booking(booking: &BookingConfig) -> Result<(), ConfigError> {
    if booking.horizon_days == 0 || booking.horizon_days > 365 {
        return Err(ConfigError::Validation(
            "booking.horizon_days must be in range 1..=365".to_string(),
        ));
    }
    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.max_tool_calls == 0 || agent.max_tool_calls > 32 {
        return Err(ConfigError::Validation(
            "agent.max_tool_calls must be in range 1..=32".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    inventory: Option<InventoryPatch>,
    llm: Option<LlmPatch>,
    booking: Option<BookingPatch>,
    agent: Option<AgentPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct InventoryPatch {
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct BookingPatch {
    horizon_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    max_tool_calls: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use secrecy::ExposeSecret;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    fn isolated_options() -> LoadOptions {
        // Point at a path that never exists so ambient showroom.toml files on
        // a developer machine cannot leak into the test.
        LoadOptions {
            config_path: Some(PathBuf::from("showroom-test-missing.toml")),
            ..LoadOptions::default()
        }
    }

    #[test]
    fn defaults_validate() {
        let config = AppConfig::load(isolated_options()).expect("defaults should be valid");
        assert_eq!(config.booking.horizon_days, 30);
        assert_eq!(config.agent.max_tool_calls, 6);
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let error = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("showroom-test-missing.toml")),
            require_file: true,
            ..LoadOptions::default()
        })
        .expect_err("required file should be reported when absent");

        assert!(matches!(error, ConfigError::MissingConfigFile(_)));
    }

    #[test]
    fn file_patch_applies_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"
[inventory]
path = "fixtures/cars.json"

[booking]
horizon_days = 14

[agent]
max_tool_calls = 4

[logging]
level = "debug"
format = "json"
"#
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            ..LoadOptions::default()
        })
        .expect("patched config should load");

        assert_eq!(config.inventory.path, PathBuf::from("fixtures/cars.json"));
        assert_eq!(config.booking.horizon_days, 14);
        assert_eq!(config.agent.max_tool_calls, 4);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn programmatic_overrides_win_over_defaults() {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                llm_provider: Some(LlmProvider::OpenAi),
                llm_api_key: Some("sk-test".to_string()),
                booking_horizon_days: Some(7),
                ..ConfigOverrides::default()
            },
            ..isolated_options()
        })
        .expect("overridden config should load");

        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(
            config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string()),
            Some("sk-test".to_string())
        );
        assert_eq!(config.booking.horizon_days, 7);
    }

    #[test]
    fn openai_provider_requires_api_key() {
        let error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                llm_provider: Some(LlmProvider::OpenAi),
                ..ConfigOverrides::default()
            },
            ..isolated_options()
        })
        .expect_err("openai without a key must fail validation");

        assert!(matches!(error, ConfigError::Validation(_)));
        assert!(error.to_string().contains("llm.api_key"));
    }

    #[test]
    fn zero_horizon_fails_validation() {
        let error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                booking_horizon_days: Some(0),
                ..ConfigOverrides::default()
            },
            ..isolated_options()
        })
        .expect_err("zero-day horizon must fail validation");

        assert!(error.to_string().contains("booking.horizon_days"));
    }

    #[test]
    fn invalid_log_level_fails_validation() {
        let error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                log_level: Some("verbose".to_string()),
                ..ConfigOverrides::default()
            },
            ..isolated_options()
        })
        .expect_err("unknown log level must fail validation");

        assert!(error.to_string().contains("logging.level"));
    }
}
