/// Runtime configuration loaded from a JSON file
use crate::coordinator::{CoordinatorConfig, DoubleBookingPolicy, RepairPolicy};
use crate::store::HttpStoreConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default environment variable holding the store's bearer token.
pub const DEFAULT_CREDENTIAL_ENV: &str = "PLANNER_STORE_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {message}")]
    Invalid { message: String },
}

/// Top-level configuration. Every section falls back to its defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub store: StoreBackend,
    pub coordinator: CoordinatorSettings,
    pub server: ServerSettings,
    /// Environment variable the bearer token is read from
    pub credential_env: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            store: StoreBackend::default(),
            coordinator: CoordinatorSettings::default(),
            server: ServerSettings::default(),
            credential_env: DEFAULT_CREDENTIAL_ENV.to_string(),
        }
    }
}

impl PlannerConfig {
    /// Loads the configuration from a JSON file.
    ///
    /// # Arguments
    /// * `path` - Path to the JSON file
    ///
    /// # Returns
    /// * `Ok(PlannerConfig)` - Parsed and validated configuration
    /// * `Err(ConfigError)` - If the file can't be read, parsed or validated
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: PlannerConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let StoreBackend::Http(http) = &self.store {
            if http.base_url.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    message: "store.base_url must not be empty".to_string(),
                });
            }
        }
        if self.coordinator.deadline_ms == Some(0) {
            return Err(ConfigError::Invalid {
                message: "coordinator.deadline_ms must be positive".to_string(),
            });
        }
        if self.credential_env.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "credential_env must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Where entity records live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreBackend {
    Http(HttpStoreSettings),
    Sqlite { path: PathBuf },
}

impl Default for StoreBackend {
    fn default() -> Self {
        StoreBackend::Http(HttpStoreSettings::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpStoreSettings {
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpStoreSettings {
    fn default() -> Self {
        let defaults = HttpStoreConfig::default();
        Self {
            base_url: defaults.base_url,
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            request_timeout_secs: defaults.request_timeout.as_secs(),
            user_agent: defaults.user_agent,
        }
    }
}

impl From<&HttpStoreSettings> for HttpStoreConfig {
    fn from(settings: &HttpStoreSettings) -> Self {
        HttpStoreConfig {
            base_url: settings.base_url.clone(),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            user_agent: settings.user_agent.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    pub repair_policy: RepairPolicy,
    pub double_booking: DoubleBookingPolicy,
    pub deadline_ms: Option<u64>,
}

impl From<&CoordinatorSettings> for CoordinatorConfig {
    fn from(settings: &CoordinatorSettings) -> Self {
        CoordinatorConfig {
            repair_policy: settings.repair_policy,
            double_booking: settings.double_booking,
            deadline: settings.deadline_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub address: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}
