//! Configuration Loader
//!
//! Layers built-in defaults, an optional TOML file and `INVENTORY__*` environment
//! overrides, then validates the merged result.

use super::error::{ConfigResult, ConfigurationError};
use super::InventoryConfig;
use config::{Config, Environment, File};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_CONFIG_PATH: &str = "config/inventory-core.toml";
const CONFIG_PATH_VARIABLE: &str = "INVENTORY_CONFIG_PATH";
const ENV_PREFIX: &str = "INVENTORY";

/// Loaded configuration plus the context it was loaded in
#[derive(Debug)]
pub struct ConfigManager {
    config: InventoryConfig,
    environment: String,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let path = env::var(CONFIG_PATH_VARIABLE)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from_path(path)
    }

    /// Load configuration from a specific file; a missing file falls back to defaults
    pub fn load_from_path(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_environment(path.as_ref(), None)
    }

    /// Load configuration with an explicit environment map instead of the process
    /// environment. Useful for tests that must not mutate global state.
    pub fn load_with_environment(
        path: &Path,
        environment_overrides: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();

        debug!(
            "Loading configuration for environment '{}' from: {}",
            environment,
            path.display()
        );

        let config = Self::build_config(path, environment_overrides)?;
        config.validate()?;

        let source_path = path.exists().then(|| path.to_path_buf());

        info!(
            environment = %environment,
            config_file = ?source_path,
            max_parallel_adapters = config.orchestration.max_parallel_adapters,
            similarity_threshold = config.aggregation.similarity_threshold,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            source_path,
        }))
    }

    /// Build a manager around an already constructed configuration
    pub fn from_config(config: InventoryConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            source_path: None,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// File the configuration was read from, if one existed
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    fn build_config(
        path: &Path,
        environment_overrides: Option<HashMap<String, String>>,
    ) -> ConfigResult<InventoryConfig> {
        let merged = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(environment_overrides),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(path.display().to_string(), e))?;

        merged
            .try_deserialize::<InventoryConfig>()
            .map_err(ConfigurationError::from)
    }

    /// Detect the deployment environment from well-known variables
    pub fn detect_environment() -> String {
        env::var("INVENTORY_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }
}
