//! Extender configuration

use anyhow::{Context, Result};
use plugin_lib::capacity::CapacityConfig;
use plugin_lib::telemetry::TelemetryConfig;
use plugin_lib::PluginConfig;
use serde::Deserialize;
use std::path::Path;

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "NETBALANCE_CONFIG";

/// Extender configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExtenderConfig {
    /// Port serving the extender, health and metrics endpoints
    #[serde(default = "default_port")]
    pub port: u16,

    /// Weights, request policy and score scaling
    #[serde(default)]
    pub scoring: PluginConfig,

    /// Metrics backend access
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Network capacity sources
    #[serde(default)]
    pub capacity: CapacityConfig,
}

fn default_port() -> u16 {
    8888
}

impl ExtenderConfig {
    /// Load configuration from the file named by `NETBALANCE_CONFIG` (if any) and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).ok();
        Self::load_from(path.as_deref().map(Path::new))
    }

    /// Load configuration from `path` (if any), overridden by `NETBALANCE_*` variables
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let config: Self = builder
            .add_source(
                config::Environment::with_prefix("NETBALANCE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config
            .scoring
            .validate()
            .context("Invalid scoring configuration")?;
        Ok(config)
    }
}
