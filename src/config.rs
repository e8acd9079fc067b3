//! Configuration management for ingot

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{IngotError, IngotResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Log a warning for every recoverable failure before returning it
    pub warn_on_recoverable: bool,
    /// Trace the kernel and stride vectors chosen for each elementwise call
    pub trace_dispatch: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            warn_on_recoverable: true,
            trace_dispatch: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Check storage length against shape and dtype before every operation
    pub verify_storage_len: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            verify_storage_len: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngotConfig {
    pub diagnostics: DiagnosticsConfig,
    pub safety: SafetyConfig,
}

/// Holds a configuration and the file it was loaded from, if any
pub struct ConfigManager {
    config: IngotConfig,
    config_file: Option<PathBuf>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: IngotConfig::default(),
            config_file: None,
        }
    }

    pub fn with_config_file(mut self, path: PathBuf) -> Self {
        self.config_file = Some(path);
        self
    }

    pub fn load_from_file(&mut self, path: &Path) -> IngotResult<()> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| IngotError::ConfigurationError(format!("Failed to read config file {:?}: {}", path, e)))?;

        let config: IngotConfig = serde_json::from_str(&content)
            .map_err(|e| IngotError::ConfigurationError(format!("Failed to parse config file {:?}: {}", path, e)))?;

        self.config = config;
        self.config_file = Some(path.to_path_buf());

        tracing::info!("Configuration loaded from {:?}", path);
        Ok(())
    }

    pub fn save_to_file(&self, path: &Path) -> IngotResult<()> {
        let content = serde_json::to_string_pretty(&self.config)?;
        std::fs::write(path, content)?;

        tracing::info!("Configuration saved to {:?}", path);
        Ok(())
    }

    pub fn get_config(&self) -> IngotConfig {
        self.config.clone()
    }

    /// Apply `f` and persist to the backing file when there is one
    pub fn update_config<F>(&mut self, f: F) -> IngotResult<()>
    where
        F: FnOnce(&mut IngotConfig),
    {
        f(&mut self.config);

        if let Some(ref path) = self.config_file {
            self.save_to_file(path)?;
        }

        Ok(())
    }

    pub fn set_config(&mut self, config: IngotConfig) {
        self.config = config;
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    static ref CONFIG_MANAGER: Arc<RwLock<ConfigManager>> = Arc::new(RwLock::new(ConfigManager::new()));
}

/// Get the process-wide configuration
pub fn get_config() -> IngotConfig {
    CONFIG_MANAGER.read().get_config()
}

/// Update the process-wide configuration
pub fn update_config<F>(f: F) -> IngotResult<()>
where
    F: FnOnce(&mut IngotConfig),
{
    CONFIG_MANAGER.write().update_config(f)
}

/// Load the process-wide configuration from a JSON file
pub fn load_config_from_file(path: &Path) -> IngotResult<()> {
    CONFIG_MANAGER.write().load_from_file(path)
}

/// Builder for assembling a configuration in code
pub struct ConfigBuilder {
    config: IngotConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: IngotConfig::default(),
        }
    }

    pub fn diagnostics(mut self, f: impl FnOnce(&mut DiagnosticsConfig)) -> Self {
        f(&mut self.config.diagnostics);
        self
    }

    pub fn safety(mut self, f: impl FnOnce(&mut SafetyConfig)) -> Self {
        f(&mut self.config.safety);
        self
    }

    pub fn build(self) -> IngotConfig {
        self.config
    }

    /// Install as the process-wide configuration
    pub fn apply(self) -> IngotResult<()> {
        update_config(|config| *config = self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
