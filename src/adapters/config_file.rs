//! JSON configuration file adapter.
//!
//! Implements [`ConfigPort`] over a single JSON document.  Missing fields
//! take their defaults, so a file only needs to name what it overrides.
//! Loaded configs are validated before they are returned; configs are
//! validated before they are written.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::ChemostatConfig;

pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<ChemostatConfig, ConfigError> {
        let raw = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound,
            _ => {
                warn!("Config read of {} failed: {}", self.path.display(), e);
                ConfigError::IoError
            }
        })?;
        let config: ChemostatConfig = serde_json::from_str(&raw).map_err(|e| {
            warn!("Config {} is not valid: {}", self.path.display(), e);
            ConfigError::Corrupted
        })?;
        config.validate()?;
        info!("Loaded config from {}", self.path.display());
        Ok(config)
    }

    fn save(&self, config: &ChemostatConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let json = serde_json::to_string_pretty(config).map_err(|_| ConfigError::Corrupted)?;
        fs::write(&self.path, json).map_err(|e| {
            warn!("Config write to {} failed: {}", self.path.display(), e);
            ConfigError::IoError
        })?;
        info!("Saved config to {}", self.path.display());
        Ok(())
    }
}
