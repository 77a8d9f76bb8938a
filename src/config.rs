//! User configuration stored as YAML
//!
//! ```yaml
//! minimal_voltage_search: 12.0
//! normal_speed_interval: [0.0, 80.0]
//! normal_voltage_interval: [12.0, 60.0]
//! max_file_lines: 10500000
//! ```

use crate::error::{MarpError, Result};
use crate::parser::MAXIMAL_FILE_LINES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_FILE: &str = "marp.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Voltage interval search ignores readings below this (V)
    pub minimal_voltage_search: f64,

    /// Derived speeds outside this range are flagged on display (km/h)
    pub normal_speed_interval: (f64, f64),

    /// Derived voltages outside this range are flagged on display (V)
    pub normal_voltage_interval: (f64, f64),

    /// Files with more lines are refused
    pub max_file_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            minimal_voltage_search: 12.0,
            normal_speed_interval: (0.0, 80.0),
            normal_voltage_interval: (12.0, 60.0),
            max_file_lines: MAXIMAL_FILE_LINES,
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| MarpError::Config(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| MarpError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| MarpError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_yaml(&contents)?;
        if config.max_file_lines == 0 {
            return Err(MarpError::Config("max_file_lines must be positive".to_string()));
        }
        Ok(config)
    }

    /// Overwrites `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        std::fs::write(path, self.to_yaml()?)?;
        debug!("Config saved to {}", path.display());
        Ok(())
    }

    /// Load `path`, writing the defaults there when it is missing or unusable
    pub fn load_or_create(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if path.exists() {
                    warn!("Config {} is invalid ({}), restoring defaults", path.display(), e);
                } else {
                    debug!("No config at {}, creating defaults", path.display());
                }
                let config = Self::default();
                config.save(path)?;
                Ok(config)
            }
        }
    }
}
