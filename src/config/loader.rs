//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading engine
//! configurations from YAML files.

use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};

use super::types::{EngineConfig, EngineSettings, ScheduleSeed};

/// Loads and provides access to engine configuration.
///
/// # Directory Structure
///
/// ```text
/// config/daycare/
/// ├── engine.yaml             # Policy, sweeper, identifiers, server
/// └── rate_schedules/
///     └── standard.yaml       # Seed schedules, one per file
/// ```
///
/// # Example
///
/// ```no_run
/// use daycare_billing::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/daycare").unwrap();
/// for seed in loader.schedule_seeds() {
///     println!("{} (active: {})", seed.schedule.name, seed.active);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: EngineConfig,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` on success, or an error if:
    /// - engine.yaml is missing (`ConfigNotFound`)
    /// - any file contains invalid YAML (`ConfigParseError`)
    /// - a seed schedule breaks the tier invariants (`Validation`)
    /// - more than one seed is marked active (`ConfigParseError`)
    ///
    /// A missing rate_schedules directory is allowed; schedules can be
    /// created at runtime instead.
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let settings_path = path.join("engine.yaml");
        let settings = Self::load_yaml::<EngineSettings>(&settings_path)?;

        let schedules_dir = path.join("rate_schedules");
        let schedules = Self::load_schedules(&schedules_dir)?;

        Ok(Self {
            config: EngineConfig::new(settings, schedules),
        })
    }

    /// Wraps settings built in code, with no seed schedules.
    pub fn from_settings(settings: EngineSettings) -> Self {
        Self {
            config: EngineConfig::new(settings, Vec::new()),
        }
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Loads all seed schedules, sorted by file name.
    fn load_schedules(dir: &Path) -> EngineResult<Vec<ScheduleSeed>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let dir_str = dir.display().to_string();
        let entries = fs::read_dir(dir).map_err(|_| EngineError::ConfigNotFound {
            path: dir_str.clone(),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|_| EngineError::ConfigNotFound {
                path: dir_str.clone(),
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "yaml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut seeds = Vec::with_capacity(paths.len());
        for path in &paths {
            let seed = Self::load_yaml::<ScheduleSeed>(path)?;
            seed.schedule.validate()?;
            seeds.push(seed);
        }

        if seeds.iter().filter(|s| s.active).count() > 1 {
            return Err(EngineError::ConfigParseError {
                path: dir_str,
                message: "at most one seed schedule may be active".to_string(),
            });
        }

        Ok(seeds)
    }

    /// Returns the underlying engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the engine settings.
    pub fn settings(&self) -> &EngineSettings {
        self.config.settings()
    }

    /// Returns the seed schedules.
    pub fn schedule_seeds(&self) -> &[ScheduleSeed] {
        self.config.schedules()
    }
}
