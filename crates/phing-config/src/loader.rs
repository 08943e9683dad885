//! Configuration Loader
//!
//! Resolves the effective settings from the global config file and the
//! environment, and locates build files.

use crate::global::{validate_logger, GlobalConfig};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Default build file name
pub const DEFAULT_BUILD_FILE: &str = "build.toml";

/// Configuration loader
///
/// Settings are merged with this precedence:
/// 1. Built-in defaults - lowest priority
/// 2. Global config (~/.phing/config.toml, or the file named by `PHING_CONFIG`)
/// 3. Environment variables (`PHING_LOGGER`, `PHING_BUILDFILE`, `NO_COLOR`)
/// 4. CLI flags - highest priority (handled by caller)
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Explicit global config path
    global_config_path: Option<PathBuf>,
}

/// Effective configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Logger name, one of [`crate::LOGGERS`]
    pub logger: String,

    /// Build file name looked up when `-f` is not given
    pub buildfile: String,

    pub emacs: bool,

    pub color: bool,

    /// Properties applied before the build file's own
    pub properties: Vec<(String, String)>,

    /// Global config file the settings came from, if one was read
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logger: "default".to_string(),
            buildfile: DEFAULT_BUILD_FILE.to_string(),
            emacs: false,
            color: true,
            properties: Vec::new(),
            source: None,
        }
    }
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the global config from `path` instead of the default location
    pub fn with_global_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Load the effective configuration
    ///
    /// A missing file at the default location is not an error; a missing
    /// file that was asked for explicitly is.
    pub fn load(&self) -> ConfigResult<Config> {
        let mut config = Config::default();

        if let Some((path, explicit)) = self.global_config_file() {
            if path.exists() || explicit {
                let global = GlobalConfig::load_from_file(&path)?;
                Self::apply_global(&mut config, &global);
                config.source = Some(path);
            }
        }

        Self::apply_env_overrides(config)
    }

    /// `(path, explicitly requested)`
    fn global_config_file(&self) -> Option<(PathBuf, bool)> {
        if let Some(path) = &self.global_config_path {
            return Some((path.clone(), true));
        }
        if let Some(path) = env::var_os("PHING_CONFIG").filter(|p| !p.is_empty()) {
            return Some((PathBuf::from(path), true));
        }
        GlobalConfig::global_config_path().ok().map(|p| (p, false))
    }

    fn apply_global(config: &mut Config, global: &GlobalConfig) {
        if let Some(logger) = global.default_logger() {
            config.logger = logger.to_string();
        }
        if let Some(buildfile) = global.default_buildfile() {
            config.buildfile = buildfile.to_string();
        }
        if let Some(emacs) = global.emacs() {
            config.emacs = emacs;
        }
        if let Some(color) = global.color() {
            config.color = color;
        }
        config.properties = global.properties();
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: Config) -> ConfigResult<Config> {
        if let Ok(logger) = env::var("PHING_LOGGER") {
            validate_logger("PHING_LOGGER", &logger)?;
            config.logger = logger;
        }

        if let Ok(buildfile) = env::var("PHING_BUILDFILE") {
            if buildfile.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "PHING_BUILDFILE".to_string(),
                    reason: "cannot be empty".to_string(),
                });
            }
            config.buildfile = buildfile;
        }

        // https://no-color.org: any non-empty value disables colour
        if env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()) {
            config.color = false;
        }

        Ok(config)
    }

    /// Get the global configuration directory (~/.phing)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".phing"))
    }
}

/// Find `name` in `start_dir` or the nearest ancestor that contains it
pub fn find_build_file(start_dir: &Path, name: &str) -> Option<PathBuf> {
    let mut current = Some(start_dir);

    while let Some(dir) = current {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = dir.parent();
    }
    None
}
