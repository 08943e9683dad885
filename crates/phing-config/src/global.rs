//! Global Configuration (~/.phing/config.toml)
//!
//! ```toml
//! [defaults]
//! logger = "nobanner"
//! buildfile = "build.toml"
//! emacs = false
//! color = true
//!
//! [properties]
//! deploy.host = "staging.example.com"
//! retries = 3
//! ```

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Logger names accepted by `--logger` and `defaults.logger`
pub const LOGGERS: &[&str] = &["default", "nobanner", "ansi", "json"];

/// Global user configuration from ~/.phing/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Properties applied to every project before its build file
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, toml::Value>,
}

/// Default settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Logger used when `--logger` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,

    /// Build file name used when `-f` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buildfile: Option<String>,

    /// Emacs-friendly output (no `[task]` column)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emacs: Option<bool>,

    /// Coloured output for the default logger
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<bool>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(logger) = self.default_logger() {
            validate_logger("defaults.logger", logger)?;
        }
        if let Some(buildfile) = self.default_buildfile() {
            if buildfile.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "defaults.buildfile".to_string(),
                    reason: "cannot be empty".to_string(),
                });
            }
        }
        for (name, value) in &self.properties {
            if property_value(value).is_none() {
                return Err(ConfigError::InvalidValue {
                    field: format!("properties.{}", name),
                    reason: "must be a string, number or boolean".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Get the global config file path (~/.phing/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".phing").join("config.toml"))
    }

    pub fn default_logger(&self) -> Option<&str> {
        self.defaults.as_ref().and_then(|d| d.logger.as_deref())
    }

    pub fn default_buildfile(&self) -> Option<&str> {
        self.defaults.as_ref().and_then(|d| d.buildfile.as_deref())
    }

    pub fn emacs(&self) -> Option<bool> {
        self.defaults.as_ref().and_then(|d| d.emacs)
    }

    pub fn color(&self) -> Option<bool> {
        self.defaults.as_ref().and_then(|d| d.color)
    }

    /// Properties as name/value strings, in name order. Dotted keys written
    /// as nested tables (`deploy.host = ...`) are flattened back to
    /// `deploy.host`.
    pub fn properties(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (name, value) in &self.properties {
            flatten_property(name, value, &mut out);
        }
        out
    }
}

fn flatten_property(name: &str, value: &toml::Value, out: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) => {
            for (key, nested) in table {
                flatten_property(&format!("{}.{}", name, key), nested, out);
            }
        }
        other => {
            if let Some(value) = property_value(other) {
                out.push((name.to_string(), value));
            }
        }
    }
}

/// Scalar values become property strings; nested tables are accepted as
/// dotted names, arrays are not.
fn property_value(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Table(table) => table
            .values()
            .all(|v| property_value(v).is_some())
            .then(String::new),
        toml::Value::Datetime(_) | toml::Value::Array(_) => None,
    }
}

/// Check a logger name
pub(crate) fn validate_logger(field: &str, value: &str) -> ConfigResult<()> {
    if !LOGGERS.contains(&value) {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("must be one of {}, got '{}'", LOGGERS.join(", "), value),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_minimal_global_config() {
        let toml = r#"
[defaults]
logger = "nobanner"
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.default_logger(), Some("nobanner"));
        assert_eq!(config.color(), None);
    }

    #[test]
    fn test_parse_full_global_config() {
        let toml = r#"
[defaults]
logger = "ansi"
buildfile = "ci.toml"
emacs = true
color = false

[properties]
deploy.host = "staging"
retries = 3
verbose = true
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_buildfile(), Some("ci.toml"));
        assert_eq!(config.emacs(), Some(true));
        assert_eq!(
            config.properties(),
            vec![
                ("deploy.host".to_string(), "staging".to_string()),
                ("retries".to_string(), "3".to_string()),
                ("verbose".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_logger_value() {
        let config = GlobalConfig {
            defaults: Some(DefaultsConfig {
                logger: Some("xml".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("defaults.logger"));
    }

    #[test]
    fn test_array_property_is_rejected() {
        let config: GlobalConfig = toml::from_str("[properties]\nhosts = [\"a\", \"b\"]\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        assert!(toml::from_str::<GlobalConfig>("[lsp]\nhover = true\n").is_err());
    }
}
