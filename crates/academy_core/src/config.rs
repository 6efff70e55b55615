//! TOML configuration for the academy core and its CLI.
//!
//! ```toml
//! [database]
//! path = "/var/lib/academy/academy.sqlite3"
//!
//! [logging]
//! level = "info"
//! dir = "/var/log/academy"
//!
//! [access]
//! protected_prefix = "/list"
//!
//! [[access.rules]]
//! pattern = "/list/parents(.*)"
//! roles = ["admin", "teacher"]
//! ```
//!
//! Every section is optional. Without `[access]` the built-in academy route
//! map applies.

use crate::access::{AccessPolicy, AccessPolicyError, AccessRule};
use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_DB_FILE: &str = "academy.sqlite3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid access section: {0}")]
    Access(#[from] AccessPolicyError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; relative paths resolve against the working directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: Option<String>,
    /// Absolute directory for rolling log files. Unset means stderr.
    #[serde(default)]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRuleConfig {
    pub pattern: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub protected_prefix: Option<String>,
    #[serde(default)]
    pub rules: Vec<AccessRuleConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub access: Option<AccessConfig>,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_dir: Option<String>,
}

impl CoreConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads `path` when given, otherwise returns the all-default config.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(path) = overrides.db_path {
            self.database.path = Some(path);
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = Some(level);
        }
        if let Some(dir) = overrides.log_dir {
            self.logging.dir = Some(dir);
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE))
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .level
            .as_deref()
            .filter(|level| !level.trim().is_empty())
            .unwrap_or(default_log_level())
    }

    pub fn log_dir(&self) -> Option<&str> {
        self.logging
            .dir
            .as_deref()
            .filter(|dir| !dir.trim().is_empty())
    }

    /// Builds the access policy from `[access]`, or the academy default.
    pub fn access_policy(&self) -> Result<AccessPolicy, ConfigError> {
        let Some(access) = self.access.as_ref() else {
            return Ok(AccessPolicy::academy_default());
        };
        let rules = access
            .rules
            .iter()
            .map(|rule| AccessRule::new(rule.pattern.clone(), &rule.roles))
            .collect();
        Ok(AccessPolicy::new(rules, access.protected_prefix.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigOverrides, CoreConfig, DEFAULT_DB_FILE};
    use crate::logging::default_log_level;
    use std::path::PathBuf;

    #[test]
    fn empty_file_yields_defaults() {
        let config = CoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.database_path(), PathBuf::from(DEFAULT_DB_FILE));
        assert!(config.log_dir().is_none());
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = CoreConfig::from_toml_str(
            r#"
            [database]
            path = "from-file.sqlite3"
            [logging]
            level = "warn"
            "#,
        )
        .unwrap();
        config.apply_overrides(ConfigOverrides {
            db_path: Some(PathBuf::from("from-flag.sqlite3")),
            log_level: None,
            log_dir: None,
        });
        assert_eq!(config.database_path(), PathBuf::from("from-flag.sqlite3"));
        assert_eq!(config.log_level(), "warn");
    }

    #[test]
    fn blank_or_missing_level_falls_back_to_build_default() {
        let missing = CoreConfig::from_toml_str("").unwrap();
        assert_eq!(missing.log_level(), default_log_level());

        let blank = CoreConfig::from_toml_str("[logging]\nlevel = \"  \"\n").unwrap();
        assert_eq!(blank.log_level(), default_log_level());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = CoreConfig::from_toml_str("[database\npath = 1").unwrap_err();
        assert!(err.to_string().starts_with("failed to parse config"));
    }
}
