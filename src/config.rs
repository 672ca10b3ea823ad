//! Runtime configuration.
//!
//! Values come from an optional YAML file and are then overridden by the
//! `LONGAN_ROOT`, `LONGAN_TIMEOUT_SECS` and `LONGAN_LOG` environment variables.
use crate::common::error::{Error, Result};
use crate::ooxml::docx::settings::MAX_SPIN_COUNT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub protection: ProtectionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for relative package identifiers
    pub root: Option<PathBuf>,
    pub timeout_secs: u64,
    pub ensure_docx_extension: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: None,
            timeout_secs: 30,
            ensure_docx_extension: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionConfig {
    /// Key-derivation rounds for encryption and restriction hashes
    pub spin_count: u32,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self { spin_count: 100_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive
    pub filter: String,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: false,
        }
    }
}

impl Config {
    /// Parse YAML. Missing fields keep their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_saphyr::from_str(yaml)
            .map_err(|e| Error::InvalidArgument(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file (when given), then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let yaml = std::fs::read_to_string(path).map_err(|e| {
                    Error::InvalidArgument(format!("cannot read config {}: {e}", path.display()))
                })?;
                Self::from_yaml(&yaml)?
            },
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(root) = var("LONGAN_ROOT").filter(|v| !v.is_empty()) {
            self.storage.root = Some(PathBuf::from(root));
        }
        if let Some(secs) = var("LONGAN_TIMEOUT_SECS") {
            self.storage.timeout_secs = secs.trim().parse().map_err(|_| {
                Error::InvalidArgument(format!("LONGAN_TIMEOUT_SECS is not a number: '{secs}'"))
            })?;
        }
        if let Some(filter) = var("LONGAN_LOG").filter(|v| !v.is_empty()) {
            self.logging.filter = filter;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.timeout_secs == 0 {
            return Err(Error::InvalidArgument(
                "storage.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.protection.spin_count == 0 {
            return Err(Error::InvalidArgument(
                "protection.spin_count must be at least 1".to_string(),
            ));
        }
        if self.protection.spin_count > MAX_SPIN_COUNT {
            return Err(Error::InvalidArgument(format!(
                "protection.spin_count must be at most {MAX_SPIN_COUNT}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml("storage:\n  root: /srv/docs\nlogging:\n  filter: debug\n").unwrap();
        assert_eq!(config.storage.root, Some(PathBuf::from("/srv/docs")));
        assert_eq!(config.storage.timeout_secs, 30);
        assert!(config.storage.ensure_docx_extension);
        assert_eq!(config.protection.spin_count, 100_000);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [("LONGAN_TIMEOUT_SECS", "5"), ("LONGAN_LOG", "longan=trace")]
            .into_iter()
            .collect();
        let mut config = Config::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.storage.timeout_secs, 5);
        assert_eq!(config.logging.filter, "longan=trace");
        assert_eq!(config.storage.root, None);

        let err = config
            .apply_env(|k| (k == "LONGAN_TIMEOUT_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_yaml("protection:\n  spin_count: 0\n"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Config::from_yaml("protection:\n  spin_count: 20000000\n"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Config::from_yaml("storage: [1, 2]"),
            Err(Error::InvalidArgument(_))
        ));
    }
}
