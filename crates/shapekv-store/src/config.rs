use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Scheme accepted by the in-memory backend.
pub const MEMORY_ENDPOINT: &str = "memory://";

/// Connection and runtime settings for a store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend endpoint, e.g. `memory://`.
    pub endpoint: String,
    /// Permit administrative commands such as flushing the database.
    pub allow_admin: bool,
    /// Live handle count past which the identity map sweeps dead entries.
    pub identity_cache_capacity: usize,
    /// Ids fetched per page when enumerating a shape.
    pub enumeration_batch: usize,
    /// Upper bound on how long a non-blocking operation may take.
    pub sync_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: MEMORY_ENDPOINT.to_string(),
            allow_admin: false,
            identity_cache_capacity: 4096,
            enumeration_batch: 256,
            sync_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    /// Default configuration with administrative commands enabled.
    pub fn admin() -> Self {
        Self {
            allow_admin: true,
            ..Default::default()
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(StoreError::InvalidConfig("endpoint is empty".into()));
        }
        if self.enumeration_batch == 0 {
            return Err(StoreError::InvalidConfig(
                "enumeration_batch must be positive".into(),
            ));
        }
        if self.identity_cache_capacity == 0 {
            return Err(StoreError::InvalidConfig(
                "identity_cache_capacity must be positive".into(),
            ));
        }
        if self.sync_timeout.is_zero() {
            return Err(StoreError::InvalidConfig(
                "sync_timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.endpoint, "memory://");
        assert!(!config.allow_admin);
        assert_eq!(config.sync_timeout, Duration::from_secs(5));
        assert_eq!(config.identity_cache_capacity, 4096);
        assert_eq!(config.enumeration_batch, 256);
        config.validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = StoreConfig::from_toml_str(
            r#"
            allow_admin = true
            enumeration_batch = 16
            "#,
        )
        .unwrap();
        assert!(config.allow_admin);
        assert_eq!(config.enumeration_batch, 16);
        assert_eq!(config.endpoint, "memory://");
    }

    #[test]
    fn timeout_from_toml() {
        let config = StoreConfig::from_toml_str("sync_timeout = { secs = 2, nanos = 500 }").unwrap();
        assert_eq!(config.sync_timeout, Duration::new(2, 500));
    }

    #[test]
    fn rejects_zero_batch() {
        let err = StoreConfig::from_toml_str("enumeration_batch = 0").unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_empty_endpoint() {
        let config = StoreConfig {
            endpoint: "  ".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            StoreConfig::from_toml_str("allow_admin = \"yes\""),
            Err(StoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "endpoint = \"memory://\"\nidentity_cache_capacity = 8").unwrap();
        let config = StoreConfig::load(file.path()).unwrap();
        assert_eq!(config.identity_cache_capacity, 8);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StoreConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn serializes_back_to_toml() {
        let config = StoreConfig::admin();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(StoreConfig::from_toml_str(&text).unwrap(), config);
    }
}
