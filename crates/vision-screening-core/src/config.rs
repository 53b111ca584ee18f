//! Runtime configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! critical_threshold_diopters = 4.0
//! ranking_limit = 20
//! top_regions = 5
//! cache_ttl_secs = 600
//! no_region_label = "Sem Região"
//! other_regions_label = "Outros"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Right-eye refraction above which an exam is critical.
pub const DEFAULT_CRITICAL_THRESHOLD_DIOPTERS: f64 = 4.0;

/// Schools listed in the delivery-rate ranking.
pub const DEFAULT_RANKING_LIMIT: usize = 20;

/// Regions shown individually before the rest are folded together.
pub const DEFAULT_TOP_REGIONS: usize = 5;

/// Lifetime of a cached snapshot.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tunables for classification, metrics and caching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScreeningConfig {
    pub critical_threshold_diopters: f64,
    pub ranking_limit: usize,
    pub top_regions: usize,
    pub cache_ttl_secs: u64,
    /// Label for records whose school has no region
    pub no_region_label: String,
    /// Label for regions folded out of the top-N distribution
    pub other_regions_label: String,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            critical_threshold_diopters: DEFAULT_CRITICAL_THRESHOLD_DIOPTERS,
            ranking_limit: DEFAULT_RANKING_LIMIT,
            top_regions: DEFAULT_TOP_REGIONS,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            no_region_label: "Sem Região".to_string(),
            other_regions_label: "Outros".to_string(),
        }
    }
}

impl ScreeningConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !self.critical_threshold_diopters.is_finite() {
            return Err(ConfigError::Invalid(
                "critical_threshold_diopters must be finite".into(),
            ));
        }
        if self.ranking_limit == 0 {
            return Err(ConfigError::Invalid("ranking_limit must be at least 1".into()));
        }
        if self.no_region_label.trim().is_empty() {
            return Err(ConfigError::Invalid("no_region_label must not be empty".into()));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ScreeningConfig::from_toml_str("").unwrap();
        assert_eq!(config, ScreeningConfig::default());
        assert_eq!(config.critical_threshold_diopters, 4.0);
        assert_eq!(config.ranking_limit, 20);
    }

    #[test]
    fn test_partial_override() {
        let config = ScreeningConfig::from_toml_str(
            r#"
            critical_threshold_diopters = 3.5
            no_region_label = "No Region"
            "#,
        )
        .unwrap();
        assert_eq!(config.critical_threshold_diopters, 3.5);
        assert_eq!(config.no_region_label, "No Region");
        assert_eq!(config.cache_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn test_rejects_zero_ranking_limit() {
        let result = ScreeningConfig::from_toml_str("ranking_limit = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_bad_toml() {
        let result = ScreeningConfig::from_toml_str("ranking_limit = \"many\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "top_regions = 3").unwrap();
        let config = ScreeningConfig::load(file.path()).unwrap();
        assert_eq!(config.top_regions, 3);
    }
}
