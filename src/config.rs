//! Runtime settings loaded from an optional TOML file.
//!
//! `DATABASE_URL` is always taken from the environment when set and wins
//! over the file value.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::ranking::DEFAULT_MIN_COVERAGE;

pub const DEFAULT_CONFIG_FILE: &str = "award-ranking.toml";
pub const CONFIG_ENV: &str = "AWARD_RANKING_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Share of student x criterion cells that must be scored before a
    /// calculation may run.
    pub min_score_coverage: f64,
    pub result_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            min_score_coverage: DEFAULT_MIN_COVERAGE,
            result_limit: 10,
        }
    }
}

impl Settings {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Reads the file named by `AWARD_RANKING_CONFIG`, or
    /// `award-ranking.toml` when it exists, then applies `DATABASE_URL`.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut settings = match explicit {
            Some(path) => Self::from_toml_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_toml_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };

        if let Ok(url) = std::env::var("DATABASE_URL") {
            settings.database_url = Some(url);
        }
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_score_coverage) {
            return Err(ConfigError::Invalid(format!(
                "min_score_coverage must be within 0 and 1, got {}",
                self.min_score_coverage
            )));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parses a score coverage share, which must lie within 0 and 1.
pub fn parse_coverage(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("`{s}` is not a number"))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("coverage must be within 0 and 1, got {value}"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.min_score_coverage, 0.5);
    }

    #[test]
    fn parses_overrides() {
        let settings = Settings::from_toml_str(
            r#"
            database_url = "postgres://localhost/awards"
            max_connections = 2
            min_score_coverage = 0.8
            result_limit = 25
            "#,
        )
        .unwrap();
        assert_eq!(
            settings.database_url.as_deref(),
            Some("postgres://localhost/awards")
        );
        assert_eq!(settings.max_connections, 2);
        assert_eq!(settings.min_score_coverage, 0.8);
        assert_eq!(settings.result_limit, 25);
    }

    #[test]
    fn rejects_out_of_range_coverage() {
        let err = Settings::from_toml_str("min_score_coverage = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn coverage_argument_must_be_a_share() {
        assert_eq!(parse_coverage("0.75"), Ok(0.75));
        assert_eq!(parse_coverage("0"), Ok(0.0));
        assert_eq!(parse_coverage("1"), Ok(1.0));
        assert!(parse_coverage("-0.2").is_err());
        assert!(parse_coverage("1.01").is_err());
        assert!(parse_coverage("NaN").is_err());
        assert!(parse_coverage("half").is_err());
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = Settings::from_toml_str("threshold = 0.2").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
