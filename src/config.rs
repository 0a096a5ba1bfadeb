use crate::error::{PipelineError, Result};
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_DATABASE_PATH, DEFAULT_MAX_COORDINATES,
    DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_PAUSE_MS, DEFAULT_SNAPSHOT_DIR, DEFAULT_TIMEOUT_SECS,
    OPEN_METEO_FORECAST_URL,
};
use clap::ValueEnum;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Prefix of environment overrides, e.g. `CRAG_ETL_WEATHER__MAX_COORDINATES`
pub const ENV_PREFIX: &str = "CRAG_ETL";

/// What the enricher does when a single coordinate cannot be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record the failure and continue with the next coordinate
    #[default]
    Skip,
    /// Stop enrichment at the first failed coordinate
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,

    /// Upper bound on distinct coordinates sent to the provider per run
    #[validate(range(min = 1))]
    pub max_coordinates: usize,

    pub request_pause_ms: u64,

    pub max_retries: u32,

    pub backoff_base_ms: u64,

    #[validate(range(min = 1))]
    pub timeout_secs: u64,

    pub failure_policy: FailurePolicy,
}

impl WeatherConfig {
    pub fn request_pause(&self) -> Duration {
        Duration::from_millis(self.request_pause_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: OPEN_METEO_FORECAST_URL.to_string(),
            max_coordinates: DEFAULT_MAX_COORDINATES,
            request_pause_ms: DEFAULT_REQUEST_PAUSE_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            failure_policy: FailurePolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineConfig {
    pub snapshot_dir: PathBuf,

    pub database_path: PathBuf,

    #[validate(custom(function = "validate_compression"))]
    pub compression: String,

    #[validate(nested)]
    pub weather: WeatherConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            compression: COMPRESSION_SNAPPY.to_string(),
            weather: WeatherConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Resolve defaults, then the optional TOML file, then the environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: PipelineConfig = settings.try_deserialize()?;
        config.check()?;
        Ok(config)
    }

    /// Validate, reporting failures as configuration errors
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| PipelineError::Config(format!("Invalid configuration: {}", e)))
    }
}

fn validate_compression(compression: &str) -> std::result::Result<(), ValidationError> {
    match compression.to_lowercase().as_str() {
        COMPRESSION_SNAPPY | COMPRESSION_GZIP | COMPRESSION_LZ4 | COMPRESSION_ZSTD
        | COMPRESSION_NONE => Ok(()),
        _ => Err(ValidationError::new("unsupported_compression")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.weather.max_coordinates, 50);
        assert_eq!(config.weather.failure_policy, FailurePolicy::Skip);
        assert_eq!(config.compression, "snappy");
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_file_overrides_defaults() -> Result<()> {
        let mut file = Builder::new().suffix(".toml").tempfile()?;
        writeln!(
            file,
            "snapshot_dir = \"snaps\"\n\n[weather]\nmax_coordinates = 3\nfailure_policy = \"abort\""
        )?;

        let config = PipelineConfig::load(Some(file.path()))?;
        assert_eq!(config.snapshot_dir, PathBuf::from("snaps"));
        assert_eq!(config.weather.max_coordinates, 3);
        assert_eq!(config.weather.failure_policy, FailurePolicy::Abort);
        // Untouched keys keep their defaults
        assert_eq!(config.weather.request_pause_ms, 150);
        assert_eq!(config.database_path, PathBuf::from("output/crags.duckdb"));
        Ok(())
    }

    #[test]
    fn test_zero_coordinate_cap_is_rejected() {
        let mut config = PipelineConfig::default();
        config.weather.max_coordinates = 0;
        assert!(matches!(config.check(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_unknown_compression_is_rejected() {
        let config = PipelineConfig {
            compression: "brotli".to_string(),
            ..PipelineConfig::default()
        };
        assert!(matches!(config.check(), Err(PipelineError::Config(_))));
    }
}
