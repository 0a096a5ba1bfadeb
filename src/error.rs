use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Normalization error: {0}")]
    Normalization(String),

    #[error("Transform error: {0}")]
    Transform(String),

    #[error("Clean error: {0}")]
    Clean(String),

    #[error("Weather fetch failed for ({latitude}, {longitude}): {message}")]
    WeatherFetch {
        latitude: f64,
        longitude: f64,
        message: String,
    },

    #[error("Weather enrichment failed: {0}")]
    WeatherFetchAll(String),

    #[error("Rename error: expected column '{column}' is missing")]
    Rename { column: String },

    #[error("Load error: {0}")]
    Load(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::Config(err.to_string())
    }
}

impl PipelineError {
    /// Short name of the pipeline stage an error belongs to, used in logs.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Extraction(_) | PipelineError::Normalization(_) => "extract",
            PipelineError::Transform(_) => "transform",
            PipelineError::Clean(_) => "clean",
            PipelineError::WeatherFetch { .. } | PipelineError::WeatherFetchAll(_) => "weather",
            PipelineError::Rename { .. } => "clean_weather",
            PipelineError::Load(_) => "load",
            _ => "io",
        }
    }
}
