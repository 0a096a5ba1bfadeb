use crate::error::Result;
use crate::models::{Coordinate, HourlyForecast};
use async_trait::async_trait;

/// Source of hourly forecasts for a single point
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Fetch hourly temperature, relative humidity and precipitation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PipelineError::WeatherFetch`] when the
    /// provider cannot produce a series for `coordinate`.
    async fn hourly_forecast(&self, coordinate: Coordinate) -> Result<HourlyForecast>;

    /// Short label used in logs
    fn name(&self) -> &str;
}
