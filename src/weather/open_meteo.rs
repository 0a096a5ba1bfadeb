use crate::config::WeatherConfig;
use crate::error::{PipelineError, Result};
use crate::models::{Coordinate, HourlyForecast};
use crate::utils::constants::HOURLY_VARIABLES;
use crate::weather::provider::WeatherProvider;
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Open-Meteo forecast payload, requested with `timeformat=unixtime`
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    latitude: f64,
    longitude: f64,
    elevation: Option<f64>,
    #[serde(default)]
    utc_offset_seconds: i32,
    hourly: Option<HourlyData>,
}

#[derive(Debug, Deserialize)]
struct HourlyData {
    time: Vec<i64>,
    #[serde(default)]
    temperature_2m: Vec<Option<f32>>,
    #[serde(default)]
    relative_humidity_2m: Vec<Option<f32>>,
    #[serde(default)]
    precipitation: Vec<Option<f32>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    reason: String,
}

/// HTTP client for the Open-Meteo forecast API
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    backoff_base: Duration,
}

impl OpenMeteoClient {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("crag-etl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        })
    }

    pub fn query_params(coordinate: Coordinate) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", coordinate.latitude.to_string()),
            ("longitude", coordinate.longitude.to_string()),
            ("hourly", HOURLY_VARIABLES.join(",")),
            ("wind_speed_unit", "mph".to_string()),
            ("timeformat", "unixtime".to_string()),
            ("timezone", "GMT".to_string()),
        ]
    }

    /// Delay before retry `attempt` (1-based): base, 2×base, 4×base, ...
    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(1u32 << (attempt.saturating_sub(1)).min(16))
    }

    /// Send the forecast request, retrying connection failures, timeouts,
    /// HTTP 429 and 5xx with exponential backoff
    async fn fetch_body(&self, coordinate: Coordinate) -> Result<String> {
        let params = Self::query_params(coordinate);
        let fetch_error = |message: String| PipelineError::WeatherFetch {
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            message,
        };

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff(attempt);
                warn!(%coordinate, attempt, max = self.max_retries, ?delay, "Retrying forecast request");
                tokio::time::sleep(delay).await;
            }

            let response = match self.client.get(&self.base_url).query(&params).send().await {
                Ok(response) => response,
                Err(e) if is_transient(&e) && attempt < self.max_retries => {
                    debug!(%coordinate, error = %e, "Transient request failure");
                    continue;
                }
                Err(e) => return Err(fetch_error(e.to_string())),
            };

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if attempt < self.max_retries {
                    debug!(%coordinate, %status, "Retryable HTTP status");
                    continue;
                }
                return Err(fetch_error(format!(
                    "HTTP {} after {} retries",
                    status, self.max_retries
                )));
            }

            let body = response
                .text()
                .await
                .map_err(|e| fetch_error(format!("Failed to read body: {}", e)))?;

            if status.is_client_error() {
                let reason = serde_json::from_str::<ErrorResponse>(&body)
                    .map(|e| e.reason)
                    .unwrap_or(body);
                return Err(fetch_error(format!("HTTP {}: {}", status, reason)));
            }

            return Ok(body);
        }

        Err(fetch_error("request failed after all retries".to_string()))
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    async fn hourly_forecast(&self, coordinate: Coordinate) -> Result<HourlyForecast> {
        let body = self.fetch_body(coordinate).await?;
        parse_forecast(&body, coordinate)
    }

    fn name(&self) -> &str {
        "open-meteo"
    }
}

/// Decode a forecast payload into an aligned hourly series
pub(crate) fn parse_forecast(body: &str, coordinate: Coordinate) -> Result<HourlyForecast> {
    let fetch_error = |message: String| PipelineError::WeatherFetch {
        latitude: coordinate.latitude,
        longitude: coordinate.longitude,
        message,
    };

    let response: ForecastResponse = serde_json::from_str(body)
        .map_err(|e| fetch_error(format!("Unexpected forecast payload: {}", e)))?;

    let hourly = response
        .hourly
        .ok_or_else(|| fetch_error("Forecast has no hourly block".to_string()))?;

    let timestamps = hourly
        .time
        .iter()
        .map(|&secs| {
            DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| fetch_error(format!("Invalid unix time {}", secs)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(HourlyForecast {
        latitude: response.latitude,
        longitude: response.longitude,
        elevation: response.elevation,
        utc_offset_seconds: response.utc_offset_seconds,
        timestamps,
        temperature_2m: hourly.temperature_2m,
        relative_humidity_2m: hourly.relative_humidity_2m,
        precipitation: hourly.precipitation,
    })
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    const PAYLOAD: &str = r#"{
        "latitude": 53.36,
        "longitude": -1.62,
        "generationtime_ms": 0.05,
        "utc_offset_seconds": 0,
        "timezone": "GMT",
        "timezone_abbreviation": "GMT",
        "elevation": 412.0,
        "hourly_units": { "time": "unixtime", "temperature_2m": "°C" },
        "hourly": {
            "time": [1746057600, 1746061200, 1746064800],
            "temperature_2m": [7.9, 7.4, null],
            "relative_humidity_2m": [91, 93, 95],
            "precipitation": [0.0, 0.1, 0.3]
        }
    }"#;

    #[test]
    fn test_parse_forecast() -> Result<()> {
        let requested = Coordinate::new(53.3617, -1.6281);
        let forecast = parse_forecast(PAYLOAD, requested)?;

        assert_eq!(forecast.elevation, Some(412.0));
        assert_eq!(forecast.timestamps.len(), 3);
        assert_eq!(
            forecast.timestamps[0],
            Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(forecast.temperature_2m[2], None);
        assert_eq!(forecast.relative_humidity_2m[1], Some(93.0));

        let rows = forecast.into_rows(requested)?;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].latitude, 53.3617);
        Ok(())
    }

    #[test]
    fn test_payload_without_hourly_block_is_fetch_error() {
        let body = r#"{ "latitude": 53.36, "longitude": -1.62 }"#;
        let result = parse_forecast(body, Coordinate::new(53.3617, -1.6281));
        assert!(matches!(result, Err(PipelineError::WeatherFetch { .. })));
    }

    #[test]
    fn test_query_params() {
        let params = OpenMeteoClient::query_params(Coordinate::new(53.3617, -1.6281));
        let lookup = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(lookup("latitude"), Some("53.3617"));
        assert_eq!(
            lookup("hourly"),
            Some("temperature_2m,relative_humidity_2m,precipitation")
        );
        assert_eq!(lookup("timeformat"), Some("unixtime"));
        assert_eq!(lookup("timezone"), Some("GMT"));
        assert_eq!(lookup("wind_speed_unit"), Some("mph"));
    }

    #[test]
    fn test_backoff_doubles() -> Result<()> {
        let client = OpenMeteoClient::new(&WeatherConfig::default())?;
        assert_eq!(client.backoff(1), Duration::from_millis(200));
        assert_eq!(client.backoff(2), Duration::from_millis(400));
        assert_eq!(client.backoff(4), Duration::from_millis(1600));
        Ok(())
    }
}
