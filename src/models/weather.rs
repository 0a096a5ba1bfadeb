use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{PipelineError, Result};

/// Column names of the weather table as returned by the provider
pub const RAW_WEATHER_COLUMNS: [&str; 6] = [
    "date",
    "temperature_2m",
    "relative_humidity_2m",
    "precipitation",
    "latitude",
    "longitude",
];

/// Column names of the cleaned weather table
pub const WEATHER_COLUMNS: [&str; 6] = [
    "date",
    "temperature_c",
    "relative_humidity_percentage",
    "precipitation_percentage",
    "latitude",
    "longitude",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}°N {:.4}°E", self.latitude, self.longitude)
    }
}

/// Hourly series for one coordinate, measures aligned by index with
/// `timestamps`.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyForecast {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub utc_offset_seconds: i32,
    pub timestamps: Vec<DateTime<Utc>>,
    pub temperature_2m: Vec<Option<f32>>,
    pub relative_humidity_2m: Vec<Option<f32>>,
    pub precipitation: Vec<Option<f32>>,
}

impl HourlyForecast {
    /// Build one row per forecast hour, tagged with the requested coordinate
    ///
    /// The requested coordinate is used rather than the provider's snapped
    /// grid point so rows join back to the crag they were fetched for.
    pub fn into_rows(self, requested: Coordinate) -> Result<Vec<RawWeatherRow>> {
        let hours = self.timestamps.len();
        let lengths = [
            ("temperature_2m", self.temperature_2m.len()),
            ("relative_humidity_2m", self.relative_humidity_2m.len()),
            ("precipitation", self.precipitation.len()),
        ];

        for (name, len) in lengths {
            if len != hours {
                return Err(PipelineError::WeatherFetch {
                    latitude: requested.latitude,
                    longitude: requested.longitude,
                    message: format!(
                        "{} has {} values but the series has {} hours",
                        name, len, hours
                    ),
                });
            }
        }

        let rows = self
            .timestamps
            .into_iter()
            .zip(self.temperature_2m)
            .zip(self.relative_humidity_2m)
            .zip(self.precipitation)
            .map(|(((date, temperature), humidity), precipitation)| RawWeatherRow {
                date,
                temperature_2m: temperature,
                relative_humidity_2m: humidity,
                precipitation,
                latitude: requested.latitude,
                longitude: requested.longitude,
            })
            .collect();

        Ok(rows)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWeatherRow {
    pub date: DateTime<Utc>,
    pub temperature_2m: Option<f32>,
    pub relative_humidity_2m: Option<f32>,
    pub precipitation: Option<f32>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawWeatherTable {
    pub rows: Vec<RawWeatherRow>,
}

impl RawWeatherTable {
    pub fn new(rows: Vec<RawWeatherRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct WeatherRow {
    pub date: DateTime<Utc>,

    #[validate(range(min = -60.0, max = 60.0))]
    pub temperature_c: Option<f32>,

    #[validate(range(min = 0.0, max = 100.0))]
    pub relative_humidity_percentage: Option<f32>,

    #[validate(range(min = 0.0, max = 100.0))]
    pub precipitation_percentage: Option<f32>,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherTable {
    pub rows: Vec<WeatherRow>,
}

impl WeatherTable {
    pub fn new(rows: Vec<WeatherRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        WEATHER_COLUMNS.len()
    }
}
