use crate::config::{FailurePolicy, WeatherConfig};
use crate::error::{PipelineError, Result};
use crate::models::{Coordinate, CragTable, RawWeatherTable};
use crate::utils::progress::ProgressReporter;
use crate::weather::provider::WeatherProvider;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What happened to one selected coordinate
#[derive(Debug)]
pub enum CoordinateOutcome {
    Fetched { rows: usize },
    Failed { error: PipelineError },
}

impl CoordinateOutcome {
    pub fn is_fetched(&self) -> bool {
        matches!(self, CoordinateOutcome::Fetched { .. })
    }
}

/// Long-format weather table plus the per-coordinate outcome log, in the
/// order the coordinates were queried
#[derive(Debug)]
pub struct EnrichmentResult {
    pub table: RawWeatherTable,
    pub outcomes: Vec<(Coordinate, CoordinateOutcome)>,
}

impl EnrichmentResult {
    pub fn fetched(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_fetched()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.fetched()
    }
}

/// Fetches hourly forecasts for the distinct crag coordinates
pub struct WeatherEnricher<'a> {
    provider: &'a dyn WeatherProvider,
    max_coordinates: usize,
    pause: Duration,
    policy: FailurePolicy,
    show_progress: bool,
}

impl<'a> WeatherEnricher<'a> {
    pub fn new(provider: &'a dyn WeatherProvider, config: &WeatherConfig) -> Self {
        Self {
            provider,
            max_coordinates: config.max_coordinates,
            pause: config.request_pause(),
            policy: config.failure_policy,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// The first `max_coordinates` distinct coordinates, first-seen order
    pub fn select_coordinates(&self, crags: &CragTable) -> Vec<Coordinate> {
        let mut coordinates = crags.distinct_coordinates();
        if coordinates.len() > self.max_coordinates {
            info!(
                distinct = coordinates.len(),
                cap = self.max_coordinates,
                "Coordinate cap reached, later coordinates get no forecast"
            );
            coordinates.truncate(self.max_coordinates);
        }
        coordinates
    }

    pub async fn enrich(&self, crags: &CragTable) -> Result<EnrichmentResult> {
        let coordinates = self.select_coordinates(crags);
        if coordinates.is_empty() {
            return Err(PipelineError::WeatherFetchAll(
                "No coordinates to fetch weather for".to_string(),
            ));
        }

        let progress = ProgressReporter::new(
            coordinates.len() as u64,
            "Fetching forecasts",
            !self.show_progress,
        );

        let mut rows = Vec::new();
        let mut outcomes = Vec::with_capacity(coordinates.len());

        for (i, coordinate) in coordinates.iter().copied().enumerate() {
            if i > 0 && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }

            let fetched = match self.provider.hourly_forecast(coordinate).await {
                Ok(forecast) => forecast.into_rows(coordinate),
                Err(e) => Err(e),
            };

            match fetched {
                Ok(coordinate_rows) => {
                    debug!(%coordinate, rows = coordinate_rows.len(), "Forecast fetched");
                    outcomes.push((
                        coordinate,
                        CoordinateOutcome::Fetched {
                            rows: coordinate_rows.len(),
                        },
                    ));
                    rows.extend(coordinate_rows);
                }
                Err(error) => {
                    warn!(%coordinate, error = %error, "Forecast failed");
                    if self.policy == FailurePolicy::Abort {
                        progress.finish_with_message("Aborted");
                        return Err(error);
                    }
                    outcomes.push((coordinate, CoordinateOutcome::Failed { error }));
                }
            }
            progress.increment(1);
        }

        let result = EnrichmentResult {
            table: RawWeatherTable::new(rows),
            outcomes,
        };

        if result.fetched() == 0 {
            progress.finish_with_message("No forecasts fetched");
            return Err(PipelineError::WeatherFetchAll(format!(
                "All {} coordinates failed via {}",
                result.outcomes.len(),
                self.provider.name()
            )));
        }

        progress.finish_with_message("Forecasts fetched");
        info!(
            coordinates = result.outcomes.len(),
            fetched = result.fetched(),
            failed = result.failed(),
            rows = result.table.len(),
            "Weather enrichment complete"
        );

        Ok(result)
    }
}
