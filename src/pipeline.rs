use crate::config::PipelineConfig;
use crate::error::Result;
use crate::loaders::{LoadReport, StarSchemaLoader};
use crate::models::Coordinate;
use crate::processors::{CleanReport, Cleaner, Transformer, WeatherCleaner};
use crate::readers::CragReader;
use crate::weather::{CoordinateOutcome, WeatherEnricher, WeatherProvider};
use crate::writers::{ParquetWriter, Snapshot};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Row and column counts of one completed stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageSummary {
    pub stage: &'static str,
    pub rows: usize,
    pub columns: usize,
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub stages: Vec<StageSummary>,
    pub clean_report: CleanReport,
    pub outcomes: Vec<(Coordinate, CoordinateOutcome)>,
    pub load: LoadReport,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn stage(&self, name: &str) -> Option<&StageSummary> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn failed_coordinates(&self) -> Vec<&Coordinate> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_fetched())
            .map(|(coordinate, _)| coordinate)
            .collect()
    }

    pub fn summary(&self) -> String {
        let mut summary = String::from("=== Pipeline Run ===\n");
        for stage in &self.stages {
            summary.push_str(&format!(
                "{:<14} {:>8} rows {:>3} columns",
                stage.stage, stage.rows, stage.columns
            ));
            if let Some(path) = &stage.snapshot {
                summary.push_str(&format!("  -> {}", path.display()));
            }
            summary.push('\n');
        }

        summary.push_str(&format!("\n{}\n", self.clean_report.summary()));

        let failed = self.failed_coordinates();
        summary.push_str(&format!(
            "Weather: {} coordinates queried, {} failed\n",
            self.outcomes.len(),
            failed.len()
        ));
        for coordinate in failed {
            summary.push_str(&format!("  no forecast for {}\n", coordinate));
        }

        summary.push_str(&format!("\n{}", self.load.summary()));
        summary.push_str(&format!("\nCompleted in {:.2}s\n", self.elapsed.as_secs_f64()));
        summary
    }
}

/// Runs extract, transform, clean, enrich, clean weather and load in order,
/// persisting each intermediate table
pub struct Pipeline<P: WeatherProvider> {
    config: PipelineConfig,
    provider: P,
    writer: ParquetWriter,
    show_progress: bool,
}

impl<P: WeatherProvider> Pipeline<P> {
    pub fn new(config: PipelineConfig, provider: P) -> Result<Self> {
        config.check()?;
        let writer = ParquetWriter::new().with_compression(&config.compression)?;

        Ok(Self {
            config,
            provider,
            writer,
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self, input: &Path) -> Result<RunSummary> {
        let start = Instant::now();
        let mut stages = Vec::new();
        info!(input = %input.display(), "Pipeline run started");

        let extracted = checked("extract", CragReader::new().read_crags(input))?;
        stages.push(self.persist("extract", &extracted, extracted.column_count())?);

        let transformed = checked("transform", Transformer::new().transform(&extracted))?;
        stages.push(self.persist("transform", &transformed, transformed.column_count())?);

        let (crags, clean_report) =
            checked("clean", Cleaner::new().clean_with_report(&transformed))?;
        stages.push(self.persist("clean", &crags, crags.column_count())?);

        let enricher = WeatherEnricher::new(&self.provider, &self.config.weather)
            .with_progress(self.show_progress);
        let enrichment = checked("enrich", enricher.enrich(&crags).await)?;
        stages.push(self.persist("enrich", &enrichment.table, 6)?);

        let weather = checked("clean_weather", WeatherCleaner::new().clean(&enrichment.table))?;
        stages.push(self.persist("clean_weather", &weather, weather.column_count())?);

        let load = checked(
            "load",
            StarSchemaLoader::new(&self.config.database_path).load(&crags, &weather),
        )?;
        stages.push(StageSummary {
            stage: "load",
            rows: load.fact_rows.max(0) as usize,
            columns: 6,
            snapshot: None,
        });

        let summary = RunSummary {
            stages,
            clean_report,
            outcomes: enrichment.outcomes,
            load,
            elapsed: start.elapsed(),
        };
        info!(elapsed = ?summary.elapsed, "Pipeline run finished");

        Ok(summary)
    }

    fn persist<T: Snapshot>(
        &self,
        stage: &'static str,
        table: &T,
        columns: usize,
    ) -> Result<StageSummary> {
        let path = checked(
            stage,
            self.writer.write_snapshot(table, &self.config.snapshot_dir),
        )?;

        info!(stage, rows = table.row_count(), columns, "Stage complete");
        Ok(StageSummary {
            stage,
            rows: table.row_count(),
            columns,
            snapshot: Some(path),
        })
    }
}

/// Log a failed stage before its error stops the run
fn checked<T>(stage: &'static str, result: Result<T>) -> Result<T> {
    result.map_err(|e| {
        error!(stage, kind = e.stage(), error = %e, "Stage failed, stopping run");
        e
    })
}
