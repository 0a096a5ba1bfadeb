use crate::error::{PipelineError, Result};
use crate::models::{RawWeatherTable, WeatherTable, RAW_WEATHER_COLUMNS};
use crate::writers::Snapshot;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

/// Provider field names and their canonical replacements
pub const WEATHER_RENAMES: [(&str, &str); 3] = [
    ("temperature_2m", "temperature_c"),
    ("relative_humidity_2m", "relative_humidity_percentage"),
    ("precipitation", "precipitation_percentage"),
];

/// Relabels the provider's weather columns to the canonical schema
pub struct WeatherCleaner;

impl WeatherCleaner {
    pub fn new() -> Self {
        Self
    }

    pub fn clean(&self, raw: &RawWeatherTable) -> Result<WeatherTable> {
        let batch = self.rename_batch(&raw.to_batch()?)?;
        let table = WeatherTable::from_batches(&[batch])?;

        for row in &table.rows {
            row.validate().map_err(|e| {
                PipelineError::Clean(format!(
                    "Weather at ({}, {}) {} failed validation: {}",
                    row.latitude, row.longitude, row.date, e
                ))
            })?;
        }

        info!(
            rows = table.len(),
            columns = table.column_count(),
            "Weather columns renamed"
        );
        Ok(table)
    }

    /// Rename the provider columns of a batch, keeping order and data
    pub fn rename_batch(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let schema = batch.schema();

        for column in RAW_WEATHER_COLUMNS {
            if schema.column_with_name(column).is_none() {
                return Err(PipelineError::Rename {
                    column: column.to_string(),
                });
            }
        }

        let fields: Vec<Field> = schema
            .fields()
            .iter()
            .map(|field| {
                match WEATHER_RENAMES.iter().find(|(from, _)| field.name().as_str() == *from) {
                    Some((_, to)) => field.as_ref().clone().with_name(*to),
                    None => field.as_ref().clone(),
                }
            })
            .collect();

        let renamed = Schema::new_with_metadata(fields, schema.metadata().clone());
        Ok(RecordBatch::try_new(Arc::new(renamed), batch.columns().to_vec())?)
    }
}

impl Default for WeatherCleaner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawWeatherRow, WEATHER_COLUMNS};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn raw_table() -> RawWeatherTable {
        let start = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        RawWeatherTable::new(
            (0..3)
                .map(|h| RawWeatherRow {
                    date: start + chrono::Duration::hours(h),
                    temperature_2m: Some(8.0 + h as f32),
                    relative_humidity_2m: Some(90.0),
                    precipitation: if h == 1 { None } else { Some(0.4) },
                    latitude: 53.3617,
                    longitude: -1.6281,
                })
                .collect(),
        )
    }

    #[test]
    fn test_columns_renamed_in_order() -> Result<()> {
        let batch = WeatherCleaner::new().rename_batch(&raw_table().to_batch()?)?;
        let names: Vec<&str> = batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();
        assert_eq!(names, WEATHER_COLUMNS.to_vec());
        Ok(())
    }

    #[test]
    fn test_no_rows_filtered() -> Result<()> {
        let raw = raw_table();
        let cleaned = WeatherCleaner::new().clean(&raw)?;

        assert_eq!(cleaned.len(), raw.len());
        assert_eq!(cleaned.column_count(), 6);
        assert_eq!(cleaned.rows[1].precipitation_percentage, None);
        assert_eq!(cleaned.rows[2].temperature_c, Some(10.0));
        assert_eq!(cleaned.rows[0].date, raw.rows[0].date);
        Ok(())
    }

    #[test]
    fn test_out_of_range_measure_is_clean_error() {
        let mut raw = raw_table();
        raw.rows[2].relative_humidity_2m = Some(120.0);

        let result = WeatherCleaner::new().clean(&raw);
        match result {
            Err(PipelineError::Clean(message)) => assert!(message.contains("53.3617")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_source_column_is_rename_error() -> Result<()> {
        let batch = raw_table().to_batch()?;
        let trimmed = batch.project(&[0, 1, 3, 4, 5])?;

        let err = WeatherCleaner::new().rename_batch(&trimmed).unwrap_err();
        match err {
            PipelineError::Rename { column } => assert_eq!(column, "relative_humidity_2m"),
            other => panic!("unexpected error: {}", other),
        }
        Ok(())
    }
}
