use crate::error::Result;
use crate::models::{
    ClimbingType, CragTable, RockType, WeatherTable, CRAG_COLUMNS, CRAG_INDEX_COLUMN,
    WEATHER_COLUMNS,
};
use crate::utils::constants::EXPECTED_COUNTRY;
use crate::writers::schema::{categorical_type, f32_values, string_values, utc_timestamp_type};
use crate::writers::{ParquetWriter, Snapshot};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Int32Type};
use arrow::record_batch::RecordBatch;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Columns of the crag table that must never hold nulls
const CRAG_NOT_NULL: [&str; 4] = ["routes_count", "crag_name", "longitude", "latitude"];

#[derive(Debug, Clone, PartialEq)]
pub struct ExpectationResult {
    pub table: &'static str,
    pub expectation: String,
    pub success: bool,
    pub details: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExpectationReport {
    pub results: Vec<ExpectationResult>,
}

impl ExpectationReport {
    pub fn success(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    pub fn failures(&self) -> Vec<&ExpectationResult> {
        self.results.iter().filter(|r| !r.success).collect()
    }

    fn record(&mut self, table: &'static str, expectation: String, success: bool, details: String) {
        self.results.push(ExpectationResult {
            table,
            expectation,
            success,
            details,
        });
    }
}

/// Checks the cleaned tables against the fixed output contract
pub struct ExpectationChecker {
    expected_crag_rows: Option<usize>,
    expected_weather_rows: Option<usize>,
}

impl ExpectationChecker {
    pub fn new() -> Self {
        Self {
            expected_crag_rows: None,
            expected_weather_rows: None,
        }
    }

    /// Also require exact row counts, as pinned for a known snapshot
    pub fn with_row_counts(mut self, crag_rows: usize, weather_rows: usize) -> Self {
        self.expected_crag_rows = Some(crag_rows);
        self.expected_weather_rows = Some(weather_rows);
        self
    }

    pub fn check(&self, crags: &CragTable, weather: &WeatherTable) -> Result<ExpectationReport> {
        self.check_batches(&crags.to_batch()?, &weather.to_batch()?)
    }

    /// Check the snapshot files as stored, before any conversion back into tables
    pub fn check_files(&self, crag_path: &Path, weather_path: &Path) -> Result<ExpectationReport> {
        let reader = ParquetWriter::new();
        let crags = reader.read_batch(crag_path)?;
        let weather = reader.read_batch(weather_path)?;
        debug!(
            crag_rows = crags.num_rows(),
            weather_rows = weather.num_rows(),
            "Checking snapshot files"
        );
        self.check_batches(&crags, &weather)
    }

    pub fn check_batches(
        &self,
        crags: &RecordBatch,
        weather: &RecordBatch,
    ) -> Result<ExpectationReport> {
        let mut report = ExpectationReport::default();
        self.check_crags(crags, &mut report);
        self.check_weather(weather, &mut report);
        Ok(report)
    }

    fn check_crags(&self, batch: &RecordBatch, report: &mut ExpectationReport) {
        const TABLE: &str = "crags";
        let schema = batch.schema();

        let names: Vec<String> = schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .filter(|name| name != CRAG_INDEX_COLUMN)
            .collect();

        report.record(
            TABLE,
            format!("column count == {}", CRAG_COLUMNS.len()),
            names.len() == CRAG_COLUMNS.len(),
            format!("found {}", names.len()),
        );

        let actual: BTreeSet<&str> = names.iter().map(String::as_str).collect();
        let expected: BTreeSet<&str> = CRAG_COLUMNS.iter().copied().collect();
        report.record(
            TABLE,
            "column names match".to_string(),
            actual == expected,
            describe_set_difference(&expected, &actual),
        );

        for name in CRAG_COLUMNS {
            let expected_type = match name {
                "rocktype" | "type" => categorical_type(),
                "latitude" | "longitude" => DataType::Float64,
                "routes_count" => DataType::Int64,
                _ => DataType::Utf8,
            };
            self.check_type(TABLE, batch, name, &expected_type, report);
        }

        for name in CRAG_NOT_NULL {
            self.check_not_null(TABLE, batch, name, report);
        }

        let expected_countries: BTreeSet<String> = [EXPECTED_COUNTRY.to_string()].into();
        let (success, details) = match string_values(batch, "country") {
            Ok(values) => {
                let countries: BTreeSet<String> = values.into_iter().flatten().collect();
                (countries == expected_countries, format!("found {:?}", countries))
            }
            Err(e) => (false, e.to_string()),
        };
        report.record(
            TABLE,
            format!("country set == {{{}}}", EXPECTED_COUNTRY),
            success,
            details,
        );

        self.check_vocabulary(TABLE, batch, "rocktype", &RockType::categories(), report);
        self.check_vocabulary(TABLE, batch, "type", &ClimbingType::categories(), report);

        if let Some(rows) = self.expected_crag_rows {
            report.record(
                TABLE,
                format!("row count == {}", rows),
                batch.num_rows() == rows,
                format!("found {}", batch.num_rows()),
            );
        }
    }

    fn check_weather(&self, batch: &RecordBatch, report: &mut ExpectationReport) {
        const TABLE: &str = "weather";
        let schema = batch.schema();

        report.record(
            TABLE,
            format!("column count == {}", WEATHER_COLUMNS.len()),
            schema.fields().len() == WEATHER_COLUMNS.len(),
            format!("found {}", schema.fields().len()),
        );

        let actual: BTreeSet<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        let expected: BTreeSet<&str> = WEATHER_COLUMNS.iter().copied().collect();
        report.record(
            TABLE,
            "column names match".to_string(),
            actual == expected,
            describe_set_difference(&expected, &actual),
        );

        for name in WEATHER_COLUMNS {
            let expected_type = match name {
                "date" => utc_timestamp_type(),
                "latitude" | "longitude" => DataType::Float64,
                _ => DataType::Float32,
            };
            self.check_type(TABLE, batch, name, &expected_type, report);
            self.check_not_null(TABLE, batch, name, report);
        }

        let (success, details) = match f32_values(batch, "relative_humidity_percentage") {
            Ok(values) => {
                let out_of_range = values
                    .into_iter()
                    .flatten()
                    .filter(|h| !(0.0..=100.0).contains(h))
                    .count();
                (out_of_range == 0, format!("{} values out of range", out_of_range))
            }
            Err(e) => (false, e.to_string()),
        };
        report.record(
            TABLE,
            "relative_humidity_percentage within [0, 100]".to_string(),
            success,
            details,
        );

        if let Some(rows) = self.expected_weather_rows {
            report.record(
                TABLE,
                format!("row count == {}", rows),
                batch.num_rows() == rows,
                format!("found {}", batch.num_rows()),
            );
        }
    }

    fn check_type(
        &self,
        table: &'static str,
        batch: &RecordBatch,
        column: &str,
        expected: &DataType,
        report: &mut ExpectationReport,
    ) {
        let schema = batch.schema();
        let (success, details) = match schema.field_with_name(column) {
            Ok(field) => (
                field.data_type() == expected,
                format!("declared {}", field.data_type()),
            ),
            Err(_) => (false, "column missing".to_string()),
        };
        report.record(
            table,
            format!("{} is of type {}", column, expected),
            success,
            details,
        );
    }

    fn check_not_null(
        &self,
        table: &'static str,
        batch: &RecordBatch,
        column: &str,
        report: &mut ExpectationReport,
    ) {
        let (success, details) = match batch.column_by_name(column) {
            Some(array) => (
                array.null_count() == 0,
                format!("{} nulls", array.null_count()),
            ),
            None => (false, "column missing".to_string()),
        };
        report.record(table, format!("{} not null", column), success, details);
    }

    /// The column must be categorical and every category a vocabulary member.
    /// Parquet keeps only the dictionary entries that occur, so unused members may be absent.
    fn check_vocabulary(
        &self,
        table: &'static str,
        batch: &RecordBatch,
        column: &str,
        categories: &[&str],
        report: &mut ExpectationReport,
    ) {
        let labels: Option<Vec<String>> = batch
            .column_by_name(column)
            .and_then(|array| array.as_dictionary_opt::<Int32Type>())
            .and_then(|dict| {
                dict.values()
                    .as_string_opt::<i32>()
                    .map(|values| values.iter().flatten().map(str::to_string).collect())
            });

        let (success, details) = match labels {
            Some(labels) => {
                let unknown: BTreeSet<&str> = labels
                    .iter()
                    .map(String::as_str)
                    .filter(|label| !categories.contains(label))
                    .collect();
                if unknown.is_empty() {
                    (true, format!("{} categories", labels.len()))
                } else {
                    (false, format!("unknown categories {:?}", unknown))
                }
            }
            None => (false, "not a categorical column".to_string()),
        };
        report.record(
            table,
            format!("{} categories match vocabulary", column),
            success,
            details,
        );
    }

    /// Generate a summary report
    pub fn generate_summary(&self, report: &ExpectationReport) -> String {
        let mut summary = String::new();
        let total = report.results.len();
        let failed = report.failures().len();

        summary.push_str("=== Expectation Report ===\n");
        summary.push_str(&format!("Expectations Evaluated: {}\n", total));
        summary.push_str(&format!(
            "Passed: {} ({:.1}%)\n",
            total - failed,
            if total > 0 {
                100.0 * (total - failed) as f64 / total as f64
            } else {
                0.0
            }
        ));
        summary.push_str(&format!("Failed: {}\n", failed));

        if failed > 0 {
            summary.push_str("\nFailures:\n");
            for (i, result) in report.failures().iter().enumerate() {
                summary.push_str(&format!(
                    "  {}. [{}] {}: {}\n",
                    i + 1,
                    result.table,
                    result.expectation,
                    result.details
                ));
            }
        }

        summary
    }
}

impl Default for ExpectationChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_set_difference(expected: &BTreeSet<&str>, actual: &BTreeSet<&str>) -> String {
    let missing: Vec<&&str> = expected.difference(actual).collect();
    let unexpected: Vec<&&str> = actual.difference(expected).collect();
    if missing.is_empty() && unexpected.is_empty() {
        "exact match".to_string()
    } else {
        format!("missing {:?}, unexpected {:?}", missing, unexpected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CragRow, WeatherRow};
    use arrow::array::{ArrayRef, StringArray};
    use arrow::compute::cast;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn crag_row(country: &str) -> CragRow {
        CragRow {
            crag_id: "1".to_string(),
            sector_name: "Main Area".to_string(),
            crag_name: Some("Stanage".to_string()),
            county: Some("Derbyshire".to_string()),
            country: country.to_string(),
            rocktype: Some(RockType::Gritstone),
            latitude: 53.3617,
            longitude: -1.6281,
            routes_count: 1,
            route_name: Some("Flying Buttress".to_string()),
            climbing_type: Some(ClimbingType::Trad),
            difficulty_grade: Some("4a".to_string()),
            safety_grade: Some("HVD".to_string()),
        }
    }

    fn weather_row(humidity: f32) -> WeatherRow {
        WeatherRow {
            date: Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap(),
            temperature_c: Some(11.0),
            relative_humidity_percentage: Some(humidity),
            precipitation_percentage: Some(0.0),
            latitude: 53.3617,
            longitude: -1.6281,
        }
    }

    #[test]
    fn test_clean_tables_pass() -> Result<()> {
        let checker = ExpectationChecker::new().with_row_counts(1, 2);
        let report = checker.check(
            &CragTable::new(vec![crag_row("England")]),
            &WeatherTable::new(vec![weather_row(80.0), weather_row(100.0)]),
        )?;

        assert!(report.success(), "{}", checker.generate_summary(&report));
        Ok(())
    }

    #[test]
    fn test_foreign_country_fails() -> Result<()> {
        let report = ExpectationChecker::new().check(
            &CragTable::new(vec![crag_row("England"), crag_row("Wales")]),
            &WeatherTable::new(vec![weather_row(80.0)]),
        )?;

        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].expectation.starts_with("country set"));
        Ok(())
    }

    #[test]
    fn test_humidity_and_nulls_reported() -> Result<()> {
        let mut missing = weather_row(50.0);
        missing.temperature_c = None;

        let checker = ExpectationChecker::new().with_row_counts(1, 3);
        let report = checker.check(
            &CragTable::new(vec![crag_row("England")]),
            &WeatherTable::new(vec![weather_row(120.0), missing]),
        )?;

        let failed: Vec<&str> = report
            .failures()
            .iter()
            .map(|r| r.expectation.as_str())
            .collect();
        assert!(failed.contains(&"temperature_c not null"));
        assert!(failed.contains(&"relative_humidity_percentage within [0, 100]"));
        assert!(failed.contains(&"row count == 3"));

        let summary = checker.generate_summary(&report);
        assert!(summary.contains("Failed: 3"));
        Ok(())
    }

    /// Rebuild a batch with some columns cast and extra columns appended
    fn drift(
        batch: &RecordBatch,
        casts: &[(&str, DataType)],
        extra: Vec<(&str, ArrayRef)>,
    ) -> RecordBatch {
        let schema = batch.schema();
        let mut columns: Vec<(String, ArrayRef)> = Vec::new();
        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            let array = match casts.iter().find(|(name, _)| *name == field.name().as_str()) {
                Some((_, to)) => cast(array, to).unwrap(),
                None => array.clone(),
            };
            columns.push((field.name().clone(), array));
        }
        for (name, array) in extra {
            columns.push((name.to_string(), array));
        }
        RecordBatch::try_from_iter(columns).unwrap()
    }

    #[test]
    fn test_written_snapshots_pass_file_checks() -> Result<()> {
        let dir = TempDir::new()?;
        let writer = ParquetWriter::new();
        let crag_path =
            writer.write_snapshot(&CragTable::new(vec![crag_row("England")]), dir.path())?;
        let weather_path = writer.write_snapshot(
            &WeatherTable::new(vec![weather_row(80.0), weather_row(60.0)]),
            dir.path(),
        )?;

        let checker = ExpectationChecker::new().with_row_counts(1, 2);
        let report = checker.check_files(&crag_path, &weather_path)?;

        assert!(report.success(), "{}", checker.generate_summary(&report));
        Ok(())
    }

    #[test]
    fn test_schema_drift_in_files_is_reported() -> Result<()> {
        let dir = TempDir::new()?;
        let writer = ParquetWriter::new();

        let crags = CragTable::new(vec![crag_row("England"), crag_row("England")]).to_batch()?;
        let junk: ArrayRef = Arc::new(StringArray::from(vec!["x"; crags.num_rows()]));
        let crags = drift(
            &crags,
            &[
                ("rocktype", DataType::Utf8),
                ("type", DataType::Utf8),
                ("routes_count", DataType::Float64),
            ],
            vec![("junk", junk)],
        );
        let crag_path = dir.path().join("crags.parquet");
        writer.write_batch(&crags, &crag_path)?;

        let weather = WeatherTable::new(vec![weather_row(80.0)]).to_batch()?;
        let weather = drift(
            &weather,
            &[
                ("temperature_c", DataType::Float64),
                ("relative_humidity_percentage", DataType::Float64),
                ("precipitation_percentage", DataType::Float64),
            ],
            vec![],
        );
        let weather_path = dir.path().join("cleaned_weather.parquet");
        writer.write_batch(&weather, &weather_path)?;

        let report = ExpectationChecker::new().check_files(&crag_path, &weather_path)?;
        let failed: Vec<(&str, &str)> = report
            .failures()
            .iter()
            .map(|r| (r.table, r.expectation.as_str()))
            .collect();

        for expected in [
            ("crags", "column count == 12"),
            ("crags", "column names match"),
            ("crags", "routes_count is of type Int64"),
            ("crags", "rocktype categories match vocabulary"),
            ("crags", "type categories match vocabulary"),
            ("weather", "temperature_c is of type Float32"),
            ("weather", "relative_humidity_percentage is of type Float32"),
            ("weather", "precipitation_percentage is of type Float32"),
        ] {
            assert!(failed.contains(&expected), "{:?} not in {:?}", expected, failed);
        }
        assert!(failed
            .iter()
            .any(|(table, e)| *table == "crags" && e.starts_with("rocktype is of type")));
        assert!(!failed.iter().any(|(_, e)| e.starts_with("country set")));
        Ok(())
    }

    #[test]
    fn test_unknown_category_in_dictionary_fails() -> Result<()> {
        let crags = CragTable::new(vec![crag_row("England")]).to_batch()?;
        let rocktype = crags.column_by_name("rocktype").unwrap().clone();
        let bogus: ArrayRef = Arc::new(StringArray::from(vec!["Cheese"]));
        let bogus = cast(&bogus, &categorical_type()).unwrap();

        let mut report = ExpectationReport::default();
        let checker = ExpectationChecker::new();
        let batch =
            RecordBatch::try_from_iter(vec![("rocktype", rocktype), ("type", bogus)]).unwrap();
        checker.check_vocabulary("crags", &batch, "rocktype", &RockType::categories(), &mut report);
        checker.check_vocabulary("crags", &batch, "type", &ClimbingType::categories(), &mut report);

        assert!(report.results[0].success);
        assert!(!report.results[1].success);
        assert!(report.results[1].details.contains("Cheese"));
        Ok(())
    }
}
