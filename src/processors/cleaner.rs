use crate::error::{PipelineError, Result};
use crate::models::{
    ClimbingType, CragRow, CragTable, FlatRouteRow, RockType, TransformedTable,
};
use crate::utils::constants::{DEFAULT_SECTOR_NAME, EXPECTED_COUNTRY, PLACEHOLDER_VALUES};
use tracing::{info, warn};
use validator::Validate;

/// Transformed row with the noise columns (direction, is_hill, slug,
/// difficulty, stars) already dropped
#[derive(Debug, Clone)]
struct WorkingRow {
    crag_id: Option<String>,
    sector_name: Option<String>,
    crag_name: Option<String>,
    county: Option<String>,
    country: Option<String>,
    rocktype: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    routes_count: i64,
    route_name: Option<String>,
    climbing_type: Option<String>,
    grade: Option<String>,
}

impl From<&FlatRouteRow> for WorkingRow {
    fn from(row: &FlatRouteRow) -> Self {
        Self {
            crag_id: row.crag_id.clone(),
            sector_name: row.sector_name.clone(),
            crag_name: row.crag_name.clone(),
            county: row.county.clone(),
            country: row.country.clone(),
            rocktype: row.rocktype.clone(),
            latitude: row.latitude,
            longitude: row.longitude,
            routes_count: row.routes_count,
            route_name: row.route_name.clone(),
            climbing_type: row.climbing_type.clone(),
            grade: row.grade.clone(),
        }
    }
}

impl WorkingRow {
    fn text_columns_mut(&mut self) -> [&mut Option<String>; 9] {
        [
            &mut self.crag_id,
            &mut self.sector_name,
            &mut self.crag_name,
            &mut self.county,
            &mut self.country,
            &mut self.rocktype,
            &mut self.route_name,
            &mut self.climbing_type,
            &mut self.grade,
        ]
    }
}

/// Counts of what each cleaning step changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanReport {
    pub input_rows: usize,
    pub zero_coordinate_rows: usize,
    pub placeholder_values: usize,
    pub default_sector_names: usize,
    pub unknown_rocktypes: usize,
    pub unknown_climbing_types: usize,
    pub missing_coordinate_rows: usize,
    pub output_rows: usize,
}

impl CleanReport {
    pub fn summary(&self) -> String {
        format!(
            "Cleaned {} -> {} rows ({} zero-coordinate, {} missing-coordinate dropped; \
             {} placeholders nulled; {} default sectors; {} unknown rocktypes; {} unknown types)",
            self.input_rows,
            self.output_rows,
            self.zero_coordinate_rows,
            self.missing_coordinate_rows,
            self.placeholder_values,
            self.default_sector_names,
            self.unknown_rocktypes,
            self.unknown_climbing_types
        )
    }
}

/// Split a composite grade on its first space.
///
/// Returns `(difficulty_grade, safety_grade)`. `"E2 5c"` gives
/// `("5c", "E2")`; a grade without a space is all difficulty.
pub fn split_grade(grade: Option<&str>) -> (Option<String>, Option<String>) {
    match grade {
        Some(g) => match g.split_once(' ') {
            Some((safety, difficulty)) => (Some(difficulty.to_string()), Some(safety.to_string())),
            None => (Some(g.to_string()), None),
        },
        None => (None, None),
    }
}

/// Produces the canonical crag table from the transformed rows
pub struct Cleaner {
    expected_country: String,
}

impl Cleaner {
    pub fn new() -> Self {
        Self {
            expected_country: EXPECTED_COUNTRY.to_string(),
        }
    }

    pub fn clean(&self, transformed: &TransformedTable) -> Result<CragTable> {
        self.clean_with_report(transformed).map(|(table, _)| table)
    }

    pub fn clean_with_report(
        &self,
        transformed: &TransformedTable,
    ) -> Result<(CragTable, CleanReport)> {
        let mut report = CleanReport {
            input_rows: transformed.len(),
            ..CleanReport::default()
        };

        let rows: Vec<WorkingRow> = transformed.rows.iter().map(WorkingRow::from).collect();

        let rows = self.drop_zero_coordinates(rows, &mut report);
        let rows = self.null_placeholders(rows, &mut report);
        let rows = self.fill_sector_names(rows, &mut report);

        let mut cleaned = Vec::with_capacity(rows.len());
        for (position, row) in rows.into_iter().enumerate() {
            if let Some(crag_row) = self.conform_row(position, row, &mut report)? {
                cleaned.push(crag_row);
            }
        }

        report.output_rows = cleaned.len();

        if report.unknown_rocktypes > 0 || report.unknown_climbing_types > 0 {
            warn!(
                rocktypes = report.unknown_rocktypes,
                climbing_types = report.unknown_climbing_types,
                "Values outside the vocabularies mapped to UNKNOWN"
            );
        }
        info!("{}", report.summary());

        Ok((CragTable::new(cleaned), report))
    }

    /// Zero is the catalogue's sentinel for "no coordinate"
    fn drop_zero_coordinates(&self, rows: Vec<WorkingRow>, report: &mut CleanReport) -> Vec<WorkingRow> {
        let before = rows.len();
        let kept: Vec<WorkingRow> = rows
            .into_iter()
            .filter(|r| r.longitude != Some(0.0) && r.latitude != Some(0.0))
            .collect();
        report.zero_coordinate_rows = before - kept.len();
        kept
    }

    fn null_placeholders(&self, mut rows: Vec<WorkingRow>, report: &mut CleanReport) -> Vec<WorkingRow> {
        for row in &mut rows {
            for column in row.text_columns_mut() {
                if column
                    .as_deref()
                    .is_some_and(|v| PLACEHOLDER_VALUES.contains(&v))
                {
                    *column = None;
                    report.placeholder_values += 1;
                }
            }
        }
        rows
    }

    fn fill_sector_names(&self, mut rows: Vec<WorkingRow>, report: &mut CleanReport) -> Vec<WorkingRow> {
        for row in &mut rows {
            if row.sector_name.is_none() {
                row.sector_name = Some(DEFAULT_SECTOR_NAME.to_string());
                report.default_sector_names += 1;
            }
        }
        rows
    }

    /// Coerce categoricals, derive grades, key by crag id and drop rows
    /// still missing a coordinate
    fn conform_row(
        &self,
        position: usize,
        row: WorkingRow,
        report: &mut CleanReport,
    ) -> Result<Option<CragRow>> {
        let rocktype = row.rocktype.as_deref().map(|value| {
            let parsed = RockType::parse_lenient(value);
            if RockType::parse(value).is_none() {
                report.unknown_rocktypes += 1;
            }
            parsed
        });

        let climbing_type = row.climbing_type.as_deref().map(|value| {
            let parsed = ClimbingType::parse_lenient(value);
            if parsed == ClimbingType::Unknown {
                report.unknown_climbing_types += 1;
            }
            parsed
        });

        let (difficulty_grade, safety_grade) = split_grade(row.grade.as_deref());

        let crag_id = row.crag_id.ok_or_else(|| {
            PipelineError::Clean(format!("Row {} has no crag_id to index on", position))
        })?;

        let (latitude, longitude) = match (row.latitude, row.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => (lat, lon),
            _ => {
                report.missing_coordinate_rows += 1;
                return Ok(None);
            }
        };

        let country = match row.country {
            Some(country) if country == self.expected_country => country,
            other => {
                return Err(PipelineError::Clean(format!(
                    "Crag {} has country {:?}, expected '{}'",
                    crag_id, other, self.expected_country
                )))
            }
        };

        let crag_row = CragRow {
            crag_id,
            sector_name: row
                .sector_name
                .unwrap_or_else(|| DEFAULT_SECTOR_NAME.to_string()),
            crag_name: row.crag_name,
            county: row.county,
            country,
            rocktype,
            latitude,
            longitude,
            routes_count: row.routes_count,
            route_name: row.route_name,
            climbing_type,
            difficulty_grade,
            safety_grade,
        };

        crag_row.validate().map_err(|e| {
            PipelineError::Clean(format!("Crag {} failed validation: {}", crag_row.crag_id, e))
        })?;

        Ok(Some(crag_row))
    }
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CRAG_COLUMNS, TRANSFORMED_COLUMNS};
    use pretty_assertions::assert_eq;

    fn flat(route: &str, grade: Option<&str>, latitude: f64, longitude: f64) -> FlatRouteRow {
        FlatRouteRow {
            sector_name: Some("Popular End".to_string()),
            crag_id: Some("1".to_string()),
            crag_name: Some("Stanage".to_string()),
            county: Some("Derbyshire".to_string()),
            country: Some("England".to_string()),
            rocktype: Some("Gritstone".to_string()),
            latitude: Some(latitude),
            longitude: Some(longitude),
            routes_count: 2,
            route_name: Some(route.to_string()),
            climbing_type: Some("Trad".to_string()),
            grade: grade.map(str::to_string),
            stars: Some("3".to_string()),
            difficulty: Some("2".to_string()),
            direction: Some("W".to_string()),
            is_hill: Some("false".to_string()),
            slug: Some("flying-buttress".to_string()),
        }
    }

    #[test]
    fn test_split_grade_on_first_space() {
        assert_eq!(
            split_grade(Some("HVD 4a")),
            (Some("4a".to_string()), Some("HVD".to_string()))
        );
        assert_eq!(
            split_grade(Some("E1 5b R")),
            (Some("5b R".to_string()), Some("E1".to_string()))
        );
        assert_eq!(split_grade(Some("7a+")), (Some("7a+".to_string()), None));
        assert_eq!(split_grade(None), (None, None));
    }

    #[test]
    fn test_split_grade_is_idempotent_on_difficulty() {
        let (difficulty, _) = split_grade(Some("VS 4c"));
        let (again, safety) = split_grade(difficulty.as_deref());
        assert_eq!(again.as_deref(), Some("4c"));
        assert_eq!(safety, None);
    }

    #[test]
    fn test_clean_produces_canonical_rows() {
        let transformed = TransformedTable::new(vec![
            flat("Flying Buttress", Some("HVD 4a"), 53.3617, -1.6281),
            flat("Ground Hog", Some("6b"), 53.3617, -1.6281),
        ]);

        let table = Cleaner::new().clean(&transformed).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.column_count(), CRAG_COLUMNS.len());
        assert!(table.column_count() < TRANSFORMED_COLUMNS.len());
        assert!(!CRAG_COLUMNS.contains(&"grade"));

        let first = &table.rows[0];
        assert_eq!(first.crag_id, "1");
        assert_eq!(first.difficulty_grade.as_deref(), Some("4a"));
        assert_eq!(first.safety_grade.as_deref(), Some("HVD"));
        assert_eq!(first.rocktype, Some(RockType::Gritstone));
        assert_eq!(first.climbing_type, Some(ClimbingType::Trad));

        let second = &table.rows[1];
        assert_eq!(second.difficulty_grade.as_deref(), Some("6b"));
        assert_eq!(second.safety_grade, None);
    }

    #[test]
    fn test_zero_coordinates_are_excluded() {
        let transformed = TransformedTable::new(vec![
            flat("Kept", None, 53.3617, -1.6281),
            flat("Zero Lat", None, 0.0, -1.6281),
            flat("Zero Lon", None, 53.3617, 0.0),
        ]);

        let (table, report) = Cleaner::new().clean_with_report(&transformed).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(report.zero_coordinate_rows, 2);
        assert!(table
            .rows
            .iter()
            .all(|r| r.latitude != 0.0 && r.longitude != 0.0));
    }

    #[test]
    fn test_missing_coordinates_are_dropped_last() {
        let mut missing = flat("No Coordinates", None, 53.0, -1.0);
        missing.latitude = None;
        let transformed = TransformedTable::new(vec![missing, flat("Kept", None, 53.0, -1.0)]);

        let (table, report) = Cleaner::new().clean_with_report(&transformed).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(report.missing_coordinate_rows, 1);
    }

    #[test]
    fn test_summit_placeholders_become_missing() {
        let mut row = flat("Summit", Some("summit"), 53.0, -1.0);
        row.sector_name = Some("Summit".to_string());
        row.county = Some("SUMMIT".to_string());

        let (table, report) = Cleaner::new()
            .clean_with_report(&TransformedTable::new(vec![row]))
            .unwrap();

        let cleaned = &table.rows[0];
        assert_eq!(cleaned.route_name, None);
        assert_eq!(cleaned.difficulty_grade, None);
        assert_eq!(cleaned.safety_grade, None);
        // Nulled sector names take the default
        assert_eq!(cleaned.sector_name, "Main Area");
        // Matching is case-sensitive
        assert_eq!(cleaned.county.as_deref(), Some("SUMMIT"));
        assert_eq!(report.placeholder_values, 3);
    }

    #[test]
    fn test_missing_sector_defaults_to_main_area() {
        let mut row = flat("Quietus", Some("E2 5c"), 53.0, -1.0);
        row.sector_name = None;

        let table = Cleaner::new()
            .clean(&TransformedTable::new(vec![row]))
            .unwrap();
        assert_eq!(table.rows[0].sector_name, "Main Area");
    }

    #[test]
    fn test_unknown_vocabulary_values_are_tolerated() {
        let mut row = flat("Highball", Some("7A"), 53.0, -1.0);
        row.rocktype = Some("Marble".to_string());
        row.climbing_type = Some("Highball".to_string());

        let (table, report) = Cleaner::new()
            .clean_with_report(&TransformedTable::new(vec![row]))
            .unwrap();

        assert_eq!(table.rows[0].rocktype, Some(RockType::Unknown));
        assert_eq!(table.rows[0].climbing_type, Some(ClimbingType::Unknown));
        assert_eq!(report.unknown_rocktypes, 1);
        assert_eq!(report.unknown_climbing_types, 1);
    }

    #[test]
    fn test_foreign_country_is_clean_error() {
        let mut row = flat("Le Bleau", None, 48.4, 2.6);
        row.country = Some("France".to_string());

        let result = Cleaner::new().clean(&TransformedTable::new(vec![row]));
        assert!(matches!(result, Err(PipelineError::Clean(_))));
    }

    #[test]
    fn test_missing_crag_id_is_clean_error() {
        let mut row = flat("Orphan", None, 53.0, -1.0);
        row.crag_id = None;

        let result = Cleaner::new().clean(&TransformedTable::new(vec![row]));
        assert!(matches!(result, Err(PipelineError::Clean(_))));
    }
}
