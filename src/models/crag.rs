use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use validator::Validate;

use crate::models::vocabulary::{ClimbingType, RockType};
use crate::models::weather::Coordinate;
use crate::utils::coordinates::coordinate_key;

/// Index column of the crag table. Not counted among the canonical columns.
pub const CRAG_INDEX_COLUMN: &str = "crag_id";

/// Canonical columns of the cleaned crag table, in order
pub const CRAG_COLUMNS: [&str; 12] = [
    "sector_name",
    "crag_name",
    "county",
    "country",
    "rocktype",
    "latitude",
    "longitude",
    "routes_count",
    "route_name",
    "type",
    "difficulty_grade",
    "safety_grade",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CragRow {
    pub crag_id: String,

    pub sector_name: String,

    pub crag_name: Option<String>,

    pub county: Option<String>,

    pub country: String,

    pub rocktype: Option<RockType>,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    pub routes_count: i64,

    pub route_name: Option<String>,

    #[serde(rename = "type")]
    pub climbing_type: Option<ClimbingType>,

    pub difficulty_grade: Option<String>,

    pub safety_grade: Option<String>,
}

impl CragRow {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// The canonical crag table, indexed by `crag_id`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CragTable {
    pub rows: Vec<CragRow>,
}

impl CragTable {
    pub fn new(rows: Vec<CragRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        CRAG_COLUMNS.len()
    }

    /// Row positions for each crag id. A crag has one row per route.
    pub fn index(&self) -> BTreeMap<&str, Vec<usize>> {
        let mut index: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (position, row) in self.rows.iter().enumerate() {
            index.entry(row.crag_id.as_str()).or_default().push(position);
        }
        index
    }

    pub fn rows_for_crag(&self, crag_id: &str) -> Vec<&CragRow> {
        self.rows.iter().filter(|r| r.crag_id == crag_id).collect()
    }

    /// Distinct finite coordinate pairs in first-seen order
    pub fn distinct_coordinates(&self) -> Vec<Coordinate> {
        let mut seen = HashSet::new();
        let mut coordinates = Vec::new();

        for row in &self.rows {
            if !row.latitude.is_finite() || !row.longitude.is_finite() {
                continue;
            }
            if seen.insert(coordinate_key(row.latitude, row.longitude)) {
                coordinates.push(row.coordinate());
            }
        }

        coordinates
    }
}
