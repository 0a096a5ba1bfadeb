use serde::{Deserialize, Serialize};

/// Column names of the transformed table, in order
pub const TRANSFORMED_COLUMNS: [&str; 17] = [
    "sector_name",
    "crag_id",
    "crag_name",
    "county",
    "country",
    "rocktype",
    "latitude",
    "longitude",
    "routes_count",
    "route_name",
    "type",
    "grade",
    "stars",
    "difficulty",
    "direction",
    "is_hill",
    "slug",
];

/// One row per (crag, sector, route). Sector and route fields are `None`
/// for crags without sectors and sectors without routes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatRouteRow {
    pub sector_name: Option<String>,
    pub crag_id: Option<String>,
    pub crag_name: Option<String>,
    pub county: Option<String>,
    pub country: Option<String>,
    pub rocktype: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub routes_count: i64,
    pub route_name: Option<String>,
    #[serde(rename = "type")]
    pub climbing_type: Option<String>,
    pub grade: Option<String>,
    pub stars: Option<String>,
    pub difficulty: Option<String>,
    pub direction: Option<String>,
    pub is_hill: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformedTable {
    pub rows: Vec<FlatRouteRow>,
}

impl TransformedTable {
    pub fn new(rows: Vec<FlatRouteRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        TRANSFORMED_COLUMNS.len()
    }
}
