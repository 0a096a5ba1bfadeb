//! Crag records as they appear in the source catalogue.
//!
//! Scalars are read leniently because the catalogue mixes numbers and
//! strings for ids, coordinates and counts. Sector objects are kept as raw
//! JSON so that their nesting can be checked when they are flattened.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::coordinates::parse_coordinate;

/// Column names of the extracted table, in order
pub const EXTRACTED_COLUMNS: [&str; 9] = [
    "id",
    "name",
    "county",
    "country",
    "rocktype",
    "latitude",
    "longitude",
    "routes_count",
    "routes.sectors",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CragRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub county: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub country: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub rocktype: Option<String>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,

    #[serde(default, deserialize_with = "lenient_i64")]
    pub routes_count: Option<i64>,

    pub routes: RoutesBlock,
}

/// The `routes` object of a crag, holding its sectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutesBlock {
    pub sectors: Vec<Value>,
}

/// A single route inside a sector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,

    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub climbing_type: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub grade: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub stars: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub difficulty: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub direction: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub is_hill: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub slug: Option<String>,
}

/// Output of the extractor: one row per crag object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedTable {
    pub crags: Vec<CragRecord>,
}

impl ExtractedTable {
    pub fn new(crags: Vec<CragRecord>) -> Self {
        Self { crags }
    }

    pub fn len(&self) -> usize {
        self.crags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crags.is_empty()
    }

    pub fn column_count(&self) -> usize {
        EXTRACTED_COLUMNS.len()
    }

    pub fn total_sectors(&self) -> usize {
        self.crags.iter().map(|c| c.routes.sectors.len()).sum()
    }
}

pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => parse_coordinate(&s).map(Some).map_err(de::Error::custom),
        Some(other) => Err(de::Error::custom(format!(
            "expected a number, got {}",
            other
        ))),
    }
}

pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => Ok(Some(i)),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| Some(f as i64))
                .ok_or_else(|| de::Error::custom(format!("expected an integer, got {}", n))),
        },
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected an integer, got '{}'", s))),
        Some(other) => Err(de::Error::custom(format!(
            "expected an integer, got {}",
            other
        ))),
    }
}
