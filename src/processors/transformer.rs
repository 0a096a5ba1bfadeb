use crate::error::{PipelineError, Result};
use crate::models::{CragRecord, ExtractedTable, FlatRouteRow, RouteRecord, TransformedTable};
use serde_json::Value;
use tracing::info;

/// A sector after its nesting has been checked
struct ParsedSector {
    sector_name: Option<String>,
    routes: Vec<RouteRecord>,
}

/// Flattens crags → sectors → routes into one row per route.
///
/// Empty lists explode to a single row with the missing level left as
/// `None`, so crags without sectors and sectors without routes are kept.
pub struct Transformer;

impl Transformer {
    pub fn new() -> Self {
        Self
    }

    pub fn transform(&self, extracted: &ExtractedTable) -> Result<TransformedTable> {
        let mut rows = Vec::new();

        for (position, crag) in extracted.crags.iter().enumerate() {
            let sectors = self.parse_sectors(position, crag)?;
            let routes_count = crag
                .routes_count
                .unwrap_or_else(|| sectors.iter().map(|s| s.routes.len() as i64).sum());

            if sectors.is_empty() {
                rows.push(self.crag_row(crag, routes_count));
                continue;
            }

            for sector in &sectors {
                if sector.routes.is_empty() {
                    let mut row = self.crag_row(crag, routes_count);
                    row.sector_name = sector.sector_name.clone();
                    rows.push(row);
                    continue;
                }

                for route in &sector.routes {
                    let mut row = self.crag_row(crag, routes_count);
                    row.sector_name = sector.sector_name.clone();
                    row.route_name = route.name.clone();
                    row.climbing_type = route.climbing_type.clone();
                    row.grade = route.grade.clone();
                    row.stars = route.stars.clone();
                    row.difficulty = route.difficulty.clone();
                    row.direction = route.direction.clone();
                    row.is_hill = route.is_hill.clone();
                    row.slug = route.slug.clone();
                    rows.push(row);
                }
            }
        }

        let table = TransformedTable::new(rows);
        info!(
            rows = table.len(),
            columns = table.column_count(),
            "Crags exploded to one row per route"
        );

        Ok(table)
    }

    /// Crag-level columns broadcast onto every row of the crag
    fn crag_row(&self, crag: &CragRecord, routes_count: i64) -> FlatRouteRow {
        FlatRouteRow {
            crag_id: crag.id.clone(),
            crag_name: crag.name.clone(),
            county: crag.county.clone(),
            country: crag.country.clone(),
            rocktype: crag.rocktype.clone(),
            latitude: crag.latitude,
            longitude: crag.longitude,
            routes_count,
            ..FlatRouteRow::default()
        }
    }

    fn parse_sectors(&self, position: usize, crag: &CragRecord) -> Result<Vec<ParsedSector>> {
        let crag_label = crag
            .id
            .clone()
            .unwrap_or_else(|| format!("#{}", position));

        crag.routes
            .sectors
            .iter()
            .enumerate()
            .map(|(index, sector)| self.parse_sector(&crag_label, index, sector))
            .collect()
    }

    fn parse_sector(&self, crag_label: &str, index: usize, sector: &Value) -> Result<ParsedSector> {
        let object = sector.as_object().ok_or_else(|| {
            PipelineError::Transform(format!(
                "Crag {} sector {} is not an object",
                crag_label, index
            ))
        })?;

        let sector_name = object.get("sector_name").and_then(scalar_text);

        let route_values: &[Value] = match object.get("routes") {
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => {
                return Err(PipelineError::Transform(format!(
                    "Crag {} sector {}: 'routes' is not a list",
                    crag_label, index
                )))
            }
            None => {
                return Err(PipelineError::Transform(format!(
                    "Crag {} sector {} has no 'routes' key",
                    crag_label, index
                )))
            }
        };

        let routes = route_values
            .iter()
            .enumerate()
            .map(|(route_index, route)| {
                if !route.is_object() {
                    return Err(PipelineError::Transform(format!(
                        "Crag {} sector {} route {} is not an object",
                        crag_label, index, route_index
                    )));
                }
                serde_json::from_value::<RouteRecord>(route.clone()).map_err(|e| {
                    PipelineError::Transform(format!(
                        "Crag {} sector {} route {}: {}",
                        crag_label, index, route_index, e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ParsedSector {
            sector_name,
            routes,
        })
    }
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new()
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
