use crate::error::{PipelineError, Result};
use crate::models::{CragRecord, ExtractedTable};
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Key of the wrapper object some catalogue exports use around the crag list
const CRAGS_KEY: &str = "crags";

/// Reads the nested crag catalogue into one row per crag
pub struct CragReader {
    allow_wrapped: bool,
}

impl CragReader {
    pub fn new() -> Self {
        Self {
            allow_wrapped: true,
        }
    }

    /// Only accept a bare top-level array of crags
    pub fn strict() -> Self {
        Self {
            allow_wrapped: false,
        }
    }

    /// Read and normalise a catalogue file
    pub fn read_crags(&self, path: &Path) -> Result<ExtractedTable> {
        let file = File::open(path).map_err(|e| {
            PipelineError::Extraction(format!("Failed to open {}: {}", path.display(), e))
        })?;

        let document: Value = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            PipelineError::Extraction(format!("{} is not valid JSON: {}", path.display(), e))
        })?;

        info!(path = %path.display(), "Catalogue opened");

        let table = self.normalize(document)?;

        info!(
            crags = table.len(),
            sectors = table.total_sectors(),
            columns = table.column_count(),
            "Catalogue normalised"
        );

        Ok(table)
    }

    /// Read a catalogue already held in memory
    pub fn read_str(&self, json: &str) -> Result<ExtractedTable> {
        let document: Value = serde_json::from_str(json)
            .map_err(|e| PipelineError::Extraction(format!("Invalid JSON: {}", e)))?;
        self.normalize(document)
    }

    fn normalize(&self, document: Value) -> Result<ExtractedTable> {
        let records = match document {
            Value::Array(items) => items,
            Value::Object(mut map) if self.allow_wrapped => match map.remove(CRAGS_KEY) {
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(PipelineError::Normalization(format!(
                        "'{}' is not a list of crags",
                        CRAGS_KEY
                    )))
                }
                None => {
                    return Err(PipelineError::Normalization(format!(
                        "Document has no '{}' list",
                        CRAGS_KEY
                    )))
                }
            },
            _ => {
                return Err(PipelineError::Normalization(
                    "Expected a list of crag objects at the top level".to_string(),
                ))
            }
        };

        let mut crags = Vec::with_capacity(records.len());
        for (position, record) in records.into_iter().enumerate() {
            crags.push(self.parse_crag(position, record)?);
        }

        Ok(ExtractedTable::new(crags))
    }

    fn parse_crag(&self, position: usize, record: Value) -> Result<CragRecord> {
        let sectors = record
            .as_object()
            .ok_or_else(|| {
                PipelineError::Normalization(format!("Crag {} is not an object", position))
            })?
            .get("routes")
            .and_then(|routes| routes.get("sectors"));

        match sectors {
            Some(Value::Array(_)) => {}
            Some(_) => {
                return Err(PipelineError::Normalization(format!(
                    "Crag {}: 'routes.sectors' is not a list",
                    position
                )))
            }
            None => {
                return Err(PipelineError::Normalization(format!(
                    "Crag {} has no 'routes.sectors' path",
                    position
                )))
            }
        }

        serde_json::from_value(record)
            .map_err(|e| PipelineError::Normalization(format!("Crag {}: {}", position, e)))
    }
}

impl Default for CragReader {
    fn default() -> Self {
        Self::new()
    }
}
