use crate::error::{PipelineError, Result};
use crate::models::{
    ClimbingType, CragRecord, CragRow, CragTable, ExtractedTable, FlatRouteRow, RawWeatherRow,
    RawWeatherTable, RockType, RoutesBlock, TransformedTable, WeatherRow, WeatherTable,
    CRAG_INDEX_COLUMN, EXTRACTED_COLUMNS, RAW_WEATHER_COLUMNS, TRANSFORMED_COLUMNS,
    WEATHER_COLUMNS,
};
use crate::utils::constants::{
    CLEANED_WEATHER_SNAPSHOT, CRAG_SNAPSHOT, EXTRACTED_SNAPSHOT, TRANSFORMED_SNAPSHOT,
    WEATHER_SNAPSHOT,
};
use arrow::array::*;
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Int32Type, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A pipeline table that can be persisted as a Parquet snapshot
pub trait Snapshot: Sized {
    /// File name of the snapshot inside the snapshot directory
    const FILE_NAME: &'static str;

    fn schema() -> SchemaRef;

    fn to_batch(&self) -> Result<RecordBatch>;

    fn from_batches(batches: &[RecordBatch]) -> Result<Self>;

    fn row_count(&self) -> usize;
}

pub fn categorical_type() -> DataType {
    DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8))
}

pub fn utc_timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

/// Categorical column whose dictionary is the full vocabulary, not just
/// the values that happen to appear
fn categorical_array(categories: Vec<&'static str>, codes: Vec<Option<i32>>) -> Result<ArrayRef> {
    let keys = Int32Array::from(codes);
    let values: ArrayRef = Arc::new(StringArray::from(categories));
    let array = DictionaryArray::<Int32Type>::try_new(keys, values)?;
    Ok(Arc::new(array))
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch.column_by_name(name).ok_or_else(|| {
        PipelineError::Snapshot(format!("Snapshot is missing column '{}'", name))
    })
}

/// Read a text column, casting dictionary columns down to plain strings
pub(crate) fn string_values(batch: &RecordBatch, name: &str) -> Result<Vec<Option<String>>> {
    let array = cast(column(batch, name)?, &DataType::Utf8)?;
    let strings = array
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| PipelineError::Snapshot(format!("Invalid {} column type", name)))?;
    Ok(strings.iter().map(|v| v.map(str::to_string)).collect())
}

pub(crate) fn f64_values(batch: &RecordBatch, name: &str) -> Result<Vec<Option<f64>>> {
    let array = cast(column(batch, name)?, &DataType::Float64)?;
    let values = array
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| PipelineError::Snapshot(format!("Invalid {} column type", name)))?;
    Ok(values.iter().collect())
}

pub(crate) fn f32_values(batch: &RecordBatch, name: &str) -> Result<Vec<Option<f32>>> {
    let array = cast(column(batch, name)?, &DataType::Float32)?;
    let values = array
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| PipelineError::Snapshot(format!("Invalid {} column type", name)))?;
    Ok(values.iter().collect())
}

pub(crate) fn i64_values(batch: &RecordBatch, name: &str) -> Result<Vec<Option<i64>>> {
    let array = cast(column(batch, name)?, &DataType::Int64)?;
    let values = array
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| PipelineError::Snapshot(format!("Invalid {} column type", name)))?;
    Ok(values.iter().collect())
}

pub(crate) fn timestamp_values(batch: &RecordBatch, name: &str) -> Result<Vec<Option<DateTime<Utc>>>> {
    let array = cast(column(batch, name)?, &utc_timestamp_type())?;
    let values = array
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .ok_or_else(|| PipelineError::Snapshot(format!("Invalid {} column type", name)))?;

    values
        .iter()
        .map(|v| match v {
            Some(micros) => DateTime::from_timestamp_micros(micros).map(Some).ok_or_else(|| {
                PipelineError::Snapshot(format!("{} value {} is out of range", name, micros))
            }),
            None => Ok(None),
        })
        .collect()
}

fn required<T>(value: Option<T>, column: &str, row: usize) -> Result<T> {
    value.ok_or_else(|| {
        PipelineError::Snapshot(format!("Column '{}' is null at row {}", column, row))
    })
}

fn text_array(values: impl Iterator<Item = Option<String>>) -> ArrayRef {
    Arc::new(values.collect::<StringArray>())
}

impl Snapshot for ExtractedTable {
    const FILE_NAME: &'static str = EXTRACTED_SNAPSHOT;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new(EXTRACTED_COLUMNS[0], DataType::Utf8, true),
            Field::new(EXTRACTED_COLUMNS[1], DataType::Utf8, true),
            Field::new(EXTRACTED_COLUMNS[2], DataType::Utf8, true),
            Field::new(EXTRACTED_COLUMNS[3], DataType::Utf8, true),
            Field::new(EXTRACTED_COLUMNS[4], DataType::Utf8, true),
            Field::new(EXTRACTED_COLUMNS[5], DataType::Float64, true),
            Field::new(EXTRACTED_COLUMNS[6], DataType::Float64, true),
            Field::new(EXTRACTED_COLUMNS[7], DataType::Int64, true),
            // Nested sectors kept whole as JSON text
            Field::new(EXTRACTED_COLUMNS[8], DataType::Utf8, false),
        ]))
    }

    fn to_batch(&self) -> Result<RecordBatch> {
        let crags = &self.crags;
        let sectors = crags
            .iter()
            .map(|c| serde_json::to_string(&c.routes.sectors))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let batch = RecordBatch::try_new(
            Self::schema(),
            vec![
                text_array(crags.iter().map(|c| c.id.clone())),
                text_array(crags.iter().map(|c| c.name.clone())),
                text_array(crags.iter().map(|c| c.county.clone())),
                text_array(crags.iter().map(|c| c.country.clone())),
                text_array(crags.iter().map(|c| c.rocktype.clone())),
                Arc::new(Float64Array::from_iter(crags.iter().map(|c| c.latitude))),
                Arc::new(Float64Array::from_iter(crags.iter().map(|c| c.longitude))),
                Arc::new(Int64Array::from_iter(crags.iter().map(|c| c.routes_count))),
                Arc::new(StringArray::from(sectors)),
            ],
        )?;

        Ok(batch)
    }

    fn from_batches(batches: &[RecordBatch]) -> Result<Self> {
        let mut crags = Vec::new();

        for batch in batches {
            let ids = string_values(batch, "id")?;
            let names = string_values(batch, "name")?;
            let counties = string_values(batch, "county")?;
            let countries = string_values(batch, "country")?;
            let rocktypes = string_values(batch, "rocktype")?;
            let latitudes = f64_values(batch, "latitude")?;
            let longitudes = f64_values(batch, "longitude")?;
            let counts = i64_values(batch, "routes_count")?;
            let sectors = string_values(batch, "routes.sectors")?;

            for i in 0..batch.num_rows() {
                let sector_json = required(sectors[i].as_deref(), "routes.sectors", i)?;
                crags.push(CragRecord {
                    id: ids[i].clone(),
                    name: names[i].clone(),
                    county: counties[i].clone(),
                    country: countries[i].clone(),
                    rocktype: rocktypes[i].clone(),
                    latitude: latitudes[i],
                    longitude: longitudes[i],
                    routes_count: counts[i],
                    routes: RoutesBlock {
                        sectors: serde_json::from_str(sector_json)?,
                    },
                });
            }
        }

        Ok(ExtractedTable::new(crags))
    }

    fn row_count(&self) -> usize {
        self.len()
    }
}

impl Snapshot for TransformedTable {
    const FILE_NAME: &'static str = TRANSFORMED_SNAPSHOT;

    fn schema() -> SchemaRef {
        let fields = TRANSFORMED_COLUMNS
            .iter()
            .map(|name| match *name {
                "latitude" | "longitude" => Field::new(*name, DataType::Float64, true),
                "routes_count" => Field::new(*name, DataType::Int64, false),
                _ => Field::new(*name, DataType::Utf8, true),
            })
            .collect::<Vec<_>>();
        Arc::new(Schema::new(fields))
    }

    fn to_batch(&self) -> Result<RecordBatch> {
        let rows = &self.rows;
        let text = |f: fn(&FlatRouteRow) -> Option<String>| text_array(rows.iter().map(f));

        let batch = RecordBatch::try_new(
            Self::schema(),
            vec![
                text(|r| r.sector_name.clone()),
                text(|r| r.crag_id.clone()),
                text(|r| r.crag_name.clone()),
                text(|r| r.county.clone()),
                text(|r| r.country.clone()),
                text(|r| r.rocktype.clone()),
                Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.latitude))),
                Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.longitude))),
                Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.routes_count))),
                text(|r| r.route_name.clone()),
                text(|r| r.climbing_type.clone()),
                text(|r| r.grade.clone()),
                text(|r| r.stars.clone()),
                text(|r| r.difficulty.clone()),
                text(|r| r.direction.clone()),
                text(|r| r.is_hill.clone()),
                text(|r| r.slug.clone()),
            ],
        )?;

        Ok(batch)
    }

    fn from_batches(batches: &[RecordBatch]) -> Result<Self> {
        let mut rows = Vec::new();

        for batch in batches {
            let mut sector_name = string_values(batch, "sector_name")?.into_iter();
            let mut crag_id = string_values(batch, "crag_id")?.into_iter();
            let mut crag_name = string_values(batch, "crag_name")?.into_iter();
            let mut county = string_values(batch, "county")?.into_iter();
            let mut country = string_values(batch, "country")?.into_iter();
            let mut rocktype = string_values(batch, "rocktype")?.into_iter();
            let latitude = f64_values(batch, "latitude")?;
            let longitude = f64_values(batch, "longitude")?;
            let routes_count = i64_values(batch, "routes_count")?;
            let mut route_name = string_values(batch, "route_name")?.into_iter();
            let mut climbing_type = string_values(batch, "type")?.into_iter();
            let mut grade = string_values(batch, "grade")?.into_iter();
            let mut stars = string_values(batch, "stars")?.into_iter();
            let mut difficulty = string_values(batch, "difficulty")?.into_iter();
            let mut direction = string_values(batch, "direction")?.into_iter();
            let mut is_hill = string_values(batch, "is_hill")?.into_iter();
            let mut slug = string_values(batch, "slug")?.into_iter();

            for i in 0..batch.num_rows() {
                rows.push(FlatRouteRow {
                    sector_name: sector_name.next().flatten(),
                    crag_id: crag_id.next().flatten(),
                    crag_name: crag_name.next().flatten(),
                    county: county.next().flatten(),
                    country: country.next().flatten(),
                    rocktype: rocktype.next().flatten(),
                    latitude: latitude[i],
                    longitude: longitude[i],
                    routes_count: required(routes_count[i], "routes_count", i)?,
                    route_name: route_name.next().flatten(),
                    climbing_type: climbing_type.next().flatten(),
                    grade: grade.next().flatten(),
                    stars: stars.next().flatten(),
                    difficulty: difficulty.next().flatten(),
                    direction: direction.next().flatten(),
                    is_hill: is_hill.next().flatten(),
                    slug: slug.next().flatten(),
                });
            }
        }

        Ok(TransformedTable::new(rows))
    }

    fn row_count(&self) -> usize {
        self.len()
    }
}

impl Snapshot for CragTable {
    const FILE_NAME: &'static str = CRAG_SNAPSHOT;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new(CRAG_INDEX_COLUMN, DataType::Utf8, false),
            Field::new("sector_name", DataType::Utf8, false),
            Field::new("crag_name", DataType::Utf8, true),
            Field::new("county", DataType::Utf8, true),
            Field::new("country", DataType::Utf8, false),
            Field::new("rocktype", categorical_type(), true),
            Field::new("latitude", DataType::Float64, false),
            Field::new("longitude", DataType::Float64, false),
            Field::new("routes_count", DataType::Int64, false),
            Field::new("route_name", DataType::Utf8, true),
            Field::new("type", categorical_type(), true),
            Field::new("difficulty_grade", DataType::Utf8, true),
            Field::new("safety_grade", DataType::Utf8, true),
        ]))
    }

    fn to_batch(&self) -> Result<RecordBatch> {
        let rows = &self.rows;

        let rocktypes = categorical_array(
            RockType::categories(),
            rows.iter().map(|r| r.rocktype.map(|t| t.category_code())).collect(),
        )?;
        let climbing_types = categorical_array(
            ClimbingType::categories(),
            rows.iter()
                .map(|r| r.climbing_type.map(|t| t.category_code()))
                .collect(),
        )?;

        let batch = RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.crag_id.as_str()))),
                Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.sector_name.as_str()))),
                text_array(rows.iter().map(|r| r.crag_name.clone())),
                text_array(rows.iter().map(|r| r.county.clone())),
                Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.country.as_str()))),
                rocktypes,
                Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.latitude))),
                Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.longitude))),
                Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.routes_count))),
                text_array(rows.iter().map(|r| r.route_name.clone())),
                climbing_types,
                text_array(rows.iter().map(|r| r.difficulty_grade.clone())),
                text_array(rows.iter().map(|r| r.safety_grade.clone())),
            ],
        )?;

        Ok(batch)
    }

    fn from_batches(batches: &[RecordBatch]) -> Result<Self> {
        let mut rows = Vec::new();

        for batch in batches {
            let crag_ids = string_values(batch, CRAG_INDEX_COLUMN)?;
            let sector_names = string_values(batch, "sector_name")?;
            let crag_names = string_values(batch, "crag_name")?;
            let counties = string_values(batch, "county")?;
            let countries = string_values(batch, "country")?;
            let rocktypes = string_values(batch, "rocktype")?;
            let latitudes = f64_values(batch, "latitude")?;
            let longitudes = f64_values(batch, "longitude")?;
            let counts = i64_values(batch, "routes_count")?;
            let route_names = string_values(batch, "route_name")?;
            let climbing_types = string_values(batch, "type")?;
            let difficulty_grades = string_values(batch, "difficulty_grade")?;
            let safety_grades = string_values(batch, "safety_grade")?;

            for i in 0..batch.num_rows() {
                rows.push(CragRow {
                    crag_id: required(crag_ids[i].clone(), CRAG_INDEX_COLUMN, i)?,
                    sector_name: required(sector_names[i].clone(), "sector_name", i)?,
                    crag_name: crag_names[i].clone(),
                    county: counties[i].clone(),
                    country: required(countries[i].clone(), "country", i)?,
                    rocktype: rocktypes[i].as_deref().map(RockType::parse_lenient),
                    latitude: required(latitudes[i], "latitude", i)?,
                    longitude: required(longitudes[i], "longitude", i)?,
                    routes_count: required(counts[i], "routes_count", i)?,
                    route_name: route_names[i].clone(),
                    climbing_type: climbing_types[i].as_deref().map(ClimbingType::parse_lenient),
                    difficulty_grade: difficulty_grades[i].clone(),
                    safety_grade: safety_grades[i].clone(),
                });
            }
        }

        Ok(CragTable::new(rows))
    }

    fn row_count(&self) -> usize {
        self.len()
    }
}

fn weather_schema(columns: &[&str; 6]) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(columns[0], utc_timestamp_type(), false),
        Field::new(columns[1], DataType::Float32, true),
        Field::new(columns[2], DataType::Float32, true),
        Field::new(columns[3], DataType::Float32, true),
        Field::new(columns[4], DataType::Float64, false),
        Field::new(columns[5], DataType::Float64, false),
    ]))
}

fn timestamp_array(dates: impl Iterator<Item = DateTime<Utc>>) -> ArrayRef {
    Arc::new(
        TimestampMicrosecondArray::from_iter_values(dates.map(|d| d.timestamp_micros()))
            .with_timezone("UTC"),
    )
}

impl Snapshot for RawWeatherTable {
    const FILE_NAME: &'static str = WEATHER_SNAPSHOT;

    fn schema() -> SchemaRef {
        weather_schema(&RAW_WEATHER_COLUMNS)
    }

    fn to_batch(&self) -> Result<RecordBatch> {
        let rows = &self.rows;
        let batch = RecordBatch::try_new(
            Self::schema(),
            vec![
                timestamp_array(rows.iter().map(|r| r.date)),
                Arc::new(Float32Array::from_iter(rows.iter().map(|r| r.temperature_2m))),
                Arc::new(Float32Array::from_iter(rows.iter().map(|r| r.relative_humidity_2m))),
                Arc::new(Float32Array::from_iter(rows.iter().map(|r| r.precipitation))),
                Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.latitude))),
                Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.longitude))),
            ],
        )?;
        Ok(batch)
    }

    fn from_batches(batches: &[RecordBatch]) -> Result<Self> {
        let mut rows = Vec::new();

        for batch in batches {
            let dates = timestamp_values(batch, "date")?;
            let temperatures = f32_values(batch, "temperature_2m")?;
            let humidities = f32_values(batch, "relative_humidity_2m")?;
            let precipitation = f32_values(batch, "precipitation")?;
            let latitudes = f64_values(batch, "latitude")?;
            let longitudes = f64_values(batch, "longitude")?;

            for i in 0..batch.num_rows() {
                rows.push(RawWeatherRow {
                    date: required(dates[i], "date", i)?,
                    temperature_2m: temperatures[i],
                    relative_humidity_2m: humidities[i],
                    precipitation: precipitation[i],
                    latitude: required(latitudes[i], "latitude", i)?,
                    longitude: required(longitudes[i], "longitude", i)?,
                });
            }
        }

        Ok(RawWeatherTable::new(rows))
    }

    fn row_count(&self) -> usize {
        self.len()
    }
}

impl Snapshot for WeatherTable {
    const FILE_NAME: &'static str = CLEANED_WEATHER_SNAPSHOT;

    fn schema() -> SchemaRef {
        weather_schema(&WEATHER_COLUMNS)
    }

    fn to_batch(&self) -> Result<RecordBatch> {
        let rows = &self.rows;
        let batch = RecordBatch::try_new(
            Self::schema(),
            vec![
                timestamp_array(rows.iter().map(|r| r.date)),
                Arc::new(Float32Array::from_iter(rows.iter().map(|r| r.temperature_c))),
                Arc::new(Float32Array::from_iter(
                    rows.iter().map(|r| r.relative_humidity_percentage),
                )),
                Arc::new(Float32Array::from_iter(
                    rows.iter().map(|r| r.precipitation_percentage),
                )),
                Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.latitude))),
                Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.longitude))),
            ],
        )?;
        Ok(batch)
    }

    fn from_batches(batches: &[RecordBatch]) -> Result<Self> {
        let mut rows = Vec::new();

        for batch in batches {
            let dates = timestamp_values(batch, "date")?;
            let temperatures = f32_values(batch, "temperature_c")?;
            let humidities = f32_values(batch, "relative_humidity_percentage")?;
            let precipitation = f32_values(batch, "precipitation_percentage")?;
            let latitudes = f64_values(batch, "latitude")?;
            let longitudes = f64_values(batch, "longitude")?;

            for i in 0..batch.num_rows() {
                rows.push(WeatherRow {
                    date: required(dates[i], "date", i)?,
                    temperature_c: temperatures[i],
                    relative_humidity_percentage: humidities[i],
                    precipitation_percentage: precipitation[i],
                    latitude: required(latitudes[i], "latitude", i)?,
                    longitude: required(longitudes[i], "longitude", i)?,
                });
            }
        }

        Ok(WeatherTable::new(rows))
    }

    fn row_count(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CRAG_COLUMNS;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn crag_row(crag_id: &str, rocktype: Option<RockType>, climbing_type: Option<ClimbingType>) -> CragRow {
        CragRow {
            crag_id: crag_id.to_string(),
            sector_name: "Main Area".to_string(),
            crag_name: Some("Stanage".to_string()),
            county: None,
            country: "England".to_string(),
            rocktype,
            latitude: 53.3617,
            longitude: -1.6281,
            routes_count: 1,
            route_name: Some("Flying Buttress".to_string()),
            climbing_type,
            difficulty_grade: Some("4a".to_string()),
            safety_grade: None,
        }
    }

    #[test]
    fn test_crag_batch_has_index_plus_canonical_columns() -> Result<()> {
        let table = CragTable::new(vec![crag_row("1", Some(RockType::Gritstone), Some(ClimbingType::Trad))]);
        let batch = table.to_batch()?;

        assert_eq!(batch.num_columns(), CRAG_COLUMNS.len() + 1);
        let names: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .skip(1)
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(names, CRAG_COLUMNS.iter().map(|s| s.to_string()).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_categorical_dictionary_holds_full_vocabulary() -> Result<()> {
        let table = CragTable::new(vec![
            crag_row("1", Some(RockType::Limestone), Some(ClimbingType::Sport)),
            crag_row("2", None, Some(ClimbingType::Unknown)),
        ]);
        let batch = table.to_batch()?;

        let rocktypes = batch
            .column_by_name("rocktype")
            .unwrap()
            .as_any()
            .downcast_ref::<DictionaryArray<Int32Type>>()
            .unwrap();
        assert_eq!(rocktypes.values().len(), 37);
        assert!(rocktypes.is_null(1));

        let types = batch
            .column_by_name("type")
            .unwrap()
            .as_any()
            .downcast_ref::<DictionaryArray<Int32Type>>()
            .unwrap();
        assert_eq!(types.values().len(), ClimbingType::MEMBERS.len() + 1);

        let back = CragTable::from_batches(&[batch])?;
        assert_eq!(back, table);
        Ok(())
    }

    #[test]
    fn test_weather_batch_dates_are_utc_micros() -> Result<()> {
        let table = WeatherTable::new(vec![WeatherRow {
            date: Utc.with_ymd_and_hms(2025, 5, 1, 13, 0, 0).unwrap(),
            temperature_c: Some(14.5),
            relative_humidity_percentage: None,
            precipitation_percentage: Some(0.2),
            latitude: 53.3617,
            longitude: -1.6281,
        }]);
        let batch = table.to_batch()?;

        assert_eq!(batch.schema().field(0).data_type(), &utc_timestamp_type());
        assert_eq!(WeatherTable::from_batches(&[batch])?, table);
        Ok(())
    }

    #[test]
    fn test_missing_column_is_snapshot_error() -> Result<()> {
        let table = RawWeatherTable::new(vec![]);
        let batch = table.to_batch()?;
        let result = WeatherTable::from_batches(&[batch]);
        assert!(matches!(result, Err(PipelineError::Snapshot(_))));
        Ok(())
    }
}
