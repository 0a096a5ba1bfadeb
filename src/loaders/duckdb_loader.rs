use crate::error::{PipelineError, Result};
use crate::loaders::connection::ScopedConnection;
use crate::models::vocabulary::enum_type_sql;
use crate::models::{ClimbingType, CragTable, RockType, WeatherTable};
use crate::utils::constants::{
    CLIMBING_TYPE_ENUM, COORDINATE_JOIN_PRECISION, DIM_ROUTES, DIM_WEATHER, FACT_ROUTE_WEATHER,
    FACT_SAMPLE_SIZE, ROCKTYPE_ENUM,
};
use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

const STAGE_ROUTES: &str = "stage_routes";
const STAGE_WEATHER: &str = "stage_weather";

fn sql_error(context: &'static str) -> impl Fn(duckdb::Error) -> PipelineError {
    move |e| PipelineError::Load(format!("{}: {}", context, e))
}

/// One row of the fact table, as sampled after a load
#[derive(Debug, Clone, PartialEq)]
pub struct FactSample {
    pub route_id: i64,
    pub weather_id: i64,
    pub date: DateTime<Utc>,
    pub relative_humidity_percentage: Option<f32>,
    pub temperature_c: Option<f32>,
    pub precipitation_percentage: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub route_rows: i64,
    pub weather_rows: i64,
    pub fact_rows: i64,
    pub tables: Vec<String>,
    pub sample: Vec<FactSample>,
}

impl LoadReport {
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Star schema loaded:\n\
            - {}: {} rows\n\
            - {}: {} rows\n\
            - {}: {} rows\n\
            - Tables: {}\n",
            DIM_ROUTES,
            self.route_rows,
            DIM_WEATHER,
            self.weather_rows,
            FACT_ROUTE_WEATHER,
            self.fact_rows,
            self.tables.join(", ")
        );

        if !self.sample.is_empty() {
            summary.push_str("\nSample fact rows:\n");
            for row in &self.sample {
                summary.push_str(&format!(
                    "  route {} × weather {} @ {}: {:?}°C, {:?}% RH, {:?}% precip\n",
                    row.route_id,
                    row.weather_id,
                    row.date.format("%Y-%m-%d %H:%M"),
                    row.temperature_c,
                    row.relative_humidity_percentage,
                    row.precipitation_percentage
                ));
            }
        }

        summary
    }
}

/// Materialises the crag and weather tables as a star schema in DuckDB
pub struct StarSchemaLoader {
    database_path: PathBuf,
}

impl StarSchemaLoader {
    pub fn new(database_path: &Path) -> Self {
        Self {
            database_path: database_path.to_path_buf(),
        }
    }

    /// Replace the schema in the database file. The connection is released
    /// before returning, whether or not the load succeeded.
    pub fn load(&self, crags: &CragTable, weather: &WeatherTable) -> Result<LoadReport> {
        let scoped = ScopedConnection::open(&self.database_path)?;

        let loaded = scoped
            .connection()
            .and_then(|conn| Self::load_into(conn, crags, weather));
        let closed = scoped.close();

        let report = loaded?;
        closed?;
        Ok(report)
    }

    /// Load through an already open connection, all-or-nothing
    pub fn load_into(
        conn: &Connection,
        crags: &CragTable,
        weather: &WeatherTable,
    ) -> Result<LoadReport> {
        conn.execute_batch("BEGIN TRANSACTION;")
            .map_err(sql_error("Failed to begin transaction"))?;

        if let Err(e) = Self::build_schema(conn, crags, weather) {
            error!(error = %e, "Star schema load failed, rolling back");
            if let Err(rollback) = conn.execute_batch("ROLLBACK;") {
                error!(error = %rollback, "Rollback failed");
            }
            return Err(e);
        }

        conn.execute_batch("COMMIT;")
            .map_err(sql_error("Failed to commit"))?;

        let report = Self::report(conn)?;
        info!(
            routes = report.route_rows,
            weather = report.weather_rows,
            facts = report.fact_rows,
            "Star schema loaded"
        );
        Ok(report)
    }

    fn build_schema(conn: &Connection, crags: &CragTable, weather: &WeatherTable) -> Result<()> {
        Self::reset(conn)?;
        Self::stage_routes(conn, crags)?;
        Self::stage_weather(conn, weather)?;
        Self::create_dimensions(conn)?;
        Self::create_fact(conn)?;

        conn.execute_batch(&format!(
            "DROP TABLE {}; DROP TABLE {};",
            STAGE_ROUTES, STAGE_WEATHER
        ))
        .map_err(sql_error("Failed to drop staging tables"))?;
        Ok(())
    }

    /// Drop the previous schema and recreate the vocabulary types
    fn reset(conn: &Connection) -> Result<()> {
        let climbing_types: Vec<&str> = ClimbingType::MEMBERS.iter().map(|m| m.as_str()).collect();
        let rocktypes = RockType::categories();

        let sql = format!(
            "DROP TABLE IF EXISTS {fact};
             DROP TABLE IF EXISTS {routes};
             DROP TABLE IF EXISTS {weather};
             DROP TABLE IF EXISTS {stage_routes};
             DROP TABLE IF EXISTS {stage_weather};
             DROP TYPE IF EXISTS \"{rocktype}\";
             DROP TYPE IF EXISTS \"{climbing_type}\";
             {create_climbing_type}
             {create_rocktype}",
            fact = FACT_ROUTE_WEATHER,
            routes = DIM_ROUTES,
            weather = DIM_WEATHER,
            stage_routes = STAGE_ROUTES,
            stage_weather = STAGE_WEATHER,
            rocktype = ROCKTYPE_ENUM,
            climbing_type = CLIMBING_TYPE_ENUM,
            create_climbing_type = enum_type_sql(CLIMBING_TYPE_ENUM, &climbing_types),
            create_rocktype = enum_type_sql(ROCKTYPE_ENUM, &rocktypes),
        );

        conn.execute_batch(&sql)
            .map_err(sql_error("Failed to reset schema"))
    }

    fn stage_routes(conn: &Connection, crags: &CragTable) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE TEMP TABLE {} (
                position BIGINT,
                route_name VARCHAR,
                climbing_type VARCHAR,
                safety_grade VARCHAR,
                difficulty_grade VARCHAR,
                sector_name VARCHAR,
                rocktype VARCHAR,
                longitude DOUBLE,
                latitude DOUBLE,
                routes_count BIGINT,
                country VARCHAR,
                county VARCHAR
            );",
            STAGE_ROUTES
        ))
        .map_err(sql_error("Failed to create route staging table"))?;

        let mut stmt = conn
            .prepare(&format!(
                "INSERT INTO {} VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                STAGE_ROUTES
            ))
            .map_err(sql_error("Failed to prepare route insert"))?;

        for (position, row) in crags.rows.iter().enumerate() {
            stmt.execute(params![
                position as i64,
                row.route_name.as_deref(),
                row.climbing_type.and_then(|t| t.store_value()),
                row.safety_grade.as_deref(),
                row.difficulty_grade.as_deref(),
                row.sector_name.as_str(),
                row.rocktype.map(|t| t.as_str()),
                row.longitude,
                row.latitude,
                row.routes_count,
                row.country.as_str(),
                row.county.as_deref(),
            ])
            .map_err(sql_error("Failed to stage route"))?;
        }

        debug!(rows = crags.len(), "Routes staged");
        Ok(())
    }

    fn stage_weather(conn: &Connection, weather: &WeatherTable) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE TEMP TABLE {} (
                position BIGINT,
                date_us BIGINT,
                precipitation_percentage FLOAT,
                temperature_c FLOAT,
                longitude DOUBLE,
                latitude DOUBLE,
                relative_humidity_percentage FLOAT
            );",
            STAGE_WEATHER
        ))
        .map_err(sql_error("Failed to create weather staging table"))?;

        let mut stmt = conn
            .prepare(&format!(
                "INSERT INTO {} VALUES (?, ?, ?, ?, ?, ?, ?)",
                STAGE_WEATHER
            ))
            .map_err(sql_error("Failed to prepare weather insert"))?;

        for (position, row) in weather.rows.iter().enumerate() {
            stmt.execute(params![
                position as i64,
                row.date.timestamp_micros(),
                row.precipitation_percentage,
                row.temperature_c,
                row.longitude,
                row.latitude,
                row.relative_humidity_percentage,
            ])
            .map_err(sql_error("Failed to stage weather row"))?;
        }

        debug!(rows = weather.len(), "Weather staged");
        Ok(())
    }

    fn create_dimensions(conn: &Connection) -> Result<()> {
        let sql = format!(
            "CREATE TABLE {weather} (
                weather_id BIGINT,
                date TIMESTAMP NOT NULL,
                precipitation_percentage FLOAT,
                temperature_c FLOAT,
                longitude DOUBLE NOT NULL,
                latitude DOUBLE NOT NULL,
                relative_humidity_percentage FLOAT,
                PRIMARY KEY (weather_id)
            );

            INSERT INTO {weather}
            SELECT
                ROW_NUMBER() OVER (ORDER BY position),
                make_timestamp(date_us),
                precipitation_percentage,
                temperature_c,
                longitude,
                latitude,
                relative_humidity_percentage
            FROM {stage_weather};

            CREATE TABLE {routes} (
                route_id BIGINT,
                route_name VARCHAR,
                climbing_type \"{climbing_type}\",
                safety_grade VARCHAR,
                climbing_grade VARCHAR,
                sector_name VARCHAR NOT NULL,
                rocktype \"{rocktype}\",
                longitude DOUBLE NOT NULL,
                latitude DOUBLE NOT NULL,
                route_count BIGINT,
                country VARCHAR,
                county VARCHAR,
                PRIMARY KEY (route_id)
            );

            INSERT INTO {routes}
            SELECT
                ROW_NUMBER() OVER (ORDER BY position),
                route_name,
                CAST(climbing_type AS \"{climbing_type}\"),
                safety_grade,
                difficulty_grade,
                sector_name,
                CAST(rocktype AS \"{rocktype}\"),
                longitude,
                latitude,
                routes_count,
                country,
                county
            FROM {stage_routes};",
            weather = DIM_WEATHER,
            routes = DIM_ROUTES,
            stage_weather = STAGE_WEATHER,
            stage_routes = STAGE_ROUTES,
            climbing_type = CLIMBING_TYPE_ENUM,
            rocktype = ROCKTYPE_ENUM,
        );

        conn.execute_batch(&sql)
            .map_err(sql_error("Failed to create dimension tables"))
    }

    /// Inner join on coordinates rounded to the join precision: routes
    /// without weather coverage get no fact rows
    fn create_fact(conn: &Connection) -> Result<()> {
        let sql = format!(
            "CREATE TABLE {fact} (
                route_id BIGINT REFERENCES {routes} (route_id),
                weather_id BIGINT REFERENCES {weather} (weather_id),
                date TIMESTAMP,
                relative_humidity_percentage FLOAT,
                temperature_c FLOAT,
                precipitation_percentage FLOAT
            );

            INSERT INTO {fact}
            SELECT
                r.route_id,
                w.weather_id,
                w.date,
                w.relative_humidity_percentage,
                w.temperature_c,
                w.precipitation_percentage
            FROM {weather} w
            JOIN {routes} r
              ON ROUND(w.latitude, {p}) = ROUND(r.latitude, {p})
             AND ROUND(w.longitude, {p}) = ROUND(r.longitude, {p});",
            fact = FACT_ROUTE_WEATHER,
            routes = DIM_ROUTES,
            weather = DIM_WEATHER,
            p = COORDINATE_JOIN_PRECISION,
        );

        conn.execute_batch(&sql)
            .map_err(sql_error("Failed to build fact table"))
    }

    fn count(conn: &Connection, table: &str) -> Result<i64> {
        conn.query_row(&format!("SELECT count(*) FROM {}", table), [], |row| row.get(0))
            .map_err(sql_error("Failed to count rows"))
    }

    fn report(conn: &Connection) -> Result<LoadReport> {
        let mut stmt = conn
            .prepare("SHOW TABLES")
            .map_err(sql_error("Failed to list tables"))?;
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(sql_error("Failed to list tables"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(sql_error("Failed to list tables"))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT route_id, weather_id, epoch_us(date),
                        relative_humidity_percentage, temperature_c, precipitation_percentage
                 FROM {}
                 ORDER BY route_id, weather_id
                 LIMIT {}",
                FACT_ROUTE_WEATHER, FACT_SAMPLE_SIZE
            ))
            .map_err(sql_error("Failed to sample fact table"))?;
        let raw_sample = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<f32>>(3)?,
                    row.get::<_, Option<f32>>(4)?,
                    row.get::<_, Option<f32>>(5)?,
                ))
            })
            .map_err(sql_error("Failed to sample fact table"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(sql_error("Failed to sample fact table"))?;

        let sample = raw_sample
            .into_iter()
            .map(|(route_id, weather_id, micros, humidity, temperature, precipitation)| {
                let date = DateTime::from_timestamp_micros(micros).ok_or_else(|| {
                    PipelineError::Load(format!("Fact date {} is out of range", micros))
                })?;
                Ok(FactSample {
                    route_id,
                    weather_id,
                    date,
                    relative_humidity_percentage: humidity,
                    temperature_c: temperature,
                    precipitation_percentage: precipitation,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(LoadReport {
            route_rows: Self::count(conn, DIM_ROUTES)?,
            weather_rows: Self::count(conn, DIM_WEATHER)?,
            fact_rows: Self::count(conn, FACT_ROUTE_WEATHER)?,
            tables,
            sample,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CragRow, WeatherRow};
    use crate::utils::round_to;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn route(name: &str, latitude: f64, longitude: f64) -> CragRow {
        CragRow {
            crag_id: "1".to_string(),
            sector_name: "Main Area".to_string(),
            crag_name: Some("Stanage".to_string()),
            county: Some("Derbyshire".to_string()),
            country: "England".to_string(),
            rocktype: Some(RockType::Gritstone),
            latitude,
            longitude,
            routes_count: 2,
            route_name: Some(name.to_string()),
            climbing_type: Some(ClimbingType::Trad),
            difficulty_grade: Some("4a".to_string()),
            safety_grade: Some("HVD".to_string()),
        }
    }

    fn hour(h: u32, latitude: f64, longitude: f64) -> WeatherRow {
        WeatherRow {
            date: Utc.with_ymd_and_hms(2025, 5, 1, h, 0, 0).unwrap(),
            temperature_c: Some(10.5),
            relative_humidity_percentage: Some(85.0),
            precipitation_percentage: Some(0.0),
            latitude,
            longitude,
        }
    }

    fn reopen(path: &Path) -> Connection {
        Connection::open(path).unwrap()
    }

    #[test]
    fn test_rounded_coordinate_join() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("crags.duckdb");

        let crags = CragTable::new(vec![
            route("Flying Buttress", 53.12341, -1.5),
            route("Quietus", 53.1235, -1.6),
        ]);
        let weather = WeatherTable::new(vec![
            hour(0, 53.12344, -1.5),
            hour(1, 53.12344, -1.5),
            hour(0, 53.1234, -1.6),
        ]);

        let report = StarSchemaLoader::new(&path).load(&crags, &weather)?;

        assert_eq!(report.route_rows, 2);
        assert_eq!(report.weather_rows, 3);
        // Only the first route collides after rounding
        assert_eq!(
            round_to(53.12341, COORDINATE_JOIN_PRECISION),
            round_to(53.12344, COORDINATE_JOIN_PRECISION)
        );
        assert_ne!(
            round_to(53.1235, COORDINATE_JOIN_PRECISION),
            round_to(53.1234, COORDINATE_JOIN_PRECISION)
        );
        assert_eq!(report.fact_rows, 2);
        assert!(report.sample.iter().all(|r| r.route_id == 1));
        assert_eq!(
            report.sample[0].date,
            Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap()
        );
        let mut tables = report.tables.clone();
        tables.sort();
        assert_eq!(
            tables,
            vec![
                "dimHourlyWeatherInfo".to_string(),
                "dimRoutes".to_string(),
                "fact_hourlyrouteweather".to_string()
            ]
        );

        let conn = reopen(&path);
        let unmatched: i64 = conn
            .query_row(
                "SELECT count(*) FROM fact_hourlyrouteweather WHERE route_id = 2",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(unmatched, 0);
        let nulls: i64 = conn
            .query_row(
                "SELECT count(*) FROM fact_hourlyrouteweather WHERE weather_id IS NULL OR route_id IS NULL",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(nulls, 0);
        Ok(())
    }

    #[test]
    fn test_reload_replaces_previous_schema() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("crags.duckdb");
        let loader = StarSchemaLoader::new(&path);

        let crags = CragTable::new(vec![route("Flying Buttress", 53.1234, -1.5)]);
        let weather = WeatherTable::new(vec![hour(0, 53.1234, -1.5)]);

        loader.load(&crags, &weather)?;
        let second = loader.load(&crags, &weather)?;

        assert_eq!(second.route_rows, 1);
        assert_eq!(second.fact_rows, 1);
        Ok(())
    }

    #[test]
    fn test_failed_reload_keeps_previous_schema() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("crags.duckdb");
        let loader = StarSchemaLoader::new(&path);

        let crags = CragTable::new(vec![
            route("Flying Buttress", 53.1234, -1.5),
            route("Inverted V", 53.1234, -1.5),
        ]);
        let weather = WeatherTable::new(vec![hour(0, 53.1234, -1.5), hour(1, 53.1234, -1.5)]);
        loader.load(&crags, &weather)?;

        // A foreign key from another table blocks dropping dimRoutes during the reset
        let conn = reopen(&path);
        conn.execute_batch(
            "CREATE TABLE notes (route_id BIGINT REFERENCES dimRoutes(route_id));
             INSERT INTO notes VALUES (1);",
        )
        .unwrap();
        drop(conn);

        let replacement = CragTable::new(vec![route("Quietus", 53.1234, -1.5)]);
        let result = loader.load(&replacement, &WeatherTable::default());
        assert!(matches!(result, Err(PipelineError::Load(_))));

        let conn = reopen(&path);
        let count = |table: &str| -> i64 {
            conn.query_row(&format!("SELECT count(*) FROM {}", table), [], |row| row.get(0))
                .unwrap()
        };
        assert_eq!(count(DIM_ROUTES), 2);
        assert_eq!(count(DIM_WEATHER), 2);
        assert_eq!(count(FACT_ROUTE_WEATHER), 4);
        conn.execute_batch("DROP TABLE notes;").unwrap();
        drop(conn);

        let report = loader.load(&replacement, &WeatherTable::default())?;
        assert_eq!(report.route_rows, 1);
        assert_eq!(report.fact_rows, 0);
        Ok(())
    }

    #[test]
    fn test_vocabulary_enforced_in_store() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("crags.duckdb");

        let mut unknown = route("Highball", 53.1234, -1.5);
        unknown.climbing_type = Some(ClimbingType::Unknown);
        unknown.rocktype = Some(RockType::Unknown);
        let crags = CragTable::new(vec![route("Flying Buttress", 53.1234, -1.5), unknown]);

        StarSchemaLoader::new(&path).load(&crags, &WeatherTable::default())?;

        let conn = reopen(&path);
        let (climbing_type, rocktype): (Option<String>, Option<String>) = conn
            .query_row(
                "SELECT CAST(climbing_type AS VARCHAR), CAST(rocktype AS VARCHAR)
                 FROM dimRoutes WHERE route_id = 2",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(climbing_type, None);
        assert_eq!(rocktype.as_deref(), Some("UNKNOWN"));

        let members: i64 = conn
            .query_row(
                "SELECT len(enum_range(NULL::climbing_type))",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(members, 13);
        Ok(())
    }

    #[test]
    fn test_unopenable_database_is_load_error() -> Result<()> {
        let dir = TempDir::new()?;
        // A directory cannot be opened as a database file
        let result = StarSchemaLoader::new(dir.path()).load(&CragTable::default(), &WeatherTable::default());
        assert!(matches!(result, Err(PipelineError::Load(_))));
        Ok(())
    }
}
