/// Snapshot file names
pub const EXTRACTED_SNAPSHOT: &str = "extracted.parquet";
pub const TRANSFORMED_SNAPSHOT: &str = "transformed.parquet";
pub const CRAG_SNAPSHOT: &str = "crags.parquet";
pub const WEATHER_SNAPSHOT: &str = "weather.parquet";
pub const CLEANED_WEATHER_SNAPSHOT: &str = "cleaned_weather.parquet";

/// Cleaning rules
pub const EXPECTED_COUNTRY: &str = "England";
pub const DEFAULT_SECTOR_NAME: &str = "Main Area";
pub const PLACEHOLDER_VALUES: [&str; 2] = ["Summit", "summit"];

/// Star schema table and type names
pub const DIM_ROUTES: &str = "dimRoutes";
pub const DIM_WEATHER: &str = "dimHourlyWeatherInfo";
pub const FACT_ROUTE_WEATHER: &str = "fact_hourlyrouteweather";
pub const CLIMBING_TYPE_ENUM: &str = "climbing_type";
pub const ROCKTYPE_ENUM: &str = "rocktype";

/// Decimal places used when matching route and weather coordinates
pub const COORDINATE_JOIN_PRECISION: i32 = 4;

/// Hourly variables requested from the weather provider, in column order
pub const HOURLY_VARIABLES: [&str; 3] = ["temperature_2m", "relative_humidity_2m", "precipitation"];

/// Weather enrichment defaults
pub const DEFAULT_MAX_COORDINATES: usize = 50;
pub const DEFAULT_REQUEST_PAUSE_MS: u64 = 150;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 200;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const OPEN_METEO_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Processing defaults
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;
pub const DEFAULT_SNAPSHOT_DIR: &str = "output/snapshots";
pub const DEFAULT_DATABASE_PATH: &str = "output/crags.duckdb";
pub const FACT_SAMPLE_SIZE: usize = 5;

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
