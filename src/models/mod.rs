pub mod crag;
pub mod raw;
pub mod route;
pub mod vocabulary;
pub mod weather;

pub use crag::{CragRow, CragTable, CRAG_COLUMNS, CRAG_INDEX_COLUMN};
pub use raw::{CragRecord, ExtractedTable, RouteRecord, RoutesBlock, EXTRACTED_COLUMNS};
pub use route::{FlatRouteRow, TransformedTable, TRANSFORMED_COLUMNS};
pub use vocabulary::{ClimbingType, RockType};
pub use weather::{
    Coordinate, HourlyForecast, RawWeatherRow, RawWeatherTable, WeatherRow, WeatherTable,
    RAW_WEATHER_COLUMNS, WEATHER_COLUMNS,
};
