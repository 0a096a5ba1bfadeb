pub mod enricher;
pub mod open_meteo;
pub mod provider;

pub use enricher::{CoordinateOutcome, EnrichmentResult, WeatherEnricher};
pub use open_meteo::OpenMeteoClient;
pub use provider::WeatherProvider;
