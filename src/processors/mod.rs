pub mod cleaner;
pub mod integrity_checker;
pub mod transformer;
pub mod weather_cleaner;

pub use cleaner::{split_grade, CleanReport, Cleaner};
pub use integrity_checker::{ExpectationChecker, ExpectationReport, ExpectationResult};
pub use transformer::Transformer;
pub use weather_cleaner::{WeatherCleaner, WEATHER_RENAMES};
