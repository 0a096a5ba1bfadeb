pub mod constants;
pub mod coordinates;
pub mod logging;
pub mod progress;

pub use constants::*;
pub use coordinates::{coordinate_key, round_to};
pub use logging::init_logging;
pub use progress::ProgressReporter;
