use crate::error::{PipelineError, Result};

/// Round a coordinate to a fixed number of decimal places.
///
/// Matches the half-away-from-zero rounding the store applies with `ROUND`.
///
/// # Examples
/// ```
/// use crag_etl::utils::round_to;
///
/// assert_eq!(round_to(53.123_41, 4), 53.1234);
/// assert_eq!(round_to(-1.567_89, 2), -1.57);
/// ```
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Exact identity of a coordinate pair, usable as a hash key.
///
/// `-0.0` and `0.0` compare equal as floats, so both are folded onto the
/// same key.
pub fn coordinate_key(latitude: f64, longitude: f64) -> (u64, u64) {
    let normalise = |v: f64| if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() };
    (normalise(latitude), normalise(longitude))
}

/// Parse a coordinate held as text in the source catalogue
pub fn parse_coordinate(coord_str: &str) -> Result<f64> {
    let trimmed = coord_str.trim();
    trimmed.parse::<f64>().map_err(|_| {
        PipelineError::InvalidFormat(format!("Invalid coordinate value: '{}'", coord_str))
    })
}
