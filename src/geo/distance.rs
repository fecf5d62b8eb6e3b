//! # Distance Calculation
//!
//! Haversine great-circle distance combined with the altitude difference.

/// Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_378_136.0;

/// Distance in meters between two geodetic positions
///
/// The great-circle distance and the altitude delta are treated as the two
/// orthogonal legs of a right triangle, which holds for small separations.
///
/// # Arguments
///
/// * `lat1`, `lng1` - First position in degrees
/// * `alt1` - First altitude in meters
/// * `lat2`, `lng2` - Second position in degrees
/// * `alt2` - Second altitude in meters
///
/// # Returns
///
/// * `f64` - Distance in meters (NaN if any input is NaN)
///
/// # Examples
///
/// ```
/// use spor::geo::distance;
///
/// let d = distance(59.0, 10.0, 0.0, 59.0, 10.0, 3.0);
/// assert!((d - 3.0).abs() < 1e-9);
/// ```
pub fn distance(lat1: f64, lng1: f64, alt1: f64, lat2: f64, lng2: f64, alt2: f64) -> f64 {
    let lat_distance = (lat2 - lat1).to_radians();
    let lng_distance = (lng2 - lng1).to_radians();

    let a = (lat_distance / 2.0).sin() * (lat_distance / 2.0).sin()
        + lat1.to_radians().cos()
            * lat2.to_radians().cos()
            * (lng_distance / 2.0).sin()
            * (lng_distance / 2.0).sin();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    let ground = EARTH_RADIUS_M * c;
    let vertical = alt1 - alt2;

    (ground * ground + vertical * vertical).sqrt()
}
