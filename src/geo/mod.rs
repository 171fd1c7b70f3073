//! Geographic coordinate math for geofence evaluation.
//!
//! Distance calculations use a spherical earth approximation, which is
//! accurate to well under 1% at geofence scale (tens of meters to a few
//! kilometers).
//!
//! # Coordinate System
//!
//! - Latitude: degrees north (-90 to 90)
//! - Longitude: degrees east (-180 to 180)
//! - Distance: meters

use std::f64::consts::PI;

/// Earth's mean radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Degrees to radians conversion factor.
const DEG_TO_RAD: f64 = PI / 180.0;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    /// Latitude in degrees north.
    pub latitude: f64,
    /// Longitude in degrees east.
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate from latitude and longitude in degrees.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Return this coordinate shifted by the given deltas in degrees.
    ///
    /// Used to apply a calibration offset to a raw fix. Offsets at geofence
    /// scale are tiny fractions of a degree, so no wrapping or clamping is
    /// performed.
    #[inline]
    pub fn offset_by(&self, delta_latitude: f64, delta_longitude: f64) -> Self {
        Self {
            latitude: self.latitude + delta_latitude,
            longitude: self.longitude + delta_longitude,
        }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Calculate the great-circle distance between two positions.
///
/// Uses the haversine formula, which is numerically stable for the short
/// distances geofencing cares about.
///
/// # Arguments
///
/// * `from` - First position
/// * `to` - Second position
///
/// # Returns
///
/// Distance in meters.
///
/// # Example
///
/// ```
/// use sitefence::geo::{distance_meters, Coordinate};
///
/// // 1 degree of latitude is approximately 111.2 km
/// let dist = distance_meters(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));
/// assert!((dist - 111_195.0).abs() < 100.0);
/// ```
#[inline]
pub fn distance_meters(from: Coordinate, to: Coordinate) -> f64 {
    let lat1_rad = from.latitude * DEG_TO_RAD;
    let lat2_rad = to.latitude * DEG_TO_RAD;
    let delta_lat = (to.latitude - from.latitude) * DEG_TO_RAD;
    let delta_lon = (to.longitude - from.longitude) * DEG_TO_RAD;

    // Haversine formula
    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== distance_meters tests ====================

    #[test]
    fn test_distance_zero_for_identical_points() {
        let point = Coordinate::new(53.5511, 9.9937);
        let dist = distance_meters(point, point);

        assert!(
            dist.abs() < 0.001,
            "Same point should have zero distance, got {}",
            dist
        );
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        // 1 degree of latitude is ~111,195m on a 6,371km sphere
        let dist = distance_meters(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));

        assert!(
            (dist - 111_195.0).abs() < 100.0,
            "1° lat should be ~111,195m, got {}",
            dist
        );
    }

    #[test]
    fn test_distance_symmetry() {
        let a = Coordinate::new(53.5511, 9.9937);
        let b = Coordinate::new(53.5600, 10.0100);

        let dist_ab = distance_meters(a, b);
        let dist_ba = distance_meters(b, a);

        assert!(
            (dist_ab - dist_ba).abs() < 0.001,
            "Distance should be symmetric"
        );
    }

    #[test]
    fn test_distance_hamburg_to_berlin() {
        // Hamburg to Berlin is approximately 255km
        let hamburg = Coordinate::new(53.5511, 9.9937);
        let berlin = Coordinate::new(52.5200, 13.4050);
        let dist = distance_meters(hamburg, berlin);

        assert!(
            (dist - 255_000.0).abs() < 2_600.0,
            "Expected ~255km within 1%, got {}",
            dist
        );
    }

    #[test]
    fn test_distance_short_range_accuracy() {
        // A fix 100m north of a site, constructed from the degree equivalent
        let site = Coordinate::new(47.3769, 8.5417);
        let fix = site.offset_by(100.0 / 111_195.0, 0.0);
        let dist = distance_meters(site, fix);

        assert!(
            (dist - 100.0).abs() < 1.0,
            "Expected ~100m within 1%, got {}",
            dist
        );
    }

    #[test]
    fn test_distance_five_kilometers() {
        let start = Coordinate::new(53.5511, 9.9937);
        let end = start.offset_by(5_000.0 / 111_195.0, 0.0);
        let dist = distance_meters(start, end);

        assert!(
            (dist - 5_000.0).abs() < 50.0,
            "Expected ~5km within 1%, got {}",
            dist
        );
    }

    // ==================== Coordinate tests ====================

    #[test]
    fn test_offset_by_zero_is_identity() {
        let point = Coordinate::new(53.5511, 9.9937);
        let shifted = point.offset_by(0.0, 0.0);

        assert_eq!(point, shifted);
    }

    #[test]
    fn test_offset_by_applies_both_deltas() {
        let point = Coordinate::new(10.0, 20.0);
        let shifted = point.offset_by(0.001, -0.002);

        assert!((shifted.latitude - 10.001).abs() < 1e-12);
        assert!((shifted.longitude - 19.998).abs() < 1e-12);
    }

    #[test]
    fn test_from_tuple() {
        let point: Coordinate = (53.5511, 9.9937).into();

        assert_eq!(point.latitude, 53.5511);
        assert_eq!(point.longitude, 9.9937);
    }

    #[test]
    fn test_display_format() {
        let point = Coordinate::new(53.5511, 9.9937);
        let text = format!("{}", point);

        assert_eq!(text, "(53.551100, 9.993700)");
    }
}
