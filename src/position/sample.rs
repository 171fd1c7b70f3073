//! Core sample type for position acquisition.

use std::time::Duration;

use crate::geo::Coordinate;
use crate::time::epoch_millis;

/// A single GPS fix with its quality metadata.
///
/// Samples are immutable once created and are never persisted. Everything
/// downstream (resolution, calibration, confidence scoring) treats
/// `accuracy_meters` as the authoritative quality signal: it is the radius
/// within which the true position lies with ~68% probability, so lower is
/// better.
///
/// # Timestamp
///
/// `captured_at_ms` is wall-clock epoch milliseconds rather than a monotonic
/// instant because freshness is compared against values that may cross an
/// app suspend/resume boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSample {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,

    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,

    /// Estimated accuracy radius in meters (lower is better).
    pub accuracy_meters: f64,

    /// When this fix was captured, as epoch milliseconds.
    pub captured_at_ms: u64,

    /// Altitude above sea level in meters, if the hardware reported one.
    pub altitude_meters: Option<f64>,

    /// Direction of travel in degrees (0-360), if moving.
    pub heading_degrees: Option<f64>,

    /// Ground speed in meters per second, if moving.
    pub speed_mps: Option<f64>,
}

impl LocationSample {
    /// Create a sample captured now, with no vector data.
    ///
    /// # Arguments
    ///
    /// * `latitude` - Latitude in degrees
    /// * `longitude` - Longitude in degrees
    /// * `accuracy_meters` - Estimated accuracy radius in meters
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters,
            captured_at_ms: epoch_millis(),
            altitude_meters: None,
            heading_degrees: None,
            speed_mps: None,
        }
    }

    /// Override the capture timestamp.
    pub fn with_captured_at_ms(mut self, captured_at_ms: u64) -> Self {
        self.captured_at_ms = captured_at_ms;
        self
    }

    /// Attach an altitude reading.
    pub fn with_altitude_meters(mut self, altitude_meters: f64) -> Self {
        self.altitude_meters = Some(altitude_meters);
        self
    }

    /// Attach heading and speed vector data.
    pub fn with_vectors(mut self, heading_degrees: f64, speed_mps: f64) -> Self {
        self.heading_degrees = Some(heading_degrees);
        self.speed_mps = Some(speed_mps);
        self
    }

    /// The horizontal position of this fix.
    #[inline]
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Age of this fix relative to `now_ms`, saturating at zero.
    pub fn age(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.captured_at_ms))
    }

    /// Check if this fix is older than `max_age` relative to `now_ms`.
    pub fn is_stale(&self, now_ms: u64, max_age: Duration) -> bool {
        self.age(now_ms) > max_age
    }

    /// Returns true if this fix has a tighter accuracy radius than `other`.
    #[inline]
    pub fn is_more_accurate_than(&self, other: &Self) -> bool {
        self.accuracy_meters < other.accuracy_meters
    }
}

impl std::fmt::Display for LocationSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:.6}, {:.6}) ±{:.0}m",
            self.latitude, self.longitude, self.accuracy_meters
        )
    }
}
