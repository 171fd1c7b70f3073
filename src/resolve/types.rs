//! Geofence and resolution outcome types.

use crate::geo::Coordinate;

/// A registered work site: a named circle on the map.
///
/// Owned by the external site registry; the engine only reads these.
#[derive(Debug, Clone, PartialEq)]
pub struct Geofence {
    /// Registry identifier, also the calibration key.
    pub id: String,

    /// Human-readable site name, used in feedback messages.
    pub name: String,

    /// Registered center latitude in degrees.
    pub latitude: f64,

    /// Registered center longitude in degrees.
    pub longitude: f64,

    /// Acceptance radius before accuracy adaptation, in meters.
    pub base_radius_meters: f64,

    /// Inactive sites are skipped during resolution.
    pub active: bool,
}

impl Geofence {
    /// Create an active geofence.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        base_radius_meters: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            latitude,
            longitude,
            base_radius_meters,
            active: true,
        }
    }

    /// Set the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Center of the geofence.
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// The nearest site when nothing matched, for "get closer" feedback.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosestCandidate {
    pub geofence: Geofence,
    pub distance_meters: f64,
}

/// Result of resolving a sample against the registered geofences.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    /// The sample falls inside at least one geofence; this is the closest.
    Matched {
        geofence: Geofence,
        distance_meters: f64,
        applied_radius_meters: f64,
        calibration_applied: bool,
    },

    /// No geofence contains the sample.
    NoMatch {
        /// Nearest active site regardless of radius, absent only when no
        /// active geofences were supplied.
        closest: Option<ClosestCandidate>,
    },
}

impl ResolutionOutcome {
    /// Whether the sample matched a geofence.
    pub fn is_match(&self) -> bool {
        matches!(self, ResolutionOutcome::Matched { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geofence_new_is_active() {
        let fence = Geofence::new("hq", "Headquarters", 50.0, 8.0, 75.0);
        assert!(fence.active);
        assert_eq!(fence.coordinate(), Coordinate::new(50.0, 8.0));
    }

    #[test]
    fn test_with_active_false() {
        let fence = Geofence::new("hq", "Headquarters", 50.0, 8.0, 75.0).with_active(false);
        assert!(!fence.active);
    }

    #[test]
    fn test_outcome_is_match() {
        let matched = ResolutionOutcome::Matched {
            geofence: Geofence::new("hq", "HQ", 0.0, 0.0, 50.0),
            distance_meters: 10.0,
            applied_radius_meters: 50.0,
            calibration_applied: false,
        };
        assert!(matched.is_match());
        assert!(!ResolutionOutcome::NoMatch { closest: None }.is_match());
    }
}
