//! Accuracy-adaptive acceptance radius.
//!
//! A poor fix must not be compared against the bare site radius, or real
//! attendance at the site edge fails whenever GPS degrades. Expanding the
//! radius without bound is worse. The rule here widens the radius in two
//! accuracy bands and caps each band both multiplicatively and additively,
//! so a 500 m-radius campus cannot balloon into a kilometer.

/// Tunables for the adaptive radius rule.
///
/// Upstream deployments disagreed on these thresholds, so they are
/// configuration rather than constants.
#[derive(Debug, Clone)]
pub struct RadiusConfig {
    /// Accuracy at or below which the fix is trusted and the base radius
    /// applies unchanged.
    pub trusted_accuracy_meters: f64,

    /// Accuracy at or below which the degraded expansion applies; beyond
    /// it the poor expansion applies.
    pub degraded_accuracy_meters: f64,

    /// Multiplier for the degraded band.
    pub degraded_multiplier: f64,

    /// Additive cap for the degraded band, in meters over the base radius.
    pub degraded_cap_meters: f64,

    /// Multiplier for the poor band.
    pub poor_multiplier: f64,

    /// Additive cap for the poor band, in meters over the base radius.
    pub poor_cap_meters: f64,
}

impl Default for RadiusConfig {
    fn default() -> Self {
        Self {
            trusted_accuracy_meters: 15.0,
            degraded_accuracy_meters: 35.0,
            degraded_multiplier: 1.5,
            degraded_cap_meters: 100.0,
            poor_multiplier: 2.0,
            poor_cap_meters: 200.0,
        }
    }
}

impl RadiusConfig {
    /// Effective acceptance radius for a site given the fix accuracy.
    ///
    /// Never smaller than `base_radius_meters`.
    pub fn applied_radius(&self, base_radius_meters: f64, accuracy_meters: f64) -> f64 {
        if accuracy_meters <= self.trusted_accuracy_meters {
            base_radius_meters
        } else if accuracy_meters <= self.degraded_accuracy_meters {
            (base_radius_meters * self.degraded_multiplier)
                .min(base_radius_meters + self.degraded_cap_meters)
        } else {
            (base_radius_meters * self.poor_multiplier)
                .min(base_radius_meters + self.poor_cap_meters)
        }
    }
}
