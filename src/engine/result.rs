//! Validation result types.

use crate::position::{LocationSample, PositionError};
use crate::resolve::{ClosestCandidate, Geofence};

/// Why a validation ended the way it did.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationReason {
    /// Inside a site with sufficient confidence.
    Accepted,

    /// The hardware produced no usable fix.
    HardwareFailure(PositionError),

    /// Fix accuracy exceeded the ceiling; resolution was skipped.
    AccuracyRejected {
        accuracy_meters: f64,
        ceiling_meters: f64,
    },

    /// No registered site contains the fix.
    NoSiteMatch,

    /// A site matched but the blended confidence fell short.
    BelowConfidence { confidence: f64, threshold: f64 },
}

impl ValidationReason {
    /// Actionable guidance for the person holding the device.
    pub fn hint(&self) -> &'static str {
        match self {
            ValidationReason::Accepted => "You are checked in at this site",
            ValidationReason::HardwareFailure(error) => error.hint(),
            ValidationReason::AccuracyRejected { .. } => {
                "GPS accuracy is too poor right now; move away from buildings or calibrate at your site"
            }
            ValidationReason::NoSiteMatch => "You are not within any registered work site",
            ValidationReason::BelowConfidence { .. } => {
                "Your position is too uncertain to confirm; move closer to the site center"
            }
        }
    }
}

/// Outcome of one validation call.
///
/// `matched_geofence` is present when `accepted`, and also on rejections
/// that can name a candidate site for feedback (the closest fence on
/// [`ValidationReason::NoSiteMatch`], the matched-but-uncertain fence on
/// [`ValidationReason::BelowConfidence`]); `accepted` disambiguates.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub accepted: bool,
    pub reason: ValidationReason,

    /// The fix the decision was made from; absent on hardware failure.
    pub sample: Option<LocationSample>,

    pub matched_geofence: Option<Geofence>,
    pub distance_meters: Option<f64>,
    pub applied_radius_meters: Option<f64>,

    /// Blended confidence, 0..=1. Quality-only when nothing matched.
    pub confidence: f64,

    pub calibration_applied: bool,

    /// Whether this acceptance looks like a relocation from the previous
    /// accepted site. Advisory; never blocks acceptance.
    pub site_changed: bool,
    pub previous_geofence_id: Option<String>,
}

impl ValidationResult {
    pub(super) fn hardware_failure(error: PositionError) -> Self {
        Self {
            accepted: false,
            reason: ValidationReason::HardwareFailure(error),
            sample: None,
            matched_geofence: None,
            distance_meters: None,
            applied_radius_meters: None,
            confidence: 0.0,
            calibration_applied: false,
            site_changed: false,
            previous_geofence_id: None,
        }
    }

    pub(super) fn accuracy_rejected(
        sample: LocationSample,
        ceiling_meters: f64,
        confidence: f64,
    ) -> Self {
        Self {
            accepted: false,
            reason: ValidationReason::AccuracyRejected {
                accuracy_meters: sample.accuracy_meters,
                ceiling_meters,
            },
            sample: Some(sample),
            matched_geofence: None,
            distance_meters: None,
            applied_radius_meters: None,
            confidence,
            calibration_applied: false,
            site_changed: false,
            previous_geofence_id: None,
        }
    }

    pub(super) fn no_match(
        sample: LocationSample,
        closest: Option<ClosestCandidate>,
        confidence: f64,
    ) -> Self {
        let (matched_geofence, distance_meters) = match closest {
            Some(c) => (Some(c.geofence), Some(c.distance_meters)),
            None => (None, None),
        };
        Self {
            accepted: false,
            reason: ValidationReason::NoSiteMatch,
            sample: Some(sample),
            matched_geofence,
            distance_meters,
            applied_radius_meters: None,
            confidence,
            calibration_applied: false,
            site_changed: false,
            previous_geofence_id: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn below_confidence(
        sample: LocationSample,
        geofence: Geofence,
        distance_meters: f64,
        applied_radius_meters: f64,
        calibration_applied: bool,
        confidence: f64,
        threshold: f64,
    ) -> Self {
        Self {
            accepted: false,
            reason: ValidationReason::BelowConfidence {
                confidence,
                threshold,
            },
            sample: Some(sample),
            matched_geofence: Some(geofence),
            distance_meters: Some(distance_meters),
            applied_radius_meters: Some(applied_radius_meters),
            confidence,
            calibration_applied,
            site_changed: false,
            previous_geofence_id: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn accepted(
        sample: LocationSample,
        geofence: Geofence,
        distance_meters: f64,
        applied_radius_meters: f64,
        calibration_applied: bool,
        confidence: f64,
        site_changed: bool,
        previous_geofence_id: Option<String>,
    ) -> Self {
        Self {
            accepted: true,
            reason: ValidationReason::Accepted,
            sample: Some(sample),
            matched_geofence: Some(geofence),
            distance_meters: Some(distance_meters),
            applied_radius_meters: Some(applied_radius_meters),
            confidence,
            calibration_applied,
            site_changed,
            previous_geofence_id,
        }
    }
}
