//! Geofence resolution.
//!
//! Decides which registered site, if any, a position sample falls in.
//! Each active geofence is evaluated independently: the fence's own
//! calibration offset is applied to the raw sample, the haversine distance
//! to the fence center is computed, and the acceptance radius is widened
//! according to fix accuracy ([`RadiusConfig`]). Among fences that contain
//! the sample the closest one wins; when none do, the closest fence is
//! still reported so the caller can say "you are 42 m from Site B".
//!
//! Calibration records reach [`resolve`] pre-filtered: the store drops
//! expired ones on read, so everything in the map is applicable.

use std::collections::HashMap;

use crate::calibration::CalibrationRecord;
use crate::geo::distance_meters;
use crate::position::LocationSample;

mod radius;
mod types;

pub use radius::RadiusConfig;
pub use types::{ClosestCandidate, Geofence, ResolutionOutcome};

#[derive(Clone, Copy)]
struct Candidate<'a> {
    geofence: &'a Geofence,
    distance_meters: f64,
    applied_radius_meters: f64,
    calibration_applied: bool,
}

/// Resolve a sample against the registered geofences.
///
/// `calibrations` is keyed by geofence id; a fence with a record is
/// evaluated at the offset-corrected position with the tighter of the two
/// accuracies (`min(sample, achieved)`), each fence independently.
pub fn resolve(
    sample: &LocationSample,
    geofences: &[Geofence],
    calibrations: &HashMap<String, CalibrationRecord>,
    config: &RadiusConfig,
) -> ResolutionOutcome {
    let mut best_match: Option<Candidate> = None;
    let mut closest: Option<Candidate> = None;

    for geofence in geofences.iter().filter(|g| g.active) {
        let candidate = evaluate(sample, geofence, calibrations.get(&geofence.id), config);

        if closest.is_none_or(|c| candidate.distance_meters < c.distance_meters) {
            closest = Some(candidate);
        }
        if candidate.distance_meters <= candidate.applied_radius_meters
            && best_match.is_none_or(|m| candidate.distance_meters < m.distance_meters)
        {
            best_match = Some(candidate);
        }
    }

    match best_match {
        Some(m) => ResolutionOutcome::Matched {
            geofence: m.geofence.clone(),
            distance_meters: m.distance_meters,
            applied_radius_meters: m.applied_radius_meters,
            calibration_applied: m.calibration_applied,
        },
        None => ResolutionOutcome::NoMatch {
            closest: closest.map(|c| ClosestCandidate {
                geofence: c.geofence.clone(),
                distance_meters: c.distance_meters,
            }),
        },
    }
}

fn evaluate<'a>(
    sample: &LocationSample,
    geofence: &'a Geofence,
    record: Option<&CalibrationRecord>,
    config: &RadiusConfig,
) -> Candidate<'a> {
    let (position, accuracy_meters, calibration_applied) = match record {
        Some(record) => (
            record.apply_to(sample.coordinate()),
            sample.accuracy_meters.min(record.achieved_accuracy_meters),
            true,
        ),
        None => (sample.coordinate(), sample.accuracy_meters, false),
    };

    Candidate {
        geofence,
        distance_meters: distance_meters(position, geofence.coordinate()),
        applied_radius_meters: config.applied_radius(geofence.base_radius_meters, accuracy_meters),
        calibration_applied,
    }
}
