//! Sample selection and weighted centroid math.
//!
//! Pure functions over collected samples. The selection rule compensates
//! for GPS warm-up: the first fixes of a session are routinely the worst,
//! so with enough samples the two loosest are discarded outright before
//! the best five are kept.

use crate::geo::Coordinate;
use crate::position::LocationSample;

/// Most samples a centroid is ever computed from.
const KEEP_LIMIT: usize = 5;

/// With more samples than this, the two worst are dropped first.
const OUTLIER_DROP_THRESHOLD: usize = 5;

/// Weights blow up as accuracy approaches zero, clamp the divisor.
const ACCURACY_FLOOR_M: f64 = 0.5;

/// Reduce a session's samples to the set the centroid is computed from.
///
/// Returns samples sorted best-accuracy-first. With more than
/// `OUTLIER_DROP_THRESHOLD` samples the two least accurate are discarded,
/// then at most `KEEP_LIMIT` of the best remain.
pub fn select_samples(mut samples: Vec<LocationSample>) -> Vec<LocationSample> {
    samples.sort_by(|a, b| {
        a.accuracy_meters
            .partial_cmp(&b.accuracy_meters)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if samples.len() > OUTLIER_DROP_THRESHOLD {
        samples.truncate(samples.len() - 2);
    }
    samples.truncate(KEEP_LIMIT);
    samples
}

/// Confidence-weighted centroid of the given samples.
///
/// Each sample is weighted by the inverse square of its accuracy, so a 10m
/// fix pulls four times harder than a 20m fix. Returns `None` for an empty
/// slice.
pub fn weighted_centroid(samples: &[LocationSample]) -> Option<Coordinate> {
    if samples.is_empty() {
        return None;
    }

    let mut weight_sum = 0.0;
    let mut latitude_sum = 0.0;
    let mut longitude_sum = 0.0;

    for sample in samples {
        let accuracy = sample.accuracy_meters.max(ACCURACY_FLOOR_M);
        let weight = 1.0 / (accuracy * accuracy);
        weight_sum += weight;
        latitude_sum += sample.latitude * weight;
        longitude_sum += sample.longitude * weight;
    }

    Some(Coordinate::new(
        latitude_sum / weight_sum,
        longitude_sum / weight_sum,
    ))
}
