//! Time-related utility functions.
//!
//! This module provides the single wall-clock helper used for timestamping
//! persisted records, so every component measures expiry against the same
//! epoch.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as milliseconds since the Unix epoch.
///
/// Persisted records (`CalibrationRecord`, `LastMatch`) carry epoch
/// milliseconds rather than `Instant` so they survive process restarts.
///
/// # Example
///
/// ```
/// use sitefence::time::epoch_millis;
///
/// let now = epoch_millis();
/// assert!(now > 0);
/// ```
pub fn epoch_millis() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as u64,
        Err(_) => 0, // Clock before epoch, saturate at the origin
    }
}
