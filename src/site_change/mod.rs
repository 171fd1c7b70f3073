//! Relocation detection for multi-site workers.
//!
//! Remembers the last successfully matched site and the raw coordinate it
//! was matched from. When a new validation matches a different site, or
//! the raw position has moved far from the remembered one even at the same
//! site, the result is flagged as a relocation so the portal can show
//! "you moved from Site A to Site B" instead of treating the worker as an
//! anomaly. Advisory only; it never blocks acceptance.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::geo::{distance_meters, Coordinate};
use crate::store::{KeyValueBackend, StoreError};
use crate::time::epoch_millis;

const KEY_PREFIX: &str = "last-match/";

/// The last accepted validation, as remembered across calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastMatch {
    /// Site that matched.
    pub geofence_id: String,

    /// Raw (uncalibrated) latitude the match was made from.
    pub latitude: f64,

    /// Raw (uncalibrated) longitude the match was made from.
    pub longitude: f64,

    /// When the match was recorded, epoch milliseconds.
    pub matched_at_ms: u64,
}

impl LastMatch {
    /// Record a match at the given raw position, stamped now.
    pub fn new(geofence_id: impl Into<String>, raw_position: Coordinate) -> Self {
        Self {
            geofence_id: geofence_id.into(),
            latitude: raw_position.latitude,
            longitude: raw_position.longitude,
            matched_at_ms: epoch_millis(),
        }
    }

    /// Raw position the match was made from.
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Whether a new match constitutes a relocation relative to the previous
/// one.
///
/// True when the site id differs, or when the raw position has drifted
/// more than `displacement_threshold_meters` from the remembered one even
/// for the same site. The threshold separates genuine movement from GPS
/// jitter between readings.
pub fn detect_change(
    previous: &LastMatch,
    matched_id: &str,
    raw_position: Coordinate,
    displacement_threshold_meters: f64,
) -> bool {
    if previous.geofence_id != matched_id {
        return true;
    }
    distance_meters(previous.coordinate(), raw_position) > displacement_threshold_meters
}

/// Persistence facade for the last-match record, one key per scope.
///
/// Scope is the caller's notion of identity (user id, device id); each
/// scope tracks its own relocation history under `last-match/<scope>`.
#[derive(Clone)]
pub struct LastMatchStore {
    backend: Arc<dyn KeyValueBackend>,
    key: String,
}

impl LastMatchStore {
    /// Create a store for one scope over the given backend.
    pub fn new(backend: Arc<dyn KeyValueBackend>, scope: &str) -> Self {
        Self {
            backend,
            key: format!("{KEY_PREFIX}{scope}"),
        }
    }

    /// Read the remembered match, if any.
    ///
    /// An undecodable record is evicted and treated as absent; relocation
    /// history is re-learnable and not worth failing a validation over.
    pub async fn get(&self) -> Result<Option<LastMatch>, StoreError> {
        let Some(bytes) = self.backend.get(&self.key).await? else {
            return Ok(None);
        };
        match serde_json::from_slice::<LastMatch>(&bytes) {
            Ok(last) => Ok(Some(last)),
            Err(error) => {
                warn!(key = %self.key, %error, "Discarding undecodable last-match record");
                self.backend.delete(&self.key).await?;
                Ok(None)
            }
        }
    }

    /// Overwrite the remembered match.
    pub async fn put(&self, last: &LastMatch) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(last)?;
        self.backend.put(&self.key, bytes).await?;
        debug!(key = %self.key, geofence_id = %last.geofence_id, "Recorded last match");
        Ok(())
    }
}
