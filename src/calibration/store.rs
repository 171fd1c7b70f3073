//! Typed persistence facade for calibration records.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::store::{KeyValueBackend, StoreError};

use super::types::CalibrationRecord;

/// Key prefix for calibration records in the key-value backend.
const KEY_PREFIX: &str = "calibration/";

/// Reads and writes [`CalibrationRecord`]s through the injected backend.
///
/// Expiry is enforced on read: a record past its `expires_at_ms` is deleted
/// and reported as absent, so stale corrections can never leak into
/// resolution. Records that fail to decode (schema drift, corruption) are
/// treated the same way, since a calibration is always re-learnable.
#[derive(Clone)]
pub struct CalibrationStore {
    backend: Arc<dyn KeyValueBackend>,
}

impl CalibrationStore {
    /// Create a store facade over the given backend.
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self { backend }
    }

    fn key(geofence_id: &str) -> String {
        format!("{KEY_PREFIX}{geofence_id}")
    }

    /// Fetch the unexpired record for a site, evicting it if stale.
    pub async fn get(
        &self,
        geofence_id: &str,
        now_ms: u64,
    ) -> Result<Option<CalibrationRecord>, StoreError> {
        let key = Self::key(geofence_id);
        let Some(bytes) = self.backend.get(&key).await? else {
            return Ok(None);
        };

        let record: CalibrationRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(error) => {
                warn!(geofence_id, error = %error, "Discarding undecodable calibration record");
                self.backend.delete(&key).await?;
                return Ok(None);
            }
        };

        if record.is_expired(now_ms) {
            debug!(
                geofence_id,
                expired_at_ms = record.expires_at_ms,
                "Evicting expired calibration record"
            );
            self.backend.delete(&key).await?;
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Persist a record, replacing any previous one for the same site.
    pub async fn put(&self, record: &CalibrationRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record)?;
        self.backend.put(&Self::key(&record.geofence_id), bytes).await?;
        info!(
            geofence_id = %record.geofence_id,
            accuracy_m = record.achieved_accuracy_meters,
            expires_at_ms = record.expires_at_ms,
            "Calibration record stored"
        );
        Ok(())
    }

    /// Remove a site's record, if present.
    pub async fn delete(&self, geofence_id: &str) -> Result<(), StoreError> {
        self.backend.delete(&Self::key(geofence_id)).await?;
        debug!(geofence_id, "Calibration record deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;

    fn record(geofence_id: &str, expires_at_ms: u64) -> CalibrationRecord {
        CalibrationRecord {
            geofence_id: geofence_id.to_string(),
            offset_latitude: 0.0001,
            offset_longitude: -0.0001,
            achieved_accuracy_meters: 11.0,
            created_at_ms: 0,
            expires_at_ms,
        }
    }

    fn store_over(backend: Arc<MemoryBackend>) -> CalibrationStore {
        CalibrationStore::new(backend)
    }

    #[tokio::test]
    async fn test_put_then_get_roundtrip() {
        let store = store_over(Arc::new(MemoryBackend::new()));
        let rec = record("hq", 10_000);

        store.put(&rec).await.unwrap();
        let loaded = store.get("hq", 5_000).await.unwrap();

        assert_eq!(loaded, Some(rec));
    }

    #[tokio::test]
    async fn test_get_missing_site_is_none() {
        let store = store_over(Arc::new(MemoryBackend::new()));

        assert_eq!(store.get("unknown", 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_record_is_evicted_on_get() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_over(backend.clone());
        store.put(&record("hq", 10_000)).await.unwrap();

        let loaded = store.get("hq", 10_000).await.unwrap();

        assert_eq!(loaded, None);
        assert!(backend.is_empty(), "Expired record must be deleted, not just hidden");
    }

    #[tokio::test]
    async fn test_undecodable_record_is_evicted() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .put("calibration/hq", b"{not json".to_vec())
            .await
            .unwrap();
        let store = store_over(backend.clone());

        let loaded = store.get("hq", 0).await.unwrap();

        assert_eq!(loaded, None);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_put_overwrites_previous_record() {
        let store = store_over(Arc::new(MemoryBackend::new()));
        store.put(&record("hq", 10_000)).await.unwrap();

        let mut newer = record("hq", 20_000);
        newer.achieved_accuracy_meters = 6.0;
        store.put(&newer).await.unwrap();

        let loaded = store.get("hq", 15_000).await.unwrap().unwrap();
        assert_eq!(loaded.achieved_accuracy_meters, 6.0);
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let store = store_over(Arc::new(MemoryBackend::new()));
        store.put(&record("hq", 10_000)).await.unwrap();

        store.delete("hq").await.unwrap();

        assert_eq!(store.get("hq", 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sites_do_not_collide() {
        let store = store_over(Arc::new(MemoryBackend::new()));
        store.put(&record("hq", 10_000)).await.unwrap();
        store.put(&record("warehouse", 10_000)).await.unwrap();

        store.delete("hq").await.unwrap();

        assert_eq!(store.get("hq", 0).await.unwrap(), None);
        assert!(store.get("warehouse", 0).await.unwrap().is_some());
    }
}
