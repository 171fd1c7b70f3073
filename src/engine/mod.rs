//! Validation orchestration.
//!
//! [`GeofenceEngine`] composes the position pipeline into the one call the
//! portal makes per clock-in attempt, plus the calibration and cache
//! controls around it.
//!
//! # Architecture
//!
//! ```text
//! validate(&[Geofence])
//!     │
//!     ▼
//! SingleFlightFetcher ──> PositionSource ──> PositionBackend (platform)
//!     │ sample
//!     ▼
//! accuracy ceiling ──> CalibrationStore lookups ──> resolve()
//!     │                                                │
//!     ▼                                                ▼
//! confidence blend <──────────────────── Matched / NoMatch
//!     │
//!     ▼
//! site-change detection ──> ValidationResult
//! ```
//!
//! Hardware failures come back in-band as a rejected [`ValidationResult`]
//! with the error in its reason; only store failures surface as `Err`, so
//! the portal can always distinguish "GPS problem, show a hint" from
//! "persistence problem, something is genuinely wrong".
//!
//! # Example
//!
//! ```ignore
//! let engine = GeofenceEngine::new(backend, store, EngineConfig::mobile());
//!
//! let result = engine.validate(&sites).await?;
//! if result.accepted {
//!     let site = result.matched_geofence.unwrap();
//!     println!("clocked in at {} ({:.0} m out)", site.name, result.distance_meters.unwrap());
//! } else {
//!     println!("{}", result.reason.hint());
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::calibration::{
    CalibrationError, CalibrationHandle, CalibrationRecord, CalibrationStore, Calibrator,
};
use crate::fetch::{FetchStats, SingleFlightFetcher};
use crate::geo::Coordinate;
use crate::position::{PositionBackend, PositionSource, PositionWatch};
use crate::resolve::{resolve, Geofence, ResolutionOutcome};
use crate::site_change::{detect_change, LastMatch, LastMatchStore};
use crate::store::{KeyValueBackend, StoreError};
use crate::time::epoch_millis;

mod config;
mod confidence;
mod result;

pub use config::EngineConfig;
pub use result::{ValidationReason, ValidationResult};

use confidence::{blended_confidence, quality_score};

/// The geofence validation and calibration engine.
///
/// Constructed once per application session over the platform's
/// positioning backend and a persistent key-value store; torn down with
/// [`shutdown`](Self::shutdown) on logout. All cross-call state lives in
/// the injected store.
pub struct GeofenceEngine {
    source: PositionSource,
    fetcher: SingleFlightFetcher,
    calibrator: Calibrator,
    calibration_store: CalibrationStore,
    last_match_store: LastMatchStore,
    config: EngineConfig,
    root_token: CancellationToken,
}

impl GeofenceEngine {
    /// Create an engine over the given backends.
    pub fn new(
        backend: Arc<dyn PositionBackend>,
        store: Arc<dyn KeyValueBackend>,
        config: EngineConfig,
    ) -> Self {
        let root_token = CancellationToken::new();
        let source = PositionSource::new(backend, config.source.clone());
        let fetcher = SingleFlightFetcher::new(source.clone(), config.fetcher.clone());
        let calibration_store = CalibrationStore::new(store.clone());
        let calibrator = Calibrator::new(
            source.clone(),
            calibration_store.clone(),
            config.calibrator.clone(),
            root_token.clone(),
        );
        let last_match_store = LastMatchStore::new(store, &config.scope);

        info!(scope = %config.scope, "Geofence engine initialized");
        Self {
            source,
            fetcher,
            calibrator,
            calibration_store,
            last_match_store,
            config,
            root_token,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Decide whether the device is at one of the given sites.
    ///
    /// Hardware problems are reported in-band via
    /// [`ValidationReason::HardwareFailure`]; only store failures are an
    /// `Err`.
    pub async fn validate(&self, geofences: &[Geofence]) -> Result<ValidationResult, StoreError> {
        let sample = match self.fetcher.fetch().await {
            Ok(sample) => sample,
            Err(error) => {
                warn!(%error, "Validation aborted, no position fix");
                return Ok(ValidationResult::hardware_failure(error));
            }
        };

        let quality = quality_score(sample.accuracy_meters);

        if sample.accuracy_meters > self.config.max_accuracy_meters {
            info!(
                accuracy_m = sample.accuracy_meters,
                ceiling_m = self.config.max_accuracy_meters,
                "Validation rejected, fix too inaccurate to resolve"
            );
            return Ok(ValidationResult::accuracy_rejected(
                sample,
                self.config.max_accuracy_meters,
                quality,
            ));
        }

        let calibrations = self.load_calibrations(geofences).await?;
        let outcome = resolve(&sample, geofences, &calibrations, &self.config.radius);

        match outcome {
            ResolutionOutcome::Matched {
                geofence,
                distance_meters,
                applied_radius_meters,
                calibration_applied,
            } => {
                let confidence = blended_confidence(
                    quality,
                    distance_meters,
                    applied_radius_meters,
                    self.config.quality_weight,
                );

                if confidence < self.config.confidence_threshold {
                    info!(
                        geofence_id = %geofence.id,
                        confidence,
                        threshold = self.config.confidence_threshold,
                        "Validation rejected, match below confidence threshold"
                    );
                    return Ok(ValidationResult::below_confidence(
                        sample,
                        geofence,
                        distance_meters,
                        applied_radius_meters,
                        calibration_applied,
                        confidence,
                        self.config.confidence_threshold,
                    ));
                }

                let raw_position = sample.coordinate();
                let previous = self.last_match_store.get().await?;
                let (site_changed, previous_geofence_id) = match &previous {
                    Some(prev) => {
                        let changed = detect_change(
                            prev,
                            &geofence.id,
                            raw_position,
                            self.config.displacement_threshold_meters,
                        );
                        (changed, changed.then(|| prev.geofence_id.clone()))
                    }
                    None => (false, None),
                };
                self.last_match_store
                    .put(&LastMatch::new(geofence.id.clone(), raw_position))
                    .await?;

                info!(
                    geofence_id = %geofence.id,
                    distance_m = distance_meters,
                    radius_m = applied_radius_meters,
                    confidence,
                    calibration_applied,
                    site_changed,
                    "Validation accepted"
                );
                Ok(ValidationResult::accepted(
                    sample,
                    geofence,
                    distance_meters,
                    applied_radius_meters,
                    calibration_applied,
                    confidence,
                    site_changed,
                    previous_geofence_id,
                ))
            }
            ResolutionOutcome::NoMatch { closest } => {
                match &closest {
                    Some(c) => info!(
                        closest_id = %c.geofence.id,
                        distance_m = c.distance_meters,
                        "Validation rejected, no site matched"
                    ),
                    None => info!("Validation rejected, no active sites"),
                }
                Ok(ValidationResult::no_match(sample, closest, quality))
            }
        }
    }

    /// Start a calibration session for a site.
    ///
    /// With a `target` the learned offset is persisted for `geofence_id`;
    /// without one the session only measures. Fails fast with
    /// [`CalibrationError::SessionInProgress`] if a session is running.
    pub fn calibrate(
        &self,
        geofence_id: &str,
        target: Option<Coordinate>,
    ) -> Result<CalibrationHandle, CalibrationError> {
        self.calibrator.begin(geofence_id, target)
    }

    /// Discard the persisted calibration for a site.
    pub async fn reset_calibration(&self, geofence_id: &str) -> Result<(), StoreError> {
        self.calibration_store.delete(geofence_id).await
    }

    /// Drop the freshness cache so the next validation reads the hardware.
    ///
    /// Call after a relocation is suspected.
    pub fn force_refresh(&self) {
        debug!("Freshness cache invalidated by caller");
        self.fetcher.invalidate();
    }

    /// Start a continuous position subscription.
    ///
    /// Updates share the hardware gate with validations and calibration,
    /// so the subscription never races them for the radio.
    pub fn watch(&self) -> PositionWatch {
        self.source.watch()
    }

    /// Fetcher effectiveness counters.
    pub fn fetch_stats(&self) -> FetchStats {
        self.fetcher.stats()
    }

    /// Tear the engine down: cancel any active calibration session and
    /// every watch subscription.
    ///
    /// Validation calls already in flight complete normally.
    pub fn shutdown(&self) {
        info!("Geofence engine shutting down");
        self.fetcher.log_stats();
        self.root_token.cancel();
        self.source.shutdown();
    }

    /// Unexpired calibration records for the active fences.
    async fn load_calibrations(
        &self,
        geofences: &[Geofence],
    ) -> Result<HashMap<String, CalibrationRecord>, StoreError> {
        let now_ms = epoch_millis();
        let mut calibrations = HashMap::new();
        for fence in geofences.iter().filter(|g| g.active) {
            if let Some(record) = self.calibration_store.get(&fence.id, now_ms).await? {
                calibrations.insert(fence.id.clone(), record);
            }
        }
        Ok(calibrations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibratorConfig;
    use crate::position::{LocationSample, PositionError, PositionSourceConfig, ScriptedBackend};
    use crate::store::MemoryBackend;
    use std::time::Duration;

    fn fast_config() -> EngineConfig {
        EngineConfig::default()
            .with_source(
                PositionSourceConfig::default()
                    .with_max_attempts(1)
                    .with_retry_backoff(Duration::from_millis(1))
                    .with_request_timeout(Duration::from_millis(500))
                    .with_watch_interval(Duration::from_millis(5)),
            )
            .with_calibrator(
                CalibratorConfig::default().with_sample_interval(Duration::from_millis(1)),
            )
    }

    fn engine_with(backend: Arc<ScriptedBackend>, config: EngineConfig) -> GeofenceEngine {
        GeofenceEngine::new(backend, Arc::new(MemoryBackend::new()), config)
    }

    fn sites() -> Vec<Geofence> {
        vec![
            Geofence::new("a", "Site A", 0.0, 0.0, 50.0),
            Geofence::new("b", "Site B", 0.05, 0.0, 50.0),
        ]
    }

    // ==================== validation path tests ====================

    #[tokio::test]
    async fn test_validate_accepts_at_site() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_fix(LocationSample::new(0.0, 0.0, 10.0));
        let engine = engine_with(backend, fast_config());

        let result = engine.validate(&sites()).await.unwrap();

        assert!(result.accepted);
        assert_eq!(result.reason, ValidationReason::Accepted);
        assert_eq!(result.matched_geofence.unwrap().id, "a");
        assert!(result.distance_meters.unwrap() < 0.01);
        assert_eq!(result.applied_radius_meters, Some(50.0));
        assert!((result.confidence - 0.97).abs() < 1e-9);
        assert!(!result.site_changed);
        assert!(result.previous_geofence_id.is_none());
    }

    #[tokio::test]
    async fn test_validate_reports_hardware_failure_in_band() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_error(PositionError::PermissionDenied);
        let engine = engine_with(backend, fast_config());

        let result = engine.validate(&sites()).await.unwrap();

        assert!(!result.accepted);
        assert_eq!(
            result.reason,
            ValidationReason::HardwareFailure(PositionError::PermissionDenied)
        );
        assert!(result.sample.is_none());
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_validate_rejects_fix_above_accuracy_ceiling() {
        let backend = Arc::new(ScriptedBackend::new());
        // Right on top of site a, but useless accuracy
        backend.push_fix(LocationSample::new(0.0, 0.0, 150.0));
        let engine = engine_with(backend, fast_config());

        let result = engine.validate(&sites()).await.unwrap();

        assert!(!result.accepted);
        assert_eq!(
            result.reason,
            ValidationReason::AccuracyRejected {
                accuracy_meters: 150.0,
                ceiling_meters: 100.0,
            }
        );
        assert!(
            result.matched_geofence.is_none(),
            "Resolution must be skipped entirely"
        );
    }

    #[tokio::test]
    async fn test_validate_no_match_names_closest_site() {
        let backend = Arc::new(ScriptedBackend::new());
        // About 500 m north of site a
        backend.push_fix(LocationSample::new(0.0045, 0.0, 10.0));
        let engine = engine_with(backend, fast_config());

        let result = engine.validate(&sites()).await.unwrap();

        assert!(!result.accepted);
        assert_eq!(result.reason, ValidationReason::NoSiteMatch);
        assert_eq!(result.matched_geofence.unwrap().id, "a");
        assert!((result.distance_meters.unwrap() - 500.0).abs() < 5.0);
    }

    #[tokio::test]
    async fn test_validate_below_confidence_surfaces_candidate() {
        let backend = Arc::new(ScriptedBackend::new());
        // 90 m out with accuracy 60: the widened radius (100 m) contains
        // the fix but quality 0.5 and margin 0.1 blend to about 0.34
        backend.push_fix(LocationSample::new(0.00081, 0.0, 60.0));
        let engine = engine_with(backend, fast_config());

        let result = engine.validate(&sites()).await.unwrap();

        assert!(!result.accepted);
        assert!(matches!(
            result.reason,
            ValidationReason::BelowConfidence { .. }
        ));
        assert_eq!(result.matched_geofence.unwrap().id, "a");
        assert!(result.confidence < 0.65);
    }

    #[tokio::test]
    async fn test_rejection_does_not_record_a_match() {
        let store = Arc::new(MemoryBackend::new());
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_fix(LocationSample::new(0.0045, 0.0, 10.0));
        let engine = GeofenceEngine::new(backend, store.clone(), fast_config());

        let result = engine.validate(&sites()).await.unwrap();

        assert!(!result.accepted);
        assert!(store.is_empty(), "No last-match entry may be written");
    }

    // ==================== site change tests ====================

    #[tokio::test]
    async fn test_moving_between_sites_flags_relocation() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_fix(LocationSample::new(0.0, 0.0, 10.0));
        backend.push_fix(LocationSample::new(0.05, 0.0, 10.0));
        backend.push_fix(LocationSample::new(0.05, 0.0, 10.0));
        let engine = engine_with(backend, fast_config());

        let first = engine.validate(&sites()).await.unwrap();
        assert!(first.accepted && !first.site_changed);

        engine.force_refresh();
        let second = engine.validate(&sites()).await.unwrap();
        assert!(second.accepted);
        assert!(second.site_changed, "Different site id must flag a change");
        assert_eq!(second.previous_geofence_id.as_deref(), Some("a"));

        engine.force_refresh();
        let third = engine.validate(&sites()).await.unwrap();
        assert!(third.accepted);
        assert!(!third.site_changed, "Staying put is not a change");
        assert!(third.previous_geofence_id.is_none());
    }

    #[tokio::test]
    async fn test_large_displacement_within_same_site_flags_relocation() {
        let campus = vec![Geofence::new("campus", "Campus", 0.0, 0.0, 400.0)];
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_fix(LocationSample::new(0.0, 0.0, 10.0));
        // About 200 m north, still well inside the 400 m radius
        backend.push_fix(LocationSample::new(0.0018, 0.0, 10.0));
        let engine = engine_with(backend, fast_config());

        let first = engine.validate(&campus).await.unwrap();
        assert!(first.accepted && !first.site_changed);

        engine.force_refresh();
        let second = engine.validate(&campus).await.unwrap();
        assert!(second.accepted);
        assert!(second.site_changed);
        assert_eq!(second.previous_geofence_id.as_deref(), Some("campus"));
    }

    // ==================== cache control tests ====================

    #[tokio::test]
    async fn test_force_refresh_reaches_the_hardware() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_fallback(LocationSample::new(0.0, 0.0, 10.0));
        let engine = engine_with(backend.clone(), fast_config());

        engine.validate(&sites()).await.unwrap();
        engine.validate(&sites()).await.unwrap();
        assert_eq!(backend.request_count(), 1, "Second read must hit the cache");

        engine.force_refresh();
        engine.validate(&sites()).await.unwrap();
        assert_eq!(backend.request_count(), 2);

        let stats = engine.fetch_stats();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.hardware_requests, 2);
    }

    // ==================== lifecycle tests ====================

    #[tokio::test]
    async fn test_shutdown_cancels_active_calibration() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_fallback(LocationSample::new(0.0, 0.0, 10.0));
        let config = fast_config().with_calibrator(
            CalibratorConfig::default().with_sample_interval(Duration::from_millis(100)),
        );
        let engine = engine_with(backend, config);

        let mut handle = engine.calibrate("a", None).unwrap();
        engine.shutdown();

        let result = handle.wait().await;
        assert!(matches!(result, Err(CalibrationError::Cancelled)));
    }

    #[tokio::test]
    async fn test_shutdown_ends_watch_subscriptions() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_fallback(LocationSample::new(0.0, 0.0, 10.0));
        let engine = engine_with(backend, fast_config());

        let mut watch = engine.watch();
        let _ = watch.recv().await.expect("watch should be live");

        engine.shutdown();

        loop {
            match tokio::time::timeout(Duration::from_millis(500), watch.recv()).await {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(_) => panic!("Watch should close after engine shutdown"),
            }
        }
    }

    // ==================== calibration surface tests ====================

    #[tokio::test]
    async fn test_reset_calibration_clears_the_record() {
        let store = Arc::new(MemoryBackend::new());
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_fallback(LocationSample::new(0.0001, 0.0, 10.0));
        let engine = GeofenceEngine::new(backend, store.clone(), fast_config());

        let mut handle = engine
            .calibrate("a", Some(Coordinate::new(0.0, 0.0)))
            .unwrap();
        let outcome = handle.wait().await.unwrap();
        assert!(outcome.record.is_some());
        assert_eq!(store.len(), 1);

        engine.reset_calibration("a").await.unwrap();
        assert!(store.is_empty());
    }
}
