//! Calibration session orchestration.
//!
//! A session owns the positioning hardware exclusively while it runs: it
//! takes a [`HardwareSession`](crate::position::HardwareSession) up front,
//! collects timed samples through it, then releases it before computing and
//! persisting the result. Validation fetches that arrive mid-session queue
//! behind the hardware gate instead of racing the sampler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::geo::Coordinate;
use crate::position::{LocationSample, PositionError, PositionSource};
use crate::time::epoch_millis;

use super::centroid::{select_samples, weighted_centroid};
use super::handle::CalibrationHandle;
use super::store::CalibrationStore;
use super::types::{
    CalibrationError, CalibrationOutcome, CalibrationProgress, CalibrationRecord, SessionPhase,
};

/// Calibration session configuration.
#[derive(Debug, Clone)]
pub struct CalibratorConfig {
    /// Samples collected per session.
    pub samples_target: u32,

    /// Spacing between samples, long enough for the receiver to produce
    /// an independent fix.
    pub sample_interval: Duration,

    /// How long a finished record stays applicable.
    pub validity: Duration,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        Self {
            samples_target: 7,
            sample_interval: Duration::from_millis(1_500),
            validity: Duration::from_secs(48 * 60 * 60),
        }
    }
}

impl CalibratorConfig {
    /// Set the number of samples per session.
    pub fn with_samples_target(mut self, samples_target: u32) -> Self {
        self.samples_target = samples_target;
        self
    }

    /// Set the spacing between samples.
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    /// Set the record validity window.
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }
}

/// Runs calibration sessions, one at a time.
///
/// `begin` spawns the session as a task and hands back a
/// [`CalibrationHandle`]; a second `begin` while one is running fails fast
/// with [`CalibrationError::SessionInProgress`] rather than queueing behind
/// a 10-15 second operation.
pub struct Calibrator {
    source: PositionSource,
    store: CalibrationStore,
    config: CalibratorConfig,
    session_active: Arc<AtomicBool>,
    root_token: CancellationToken,
}

impl Calibrator {
    /// Create a calibrator over the given source and store.
    ///
    /// Sessions are spawned as children of `root_token`, so cancelling it
    /// (engine shutdown) aborts any session in flight.
    pub fn new(
        source: PositionSource,
        store: CalibrationStore,
        config: CalibratorConfig,
        root_token: CancellationToken,
    ) -> Self {
        Self {
            source,
            store,
            config,
            session_active: Arc::new(AtomicBool::new(false)),
            root_token,
        }
    }

    /// Whether a session is currently running.
    pub fn is_session_active(&self) -> bool {
        self.session_active.load(Ordering::Acquire)
    }

    /// Start a calibration session for a site.
    ///
    /// With a `target` coordinate the session derives and persists an
    /// offset record for `geofence_id`; without one it only measures (the
    /// outcome carries the centroid, nothing is stored).
    pub fn begin(
        &self,
        geofence_id: &str,
        target: Option<Coordinate>,
    ) -> Result<CalibrationHandle, CalibrationError> {
        if self
            .session_active
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .is_err()
        {
            return Err(CalibrationError::SessionInProgress);
        }

        let (progress_tx, progress_rx) =
            watch::channel(CalibrationProgress::idle(self.config.samples_target));
        let cancel_token = self.root_token.child_token();
        let outcome = Arc::new(Mutex::new(None));

        let worker = SessionWorker {
            geofence_id: geofence_id.to_string(),
            target,
            source: self.source.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
            progress_tx,
            cancel_token: cancel_token.clone(),
            outcome: outcome.clone(),
            _active: ActiveGuard {
                flag: self.session_active.clone(),
            },
        };
        tokio::spawn(worker.run());

        Ok(CalibrationHandle::new(
            geofence_id.to_string(),
            progress_rx,
            cancel_token,
            outcome,
        ))
    }
}

/// Clears the single-session flag when the worker ends, however it ends.
struct ActiveGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

struct SessionWorker {
    geofence_id: String,
    target: Option<Coordinate>,
    source: PositionSource,
    store: CalibrationStore,
    config: CalibratorConfig,
    progress_tx: watch::Sender<CalibrationProgress>,
    cancel_token: CancellationToken,
    outcome: Arc<Mutex<Option<Result<CalibrationOutcome, CalibrationError>>>>,
    _active: ActiveGuard,
}

impl SessionWorker {
    async fn run(self) {
        info!(
            geofence_id = %self.geofence_id,
            samples_target = self.config.samples_target,
            has_target = self.target.is_some(),
            "Calibration session started"
        );

        let result = self.collect_and_compute().await;
        match &result {
            Ok(outcome) => info!(
                geofence_id = %self.geofence_id,
                samples_used = outcome.samples_used,
                accuracy_m = outcome.achieved_accuracy_meters,
                persisted = outcome.record.is_some(),
                "Calibration session complete"
            ),
            Err(error) => warn!(
                geofence_id = %self.geofence_id,
                error = %error,
                "Calibration session failed"
            ),
        }

        let terminal = if result.is_ok() {
            SessionPhase::Done
        } else {
            SessionPhase::Failed
        };
        // Store the outcome before publishing the terminal phase, so a
        // waiting handle always finds it
        *self.outcome.lock().await = Some(result);
        self.progress_tx.send_modify(|p| p.phase = terminal);
    }

    async fn collect_and_compute(&self) -> Result<CalibrationOutcome, CalibrationError> {
        let session = tokio::select! {
            _ = self.cancel_token.cancelled() => return Err(CalibrationError::Cancelled),
            session = self.source.begin_session() => session,
        };
        self.progress_tx
            .send_modify(|p| p.phase = SessionPhase::Sampling);

        let mut samples: Vec<LocationSample> =
            Vec::with_capacity(self.config.samples_target as usize);
        let mut best_accuracy: Option<f64> = None;

        for index in 0..self.config.samples_target {
            if index > 0 {
                tokio::select! {
                    _ = self.cancel_token.cancelled() => return Err(CalibrationError::Cancelled),
                    _ = tokio::time::sleep(self.config.sample_interval) => {}
                }
            }

            let sample = tokio::select! {
                _ = self.cancel_token.cancelled() => return Err(CalibrationError::Cancelled),
                result = session.get_once() => result?,
            };

            best_accuracy = Some(match best_accuracy {
                Some(best) => best.min(sample.accuracy_meters),
                None => sample.accuracy_meters,
            });
            let collected = index + 1;
            debug!(
                geofence_id = %self.geofence_id,
                collected,
                accuracy_m = sample.accuracy_meters,
                "Calibration sample collected"
            );
            samples.push(sample);
            self.progress_tx.send_modify(|p| {
                p.samples_collected = collected;
                p.best_accuracy_meters = best_accuracy;
            });
        }

        // Sampling is over, let queued reads through while we compute
        drop(session);
        self.progress_tx
            .send_modify(|p| p.phase = SessionPhase::Computing);

        let kept = select_samples(samples);
        match (weighted_centroid(&kept), best_accuracy) {
            (Some(centroid), Some(achieved_accuracy)) => {
                let record = match self.target {
                    Some(target) => {
                        let now_ms = epoch_millis();
                        let record = CalibrationRecord {
                            geofence_id: self.geofence_id.clone(),
                            offset_latitude: target.latitude - centroid.latitude,
                            offset_longitude: target.longitude - centroid.longitude,
                            achieved_accuracy_meters: achieved_accuracy,
                            created_at_ms: now_ms,
                            expires_at_ms: now_ms + self.config.validity.as_millis() as u64,
                        };
                        self.store.put(&record).await?;
                        Some(record)
                    }
                    None => None,
                };

                Ok(CalibrationOutcome {
                    centroid,
                    achieved_accuracy_meters: achieved_accuracy,
                    samples_used: kept.len(),
                    record,
                })
            }
            _ => Err(CalibrationError::Aborted(PositionError::Unavailable(
                "no samples collected".to_string(),
            ))),
        }
    }
}
