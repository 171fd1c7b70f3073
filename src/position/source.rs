//! Retrying position reads and hardware access serialization.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::backend::{FixRequest, PositionBackend};
use super::error::PositionError;
use super::sample::LocationSample;
use super::watch::PositionWatch;

/// Buffer size for watch subscription channels.
const WATCH_CHANNEL_CAPACITY: usize = 16;

/// Position source configuration.
#[derive(Debug, Clone)]
pub struct PositionSourceConfig {
    /// Upper bound on a single hardware read (platform dependent, 15-45s).
    pub request_timeout: Duration,

    /// Accuracy at which a fix is accepted without further retries.
    pub accept_accuracy_meters: f64,

    /// Maximum hardware reads per `get_once` call.
    pub max_attempts: u32,

    /// Pause between retry attempts.
    pub retry_backoff: Duration,

    /// Spacing between updates on a watch subscription.
    pub watch_interval: Duration,
}

impl Default for PositionSourceConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(20),
            accept_accuracy_meters: 30.0,
            max_attempts: 3,
            retry_backoff: Duration::from_secs(2),
            watch_interval: Duration::from_secs(5),
        }
    }
}

impl PositionSourceConfig {
    /// Set the per-read timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the accuracy threshold for early acceptance.
    pub fn with_accept_accuracy(mut self, meters: f64) -> Self {
        self.accept_accuracy_meters = meters;
        self
    }

    /// Set the retry attempt limit.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the pause between retries.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Set the watch update spacing.
    pub fn with_watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }
}

/// Retrying reader over a [`PositionBackend`].
///
/// All hardware access in the process funnels through one `PositionSource`
/// (clones share state), which serializes reads on an internal gate so the
/// radio never sees overlapping requests. Single reads take the gate per
/// call; calibration takes it for a whole session via [`begin_session`].
///
/// # Retry policy
///
/// `get_once` issues up to `max_attempts` fresh high-accuracy reads. A fix
/// at or under `accept_accuracy_meters` returns immediately; otherwise the
/// best fix seen so far is remembered and the next attempt starts after
/// `retry_backoff`. When every attempt has run, the best fix wins; if no
/// attempt produced a fix at all, the last error propagates.
///
/// [`begin_session`]: PositionSource::begin_session
#[derive(Clone)]
pub struct PositionSource {
    backend: Arc<dyn PositionBackend>,
    config: PositionSourceConfig,
    hardware_gate: Arc<Mutex<()>>,
    lifecycle: CancellationToken,
}

impl PositionSource {
    /// Create a position source over the given backend.
    pub fn new(backend: Arc<dyn PositionBackend>, config: PositionSourceConfig) -> Self {
        Self {
            backend,
            config,
            hardware_gate: Arc::new(Mutex::new(())),
            lifecycle: CancellationToken::new(),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults(backend: Arc<dyn PositionBackend>) -> Self {
        Self::new(backend, PositionSourceConfig::default())
    }

    /// The active configuration.
    pub fn config(&self) -> &PositionSourceConfig {
        &self.config
    }

    /// Obtain a single fix, retrying per the configured policy.
    ///
    /// Holds the hardware gate for the duration of the call.
    pub async fn get_once(&self) -> Result<LocationSample, PositionError> {
        let _guard = self.hardware_gate.clone().lock_owned().await;
        self.get_once_inner().await
    }

    /// Acquire exclusive hardware access for a multi-read session.
    ///
    /// Single reads via [`get_once`](Self::get_once) queue behind the
    /// returned session until it is dropped.
    pub async fn begin_session(&self) -> HardwareSession {
        let guard = self.hardware_gate.clone().lock_owned().await;
        HardwareSession {
            source: self.clone(),
            _guard: guard,
        }
    }

    /// Start a continuous subscription.
    ///
    /// Spawns a polling task that delivers a fresh read every
    /// `watch_interval`, forwarding failures in-band. The subscription ends
    /// when the handle is cancelled or dropped, or when the source is
    /// [`shutdown`](Self::shutdown).
    pub fn watch(&self) -> PositionWatch {
        let (update_tx, update_rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        let cancel_token = self.lifecycle.child_token();

        let source = self.clone();
        let token = cancel_token.clone();
        tokio::spawn(async move {
            debug!("Position watch started");
            let mut updates_sent: u64 = 0;

            loop {
                let result = tokio::select! {
                    _ = token.cancelled() => break,
                    result = source.get_once() => result,
                };

                if update_tx.send(result).await.is_err() {
                    break; // Subscriber dropped the handle
                }
                updates_sent += 1;

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(source.config.watch_interval) => {}
                }
            }

            debug!(updates_sent, "Position watch stopped");
        });

        PositionWatch::new(update_rx, cancel_token)
    }

    /// End every active watch subscription spawned from this source.
    ///
    /// Reads in flight complete normally; only the polling loops stop.
    pub fn shutdown(&self) {
        debug!("Position source shutting down watch subscriptions");
        self.lifecycle.cancel();
    }

    /// Retry loop, assuming the caller already holds the hardware gate.
    async fn get_once_inner(&self) -> Result<LocationSample, PositionError> {
        let mut best: Option<LocationSample> = None;
        let mut last_error: Option<PositionError> = None;

        for attempt in 1..=self.config.max_attempts {
            match self.request_bounded().await {
                Ok(sample) => {
                    if sample.accuracy_meters <= self.config.accept_accuracy_meters {
                        debug!(
                            attempt,
                            accuracy_m = sample.accuracy_meters,
                            "Fix accepted"
                        );
                        return Ok(sample);
                    }

                    debug!(
                        attempt,
                        accuracy_m = sample.accuracy_meters,
                        threshold_m = self.config.accept_accuracy_meters,
                        "Fix above accuracy threshold, retrying"
                    );
                    let replace = match &best {
                        Some(current) => sample.is_more_accurate_than(current),
                        None => true,
                    };
                    if replace {
                        best = Some(sample);
                    }
                }
                Err(error) => {
                    warn!(attempt, error = %error, "Fix attempt failed");
                    last_error = Some(error);
                }
            }

            if attempt < self.config.max_attempts {
                tokio::time::sleep(self.config.retry_backoff).await;
            }
        }

        match best {
            Some(sample) => {
                debug!(
                    accuracy_m = sample.accuracy_meters,
                    "Attempts exhausted, returning best fix"
                );
                Ok(sample)
            }
            None => Err(last_error.unwrap_or_else(|| {
                PositionError::Unavailable("no fix produced".to_string())
            })),
        }
    }

    /// One hardware read, bounded by the configured timeout.
    ///
    /// The bound applies here regardless of whether the backend honors the
    /// timeout it is handed, so a stuck platform call can never hang the
    /// engine.
    async fn request_bounded(&self) -> Result<LocationSample, PositionError> {
        let request = FixRequest::fresh(self.config.request_timeout);
        match tokio::time::timeout(request.timeout, self.backend.request_fix(request)).await {
            Ok(result) => result,
            Err(_) => Err(PositionError::Timeout {
                waited: request.timeout,
            }),
        }
    }
}

/// Exclusive hold on the positioning hardware.
///
/// Created by [`PositionSource::begin_session`]. Reads issued through the
/// session bypass the gate (the session already owns it); everything else
/// waits until the session drops.
pub struct HardwareSession {
    source: PositionSource,
    _guard: OwnedMutexGuard<()>,
}

impl HardwareSession {
    /// Obtain a fix inside this session, with the usual retry policy.
    pub async fn get_once(&self) -> Result<LocationSample, PositionError> {
        self.source.get_once_inner().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::scripted::ScriptedBackend;
    use async_trait::async_trait;

    fn fast_config() -> PositionSourceConfig {
        PositionSourceConfig::default()
            .with_retry_backoff(Duration::from_millis(1))
            .with_request_timeout(Duration::from_millis(200))
    }

    fn source_with(backend: Arc<ScriptedBackend>) -> PositionSource {
        PositionSource::new(backend, fast_config())
    }

    // ==================== get_once retry policy tests ====================

    #[tokio::test]
    async fn test_accepts_first_fix_within_threshold() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_fix(LocationSample::new(53.55, 9.99, 12.0));
        let source = source_with(backend.clone());

        let fix = source.get_once().await.unwrap();

        assert_eq!(fix.accuracy_meters, 12.0);
        assert_eq!(backend.request_count(), 1, "Should not retry a good fix");
    }

    #[tokio::test]
    async fn test_retries_until_acceptable_fix() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_fix(LocationSample::new(53.55, 9.99, 80.0));
        backend.push_fix(LocationSample::new(53.55, 9.99, 22.0));
        let source = source_with(backend.clone());

        let fix = source.get_once().await.unwrap();

        assert_eq!(fix.accuracy_meters, 22.0);
        assert_eq!(backend.request_count(), 2);
    }

    #[tokio::test]
    async fn test_returns_best_fix_when_none_acceptable() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_fix(LocationSample::new(53.55, 9.99, 80.0));
        backend.push_fix(LocationSample::new(53.55, 9.99, 45.0));
        backend.push_fix(LocationSample::new(53.55, 9.99, 60.0));
        let source = source_with(backend.clone());

        let fix = source.get_once().await.unwrap();

        assert_eq!(fix.accuracy_meters, 45.0, "Best of the three, not last");
        assert_eq!(backend.request_count(), 3);
    }

    #[tokio::test]
    async fn test_mixed_errors_and_fixes_returns_fix() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_error(PositionError::Unavailable("warming up".to_string()));
        backend.push_fix(LocationSample::new(53.55, 9.99, 70.0));
        backend.push_error(PositionError::Unavailable("lost signal".to_string()));
        let source = source_with(backend);

        let fix = source.get_once().await.unwrap();

        assert_eq!(fix.accuracy_meters, 70.0);
    }

    #[tokio::test]
    async fn test_all_attempts_failing_propagates_last_error() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_error(PositionError::Unavailable("a".to_string()));
        backend.push_error(PositionError::Unavailable("b".to_string()));
        backend.push_error(PositionError::PermissionDenied);
        let source = source_with(backend.clone());

        let result = source.get_once().await;

        assert_eq!(result, Err(PositionError::PermissionDenied));
        assert_eq!(backend.request_count(), 3);
    }

    #[tokio::test]
    async fn test_stuck_backend_maps_to_timeout() {
        struct HangingBackend;

        #[async_trait]
        impl PositionBackend for HangingBackend {
            async fn request_fix(
                &self,
                _request: FixRequest,
            ) -> Result<LocationSample, PositionError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("test backend never completes")
            }
        }

        let config = PositionSourceConfig::default()
            .with_request_timeout(Duration::from_millis(20))
            .with_max_attempts(1);
        let source = PositionSource::new(Arc::new(HangingBackend), config);

        let result = source.get_once().await;

        assert!(matches!(result, Err(PositionError::Timeout { .. })));
    }

    // ==================== hardware gate tests ====================

    #[tokio::test]
    async fn test_session_blocks_single_reads() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_fallback(LocationSample::new(53.55, 9.99, 10.0));
        let source = source_with(backend);

        let session = source.begin_session().await;

        // A single read must queue behind the session
        let blocked = source.get_once();
        let outcome = tokio::time::timeout(Duration::from_millis(50), blocked).await;
        assert!(outcome.is_err(), "Read should wait while session is held");

        // Session reads still work
        let fix = session.get_once().await.unwrap();
        assert_eq!(fix.accuracy_meters, 10.0);

        // Releasing the session unblocks queued reads
        drop(session);
        let fix = tokio::time::timeout(Duration::from_millis(200), source.get_once())
            .await
            .expect("Read should proceed after session drop")
            .unwrap();
        assert_eq!(fix.accuracy_meters, 10.0);
    }

    // ==================== watch subscription tests ====================

    #[tokio::test]
    async fn test_watch_delivers_updates_and_errors() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_fix(LocationSample::new(1.0, 1.0, 10.0));
        backend.push_error(PositionError::Unavailable("blip".to_string()));
        backend.set_fallback(LocationSample::new(2.0, 2.0, 10.0));
        let config = fast_config()
            .with_watch_interval(Duration::from_millis(5))
            .with_max_attempts(1);
        let source = PositionSource::new(backend, config);

        let mut watch = source.watch();

        let first = watch.recv().await.expect("watch should be live");
        assert_eq!(first.unwrap().latitude, 1.0);

        let second = watch.recv().await.expect("watch should be live");
        assert!(matches!(second, Err(PositionError::Unavailable(_))));

        let third = watch.recv().await.expect("watch should be live");
        assert_eq!(third.unwrap().latitude, 2.0);
    }

    #[tokio::test]
    async fn test_shutdown_ends_all_watches() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_fallback(LocationSample::new(1.0, 1.0, 10.0));
        let config = fast_config().with_watch_interval(Duration::from_millis(5));
        let source = PositionSource::new(backend, config);

        let mut first = source.watch();
        let mut second = source.clone().watch();
        let _ = first.recv().await.expect("watch should be live");
        let _ = second.recv().await.expect("watch should be live");

        source.shutdown();

        for watch in [&mut first, &mut second] {
            loop {
                match tokio::time::timeout(Duration::from_millis(500), watch.recv()).await {
                    Ok(Some(_)) => continue,
                    Ok(None) => break,
                    Err(_) => panic!("Watch should close after source shutdown"),
                }
            }
        }
    }

    #[tokio::test]
    async fn test_watch_cancel_ends_subscription() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_fallback(LocationSample::new(1.0, 1.0, 10.0));
        let config = fast_config().with_watch_interval(Duration::from_millis(5));
        let source = PositionSource::new(backend, config);

        let mut watch = source.watch();
        let _ = watch.recv().await.expect("watch should be live");

        watch.cancel();

        // Channel drains, then closes
        loop {
            match tokio::time::timeout(Duration::from_millis(500), watch.recv()).await {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(_) => panic!("Watch should close after cancel"),
            }
        }
    }
}
