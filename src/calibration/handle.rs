//! Caller-facing handle for a running calibration session.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use super::types::{CalibrationError, CalibrationOutcome, CalibrationProgress};

/// Handle to an in-flight calibration session.
///
/// Returned by [`Calibrator::begin`](super::Calibrator::begin). Lets the
/// caller observe progress, cancel, and await the outcome. Dropping the
/// handle does not stop the session; a completed record is still persisted.
pub struct CalibrationHandle {
    geofence_id: String,
    progress_rx: watch::Receiver<CalibrationProgress>,
    cancel_token: CancellationToken,
    /// Outcome slot - set by the session worker before the terminal phase
    /// is published.
    outcome: Arc<Mutex<Option<Result<CalibrationOutcome, CalibrationError>>>>,
}

impl CalibrationHandle {
    pub(super) fn new(
        geofence_id: String,
        progress_rx: watch::Receiver<CalibrationProgress>,
        cancel_token: CancellationToken,
        outcome: Arc<Mutex<Option<Result<CalibrationOutcome, CalibrationError>>>>,
    ) -> Self {
        Self {
            geofence_id,
            progress_rx,
            cancel_token,
            outcome,
        }
    }

    /// Site this session is calibrating.
    pub fn geofence_id(&self) -> &str {
        &self.geofence_id
    }

    /// The most recent progress snapshot, without blocking.
    pub fn progress(&self) -> CalibrationProgress {
        *self.progress_rx.borrow()
    }

    /// Subscribe to progress updates, one notification per collected sample.
    pub fn subscribe(&self) -> watch::Receiver<CalibrationProgress> {
        self.progress_rx.clone()
    }

    /// Cancel the session. Partial samples are discarded.
    ///
    /// Non-blocking; the outcome becomes [`CalibrationError::Cancelled`]
    /// once the worker observes the token.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Waits for the session to finish and returns its outcome.
    pub async fn wait(&mut self) -> Result<CalibrationOutcome, CalibrationError> {
        loop {
            if self.progress().phase.is_terminal() {
                break;
            }
            // Wait for the next phase change
            if self.progress_rx.changed().await.is_err() {
                // Sender gone - worker is done
                break;
            }
        }
        self.outcome
            .lock()
            .await
            .take()
            .unwrap_or(Err(CalibrationError::Cancelled))
    }
}

impl std::fmt::Debug for CalibrationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationHandle")
            .field("geofence_id", &self.geofence_id)
            .field("progress", &self.progress())
            .finish()
    }
}
