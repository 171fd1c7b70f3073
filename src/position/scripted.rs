//! Deterministic backend for tests and simulations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::backend::{FixRequest, PositionBackend};
use super::error::PositionError;
use super::sample::LocationSample;

/// A [`PositionBackend`] that replays a programmed script.
///
/// Each `request_fix` call pops the next queued response. When the queue is
/// empty the fallback fix (if set) is returned, otherwise the request fails
/// as unavailable. The request counter makes single-flight behavior
/// observable: tests assert how many times the "hardware" was actually
/// touched.
///
/// # Example
///
/// ```
/// use sitefence::position::{LocationSample, ScriptedBackend};
///
/// let backend = ScriptedBackend::new();
/// backend.push_fix(LocationSample::new(53.5511, 9.9937, 25.0));
/// assert_eq!(backend.request_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<LocationSample, PositionError>>>,
    fallback: Mutex<Option<LocationSample>>,
    requests: AtomicU64,
}

impl ScriptedBackend {
    /// Create a backend with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful fix.
    pub fn push_fix(&self, sample: LocationSample) {
        self.script.lock().unwrap().push_back(Ok(sample));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: PositionError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// Fix to return whenever the script is exhausted.
    ///
    /// The fallback is re-stamped with the current time on each request so
    /// freshness checks above the backend see a live fix.
    pub fn set_fallback(&self, sample: LocationSample) {
        *self.fallback.lock().unwrap() = Some(sample);
    }

    /// How many fix requests have reached this backend.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Number of scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl PositionBackend for ScriptedBackend {
    async fn request_fix(&self, _request: FixRequest) -> Result<LocationSample, PositionError> {
        self.requests.fetch_add(1, Ordering::Relaxed);

        if let Some(response) = self.script.lock().unwrap().pop_front() {
            return response;
        }

        match self.fallback.lock().unwrap().clone() {
            Some(sample) => Ok(sample.with_captured_at_ms(crate::time::epoch_millis())),
            None => Err(PositionError::Unavailable(
                "scripted backend exhausted".to_string(),
            )),
        }
    }
}
