//! Platform adapter trait for positioning hardware.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::error::PositionError;
use super::sample::LocationSample;

/// Parameters for a single fix request, passed through to the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixRequest {
    /// Upper bound on how long the backend may take to produce a fix.
    pub timeout: Duration,

    /// Maximum acceptable age of a platform-cached fix.
    ///
    /// Zero forces a fresh hardware read. Backends must never return a
    /// cached value older than this, even when one is instantly available.
    pub max_age: Duration,

    /// Request the highest accuracy mode the hardware offers.
    pub high_accuracy: bool,
}

impl FixRequest {
    /// A high-accuracy request that rejects any platform-cached value.
    pub fn fresh(timeout: Duration) -> Self {
        Self {
            timeout,
            max_age: Duration::ZERO,
            high_accuracy: true,
        }
    }
}

/// The only seam through which positioning hardware is reached.
///
/// Implementations wrap a platform location API (or a simulation of one)
/// and are expected to honor every field of [`FixRequest`]. All retry and
/// freshness policy lives above this trait in
/// [`PositionSource`](super::PositionSource); backends stay dumb.
#[async_trait]
pub trait PositionBackend: Send + Sync {
    /// Request a single fix from the hardware.
    async fn request_fix(&self, request: FixRequest) -> Result<LocationSample, PositionError>;
}

// Allow Arc<B> to be used wherever a backend is expected
#[async_trait]
impl<B: PositionBackend + ?Sized> PositionBackend for Arc<B> {
    async fn request_fix(&self, request: FixRequest) -> Result<LocationSample, PositionError> {
        (**self).request_fix(request).await
    }
}
