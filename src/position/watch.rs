//! Subscription handle for continuous position updates.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::PositionError;
use super::sample::LocationSample;

/// Handle to a continuous position subscription.
///
/// Created by [`PositionSource::watch`](super::PositionSource::watch).
/// Updates arrive in-band as `Result`s: transient hardware failures are
/// delivered to the subscriber rather than silently dropped. The underlying
/// polling task stops when the handle is cancelled or dropped.
pub struct PositionWatch {
    update_rx: mpsc::Receiver<Result<LocationSample, PositionError>>,
    cancel_token: CancellationToken,
}

impl PositionWatch {
    pub(super) fn new(
        update_rx: mpsc::Receiver<Result<LocationSample, PositionError>>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            update_rx,
            cancel_token,
        }
    }

    /// Receive the next update.
    ///
    /// Returns `None` once the subscription has ended and all buffered
    /// updates have been drained.
    pub async fn recv(&mut self) -> Option<Result<LocationSample, PositionError>> {
        self.update_rx.recv().await
    }

    /// Stop the subscription.
    ///
    /// Updates already buffered can still be received; no new ones are
    /// produced.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Whether the subscription has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Drop for PositionWatch {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
