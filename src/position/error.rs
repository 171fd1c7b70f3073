//! Error type for position acquisition.

use std::time::Duration;

/// Why a position fix could not be produced.
///
/// Every variant is recoverable by user action rather than fatal, so the
/// type is `Clone`: a single hardware failure may be fanned out to several
/// coalesced waiters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PositionError {
    /// The user or platform has denied location access.
    #[error("location permission denied")]
    PermissionDenied,

    /// The hardware could not produce a fix (no signal, radio off).
    #[error("position unavailable: {0}")]
    Unavailable(String),

    /// No fix arrived within the allotted time.
    #[error("position request timed out after {waited:?}")]
    Timeout {
        /// How long the request waited before giving up.
        waited: Duration,
    },

    /// The platform has no positioning capability at all.
    #[error("positioning is not supported on this device")]
    Unsupported,
}

impl PositionError {
    /// A short instruction the host UI can show next to the failure.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "Allow location access in your device settings, then retry",
            Self::Unavailable(_) => "Move to an area with a clear view of the sky, then retry",
            Self::Timeout { .. } => "GPS signal is weak here, move outdoors or retry",
            Self::Unsupported => "This device cannot determine your location",
        }
    }

    /// Returns true when retrying without user intervention can succeed.
    ///
    /// Permission and capability problems need the user to act first;
    /// signal problems may clear on their own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}
