//! Core types for calibration sessions and persisted offsets.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::position::PositionError;
use crate::store::StoreError;

/// A persisted per-site GPS correction.
///
/// Produced by a calibration session run at a known location: the offset is
/// the vector from the measured centroid to the surveyed site coordinate,
/// and applying it to later raw fixes cancels that site's systematic GPS
/// bias (urban canyon reflections, roof shadowing).
///
/// Records expire because multipath conditions drift with weather and
/// construction; an expired record is evicted on read, never applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// Site this correction belongs to.
    pub geofence_id: String,

    /// Degrees of latitude to add to a raw fix.
    pub offset_latitude: f64,

    /// Degrees of longitude to add to a raw fix.
    pub offset_longitude: f64,

    /// Best single-sample accuracy observed during the session, in meters.
    pub achieved_accuracy_meters: f64,

    /// When the session completed, as epoch milliseconds.
    pub created_at_ms: u64,

    /// When this record stops being applied, as epoch milliseconds.
    pub expires_at_ms: u64,
}

impl CalibrationRecord {
    /// Whether this record has passed its expiry time.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Apply this record's offset to a raw position.
    pub fn apply_to(&self, raw: Coordinate) -> Coordinate {
        raw.offset_by(self.offset_latitude, self.offset_longitude)
    }
}

/// Where a calibration session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Created but not yet sampling.
    #[default]
    Idle,
    /// Collecting timed GPS samples.
    Sampling,
    /// Filtering outliers and computing the weighted centroid.
    Computing,
    /// Finished successfully.
    Done,
    /// Aborted by hardware failure or cancellation.
    Failed,
}

impl SessionPhase {
    /// Returns true once the session can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true while the session is doing work.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Sampling | Self::Computing)
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Sampling => write!(f, "Sampling"),
            Self::Computing => write!(f, "Computing"),
            Self::Done => write!(f, "Done"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Snapshot of a running session, published after every collected sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationProgress {
    /// Current phase.
    pub phase: SessionPhase,

    /// Samples collected so far.
    pub samples_collected: u32,

    /// Samples the session will collect in total.
    pub samples_target: u32,

    /// Tightest accuracy seen so far, in meters.
    pub best_accuracy_meters: Option<f64>,
}

impl CalibrationProgress {
    /// Progress for a session that has not started sampling.
    pub fn idle(samples_target: u32) -> Self {
        Self {
            phase: SessionPhase::Idle,
            samples_collected: 0,
            samples_target,
            best_accuracy_meters: None,
        }
    }

    /// Completion percentage (0.0 to 100.0) for progress bars.
    pub fn percent(&self) -> f64 {
        if self.samples_target == 0 {
            return 0.0;
        }
        f64::from(self.samples_collected) / f64::from(self.samples_target) * 100.0
    }
}

/// What a finished calibration session produced.
#[derive(Debug, Clone)]
pub struct CalibrationOutcome {
    /// Confidence-weighted centroid of the kept samples.
    pub centroid: Coordinate,

    /// Best single-sample accuracy observed during the session, in meters.
    pub achieved_accuracy_meters: f64,

    /// Samples that survived outlier filtering.
    pub samples_used: usize,

    /// The persisted correction, present when the session had a target
    /// coordinate to calibrate against.
    pub record: Option<CalibrationRecord>,
}

/// Why a calibration session did not complete.
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    /// Hardware failed mid-session. Partial samples were discarded.
    #[error("calibration aborted: {0}")]
    Aborted(#[from] PositionError),

    /// The session was cancelled before completing.
    #[error("calibration cancelled")]
    Cancelled,

    /// One session at a time: another one is still sampling.
    #[error("a calibration session is already in progress")]
    SessionInProgress,

    /// Persisting the finished record failed.
    #[error("calibration store error: {0}")]
    Store(#[from] StoreError),
}
