//! GPS calibration sessions and offset records.
//!
//! Consumer GPS under a roof or between buildings carries a systematic
//! bias of tens of meters. A calibration session measures that bias while
//! the device is known to be at a site: it collects a short burst of
//! samples, drops the worst, and computes an accuracy-weighted centroid.
//! The difference between the site's surveyed coordinate and the centroid
//! becomes a [`CalibrationRecord`] that later validations add to raw fixes.
//!
//! # Architecture
//!
//! ```text
//! Calibrator::begin ──> SessionWorker (spawned)
//!                          │ holds HardwareSession for the whole burst
//!                          │ sample × N ──> progress (watch channel)
//!                          │ select + weighted centroid
//!                          ▼
//!                       CalibrationStore ──> KeyValueBackend
//!
//! caller <── CalibrationHandle (progress / cancel / wait)
//! ```
//!
//! Sessions run one at a time; a second [`Calibrator::begin`] while one is
//! active fails fast with [`CalibrationError::SessionInProgress`]. A
//! session either persists a complete record or nothing at all.
//!
//! # Example
//!
//! ```ignore
//! let calibrator = Calibrator::new(source, store, CalibratorConfig::default(), token);
//! let mut handle = calibrator.begin("hq", Some(site_coordinate))?;
//! let outcome = handle.wait().await?;
//! println!("calibrated to ±{:.0}m", outcome.achieved_accuracy_meters);
//! ```

mod centroid;
mod handle;
mod session;
mod store;
mod types;

pub use handle::CalibrationHandle;
pub use session::{Calibrator, CalibratorConfig};
pub use store::CalibrationStore;
pub use types::{
    CalibrationError, CalibrationOutcome, CalibrationProgress, CalibrationRecord, SessionPhase,
};
