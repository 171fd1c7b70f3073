//! Position acquisition from platform location hardware.
//!
//! This module defines the hardware seam and the policy layer above it:
//!
//! - [`PositionBackend`] - Platform adapter trait, the only place hardware is touched
//! - [`FixRequest`] - Per-read parameters handed to the backend
//! - [`LocationSample`] - One GPS fix with its quality metadata
//! - [`PositionError`] - Why a fix could not be produced
//! - [`PositionSource`] - Retrying single-shot reads, hardware serialization, watches
//! - [`HardwareSession`] - Exclusive hardware hold for calibration sampling
//! - [`PositionWatch`] - Cancellable continuous subscription handle
//! - [`ScriptedBackend`] - Deterministic backend for tests
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sitefence::position::{PositionSource, PositionSourceConfig};
//!
//! let backend = Arc::new(platform_backend());
//! let source = PositionSource::new(backend, PositionSourceConfig::default());
//!
//! let fix = source.get_once().await?;
//! println!("Here: {} within {}m", fix.coordinate(), fix.accuracy_meters);
//! ```

mod backend;
mod error;
mod sample;
mod scripted;
mod source;
mod watch;

pub use backend::{FixRequest, PositionBackend};
pub use error::PositionError;
pub use sample::LocationSample;
pub use scripted::ScriptedBackend;
pub use source::{HardwareSession, PositionSource, PositionSourceConfig};
pub use watch::PositionWatch;
