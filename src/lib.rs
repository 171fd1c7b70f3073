//! SiteFence - Adaptive geofence validation and GPS calibration
//!
//! This library decides, from a noisy consumer-GPS fix, whether a device
//! is physically present at one of a set of registered work sites, and
//! improves fix quality over repeated use through persisted per-site
//! calibration. It is the location engine behind a time-and-attendance
//! portal's clock-in flow.
//!
//! # High-Level API
//!
//! For most use cases, the [`engine`] module provides the complete facade:
//!
//! ```ignore
//! use sitefence::engine::{EngineConfig, GeofenceEngine};
//!
//! let engine = GeofenceEngine::new(position_backend, kv_store, EngineConfig::mobile());
//!
//! // Clock-in attempt
//! let result = engine.validate(&sites).await?;
//!
//! // One-time setup while standing at the site
//! let mut session = engine.calibrate("hq", Some(site_coordinate))?;
//! let outcome = session.wait().await?;
//! ```
//!
//! Platform integration happens at two seams: implement
//! [`position::PositionBackend`] over the platform's location API and
//! [`store::KeyValueBackend`] over any persistent key-value storage.

pub mod calibration;
pub mod engine;
pub mod fetch;
pub mod geo;
pub mod position;
pub mod resolve;
pub mod site_change;
pub mod store;
pub mod time;

/// Version of the SiteFence library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_geo_module_exists() {
        // Verify geo module is accessible
        use crate::geo::{distance_meters, Coordinate};
        let distance = distance_meters(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.0));
        assert_eq!(distance, 0.0);
    }
}
