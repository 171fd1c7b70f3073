//! Persistent key-value storage seam.
//!
//! Calibration offsets and the last-match record outlive the process, but
//! what actually stores them is the host application's business. This module
//! provides the injection point and an in-process implementation.

mod memory;
mod r#trait;
mod types;

pub use memory::MemoryBackend;
pub use r#trait::KeyValueBackend;
pub use types::StoreError;
