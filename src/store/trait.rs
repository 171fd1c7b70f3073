//! Key-value backend trait for dependency injection.

use std::sync::Arc;

use async_trait::async_trait;

use super::types::StoreError;

/// Persistent key-value storage abstraction.
///
/// The engine persists small JSON records (calibration offsets, the last
/// matched site) through this seam. The host application decides what backs
/// it: browser local storage, a mobile keychain, SQLite, or the in-process
/// [`MemoryBackend`](super::MemoryBackend).
///
/// Implementations must make `put` atomic per key; the engine never needs
/// multi-key transactions.
///
/// # Example
///
/// ```
/// use sitefence::store::{KeyValueBackend, MemoryBackend};
///
/// # async fn demo() -> Result<(), sitefence::store::StoreError> {
/// let store = MemoryBackend::new();
/// store.put("greeting", b"hello".to_vec()).await?;
///
/// assert_eq!(store.get("greeting").await?, Some(b"hello".to_vec()));
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Remove the value under `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

// Allow Arc<B> to be used wherever a backend is expected
#[async_trait]
impl<B: KeyValueBackend + ?Sized> KeyValueBackend for Arc<B> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        (**self).put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }
}
