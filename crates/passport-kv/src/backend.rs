//! The key-value backend trait.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::batch::WriteBatch;
use crate::error::KvResult;

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist (or has already expired).
    Missing,
    /// The key exists and never expires.
    Persistent,
    /// The key expires after the given duration.
    ExpiresIn(Duration),
}

impl KeyTtl {
    /// Returns `true` if the key exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        !matches!(self, Self::Missing)
    }
}

/// A key-value store offering hashes, sets, per-key TTLs and atomic batches.
///
/// This is the only surface the grant store needs from its backend.
/// Implementations must be thread-safe and must hide expired keys from
/// every read: an expired key behaves exactly like a missing one.
///
/// # Implementations
///
/// - [`MemoryKv`](crate::MemoryKv) - in-process backend for tests and
///   single-instance deployments
/// - `passport-kv-redis` - Redis backend
#[async_trait]
pub trait KvBackend: Send + Sync {
    // ==================== Reads ====================

    /// Returns every field of the hash at `key`.
    ///
    /// A missing key yields an empty map.
    ///
    /// # Errors
    ///
    /// Returns `KvError::WrongType` if `key` holds a set.
    async fn hash_get_all(&self, key: &str) -> KvResult<HashMap<String, String>>;

    /// Fetches several hashes in a single round trip.
    ///
    /// The result is positional: entry `i` belongs to `keys[i]` and is empty
    /// when that key is missing.
    async fn hash_get_all_many(&self, keys: &[String]) -> KvResult<Vec<HashMap<String, String>>>;

    /// Returns the members of the set at `key` in no particular order.
    ///
    /// A missing key yields an empty list.
    async fn set_members(&self, key: &str) -> KvResult<Vec<String>>;

    /// Returns the remaining lifetime of `key`.
    async fn ttl(&self, key: &str) -> KvResult<KeyTtl>;

    // ==================== Writes ====================

    /// Applies every operation of `batch` as one indivisible unit.
    ///
    /// The batch is checked before anything is written; if any operation
    /// would hit a key of the wrong kind the call fails and nothing changes.
    async fn execute(&self, batch: WriteBatch) -> KvResult<()>;

    /// Deletes `key`. Returns `true` if the key existed.
    async fn delete(&self, key: &str) -> KvResult<bool>;

    // ==================== Metadata ====================

    /// Checks that the backend is reachable.
    async fn ping(&self) -> KvResult<()>;

    /// Returns the name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
