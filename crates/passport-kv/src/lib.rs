//! # passport-kv
//!
//! Key-value backend abstraction for the Passport grant store.
//!
//! The grant store needs very little from its backend: hashes for primary
//! records, sets for secondary indexes, absolute per-key expiry and a way to
//! apply several writes atomically. [`KvBackend`] captures exactly that, and
//! [`WriteBatch`] carries the atomic writes.
//!
//! ## Backends
//!
//! - [`MemoryKv`] - in-process backend, provided here
//! - `passport-kv-redis` - Redis backend over a `deadpool-redis` pool
//!
//! ## Example
//!
//! ```ignore
//! use passport_kv::{KvBackend, MemoryKv, WriteBatch};
//!
//! let kv = MemoryKv::new();
//! let mut batch = WriteBatch::new();
//! batch.set_append("index", ["member"], None);
//! kv.execute(batch).await?;
//! assert_eq!(kv.set_members("index").await?, vec!["member"]);
//! ```

mod backend;
pub mod batch;
mod error;
pub mod memory;

pub use backend::{KeyTtl, KvBackend};
pub use batch::{KvOp, WriteBatch};
pub use error::{ErrorCategory, KvError, KvResult};
pub use memory::MemoryKv;

/// Kind name of a hash value, as reported in [`KvError::WrongType`].
pub const HASH_KIND: &str = "hash";

/// Kind name of a set value, as reported in [`KvError::WrongType`].
pub const SET_KIND: &str = "set";

/// Kind name of a missing key.
pub const NONE_KIND: &str = "none";

/// Type alias for a shareable backend instance.
pub type DynKvBackend = std::sync::Arc<dyn KvBackend>;
