//! # passport-grants
//!
//! Persisted grant store for the Passport authorization server.
//!
//! Grants (refresh tokens, authorization codes, consent records, device
//! codes) are stored as one hash record each in a key-value backend and are
//! reachable by key or through four secondary indexes:
//!
//! - subject
//! - subject + client
//! - subject + client + type
//! - subject + client + session
//!
//! Records and indexes expire with the grants they hold. Bulk revocation is
//! available along every index.
//!
//! ## Modules
//!
//! - [`config`] - Store configuration
//! - [`error`] - Error taxonomy
//! - [`keys`] - Record and index key derivation
//! - [`record`] - Hash encoding of a grant
//! - [`store`] - The [`PersistedGrantStore`] trait and [`IndexedGrantStore`]
//! - [`types`] - [`Grant`] and [`GrantFilter`]

pub mod config;
pub mod error;
pub mod keys;
pub mod record;
pub mod store;
pub mod types;

pub use config::GrantStoreConfig;
pub use error::{ErrorCategory, GrantStoreError};
pub use keys::{IndexScope, KeyScheme};
pub use store::{IndexedGrantStore, PersistedGrantStore};
pub use types::{Grant, GrantFilter, grant_types};

/// Type alias for grant store results.
pub type GrantResult<T> = Result<T, GrantStoreError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use passport_grants::prelude::*;
/// ```
pub mod prelude {
    pub use crate::GrantResult;
    pub use crate::config::GrantStoreConfig;
    pub use crate::error::{ErrorCategory, GrantStoreError};
    pub use crate::store::{IndexedGrantStore, PersistedGrantStore};
    pub use crate::types::{Grant, GrantFilter, grant_types};
}
