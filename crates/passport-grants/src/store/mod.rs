//! Persisted grant storage.
//!
//! [`PersistedGrantStore`] is the interface the protocol layer talks to.
//! [`IndexedGrantStore`] implements it on top of any
//! [`KvBackend`](passport_kv::KvBackend): every grant is one hash record plus
//! a membership in up to four index sets.
//!
//! # Consistency
//!
//! The store keeps no state of its own. `store`, `remove_all` and the
//! dangling-reference cleanup each go to the backend as one atomic
//! [`WriteBatch`](passport_kv::WriteBatch). Reads are not coordinated with
//! writes; an index member whose record has vanished is treated as
//! dangling and pruned on the next read of that index.

use std::fmt;

use async_trait::async_trait;
use passport_kv::{DynKvBackend, KvError};
use tracing::error;

use crate::GrantResult;
use crate::config::GrantStoreConfig;
use crate::error::GrantStoreError;
use crate::keys::KeyScheme;
use crate::types::{Grant, GrantFilter};

mod maintainer;
mod query;

/// Storage trait for persisted grants.
///
/// # Implementations
///
/// - [`IndexedGrantStore`] - indexed store over a key-value backend
#[async_trait]
pub trait PersistedGrantStore: Send + Sync {
    /// Stores a grant, replacing any grant with the same key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or the backend write fails.
    /// Nothing is written on failure.
    async fn store(&self, grant: &Grant) -> GrantResult<()>;

    /// Finds a grant by key.
    ///
    /// Returns `None` if the grant does not exist, has expired, or its
    /// record is corrupt.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    async fn get(&self, key: &str) -> GrantResult<Option<Grant>>;

    /// Returns every live grant matching `filter`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `GrantStoreError::Validation` if the filter has no subject.
    async fn get_all(&self, filter: &GrantFilter) -> GrantResult<Vec<Grant>>;

    /// Returns every live grant of a subject.
    ///
    /// An empty or blank subject yields an empty list.
    async fn get_all_by_subject(&self, subject_id: &str) -> GrantResult<Vec<Grant>>;

    /// Deletes a grant by key. Deleting a missing grant is not an error.
    async fn remove(&self, key: &str) -> GrantResult<()>;

    /// Revokes every grant a subject holds for a client.
    ///
    /// Only grants whose own subject and client match are deleted. Their
    /// references in the subject and session indexes are pruned by later
    /// reads. Does nothing when either argument is empty.
    async fn remove_all_by_client(&self, subject_id: &str, client_id: &str) -> GrantResult<()>;

    /// Revokes every grant of one type a subject holds for a client.
    ///
    /// Does nothing when any argument is empty.
    async fn remove_all_by_type(
        &self,
        subject_id: &str,
        client_id: &str,
        grant_type: &str,
    ) -> GrantResult<()>;

    /// Revokes every grant matching `filter` and unlinks it from all of its
    /// indexes.
    ///
    /// # Errors
    ///
    /// Returns `GrantStoreError::Validation` if the filter has no subject.
    async fn remove_all(&self, filter: &GrantFilter) -> GrantResult<()>;
}

/// Grant store keeping secondary indexes in a key-value backend.
///
/// Cheap to clone; clones share the backend.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use passport_grants::prelude::*;
/// use passport_kv::MemoryKv;
///
/// let store = IndexedGrantStore::new(Arc::new(MemoryKv::new()), &GrantStoreConfig::default())?;
/// store.store(&grant).await?;
/// let grants = store.get_all(&GrantFilter::for_subject("alice")).await?;
/// ```
#[derive(Clone)]
pub struct IndexedGrantStore {
    backend: DynKvBackend,
    keys: KeyScheme,
}

impl IndexedGrantStore {
    /// Creates a store over `backend`.
    ///
    /// # Errors
    ///
    /// Returns `GrantStoreError::Validation` if the configuration is invalid.
    pub fn new(backend: DynKvBackend, config: &GrantStoreConfig) -> GrantResult<Self> {
        config.validate()?;
        Ok(Self {
            backend,
            keys: KeyScheme::new(config.key_prefix.clone()),
        })
    }

    /// The key scheme used for records and indexes.
    #[must_use]
    pub fn keys(&self) -> &KeyScheme {
        &self.keys
    }

    /// The underlying backend.
    #[must_use]
    pub fn backend(&self) -> &DynKvBackend {
        &self.backend
    }
}

impl fmt::Debug for IndexedGrantStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedGrantStore")
            .field("backend", &self.backend.backend_name())
            .field("keys", &self.keys)
            .finish()
    }
}

#[async_trait]
impl PersistedGrantStore for IndexedGrantStore {
    async fn store(&self, grant: &Grant) -> GrantResult<()> {
        self.store_grant(grant).await
    }

    async fn get(&self, key: &str) -> GrantResult<Option<Grant>> {
        self.get_grant(key).await
    }

    async fn get_all(&self, filter: &GrantFilter) -> GrantResult<Vec<Grant>> {
        self.find_grants(filter).await
    }

    async fn get_all_by_subject(&self, subject_id: &str) -> GrantResult<Vec<Grant>> {
        if subject_id.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.find_grants(&GrantFilter::for_subject(subject_id)).await
    }

    async fn remove(&self, key: &str) -> GrantResult<()> {
        self.remove_grant(key).await
    }

    async fn remove_all_by_client(&self, subject_id: &str, client_id: &str) -> GrantResult<()> {
        if subject_id.is_empty() || client_id.is_empty() {
            return Ok(());
        }
        self.revoke_index(&GrantFilter::for_subject(subject_id).with_client(client_id))
            .await
    }

    async fn remove_all_by_type(
        &self,
        subject_id: &str,
        client_id: &str,
        grant_type: &str,
    ) -> GrantResult<()> {
        if subject_id.is_empty() || client_id.is_empty() || grant_type.is_empty() {
            return Ok(());
        }
        let scope = GrantFilter::for_subject(subject_id)
            .with_client(client_id)
            .with_type(grant_type);
        self.revoke_index(&scope).await
    }

    async fn remove_all(&self, filter: &GrantFilter) -> GrantResult<()> {
        self.revoke_matching(filter).await
    }
}

/// Identity fields attached to backend failure logs.
#[derive(Debug, Default, Clone, Copy)]
struct LogScope<'a> {
    subject_id: Option<&'a str>,
    client_id: Option<&'a str>,
    grant_type: Option<&'a str>,
    session_id: Option<&'a str>,
}

impl<'a> LogScope<'a> {
    fn of_grant(grant: &'a Grant) -> Self {
        Self {
            subject_id: grant.subject(),
            client_id: Some(grant.client_id.as_str()),
            grant_type: Some(grant.grant_type.as_str()),
            session_id: grant.session(),
        }
    }

    fn of_filter(filter: &'a GrantFilter) -> Self {
        Self {
            subject_id: Some(filter.subject_id.as_str()),
            client_id: filter.client(),
            grant_type: filter.grant_type(),
            session_id: filter.session(),
        }
    }

    /// Logs a backend failure and wraps it for the caller.
    fn fail(self, operation: &'static str, source: KvError) -> GrantStoreError {
        error!(
            operation,
            subject_id = self.subject_id,
            client_id = self.client_id,
            grant_type = self.grant_type,
            session_id = self.session_id,
            error = %source,
            "Grant store backend call failed"
        );
        GrantStoreError::storage(operation, source)
    }
}
