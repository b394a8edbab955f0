//! Atomic write batches.
//!
//! A [`WriteBatch`] collects [`KvOp`]s that a backend applies as one
//! indivisible unit through [`KvBackend::execute`](crate::KvBackend::execute).
//! Either every operation takes effect or none does.
//!
//! # Example
//!
//! ```ignore
//! let mut batch = WriteBatch::new();
//! batch
//!     .hash_replace("grant:abc", fields, Some(expires_at))
//!     .set_append("grant:alice", ["grant:abc"], Some(expires_at));
//! backend.execute(batch).await?;
//! ```

use time::OffsetDateTime;

/// A single write operation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvOp {
    /// Replaces the whole hash stored at `key` and sets its expiry.
    ///
    /// `expires_at = None` leaves the hash without a TTL.
    HashReplace {
        key: String,
        fields: Vec<(String, String)>,
        expires_at: Option<OffsetDateTime>,
    },

    /// Adds members to the set at `key` and stretches its lifetime.
    ///
    /// - a set created by this op expires at `expires_at`
    /// - a set that already has a TTL keeps the later of both instants
    /// - a set that already exists without a TTL keeps living forever
    /// - `expires_at = None` removes any TTL from the set
    SetAppend {
        key: String,
        members: Vec<String>,
        expires_at: Option<OffsetDateTime>,
    },

    /// Removes members from the set at `key`. Missing members are ignored.
    SetRemove { key: String, members: Vec<String> },

    /// Deletes `key` regardless of the kind of value stored under it.
    Delete { key: String },
}

impl KvOp {
    /// The key this operation writes to.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::HashReplace { key, .. }
            | Self::SetAppend { key, .. }
            | Self::SetRemove { key, .. }
            | Self::Delete { key } => key,
        }
    }

    /// The value kind this operation requires at its key, if any.
    #[must_use]
    pub fn expected_kind(&self) -> Option<&'static str> {
        match self {
            Self::HashReplace { .. } => Some(crate::HASH_KIND),
            Self::SetAppend { .. } | Self::SetRemove { .. } => Some(crate::SET_KIND),
            Self::Delete { .. } => None,
        }
    }
}

/// An ordered list of write operations applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<KvOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a [`KvOp::HashReplace`].
    pub fn hash_replace(
        &mut self,
        key: impl Into<String>,
        fields: Vec<(String, String)>,
        expires_at: Option<OffsetDateTime>,
    ) -> &mut Self {
        self.ops.push(KvOp::HashReplace {
            key: key.into(),
            fields,
            expires_at,
        });
        self
    }

    /// Appends a [`KvOp::SetAppend`].
    pub fn set_append<I, S>(
        &mut self,
        key: impl Into<String>,
        members: I,
        expires_at: Option<OffsetDateTime>,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ops.push(KvOp::SetAppend {
            key: key.into(),
            members: members.into_iter().map(Into::into).collect(),
            expires_at,
        });
        self
    }

    /// Appends a [`KvOp::SetRemove`]. Empty member lists are skipped.
    pub fn set_remove<I, S>(&mut self, key: impl Into<String>, members: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: Vec<String> = members.into_iter().map(Into::into).collect();
        if !members.is_empty() {
            self.ops.push(KvOp::SetRemove {
                key: key.into(),
                members,
            });
        }
        self
    }

    /// Appends a [`KvOp::Delete`].
    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(KvOp::Delete { key: key.into() });
        self
    }

    /// Number of operations in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if the batch holds no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The operations in application order.
    #[must_use]
    pub fn ops(&self) -> &[KvOp] {
        &self.ops
    }

    /// Consumes the batch, returning its operations.
    #[must_use]
    pub fn into_ops(self) -> Vec<KvOp> {
        self.ops
    }
}
