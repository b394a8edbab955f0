//! Key derivation for primary records and secondary indexes.
//!
//! Every key is the configured prefix followed by the identifying fields:
//!
//! | Key | Layout |
//! |-----|--------|
//! | primary record | `{prefix}{key}` |
//! | subject index | `{prefix}{subject}` |
//! | subject+client index | `{prefix}{subject}:{client}` |
//! | subject+client+type index | `{prefix}{subject}:{client}:{type}` |
//! | subject+client+session index | `{prefix}{subject}:{client}:{session}` |
//!
//! Derivation is pure. Empty components still produce a well-formed key;
//! deciding whether such a key is meaningful is up to the caller.

use crate::types::{Grant, GrantFilter};

/// Derives backend keys under a fixed prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyScheme {
    prefix: String,
}

impl KeyScheme {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of the hash holding a grant's fields.
    #[must_use]
    pub fn primary_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    #[must_use]
    pub fn subject_key(&self, subject_id: &str) -> String {
        format!("{}{subject_id}", self.prefix)
    }

    #[must_use]
    pub fn client_key(&self, subject_id: &str, client_id: &str) -> String {
        format!("{}{subject_id}:{client_id}", self.prefix)
    }

    #[must_use]
    pub fn type_key(&self, subject_id: &str, client_id: &str, grant_type: &str) -> String {
        format!("{}{subject_id}:{client_id}:{grant_type}", self.prefix)
    }

    #[must_use]
    pub fn session_key(&self, subject_id: &str, client_id: &str, session_id: &str) -> String {
        format!("{}{subject_id}:{client_id}:{session_id}", self.prefix)
    }

    /// Key of the index selected by `scope`.
    #[must_use]
    pub fn index_key(&self, scope: &IndexScope<'_>) -> String {
        match *scope {
            IndexScope::Subject { subject_id } => self.subject_key(subject_id),
            IndexScope::Client {
                subject_id,
                client_id,
            } => self.client_key(subject_id, client_id),
            IndexScope::Type {
                subject_id,
                client_id,
                grant_type,
            } => self.type_key(subject_id, client_id, grant_type),
            IndexScope::Session {
                subject_id,
                client_id,
                session_id,
            } => self.session_key(subject_id, client_id, session_id),
        }
    }

    /// Every index `grant` belongs to.
    ///
    /// Grants without a subject are not indexed. The type index is always
    /// present for indexed grants; the session index only when a session is
    /// set.
    #[must_use]
    pub fn grant_index_keys(&self, grant: &Grant) -> Vec<String> {
        let Some(subject_id) = grant.subject() else {
            return Vec::new();
        };
        let mut keys = vec![
            self.subject_key(subject_id),
            self.client_key(subject_id, &grant.client_id),
            self.type_key(subject_id, &grant.client_id, &grant.grant_type),
        ];
        if let Some(session_id) = grant.session() {
            keys.push(self.session_key(subject_id, &grant.client_id, session_id));
        }
        keys
    }

    /// The indexes a filter can name directly.
    ///
    /// Used to clean up references whose records are gone and whose own
    /// fields are therefore unknown.
    #[must_use]
    pub fn filter_index_keys(&self, filter: &GrantFilter) -> Vec<String> {
        let subject_id = filter.subject_id.as_str();
        let mut keys = vec![self.subject_key(subject_id)];
        if let Some(client_id) = filter.client() {
            keys.push(self.client_key(subject_id, client_id));
            if let Some(grant_type) = filter.grant_type() {
                keys.push(self.type_key(subject_id, client_id, grant_type));
            }
            if let Some(session_id) = filter.session() {
                keys.push(self.session_key(subject_id, client_id, session_id));
            }
        }
        keys
    }
}

/// One secondary index, identified by the fields it is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexScope<'a> {
    Subject {
        subject_id: &'a str,
    },
    Client {
        subject_id: &'a str,
        client_id: &'a str,
    },
    Type {
        subject_id: &'a str,
        client_id: &'a str,
        grant_type: &'a str,
    },
    Session {
        subject_id: &'a str,
        client_id: &'a str,
        session_id: &'a str,
    },
}

impl<'a> IndexScope<'a> {
    /// Picks the most specific index a filter can use.
    ///
    /// Precedence: session > type > client > subject. Type and session
    /// indexes are keyed under a client, so without a client the subject
    /// index is the only choice.
    #[must_use]
    pub fn resolve(filter: &'a GrantFilter) -> Self {
        let subject_id = filter.subject_id.as_str();
        let Some(client_id) = filter.client() else {
            return Self::Subject { subject_id };
        };
        if let Some(session_id) = filter.session() {
            Self::Session {
                subject_id,
                client_id,
                session_id,
            }
        } else if let Some(grant_type) = filter.grant_type() {
            Self::Type {
                subject_id,
                client_id,
                grant_type,
            }
        } else {
            Self::Client {
                subject_id,
                client_id,
            }
        }
    }

    /// Short label for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Subject { .. } => "subject",
            Self::Client { .. } => "subject_client",
            Self::Type { .. } => "subject_client_type",
            Self::Session { .. } => "subject_client_session",
        }
    }
}
