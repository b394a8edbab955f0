//! Grant lookup filter.

use serde::{Deserialize, Serialize};

use super::grant::{Grant, non_empty};
use crate::error::GrantStoreError;

/// Selects grants by subject and, optionally, client, type and session.
///
/// The subject is mandatory: every lookup starts from one of the subject's
/// indexes. Empty optional components are treated as absent.
///
/// ```ignore
/// let filter = GrantFilter::for_subject("alice")
///     .with_client("web-app")
///     .with_type(grant_types::REFRESH_TOKEN);
/// let grants = store.get_all(&filter).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantFilter {
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub grant_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl GrantFilter {
    /// Creates a filter matching every grant of `subject_id`.
    #[must_use]
    pub fn for_subject(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    #[must_use]
    pub fn with_type(mut self, grant_type: impl Into<String>) -> Self {
        self.grant_type = Some(grant_type.into());
        self
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[must_use]
    pub fn client(&self) -> Option<&str> {
        non_empty(self.client_id.as_deref())
    }

    #[must_use]
    pub fn grant_type(&self) -> Option<&str> {
        non_empty(self.grant_type.as_deref())
    }

    #[must_use]
    pub fn session(&self) -> Option<&str> {
        non_empty(self.session_id.as_deref())
    }

    /// Rejects filters without a subject.
    ///
    /// # Errors
    ///
    /// Returns `GrantStoreError::Validation` if `subject_id` is blank.
    pub fn validate(&self) -> Result<(), GrantStoreError> {
        if self.subject_id.trim().is_empty() {
            return Err(GrantStoreError::validation(
                "grant filter requires a non-empty subject_id",
            ));
        }
        Ok(())
    }

    /// Returns `true` if `grant` satisfies every component of this filter.
    #[must_use]
    pub fn matches(&self, grant: &Grant) -> bool {
        grant.subject() == Some(self.subject_id.as_str())
            && self.client().is_none_or(|c| grant.client_id == c)
            && self.grant_type().is_none_or(|t| grant.grant_type == t)
            && self.session().is_none_or(|s| grant.session() == Some(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(subject: &str, client: &str, grant_type: &str, session: Option<&str>) -> Grant {
        let grant = Grant::new("k", grant_type, client, "").with_subject(subject);
        match session {
            Some(s) => grant.with_session(s),
            None => grant,
        }
    }

    #[test]
    fn test_validate() {
        assert!(GrantFilter::for_subject("u1").validate().is_ok());
        assert!(GrantFilter::for_subject("").validate().unwrap_err().is_validation());
        assert!(GrantFilter::for_subject("  ").validate().is_err());
        assert!(GrantFilter::default().with_client("c").validate().is_err());
    }

    #[test]
    fn test_matches_each_component() {
        let g = grant("u1", "c1", "refresh_token", Some("s1"));

        assert!(GrantFilter::for_subject("u1").matches(&g));
        assert!(!GrantFilter::for_subject("u2").matches(&g));
        assert!(GrantFilter::for_subject("u1").with_client("c1").matches(&g));
        assert!(!GrantFilter::for_subject("u1").with_client("c2").matches(&g));
        assert!(GrantFilter::for_subject("u1").with_type("refresh_token").matches(&g));
        assert!(!GrantFilter::for_subject("u1").with_type("user_consent").matches(&g));
        assert!(GrantFilter::for_subject("u1").with_session("s1").matches(&g));
        assert!(!GrantFilter::for_subject("u1").with_session("s2").matches(&g));
    }

    #[test]
    fn test_session_filter_excludes_sessionless_grants() {
        let g = grant("u1", "c1", "refresh_token", None);
        assert!(!GrantFilter::for_subject("u1").with_session("s1").matches(&g));
    }

    #[test]
    fn test_empty_components_are_ignored() {
        let g = grant("u1", "c1", "refresh_token", None);
        let filter = GrantFilter::for_subject("u1").with_client("").with_type("");
        assert_eq!(filter.client(), None);
        assert!(filter.matches(&g));
    }
}
