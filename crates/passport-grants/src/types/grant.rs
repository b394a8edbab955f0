//! Persisted grant domain type.
//!
//! A grant is a short-lived authorization artifact (refresh token,
//! authorization code, consent record, device code) kept by the
//! authorization server until it expires or is revoked. The store never
//! interprets [`Grant::data`]; the protocol layer owns its format.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Well-known values for [`Grant::grant_type`].
pub mod grant_types {
    /// OAuth 2.0 authorization code.
    pub const AUTHORIZATION_CODE: &str = "authorization_code";
    /// OAuth 2.0 refresh token.
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// Reference (opaque) access token.
    pub const REFERENCE_TOKEN: &str = "reference_token";
    /// Remembered user consent.
    pub const USER_CONSENT: &str = "user_consent";
    /// Device authorization grant device code.
    pub const DEVICE_CODE: &str = "device_code";
    /// Device authorization grant user code.
    pub const USER_CODE: &str = "user_code";
}

/// A persisted grant.
///
/// `subject_id` and `session_id` are optional; a grant without a subject is
/// only reachable by its key. Empty strings are treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    /// Unique, immutable grant identifier (usually a hashed token handle).
    pub key: String,

    /// Grant classification, e.g. [`grant_types::REFRESH_TOKEN`].
    #[serde(rename = "type")]
    pub grant_type: String,

    /// Owning principal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,

    /// Client application the grant was issued to.
    pub client_id: String,

    /// Login session the grant belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// When the grant was created.
    #[serde(with = "time::serde::rfc3339")]
    pub creation_time: OffsetDateTime,

    /// When the grant expires (None = kept until removed).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub expiration: Option<OffsetDateTime>,

    /// Opaque payload, stored and returned verbatim.
    pub data: String,
}

impl Grant {
    /// Creates a grant without subject, session or expiration, created now.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        grant_type: impl Into<String>,
        client_id: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            grant_type: grant_type.into(),
            subject_id: None,
            client_id: client_id.into(),
            session_id: None,
            creation_time: OffsetDateTime::now_utc(),
            expiration: None,
            data: data.into(),
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[must_use]
    pub fn with_creation_time(mut self, creation_time: OffsetDateTime) -> Self {
        self.creation_time = creation_time;
        self
    }

    #[must_use]
    pub fn with_expiration(mut self, expiration: OffsetDateTime) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// The subject, if set and non-empty.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        non_empty(self.subject_id.as_deref())
    }

    /// The session, if set and non-empty.
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        non_empty(self.session_id.as_deref())
    }

    /// Returns `true` if this grant has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expiration
            .is_some_and(|exp| OffsetDateTime::now_utc() >= exp)
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_builder() {
        let grant = Grant::new("k1", grant_types::REFRESH_TOKEN, "c1", "payload")
            .with_subject("u1")
            .with_session("s1");
        assert_eq!(grant.subject(), Some("u1"));
        assert_eq!(grant.session(), Some("s1"));
        assert_eq!(grant.expiration, None);
    }

    #[test]
    fn test_empty_fields_are_absent() {
        let grant = Grant::new("k1", "t", "c1", "").with_subject("").with_session("");
        assert_eq!(grant.subject(), None);
        assert_eq!(grant.session(), None);
    }

    #[test]
    fn test_is_expired() {
        let now = OffsetDateTime::now_utc();

        let grant = Grant::new("k", "t", "c", "");
        assert!(!grant.is_expired());

        let grant = Grant::new("k", "t", "c", "").with_expiration(now + Duration::hours(1));
        assert!(!grant.is_expired());

        let grant = Grant::new("k", "t", "c", "").with_expiration(now - Duration::minutes(1));
        assert!(grant.is_expired());
    }

    #[test]
    fn test_serialization() {
        let grant = Grant::new("k1", grant_types::AUTHORIZATION_CODE, "c1", "{\"a\":1}")
            .with_subject("u1")
            .with_expiration(OffsetDateTime::now_utc() + Duration::minutes(5));

        let json = serde_json::to_value(&grant).unwrap();
        assert_eq!(json["type"], "authorization_code");
        assert_eq!(json["subjectId"], "u1");
        assert!(json.get("sessionId").is_none());

        let back: Grant = serde_json::from_value(json).unwrap();
        assert_eq!(back, grant);
    }
}
