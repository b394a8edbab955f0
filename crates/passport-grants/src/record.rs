//! Hash encoding of a grant's primary record.
//!
//! A record is a hash with exactly these fields:
//!
//! | Field | Value |
//! |-------|-------|
//! | `key` | grant key |
//! | `type` | grant type |
//! | `sub` | subject id, empty when absent |
//! | `client` | client id |
//! | `session` | session id, empty when absent |
//! | `create` | creation time, RFC 3339 |
//! | `expire` | expiration, RFC 3339, empty when absent |
//! | `data` | opaque payload |
//!
//! Decoding checks the field set before reading any value, so a record
//! written by something else is rejected as a whole.

use std::collections::HashMap;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::GrantStoreError;
use crate::types::Grant;

const KEY: &str = "key";
const TYPE: &str = "type";
const SUBJECT: &str = "sub";
const CLIENT: &str = "client";
const SESSION: &str = "session";
const CREATED: &str = "create";
const EXPIRES: &str = "expire";
const DATA: &str = "data";

/// All record fields, in write order.
pub const FIELDS: [&str; 8] = [KEY, TYPE, SUBJECT, CLIENT, SESSION, CREATED, EXPIRES, DATA];

/// Encodes a grant as hash fields.
///
/// # Errors
///
/// Returns `GrantStoreError::Serialization` if a timestamp cannot be
/// formatted as RFC 3339 (years outside 0..=9999).
pub fn encode(grant: &Grant) -> Result<Vec<(String, String)>, GrantStoreError> {
    let created = format_time(grant.creation_time)?;
    let expires = grant.expiration.map(format_time).transpose()?.unwrap_or_default();

    Ok(vec![
        (KEY.to_string(), grant.key.clone()),
        (TYPE.to_string(), grant.grant_type.clone()),
        (SUBJECT.to_string(), grant.subject().unwrap_or_default().to_string()),
        (CLIENT.to_string(), grant.client_id.clone()),
        (SESSION.to_string(), grant.session().unwrap_or_default().to_string()),
        (CREATED.to_string(), created),
        (EXPIRES.to_string(), expires),
        (DATA.to_string(), grant.data.clone()),
    ])
}

/// Decodes hash fields read from the backend.
///
/// An empty map is a missing record and yields `Ok(None)`.
///
/// # Errors
///
/// Returns `GrantStoreError::Serialization` if the field set differs from
/// [`FIELDS`] or a timestamp does not parse.
pub fn decode(mut fields: HashMap<String, String>) -> Result<Option<Grant>, GrantStoreError> {
    if fields.is_empty() {
        return Ok(None);
    }
    if fields.len() != FIELDS.len() {
        return Err(GrantStoreError::serialization(format!(
            "expected {} record fields, found {}",
            FIELDS.len(),
            fields.len()
        )));
    }

    let mut take = |name: &str| {
        fields
            .remove(name)
            .ok_or_else(|| GrantStoreError::serialization(format!("record field '{name}' missing")))
    };

    let key = take(KEY)?;
    let grant_type = take(TYPE)?;
    let subject = take(SUBJECT)?;
    let client_id = take(CLIENT)?;
    let session = take(SESSION)?;
    let created = take(CREATED)?;
    let expires = take(EXPIRES)?;
    let data = take(DATA)?;

    Ok(Some(Grant {
        key,
        grant_type,
        subject_id: Some(subject).filter(|s| !s.is_empty()),
        client_id,
        session_id: Some(session).filter(|s| !s.is_empty()),
        creation_time: parse_time(CREATED, &created)?,
        expiration: if expires.is_empty() {
            None
        } else {
            Some(parse_time(EXPIRES, &expires)?)
        },
        data,
    }))
}

fn format_time(value: OffsetDateTime) -> Result<String, GrantStoreError> {
    value
        .format(&Rfc3339)
        .map_err(|e| GrantStoreError::serialization(format!("cannot format timestamp: {e}")))
}

fn parse_time(field: &str, value: &str) -> Result<OffsetDateTime, GrantStoreError> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|e| {
        GrantStoreError::serialization(format!("record field '{field}' is not RFC 3339: {e}"))
    })
}
