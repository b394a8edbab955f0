//! Grant store configuration.

use serde::{Deserialize, Serialize};

use crate::error::GrantStoreError;

/// Configuration for [`IndexedGrantStore`](crate::IndexedGrantStore).
///
/// # Example (TOML)
///
/// ```toml
/// key_prefix = "passport:"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GrantStoreConfig {
    /// Prepended to every primary and index key.
    ///
    /// Gives several tenants (or environments) sharing one backend their own
    /// key space. Empty by default.
    pub key_prefix: String,
}

impl GrantStoreConfig {
    /// Creates a configuration with the given key prefix.
    #[must_use]
    pub fn with_prefix(key_prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: key_prefix.into(),
        }
    }

    /// Parses a configuration from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `GrantStoreError::Validation` for malformed TOML or an
    /// invalid prefix.
    pub fn from_toml_str(input: &str) -> Result<Self, GrantStoreError> {
        let config: Self = toml::from_str(input)
            .map_err(|e| GrantStoreError::validation(format!("invalid grant store config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns `GrantStoreError::Validation` if the prefix contains
    /// whitespace or control characters.
    pub fn validate(&self) -> Result<(), GrantStoreError> {
        if self
            .key_prefix
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(GrantStoreError::validation(
                "key_prefix must not contain whitespace or control characters",
            ));
        }
        Ok(())
    }
}
