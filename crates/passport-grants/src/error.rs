//! Grant store error types.

use std::fmt;

use passport_kv::KvError;

/// Errors that can occur during grant store operations.
#[derive(Debug, thiserror::Error)]
pub enum GrantStoreError {
    /// The request is malformed (e.g. a filter without a subject).
    ///
    /// Raised before any backend I/O.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what is wrong with the request.
        message: String,
    },

    /// The backend failed or could not be reached.
    #[error("Storage unavailable during {operation}: {source}")]
    StorageUnavailable {
        /// The store operation that was running.
        operation: &'static str,
        /// The backend error.
        #[source]
        source: KvError,
    },

    /// A stored record does not have the expected shape.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the mismatch.
        message: String,
    },
}

impl GrantStoreError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `StorageUnavailable` error.
    #[must_use]
    pub fn storage(operation: &'static str, source: KvError) -> Self {
        Self::StorageUnavailable { operation, source }
    }

    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a validation error.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns `true` if this is a storage error.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }

    /// Returns `true` if this is a serialization error.
    #[must_use]
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    /// Returns `true` if the caller may retry the same call.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StorageUnavailable { source, .. } => source.is_retryable(),
            Self::Validation { .. } | Self::Serialization { .. } => false,
        }
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::StorageUnavailable { .. } => ErrorCategory::Infrastructure,
            Self::Serialization { .. } => ErrorCategory::Data,
        }
    }
}

/// Categories of grant store errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Validation error.
    Validation,
    /// Infrastructure/backend error.
    Infrastructure,
    /// Corrupt stored data.
    Data,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Data => write!(f, "data"),
        }
    }
}
