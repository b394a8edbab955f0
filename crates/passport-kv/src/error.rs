//! Key-value backend error types.

use std::fmt;

/// Errors that can occur while talking to a key-value backend.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// The backend could not be reached or the connection was lost.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// The backend rejected or failed to execute a command.
    #[error("Command error: {message}")]
    Command {
        /// Description of the command failure.
        message: String,
    },

    /// An operation targeted a key holding a different kind of value.
    #[error("Wrong type for key {key}: expected {expected}, found {found}")]
    WrongType {
        /// The offending key.
        key: String,
        /// The value kind the operation needs.
        expected: &'static str,
        /// The value kind stored under the key.
        found: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl KvError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Command` error.
    #[must_use]
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }

    /// Creates a new `WrongType` error.
    #[must_use]
    pub fn wrong_type(
        key: impl Into<String>,
        expected: &'static str,
        found: impl Into<String>,
    ) -> Self {
        Self::WrongType {
            key: key.into(),
            expected,
            found: found.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Returns `true` if this is a wrong type error.
    #[must_use]
    pub fn is_wrong_type(&self) -> bool {
        matches!(self, Self::WrongType { .. })
    }

    /// Returns `true` if repeating the same call may succeed.
    ///
    /// Wrong-type errors are caused by the data itself and will fail again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Command { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } => ErrorCategory::Infrastructure,
            Self::Command { .. } => ErrorCategory::Command,
            Self::WrongType { .. } => ErrorCategory::Data,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of backend errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Infrastructure/connection error.
    Infrastructure,
    /// Rejected or failed command.
    Command,
    /// Stored data does not have the expected shape.
    Data,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Command => write!(f, "command"),
            Self::Data => write!(f, "data"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Result type for key-value backend operations.
pub type KvResult<T> = Result<T, KvError>;
