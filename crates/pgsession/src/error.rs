//! Error types for pgsession

use thiserror::Error;
use tokio_postgres::error::SqlState;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Boxed error raised by a [`Connection`](crate::Connection) or
/// [`ConnectionPool`](crate::ConnectionPool) implementation.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for session operations
#[derive(Debug, Error)]
pub enum SessionError {
    /// Acquiring a connection from the pool failed, or the acquired connection was unusable.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The driver rejected or failed a statement.
    #[error("Execution error: {0}")]
    Execution(#[source] DriverError),

    /// The session (or its cursor) was already closed.
    #[error("Session is closed")]
    SessionClosed,

    /// A merge value cannot be rendered as an inline SQL literal.
    #[error("Cannot render {kind} value for column '{column}' as a SQL literal")]
    MalformedLiteral { column: String, kind: &'static str },

    /// Statement arguments are inconsistent.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Row decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),
}

impl SessionError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn malformed_literal(column: &str, kind: &'static str) -> Self {
        Self::MalformedLiteral {
            column: column.to_string(),
            kind,
        }
    }

    /// Check if this error means the session can no longer be used
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::SessionClosed)
    }

    /// The SQLSTATE reported by Postgres, when the failure came from the server.
    pub fn sql_state(&self) -> Option<&SqlState> {
        match self {
            Self::Execution(err) => err
                .downcast_ref::<tokio_postgres::Error>()
                .and_then(tokio_postgres::Error::code),
            _ => None,
        }
    }

    /// Check if this is a unique constraint violation (23505)
    pub fn is_unique_violation(&self) -> bool {
        self.sql_state() == Some(&SqlState::UNIQUE_VIOLATION)
    }

    /// Check if this is a foreign key violation (23503)
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sql_state() == Some(&SqlState::FOREIGN_KEY_VIOLATION)
    }

    /// Check if this is a check constraint violation (23514)
    pub fn is_check_violation(&self) -> bool {
        self.sql_state() == Some(&SqlState::CHECK_VIOLATION)
    }
}

impl From<tokio_postgres::Error> for SessionError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self::Execution(Box::new(err))
    }
}
