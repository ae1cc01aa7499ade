//! Error types for the Strand engine and client.
//!
//! Every public operation returns `Result<T>` rather than panicking; the
//! one exception is invariant violations (indexes out of sync, HLC going
//! backwards), which are programmer errors and are expected to abort the
//! process rather than be handled.

use thiserror::Error;

/// The discriminant half of the `{err, kind, message}` result shape.
///
/// Kept separate from [`Error`] so callers that only need to branch on the
/// failure category don't have to match on the full variant set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Required field missing, wrong runtime type, or a reserved field used.
    Validation,
    /// A query references a field or filter not permitted by the schema.
    SchemaMismatch,
    /// A valid request uses a feature the current store backend lacks.
    NotImplemented,
    /// Transport-level failure: not connected, closed, send failed.
    Connection,
    /// The server returned a non-zero status.
    Remote,
    /// A received frame could not be decoded, or referenced an unknown id.
    Protocol,
}

/// All possible errors from the Strand engine and client crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("remote error ({code}): {message}")]
    Remote { code: i32, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unsupported value: {0}")]
    UnsupportedValue(String),
}

impl Error {
    /// The discriminant used by callers that only branch on failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            Error::NotImplemented(_) => ErrorKind::NotImplemented,
            Error::Connection(_) => ErrorKind::Connection,
            Error::Remote { .. } => ErrorKind::Remote,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::UnsupportedValue(_) => ErrorKind::Validation,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        Error::SchemaMismatch(msg.into())
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Error::NotImplemented(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Error::Connection(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }
}

/// Result type for engine and client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::validation("name is required");
        assert_eq!(err.to_string(), "validation failed: name is required");

        let err = Error::Remote {
            code: 2,
            message: "not found".into(),
        };
        assert_eq!(err.to_string(), "remote error (2): not found");
    }

    #[test]
    fn kind_matches_category() {
        assert_eq!(Error::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(
            Error::schema_mismatch("x").kind(),
            ErrorKind::SchemaMismatch
        );
        assert_eq!(Error::not_implemented("x").kind(), ErrorKind::NotImplemented);
        assert_eq!(Error::connection("x").kind(), ErrorKind::Connection);
        assert_eq!(
            Error::Remote {
                code: 1,
                message: "x".into()
            }
            .kind(),
            ErrorKind::Remote
        );
        assert_eq!(Error::protocol("x").kind(), ErrorKind::Protocol);
    }
}
