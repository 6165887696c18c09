//! Error types for pgdal

use thiserror::Error;

/// Result type alias for pgdal operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for data-access operations.
///
/// "No matching row" is never an error: read operations report it as `Ok(None)`,
/// an empty vector, `Ok(false)` or a zero count.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Malformed caller input (bad clause chains, non-text LIKE values, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Placeholder/value count mismatch
    #[error("Parameter count mismatch: statement has {expected} slot(s), got {got} value(s)")]
    ParamCount { expected: usize, got: usize },

    /// Stored credential could not be parsed or verified
    #[error("Credential error: {0}")]
    Credential(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
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

    /// Create a parameter count mismatch error
    pub fn param_count(expected: usize, got: usize) -> Self {
        Self::ParamCount { expected, got }
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this error was raised before touching the database because
    /// the caller handed over an inconsistent statement.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::ParamCount { .. })
    }

    /// Check if this is a connection (or pool checkout) failure
    pub fn is_connection_failure(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            #[cfg(feature = "pool")]
            Self::Pool(_) => true,
            _ => false,
        }
    }

    /// Parse a tokio_postgres error into a more specific OrmError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        if err.is_closed() {
            return Self::Connection(err.to_string());
        }
        Self::Query(err)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_count_message_names_both_sides() {
        let err = OrmError::param_count(3, 2);
        assert_eq!(
            err.to_string(),
            "Parameter count mismatch: statement has 3 slot(s), got 2 value(s)"
        );
        assert!(err.is_malformed_input());
    }

    #[test]
    fn classification_helpers() {
        assert!(OrmError::validation("odd chain").is_malformed_input());
        assert!(OrmError::Connection("refused".into()).is_connection_failure());
        assert!(OrmError::UniqueViolation("users_username_key".into()).is_unique_violation());
        assert!(!OrmError::Other("x".into()).is_malformed_input());
        assert!(!OrmError::decode("id", "bad").is_connection_failure());
    }
}
