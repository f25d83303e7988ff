//! Error types for snipsync-core

use thiserror::Error;

/// Result type alias using snipsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in snipsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or incomplete client input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for an [`Error::InvalidInput`]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Whether the error was caused by the request rather than the store
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::Serialization(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_validation_errors() {
        assert!(Error::invalid("missing name").is_validation());
        assert!(!Error::Database("disk full".to_string()).is_validation());
    }
}
