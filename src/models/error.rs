use thiserror::Error;

/// Error kinds raised by the migration engine
///
/// Expected failure modes are always returned, never raised as panics.
/// `FatalAlignment` is the one condition that marks a table's phase as
/// `ERROR` outright.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Required configuration missing: {0}")]
    RequiredConfiguration(String),

    #[error("Missing data point: {0}")]
    MissingDataPoint(String),

    #[error("Fatal alignment error: {0}")]
    FatalAlignment(String),

    #[error("SQL execution error: {0}")]
    Execution(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Metastore error: {0}")]
    Metastore(String),
}

impl MigrationError {
    /// Single-message validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        MigrationError::Validation(vec![message.into()])
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, MigrationError::FatalAlignment(_))
    }

    /// Accumulated messages, one per violated rule
    pub fn messages(&self) -> Vec<String> {
        match self {
            MigrationError::Validation(messages) => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl From<rusqlite::Error> for MigrationError {
    fn from(err: rusqlite::Error) -> Self {
        MigrationError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for MigrationError {
    fn from(err: serde_json::Error) -> Self {
        MigrationError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_joins_messages() {
        let err = MigrationError::Validation(vec!["first".to_string(), "second".to_string()]);
        assert_eq!(err.to_string(), "Validation failed: first; second");
        assert_eq!(err.messages().len(), 2);
    }

    #[test]
    fn test_only_alignment_is_fatal() {
        assert!(MigrationError::FatalAlignment("x".into()).is_fatal());
        assert!(!MigrationError::MissingDataPoint("x".into()).is_fatal());
    }
}
