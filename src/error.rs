//! Editor Error Types
//!
//! Errors raised while reading, validating and writing configuration documents.
//! Out-of-range editing operations are not errors; they are logged no-ops.

use std::path::PathBuf;

use thiserror::Error;

use crate::document::DocumentKind;

/// Result type for editor operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Editor error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Syntax error in INI text
    #[error("Parse error on line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What was wrong with the line
        message: String,
    },

    /// A section header appeared twice
    #[error("Duplicate section [{name}] on line {line}")]
    DuplicateSection {
        /// Section name
        name: String,
        /// 1-based line number
        line: usize,
    },

    /// A key appeared twice within one section
    #[error("Duplicate key '{key}' in section [{section}] on line {line}")]
    DuplicateKey {
        /// Section name
        section: String,
        /// Key as stored
        key: String,
        /// 1-based line number
        line: usize,
    },

    /// Required sections are missing, the file is not of the expected kind
    #[error("This does not appear to be a valid {kind} file (missing sections: {})", missing.join(", "))]
    NotRecognised {
        /// Kind the file was checked against
        kind: DocumentKind,
        /// Sections that were not found
        missing: Vec<String>,
    },

    /// The file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// Path that was opened
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file could not be written
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        /// Path that was written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Save was requested for a document that was never given a path
    #[error("Document has no file path, use save-as")]
    NoPath,

    /// A typed setter rejected its value
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        /// Field that was being set
        field: String,
        /// Why the value was rejected
        message: String,
    },
}

impl ConfigError {
    /// Create an invalid-value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the error came from the filesystem rather than the file contents
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Read { .. } | Self::Write { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_recognised_lists_missing_sections() {
        let err = ConfigError::NotRecognised {
            kind: DocumentKind::Sesman,
            missing: vec!["Security".to_string(), "Sessions".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("sesman.ini"));
        assert!(msg.contains("Security, Sessions"));
    }

    #[test]
    fn test_io_classification() {
        let err = ConfigError::Write {
            path: PathBuf::from("/etc/xrdp/xrdp.ini"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.is_io());
        assert!(!ConfigError::NoPath.is_io());
    }
}
