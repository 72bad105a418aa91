//! Error types for KiCad file operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for KiCad operations.
pub type KicadResult<T> = Result<T, KicadError>;

/// Errors that can occur while reading or editing KiCad S-expression files.
#[derive(Debug, Error)]
pub enum KicadError {
    /// Failed to open or read the file.
    #[error("Failed to read file: {path}")]
    FileRead {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The text contains no S-expression at all.
    #[error("No S-expression found")]
    Empty,

    /// An opening parenthesis has no matching closing parenthesis.
    #[error("Unbalanced expression starting at offset {offset}")]
    Unbalanced {
        /// Byte offset of the unmatched opening parenthesis.
        offset: usize,
    },

    /// The root expression is not the expected kind of file.
    #[error("Wrong file type: expected ({expected} ...), got ({actual} ...)")]
    WrongRoot {
        /// Expected head token.
        expected: String,
        /// Head token actually found.
        actual: String,
    },

    /// An expression that must carry a name has none.
    #[error("Missing name in ({head} ...) at offset {offset}")]
    MissingName {
        /// Head token of the nameless expression.
        head: String,
        /// Byte offset of the expression.
        offset: usize,
    },
}

impl KicadError {
    /// Creates a file read error.
    pub fn file_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates an unbalanced expression error.
    #[must_use]
    pub const fn unbalanced(offset: usize) -> Self {
        Self::Unbalanced { offset }
    }

    /// Creates a wrong root error.
    pub fn wrong_root(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::WrongRoot {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a missing name error.
    pub fn missing_name(head: impl Into<String>, offset: usize) -> Self {
        Self::MissingName {
            head: head.into(),
            offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = KicadError::unbalanced(42);
        assert_eq!(
            err.to_string(),
            "Unbalanced expression starting at offset 42"
        );
    }

    #[test]
    fn wrong_root_error_display() {
        let err = KicadError::wrong_root("kicad_symbol_lib", "footprint");
        assert_eq!(
            err.to_string(),
            "Wrong file type: expected (kicad_symbol_lib ...), got (footprint ...)"
        );
    }
}
