//! Error types for kicad-lib-manager.
//!
//! Every failure the command line can report maps to a distinct process exit
//! code through [`ImportError::exit_code`], so scripts can tell an unreadable
//! archive from a rejected category choice or a failed merge.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::kicad::KicadError;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// The sub-step of a merge that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStep {
    /// Upserting a symbol into the category's symbol library.
    Symbol,
    /// Copying a footprint into the category's `.pretty` directory.
    Footprint,
    /// Copying a 3D model into the shared model store.
    Model,
}

impl fmt::Display for MergeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbol => write!(f, "symbol"),
            Self::Footprint => write!(f, "footprint"),
            Self::Model => write!(f, "3D model"),
        }
    }
}

/// Underlying cause of a merge failure.
#[derive(Error, Debug)]
pub enum MergeCause {
    /// The source or destination file is not valid KiCad data.
    #[error(transparent)]
    Format(#[from] KicadError),

    /// A filesystem operation failed.
    #[error("I/O error on {path}")]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The symbol file contains no `(symbol ...)` definition.
    #[error("no symbol definitions found")]
    NoSymbols,
}

impl MergeCause {
    /// Creates an I/O cause.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A merge sub-step failed. Earlier sub-steps are not rolled back.
#[derive(Error, Debug)]
#[error("{step} merge of {} into '{category}' failed", .file.display())]
pub struct MergeError {
    /// Which sub-step failed.
    pub step: MergeStep,
    /// The extracted file being merged.
    pub file: PathBuf,
    /// Key of the destination category.
    pub category: String,
    /// What went wrong.
    #[source]
    pub source: MergeCause,
}

impl MergeError {
    /// Creates a merge error.
    pub fn new(
        step: MergeStep,
        file: impl Into<PathBuf>,
        category: impl Into<String>,
        source: impl Into<MergeCause>,
    ) -> Self {
        Self {
            step,
            file: file.into(),
            category: category.into(),
            source: source.into(),
        }
    }
}

/// A version-control client call failed.
#[derive(Error, Debug)]
pub enum VcsError {
    /// The client could not be started at all.
    #[error("failed to run '{program}'")]
    Spawn {
        /// Program that was invoked.
        program: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The client ran and reported failure.
    #[error("{operation} failed ({status}): {output}")]
    Failed {
        /// Operation that failed (`stage`, `commit`, `push`).
        operation: String,
        /// Exit status description.
        status: String,
        /// The client's own error output, verbatim.
        output: String,
    },
}

/// Errors reported by the import, init and project-table workflows.
#[derive(Error, Debug)]
pub enum ImportError {
    /// Archive missing, unreadable or corrupt.
    #[error("cannot extract archive {}: {reason}", .path.display())]
    Archive {
        /// Archive path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The archive contains no symbol, footprint or 3D model files.
    #[error("no recognised KiCad files found in {}", .archive.display())]
    ClassificationEmpty {
        /// Archive path.
        archive: PathBuf,
    },

    /// Category choice rejected after the retry budget was used up.
    #[error("invalid category selection '{input}' after {attempts} attempt(s); valid libraries: {valid}")]
    InvalidSelection {
        /// Last input received.
        input: String,
        /// Attempts made.
        attempts: u32,
        /// Comma-separated category keys.
        valid: String,
    },

    /// Reading from the interactive prompt failed.
    #[error("failed to read selection")]
    Prompt(#[source] io::Error),

    /// A merge sub-step failed.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// Version control failed. Merged files are kept.
    #[error("version control failed")]
    VersionControl(#[from] VcsError),

    /// Filesystem error outside a merge (initialisation, tables, cleanup).
    #[error("I/O error on {}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A project table could not be read or updated.
    #[error("project library table {}", .path.display())]
    Table {
        /// Table path.
        path: PathBuf,
        /// The underlying format error.
        #[source]
        source: KicadError,
    },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Command line usage error.
    #[error("{0}")]
    Usage(String),
}

impl ImportError {
    /// Creates an archive error.
    pub fn archive(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::Archive {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 2,
            Self::Archive { .. } => 3,
            Self::ClassificationEmpty { .. } => 4,
            Self::InvalidSelection { .. } | Self::Prompt(_) => 5,
            Self::Merge(_) => 6,
            Self::VersionControl(_) => 7,
            Self::Config(_) => 8,
            Self::Io { .. } | Self::Table { .. } => 9,
        }
    }
}
