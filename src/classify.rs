//! Sorting extracted files by kind.
//!
//! Classification is purely by file extension (case-insensitive). Files that
//! match nothing are kept as [`FileKind::Other`] so they can be reported, but
//! they are never merged.

use std::fmt;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::{debug, trace};

use crate::error::ImportError;

/// Symbol library extensions.
pub const SYMBOL_EXTENSIONS: &[&str] = &["kicad_sym"];

/// Footprint extensions.
pub const FOOTPRINT_EXTENSIONS: &[&str] = &["kicad_mod"];

/// 3D model extensions.
pub const MODEL_EXTENSIONS: &[&str] = &["step", "stp", "stl", "wrl", "3d"];

/// Kind of an extracted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Schematic symbol library.
    Symbol,
    /// Footprint.
    Footprint,
    /// 3D model.
    Model,
    /// Anything else (datasheets, readmes, other EDA formats).
    Other,
}

impl FileKind {
    /// Classifies a lowercase extension without the leading dot.
    #[must_use]
    pub fn from_extension(ext: &str) -> Self {
        if SYMBOL_EXTENSIONS.contains(&ext) {
            Self::Symbol
        } else if FOOTPRINT_EXTENSIONS.contains(&ext) {
            Self::Footprint
        } else if MODEL_EXTENSIONS.contains(&ext) {
            Self::Model
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbol => write!(f, "symbol"),
            Self::Footprint => write!(f, "footprint"),
            Self::Model => write!(f, "3D model"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A file found in an extracted archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    /// Location inside the extraction directory.
    pub path: PathBuf,
    /// Lowercase extension without the dot; empty if none.
    pub extension: String,
    /// Inferred kind.
    pub kind: FileKind,
}

impl ExtractedFile {
    /// Classifies a path.
    ///
    /// macOS resource forks (`__MACOSX/`, `._name`) that archivers add next to
    /// real files are always [`FileKind::Other`].
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let kind = if is_resource_fork(&path) {
            FileKind::Other
        } else {
            FileKind::from_extension(&extension)
        };
        Self {
            path,
            extension,
            kind,
        }
    }

    /// File name for display and as a destination name.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn is_resource_fork(path: &Path) -> bool {
    let in_macosx_dir = path.components().any(|c| c.as_os_str() == "__MACOSX");
    let apple_double = path
        .file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with("._"));
    in_macosx_dir || apple_double
}

/// Walks `root` lazily and yields every regular file, classified.
///
/// The iterator is finite and can only be consumed once.
///
/// # Errors
///
/// Returns an error if `root` cannot be turned into a search pattern.
pub fn classify_tree(root: &Path) -> Result<impl Iterator<Item = ExtractedFile>, ImportError> {
    let root_str = root.to_str().ok_or_else(|| {
        ImportError::archive(root, "extraction path is not valid UTF-8")
    })?;
    let pattern = format!("{}/**/*", Pattern::escape(root_str));
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let paths = glob::glob_with(&pattern, options)
        .map_err(|e| ImportError::archive(root, format!("invalid search pattern: {e}")))?;

    Ok(paths
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|path| path.is_file())
        .map(|path| {
            let file = ExtractedFile::from_path(path);
            trace!(path = %file.path.display(), kind = %file.kind, "Classified");
            file
        }))
}

/// Extracted files bucketed by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Symbol libraries.
    pub symbols: Vec<ExtractedFile>,
    /// Footprints.
    pub footprints: Vec<ExtractedFile>,
    /// 3D models.
    pub models: Vec<ExtractedFile>,
    /// Unrecognised files; reported, never merged.
    pub other: Vec<ExtractedFile>,
}

impl Classification {
    /// Buckets a sequence of files.
    pub fn collect(files: impl IntoIterator<Item = ExtractedFile>) -> Self {
        let mut out = Self::default();
        for file in files {
            match file.kind {
                FileKind::Symbol => out.symbols.push(file),
                FileKind::Footprint => out.footprints.push(file),
                FileKind::Model => out.models.push(file),
                FileKind::Other => out.other.push(file),
            }
        }
        out
    }

    /// True if no symbol, footprint or model was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recognised() == 0
    }

    /// Number of mergeable files.
    #[must_use]
    pub fn recognised(&self) -> usize {
        self.symbols.len() + self.footprints.len() + self.models.len()
    }
}
