//! On-disk component library.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── lib_sym/
//! │   ├── lib_connectors.kicad_sym
//! │   └── ...                       one symbol library per category
//! ├── lib_fp/
//! │   ├── lib_connectors.pretty/
//! │   └── ...                       one footprint directory per category
//! └── 3d_models/                    shared by every category
//! ```
//!
//! [`init`] creates this skeleton; [`merge`] is the only code that writes
//! components into it.

pub mod init;
pub mod merge;

pub use init::{initialize, InitReport};
pub use merge::{CollisionPolicy, LibraryMerger, MergeAction, MergeFailure, MergeReport, MergedItem};

use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use crate::registry::Category;

/// Directory holding the symbol libraries.
pub const SYMBOL_DIR: &str = "lib_sym";

/// Directory holding the footprint libraries.
pub const FOOTPRINT_DIR: &str = "lib_fp";

/// Directory holding the shared 3D models.
pub const MODEL_DIR: &str = "3d_models";

/// Path variable KiCad expands to the directory of the open project.
pub const PROJECT_VAR: &str = "${KIPRJMOD}";

/// Resolves category paths under a library root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryLayout {
    root: PathBuf,
}

impl LibraryLayout {
    /// Creates a layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a layout for `root` taken relative to `base`.
    ///
    /// `.` and `..` are folded lexically, so `-C .` or `-C lib` still give a
    /// root with a directory name and a parent even before the directory
    /// exists.
    #[must_use]
    pub fn resolve(base: &Path, root: &Path) -> Self {
        let mut resolved = PathBuf::new();
        for component in base.join(root).components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    resolved.pop();
                }
                other => resolved.push(other),
            }
        }
        Self::new(resolved)
    }

    /// The library root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of all symbol libraries.
    #[must_use]
    pub fn symbol_dir(&self) -> PathBuf {
        self.root.join(SYMBOL_DIR)
    }

    /// Directory of all footprint libraries.
    #[must_use]
    pub fn footprint_dir(&self) -> PathBuf {
        self.root.join(FOOTPRINT_DIR)
    }

    /// The shared model store.
    #[must_use]
    pub fn model_dir(&self) -> PathBuf {
        self.root.join(MODEL_DIR)
    }

    /// Symbol library file of `category`.
    #[must_use]
    pub fn symbol_library(&self, category: &Category) -> PathBuf {
        self.symbol_dir().join(category.symbol_file_name())
    }

    /// Footprint directory of `category`.
    #[must_use]
    pub fn footprint_library(&self, category: &Category) -> PathBuf {
        self.footprint_dir().join(category.footprint_dir_name())
    }

    /// Model reference prefix used when none is configured.
    ///
    /// The library is expected to live directly inside the project (often as
    /// a git submodule), so models resolve as
    /// `${KIPRJMOD}/<library dir name>/3d_models`.
    #[must_use]
    pub fn default_model_prefix(&self) -> String {
        match self.root.file_name() {
            Some(name) => format!("{PROJECT_VAR}/{}/{MODEL_DIR}", name.to_string_lossy()),
            None => format!("{PROJECT_VAR}/{MODEL_DIR}"),
        }
    }
}

/// Replaces `path` with `contents` via a temporary file in the same directory,
/// so readers never observe a half-written library.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be written or renamed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
