//! Library skeleton creation.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::LibraryLayout;
use crate::error::ImportError;
use crate::kicad::symbol_lib::EMPTY_LIBRARY;
use crate::registry::CategoryRegistry;

/// What [`initialize`] found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    /// Files and directories created by this run.
    pub created: Vec<PathBuf>,
    /// Files and directories that were already present and left untouched.
    pub existing: Vec<PathBuf>,
}

impl InitReport {
    /// True if nothing had to be created.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created.is_empty()
    }
}

/// Creates the library skeleton for every category in `registry`.
///
/// Idempotent: entries that already exist are reported and never truncated,
/// so running this against a populated library is safe.
///
/// # Errors
///
/// Returns an error if a directory or file cannot be created.
pub fn initialize(
    layout: &LibraryLayout,
    registry: &CategoryRegistry,
) -> Result<InitReport, ImportError> {
    let mut report = InitReport::default();

    for dir in [layout.symbol_dir(), layout.footprint_dir(), layout.model_dir()] {
        ensure_dir(&dir, &mut report)?;
    }

    for category in registry.iter() {
        let sym_file = layout.symbol_library(category);
        match create_new(&sym_file, EMPTY_LIBRARY.as_bytes()) {
            Ok(()) => {
                info!(category = %category.key, path = %sym_file.display(), "Created symbol library");
                report.created.push(sym_file);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(path = %sym_file.display(), "Symbol library already exists");
                report.existing.push(sym_file);
            }
            Err(e) => return Err(ImportError::io(sym_file, e)),
        }

        ensure_dir(&layout.footprint_library(category), &mut report)?;
    }

    Ok(report)
}

fn ensure_dir(dir: &Path, report: &mut InitReport) -> Result<(), ImportError> {
    if dir.is_dir() {
        report.existing.push(dir.to_path_buf());
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| ImportError::io(dir, e))?;
    info!(path = %dir.display(), "Created directory");
    report.created.push(dir.to_path_buf());
    Ok(())
}

/// Writes a file only if it does not exist yet.
fn create_new(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_full_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let layout = LibraryLayout::new(dir.path());
        let registry = CategoryRegistry::standard();

        let report = initialize(&layout, &registry).unwrap();

        // 3 top-level dirs + 15 symbol files + 15 footprint dirs
        assert_eq!(report.created.len(), 33);
        assert!(report.existing.is_empty());
        for category in registry.iter() {
            let sym = std::fs::read_to_string(layout.symbol_library(category)).unwrap();
            assert_eq!(sym, EMPTY_LIBRARY);
            assert!(layout.footprint_library(category).is_dir());
        }
        assert!(layout.model_dir().is_dir());
    }

    #[test]
    fn reduced_registry_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let layout = LibraryLayout::new(dir.path());
        let registry = CategoryRegistry::new([("only", "Only", "single")]).unwrap();

        let report = initialize(&layout, &registry).unwrap();
        assert_eq!(report.created.len(), 5);
        assert!(layout.symbol_dir().join("lib_only.kicad_sym").is_file());
    }
}
