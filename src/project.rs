//! Registering category libraries in a KiCad project.
//!
//! Adds `lib_<key>` entries to the project's `sym-lib-table` and
//! `fp-lib-table`, creating the tables if needed. Existing entries are never
//! modified.

use std::path::{Component, Path};

use tracing::{debug, info};

use crate::error::ImportError;
use crate::kicad::{LibTable, LibTableEntry, TableKind};
use crate::library::{write_atomic, LibraryLayout, PROJECT_VAR};
use crate::registry::Category;

/// What [`register_categories`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterReport {
    /// Entries added, as `(table, library name)`.
    pub added: Vec<(TableKind, String)>,
    /// Entries already present.
    pub existing: Vec<(TableKind, String)>,
}

/// Adds symbol and footprint table entries for `categories` to the project in
/// `project_dir`.
///
/// A table is only rewritten if an entry was added, so running this twice
/// leaves both files byte-identical.
///
/// # Errors
///
/// Returns [`ImportError::Table`] if an existing table is malformed, or
/// [`ImportError::Io`] if a table cannot be written.
pub fn register_categories(
    layout: &LibraryLayout,
    project_dir: &Path,
    categories: &[&Category],
) -> Result<RegisterReport, ImportError> {
    let mut report = RegisterReport::default();

    for kind in [TableKind::Symbol, TableKind::Footprint] {
        let path = LibTable::path_in(kind, project_dir);
        let table_err = |source| ImportError::Table {
            path: path.clone(),
            source,
        };
        let mut table = LibTable::open_or_new(kind, project_dir).map_err(table_err)?;

        let mut changed = false;
        for category in categories {
            let target = match kind {
                TableKind::Symbol => layout.symbol_library(category),
                TableKind::Footprint => layout.footprint_library(category),
            };
            let entry = LibTableEntry {
                name: category.library_name(),
                uri: library_uri(project_dir, &target),
                descr: category.description.clone(),
            };

            if table.add(&entry).map_err(table_err)? {
                debug!(table = %kind, library = %entry.name, uri = %entry.uri, "Added table entry");
                report.added.push((kind, entry.name));
                changed = true;
            } else {
                report.existing.push((kind, entry.name));
            }
        }

        if changed {
            write_atomic(&path, table.as_str().as_bytes()).map_err(|e| ImportError::io(&path, e))?;
            info!(path = %path.display(), "Updated project library table");
        }
    }

    Ok(report)
}

/// `${KIPRJMOD}/<relative path>` when `target` lies under `project_dir`,
/// otherwise the absolute path.
#[must_use]
pub fn library_uri(project_dir: &Path, target: &Path) -> String {
    if let Some(relative) = relative_to(project_dir, target) {
        return format!("{PROJECT_VAR}/{relative}");
    }

    let absolute = std::fs::canonicalize(target.parent().unwrap_or(target))
        .ok()
        .and_then(|parent| target.file_name().map(|name| parent.join(name)))
        .unwrap_or_else(|| target.to_path_buf());
    absolute.to_string_lossy().replace('\\', "/")
}

fn relative_to(base: &Path, target: &Path) -> Option<String> {
    let stripped = target.strip_prefix(base).ok().map(Path::to_path_buf).or_else(|| {
        let base = std::fs::canonicalize(base).ok()?;
        let parent = std::fs::canonicalize(target.parent()?).ok()?;
        let relative = parent.strip_prefix(&base).ok()?;
        Some(relative.join(target.file_name()?))
    })?;

    let parts: Vec<_> = stripped
        .components()
        .map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<_>>()?;
    (!parts.is_empty()).then(|| parts.join("/"))
}
