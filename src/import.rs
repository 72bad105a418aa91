//! The import workflow: extract, classify, choose a category, merge.
//!
//! Nothing under the library root is written before a category has been
//! chosen, so an unreadable archive, an archive without KiCad files or a
//! cancelled menu leaves the library untouched.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::archive::extract_archive;
use crate::classify::{classify_tree, Classification};
use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::kicad::SymbolInfo;
use crate::library::{LibraryLayout, LibraryMerger, MergeReport, MergedItem};
use crate::registry::CategoryRegistry;
use crate::select::{resolve_preselected, CategorySelector, Prompt, Selection};

/// Everything an import needs to know about the destination library.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Available categories.
    pub registry: CategoryRegistry,
    /// Library paths.
    pub layout: LibraryLayout,
    /// Import behaviour.
    pub settings: ImportConfig,
    /// Directory prefix written into footprint model references.
    pub model_prefix: String,
}

impl Workspace {
    /// Creates a workspace using the layout's default model prefix.
    #[must_use]
    pub fn new(registry: CategoryRegistry, layout: LibraryLayout, settings: ImportConfig) -> Self {
        let model_prefix = layout.default_model_prefix();
        Self {
            registry,
            layout,
            settings,
            model_prefix,
        }
    }

    /// Overrides the model prefix when one is given.
    #[must_use]
    pub fn with_model_prefix(mut self, prefix: Option<String>) -> Self {
        if let Some(prefix) = prefix {
            self.model_prefix = prefix;
        }
        self
    }
}

/// One archive to import.
#[derive(Debug, Clone, Copy)]
pub struct ImportRequest<'a> {
    /// Vendor archive.
    pub archive: &'a Path,
    /// Category key or index chosen up front; skips the menu.
    pub library: Option<&'a str>,
}

/// How an import ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Files were merged into a category.
    Merged {
        /// Key of the chosen category.
        category: String,
        /// What was merged.
        report: MergeReport,
    },
    /// The user skipped the import at the menu.
    Cancelled,
}

/// Imports one vendor archive into the library.
///
/// # Errors
///
/// Fails before any library write if the archive cannot be read, holds no
/// symbol, footprint or model files, or the category choice is rejected.
/// A merge failure is returned as [`ImportError::Merge`]; items merged
/// before it are listed on the prompt and stay on disk.
pub fn import_archive(
    workspace: &Workspace,
    request: &ImportRequest<'_>,
    prompt: &mut dyn Prompt,
) -> Result<ImportOutcome, ImportError> {
    let extracted = extract_archive(request.archive, workspace.settings.nested_archive_depth)?;
    let files = Classification::collect(classify_tree(extracted.root())?);

    prompt
        .say(&summarise(extracted.source(), &files))
        .map_err(ImportError::Prompt)?;
    for other in &files.other {
        debug!(file = %other.path.display(), "Ignoring unrecognised file");
    }

    if files.is_empty() {
        return Err(ImportError::ClassificationEmpty {
            archive: request.archive.to_path_buf(),
        });
    }

    let category = if let Some(input) = request.library {
        resolve_preselected(&workspace.registry, input)?
    } else {
        let component = first_symbol(&files);
        let selector = CategorySelector::new(workspace.settings.max_selection_attempts);
        match selector.select(&workspace.registry, prompt, component.as_ref())? {
            Selection::Category(category) => category,
            Selection::Cancelled => {
                info!(archive = %request.archive.display(), "Import cancelled");
                return Ok(ImportOutcome::Cancelled);
            }
        }
    };
    info!(category = %category.key, archive = %request.archive.display(), "Importing");

    let merger = LibraryMerger::new(
        &workspace.layout,
        workspace.settings.collision_policy,
        workspace.model_prefix.clone(),
    );

    match merger.merge_all(&files, category) {
        Ok(report) => {
            prompt
                .say(&render_report(&category.name, &report.items))
                .map_err(ImportError::Prompt)?;
            Ok(ImportOutcome::Merged {
                category: category.key.clone(),
                report,
            })
        }
        Err(failure) => {
            warn!(completed = failure.completed.items.len(), "Import stopped by merge failure");
            if !failure.completed.items.is_empty() {
                prompt
                    .say(&render_report(&category.name, &failure.completed.items))
                    .map_err(ImportError::Prompt)?;
            }
            Err(failure.error.into())
        }
    }
}

/// Removes the source archive after a successful import.
///
/// # Errors
///
/// Returns an error if the file cannot be removed.
pub fn delete_archive(archive: &Path) -> Result<(), ImportError> {
    fs::remove_file(archive).map_err(|e| ImportError::io(archive, e))?;
    info!(archive = %archive.display(), "Deleted archive");
    Ok(())
}

/// Name, datasheet and footprint of the first symbol in the archive.
fn first_symbol(files: &Classification) -> Option<SymbolInfo> {
    let file = files.symbols.first()?;
    let text = match fs::read_to_string(&file.path) {
        Ok(text) => text,
        Err(e) => {
            debug!(file = %file.path.display(), error = %e, "Cannot read symbol for preview");
            return None;
        }
    };
    SymbolInfo::from_source(&text)
}

fn summarise(archive: &Path, files: &Classification) -> String {
    let name = archive
        .file_name()
        .map_or_else(|| archive.display().to_string(), |n| n.to_string_lossy().into_owned());
    format!(
        "{name}: {} symbol file(s), {} footprint(s), {} 3D model(s), {} other file(s)",
        files.symbols.len(),
        files.footprints.len(),
        files.models.len(),
        files.other.len()
    )
}

fn render_report(category: &str, items: &[MergedItem]) -> String {
    let mut lines = vec![format!("Merged into {category}:")];
    lines.extend(
        items
            .iter()
            .map(|item| format!("  {} {} ({})", item.step, item.name, item.action)),
    );
    lines.join("\n")
}
