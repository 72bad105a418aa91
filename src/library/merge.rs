//! Merging extracted vendor files into a category.
//!
//! Per file kind:
//!
//! - **Symbol**: each top-level symbol is upserted into the category's symbol
//!   library. A component that already exists is replaced in place.
//! - **Footprint**: written to `<category>.pretty/<footprint name>.kicad_mod`
//!   with its 3D model references pointed at the shared model store.
//! - **Model**: copied into the shared model store.
//!
//! Footprint and model name collisions follow [`CollisionPolicy`] and are
//! always logged. There is no transaction across steps: a failure stops the
//! batch but everything merged before it stays on disk.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{write_atomic, LibraryLayout};
use crate::classify::Classification;
use crate::error::{MergeCause, MergeError, MergeStep};
use crate::kicad::footprint::{self, FOOTPRINT_EXTENSION};
use crate::kicad::symbol_lib::{self, SymbolLibrary, Upsert};
use crate::registry::Category;

/// What to do when a footprint or model with the same name already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Replace the existing entry (last write wins).
    #[default]
    Overwrite,
    /// Leave the existing entry and skip the incoming file.
    Keep,
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overwrite => write!(f, "overwrite"),
            Self::Keep => write!(f, "keep"),
        }
    }
}

/// What happened to one merged item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// New entry.
    Added,
    /// Existing entry replaced.
    Replaced,
    /// Existing entry was identical.
    Unchanged,
    /// Existing entry kept because of [`CollisionPolicy::Keep`].
    Skipped,
}

impl fmt::Display for MergeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Replaced => write!(f, "replaced"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Skipped => write!(f, "kept existing"),
        }
    }
}

/// One merged symbol, footprint or model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedItem {
    /// Kind of item.
    pub step: MergeStep,
    /// Component, footprint or model file name.
    pub name: String,
    /// What was done.
    pub action: MergeAction,
    /// File written (or left alone).
    pub destination: PathBuf,
}

/// Everything merged by one import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Items in the order they were processed.
    pub items: Vec<MergedItem>,
    /// Number of footprint model references rewritten.
    pub model_refs_rewritten: usize,
}

impl MergeReport {
    /// Items of one kind.
    pub fn of(&self, step: MergeStep) -> impl Iterator<Item = &MergedItem> {
        self.items.iter().filter(move |i| i.step == step)
    }

    /// True if anything on disk changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.items
            .iter()
            .any(|i| matches!(i.action, MergeAction::Added | MergeAction::Replaced))
    }
}

/// A failed batch: what completed before the failure, and the failure.
#[derive(Debug)]
pub struct MergeFailure {
    /// Items merged before the failing sub-step. These are not rolled back.
    pub completed: MergeReport,
    /// The failing sub-step.
    pub error: MergeError,
}

/// Writes extracted files into the library.
#[derive(Debug, Clone)]
pub struct LibraryMerger<'a> {
    layout: &'a LibraryLayout,
    policy: CollisionPolicy,
    model_prefix: String,
}

impl<'a> LibraryMerger<'a> {
    /// Creates a merger writing under `layout`.
    ///
    /// `model_prefix` replaces the directory part of footprint model
    /// references, e.g. `${KIPRJMOD}/lib/3d_models`.
    pub fn new(layout: &'a LibraryLayout, policy: CollisionPolicy, model_prefix: impl Into<String>) -> Self {
        Self {
            layout,
            policy,
            model_prefix: model_prefix.into(),
        }
    }

    /// Merges every recognised file: symbols, then footprints, then models.
    ///
    /// # Errors
    ///
    /// Stops at the first failing sub-step and returns it together with the
    /// items merged so far.
    pub fn merge_all(
        &self,
        files: &Classification,
        category: &Category,
    ) -> Result<MergeReport, MergeFailure> {
        let mut report = MergeReport::default();

        macro_rules! bail_on_err {
            ($result:expr) => {
                match $result {
                    Ok(value) => value,
                    Err(error) => {
                        return Err(MergeFailure {
                            completed: report,
                            error,
                        })
                    }
                }
            };
        }

        for file in &files.symbols {
            let items = bail_on_err!(self.merge_symbol(&file.path, category));
            report.items.extend(items);
        }

        for file in &files.footprints {
            let (item, rewritten) = bail_on_err!(self.merge_footprint(&file.path, category));
            report.model_refs_rewritten += rewritten;
            report.items.push(item);
        }

        for file in &files.models {
            let item = bail_on_err!(self.merge_model(&file.path, category));
            report.items.push(item);
        }

        Ok(report)
    }

    /// Upserts every symbol defined in `file` into the category library.
    ///
    /// # Errors
    ///
    /// Returns an error if the source has no symbols, either file is not a
    /// valid symbol library, or the library cannot be written.
    pub fn merge_symbol(&self, file: &Path, category: &Category) -> Result<Vec<MergedItem>, MergeError> {
        let fail = |cause: MergeCause| MergeError::new(MergeStep::Symbol, file, &category.key, cause);

        let source = fs::read_to_string(file).map_err(|e| fail(MergeCause::io(file, e)))?;
        let blocks = symbol_lib::extract_symbols(&source).map_err(|e| fail(e.into()))?;
        if blocks.is_empty() {
            return Err(fail(MergeCause::NoSymbols));
        }

        let target = self.layout.symbol_library(category);
        let mut library = if target.exists() {
            let library = SymbolLibrary::open(&target).map_err(|e| fail(e.into()))?;
            let existing = library.names().map_err(|e| fail(e.into()))?;
            debug!(path = %target.display(), symbols = existing.len(), "Opened symbol library");
            library
        } else {
            ensure_parent(&target).map_err(fail)?;
            SymbolLibrary::new()
        };

        let mut items = Vec::with_capacity(blocks.len());
        for block in &blocks {
            let action = match library.upsert(block).map_err(|e| fail(e.into()))? {
                Upsert::Added => MergeAction::Added,
                Upsert::Replaced => {
                    warn!(
                        symbol = %block.name,
                        category = %category.key,
                        "Symbol already existed and was replaced"
                    );
                    MergeAction::Replaced
                }
                Upsert::Unchanged => MergeAction::Unchanged,
            };
            items.push(MergedItem {
                step: MergeStep::Symbol,
                name: block.name.clone(),
                action,
                destination: target.clone(),
            });
        }

        if items.iter().any(|i| i.action != MergeAction::Unchanged) {
            write_atomic(&target, library.as_str().as_bytes())
                .map_err(|e| fail(MergeCause::io(&target, e)))?;
        }

        info!(
            count = items.len(),
            category = %category.key,
            path = %target.display(),
            "Merged symbols"
        );
        Ok(items)
    }

    /// Copies a footprint into the category's `.pretty` directory.
    ///
    /// Returns the merged item and the number of model references rewritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the footprint cannot be read or written.
    pub fn merge_footprint(
        &self,
        file: &Path,
        category: &Category,
    ) -> Result<(MergedItem, usize), MergeError> {
        let fail = |cause: MergeCause| MergeError::new(MergeStep::Footprint, file, &category.key, cause);

        let source = fs::read_to_string(file).map_err(|e| fail(MergeCause::io(file, e)))?;
        let name = footprint::footprint_name(&source)
            .or_else(|| file.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "footprint".to_string());
        let (contents, rewritten) = footprint::rewrite_model_paths(&source, &self.model_prefix);
        if rewritten > 0 {
            debug!(footprint = %name, rewritten, prefix = %self.model_prefix, "Rewrote 3D model paths");
        }

        let dir = self.layout.footprint_library(category);
        fs::create_dir_all(&dir).map_err(|e| fail(MergeCause::io(&dir, e)))?;
        let target = dir.join(format!("{}.{FOOTPRINT_EXTENSION}", file_safe(&name)));

        let action = match fs::read(&target) {
            Ok(existing) if existing == contents.as_bytes() => MergeAction::Unchanged,
            Ok(_) => self.on_collision(MergeStep::Footprint, &target),
            Err(_) => MergeAction::Added,
        };

        if matches!(action, MergeAction::Added | MergeAction::Replaced) {
            write_atomic(&target, contents.as_bytes()).map_err(|e| fail(MergeCause::io(&target, e)))?;
        }

        info!(footprint = %name, category = %category.key, %action, "Merged footprint");
        Ok((
            MergedItem {
                step: MergeStep::Footprint,
                name,
                action,
                destination: target,
            },
            rewritten,
        ))
    }

    /// Copies a 3D model into the shared model store.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be read or copied.
    pub fn merge_model(&self, path: &Path, category: &Category) -> Result<MergedItem, MergeError> {
        let fail = |cause: MergeCause| MergeError::new(MergeStep::Model, path, &category.key, cause);

        let name = path
            .file_name()
            .map_or_else(|| "model".to_string(), |n| n.to_string_lossy().into_owned());
        let dir = self.layout.model_dir();
        fs::create_dir_all(&dir).map_err(|e| fail(MergeCause::io(&dir, e)))?;
        let target = dir.join(&name);

        let action = if target.exists() {
            let incoming = fs::read(path).map_err(|e| fail(MergeCause::io(path, e)))?;
            let existing = fs::read(&target).map_err(|e| fail(MergeCause::io(&target, e)))?;
            if incoming == existing {
                MergeAction::Unchanged
            } else {
                self.on_collision(MergeStep::Model, &target)
            }
        } else {
            MergeAction::Added
        };

        if matches!(action, MergeAction::Added | MergeAction::Replaced) {
            fs::copy(path, &target).map_err(|e| fail(MergeCause::io(&target, e)))?;
        }

        info!(model = %name, %action, "Merged 3D model");
        Ok(MergedItem {
            step: MergeStep::Model,
            name,
            action,
            destination: target,
        })
    }

    fn on_collision(&self, step: MergeStep, target: &Path) -> MergeAction {
        match self.policy {
            CollisionPolicy::Overwrite => {
                warn!(kind = %step, path = %target.display(), "Overwriting existing file with different contents");
                MergeAction::Replaced
            }
            CollisionPolicy::Keep => {
                warn!(kind = %step, path = %target.display(), "Keeping existing file; incoming version skipped");
                MergeAction::Skipped
            }
        }
    }
}

fn ensure_parent(path: &Path) -> Result<(), MergeCause> {
    match path.parent() {
        Some(dir) => fs::create_dir_all(dir).map_err(|e| MergeCause::io(dir, e)),
        None => Ok(()),
    }
}

/// Replaces characters that cannot appear in a file name.
fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CategoryRegistry;

    const PREFIX: &str = "${KIPRJMOD}/lib/3d_models";

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn file_safe_replaces_separators() {
        assert_eq!(file_safe("SOT-23/5"), "SOT-23_5");
        assert_eq!(file_safe("R_0603"), "R_0603");
    }

    #[test]
    fn symbol_into_missing_library_creates_it() {
        let root = tempfile::tempdir().unwrap();
        let src = tempfile::tempdir().unwrap();
        let layout = LibraryLayout::new(root.path());
        let registry = CategoryRegistry::standard();
        let power = registry.by_key("power").unwrap();

        let file = write(src.path(), "ldo.kicad_sym", "(kicad_symbol_lib (symbol \"LDO\" (pin 1)))");
        let merger = LibraryMerger::new(&layout, CollisionPolicy::Overwrite, PREFIX);
        let items = merger.merge_symbol(&file, power).unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].action, MergeAction::Added);
        let lib = SymbolLibrary::open(layout.symbol_library(power)).unwrap();
        assert_eq!(lib.names().unwrap(), ["LDO"]);
    }

    #[test]
    fn symbol_file_without_symbols_fails() {
        let root = tempfile::tempdir().unwrap();
        let src = tempfile::tempdir().unwrap();
        let layout = LibraryLayout::new(root.path());
        let registry = CategoryRegistry::standard();

        let file = write(src.path(), "empty.kicad_sym", "(kicad_symbol_lib (version 1))");
        let merger = LibraryMerger::new(&layout, CollisionPolicy::Overwrite, PREFIX);
        let err = merger
            .merge_symbol(&file, registry.get(1).unwrap())
            .unwrap_err();
        assert_eq!(err.step, MergeStep::Symbol);
        assert!(matches!(err.source, MergeCause::NoSymbols));
    }

    #[test]
    fn footprint_collision_keep_policy() {
        let root = tempfile::tempdir().unwrap();
        let src = tempfile::tempdir().unwrap();
        let layout = LibraryLayout::new(root.path());
        let registry = CategoryRegistry::standard();
        let ics = registry.by_key("ics").unwrap();
        let merger = LibraryMerger::new(&layout, CollisionPolicy::Keep, PREFIX);

        let v1 = write(src.path(), "a.kicad_mod", "(footprint \"SOIC8\" (v 1))");
        let (first, _) = merger.merge_footprint(&v1, ics).unwrap();
        assert_eq!(first.action, MergeAction::Added);

        let v2 = write(src.path(), "b.kicad_mod", "(footprint \"SOIC8\" (v 2))");
        let (second, _) = merger.merge_footprint(&v2, ics).unwrap();
        assert_eq!(second.action, MergeAction::Skipped);

        let stored = fs::read_to_string(layout.footprint_library(ics).join("SOIC8.kicad_mod")).unwrap();
        assert!(stored.contains("(v 1)"));
    }

    #[test]
    fn footprint_collision_overwrite_policy() {
        let root = tempfile::tempdir().unwrap();
        let src = tempfile::tempdir().unwrap();
        let layout = LibraryLayout::new(root.path());
        let registry = CategoryRegistry::standard();
        let ics = registry.by_key("ics").unwrap();
        let merger = LibraryMerger::new(&layout, CollisionPolicy::Overwrite, PREFIX);

        let v1 = write(src.path(), "a.kicad_mod", "(footprint \"SOIC8\" (v 1))");
        merger.merge_footprint(&v1, ics).unwrap();
        let (again, _) = merger.merge_footprint(&v1, ics).unwrap();
        assert_eq!(again.action, MergeAction::Unchanged);

        let v2 = write(src.path(), "b.kicad_mod", "(footprint \"SOIC8\" (v 2))");
        let (second, _) = merger.merge_footprint(&v2, ics).unwrap();
        assert_eq!(second.action, MergeAction::Replaced);

        let dir = layout.footprint_library(ics);
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 1);
        assert!(fs::read_to_string(dir.join("SOIC8.kicad_mod")).unwrap().contains("(v 2)"));
    }

    #[test]
    fn model_identical_copy_is_unchanged() {
        let root = tempfile::tempdir().unwrap();
        let src = tempfile::tempdir().unwrap();
        let layout = LibraryLayout::new(root.path());
        let registry = CategoryRegistry::standard();
        let merger = LibraryMerger::new(&layout, CollisionPolicy::Keep, PREFIX);

        let model = write(src.path(), "part.step", "ISO-10303-21;");
        let first = merger.merge_model(&model, registry.get(2).unwrap()).unwrap();
        let second = merger.merge_model(&model, registry.get(2).unwrap()).unwrap();

        assert_eq!(first.action, MergeAction::Added);
        assert_eq!(second.action, MergeAction::Unchanged);
        assert!(layout.model_dir().join("part.step").is_file());
    }
}
