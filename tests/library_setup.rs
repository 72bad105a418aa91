//! Library initialisation, project registration and version control.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use kicad_lib_manager::config::ImportConfig;
use kicad_lib_manager::error::VcsError;
use kicad_lib_manager::import::{import_archive, ImportOutcome, ImportRequest, Workspace};
use kicad_lib_manager::kicad::symbol_lib::EMPTY_LIBRARY;
use kicad_lib_manager::library::{initialize, LibraryLayout};
use kicad_lib_manager::project::register_categories;
use kicad_lib_manager::registry::CategoryRegistry;
use kicad_lib_manager::select::ScriptedPrompt;
use kicad_lib_manager::vcs::{import_commit_message, record_changes, GitCli, VersionControl};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Creates a temporary directory inside `.tmp/` for test isolation.
fn test_temp_dir() -> TempDir {
    let tmp_root = Path::new(".tmp");
    fs::create_dir_all(tmp_root).expect("Failed to create .tmp directory");
    let tmp_root = tmp_root
        .canonicalize()
        .expect("Failed to canonicalize .tmp path");
    tempfile::tempdir_in(&tmp_root).expect("Failed to create temp dir")
}

fn footprint_archive(dir: &Path) -> PathBuf {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("R_0603.kicad_mod", SimpleFileOptions::default())
        .expect("Failed to start zip entry");
    writer
        .write_all(b"(footprint \"R_0603\" (layer \"F.Cu\")\n  (model \"R_0603.wrl\")\n)\n")
        .expect("Failed to write zip entry");
    let bytes = writer.finish().expect("Failed to finish zip").into_inner();
    let path = dir.join("LIB_R_0603.zip");
    fs::write(&path, bytes).expect("Failed to write archive");
    path
}

/// Records calls instead of running a client.
#[derive(Default)]
struct FakeVcs {
    calls: Vec<String>,
    fail_push: bool,
}

impl VersionControl for FakeVcs {
    fn stage_all(&mut self) -> Result<(), VcsError> {
        self.calls.push("stage".into());
        Ok(())
    }

    fn has_staged_changes(&mut self) -> Result<bool, VcsError> {
        Ok(true)
    }

    fn commit(&mut self, message: &str) -> Result<(), VcsError> {
        self.calls.push(format!("commit {message}"));
        Ok(())
    }

    fn push(&mut self) -> Result<(), VcsError> {
        self.calls.push("push".into());
        if self.fail_push {
            return Err(VcsError::Failed {
                operation: "push".into(),
                status: "exit status: 128".into(),
                output: "fatal: no upstream configured".into(),
            });
        }
        Ok(())
    }
}

#[test]
fn init_twice_is_idempotent() {
    let tmp = test_temp_dir();
    let layout = LibraryLayout::new(tmp.path().join("lib"));
    let registry = CategoryRegistry::standard();

    let first = initialize(&layout, &registry).unwrap();
    assert_eq!(first.created.len(), 3 + 2 * registry.len());

    // Content added after the first run must survive the second.
    let passives = registry.by_key("passives").unwrap();
    let sym = layout.symbol_library(passives);
    assert_eq!(fs::read_to_string(&sym).unwrap(), EMPTY_LIBRARY);
    let populated = "(kicad_symbol_lib (version 20211014) (generator kicad_symbol_editor)\n  (symbol \"R\" (pin 1))\n)\n";
    fs::write(&sym, populated).unwrap();
    let footprint = layout.footprint_library(passives).join("R_0603.kicad_mod");
    fs::write(&footprint, "(footprint \"R_0603\")").unwrap();

    let second = initialize(&layout, &registry).unwrap();
    assert!(second.is_noop());
    assert_eq!(second.existing.len(), first.created.len());
    assert_eq!(fs::read_to_string(&sym).unwrap(), populated);
    assert!(footprint.is_file());
}

#[test]
fn import_then_register_in_project() {
    let project = test_temp_dir();
    let layout = LibraryLayout::new(project.path().join("parts"));
    let registry = CategoryRegistry::standard();
    let downloads = test_temp_dir();
    let archive = footprint_archive(downloads.path());

    let ws = Workspace::new(registry.clone(), layout.clone(), ImportConfig::default());
    let request = ImportRequest {
        archive: &archive,
        library: Some("passives"),
    };
    let outcome = import_archive(&ws, &request, &mut ScriptedPrompt::default()).unwrap();
    let ImportOutcome::Merged { category, .. } = outcome else {
        panic!("expected a merge");
    };

    let passives = registry.by_key(&category).unwrap();
    let footprint =
        fs::read_to_string(layout.footprint_library(passives).join("R_0603.kicad_mod")).unwrap();
    assert!(footprint.contains("(model \"${KIPRJMOD}/parts/3d_models/R_0603.wrl\")"));

    let chosen = [passives];
    let report = register_categories(&layout, project.path(), &chosen).unwrap();
    assert_eq!(report.added.len(), 2);

    let fp_table = fs::read_to_string(project.path().join("fp-lib-table")).unwrap();
    assert!(fp_table.contains(
        "(lib (name \"lib_passives\")(type \"KiCad\")(uri \"${KIPRJMOD}/parts/lib_fp/lib_passives.pretty\")"
    ));
}

#[test]
fn vcs_runs_after_merge_in_order() {
    let tmp = test_temp_dir();
    let layout = LibraryLayout::new(tmp.path().join("lib"));
    let archive = footprint_archive(tmp.path());
    let ws = Workspace::new(CategoryRegistry::standard(), layout.clone(), ImportConfig::default());
    let request = ImportRequest {
        archive: &archive,
        library: Some("passives"),
    };
    import_archive(&ws, &request, &mut ScriptedPrompt::default()).unwrap();

    let message = import_commit_message("LIB_R_0603.zip");

    let mut vcs = FakeVcs::default();
    record_changes(&mut vcs, &message, false).unwrap();
    assert_eq!(vcs.calls, ["stage", "commit Add components from LIB_R_0603.zip"]);

    let mut vcs = FakeVcs::default();
    record_changes(&mut vcs, &message, true).unwrap();
    assert_eq!(vcs.calls.last().map(String::as_str), Some("push"));
}

#[test]
fn vcs_failure_keeps_merged_files() {
    let tmp = test_temp_dir();
    let layout = LibraryLayout::new(tmp.path().join("lib"));
    let archive = footprint_archive(tmp.path());
    let ws = Workspace::new(CategoryRegistry::standard(), layout.clone(), ImportConfig::default());
    let request = ImportRequest {
        archive: &archive,
        library: Some("passives"),
    };
    import_archive(&ws, &request, &mut ScriptedPrompt::default()).unwrap();
    let merged = tmp.path().join("lib/lib_fp/lib_passives.pretty/R_0603.kicad_mod");
    let before = fs::read(&merged).unwrap();

    let mut vcs = FakeVcs {
        fail_push: true,
        ..FakeVcs::default()
    };
    let err = record_changes(&mut vcs, "msg", true).unwrap_err();
    assert!(err.to_string().contains("no upstream"));
    assert_eq!(fs::read(&merged).unwrap(), before);
}

#[test]
fn git_cli_commits_in_library_root() {
    let git_available = Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success());
    if !git_available {
        eprintln!("git not installed; skipping");
        return;
    }

    let tmp = test_temp_dir();
    let root = tmp.path().join("lib");
    fs::create_dir_all(&root).unwrap();
    for args in [
        &["init", "-q"][..],
        &["config", "user.name", "Library Bot"][..],
        &["config", "user.email", "bot@example.com"][..],
        &["config", "commit.gpgsign", "false"][..],
    ] {
        let status = Command::new("git").args(args).current_dir(&root).status().unwrap();
        assert!(status.success());
    }

    let layout = LibraryLayout::new(&root);
    initialize(&layout, &CategoryRegistry::standard()).unwrap();

    let mut git = GitCli::new("git", &root);
    let recorded = record_changes(&mut git, "Initialize component libraries", false).unwrap();
    assert!(recorded.committed);

    let log = Command::new("git")
        .args(["log", "--format=%s"])
        .current_dir(&root)
        .output()
        .unwrap();
    assert_eq!(
        String::from_utf8_lossy(&log.stdout).trim(),
        "Initialize component libraries"
    );

    // Nothing changed since: no second commit, and no error.
    let recorded = record_changes(&mut git, "again", false).unwrap();
    assert!(!recorded.committed);
    let count = Command::new("git")
        .args(["rev-list", "--count", "HEAD"])
        .current_dir(&root)
        .output()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&count.stdout).trim(), "1");
}
