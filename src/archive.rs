//! Vendor archive extraction.
//!
//! Archives are unpacked into a fresh temporary directory that is removed
//! when the returned [`ExtractedArchive`] is dropped. Vendors often ship a
//! zip per format inside the download, so inner `.zip` files are unpacked in
//! place up to a configurable depth.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::ImportError;

/// Contents of an archive unpacked into a temporary directory.
#[derive(Debug)]
pub struct ExtractedArchive {
    source: PathBuf,
    dir: TempDir,
}

impl ExtractedArchive {
    /// Root of the extracted tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// The archive this was extracted from.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Extracts `path` into a new temporary directory.
///
/// Inner `.zip` files are unpacked into a sibling directory named after the
/// archive and then removed, repeating for up to `max_depth` levels. With a
/// depth of 0 inner archives are left as they are.
///
/// Entries whose names would land outside the extraction directory are
/// skipped.
///
/// # Errors
///
/// Returns [`ImportError::Archive`] if the file is missing, is not a zip
/// archive, or is corrupt.
pub fn extract_archive(path: &Path, max_depth: u32) -> Result<ExtractedArchive, ImportError> {
    if !path.is_file() {
        return Err(ImportError::archive(path, "file not found"));
    }

    let dir = tempfile::Builder::new()
        .prefix("kicad-lib-")
        .tempdir()
        .map_err(|e| ImportError::archive(path, format!("cannot create temporary directory: {e}")))?;

    let count = unpack(path, dir.path()).map_err(|reason| ImportError::archive(path, reason))?;
    info!(archive = %path.display(), entries = count, "Extracted archive");

    unpack_nested(path, dir.path(), max_depth)?;

    Ok(ExtractedArchive {
        source: path.to_path_buf(),
        dir,
    })
}

/// Unpacks one zip file into `dest`, returning the number of files written.
fn unpack(archive: &Path, dest: &Path) -> Result<usize, String> {
    let file = File::open(archive).map_err(|e| e.to_string())?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|e| e.to_string())?;

    let mut written = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| e.to_string())?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "Skipping archive entry outside the extraction directory");
            continue;
        };
        let out = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out).map_err(|e| format!("{}: {e}", out.display()))?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("{}: {e}", parent.display()))?;
        }
        let mut target = File::create(&out).map_err(|e| format!("{}: {e}", out.display()))?;
        io::copy(&mut entry, &mut target).map_err(|e| format!("{}: {e}", out.display()))?;
        debug!(path = %out.display(), "Extracted");
        written += 1;
    }

    Ok(written)
}

fn unpack_nested(source: &Path, root: &Path, max_depth: u32) -> Result<(), ImportError> {
    for level in 1..=max_depth {
        let inner = find_zips(root)?;
        if inner.is_empty() {
            return Ok(());
        }
        for zip_path in inner {
            let dest = nested_destination(&zip_path);
            unpack(&zip_path, &dest).map_err(|reason| {
                ImportError::archive(source, format!("nested archive {}: {reason}", zip_path.display()))
            })?;
            fs::remove_file(&zip_path).map_err(|e| ImportError::io(&zip_path, e))?;
            debug!(level, archive = %zip_path.display(), "Unpacked nested archive");
        }
    }

    let leftover = find_zips(root)?;
    if !leftover.is_empty() {
        warn!(
            count = leftover.len(),
            max_depth, "Nested archives beyond the depth limit were not unpacked"
        );
    }
    Ok(())
}

/// `a/b/part.zip` unpacks into `a/b/part/`.
fn nested_destination(zip_path: &Path) -> PathBuf {
    let stem = zip_path
        .file_stem()
        .map_or_else(|| "archive".into(), |s| s.to_os_string());
    zip_path.with_file_name(stem)
}

fn find_zips(root: &Path) -> Result<Vec<PathBuf>, ImportError> {
    let root_str = root
        .to_str()
        .ok_or_else(|| ImportError::archive(root, "extraction path is not valid UTF-8"))?;
    let pattern = format!("{}/**/*.zip", Pattern::escape(root_str));
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    let paths = glob::glob_with(&pattern, options)
        .map_err(|e| ImportError::archive(root, format!("invalid search pattern: {e}")))?;
    Ok(paths.filter_map(Result::ok).filter(|p| p.is_file()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn write_zip(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, zip_bytes(entries)).unwrap();
        path
    }

    #[test]
    fn extracts_nested_directories() {
        let src = tempfile::tempdir().unwrap();
        let archive = write_zip(
            src.path(),
            "LIB_PART.zip",
            &[
                ("PART/KiCad/part.kicad_sym", b"(kicad_symbol_lib)"),
                ("PART/3D/part.stp", b"ISO-10303-21;"),
            ],
        );

        let extracted = extract_archive(&archive, 2).unwrap();
        assert!(extracted.root().join("PART/KiCad/part.kicad_sym").is_file());
        assert!(extracted.root().join("PART/3D/part.stp").is_file());
        assert_eq!(extracted.source(), archive);
    }

    #[test]
    fn temp_dir_removed_on_drop() {
        let src = tempfile::tempdir().unwrap();
        let archive = write_zip(src.path(), "a.zip", &[("x.kicad_mod", b"(footprint \"X\")")]);

        let extracted = extract_archive(&archive, 0).unwrap();
        let root = extracted.root().to_path_buf();
        assert!(root.is_dir());
        drop(extracted);
        assert!(!root.exists());
    }

    #[test]
    fn missing_and_corrupt_archives() {
        let src = tempfile::tempdir().unwrap();
        let err = extract_archive(&src.path().join("nope.zip"), 2).unwrap_err();
        assert!(matches!(err, ImportError::Archive { .. }));

        let bogus = src.path().join("bogus.zip");
        fs::write(&bogus, b"this is not a zip file").unwrap();
        let err = extract_archive(&bogus, 2).unwrap_err();
        assert!(matches!(err, ImportError::Archive { .. }));
    }

    #[test]
    fn nested_archive_unpacked_in_place() {
        let src = tempfile::tempdir().unwrap();
        let inner = zip_bytes(&[("part.kicad_mod", b"(footprint \"P\")")]);
        let archive = write_zip(src.path(), "outer.zip", &[("KiCad/inner.zip", &inner)]);

        let extracted = extract_archive(&archive, 2).unwrap();
        assert!(extracted.root().join("KiCad/inner/part.kicad_mod").is_file());
        assert!(!extracted.root().join("KiCad/inner.zip").exists());
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let src = tempfile::tempdir().unwrap();
        let level3 = zip_bytes(&[("deep.kicad_mod", b"(footprint \"D\")")]);
        let level2 = zip_bytes(&[("l3.zip", &level3)]);
        let archive = write_zip(src.path(), "outer.zip", &[("l2.zip", &level2)]);

        let extracted = extract_archive(&archive, 1).unwrap();
        assert!(extracted.root().join("l2/l3.zip").is_file());
        assert!(!extracted.root().join("l2/l3").exists());

        let extracted = extract_archive(&archive, 2).unwrap();
        assert!(extracted.root().join("l2/l3/deep.kicad_mod").is_file());
    }

    #[test]
    fn depth_zero_leaves_inner_archives() {
        let src = tempfile::tempdir().unwrap();
        let inner = zip_bytes(&[("a.kicad_mod", b"(footprint \"A\")")]);
        let archive = write_zip(src.path(), "outer.zip", &[("inner.zip", &inner)]);

        let extracted = extract_archive(&archive, 0).unwrap();
        assert!(extracted.root().join("inner.zip").is_file());
    }

    #[test]
    fn escaping_entries_are_skipped() {
        let src = tempfile::tempdir().unwrap();
        let archive = write_zip(
            src.path(),
            "evil.zip",
            &[("../escape.kicad_mod", b"(footprint \"E\")"), ("ok.kicad_mod", b"(footprint \"O\")")],
        );

        let extracted = extract_archive(&archive, 0).unwrap();
        assert!(extracted.root().join("ok.kicad_mod").is_file());
        assert!(!src.path().join("escape.kicad_mod").exists());
        assert!(!extracted.root().parent().unwrap().join("escape.kicad_mod").exists());
    }
}
