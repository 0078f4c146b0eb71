//! Input discovery: expands command-line arguments into tile document paths.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::InputError;

/// True for Fundamental Geospatial Data DEM documents, judged by file name:
/// a `.xml` extension (not a sidecar `.aux.xml`) and a stem naming both
/// `FG-GML` and `DEM`.
pub fn is_fgd_xml(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if !has_extension(path, "xml") || name.ends_with(".aux.xml") {
        return false;
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    stem.contains("DEM") && stem.contains("FG-GML")
}

/// Expand files, directories, zip archives and glob patterns into the list
/// of tile documents.
///
/// Matches of each pattern come back in glob's sorted order and patterns are
/// processed in the order given; a path reached twice is kept at its first
/// position. Directories are searched recursively. A zip archive is extracted
/// into a sibling directory named after it (an existing one is reused as is)
/// and that directory is searched.
pub fn expand_inputs<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<PathBuf>, InputError> {
    let mut found = Found::default();

    for pattern in patterns {
        let pattern = pattern.as_ref();
        for candidate in glob_paths(pattern)? {
            if candidate.is_dir() {
                found.walk(&candidate)?;
            } else if has_extension(&candidate, "zip") {
                let extracted = extract_archive(&candidate)?;
                found.walk(&extracted)?;
            } else if is_fgd_xml(&candidate) {
                found.push(candidate);
            } else {
                debug!(path = %candidate.display(), "Not a DEM tile document, skipping");
            }
        }
    }

    Ok(found.paths)
}

#[derive(Default)]
struct Found {
    seen: HashSet<PathBuf>,
    paths: Vec<PathBuf>,
}

impl Found {
    fn push(&mut self, path: PathBuf) {
        if self.seen.insert(path.clone()) {
            self.paths.push(path);
        }
    }

    fn walk(&mut self, dir: &Path) -> Result<(), InputError> {
        let nested = format!("{}/**/*.xml", Pattern::escape(&dir.to_string_lossy()));
        for path in glob_paths(&nested)? {
            if path.is_file() && is_fgd_xml(&path) {
                self.push(path);
            }
        }
        Ok(())
    }
}

/// Extract `archive` next to itself and return the extraction directory.
///
/// Entries are unpacked into a temporary directory that is renamed into place
/// once complete, so an interrupted run never leaves a half-filled directory
/// that a later run would reuse.
fn extract_archive(archive: &Path) -> Result<PathBuf, InputError> {
    let target = archive.with_extension("");
    if target.is_dir() {
        debug!(path = %target.display(), "Reusing extracted archive");
        return Ok(target);
    }

    let io_err = |source| InputError::Io {
        path: archive.to_path_buf(),
        source,
    };
    let zip_err = |source| InputError::Archive {
        path: archive.to_path_buf(),
        source,
    };
    let parent = match archive.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let file = File::open(archive).map_err(io_err)?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(zip_err)?;
    let staging = tempfile::Builder::new()
        .prefix(".extract-")
        .tempdir_in(parent)
        .map_err(io_err)?;
    zip.extract(staging.path()).map_err(zip_err)?;
    fs::rename(staging.path(), &target).map_err(io_err)?;

    info!(
        archive = %archive.display(),
        entries = zip.len(),
        path = %target.display(),
        "Extracted archive"
    );
    Ok(target)
}

fn glob_paths(pattern: &str) -> Result<Vec<PathBuf>, InputError> {
    let entries = glob::glob(pattern).map_err(|source| InputError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;
    let mut out = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => out.push(path),
            Err(e) => warn!(path = %e.path().display(), error = %e.error(), "Unreadable input, skipping"),
        }
    }
    Ok(out)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    const TILE_A: &str = "FG-GML-5339-45-00-DEM5A-20161001.xml";
    const TILE_B: &str = "FG-GML-5339-45-01-DEM5A-20161001.xml";

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, "").unwrap();
        path
    }

    fn arg(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_fgd_names() {
        assert!(is_fgd_xml(Path::new(TILE_A)));
        assert!(is_fgd_xml(Path::new("dir/FG-GML-5339-DEM10B.XML")));
        assert!(!is_fgd_xml(Path::new("FG-GML-5339-45-00-DEM5A.aux.xml")));
        assert!(!is_fgd_xml(Path::new("FG-GML-5339-45-00-AdmBdy.xml")));
        assert!(!is_fgd_xml(Path::new("DEM5A.xml")));
        assert!(!is_fgd_xml(Path::new("FG-GML-5339-45-00-DEM5A.zip")));
    }

    #[test]
    fn test_explicit_file_and_filtering() {
        let dir = tempfile::tempdir().unwrap();
        let tile = touch(dir.path(), TILE_A);
        let other = touch(dir.path(), "notes.xml");
        let found = expand_inputs(&[arg(&tile), arg(&other)]).unwrap();
        assert_eq!(found, vec![tile]);
    }

    #[test]
    fn test_directory_is_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), TILE_A);
        let b = touch(dir.path(), &format!("nested/deeper/{TILE_B}"));
        touch(dir.path(), "nested/FG-GML-5339-45-01-DEM5A.aux.xml");
        let found = expand_inputs(&[arg(dir.path())]).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.contains(&a));
        assert!(found.contains(&b));
    }

    #[test]
    fn test_glob_pattern_and_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), TILE_A);
        let b = touch(dir.path(), TILE_B);
        let pattern = format!("{}/*.xml", arg(dir.path()));
        let found = expand_inputs(&[pattern, arg(&b)]).unwrap();
        assert_eq!(found, vec![a, b]);
    }

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, contents) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_missing_path_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join(TILE_A);
        assert!(expand_inputs(&[arg(&missing)]).unwrap().is_empty());
    }

    #[test]
    fn test_zip_extracted_beside_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("FG-GML-5339-45-DEM5A.zip");
        let nested = format!("inner/{TILE_B}");
        write_zip(
            &archive,
            &[
                (TILE_A, "<Dataset/>"),
                (nested.as_str(), "<Dataset/>"),
                ("readme.txt", "not a tile"),
            ],
        );

        let found = expand_inputs(&[arg(&archive)]).unwrap();
        let extracted = dir.path().join("FG-GML-5339-45-DEM5A");
        assert!(extracted.is_dir());
        assert_eq!(found.len(), 2);
        assert!(found.contains(&extracted.join(TILE_A)));
        assert!(found.contains(&extracted.join("inner").join(TILE_B)));
        assert_eq!(
            fs::read_to_string(extracted.join(TILE_A)).unwrap(),
            "<Dataset/>"
        );
        // Only the archive and its extraction directory remain.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_existing_extraction_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("FG-GML-5339-45-DEM5A.zip");
        write_zip(&archive, &[(TILE_A, "<Dataset/>")]);
        let extracted = dir.path().join("FG-GML-5339-45-DEM5A");
        let added = touch(&extracted, TILE_B);

        let found = expand_inputs(&[arg(&archive)]).unwrap();
        assert_eq!(found, vec![added]);
    }

    #[test]
    fn test_corrupt_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = touch(dir.path(), "FG-GML-5339-45-DEM5A.zip");
        assert!(matches!(
            expand_inputs(&[arg(&archive)]),
            Err(InputError::Archive { .. })
        ));
        assert!(!dir.path().join("FG-GML-5339-45-DEM5A").exists());
    }

    #[test]
    fn test_bad_pattern() {
        assert!(matches!(
            expand_inputs(&["[unclosed"]),
            Err(InputError::Pattern { .. })
        ));
    }
}
