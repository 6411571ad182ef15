//! Archive layout inspection.
//!
//! Matomo release archives nest the payload under a single directory. The
//! extraction root is the unique path prefix containing the `piwik.php`
//! marker file; the lock records it so unpacking is unambiguous later.

use crate::SyncError;
use std::collections::BTreeSet;
use std::io::Cursor;
use zip::ZipArchive;

/// Marker file that identifies the Matomo payload root inside an archive.
pub const MARKER_FILE: &str = "piwik.php";

/// Find the unique archive-internal path prefix containing [`MARKER_FILE`].
///
/// Returns the prefix without a trailing slash (empty string when the marker
/// sits at the archive root). Zero or multiple candidate roots fail with
/// `AmbiguousExtractionRoot`.
pub fn extraction_root(archive_bytes: &[u8]) -> Result<String, SyncError> {
    let mut archive = ZipArchive::new(Cursor::new(archive_bytes))
        .map_err(|e| SyncError::Archive(e.to_string()))?;

    let mut candidates = BTreeSet::new();
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| SyncError::Archive(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name();
        if let Some(prefix) = name.strip_suffix(MARKER_FILE) {
            if prefix.is_empty() {
                candidates.insert(String::new());
            } else if let Some(dir) = prefix.strip_suffix('/') {
                candidates.insert(dir.to_owned());
            }
        }
    }

    if candidates.len() == 1 {
        return Ok(candidates.into_iter().next().unwrap_or_default());
    }
    Err(SyncError::AmbiguousExtractionRoot {
        candidates: candidates.into_iter().collect(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Build an in-memory zip with the given file paths.
    pub(crate) fn make_zip(paths: &[&str]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for path in paths {
            writer
                .start_file(*path, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"content").unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn finds_nested_root() {
        let zip = make_zip(&["matomo/piwik.php", "matomo/index.php", "matomo/core/Version.php"]);
        assert_eq!(extraction_root(&zip).unwrap(), "matomo");
    }

    #[test]
    fn marker_at_archive_root_yields_empty_prefix() {
        let zip = make_zip(&["piwik.php", "index.php"]);
        assert_eq!(extraction_root(&zip).unwrap(), "");
    }

    #[test]
    fn missing_marker_is_ambiguous() {
        let zip = make_zip(&["matomo/index.php"]);
        assert!(matches!(
            extraction_root(&zip).unwrap_err(),
            SyncError::AmbiguousExtractionRoot { candidates } if candidates.is_empty()
        ));
    }

    #[test]
    fn two_candidate_roots_are_ambiguous() {
        let zip = make_zip(&["a/piwik.php", "b/piwik.php"]);
        assert!(matches!(
            extraction_root(&zip).unwrap_err(),
            SyncError::AmbiguousExtractionRoot { candidates } if candidates.len() == 2
        ));
    }

    #[test]
    fn file_merely_ending_in_marker_name_does_not_count() {
        let zip = make_zip(&["matomo/not-piwik.php", "matomo/piwik.php"]);
        assert_eq!(extraction_root(&zip).unwrap(), "matomo");
    }

    #[test]
    fn garbage_bytes_are_an_archive_error() {
        assert!(matches!(
            extraction_root(b"definitely not a zip"),
            Err(SyncError::Archive(_))
        ));
    }
}
