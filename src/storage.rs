//! # Capture Storage
//!
//! File-backed storage for scan captures: listing, reading, deleting, and
//! on-demand export through the point cloud codec. The codec itself never
//! touches the filesystem; this module feeds it capture bytes and hands back
//! encoded bytes.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::cloud::{encoder, record, Capture, CloudFormat};
use crate::error::Result;

/// Extension of stored capture files
const CAPTURE_EXTENSION: &str = "csv";

/// Manages the directory of stored scan captures
#[derive(Debug, Clone)]
pub struct CaptureStore {
    root: PathBuf,
}

impl CaptureStore {
    /// Open (creating if needed) the capture directory
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Capture directory path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of stored captures, most recently modified first
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be read
    pub fn list(&self) -> Result<Vec<String>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CAPTURE_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let modified = entry.metadata()?.modified()?;
            entries.push((modified, name.to_string()));
        }

        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(entries.into_iter().map(|(_, name)| name).collect())
    }

    /// Read and parse a stored capture
    ///
    /// # Errors
    ///
    /// Returns error if the file is unreadable or cannot be decoded into
    /// point records. A capture with zero rows parses successfully.
    pub fn read(&self, name: &str) -> Result<Capture> {
        let name = sanitized(name);
        let data = fs::read(self.root.join(&name))?;
        record::parse_capture(&name, &data)
    }

    /// Delete a stored capture. Deleting a capture that does not exist is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be removed
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.root.join(sanitized(name));
        if path.exists() {
            info!(name, "deleting capture");
            fs::remove_file(path)?;
        } else {
            debug!(name, "capture already absent");
        }
        Ok(())
    }

    /// Delete the most recently modified capture, returning its name
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be read or the file cannot be
    /// removed
    pub fn delete_most_recent(&self) -> Result<Option<String>> {
        match self.list()?.into_iter().next() {
            Some(name) => {
                self.delete(&name)?;
                Ok(Some(name))
            }
            None => Ok(None),
        }
    }

    /// Encode a stored capture into the requested format.
    ///
    /// # Errors
    ///
    /// Returns error if the capture cannot be read or parsed, or if it holds
    /// zero records ([`crate::error::ScanRigError::EmptyCapture`]; callers
    /// must treat that as "nothing to download", never as an empty file).
    pub fn export(&self, name: &str, format: CloudFormat) -> Result<Vec<u8>> {
        let capture = self.read(name)?;
        encoder::encode(&capture, format)
    }

    /// Default capture name for a scan started at the current local time,
    /// e.g. `Scan 2026-08-07 14-03-59.csv`
    pub fn default_capture_name() -> String {
        format!(
            "Scan {}.{CAPTURE_EXTENSION}",
            chrono::Local::now().format("%Y-%m-%d %H-%M-%S")
        )
    }
}

/// Reduce a requested name to its final path component so stored captures
/// cannot be addressed outside the capture directory
fn sanitized(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanRigError;
    use tempfile::TempDir;

    fn store_with_files(files: &[(&str, &str)]) -> (TempDir, CaptureStore) {
        let dir = TempDir::new().unwrap();
        let store = CaptureStore::new(dir.path()).unwrap();
        for (name, contents) in files {
            std::fs::write(dir.path().join(name), contents).unwrap();
        }
        (dir, store)
    }

    const SAMPLE_CSV: &str = "X,Y,Z,SIGNAL_STRENGTH\n1.0,2.0,3.0,200\n";

    #[test]
    fn test_new_creates_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("captures");
        let store = CaptureStore::new(&root).unwrap();
        assert!(store.root().is_dir());
    }

    #[test]
    fn test_list_only_returns_captures() {
        let (_dir, store) = store_with_files(&[
            ("a.csv", SAMPLE_CSV),
            ("notes.txt", "not a capture"),
            ("b.csv", SAMPLE_CSV),
        ]);

        let mut names = store.list().unwrap();
        names.sort();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn test_list_sorts_most_recent_first() {
        let (dir, store) = store_with_files(&[("old.csv", SAMPLE_CSV)]);
        let old_time = filetime_of(dir.path(), "old.csv") - std::time::Duration::from_secs(60);
        set_mtime(dir.path(), "old.csv", old_time);
        std::fs::write(dir.path().join("new.csv"), SAMPLE_CSV).unwrap();

        assert_eq!(store.list().unwrap(), vec!["new.csv", "old.csv"]);
    }

    fn filetime_of(dir: &Path, name: &str) -> std::time::SystemTime {
        std::fs::metadata(dir.join(name)).unwrap().modified().unwrap()
    }

    fn set_mtime(dir: &Path, name: &str, time: std::time::SystemTime) {
        let file = std::fs::File::options()
            .write(true)
            .open(dir.join(name))
            .unwrap();
        file.set_modified(time).unwrap();
    }

    #[test]
    fn test_read_parses_capture() {
        let (_dir, store) = store_with_files(&[("scan.csv", SAMPLE_CSV)]);
        let capture = store.read("scan.csv").unwrap();
        assert_eq!(capture.len(), 1);
        assert_eq!(capture.source, "scan.csv");
    }

    #[test]
    fn test_read_missing_capture_fails() {
        let (_dir, store) = store_with_files(&[]);
        assert!(store.read("ghost.csv").is_err());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (dir, store) = store_with_files(&[("scan.csv", SAMPLE_CSV)]);
        store.delete("scan.csv").unwrap();
        assert!(!dir.path().join("scan.csv").exists());
        store.delete("scan.csv").unwrap();
    }

    #[test]
    fn test_delete_most_recent() {
        let (dir, store) = store_with_files(&[("old.csv", SAMPLE_CSV)]);
        let old_time = filetime_of(dir.path(), "old.csv") - std::time::Duration::from_secs(60);
        set_mtime(dir.path(), "old.csv", old_time);
        std::fs::write(dir.path().join("new.csv"), SAMPLE_CSV).unwrap();

        assert_eq!(store.delete_most_recent().unwrap(), Some("new.csv".to_string()));
        assert!(dir.path().join("old.csv").exists());
        assert!(!dir.path().join("new.csv").exists());
    }

    #[test]
    fn test_delete_most_recent_on_empty_store() {
        let (_dir, store) = store_with_files(&[]);
        assert_eq!(store.delete_most_recent().unwrap(), None);
    }

    #[test]
    fn test_export_round_trips_through_codec() {
        let (_dir, store) = store_with_files(&[("scan.csv", SAMPLE_CSV)]);
        let bytes = store.export("scan.csv", CloudFormat::PlyAscii).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("ply\n"));
        assert!(text.ends_with("1 2 3 200"));
    }

    #[test]
    fn test_export_empty_capture_is_absent_not_empty_file() {
        let (_dir, store) = store_with_files(&[("empty.csv", "X,Y,Z,SIGNAL_STRENGTH\n")]);
        let result = store.export("empty.csv", CloudFormat::PlyBinary);
        assert!(matches!(result, Err(ScanRigError::EmptyCapture(_))));
    }

    #[test]
    fn test_names_cannot_escape_the_store() {
        let (dir, store) = store_with_files(&[("scan.csv", SAMPLE_CSV)]);
        let outside = dir.path().parent().unwrap().join("scan.csv");
        assert!(!outside.exists());
        // a traversal-shaped name resolves to the plain capture name
        let capture = store.read("../scan.csv").unwrap();
        assert_eq!(capture.source, "scan.csv");
    }

    #[test]
    fn test_default_capture_name_shape() {
        let name = CaptureStore::default_capture_name();
        assert!(name.starts_with("Scan "));
        assert!(name.ends_with(".csv"));
    }
}
