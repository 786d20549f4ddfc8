//! Annotation persistence
//!
//! Saves and loads a document's annotations as a JSON sidecar file next to
//! the PDF.

use crate::annotation::Annotation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Current sidecar format version
pub const SIDECAR_VERSION: u32 = 1;

/// Error types for persistence operations
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed annotation file: {0}")]
    Format(#[from] serde_json::Error),
    #[error("unsupported annotation file version {0}")]
    UnsupportedVersion(u32),
}

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Annotations of every page of one document
///
/// Keys are 1-based page numbers; pages without annotations are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSet {
    pub version: u32,
    #[serde(default)]
    pub pages: BTreeMap<u32, Vec<Annotation>>,
}

impl Default for AnnotationSet {
    fn default() -> Self {
        Self { version: SIDECAR_VERSION, pages: BTreeMap::new() }
    }
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from per-page lists in page order, skipping empty pages
    pub fn from_pages<'a, I>(pages: I) -> Self
    where
        I: IntoIterator<Item = &'a [Annotation]>,
    {
        let pages = pages
            .into_iter()
            .enumerate()
            .filter(|(_, annotations)| !annotations.is_empty())
            .map(|(index, annotations)| (index as u32 + 1, annotations.to_vec()))
            .collect();
        Self { version: SIDECAR_VERSION, pages }
    }

    pub fn page(&self, page_number: u32) -> &[Annotation] {
        self.pages.get(&page_number).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.pages.values().all(Vec::is_empty)
    }

    /// Total annotations across pages
    pub fn len(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    pub fn to_json(&self) -> PersistenceResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> PersistenceResult<Self> {
        let set: Self = serde_json::from_str(json)?;
        if set.version > SIDECAR_VERSION {
            return Err(PersistenceError::UnsupportedVersion(set.version));
        }
        Ok(set)
    }
}

/// Sidecar location for a given PDF path
///
/// # Example
/// ```
/// use std::path::Path;
/// use pagemark_core::persistence::sidecar_path;
///
/// let path = sidecar_path(Path::new("/path/to/document.pdf"));
/// assert_eq!(path, Path::new("/path/to/document.pdf.pagemark.json"));
/// ```
pub fn sidecar_path(pdf_path: &Path) -> PathBuf {
    let mut path = pdf_path.as_os_str().to_os_string();
    path.push(".pagemark.json");
    PathBuf::from(path)
}

/// Writes `set` to `path` atomically through a temporary file
pub fn write_annotations(path: &Path, set: &AnnotationSet) -> PersistenceResult<()> {
    let json = set.to_json()?;

    let mut temp_path = path.as_os_str().to_os_string();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    fs::write(&temp_path, json)?;
    fs::rename(&temp_path, path)?;
    log::debug!("wrote {} annotations to {}", set.len(), path.display());
    Ok(())
}

/// Reads an annotation file from an explicit path
pub fn read_annotations(path: &Path) -> PersistenceResult<AnnotationSet> {
    let json = fs::read_to_string(path)?;
    AnnotationSet::from_json(&json)
}

/// Saves the sidecar for `pdf_path` and returns its location
pub fn save_annotations(pdf_path: &Path, set: &AnnotationSet) -> PersistenceResult<PathBuf> {
    let path = sidecar_path(pdf_path);
    write_annotations(&path, set)?;
    Ok(path)
}

/// Loads the sidecar for `pdf_path`, `None` when there is none
pub fn load_annotations(pdf_path: &Path) -> PersistenceResult<Option<AnnotationSet>> {
    let path = sidecar_path(pdf_path);
    if !path.exists() {
        return Ok(None);
    }
    read_annotations(&path).map(Some)
}

pub fn annotations_exist(pdf_path: &Path) -> bool {
    sidecar_path(pdf_path).exists()
}

/// Removes the sidecar for `pdf_path` if present
pub fn delete_annotations(pdf_path: &Path) -> PersistenceResult<()> {
    let path = sidecar_path(pdf_path);
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Color, Point};
    use pretty_assertions::assert_eq;

    fn sample_set() -> AnnotationSet {
        let first = vec![Annotation::rectangle(
            Point::new(10.0, 10.0),
            Point::new(50.0, 50.0),
            Color::RED,
        )];
        let third = vec![Annotation::Line { x1: 0.0, y1: 0.0, x2: 5.0, y2: 5.0, color: Color::BLUE }];
        let second: Vec<Annotation> = Vec::new();
        AnnotationSet::from_pages([first.as_slice(), second.as_slice(), third.as_slice()])
    }

    #[test]
    fn test_sidecar_path() {
        let path = sidecar_path(Path::new("/path/to/document.pdf"));
        assert_eq!(path, PathBuf::from("/path/to/document.pdf.pagemark.json"));
    }

    #[test]
    fn test_from_pages_skips_empty_pages() {
        let set = sample_set();
        assert_eq!(set.pages.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(set.len(), 2);
        assert!(set.page(2).is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let pdf_path = dir.path().join("doc.pdf");
        let set = sample_set();

        assert!(!annotations_exist(&pdf_path));
        let saved = save_annotations(&pdf_path, &set).unwrap();
        assert!(saved.exists());
        assert!(!dir.path().join("doc.pdf.pagemark.json.tmp").exists());

        let loaded = load_annotations(&pdf_path).unwrap().unwrap();
        assert_eq!(loaded, set);

        delete_annotations(&pdf_path).unwrap();
        assert!(!annotations_exist(&pdf_path));
    }

    #[test]
    fn test_load_missing_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_annotations(&dir.path().join("none.pdf")).unwrap().is_none());
        assert!(delete_annotations(&dir.path().join("none.pdf")).is_ok());
    }

    #[test]
    fn test_rejects_future_version() {
        let err = AnnotationSet::from_json(r#"{"version": 99, "pages": {}}"#).unwrap_err();
        assert!(matches!(err, PersistenceError::UnsupportedVersion(99)));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"version": 1, "pages": {"1": [{"type": "blob"}]}}"#).unwrap();
        assert!(matches!(read_annotations(&path), Err(PersistenceError::Format(_))));
    }
}
