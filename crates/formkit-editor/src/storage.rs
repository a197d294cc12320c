#![forbid(unsafe_code)]

//! Whole-document persistence backends.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 FormEditor                    │
//! │   - exports a FormDocument on save            │
//! │   - imports it (policy-checked) on load       │
//! └──────────────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │               DocumentStorage                 │
//! │   - MemoryStorage: in-memory (tests, drafts)  │
//! │   - FileStorage: pretty JSON, atomic rename   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Storage failures never panic and never touch the editor's in-memory
//! state.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use formkit_core::EditorConfig;

use crate::document::{DocumentError, FormDocument};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during document storage operations.
#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    /// The stored bytes are not a readable form document.
    Document(DocumentError),
    /// Lock poisoning or similar internal damage.
    Corruption(String),
    Unavailable(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::Document(e) => write!(f, "stored document unreadable: {e}"),
            StorageError::Corruption(msg) => write!(f, "storage corruption: {msg}"),
            StorageError::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            StorageError::Document(e) => Some(e),
            StorageError::Corruption(_) | StorageError::Unavailable(_) => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<DocumentError> for StorageError {
    fn from(e: DocumentError) -> Self {
        StorageError::Document(e)
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

// ─────────────────────────────────────────────────────────────────────────────
// Storage Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Pluggable place to keep one form document.
///
/// - `load` returns `Ok(None)` when nothing was saved yet.
/// - `save` replaces the stored document atomically.
pub trait DocumentStorage: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    fn load(&self) -> StorageResult<Option<FormDocument>>;

    fn save(&self, document: &FormDocument) -> StorageResult<()>;

    fn clear(&self) -> StorageResult<()>;

    fn is_available(&self) -> bool {
        true
    }
}

/// File storage when the config names a path, memory storage otherwise.
#[must_use]
pub fn storage_for(config: &EditorConfig) -> Box<dyn DocumentStorage> {
    match &config.storage_path {
        Some(path) => Box::new(FileStorage::new(path)),
        None => Box::new(MemoryStorage::new()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Storage
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory backend; the document is lost when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
    document: RwLock<Option<FormDocument>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_document(document: FormDocument) -> Self {
        Self {
            document: RwLock::new(Some(document)),
        }
    }
}

impl DocumentStorage for MemoryStorage {
    fn name(&self) -> &str {
        "MemoryStorage"
    }

    fn load(&self) -> StorageResult<Option<FormDocument>> {
        let guard = self
            .document
            .read()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        Ok(guard.clone())
    }

    fn save(&self, document: &FormDocument) -> StorageResult<()> {
        let mut guard = self
            .document
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        *guard = Some(document.clone());
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        let mut guard = self
            .document
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        *guard = None;
        Ok(())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stored = self.document.read().map(|g| g.is_some()).unwrap_or(false);
        f.debug_struct("MemoryStorage")
            .field("stored", &stored)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Storage
// ─────────────────────────────────────────────────────────────────────────────

/// Pretty-printed JSON file.
///
/// Saves write `{path}.tmp`, fsync it, then rename over `{path}`, so a
/// crash mid-save leaves the previous document intact.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// The file does not need to exist; it is created on first save.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

impl DocumentStorage for FileStorage {
    fn name(&self) -> &str {
        "FileStorage"
    }

    fn load(&self) -> StorageResult<Option<FormDocument>> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let document = FormDocument::from_json(&json)?;
        tracing::debug!(path = %self.path.display(), fields = document.fields.fields.len(), "loaded form document");
        Ok(Some(document))
    }

    fn save(&self, document: &FormDocument) -> StorageResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = document.to_json_pretty()?;

        let tmp_path = self.temp_path();
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(json.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            fields = document.fields.fields.len(),
            "saved form document"
        );
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn is_available(&self) -> bool {
        let Some(parent) = self.path.parent() else {
            return false;
        };
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if !parent.exists() {
            return fs::create_dir_all(parent).is_ok();
        }
        let probe = parent.join(".formkit_write_probe");
        if fs::write(&probe, b"probe").is_ok() {
            let _ = fs::remove_file(&probe);
            return true;
        }
        false
    }
}

impl fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStorage")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Theme;
    use formkit_core::ManualClock;
    use formkit_tree::{FieldKind, FieldNode, FieldTree, Target};
    use tempfile::TempDir;

    fn document() -> FormDocument {
        let mut tree = FieldTree::new();
        let _ = tree.insert(
            FieldNode::from_palette(FieldKind::Email, formkit_core::FieldId::new("email").expect("id")),
            &Target::Canvas,
        );
        FormDocument::export(&tree, &Theme::default(), None, &ManualClock::new(0))
    }

    #[test]
    fn memory_storage_basic_operations() {
        let storage = MemoryStorage::new();
        assert!(storage.load().expect("load").is_none());
        storage.save(&document()).expect("save");
        assert_eq!(storage.load().expect("load"), Some(document()));
        storage.clear().expect("clear");
        assert!(storage.load().expect("load").is_none());
        assert_eq!(format!("{storage:?}"), "MemoryStorage { stored: false }");
    }

    #[test]
    fn file_storage_round_trip() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("form.json");
        let storage = FileStorage::new(&path);

        storage.save(&document()).expect("save");
        assert!(path.exists());
        assert!(!storage.temp_path().exists());
        assert_eq!(storage.load().expect("load"), Some(document()));
    }

    #[test]
    fn file_storage_load_nonexistent() {
        let tmp = TempDir::new().expect("tempdir");
        let storage = FileStorage::new(tmp.path().join("missing.json"));
        assert!(storage.load().expect("load").is_none());
        storage.clear().expect("clearing nothing is fine");
    }

    #[test]
    fn file_storage_creates_parent_dirs() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("nested").join("dirs").join("form.json");
        let storage = FileStorage::new(&path);
        assert!(storage.is_available());
        storage.save(&document()).expect("save");
        assert!(path.exists());
    }

    #[test]
    fn file_storage_reports_corrupt_document() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("form.json");
        fs::write(&path, "{\"version\":1,\"fields\":").expect("write");
        let err = FileStorage::new(&path).load().expect_err("truncated");
        assert!(matches!(err, StorageError::Document(DocumentError::Parse(_))));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn config_selects_backend() {
        let memory = storage_for(&EditorConfig::default());
        assert_eq!(memory.name(), "MemoryStorage");
        let file = storage_for(&EditorConfig {
            storage_path: Some(PathBuf::from("form.json")),
            ..EditorConfig::default()
        });
        assert_eq!(file.name(), "FileStorage");
    }

    #[test]
    fn storage_error_display() {
        let io = StorageError::Io(std::io::Error::other("disk full"));
        assert_eq!(io.to_string(), "I/O error: disk full");
        assert_eq!(
            StorageError::Unavailable("read-only".into()).to_string(),
            "storage unavailable: read-only"
        );
    }
}
