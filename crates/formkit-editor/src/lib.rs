#![forbid(unsafe_code)]

//! Editing sessions for formkit forms.
//!
//! A [`FormEditor`] wraps a [`formkit_tree::FieldTree`] with everything an
//! interactive builder needs around it:
//!
//! - snapshot undo/redo ([`History`])
//! - JSON export/import of the whole form ([`FormDocument`])
//! - pluggable persistence ([`DocumentStorage`], [`MemoryStorage`], [`FileStorage`])
//! - a bounded queue of user-facing [`Notification`]s
//!
//! ```rust
//! use formkit_core::EditorConfig;
//! use formkit_editor::FormEditor;
//! use formkit_tree::{FieldKind, Target};
//!
//! let mut editor = FormEditor::new(EditorConfig::default()).unwrap();
//! let id = editor.add_field(FieldKind::Email, None, Target::Canvas).unwrap();
//! assert!(editor.tree().contains(&id));
//! assert!(editor.undo());
//! assert!(editor.tree().is_empty());
//! ```

pub mod document;
pub mod history;
pub mod session;
pub mod storage;

pub use document::{Banner, DocumentError, FORM_DOCUMENT_VERSION, FormDocument, ImportedForm, Theme};
pub use history::History;
pub use session::{
    EditorError, FormEditor, FormState, ImportSummary, Notification, NotificationLevel,
};
pub use storage::{
    DocumentStorage, FileStorage, MemoryStorage, StorageError, StorageResult, storage_for,
};
