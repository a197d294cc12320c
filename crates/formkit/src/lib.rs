#![forbid(unsafe_code)]

//! formkit public facade crate.
//!
//! Re-exports the everyday surface of the internal crates and offers a
//! prelude for building, editing, and validating forms.

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use formkit_core::{
    Clock, DeletePolicy, EditorConfig, EditorConfigError, FieldId, FieldIdAllocator, IdError,
    ImportPolicy, ManualClock, SystemClock,
};

// --- Tree re-exports -------------------------------------------------------

pub use formkit_tree::{
    ColumnHint, ColumnWidth, ConfigPatch, ContainerRole, DragSource, DropPreview, DropZone,
    EditReport, FieldKind, FieldNode, FieldOption, FieldTree, FormOperation, OperationError,
    OperationOutcome, Target, TreeModelError, TreeSnapshot, ValidationRules, drop_preview,
};

// --- Validation re-exports -------------------------------------------------

#[cfg(feature = "validation")]
pub use formkit_validation::{
    Submission, SubmissionReport, SubmittedValue, ValidationError, Validator, validate_submission,
};

// --- Editor re-exports -----------------------------------------------------

#[cfg(feature = "editor")]
pub use formkit_editor::{
    Banner, DocumentError, EditorError, FileStorage, FormDocument, FormEditor, MemoryStorage,
    Notification, NotificationLevel, StorageError, Theme,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for formkit callers.
#[derive(Debug)]
pub enum Error {
    /// A raw id was rejected.
    Id(IdError),
    /// A tree edit or snapshot was rejected.
    Tree(TreeModelError),
    #[cfg(feature = "editor")]
    Editor(EditorError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(err) => write!(f, "{err}"),
            Self::Tree(err) => write!(f, "{err}"),
            #[cfg(feature = "editor")]
            Self::Editor(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Id(err) => Some(err),
            Self::Tree(err) => Some(err),
            #[cfg(feature = "editor")]
            Self::Editor(err) => Some(err),
        }
    }
}

impl From<IdError> for Error {
    fn from(err: IdError) -> Self {
        Self::Id(err)
    }
}

impl From<TreeModelError> for Error {
    fn from(err: TreeModelError) -> Self {
        Self::Tree(err)
    }
}

impl From<OperationError> for Error {
    fn from(err: OperationError) -> Self {
        Self::Tree(err.reason)
    }
}

#[cfg(feature = "editor")]
impl From<EditorError> for Error {
    fn from(err: EditorError) -> Self {
        Self::Editor(err)
    }
}

/// Standard result type for formkit APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Install the default `tracing` subscriber (`FORMKIT_LOG`, `FORMKIT_LOG_FORMAT`).
///
/// Returns `false` when a global subscriber was already set.
pub fn init_logging() -> bool {
    formkit_core::logging::init()
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        ConfigPatch, ContainerRole, EditorConfig, Error, FieldId, FieldKind, FieldNode,
        FieldTree, FormOperation, Result, Target,
    };

    #[cfg(feature = "editor")]
    pub use crate::{FormDocument, FormEditor, Theme};

    #[cfg(feature = "validation")]
    pub use crate::{Submission, SubmittedValue, validate_submission};

    pub use crate::{core, tree};

    #[cfg(feature = "editor")]
    pub use crate::editor;

    #[cfg(feature = "validation")]
    pub use crate::validation;
}

pub use formkit_core as core;
#[cfg(feature = "editor")]
pub use formkit_editor as editor;
pub use formkit_tree as tree;
#[cfg(feature = "validation")]
pub use formkit_validation as validation;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    fn build() -> crate::Result<FieldTree> {
        let mut tree = FieldTree::new();
        let column = FieldId::new("col")?;
        let _ = tree.apply(
            1,
            FormOperation::Insert {
                node: FieldNode::container(column.clone(), ContainerRole::Column),
                target: Target::Canvas,
            },
        )?;
        let _ = tree.apply(
            2,
            FormOperation::Create {
                kind: FieldKind::Text,
                role: None,
                target: Target::Node(column),
            },
        )?;
        Ok(tree)
    }

    #[test]
    fn prelude_builds_a_form() {
        let tree = build().expect("valid edits");
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn empty_id_surfaces_as_facade_error() {
        let err = FieldId::new("").map_err(Error::from).expect_err("empty");
        assert!(matches!(err, Error::Id(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[cfg(feature = "editor")]
    #[test]
    fn editor_round_trip_through_facade() {
        let tree = build().expect("valid edits");
        let document = FormDocument::export(&tree, &Theme::default(), None, &crate::ManualClock::new(0));
        let mut editor = FormEditor::new(EditorConfig::default()).expect("default config");
        let json = document.to_json_pretty().expect("serialize");
        let summary = editor.import_json(&json).expect("import");
        assert_eq!(summary.fields, 2);
        assert_eq!(editor.tree(), &tree);
    }
}
