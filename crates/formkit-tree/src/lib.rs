#![forbid(unsafe_code)]

//! Field-tree engine for the form builder.
//!
//! - [`FieldTree`] - id → node arena plus collection order, with insert,
//!   reparent, delete and config merge
//! - [`FieldNode`] - a field descriptor whose payload is tagged by kind
//! - [`ColumnWidth`] / [`ColumnHint`] - 12-unit grid widths and auto-balancing
//! - [`FormOperation`] / [`EditTransaction`] - serializable operations,
//!   atomic application, and journaled transactions
//! - [`TreeSnapshot`] - invariant diagnostics and safe repair of imported data
//! - [`drop_preview`] - pure drag feedback
//!
//! ```rust
//! use formkit_tree::{ColumnWidth, ContainerRole, FieldKind, FieldTree, Target};
//!
//! let mut tree = FieldTree::new();
//! let column = tree.create(FieldKind::Container, Some(ContainerRole::Column), &Target::Canvas);
//! let column_id = column.inserted.unwrap();
//! let text = tree.create(FieldKind::Text, None, &Target::Node(column_id.clone()));
//! let text_id = text.inserted.unwrap();
//! assert_eq!(tree.parent_of(&text_id), Some(&column_id));
//! assert_eq!(tree.node(&text_id).and_then(|n| n.column_width()), Some(ColumnWidth::Full));
//! ```

pub mod column;
pub mod drop;
mod hash;
pub mod invariants;
pub mod node;
pub mod operation;
pub mod patch;
pub mod placement;
pub mod tree;

pub use column::{ColumnHint, ColumnWidth, GRID_UNITS, balanced_hint};
pub use drop::{DragSource, DropPreview, DropZone, drop_preview};
pub use invariants::{
    InvariantCode, InvariantIssue, InvariantReport, InvariantSeverity, RepairAction, RepairError,
    RepairFailure, RepairOutcome, TreeSnapshot,
};
pub use node::{
    ButtonAction, ButtonPayload, ChoicePayload, ContainerPayload, ContainerRole, FieldAttributes,
    FieldKind, FieldNode, FieldOption, FieldPayload, HeadingPayload, ImagePayload, InputPayload,
    NumberPayload, ParagraphPayload, SpacerPayload, TablePayload, TextareaPayload, UploadPayload,
    ValidationRules,
};
pub use operation::{
    EditTransaction, FormOperation, JournalEntry, JournalResult, OperationError, OperationKind,
    OperationOutcome, TransactionOutcome,
};
pub use patch::ConfigPatch;
pub use placement::{Placement, Resolution, Target};
pub use tree::{EditReport, FieldTree, NoopReason, TreeModelError, TreeSettings};
