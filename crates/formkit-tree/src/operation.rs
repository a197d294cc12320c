#![forbid(unsafe_code)]

//! Serializable tree operations, atomic application, and transactions.
//!
//! [`FieldTree::apply`] runs one [`FormOperation`] on a cloned working tree,
//! validates the result, and only then swaps it in. An
//! [`EditTransaction`] stages several operations, journals every attempt,
//! and either commits the working tree or restores the base.

use std::fmt;

use formkit_core::FieldId;
use serde::{Deserialize, Serialize};

use crate::column::ColumnWidth;
use crate::node::{ContainerRole, FieldKind, FieldNode};
use crate::patch::ConfigPatch;
use crate::placement::Target;
use crate::tree::{EditReport, FieldTree, TreeModelError};

/// Supported tree operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FormOperation {
    /// Insert a fully built node.
    Insert {
        node: FieldNode,
        #[serde(default)]
        target: Target,
    },
    /// Insert a palette item; the tree allocates the id.
    Create {
        kind: FieldKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<ContainerRole>,
        #[serde(default)]
        target: Target,
    },
    Reparent {
        node_id: FieldId,
        #[serde(default)]
        target: Target,
    },
    Delete {
        node_id: FieldId,
    },
    UpdateConfig {
        node_id: FieldId,
        patch: ConfigPatch,
    },
    /// Pin a width, or unpin with `None`.
    SetColumnHint {
        node_id: FieldId,
        width: Option<ColumnWidth>,
    },
}

impl FormOperation {
    /// Operation family.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Insert { .. } => OperationKind::Insert,
            Self::Create { .. } => OperationKind::Create,
            Self::Reparent { .. } => OperationKind::Reparent,
            Self::Delete { .. } => OperationKind::Delete,
            Self::UpdateConfig { .. } => OperationKind::UpdateConfig,
            Self::SetColumnHint { .. } => OperationKind::SetColumnHint,
        }
    }
}

/// Stable operation discriminator used in logs and journals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Insert,
    Create,
    Reparent,
    Delete,
    UpdateConfig,
    SetColumnHint,
}

impl OperationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Create => "create",
            Self::Reparent => "reparent",
            Self::Delete => "delete",
            Self::UpdateConfig => "update_config",
            Self::SetColumnHint => "set_column_hint",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful operation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub operation_id: u64,
    pub kind: OperationKind,
    pub touched_nodes: Vec<FieldId>,
    pub before_hash: u64,
    pub after_hash: u64,
    pub report: EditReport,
}

impl OperationOutcome {
    /// Whether the tree is unchanged.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.report.is_noop() || self.before_hash == self.after_hash
    }
}

/// An operation produced a tree that failed validation; the tree is unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationError {
    pub operation_id: u64,
    pub kind: OperationKind,
    pub touched_nodes: Vec<FieldId>,
    pub before_hash: u64,
    pub after_hash: u64,
    pub reason: TreeModelError,
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "form op {} ({}) failed: {} [nodes={:?}, before_hash={:#x}, after_hash={:#x}]",
            self.operation_id,
            self.kind,
            self.reason,
            self.touched_nodes
                .iter()
                .map(FieldId::as_str)
                .collect::<Vec<_>>(),
            self.before_hash,
            self.after_hash
        )
    }
}

impl std::error::Error for OperationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}

impl FieldTree {
    /// Apply one operation atomically.
    ///
    /// The operation is executed on a cloned working tree. On success, the
    /// mutated clone replaces `self`; on failure, `self` is unchanged.
    pub fn apply(
        &mut self,
        operation_id: u64,
        operation: FormOperation,
    ) -> Result<OperationOutcome, OperationError> {
        let kind = operation.kind();
        let before_hash = self.state_hash();
        let mut working = self.clone();

        let report = match operation {
            FormOperation::Insert { node, target } => working.insert(node, &target),
            FormOperation::Create { kind, role, target } => working.create(kind, role, &target),
            FormOperation::Reparent { node_id, target } => working.reparent(&node_id, &target),
            FormOperation::Delete { node_id } => working.delete(&node_id),
            FormOperation::UpdateConfig { node_id, patch } => {
                working.update_config(&node_id, &patch)
            }
            FormOperation::SetColumnHint { node_id, width } => {
                working.set_column_hint(&node_id, width)
            }
        };
        let touched_nodes: Vec<FieldId> = report.touched.iter().cloned().collect();

        if let Err(reason) = working.validate() {
            tracing::error!(operation_id, kind = %kind, %reason, "operation broke tree invariants");
            return Err(OperationError {
                operation_id,
                kind,
                touched_nodes,
                before_hash,
                after_hash: working.state_hash(),
                reason,
            });
        }

        let after_hash = working.state_hash();
        *self = working;
        tracing::debug!(
            operation_id,
            kind = %kind,
            touched = touched_nodes.len(),
            before_hash = format_args!("{before_hash:#x}"),
            after_hash = format_args!("{after_hash:#x}"),
            "operation applied"
        );

        Ok(OperationOutcome {
            operation_id,
            kind,
            touched_nodes,
            before_hash,
            after_hash,
            report,
        })
    }

    /// Start a transaction boundary for one or more operations.
    ///
    /// Transactions stage mutations on a cloned working tree and keep a
    /// deterministic journal for replay, undo/redo, and auditing.
    #[must_use]
    pub fn begin_transaction(&self, transaction_id: u64) -> EditTransaction {
        EditTransaction::new(transaction_id, self.clone())
    }
}

/// One deterministic operation journal row emitted by a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub transaction_id: u64,
    pub sequence: u64,
    pub operation_id: u64,
    pub operation: FormOperation,
    pub kind: OperationKind,
    pub touched_nodes: Vec<FieldId>,
    pub before_hash: u64,
    pub after_hash: u64,
    pub result: JournalResult,
}

/// Journal result state for one attempted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JournalResult {
    Applied,
    /// Accepted but left the tree unchanged.
    Skipped { reason: String },
    Rejected { reason: String },
}

/// Finalized transaction payload emitted by commit/rollback.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutcome {
    pub transaction_id: u64,
    pub committed: bool,
    pub tree: FieldTree,
    pub journal: Vec<JournalEntry>,
}

/// Transaction boundary wrapper for tree mutations.
#[derive(Debug, Clone, PartialEq)]
pub struct EditTransaction {
    transaction_id: u64,
    sequence: u64,
    base_tree: FieldTree,
    working_tree: FieldTree,
    journal: Vec<JournalEntry>,
}

impl EditTransaction {
    fn new(transaction_id: u64, base_tree: FieldTree) -> Self {
        Self {
            transaction_id,
            sequence: 1,
            base_tree: base_tree.clone(),
            working_tree: base_tree,
            journal: Vec::new(),
        }
    }

    /// Transaction identifier supplied by the caller.
    #[must_use]
    pub const fn transaction_id(&self) -> u64 {
        self.transaction_id
    }

    /// Current working tree for read-only inspection.
    #[must_use]
    pub fn tree(&self) -> &FieldTree {
        &self.working_tree
    }

    /// Journal entries in insertion order.
    #[must_use]
    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    /// Attempt one operation against the working tree.
    ///
    /// Every attempt is journaled, including rejected operations.
    pub fn apply(
        &mut self,
        operation_id: u64,
        operation: FormOperation,
    ) -> Result<OperationOutcome, OperationError> {
        let operation_for_journal = operation.clone();
        let kind = operation_for_journal.kind();
        let sequence = self.next_sequence();

        match self.working_tree.apply(operation_id, operation) {
            Ok(outcome) => {
                let result = match &outcome.report.noop {
                    Some(reason) => JournalResult::Skipped {
                        reason: reason.to_string(),
                    },
                    None => JournalResult::Applied,
                };
                self.journal.push(JournalEntry {
                    transaction_id: self.transaction_id,
                    sequence,
                    operation_id,
                    operation: operation_for_journal,
                    kind,
                    touched_nodes: outcome.touched_nodes.clone(),
                    before_hash: outcome.before_hash,
                    after_hash: outcome.after_hash,
                    result,
                });
                Ok(outcome)
            }
            Err(err) => {
                self.journal.push(JournalEntry {
                    transaction_id: self.transaction_id,
                    sequence,
                    operation_id,
                    operation: operation_for_journal,
                    kind,
                    touched_nodes: err.touched_nodes.clone(),
                    before_hash: err.before_hash,
                    after_hash: err.after_hash,
                    result: JournalResult::Rejected {
                        reason: err.reason.to_string(),
                    },
                });
                Err(err)
            }
        }
    }

    /// Finalize and keep all successful mutations.
    #[must_use]
    pub fn commit(self) -> TransactionOutcome {
        TransactionOutcome {
            transaction_id: self.transaction_id,
            committed: true,
            tree: self.working_tree,
            journal: self.journal,
        }
    }

    /// Finalize and discard all mutations.
    #[must_use]
    pub fn rollback(self) -> TransactionOutcome {
        TransactionOutcome {
            transaction_id: self.transaction_id,
            committed: false,
            tree: self.base_tree,
            journal: self.journal,
        }
    }

    fn next_sequence(&mut self) -> u64 {
        let sequence = self.sequence;
        self.sequence = self.sequence.saturating_add(1);
        sequence
    }
}
