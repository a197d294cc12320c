#![forbid(unsafe_code)]

//! Invariant diagnostics and deterministic safe repair over flat snapshots.
//!
//! A snapshot is the node list exactly as it arrives from storage or an
//! import, before any validation. [`TreeSnapshot::invariant_report`] lists
//! every violation with a stable code; [`TreeSnapshot::repair_safe`] fixes the
//! reference-level problems (dangling, duplicated, self or second-parent
//! child entries) and refuses to touch snapshots with structural damage it
//! cannot resolve without guessing (duplicate ids, cycles).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use formkit_core::FieldId;
use serde::{Deserialize, Serialize};

use crate::hash::nodes_state_hash;
use crate::node::FieldNode;
use crate::tree::{FieldTree, TreeModelError};

/// Flat node list in collection order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeSnapshot {
    pub fields: Vec<FieldNode>,
}

impl TreeSnapshot {
    #[must_use]
    pub fn new(fields: Vec<FieldNode>) -> Self {
        Self { fields }
    }

    /// Deterministic hash, equal to [`FieldTree::state_hash`] of the same list.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        nodes_state_hash(&self.fields)
    }

    /// Inspect invariants and emit a structured diagnostics report.
    #[must_use]
    pub fn invariant_report(&self) -> InvariantReport {
        build_invariant_report(self)
    }

    /// Attempt deterministic safe repairs for recoverable invariant issues.
    ///
    /// Any unrepairable error in the pre-repair report causes this method to
    /// fail without modifying anything.
    pub fn repair_safe(self) -> Result<RepairOutcome, RepairError> {
        repair_snapshot_safe(self)
    }
}

/// Severity for one invariant finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantSeverity {
    Error,
    Warning,
}

/// Stable code for invariant findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantCode {
    DuplicateNodeId,
    DanglingChild,
    MultipleParents,
    SelfReference,
    DuplicateChild,
    CycleDetected,
}

impl InvariantCode {
    /// Whether [`TreeSnapshot::repair_safe`] can fix this finding.
    #[must_use]
    pub const fn repairable(self) -> bool {
        !matches!(self, Self::DuplicateNodeId | Self::CycleDetected)
    }
}

/// One actionable invariant finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantIssue {
    pub code: InvariantCode,
    pub severity: InvariantSeverity,
    pub repairable: bool,
    pub node_id: Option<FieldId>,
    pub related_node: Option<FieldId>,
    pub message: String,
}

/// Structured invariant report over a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantReport {
    pub snapshot_hash: u64,
    pub issues: Vec<InvariantIssue>,
}

impl InvariantReport {
    /// Return true if any error-level finding exists.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == InvariantSeverity::Error)
    }

    /// Return true if any unrepairable error-level finding exists.
    #[must_use]
    pub fn has_unrepairable_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == InvariantSeverity::Error && !issue.repairable)
    }

    /// Distinct codes in the report, sorted.
    #[must_use]
    pub fn codes(&self) -> Vec<InvariantCode> {
        self.issues
            .iter()
            .map(|issue| issue.code)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// One deterministic repair action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RepairAction {
    PruneDanglingChild {
        parent: FieldId,
        child: FieldId,
    },
    PruneSelfReference {
        node_id: FieldId,
    },
    DropDuplicateChild {
        parent: FieldId,
        child: FieldId,
    },
    DetachSecondParent {
        child: FieldId,
        kept_parent: FieldId,
        dropped_parent: FieldId,
    },
}

impl fmt::Display for RepairAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PruneDanglingChild { parent, child } => {
                write!(f, "removed missing child {child} from {parent}")
            }
            Self::PruneSelfReference { node_id } => {
                write!(f, "removed self reference from {node_id}")
            }
            Self::DropDuplicateChild { parent, child } => {
                write!(f, "removed repeated child {child} from {parent}")
            }
            Self::DetachSecondParent {
                child,
                kept_parent,
                dropped_parent,
            } => write!(
                f,
                "kept {child} under {kept_parent}, removed it from {dropped_parent}"
            ),
        }
    }
}

/// Outcome from a successful safe repair pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairOutcome {
    pub before_hash: u64,
    pub after_hash: u64,
    pub report_before: InvariantReport,
    pub report_after: InvariantReport,
    pub actions: Vec<RepairAction>,
    pub tree: FieldTree,
}

/// Failure reason for safe repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairFailure {
    UnsafeIssuesPresent { codes: Vec<InvariantCode> },
    ValidationFailed { error: TreeModelError },
}

impl fmt::Display for RepairFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsafeIssuesPresent { codes } => {
                write!(f, "snapshot contains unsafe invariant issues: {codes:?}")
            }
            Self::ValidationFailed { error } => {
                write!(f, "repaired snapshot failed validation: {error}")
            }
        }
    }
}

impl std::error::Error for RepairFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Self::ValidationFailed { error } = self {
            return Some(error);
        }
        None
    }
}

/// Error payload for repair attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairError {
    pub before_hash: u64,
    pub report: InvariantReport,
    pub reason: RepairFailure,
}

impl fmt::Display for RepairError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field tree repair failed: {} (before_hash={:#x}, issues={})",
            self.reason,
            self.before_hash,
            self.report.issues.len()
        )
    }
}

impl std::error::Error for RepairError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}

fn push_issue(
    issues: &mut Vec<InvariantIssue>,
    code: InvariantCode,
    node_id: Option<&FieldId>,
    related_node: Option<&FieldId>,
    message: impl Into<String>,
) {
    issues.push(InvariantIssue {
        code,
        severity: InvariantSeverity::Error,
        repairable: code.repairable(),
        node_id: node_id.cloned(),
        related_node: related_node.cloned(),
        message: message.into(),
    });
}

fn dfs_collect_cycles(
    node_id: &FieldId,
    edges: &BTreeMap<&FieldId, Vec<&FieldId>>,
    visiting: &mut BTreeSet<FieldId>,
    visited: &mut BTreeSet<FieldId>,
    cycle_nodes: &mut BTreeSet<FieldId>,
) {
    if visiting.contains(node_id) {
        let _ = cycle_nodes.insert(node_id.clone());
        return;
    }
    if !visited.insert(node_id.clone()) {
        return;
    }
    let _ = visiting.insert(node_id.clone());
    if let Some(children) = edges.get(node_id) {
        for child in children {
            dfs_collect_cycles(child, edges, visiting, visited, cycle_nodes);
        }
    }
    let _ = visiting.remove(node_id);
}

fn build_invariant_report(snapshot: &TreeSnapshot) -> InvariantReport {
    let mut issues = Vec::new();

    let mut known = BTreeSet::new();
    for node in &snapshot.fields {
        if !known.insert(&node.id) {
            push_issue(
                &mut issues,
                InvariantCode::DuplicateNodeId,
                Some(&node.id),
                None,
                format!("duplicate node id {}", node.id),
            );
        }
    }

    // Edges kept by repair: first parent in collection order wins.
    let mut first_parent: BTreeMap<&FieldId, &FieldId> = BTreeMap::new();
    let mut edges: BTreeMap<&FieldId, Vec<&FieldId>> = BTreeMap::new();
    for node in &snapshot.fields {
        let mut local = BTreeSet::new();
        for child in node.child_ids() {
            if *child == node.id {
                push_issue(
                    &mut issues,
                    InvariantCode::SelfReference,
                    Some(&node.id),
                    None,
                    format!("container {} lists itself as a child", node.id),
                );
                continue;
            }
            if !known.contains(child) {
                push_issue(
                    &mut issues,
                    InvariantCode::DanglingChild,
                    Some(&node.id),
                    Some(child),
                    format!("container {} references missing child {child}", node.id),
                );
                continue;
            }
            if !local.insert(child) {
                push_issue(
                    &mut issues,
                    InvariantCode::DuplicateChild,
                    Some(&node.id),
                    Some(child),
                    format!("container {} lists child {child} more than once", node.id),
                );
                continue;
            }
            match first_parent.get(child) {
                Some(first) if *first != &node.id => push_issue(
                    &mut issues,
                    InvariantCode::MultipleParents,
                    Some(child),
                    Some(&node.id),
                    format!("node {child} already belongs to {first}, also listed by {}", node.id),
                ),
                Some(_) => {}
                None => {
                    let _ = first_parent.insert(child, &node.id);
                    edges.entry(&node.id).or_default().push(child);
                }
            }
        }
    }

    let mut visiting = BTreeSet::new();
    let mut visited = BTreeSet::new();
    let mut cycle_nodes = BTreeSet::new();
    for node in &snapshot.fields {
        dfs_collect_cycles(
            &node.id,
            &edges,
            &mut visiting,
            &mut visited,
            &mut cycle_nodes,
        );
    }
    for node_id in &cycle_nodes {
        push_issue(
            &mut issues,
            InvariantCode::CycleDetected,
            Some(node_id),
            None,
            format!("node {node_id} is its own ancestor"),
        );
    }

    InvariantReport {
        snapshot_hash: snapshot.state_hash(),
        issues,
    }
}

fn repair_snapshot_safe(snapshot: TreeSnapshot) -> Result<RepairOutcome, RepairError> {
    let before_hash = snapshot.state_hash();
    let report_before = snapshot.invariant_report();
    if report_before.has_unrepairable_errors() {
        let codes = report_before
            .issues
            .iter()
            .filter(|issue| !issue.repairable)
            .map(|issue| issue.code)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        return Err(RepairError {
            before_hash,
            report: report_before,
            reason: RepairFailure::UnsafeIssuesPresent { codes },
        });
    }

    let known: BTreeSet<FieldId> = snapshot.fields.iter().map(|node| node.id.clone()).collect();
    let mut owner: BTreeMap<FieldId, FieldId> = BTreeMap::new();
    let mut actions = Vec::new();
    let mut fields = snapshot.fields;
    for node in &mut fields {
        let parent = node.id.clone();
        let Some(child_ids) = node.child_ids_mut() else {
            continue;
        };
        let mut local = BTreeSet::new();
        let mut kept = Vec::with_capacity(child_ids.len());
        for child in child_ids.drain(..) {
            if child == parent {
                actions.push(RepairAction::PruneSelfReference {
                    node_id: parent.clone(),
                });
            } else if !known.contains(&child) {
                actions.push(RepairAction::PruneDanglingChild {
                    parent: parent.clone(),
                    child,
                });
            } else if local.contains(&child) {
                actions.push(RepairAction::DropDuplicateChild {
                    parent: parent.clone(),
                    child,
                });
            } else if let Some(kept_parent) = owner.get(&child) {
                actions.push(RepairAction::DetachSecondParent {
                    child,
                    kept_parent: kept_parent.clone(),
                    dropped_parent: parent.clone(),
                });
            } else {
                let _ = owner.insert(child.clone(), parent.clone());
                let _ = local.insert(child.clone());
                kept.push(child);
            }
        }
        *child_ids = kept;
    }

    let repaired = TreeSnapshot { fields };
    let tree = match FieldTree::from_snapshot(repaired) {
        Ok(tree) => tree,
        Err(error) => {
            return Err(RepairError {
                before_hash,
                report: report_before,
                reason: RepairFailure::ValidationFailed { error },
            });
        }
    };
    if !actions.is_empty() {
        tracing::warn!(actions = actions.len(), "repaired field tree references");
    }
    let report_after = tree.invariant_report();
    Ok(RepairOutcome {
        before_hash,
        after_hash: tree.state_hash(),
        report_before,
        report_after,
        actions,
        tree,
    })
}
