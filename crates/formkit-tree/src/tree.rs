#![forbid(unsafe_code)]

//! The field tree: an id → node arena plus the collection order.
//!
//! Parent → child edges live only in container payloads. The top-level
//! rendering order is the collection order minus every id that appears in
//! some container's child list. Every mutation keeps these invariants:
//!
//! 1. ids are unique;
//! 2. a node has at most one parent;
//! 3. child lists never reference missing nodes;
//! 4. only containers own children (enforced by [`FieldPayload`]);
//! 5. no container is its own ancestor.
//!
//! Mutations are total: a malformed target degrades to a top-level append and
//! a missing node turns the operation into a reported no-op.
//!
//! [`FieldPayload`]: crate::node::FieldPayload

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use formkit_core::{DeletePolicy, EditorConfig, FieldId, FieldIdAllocator};
use serde::{Deserialize, Serialize};

use crate::column::{ColumnHint, ColumnWidth, balanced_hint};
use crate::hash::nodes_state_hash;
use crate::invariants::{InvariantReport, TreeSnapshot};
use crate::node::{ContainerRole, FieldKind, FieldNode};
use crate::patch::ConfigPatch;
use crate::placement::{self, Placement, Target};

/// Policy knobs the tree consults while mutating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TreeSettings {
    pub delete_policy: DeletePolicy,
    /// Recompute the parent column's hints after deleting one of its children.
    pub rebalance_on_delete: bool,
}

impl From<&EditorConfig> for TreeSettings {
    fn from(config: &EditorConfig) -> Self {
        Self {
            delete_policy: config.delete_policy,
            rebalance_on_delete: config.rebalance_on_delete,
        }
    }
}

/// Why a mutation left the tree unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NoopReason {
    MissingNode { node_id: FieldId },
    SelfTarget { node_id: FieldId },
    DescendantTarget { node_id: FieldId, target: FieldId },
}

impl fmt::Display for NoopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingNode { node_id } => write!(f, "node {node_id} not found"),
            Self::SelfTarget { node_id } => write!(f, "node {node_id} cannot target itself"),
            Self::DescendantTarget { node_id, target } => write!(
                f,
                "node {node_id} cannot move next to or into its descendant {target}"
            ),
        }
    }
}

/// What one mutation did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditReport {
    /// Every node whose stored state changed or that anchored the change.
    pub touched: BTreeSet<FieldId>,
    /// Id actually used by an insert.
    pub inserted: Option<FieldId>,
    /// Proposed id that collided and was re-issued.
    pub reissued_from: Option<FieldId>,
    /// Pre-populated children dropped from an inserted container.
    pub stripped_children: Vec<FieldId>,
    pub removed: Vec<FieldId>,
    /// Children that took a deleted container's place.
    pub promoted: Vec<FieldId>,
    /// Config keys that do not apply to the node's kind.
    pub ignored_keys: Vec<&'static str>,
    /// Column containers whose hints were recomputed.
    pub rebalanced: Vec<FieldId>,
    /// The target was unresolvable and placement degraded to top level.
    pub fell_back: bool,
    pub noop: Option<NoopReason>,
}

impl EditReport {
    fn noop(reason: NoopReason) -> Self {
        Self {
            noop: Some(reason),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.noop.is_some()
    }
}

/// Structural validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeModelError {
    DuplicateNodeId { node_id: FieldId },
    DanglingChild { parent: FieldId, child: FieldId },
    MultipleParents { child: FieldId, first: FieldId, second: FieldId },
    SelfReference { node_id: FieldId },
    DuplicateChild { parent: FieldId, child: FieldId },
    CycleDetected { node_id: FieldId },
    OrderMismatch { node_id: FieldId },
}

impl fmt::Display for TreeModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateNodeId { node_id } => write!(f, "duplicate node id {node_id}"),
            Self::DanglingChild { parent, child } => {
                write!(f, "container {parent} references missing child {child}")
            }
            Self::MultipleParents {
                child,
                first,
                second,
            } => write!(f, "node {child} has two parents: {first} and {second}"),
            Self::SelfReference { node_id } => {
                write!(f, "container {node_id} lists itself as a child")
            }
            Self::DuplicateChild { parent, child } => {
                write!(f, "container {parent} lists child {child} more than once")
            }
            Self::CycleDetected { node_id } => {
                write!(f, "cycle detected at node {node_id}")
            }
            Self::OrderMismatch { node_id } => {
                write!(f, "collection order and node map disagree on {node_id}")
            }
        }
    }
}

impl std::error::Error for TreeModelError {}

/// Ordered, validated collection of field nodes.
#[derive(Debug, Clone)]
pub struct FieldTree {
    nodes: BTreeMap<FieldId, FieldNode>,
    order: Vec<FieldId>,
    settings: TreeSettings,
    allocator: FieldIdAllocator,
}

impl PartialEq for FieldTree {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order && self.nodes == other.nodes
    }
}

impl Default for FieldTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldTree {
    /// Empty tree with default settings and a system-clock allocator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            order: Vec::new(),
            settings: TreeSettings::default(),
            allocator: FieldIdAllocator::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: TreeSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_allocator(mut self, allocator: FieldIdAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    /// Build from a flat node list, rejecting any invariant violation.
    pub fn from_snapshot(snapshot: TreeSnapshot) -> Result<Self, TreeModelError> {
        let mut nodes = BTreeMap::new();
        let mut order = Vec::with_capacity(snapshot.fields.len());
        for node in snapshot.fields {
            let node_id = node.id.clone();
            if nodes.insert(node_id.clone(), node).is_some() {
                return Err(TreeModelError::DuplicateNodeId { node_id });
            }
            order.push(node_id);
        }
        let tree = Self {
            nodes,
            order,
            ..Self::new()
        };
        tree.validate()?;
        Ok(tree)
    }

    /// Flat node list in collection order.
    #[must_use]
    pub fn to_snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            fields: self.nodes().cloned().collect(),
        }
    }

    #[must_use]
    pub const fn settings(&self) -> TreeSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: TreeSettings) {
        self.settings = settings;
    }

    #[must_use]
    pub fn allocator(&self) -> &FieldIdAllocator {
        &self.allocator
    }

    pub fn set_allocator(&mut self, allocator: FieldIdAllocator) {
        self.allocator = allocator;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &FieldId) -> bool {
        self.nodes.contains_key(id)
    }

    #[must_use]
    pub fn node(&self, id: &FieldId) -> Option<&FieldNode> {
        self.nodes.get(id)
    }

    /// Nodes in collection order.
    pub fn nodes(&self) -> impl Iterator<Item = &FieldNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Collection order.
    #[must_use]
    pub fn order(&self) -> &[FieldId] {
        &self.order
    }

    /// Children of `id` in rendering order.
    #[must_use]
    pub fn children(&self, id: &FieldId) -> &[FieldId] {
        self.nodes
            .get(id)
            .map(FieldNode::child_ids)
            .unwrap_or_default()
    }

    /// Container whose child list holds `id`.
    #[must_use]
    pub fn parent_of(&self, id: &FieldId) -> Option<&FieldId> {
        self.nodes
            .values()
            .find(|node| node.child_ids().contains(id))
            .map(|node| &node.id)
    }

    /// Top-level rendering order.
    #[must_use]
    pub fn top_level(&self) -> Vec<&FieldId> {
        let parented: BTreeSet<&FieldId> = self
            .nodes
            .values()
            .flat_map(|node| node.child_ids().iter())
            .collect();
        self.order
            .iter()
            .filter(|id| !parented.contains(id))
            .collect()
    }

    /// Whether `ancestor` contains `node` somewhere below it.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: &FieldId, node: &FieldId) -> bool {
        let mut current = node;
        for _ in 0..self.nodes.len() {
            match self.parent_of(current) {
                Some(parent) if parent == ancestor => return true,
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    /// `id` and everything below it, depth-first.
    #[must_use]
    pub fn subtree(&self, id: &FieldId) -> Vec<FieldId> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(&current) || !seen.insert(current.clone()) {
                continue;
            }
            stack.extend(self.children(&current).iter().rev().cloned());
            out.push(current);
        }
        out
    }

    /// Fresh id for a node of `kind`.
    #[must_use]
    pub fn allocate_id(&self, kind: FieldKind) -> FieldId {
        self.allocator
            .allocate(kind.as_str(), |candidate| self.nodes.contains_key(candidate))
    }

    /// Deterministic structural hash over the collection in order.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        nodes_state_hash(self.nodes())
    }

    /// Structured invariant diagnostics.
    #[must_use]
    pub fn invariant_report(&self) -> InvariantReport {
        self.to_snapshot().invariant_report()
    }

    /// Check every structural invariant.
    pub fn validate(&self) -> Result<(), TreeModelError> {
        if self.order.len() != self.nodes.len() {
            let missing = self
                .nodes
                .keys()
                .find(|id| !self.order.contains(id))
                .or_else(|| self.order.iter().find(|id| !self.nodes.contains_key(*id)));
            if let Some(node_id) = missing {
                return Err(TreeModelError::OrderMismatch {
                    node_id: node_id.clone(),
                });
            }
        }

        let mut parents: BTreeMap<&FieldId, &FieldId> = BTreeMap::new();
        for node in self.nodes() {
            let mut local = BTreeSet::new();
            for child in node.child_ids() {
                if *child == node.id {
                    return Err(TreeModelError::SelfReference {
                        node_id: node.id.clone(),
                    });
                }
                if !self.nodes.contains_key(child) {
                    return Err(TreeModelError::DanglingChild {
                        parent: node.id.clone(),
                        child: child.clone(),
                    });
                }
                if !local.insert(child) {
                    return Err(TreeModelError::DuplicateChild {
                        parent: node.id.clone(),
                        child: child.clone(),
                    });
                }
                if let Some(first) = parents.insert(child, &node.id) {
                    return Err(TreeModelError::MultipleParents {
                        child: child.clone(),
                        first: first.clone(),
                        second: node.id.clone(),
                    });
                }
            }
        }

        // With single parents, a cycle is a parent chain that never reaches the top.
        for start in self.nodes.keys() {
            let mut current = start;
            let mut steps = 0usize;
            while let Some(&parent) = parents.get(current) {
                steps += 1;
                if parent == start || steps > self.nodes.len() {
                    return Err(TreeModelError::CycleDetected {
                        node_id: start.clone(),
                    });
                }
                current = parent;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Insert a fully built node at `target`.
    pub fn insert(&mut self, node: FieldNode, target: &Target) -> EditReport {
        let mut report = EditReport::default();
        self.insert_node(node, target, &mut report);
        report
    }

    /// Insert a palette item with a freshly allocated id.
    ///
    /// `role` only matters for [`FieldKind::Container`].
    pub fn create(
        &mut self,
        kind: FieldKind,
        role: Option<ContainerRole>,
        target: &Target,
    ) -> EditReport {
        let id = self.allocate_id(kind);
        let node = match role {
            Some(role) if kind == FieldKind::Container => FieldNode::container(id, role),
            _ => FieldNode::from_palette(kind, id),
        };
        self.insert(node, target)
    }

    /// Move an existing node to `target`.
    pub fn reparent(&mut self, id: &FieldId, target: &Target) -> EditReport {
        let mut report = EditReport::default();
        self.reparent_node(id, target, &mut report);
        report
    }

    /// Remove a node according to the delete policy.
    pub fn delete(&mut self, id: &FieldId) -> EditReport {
        let mut report = EditReport::default();
        self.delete_node(id, &mut report);
        report
    }

    /// Merge a partial attribute patch into one node.
    pub fn update_config(&mut self, id: &FieldId, patch: &ConfigPatch) -> EditReport {
        let Some(node) = self.nodes.get_mut(id) else {
            tracing::debug!(node = %id, "config update for missing node ignored");
            return EditReport::noop(NoopReason::MissingNode {
                node_id: id.clone(),
            });
        };
        let ignored_keys = patch.apply_to(node);
        if !ignored_keys.is_empty() {
            tracing::debug!(node = %id, kind = %node.kind(), ignored = ?ignored_keys, "config keys do not apply");
        }
        EditReport {
            touched: BTreeSet::from([id.clone()]),
            ignored_keys,
            ..EditReport::default()
        }
    }

    /// Pin a user-chosen column width, or unpin with `None`.
    ///
    /// Unpinning inside a column immediately rebalances that column.
    pub fn set_column_hint(&mut self, id: &FieldId, width: Option<ColumnWidth>) -> EditReport {
        let Some(node) = self.nodes.get_mut(id) else {
            return EditReport::noop(NoopReason::MissingNode {
                node_id: id.clone(),
            });
        };
        node.column_hint = width.map(ColumnHint::pinned);
        let mut report = EditReport {
            touched: BTreeSet::from([id.clone()]),
            ..EditReport::default()
        };
        if width.is_none()
            && let Some(parent) = self.parent_of(id).cloned()
        {
            self.rebalance_column(&parent, &mut report);
        }
        report
    }

    fn insert_node(&mut self, mut node: FieldNode, target: &Target, report: &mut EditReport) {
        if self.nodes.contains_key(&node.id) {
            let fresh = self.allocate_id(node.kind());
            tracing::warn!(proposed = %node.id, issued = %fresh, "node id already in use, re-issued");
            report.reissued_from = Some(std::mem::replace(&mut node.id, fresh));
        }

        let resolution = placement::resolve(self, target);
        report.fell_back = resolution.fell_back;
        let parent = resolution.placement.parent().cloned();

        if node.is_container() {
            let proposed = node.child_ids().to_vec();
            let mut kept: Vec<FieldId> = Vec::with_capacity(proposed.len());
            for child in proposed {
                let adoptable = child != node.id
                    && self.nodes.contains_key(&child)
                    && self.parent_of(&child).is_none()
                    && !kept.contains(&child)
                    && parent
                        .as_ref()
                        .is_none_or(|parent| *parent != child && !self.is_ancestor(&child, parent));
                if adoptable {
                    kept.push(child);
                } else {
                    report.stripped_children.push(child);
                }
            }
            if !report.stripped_children.is_empty() {
                tracing::debug!(node = %node.id, stripped = ?report.stripped_children, "stripped unusable child ids");
            }
            report.touched.extend(kept.iter().cloned());
            if let Some(child_ids) = node.child_ids_mut() {
                *child_ids = kept;
            }
        }

        let id = node.id.clone();
        let adopts_children = node.is_column() && !node.child_ids().is_empty();
        let _ = self.nodes.insert(id.clone(), node);
        match &resolution.placement {
            Placement::TopLevelEnd | Placement::Child { .. } => self.order.push(id.clone()),
            Placement::TopLevelBefore(anchor) => self.insert_in_order(&id, anchor, 0),
            Placement::TopLevelAfter(anchor) => self.insert_in_order(&id, anchor, 1),
        }
        if let Placement::Child { container, index } = &resolution.placement
            && let Some(child_ids) = self.nodes.get_mut(container).and_then(FieldNode::child_ids_mut)
        {
            let index = (*index).min(child_ids.len());
            child_ids.insert(index, id.clone());
        }

        let _ = report.touched.insert(id.clone());
        report.inserted = Some(id.clone());
        if let Some(parent) = &parent {
            let _ = report.touched.insert(parent.clone());
            self.rebalance_column(parent, report);
        }
        if adopts_children {
            self.rebalance_column(&id, report);
        }
    }

    fn reparent_node(&mut self, id: &FieldId, target: &Target, report: &mut EditReport) {
        if !self.nodes.contains_key(id) {
            tracing::debug!(node = %id, "reparent of missing node ignored");
            report.noop = Some(NoopReason::MissingNode {
                node_id: id.clone(),
            });
            return;
        }
        if let Some(anchor) = target.anchor() {
            if anchor == id {
                report.noop = Some(NoopReason::SelfTarget {
                    node_id: id.clone(),
                });
                return;
            }
            if self.is_ancestor(id, anchor) {
                report.noop = Some(NoopReason::DescendantTarget {
                    node_id: id.clone(),
                    target: anchor.clone(),
                });
                return;
            }
        }

        let old_parent = self.parent_of(id).cloned();
        let _ = report.touched.insert(id.clone());

        if let Target::Node(anchor) = target
            && self.nodes.get(anchor).is_some_and(|node| !node.is_container())
            && self.parent_of(anchor) == old_parent.as_ref()
        {
            match &old_parent {
                Some(parent) => {
                    if let Some(child_ids) = self.nodes.get_mut(parent).and_then(FieldNode::child_ids_mut) {
                        array_move(child_ids, id, anchor);
                    }
                    let _ = report.touched.insert(parent.clone());
                }
                None => array_move(&mut self.order, id, anchor),
            }
            let _ = report.touched.insert(anchor.clone());
            return;
        }

        if let Some(parent) = &old_parent
            && let Some(child_ids) = self.nodes.get_mut(parent).and_then(FieldNode::child_ids_mut)
        {
            child_ids.retain(|child| child != id);
            let _ = report.touched.insert(parent.clone());
        }

        let resolution = placement::resolve(self, target);
        report.fell_back = resolution.fell_back;
        match &resolution.placement {
            Placement::TopLevelEnd => {
                self.order.retain(|entry| entry != id);
                self.order.push(id.clone());
            }
            Placement::TopLevelBefore(anchor) => {
                self.order.retain(|entry| entry != id);
                self.insert_in_order(id, anchor, 0);
            }
            Placement::TopLevelAfter(anchor) => {
                self.order.retain(|entry| entry != id);
                self.insert_in_order(id, anchor, 1);
            }
            Placement::Child { container, index } => {
                if let Some(child_ids) = self.nodes.get_mut(container).and_then(FieldNode::child_ids_mut) {
                    let index = (*index).min(child_ids.len());
                    child_ids.insert(index, id.clone());
                }
            }
        }

        let new_parent = resolution.placement.parent().cloned();
        if let Some(parent) = &old_parent {
            self.rebalance_column(parent, report);
        }
        if let Some(parent) = &new_parent {
            let _ = report.touched.insert(parent.clone());
            if old_parent.as_ref() != Some(parent) {
                self.rebalance_column(parent, report);
            }
        }
    }

    fn delete_node(&mut self, id: &FieldId, report: &mut EditReport) {
        let Some(node) = self.nodes.get(id) else {
            tracing::debug!(node = %id, "delete of missing node ignored");
            report.noop = Some(NoopReason::MissingNode {
                node_id: id.clone(),
            });
            return;
        };
        let children = node.child_ids().to_vec();
        let parent = self.parent_of(id).cloned();

        let mut promoted_into_parent = false;
        let removed: Vec<FieldId> = match self.settings.delete_policy {
            DeletePolicy::Cascade => self.subtree(id),
            DeletePolicy::PromoteChildren => {
                match &parent {
                    Some(parent) => {
                        if let Some(child_ids) = self.nodes.get_mut(parent).and_then(FieldNode::child_ids_mut)
                            && let Some(position) = child_ids.iter().position(|child| child == id)
                        {
                            let _ = child_ids.splice(position..=position, children.iter().cloned());
                            promoted_into_parent = !children.is_empty();
                        }
                    }
                    None => {
                        self.order.retain(|entry| !children.contains(entry));
                        if let Some(position) = self.order.iter().position(|entry| entry == id) {
                            let _ = self
                                .order
                                .splice(position..position, children.iter().cloned());
                        }
                    }
                }
                report.promoted.clone_from(&children);
                vec![id.clone()]
            }
        };

        let doomed: BTreeSet<&FieldId> = removed.iter().collect();
        self.order.retain(|entry| !doomed.contains(entry));
        for node_id in &removed {
            let _ = self.nodes.remove(node_id);
        }
        for node in self.nodes.values_mut() {
            if let Some(child_ids) = node.child_ids_mut() {
                child_ids.retain(|child| !doomed.contains(child));
            }
        }

        report.touched.extend(removed.iter().cloned());
        report.touched.extend(report.promoted.iter().cloned());
        if let Some(parent) = &parent {
            let _ = report.touched.insert(parent.clone());
            // Promotion adds children to the parent, so it balances like an insert.
            if self.settings.rebalance_on_delete || promoted_into_parent {
                self.rebalance_column(parent, report);
            }
        }
        tracing::debug!(node = %id, removed = removed.len(), promoted = report.promoted.len(), "node deleted");
        report.removed = removed;
    }

    /// Recompute unpinned hints of every child when `container` is a column.
    fn rebalance_column(&mut self, container: &FieldId, report: &mut EditReport) {
        let Some(column) = self.nodes.get(container) else {
            return;
        };
        if !column.is_column() {
            return;
        }
        let children = column.child_ids().to_vec();
        let count = children.len();
        for child in &children {
            if let Some(node) = self.nodes.get_mut(child)
                && let Some(hint) = balanced_hint(node.column_hint, count)
            {
                node.column_hint = Some(hint);
                let _ = report.touched.insert(child.clone());
            }
        }
        tracing::debug!(column = %container, children = count, "column rebalanced");
        if !report.rebalanced.contains(container) {
            report.rebalanced.push(container.clone());
        }
    }

    fn insert_in_order(&mut self, id: &FieldId, anchor: &FieldId, offset: usize) {
        match self.order.iter().position(|entry| entry == anchor) {
            Some(position) => self.order.insert(position + offset, id.clone()),
            None => self.order.push(id.clone()),
        }
    }
}

/// Move `id` to the former index of `anchor`.
fn array_move(list: &mut Vec<FieldId>, id: &FieldId, anchor: &FieldId) {
    let (Some(from), Some(to)) = (
        list.iter().position(|entry| entry == id),
        list.iter().position(|entry| entry == anchor),
    ) else {
        return;
    };
    let moved = list.remove(from);
    list.insert(to, moved);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::FieldPayload;
    use formkit_core::ManualClock;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn id(raw: &str) -> FieldId {
        FieldId::new(raw).expect("test id must be non-empty")
    }

    fn text(raw: &str) -> FieldNode {
        FieldNode::from_palette(FieldKind::Text, id(raw))
    }

    fn column(raw: &str) -> FieldNode {
        FieldNode::container(id(raw), ContainerRole::Column)
    }

    fn ids(list: &[FieldId]) -> Vec<&str> {
        list.iter().map(FieldId::as_str).collect()
    }

    fn top(tree: &FieldTree) -> Vec<&str> {
        tree.top_level().into_iter().map(FieldId::as_str).collect()
    }

    fn width(tree: &FieldTree, raw: &str) -> Option<ColumnWidth> {
        tree.node(&id(raw)).and_then(FieldNode::column_width)
    }

    fn column_with_three() -> FieldTree {
        let mut tree = FieldTree::new();
        let _ = tree.insert(column("c"), &Target::Canvas);
        for child in ["a", "b", "d"] {
            let _ = tree.insert(text(child), &Target::Node(id("c")));
        }
        tree
    }

    #[test]
    fn insert_appends_at_top_level() {
        let mut tree = FieldTree::new();
        let report = tree.insert(text("a"), &Target::Canvas);
        let _ = tree.insert(text("b"), &Target::Canvas);
        assert_eq!(report.inserted, Some(id("a")));
        assert_eq!(top(&tree), ["a", "b"]);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn insert_after_top_level_sibling_lands_in_collection() {
        let mut tree = FieldTree::new();
        let _ = tree.insert(text("a"), &Target::Canvas);
        let _ = tree.insert(text("b"), &Target::Canvas);
        let _ = tree.insert(text("x"), &Target::Node(id("a")));
        assert_eq!(ids(tree.order()), ["a", "x", "b"]);
        let _ = tree.insert(text("y"), &Target::Before(id("a")));
        assert_eq!(top(&tree), ["y", "a", "x", "b"]);
    }

    #[test]
    fn insert_after_child_sibling_stays_in_parent() {
        let mut tree = column_with_three();
        let _ = tree.insert(text("x"), &Target::Node(id("a")));
        assert_eq!(ids(tree.children(&id("c"))), ["a", "x", "b", "d"]);
        assert_eq!(ids(tree.order()).last(), Some(&"x"));
        assert_eq!(top(&tree), ["c"]);
    }

    #[test]
    fn missing_target_degrades_to_top_level() {
        let mut tree = FieldTree::new();
        let report = tree.insert(text("a"), &Target::Node(id("ghost")));
        assert!(report.fell_back);
        assert_eq!(top(&tree), ["a"]);
    }

    #[test]
    fn duplicate_id_is_reissued() {
        let clock = Arc::new(ManualClock::new(42));
        let mut tree = FieldTree::new().with_allocator(FieldIdAllocator::new(clock));
        let _ = tree.insert(text("text-42"), &Target::Canvas);
        let report = tree.insert(text("text-42"), &Target::Canvas);
        assert_eq!(report.reissued_from, Some(id("text-42")));
        assert_eq!(report.inserted, Some(id("text-42-2")));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn create_allocates_from_kind_and_clock() {
        let clock = Arc::new(ManualClock::new(1_000));
        let mut tree = FieldTree::new().with_allocator(FieldIdAllocator::new(clock.clone()));
        let first = tree.create(FieldKind::Email, None, &Target::Canvas);
        let second = tree.create(FieldKind::Email, None, &Target::Canvas);
        clock.advance(5);
        let row = tree.create(FieldKind::Container, Some(ContainerRole::Row), &Target::Canvas);
        assert_eq!(first.inserted, Some(id("email-1000")));
        assert_eq!(second.inserted, Some(id("email-1000-2")));
        let row_id = row.inserted.expect("row inserted");
        assert_eq!(row_id.as_str(), "container-1005");
        assert_eq!(
            tree.node(&row_id).and_then(FieldNode::container_role),
            Some(ContainerRole::Row)
        );
    }

    #[test]
    fn inserted_container_drops_unusable_children() {
        let mut tree = column_with_three();
        let _ = tree.insert(text("free"), &Target::Canvas);
        let plain = FieldNode::container(id("p"), ContainerRole::PlainContainer)
            .with_children([id("free"), id("a"), id("ghost"), id("p"), id("free")]);
        let report = tree.insert(plain, &Target::Canvas);
        assert_eq!(ids(&report.stripped_children), ["a", "ghost", "p", "free"]);
        assert_eq!(ids(tree.children(&id("p"))), ["free"]);
        assert_eq!(top(&tree), ["c", "p"]);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn column_of_three_then_delete_keeps_hints() {
        let mut tree = column_with_three();
        for child in ["a", "b", "d"] {
            assert_eq!(width(&tree, child), Some(ColumnWidth::Third));
        }
        let report = tree.delete(&id("b"));
        assert_eq!(ids(tree.children(&id("c"))), ["a", "d"]);
        assert!(report.rebalanced.is_empty());
        assert_eq!(width(&tree, "a"), Some(ColumnWidth::Third));
        assert_eq!(width(&tree, "d"), Some(ColumnWidth::Third));
    }

    #[test]
    fn delete_with_rebalance_setting_recomputes() {
        let mut tree = column_with_three().with_settings(TreeSettings {
            rebalance_on_delete: true,
            ..TreeSettings::default()
        });
        let _ = tree.delete(&id("b"));
        assert_eq!(width(&tree, "a"), Some(ColumnWidth::Half));
        assert_eq!(width(&tree, "d"), Some(ColumnWidth::Half));
    }

    #[test]
    fn pinned_hint_survives_rebalance() {
        let mut tree = column_with_three();
        let _ = tree.set_column_hint(&id("a"), Some(ColumnWidth::TwoThirds));
        let _ = tree.insert(text("e"), &Target::Node(id("c")));
        assert_eq!(width(&tree, "a"), Some(ColumnWidth::TwoThirds));
        assert_eq!(width(&tree, "b"), Some(ColumnWidth::Quarter));
        let _ = tree.set_column_hint(&id("a"), None);
        assert_eq!(width(&tree, "a"), Some(ColumnWidth::Quarter));
    }

    #[test]
    fn reparent_between_containers_rebalances_both() {
        let mut tree = column_with_three();
        let _ = tree.insert(column("c2"), &Target::Canvas);
        let report = tree.reparent(&id("a"), &Target::Node(id("c2")));
        assert_eq!(ids(tree.children(&id("c"))), ["b", "d"]);
        assert_eq!(ids(tree.children(&id("c2"))), ["a"]);
        assert_eq!(width(&tree, "b"), Some(ColumnWidth::Half));
        assert_eq!(width(&tree, "a"), Some(ColumnWidth::Full));
        assert_eq!(ids(&report.rebalanced), ["c", "c2"]);
    }

    #[test]
    fn reparent_out_to_top_level_appends() {
        let mut tree = column_with_three();
        let _ = tree.insert(text("z"), &Target::Canvas);
        let _ = tree.reparent(&id("b"), &Target::Canvas);
        assert_eq!(top(&tree), ["c", "z", "b"]);
        assert_eq!(ids(tree.children(&id("c"))), ["a", "d"]);
        assert_eq!(width(&tree, "a"), Some(ColumnWidth::Half));
    }

    #[test]
    fn reorder_within_top_level_is_positional() {
        let mut tree = FieldTree::new();
        for raw in ["a", "b", "c", "d"] {
            let _ = tree.insert(text(raw), &Target::Canvas);
        }
        let _ = tree.reparent(&id("a"), &Target::Node(id("c")));
        assert_eq!(top(&tree), ["b", "c", "a", "d"]);
        let _ = tree.reparent(&id("d"), &Target::Node(id("b")));
        assert_eq!(top(&tree), ["d", "b", "c", "a"]);
    }

    #[test]
    fn reorder_within_container_is_positional() {
        let mut tree = column_with_three();
        let _ = tree.reparent(&id("d"), &Target::Node(id("a")));
        assert_eq!(ids(tree.children(&id("c"))), ["d", "a", "b"]);
        assert_eq!(width(&tree, "d"), Some(ColumnWidth::Third));
    }

    #[test]
    fn reparent_into_own_subtree_is_a_noop() {
        let mut tree = column_with_three();
        let _ = tree.insert(
            FieldNode::container(id("inner"), ContainerRole::Row),
            &Target::Node(id("c")),
        );
        let before = tree.clone();
        let report = tree.reparent(&id("c"), &Target::Node(id("inner")));
        assert_eq!(
            report.noop,
            Some(NoopReason::DescendantTarget {
                node_id: id("c"),
                target: id("inner"),
            })
        );
        assert_eq!(tree, before);
        let report = tree.reparent(&id("c"), &Target::Node(id("c")));
        assert!(matches!(report.noop, Some(NoopReason::SelfTarget { .. })));
        assert_eq!(tree, before);
    }

    #[test]
    fn missing_node_operations_are_noops() {
        let mut tree = column_with_three();
        let before = tree.state_hash();
        assert!(tree.reparent(&id("ghost"), &Target::Canvas).is_noop());
        assert!(tree.delete(&id("ghost")).is_noop());
        assert!(tree.update_config(&id("ghost"), &ConfigPatch::label("x")).is_noop());
        assert!(tree.set_column_hint(&id("ghost"), None).is_noop());
        assert_eq!(tree.state_hash(), before);
    }

    #[test]
    fn delete_promotes_children_in_place() {
        let mut tree = FieldTree::new();
        let _ = tree.insert(text("head"), &Target::Canvas);
        let _ = tree.insert(FieldNode::container(id("row"), ContainerRole::Row), &Target::Canvas);
        let _ = tree.insert(text("tail"), &Target::Canvas);
        let _ = tree.insert(text("x"), &Target::Node(id("row")));
        let _ = tree.insert(text("y"), &Target::Node(id("row")));
        let report = tree.delete(&id("row"));
        assert_eq!(ids(&report.promoted), ["x", "y"]);
        assert_eq!(top(&tree), ["head", "x", "y", "tail"]);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn delete_promotes_into_parent_container() {
        let mut tree = column_with_three();
        let _ = tree.insert(FieldNode::container(id("row"), ContainerRole::Row), &Target::Node(id("a")));
        let _ = tree.insert(text("x"), &Target::Node(id("row")));
        let _ = tree.delete(&id("row"));
        assert_eq!(ids(tree.children(&id("c"))), ["a", "x", "b", "d"]);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn promotion_into_column_rebalances_hints() {
        let mut tree = FieldTree::new();
        let _ = tree.insert(column("c"), &Target::Canvas);
        let _ = tree.insert(text("a"), &Target::Node(id("c")));
        let _ = tree.insert(FieldNode::container(id("r"), ContainerRole::Row), &Target::Node(id("c")));
        let _ = tree.insert(text("x"), &Target::Node(id("r")));
        let _ = tree.insert(text("y"), &Target::Node(id("r")));
        assert_eq!(tree.node(&id("a")).and_then(FieldNode::column_width), Some(ColumnWidth::Half));

        let report = tree.delete(&id("r"));
        assert_eq!(ids(tree.children(&id("c"))), ["a", "x", "y"]);
        assert_eq!(report.rebalanced, [id("c")]);
        for child in ["a", "x", "y"] {
            assert_eq!(
                tree.node(&id(child)).and_then(FieldNode::column_width),
                Some(ColumnWidth::Third),
                "{child}"
            );
        }
    }

    #[test]
    fn cascade_delete_removes_subtree() {
        let mut tree = column_with_three().with_settings(TreeSettings {
            delete_policy: DeletePolicy::Cascade,
            ..TreeSettings::default()
        });
        let _ = tree.insert(text("keep"), &Target::Canvas);
        let report = tree.delete(&id("c"));
        assert_eq!(ids(&report.removed), ["c", "a", "b", "d"]);
        assert_eq!(top(&tree), ["keep"]);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn update_config_reports_foreign_keys() {
        let mut tree = column_with_three();
        let patch = ConfigPatch {
            label: Some("First".into()),
            rows: Some(3),
            ..ConfigPatch::default()
        };
        let report = tree.update_config(&id("a"), &patch);
        assert_eq!(report.ignored_keys, ["rows"]);
        let node = tree.node(&id("a")).expect("node exists");
        assert_eq!(node.attributes.label, "First");
        assert!(matches!(node.payload, FieldPayload::Text(_)));
    }

    #[test]
    fn snapshot_round_trip_preserves_tree() {
        let tree = column_with_three();
        let rebuilt = FieldTree::from_snapshot(tree.to_snapshot()).expect("valid snapshot");
        assert_eq!(rebuilt, tree);
        assert_eq!(rebuilt.state_hash(), tree.state_hash());
    }

    #[test]
    fn from_snapshot_rejects_dangling_child() {
        let snapshot = TreeSnapshot {
            fields: vec![column("c").with_children([id("ghost")])],
        };
        assert_eq!(
            FieldTree::from_snapshot(snapshot),
            Err(TreeModelError::DanglingChild {
                parent: id("c"),
                child: id("ghost"),
            })
        );
    }

    #[test]
    fn from_snapshot_rejects_cycle() {
        let snapshot = TreeSnapshot {
            fields: vec![
                column("a").with_children([id("b")]),
                column("b").with_children([id("a")]),
            ],
        };
        assert!(matches!(
            FieldTree::from_snapshot(snapshot),
            Err(TreeModelError::CycleDetected { .. })
        ));
    }

    #[derive(Debug, Clone)]
    enum Step {
        Insert { container: bool, target: usize, mode: u8 },
        Reparent { node: usize, target: usize, mode: u8 },
        Delete { node: usize },
    }

    fn step_strategy() -> impl Strategy<Value = Step> {
        prop_oneof![
            (any::<bool>(), 0usize..32, 0u8..4)
                .prop_map(|(container, target, mode)| Step::Insert { container, target, mode }),
            (0usize..32, 0usize..32, 0u8..4)
                .prop_map(|(node, target, mode)| Step::Reparent { node, target, mode }),
            (0usize..32).prop_map(|node| Step::Delete { node }),
        ]
    }

    fn pick(tree: &FieldTree, index: usize) -> Option<FieldId> {
        let order = tree.order();
        (!order.is_empty()).then(|| order[index % order.len()].clone())
    }

    fn target_for(tree: &FieldTree, index: usize, mode: u8) -> Target {
        match (pick(tree, index), mode) {
            (None, _) | (_, 0) => Target::Canvas,
            (Some(anchor), 1) => Target::Node(anchor),
            (Some(anchor), 2) => Target::Before(anchor),
            (Some(anchor), _) => Target::After(anchor),
        }
    }

    fn assert_single_parents(tree: &FieldTree) -> Result<(), TestCaseError> {
        let mut seen = BTreeSet::new();
        for node in tree.nodes() {
            for child in node.child_ids() {
                prop_assert!(seen.insert(child.clone()), "{child} has two parents");
                prop_assert!(tree.contains(child), "{child} dangles");
            }
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn random_edits_preserve_invariants(
            steps in proptest::collection::vec(step_strategy(), 1..60),
            policy_cascade in any::<bool>(),
        ) {
            let clock = Arc::new(ManualClock::new(1));
            let mut tree = FieldTree::new()
                .with_allocator(FieldIdAllocator::new(clock))
                .with_settings(TreeSettings {
                    delete_policy: if policy_cascade { DeletePolicy::Cascade } else { DeletePolicy::PromoteChildren },
                    rebalance_on_delete: false,
                });
            for step in steps {
                match step {
                    Step::Insert { container, target, mode } => {
                        let target = target_for(&tree, target, mode);
                        let kind = if container { FieldKind::Container } else { FieldKind::Text };
                        let role = container.then_some(ContainerRole::Column);
                        let before = tree.len();
                        let _ = tree.create(kind, role, &target);
                        prop_assert_eq!(tree.len(), before + 1);
                    }
                    Step::Reparent { node, target, mode } => {
                        if let Some(node) = pick(&tree, node) {
                            let target = target_for(&tree, target, mode);
                            let before = tree.len();
                            let _ = tree.reparent(&node, &target);
                            prop_assert_eq!(tree.len(), before);
                        }
                    }
                    Step::Delete { node } => {
                        if let Some(node) = pick(&tree, node) {
                            let _ = tree.delete(&node);
                            prop_assert!(!tree.contains(&node));
                        }
                    }
                }
                prop_assert!(tree.validate().is_ok(), "{:?}", tree.validate());
                assert_single_parents(&tree)?;
                let unique: BTreeSet<_> = tree.order().iter().collect();
                prop_assert_eq!(unique.len(), tree.len());
            }
        }

        #[test]
        fn column_balance_follows_child_count(count in 1usize..12) {
            let mut tree = FieldTree::new();
            let _ = tree.insert(column("c"), &Target::Canvas);
            for index in 0..count {
                let _ = tree.insert(text(&format!("t{index}")), &Target::Node(id("c")));
            }
            let expected = ColumnWidth::for_count(count);
            for child in tree.children(&id("c")) {
                prop_assert_eq!(tree.node(child).and_then(FieldNode::column_width), expected);
            }
        }

        #[test]
        fn pinned_hints_survive_any_growth(extra in 0usize..8, pinned_at in 0usize..3) {
            let mut tree = column_with_three();
            let pinned = ["a", "b", "d"][pinned_at];
            let _ = tree.set_column_hint(&id(pinned), Some(ColumnWidth::ThreeQuarters));
            for index in 0..extra {
                let _ = tree.insert(text(&format!("x{index}")), &Target::Node(id("c")));
            }
            prop_assert_eq!(width(&tree, pinned), Some(ColumnWidth::ThreeQuarters));
        }
    }
}
