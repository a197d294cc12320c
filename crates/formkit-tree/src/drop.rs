#![forbid(unsafe_code)]

//! Drag feedback derived from pointer position.
//!
//! Nothing here mutates the tree. A host calls [`DropZone::from_offset`] on
//! every pointer move, then [`drop_preview`] to learn where the drop would
//! land and whether it is allowed. The returned [`Target`] is exactly what
//! the committing `Insert`/`Reparent` operation should receive.

use formkit_core::FieldId;
use serde::{Deserialize, Serialize};

use crate::node::FieldKind;
use crate::placement::{self, Target};
use crate::tree::{FieldTree, NoopReason};

/// Region of the hovered item the pointer is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropZone {
    Before,
    After,
    Inside,
}

impl DropZone {
    /// Classify `offset` within an item `extent` cells tall.
    ///
    /// The top quarter maps to `Before` and the bottom quarter to `After`.
    /// The middle half is `Inside` for containers; for other items it
    /// splits at the midpoint.
    #[must_use]
    pub fn from_offset(offset: u16, extent: u16, hovered_is_container: bool) -> Self {
        if extent == 0 {
            return if hovered_is_container {
                Self::Inside
            } else {
                Self::Before
            };
        }
        let offset = offset.min(extent - 1);
        let quarter = extent / 4;
        if offset < quarter {
            Self::Before
        } else if offset >= extent - quarter {
            Self::After
        } else if hovered_is_container {
            Self::Inside
        } else if offset < extent / 2 {
            Self::Before
        } else {
            Self::After
        }
    }
}

/// What is being dragged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum DragSource {
    /// A new item from the palette.
    Palette(FieldKind),
    /// A node already in the tree.
    Existing(FieldId),
}

/// Where a drop would land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropPreview {
    pub target: Target,
    /// Container the dragged item would end up in.
    pub parent: Option<FieldId>,
    pub valid: bool,
    /// Set when `valid` is false.
    pub reason: Option<NoopReason>,
}

/// Derive the drop preview for `source` hovering `hovered` in `zone`.
///
/// An unknown hovered id previews a top-level append, matching what the
/// operation itself would do.
#[must_use]
pub fn drop_preview(
    tree: &FieldTree,
    source: &DragSource,
    hovered: Option<&FieldId>,
    zone: DropZone,
) -> DropPreview {
    let target = match hovered {
        Some(hovered) if tree.contains(hovered) => match zone {
            DropZone::Before => Target::Before(hovered.clone()),
            DropZone::After => Target::After(hovered.clone()),
            DropZone::Inside => Target::Node(hovered.clone()),
        },
        _ => Target::Canvas,
    };

    let reason = match source {
        DragSource::Palette(_) => None,
        DragSource::Existing(node_id) if !tree.contains(node_id) => Some(NoopReason::MissingNode {
            node_id: node_id.clone(),
        }),
        DragSource::Existing(node_id) => match target.anchor() {
            Some(anchor) if anchor == node_id => Some(NoopReason::SelfTarget {
                node_id: node_id.clone(),
            }),
            Some(anchor) if tree.is_ancestor(node_id, anchor) => {
                Some(NoopReason::DescendantTarget {
                    node_id: node_id.clone(),
                    target: anchor.clone(),
                })
            }
            _ => None,
        },
    };

    let parent = if reason.is_none() {
        placement::resolve(tree, &target).placement.parent().cloned()
    } else {
        None
    };

    DropPreview {
        target,
        parent,
        valid: reason.is_none(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ContainerRole, FieldNode};

    fn id(raw: &str) -> FieldId {
        FieldId::new(raw).expect("test id must be non-empty")
    }

    fn sample() -> FieldTree {
        let mut tree = FieldTree::new();
        let _ = tree.insert(FieldNode::container(id("row"), ContainerRole::Row), &Target::Canvas);
        let _ = tree.insert(
            FieldNode::container(id("col"), ContainerRole::Column),
            &Target::Node(id("row")),
        );
        let _ = tree.insert(FieldNode::from_palette(FieldKind::Text, id("a")), &Target::Node(id("col")));
        let _ = tree.insert(FieldNode::from_palette(FieldKind::Email, id("top")), &Target::Canvas);
        tree
    }

    #[test]
    fn zones_split_by_quarters() {
        assert_eq!(DropZone::from_offset(0, 8, true), DropZone::Before);
        assert_eq!(DropZone::from_offset(3, 8, true), DropZone::Inside);
        assert_eq!(DropZone::from_offset(7, 8, true), DropZone::After);
        assert_eq!(DropZone::from_offset(3, 8, false), DropZone::Before);
        assert_eq!(DropZone::from_offset(4, 8, false), DropZone::After);
        assert_eq!(DropZone::from_offset(99, 8, false), DropZone::After);
    }

    #[test]
    fn zero_extent_is_inside_only_for_containers() {
        assert_eq!(DropZone::from_offset(0, 0, true), DropZone::Inside);
        assert_eq!(DropZone::from_offset(0, 0, false), DropZone::Before);
    }

    #[test]
    fn palette_into_container_previews_child() {
        let tree = sample();
        let preview = drop_preview(
            &tree,
            &DragSource::Palette(FieldKind::Number),
            Some(&id("col")),
            DropZone::Inside,
        );
        assert!(preview.valid);
        assert_eq!(preview.target, Target::Node(id("col")));
        assert_eq!(preview.parent, Some(id("col")));
    }

    #[test]
    fn before_child_previews_its_parent() {
        let tree = sample();
        let preview = drop_preview(
            &tree,
            &DragSource::Existing(id("top")),
            Some(&id("a")),
            DropZone::Before,
        );
        assert!(preview.valid);
        assert_eq!(preview.target, Target::Before(id("a")));
        assert_eq!(preview.parent, Some(id("col")));
    }

    #[test]
    fn dropping_into_own_subtree_is_invalid() {
        let tree = sample();
        let preview = drop_preview(
            &tree,
            &DragSource::Existing(id("row")),
            Some(&id("a")),
            DropZone::After,
        );
        assert!(!preview.valid);
        assert_eq!(preview.parent, None);
        assert!(matches!(
            preview.reason,
            Some(NoopReason::DescendantTarget { .. })
        ));

        let self_drop = drop_preview(
            &tree,
            &DragSource::Existing(id("col")),
            Some(&id("col")),
            DropZone::Inside,
        );
        assert!(matches!(self_drop.reason, Some(NoopReason::SelfTarget { .. })));
    }

    #[test]
    fn preview_matches_committed_reparent() {
        let tree = sample();
        let preview = drop_preview(
            &tree,
            &DragSource::Existing(id("top")),
            Some(&id("col")),
            DropZone::Inside,
        );
        let mut committed = tree.clone();
        let _ = committed.reparent(&id("top"), &preview.target);
        assert_eq!(committed.parent_of(&id("top")), preview.parent.as_ref());
    }

    #[test]
    fn unknown_hover_previews_canvas() {
        let tree = sample();
        let preview = drop_preview(
            &tree,
            &DragSource::Palette(FieldKind::Text),
            Some(&id("ghost")),
            DropZone::Inside,
        );
        assert_eq!(preview.target, Target::Canvas);
        assert_eq!(preview.parent, None);
        assert!(preview.valid);
    }
}
