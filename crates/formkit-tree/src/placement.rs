#![forbid(unsafe_code)]

//! Insert targets and their resolution against a tree.

use formkit_core::FieldId;
use serde::{Deserialize, Serialize};

use crate::tree::FieldTree;

/// Where a new or moved node should land.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "at", content = "id", rename_all = "snake_case")]
pub enum Target {
    /// Append at the end of the top-level ordering.
    #[default]
    Canvas,
    /// Append into a container, or land right after a non-container sibling.
    Node(FieldId),
    /// Immediately before a sibling.
    Before(FieldId),
    /// Immediately after a node, even when that node is a container.
    After(FieldId),
}

impl Target {
    /// The node this target is anchored to, if any.
    #[must_use]
    pub fn anchor(&self) -> Option<&FieldId> {
        match self {
            Self::Canvas => None,
            Self::Node(id) | Self::Before(id) | Self::After(id) => Some(id),
        }
    }
}

impl From<Option<FieldId>> for Target {
    fn from(value: Option<FieldId>) -> Self {
        value.map_or(Self::Canvas, Self::Node)
    }
}

/// A target resolved against the current tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Placement {
    /// End of the top-level ordering.
    TopLevelEnd,
    /// Top level, immediately before `anchor` in collection order.
    TopLevelBefore(FieldId),
    /// Top level, immediately after `anchor` in collection order.
    TopLevelAfter(FieldId),
    /// Position `index` of the container's child list.
    Child { container: FieldId, index: usize },
}

impl Placement {
    /// Container the node ends up in, `None` for top level.
    #[must_use]
    pub fn parent(&self) -> Option<&FieldId> {
        match self {
            Self::Child { container, .. } => Some(container),
            _ => None,
        }
    }
}

/// Result of resolving a [`Target`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub placement: Placement,
    /// The anchor was missing and placement degraded to a top-level append.
    pub fell_back: bool,
}

/// Resolve `target` against `tree`.
///
/// Unknown anchors degrade to [`Placement::TopLevelEnd`].
#[must_use]
pub fn resolve(tree: &FieldTree, target: &Target) -> Resolution {
    let Some(anchor) = target.anchor() else {
        return Resolution {
            placement: Placement::TopLevelEnd,
            fell_back: false,
        };
    };
    let Some(anchor_node) = tree.node(anchor) else {
        tracing::debug!(anchor = %anchor, "drop target missing, appending at top level");
        return Resolution {
            placement: Placement::TopLevelEnd,
            fell_back: true,
        };
    };

    if let Target::Node(_) = target
        && anchor_node.is_container()
    {
        return Resolution {
            placement: Placement::Child {
                container: anchor.clone(),
                index: anchor_node.child_ids().len(),
            },
            fell_back: false,
        };
    }

    let before = matches!(target, Target::Before(_));
    let placement = match tree.parent_of(anchor) {
        Some(parent) => {
            let position = tree
                .node(parent)
                .and_then(|node| node.child_ids().iter().position(|child| child == anchor))
                .unwrap_or(0);
            Placement::Child {
                container: parent.clone(),
                index: if before { position } else { position + 1 },
            }
        }
        None if before => Placement::TopLevelBefore(anchor.clone()),
        None => Placement::TopLevelAfter(anchor.clone()),
    };
    Resolution {
        placement,
        fell_back: false,
    }
}
