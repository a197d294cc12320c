#![forbid(unsafe_code)]

//! Column width hints on the 12-unit grid.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Grid units in one full row.
pub const GRID_UNITS: u8 = 12;

/// Fractional width token for a child of a `column` container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnWidth {
    Full,
    ThreeQuarters,
    TwoThirds,
    Half,
    Third,
    Quarter,
    Sixth,
    Twelfth,
}

impl ColumnWidth {
    pub const ALL: [Self; 8] = [
        Self::Full,
        Self::ThreeQuarters,
        Self::TwoThirds,
        Self::Half,
        Self::Third,
        Self::Quarter,
        Self::Sixth,
        Self::Twelfth,
    ];

    /// Width in grid units out of [`GRID_UNITS`].
    #[must_use]
    pub const fn units(self) -> u8 {
        match self {
            Self::Full => 12,
            Self::ThreeQuarters => 9,
            Self::TwoThirds => 8,
            Self::Half => 6,
            Self::Third => 4,
            Self::Quarter => 3,
            Self::Sixth => 2,
            Self::Twelfth => 1,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::ThreeQuarters => "three-quarters",
            Self::TwoThirds => "two-thirds",
            Self::Half => "half",
            Self::Third => "third",
            Self::Quarter => "quarter",
            Self::Sixth => "sixth",
            Self::Twelfth => "twelfth",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|width| width.as_str().eq_ignore_ascii_case(value))
    }

    /// Default width for a column holding `count` children.
    ///
    /// 1 → full, 2 → half, 3 → third, 4 → quarter, 5–6 → sixth, more →
    /// twelfth. An empty column has no width to hand out.
    #[must_use]
    pub const fn for_count(count: usize) -> Option<Self> {
        match count {
            0 => None,
            1 => Some(Self::Full),
            2 => Some(Self::Half),
            3 => Some(Self::Third),
            4 => Some(Self::Quarter),
            5 | 6 => Some(Self::Sixth),
            _ => Some(Self::Twelfth),
        }
    }
}

impl fmt::Display for ColumnWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A width hint plus whether the user set it.
///
/// Balancing only rewrites hints that are not pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnHint {
    pub width: ColumnWidth,
    pub pinned: bool,
}

impl ColumnHint {
    /// Hint assigned by balancing.
    #[must_use]
    pub const fn auto(width: ColumnWidth) -> Self {
        Self {
            width,
            pinned: false,
        }
    }

    /// Hint chosen explicitly by the user.
    #[must_use]
    pub const fn pinned(width: ColumnWidth) -> Self {
        Self {
            width,
            pinned: true,
        }
    }
}

/// Compute the hint a child should carry after balancing.
///
/// Returns `None` when the existing hint must be kept.
#[must_use]
pub fn balanced_hint(current: Option<ColumnHint>, sibling_count: usize) -> Option<ColumnHint> {
    if current.is_some_and(|hint| hint.pinned) {
        return None;
    }
    let width = ColumnWidth::for_count(sibling_count)?;
    let next = ColumnHint::auto(width);
    (current != Some(next)).then_some(next)
}
