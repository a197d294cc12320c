#![forbid(unsafe_code)]

//! Field identifiers and the id allocator.
//!
//! Ids are opaque non-empty strings. Fresh ids are seeded from the field kind
//! and the current clock reading (`"{prefix}-{millis}"`); when that seed is
//! already taken, the allocator appends the smallest free `-{n}` suffix with
//! `n >= 2`, so allocation never collides with an id the caller reports as
//! taken.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};

/// Stable identifier for one field node.
///
/// The empty string is reserved/invalid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldId(String);

impl FieldId {
    /// Create an id, rejecting the empty string.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(raw))
    }

    /// Borrow the raw string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FieldId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FieldId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for FieldId {
    type Error = IdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FieldId> for String {
    fn from(value: FieldId) -> Self {
        value.0
    }
}

/// Identifier construction errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdError {
    Empty,
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "field id must not be empty"),
        }
    }
}

impl std::error::Error for IdError {}

/// Clock-seeded allocator for fresh field ids.
#[derive(Debug, Clone)]
pub struct FieldIdAllocator {
    clock: Arc<dyn Clock>,
}

impl FieldIdAllocator {
    /// Allocator reading the given clock.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Allocate an id for `prefix` that `is_taken` does not claim.
    ///
    /// An empty prefix falls back to `"field"`.
    pub fn allocate(&self, prefix: &str, is_taken: impl Fn(&FieldId) -> bool) -> FieldId {
        let prefix = if prefix.is_empty() { "field" } else { prefix };
        let seed = format!("{prefix}-{}", self.clock.now_millis());
        let candidate = FieldId(seed.clone());
        if !is_taken(&candidate) {
            return candidate;
        }
        let mut suffix: u64 = 2;
        loop {
            let candidate = FieldId(format!("{seed}-{suffix}"));
            if !is_taken(&candidate) {
                return candidate;
            }
            suffix = suffix.saturating_add(1);
        }
    }

    /// The clock backing this allocator.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl Default for FieldIdAllocator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}
