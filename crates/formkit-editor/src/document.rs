#![forbid(unsafe_code)]

//! Exported form document: the field list plus sibling metadata.
//!
//! # Wire format
//!
//! ```json
//! {
//!   "version": 1,
//!   "fields": [{"id":"text-1","kind":"text","label":"Text Field"}],
//!   "theme": {"primaryColor":"#2563eb", "...": "..."},
//!   "bannerImage": null,
//!   "exportedAt": "2024-05-01T12:00:00Z"
//! }
//! ```
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `DocumentError::Parse` | Malformed JSON, empty id, unknown kind | Import rejected |
//! | `DocumentError::UnsupportedVersion` | Document from another format revision | Import rejected |
//! | `DocumentError::Invalid` | Broken references under `ImportPolicy::Strict` | Import rejected |
//! | `DocumentError::Repair` | Duplicate ids or cycles | Import rejected |

use std::collections::BTreeMap;
use std::fmt;

use formkit_core::clock::{format_rfc3339, parse_rfc3339};
use formkit_core::{Clock, ImportPolicy};
use formkit_tree::{FieldTree, RepairAction, RepairError, TreeModelError, TreeSnapshot};
use serde::{Deserialize, Serialize};

/// Format revision written by [`FormDocument::export`].
pub const FORM_DOCUMENT_VERSION: u32 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Theme and banner
// ─────────────────────────────────────────────────────────────────────────────

/// Form-wide presentation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Theme {
    pub primary_color: String,
    pub background_color: String,
    pub text_color: String,
    pub font_family: String,
    pub border_radius: String,
    /// Keys this version does not model, kept verbatim.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, String>,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_color: "#2563eb".into(),
            background_color: "#ffffff".into(),
            text_color: "#111827".into(),
            font_family: "Inter, sans-serif".into(),
            border_radius: "8px".into(),
            extensions: BTreeMap::new(),
        }
    }
}

/// Header image shown above the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    /// Hosted image; survives export.
    Url(String),
    /// Freshly uploaded bytes not yet hosted anywhere; exported as `null`.
    Blob { media_type: String, bytes: Vec<u8> },
}

impl Banner {
    /// URL written to the document, if this banner has one.
    #[must_use]
    pub fn exported_url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::Blob { .. } => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur while reading or writing a form document.
#[derive(Debug)]
pub enum DocumentError {
    Parse(serde_json::Error),
    Serialize(serde_json::Error),
    UnsupportedVersion { found: u32, supported: u32 },
    Invalid(TreeModelError),
    Repair(RepairError),
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "failed to parse form document: {e}"),
            Self::Serialize(e) => write!(f, "failed to serialize form document: {e}"),
            Self::UnsupportedVersion { found, supported } => write!(
                f,
                "unsupported form document version {found} (supported: {supported})"
            ),
            Self::Invalid(e) => write!(f, "form document rejected: {e}"),
            Self::Repair(e) => write!(f, "form document cannot be repaired: {e}"),
        }
    }
}

impl std::error::Error for DocumentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) | Self::Serialize(e) => Some(e),
            Self::UnsupportedVersion { .. } => None,
            Self::Invalid(e) => Some(e),
            Self::Repair(e) => Some(e),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Document
// ─────────────────────────────────────────────────────────────────────────────

/// Serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDocument {
    pub version: u32,
    pub fields: TreeSnapshot,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub banner_image: Option<String>,
    #[serde(default)]
    pub exported_at: String,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

/// A document turned back into editable state.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedForm {
    pub tree: FieldTree,
    pub theme: Theme,
    pub banner: Option<Banner>,
    /// Fixes applied under [`ImportPolicy::Repair`].
    pub repairs: Vec<RepairAction>,
    pub exported_at_millis: Option<u64>,
}

impl FormDocument {
    /// Snapshot `tree` and metadata, stamped with the clock's current time.
    #[must_use]
    pub fn export(tree: &FieldTree, theme: &Theme, banner: Option<&Banner>, clock: &dyn Clock) -> Self {
        Self {
            version: FORM_DOCUMENT_VERSION,
            fields: tree.to_snapshot(),
            theme: theme.clone(),
            banner_image: banner.and_then(Banner::exported_url).map(str::to_owned),
            exported_at: format_rfc3339(clock.now_millis()),
        }
    }

    /// Parse a document, rejecting other format revisions before reading fields.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let probe: VersionProbe = serde_json::from_str(json).map_err(DocumentError::Parse)?;
        if probe.version != FORM_DOCUMENT_VERSION {
            return Err(DocumentError::UnsupportedVersion {
                found: probe.version,
                supported: FORM_DOCUMENT_VERSION,
            });
        }
        serde_json::from_str(json).map_err(DocumentError::Parse)
    }

    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(self).map_err(DocumentError::Serialize)
    }

    /// Rebuild editable state according to `policy`.
    ///
    /// The returned tree carries default settings and allocator; the caller
    /// installs its own.
    pub fn into_form(self, policy: ImportPolicy) -> Result<ImportedForm, DocumentError> {
        if self.version != FORM_DOCUMENT_VERSION {
            return Err(DocumentError::UnsupportedVersion {
                found: self.version,
                supported: FORM_DOCUMENT_VERSION,
            });
        }
        let exported_at_millis = parse_rfc3339(&self.exported_at);
        let banner = self.banner_image.filter(|url| !url.is_empty()).map(Banner::Url);

        let (tree, repairs) = match policy {
            ImportPolicy::Strict => (
                FieldTree::from_snapshot(self.fields).map_err(DocumentError::Invalid)?,
                Vec::new(),
            ),
            ImportPolicy::Repair => {
                let outcome = self.fields.repair_safe().map_err(DocumentError::Repair)?;
                (outcome.tree, outcome.actions)
            }
        };

        Ok(ImportedForm {
            tree,
            theme: self.theme,
            banner,
            repairs,
            exported_at_millis,
        })
    }
}
