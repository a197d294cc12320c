#![forbid(unsafe_code)]

//! Editor configuration.
//!
//! Values come from `FORMKIT_*` environment variables layered over defaults.
//! Parsing never fails outright: unparsable values keep their default and are
//! collected as [`EditorConfigError`] diagnostics next to the resulting config.
//!
//! | Env var | Field | Default |
//! |---------|-------|---------|
//! | `FORMKIT_DELETE_POLICY` | `delete_policy` | `promote` |
//! | `FORMKIT_REBALANCE_ON_DELETE` | `rebalance_on_delete` | `false` |
//! | `FORMKIT_IMPORT_POLICY` | `import_policy` | `repair` |
//! | `FORMKIT_HISTORY_LIMIT` | `history_limit` | `100` |
//! | `FORMKIT_STORAGE_PATH` | `storage_path` | unset |
//! | `FORMKIT_NOTIFICATION_LIMIT` | `notification_limit` | `16` |

use std::env;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const ENV_DELETE_POLICY: &str = "FORMKIT_DELETE_POLICY";
pub const ENV_REBALANCE_ON_DELETE: &str = "FORMKIT_REBALANCE_ON_DELETE";
pub const ENV_IMPORT_POLICY: &str = "FORMKIT_IMPORT_POLICY";
pub const ENV_HISTORY_LIMIT: &str = "FORMKIT_HISTORY_LIMIT";
pub const ENV_STORAGE_PATH: &str = "FORMKIT_STORAGE_PATH";
pub const ENV_NOTIFICATION_LIMIT: &str = "FORMKIT_NOTIFICATION_LIMIT";

pub const DEFAULT_HISTORY_LIMIT: usize = 100;
pub const DEFAULT_NOTIFICATION_LIMIT: usize = 16;

/// What happens to the children of a deleted container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Children take the container's former place.
    #[default]
    PromoteChildren,
    /// The whole subtree is removed.
    Cascade,
}

impl DeletePolicy {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "promote" | "promote_children" | "promote-children" => Some(Self::PromoteChildren),
            "cascade" => Some(Self::Cascade),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PromoteChildren => "promote",
            Self::Cascade => "cascade",
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How imported documents with integrity problems are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPolicy {
    /// Reject any document with an invariant issue.
    Strict,
    /// Apply safe repair and report what changed.
    #[default]
    Repair,
}

impl ImportPolicy {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(Self::Strict),
            "repair" => Some(Self::Repair),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Repair => "repair",
        }
    }
}

impl fmt::Display for ImportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Editor-wide behaviour knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorConfig {
    pub delete_policy: DeletePolicy,
    /// Recompute column hints after deleting a column child.
    pub rebalance_on_delete: bool,
    pub import_policy: ImportPolicy,
    /// Maximum undo depth.
    pub history_limit: usize,
    /// Document file used by file-backed storage.
    pub storage_path: Option<PathBuf>,
    /// Maximum queued notifications before the oldest is dropped.
    pub notification_limit: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            delete_policy: DeletePolicy::default(),
            rebalance_on_delete: false,
            import_policy: ImportPolicy::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            storage_path: None,
            notification_limit: DEFAULT_NOTIFICATION_LIMIT,
        }
    }
}

/// Configuration parse diagnostics (env + validation).
#[derive(Debug, Clone)]
pub struct ConfigParse {
    pub config: EditorConfig,
    pub errors: Vec<EditorConfigError>,
}

/// Configuration error with field context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorConfigError {
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

impl EditorConfigError {
    fn new(field: &'static str, value: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for EditorConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.field, self.value, self.message)
    }
}

impl std::error::Error for EditorConfigError {}

impl EditorConfig {
    /// Parse config from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with_diagnostics().config
    }

    /// Parse config from environment variables and return diagnostics.
    #[must_use]
    pub fn from_env_with_diagnostics() -> ConfigParse {
        Self::from_env_with(|key| env::var(key).ok())
    }

    /// Parse config from an arbitrary key lookup.
    pub fn from_env_with<F>(mut get: F) -> ConfigParse
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let mut errors = Vec::new();

        if let Some(value) = get(ENV_DELETE_POLICY) {
            match DeletePolicy::parse(&value) {
                Some(parsed) => config.delete_policy = parsed,
                None => errors.push(EditorConfigError::new(
                    "delete_policy",
                    value,
                    "expected promote|cascade",
                )),
            }
        }

        if let Some(value) = get(ENV_REBALANCE_ON_DELETE) {
            match parse_bool(&value) {
                Some(parsed) => config.rebalance_on_delete = parsed,
                None => errors.push(EditorConfigError::new(
                    "rebalance_on_delete",
                    value,
                    "expected bool (1/0/true/false)",
                )),
            }
        }

        if let Some(value) = get(ENV_IMPORT_POLICY) {
            match ImportPolicy::parse(&value) {
                Some(parsed) => config.import_policy = parsed,
                None => errors.push(EditorConfigError::new(
                    "import_policy",
                    value,
                    "expected strict|repair",
                )),
            }
        }

        if let Some(value) = get(ENV_HISTORY_LIMIT) {
            match parse_usize(&value) {
                Some(parsed) => config.history_limit = parsed,
                None => errors.push(EditorConfigError::new(
                    "history_limit",
                    value,
                    "expected positive integer",
                )),
            }
        }

        if let Some(value) = get(ENV_STORAGE_PATH) {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                errors.push(EditorConfigError::new(
                    "storage_path",
                    value,
                    "expected non-empty path",
                ));
            } else {
                config.storage_path = Some(PathBuf::from(trimmed));
            }
        }

        if let Some(value) = get(ENV_NOTIFICATION_LIMIT) {
            match parse_usize(&value) {
                Some(parsed) => config.notification_limit = parsed,
                None => errors.push(EditorConfigError::new(
                    "notification_limit",
                    value,
                    "expected positive integer",
                )),
            }
        }

        if let Err(mut validation) = config.validate() {
            errors.append(&mut validation);
        }

        ConfigParse { config, errors }
    }

    /// Validate config constraints and return all violations.
    pub fn validate(&self) -> Result<(), Vec<EditorConfigError>> {
        let mut errors = Vec::new();
        validate_positive("history_limit", self.history_limit, &mut errors);
        validate_positive("notification_limit", self.notification_limit, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Short human-readable summary.
    #[must_use]
    pub fn summary_short(&self) -> String {
        format!(
            "delete={} rebalance_on_delete={} import={} history={}",
            self.delete_policy, self.rebalance_on_delete, self.import_policy, self.history_limit
        )
    }
}

fn validate_positive(field: &'static str, value: usize, errors: &mut Vec<EditorConfigError>) {
    if value == 0 {
        errors.push(EditorConfigError::new(field, "0", "must be > 0"));
    }
}

#[inline]
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[inline]
fn parse_usize(value: &str) -> Option<usize> {
    value.trim().parse::<usize>().ok()
}
