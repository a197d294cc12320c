#![forbid(unsafe_code)]

//! The editing session.
//!
//! [`FormEditor`] owns the field tree together with its sibling metadata
//! (theme and banner), an undo/redo history, a storage backend, and a
//! bounded queue of transient notifications. Every failing call returns an
//! [`EditorError`], posts an error notification, and leaves the form
//! exactly as it was.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use formkit_core::{Clock, EditorConfig, EditorConfigError, FieldId, FieldIdAllocator, SystemClock};
use formkit_tree::{
    ColumnWidth, ConfigPatch, ContainerRole, EditReport, FieldKind, FieldNode, FieldTree,
    FormOperation, JournalEntry, OperationError, OperationOutcome, RepairAction, Target,
    TreeSettings,
};
use serde::Serialize;

use crate::document::{Banner, DocumentError, FormDocument, ImportedForm, Theme};
use crate::history::History;
use crate::storage::{DocumentStorage, StorageError, storage_for};

// ─────────────────────────────────────────────────────────────────────────────
// State and notifications
// ─────────────────────────────────────────────────────────────────────────────

/// Everything undo/redo restores.
#[derive(Debug, Clone, PartialEq)]
pub struct FormState {
    pub tree: FieldTree,
    pub theme: Theme,
    pub banner: Option<Banner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// A transient message for the host UI (toast, status line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
    pub created_at_millis: u64,
}

/// Result of a successful import or load.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub fields: usize,
    pub repairs: Vec<RepairAction>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum EditorError {
    Config(Vec<EditorConfigError>),
    Operation(OperationError),
    Document(DocumentError),
    Storage(StorageError),
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(errors) => {
                write!(f, "invalid editor config:")?;
                for error in errors {
                    write!(f, " {error};")?;
                }
                Ok(())
            }
            Self::Operation(e) => write!(f, "{e}"),
            Self::Document(e) => write!(f, "{e}"),
            Self::Storage(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EditorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(errors) => errors.first().map(|e| e as &(dyn std::error::Error + 'static)),
            Self::Operation(e) => Some(e),
            Self::Document(e) => Some(e),
            Self::Storage(e) => Some(e),
        }
    }
}

impl From<OperationError> for EditorError {
    fn from(e: OperationError) -> Self {
        Self::Operation(e)
    }
}

impl From<DocumentError> for EditorError {
    fn from(e: DocumentError) -> Self {
        Self::Document(e)
    }
}

impl From<StorageError> for EditorError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FormEditor
// ─────────────────────────────────────────────────────────────────────────────

/// One form being edited.
pub struct FormEditor {
    config: EditorConfig,
    state: FormState,
    history: History<FormState>,
    storage: Box<dyn DocumentStorage>,
    clock: Arc<dyn Clock>,
    notifications: VecDeque<Notification>,
    next_notification_id: u64,
    next_operation_id: u64,
    next_transaction_id: u64,
    selected: Option<FieldId>,
    dirty: bool,
}

impl FormEditor {
    /// Empty form using the storage the config selects and the system clock.
    pub fn new(config: EditorConfig) -> Result<Self, EditorError> {
        let storage = storage_for(&config);
        Self::with_parts(config, storage, Arc::new(SystemClock))
    }

    /// Empty form with explicit storage and clock.
    pub fn with_parts(
        config: EditorConfig,
        storage: Box<dyn DocumentStorage>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EditorError> {
        config.validate().map_err(EditorError::Config)?;
        let tree = FieldTree::new()
            .with_settings(TreeSettings::from(&config))
            .with_allocator(FieldIdAllocator::new(clock.clone()));
        tracing::info!(config = %config.summary_short(), storage = storage.name(), "form editor ready");
        Ok(Self {
            history: History::new(config.history_limit),
            state: FormState {
                tree,
                theme: Theme::default(),
                banner: None,
            },
            config,
            storage,
            clock,
            notifications: VecDeque::new(),
            next_notification_id: 1,
            next_operation_id: 1,
            next_transaction_id: 1,
            selected: None,
            dirty: false,
        })
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    #[must_use]
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> &FormState {
        &self.state
    }

    #[must_use]
    pub fn tree(&self) -> &FieldTree {
        &self.state.tree
    }

    #[must_use]
    pub fn theme(&self) -> &Theme {
        &self.state.theme
    }

    #[must_use]
    pub fn banner(&self) -> Option<&Banner> {
        self.state.banner.as_ref()
    }

    /// Unsaved changes since the last save or load.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn storage_name(&self) -> &str {
        self.storage.name()
    }

    /// Apply a new configuration to the running session.
    pub fn reconfigure(&mut self, config: EditorConfig) -> Result<(), EditorError> {
        if let Err(errors) = config.validate() {
            let error = EditorError::Config(errors);
            self.notify(NotificationLevel::Error, error.to_string());
            return Err(error);
        }
        self.state.tree.set_settings(TreeSettings::from(&config));
        self.history.set_max_history(config.history_limit);
        self.config = config;
        self.trim_notifications();
        Ok(())
    }

    // ── Selection ────────────────────────────────────────────────────────────

    /// Node whose settings panel is open.
    #[must_use]
    pub fn selected(&self) -> Option<&FieldId> {
        self.selected.as_ref()
    }

    /// Select an existing node; unknown ids are refused.
    pub fn select(&mut self, id: &FieldId) -> bool {
        if !self.state.tree.contains(id) {
            return false;
        }
        self.selected = Some(id.clone());
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    // ── Edits ────────────────────────────────────────────────────────────────

    /// Apply one tree operation as one undoable step.
    ///
    /// Outcomes that leave the tree unchanged are returned as `Ok` but are
    /// not recorded in history and do not mark the form dirty.
    pub fn apply(&mut self, operation: FormOperation) -> Result<OperationOutcome, EditorError> {
        let operation_id = self.take_operation_id();
        let label = operation.kind().as_str();
        let before = self.state.clone();
        match self.state.tree.apply(operation_id, operation) {
            Ok(outcome) => {
                if outcome.is_noop() {
                    match &outcome.report.noop {
                        Some(reason) => {
                            tracing::debug!(operation_id, %reason, "edit left the form unchanged");
                        }
                        None => tracing::debug!(operation_id, "edit left the form unchanged"),
                    }
                    self.after_edit(&outcome.report);
                    return Ok(outcome);
                }
                self.history.record(label, before);
                self.dirty = true;
                self.after_edit(&outcome.report);
                Ok(outcome)
            }
            Err(err) => {
                self.notify(NotificationLevel::Error, err.to_string());
                Err(err.into())
            }
        }
    }

    /// Add a palette item and select it.
    pub fn add_field(
        &mut self,
        kind: FieldKind,
        role: Option<ContainerRole>,
        target: Target,
    ) -> Result<FieldId, EditorError> {
        let id = self.state.tree.allocate_id(kind);
        let node = match role {
            Some(role) if kind == FieldKind::Container => FieldNode::container(id.clone(), role),
            _ => FieldNode::from_palette(kind, id.clone()),
        };
        let outcome = self.apply(FormOperation::Insert { node, target })?;
        Ok(outcome.report.inserted.unwrap_or(id))
    }

    /// Drag an existing node to `target`.
    pub fn move_field(&mut self, id: &FieldId, target: Target) -> Result<OperationOutcome, EditorError> {
        self.apply(FormOperation::Reparent {
            node_id: id.clone(),
            target,
        })
    }

    pub fn remove_field(&mut self, id: &FieldId) -> Result<OperationOutcome, EditorError> {
        self.apply(FormOperation::Delete {
            node_id: id.clone(),
        })
    }

    pub fn configure(&mut self, id: &FieldId, patch: ConfigPatch) -> Result<OperationOutcome, EditorError> {
        self.apply(FormOperation::UpdateConfig {
            node_id: id.clone(),
            patch,
        })
    }

    /// Pin a column width, or return the field to automatic balancing with `None`.
    pub fn set_column_width(
        &mut self,
        id: &FieldId,
        width: Option<ColumnWidth>,
    ) -> Result<OperationOutcome, EditorError> {
        self.apply(FormOperation::SetColumnHint {
            node_id: id.clone(),
            width,
        })
    }

    /// Apply several operations as one undoable step.
    ///
    /// All operations run in one transaction; if any is rejected, none of
    /// them take effect.
    pub fn apply_batch(
        &mut self,
        label: &str,
        operations: impl IntoIterator<Item = FormOperation>,
    ) -> Result<Vec<JournalEntry>, EditorError> {
        let transaction_id = self.next_transaction_id;
        self.next_transaction_id = self.next_transaction_id.saturating_add(1);
        let mut transaction = self.state.tree.begin_transaction(transaction_id);

        for operation in operations {
            let operation_id = self.take_operation_id();
            if let Err(err) = transaction.apply(operation_id, operation) {
                let rolled_back = transaction.rollback();
                tracing::warn!(
                    transaction_id,
                    attempted = rolled_back.journal.len(),
                    "batch rolled back"
                );
                self.notify(NotificationLevel::Error, err.to_string());
                return Err(err.into());
            }
        }

        let committed = transaction.commit();
        if committed.tree != self.state.tree {
            let before = self.state.clone();
            self.state.tree = committed.tree;
            self.history.record(label, before);
            self.dirty = true;
            self.drop_stale_selection();
        }
        Ok(committed.journal)
    }

    pub fn set_theme(&mut self, theme: Theme) -> bool {
        if theme == self.state.theme {
            return false;
        }
        let before = self.state.clone();
        self.state.theme = theme;
        self.history.record("theme", before);
        self.dirty = true;
        true
    }

    pub fn set_banner(&mut self, banner: Option<Banner>) -> bool {
        if banner == self.state.banner {
            return false;
        }
        let before = self.state.clone();
        self.state.banner = banner;
        self.history.record("banner", before);
        self.dirty = true;
        true
    }

    // ── History ──────────────────────────────────────────────────────────────

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Label of the step [`undo`](Self::undo) would revert.
    #[must_use]
    pub fn undo_label(&self) -> Option<&str> {
        self.history.undo_label()
    }

    pub fn undo(&mut self) -> bool {
        let undone = self.history.undo(&mut self.state);
        if undone {
            self.dirty = true;
            self.drop_stale_selection();
        }
        undone
    }

    pub fn redo(&mut self) -> bool {
        let redone = self.history.redo(&mut self.state);
        if redone {
            self.dirty = true;
            self.drop_stale_selection();
        }
        redone
    }

    // ── Documents ────────────────────────────────────────────────────────────

    #[must_use]
    pub fn export(&self) -> FormDocument {
        FormDocument::export(
            &self.state.tree,
            &self.state.theme,
            self.state.banner.as_ref(),
            self.clock.as_ref(),
        )
    }

    pub fn export_json(&self) -> Result<String, EditorError> {
        Ok(self.export().to_json_pretty()?)
    }

    /// Replace the form with an imported document, as one undoable step.
    pub fn import_json(&mut self, json: &str) -> Result<ImportSummary, EditorError> {
        let imported = match FormDocument::from_json(json)
            .and_then(|document| document.into_form(self.config.import_policy))
        {
            Ok(imported) => imported,
            Err(err) => {
                self.notify(NotificationLevel::Error, err.to_string());
                return Err(err.into());
            }
        };
        let before = self.state.clone();
        let summary = self.install(imported);
        self.history.record("import", before);
        self.dirty = true;
        tracing::info!(fields = summary.fields, repairs = summary.repairs.len(), "form imported");
        Ok(summary)
    }

    /// Persist the current form.
    pub fn save(&mut self) -> Result<(), EditorError> {
        let document = self.export();
        if let Err(err) = self.storage.save(&document) {
            self.notify(NotificationLevel::Error, format!("Save failed: {err}"));
            return Err(err.into());
        }
        self.dirty = false;
        tracing::info!(storage = self.storage.name(), fields = document.fields.fields.len(), "form saved");
        Ok(())
    }

    /// Replace the session with the stored form, clearing history.
    ///
    /// Returns `Ok(None)` when nothing has been saved yet.
    pub fn load(&mut self) -> Result<Option<ImportSummary>, EditorError> {
        let document = match self.storage.load() {
            Ok(Some(document)) => document,
            Ok(None) => return Ok(None),
            Err(err) => {
                self.notify(NotificationLevel::Error, format!("Load failed: {err}"));
                return Err(err.into());
            }
        };
        let imported = match document.into_form(self.config.import_policy) {
            Ok(imported) => imported,
            Err(err) => {
                self.notify(NotificationLevel::Error, format!("Load failed: {err}"));
                return Err(err.into());
            }
        };
        let summary = self.install(imported);
        self.history.clear();
        self.dirty = false;
        tracing::info!(storage = self.storage.name(), fields = summary.fields, "form loaded");
        Ok(Some(summary))
    }

    // ── Notifications ────────────────────────────────────────────────────────

    /// Pending notifications, oldest first.
    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter()
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notifications.len();
        self.notifications.retain(|notification| notification.id != id);
        self.notifications.len() != before
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn take_operation_id(&mut self) -> u64 {
        let id = self.next_operation_id;
        self.next_operation_id = self.next_operation_id.saturating_add(1);
        id
    }

    fn install(&mut self, imported: ImportedForm) -> ImportSummary {
        let ImportedForm {
            mut tree,
            theme,
            banner,
            repairs,
            ..
        } = imported;
        tree.set_settings(TreeSettings::from(&self.config));
        tree.set_allocator(FieldIdAllocator::new(self.clock.clone()));
        if !repairs.is_empty() {
            self.notify(
                NotificationLevel::Warning,
                format!("Repaired {} broken field reference(s) while importing", repairs.len()),
            );
        }
        let summary = ImportSummary {
            fields: tree.len(),
            repairs,
        };
        self.state = FormState { tree, theme, banner };
        self.drop_stale_selection();
        summary
    }

    fn after_edit(&mut self, report: &EditReport) {
        if let (Some(proposed), Some(issued)) = (&report.reissued_from, &report.inserted) {
            self.notify(
                NotificationLevel::Warning,
                format!("Field id {proposed} was already in use; added as {issued}"),
            );
        }
        if report.fell_back {
            self.notify(
                NotificationLevel::Info,
                "Drop target no longer exists; placed at the end of the form".to_owned(),
            );
        }
        if !report.ignored_keys.is_empty() {
            self.notify(
                NotificationLevel::Warning,
                format!(
                    "Ignored settings that do not apply to this field: {}",
                    report.ignored_keys.join(", ")
                ),
            );
        }
        if let Some(inserted) = &report.inserted {
            self.selected = Some(inserted.clone());
        }
        self.drop_stale_selection();
    }

    fn drop_stale_selection(&mut self) {
        if self
            .selected
            .as_ref()
            .is_some_and(|id| !self.state.tree.contains(id))
        {
            self.selected = None;
        }
    }

    fn notify(&mut self, level: NotificationLevel, message: String) {
        match level {
            NotificationLevel::Info => tracing::debug!(%message, "notification"),
            NotificationLevel::Warning => tracing::warn!(%message, "notification"),
            NotificationLevel::Error => tracing::error!(%message, "notification"),
        }
        let id = self.next_notification_id;
        self.next_notification_id = self.next_notification_id.saturating_add(1);
        self.notifications.push_back(Notification {
            id,
            level,
            message,
            created_at_millis: self.clock.now_millis(),
        });
        self.trim_notifications();
    }

    fn trim_notifications(&mut self) {
        while self.notifications.len() > self.config.notification_limit {
            let _ = self.notifications.pop_front();
        }
    }
}

impl fmt::Debug for FormEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormEditor")
            .field("fields", &self.state.tree.len())
            .field("storage", &self.storage.name())
            .field("undo_depth", &self.history.undo_len())
            .field("notifications", &self.notifications.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}
