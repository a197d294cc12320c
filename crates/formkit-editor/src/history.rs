#![forbid(unsafe_code)]

//! Bounded undo/redo over whole-state snapshots.
//!
//! Every recorded step stores the state as it was *before* the edit along
//! with a short label. Undo swaps the current state for the top of the undo
//! stack and parks the current one on the redo stack; any new edit clears
//! redo.

/// One undoable step.
#[derive(Debug, Clone, PartialEq)]
struct Step<S> {
    label: String,
    state: S,
}

/// Undo/redo stacks of snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct History<S> {
    undo_stack: Vec<Step<S>>,
    redo_stack: Vec<Step<S>>,
    max_history: usize,
}

impl<S> History<S> {
    /// `max_history` is clamped to at least one step.
    #[must_use]
    pub fn new(max_history: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_history: max_history.max(1),
        }
    }

    #[must_use]
    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Set the maximum undo depth, dropping the oldest steps if needed.
    pub fn set_max_history(&mut self, max: usize) {
        self.max_history = max.max(1);
        while self.undo_stack.len() > self.max_history {
            self.undo_stack.remove(0);
        }
    }

    /// Record the state an edit is about to replace.
    pub fn record(&mut self, label: impl Into<String>, before: S) {
        self.undo_stack.push(Step {
            label: label.into(),
            state: before,
        });
        if self.undo_stack.len() > self.max_history {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    #[must_use]
    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.last().map(|step| step.label.as_str())
    }

    #[must_use]
    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.last().map(|step| step.label.as_str())
    }

    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Swap `current` for the previous state. Returns `false` when there is
    /// nothing to undo, leaving `current` untouched.
    pub fn undo(&mut self, current: &mut S) -> bool {
        let Some(step) = self.undo_stack.pop() else {
            return false;
        };
        let newer = std::mem::replace(current, step.state);
        self.redo_stack.push(Step {
            label: step.label,
            state: newer,
        });
        true
    }

    /// Re-apply the most recently undone state.
    pub fn redo(&mut self, current: &mut S) -> bool {
        let Some(step) = self.redo_stack.pop() else {
            return false;
        };
        let older = std::mem::replace(current, step.state);
        self.undo_stack.push(Step {
            label: step.label,
            state: older,
        });
        true
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
