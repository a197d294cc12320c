#![forbid(unsafe_code)]

//! Validation of one respondent's submission against a field tree.

use std::collections::BTreeMap;

use formkit_core::FieldId;
use formkit_tree::{FieldKind, FieldNode, FieldPayload, FieldTree};
use serde::{Deserialize, Serialize};

use crate::validators::{
    All, And, Email, IsoDate, MaxLength, MinLength, Numeric, OneOf, Pattern, Range, Required,
    ValidationError, Validator, WithMessage,
};

/// Error code for several values submitted to a single-value field.
pub const ERROR_CODE_MULTIPLE: &str = "multiple_values";

/// A submitted value as it arrives from the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmittedValue {
    Empty,
    Flag(bool),
    Number(f64),
    Text(String),
    Many(Vec<String>),
}

impl SubmittedValue {
    /// Non-empty textual values; `false` and `null` count as no value.
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        match self {
            Self::Empty | Self::Flag(false) => Vec::new(),
            Self::Flag(true) => vec!["true".to_owned()],
            Self::Number(number) => vec![number.to_string()],
            Self::Text(text) if text.is_empty() => Vec::new(),
            Self::Text(text) => vec![text.clone()],
            Self::Many(items) => items.iter().filter(|item| !item.is_empty()).cloned().collect(),
        }
    }
}

impl From<&str> for SubmittedValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for SubmittedValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Field id → submitted value.
pub type Submission = BTreeMap<FieldId, SubmittedValue>;

/// Outcome of [`validate_submission`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SubmissionReport {
    /// Failing fields and their errors, in id order.
    pub errors: BTreeMap<FieldId, Vec<ValidationError>>,
    /// Submitted ids that name no input field in the tree.
    pub ignored: Vec<FieldId>,
}

impl SubmissionReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn errors_for(&self, id: &FieldId) -> &[ValidationError] {
        self.errors.get(id).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Format validator for one value of `node`, built from its kind and rules.
///
/// Returns `None` for kinds that collect no input. A pattern that does not
/// compile is skipped with a warning.
#[must_use]
pub fn validator_for(node: &FieldNode) -> Option<All<str>> {
    let kind = node.kind();
    if !kind.accepts_input() {
        return None;
    }
    let rules = &node.attributes.validation;
    let mut validators: Vec<Box<dyn Validator<str>>> = Vec::new();

    match &node.payload {
        FieldPayload::Email(_) => validators.push(Box::new(Email::new())),
        FieldPayload::Date(_) => validators.push(Box::new(IsoDate)),
        FieldPayload::Number(_) => match Range::from_rules(rules.min, rules.max) {
            Some(range) => validators.push(Box::new(Numeric::within(range))),
            None => validators.push(Box::new(Numeric::new())),
        },
        FieldPayload::Select(choice) | FieldPayload::Radio(choice) | FieldPayload::Checkbox(choice) => {
            validators.push(Box::new(OneOf::new(
                choice.options.iter().map(|option| option.value.clone()),
            )));
        }
        _ => {}
    }

    if matches!(
        kind,
        FieldKind::Text | FieldKind::Email | FieldKind::Textarea
    ) {
        match (rules.min_length, rules.max_length) {
            (Some(min), Some(max)) => {
                validators.push(Box::new(And::new(MinLength::new(min), MaxLength::new(max))));
            }
            (Some(min), None) => validators.push(Box::new(MinLength::new(min))),
            (None, Some(max)) => validators.push(Box::new(MaxLength::new(max))),
            (None, None) => {}
        }
        if let Some(pattern) = rules.pattern.as_deref().filter(|p| !p.is_empty()) {
            match Pattern::new(pattern) {
                Ok(pattern) => validators.push(Box::new(pattern)),
                Err(err) => {
                    tracing::warn!(field = %node.id, %err, "validation pattern does not compile, skipped");
                }
            }
        }
    }

    let validators = match &rules.message {
        Some(message) if !message.is_empty() => validators
            .into_iter()
            .map(|inner| Box::new(WithMessage::new(inner, message.clone())) as Box<dyn Validator<str>>)
            .collect(),
        _ => validators,
    };
    Some(All::new(validators))
}

fn accepts_many(node: &FieldNode) -> bool {
    match &node.payload {
        FieldPayload::Select(choice) => choice.multiple,
        FieldPayload::Checkbox(_) | FieldPayload::File(_) => true,
        _ => false,
    }
}

fn hidden_in_tree(tree: &FieldTree, id: &FieldId) -> bool {
    let mut current = Some(id);
    let mut steps = 0usize;
    while let Some(node_id) = current {
        if tree.node(node_id).is_some_and(|node| node.attributes.hidden) {
            return true;
        }
        steps += 1;
        if steps > tree.len() {
            break;
        }
        current = tree.parent_of(node_id);
    }
    false
}

/// Errors for one field's submitted value.
#[must_use]
pub fn validate_field(node: &FieldNode, value: Option<&SubmittedValue>) -> Vec<ValidationError> {
    let Some(validator) = validator_for(node) else {
        return Vec::new();
    };
    let texts = value.map(SubmittedValue::texts).unwrap_or_default();

    if texts.iter().all(|text| text.trim().is_empty()) {
        if !node.attributes.required {
            return Vec::new();
        }
        return Required::new()
            .validate("")
            .into_error()
            .into_iter()
            .collect();
    }

    let mut errors = Vec::new();
    if texts.len() > 1 && !accepts_many(node) {
        errors.push(
            ValidationError::new(ERROR_CODE_MULTIPLE, "Only one value is allowed")
                .with_param("actual", texts.len()),
        );
    }
    for text in &texts {
        if let Some(error) = validator.validate(text.as_str()).into_error()
            && !errors.contains(&error)
        {
            errors.push(error);
        }
    }
    errors
}

/// Validate every visible input field of `tree` against `submission`.
///
/// Containers, decorative kinds and hidden fields (including fields inside
/// a hidden container) are skipped.
#[must_use]
pub fn validate_submission(tree: &FieldTree, submission: &Submission) -> SubmissionReport {
    let mut report = SubmissionReport::default();
    for node in tree.nodes() {
        if !node.kind().accepts_input() || hidden_in_tree(tree, &node.id) {
            continue;
        }
        let errors = validate_field(node, submission.get(&node.id));
        if !errors.is_empty() {
            report.errors.insert(node.id.clone(), errors);
        }
    }
    report.ignored = submission
        .keys()
        .filter(|id| !tree.node(id).is_some_and(|node| node.kind().accepts_input()))
        .cloned()
        .collect();
    tracing::debug!(
        failing = report.errors.len(),
        ignored = report.ignored.len(),
        "submission validated"
    );
    report
}
