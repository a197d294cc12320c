#![forbid(unsafe_code)]

//! Partial configuration updates.
//!
//! A [`ConfigPatch`] names only the attributes it changes. Merging never
//! touches the node id, kind, container role, or child ids. Keys that do not
//! apply to the node's kind are skipped and reported back by their wire name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::node::{
    ButtonAction, FieldNode, FieldOption, FieldPayload, ValidationRules,
};

/// Attribute changes to merge into one node.
///
/// For optional string attributes an empty string clears the value. Style
/// entries merge key by key; an empty value removes the key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    /// Replaces the whole rule set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRules>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<BTreeMap<String, String>>,

    /// `text`, `email`, `date`, `textarea`, and `number` (parsed as a number).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<FieldOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size_kb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ButtonAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_rows: Option<Vec<Vec<String>>>,
    /// `heading` and `paragraph`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl ConfigPatch {
    #[must_use]
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge into `node`, returning the wire names of keys that were skipped.
    pub fn apply_to(&self, node: &mut FieldNode) -> Vec<&'static str> {
        let mut ignored = Vec::new();
        let attributes = &mut node.attributes;

        if let Some(label) = &self.label {
            attributes.label.clone_from(label);
        }
        set_optional(&mut attributes.name, self.name.as_ref());
        set_optional(&mut attributes.placeholder, self.placeholder.as_ref());
        set_optional(&mut attributes.help_text, self.help_text.as_ref());
        if let Some(required) = self.required {
            attributes.required = required;
        }
        if let Some(unique) = self.unique {
            attributes.unique = unique;
        }
        if let Some(hidden) = self.hidden {
            attributes.hidden = hidden;
        }
        if let Some(validation) = &self.validation {
            attributes.validation = validation.clone();
        }
        if let Some(style) = &self.style {
            for (key, value) in style {
                if value.is_empty() {
                    let _ = attributes.style.remove(key);
                } else {
                    let _ = attributes.style.insert(key.clone(), value.clone());
                }
            }
        }

        let payload = &mut node.payload;

        if let Some(value) = &self.default_value {
            let applied = match payload {
                FieldPayload::Text(input) | FieldPayload::Email(input) | FieldPayload::Date(input) => {
                    set_optional(&mut input.default_value, Some(value));
                    true
                }
                FieldPayload::Textarea(textarea) => {
                    set_optional(&mut textarea.default_value, Some(value));
                    true
                }
                FieldPayload::Number(number) if value.is_empty() => {
                    number.default_value = None;
                    true
                }
                FieldPayload::Number(number) => match value.trim().parse::<f64>() {
                    Ok(parsed) if parsed.is_finite() => {
                        number.default_value = Some(parsed);
                        true
                    }
                    _ => false,
                },
                _ => false,
            };
            if !applied {
                ignored.push("defaultValue");
            }
        }

        if let Some(step) = self.step {
            match payload {
                FieldPayload::Number(number) if step.is_finite() => number.step = Some(step),
                _ => ignored.push("step"),
            }
        }

        if let Some(rows) = self.rows {
            match payload {
                FieldPayload::Textarea(textarea) => textarea.rows = Some(rows),
                _ => ignored.push("rows"),
            }
        }

        if let Some(options) = &self.options {
            match payload {
                FieldPayload::Select(choice)
                | FieldPayload::Radio(choice)
                | FieldPayload::Checkbox(choice) => choice.options.clone_from(options),
                _ => ignored.push("options"),
            }
        }

        if let Some(multiple) = self.multiple {
            match payload {
                FieldPayload::Select(choice) => choice.multiple = multiple,
                _ => ignored.push("multiple"),
            }
        }

        if let Some(accept) = &self.accept {
            match payload {
                FieldPayload::File(upload) => upload.accept.clone_from(accept),
                FieldPayload::Image(image) => image.accept.clone_from(accept),
                _ => ignored.push("accept"),
            }
        }

        if let Some(max_size_kb) = self.max_size_kb {
            match payload {
                FieldPayload::File(upload) => upload.max_size_kb = Some(max_size_kb),
                FieldPayload::Image(image) => image.max_size_kb = Some(max_size_kb),
                _ => ignored.push("maxSizeKb"),
            }
        }

        if let Some(src) = &self.src {
            match payload {
                FieldPayload::Image(image) => set_optional(&mut image.src, Some(src)),
                _ => ignored.push("src"),
            }
        }

        if let Some(alt) = &self.alt {
            match payload {
                FieldPayload::Image(image) => set_optional(&mut image.alt, Some(alt)),
                _ => ignored.push("alt"),
            }
        }

        if let Some(action) = self.action {
            match payload {
                FieldPayload::Button(button) => button.action = action,
                _ => ignored.push("action"),
            }
        }

        if let Some(href) = &self.href {
            match payload {
                FieldPayload::Button(button) => set_optional(&mut button.href, Some(href)),
                _ => ignored.push("href"),
            }
        }

        if let Some(columns) = &self.table_columns {
            match payload {
                FieldPayload::Table(table) => table.columns.clone_from(columns),
                _ => ignored.push("tableColumns"),
            }
        }

        if let Some(rows) = &self.table_rows {
            match payload {
                FieldPayload::Table(table) => table.rows.clone_from(rows),
                _ => ignored.push("tableRows"),
            }
        }

        if let Some(text) = &self.text {
            match payload {
                FieldPayload::Heading(heading) => heading.text.clone_from(text),
                FieldPayload::Paragraph(paragraph) => paragraph.text.clone_from(text),
                _ => ignored.push("text"),
            }
        }

        if let Some(level) = self.level {
            match payload {
                FieldPayload::Heading(heading) if (1..=6).contains(&level) => {
                    heading.level = level;
                }
                _ => ignored.push("level"),
            }
        }

        if let Some(height) = self.height {
            match payload {
                FieldPayload::Spacer(spacer) => spacer.height = height,
                _ => ignored.push("height"),
            }
        }

        ignored
    }
}

fn set_optional(slot: &mut Option<String>, value: Option<&String>) {
    if let Some(value) = value {
        *slot = if value.is_empty() {
            None
        } else {
            Some(value.clone())
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ContainerRole, FieldKind};
    use formkit_core::FieldId;

    fn node(kind: FieldKind) -> FieldNode {
        let id = FieldId::new(format!("{kind}-1")).expect("valid id");
        FieldNode::from_palette(kind, id)
    }

    #[test]
    fn common_attributes_merge() {
        let mut text = node(FieldKind::Text);
        let patch = ConfigPatch {
            label: Some("First name".into()),
            placeholder: Some("Ada".into()),
            required: Some(true),
            style: Some([("width".to_string(), "50%".to_string())].into()),
            ..ConfigPatch::default()
        };
        let ignored = patch.apply_to(&mut text);
        assert!(ignored.is_empty());
        assert_eq!(text.attributes.label, "First name");
        assert_eq!(text.attributes.placeholder.as_deref(), Some("Ada"));
        assert!(text.attributes.required);
        assert_eq!(text.attributes.style.get("width").map(String::as_str), Some("50%"));

        let clear = ConfigPatch {
            placeholder: Some(String::new()),
            style: Some([("width".to_string(), String::new())].into()),
            ..ConfigPatch::default()
        };
        let _ = clear.apply_to(&mut text);
        assert_eq!(text.attributes.placeholder, None);
        assert!(text.attributes.style.is_empty());
    }

    #[test]
    fn foreign_keys_are_reported() {
        let mut text = node(FieldKind::Text);
        let before = text.payload.clone();
        let patch = ConfigPatch {
            options: Some(vec![FieldOption::new("A", "a")]),
            level: Some(3),
            label: Some("Still applied".into()),
            ..ConfigPatch::default()
        };
        let ignored = patch.apply_to(&mut text);
        assert_eq!(ignored, ["options", "level"]);
        assert_eq!(text.payload, before);
        assert_eq!(text.attributes.label, "Still applied");
    }

    #[test]
    fn container_structure_is_untouched() {
        let child = FieldId::new("text-2").expect("valid id");
        let mut column = FieldNode::container(FieldId::new("col").expect("valid id"), ContainerRole::Column)
            .with_children([child.clone()]);
        let ignored = ConfigPatch::label("Left").apply_to(&mut column);
        assert!(ignored.is_empty());
        assert_eq!(column.child_ids(), [child]);
        assert_eq!(column.container_role(), Some(ContainerRole::Column));
    }

    #[test]
    fn number_default_is_parsed() {
        let mut number = node(FieldKind::Number);
        let patch = ConfigPatch {
            default_value: Some("2.5".into()),
            step: Some(0.5),
            ..ConfigPatch::default()
        };
        assert!(patch.apply_to(&mut number).is_empty());
        let FieldPayload::Number(payload) = &number.payload else {
            unreachable!("number node keeps its payload");
        };
        assert_eq!(payload.default_value, Some(2.5));
        assert_eq!(payload.step, Some(0.5));

        let bad = ConfigPatch {
            default_value: Some("lots".into()),
            ..ConfigPatch::default()
        };
        assert_eq!(bad.apply_to(&mut number), ["defaultValue"]);
    }

    #[test]
    fn non_finite_step_is_ignored() {
        let mut number = node(FieldKind::Number);
        for step in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let patch = ConfigPatch {
                step: Some(step),
                ..ConfigPatch::default()
            };
            assert_eq!(patch.apply_to(&mut number), ["step"]);
        }
        let FieldPayload::Number(payload) = &number.payload else {
            unreachable!("number node keeps its payload");
        };
        assert_eq!(payload.step, None);
    }

    #[test]
    fn multiple_only_applies_to_select() {
        let mut radio = node(FieldKind::Radio);
        let patch = ConfigPatch {
            multiple: Some(true),
            ..ConfigPatch::default()
        };
        assert_eq!(patch.apply_to(&mut radio), ["multiple"]);
        let mut select = node(FieldKind::Select);
        assert!(patch.apply_to(&mut select).is_empty());
    }

    #[test]
    fn heading_level_is_bounded() {
        let mut heading = node(FieldKind::Heading);
        let patch = ConfigPatch {
            level: Some(9),
            ..ConfigPatch::default()
        };
        assert_eq!(patch.apply_to(&mut heading), ["level"]);
    }

    #[test]
    fn patch_parses_from_camel_case_json() {
        let patch: ConfigPatch = serde_json::from_str(r#"{"helpText":"Shown below","maxSizeKb":512}"#)
            .expect("deserialize");
        assert_eq!(patch.help_text.as_deref(), Some("Shown below"));
        assert_eq!(patch.max_size_kb, Some(512));
        assert!(!patch.is_empty());
        assert!(ConfigPatch::default().is_empty());
    }
}
