#![forbid(unsafe_code)]

//! Field node model.
//!
//! A [`FieldNode`] pairs a stable id with a payload tagged by field kind.
//! Container role and child ids live inside the `container` payload, so a
//! node that is not a container cannot carry children. Common presentation
//! attributes sit next to the payload and are flattened into the same JSON
//! object on the wire:
//!
//! ```json
//! {"id":"column-1","kind":"container","containerRole":"column","childIds":["text-2"],"label":"Column"}
//! ```

use std::collections::BTreeMap;
use std::fmt;

use formkit_core::FieldId;
use serde::{Deserialize, Serialize};

use crate::column::{ColumnHint, ColumnWidth};

/// Every field kind the palette offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
    Number,
    Date,
    Textarea,
    Select,
    Radio,
    Checkbox,
    File,
    Image,
    Button,
    Table,
    Divider,
    Heading,
    Paragraph,
    Spacer,
    Container,
}

impl FieldKind {
    pub const ALL: [Self; 17] = [
        Self::Text,
        Self::Email,
        Self::Number,
        Self::Date,
        Self::Textarea,
        Self::Select,
        Self::Radio,
        Self::Checkbox,
        Self::File,
        Self::Image,
        Self::Button,
        Self::Table,
        Self::Divider,
        Self::Heading,
        Self::Paragraph,
        Self::Spacer,
        Self::Container,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Number => "number",
            Self::Date => "date",
            Self::Textarea => "textarea",
            Self::Select => "select",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::File => "file",
            Self::Image => "image",
            Self::Button => "button",
            Self::Table => "table",
            Self::Divider => "divider",
            Self::Heading => "heading",
            Self::Paragraph => "paragraph",
            Self::Spacer => "spacer",
            Self::Container => "container",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
    }

    /// Whether nodes of this kind collect a value from the respondent.
    #[must_use]
    pub const fn accepts_input(self) -> bool {
        matches!(
            self,
            Self::Text
                | Self::Email
                | Self::Number
                | Self::Date
                | Self::Textarea
                | Self::Select
                | Self::Radio
                | Self::Checkbox
                | Self::File
        )
    }

    /// Label a freshly dropped palette item starts with.
    #[must_use]
    pub const fn default_label(self) -> &'static str {
        match self {
            Self::Text => "Text Field",
            Self::Email => "Email",
            Self::Number => "Number",
            Self::Date => "Date",
            Self::Textarea => "Text Area",
            Self::Select => "Dropdown",
            Self::Radio => "Radio Group",
            Self::Checkbox => "Checkboxes",
            Self::File => "File Upload",
            Self::Image => "Image",
            Self::Button => "Submit",
            Self::Table => "Table",
            Self::Divider => "Divider",
            Self::Heading => "Heading",
            Self::Paragraph => "Paragraph",
            Self::Spacer => "Spacer",
            Self::Container => "Container",
        }
    }

    /// Default payload for a palette item of this kind.
    ///
    /// Containers default to the plain role; use
    /// [`FieldPayload::container`] for rows and columns.
    #[must_use]
    pub fn default_payload(self) -> FieldPayload {
        match self {
            Self::Text => FieldPayload::Text(InputPayload::default()),
            Self::Email => FieldPayload::Email(InputPayload::default()),
            Self::Date => FieldPayload::Date(InputPayload::default()),
            Self::Number => FieldPayload::Number(NumberPayload::default()),
            Self::Textarea => FieldPayload::Textarea(TextareaPayload {
                default_value: None,
                rows: Some(4),
            }),
            Self::Select => FieldPayload::Select(ChoicePayload::with_default_options()),
            Self::Radio => FieldPayload::Radio(ChoicePayload::with_default_options()),
            Self::Checkbox => FieldPayload::Checkbox(ChoicePayload::with_default_options()),
            Self::File => FieldPayload::File(UploadPayload::default()),
            Self::Image => FieldPayload::Image(ImagePayload {
                accept: vec!["image/png".into(), "image/jpeg".into()],
                ..ImagePayload::default()
            }),
            Self::Button => FieldPayload::Button(ButtonPayload::default()),
            Self::Table => FieldPayload::Table(TablePayload {
                columns: vec!["Column 1".into(), "Column 2".into()],
                rows: vec![vec![String::new(); 2]; 2],
            }),
            Self::Divider => FieldPayload::Divider {},
            Self::Heading => FieldPayload::Heading(HeadingPayload::default()),
            Self::Paragraph => FieldPayload::Paragraph(ParagraphPayload {
                text: "Paragraph text".into(),
            }),
            Self::Spacer => FieldPayload::Spacer(SpacerPayload { height: 24 }),
            Self::Container => FieldPayload::container(ContainerRole::PlainContainer),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layout role of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerRole {
    Row,
    Column,
    PlainContainer,
}

impl ContainerRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Row => "row",
            Self::Column => "column",
            Self::PlainContainer => "plain-container",
        }
    }

    #[must_use]
    pub const fn default_label(self) -> &'static str {
        match self {
            Self::Row => "Row",
            Self::Column => "Column",
            Self::PlainContainer => "Container",
        }
    }
}

impl fmt::Display for ContainerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-line inputs (`text`, `email`, `date`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InputPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NumberPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextareaPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
}

/// One selectable option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub label: String,
    pub value: String,
}

impl FieldOption {
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// `select`, `radio` and `checkbox`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChoicePayload {
    pub options: Vec<FieldOption>,
    /// Honoured by `select` only.
    #[serde(skip_serializing_if = "is_false")]
    pub multiple: bool,
}

impl ChoicePayload {
    fn with_default_options() -> Self {
        Self {
            options: vec![
                FieldOption::new("Option 1", "option-1"),
                FieldOption::new("Option 2", "option-2"),
            ],
            multiple: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadPayload {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub accept: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size_kb: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImagePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub accept: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size_kb: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    #[default]
    Submit,
    Reset,
    Link,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ButtonPayload {
    pub action: ButtonAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TablePayload {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeadingPayload {
    pub text: String,
    /// 1 through 6.
    pub level: u8,
}

impl Default for HeadingPayload {
    fn default() -> Self {
        Self {
            text: "Heading".into(),
            level: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParagraphPayload {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpacerPayload {
    pub height: u32,
}

/// Children of a container in rendering order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPayload {
    pub container_role: ContainerRole,
    #[serde(default)]
    pub child_ids: Vec<FieldId>,
}

/// Kind-specific payload, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldPayload {
    Text(InputPayload),
    Email(InputPayload),
    Number(NumberPayload),
    Date(InputPayload),
    Textarea(TextareaPayload),
    Select(ChoicePayload),
    Radio(ChoicePayload),
    Checkbox(ChoicePayload),
    File(UploadPayload),
    Image(ImagePayload),
    Button(ButtonPayload),
    Table(TablePayload),
    Divider {},
    Heading(HeadingPayload),
    Paragraph(ParagraphPayload),
    Spacer(SpacerPayload),
    Container(ContainerPayload),
}

impl FieldPayload {
    /// Empty container payload with the given role.
    #[must_use]
    pub fn container(role: ContainerRole) -> Self {
        Self::Container(ContainerPayload {
            container_role: role,
            child_ids: Vec::new(),
        })
    }

    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::Text(_) => FieldKind::Text,
            Self::Email(_) => FieldKind::Email,
            Self::Number(_) => FieldKind::Number,
            Self::Date(_) => FieldKind::Date,
            Self::Textarea(_) => FieldKind::Textarea,
            Self::Select(_) => FieldKind::Select,
            Self::Radio(_) => FieldKind::Radio,
            Self::Checkbox(_) => FieldKind::Checkbox,
            Self::File(_) => FieldKind::File,
            Self::Image(_) => FieldKind::Image,
            Self::Button(_) => FieldKind::Button,
            Self::Table(_) => FieldKind::Table,
            Self::Divider {} => FieldKind::Divider,
            Self::Heading(_) => FieldKind::Heading,
            Self::Paragraph(_) => FieldKind::Paragraph,
            Self::Spacer(_) => FieldKind::Spacer,
            Self::Container(_) => FieldKind::Container,
        }
    }
}

/// Submission rules attached to an input field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Overrides the default message of any failing rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationRules {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Presentation and validation attributes shared by every kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldAttributes {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub unique: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(skip_serializing_if = "ValidationRules::is_empty")]
    pub validation: ValidationRules,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, String>,
}

impl FieldAttributes {
    #[must_use]
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

/// One form field descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FieldNodeRepr", into = "FieldNodeRepr")]
pub struct FieldNode {
    pub id: FieldId,
    pub payload: FieldPayload,
    /// Only meaningful while the parent is a `column` container.
    pub column_hint: Option<ColumnHint>,
    pub attributes: FieldAttributes,
}

impl FieldNode {
    /// Node with the given payload and its kind's default label.
    #[must_use]
    pub fn new(id: FieldId, payload: FieldPayload) -> Self {
        let label = match &payload {
            FieldPayload::Container(container) => container.container_role.default_label(),
            other => other.kind().default_label(),
        };
        Self {
            id,
            payload,
            column_hint: None,
            attributes: FieldAttributes::labelled(label),
        }
    }

    /// Node as it comes off the palette.
    #[must_use]
    pub fn from_palette(kind: FieldKind, id: FieldId) -> Self {
        Self::new(id, kind.default_payload())
    }

    /// Empty container with the given role.
    #[must_use]
    pub fn container(id: FieldId, role: ContainerRole) -> Self {
        Self::new(id, FieldPayload::container(role))
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.attributes.label = label.into();
        self
    }

    /// Replace the child list. Ignored for non-containers.
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = FieldId>) -> Self {
        if let Some(child_ids) = self.child_ids_mut() {
            *child_ids = children.into_iter().collect();
        }
        self
    }

    #[must_use]
    pub fn with_column_hint(mut self, hint: ColumnHint) -> Self {
        self.column_hint = Some(hint);
        self
    }

    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        self.payload.kind()
    }

    #[must_use]
    pub fn container_role(&self) -> Option<ContainerRole> {
        match &self.payload {
            FieldPayload::Container(container) => Some(container.container_role),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self.payload, FieldPayload::Container(_))
    }

    #[must_use]
    pub fn is_column(&self) -> bool {
        self.container_role() == Some(ContainerRole::Column)
    }

    /// Children in rendering order; empty for non-containers.
    #[must_use]
    pub fn child_ids(&self) -> &[FieldId] {
        match &self.payload {
            FieldPayload::Container(container) => &container.child_ids,
            _ => &[],
        }
    }

    pub fn child_ids_mut(&mut self) -> Option<&mut Vec<FieldId>> {
        match &mut self.payload {
            FieldPayload::Container(container) => Some(&mut container.child_ids),
            _ => None,
        }
    }

    #[must_use]
    pub fn column_width(&self) -> Option<ColumnWidth> {
        self.column_hint.map(|hint| hint.width)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldNodeRepr {
    id: FieldId,
    #[serde(flatten)]
    payload: FieldPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    column_hint: Option<ColumnWidth>,
    #[serde(default, skip_serializing_if = "is_false")]
    column_hint_pinned: bool,
    #[serde(flatten)]
    attributes: FieldAttributes,
}

impl From<FieldNodeRepr> for FieldNode {
    fn from(repr: FieldNodeRepr) -> Self {
        Self {
            id: repr.id,
            payload: repr.payload,
            column_hint: repr.column_hint.map(|width| ColumnHint {
                width,
                pinned: repr.column_hint_pinned,
            }),
            attributes: repr.attributes,
        }
    }
}

impl From<FieldNode> for FieldNodeRepr {
    fn from(node: FieldNode) -> Self {
        Self {
            id: node.id,
            payload: node.payload,
            column_hint: node.column_hint.map(|hint| hint.width),
            column_hint_pinned: node.column_hint.is_some_and(|hint| hint.pinned),
            attributes: node.attributes,
        }
    }
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(raw: &str) -> FieldId {
        FieldId::new(raw).expect("test id must be non-empty")
    }

    #[test]
    fn payload_kind_matches_palette_kind() {
        for kind in FieldKind::ALL {
            assert_eq!(kind.default_payload().kind(), kind);
            assert_eq!(FieldKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn palette_defaults_are_populated() {
        let select = FieldNode::from_palette(FieldKind::Select, id("select-1"));
        assert_eq!(select.attributes.label, "Dropdown");
        let FieldPayload::Select(choice) = &select.payload else {
            unreachable!("select palette item must carry choices");
        };
        assert_eq!(choice.options.len(), 2);

        let table = FieldNode::from_palette(FieldKind::Table, id("table-1"));
        let FieldPayload::Table(table) = &table.payload else {
            unreachable!("table palette item must carry a grid");
        };
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.rows.len(), 2);

        let column = FieldNode::container(id("column-1"), ContainerRole::Column);
        assert_eq!(column.attributes.label, "Column");
        assert!(column.is_column());
    }

    #[test]
    fn non_container_has_no_children() {
        let text = FieldNode::from_palette(FieldKind::Text, id("text-1"))
            .with_children([id("ghost")]);
        assert!(text.child_ids().is_empty());
        assert_eq!(text.container_role(), None);
    }

    #[test]
    fn container_serializes_flat() {
        let node = FieldNode::container(id("column-1"), ContainerRole::Column)
            .with_children([id("text-2")]);
        let value = serde_json::to_value(&node).expect("serialize");
        assert_eq!(
            value,
            json!({
                "id": "column-1",
                "kind": "container",
                "containerRole": "column",
                "childIds": ["text-2"],
                "label": "Column",
            })
        );
    }

    #[test]
    fn column_hint_serializes_with_pin_flag() {
        let auto = FieldNode::from_palette(FieldKind::Text, id("a"))
            .with_column_hint(ColumnHint::auto(ColumnWidth::Third));
        let value = serde_json::to_value(&auto).expect("serialize");
        assert_eq!(value["columnHint"], "third");
        assert!(value.get("columnHintPinned").is_none());

        let pinned = FieldNode::from_palette(FieldKind::Text, id("b"))
            .with_column_hint(ColumnHint::pinned(ColumnWidth::TwoThirds));
        let value = serde_json::to_value(&pinned).expect("serialize");
        assert_eq!(value["columnHint"], "two-thirds");
        assert_eq!(value["columnHintPinned"], true);
        let back: FieldNode = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, pinned);
    }

    #[test]
    fn attributes_and_payload_share_one_object() {
        let value = json!({
            "id": "email-9",
            "kind": "email",
            "label": "Work email",
            "required": true,
            "placeholder": "you@example.com",
            "defaultValue": "a@b.c",
            "validation": {"maxLength": 64},
            "style": {"width": "50%"},
        });
        let node: FieldNode = serde_json::from_value(value.clone()).expect("deserialize");
        assert_eq!(node.kind(), FieldKind::Email);
        assert!(node.attributes.required);
        assert_eq!(node.attributes.validation.max_length, Some(64));
        assert_eq!(
            node.payload,
            FieldPayload::Email(InputPayload {
                default_value: Some("a@b.c".into())
            })
        );
        assert_eq!(serde_json::to_value(&node).expect("serialize"), value);
    }

    #[test]
    fn divider_round_trips() {
        let node = FieldNode::from_palette(FieldKind::Divider, id("divider-1"));
        let json = serde_json::to_string(&node).expect("serialize");
        let back: FieldNode = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, node);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = serde_json::from_value::<FieldNode>(json!({"id": "x", "kind": "hologram"}));
        assert!(err.is_err());
    }
}
