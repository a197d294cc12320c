#![forbid(unsafe_code)]

//! Registration-form submissions validated end to end.

use formkit_core::FieldId;
use formkit_tree::{
    ConfigPatch, ContainerRole, FieldKind, FieldNode, FieldOption, FieldTree, Target,
    ValidationRules,
};
use formkit_validation::{
    ERROR_CODE_EMAIL, ERROR_CODE_OPTION, ERROR_CODE_PATTERN, ERROR_CODE_RANGE, ERROR_CODE_REQUIRED,
    Submission, SubmittedValue, validate_submission,
};

fn id(raw: &str) -> FieldId {
    FieldId::new(raw).expect("test id must be non-empty")
}

fn registration_form() -> FieldTree {
    let mut tree = FieldTree::new();
    let _ = tree.insert(FieldNode::container(id("details"), ContainerRole::Column), &Target::Canvas);
    let fields = [
        (FieldKind::Text, "name"),
        (FieldKind::Email, "email"),
        (FieldKind::Number, "seats"),
        (FieldKind::Select, "track"),
    ];
    for (kind, raw) in fields {
        let _ = tree.insert(FieldNode::from_palette(kind, id(raw)), &Target::Node(id("details")));
    }
    let _ = tree.insert(FieldNode::from_palette(FieldKind::Button, id("submit")), &Target::Canvas);

    let required = ConfigPatch {
        required: Some(true),
        ..ConfigPatch::default()
    };
    for raw in ["name", "email", "track"] {
        let _ = tree.update_config(&id(raw), &required);
    }
    let _ = tree.update_config(
        &id("name"),
        &ConfigPatch {
            validation: Some(ValidationRules {
                pattern: Some(r"[\p{L} .'-]+".to_owned()),
                ..ValidationRules::default()
            }),
            ..ConfigPatch::default()
        },
    );
    let _ = tree.update_config(
        &id("seats"),
        &ConfigPatch {
            validation: Some(ValidationRules {
                min: Some(1.0),
                max: Some(4.0),
                ..ValidationRules::default()
            }),
            ..ConfigPatch::default()
        },
    );
    let _ = tree.update_config(
        &id("track"),
        &ConfigPatch {
            options: Some(vec![
                FieldOption::new("Systems", "systems"),
                FieldOption::new("Web", "web"),
            ]),
            ..ConfigPatch::default()
        },
    );
    tree
}

#[test]
fn complete_submission_passes() {
    let tree = registration_form();
    let submission = Submission::from([
        (id("name"), "Ada Lovelace".into()),
        (id("email"), "ada@example.org".into()),
        (id("seats"), SubmittedValue::Number(2.0)),
        (id("track"), "systems".into()),
    ]);
    let report = validate_submission(&tree, &submission);
    assert!(report.is_valid(), "unexpected errors: {:?}", report.errors);
    assert!(report.ignored.is_empty());
}

#[test]
fn every_broken_field_is_reported_once() {
    let tree = registration_form();
    let submission = Submission::from([
        (id("name"), "R2-D2 <script>".into()),
        (id("email"), "ada-at-example".into()),
        (id("seats"), "9".into()),
        (id("submit"), "clicked".into()),
    ]);
    let report = validate_submission(&tree, &submission);

    let codes = |raw: &str| {
        report
            .errors_for(&id(raw))
            .iter()
            .map(|error| error.code)
            .collect::<Vec<_>>()
    };
    assert_eq!(codes("name"), [ERROR_CODE_PATTERN]);
    assert_eq!(codes("email"), [ERROR_CODE_EMAIL]);
    assert_eq!(codes("seats"), [ERROR_CODE_RANGE]);
    assert_eq!(codes("track"), [ERROR_CODE_REQUIRED]);
    assert_eq!(report.ignored, [id("submit")]);

    let seats = &report.errors_for(&id("seats"))[0];
    assert_eq!(seats.format_message(), "Must be between 1 and 4");
}

#[test]
fn option_removed_after_publish_rejects_stale_choice() {
    let mut tree = registration_form();
    let _ = tree.update_config(
        &id("track"),
        &ConfigPatch {
            options: Some(vec![FieldOption::new("Web", "web")]),
            ..ConfigPatch::default()
        },
    );
    let submission = Submission::from([(id("track"), "systems".into())]);
    let report = validate_submission(&tree, &submission);
    assert_eq!(report.errors_for(&id("track"))[0].code, ERROR_CODE_OPTION);
}
