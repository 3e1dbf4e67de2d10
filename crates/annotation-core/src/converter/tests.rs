use super::*;
use crate::avt::{PropertyValue, Record};
use crate::error::ErrorCode;
use crate::model::{AnnotationFile, Target};
use crate::schema::build_schema;

const URI: &str = "file:///app/annotations.xml";
const UI: &str = "com.sap.vocabularies.UI.v1";
const COMMON: &str = "com.sap.vocabularies.Common.v1";

fn data_field(path: &str) -> Element {
    Element::new(names::RECORD)
        .with_attribute(names::TYPE, "UI.DataField")
        .with_child(
            Element::new(names::PROPERTY_VALUE)
                .with_attribute(names::PROPERTY, "Value")
                .with_attribute(names::PATH, path),
        )
}

fn service() -> CompiledService {
    let label = Element::new(names::ANNOTATION)
        .with_attribute(names::TERM, "Common.Label")
        .with_attribute(names::STRING, "Title");
    let line_item = Element::new(names::ANNOTATION)
        .with_attribute(names::TERM, "UI.LineItem")
        .with_child(
            Element::new(names::COLLECTION)
                .with_child(data_field("title"))
                .with_child(data_field("author"))
                .with_child(data_field("price")),
        );
    let mut file = AnnotationFile::new(URI);
    file.targets
        .push(Target::new("svc.Books").with_terms(vec![label, line_item]));
    CompiledService {
        odata_version: "4.0".to_string(),
        annotation_files: vec![file],
        ..Default::default()
    }
}

fn run(changes: Vec<Change>) -> Result<Vec<AnnotationFileChange>> {
    run_on(service(), changes)
}

fn run_on(service: CompiledService, changes: Vec<Change>) -> Result<Vec<AnnotationFileChange>> {
    let vocabularies = VocabularyService::new();
    let (schema, merge_maps) = build_schema(&service, &vocabularies, false);
    convert(
        ConversionContext {
            service: &service,
            merge_maps: &merge_maps,
            schema: &schema,
            vocabularies: &vocabularies,
        },
        &changes,
    )
}

fn label() -> AnnotationReference {
    AnnotationReference::new("svc.Books", format!("{COMMON}.Label"))
}

fn line_item() -> AnnotationReference {
    AnnotationReference::new("svc.Books", format!("{UI}.LineItem"))
}

#[test]
fn test_new_target_collects_merged_content() {
    let header = RawAnnotation::new(format!("{UI}.HeaderInfo")).with_value(Expression::Record(
        Record::new(Some(format!("{UI}.HeaderInfoType").as_str()))
            .with_property("TypeName", Expression::String("Author".into())),
    ));
    let reference = AnnotationReference::new("svc.Authors", format!("{UI}.HeaderInfo"));
    let changes = run(vec![
        Change::insert_annotation(URI, "svc.Authors", header),
        Change::insert(
            URI,
            reference,
            "/content/0",
            None,
            InsertContent::PropertyValue(PropertyValue::new(
                "TypeNamePlural",
                Expression::String("Authors".into()),
            )),
        ),
    ])
    .unwrap();

    assert_eq!(changes.len(), 1);
    let AnnotationFileChange::InsertTarget { uri, target } = &changes[0] else {
        panic!("expected insert-target, got {:?}", changes[0]);
    };
    assert_eq!(uri, URI);
    assert_eq!(target.name, "svc.Authors");
    let record = target.terms[0].sub_elements().next().expect("record");
    assert_eq!(record.attribute(names::TYPE), Some("UI.HeaderInfoType"));
    let properties: Vec<_> = record
        .sub_elements()
        .filter_map(|pv| pv.attribute(names::PROPERTY))
        .collect();
    assert_eq!(properties, vec!["TypeName", "TypeNamePlural"]);
}

#[test]
fn test_target_inserts_come_first() {
    let changes = run(vec![
        Change::delete(URI, label(), ""),
        Change::insert_annotation(
            URI,
            "svc.Authors",
            RawAnnotation::new(format!("{UI}.Hidden")).with_value(Expression::Bool(true)),
        ),
    ])
    .unwrap();

    let kinds: Vec<_> = changes.iter().map(AnnotationFileChange::kind).collect();
    assert_eq!(kinds, vec!["insert-target", "delete-element"]);
    assert_eq!(
        changes[1].pointer().map(ToString::to_string).as_deref(),
        Some("/targets/0/terms/0")
    );
}

#[test]
fn test_annotation_for_existing_target_is_an_element_insert() {
    let changes = run(vec![
        Change::insert_annotation(URI, "svc.Books", RawAnnotation::new(format!("{UI}.Hidden"))),
        Change::insert(
            URI,
            AnnotationReference::new("svc.Books", format!("{UI}.Hidden")),
            "",
            None,
            InsertContent::Expression(Expression::Bool(true)),
        ),
    ])
    .unwrap();

    assert_eq!(changes.len(), 1);
    let AnnotationFileChange::InsertElement { pointer, element, index, .. } = &changes[0] else {
        panic!("expected insert-element");
    };
    assert_eq!(pointer.to_string(), "/targets/0");
    assert_eq!(*index, None);
    assert_eq!(element.attribute(names::TERM), Some("UI.Hidden"));
    assert_eq!(element.attribute(names::BOOL), Some("true"));
}

#[test]
fn test_pending_annotation_matches_aliased_and_full_terms() {
    let changes = run(vec![
        Change::insert_annotation(URI, "svc.Books", RawAnnotation::new("UI.Hidden")),
        Change::insert(
            URI,
            AnnotationReference::new("svc.Books", format!("{UI}.Hidden")),
            "",
            None,
            InsertContent::Expression(Expression::Bool(true)),
        ),
        Change::insert_annotation(URI, "svc.Authors", RawAnnotation::new(format!("{UI}.Hidden"))),
        Change::insert(
            URI,
            AnnotationReference::new("svc.Authors", "UI.Hidden"),
            "",
            None,
            InsertContent::Expression(Expression::Bool(false)),
        ),
    ])
    .unwrap();

    let kinds: Vec<_> = changes.iter().map(AnnotationFileChange::kind).collect();
    assert_eq!(kinds, vec!["insert-target", "insert-element"]);
    let AnnotationFileChange::InsertTarget { target, .. } = &changes[0] else {
        unreachable!();
    };
    assert_eq!(target.terms[0].attribute(names::BOOL), Some("false"));
    let AnnotationFileChange::InsertElement { element, .. } = &changes[1] else {
        unreachable!();
    };
    assert_eq!(element.attribute(names::BOOL), Some("true"));
}

#[test]
fn test_changing_a_pending_annotation_fails() {
    let error = run(vec![
        Change::insert_annotation(URI, "svc.Authors", RawAnnotation::new(format!("{UI}.Hidden"))),
        Change::delete(
            URI,
            AnnotationReference::new("svc.Authors", format!("{UI}.Hidden")),
            "",
        ),
    ])
    .unwrap_err();
    assert_eq!(error.code(), ErrorCode::General);
}

#[test]
fn test_update_attribute_value_and_type() {
    let same = run(vec![Change::update(
        URI,
        label(),
        "",
        UpdateContent::Expression(Expression::String("Name".into())),
    )])
    .unwrap();
    assert_eq!(
        same,
        vec![AnnotationFileChange::UpdateAttributeValue {
            uri: URI.to_string(),
            pointer: Pointer::parse("/targets/0/terms/0/attributes/String"),
            value: "Name".to_string(),
        }]
    );

    let renamed = run(vec![Change::update(
        URI,
        label(),
        "/attributes/String/value",
        UpdateContent::Expression(Expression::Path("title".into())),
    )])
    .unwrap();
    assert_eq!(
        renamed,
        vec![AnnotationFileChange::ReplaceAttribute {
            uri: URI.to_string(),
            pointer: Pointer::parse("/targets/0/terms/0/attributes/String"),
            name: "Path".to_string(),
            value: "title".to_string(),
        }]
    );
}

#[test]
fn test_update_attribute_to_element_notation() {
    let changes = run(vec![Change::update(
        URI,
        label(),
        "",
        UpdateContent::Expression(Expression::Null),
    )])
    .unwrap();
    let kinds: Vec<_> = changes.iter().map(AnnotationFileChange::kind).collect();
    assert_eq!(kinds, vec!["delete-attribute", "insert-element"]);
}

#[test]
fn test_update_collection_replaces_content() {
    let changes = run(vec![Change::update(
        URI,
        line_item(),
        "",
        UpdateContent::Expression(Expression::Collection(vec![])),
    )])
    .unwrap();
    assert!(matches!(
        &changes[..],
        [AnnotationFileChange::ReplaceElementContent { pointer, content, .. }]
            if pointer.to_string() == "/targets/0/terms/1/content/0" && content.is_empty()
    ));

    let record = run(vec![Change::update(
        URI,
        line_item(),
        "/content/0/content/1",
        UpdateContent::Expression(Expression::Record(Record::new(Some(format!("{UI}.DataFieldForAnnotation").as_str())))),
    )])
    .unwrap();
    assert_eq!(record[0].kind(), "replace-element");
}

#[test]
fn test_update_primitive_value() {
    let changes = run(vec![Change::update(
        URI,
        line_item(),
        "/content/0/content/0/content/0/attributes/Path/value",
        UpdateContent::Primitive("subtitle".into()),
    )])
    .unwrap();
    assert_eq!(
        changes,
        vec![AnnotationFileChange::UpdateAttributeValue {
            uri: URI.to_string(),
            pointer: Pointer::parse("/targets/0/terms/1/content/0/content/0/content/0/attributes/Path"),
            value: "subtitle".to_string(),
        }]
    );
}

#[test]
fn test_delete_attribute_and_element() {
    let changes = run(vec![
        Change::delete(URI, line_item(), "/content/0/content/2/attributes/Type/value"),
        Change::delete(URI, line_item(), "/content/0/content/1"),
    ])
    .unwrap();
    assert_eq!(
        changes,
        vec![
            AnnotationFileChange::DeleteAttribute {
                uri: URI.to_string(),
                pointer: Pointer::parse("/targets/0/terms/1/content/0/content/2/attributes/Type"),
            },
            AnnotationFileChange::DeleteElement {
                uri: URI.to_string(),
                pointer: Pointer::parse("/targets/0/terms/1/content/0/content/1"),
            },
        ]
    );
    assert!(run(vec![Change::delete(URI, line_item(), "/content/0/content/9")]).is_err());
}

#[test]
fn test_move_uses_absolute_pointers() {
    let changes = run(vec![Change::move_elements(
        URI,
        line_item(),
        "/content/0",
        vec![Pointer::parse("/content/0/content/2")],
        Some(0),
    )])
    .unwrap();
    assert_eq!(
        changes,
        vec![AnnotationFileChange::MoveElements {
            uri: URI.to_string(),
            pointer: Pointer::parse("/targets/0/terms/1/content/0"),
            from_pointers: vec![Pointer::parse("/targets/0/terms/1/content/0/content/2")],
            index: Some(0),
        }]
    );
}

#[test]
fn test_unknown_reference_is_general_error() {
    let error = run(vec![Change::delete(
        URI,
        AnnotationReference::new("svc.Books", format!("{UI}.Chart")),
        "",
    )])
    .unwrap_err();
    assert_eq!(error.code(), ErrorCode::General);
    assert!(error.to_string().contains(URI));
}

#[test]
fn test_update_of_missing_value_inserts_it() {
    let mut service = service();
    service.annotation_files[0]
        .targets
        .push(Target::new("svc.Authors").with_terms(vec![
            Element::new(names::ANNOTATION).with_attribute(names::TERM, "UI.Hidden"),
        ]));
    let hidden = AnnotationReference::new("svc.Authors", format!("{UI}.Hidden"));

    let changes = run_on(
        service.clone(),
        vec![Change::update(
            URI,
            hidden.clone(),
            "/content/0",
            UpdateContent::Expression(Expression::Bool(true)),
        )],
    )
    .unwrap();
    assert_eq!(
        changes,
        vec![AnnotationFileChange::InsertAttribute {
            uri: URI.to_string(),
            pointer: Pointer::parse("/targets/1/terms/0"),
            name: names::BOOL.to_string(),
            value: "true".to_string(),
        }]
    );

    let changes = run_on(
        service,
        vec![Change::update(
            URI,
            hidden,
            "/content/0",
            UpdateContent::Expression(Expression::Record(Record::new(Some(
                format!("{UI}.DataField").as_str(),
            )))),
        )],
    )
    .unwrap();
    let [AnnotationFileChange::InsertElement { pointer, index, element, .. }] = changes.as_slice() else {
        panic!("expected insert-element, got {changes:?}");
    };
    assert_eq!(pointer.to_string(), "/targets/1/terms/0");
    assert_eq!(*index, None);
    assert_eq!(element.attribute(names::TYPE), Some("UI.DataField"));
}

#[test]
fn test_update_of_missing_collection_item_inserts_at_its_index() {
    let changes = run(vec![Change::update(
        URI,
        line_item(),
        "/content/0/content/3",
        UpdateContent::Expression(Expression::Record(Record::new(Some(
            format!("{UI}.DataField").as_str(),
        )))),
    )])
    .unwrap();
    let [AnnotationFileChange::InsertElement { pointer, index, .. }] = changes.as_slice() else {
        panic!("expected insert-element, got {changes:?}");
    };
    assert_eq!(pointer.to_string(), "/targets/0/terms/1/content/0");
    assert_eq!(*index, Some(3));

    let error = run(vec![Change::update(
        URI,
        line_item(),
        "/content/1/content/0",
        UpdateContent::Expression(Expression::Bool(true)),
    )])
    .unwrap_err();
    assert_eq!(error.code(), ErrorCode::General);
}
