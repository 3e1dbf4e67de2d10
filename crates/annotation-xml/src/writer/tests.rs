use super::*;
use annotation_core::model::names;
use annotation_core::text_edit::apply_offset_edits;
use annotation_core::{ErrorCode, LineEnding, apply_text_edits};
use insta::assert_snapshot;

const LIST: &str = "<C>\n    <!-- first -->\n    <a/>\n    <b/> <!-- after b -->\n    <c/>\n</C>";

fn p(text: &str) -> Pointer {
    Pointer::parse(text)
}

fn writer_result(text: &str, changes: Vec<XmlDocumentChange>) -> Result<String> {
    let document = XmlDocument::parse("file:///test.xml", text)?;
    let mut writer = XmlWriter::new(&document, &XmlFormatOptions::default());
    for change in changes {
        writer.add_change(change);
    }
    apply_offset_edits(text, writer.offset_edits()?)
}

fn apply(text: &str, changes: Vec<XmlDocumentChange>) -> String {
    writer_result(text, changes).unwrap()
}

fn insert(pointer: &str, index: Option<usize>, name: &str) -> XmlDocumentChange {
    XmlDocumentChange::InsertElement {
        pointer: p(pointer),
        index,
        element: Element::new(name),
    }
}

fn delete(pointer: &str) -> XmlDocumentChange {
    XmlDocumentChange::DeleteElement { pointer: p(pointer) }
}

#[test]
fn test_delete_only_child_keeps_inline_parent_open() {
    assert_eq!(
        apply("<abc><a/></abc>", vec![delete("/rootElement/subElements/0")]),
        "<abc></abc>"
    );
}

#[test]
fn test_insert_into_self_closing_parent() {
    let result = apply(
        "<abc/>",
        vec![
            insert("/rootElement", None, "a"),
            insert("/rootElement", None, "b"),
        ],
    );
    assert_eq!(result, "<abc>\n    <a/>\n    <b/>\n</abc>");
}

#[test]
fn test_insert_then_delete_restores_self_closing_parent() {
    let inserted = apply("<abc/>", vec![insert("/rootElement", Some(0), "a")]);
    assert_eq!(inserted, "<abc>\n    <a/>\n</abc>");
    assert_eq!(
        apply(&inserted, vec![delete("/rootElement/subElements/0")]),
        "<abc/>"
    );
}

#[test]
fn test_insert_then_delete_is_identity_around_comments() {
    for index in [Some(0), Some(1), Some(2), None] {
        let inserted = apply(LIST, vec![insert("/rootElement", index, "x")]);
        let position = index.unwrap_or(3);
        let restored = apply(
            &inserted,
            vec![delete(&format!("/rootElement/subElements/{position}"))],
        );
        assert_eq!(restored, LIST, "index {index:?}, intermediate:\n{inserted}");
    }
}

#[test]
fn test_insert_before_attached_comment() {
    assert_eq!(
        apply(LIST, vec![insert("/rootElement", Some(0), "x")]),
        "<C>\n    <x/>\n    <!-- first -->\n    <a/>\n    <b/> <!-- after b -->\n    <c/>\n</C>"
    );
}

#[test]
fn test_delete_takes_attached_and_trailing_comments() {
    assert_eq!(
        apply(LIST, vec![delete("/rootElement/subElements/1")]),
        "<C>\n    <!-- first -->\n    <a/>\n    <c/>\n</C>"
    );
    assert_eq!(
        apply(LIST, vec![delete("/rootElement/subElements/0")]),
        "<C>\n    <b/> <!-- after b -->\n    <c/>\n</C>"
    );
}

#[test]
fn test_delete_all_children_collapses_parent() {
    let result = apply(
        LIST,
        vec![
            delete("/rootElement/subElements/0"),
            delete("/rootElement/subElements/1"),
            delete("/rootElement/subElements/2"),
            delete("/rootElement/subElements/2"),
        ],
    );
    assert_eq!(result, "<C/>");
}

#[test]
fn test_changes_inside_deleted_element_are_dropped() {
    let text = "<r>\n    <a x=\"1\">\n        <b/>\n    </a>\n</r>";
    let result = apply(
        text,
        vec![
            delete("/rootElement/subElements/0/subElements/0"),
            XmlDocumentChange::DeleteAttribute {
                pointer: p("/rootElement/subElements/0/attributes/0"),
            },
            delete("/rootElement/subElements/0"),
        ],
    );
    assert_eq!(result, "<r/>");
}

#[test]
fn test_move_preserves_children() {
    let moved = apply(
        LIST,
        vec![XmlDocumentChange::MoveCollectionValue {
            pointer: p("/rootElement"),
            from_pointers: vec![p("/rootElement/subElements/2")],
            index: Some(0),
        }],
    );
    assert_eq!(
        moved,
        "<C>\n    <c/>\n    <!-- first -->\n    <a/>\n    <b/> <!-- after b -->\n</C>"
    );

    let appended = apply(
        LIST,
        vec![XmlDocumentChange::MoveCollectionValue {
            pointer: p("/rootElement"),
            from_pointers: vec![p("/rootElement/subElements/0")],
            index: None,
        }],
    );
    assert_eq!(
        appended,
        "<C>\n    <b/> <!-- after b -->\n    <c/>\n    <!-- first -->\n    <a/>\n</C>"
    );
    let document = XmlDocument::parse("file:///moved.xml", appended).unwrap();
    assert_eq!(document.root().sub_elements.len(), 3);
}

#[test]
fn test_move_into_other_parent_reindents() {
    let text = "<r>\n    <list>\n        <a>\n            <v/>\n        </a>\n    </list>\n    <other/>\n</r>";
    let result = apply(
        text,
        vec![XmlDocumentChange::MoveCollectionValue {
            pointer: p("/rootElement/subElements/1"),
            from_pointers: vec![p("/rootElement/subElements/0/subElements/0")],
            index: None,
        }],
    );
    assert_eq!(
        result,
        "<r>\n    <list/>\n    <other>\n        <a>\n            <v/>\n        </a>\n    </other>\n</r>"
    );
}

#[test]
fn test_attribute_edits() {
    let text = "<Record Type=\"UI.DataField\">\n    <PropertyValue Property=\"Value\" Path=\"title\"/>\n</Record>";
    let result = apply(
        text,
        vec![
            XmlDocumentChange::InsertAttribute {
                pointer: p("/rootElement/subElements/0"),
                name: "A".into(),
                value: "1".into(),
            },
            XmlDocumentChange::InsertAttribute {
                pointer: p("/rootElement/subElements/0"),
                name: "B".into(),
                value: "x & y".into(),
            },
            XmlDocumentChange::UpdateAttributeValue {
                pointer: p("/rootElement/attributes/0"),
                value: "UI.DataFieldForAnnotation".into(),
            },
            XmlDocumentChange::ReplaceAttribute {
                pointer: p("/rootElement/subElements/0/attributes/1"),
                name: names::STRING.into(),
                value: "Title".into(),
            },
        ],
    );
    assert_eq!(
        result,
        "<Record Type=\"UI.DataFieldForAnnotation\">\n    <PropertyValue Property=\"Value\" String=\"Title\" A=\"1\" B=\"x &amp; y\"/>\n</Record>"
    );

    let deleted = apply(
        text,
        vec![XmlDocumentChange::DeleteAttribute {
            pointer: p("/rootElement/subElements/0/attributes/0"),
        }],
    );
    assert_eq!(
        deleted,
        "<Record Type=\"UI.DataField\">\n    <PropertyValue Path=\"title\"/>\n</Record>"
    );
}

#[test]
fn test_insert_and_delete_at_same_index_become_replace() {
    let text = "<Collection>\n    <String>a</String>\n    <String>b</String>\n</Collection>";
    let changes = vec![
        XmlDocumentChange::InsertElement {
            pointer: p("/rootElement"),
            index: Some(1),
            element: Element::new(names::STRING).with_text("c"),
        },
        delete("/rootElement/subElements/1"),
    ];
    assert_eq!(
        preprocess(changes.clone()).0,
        vec![XmlDocumentChange::ReplaceElement {
            pointer: p("/rootElement/subElements/1"),
            element: Element::new(names::STRING).with_text("c"),
        }]
    );
    assert_eq!(
        apply(text, changes),
        "<Collection>\n    <String>a</String>\n    <String>c</String>\n</Collection>"
    );
}

#[test]
fn test_delete_with_several_inserts_at_same_index_keeps_order() {
    let inserts = vec![
        insert("/rootElement", Some(0), "n1"),
        insert("/rootElement", Some(0), "n2"),
    ];
    let mut changes = inserts.clone();
    changes.push(delete("/rootElement/subElements/0"));

    let (normalized, collapsed) = preprocess(changes.clone());
    assert!(collapsed.is_empty());
    assert_eq!(normalized, changes);
    assert_eq!(
        apply(LIST, changes),
        "<C>\n    <n1/>\n    <n2/>\n    <b/> <!-- after b -->\n    <c/>\n</C>"
    );
    assert_eq!(
        apply(LIST, inserts),
        "<C>\n    <n1/>\n    <n2/>\n    <!-- first -->\n    <a/>\n    <b/> <!-- after b -->\n    <c/>\n</C>"
    );
}

#[test]
fn test_replace_of_deleted_child_drops_its_comment() {
    let result = apply(
        LIST,
        vec![
            insert("/rootElement", Some(0), "x"),
            delete("/rootElement/subElements/0"),
        ],
    );
    assert_eq!(result, "<C>\n    <x/>\n    <b/> <!-- after b -->\n    <c/>\n</C>");
}

#[test]
fn test_delete_attribute_on_multiline_tag() {
    let text = "<C>\n    <R B=\"2\"\n       A=\"1\"/>\n</C>";
    let result = apply(
        text,
        vec![XmlDocumentChange::DeleteAttribute {
            pointer: p("/rootElement/subElements/0/attributes/1"),
        }],
    );
    assert_eq!(result, "<C>\n    <R B=\"2\"/>\n</C>");
}

#[test]
fn test_replace_content_text_and_name() {
    let text = "<Annotation Term=\"UI.LineItem\">\n    <Collection>\n        <String>a</String>\n    </Collection>\n</Annotation>";
    let replaced = apply(
        text,
        vec![XmlDocumentChange::ReplaceElementContent {
            pointer: p("/rootElement/subElements/0"),
            content: vec![Node::Element(
                Element::new(names::RECORD)
                    .with_attribute(names::TYPE, "UI.DataField")
                    .with_child(Element::new(names::PROPERTY_VALUE).with_attribute(names::PROPERTY, "Value")),
            )],
        }],
    );
    assert_snapshot!(replaced, @r#"
<Annotation Term="UI.LineItem">
    <Collection>
        <Record Type="UI.DataField">
            <PropertyValue Property="Value"/>
        </Record>
    </Collection>
</Annotation>
"#);

    let emptied = apply(
        text,
        vec![XmlDocumentChange::ReplaceElementContent {
            pointer: p("/rootElement/subElements/0"),
            content: Vec::new(),
        }],
    );
    assert_eq!(emptied, "<Annotation Term=\"UI.LineItem\">\n    <Collection/>\n</Annotation>");

    let renamed = apply(
        text,
        vec![
            XmlDocumentChange::ReplaceText {
                pointer: p("/rootElement/subElements/0/subElements/0"),
                text: "x < y".into(),
            },
            XmlDocumentChange::UpdateElementName {
                pointer: p("/rootElement/subElements/0/subElements/0"),
                name: names::PATH.into(),
            },
        ],
    );
    assert_eq!(
        renamed,
        "<Annotation Term=\"UI.LineItem\">\n    <Collection>\n        <Path>x &lt; y</Path>\n    </Collection>\n</Annotation>"
    );
}

#[test]
fn test_conflicting_changes_are_rejected() {
    let error = writer_result(
        "<a x=\"1\"/>",
        vec![
            XmlDocumentChange::UpdateAttributeValue {
                pointer: p("/rootElement/attributes/0"),
                value: "2".into(),
            },
            XmlDocumentChange::UpdateAttributeValue {
                pointer: p("/rootElement/attributes/0"),
                value: "3".into(),
            },
        ],
    )
    .unwrap_err();
    assert_eq!(error.code(), ErrorCode::General);
    assert!(error.to_string().contains("Conflicting"));
}

#[test]
fn test_unknown_pointer_is_an_error() {
    assert!(writer_result("<a/>", vec![delete("/rootElement/subElements/0")]).is_err());
    assert!(writer_result("<a/>", vec![delete("/rootElement")]).is_err());
}

#[test]
fn test_line_endings_and_tabs_follow_document() {
    let crlf = "<abc>\r\n  <a/>\r\n</abc>";
    assert_eq!(
        apply(crlf, vec![insert("/rootElement", None, "b")]),
        "<abc>\r\n  <a/>\r\n  <b/>\r\n</abc>"
    );

    let tabs = "<abc>\n\t<a/>\n</abc>";
    assert_eq!(
        apply(tabs, vec![insert("/rootElement/subElements/0", None, "b")]),
        "<abc>\n\t<a>\n\t\t<b/>\n\t</a>\n</abc>"
    );

    let document = XmlDocument::parse("file:///lf.xml", "<abc/>").unwrap();
    let options = XmlFormatOptions {
        indent: "  ".into(),
        line_ending: LineEnding::Crlf,
    };
    let mut writer = XmlWriter::new(&document, &options);
    writer.add_change(insert("/rootElement", None, "a"));
    let edits = writer.text_edits().unwrap();
    assert_eq!(
        apply_text_edits("<abc/>", &edits).unwrap(),
        "<abc>\r\n  <a/>\r\n</abc>"
    );
}
