use hl7_parser::parser::{Cursor, Message};
use hl7_parser::{Element, ElementError, ElementOps};

#[test]
fn inserting_a_repetition_shifts_the_rest_up() {
    let message = Message::parse("MSH|^~\\&|\rPID|1||A~B~C").unwrap();
    let mut field = message.segment(2).child(3);
    field.insert(2, "X").unwrap();
    assert_eq!(field.value().as_deref(), Some("A~X~B~C"));
}

#[test]
fn deleting_a_component_shifts_the_rest_down() {
    let message = Message::parse("MSH|^~\\&|\rPID|1||A^B^C").unwrap();
    let mut rep = message.segment(2).child(3).child(1);
    rep.delete(2).unwrap();
    assert_eq!(rep.value().as_deref(), Some("A^C"));
}

#[test]
fn moving_a_field_relocates_it_without_disturbing_siblings() {
    let message = Message::parse("MSH|^~\\&|\rPID|A|B|C|D").unwrap();
    let mut pid = message.segment(2);
    pid.move_to(1, 4).unwrap();
    assert_eq!(pid.value().as_deref(), Some("PID|B|C|D|A"));
}

#[test]
fn add_range_appends_past_the_current_end() {
    let message = Message::parse("MSH|^~\\&|\rPID|A").unwrap();
    let mut pid = message.segment(2);
    pid.add_range(["B", "C"]).unwrap();
    assert_eq!(pid.value().as_deref(), Some("PID|A|B|C"));
}

#[test]
fn the_message_root_and_msh_segment_cannot_be_deleted_or_moved() {
    let mut message = Message::parse("MSH|^~\\&|\rPID|1").unwrap();
    let err = ElementOps::delete(&mut message, 1).unwrap_err();
    assert!(matches!(err, ElementError::ElementDeleteForbidden(_)));

    let err = ElementOps::move_to(&mut message, 1, 2).unwrap_err();
    assert!(matches!(err, ElementError::ElementMoveForbidden(_)));
}

#[test]
fn a_segments_type_code_cannot_be_deleted_or_moved() {
    let message = Message::parse("MSH|^~\\&|\rPID|1").unwrap();
    let mut pid = message.segment(2);
    let err = ElementOps::delete(&mut pid, 0).unwrap_err();
    assert!(matches!(err, ElementError::ElementDeleteForbidden(_)));
}

#[test]
fn cursor_delete_all_requires_a_shared_parent() {
    let message = Message::parse("MSH|^~\\&|\rPID|A|B|C").unwrap();
    let pid = message.segment(2);
    let items = vec![pid.child(1), pid.child(3)];
    Cursor::delete_all(items).unwrap();
    assert_eq!(pid.value().as_deref(), Some("PID|B"));
}

#[test]
fn message_delete_all_bulk_deletes_segments_highest_index_first() {
    let mut message = Message::parse("MSH|^~\\&|\rOBX|1\rOBX|2\rOBX|3").unwrap();
    let targets = vec![message.segment(2), message.segment(4)];
    message.delete_all(targets).unwrap();
    assert_eq!(message.segment_count(), 2);
    assert_eq!(message.segment(2).value().as_deref(), Some("OBX|2"));
}

#[test]
fn set_values_replaces_every_field_of_a_segment_at_once() {
    let message = Message::parse("MSH|^~\\&|\rPID|A|B|C").unwrap();
    let mut pid = message.segment(2);
    pid.set_values(["X", "Y"]).unwrap();
    assert_eq!(pid.value().as_deref(), Some("PID|X|Y"));
}

#[test]
fn writing_past_every_ancestor_materializes_them_all() {
    let message = Message::parse("MSH|^~\\&|").unwrap();
    let field = message.segment(3).child(2);
    field.set_value(Some("hi")).unwrap();
    assert_eq!(message.segment_count(), 3);
    assert_eq!(message.segment(2).value().as_deref(), Some(""));
    // field 1 of the new segment is also absent, so field 2 needs a
    // delimiter for each of the two preceding boundaries.
    assert_eq!(message.segment(3).value().as_deref(), Some("||hi"));
}
