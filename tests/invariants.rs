use hl7_parser::parser::Message as ParserMessage;
use hl7_parser::builder::Message as BuilderMessage;
use hl7_parser::{Element, ElementOps};

/// Property #2: for any path, the parser tree and the builder tree built
/// from the same text agree on the value found there.
#[test]
fn parser_and_builder_agree_on_every_path() {
    let text = "MSH|^~\\&|App|Fac|RApp|RFac|20010101||ADT^A01|MSG1|P|2.3\rPID|1||A^B&C~D";
    let parsed = ParserMessage::parse(text).unwrap();
    let built = BuilderMessage::build_from(text).unwrap();

    let paths: &[&[i64]] = &[
        &[1, 9, 1, 1],
        &[1, 9, 1, 2],
        &[2, 3, 1, 1],
        &[2, 3, 1, 2, 1],
        &[2, 3, 1, 2, 2],
        &[2, 3, 2],
        &[2],
    ];
    for path in paths {
        assert_eq!(
            parsed.get_value(path),
            built.get_value(path),
            "paths diverged at {path:?}"
        );
    }
    assert_eq!(parsed.segment_count(), built.segment_count());
}

/// Property #3: cloning a parser `Message` produces a fully independent
/// copy — deleting from, or rewriting the encoding of, the clone must
/// never be visible through the original.
#[test]
fn parser_message_clone_is_independent() {
    let original = ParserMessage::parse("MSH|^~\\&|\rPID|1||A^B").unwrap();
    let mut clone = original.clone();
    assert_eq!(clone.value(), original.value());

    ElementOps::delete(&mut clone, 2).unwrap();
    assert_eq!(clone.segment_count(), 1);
    assert_eq!(original.segment_count(), 2);

    let msh2 = clone.segment(1).child(2);
    msh2.set_value(Some("@*!%")).unwrap();
    assert_eq!(clone.encoding().component, '@');
    assert_eq!(original.encoding().component, '^');
}

/// Property #6: after a mutation that changes MSH-2, the `Encoding`
/// re-derived from positions 3-7 is exactly the one subsequent reads and
/// writes split the tree with — there's no stale cached delimiter set.
#[test]
fn delimiter_recovery_after_mutation() {
    let message = ParserMessage::parse("MSH|^~\\&|\rPID|1||A^B").unwrap();
    let msh2 = message.segment(1).child(2);
    msh2.set_value(Some("@*!%")).unwrap();

    let derived = message.encoding();
    assert_eq!(derived.component, '@');
    assert_eq!(derived.repetition, '*');
    assert_eq!(derived.escape, '!');
    assert_eq!(derived.subcomponent, '%');

    // the tree now splits components on the *new* delimiter, not the old one.
    let pid = message.segment(2);
    assert_eq!(pid.child(3).child(1).child(1).value().as_deref(), Some("A"));
    assert_eq!(pid.child(3).child(1).child(2).value().as_deref(), Some("B"));
}

/// Property #8: a segment's type code is always its first three
/// characters, and it's exactly what `segments_of_type` filters on.
#[test]
fn segment_type_code_is_always_first_three_chars_and_drives_segments_of_type() {
    let message = ParserMessage::parse("MSH|^~\\&|\rOBX|1\rOBX|2\rPID|3").unwrap();
    for segment in message.segments() {
        let code = segment.value().unwrap();
        assert_eq!(segment.child(0).value().as_deref(), Some(&code[..3]));
    }
    let obx = message.segments_of_type("OBX");
    assert_eq!(obx.len(), 2);
    assert_eq!(obx[0].value().as_deref(), Some("OBX|1"));
    assert_eq!(obx[1].value().as_deref(), Some("OBX|2"));
}

/// Concrete scenario 4: deleting a subcomponent produces the exact
/// literal text the spec's example walks through.
#[test]
fn deleting_a_subcomponent_produces_the_expected_literal_text() {
    let message = ParserMessage::parse("MSH|^~\\&|\rTST|123^456&ABC~789^012").unwrap();
    let mut component = message.segment(2).child(1).child(1).child(2);
    ElementOps::delete(&mut component, 1).unwrap();
    assert_eq!(message.value(), "MSH|^~\\&|\rTST|123^ABC~789^012");
}

/// `set_values` (the setter half of spec's "Values get/set") behaves
/// identically on both representations: same resulting value, same
/// shrink-to-fit behavior when fewer values are given than previously
/// existed.
#[test]
fn set_values_behaves_identically_on_both_representations() {
    let text = "MSH|^~\\&|\rPID|A|B|C";
    let parsed = ParserMessage::parse(text).unwrap();
    let built = BuilderMessage::build_from(text).unwrap();

    let mut parsed_pid = parsed.segment(2);
    let mut built_pid = built.segment(2);
    parsed_pid.set_values(["X", "Y"]).unwrap();
    built_pid.set_values(["X", "Y"]).unwrap();

    assert_eq!(parsed_pid.value(), built_pid.value());
    assert_eq!(parsed_pid.value().as_deref(), Some("PID|X|Y"));
}

/// An existing-but-empty field is present, not absent: both
/// representations must agree a field within `value_count` reads back
/// `Some("")`, never `None`.
#[test]
fn an_existing_empty_field_agrees_with_the_parser_across_representations() {
    let text = "MSH|^~\\&|\rPID|1||A";
    let parsed = ParserMessage::parse(text).unwrap();
    let built = BuilderMessage::build_from(text).unwrap();

    assert_eq!(parsed.get_value(&[2, 2]), Some(String::new()));
    assert_eq!(built.get_value(&[2, 2]), Some(String::new()));
    assert_eq!(parsed.segment(2).value_count(), 3);
    assert_eq!(built.segment(2).value_count(), 3);
}

/// Concrete scenario 6: `add_range` of N values grows `value_count` by
/// exactly N, and the freshly appended values read back unchanged.
#[test]
fn add_range_grows_value_count_by_exactly_the_appended_count() {
    let message = ParserMessage::parse("MSH|^~\\&|\rPID|A|B").unwrap();
    let mut pid = message.segment(2);
    let before = pid.value_count();
    pid.add_range(["C", "D"]).unwrap();
    assert_eq!(pid.value_count(), before + 2);
    assert_eq!(pid.child(before + 1).value().as_deref(), Some("C"));
    assert_eq!(pid.child(before + 2).value().as_deref(), Some("D"));
}

/// Concrete scenario 7: a fully-specified nested path round-trips through
/// both representations to the exact literal subcomponent values.
#[test]
fn nested_path_literal_matches_expected_values() {
    let text = "MSH|^~\\&|\rOBX|1||id1^id2~id3^id4";
    let parsed = ParserMessage::parse(text).unwrap();
    let built = BuilderMessage::build_from(text).unwrap();

    assert_eq!(parsed.get_value(&[2, 3, 1, 1]), Some("id1".to_string()));
    assert_eq!(parsed.get_value(&[2, 3, 1, 2]), Some("id2".to_string()));
    assert_eq!(parsed.get_value(&[2, 3, 2, 1]), Some("id3".to_string()));
    assert_eq!(parsed.get_value(&[2, 3, 2, 2]), Some("id4".to_string()));

    assert_eq!(built.get_value(&[2, 3, 1, 1]), Some("id1".to_string()));
    assert_eq!(built.get_value(&[2, 3, 1, 2]), Some("id2".to_string()));
    assert_eq!(built.get_value(&[2, 3, 2, 1]), Some("id3".to_string()));
    assert_eq!(built.get_value(&[2, 3, 2, 2]), Some("id4".to_string()));
}
