use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::element::Element;
use crate::encoding::Encoding;
use crate::error::ElementError;
use crate::level::Level;
use crate::ops::ElementOps;

use super::node::{delete_all_children, Node};

/// A built HL7 v2 message: unlike [`crate::parser::Message`], which
/// lazily slices one owned string, `Message` here eagerly decomposes
/// its content down to `Subcomponent` the moment it's constructed or
/// set, the same way [`Node`] does at every level beneath it. This
/// trades some allocation for a tree that can be walked and mutated
/// without ever re-parsing text.
pub struct Message {
    encoding: Rc<RefCell<Encoding>>,
    segments: HashMap<usize, Node>,
}

impl Clone for Message {
    /// A structurally independent copy: a fresh `Encoding` is cloned by
    /// value, and every segment is rebound to it via
    /// [`Node::deep_clone`] rather than plain [`Clone`] (which would
    /// leave the copy's segments still sharing the original's `Encoding`
    /// `Rc`, so a write to the clone's MSH.2 would silently change the
    /// original's delimiters too).
    fn clone(&self) -> Self {
        let encoding = Rc::new(RefCell::new(*self.encoding.borrow()));
        let segments = self
            .segments
            .iter()
            .map(|(&i, seg)| (i, seg.deep_clone(&encoding)))
            .collect();
        Message { encoding, segments }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value())
    }
}

impl Message {
    /// A brand new message, seeded with nothing but a canonical MSH
    /// segment (`MSH|^~\&|`) using the default encoding.
    pub fn build() -> Self {
        let encoding = Rc::new(RefCell::new(Encoding::default()));
        let mut msh = Node::msh_segment(Rc::clone(&encoding));
        msh.put(0, Some("MSH".to_string()));
        let mut segments = HashMap::new();
        segments.insert(1, msh);
        Message { encoding, segments }
    }

    /// Fully decompose `text` into a materialized builder tree. Performs
    /// the same structural validation [`crate::parser::Message::parse`]
    /// does (non-empty, minimum length, starts with `MSH`) since both
    /// representations must reject the same malformed input.
    pub fn build_from(text: impl AsRef<str>) -> Result<Self, ElementError> {
        let text = sanitize_line_endings(text.as_ref());
        if text.is_empty() {
            return Err(ElementError::MessageDataMustNotBeNull);
        }
        if text.len() < 8 {
            return Err(ElementError::MessageDataIsTooShort);
        }
        if !text.starts_with("MSH") {
            return Err(ElementError::MessageDataMustStartWithMsh);
        }
        let encoding = Rc::new(RefCell::new(Encoding::default()));
        let mut segments = HashMap::new();
        for (i, raw) in text.split('\r').enumerate() {
            let is_msh = raw.as_bytes().get(0..3) == Some(b"MSH");
            let node = Node::from_raw(Level::Segment, Rc::clone(&encoding), is_msh, raw);
            segments.insert(i + 1, node);
        }
        Ok(Message { encoding, segments })
    }

    /// The message's current [`Encoding`], owned directly rather than
    /// re-derived from text on every call.
    pub fn encoding(&self) -> Encoding {
        *self.encoding.borrow()
    }

    /// The full message text, reassembled by joining every segment with
    /// `\r`. Escape sequences are left intact.
    pub fn value(&self) -> String {
        let max = self.segments.keys().copied().max().unwrap_or(0);
        (1..=max)
            .map(|i| {
                self.segments
                    .get(&i)
                    .and_then(Node::raw_value)
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>()
            .join("\r")
    }

    /// Number of segments currently present.
    pub fn segment_count(&self) -> usize {
        self.segments.keys().copied().max().unwrap_or(0)
    }

    /// The segment at 1-based `index` (segment 1 is always MSH). Reading
    /// a position past `segment_count` returns an empty, unattached
    /// segment node rather than `None`: the builder tree has no notion
    /// of "absent but addressable" the way the parser's lazy slices do,
    /// since every position that exists has already been materialized.
    pub fn segment(&self, index: usize) -> Node {
        self.segments
            .get(&index)
            .cloned()
            .unwrap_or_else(|| Node::empty(Level::Segment, Rc::clone(&self.encoding)))
            .with_index(index)
    }

    /// All segments currently present, in order.
    pub fn segments(&self) -> Vec<Node> {
        (1..=self.segment_count()).map(|i| self.segment(i)).collect()
    }

    /// Every segment whose type code equals `segment_type`, in order.
    pub fn segments_of_type(&self, segment_type: &str) -> Vec<Node> {
        self.segments()
            .into_iter()
            .filter(|s| s.child(0).value().as_deref() == Some(segment_type))
            .collect()
    }

    /// Every segment whose type code is one of `segment_types`, in order.
    pub fn segments_of_types(&self, segment_types: &[&str]) -> Vec<Node> {
        self.segments()
            .into_iter()
            .filter(|s| {
                s.child(0)
                    .value()
                    .is_some_and(|t| segment_types.contains(&t.as_str()))
            })
            .collect()
    }

    /// Append a new segment of type `segment_type` at the end, returning
    /// `self` so segment construction can chain.
    pub fn with_segment(mut self, segment_type: &str) -> Self {
        let is_msh = segment_type == "MSH";
        let next = self.segment_count() + 1;
        let mut node = Node::empty(Level::Segment, Rc::clone(&self.encoding));
        if is_msh {
            node = Node::msh_segment(Rc::clone(&self.encoding));
        }
        node.put(0, Some(segment_type.to_string()));
        self.segments.insert(next, node);
        self
    }

    /// Set field `field_index` of the last-appended segment, returning
    /// `self` so builder calls can chain: `Message::build().with_segment("PID").with_field(3, "A^B")`.
    pub fn with_field(mut self, field_index: usize, value: &str) -> Self {
        let last = self.segment_count();
        if let Some(seg) = self.segments.get_mut(&last) {
            seg.put(field_index, Some(value.to_string()));
        }
        self
    }

    /// Set the value at 1-based `path` (segment, then optionally field,
    /// repetition, component, subcomponent), creating any missing
    /// segment and intermediate children along the way, and return
    /// `self` so calls chain: the builder's fluent setter at every
    /// depth, e.g. `Message::build().with_value(&[2, 3, 1, 2], "B")`.
    /// A freshly created segment 1 is seeded as MSH; any other freshly
    /// created segment index starts out typeless (set its own index-0
    /// value explicitly via a further `with_value(&[n, 0], "...")` call
    /// if it isn't MSH).
    pub fn with_value(mut self, path: &[usize], value: &str) -> Self {
        assert!(!path.is_empty(), "with_value needs a non-empty path");
        let seg_index = path[0];
        let encoding = Rc::clone(&self.encoding);
        let seg = self.segments.entry(seg_index).or_insert_with(|| {
            if seg_index == 1 {
                let mut msh = Node::msh_segment(encoding);
                msh.put(0, Some("MSH".to_string()));
                msh
            } else {
                Node::empty(Level::Segment, encoding)
            }
        });
        if path.len() == 1 {
            let _ = seg.set_value(Some(value));
        } else {
            seg.set_at_path(&path[1..], value);
        }
        self
    }

    /// Descend `path` (1-based indices: segment, then optionally field,
    /// repetition, component, subcomponent) and return the value found
    /// there. A negative entry stops the descent early.
    pub fn get_value(&self, path: &[i64]) -> Option<String> {
        let (&seg, rest) = path.split_first()?;
        if seg < 0 {
            return None;
        }
        self.segment(seg as usize).get_value(rest)
    }

    /// Like [`Message::get_value`], but returns the values collection at
    /// the level the descent stops on.
    pub fn get_values(&self, path: &[i64]) -> Vec<Option<String>> {
        match path.split_first() {
            None => self.segments().iter().map(Element::value).collect(),
            Some((&seg, _)) if seg < 0 => self.segments().iter().map(Element::value).collect(),
            Some((&seg, rest)) => self.segment(seg as usize).get_values(rest),
        }
    }

    /// Escape reserved characters in `value` using this message's
    /// current `Encoding`.
    pub fn escape(&self, value: &str) -> String {
        self.encoding().escape(value).to_string()
    }

    /// Decode `\X\` escape sequences in `value` using this message's
    /// current `Encoding`.
    pub fn unescape(&self, value: &str) -> String {
        self.encoding().unescape(value).to_string()
    }

    /// Re-check the structural invariants a freshly built message always
    /// satisfies: at least one segment, and that segment is MSH.
    pub fn validate(&self) -> Result<(), ElementError> {
        if self.segments.is_empty() {
            return Err(ElementError::MessageDataMustNotBeNull);
        }
        match self.segments.get(&1) {
            Some(msh) if msh.child(0).value().as_deref() == Some("MSH") => Ok(()),
            _ => Err(ElementError::MessageDataMustStartWithMsh),
        }
    }

    /// Delete every segment of `items` as one operation: a no-op list
    /// succeeds trivially, but if any entry isn't a segment the whole
    /// call fails without deleting anything.
    pub fn delete_all(&mut self, items: Vec<Node>) -> Result<(), ElementError> {
        for item in &items {
            if item.level() != Level::Segment {
                return Err(ElementError::ElementDeleteForbidden(
                    "Message::delete_all only deletes segments; nested elements go through the segment's own delete_all"
                        .to_string(),
                ));
            }
        }
        let indices: Vec<usize> = items.iter().map(Element::index).collect();
        delete_all_children(&mut RootView(self), indices)
    }
}

/// Adapts a `&mut Message`'s segment map to [`ElementOps`] so
/// [`delete_all_children`] — written against a bare `Node` parent — can
/// also drive segment-level deletes, which have no `Node` of their own
/// to host a `HashMap` on.
struct RootView<'m>(&'m mut Message);

impl ElementOps for RootView<'_> {
    fn child_count(&self) -> usize {
        self.0.segment_count()
    }

    fn get(&self, index: usize) -> Option<String> {
        self.0.segments.get(&index).and_then(Node::raw_value)
    }

    fn put(&mut self, index: usize, value: Option<String>) {
        match value {
            Some(text) => {
                let is_msh = index == 1;
                let node = Node::from_raw(Level::Segment, Rc::clone(&self.0.encoding), is_msh, &text);
                self.0.segments.insert(index, node);
            }
            None => {
                self.0.segments.remove(&index);
            }
        }
    }

    fn protected(&self, index: usize) -> Option<&'static str> {
        if index == 1 {
            Some("the MSH segment cannot be moved or deleted")
        } else {
            None
        }
    }
}

impl ElementOps for Message {
    fn child_count(&self) -> usize {
        self.segment_count()
    }

    fn get(&self, index: usize) -> Option<String> {
        self.segments.get(&index).and_then(Node::raw_value)
    }

    fn put(&mut self, index: usize, value: Option<String>) {
        RootView(self).put(index, value);
    }

    fn protected(&self, index: usize) -> Option<&'static str> {
        RootView(self).protected(index)
    }
}

/// Normalize line endings to `\r`, matching
/// [`crate::parser::Message::parse`]'s own sanitization so the two
/// representations agree on what a segment boundary is.
fn sanitize_line_endings(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\r');
            }
            '\n' => out.push('\r'),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_seeds_a_canonical_msh() {
        let msg = Message::build();
        assert_eq!(msg.value(), "MSH|^~\\&|");
        assert_eq!(msg.segment_count(), 1);
    }

    #[test]
    fn build_from_decomposes_every_level() {
        let msg = Message::build_from("MSH|^~\\&|\rPID|1||A^B&C~D").unwrap();
        assert_eq!(msg.segment_count(), 2);
        let pid = msg.segment(2);
        assert_eq!(pid.child(3).child(1).child(2).child(1).value().as_deref(), Some("B"));
        assert_eq!(pid.child(3).child(2).value().as_deref(), Some("D"));
    }

    #[test]
    fn fluent_builder_chains_segments_and_fields() {
        let msg = Message::build().with_segment("PID").with_field(1, "1").with_field(3, "A^B");
        assert_eq!(msg.value(), "MSH|^~\\&|\rPID|1||A^B");
    }

    #[test]
    fn rejects_empty_and_short_and_non_msh_input() {
        assert_eq!(Message::build_from("").unwrap_err(), ElementError::MessageDataMustNotBeNull);
        assert_eq!(
            Message::build_from("MSH|^~").unwrap_err(),
            ElementError::MessageDataIsTooShort
        );
        assert_eq!(
            Message::build_from("PID|1|2|3|4|5").unwrap_err(),
            ElementError::MessageDataMustStartWithMsh
        );
    }

    #[test]
    fn msh_segment_cannot_be_deleted() {
        let mut msg = Message::build_from("MSH|^~\\&|\rPID|1").unwrap();
        let err = ElementOps::delete(&mut msg, 1).unwrap_err();
        assert!(matches!(err, ElementError::ElementDeleteForbidden(_)));
    }

    #[test]
    fn setting_msh_2_changes_the_live_encoding() {
        let msg = Message::build_from("MSH|^~\\&|\rPID|1||A^B").unwrap();
        let mut field2 = msg.segment(1).child(2);
        field2.set_value(Some("@*!%")).unwrap();
        assert_eq!(msg.encoding().component, '@');
        assert_eq!(msg.segment(2).value().as_deref(), Some("PID|1||A@B"));
    }

    #[test]
    fn with_value_sets_the_canonical_empty_msh() {
        let msg = Message::build().with_value(&[1, 1], "|").with_value(&[1, 2], "^~\\&");
        assert_eq!(msg.value(), "MSH|^~\\&|");
    }

    #[test]
    fn with_value_reaches_every_depth_without_disturbing_siblings() {
        let msg = Message::build()
            .with_value(&[2, 0], "PID")
            .with_value(&[2, 3, 1, 1], "A")
            .with_value(&[2, 3, 1, 2], "B")
            .with_value(&[2, 3, 2], "D");
        assert_eq!(msg.value(), "MSH|^~\\&|\rPID|||A^B~D");
    }

    #[test]
    fn clone_is_independent_of_the_original() {
        let original = Message::build_from("MSH|^~\\&|\rPID|1||A^B").unwrap();
        let mut clone = original.clone();
        assert_eq!(clone.value(), original.value());
        ElementOps::delete(&mut clone, 2).unwrap();
        assert_eq!(clone.segment_count(), 1);
        assert_eq!(original.segment_count(), 2);

        let mut field2 = clone.segment(1).child(2);
        field2.set_value(Some("@*!%")).unwrap();
        assert_eq!(clone.encoding().component, '@');
        assert_eq!(original.encoding().component, '^');
    }

    #[test]
    fn segment_index_reflects_its_position_and_drives_delete_all() {
        let mut msg = Message::build_from("MSH|^~\\&|\rOBX|1\rOBX|2\rOBX|3").unwrap();
        assert_eq!(msg.segment(2).index(), 2);
        assert_eq!(msg.segment(3).index(), 3);

        let targets = vec![msg.segment(2), msg.segment(4)];
        msg.delete_all(targets).unwrap();
        assert_eq!(msg.segment_count(), 2);
        assert_eq!(msg.segment(2).value().as_deref(), Some("OBX|2"));
    }
}
