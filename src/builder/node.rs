use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::element::Element;
use crate::encoding::Encoding;
use crate::error::ElementError;
use crate::level::Level;
use crate::ops::ElementOps;

/// One node of a built (rather than parsed) HL7 element tree: a sparse
/// `HashMap<usize, Node>` of children, tagged with the [`Level`] it sits
/// at. Where the teacher's builder split this into four separate
/// per-level structs (`SegmentBuilder`, `FieldBuilder`, `RepeatBuilder`,
/// `ComponentBuilder`), one recursive type does the same job here: every
/// level down to `Component` owns a sparse child map, and a
/// `Subcomponent` (the one genuine leaf) owns a literal string instead.
///
/// A `Node`'s own value is never stored directly (except at the leaf) —
/// it is always re-serialized by joining its children with its level's
/// delimiter, empty string for any gap. This mirrors the teacher's
/// `Display` impls, which did the same joining one level at a time.
pub struct Node {
    /// This node's own 1-based position among its siblings (0 for a
    /// segment's type-code pseudo-child), stamped on whenever a node is
    /// handed out through [`Node::child`] or
    /// [`super::message::Message::segment`] — the only two places that
    /// actually know where a node sits, since a bare `Node` otherwise
    /// carries no parent pointer.
    index: usize,
    level: Level,
    encoding: Rc<RefCell<Encoding>>,
    /// Segment-level only: whether this is the MSH segment, whose
    /// fields 1 and 2 are special (the field delimiter itself, and the
    /// four MSH-2 encoding characters) and are read from / written to
    /// `encoding` directly rather than stored as ordinary children.
    is_msh: bool,
    /// Set only on a `Node` returned by `child(1)`/`child(2)` of an MSH
    /// segment: `1` for the field delimiter, `2` for the four MSH-2
    /// encoding characters. Such a node has no children of its own —
    /// every read and write routes straight through `encoding` — so it
    /// stays a live view rather than a snapshot copy.
    msh_role: Option<u8>,
    /// Whether this node is the actual decomposition of a value that
    /// exists at its position (even an empty one), as opposed to a
    /// placeholder `Node::empty` handed out for a position past the
    /// parent's current content. An interior node's own `children` being
    /// empty is ambiguous on its own — it's also what an existing-but-
    /// blank field looks like — so this flag is what [`Node::raw_value`]
    /// actually consults to tell "empty" from "absent" apart, mirroring
    /// [`crate::parser::Cursor`], which answers the same question by
    /// re-locating the slice in the backing string instead.
    present: bool,
    leaf_value: Option<String>,
    children: HashMap<usize, Node>,
}

impl Clone for Node {
    fn clone(&self) -> Self {
        Node {
            index: self.index,
            level: self.level,
            encoding: Rc::clone(&self.encoding),
            is_msh: self.is_msh,
            msh_role: self.msh_role,
            present: self.present,
            leaf_value: self.leaf_value.clone(),
            children: self.children.clone(),
        }
    }
}

impl Node {
    /// A structurally independent copy of this subtree, rebound to
    /// `encoding` instead of sharing this node's own `Encoding` `Rc`.
    /// Plain [`Clone`] shares `encoding` with the source (correct for
    /// [`Node::child`], which hands out subtrees still attached to the
    /// live message), so it alone can't give a cloned *message* its own
    /// delimiters independent of the original's — only
    /// [`super::message::Message::clone`] needs that, and does it by
    /// calling this on every top-level segment with a freshly cloned
    /// `Encoding`.
    pub(crate) fn deep_clone(&self, encoding: &Rc<RefCell<Encoding>>) -> Node {
        Node {
            index: self.index,
            level: self.level,
            encoding: Rc::clone(encoding),
            is_msh: self.is_msh,
            msh_role: self.msh_role,
            present: self.present,
            leaf_value: self.leaf_value.clone(),
            children: self
                .children
                .iter()
                .map(|(&i, child)| (i, child.deep_clone(encoding)))
                .collect(),
        }
    }

    pub(crate) fn empty(level: Level, encoding: Rc<RefCell<Encoding>>) -> Self {
        Node {
            index: 0,
            level,
            encoding,
            is_msh: false,
            msh_role: None,
            present: false,
            leaf_value: None,
            children: HashMap::new(),
        }
    }

    pub(crate) fn msh_segment(encoding: Rc<RefCell<Encoding>>) -> Self {
        Node {
            is_msh: true,
            present: true,
            ..Node::empty(Level::Segment, encoding)
        }
    }

    fn msh_field_view(encoding: Rc<RefCell<Encoding>>, role: u8) -> Self {
        Node {
            msh_role: Some(role),
            present: true,
            ..Node::empty(Level::Field, encoding)
        }
    }

    /// Fully decompose `raw` (the text of one element at `level`) into a
    /// materialized subtree, the way `Message::build(text)` seeds its
    /// whole tree up front.
    pub(crate) fn from_raw(level: Level, encoding: Rc<RefCell<Encoding>>, is_msh: bool, raw: &str) -> Self {
        if level.is_leaf() {
            return Node {
                index: 0,
                level,
                encoding,
                is_msh: false,
                msh_role: None,
                present: true,
                leaf_value: Some(raw.to_string()),
                children: HashMap::new(),
            };
        }
        let mut node = Node {
            index: 0,
            level,
            encoding: Rc::clone(&encoding),
            is_msh,
            msh_role: None,
            present: true,
            leaf_value: None,
            children: HashMap::new(),
        };
        if raw.is_empty() {
            return node;
        }
        if level == Level::Segment {
            if is_msh {
                node.seed_msh_fields(raw);
            } else {
                node.seed_segment_fields(raw);
            }
            return node;
        }
        let current = node.current_encoding();
        let delim = level.delimiter(&current);
        let child_level = level.child().expect("non-leaf level always has a child level");
        for (i, piece) in raw.split(delim).enumerate() {
            node.children
                .insert(i + 1, Node::from_raw(child_level, Rc::clone(&encoding), false, piece));
        }
        node
    }

    /// Decompose a raw MSH segment (`MSH|^~\&|field3|...`) into its
    /// type-code child, the fixed MSH.1/MSH.2 encoding it implies, and
    /// the ordinary fields from index 3 on. The field delimiter and the
    /// four encoding characters sit at fixed byte offsets right after
    /// the type code, so they are read directly rather than through
    /// [`crate::locate`] (which works over a whole message's backing
    /// string, not a standalone segment's text).
    fn seed_msh_fields(&mut self, raw: &str) {
        let bytes = raw.as_bytes();
        self.children
            .insert(0, Node::from_raw(Level::Field, Rc::clone(&self.encoding), false, "MSH"));
        if bytes.len() <= 3 {
            return;
        }
        let field_delim = raw[3..].chars().next().unwrap_or('|');
        let after_delim = &raw[3 + field_delim.len_utf8()..];
        let msh2: String = after_delim.chars().take(4).collect();
        *self.encoding.borrow_mut() = Encoding::from_msh2(field_delim, &msh2);
        let msh2_len: usize = msh2.chars().map(char::len_utf8).sum();
        let remainder_start = 3 + field_delim.len_utf8() + msh2_len;
        let remainder = raw.get(remainder_start..).unwrap_or("");
        let remainder = remainder.strip_prefix(field_delim).unwrap_or(remainder);
        if remainder.is_empty() {
            return;
        }
        for (i, piece) in remainder.split(field_delim).enumerate() {
            self.children.insert(
                i + 3,
                Node::from_raw(Level::Field, Rc::clone(&self.encoding), false, piece),
            );
        }
    }

    /// Decompose a raw non-MSH segment (`PID|1||A^B&C~D`) into its
    /// type-code child at index 0 and its ordinary fields from index 1,
    /// the same type-code/field split [`Node::seed_msh_fields`] does for
    /// MSH, minus MSH's fixed encoding fields.
    fn seed_segment_fields(&mut self, raw: &str) {
        let code_len = raw.len().min(3);
        self.children.insert(
            0,
            Node::from_raw(Level::Field, Rc::clone(&self.encoding), false, &raw[..code_len]),
        );
        let field_delim = self.current_encoding().field;
        let rest = raw.get(code_len..).unwrap_or("");
        let rest = rest.strip_prefix(field_delim).unwrap_or(rest);
        if rest.is_empty() {
            return;
        }
        for (i, piece) in rest.split(field_delim).enumerate() {
            self.children
                .insert(i + 1, Node::from_raw(Level::Field, Rc::clone(&self.encoding), false, piece));
        }
    }

    /// Stamp this node's 1-based sibling position. Called by
    /// [`super::message::Message::segment`], the other place (besides
    /// [`Node::child`]) that hands out a `Node` whose position is known
    /// from context the node itself doesn't carry.
    pub(crate) fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    fn current_encoding(&self) -> Encoding {
        *self.encoding.borrow()
    }

    fn own_delimiter(&self) -> char {
        self.level.delimiter(&self.current_encoding())
    }

    fn max_child_index(&self) -> usize {
        self.children.keys().copied().max().unwrap_or(0)
    }

    fn child_value(&self, index: usize) -> String {
        self.children
            .get(&index)
            .and_then(Node::raw_value)
            .unwrap_or_default()
    }

    /// This node's own re-serialized value, or `None` if it was never
    /// actually decomposed at this position (`present` is false — see the
    /// field doc) / no leaf text (a subcomponent) — the same "absent"
    /// meaning the parser tree gives an empty slice. Note this is *not*
    /// the same test as "no children": a present-but-empty interior field
    /// also has no children, yet must still report `Some(String::new())`.
    pub(crate) fn raw_value(&self) -> Option<String> {
        if let Some(role) = self.msh_role {
            let encoding = self.current_encoding();
            return Some(if role == 1 { encoding.field.to_string() } else { encoding.msh2() });
        }
        if self.level.is_leaf() {
            return self.leaf_value.clone();
        }
        if self.level == Level::Segment && self.is_msh {
            return Some(self.render_msh());
        }
        if !self.present {
            return None;
        }
        if self.level == Level::Segment {
            return Some(self.render_segment());
        }
        let delim = self.own_delimiter();
        let max = self.max_child_index();
        let parts: Vec<String> = (1..=max).map(|i| self.child_value(i)).collect();
        Some(parts.join(&delim.to_string()))
    }

    /// Join a non-MSH segment's type code (index 0) and its ordinary
    /// fields (1..=max) with the field delimiter, the non-MSH
    /// counterpart of [`Node::render_msh`].
    fn render_segment(&self) -> String {
        let delim = self.current_encoding().field;
        let mut out = self.child_value(0);
        for i in 1..=self.max_child_index() {
            out.push(delim);
            out.push_str(&self.child_value(i));
        }
        out
    }

    fn render_msh(&self) -> String {
        let encoding = self.current_encoding();
        let type_code = self.child_value(0);
        let max = self.max_child_index().max(2);
        let mut out = format!("{type_code}{}{}", encoding.field, encoding.msh2());
        for i in 3..=max {
            out.push(encoding.field);
            out.push_str(&self.child_value(i));
        }
        out
    }

    /// Set this node's own value by clearing any existing children and
    /// fully re-decomposing `text`, so a subsequent `child(i)` reflects
    /// the new content immediately (builder trees are eagerly
    /// materialized all the way to `Subcomponent`, never lazily).
    pub(crate) fn set_raw_value(&mut self, text: Option<&str>) {
        self.present = text.is_some();
        if self.level.is_leaf() {
            self.leaf_value = text.map(str::to_string);
            return;
        }
        self.children.clear();
        if let Some(text) = text {
            let seeded = Node::from_raw(self.level, Rc::clone(&self.encoding), self.is_msh, text);
            self.children = seeded.children;
        }
    }

    /// Set the value at 1-based `path` (one index per level below this
    /// node), creating any missing intermediate children along the way
    /// without disturbing their existing siblings — unlike
    /// [`Node::set_raw_value`], which replaces this node's *entire*
    /// child set at once. Backs [`super::message::Message::with_value`],
    /// the builder's fluent setter "at every depth".
    pub(crate) fn set_at_path(&mut self, path: &[usize], value: &str) {
        self.present = true;
        let (&index, rest) = path.split_first().expect("set_at_path needs a non-empty path");
        if rest.is_empty() {
            self.put(index, Some(value.to_string()));
            return;
        }
        if self.level == Level::Segment && self.is_msh && (index == 1 || index == 2) {
            self.put(index, Some(value.to_string()));
            return;
        }
        let child_level = self.level.child().unwrap_or(self.level);
        let encoding = Rc::clone(&self.encoding);
        self.children
            .entry(index)
            .or_insert_with(|| Node::empty(child_level, encoding))
            .set_at_path(rest, value);
    }

    /// Set this element's value. A node returned by `child(1)`/`child(2)`
    /// of an MSH segment rewrites the shared `Encoding` in place instead
    /// of storing the text as an ordinary child, mirroring
    /// [`crate::parser::Cursor::set_value`]'s MSH.1/MSH.2 special case —
    /// except here there is no backing string to rewrite, since every
    /// other node already reads its delimiter from the same `Encoding`.
    pub fn set_value(&mut self, value: Option<&str>) -> Result<(), ElementError> {
        if let Some(role) = self.msh_role {
            let mut encoding = self.encoding.borrow_mut();
            let text = value.unwrap_or_default();
            let mut chars = text.chars();
            if role == 1 {
                encoding.field = chars.next().unwrap_or(encoding.field);
            } else {
                encoding.component = chars.next().unwrap_or(encoding.component);
                encoding.repetition = chars.next().unwrap_or(encoding.repetition);
                encoding.escape = chars.next().unwrap_or(encoding.escape);
                encoding.subcomponent = chars.next().unwrap_or(encoding.subcomponent);
            }
            return Ok(());
        }
        self.set_raw_value(value);
        Ok(())
    }
}

impl Element for Node {
    type Child = Node;

    fn index(&self) -> usize {
        self.index
    }

    fn level(&self) -> Level {
        self.level
    }

    fn delimiter(&self) -> char {
        self.own_delimiter()
    }

    fn value_count(&self) -> usize {
        if self.level.is_leaf() {
            return 0;
        }
        if self.level == Level::Segment && self.is_msh {
            return self.max_child_index().max(2);
        }
        if self.children.is_empty() {
            0
        } else {
            self.max_child_index()
        }
    }

    fn value(&self) -> Option<String> {
        self.raw_value()
    }

    fn child(&self, index: usize) -> Node {
        let mut child = if self.level == Level::Segment && self.is_msh && (index == 1 || index == 2) {
            Node::msh_field_view(Rc::clone(&self.encoding), index as u8)
        } else if let Some(existing) = self.children.get(&index) {
            existing.clone()
        } else {
            let child_level = self.level.child().unwrap_or(self.level);
            Node::empty(child_level, Rc::clone(&self.encoding))
        };
        child.index = index;
        child
    }
}

impl ElementOps for Node {
    fn child_count(&self) -> usize {
        Element::value_count(self)
    }

    fn get(&self, index: usize) -> Option<String> {
        if self.level == Level::Segment && self.is_msh && (index == 1 || index == 2) {
            let encoding = self.current_encoding();
            return Some(if index == 1 {
                encoding.field.to_string()
            } else {
                encoding.msh2()
            });
        }
        self.children.get(&index).and_then(Node::raw_value)
    }

    fn put(&mut self, index: usize, value: Option<String>) {
        if self.level == Level::Segment && self.is_msh && (index == 1 || index == 2) {
            let mut encoding = self.encoding.borrow_mut();
            let text = value.unwrap_or_default();
            let mut chars = text.chars();
            if index == 1 {
                encoding.field = chars.next().unwrap_or(encoding.field);
            } else {
                encoding.component = chars.next().unwrap_or(encoding.component);
                encoding.repetition = chars.next().unwrap_or(encoding.repetition);
                encoding.escape = chars.next().unwrap_or(encoding.escape);
                encoding.subcomponent = chars.next().unwrap_or(encoding.subcomponent);
            }
            return;
        }
        match value {
            Some(text) => {
                let child_level = self.level.child().unwrap_or(self.level);
                self.children
                    .insert(index, Node::from_raw(child_level, Rc::clone(&self.encoding), false, &text));
            }
            None => {
                self.children.remove(&index);
            }
        }
    }

    fn protected(&self, index: usize) -> Option<&'static str> {
        if self.level == Level::Segment && index == 0 {
            return Some("a segment's type code cannot be moved or deleted");
        }
        if self.level == Level::Segment && self.is_msh && (index == 1 || index == 2) {
            return Some("MSH.1 and MSH.2 are fixed fields and cannot be moved or deleted");
        }
        None
    }
}

/// Delete every element of `items` as one operation: they must all share
/// the same parent. Generic over [`ElementOps`] so both a `Node` parent
/// and the builder `Message`'s segment map (which has no `Node` of its
/// own to host a child `HashMap` on) can share the same shift-and-delete
/// sequencing.
pub(crate) fn delete_all_children<T: ElementOps>(parent: &mut T, mut indices: Vec<usize>) -> Result<(), ElementError> {
    indices.sort_unstable_by_key(|i| std::cmp::Reverse(*i));
    indices.dedup();
    for index in indices {
        parent.delete(index)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_encoding() -> Rc<RefCell<Encoding>> {
        Rc::new(RefCell::new(Encoding::default()))
    }

    #[test]
    fn fluent_sets_materialize_down_to_subcomponent() {
        let mut field = Node::empty(Level::Field, default_encoding());
        let mut rep = Node::empty(Level::Repetition, Rc::clone(&field.encoding));
        rep.set_raw_value(Some("A^B&C"));
        field.children.insert(1, rep);
        assert_eq!(field.value().as_deref(), Some("A^B&C"));
        assert_eq!(field.child(1).child(2).child(1).value().as_deref(), Some("B"));
        assert_eq!(field.child(1).child(2).child(2).value().as_deref(), Some("C"));
    }

    #[test]
    fn from_raw_decomposes_every_level() {
        let encoding = default_encoding();
        let node = Node::from_raw(Level::Field, encoding, false, "A^B&C~D");
        assert_eq!(node.value_count(), 2);
        assert_eq!(node.child(1).value().as_deref(), Some("A^B&C"));
        assert_eq!(node.child(1).child(2).child(1).value().as_deref(), Some("B"));
        assert_eq!(node.child(2).value().as_deref(), Some("D"));
    }

    #[test]
    fn msh_segment_renders_fixed_fields_from_encoding() {
        let encoding = default_encoding();
        let mut msh = Node::msh_segment(Rc::clone(&encoding));
        msh.put(0, Some("MSH".to_string()));
        msh.put(3, Some("SendApp".to_string()));
        assert_eq!(msh.value().as_deref(), Some("MSH|^~\\&|SendApp"));
    }

    #[test]
    fn an_msh_fields_repetitions_and_components_nest_properly() {
        let encoding = default_encoding();
        let raw = "MSH|^~\\&|SendApp|SendFac|RecvApp|RecvFac|20010101||ADT^A01~ADT^A04";
        let msh = Node::from_raw(Level::Segment, encoding, true, raw);
        let field9 = msh.child(9);
        assert_eq!(field9.level(), Level::Field);
        assert_eq!(field9.child(1).level(), Level::Repetition);
        assert_eq!(field9.child(1).child(1).value().as_deref(), Some("ADT"));
        assert_eq!(field9.child(1).child(2).value().as_deref(), Some("A01"));
        assert_eq!(field9.child(2).child(2).value().as_deref(), Some("A04"));
    }

    #[test]
    fn msh_fixed_fields_are_protected() {
        let encoding = default_encoding();
        let mut msh = Node::msh_segment(encoding);
        let err = msh.delete(1).unwrap_err();
        assert!(matches!(err, ElementError::ElementDeleteForbidden(_)));
    }

    #[test]
    fn an_existing_empty_field_reads_back_present_not_absent() {
        let encoding = default_encoding();
        let pid = Node::from_raw(Level::Segment, encoding, false, "PID|1||A");
        assert_eq!(pid.value_count(), 3);
        assert_eq!(pid.child(1).value().as_deref(), Some("1"));
        assert_eq!(pid.child(2).value().as_deref(), Some(""));
        assert_eq!(pid.child(3).value().as_deref(), Some("A"));
        assert_eq!(pid.child(4).value(), None);
    }

    #[test]
    fn set_values_replaces_every_child_at_once() {
        let encoding = default_encoding();
        let mut node = Node::from_raw(Level::Field, encoding, false, "A~B~C");
        node.set_values(["X", "Y"]).unwrap();
        assert_eq!(node.value().as_deref(), Some("X~Y"));
    }

    #[test]
    fn setting_msh_2_through_a_child_view_changes_the_shared_encoding() {
        let encoding = default_encoding();
        let mut msh = Node::msh_segment(Rc::clone(&encoding));
        msh.put(0, Some("MSH".to_string()));
        msh.put(3, Some("SendApp".to_string()));
        let mut field2 = msh.child(2);
        field2.set_value(Some("@*!%")).unwrap();
        assert_eq!(encoding.borrow().component, '@');
        assert_eq!(msh.value().as_deref(), Some("MSH|@*!%|SendApp"));
    }
}
