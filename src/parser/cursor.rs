use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Range;
use std::rc::Rc;

use crate::element::Element;
use crate::encoding::Encoding;
use crate::error::ElementError;
use crate::level::Level;
use crate::ops::ElementOps;

use crate::locate::{self, Located, PathLocation};
use super::msh::parse_msh_prefix;

/// Read the `Encoding` a message's own MSH.1/MSH.2 currently declare. The
/// parser tree never caches this: every delimiter-dependent operation
/// re-derives it from the live string, so a write to MSH.2 takes effect
/// for every subsequent read without any extra bookkeeping.
pub(crate) fn derive_encoding(source: &str) -> Encoding {
    parse_msh_prefix(source)
        .map(|(_, encoding)| encoding)
        .unwrap_or_default()
}

/// A lazily-sliced handle into a parsed message's backing string.
///
/// `Cursor` never stores a parent pointer. It carries only a path of
/// 1-based indices counted from the message root (segment, then
/// optionally field, repetition, component, subcomponent) plus a shared
/// reference to the backing string, so every read re-slices the current
/// text and every write mutates that same string in place. Two `Cursor`s
/// built from the same path are simply two handles onto the same logical
/// position; neither owns it.
pub struct Cursor {
    pub(super) source: Rc<RefCell<String>>,
    pub(super) path: Vec<usize>,
    level: Level,
    cache: RefCell<HashMap<usize, Cursor>>,
}

impl Clone for Cursor {
    /// A structurally independent copy, matching [`Element`]'s "deep
    /// copy, independent of source" contract: the *entire* backing
    /// message text is duplicated into a fresh buffer (not just this
    /// element's own slice), so mutating the clone through it, or any
    /// cursor descended from it, never touches the original message.
    fn clone(&self) -> Self {
        Cursor {
            source: Rc::new(RefCell::new(self.source.borrow().clone())),
            path: self.path.clone(),
            level: self.level,
            cache: RefCell::new(HashMap::new()),
        }
    }
}

impl Cursor {
    pub(super) fn new(source: Rc<RefCell<String>>, path: Vec<usize>, level: Level) -> Self {
        Cursor {
            source,
            path,
            level,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// A cheap handle duplicate sharing this cursor's own backing
    /// string — unlike [`Clone`], which deep-copies the whole document.
    /// Used only internally, to hand out cached child handles and fresh
    /// same-document handles without pretending to the independence
    /// [`Element::clone`] promises.
    fn share(&self) -> Self {
        Cursor {
            source: Rc::clone(&self.source),
            path: self.path.clone(),
            level: self.level,
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn encoding(&self) -> Encoding {
        derive_encoding(&self.source.borrow())
    }

    fn is_msh(&self) -> bool {
        let src = self.source.borrow();
        match locate::locate_segment(&src, self.path[0]) {
            Located::Present(r) => src[r].as_bytes().get(0..3) == Some(b"MSH"),
            Located::Absent { .. } => false,
        }
    }

    fn self_range(&self, source: &str, encoding: &Encoding) -> Option<Range<usize>> {
        match locate::locate_path(source, encoding, &self.path) {
            PathLocation::Present(r) => Some(r),
            _ => None,
        }
    }

    /// Write this element's value directly, with no `protected` check:
    /// the generic insert/delete/move machinery in [`crate::ops`] already
    /// checks that before ever calling [`ElementOps::put`], which is the
    /// only other caller of this. Missing ancestors are materialized
    /// (as empty, recursively) before the target position is touched, so
    /// a write to a position five levels deep on a freshly-parsed message
    /// still only takes one call.
    pub(super) fn raw_set_value(&self, value: Option<&str>) -> Result<(), ElementError> {
        loop {
            let encoding = self.encoding();
            let loc = {
                let src = self.source.borrow();
                locate::locate_path(&src, &encoding, &self.path)
            };
            match loc {
                PathLocation::Present(range) => {
                    let mut src = self.source.borrow_mut();
                    src.replace_range(range, value.unwrap_or(""));
                    drop(src);
                    self.cache.borrow_mut().clear();
                    return Ok(());
                }
                PathLocation::Absent(Located::Absent {
                    at,
                    missing_delims,
                    delim,
                }) => {
                    let mut splice = String::new();
                    for _ in 0..missing_delims {
                        splice.push(delim);
                    }
                    if let Some(v) = value {
                        splice.push_str(v);
                    }
                    let mut src = self.source.borrow_mut();
                    src.insert_str(at, &splice);
                    drop(src);
                    self.cache.borrow_mut().clear();
                    return Ok(());
                }
                PathLocation::Absent(Located::Present(_)) => unreachable!(
                    "locate_path only ever wraps the Absent variant of Located in PathLocation::Absent"
                ),
                PathLocation::MissingAncestor(i) => {
                    let ancestor_path = self.path[..=i].to_vec();
                    let ancestor_level = Level::for_path_len(ancestor_path.len());
                    let ancestor = Cursor::new(Rc::clone(&self.source), ancestor_path, ancestor_level);
                    ancestor.raw_set_value(Some(""))?;
                    // loop again: the ancestor now exists, retry from scratch
                }
            }
        }
    }

    /// Blank the last remaining slot at 1-based `index` (one of this
    /// element's own children) and, unless it is the sole slot, remove
    /// the delimiter immediately before it too. `ElementOps::delete`
    /// always calls `put(max, None)` as its final step, after shifting
    /// every higher value down into place, so `index` here is always the
    /// element's current highest child; erasing only the slot's text and
    /// not its leading delimiter would leave a dangling empty slot behind
    /// instead of actually shrinking the child count. Returns whether a
    /// slot was found and removed.
    fn remove_trailing_slot(&self, index: usize) -> bool {
        let encoding = self.encoding();
        let mut src = self.source.borrow_mut();
        let Some(self_range) = self.self_range(&src, &encoding) else {
            return false;
        };
        if self.level == Level::Segment {
            let layout = locate::field_layout(&src, &self_range, &encoding);
            let remainder_index = if layout.is_msh { index.saturating_sub(2) } else { index };
            if remainder_index == 0 {
                return false;
            }
            let ranges = locate::split_ranges(layout.remainder, encoding.field);
            let Some(slot) = ranges.get(remainder_index - 1) else {
                return false;
            };
            let abs_start = layout.remainder_start + slot.start;
            let abs_end = layout.remainder_start + slot.end;
            let start = if remainder_index > 1 { abs_start - encoding.field.len_utf8() } else { abs_start };
            src.replace_range(start..abs_end, "");
            return true;
        }
        let delim = self.level.delimiter(&encoding);
        let ranges = locate::split_ranges(&src[self_range.clone()], delim);
        let Some(slot) = ranges.get(index - 1) else {
            return false;
        };
        let abs_start = self_range.start + slot.start;
        let abs_end = self_range.start + slot.end;
        let start = if index > 1 { abs_start - delim.len_utf8() } else { abs_start };
        src.replace_range(start..abs_end, "");
        true
    }

    /// Set this element's value. MSH.1 and MSH.2 are routed through the
    /// whole-message delimiter rewrite they require (see
    /// [`super::message::rewrite_field_delimiter`] and
    /// [`super::message::rewrite_encoding_characters`]) instead of a
    /// local splice, since both are used as separators everywhere in the
    /// message, not just at their own position.
    pub fn set_value(&self, value: Option<&str>) -> Result<(), ElementError> {
        if self.level == Level::Field && self.path.len() == 2 && self.is_msh() {
            if self.path[1] == 1 {
                return super::message::rewrite_field_delimiter(&self.source, value.unwrap_or_default());
            }
            if self.path[1] == 2 {
                return super::message::rewrite_encoding_characters(&self.source, value.unwrap_or_default());
            }
        }
        self.raw_set_value(value)
    }

    /// Delete every element of `items` as one operation: they must all
    /// share the same immediate parent, or the whole call fails without
    /// deleting anything.
    pub fn delete_all(mut items: Vec<Cursor>) -> Result<(), ElementError> {
        let Some(first) = items.first() else {
            return Ok(());
        };
        if first.path.is_empty() {
            return Err(ElementError::ElementDeleteForbidden(
                "the message root cannot be deleted".to_string(),
            ));
        }
        let parent_path = first.path[..first.path.len() - 1].to_vec();
        for item in &items {
            let same_parent = item.path.len() == parent_path.len() + 1
                && item.path[..parent_path.len()] == parent_path[..];
            if !same_parent {
                return Err(ElementError::ElementDeleteForbidden(
                    "all elements passed to delete_all must share the same parent".to_string(),
                ));
            }
        }
        if parent_path.is_empty() {
            return Err(ElementError::ElementDeleteForbidden(
                "bulk-deleting segments goes through Message::delete_all, not Cursor::delete_all".to_string(),
            ));
        }
        items.sort_by_key(|c| std::cmp::Reverse(*c.path.last().unwrap()));
        for item in &items {
            let mut parent = Cursor::new(
                Rc::clone(&item.source),
                parent_path.clone(),
                Level::for_path_len(parent_path.len()),
            );
            parent.delete(*item.path.last().unwrap())?;
        }
        Ok(())
    }
}

impl Element for Cursor {
    type Child = Cursor;

    fn index(&self) -> usize {
        *self.path.last().unwrap_or(&0)
    }

    fn level(&self) -> Level {
        self.level
    }

    fn delimiter(&self) -> char {
        self.level.delimiter(&self.encoding())
    }

    fn value_count(&self) -> usize {
        if self.level.is_leaf() {
            return 0;
        }
        let encoding = self.encoding();
        let src = self.source.borrow();
        match self.level {
            Level::Segment => match self.self_range(&src, &encoding) {
                Some(r) => locate::field_count(&src, &r, &encoding),
                None => 0,
            },
            _ => match self.self_range(&src, &encoding) {
                Some(r) => locate::level_count(&src[r], self.delimiter()),
                None => 0,
            },
        }
    }

    fn value(&self) -> Option<String> {
        let encoding = self.encoding();
        let src = self.source.borrow();
        self.self_range(&src, &encoding).map(|r| src[r].to_string())
    }

    fn child(&self, index: usize) -> Cursor {
        if let Some(cached) = self.cache.borrow().get(&index) {
            return cached.share();
        }
        let child_level = self.level.child().unwrap_or(self.level);
        let mut path = self.path.clone();
        path.push(index);
        let cursor = Cursor::new(Rc::clone(&self.source), path, child_level);
        self.cache.borrow_mut().insert(index, cursor.share());
        cursor
    }
}

impl ElementOps for Cursor {
    fn child_count(&self) -> usize {
        Element::value_count(self)
    }

    fn get(&self, index: usize) -> Option<String> {
        self.child(index).value()
    }

    fn put(&mut self, index: usize, value: Option<String>) {
        if self.level == Level::Segment && self.is_msh() && (index == 1 || index == 2) {
            // `set_values` (unlike `insert`/`delete`/`move_to`) deliberately
            // bypasses `protected`, so MSH.1/MSH.2 can still reach here
            // through a plain bulk set. Route them the same way
            // `Cursor::set_value` does instead of falling through to
            // `raw_set_value`, which would overwrite their text directly
            // without rewriting the delimiters they define everywhere else.
            let text = value.unwrap_or_default();
            let _ = self.child(index).set_value(Some(&text));
            self.cache.borrow_mut().clear();
            return;
        }
        if value.is_none() && self.remove_trailing_slot(index) {
            self.cache.borrow_mut().clear();
            return;
        }
        let child = self.child(index);
        // `child`'s own value write is what actually mutates the shared
        // string; this Cursor's index/protected checks already happened
        // in the default `insert`/`delete`/`move_to` methods before
        // `put` was ever called.
        let _ = child.raw_set_value(value.as_deref());
        self.cache.borrow_mut().clear();
    }

    fn protected(&self, index: usize) -> Option<&'static str> {
        if self.level == Level::Segment && index == 0 {
            return Some("a segment's type code cannot be moved or deleted");
        }
        if self.level == Level::Segment && self.is_msh() && (index == 1 || index == 2) {
            return Some("MSH.1 and MSH.2 are fixed fields and cannot be moved or deleted");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Message;

    fn sample() -> Message {
        Message::parse("MSH|^~\\&|\rPID|1||A^B&C~D").unwrap()
    }

    #[test]
    fn reads_descend_through_every_level() {
        let msg = sample();
        let pid = msg.segment(2);
        assert_eq!(pid.value().as_deref(), Some("PID|1||A^B&C~D"));
        assert_eq!(pid.child(3).child(1).child(2).child(1).value().as_deref(), Some("B"));
        assert_eq!(pid.child(3).child(1).child(2).child(2).value().as_deref(), Some("C"));
        assert_eq!(pid.child(3).child(2).value().as_deref(), Some("D"));
    }

    #[test]
    fn writing_past_the_end_extends_with_delimiters() {
        let msg = sample();
        let pid = msg.segment(2);
        pid.child(5).set_value(Some("X")).unwrap();
        assert_eq!(pid.value().as_deref(), Some("PID|1||A^B&C~D||X"));
    }

    #[test]
    fn writing_a_field_on_a_missing_segment_materializes_ancestors() {
        let msg = sample();
        let field = msg.segment(4).child(2);
        field.set_value(Some("hi")).unwrap();
        assert_eq!(msg.segment(3).value().as_deref(), Some(""));
        // field 1 of the new segment 4 is also absent, so writing field 2
        // needs a delimiter for the type-code/field-1 boundary *and* one
        // for the field-1/field-2 boundary: two pipes, not one.
        assert_eq!(msg.segment(4).value().as_deref(), Some("||hi"));
    }

    #[test]
    fn type_code_is_protected() {
        let msg = sample();
        let mut msh = msg.segment(1);
        let err = ElementOps::delete(&mut msh, 0).unwrap_err();
        assert!(matches!(err, ElementError::ElementDeleteForbidden(_)));
    }

    #[test]
    fn msh_fixed_fields_are_protected_from_move_but_not_from_set() {
        let msg = sample();
        let mut msh = msg.segment(1);
        let err = ElementOps::move_to(&mut msh, 1, 5).unwrap_err();
        assert!(matches!(err, ElementError::ElementMoveForbidden(_)));

        let field2 = msh.child(2);
        field2.set_value(Some("@*!%")).unwrap();
        assert_eq!(field2.value().as_deref(), Some("@*!%"));
    }

    #[test]
    fn set_values_on_the_msh_segment_still_rewrites_delimiters_not_raw_text() {
        let msg = sample();
        let mut msh = msg.segment(1);
        // MSH.2 reassigns the four encoding characters message-wide;
        // routed through `set_values` (which bypasses `protected`) it must
        // still take the dedicated rewrite path, not a raw text splice.
        msh.set_values(["|", "@*!%"]).unwrap();
        assert_eq!(msg.encoding().component, '@');
        assert_eq!(msg.segment(2).value().as_deref(), Some("PID|1||A@B%C*D"));
    }
}
