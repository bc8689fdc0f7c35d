use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::element::Element;
use crate::encoding::Encoding;
use crate::error::ElementError;
use crate::level::Level;
use crate::ops::ElementOps;

use super::cursor::{derive_encoding, Cursor};
use crate::locate;
use super::msh::parse_msh_prefix;

/// Normalize line endings to `\r`, HL7's own segment separator: `\r\n`
/// collapses to a single `\r`, and a lone `\n` (common once a message has
/// passed through tooling that doesn't know about HL7) is treated the
/// same way.
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

/// A parsed HL7 v2 message: a lazily-sliced view over one owned string.
/// Reading never materializes more of the tree than the path asked for;
/// writing mutates the shared backing string in place, immediately
/// visible to every other [`Cursor`] still holding a path into it.
///
/// `Message` does not implement [`Element`]: it has no parent, no
/// sibling index, and cannot itself be moved or deleted, so it exposes
/// its own surface (`segments`, `this[type]`, `validate`, `escape`/
/// `unescape`) instead.
#[derive(Debug)]
pub struct Message {
    source: Rc<RefCell<String>>,
}

impl Clone for Message {
    /// A structurally independent copy: the backing text is duplicated
    /// into a fresh buffer, so mutating the clone (through it or any
    /// `Cursor` descended from it) never touches the original message.
    fn clone(&self) -> Self {
        Message {
            source: Rc::new(RefCell::new(self.source.borrow().clone())),
        }
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        *self.source.borrow() == *other.source.borrow()
    }
}

impl Eq for Message {}

impl Hash for Message {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.borrow().hash(state);
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source.borrow())
    }
}

impl Message {
    /// Parse `text` into a `Message`. Rejects empty input
    /// ([`ElementError::MessageDataMustNotBeNull`]), input shorter than
    /// the minimum possible MSH, `MSH|^~\&|` ([`ElementError::MessageDataIsTooShort`]),
    /// and input that doesn't start with the literal `MSH`
    /// ([`ElementError::MessageDataMustStartWithMsh`]). Line endings are
    /// normalized to `\r`.
    pub fn parse(text: impl Into<String>) -> Result<Self, ElementError> {
        let text = text.into();
        if text.is_empty() {
            return Err(ElementError::MessageDataMustNotBeNull);
        }
        if text.len() < 8 {
            return Err(ElementError::MessageDataIsTooShort);
        }
        if !text.starts_with("MSH") {
            return Err(ElementError::MessageDataMustStartWithMsh);
        }
        if parse_msh_prefix(&text).is_err() {
            return Err(ElementError::MessageDataIsTooShort);
        }
        Ok(Message {
            source: Rc::new(RefCell::new(sanitize_line_endings(&text))),
        })
    }

    /// The message's currently declared [`Encoding`] (MSH.1 / MSH.2),
    /// re-read from the live text on every call.
    pub fn encoding(&self) -> Encoding {
        derive_encoding(&self.source.borrow())
    }

    /// The full raw message text. Escape sequences are left intact; use
    /// [`Message::unescape`] on individual values to decode them.
    pub fn value(&self) -> String {
        self.source.borrow().clone()
    }

    /// Number of segments currently present.
    pub fn segment_count(&self) -> usize {
        locate::segment_count(&self.source.borrow())
    }

    /// The segment at 1-based `index` (segment 1 is always MSH).
    pub fn segment(&self, index: usize) -> Cursor {
        Cursor::new(Rc::clone(&self.source), vec![index], Level::Segment)
    }

    /// All segments currently present, in order.
    pub fn segments(&self) -> Vec<Cursor> {
        (1..=self.segment_count()).map(|i| self.segment(i)).collect()
    }

    /// Every segment whose type code equals `segment_type`, in order.
    pub fn segments_of_type(&self, segment_type: &str) -> Vec<Cursor> {
        self.segments()
            .into_iter()
            .filter(|s| s.child(0).value().as_deref() == Some(segment_type))
            .collect()
    }

    /// Every segment whose type code is one of `segment_types`, in order.
    pub fn segments_of_types(&self, segment_types: &[&str]) -> Vec<Cursor> {
        self.segments()
            .into_iter()
            .filter(|s| {
                s.child(0)
                    .value()
                    .is_some_and(|t| segment_types.contains(&t.as_str()))
            })
            .collect()
    }

    /// Descend `path` (1-based indices: segment, then optionally field,
    /// repetition, component, subcomponent) and return the raw
    /// (still-escaped) value found there. A negative entry stops the
    /// descent early.
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

    /// Re-check the structural invariants [`Message::parse`] enforced at
    /// construction time. Always `Ok` for a `Message` obtained through
    /// `parse`, since the public API offers no way to delete MSH or to
    /// shrink the text below the minimum length; provided for callers
    /// that want to assert it explicitly after a round of mutation.
    pub fn validate(&self) -> Result<(), ElementError> {
        let src = self.source.borrow();
        if src.is_empty() {
            return Err(ElementError::MessageDataMustNotBeNull);
        }
        if src.len() < 8 {
            return Err(ElementError::MessageDataIsTooShort);
        }
        if !src.starts_with("MSH") {
            return Err(ElementError::MessageDataMustStartWithMsh);
        }
        Ok(())
    }

    /// Delete every segment of `items` as one operation: a no-op list
    /// succeeds trivially, but if any entry isn't a segment the whole
    /// call fails without deleting anything.
    /// Blank segment `index` and, unless it's the only remaining segment,
    /// also remove the `\r` immediately before it, so `ElementOps::delete`'s
    /// final `put(max, None)` actually shrinks `segment_count` instead of
    /// leaving a trailing empty segment. Returns whether a segment was
    /// found and removed.
    fn remove_trailing_segment(&self, index: usize) -> bool {
        let mut src = self.source.borrow_mut();
        let ranges = locate::split_ranges(&src, '\r');
        let Some(slot) = ranges.get(index - 1) else {
            return false;
        };
        let start = if index > 1 { slot.start - 1 } else { slot.start };
        let end = slot.end;
        src.replace_range(start..end, "");
        true
    }

    pub fn delete_all(&mut self, mut items: Vec<Cursor>) -> Result<(), ElementError> {
        for item in &items {
            if item.level() != Level::Segment {
                return Err(ElementError::ElementDeleteForbidden(
                    "Message::delete_all only deletes segments; nested elements go through Cursor::delete_all"
                        .to_string(),
                ));
            }
        }
        items.sort_by_key(|c| std::cmp::Reverse(c.index()));
        for item in &items {
            ElementOps::delete(self, item.index())?;
        }
        Ok(())
    }
}

impl ElementOps for Message {
    fn child_count(&self) -> usize {
        self.segment_count()
    }

    fn get(&self, index: usize) -> Option<String> {
        self.segment(index).value()
    }

    fn put(&mut self, index: usize, value: Option<String>) {
        if value.is_none() && self.remove_trailing_segment(index) {
            return;
        }
        let seg = self.segment(index);
        let _ = seg.raw_set_value(value.as_deref());
    }

    fn protected(&self, index: usize) -> Option<&'static str> {
        if index == 1 {
            Some("the MSH segment cannot be moved or deleted")
        } else {
            None
        }
    }
}

/// Replace every occurrence of the current field delimiter (MSH.1) with
/// the first character of `new_value` throughout the whole message: the
/// field delimiter is used as a separator everywhere, not just at its
/// own position, so changing it is a message-wide rewrite rather than a
/// local splice.
pub(super) fn rewrite_field_delimiter(source: &Rc<RefCell<String>>, new_value: &str) -> Result<(), ElementError> {
    let mut src = source.borrow_mut();
    let old_fd = derive_encoding(&src).field;
    let new_fd = new_value.chars().next().unwrap_or(old_fd);
    if old_fd != new_fd {
        let rewritten: String = src.chars().map(|c| if c == old_fd { new_fd } else { c }).collect();
        *src = rewritten;
    }
    Ok(())
}

/// Replace each of the four current MSH.2 encoding characters
/// (component, repetition, escape, subcomponent) with the corresponding
/// character of `new_value` throughout the whole message, in a single
/// pass so the new and old alphabets never interfere with each other.
/// Any position `new_value` is too short to supply keeps its old
/// character.
pub(super) fn rewrite_encoding_characters(source: &Rc<RefCell<String>>, new_value: &str) -> Result<(), ElementError> {
    let mut src = source.borrow_mut();
    let old = derive_encoding(&src);
    let mut chars = new_value.chars();
    let new_component = chars.next().unwrap_or(old.component);
    let new_repetition = chars.next().unwrap_or(old.repetition);
    let new_escape = chars.next().unwrap_or(old.escape);
    let new_subcomponent = chars.next().unwrap_or(old.subcomponent);
    let rewritten: String = src
        .chars()
        .map(|c| {
            if c == old.component {
                new_component
            } else if c == old.repetition {
                new_repetition
            } else if c == old.escape {
                new_escape
            } else if c == old.subcomponent {
                new_subcomponent
            } else {
                c
            }
        })
        .collect();
    *src = rewritten;
    Ok(())
}
