use crate::Level;

/// The contract shared by every node of the element tree below the
/// Message root — segments, fields, repetitions, components, and
/// subcomponents — implemented identically (in behavior, not
/// necessarily in cost) by the parser's [`crate::parser::Cursor`] and the
/// builder's [`crate::builder::Node`].
///
/// `Message` itself does *not* implement `Element`: it has no parent, no
/// sibling index, and cannot be moved or deleted, so it exposes a
/// related-but-separate surface (`Segments`, `this[type]`, `Validate`,
/// `Escape`/`UnEscape`) documented on the two `*Message` types instead.
pub trait Element: Clone {
    /// The concrete type of this element's children (one level finer).
    /// Always `Self` in practice: every level down to `Subcomponent`
    /// hands back the same handle type, just tagged with the next
    /// [`Level`].
    type Child: Element;

    /// This element's 1-based position among its siblings (0 only for a
    /// segment's type-code pseudo-child, see [`Element::child`]).
    fn index(&self) -> usize;

    /// Which of the five levels this element sits at.
    fn level(&self) -> Level;

    /// The character used to split this element's own children, or
    /// `'\0'` if this is a `Subcomponent` (a leaf with no children).
    fn delimiter(&self) -> char;

    /// Number of direct children. 0 for a leaf, or for an interior
    /// element whose value is empty/absent.
    fn value_count(&self) -> usize;

    /// This element's own value: the text between the delimiters that
    /// bound it (escape sequences are **not** decoded — callers who want
    /// decoded text should route it through the message's `Encoding`).
    /// `None` marks an absent position (at or past `value_count` when
    /// read from a parent); `Some(String::new())` marks an existing but
    /// empty position.
    fn value(&self) -> Option<String>;

    /// Child element at 1-based `index`. `index == 0` is only meaningful
    /// at the `Segment` level, where it addresses the segment's 3-letter
    /// type code instead of a normal field.
    fn child(&self, index: usize) -> Self::Child;

    /// Flat collection of the direct children's values, in order. The
    /// setter half of this (spec's "Values get/set") lives on
    /// [`crate::ElementOps::set_values`], since replacing every child at
    /// once is a mutation, not a read.
    fn values(&self) -> Vec<Option<String>> {
        (1..=self.value_count())
            .map(|i| self.child(i).value())
            .collect()
    }

    /// Descend `path` (one 1-based index per level, starting at this
    /// element's own children) and return the value found there. A
    /// negative entry stops the descent early and returns the *current*
    /// element's value instead of continuing further.
    fn get_value(&self, path: &[i64]) -> Option<String> {
        match path.split_first() {
            None => self.value(),
            Some((&next, _)) if next < 0 => self.value(),
            Some((&next, rest)) => self.child(next as usize).get_value(rest),
        }
    }

    /// Like [`Element::get_value`], but returns the values collection at
    /// the level the descent stops on.
    fn get_values(&self, path: &[i64]) -> Vec<Option<String>> {
        match path.split_first() {
            None => self.values(),
            Some((&next, _)) if next < 0 => self.values(),
            Some((&next, rest)) => self.child(next as usize).get_values(rest),
        }
    }
}
