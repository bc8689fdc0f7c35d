use crate::error::ElementError;

/// The primitives a parent element needs in order to support
/// insert/delete/move/add-range, shared identically by the parser tree's
/// [`crate::parser::Cursor`] parents and the builder tree's
/// [`crate::builder::Node`] parents.
///
/// `insert`, `delete`, `move_to`, and `add_range` are default methods
/// written once against `child_count`/`get`/`put`/`protected`, so the
/// shift-and-splice algorithm only exists in one place; each
/// representation only has to say how to read, write, and protect a
/// single 1-based position.
pub trait ElementOps {
    /// Number of direct children currently present.
    fn child_count(&self) -> usize;

    /// The value at 1-based `index`, or `None` if that position is absent
    /// (beyond `child_count`).
    fn get(&self, index: usize) -> Option<String>;

    /// Overwrite the 1-based `index` position in place. `Some(value)`
    /// sets (or, past the current end, extends the parent up to and
    /// including `index`); `None` deletes that single position without
    /// shifting anything else.
    fn put(&mut self, index: usize, value: Option<String>);

    /// Whether 1-based `index` is a protected position that cannot be
    /// moved or deleted through the generic path (MSH.1, MSH.2, or a
    /// segment's type code). Returns a short description used in the
    /// resulting error, or `None` if `index` is unprotected.
    fn protected(&self, index: usize) -> Option<&'static str> {
        let _ = index;
        None
    }

    /// Insert `value` at 1-based `index`, shifting any existing
    /// `index..=child_count` up by one first.
    fn insert(&mut self, index: usize, value: &str) -> Result<(), ElementError> {
        if let Some(why) = self.protected(index) {
            return Err(ElementError::ElementMoveForbidden(why.to_string()));
        }
        let max = self.child_count();
        if index <= max {
            for i in (index..=max).rev() {
                let v = self.get(i);
                self.put(i + 1, v);
            }
        }
        self.put(index, Some(value.to_string()));
        Ok(())
    }

    /// Delete the element at 1-based `index`, shifting
    /// `(index+1)..=child_count` down by one. A no-op if `index` is
    /// already absent.
    fn delete(&mut self, index: usize) -> Result<(), ElementError> {
        if let Some(why) = self.protected(index) {
            return Err(ElementError::ElementDeleteForbidden(why.to_string()));
        }
        let max = self.child_count();
        if index > max {
            return Ok(());
        }
        for i in index..max {
            let v = self.get(i + 1);
            self.put(i, v);
        }
        self.put(max, None);
        Ok(())
    }

    /// Move the element at `from` to `to`. Equivalent to `delete(from)`
    /// followed by `insert(to, ...)`, with the same protected-position
    /// rules; a no-op if `from == to` or if `from` is already absent.
    fn move_to(&mut self, from: usize, to: i64) -> Result<(), ElementError> {
        if to < 1 {
            return Err(ElementError::ElementMoveIndexBelowMinimum(to));
        }
        let to = to as usize;
        // Check both ends before mutating anything: a move that would displace a
        // protected destination is just as forbidden as moving a protected source,
        // and checking only `from` would let a failing `insert` land after a
        // successful `delete` already ran, breaking atomicity.
        if let Some(why) = self.protected(from).or_else(|| self.protected(to)) {
            return Err(ElementError::ElementMoveForbidden(why.to_string()));
        }
        if from == to {
            return Ok(());
        }
        let Some(value) = self.get(from) else {
            return Ok(());
        };
        self.delete(from)?;
        // `to` is a final-list position, not an original-list one: `insert`
        // already accounts for whatever `delete` just shifted down.
        self.insert(to, &value)
    }

    /// Append each value of `values`, in order, past the current end.
    fn add_range<I, S>(&mut self, values: I) -> Result<(), ElementError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for value in values {
            let next = self.child_count() + 1;
            self.insert(next, value.as_ref())?;
        }
        Ok(())
    }

    /// Replace every direct child at once: position `i` (1-based) becomes
    /// `values[i-1]`, and any existing child beyond `values`'s length is
    /// removed. The setter half of [`crate::Element::values`]'s getter
    /// (spec's "Values get/set"). Unlike `insert`/`delete`/`move_to`, this
    /// is a plain set at each position, not a move, so it does not consult
    /// `protected` — setting MSH.1/MSH.2 or a segment's type code this way
    /// is exactly as legal as setting any one of them individually.
    fn set_values<I, S>(&mut self, values: I) -> Result<(), ElementError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values: Vec<String> = values.into_iter().map(|v| v.as_ref().to_string()).collect();
        let old_max = self.child_count();
        for (i, value) in values.iter().enumerate() {
            self.put(i + 1, Some(value.clone()));
        }
        for i in (values.len() + 1..=old_max).rev() {
            self.put(i, None);
        }
        Ok(())
    }
}
