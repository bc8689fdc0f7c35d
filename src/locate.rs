//! Pure, allocation-light functions that turn a path of 1-based indices
//! into a byte range inside the message's backing string (or, if the
//! position doesn't exist yet, into the information needed to splice one
//! in). Nothing here owns a string or a `Cursor`; it only ever borrows.

use crate::Encoding;
use std::ops::Range;

/// Split `text` on `delim`, returning the byte range of each piece
/// relative to the start of `text`. Empty input yields an empty vec (the
/// "absent" case), matching the value-count rule: a present-but-empty
/// slice has zero children, not one.
pub(crate) fn split_ranges(text: &str, delim: char) -> Vec<Range<usize>> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut ranges = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if c == delim {
            ranges.push(start..i);
            start = i + c.len_utf8();
        }
    }
    ranges.push(start..text.len());
    ranges
}

/// Number of children `text` would split into at `delim`.
pub(crate) fn level_count(text: &str, delim: char) -> usize {
    if text.is_empty() {
        0
    } else {
        split_ranges(text, delim).len()
    }
}

/// Result of locating a single 1-based index within a parent slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Located {
    /// The position exists; here is its absolute byte range.
    Present(Range<usize>),
    /// The position is past the parent's current end. Splicing in a new
    /// value there means writing `missing_delims` copies of `delim`
    /// followed by the value, starting at byte offset `at`.
    Absent {
        at: usize,
        missing_delims: usize,
        delim: char,
    },
}

/// Locate 1-based `index` within `slice` (itself starting at absolute
/// offset `slice_start`), splitting on `delim`.
pub(crate) fn locate_level(slice: &str, slice_start: usize, delim: char, index: usize) -> Located {
    let ranges = split_ranges(slice, delim);
    if index >= 1 && index <= ranges.len() {
        let r = &ranges[index - 1];
        return Located::Present((slice_start + r.start)..(slice_start + r.end));
    }
    let vc = ranges.len();
    // `vc == 0` because `slice` is empty (not because it has zero
    // delimiters): there is no existing content to separate a new value
    // from, so the first `index - 1` slots still need their own leading
    // delimiters but the value itself needs none before it.
    let missing_delims = if vc == 0 {
        index.saturating_sub(1)
    } else {
        index - vc
    };
    Located::Absent {
        at: slice_start + slice.len(),
        missing_delims,
        delim,
    }
}

fn adjust_for_missing_separator(located: Located, separator_present: bool) -> Located {
    match located {
        Located::Present(r) => Located::Present(r),
        Located::Absent {
            at,
            missing_delims,
            delim,
        } => {
            let extra = usize::from(!separator_present);
            Located::Absent {
                at,
                missing_delims: missing_delims + extra,
                delim,
            }
        }
    }
}

/// Where a segment's field data actually starts, and whatever MSH-specific
/// bookkeeping `locate_field`/`field_count` both need.
pub(crate) struct FieldLayout<'s> {
    pub(crate) is_msh: bool,
    pub(crate) remainder_start: usize,
    pub(crate) remainder: &'s str,
    /// Whether the separator between the fixed prefix (type code, or for
    /// MSH the type code + MSH.1 + MSH.2) and the first ordinary field is
    /// actually present in the text.
    pub(crate) separator_present: bool,
}

pub(crate) fn field_layout<'s>(source: &'s str, segment_range: &Range<usize>, encoding: &Encoding) -> FieldLayout<'s> {
    let seg_text = &source[segment_range.start..segment_range.end];
    let is_msh = seg_text.as_bytes().get(0..3) == Some(b"MSH");
    let fd = encoding.field;
    let fd_len = fd.len_utf8();
    if is_msh {
        let msh2_start = segment_range.start + 3 + fd_len;
        let msh2_start = msh2_start.min(segment_range.end);
        let msh2_text = &source[msh2_start..segment_range.end];
        let msh2_len: usize = msh2_text.chars().take(4).map(|c| c.len_utf8()).sum();
        let msh2_end = msh2_start + msh2_len;
        let after = &source[msh2_end..segment_range.end];
        let separator_present = after.starts_with(fd);
        let remainder_start = msh2_end + if separator_present { fd_len } else { 0 };
        FieldLayout {
            is_msh: true,
            remainder_start,
            remainder: &source[remainder_start..segment_range.end],
            separator_present,
        }
    } else {
        let after_code_start = (segment_range.start + 3).min(segment_range.end);
        let after = &source[after_code_start..segment_range.end];
        let separator_present = after.starts_with(fd);
        let remainder_start = after_code_start + if separator_present { fd_len } else { 0 };
        FieldLayout {
            is_msh: false,
            remainder_start,
            remainder: &source[remainder_start..segment_range.end],
            separator_present,
        }
    }
}

/// Locate 1-based segment index within the whole message.
pub(crate) fn locate_segment(source: &str, index: usize) -> Located {
    locate_level(source, 0, '\r', index)
}

pub(crate) fn segment_count(source: &str) -> usize {
    level_count(source, '\r')
}

/// Locate field `index` within a segment already known to occupy
/// `segment_range`. Index 0 addresses the 3-letter type code, which
/// always exists once the segment itself does. MSH.1 (the field
/// delimiter) and MSH.2 (the four encoding characters) are fixed-width
/// and never split on `encoding.field` the way ordinary fields are.
pub(crate) fn locate_field(
    source: &str,
    segment_range: &Range<usize>,
    index: usize,
    encoding: &Encoding,
) -> Located {
    if index == 0 {
        let seg_text = &source[segment_range.start..segment_range.end];
        let end = segment_range.start + seg_text.len().min(3);
        return Located::Present(segment_range.start..end);
    }
    let layout = field_layout(source, segment_range, encoding);
    if layout.is_msh {
        let fd_len = encoding.field.len_utf8();
        if index == 1 {
            let start = segment_range.start + 3;
            return Located::Present(start..start + fd_len);
        }
        if index == 2 {
            let start = segment_range.start + 3 + fd_len;
            let start = start.min(segment_range.end);
            let msh2_text = &source[start..segment_range.end];
            let len: usize = msh2_text.chars().take(4).map(|c| c.len_utf8()).sum();
            return Located::Present(start..start + len);
        }
        let located = locate_level(layout.remainder, layout.remainder_start, encoding.field, index - 2);
        adjust_for_missing_separator(located, layout.separator_present)
    } else {
        let located = locate_level(layout.remainder, layout.remainder_start, encoding.field, index);
        adjust_for_missing_separator(located, layout.separator_present)
    }
}

/// Number of fields a segment at `segment_range` has (not counting the
/// index-0 type code).
pub(crate) fn field_count(source: &str, segment_range: &Range<usize>, encoding: &Encoding) -> usize {
    let layout = field_layout(source, segment_range, encoding);
    let base = level_count(layout.remainder, encoding.field);
    if layout.is_msh {
        base + 2
    } else {
        base
    }
}

/// Where descending a path bottomed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathLocation {
    /// The full path exists; here is its absolute byte range.
    Present(Range<usize>),
    /// The path's immediate parent exists, but this leaf position is past
    /// its current end.
    Absent(Located),
    /// Some ancestor strictly above the last path element doesn't exist
    /// yet either. Callers should materialize `path[..=the usize here]`
    /// (recursively, as it may itself have missing ancestors) and retry.
    MissingAncestor(usize),
}

/// Descend `path` (segment index, then optionally field/repetition/
/// component/subcomponent indices) from the message root.
pub(crate) fn locate_path(source: &str, encoding: &Encoding, path: &[usize]) -> PathLocation {
    debug_assert!(!path.is_empty(), "an element path always has a segment index");

    let seg_range = match locate_segment(source, path[0]) {
        Located::Present(r) => r,
        located @ Located::Absent { .. } => {
            return if path.len() == 1 {
                PathLocation::Absent(located)
            } else {
                PathLocation::MissingAncestor(0)
            };
        }
    };
    if path.len() == 1 {
        return PathLocation::Present(seg_range);
    }

    let field_range = match locate_field(source, &seg_range, path[1], encoding) {
        Located::Present(r) => r,
        located @ Located::Absent { .. } => {
            return if path.len() == 2 {
                PathLocation::Absent(located)
            } else {
                PathLocation::MissingAncestor(1)
            };
        }
    };
    if path.len() == 2 {
        return PathLocation::Present(field_range);
    }

    let rep_range = match locate_level(
        &source[field_range.clone()],
        field_range.start,
        encoding.repetition,
        path[2],
    ) {
        Located::Present(r) => r,
        located @ Located::Absent { .. } => {
            return if path.len() == 3 {
                PathLocation::Absent(located)
            } else {
                PathLocation::MissingAncestor(2)
            };
        }
    };
    if path.len() == 3 {
        return PathLocation::Present(rep_range);
    }

    let comp_range = match locate_level(
        &source[rep_range.clone()],
        rep_range.start,
        encoding.component,
        path[3],
    ) {
        Located::Present(r) => r,
        located @ Located::Absent { .. } => {
            return if path.len() == 4 {
                PathLocation::Absent(located)
            } else {
                PathLocation::MissingAncestor(3)
            };
        }
    };
    if path.len() == 4 {
        return PathLocation::Present(comp_range);
    }

    debug_assert_eq!(path.len(), 5, "path deeper than Subcomponent");
    match locate_level(
        &source[comp_range.clone()],
        comp_range.start,
        encoding.subcomponent,
        path[4],
    ) {
        Located::Present(r) => PathLocation::Present(r),
        located @ Located::Absent { .. } => PathLocation::Absent(located),
    }
}
