use std::fmt::{self, Display};

/// The five delimiter characters that define how an HL7 v2 message's text
/// splits into segments, fields, repetitions, components, and
/// subcomponents, plus the escape/unescape transform between them.
///
/// The parser tree's [`Encoding`] view is a read-only reflection of
/// whatever MSH.1 / MSH.2 currently contain; the builder tree's view owns
/// these fields directly. Either way, all five characters must be
/// pairwise distinct, and none may equal the escape character's own
/// escape target (the escape character only ever escapes itself and the
/// four separators).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Encoding {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
}

impl Default for Encoding {
    /// `| ^ ~ \ &`, the delimiters assumed by `Message::build()` and any
    /// message whose MSH-2 is shorter than 4 characters.
    fn default() -> Self {
        Encoding {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

impl Encoding {
    /// Parse the four encoding characters (component, repetition, escape,
    /// subcomponent, in that order) out of MSH-2. Falls back to
    /// [`Encoding::default`]'s four characters for any position `msh2` is
    /// too short to supply.
    pub fn from_msh2(field: char, msh2: &str) -> Self {
        let default = Encoding::default();
        let mut chars = msh2.chars();
        Encoding {
            field,
            component: chars.next().unwrap_or(default.component),
            repetition: chars.next().unwrap_or(default.repetition),
            escape: chars.next().unwrap_or(default.escape),
            subcomponent: chars.next().unwrap_or(default.subcomponent),
        }
    }

    /// The four MSH-2 encoding characters in wire order (component,
    /// repetition, escape, subcomponent).
    pub fn msh2(&self) -> String {
        [self.component, self.repetition, self.escape, self.subcomponent]
            .iter()
            .collect()
    }

    /// Escape every occurrence of a reserved character (the four
    /// delimiters and the escape character itself) in `value`, returning
    /// the display-only [`EscapedValue`] so callers can `write!`/`format!`
    /// it without allocating until they choose to.
    ///
    /// Escaping is **not idempotent**: calling it twice will double-escape
    /// an already-escaped string. Call it exactly once, right before the
    /// value is written into a message.
    ///
    /// # Examples
    ///
    /// ```
    /// use hl7_parser::Encoding;
    /// let encoding = Encoding::default();
    /// assert_eq!(encoding.escape("foo|bar^baz").to_string(), r"foo\F\bar\S\baz");
    /// ```
    pub fn escape<'e>(&'e self, value: &'e str) -> EscapedValue<'e> {
        EscapedValue {
            encoding: self,
            value,
        }
    }

    /// Reverse [`Encoding::escape`]: decode every `\X\` escape sequence in
    /// `value` back into its raw character. Unterminated or unrecognized
    /// escape sequences (including vendor `\Z..\` sequences) are emitted
    /// literally, unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use hl7_parser::Encoding;
    /// let encoding = Encoding::default();
    /// assert_eq!(encoding.unescape(r"foo\F\bar\S\baz").to_string(), "foo|bar^baz");
    /// ```
    pub fn unescape<'e>(&'e self, value: &'e str) -> UnescapedValue<'e> {
        UnescapedValue {
            encoding: self,
            value,
        }
    }
}

/// Display wrapper produced by [`Encoding::escape`]; escapes lazily as it
/// is written.
#[derive(Debug, Copy, Clone)]
pub struct EscapedValue<'e> {
    encoding: &'e Encoding,
    value: &'e str,
}

impl Display for EscapedValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let e = self.encoding;
        for ch in self.value.chars() {
            let letter = if ch == e.field {
                Some('F')
            } else if ch == e.component {
                Some('S')
            } else if ch == e.subcomponent {
                Some('T')
            } else if ch == e.repetition {
                Some('R')
            } else if ch == e.escape {
                Some('E')
            } else {
                None
            };
            match letter {
                Some(letter) => write!(f, "{}{}{}", e.escape, letter, e.escape)?,
                None => write!(f, "{ch}")?,
            }
        }
        Ok(())
    }
}

/// Display wrapper produced by [`Encoding::unescape`]; decodes lazily as
/// it is written.
#[derive(Debug, Copy, Clone)]
pub struct UnescapedValue<'e> {
    encoding: &'e Encoding,
    value: &'e str,
}

impl Display for UnescapedValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let esc = self.encoding.escape;
        let mut rest = self.value;
        loop {
            let Some(start) = rest.find(esc) else {
                return f.write_str(rest);
            };
            f.write_str(&rest[..start])?;
            let after = &rest[start + esc.len_utf8()..];

            let Some(end) = after.find(esc) else {
                // unterminated escape: the marker itself is literal
                f.write_char(esc)?;
                rest = after;
                continue;
            };
            let body = &after[..end];
            let tail = &after[end + esc.len_utf8()..];

            match self.encoding.decode_escape_body(body) {
                Some(decoded) => f.write_str(&decoded)?,
                None => {
                    // unknown escape (includes vendor `\Z..\`): pass through literally
                    f.write_char(esc)?;
                    f.write_str(body)?;
                    f.write_char(esc)?;
                }
            }
            rest = tail;
        }
    }
}

use std::fmt::Write as _;

impl Encoding {
    /// Decode the body of a single `\body\` escape sequence (the part
    /// between the two escape characters), or `None` if `body` isn't one
    /// of the sequences this crate understands (a reserved-character
    /// code, `.br`, or a run of `Xhh` hex byte pairs).
    fn decode_escape_body(&self, body: &str) -> Option<String> {
        match body {
            "F" => Some(self.field.to_string()),
            "S" => Some(self.component.to_string()),
            "T" => Some(self.subcomponent.to_string()),
            "R" => Some(self.repetition.to_string()),
            "E" => Some(self.escape.to_string()),
            ".br" => Some("\r".to_string()),
            _ => {
                let hex = body.strip_prefix('X')?;
                if hex.is_empty() || hex.len() % 2 != 0 {
                    return None;
                }
                if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                    return None;
                }
                let mut decoded = String::with_capacity(hex.len() / 2);
                for pair in hex.as_bytes().chunks(2) {
                    let byte = u8::from_str_radix(std::str::from_utf8(pair).ok()?, 16).ok()?;
                    decoded.push(byte as char);
                }
                Some(decoded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_reserved_characters() {
        let encoding = Encoding::default();
        let input = "foo|bar^baz&quux~quuz\\corge";
        let expected = r"foo\F\bar\S\baz\T\quux\R\quuz\E\corge";
        assert_eq!(encoding.escape(input).to_string(), expected);
    }

    #[test]
    fn unescape_reverses_escape() {
        let encoding = Encoding::default();
        let input = "foo|bar^baz&quux~quuz\\corge";
        let escaped = encoding.escape(input).to_string();
        assert_eq!(encoding.unescape(&escaped).to_string(), input);
    }

    #[test]
    fn decodes_segment_break_and_hex() {
        let encoding = Encoding::default();
        assert_eq!(encoding.unescape(r"a\.br\b").to_string(), "a\rb");
        assert_eq!(encoding.unescape(r"a\X0A\b").to_string(), "a\nb");
        assert_eq!(encoding.unescape(r"a\X0D\b").to_string(), "a\rb");
    }

    #[test]
    fn unknown_and_unterminated_escapes_pass_through() {
        let encoding = Encoding::default();
        assert_eq!(encoding.unescape(r"a\Z1234\b").to_string(), r"a\Z1234\b");
        assert_eq!(encoding.unescape(r"a\Qbogus\b").to_string(), r"a\Qbogus\b");
        assert_eq!(encoding.unescape(r"a\b").to_string(), r"a\b");
    }

    #[test]
    fn msh2_round_trips() {
        let encoding = Encoding::default();
        assert_eq!(encoding.msh2(), r"^~\&");
        let parsed = Encoding::from_msh2('|', r"^~\&");
        assert_eq!(parsed, encoding);
    }

    #[test]
    fn from_msh2_defaults_short_input() {
        let encoding = Encoding::from_msh2('|', "^~");
        assert_eq!(encoding.component, '^');
        assert_eq!(encoding.repetition, '~');
        assert_eq!(encoding.escape, '\\');
        assert_eq!(encoding.subcomponent, '&');
    }
}
