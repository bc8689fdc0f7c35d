//! Structural validation of the MSH prefix, the one place this crate
//! still leans on `nom`: confirming the message starts with `MSH`,
//! pulling out the field delimiter and the four MSH-2 encoding
//! characters, and in doing so enforcing the minimum-length invariant.
//! Everything below MSH itself is located by index, not parsed as a
//! grammar (see [`crate::parser::locate`]).

use nom::{
    bytes::complete::{tag, take},
    character::complete::anychar,
    sequence::tuple,
    IResult,
};

use super::span::Span;
use crate::Encoding;

/// Parse and validate the `MSH|^~\&` prefix of `input`, returning the
/// [`Encoding`] it declares. Fails if `input` doesn't start with `MSH` or
/// is too short to contain a field delimiter plus four encoding
/// characters.
pub(crate) fn parse_msh_prefix(input: &str) -> IResult<Span<'_>, Encoding> {
    let span = Span::new(input);
    let (rest, (_, field, msh2)) = tuple((tag("MSH"), anychar, take(4usize)))(span)?;
    Ok((rest, Encoding::from_msh2(field, &msh2)))
}
