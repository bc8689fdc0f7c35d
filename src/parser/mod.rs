//! The lazily-sliced parser tree: a [`Message`] owns one backing string,
//! and every [`Cursor`] into it holds only a path of indices plus a
//! shared reference to that string, re-slicing on every read and
//! mutating the same string in place on every write.

mod cursor;
mod message;
mod msh;
mod span;

pub use cursor::Cursor;
pub use message::Message;
