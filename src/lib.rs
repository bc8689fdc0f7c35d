//! HL7v2 element tree: parsing, navigating, and mutating the five-level
//! segment/field/repetition/component/subcomponent hierarchy of an HL7
//! v2.x message.
//!
//! Two representations share the same [`Element`]/[`ElementOps`]
//! contract: [`parser::Cursor`]/[`parser::Message`] lazily slice one
//! owned backing string, while [`builder::Node`]/[`builder::Message`]
//! eagerly decompose into an owned graph. Pick whichever fits — reading
//! and mutating both behave identically.
//!
//! # Examples
//!
//! ```
//! use hl7_parser::parser::Message;
//!
//! let message = Message::parse("MSH|^~\\&|foo|bar|baz|quux|20010101000000||ADT^A01|1234|P|2.3|||").unwrap();
//! let msh = message.segment(1);
//! assert_eq!(msh.child(3).value().as_deref(), Some("foo"));
//! ```

mod element;
mod encoding;
mod error;
mod level;
mod locate;
mod ops;

/// The lazily-sliced parser representation: [`parser::Message`] owns one
/// backing string, and [`parser::Cursor`] re-slices it on demand.
pub mod parser;

/// The eagerly-materialized builder representation: [`builder::Message`]
/// and [`builder::Node`] decompose all the way to `Subcomponent` up
/// front.
pub mod builder;

pub use element::Element;
pub use encoding::{Encoding, EscapedValue, UnescapedValue};
pub use error::ElementError;
pub use level::Level;
pub use ops::ElementOps;
