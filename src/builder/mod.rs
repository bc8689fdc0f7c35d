//! The eagerly-materialized builder tree: a [`Message`] owns a sparse
//! map of [`Node`]s, and every [`Node`] below it decomposes its own text
//! into further `Node` children immediately, down to `Subcomponent`,
//! rather than re-slicing a backing string on demand the way the
//! [`crate::parser`] tree does.

mod message;
mod node;

pub use message::Message;
pub use node::Node;
