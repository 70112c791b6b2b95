//! Markup in and out of the tree.
//!
//! [`parse`] builds a [`Dom`](crate::dom::Dom) from the token stream of
//! `weft-syntax`; [`serialize`] writes it back, compact or pretty. For trees
//! without unsupported markup, `parse(serialize(tree))` is structurally equal
//! to `tree`.

mod parser;
mod serializer;

pub use parser::parse;
pub use serializer::{SerializerOptions, serialize};
