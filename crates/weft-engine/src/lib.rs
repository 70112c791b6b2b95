//! # weft-engine
//!
//! Rich-text editing core: an HTML document tree, range edits over it, and
//! conversion between the tree and flat attributed text.
//!
//! - [`dom`]: the arena-backed tree and its range primitives
//! - [`markup`]: markup parsing and serialization
//! - [`flat`]: flat attributed text and its conversion to and from the tree
//! - [`editing`]: documents, commands, transactions and the worker handle
//! - [`processor`]: regex rewriting of markup on the way in and out

pub mod dom;
pub mod editing;
pub mod flat;
pub mod markup;
pub mod processor;

// Re-export key types for easier usage
pub use dom::{Dom, NodeId};
pub use editing::{Cmd, Document, DocumentError, Patch, SharedDocument, Style};
pub use flat::FlatText;
pub use markup::SerializerOptions;
pub use processor::{ProcessorError, ProcessorPipeline, RegexProcessor};
