/*!
 * # Editing
 *
 * ## Architecture Overview
 *
 * ### 1. Single Source of Truth: the tree
 * - A [`Document`] owns one [`Dom`](crate::dom::Dom); flat text and markup
 *   are derived from it on demand
 * - Positions exposed to callers are flat offsets (see [`crate::flat`])
 *
 * ### 2. Command-Based Editing
 * - Every edit is a [`Cmd`] passed to [`Document::apply`]
 * - `apply` returns a [`Patch`] with the changed flat range, the new
 *   selection and the new version
 *
 * ### 3. Transactions
 * - `apply` wraps each command in a group on the document's
 *   [`EditContext`], recording a command that restores the previous markup
 * - [`NullLog`] keeps nothing; [`UndoLog`] keeps groups for
 *   [`Document::undo`]
 *
 * ### 4. Threading
 * - [`SharedDocument`] moves a document onto its own worker thread and
 *   serializes access through a job queue
 *
 * ## Module Structure
 *
 * - **`document`**: `Document` construction, reads, `apply` and `undo`
 * - **`commands`**: `Cmd`, `Style` and how each command edits the tree
 * - **`context`**: `TransactionLog` and its implementations
 * - **`patch`**: edit result metadata
 * - **`shared`**: `SharedDocument` worker
 *
 * ## Usage Pattern
 *
 * ```rust
 * use weft_engine::editing::*;
 *
 * let mut doc = Document::from_html("<p>Hello</p><p>World!</p>")
 *     .with_log(Box::new(UndoLog::new()));
 * doc.apply(Cmd::Delete { range: 5..6 });
 * assert_eq!(doc.html(), "<p>HelloWorld!</p>");
 *
 * doc.undo();
 * assert_eq!(doc.html(), "<p>Hello</p><p>World!</p>");
 * ```
 */

pub mod commands;
pub mod context;
pub mod document;
pub mod patch;
pub mod shared;

pub use commands::{Cmd, Style};
pub use context::{EditContext, NullLog, TransactionLog, UndoLog};
pub use document::Document;
pub use patch::Patch;
pub use shared::{DocumentError, SharedDocument};
