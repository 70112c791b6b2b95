//! Transaction logging around edits.
//!
//! [`crate::editing::Document::apply`] opens a group, records the command
//! that reverts the edit and closes the group. What the log does with it is
//! up to the implementation.

use super::Cmd;

pub trait TransactionLog {
    fn begin_group(&mut self);
    fn end_group(&mut self);
    /// Records a command that undoes part of the open group.
    fn record(&mut self, inverse: Cmd);

    /// `false` when recorded commands are discarded unseen.
    fn keeps_history(&self) -> bool {
        true
    }

    /// Removes the most recent complete group, inverses in recording order.
    /// Logs that keep no history return `None`.
    fn pop_group(&mut self) -> Option<Vec<Cmd>> {
        None
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullLog;

impl TransactionLog for NullLog {
    fn begin_group(&mut self) {}
    fn end_group(&mut self) {}
    fn record(&mut self, _inverse: Cmd) {}

    fn keeps_history(&self) -> bool {
        false
    }
}

/// Keeps grouped inverses for undo. Nested groups fold into the outermost
/// one; empty groups are dropped.
#[derive(Debug, Default)]
pub struct UndoLog {
    groups: Vec<Vec<Cmd>>,
    open: Vec<Cmd>,
    depth: usize,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of complete groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl TransactionLog for UndoLog {
    fn begin_group(&mut self) {
        self.depth += 1;
    }

    fn end_group(&mut self) {
        assert!(self.depth > 0, "end_group without begin_group");
        self.depth -= 1;
        if self.depth == 0 && !self.open.is_empty() {
            self.groups.push(std::mem::take(&mut self.open));
        }
    }

    fn record(&mut self, inverse: Cmd) {
        self.open.push(inverse);
        if self.depth == 0 {
            self.groups.push(std::mem::take(&mut self.open));
        }
    }

    fn pop_group(&mut self) -> Option<Vec<Cmd>> {
        self.groups.pop()
    }
}

/// Per-document editing state: currently just the transaction log.
pub struct EditContext {
    log: Box<dyn TransactionLog + Send>,
}

impl std::fmt::Debug for EditContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditContext").finish_non_exhaustive()
    }
}

impl Default for EditContext {
    fn default() -> Self {
        Self::new(Box::new(NullLog))
    }
}

impl EditContext {
    pub fn new(log: Box<dyn TransactionLog + Send>) -> Self {
        Self { log }
    }

    pub fn begin_group(&mut self) {
        self.log.begin_group();
    }

    pub fn end_group(&mut self) {
        self.log.end_group();
    }

    pub fn record(&mut self, inverse: Cmd) {
        self.log.record(inverse);
    }

    /// Builds and records an inverse only if the log keeps history.
    pub fn record_with(&mut self, inverse: impl FnOnce() -> Cmd) {
        if self.log.keeps_history() {
            self.log.record(inverse());
        }
    }

    pub fn pop_group(&mut self) -> Option<Vec<Cmd>> {
        self.log.pop_group()
    }
}
