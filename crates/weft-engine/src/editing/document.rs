use std::ops::Range;

use log::debug;
use uuid::Uuid;

use crate::dom::Dom;
use crate::editing::{Cmd, EditContext, Patch, TransactionLog};
use crate::flat::{self, FlatText};
use crate::markup::{self, SerializerOptions};
use crate::processor::ProcessorPipeline;

/// An editable rich-text document.
///
/// The [`Dom`] is the single source of truth. Flat text is derived from it
/// on demand and every edit goes through [`Document::apply`], which logs a
/// command restoring the previous markup to the [`EditContext`].
///
/// ```rust
/// # use weft_engine::editing::{Cmd, Document, Style};
/// let mut doc = Document::from_html("foo<b>bar</b>baz");
/// let patch = doc.apply(Cmd::ToggleStyle { range: 3..6, style: Style::Bold });
///
/// assert_eq!(doc.html(), "foobarbaz");
/// assert_eq!(patch.version, 1);
/// ```
#[derive(Debug)]
pub struct Document {
    pub(crate) dom: Dom,
    pub(crate) context: EditContext,
    pub(crate) version: u64,
    pub(crate) id: Uuid,
    pub(crate) processors: ProcessorPipeline,
    /// Current selection in flat coordinates.
    pub(crate) selection: Range<usize>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document.
    pub fn new() -> Self {
        Self::from_dom(Dom::new())
    }

    pub fn from_html(html: &str) -> Self {
        Self::from_dom(markup::parse(html))
    }

    /// Parses UTF-8 markup.
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let html = std::str::from_utf8(bytes)?;
        Ok(Self::from_html(html))
    }

    /// Parses markup after running the input processors over it.
    pub fn from_html_with_processors(html: &str, processors: ProcessorPipeline) -> Self {
        let mut document = Self::new().with_processors(processors);
        document.load_html(html);
        let len = document.len();
        document.selection = len..len;
        document
    }

    pub fn from_flat_text(flat: &FlatText) -> Self {
        Self::from_dom(flat::to_dom(flat))
    }

    fn from_dom(dom: Dom) -> Self {
        let len = dom.flat_len();
        Self {
            dom,
            context: EditContext::default(),
            version: 0,
            id: Uuid::new_v4(),
            processors: ProcessorPipeline::default(),
            selection: len..len,
        }
    }

    /// Replaces the transaction log.
    pub fn with_log(mut self, log: Box<dyn TransactionLog + Send>) -> Self {
        self.context = EditContext::new(log);
        self
    }

    /// Sets the markup processors. Output processors apply to [`Document::html`]
    /// immediately; input processors to markup loaded from now on.
    pub fn with_processors(mut self, processors: ProcessorPipeline) -> Self {
        self.processors = processors;
        self
    }

    // ============ Reads ============

    pub fn html(&self) -> String {
        self.html_with(&SerializerOptions::default())
    }

    pub fn html_with(&self, options: &SerializerOptions) -> String {
        self.processors
            .process_output(&markup::serialize(&self.dom, options))
    }

    pub fn flat_text(&self) -> FlatText {
        flat::from_dom(&self.dom)
    }

    /// Length in flat units, separators included.
    pub fn len(&self) -> usize {
        self.dom.flat_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Plain flat text: paragraph separators as `'\n'`, attachments as
    /// their placeholder characters.
    pub fn text(&self) -> String {
        self.flat_text().text()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn selection(&self) -> Range<usize> {
        self.selection.clone()
    }

    pub fn set_selection(&mut self, selection: Range<usize>) {
        let len = self.len();
        self.selection = selection.start.min(len)..selection.end.min(len);
    }

    // ============ Edits ============

    /// Applies a command as one transaction.
    pub fn apply(&mut self, cmd: Cmd) -> Patch {
        self.context.begin_group();
        let dom = &self.dom;
        self.context.record_with(|| {
            Cmd::SetHtml(markup::serialize(dom, &SerializerOptions::default()))
        });
        let outcome = self.execute(cmd);
        self.context.end_group();

        self.version += 1;
        self.selection = outcome.selection.clone();
        Patch {
            changed: vec![outcome.changed],
            new_selection: outcome.selection,
            version: self.version,
        }
    }

    /// Reverts the most recent transaction. `None` when the log keeps no
    /// history or has nothing left.
    pub fn undo(&mut self) -> Option<Patch> {
        let inverses = self.context.pop_group()?;
        debug!("undoing {} recorded commands", inverses.len());
        for inverse in inverses.into_iter().rev() {
            match inverse {
                // Recorded markup is already processed.
                Cmd::SetHtml(html) => self.dom = markup::parse(&html),
                other => {
                    self.execute(other);
                }
            }
        }

        self.version += 1;
        let len = self.len();
        self.selection = len..len;
        Some(Patch {
            changed: vec![0..len],
            new_selection: len..len,
            version: self.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::invariants;
    use crate::editing::{Style, TransactionLog, UndoLog};
    use crate::flat::ParagraphProperty;
    use crate::processor::RegexProcessor;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    fn undoable(html: &str) -> Document {
        Document::from_html(html).with_log(Box::new(UndoLog::new()))
    }

    #[test]
    fn test_new_document_is_empty() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert_eq!(doc.html(), "");
        assert_eq!(doc.version(), 0);
        assert_eq!(doc.selection(), 0..0);
    }

    #[test]
    fn test_from_bytes() {
        let doc = Document::from_bytes(b"<p>Hello</p><p>World!</p>").unwrap();
        assert_eq!(doc.text(), "Hello\nWorld!");
        assert_eq!(doc.len(), 12);
        assert_eq!(doc.selection(), 12..12);
    }

    #[test]
    fn test_from_bytes_invalid_utf8() {
        assert!(Document::from_bytes(&[0xFF, 0xFE, 0xFD]).is_err());
    }

    #[test]
    fn test_from_flat_text() {
        let flat = FlatText::new().with_text(
            "a\nb",
            crate::flat::Attributes::default()
                .with_paragraph(vec![ParagraphProperty::unordered_list()]),
        );
        let doc = Document::from_flat_text(&flat);
        assert_snapshot!(doc.html(), @"<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn test_documents_get_distinct_ids() {
        assert_ne!(Document::new().id(), Document::new().id());
    }

    #[test]
    fn test_apply_bumps_version_and_moves_selection() {
        let mut doc = Document::from_html("hello");
        let patch = doc.apply(Cmd::ReplaceText {
            range: 5..5,
            text: " world".to_string(),
        });
        assert_eq!(
            patch,
            Patch {
                changed: vec![5..11],
                new_selection: 11..11,
                version: 1,
            }
        );
        assert_eq!(doc.version(), 1);
        assert_eq!(doc.selection(), 11..11);
        invariants::check(doc.dom());
    }

    #[test]
    fn test_undo_without_history() {
        let mut doc = Document::from_html("a");
        doc.apply(Cmd::Delete { range: 0..1 });
        assert_eq!(doc.undo(), None);
    }

    /// Groups edits but keeps no history; recording into it is a bug.
    struct Discarding;

    impl TransactionLog for Discarding {
        fn begin_group(&mut self) {}
        fn end_group(&mut self) {}
        fn record(&mut self, inverse: Cmd) {
            panic!("built an inverse nobody keeps: {inverse:?}");
        }
        fn keeps_history(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_apply_skips_inverse_for_log_without_history() {
        let mut doc = Document::from_html("<p>ab</p>").with_log(Box::new(Discarding));
        let patch = doc.apply(Cmd::ReplaceText {
            range: 2..2,
            text: "c".to_string(),
        });
        assert_eq!(patch.version, 1);
        assert_eq!(doc.html(), "<p>abc</p>");
    }

    #[test]
    fn test_undo_restores_previous_markup() {
        let mut doc = undoable("foo<b>bar</b>baz");
        doc.apply(Cmd::ToggleStyle {
            range: 3..6,
            style: Style::Bold,
        });
        doc.apply(Cmd::Delete { range: 0..3 });
        assert_eq!(doc.html(), "barbaz");

        let patch = doc.undo().unwrap();
        assert_eq!(doc.html(), "foobarbaz");
        assert_eq!(patch.version, 3);

        doc.undo().unwrap();
        assert_eq!(doc.html(), "foo<b>bar</b>baz");
        assert_eq!(doc.undo(), None);
    }

    #[test]
    fn test_processors() {
        let processors = ProcessorPipeline {
            input: vec![RegexProcessor::new(r"\[hr\]", "<hr>").unwrap()],
            output: vec![RegexProcessor::new("<hr>", "[hr]").unwrap()],
        };
        let mut doc = Document::new().with_processors(processors);
        doc.apply(Cmd::SetHtml("a[hr]b".to_string()));

        assert_eq!(doc.text(), "a\n\u{FFFC}\nb");
        assert_snapshot!(doc.html(), @"a[hr]b");
    }

    #[test]
    fn test_from_html_with_processors() {
        let processors = ProcessorPipeline {
            input: vec![RegexProcessor::new(r"\[b\](.*?)\[/b\]", "<b>$1</b>").unwrap()],
            output: Vec::new(),
        };
        let doc = Document::from_html_with_processors("a[b]c[/b]", processors);
        assert_eq!(doc.html(), "a<b>c</b>");
        assert_eq!(doc.selection(), 2..2);
    }

    #[test]
    fn test_undo_skips_input_processors() {
        let processors = ProcessorPipeline {
            input: vec![RegexProcessor::new("x", "y").unwrap()],
            output: Vec::new(),
        };
        let mut doc = undoable("x").with_processors(processors);
        doc.apply(Cmd::Delete { range: 0..1 });
        doc.undo().unwrap();
        assert_eq!(doc.html(), "x");
    }

    #[test]
    fn test_html_with_pretty_options() {
        let doc = Document::from_html("<ul><li>a</li></ul>");
        assert_eq!(
            doc.html_with(&SerializerOptions::pretty()),
            "<ul>\n  <li>a</li>\n</ul>"
        );
    }

    #[test]
    fn test_set_selection_clamps() {
        let mut doc = Document::from_html("abc");
        doc.set_selection(1..10);
        assert_eq!(doc.selection(), 1..3);
    }
}
