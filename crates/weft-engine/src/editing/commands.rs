//! Edit commands and how they change the tree.
//!
//! Every range and position in a [`Cmd`] is in flat coordinates (see
//! [`crate::flat`]); commands translate them to tree coordinates before
//! touching the [`Dom`](crate::dom::Dom).

use std::ops::Range;

use log::debug;

use crate::dom::{ElementDescriptor, NodeId, Preference, element};
use crate::flat::{
    self, FlatText, Image, ImageAlignment, ImageSize, LINE_SEPARATOR, PARAGRAPH_SEPARATOR, Video,
};
use crate::markup;

use super::Document;

/// Character formatting that can be toggled on a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Bold,
    Italic,
    Underline,
    Strikethrough,
}

impl Style {
    /// Element created when the style is applied.
    pub fn element_name(self) -> &'static str {
        match self {
            Style::Bold => "strong",
            Style::Italic => "em",
            Style::Underline => "u",
            Style::Strikethrough => "del",
        }
    }

    /// Every element name that expresses the style.
    pub fn names(self) -> Vec<String> {
        element::equivalent_names(self.element_name())
    }
}

/// Editing commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cmd {
    /// Replace the whole document with parsed markup.
    SetHtml(String),
    /// Replace the whole document with flat text.
    SetFlatText(FlatText),
    /// Replace a range with text that takes the formatting at its start.
    /// `'\n'` starts a new paragraph, `U+2028` inserts a line break.
    ReplaceText { range: Range<usize>, text: String },
    /// Delete a range; paragraph separators inside it join blocks.
    Delete { range: Range<usize> },
    ToggleStyle { range: Range<usize>, style: Style },
    ApplyStyle { range: Range<usize>, style: Style },
    RemoveStyle { range: Range<usize>, style: Style },
    /// Link a range. With a title, the range is replaced by the title first.
    SetLink {
        range: Range<usize>,
        url: String,
        title: Option<String>,
    },
    RemoveLink { range: Range<usize> },
    /// Wrap the blocks touched by the range in a new block element.
    WrapBlock { range: Range<usize>, name: String },
    /// Remove block elements with one of `names` from the range.
    UnwrapBlock {
        range: Range<usize>,
        names: Vec<String>,
    },
    InsertImage { at: usize, image: Image },
    /// Update the image at `range`; `None` fields are left alone.
    UpdateImage {
        range: Range<usize>,
        src: Option<String>,
        alignment: Option<ImageAlignment>,
        size: Option<ImageSize>,
    },
    InsertVideo { at: usize, video: Video },
    InsertHorizontalRule { at: usize },
    InsertLineBreak { at: usize },
}

/// What a command touched: the changed flat range and where the selection
/// goes.
pub(crate) struct Outcome {
    pub changed: Range<usize>,
    pub selection: Range<usize>,
}

impl Outcome {
    fn range(range: Range<usize>) -> Self {
        Self {
            changed: range.clone(),
            selection: range,
        }
    }

    fn caret(changed: Range<usize>) -> Self {
        let end = changed.end;
        Self {
            changed,
            selection: end..end,
        }
    }
}

impl Document {
    /// Runs a command against the tree without logging it.
    pub(crate) fn execute(&mut self, cmd: Cmd) -> Outcome {
        debug!("executing {cmd:?}");
        match cmd {
            Cmd::SetHtml(html) => {
                self.load_html(&html);
                Outcome::caret(0..self.len())
            }
            Cmd::SetFlatText(flat) => {
                self.dom = flat::to_dom(&flat);
                Outcome::caret(0..self.len())
            }
            Cmd::ReplaceText { range, text } => {
                self.check_range(&range);
                self.delete_range(range.clone());
                let end = self.insert_text(range.start, &text);
                Outcome::caret(range.start..end)
            }
            Cmd::Delete { range } => {
                self.check_range(&range);
                self.delete_range(range.clone());
                Outcome::caret(range.start..range.start)
            }
            Cmd::ToggleStyle { range, style } => {
                self.check_range(&range);
                let names = style.names();
                let tree = self.tree_range(&range);
                if !tree.is_empty() && self.dom.covered_by(tree.clone(), &names) {
                    self.unwrap_inline(tree, &names);
                } else {
                    self.wrap_inline(tree, ElementDescriptor::new(style.element_name()));
                }
                Outcome::range(range)
            }
            Cmd::ApplyStyle { range, style } => {
                self.check_range(&range);
                let tree = self.tree_range(&range);
                self.wrap_inline(tree, ElementDescriptor::new(style.element_name()));
                Outcome::range(range)
            }
            Cmd::RemoveStyle { range, style } => {
                self.check_range(&range);
                let tree = self.tree_range(&range);
                self.unwrap_inline(tree, &style.names());
                Outcome::range(range)
            }
            Cmd::SetLink { range, url, title } => {
                self.check_range(&range);
                let range = match title {
                    Some(title) => {
                        self.delete_range(range.clone());
                        let end = self.insert_text(range.start, &title);
                        range.start..end
                    }
                    None => range,
                };
                let tree = self.tree_range(&range);
                self.wrap_inline(tree, ElementDescriptor::new("a").with_attribute("href", url));
                Outcome::range(range)
            }
            Cmd::RemoveLink { range } => {
                self.check_range(&range);
                let tree = self.tree_range(&range);
                self.unwrap_inline(tree, &["a".to_string()]);
                Outcome::range(range)
            }
            Cmd::WrapBlock { range, name } => {
                self.check_range(&range);
                let tree = self.tree_range(&range);
                self.dom.wrap_blocks(tree, &ElementDescriptor::new(name));
                self.normalize();
                Outcome::range(range)
            }
            Cmd::UnwrapBlock { range, names } => {
                self.check_range(&range);
                let tree = self.tree_range(&range);
                self.unwrap_inline(tree, &names);
                Outcome::range(range)
            }
            Cmd::InsertImage { at, image } => {
                self.check_range(&(at..at));
                let img = self.dom.create_element("img", image.to_attributes());
                self.insert_attachment(at, img)
            }
            Cmd::InsertVideo { at, video } => {
                self.check_range(&(at..at));
                let node = self.dom.create_element("video", video.to_attributes());
                self.insert_attachment(at, node)
            }
            Cmd::UpdateImage {
                range,
                src,
                alignment,
                size,
            } => {
                self.check_range(&range);
                self.update_image(&range, src, alignment, size);
                Outcome::range(range)
            }
            Cmd::InsertHorizontalRule { at } => {
                self.check_range(&(at..at));
                self.insert_horizontal_rule(at);
                Outcome::caret(at..self.dom.tree_to_flat(self.dom.flat_to_tree(at) + 1))
            }
            Cmd::InsertLineBreak { at } => {
                self.check_range(&(at..at));
                let end = self.insert_text(at, &LINE_SEPARATOR.to_string());
                Outcome::caret(at..end)
            }
        }
    }

    fn check_range(&self, range: &Range<usize>) {
        let length = self.len();
        assert!(
            range.start <= range.end && range.end <= length,
            "range {range:?} out of bounds (length {length})"
        );
    }

    fn tree_range(&self, range: &Range<usize>) -> Range<usize> {
        self.dom.flat_to_tree(range.start)..self.dom.flat_to_tree(range.end)
    }

    fn normalize(&mut self) {
        let root = self.dom.root();
        self.dom.normalize(root);
    }

    fn wrap_inline(&mut self, tree: Range<usize>, descriptor: ElementDescriptor) {
        if tree.is_empty() {
            return;
        }
        let root = self.dom.root();
        self.dom.wrap_children(root, tree, &descriptor);
        self.normalize();
    }

    fn unwrap_inline(&mut self, tree: Range<usize>, names: &[String]) {
        let root = self.dom.root();
        self.dom.unwrap(root, tree, names);
        self.normalize();
    }

    /// Deletes a flat range. Content goes first; then every separator the
    /// range contained is removed by merging the blocks around it.
    pub(crate) fn delete_range(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        let separators = self.dom.separator_flat_offsets();
        let before = separators.iter().filter(|&&s| s < range.start).count();
        let inside = separators.iter().filter(|&&s| range.contains(&s)).count();
        let surviving = separators.len() - inside;

        let tree = self.tree_range(&range);
        let root = self.dom.root();
        let blocks = self.dom.lowest_block_level_elements(root, tree.clone());
        // Right to left, so root-level offsets stay valid.
        for (block, intersection) in blocks.into_iter().rev() {
            if intersection.is_empty() && !tree.is_empty() {
                continue;
            }
            let whole = intersection.start == 0 && intersection.end == self.dom.len(block);
            if block != root && whole && !intersection.is_empty() {
                self.dom.clear_children(block);
            } else {
                self.dom.delete_characters(block, intersection);
            }
        }

        let merges = self
            .dom
            .paragraph_separators()
            .len()
            .saturating_sub(surviving);
        debug!("delete {range:?}: {inside} separators, {merges} merges");
        for _ in 0..merges {
            if !self.dom.merge_blocks_at_separator(before) {
                break;
            }
        }
        self.normalize();
    }

    /// Inserts text at a flat offset and returns the flat offset after it.
    fn insert_text(&mut self, at: usize, text: &str) -> usize {
        let mut at = at;
        for segment in text.split_inclusive([PARAGRAPH_SEPARATOR, LINE_SEPARATOR]) {
            let (body, terminator) = match segment.chars().last() {
                Some(c @ (PARAGRAPH_SEPARATOR | LINE_SEPARATOR)) => {
                    (&segment[..segment.len() - c.len_utf8()], Some(c))
                }
                _ => (segment, None),
            };

            if !body.is_empty() {
                let (block, local) = self.dom.block_at_flat(at);
                self.dom
                    .insert_str_inheriting(block, body, local, Preference::Left);
                at += body.chars().count();
            }

            match terminator {
                Some(PARAGRAPH_SEPARATOR) => {
                    let (block, local) = self.dom.block_at_flat(at);
                    self.dom.break_paragraph(block, local);
                    at += 1;
                }
                Some(_) => {
                    let br = self.dom.create_element("br", Vec::new());
                    let (block, local) = self.dom.block_at_flat(at);
                    self.dom.insert_node(block, local, br);
                    at += 1;
                }
                None => {}
            }
        }
        self.normalize();
        at
    }

    fn insert_attachment(&mut self, at: usize, node: NodeId) -> Outcome {
        let (block, local) = self.dom.block_at_flat(at);
        self.dom.insert_node(block, local, node);
        Outcome::caret(at..at + 1)
    }

    /// Puts a rule between the blocks on either side of `at`, splitting the
    /// block it falls in.
    fn insert_horizontal_rule(&mut self, at: usize) {
        let hr = self.dom.create_element("hr", Vec::new());
        let (block, local) = self.dom.block_at_flat(at);
        if block == self.dom.root() {
            self.dom.insert_node(block, local, hr);
        } else if local == 0 {
            self.dom.insert_before(block, hr);
        } else {
            self.dom.split(block, local);
            self.dom.insert_after(block, hr);
        }
    }

    fn update_image(
        &mut self,
        range: &Range<usize>,
        src: Option<String>,
        alignment: Option<ImageAlignment>,
        size: Option<ImageSize>,
    ) {
        let root = self.dom.root();
        let tree = self.tree_range(range);
        let node = self.dom.lowest_element_node_wrapping(root, tree);
        let Some(el) = self.dom.element(node).filter(|el| el.name == "img") else {
            debug!("no image at {range:?}");
            return;
        };

        let mut image = Image::from_element(el);
        let old: Vec<String> = el.attributes.iter().map(|a| a.name.clone()).collect();
        if src.is_some() {
            image.src = src;
        }
        if alignment.is_some() {
            image.alignment = alignment;
        }
        if size.is_some() {
            image.size = size;
        }

        for name in old {
            self.dom.remove_attribute(node, &name);
        }
        for attribute in image.to_attributes() {
            self.dom
                .set_attribute(node, &attribute.name, attribute.value);
        }
    }

    pub(crate) fn load_html(&mut self, html: &str) {
        let html = self.processors.process_input(html);
        self.dom = markup::parse(&html);
    }
}
