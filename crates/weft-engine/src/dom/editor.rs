//! Range-driven structural edits.
//!
//! Every range is in tree coordinates relative to the node it is applied
//! to, and must lie within that node (`range.end <= len`), otherwise the
//! call panics.

use std::ops::Range;

use log::{debug, trace};

use super::element::{self, ElementDescriptor};
use super::{Dom, NodeId, NodeKind, Preference};

/// Byte offset of the `chars`-th character of `text`.
fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

impl Dom {
    fn assert_in_bounds(&self, node: NodeId, range: &Range<usize>) {
        assert!(
            range.start <= range.end && range.end <= self.len(node),
            "range {range:?} out of bounds (length {})",
            self.len(node)
        );
    }

    // ====== Deletion ======

    /// Deletes `range` from `node`. A range covering the whole node removes
    /// the node itself (the root instead loses all of its children).
    pub fn delete_characters(&mut self, node: NodeId, range: Range<usize>) {
        self.assert_in_bounds(node, &range);
        if range.is_empty() {
            return;
        }

        if range.start == 0 && range.end == self.len(node) {
            if node == self.root {
                self.clear_children(node);
            } else {
                self.remove(node);
            }
            return;
        }

        match self.kind(node) {
            NodeKind::Text(text) => {
                let mut text = text.clone();
                let bytes = byte_offset(&text, range.start)..byte_offset(&text, range.end);
                text.replace_range(bytes, "");
                self.set_text(node, text);
            }
            NodeKind::Element(_) => {
                for (child, intersection) in self.child_nodes(node, range, Preference::Left) {
                    self.delete_characters(child, intersection);
                }
            }
            NodeKind::Comment(_) => unreachable!("a comment is one unit"),
        }
    }

    // ====== Splitting ======

    /// Splits `node` at `location`, leaving the content before it in place
    /// and moving the rest into a new right-hand sibling, which is returned.
    ///
    /// No-op at either end of the node.
    pub fn split(&mut self, node: NodeId, location: usize) -> Option<NodeId> {
        assert!(
            location <= self.len(node),
            "split location {location} out of bounds (length {})",
            self.len(node)
        );
        if location == 0 || location == self.len(node) {
            return None;
        }
        assert!(
            self.parent(node).is_some(),
            "cannot split a node without a parent"
        );

        match self.kind(node) {
            NodeKind::Text(text) => {
                let at = byte_offset(text, location);
                let (left, right) = (text[..at].to_string(), text[at..].to_string());
                self.set_text(node, left);
                let sibling = self.create_text(right);
                self.insert_after(node, sibling);
                Some(sibling)
            }
            NodeKind::Element(_) => {
                let (index, offset) = self.index_of_child_node(node, location, Preference::Left);
                let child = self.children(node)[index];
                let first_moved = if offset == 0 {
                    index
                } else {
                    self.split(child, offset);
                    index + 1
                };

                let moved = self.children(node)[first_moved..].to_vec();
                let sibling = self.shallow_clone(node);
                self.insert_after(node, sibling);
                for child in moved {
                    self.append_child(sibling, child);
                }
                Some(sibling)
            }
            NodeKind::Comment(_) => unreachable!("a comment is one unit"),
        }
    }

    /// Splits `node` at both ends of `range` and returns the node that now
    /// covers exactly `range`.
    pub fn split_for_range(&mut self, node: NodeId, range: Range<usize>) -> NodeId {
        self.assert_in_bounds(node, &range);
        if range.end < self.len(node) {
            self.split(node, range.end);
        }
        if range.start > 0 {
            if let Some(right) = self.split(node, range.start) {
                return right;
            }
        }
        node
    }

    // ====== Insertion ======

    /// Inserts plain text at `location`, at block level: the text does not
    /// pick up the inline formatting around it.
    pub fn insert_str(&mut self, node: NodeId, text: &str, location: usize) {
        self.assert_in_bounds(node, &(location..location));
        let Some((block, range)) = self
            .lowest_block_level_elements(node, location..location)
            .into_iter()
            .next()
        else {
            return;
        };
        self.insert_text_in_block(block, range.start, text);
    }

    pub(crate) fn insert_text_in_block(&mut self, block: NodeId, location: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.children(block).is_empty() {
            self.insert_text_at_index(block, 0, text);
            return;
        }

        let index = self.child_boundary(block, location);
        self.insert_text_at_index(block, index, text);
    }

    /// Child index of the boundary at `location`, splitting the child that
    /// straddles it.
    fn child_boundary(&mut self, element: NodeId, location: usize) -> usize {
        let (index, offset) = self.index_of_child_node(element, location, Preference::Left);
        let child = self.children(element)[index];
        if offset == 0 {
            index
        } else if offset == self.len(child) {
            index + 1
        } else {
            self.split(child, offset);
            index + 1
        }
    }

    /// Adds text between children `index - 1` and `index`, extending an
    /// adjacent text node when there is one.
    pub fn insert_text_at_index(&mut self, parent: NodeId, index: usize, text: &str) {
        let children = self.children(parent).to_vec();

        if let Some(&previous) = index.checked_sub(1).and_then(|i| children.get(i)) {
            if let Some(current) = self.text_content(previous) {
                let joined = format!("{current}{text}");
                self.set_text(previous, joined);
                return;
            }
        }
        if let Some(&next) = children.get(index) {
            if let Some(current) = self.text_content(next) {
                let joined = format!("{text}{current}");
                self.set_text(next, joined);
                return;
            }
        }

        let node = self.create_text(text);
        self.insert_child(parent, index, node);
    }

    /// Inserts text into the leaf at `location` so that it inherits the
    /// leaf's inline formatting.
    pub fn insert_str_inheriting(
        &mut self,
        node: NodeId,
        text: &str,
        location: usize,
        preference: Preference,
    ) {
        self.assert_in_bounds(node, &(location..location));
        if text.is_empty() {
            return;
        }

        if let Some(current) = self.text_content(node) {
            let mut current = current.to_string();
            current.insert_str(byte_offset(&current, location), text);
            self.set_text(node, current);
            return;
        }

        if self.children(node).is_empty() {
            self.insert_text_at_index(node, 0, text);
            return;
        }

        let (index, offset) = self.index_of_child_node(node, location, preference);
        let child = self.children(node)[index];
        if self.is_text(child) || self.is_container(child) {
            self.insert_str_inheriting(child, text, offset, preference);
        } else {
            let at = if offset == 0 { index } else { index + 1 };
            self.insert_text_at_index(node, at, text);
        }
    }

    /// Replaces `range` with `text`.
    ///
    /// With `inherit_style` the text goes into the first leaf the range
    /// touches and keeps its formatting; otherwise it is inserted at block
    /// level after deleting the range.
    pub fn replace_characters(
        &mut self,
        node: NodeId,
        range: Range<usize>,
        text: &str,
        inherit_style: bool,
    ) {
        self.assert_in_bounds(node, &range);
        let inserted = text.chars().count();

        if inherit_style && !text.is_empty() {
            let preference = if range.is_empty() {
                Preference::Left
            } else {
                Preference::Right
            };
            self.insert_str_inheriting(node, text, range.start, preference);
            self.delete_characters(node, range.start + inserted..range.end + inserted);
        } else {
            self.delete_characters(node, range.clone());
            if node == self.root || self.contains(node) {
                self.insert_str(node, text, range.start);
            }
        }
    }

    /// Inserts a detached node at `location`, at block level.
    pub fn insert_node(&mut self, node: NodeId, location: usize, new_node: NodeId) {
        self.assert_in_bounds(node, &(location..location));
        let (block, range) = self
            .lowest_block_level_elements(node, location..location)
            .into_iter()
            .next()
            .unwrap_or((node, location..location));

        let index = if self.children(block).is_empty() {
            0
        } else {
            self.child_boundary(block, range.start)
        };
        self.insert_child(block, index, new_node);
    }

    // ====== Wrapping ======

    /// Wraps `range` of `node` in a new element. Inline descriptors wrap
    /// each lowest block separately.
    pub fn wrap(&mut self, node: NodeId, range: Range<usize>, descriptor: &ElementDescriptor) {
        self.assert_in_bounds(node, &range);
        if descriptor.is_block_level() {
            self.force_wrap(node, range, descriptor);
            return;
        }
        for (block, intersection) in self.lowest_block_level_elements(node, range) {
            self.force_wrap_children(block, intersection, descriptor);
        }
    }

    /// Wraps `range` after removing any element named like the descriptor
    /// (or one of its equivalents) from it.
    pub fn wrap_children(
        &mut self,
        node: NodeId,
        range: Range<usize>,
        descriptor: &ElementDescriptor,
    ) {
        self.assert_in_bounds(node, &range);
        let mut names = descriptor.matching_names.clone();
        if !names.contains(&descriptor.name) {
            names.push(descriptor.name.clone());
        }
        self.unwrap(node, range.clone(), &names);

        if descriptor.is_block_level() {
            self.force_wrap_children(node, range, descriptor);
            return;
        }
        for (block, intersection) in self.lowest_block_level_elements(node, range.clone()) {
            if intersection.is_empty() && !range.is_empty() {
                continue;
            }
            self.force_wrap_children(block, intersection, descriptor);
        }
    }

    fn force_wrap(&mut self, node: NodeId, range: Range<usize>, descriptor: &ElementDescriptor) {
        let full = range.start == 0 && range.end == self.len(node);
        let legal = descriptor.is_block_level() || !self.is_block_level(node);
        if full && legal && self.parent(node).is_some() {
            self.wrap_node(node, &descriptor.name, descriptor.attributes.clone());
            return;
        }
        self.force_wrap_children(node, range, descriptor);
    }

    fn force_wrap_children(
        &mut self,
        node: NodeId,
        range: Range<usize>,
        descriptor: &ElementDescriptor,
    ) -> Option<NodeId> {
        if !self.is_container(node) {
            return None;
        }

        if range.is_empty() {
            let index = if self.children(node).is_empty() {
                0
            } else {
                self.child_boundary(node, range.start)
            };
            let wrapper = self.create_element(&descriptor.name, descriptor.attributes.clone());
            self.insert_child(node, index, wrapper);
            return Some(wrapper);
        }

        let pieces = self.child_nodes(node, range, Preference::Left);
        let (first, first_range) = pieces.first()?.clone();
        let mut nodes: Vec<NodeId> = pieces.iter().map(|(child, _)| *child).collect();

        nodes[0] = self.split_for_range(first, first_range);
        if pieces.len() > 1 {
            let (last, last_range) = pieces[pieces.len() - 1].clone();
            let last_index = nodes.len() - 1;
            nodes[last_index] = self.split_for_range(last, last_range);
        }

        let Some(index) = self.index_in_parent(nodes[0]) else {
            unreachable!("wrapped children belong to the node");
        };
        let wrapper = self.create_element(&descriptor.name, descriptor.attributes.clone());
        self.insert_child(node, index, wrapper);
        for child in nodes {
            self.append_child(wrapper, child);
        }
        trace!("wrapped {} units in <{}>", self.len(wrapper), descriptor.name);

        Some(self.merge_with_equal_siblings(wrapper))
    }

    /// Merges an inline element with equal neighbours (same name, same
    /// attribute set) and returns the surviving element.
    fn merge_with_equal_siblings(&mut self, node: NodeId) -> NodeId {
        if self.is_block_level(node) || !self.is_container(node) {
            return node;
        }
        let mut node = node;

        if let Some(previous) = self.previous_sibling(node) {
            if self.equal_elements(previous, node) {
                for child in self.children(node).to_vec() {
                    self.append_child(previous, child);
                }
                self.remove(node);
                node = previous;
            }
        }
        if let Some(next) = self.next_sibling(node) {
            if self.equal_elements(node, next) {
                for child in self.children(next).to_vec() {
                    self.append_child(node, child);
                }
                self.remove(next);
            }
        }
        node
    }

    fn equal_elements(&self, a: NodeId, b: NodeId) -> bool {
        match (self.element(a), self.element(b)) {
            (Some(x), Some(y)) => {
                x.name == y.name
                    && !element::is_void(&x.name)
                    && element::same_attributes(&x.attributes, &y.attributes)
            }
            _ => false,
        }
    }

    /// Wraps whole blocks (or root-level inline runs) touched by `range` in
    /// a new block element. Adjacent siblings share one wrapper.
    pub fn wrap_blocks(&mut self, range: Range<usize>, descriptor: &ElementDescriptor) -> Vec<NodeId> {
        let root = self.root;
        self.assert_in_bounds(root, &range);

        let mut units: Vec<NodeId> = Vec::new();
        for (block, intersection) in self.lowest_block_level_elements(root, range.clone()) {
            if intersection.is_empty() && !range.is_empty() {
                continue;
            }
            if block == root {
                let pieces = self.child_nodes(root, intersection, Preference::Left);
                units.extend(pieces.into_iter().map(|(child, _)| child));
            } else {
                units.push(block);
            }
        }

        let mut groups: Vec<Vec<NodeId>> = Vec::new();
        for unit in units {
            match groups.last_mut() {
                Some(group) if group.last().and_then(|&l| self.next_sibling(l)) == Some(unit) => {
                    group.push(unit)
                }
                _ => groups.push(vec![unit]),
            }
        }

        let mut wrappers = Vec::new();
        for group in groups {
            let wrapper = self.create_element(&descriptor.name, descriptor.attributes.clone());
            self.insert_before(group[0], wrapper);
            for unit in group {
                self.append_child(wrapper, unit);
            }
            wrappers.push(wrapper);
        }
        wrappers
    }

    // ====== Unwrapping ======

    /// Removes elements named in `names` from `range`: matching elements
    /// fully inside the range are replaced by their children, partially
    /// covered ones are split first so only the covered part is unwrapped.
    pub fn unwrap(&mut self, node: NodeId, range: Range<usize>, names: &[String]) {
        self.assert_in_bounds(node, &range);
        if range.is_empty() || !self.is_container(node) || self.children(node).is_empty() {
            return;
        }

        for (child, intersection) in self.child_nodes(node, range.clone(), Preference::Left) {
            if self.is_element(child) {
                self.unwrap(child, intersection, names);
            }
        }

        if node != self.root && self.is_named(node, names) {
            let target = self.split_for_range(node, range);
            self.replace_with_children(target);
        }
    }

    // ====== Paragraphs ======

    /// Removes the `index`-th paragraph separator by moving the content that
    /// follows it into the preceding block. Returns `false` when there is
    /// no such separator or it cannot be removed structurally (next to a
    /// horizontal rule).
    pub fn merge_blocks_at_separator(&mut self, index: usize) -> bool {
        let separators = self.paragraph_separators();
        let Some(&(_, left_leaf)) = separators.get(index) else {
            return false;
        };
        let Some(right_leaf) = self.next_leaf(left_leaf) else {
            return false;
        };
        if [left_leaf, right_leaf]
            .iter()
            .any(|&leaf| self.is_void(leaf) && self.is_block_level(leaf))
        {
            return false;
        }

        let left_block = self.nearest_block(left_leaf);
        let right_block = self.nearest_block(right_leaf);
        let right_holds_left = right_block == left_block || self.is_ancestor_of(right_block, left_leaf);

        let moved: Vec<NodeId> = if right_holds_left {
            let anchor = self.child_on_path(right_block, right_leaf);
            let parent = right_block;
            let start = self.index_in_parent(anchor).unwrap_or_default();
            self.children(parent)[start..]
                .iter()
                .copied()
                .take_while(|&c| c == anchor || !self.is_block_level(c))
                .collect()
        } else {
            self.children(right_block).to_vec()
        };

        let insert_at = if left_block == left_leaf {
            self.children(left_block).len()
        } else {
            let child = self.child_on_path(left_block, left_leaf);
            self.index_in_parent(child).map(|i| i + 1).unwrap_or_default()
        };

        debug!(
            "merging separator {index}: moving {} nodes into <{}>",
            moved.len(),
            self.name(left_block).unwrap_or_default()
        );
        for (offset, node) in moved.into_iter().enumerate() {
            self.insert_child(left_block, insert_at + offset, node);
        }

        if !right_holds_left {
            let parent = self.parent(right_block);
            self.remove(right_block);
            if let Some(parent) = parent {
                self.prune_empty(parent);
            }
        }
        self.normalize(left_block);
        true
    }

    /// The child of `ancestor` on the path down to `node` (or `node` itself
    /// when it is a direct child).
    fn child_on_path(&self, ancestor: NodeId, node: NodeId) -> NodeId {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            if parent == ancestor {
                return current;
            }
            current = parent;
        }
        panic!("node is not a descendant of the given ancestor");
    }

    /// Removes `node` and its ancestors while they are empty containers.
    fn prune_empty(&mut self, node: NodeId) {
        let mut current = node;
        while current != self.root
            && self.is_container(current)
            && self.len(current) == 0
            && !self.children(current).iter().any(|&c| self.is_element(c))
        {
            let Some(parent) = self.parent(current) else {
                break;
            };
            self.remove(current);
            current = parent;
        }
    }

    /// Starts a new paragraph at `location` inside `block`.
    ///
    /// The block is split in two (an empty copy is added when the location is
    /// at either edge). Inline content sitting directly in the root is first
    /// wrapped in a `p`; inside `pre` a line feed is inserted instead.
    pub fn break_paragraph(&mut self, block: NodeId, location: usize) {
        self.assert_in_bounds(block, &(location..location));
        let (block, location) = if block == self.root {
            match self.paragraph_for_root_run(location) {
                Some(found) => found,
                None => return,
            }
        } else {
            (block, location)
        };

        if self.name(block) == Some("pre") {
            self.insert_text_in_block(block, location, "\n");
            return;
        }

        let length = self.len(block);
        if location == 0 || location == length {
            let copy = self.shallow_clone(block);
            if location == 0 && length > 0 {
                self.insert_before(block, copy);
            } else {
                self.insert_after(block, copy);
            }
        } else {
            self.split(block, location);
        }
    }

    /// Wraps the root-level inline run around `location` in a `p` and
    /// returns it with the location translated into it. When the location
    /// sits after a trailing block an empty paragraph is appended and
    /// nothing else needs to happen.
    fn paragraph_for_root_run(&mut self, location: usize) -> Option<(NodeId, usize)> {
        let root = self.root;
        if self.children(root).is_empty() {
            for _ in 0..2 {
                let p = self.create_element("p", Vec::new());
                self.append_child(root, p);
            }
            return None;
        }

        let (mut index, mut offset) = self.index_of_child_node(root, location, Preference::Left);
        let children = self.children(root).to_vec();
        if self.is_block_level(children[index])
            && offset == self.len(children[index])
            && index + 1 < children.len()
        {
            index += 1;
            offset = 0;
        }
        if self.is_block_level(children[index]) {
            let p = self.create_element("p", Vec::new());
            if offset == 0 {
                self.insert_child(root, index, p);
            } else {
                self.insert_child(root, index + 1, p);
            }
            return None;
        }

        let mut first = index;
        while first > 0 && !self.is_block_level(children[first - 1]) {
            first -= 1;
        }
        let mut last = index;
        while last + 1 < children.len() && !self.is_block_level(children[last + 1]) {
            last += 1;
        }

        let before_index: usize = children[first..index].iter().map(|&c| self.len(c)).sum();
        let p = self.create_element("p", Vec::new());
        self.insert_child(root, first, p);
        for &child in &children[first..=last] {
            self.append_child(p, child);
        }
        Some((p, before_index + offset))
    }

    // ====== Normalization ======

    /// Coalesces adjacent text nodes and drops empty text nodes that have
    /// siblings, throughout the subtree.
    pub fn normalize(&mut self, node: NodeId) {
        if !self.is_container(node) {
            return;
        }

        let mut index = 0;
        while index < self.children(node).len() {
            let child = self.children(node)[index];
            if let Some(next) = self.children(node).get(index + 1).copied() {
                if let (Some(a), Some(b)) = (self.text_content(child), self.text_content(next)) {
                    let joined = format!("{a}{b}");
                    self.set_text(child, joined);
                    self.remove(next);
                    continue;
                }
            }
            index += 1;
        }

        if self.children(node).len() > 1 {
            for child in self.children(node).to_vec() {
                if self.is_text(child) && self.len(child) == 0 {
                    self.remove(child);
                }
            }
        }

        for child in self.children(node).to_vec() {
            self.normalize(child);
        }
    }
}
