//! Range addressing over the tree.
//!
//! Offsets here are *tree* offsets: the sum of node lengths. Flat text adds
//! one paragraph separator unit after some leaves (see
//! [`Dom::paragraph_separators`]); [`Dom::flat_to_tree`] and
//! [`Dom::tree_to_flat`] convert between the two.

use std::ops::Range;

use super::{Dom, NodeId};

/// Which side wins when a location sits exactly on a boundary between two
/// children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preference {
    #[default]
    Left,
    Right,
}

impl Dom {
    /// Resolves `location` inside `element` to `(child index, offset in child)`.
    ///
    /// Location 0 is always `(0, 0)`. Panics if the element has no children
    /// or the location is past its end.
    pub fn index_of_child_node(
        &self,
        element: NodeId,
        location: usize,
        preference: Preference,
    ) -> (usize, usize) {
        let children = self.children(element);
        assert!(
            !children.is_empty(),
            "index_of_child_node called on a node without children"
        );
        assert!(
            location <= self.len(element),
            "location {location} out of bounds (length {})",
            self.len(element)
        );

        if location == 0 {
            return (0, 0);
        }

        let mut start = 0;
        for (index, &child) in children.iter().enumerate() {
            let end = start + self.len(child);
            let hit = match preference {
                Preference::Left => location <= end,
                Preference::Right => location < end,
            };
            if hit {
                return (index, location - start);
            }
            start = end;
        }

        let last = children.len() - 1;
        (last, self.len(children[last]))
    }

    /// Children of `element` intersecting `range`, each with the
    /// intersection expressed in the child's own coordinates.
    ///
    /// A non-empty range returns every child with a non-empty intersection;
    /// an empty range returns the one child picked by
    /// [`Dom::index_of_child_node`].
    pub fn child_nodes(
        &self,
        element: NodeId,
        range: Range<usize>,
        preference: Preference,
    ) -> Vec<(NodeId, Range<usize>)> {
        assert!(
            range.start <= range.end && range.end <= self.len(element),
            "range {range:?} out of bounds (length {})",
            self.len(element)
        );
        let children = self.children(element);
        if children.is_empty() {
            return Vec::new();
        }

        if range.is_empty() {
            let (index, offset) = self.index_of_child_node(element, range.start, preference);
            return vec![(children[index], offset..offset)];
        }

        let mut result = Vec::new();
        let mut start = 0;
        for &child in children {
            let end = start + self.len(child);
            let from = range.start.max(start);
            let to = range.end.min(end);
            if from < to {
                result.push((child, from - start..to - start));
            }
            if end >= range.end {
                break;
            }
            start = end;
        }
        result
    }

    /// The deepest block-level elements covering `range`, with the part of
    /// the range each one covers (in its own coordinates).
    pub fn lowest_block_level_elements(
        &self,
        element: NodeId,
        range: Range<usize>,
    ) -> Vec<(NodeId, Range<usize>)> {
        self.lowest_block_level_elements_with(element, range, Preference::Left)
    }

    pub fn lowest_block_level_elements_with(
        &self,
        element: NodeId,
        range: Range<usize>,
        preference: Preference,
    ) -> Vec<(NodeId, Range<usize>)> {
        let mut result = Vec::new();
        let mut pending: Option<Range<usize>> = None;

        for (child, intersection) in self.child_nodes(element, range.clone(), preference) {
            let child_start = self.start_within(element, child);

            if self.is_block_level(child) && self.is_container(child) {
                if let Some(run) = pending.take() {
                    result.push((element, run));
                }
                result.extend(self.lowest_block_level_elements_with(
                    child,
                    intersection,
                    preference,
                ));
            } else {
                let absolute = child_start + intersection.start..child_start + intersection.end;
                pending = Some(match pending {
                    Some(run) => run.start..absolute.end,
                    None => absolute,
                });
            }
        }

        if let Some(run) = pending {
            result.push((element, run));
        }
        if result.is_empty() {
            result.push((element, range));
        }
        result
    }

    /// Offset of `child` inside its parent `element`.
    fn start_within(&self, element: NodeId, child: NodeId) -> usize {
        self.children(element)
            .iter()
            .take_while(|&&c| c != child)
            .map(|&c| self.len(c))
            .sum()
    }

    /// The deepest element whose span fully contains `range`. Void elements
    /// count, so an image's own unit resolves to the `img`.
    pub fn lowest_element_node_wrapping(&self, element: NodeId, range: Range<usize>) -> NodeId {
        let candidates = self.child_nodes(element, range.clone(), Preference::Left);
        if let [(child, intersection)] = candidates.as_slice() {
            if self.is_element(*child) && intersection.len() == range.len() {
                return self.lowest_element_node_wrapping(*child, intersection.clone());
            }
        }
        element
    }

    /// Nearest enclosing block-level container, starting with the node
    /// itself. Falls back to the root.
    pub fn nearest_block(&self, node: NodeId) -> NodeId {
        if self.is_block_level(node) && self.is_container(node) {
            return node;
        }
        self.ancestors(node)
            .find(|&a| self.is_block_level(a))
            .unwrap_or(self.root)
    }

    // ====== Leaves and paragraph separators ======

    /// A leaf is a unit-bearing node with nothing addressable below it:
    /// non-empty text, a comment, a void element, or an element that only
    /// holds empty text.
    pub fn is_leaf(&self, node: NodeId) -> bool {
        if node == self.root {
            return false;
        }
        if self.is_text(node) {
            return self.len(node) > 0;
        }
        if self.is_comment(node) || self.is_void(node) {
            return true;
        }
        self.len(node) == 0 && !self.children(node).iter().any(|&c| self.is_element(c))
    }

    /// Leaves under `node` in document order.
    pub fn leaves(&self, node: NodeId) -> Vec<NodeId> {
        self.descendants(node)
            .into_iter()
            .filter(|&n| self.is_leaf(n))
            .collect()
    }

    fn is_significant(&self, node: NodeId) -> bool {
        !(self.is_text(node) && self.len(node) == 0)
    }

    fn next_significant_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let index = self.index_in_parent(node)?;
        self.children(parent)[index + 1..]
            .iter()
            .copied()
            .find(|&s| self.is_significant(s))
    }

    fn has_right_block_sibling(&self, node: NodeId) -> bool {
        self.next_significant_sibling(node)
            .is_some_and(|s| self.is_block_level(s))
    }

    fn is_last_in_block_ending_ancestor(&self, node: NodeId) -> bool {
        let Some(parent) = self.parent(node) else {
            return false;
        };
        if parent == self.root {
            return false;
        }
        let last = self
            .children(parent)
            .iter()
            .rev()
            .copied()
            .find(|&c| self.is_significant(c));
        if last != Some(node) {
            return false;
        }
        self.is_block_level(parent)
            || self.has_right_block_sibling(parent)
            || self.is_last_in_block_ending_ancestor(parent)
    }

    /// Whether flat text places a paragraph separator right after `leaf`.
    /// The last leaf of the tree never gets one; every other block-level
    /// leaf (an empty paragraph, a rule) always does.
    pub fn needs_closing_separator(&self, leaf: NodeId) -> bool {
        self.is_block_level(leaf)
            || self.has_right_block_sibling(leaf)
            || self.is_last_in_block_ending_ancestor(leaf)
    }

    /// `(tree offset, leaf)` for every paragraph separator, in order. The
    /// offset is the tree position right after the leaf.
    pub fn paragraph_separators(&self) -> Vec<(usize, NodeId)> {
        let mut leaves = Vec::new();
        self.collect_leaf_ends(self.root, 0, &mut leaves);
        leaves.pop();
        leaves
            .into_iter()
            .filter(|&(_, leaf)| self.needs_closing_separator(leaf))
            .collect()
    }

    fn collect_leaf_ends(&self, node: NodeId, start: usize, out: &mut Vec<(usize, NodeId)>) {
        if self.is_leaf(node) {
            out.push((start + self.len(node), node));
            return;
        }
        let mut offset = start;
        for &child in self.children(node) {
            self.collect_leaf_ends(child, offset, out);
            offset += self.len(child);
        }
    }

    /// The leaf following `leaf` in document order.
    pub fn next_leaf(&self, leaf: NodeId) -> Option<NodeId> {
        let leaves = self.leaves(self.root);
        let index = leaves.iter().position(|&l| l == leaf)?;
        leaves.get(index + 1).copied()
    }

    /// Number of flat units: tree length plus paragraph separators.
    pub fn flat_len(&self) -> usize {
        self.len(self.root) + self.paragraph_separators().len()
    }

    /// Flat offsets of the separators, in order.
    pub fn separator_flat_offsets(&self) -> Vec<usize> {
        self.paragraph_separators()
            .iter()
            .enumerate()
            .map(|(k, &(tree, _))| tree + k)
            .collect()
    }

    pub fn flat_to_tree(&self, flat: usize) -> usize {
        let before = self
            .separator_flat_offsets()
            .into_iter()
            .filter(|&s| s < flat)
            .count();
        flat - before
    }

    pub fn tree_to_flat(&self, tree: usize) -> usize {
        let before = self
            .paragraph_separators()
            .into_iter()
            .filter(|&(s, _)| s < tree)
            .count();
        tree + before
    }

    /// Block and block-local offset where content typed at flat offset
    /// `flat` lands.
    ///
    /// Right after a separator the position belongs to the next paragraph,
    /// anywhere else the left neighbour wins.
    pub fn block_at_flat(&self, flat: usize) -> (NodeId, usize) {
        let separators = self.paragraph_separators();
        let after_separator = separators
            .iter()
            .enumerate()
            .find(|&(k, &(tree, _))| tree + k + 1 == flat)
            .map(|(_, &(_, leaf))| leaf);

        if let Some(next) = after_separator.and_then(|leaf| self.next_leaf(leaf)) {
            let block = self.nearest_block(next);
            let local = if block == next {
                0
            } else {
                self.offset_of(next) - self.offset_of(block)
            };
            return (block, local);
        }

        let tree = self.flat_to_tree(flat);
        match self
            .lowest_block_level_elements_with(self.root, tree..tree, Preference::Left)
            .first()
        {
            Some((block, range)) => (*block, range.start),
            None => (self.root, tree),
        }
    }

    /// Whether every leaf touched by `range` sits inside an element with one
    /// of `names`. An empty range checks the leaf on its left.
    pub fn covered_by(&self, range: Range<usize>, names: &[String]) -> bool {
        let mut leaves = Vec::new();
        self.collect_leaf_ends(self.root, 0, &mut leaves);
        let covered = |leaf: NodeId| {
            self.is_named(leaf, names) || self.ancestors(leaf).any(|a| self.is_named(a, names))
        };

        if range.is_empty() {
            return leaves
                .iter()
                .find(|&&(end, leaf)| end >= range.start && end - self.len(leaf) < range.start.max(1))
                .is_some_and(|&(_, leaf)| covered(leaf));
        }

        let touched: Vec<NodeId> = leaves
            .iter()
            .filter(|&&(end, leaf)| {
                let start = end - self.len(leaf);
                start < range.end && end > range.start
            })
            .map(|&(_, leaf)| leaf)
            .collect();
        !touched.is_empty() && touched.into_iter().all(covered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::invariants;
    use crate::markup;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn dom(html: &str) -> Dom {
        let dom = markup::parse(html);
        invariants::check(&dom);
        dom
    }

    // ====== index_of_child_node ======

    #[rstest]
    #[case(0, Preference::Left, (0, 0))]
    #[case(0, Preference::Right, (0, 0))]
    #[case(3, Preference::Left, (0, 3))]
    #[case(3, Preference::Right, (1, 0))]
    #[case(4, Preference::Left, (1, 1))]
    #[case(9, Preference::Left, (2, 3))]
    #[case(9, Preference::Right, (2, 3))]
    fn test_index_of_child_node(
        #[case] location: usize,
        #[case] preference: Preference,
        #[case] expected: (usize, usize),
    ) {
        let dom = dom("foo<b>bar</b>baz");
        assert_eq!(
            dom.index_of_child_node(dom.root(), location, preference),
            expected
        );
    }

    #[test]
    #[should_panic(expected = "without children")]
    fn test_index_of_child_node_without_children_panics() {
        let mut dom = Dom::empty();
        let p = dom.create_element("p", vec![]);
        dom.append_child(dom.root(), p);
        dom.index_of_child_node(p, 0, Preference::Left);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_index_of_child_node_out_of_bounds_panics() {
        let dom = dom("abc");
        dom.index_of_child_node(dom.root(), 4, Preference::Left);
    }

    // ====== child_nodes ======

    #[test]
    fn test_child_nodes_non_empty_range() {
        let dom = dom("foo<b>bar</b>baz");
        let children = dom.children(dom.root()).to_vec();
        assert_eq!(
            dom.child_nodes(dom.root(), 2..7, Preference::Left),
            vec![(children[0], 2..3), (children[1], 0..3), (children[2], 0..1)]
        );
    }

    #[test]
    fn test_child_nodes_empty_range_uses_preference() {
        let dom = dom("foo<b>bar</b>baz");
        let children = dom.children(dom.root()).to_vec();
        assert_eq!(
            dom.child_nodes(dom.root(), 3..3, Preference::Left),
            vec![(children[0], 3..3)]
        );
        assert_eq!(
            dom.child_nodes(dom.root(), 3..3, Preference::Right),
            vec![(children[1], 0..0)]
        );
    }

    // ====== lowest block lookups ======

    #[test]
    fn test_lowest_block_level_elements() {
        let dom = dom("<p>Hello</p><blockquote><p>World</p></blockquote>");
        let root = dom.root();
        let p1 = dom.children(root)[0];
        let quote = dom.children(root)[1];
        let p2 = dom.children(quote)[0];

        assert_eq!(
            dom.lowest_block_level_elements(root, 2..8),
            vec![(p1, 2..5), (p2, 0..3)]
        );
    }

    #[test]
    fn test_lowest_block_level_elements_inline_run_belongs_to_parent() {
        let dom = dom("ab<p>cd</p>ef");
        let root = dom.root();
        let p = dom.children(root)[1];
        assert_eq!(
            dom.lowest_block_level_elements(root, 1..6),
            vec![(root, 1..2), (p, 0..2), (root, 4..6)]
        );
    }

    #[test]
    fn test_lowest_element_node_wrapping_reaches_void() {
        let dom = dom("<p>a<img src=\"x.png\">b</p>");
        let img = dom
            .descendants(dom.root())
            .into_iter()
            .find(|&n| dom.name(n) == Some("img"))
            .unwrap();
        assert_eq!(dom.lowest_element_node_wrapping(dom.root(), 1..2), img);
        let p = dom.children(dom.root())[0];
        assert_eq!(dom.lowest_element_node_wrapping(dom.root(), 0..2), p);
    }

    // ====== separators ======

    #[rstest]
    #[case("<p>Hello</p><p>World!</p>", vec![5])]
    #[case("foo<p>bar</p>", vec![3])]
    #[case("<p>a</p>b<p>c</p>", vec![1, 3])]
    #[case("<ul><li>a</li><li>b</li></ul><p>c</p>", vec![1, 3])]
    #[case("<b>bold</b><p>x</p>", vec![4])]
    #[case("a<br>b", vec![])]
    #[case("<p></p><p>x</p>", vec![0])]
    #[case("<p></p>x", vec![0])]
    #[case("a<hr>b", vec![1, 3])]
    fn test_separator_flat_offsets(#[case] html: &str, #[case] expected: Vec<usize>) {
        assert_eq!(dom(html).separator_flat_offsets(), expected);
    }

    #[test]
    fn test_flat_and_tree_coordinates() {
        let dom = dom("<p>Hello</p><p>World!</p>");
        assert_eq!(dom.flat_len(), 12);
        assert_eq!(dom.flat_to_tree(5), 5);
        assert_eq!(dom.flat_to_tree(6), 5);
        assert_eq!(dom.flat_to_tree(12), 11);
        assert_eq!(dom.tree_to_flat(5), 5);
        assert_eq!(dom.tree_to_flat(6), 7);
    }

    #[test]
    fn test_block_at_flat_after_separator_prefers_next_paragraph() {
        let dom = dom("<p></p><p>x</p>");
        let p2 = dom.children(dom.root())[1];
        assert_eq!(dom.block_at_flat(1), (p2, 0));
    }

    #[test]
    fn test_block_at_flat_before_separator_stays_left() {
        let dom = dom("<p>ab</p><p>cd</p>");
        let p1 = dom.children(dom.root())[0];
        assert_eq!(dom.block_at_flat(2), (p1, 2));
    }

    #[test]
    fn test_covered_by() {
        let dom = dom("foo<b>bar</b>baz");
        let bold = crate::dom::element::equivalent_names("strong");
        assert!(dom.covered_by(3..6, &bold));
        assert!(!dom.covered_by(2..6, &bold));
        assert!(dom.covered_by(5..5, &bold));
    }
}
