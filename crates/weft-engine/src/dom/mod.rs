/*!
 * # Document Tree
 *
 * The HTML tree lives in a [`generational_arena::Arena`] owned by [`Dom`].
 * Nodes are addressed by [`NodeId`]; a node stores its parent as an id and
 * never owns it, so there are no reference cycles and a removed node's id
 * simply stops resolving.
 *
 * ## Lengths
 *
 * Every node caches its length in flat units:
 *
 * - text: number of `char`s
 * - comment: 1
 * - void element (`br`, `img`, `hr`, `#unsupported`): 1
 * - any other element: sum of its children
 *
 * Lengths are updated eagerly up the ancestor chain by every primitive that
 * changes content, so `len` is O(1) everywhere.
 *
 * ## Module Structure
 *
 * - **`element`**: block/void/mergeable tables, equivalent names, wrap
 *   descriptors
 * - **`query`**: range addressing (`index_of_child_node`, `child_nodes`,
 *   lowest block lookups, paragraph separators, flat coordinates)
 * - **`editor`**: range edits (delete, split, insert, wrap, unwrap, merge)
 * - **`invariants`**: structural checks used by the test suites
 *
 * Contract violations (stale ids, out-of-bounds ranges, splitting a node
 * without a parent) panic.
 */

pub mod editor;
pub mod element;
pub mod invariants;
pub mod query;

use generational_arena::{Arena, Index};
use weft_syntax::Attribute;

pub use element::{ElementDescriptor, ROOT, UNSUPPORTED, UNSUPPORTED_HTML_ATTRIBUTE};
pub use query::Preference;

/// Handle to a node inside a [`Dom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Index);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub(crate) children: Vec<NodeId>,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.value.as_deref())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Text(String),
    Comment(String),
    Element(Element),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) length: usize,
}

impl Node {
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

#[derive(Debug, Clone)]
pub struct Dom {
    pub(crate) arena: Arena<Node>,
    pub(crate) root: NodeId,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    /// A new tree: the root with a single empty text child.
    pub fn new() -> Self {
        let mut dom = Self::empty();
        let text = dom.create_text("");
        dom.append_child(dom.root, text);
        dom
    }

    /// A tree holding only the root element.
    pub fn empty() -> Self {
        let mut arena = Arena::new();
        let root = NodeId(arena.insert(Node {
            kind: NodeKind::Element(Element {
                name: ROOT.to_string(),
                attributes: Vec::new(),
                children: Vec::new(),
            }),
            parent: None,
            length: 0,
        }));
        Self { arena, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.contains(id.0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.arena
            .get(id.0)
            .unwrap_or_else(|| panic!("stale node id {id:?}"))
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.arena
            .get_mut(id.0)
            .unwrap_or_else(|| panic!("stale node id {id:?}"))
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn len(&self, id: NodeId) -> usize {
        self.node(id).length
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.node(id).kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.node_mut(id).kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    pub fn is_named(&self, id: NodeId, names: &[impl AsRef<str>]) -> bool {
        self.name(id)
            .is_some_and(|name| names.iter().any(|n| n.as_ref() == name))
    }

    /// Children of an element; empty for text and comments.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.element(id).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Text(_))
    }

    pub fn is_comment(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Comment(_))
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Element(_))
    }

    pub fn is_block_level(&self, id: NodeId) -> bool {
        self.name(id).is_some_and(element::is_block_level)
    }

    pub fn is_void(&self, id: NodeId) -> bool {
        self.name(id).is_some_and(element::is_void)
    }

    /// Elements that can hold children.
    pub fn is_container(&self, id: NodeId) -> bool {
        self.is_element(id) && !self.is_void(id)
    }

    pub fn text_content(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Markup text of a node.
    ///
    /// Comments and void elements contribute nothing here even though each
    /// counts as one unit of [`Dom::len`].
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.node(id).kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Comment(_) => {}
            NodeKind::Element(element) => {
                for &child in &element.children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attribute(name))
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: Option<String>) {
        let Some(element) = self.element_mut(id) else {
            panic!("cannot set attribute `{name}` on a non-element node");
        };
        match element.attributes.iter_mut().find(|a| a.name == name) {
            Some(attribute) => attribute.value = value,
            None => element.attributes.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let Some(element) = self.element_mut(id) {
            element.attributes.retain(|a| a.name != name);
        }
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&node| self.parent(node))
    }

    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Absolute offset of the node's first unit from the start of the root.
    pub fn offset_of(&self, id: NodeId) -> usize {
        let mut offset = 0;
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            for &sibling in self.children(parent) {
                if sibling == current {
                    break;
                }
                offset += self.len(sibling);
            }
            current = parent;
        }
        offset
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        index
            .checked_sub(1)
            .map(|i| self.children(parent)[i])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    // ====== Creation ======

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        let text = text.into();
        let length = text.chars().count();
        self.alloc_node(NodeKind::Text(text), length)
    }

    pub fn create_comment(&mut self, body: impl Into<String>) -> NodeId {
        self.alloc_node(NodeKind::Comment(body.into()), 1)
    }

    pub fn create_element(&mut self, name: impl Into<String>, attributes: Vec<Attribute>) -> NodeId {
        let name = name.into();
        let length = usize::from(element::is_void(&name));
        self.alloc_node(
            NodeKind::Element(Element {
                name,
                attributes,
                children: Vec::new(),
            }),
            length,
        )
    }

    pub fn create_unsupported(&mut self, html: impl Into<String>) -> NodeId {
        self.create_element(
            UNSUPPORTED,
            vec![Attribute::new(UNSUPPORTED_HTML_ATTRIBUTE, Some(html))],
        )
    }

    fn alloc_node(&mut self, kind: NodeKind, length: usize) -> NodeId {
        NodeId(self.arena.insert(Node {
            kind,
            parent: None,
            length,
        }))
    }

    /// Detached copy of a node without its children.
    pub fn shallow_clone(&mut self, id: NodeId) -> NodeId {
        match self.node(id).kind.clone() {
            NodeKind::Text(text) => self.create_text(text),
            NodeKind::Comment(body) => self.create_comment(body),
            NodeKind::Element(element) => self.create_element(element.name, element.attributes),
        }
    }

    // ====== Mutation primitives ======

    fn propagate(&mut self, from: Option<NodeId>, removed: usize, added: usize) {
        let mut current = from;
        while let Some(id) = current {
            let node = self.node_mut(id);
            node.length = node.length + added - removed;
            current = node.parent;
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child);
    }

    /// Inserts `child` at `index`, detaching it from any previous parent
    /// first.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        assert!(
            self.is_container(parent),
            "cannot insert a child into {:?}",
            self.node(parent).kind
        );
        assert!(
            child != parent && !self.is_ancestor_of(child, parent),
            "cannot insert a node into its own subtree"
        );

        let mut index = index;
        if self.parent(child) == Some(parent) {
            if let Some(current) = self.index_in_parent(child) {
                if current < index {
                    index -= 1;
                }
            }
        }
        self.detach(child);

        let length = self.len(child);
        let Some(element) = self.element_mut(parent) else {
            unreachable!("checked above");
        };
        assert!(
            index <= element.children.len(),
            "child index {index} out of bounds"
        );
        element.children.insert(index, child);
        self.node_mut(child).parent = Some(parent);
        self.propagate(Some(parent), 0, length);
    }

    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        let (Some(parent), Some(index)) = (self.parent(reference), self.index_in_parent(reference))
        else {
            panic!("cannot insert next to a node without a parent");
        };
        self.insert_child(parent, index, node);
    }

    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) {
        let (Some(parent), Some(index)) = (self.parent(reference), self.index_in_parent(reference))
        else {
            panic!("cannot insert next to a node without a parent");
        };
        self.insert_child(parent, index + 1, node);
    }

    /// Detaches a node from its parent, keeping it alive in the arena.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        let length = self.len(id);
        if let Some(element) = self.element_mut(parent) {
            element.children.retain(|&c| c != id);
        }
        self.node_mut(id).parent = None;
        self.propagate(Some(parent), length, 0);
    }

    /// Detaches a node and frees it together with its subtree.
    pub fn remove(&mut self, id: NodeId) {
        assert!(id != self.root, "the root cannot be removed");
        self.detach(id);
        self.free(id);
    }

    fn free(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        for child in children {
            self.free(child);
        }
        self.arena.remove(id.0);
    }

    /// Removes every child of `id`.
    pub fn clear_children(&mut self, id: NodeId) {
        for child in self.children(id).to_vec() {
            self.remove(child);
        }
    }

    /// Replaces `id` with its own children, in place.
    pub fn replace_with_children(&mut self, id: NodeId) {
        let (Some(parent), Some(index)) = (self.parent(id), self.index_in_parent(id)) else {
            panic!("cannot unwrap a node without a parent");
        };
        let children = self.children(id).to_vec();
        for (offset, child) in children.into_iter().enumerate() {
            self.insert_child(parent, index + offset, child);
        }
        self.remove(id);
    }

    /// Moves `id` inside a new element that takes its place.
    pub fn wrap_node(&mut self, id: NodeId, name: &str, attributes: Vec<Attribute>) -> NodeId {
        let (Some(parent), Some(index)) = (self.parent(id), self.index_in_parent(id)) else {
            panic!("cannot wrap a node without a parent");
        };
        let wrapper = self.create_element(name, attributes);
        self.insert_child(parent, index, wrapper);
        self.append_child(wrapper, id);
        wrapper
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        let text = text.into();
        let added = text.chars().count();
        let node = self.node_mut(id);
        let NodeKind::Text(current) = &mut node.kind else {
            panic!("set_text called on a non-text node");
        };
        *current = text;
        let removed = node.length;
        node.length = added;
        let parent = node.parent;
        self.propagate(parent, removed, added);
    }

    /// Copies the subtree at `id` of `source` into this tree, detached.
    pub fn import(&mut self, source: &Dom, id: NodeId) -> NodeId {
        let copy = match &source.node(id).kind {
            NodeKind::Text(text) => self.create_text(text.clone()),
            NodeKind::Comment(body) => self.create_comment(body.clone()),
            NodeKind::Element(element) => {
                self.create_element(element.name.clone(), element.attributes.clone())
            }
        };
        for &child in source.children(id) {
            let child_copy = self.import(source, child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Structural comparison of two subtrees (attribute order ignored).
    pub fn same_structure(&self, a: NodeId, other: &Dom, b: NodeId) -> bool {
        match (&self.node(a).kind, &other.node(b).kind) {
            (NodeKind::Text(x), NodeKind::Text(y)) => x == y,
            (NodeKind::Comment(x), NodeKind::Comment(y)) => x == y,
            (NodeKind::Element(x), NodeKind::Element(y)) => {
                x.name == y.name
                    && element::same_attributes(&x.attributes, &y.attributes)
                    && x.children.len() == y.children.len()
                    && x
                        .children
                        .iter()
                        .zip(&y.children)
                        .all(|(&c, &d)| self.same_structure(c, other, d))
            }
            _ => false,
        }
    }

    /// Depth-first pre-order walk starting at (and including) `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_dom_has_empty_text_child() {
        let dom = Dom::new();
        assert_eq!(dom.children(dom.root()).len(), 1);
        assert_eq!(dom.len(dom.root()), 0);
        invariants::check(&dom);
    }

    #[test]
    fn test_lengths_propagate_on_append() {
        let mut dom = Dom::empty();
        let p = dom.create_element("p", vec![]);
        let b = dom.create_element("b", vec![]);
        let text = dom.create_text("héllo");
        dom.append_child(dom.root(), p);
        dom.append_child(p, b);
        dom.append_child(b, text);

        assert_eq!(dom.len(text), 5);
        assert_eq!(dom.len(b), 5);
        assert_eq!(dom.len(dom.root()), 5);

        dom.set_text(text, "hi");
        assert_eq!(dom.len(dom.root()), 2);
        invariants::check(&dom);
    }

    #[test]
    fn test_created_nodes_are_detached_until_placed() {
        let mut dom = Dom::new();
        let root = dom.root();
        let comment = dom.create_comment("c");
        let hr = dom.create_element("hr", vec![]);
        assert_eq!(dom.parent(comment), None);
        assert_eq!(dom.parent(hr), None);

        dom.insert_str(root, "xy", 0);
        dom.insert_node(root, 1, comment);
        dom.insert_node(root, 3, hr);
        assert_eq!(dom.parent(comment), Some(root));
        assert_eq!(dom.len(root), 4);
        assert_eq!(dom.text(root), "xy");
        invariants::check(&dom);
    }

    #[test]
    fn test_atomic_lengths() {
        let mut dom = Dom::empty();
        let comment = dom.create_comment("note");
        let img = dom.create_element("img", vec![]);
        let unsupported = dom.create_unsupported("<input>");
        dom.append_child(dom.root(), comment);
        dom.append_child(dom.root(), img);
        dom.append_child(dom.root(), unsupported);

        assert_eq!(dom.len(dom.root()), 3);
        assert_eq!(dom.text(dom.root()), "");
    }

    #[test]
    fn test_comment_text_is_empty_but_counts_one_unit() {
        let mut dom = Dom::empty();
        let text = dom.create_text("ab");
        let comment = dom.create_comment("hidden");
        dom.append_child(dom.root(), text);
        dom.append_child(dom.root(), comment);

        assert_eq!(dom.text(comment), "");
        assert_eq!(dom.len(comment), 1);
        assert_eq!(dom.text(dom.root()), "ab");
        assert_eq!(dom.len(dom.root()), 3);
    }

    #[test]
    fn test_attach_moves_between_parents() {
        let mut dom = Dom::empty();
        let p1 = dom.create_element("p", vec![]);
        let p2 = dom.create_element("p", vec![]);
        let text = dom.create_text("abc");
        dom.append_child(dom.root(), p1);
        dom.append_child(dom.root(), p2);
        dom.append_child(p1, text);
        dom.append_child(p2, text);

        assert!(dom.children(p1).is_empty());
        assert_eq!(dom.children(p2), &[text]);
        assert_eq!(dom.len(p1), 0);
        assert_eq!(dom.len(p2), 3);
        invariants::check(&dom);
    }

    #[test]
    fn test_reinsert_within_same_parent() {
        let mut dom = Dom::empty();
        let a = dom.create_text("a");
        let b = dom.create_text("b");
        let c = dom.create_text("c");
        for node in [a, b, c] {
            dom.append_child(dom.root(), node);
        }
        dom.insert_child(dom.root(), 3, a);
        assert_eq!(dom.children(dom.root()), &[b, c, a]);
        invariants::check(&dom);
    }

    #[test]
    fn test_remove_frees_subtree() {
        let mut dom = Dom::empty();
        let p = dom.create_element("p", vec![]);
        let text = dom.create_text("x");
        dom.append_child(dom.root(), p);
        dom.append_child(p, text);
        dom.remove(p);

        assert!(!dom.contains(p));
        assert!(!dom.contains(text));
        assert_eq!(dom.len(dom.root()), 0);
    }

    #[test]
    #[should_panic(expected = "stale node id")]
    fn test_stale_id_panics() {
        let mut dom = Dom::empty();
        let text = dom.create_text("x");
        dom.append_child(dom.root(), text);
        dom.remove(text);
        dom.len(text);
    }

    #[test]
    fn test_replace_with_children() {
        let mut dom = Dom::empty();
        let b = dom.create_element("b", vec![]);
        let x = dom.create_text("x");
        let y = dom.create_text("y");
        dom.append_child(dom.root(), b);
        dom.append_child(b, x);
        dom.append_child(b, y);
        dom.replace_with_children(b);

        assert_eq!(dom.children(dom.root()), &[x, y]);
        assert!(!dom.contains(b));
        invariants::check(&dom);
    }

    #[test]
    fn test_offset_of() {
        let mut dom = Dom::empty();
        let a = dom.create_text("ab");
        let p = dom.create_element("p", vec![]);
        let c = dom.create_text("cd");
        dom.append_child(dom.root(), a);
        dom.append_child(dom.root(), p);
        dom.append_child(p, c);
        assert_eq!(dom.offset_of(c), 2);
        assert_eq!(dom.offset_of(a), 0);
    }
}
