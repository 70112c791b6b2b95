//! Static element classification tables.

use weft_syntax::Attribute;

/// Reserved name of the document root.
pub const ROOT: &str = "#root";

/// Reserved name of the element that carries markup the editor cannot model.
/// The raw markup lives in its [`UNSUPPORTED_HTML_ATTRIBUTE`] attribute.
pub const UNSUPPORTED: &str = "#unsupported";

pub const UNSUPPORTED_HTML_ATTRIBUTE: &str = "html";

const BLOCK_LEVEL: &[&str] = &[
    "address",
    "blockquote",
    "dd",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "li",
    "noscript",
    "ol",
    "p",
    "pre",
    "table",
    "td",
    "tr",
    "ul",
];

/// Elements that never have children and count as one unit.
const VOID: &[&str] = &["br", "img", "hr", "video", UNSUPPORTED];

/// Void in the tree, but markup still closes them.
const VOID_WITH_END_TAG: &[&str] = &["video"];

/// Block-level elements whose content may be joined with an equal neighbour
/// when flat text is turned back into a tree.
const MERGEABLE_BLOCK: &[&str] = &[
    "blockquote",
    "div",
    "figure",
    "figcaption",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "li",
    "ol",
    "p",
    "pre",
    "ul",
];

const EQUIVALENT_NAMES: &[&[&str]] = &[&["b", "strong"], &["i", "em"], &["s", "strike", "del"]];

pub fn is_block_level(name: &str) -> bool {
    name == ROOT || BLOCK_LEVEL.contains(&name)
}

pub fn is_void(name: &str) -> bool {
    VOID.contains(&name)
}

pub fn has_end_tag(name: &str) -> bool {
    !is_void(name) || VOID_WITH_END_TAG.contains(&name)
}

pub fn is_mergeable_block(name: &str) -> bool {
    MERGEABLE_BLOCK.contains(&name)
}

pub fn is_list(name: &str) -> bool {
    matches!(name, "ul" | "ol")
}

pub fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Names treated as the same formatting as `name`, including `name` itself.
pub fn equivalent_names(name: &str) -> Vec<String> {
    EQUIVALENT_NAMES
        .iter()
        .find(|group| group.contains(&name))
        .map(|group| group.iter().map(|n| n.to_string()).collect())
        .unwrap_or_else(|| vec![name.to_string()])
}

/// Attribute lists compare as sets: order does not matter, duplicates do not
/// occur.
pub fn same_attributes(a: &[Attribute], b: &[Attribute]) -> bool {
    a.len() == b.len() && a.iter().all(|attr| b.contains(attr))
}

/// What a wrap operation creates: the new element and the names it replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDescriptor {
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// Names that express the same thing and are removed before wrapping.
    pub matching_names: Vec<String>,
}

impl ElementDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            matching_names: equivalent_names(&name),
            name,
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(name, Some(value)));
        self
    }

    pub fn is_block_level(&self) -> bool {
        is_block_level(&self.name)
    }
}
