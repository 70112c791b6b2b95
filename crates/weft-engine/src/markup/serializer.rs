use weft_syntax::{Attribute, RAW_TEXT_ELEMENTS};

use crate::dom::{Dom, NodeId, NodeKind, UNSUPPORTED, UNSUPPORTED_HTML_ATTRIBUTE, element};

/// Output settings for [`serialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializerOptions {
    /// Put block-level tags on their own lines, indented by depth.
    pub pretty: bool,
    /// Spaces per nesting level in pretty mode.
    pub indent: usize,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            indent: 2,
        }
    }
}

impl SerializerOptions {
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            ..Self::default()
        }
    }
}

/// Writes the tree as markup. The root element itself is not emitted.
pub fn serialize(dom: &Dom, options: &SerializerOptions) -> String {
    let serializer = Serializer { dom, options };
    let mut out = String::new();
    for &child in dom.children(dom.root()) {
        serializer.node(child, 0, false, &mut out);
    }

    if options.pretty {
        out.trim_matches('\n').to_string()
    } else {
        out
    }
}

struct Serializer<'a> {
    dom: &'a Dom,
    options: &'a SerializerOptions,
}

impl Serializer<'_> {
    fn node(&self, id: NodeId, level: usize, raw_text: bool, out: &mut String) {
        match self.dom.kind(id) {
            NodeKind::Text(text) if raw_text => out.push_str(text),
            NodeKind::Text(text) => out.push_str(&html_escape::encode_text(text)),
            NodeKind::Comment(body) => {
                out.push_str("<!--");
                out.push_str(body);
                out.push_str("-->");
            }
            NodeKind::Element(el) if el.name == UNSUPPORTED => {
                out.push_str(el.attribute(UNSUPPORTED_HTML_ATTRIBUTE).unwrap_or_default());
            }
            NodeKind::Element(el) => {
                let pretty = self.options.pretty;
                let block = element::is_block_level(&el.name);

                if pretty && block {
                    self.line_break(level, out);
                }
                write_start_tag(out, &el.name, &el.attributes, false);

                if element::has_end_tag(&el.name) {
                    let raw = RAW_TEXT_ELEMENTS.contains(&el.name.as_str());
                    for &child in &el.children {
                        self.node(child, level + 1, raw, out);
                    }
                    if pretty && el.children.iter().any(|&c| self.dom.is_block_level(c)) {
                        self.line_break(level, out);
                    }
                    out.push_str("</");
                    out.push_str(&el.name);
                    out.push('>');
                }

                if pretty
                    && block
                    && self
                        .dom
                        .next_sibling(id)
                        .is_some_and(|s| !self.dom.is_block_level(s))
                {
                    out.push('\n');
                }
            }
        }
    }

    fn line_break(&self, level: usize, out: &mut String) {
        out.push('\n');
        out.push_str(&" ".repeat(level * self.options.indent));
    }
}

/// Writes `<name attr="value" bare>`, with `/>` when `self_closing`.
pub(crate) fn write_start_tag(
    out: &mut String,
    name: &str,
    attributes: &[Attribute],
    self_closing: bool,
) {
    out.push('<');
    out.push_str(name);
    for attribute in attributes {
        out.push(' ');
        out.push_str(&attribute.name);
        if let Some(value) = &attribute.value {
            out.push_str("=\"");
            out.push_str(&html_escape::encode_double_quoted_attribute(value));
            out.push('"');
        }
    }
    out.push_str(if self_closing { "/>" } else { ">" });
}
