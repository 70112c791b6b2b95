use std::collections::HashSet;

use crate::dom::{Dom, Element, NodeId, NodeKind, UNSUPPORTED, UNSUPPORTED_HTML_ATTRIBUTE, element};

use super::{
    Attachment, Attributes, ElementRepresentation, FlatText, Format, Image, Link, ListItem,
    ListStyle, PARAGRAPH_SEPARATOR, ParagraphProperty, Video,
};

/// Converts the tree to flat text.
///
/// Inline elements become attributes, block elements become paragraph
/// properties, and void elements and comments become attachments. A
/// separator follows every leaf the tree reports in
/// [`Dom::paragraph_separators`].
pub fn from_dom(dom: &Dom) -> FlatText {
    let separators = dom
        .paragraph_separators()
        .into_iter()
        .map(|(_, leaf)| leaf)
        .collect();
    let mut walker = Walker {
        dom,
        separators,
        out: FlatText::new(),
    };
    walker.node(dom.root(), &Attributes::default());
    walker.out
}

struct Walker<'a> {
    dom: &'a Dom,
    separators: HashSet<NodeId>,
    out: FlatText,
}

impl Walker<'_> {
    fn node(&mut self, id: NodeId, attributes: &Attributes) {
        let dom = self.dom;
        match dom.kind(id) {
            NodeKind::Text(text) => self.out.push_text(text, attributes.clone()),
            NodeKind::Comment(body) => self.out.push_attachment(
                Attachment::Comment { text: body.clone() },
                attributes.clone(),
            ),
            NodeKind::Element(el) if el.name == UNSUPPORTED => {
                let html = el
                    .attribute(UNSUPPORTED_HTML_ATTRIBUTE)
                    .unwrap_or_default()
                    .to_string();
                let attachment = Attachment::Html {
                    name: markup_name(&html),
                    html,
                };
                self.out.push_attachment(attachment, attributes.clone());
            }
            NodeKind::Element(el) if element::is_void(&el.name) => {
                self.out
                    .push_attachment(void_attachment(el), attributes.clone());
            }
            NodeKind::Element(el) => {
                let inner = if id == dom.root() {
                    attributes.clone()
                } else {
                    self.apply(id, el, attributes)
                };
                for &child in el.children() {
                    self.node(child, &inner);
                }
                self.separator(id, inner);
                return;
            }
        }
        self.separator(id, attributes.clone());
    }

    fn separator(&mut self, id: NodeId, attributes: Attributes) {
        if self.separators.contains(&id) {
            self.out
                .push_text(&PARAGRAPH_SEPARATOR.to_string(), attributes);
        }
    }

    /// Attributes in effect inside `el`.
    fn apply(&self, id: NodeId, el: &Element, attributes: &Attributes) -> Attributes {
        let mut next = attributes.clone();
        let representation = ElementRepresentation::from_element(el);
        let name = el.name.as_str();

        if !element::is_block_level(name) {
            match name {
                "strong" | "b" => next.bold = Some(format(&representation, "strong")),
                "em" | "i" => next.italic = Some(format(&representation, "em")),
                "u" => next.underline = Some(format(&representation, "u")),
                "del" | "s" | "strike" => {
                    next.strikethrough = Some(format(&representation, "del"))
                }
                "a" => next.link = Some(Link::from_representation(representation)),
                _ => next.unsupported.push(representation),
            }
            return next;
        }

        let properties = &mut next.paragraph.0;
        let property = match name {
            // The implicit paragraph.
            "p" if el.attributes.is_empty() && self.dom.parent(id) == Some(self.dom.root()) => {
                return next;
            }
            "p" => ParagraphProperty::Paragraph {
                representation: representation.unless_default("p"),
            },
            "blockquote" => ParagraphProperty::Blockquote {
                representation: representation.unless_default("blockquote"),
            },
            "div" => ParagraphProperty::Div {
                representation: representation.unless_default("div"),
            },
            "figure" => ParagraphProperty::Figure {
                representation: representation.unless_default("figure"),
            },
            "figcaption" => ParagraphProperty::Figcaption {
                representation: representation.unless_default("figcaption"),
            },
            "pre" => ParagraphProperty::Preformatted {
                representation: representation.unless_default("pre"),
            },
            "ul" | "ol" => ParagraphProperty::List {
                style: if name == "ol" {
                    ListStyle::Ordered
                } else {
                    ListStyle::Unordered
                },
                representation: representation.unless_default(name),
                item: None,
            },
            "li" => {
                let item = ListItem {
                    representation: representation.unless_default("li"),
                };
                match properties.last_mut() {
                    Some(ParagraphProperty::List { item: slot, .. }) if slot.is_none() => {
                        *slot = Some(item);
                        return next;
                    }
                    _ => ParagraphProperty::Block { representation },
                }
            }
            _ => match element::heading_level(name) {
                Some(level) => ParagraphProperty::Heading {
                    level,
                    representation: representation.unless_default(name),
                },
                None => ParagraphProperty::Block { representation },
            },
        };
        properties.push(property);
        next
    }
}

fn format(representation: &ElementRepresentation, default: &str) -> Format {
    Format {
        representation: representation.unless_default(default),
    }
}

fn void_attachment(el: &Element) -> Attachment {
    let representation = ElementRepresentation::from_element(el);
    match el.name.as_str() {
        "br" => Attachment::LineBreak {
            representation: representation.unless_default("br"),
        },
        "hr" => Attachment::HorizontalRule {
            representation: representation.unless_default("hr"),
        },
        "video" => Attachment::Video(Video::from_element(el)),
        // img
        _ => Attachment::Image(Image::from_element(el)),
    }
}

/// Lowercased tag name at the start of raw markup: `table` for
/// `<table>…</table>`, `!doctype` for a declaration.
fn markup_name(html: &str) -> String {
    html.trim_start()
        .trim_start_matches('<')
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '!' | ':'))
        .collect::<String>()
        .to_ascii_lowercase()
}
