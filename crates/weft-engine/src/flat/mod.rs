/*!
 * # Flat Text
 *
 * The editor-facing view of a document: an ordered list of runs, each with
 * one set of [`Attributes`]. Text runs hold characters; everything that is
 * not text (line breaks, rules, images, comments, raw markup) is an
 * [`Attachment`] worth exactly one unit.
 *
 * Paragraphs are delimited by `'\n'` inside text runs. The separator carries
 * the attributes of the paragraph it terminates, which is how an empty
 * paragraph keeps its block formatting.
 *
 * Flat offsets relate to tree offsets through the paragraph separators only:
 * `flat = tree + separators before it` (see [`crate::dom::query`]).
 *
 * - **`serializer`**: tree → flat ([`from_dom`])
 * - **`parser`**: flat → tree ([`to_dom`])
 */

mod parser;
mod serializer;

pub use parser::to_dom;
pub use serializer::from_dom;

use serde::Serialize;
use weft_syntax::Attribute;

use crate::dom::Element;

pub const PARAGRAPH_SEPARATOR: char = '\n';
pub const LINE_SEPARATOR: char = '\u{2028}';
pub const OBJECT_REPLACEMENT: char = '\u{FFFC}';

/// An element as it appeared in markup, kept when it differs from the
/// default spelling of a formatting attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementRepresentation {
    pub name: String,
    pub attributes: Vec<(String, Option<String>)>,
}

impl ElementRepresentation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.attributes
            .push((name.into(), value.map(str::to_string)));
        self
    }

    pub(crate) fn from_element(element: &Element) -> Self {
        Self {
            name: element.name.clone(),
            attributes: element
                .attributes
                .iter()
                .map(|a| (a.name.clone(), a.value.clone()))
                .collect(),
        }
    }

    pub(crate) fn to_attributes(&self) -> Vec<Attribute> {
        self.attributes
            .iter()
            .map(|(name, value)| Attribute {
                name: name.clone(),
                value: value.clone(),
            })
            .collect()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }

    /// `None` when this is just `<default>` with no attributes.
    pub(crate) fn unless_default(&self, default: &str) -> Option<Self> {
        if self.name == default && self.attributes.is_empty() {
            None
        } else {
            Some(self.clone())
        }
    }

    /// Same name and the same attribute set, in any order.
    pub fn matches(&self, other: &Self) -> bool {
        self.name == other.name
            && self.attributes.len() == other.attributes.len()
            && self.attributes.iter().all(|a| other.attributes.contains(a))
    }
}

/// A character style. `representation` is `None` for the default element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Format {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub representation: Option<ElementRepresentation>,
}

impl Format {
    fn element(&self, default: &str) -> ElementRepresentation {
        self.representation
            .clone()
            .unwrap_or_else(|| ElementRepresentation::new(default))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub url: String,
    /// Kept when the anchor has attributes besides `href`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub representation: Option<ElementRepresentation>,
}

impl Link {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            representation: None,
        }
    }

    fn from_representation(representation: ElementRepresentation) -> Self {
        let url = representation.attribute("href").unwrap_or_default().to_string();
        let extra = representation.attributes.iter().any(|(n, _)| n != "href");
        Self {
            url,
            representation: extra.then_some(representation),
        }
    }

    fn element(&self) -> ElementRepresentation {
        let mut element = self
            .representation
            .clone()
            .unwrap_or_else(|| ElementRepresentation::new("a"));
        match element.attributes.iter_mut().find(|(n, _)| n == "href") {
            Some((_, value)) => *value = Some(self.url.clone()),
            None => element
                .attributes
                .insert(0, ("href".to_string(), Some(self.url.clone()))),
        }
        element
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListStyle {
    Ordered,
    Unordered,
}

impl ListStyle {
    fn element_name(self) -> &'static str {
        match self {
            ListStyle::Ordered => "ol",
            ListStyle::Unordered => "ul",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub representation: Option<ElementRepresentation>,
}

/// One level of block formatting. `representation` is `None` when the
/// element is the default one for the property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParagraphProperty {
    Blockquote {
        representation: Option<ElementRepresentation>,
    },
    Div {
        representation: Option<ElementRepresentation>,
    },
    /// A figure: an image paragraph followed by its caption paragraph.
    Figure {
        representation: Option<ElementRepresentation>,
    },
    Figcaption {
        representation: Option<ElementRepresentation>,
    },
    Heading {
        level: u8,
        representation: Option<ElementRepresentation>,
    },
    List {
        style: ListStyle,
        representation: Option<ElementRepresentation>,
        /// Set when the paragraph sits in a list item of this list.
        item: Option<ListItem>,
    },
    Paragraph {
        representation: Option<ElementRepresentation>,
    },
    Preformatted {
        representation: Option<ElementRepresentation>,
    },
    /// Any other block-level element.
    Block {
        representation: ElementRepresentation,
    },
}

impl ParagraphProperty {
    pub fn blockquote() -> Self {
        Self::Blockquote {
            representation: None,
        }
    }

    pub fn figure() -> Self {
        Self::Figure {
            representation: None,
        }
    }

    pub fn figcaption() -> Self {
        Self::Figcaption {
            representation: None,
        }
    }

    pub fn heading(level: u8) -> Self {
        Self::Heading {
            level,
            representation: None,
        }
    }

    /// A list item of a default `ul`.
    pub fn unordered_list() -> Self {
        Self::List {
            style: ListStyle::Unordered,
            representation: None,
            item: Some(ListItem::default()),
        }
    }

    /// A list item of a default `ol`.
    pub fn ordered_list() -> Self {
        Self::List {
            style: ListStyle::Ordered,
            representation: None,
            item: Some(ListItem::default()),
        }
    }

    /// Block elements for this property, outermost first.
    pub(crate) fn elements(&self) -> Vec<ElementRepresentation> {
        fn or_default(r: &Option<ElementRepresentation>, name: &str) -> ElementRepresentation {
            r.clone().unwrap_or_else(|| ElementRepresentation::new(name))
        }

        match self {
            Self::Blockquote { representation } => vec![or_default(representation, "blockquote")],
            Self::Div { representation } => vec![or_default(representation, "div")],
            Self::Figure { representation } => vec![or_default(representation, "figure")],
            Self::Figcaption { representation } => {
                vec![or_default(representation, "figcaption")]
            }
            Self::Heading {
                level,
                representation,
            } => vec![or_default(representation, &format!("h{level}"))],
            Self::List {
                style,
                representation,
                item,
            } => {
                let mut elements = vec![or_default(representation, style.element_name())];
                if let Some(item) = item {
                    elements.push(or_default(&item.representation, "li"));
                }
                elements
            }
            Self::Paragraph { representation } => vec![or_default(representation, "p")],
            Self::Preformatted { representation } => vec![or_default(representation, "pre")],
            Self::Block { representation } => vec![representation.clone()],
        }
    }
}

/// Block formatting of a paragraph, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParagraphStyle(pub Vec<ParagraphProperty>);

impl ParagraphStyle {
    pub fn new(properties: Vec<ParagraphProperty>) -> Self {
        Self(properties)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn properties(&self) -> &[ParagraphProperty] {
        &self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
    /// Inline elements with no native formatting, outermost first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unsupported: Vec<ElementRepresentation>,
    #[serde(skip_serializing_if = "ParagraphStyle::is_empty")]
    pub paragraph: ParagraphStyle,
}

impl Attributes {
    pub fn bold(mut self) -> Self {
        self.bold = Some(Format::default());
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = Some(Format::default());
        self
    }

    pub fn underline(mut self) -> Self {
        self.underline = Some(Format::default());
        self
    }

    pub fn strikethrough(mut self) -> Self {
        self.strikethrough = Some(Format::default());
        self
    }

    pub fn link(mut self, url: impl Into<String>) -> Self {
        self.link = Some(Link::new(url));
        self
    }

    pub fn with_paragraph(mut self, properties: Vec<ParagraphProperty>) -> Self {
        self.paragraph = ParagraphStyle::new(properties);
        self
    }

    /// Inline elements these attributes stand for, in their default nesting
    /// order (outermost first).
    pub(crate) fn inline_elements(&self) -> Vec<ElementRepresentation> {
        let mut elements = Vec::new();
        if let Some(bold) = &self.bold {
            elements.push(bold.element("strong"));
        }
        if let Some(italic) = &self.italic {
            elements.push(italic.element("em"));
        }
        if let Some(link) = &self.link {
            elements.push(link.element());
        }
        if let Some(strikethrough) = &self.strikethrough {
            elements.push(strikethrough.element("del"));
        }
        if let Some(underline) = &self.underline {
            elements.push(underline.element("u"));
        }
        elements.extend(self.unsupported.iter().cloned());
        elements
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageAlignment {
    None,
    Left,
    Center,
    Right,
}

impl ImageAlignment {
    pub fn class(self) -> &'static str {
        match self {
            ImageAlignment::None => "alignnone",
            ImageAlignment::Left => "alignleft",
            ImageAlignment::Center => "aligncenter",
            ImageAlignment::Right => "alignright",
        }
    }

    fn from_class(class: &str) -> Option<Self> {
        match class {
            "alignnone" => Some(ImageAlignment::None),
            "alignleft" => Some(ImageAlignment::Left),
            "aligncenter" => Some(ImageAlignment::Center),
            "alignright" => Some(ImageAlignment::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSize {
    Thumbnail,
    Medium,
    Large,
    Full,
}

impl ImageSize {
    pub fn class(self) -> &'static str {
        match self {
            ImageSize::Thumbnail => "size-thumbnail",
            ImageSize::Medium => "size-medium",
            ImageSize::Large => "size-large",
            ImageSize::Full => "size-full",
        }
    }

    fn from_class(class: &str) -> Option<Self> {
        match class {
            "size-thumbnail" => Some(ImageSize::Thumbnail),
            "size-medium" => Some(ImageSize::Medium),
            "size-large" => Some(ImageSize::Large),
            "size-full" => Some(ImageSize::Full),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Image {
    pub src: Option<String>,
    pub alignment: Option<ImageAlignment>,
    pub size: Option<ImageSize>,
    /// Every other attribute, including classes that are neither an
    /// alignment nor a size.
    pub attributes: Vec<(String, Option<String>)>,
}

impl Image {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: Some(src.into()),
            ..Self::default()
        }
    }

    pub(crate) fn from_element(element: &Element) -> Self {
        let mut image = Image::default();
        for attribute in &element.attributes {
            match attribute.name.as_str() {
                "src" => image.src = attribute.value.clone(),
                "class" => {
                    let mut rest = Vec::new();
                    for class in attribute.value.as_deref().unwrap_or_default().split_whitespace() {
                        if let Some(alignment) = ImageAlignment::from_class(class) {
                            image.alignment.get_or_insert(alignment);
                        } else if let Some(size) = ImageSize::from_class(class) {
                            image.size.get_or_insert(size);
                        } else {
                            rest.push(class);
                        }
                    }
                    if !rest.is_empty() {
                        image
                            .attributes
                            .push(("class".to_string(), Some(rest.join(" "))));
                    }
                }
                _ => image
                    .attributes
                    .push((attribute.name.clone(), attribute.value.clone())),
            }
        }
        image
    }

    pub(crate) fn to_attributes(&self) -> Vec<Attribute> {
        let recognised: Vec<&str> = self
            .alignment
            .map(ImageAlignment::class)
            .into_iter()
            .chain(self.size.map(ImageSize::class))
            .collect();

        let mut attributes = Vec::new();
        if let Some(src) = &self.src {
            attributes.push(Attribute::new("src", Some(src.as_str())));
        }
        let mut class_written = false;
        for (name, value) in &self.attributes {
            if name == "class" {
                let classes: Vec<&str> = value
                    .as_deref()
                    .unwrap_or_default()
                    .split_whitespace()
                    .chain(recognised.iter().copied())
                    .collect();
                attributes.push(Attribute::new("class", Some(classes.join(" "))));
                class_written = true;
            } else {
                attributes.push(Attribute {
                    name: name.clone(),
                    value: value.clone(),
                });
            }
        }
        if !class_written && !recognised.is_empty() {
            attributes.push(Attribute::new("class", Some(recognised.join(" "))));
        }
        attributes
    }
}

/// A `<video>` with no fallback content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Video {
    pub src: Option<String>,
    /// Still shown until playback starts.
    pub poster: Option<String>,
    pub attributes: Vec<(String, Option<String>)>,
}

impl Video {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: Some(src.into()),
            ..Self::default()
        }
    }

    pub fn with_poster(mut self, poster: impl Into<String>) -> Self {
        self.poster = Some(poster.into());
        self
    }

    pub(crate) fn from_element(element: &Element) -> Self {
        let mut video = Video::default();
        for attribute in &element.attributes {
            match attribute.name.as_str() {
                "src" => video.src = attribute.value.clone(),
                "poster" => video.poster = attribute.value.clone(),
                _ => video
                    .attributes
                    .push((attribute.name.clone(), attribute.value.clone())),
            }
        }
        video
    }

    pub(crate) fn to_attributes(&self) -> Vec<Attribute> {
        let mut attributes = Vec::new();
        if let Some(src) = &self.src {
            attributes.push(Attribute::new("src", Some(src.as_str())));
        }
        if let Some(poster) = &self.poster {
            attributes.push(Attribute::new("poster", Some(poster.as_str())));
        }
        attributes.extend(self.attributes.iter().map(|(name, value)| Attribute {
            name: name.clone(),
            value: value.clone(),
        }));
        attributes
    }
}

/// Non-text content. Every attachment is one unit long.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Attachment {
    LineBreak {
        representation: Option<ElementRepresentation>,
    },
    HorizontalRule {
        representation: Option<ElementRepresentation>,
    },
    Image(Image),
    Video(Video),
    Comment {
        text: String,
    },
    /// Markup the editor does not model, kept verbatim.
    Html {
        name: String,
        html: String,
    },
}

impl Attachment {
    pub fn line_break() -> Self {
        Self::LineBreak {
            representation: None,
        }
    }

    pub fn horizontal_rule() -> Self {
        Self::HorizontalRule {
            representation: None,
        }
    }

    /// The character standing for this attachment in [`FlatText::text`].
    pub fn character(&self) -> char {
        match self {
            Self::LineBreak { .. } => LINE_SEPARATOR,
            _ => OBJECT_REPLACEMENT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunContent {
    Text(String),
    Attachment(Attachment),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Run {
    pub content: RunContent,
    pub attributes: Attributes,
}

impl Run {
    pub fn len(&self) -> usize {
        match &self.content {
            RunContent::Text(text) => text.chars().count(),
            RunContent::Attachment(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Attributed text: runs of content with uniform attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlatText {
    runs: Vec<Run>,
}

impl FlatText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unformatted text. `'\n'` separates paragraphs.
    pub fn plain(text: &str) -> Self {
        let mut flat = Self::new();
        flat.push_text(text, Attributes::default());
        flat
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Appends text, extending the last run when it is text with the same
    /// attributes.
    pub fn push_text(&mut self, text: &str, attributes: Attributes) {
        if text.is_empty() {
            return;
        }
        if let Some(Run {
            content: RunContent::Text(last),
            attributes: last_attributes,
        }) = self.runs.last_mut()
        {
            if *last_attributes == attributes {
                last.push_str(text);
                return;
            }
        }
        self.runs.push(Run {
            content: RunContent::Text(text.to_string()),
            attributes,
        });
    }

    pub fn push_attachment(&mut self, attachment: Attachment, attributes: Attributes) {
        self.runs.push(Run {
            content: RunContent::Attachment(attachment),
            attributes,
        });
    }

    /// Builder form of [`FlatText::push_text`].
    pub fn with_text(mut self, text: &str, attributes: Attributes) -> Self {
        self.push_text(text, attributes);
        self
    }

    /// Builder form of [`FlatText::push_attachment`].
    pub fn with_attachment(mut self, attachment: Attachment, attributes: Attributes) -> Self {
        self.push_attachment(attachment, attributes);
        self
    }

    /// The characters, with attachments replaced by their placeholder.
    pub fn text(&self) -> String {
        self.runs
            .iter()
            .map(|run| match &run.content {
                RunContent::Text(text) => text.clone(),
                RunContent::Attachment(attachment) => attachment.character().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.runs.iter().map(Run::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Dom;
    use crate::markup;
    use insta::assert_yaml_snapshot;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_push_text_coalesces_equal_attributes() {
        let flat = FlatText::new()
            .with_text("a", Attributes::default())
            .with_text("b", Attributes::default())
            .with_text("c", Attributes::default().bold());
        assert_eq!(flat.runs().len(), 2);
        assert_eq!(flat.text(), "abc");
    }

    #[test]
    fn test_attachments_never_coalesce() {
        let flat = FlatText::new()
            .with_attachment(Attachment::line_break(), Attributes::default())
            .with_attachment(Attachment::line_break(), Attributes::default());
        assert_eq!(flat.runs().len(), 2);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat.text(), "\u{2028}\u{2028}");
    }

    #[test]
    fn test_attachment_characters() {
        assert_eq!(Attachment::line_break().character(), LINE_SEPARATOR);
        assert_eq!(Attachment::horizontal_rule().character(), OBJECT_REPLACEMENT);
        let comment = Attachment::Comment {
            text: "more".to_string(),
        };
        assert_eq!(comment.character(), OBJECT_REPLACEMENT);
    }

    #[test]
    fn test_empty_text_is_ignored() {
        let flat = FlatText::plain("");
        assert!(flat.is_empty());
        assert_eq!(flat.len(), 0);
    }

    #[test]
    fn test_image_classes_round_trip() {
        let dom = markup::parse(r#"<img src="a.png" class="wide alignleft size-full" alt="A">"#);
        let img = dom.children(dom.root())[0];
        let image = Image::from_element(dom.element(img).unwrap());
        assert_eq!(image.src.as_deref(), Some("a.png"));
        assert_eq!(image.alignment, Some(ImageAlignment::Left));
        assert_eq!(image.size, Some(ImageSize::Full));

        let attributes = image.to_attributes();
        assert_eq!(
            attributes,
            vec![
                Attribute::new("src", Some("a.png")),
                Attribute::new("class", Some("wide alignleft size-full")),
                Attribute::new("alt", Some("A")),
            ]
        );
    }

    #[test]
    fn test_image_without_classes() {
        let image = Image::new("b.png");
        assert_eq!(image.to_attributes(), vec![Attribute::new("src", Some("b.png"))]);
    }

    #[test]
    fn test_representation_matches_ignores_attribute_order() {
        let a = ElementRepresentation::new("span")
            .with_attribute("id", Some("x"))
            .with_attribute("class", Some("y"));
        let b = ElementRepresentation::new("span")
            .with_attribute("class", Some("y"))
            .with_attribute("id", Some("x"));
        assert!(a.matches(&b));
        assert!(!a.matches(&ElementRepresentation::new("span")));
    }

    #[test]
    fn test_link_keeps_extra_attributes() {
        let representation = ElementRepresentation::new("a")
            .with_attribute("href", Some("x"))
            .with_attribute("target", Some("_blank"));
        let link = Link::from_representation(representation);
        assert_eq!(link.url, "x");
        assert!(link.representation.is_some());

        let plain = Link::from_representation(
            ElementRepresentation::new("a").with_attribute("href", Some("y")),
        );
        assert_eq!(plain.representation, None);
        assert_eq!(plain.element().attribute("href"), Some("y"));
    }

    #[test]
    fn test_list_property_elements() {
        let names: Vec<String> = ParagraphProperty::ordered_list()
            .elements()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["ol", "li"]);
    }

    #[test]
    fn test_serialize_skips_empty_attributes() {
        assert_yaml_snapshot!(FlatText::plain("a").runs()[0].attributes, @"{}");
    }

    #[test]
    fn test_default_dom_converts_to_empty_flat_text() {
        assert!(from_dom(&Dom::new()).is_empty());
    }
}
