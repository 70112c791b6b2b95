use log::trace;

use crate::dom::{Dom, NodeId, element};

use super::{
    Attachment, Attributes, ElementRepresentation, FlatText, LINE_SEPARATOR,
    PARAGRAPH_SEPARATOR, ParagraphProperty, RunContent,
};

/// Builds a tree from flat text.
///
/// Every paragraph gets a block chain from its paragraph properties and an
/// inline subtree from its runs. Consecutive paragraphs share the outer part
/// of their chains where the elements are equal, so a run of list paragraphs
/// ends up as one list.
pub fn to_dom(flat: &FlatText) -> Dom {
    let paragraphs = paragraphs(flat);
    if paragraphs.is_empty() {
        return Dom::new();
    }

    let mut builder = Builder {
        dom: Dom::empty(),
        previous: Vec::new(),
    };
    for paragraph in &paragraphs {
        builder.paragraph(paragraph);
    }

    let mut dom = builder.dom;
    let root = dom.root();
    dom.normalize(root);
    dom
}

enum Piece<'a> {
    Text(&'a str),
    Attachment(&'a Attachment),
}

struct Paragraph<'a> {
    pieces: Vec<(Piece<'a>, &'a Attributes)>,
    /// Attributes of the separator closing the paragraph.
    terminator: Option<&'a Attributes>,
}

impl Paragraph<'_> {
    fn properties(&self) -> &[ParagraphProperty] {
        self.pieces
            .first()
            .map(|(_, attributes)| *attributes)
            .or(self.terminator)
            .map(|attributes| attributes.paragraph.properties())
            .unwrap_or_default()
    }

    /// A rule or raw markup alone on its line needs no paragraph around it.
    fn is_lone_block_attachment(&self) -> bool {
        matches!(
            self.pieces.as_slice(),
            [(
                Piece::Attachment(Attachment::HorizontalRule { .. } | Attachment::Html { .. }),
                _
            )]
        )
    }

    /// Block elements for this paragraph, outermost first.
    fn block_chain(&self) -> Vec<ElementRepresentation> {
        let chain: Vec<ElementRepresentation> = self
            .properties()
            .iter()
            .flat_map(ParagraphProperty::elements)
            .collect();
        if chain.is_empty() && !self.is_lone_block_attachment() {
            vec![ElementRepresentation::new("p")]
        } else {
            chain
        }
    }
}

/// Splits the runs at paragraph separators. A trailing separator does not
/// open another paragraph.
fn paragraphs(flat: &FlatText) -> Vec<Paragraph<'_>> {
    let mut out = Vec::new();
    let mut current = Vec::new();

    for run in flat.runs() {
        match &run.content {
            RunContent::Text(text) => {
                for (index, part) in text.split(PARAGRAPH_SEPARATOR).enumerate() {
                    if index > 0 {
                        out.push(Paragraph {
                            pieces: std::mem::take(&mut current),
                            terminator: Some(&run.attributes),
                        });
                    }
                    if !part.is_empty() {
                        current.push((Piece::Text(part), &run.attributes));
                    }
                }
            }
            RunContent::Attachment(attachment) => {
                current.push((Piece::Attachment(attachment), &run.attributes));
            }
        }
    }

    if !current.is_empty() {
        out.push(Paragraph {
            pieces: current,
            terminator: None,
        });
    }
    out
}

/// Inline elements over one piece of content.
struct Branch<'a> {
    elements: Vec<ElementRepresentation>,
    piece: &'a Piece<'a>,
}

struct Builder {
    dom: Dom,
    /// Block chain of the previous paragraph, outermost first.
    previous: Vec<(ElementRepresentation, NodeId)>,
}

impl Builder {
    fn paragraph(&mut self, paragraph: &Paragraph) {
        let chain = paragraph.block_chain();
        let inline = self.inline_nodes(paragraph);
        let parent = self.place_chain(&chain);
        for node in inline {
            self.dom.append_child(parent, node);
        }
    }

    /// Attaches the block chain, reusing the previous paragraph's elements
    /// down to the merge point. Returns the element that takes the content.
    fn place_chain(&mut self, chain: &[ElementRepresentation]) -> NodeId {
        let merge_at = self.merge_point(chain);
        trace!("block chain {:?} merges at {merge_at:?}", names(chain));

        let (mut parent, start) = match merge_at {
            Some(k) => (self.previous[k].1, k + 1),
            None => (self.dom.root(), 0),
        };
        self.previous.truncate(start);

        // Two lines of the same `pre`.
        if start == chain.len() && start > 0 {
            let line_feed = self.dom.create_text(PARAGRAPH_SEPARATOR.to_string());
            self.dom.append_child(parent, line_feed);
        }

        for representation in &chain[start..] {
            let node = self
                .dom
                .create_element(representation.name.clone(), representation.to_attributes());
            self.dom.append_child(parent, node);
            self.previous.push((representation.clone(), node));
            parent = node;
        }
        parent
    }

    /// Deepest index where the chain can continue the previous one.
    ///
    /// Elements must be equal and mergeable. The deepest element of the new
    /// chain only merges when it is a `pre`; an `li` only merges when the
    /// new chain nests a list or figure right below it.
    fn merge_point(&self, chain: &[ElementRepresentation]) -> Option<usize> {
        let mut best = None;
        for (k, (left, _)) in self.previous.iter().enumerate() {
            let Some(right) = chain.get(k) else {
                break;
            };
            if !left.matches(right) || !element::is_mergeable_block(&right.name) {
                break;
            }
            if k + 1 == chain.len() && right.name != "pre" {
                break;
            }
            if right.name == "li"
                && !chain
                    .get(k + 1)
                    .is_some_and(|next| element::is_list(&next.name) || next.name == "figure")
            {
                break;
            }
            best = Some(k);
        }
        best
    }

    /// Detached inline subtrees for the paragraph's content.
    fn inline_nodes(&mut self, paragraph: &Paragraph) -> Vec<NodeId> {
        let mut branches: Vec<Branch> = paragraph
            .pieces
            .iter()
            .map(|(piece, attributes)| Branch {
                elements: attributes.inline_elements(),
                piece,
            })
            .collect();
        defragment(&mut branches);

        let mut top = Vec::new();
        let mut open: Vec<(ElementRepresentation, NodeId)> = Vec::new();
        for branch in &branches {
            let common = open
                .iter()
                .zip(&branch.elements)
                .take_while(|((left, _), right)| left.matches(right))
                .count();
            open.truncate(common);

            let mut parent = open.last().map(|(_, node)| *node);
            for representation in &branch.elements[common..] {
                let node = self
                    .dom
                    .create_element(representation.name.clone(), representation.to_attributes());
                self.attach(parent, node, &mut top);
                open.push((representation.clone(), node));
                parent = Some(node);
            }
            for leaf in self.leaves(branch.piece) {
                self.attach(parent, leaf, &mut top);
            }
        }
        top
    }

    fn attach(&mut self, parent: Option<NodeId>, node: NodeId, top: &mut Vec<NodeId>) {
        match parent {
            Some(parent) => self.dom.append_child(parent, node),
            None => top.push(node),
        }
    }

    fn leaves(&mut self, piece: &Piece) -> Vec<NodeId> {
        match piece {
            Piece::Text(text) => {
                let mut nodes = Vec::new();
                for (index, part) in text.split(LINE_SEPARATOR).enumerate() {
                    if index > 0 {
                        nodes.push(self.dom.create_element("br", Vec::new()));
                    }
                    if !part.is_empty() {
                        nodes.push(self.dom.create_text(part));
                    }
                }
                nodes
            }
            Piece::Attachment(attachment) => vec![self.attachment(attachment)],
        }
    }

    fn attachment(&mut self, attachment: &Attachment) -> NodeId {
        let element = |representation: &Option<ElementRepresentation>, name: &str| {
            representation
                .clone()
                .unwrap_or_else(|| ElementRepresentation::new(name))
        };
        match attachment {
            Attachment::LineBreak { representation } => {
                let br = element(representation, "br");
                self.dom.create_element(br.name.clone(), br.to_attributes())
            }
            Attachment::HorizontalRule { representation } => {
                let hr = element(representation, "hr");
                self.dom.create_element(hr.name.clone(), hr.to_attributes())
            }
            Attachment::Image(image) => self.dom.create_element("img", image.to_attributes()),
            Attachment::Video(video) => self.dom.create_element("video", video.to_attributes()),
            Attachment::Comment { text } => self.dom.create_comment(text.as_str()),
            Attachment::Html { html, .. } => self.dom.create_unsupported(html.as_str()),
        }
    }
}

/// Reorders each branch's inline elements so that neighbouring branches
/// share as long a prefix as possible.
///
/// Elements the previous branch also had keep their previous relative
/// order and come first. New elements follow, longest-running first, where
/// the run length is the number of consecutive branches from this one on
/// that contain the element.
fn defragment(branches: &mut [Branch]) {
    let mut previous: Vec<ElementRepresentation> = Vec::new();
    for index in 0..branches.len() {
        let current = &branches[index].elements;
        let mut ordered: Vec<ElementRepresentation> = previous
            .iter()
            .filter(|p| current.iter().any(|c| c.matches(p)))
            .cloned()
            .collect();
        let mut fresh: Vec<(usize, ElementRepresentation)> = current
            .iter()
            .filter(|c| !ordered.iter().any(|o| o.matches(c)))
            .map(|c| (run_length(&branches[index..], c), c.clone()))
            .collect();
        fresh.sort_by(|a, b| b.0.cmp(&a.0));
        ordered.extend(fresh.into_iter().map(|(_, element)| element));

        branches[index].elements = ordered.clone();
        previous = ordered;
    }
}

fn run_length(branches: &[Branch], element: &ElementRepresentation) -> usize {
    branches
        .iter()
        .take_while(|branch| branch.elements.iter().any(|e| e.matches(element)))
        .count()
}

fn names(chain: &[ElementRepresentation]) -> Vec<&str> {
    chain.iter().map(|e| e.name.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::invariants;
    use crate::flat::{Attributes, Image, ImageAlignment, ParagraphProperty, Video, from_dom};
    use crate::markup::{self, SerializerOptions};
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn html(flat: &FlatText) -> String {
        let dom = to_dom(flat);
        invariants::check(&dom);
        markup::serialize(&dom, &SerializerOptions::default())
    }

    fn list() -> Attributes {
        Attributes::default().with_paragraph(vec![ParagraphProperty::unordered_list()])
    }

    #[test]
    fn test_empty_flat_text_gives_empty_document() {
        let dom = to_dom(&FlatText::new());
        assert_eq!(dom.len(dom.root()), 0);
        assert_snapshot!(html(&FlatText::new()), @"");
    }

    #[test]
    fn test_plain_paragraphs() {
        assert_snapshot!(html(&FlatText::plain("Hello\nWorld!")), @"<p>Hello</p><p>World!</p>");
    }

    #[test]
    fn test_trailing_separator_opens_no_paragraph() {
        assert_snapshot!(html(&FlatText::plain("Hello\n")), @"<p>Hello</p>");
    }

    #[test]
    fn test_empty_paragraph_in_the_middle() {
        assert_snapshot!(html(&FlatText::plain("a\n\nb")), @"<p>a</p><p></p><p>b</p>");
    }

    #[test]
    fn test_list_paragraphs_share_one_list() {
        let flat = FlatText::new().with_text("First Line\nSecond Line", list());
        assert_snapshot!(
            html(&flat),
            @"<ul><li>First Line</li><li>Second Line</li></ul>"
        );
    }

    #[test]
    fn test_headings_never_merge() {
        let heading = Attributes::default().with_paragraph(vec![ParagraphProperty::heading(1)]);
        let flat = FlatText::new().with_text("a\nb", heading);
        assert_snapshot!(html(&flat), @"<h1>a</h1><h1>b</h1>");
    }

    #[test]
    fn test_blockquote_paragraphs_merge_at_the_quote() {
        let quoted = Attributes::default().with_paragraph(vec![
            ParagraphProperty::blockquote(),
            ParagraphProperty::Paragraph {
                representation: None,
            },
        ]);
        let flat = FlatText::new().with_text("a\nb", quoted);
        assert_snapshot!(html(&flat), @"<blockquote><p>a</p><p>b</p></blockquote>");
    }

    #[test]
    fn test_preformatted_lines_join_with_a_line_feed() {
        let pre = Attributes::default().with_paragraph(vec![ParagraphProperty::Preformatted {
            representation: None,
        }]);
        let flat = FlatText::new().with_text("a\nb", pre);
        assert_eq!(html(&flat), "<pre>a\nb</pre>");
    }

    #[test]
    fn test_nested_list_goes_into_the_open_item() {
        let outer = list();
        let nested = Attributes::default().with_paragraph(vec![
            ParagraphProperty::unordered_list(),
            ParagraphProperty::ordered_list(),
        ]);
        let flat = FlatText::new()
            .with_text("a\n", outer.clone())
            .with_text("b\n", nested)
            .with_text("c", outer);
        assert_snapshot!(
            html(&flat),
            @"<ul><li>a<ol><li>b</li></ol></li><li>c</li></ul>"
        );
    }

    #[test]
    fn test_line_separator_becomes_br() {
        assert_snapshot!(html(&FlatText::plain("a\u{2028}b")), @"<p>a<br>b</p>");
    }

    #[test]
    fn test_lone_rule_is_not_wrapped() {
        let flat = FlatText::plain("a\n")
            .with_attachment(Attachment::horizontal_rule(), Attributes::default())
            .with_text("\nb", Attributes::default());
        assert_snapshot!(html(&flat), @"<p>a</p><hr><p>b</p>");
    }

    #[test]
    fn test_attachments() {
        let mut image = Image::new("a.png");
        image.alignment = Some(ImageAlignment::Center);
        let flat = FlatText::plain("x")
            .with_attachment(Attachment::Image(image), Attributes::default())
            .with_attachment(
                Attachment::Comment {
                    text: "more".to_string(),
                },
                Attributes::default(),
            );
        assert_snapshot!(
            html(&flat),
            @r#"<p>x<img src="a.png" class="aligncenter"><!--more--></p>"#
        );
    }

    #[test]
    fn test_image_paragraph_and_caption_share_one_figure() {
        let figure = Attributes::default().with_paragraph(vec![ParagraphProperty::figure()]);
        let caption = Attributes::default().with_paragraph(vec![
            ParagraphProperty::figure(),
            ParagraphProperty::figcaption(),
        ]);
        let flat = FlatText::new()
            .with_attachment(Attachment::Image(Image::new("a.png")), figure.clone())
            .with_text("\n", figure)
            .with_text("A cat\n", caption)
            .with_attachment(
                Attachment::Video(Video::new("v.mp4").with_poster("p.png")),
                Attributes::default(),
            );
        assert_snapshot!(
            html(&flat),
            @r#"<figure><img src="a.png"><figcaption>A cat</figcaption></figure><p><video src="v.mp4" poster="p.png"></video></p>"#
        );
    }

    #[test]
    fn test_shared_styles_are_not_fragmented() {
        let flat = FlatText::new()
            .with_text("a", Attributes::default().bold())
            .with_text("b", Attributes::default().bold().italic())
            .with_text("c", Attributes::default().bold());
        assert_snapshot!(html(&flat), @"<p><strong>a<em>b</em>c</strong></p>");
    }

    #[test]
    fn test_longer_running_style_goes_outside() {
        let flat = FlatText::new()
            .with_text("a", Attributes::default().bold().italic())
            .with_text("b", Attributes::default().italic());
        assert_snapshot!(html(&flat), @"<p><em><strong>a</strong>b</em></p>");
    }

    #[test]
    fn test_link_around_partial_bold() {
        let flat = FlatText::new()
            .with_text("foo ", Attributes::default().link("x"))
            .with_text("bar", Attributes::default().link("x").bold());
        assert_snapshot!(
            html(&flat),
            @r#"<p><a href="x">foo <strong>bar</strong></a></p>"#
        );
    }

    #[rstest]
    #[case("<p>Hello <strong>bold</strong> and <em>italic</em></p>")]
    #[case("<ul><li>one</li><li>two</li></ul><p>after</p>")]
    #[case("<blockquote><p>a</p><p>b</p></blockquote>")]
    #[case("<h2>title</h2><p>a<br>b</p>")]
    #[case("<p>a</p><hr><p>b</p>")]
    #[case("<ol><li>a<ul><li>b</li></ul></li><li>c</li></ol>")]
    #[case("<pre>x\ny</pre>")]
    #[case(r#"<p><a href="x" target="_blank">l</a><code>c</code></p>"#)]
    #[case("<p>x<!--c--></p><table><tr><td>t</td></tr></table>")]
    #[case(r#"<figure><img src="a.png" class="alignleft"><figcaption>cap</figcaption></figure><p>x</p>"#)]
    #[case(r#"<p>a<video src="v.mp4" controls></video></p>"#)]
    fn test_flat_round_trip(#[case] source: &str) {
        let flat = from_dom(&markup::parse(source));
        let rebuilt = to_dom(&flat);
        invariants::check(&rebuilt);
        assert_eq!(from_dom(&rebuilt), flat);
        assert_eq!(
            markup::serialize(&rebuilt, &SerializerOptions::default()),
            source
        );
    }
}
