use log::{trace, warn};
use std::ops::Range;

use weft_syntax::{Attribute, RAW_TEXT_ELEMENTS, Token, tokenize_with_spans};

use super::serializer::write_start_tag;
use crate::dom::{Dom, NodeId, element};

/// Elements kept as opaque markup: the editor cannot model their content.
const OPAQUE: &[&str] = &[
    "address",
    "audio",
    "canvas",
    "dl",
    "embed",
    "fieldset",
    "form",
    "iframe",
    "math",
    "noscript",
    "object",
    "script",
    "select",
    "style",
    "svg",
    "table",
    "textarea",
    "video",
];

/// Void elements with no native representation.
const UNSUPPORTED_VOID: &[&str] = &[
    "area", "base", "col", "input", "link", "meta", "param", "source", "track", "wbr",
];

/// Builds a tree from markup. Never fails: constructs the editor cannot
/// model are kept verbatim in `#unsupported` elements.
pub fn parse(html: &str) -> Dom {
    TreeBuilder::new(html).build(&tokenize_with_spans(html))
}

type Spanned = (Token, Range<usize>);

struct TreeBuilder<'a> {
    source: &'a str,
    dom: Dom,
    open_elements: Vec<NodeId>,
}

impl<'a> TreeBuilder<'a> {
    fn new(source: &'a str) -> Self {
        let dom = Dom::empty();
        let root = dom.root();
        Self {
            source,
            dom,
            open_elements: vec![root],
        }
    }

    fn current(&self) -> NodeId {
        self.open_elements
            .last()
            .copied()
            .unwrap_or_else(|| self.dom.root())
    }

    fn build(mut self, tokens: &[Spanned]) -> Dom {
        let mut index = 0;
        while index < tokens.len() {
            index += self.step(&tokens[index..]);
        }

        while self.open_elements.len() > 1 {
            self.pop();
        }

        let root = self.dom.root();
        self.finish_text(root, false);
        self.dom
    }

    /// Handles the token at the start of `tokens`, returning how many tokens
    /// it consumed.
    fn step(&mut self, tokens: &[Spanned]) -> usize {
        match &tokens[0].0 {
            Token::Text(text) => {
                self.text(text);
                1
            }
            Token::Comment(body) => {
                let comment = self.dom.create_comment(body.clone());
                self.dom.append_child(self.current(), comment);
                1
            }
            Token::Declaration(raw) => {
                warn!("keeping declaration as unsupported markup: {raw}");
                self.unsupported(raw.clone());
                1
            }
            Token::Open {
                name,
                attributes,
                self_closing,
            } => {
                if name == "video" {
                    let consumed = if *self_closing {
                        Some(1)
                    } else {
                        end_of_empty_element(tokens)
                    };
                    if let Some(consumed) = consumed {
                        self.open(name, attributes, true);
                        return consumed;
                    }
                }
                if OPAQUE.contains(&name.as_str()) && !self_closing {
                    let (span, consumed) = subtree_span(tokens);
                    warn!("keeping <{name}> as unsupported markup");
                    self.unsupported(self.source[span].to_string());
                    return consumed;
                }
                if UNSUPPORTED_VOID.contains(&name.as_str()) || OPAQUE.contains(&name.as_str()) {
                    let mut raw = String::new();
                    write_start_tag(&mut raw, name, attributes, *self_closing);
                    self.unsupported(raw);
                    return 1;
                }
                self.open(name, attributes, *self_closing);
                1
            }
            Token::Close { name } => {
                self.close(name);
                1
            }
        }
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let current = self.current();
        if let Some(&last) = self.dom.children(current).last() {
            if let Some(existing) = self.dom.text_content(last) {
                let joined = format!("{existing}{text}");
                self.dom.set_text(last, joined);
                return;
            }
        }
        let node = self.dom.create_text(text);
        self.dom.append_child(current, node);
    }

    fn unsupported(&mut self, raw: String) {
        let node = self.dom.create_unsupported(raw);
        self.dom.append_child(self.current(), node);
    }

    fn open(&mut self, name: &str, attributes: &[Attribute], self_closing: bool) {
        self.close_implied(name);

        let node = self.dom.create_element(name, attributes.to_vec());
        self.dom.append_child(self.current(), node);
        trace!("open <{name}> at depth {}", self.open_elements.len());

        if element::is_void(name) {
            return;
        }
        self.open_elements.push(node);
        if self_closing {
            self.pop();
        }
    }

    /// `<li>` ends an open `li`, and a block-level start tag ends an open
    /// `p`.
    fn close_implied(&mut self, name: &str) {
        let current = self.current();
        let implied = match self.dom.name(current) {
            Some("li") => name == "li",
            Some("p") => element::is_block_level(name),
            _ => false,
        };
        if implied {
            self.pop();
        }
    }

    fn close(&mut self, name: &str) {
        if element::is_void(name) || UNSUPPORTED_VOID.contains(&name) {
            return;
        }

        let root = self.dom.root();
        let matching = self
            .open_elements
            .iter()
            .rposition(|&open| open != root && self.dom.name(open) == Some(name));

        match matching {
            Some(position) => {
                while self.open_elements.len() > position {
                    self.pop();
                }
            }
            None => {
                warn!("keeping stray </{name}> as unsupported markup");
                self.unsupported(format!("</{name}>"));
            }
        }
    }

    /// Closes the current element. An inline element that ends up empty is
    /// replaced by its markup so it survives a round trip.
    fn pop(&mut self) {
        let Some(node) = self.open_elements.pop() else {
            return;
        };
        if self.open_elements.is_empty() {
            self.open_elements.push(node);
            return;
        }

        let Some(el) = self.dom.element(node) else {
            return;
        };
        if el.children.is_empty() && !element::is_block_level(&el.name) {
            let mut raw = String::new();
            write_start_tag(&mut raw, &el.name, &el.attributes, false);
            raw.push_str(&format!("</{}>", el.name));
            trace!("empty inline element kept as markup: {raw}");

            let replacement = self.dom.create_unsupported(raw);
            self.dom.insert_before(node, replacement);
            self.dom.remove(node);
        }
    }

    /// Whitespace handling outside `pre`: whitespace-only text with a line
    /// break is dropped, whitespace containing a line break next to a block
    /// boundary is trimmed, remaining line breaks become spaces.
    fn finish_text(&mut self, node: NodeId, in_pre: bool) {
        let in_pre = in_pre || self.dom.name(node) == Some("pre");
        let raw = self.dom.is_named(node, RAW_TEXT_ELEMENTS);

        for child in self.dom.children(node).to_vec() {
            if self.dom.is_element(child) {
                self.finish_text(child, in_pre);
                continue;
            }
            if in_pre || raw {
                continue;
            }
            let Some(mut text) = self.dom.text_content(child).map(str::to_string) else {
                continue;
            };
            if !text.contains(['\n', '\r']) {
                continue;
            }
            if text.trim().is_empty() {
                self.dom.remove(child);
                continue;
            }

            if self.is_block_boundary(self.dom.previous_sibling(child), node) {
                text = trim_breaking_whitespace_start(&text).to_string();
            }
            if self.is_block_boundary(self.dom.next_sibling(child), node) {
                text = trim_breaking_whitespace_end(&text).to_string();
            }
            text = text.replace("\r\n", " ").replace(['\n', '\r'], " ");
            self.dom.set_text(child, text);
        }
    }

    /// A missing sibling means the edge of `parent`.
    fn is_block_boundary(&self, sibling: Option<NodeId>, parent: NodeId) -> bool {
        match sibling {
            Some(s) => self.dom.is_block_level(s),
            None => self.dom.is_block_level(parent),
        }
    }
}

fn trim_breaking_whitespace_start(text: &str) -> &str {
    let trimmed = text.trim_start();
    let leading = &text[..text.len() - trimmed.len()];
    if leading.contains(['\n', '\r']) {
        trimmed
    } else {
        text
    }
}

fn trim_breaking_whitespace_end(text: &str) -> &str {
    let trimmed = text.trim_end();
    let trailing = &text[trimmed.len()..];
    if trailing.contains(['\n', '\r']) {
        trimmed
    } else {
        text
    }
}

/// Tokens up to and including the close tag of the element opened by
/// `tokens[0]`, when only whitespace comes before it.
fn end_of_empty_element(tokens: &[Spanned]) -> Option<usize> {
    let Token::Open { name: open, .. } = &tokens[0].0 else {
        return None;
    };
    for (index, (token, _)) in tokens.iter().enumerate().skip(1) {
        match token {
            Token::Text(text) if text.trim().is_empty() => {}
            Token::Close { name } if name == open => return Some(index + 1),
            _ => return None,
        }
    }
    None
}

/// Source span of the element opened by `tokens[0]` up to its matching close
/// tag (or the end of input), and the number of tokens it covers.
fn subtree_span(tokens: &[Spanned]) -> (Range<usize>, usize) {
    let (Token::Open { name: root_name, .. }, first) = &tokens[0] else {
        return (tokens[0].1.clone(), 1);
    };

    let mut depth = 0usize;
    for (index, (token, span)) in tokens.iter().enumerate() {
        match token {
            Token::Open {
                name, self_closing, ..
            } if name == root_name && !self_closing => depth += 1,
            Token::Close { name } if name == root_name => {
                depth -= 1;
                if depth == 0 {
                    return (first.start..span.end, index + 1);
                }
            }
            _ => {}
        }
    }
    let end = tokens.last().map_or(first.end, |(_, span)| span.end);
    (first.start..end, tokens.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{UNSUPPORTED, UNSUPPORTED_HTML_ATTRIBUTE, invariants};
    use crate::markup::{SerializerOptions, serialize};
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    fn round_trip(html: &str) -> String {
        let dom = parse(html);
        invariants::check(&dom);
        serialize(&dom, &SerializerOptions::default())
    }

    #[test]
    fn test_nested_elements() {
        let dom = parse("<p>Hello <b>World</b></p>");
        let p = dom.children(dom.root())[0];
        assert_eq!(dom.name(p), Some("p"));
        assert_eq!(dom.len(p), 11);
        assert_eq!(dom.children(p).len(), 2);
    }

    #[test]
    fn test_unclosed_elements_close_at_end() {
        assert_snapshot!(round_trip("<p>a<b>b"), @"<p>a<b>b</b></p>");
    }

    #[test]
    fn test_close_pops_to_matching_element() {
        assert_snapshot!(round_trip("<p><b><i>x</p>y"), @"<p><b><i>x</i></b></p>y");
    }

    #[test]
    fn test_implied_list_item_end() {
        assert_snapshot!(round_trip("<ul><li>a<li>b</ul>"), @"<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn test_stray_close_is_kept() {
        let dom = parse("a</span>b");
        let children = dom.children(dom.root()).to_vec();
        assert_eq!(children.len(), 3);
        assert_eq!(dom.name(children[1]), Some(UNSUPPORTED));
        assert_eq!(dom.attribute(children[1], UNSUPPORTED_HTML_ATTRIBUTE), Some("</span>"));
        assert_eq!(dom.len(dom.root()), 3);
    }

    #[test]
    fn test_opaque_subtree_is_one_unit() {
        let html = "<p>a</p><table><tr><td>1</td></tr></table><p>b</p>";
        let dom = parse(html);
        let table = dom.children(dom.root())[1];
        assert_eq!(dom.name(table), Some(UNSUPPORTED));
        assert_eq!(dom.len(table), 1);
        assert_eq!(round_trip(html), html);
    }

    #[test]
    fn test_opaque_subtree_keeps_source_text() {
        let html = "<table><tr><td>a&nbsp;b &lt; c</td><td class=x>&#169;</td></tr></table>";
        let dom = parse(html);
        let table = dom.children(dom.root())[0];
        assert_eq!(dom.attribute(table, UNSUPPORTED_HTML_ATTRIBUTE), Some(html));
        assert_eq!(round_trip(html), html);
    }

    #[test]
    fn test_figure_is_parsed_as_blocks() {
        let html = r#"<figure><img src="a.png"><figcaption>A <b>cat</b></figcaption></figure>"#;
        let dom = parse(html);
        let figure = dom.children(dom.root())[0];
        assert_eq!(dom.name(figure), Some("figure"));
        let children = dom.children(figure).to_vec();
        assert_eq!(dom.name(children[0]), Some("img"));
        assert_eq!(dom.name(children[1]), Some("figcaption"));
        assert_eq!(dom.len(figure), 6);
        assert_eq!(round_trip(html), html);
    }

    #[test]
    fn test_empty_video_is_one_element() {
        let html = r#"<p>a<video src="v.mp4" poster="p.png" controls>
        </video>b</p>"#;
        let dom = parse(html);
        let p = dom.children(dom.root())[0];
        let video = dom.children(p)[1];
        assert_eq!(dom.name(video), Some("video"));
        assert_eq!(dom.attribute(video, "poster"), Some("p.png"));
        assert_eq!(dom.len(p), 3);
        assert_snapshot!(
            round_trip(html),
            @r#"<p>a<video src="v.mp4" poster="p.png" controls></video>b</p>"#
        );
    }

    #[test]
    fn test_video_with_fallback_content_is_kept_verbatim() {
        let html = r#"<video controls><source src="v.webm">Sorry&hellip;</video>"#;
        let dom = parse(html);
        let video = dom.children(dom.root())[0];
        assert_eq!(dom.name(video), Some(UNSUPPORTED));
        assert_eq!(round_trip(html), html);
    }

    #[test]
    fn test_script_content_is_verbatim() {
        let html = "<script>if (a < b) { go(); }</script>";
        assert_eq!(round_trip(html), html);
    }

    #[test]
    fn test_unsupported_void_and_declaration() {
        assert_snapshot!(
            round_trip("<!DOCTYPE html><p>a<input type=\"text\">b</p>"),
            @r#"<!DOCTYPE html><p>a<input type="text">b</p>"#
        );
    }

    #[test]
    fn test_empty_inline_element_is_kept_as_markup() {
        let dom = parse(r#"<p><a name="top"></a>x</p>"#);
        let p = dom.children(dom.root())[0];
        let anchor = dom.children(p)[0];
        assert_eq!(dom.name(anchor), Some(UNSUPPORTED));
        assert_eq!(dom.len(p), 2);
        assert_eq!(
            serialize(&dom, &SerializerOptions::default()),
            r#"<p><a name="top"></a>x</p>"#
        );
    }

    #[test]
    fn test_line_breaks_outside_pre() {
        assert_snapshot!(round_trip("<p>\n  one\ntwo\n</p>\n<p>x</p>"), @"<p>one two</p><p>x</p>");
    }

    #[test]
    fn test_pre_keeps_line_breaks() {
        let dom = parse("<pre>a\n  b</pre>");
        assert_eq!(dom.text(dom.root()), "a\n  b");
    }

    #[test]
    fn test_pretty_output_reparses_to_same_tree() {
        let html = "<blockquote><p>a <b>b</b></p><ul><li>c</li></ul></blockquote>tail<hr><p>d</p>";
        let dom = parse(html);
        let pretty = serialize(&dom, &SerializerOptions::pretty());
        let reparsed = parse(&pretty);
        assert!(dom.same_structure(dom.root(), &reparsed, reparsed.root()));
    }
}
