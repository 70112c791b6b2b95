//! Tokenizer: turns lexemes into the `Open`/`Close`/`Text`/`Comment` stream
//! the tree builder consumes.
//!
//! Tag names are lowercased. Attribute names keep their spelling and
//! attribute values and text have character references decoded. The content
//! of `script` and `style` is raw text and is passed through verbatim.

use std::ops::Range;

use logos::Logos;

use crate::lexer::TokenKind;

/// Elements whose content is raw text rather than markup.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// A single attribute as written on a start tag.
///
/// `value` is `None` for a bare attribute such as `<input disabled>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            value: value.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Open {
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
    },
    Close {
        name: String,
    },
    /// Character data. Raw for `script`/`style`, decoded everywhere else.
    Text(String),
    /// Comment body without the `<!--`/`-->` delimiters.
    Comment(String),
    /// Doctype, processing instruction or CDATA section, verbatim.
    Declaration(String),
}

/// Tokenize an HTML fragment.
///
/// Never fails: malformed markup degrades to text.
pub fn tokenize(input: &str) -> Vec<Token> {
    tokenize_with_spans(input)
        .into_iter()
        .map(|(token, _)| token)
        .collect()
}

/// Tokenize and return each token with the byte span of source it was read
/// from. Adjacent text lexemes share one token whose span covers them all.
pub fn tokenize_with_spans(input: &str) -> Vec<(Token, Range<usize>)> {
    let mut tokens = Vec::new();
    let mut offset = 0;

    while offset < input.len() {
        let rest = &input[offset..];
        let mut lexer = TokenKind::lexer(rest);
        let mut consumed = rest.len();

        while let Some(result) = lexer.next() {
            let text = lexer.slice();
            let span = lexer.span();
            let kind = result.unwrap_or(TokenKind::Text);
            let raw = push_lexeme(
                &mut tokens,
                kind,
                text,
                offset + span.start..offset + span.end,
            );

            if let Some(name) = raw {
                let start = span.end;
                let body = &rest[start..];
                let end = find_raw_text_end(body, &name);
                if end > 0 {
                    tokens.push((
                        Token::Text(body[..end].to_string()),
                        offset + start..offset + start + end,
                    ));
                }
                consumed = start + end;
                break;
            }
        }

        offset += consumed;
    }

    tokens
}

/// Pushes the token for one lexeme. Returns the element name when the lexeme
/// opened a raw text element.
fn push_lexeme(
    tokens: &mut Vec<(Token, Range<usize>)>,
    kind: TokenKind,
    text: &str,
    span: Range<usize>,
) -> Option<String> {
    let token = match kind {
        TokenKind::Text => {
            push_text(tokens, &html_escape::decode_html_entities(text), span);
            return None;
        }
        TokenKind::Lt => {
            push_text(tokens, text, span);
            return None;
        }
        TokenKind::Comment => {
            let body = text.strip_prefix("<!--").unwrap_or(text);
            let body = body.strip_suffix("-->").unwrap_or(body);
            Token::Comment(body.to_string())
        }
        TokenKind::Declaration | TokenKind::ProcessingInstruction => {
            Token::Declaration(text.to_string())
        }
        TokenKind::EndTag => {
            let inner = &text[2..text.len() - 1];
            let name = inner
                .split(|c: char| c.is_whitespace() || c == '/')
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            Token::Close { name }
        }
        TokenKind::StartTag => {
            let (name, attributes, self_closing) = parse_start_tag(text);
            let raw = (!self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()))
                .then(|| name.clone());
            tokens.push((
                Token::Open {
                    name,
                    attributes,
                    self_closing,
                },
                span,
            ));
            return raw;
        }
    };
    tokens.push((token, span));
    None
}

fn push_text(tokens: &mut Vec<(Token, Range<usize>)>, text: &str, span: Range<usize>) {
    if let Some((Token::Text(previous), previous_span)) = tokens.last_mut() {
        previous.push_str(text);
        previous_span.end = span.end;
    } else {
        tokens.push((Token::Text(text.to_string()), span));
    }
}

/// Byte offset of the `</name` that ends a raw text element, or the body
/// length when it is never closed.
fn find_raw_text_end(body: &str, name: &str) -> usize {
    let lower = body.to_ascii_lowercase();
    let needle = format!("</{name}");
    lower.find(&needle).unwrap_or(body.len())
}

fn parse_start_tag(text: &str) -> (String, Vec<Attribute>, bool) {
    let mut inner = &text[1..text.len() - 1];
    let self_closing = inner.ends_with('/');
    if self_closing {
        inner = &inner[..inner.len() - 1];
    }

    let name_end = inner
        .find(|c: char| c.is_whitespace() || c == '/')
        .unwrap_or(inner.len());
    let name = inner[..name_end].to_ascii_lowercase();
    let attributes = parse_attributes(&inner[name_end..]);

    (name, attributes, self_closing)
}

fn parse_attributes(source: &str) -> Vec<Attribute> {
    let mut attributes: Vec<Attribute> = Vec::new();
    let mut rest = source;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '/');
        if rest.is_empty() {
            break;
        }

        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '=' || c == '/')
            .unwrap_or(rest.len())
            .max(1);
        let name = &rest[..name_end];
        rest = rest[name_end..].trim_start();

        let mut value = None;
        if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let (raw, remainder) = split_attribute_value(after_eq);
            value = Some(html_escape::decode_html_entities(raw).into_owned());
            rest = remainder;
        }

        // First occurrence wins, as in browsers.
        if !attributes.iter().any(|a| a.name == name) {
            attributes.push(Attribute {
                name: name.to_string(),
                value,
            });
        }
    }

    attributes
}

fn split_attribute_value(source: &str) -> (&str, &str) {
    for quote in ['"', '\''] {
        if let Some(quoted) = source.strip_prefix(quote) {
            return match quoted.find(quote) {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            };
        }
    }
    let end = source
        .find(char::is_whitespace)
        .unwrap_or(source.len());
    (&source[..end], &source[end..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn open(name: &str, attributes: Vec<Attribute>) -> Token {
        Token::Open {
            name: name.to_string(),
            attributes,
            self_closing: false,
        }
    }

    fn close(name: &str) -> Token {
        Token::Close {
            name: name.to_string(),
        }
    }

    fn text(s: &str) -> Token {
        Token::Text(s.to_string())
    }

    #[test]
    fn test_simple_paragraph() {
        assert_eq!(
            tokenize("<P>Hello</p>"),
            vec![open("p", vec![]), text("Hello"), close("p")]
        );
    }

    #[test]
    fn test_attributes() {
        let tokens = tokenize(r#"<a href="x.html?a=1&amp;b=2" target=_blank data-x='y z' hidden>"#);
        assert_eq!(
            tokens,
            vec![open(
                "a",
                vec![
                    Attribute::new("href", Some("x.html?a=1&b=2")),
                    Attribute::new("target", Some("_blank")),
                    Attribute::new("data-x", Some("y z")),
                    Attribute::new("hidden", None::<String>),
                ]
            )]
        );
    }

    #[test]
    fn test_duplicate_attribute_keeps_first() {
        assert_eq!(
            tokenize(r#"<p class="a" class="b">"#),
            vec![open("p", vec![Attribute::new("class", Some("a"))])]
        );
    }

    #[test]
    fn test_self_closing() {
        assert_eq!(
            tokenize(r#"<img src="a.png" />"#),
            vec![Token::Open {
                name: "img".to_string(),
                attributes: vec![Attribute::new("src", Some("a.png"))],
                self_closing: true,
            }]
        );
    }

    #[test]
    fn test_entities_decoded_in_text() {
        assert_eq!(tokenize("a &lt; b &amp; c"), vec![text("a < b & c")]);
    }

    #[test]
    fn test_stray_less_than_merges_into_text() {
        assert_eq!(tokenize("1 < 2"), vec![text("1 < 2")]);
    }

    #[test]
    fn test_comment_body() {
        assert_eq!(
            tokenize("<!--more-->"),
            vec![Token::Comment("more".to_string())]
        );
    }

    #[test]
    fn test_declaration() {
        assert_eq!(
            tokenize("<!DOCTYPE html>"),
            vec![Token::Declaration("<!DOCTYPE html>".to_string())]
        );
    }

    #[test]
    fn test_script_is_raw_text() {
        assert_eq!(
            tokenize("<script>if (a < b && c) {}</script><p>"),
            vec![
                open("script", vec![]),
                text("if (a < b && c) {}"),
                close("script"),
                open("p", vec![]),
            ]
        );
    }

    #[test]
    fn test_unclosed_style_runs_to_end() {
        assert_eq!(
            tokenize("<style>p { }"),
            vec![open("style", vec![]), text("p { }")]
        );
    }

    #[test]
    fn test_spans_cover_source() {
        let input = "<p>a &amp;<b>b</b> < c</p>";
        let spans: Vec<_> = tokenize_with_spans(input)
            .into_iter()
            .map(|(_, span)| &input[span])
            .collect();
        assert_eq!(
            spans,
            vec!["<p>", "a &amp;", "<b>", "b", "</b>", " < c", "</p>"]
        );
    }

    #[test]
    fn test_raw_text_span() {
        let input = "<style>p{}</style>";
        let spans: Vec<_> = tokenize_with_spans(input)
            .into_iter()
            .map(|(_, span)| span)
            .collect();
        assert_eq!(spans, vec![0..7, 7..10, 10..18]);
    }

    #[test]
    fn test_end_tag_with_whitespace() {
        assert_eq!(tokenize("</div >"), vec![close("div")]);
    }
}
