//! # weft-syntax
//!
//! A lossless HTML tokenizer built on [Logos].
//!
//! [Logos]: https://docs.rs/logos
//!
//! ## Architecture Overview
//!
//! ```text
//! Source Text → Lexer → Lexemes → Tokenizer → Tokens → (engine tree builder)
//!               (Logos)           (tags, entities, raw text)
//! ```
//!
//! ### 1. Lexer ([`lexer`] module)
//!
//! Splits input into lexemes: tags, comments, declarations and text runs.
//! Every byte belongs to exactly one lexeme.
//!
//! ### 2. Tokenizer ([`tokenizer`] module)
//!
//! Interprets lexemes as [`Token`]s: lowercased tag names, parsed
//! attributes, decoded character references, comments without their
//! delimiters. `script` and `style` bodies are kept raw.
//!
//! The tokenizer never fails. A `<` that does not start markup is text, an
//! unterminated comment runs to the end of input, and a tag missing its `>`
//! degrades to text.
//!
//! ## Quick Start
//!
//! ```
//! use weft_syntax::{tokenize, Token};
//!
//! let tokens = tokenize("<p>Hi <b>there</b></p>");
//! assert_eq!(tokens.len(), 6);
//! assert!(matches!(&tokens[1], Token::Text(t) if t == "Hi "));
//! ```

pub mod lexer;
pub mod tokenizer;

pub use lexer::{Lexeme, TokenKind, lex, lex_with_spans};
pub use tokenizer::{Attribute, RAW_TEXT_ELEMENTS, Token, tokenize, tokenize_with_spans};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    // ============ Lossless lexing ============

    #[rstest]
    #[case("")]
    #[case("plain")]
    #[case("<p>a</p>")]
    #[case("<!DOCTYPE html><html><body><p class='x'>a&nbsp;b</p></body></html>")]
    #[case("<ul><li>one<li>two</ul>")]
    #[case("<<>>")]
    #[case("<!-- unterminated")]
    #[case("<div\n  id=\"multi\nline\">x</div>")]
    fn test_lex_is_lossless(#[case] input: &str) {
        let reconstructed: String = lex(input).iter().map(|l| l.text).collect();
        assert_eq!(input, reconstructed);
    }

    // ============ Token stream shape ============

    #[test]
    fn test_token_stream_snapshot() {
        let tokens = tokenize("<p>a<br>b<!--c--></p>");
        let kinds: Vec<&str> = tokens
            .iter()
            .map(|t| match t {
                Token::Open { .. } => "open",
                Token::Close { .. } => "close",
                Token::Text(_) => "text",
                Token::Comment(_) => "comment",
                Token::Declaration(_) => "declaration",
            })
            .collect();
        insta::assert_snapshot!(kinds.join(" "), @"open text open text comment close");
    }

    #[test]
    fn test_multiline_attribute_value() {
        let tokens = tokenize("<div\n  id=\"multi\nline\">");
        assert_eq!(
            tokens,
            vec![Token::Open {
                name: "div".to_string(),
                attributes: vec![Attribute::new("id", Some("multi\nline"))],
                self_closing: false,
            }]
        );
    }
}
