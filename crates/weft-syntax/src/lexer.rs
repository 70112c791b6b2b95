//! # Lexer - Tokenizing HTML Source
//!
//! This module provides the first stage of reading markup: breaking source
//! text into lexemes using the [Logos] lexer generator.
//!
//! [Logos]: https://docs.rs/logos
//!
//! ## The Lossless Guarantee
//!
//! Every byte in the input appears in exactly one lexeme. Nothing is skipped,
//! not even malformed markup, which is what lets the tokenizer hand unknown
//! constructs through untouched:
//!
//! ```
//! use weft_syntax::lexer::lex;
//!
//! let input = "<p>Hello <b>world</b><!-- note --></p>";
//! let lexemes = lex(input);
//!
//! let reconstructed: String = lexemes.iter().map(|l| l.text).collect();
//! assert_eq!(input, reconstructed);
//! ```
//!
//! ## Lexeme Design
//!
//! Lexemes are context-free. The lexer does not know that `<script>` switches
//! to raw text or that `<br>` never closes; that is the tokenizer's job.
//!
//! - `<!-- ... -->` → [`TokenKind::Comment`] (an unterminated comment runs to
//!   the end of input)
//! - `<!DOCTYPE ...>`, `<![CDATA[...]>` → [`TokenKind::Declaration`]
//! - `<? ... >` → [`TokenKind::ProcessingInstruction`]
//! - `<name ...>` → [`TokenKind::StartTag`]
//! - `</name>` → [`TokenKind::EndTag`]
//! - runs of anything but `<` → [`TokenKind::Text`]
//! - a `<` that opens nothing → [`TokenKind::Lt`]

use std::ops::Range;

use logos::Logos;

/// Lexeme kinds produced by the Logos lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    #[token("<!--", lex_comment)]
    Comment,

    #[regex(r"<![A-Za-z\[][^>]*>")]
    Declaration,

    #[regex(r"<\?[^>]*>")]
    ProcessingInstruction,

    #[regex(r#"<[A-Za-z][^\s/>"']*([^>"']|"[^"]*"|'[^']*')*>"#)]
    StartTag,

    #[regex(r"</[A-Za-z][^>]*>")]
    EndTag,

    #[regex(r"[^<]+")]
    Text,

    #[token("<")]
    Lt,
}

/// Extends a comment lexeme up to and including the closing `-->`.
fn lex_comment(lexer: &mut logos::Lexer<TokenKind>) {
    let rest = lexer.remainder();
    let end = rest.find("-->").map(|i| i + 3).unwrap_or(rest.len());
    lexer.bump(end);
}

/// A lexeme with its kind and text slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

/// Lex the input into a sequence of lexemes.
///
/// Guarantees that all bytes from the input appear in the output.
pub fn lex(input: &str) -> Vec<Lexeme<'_>> {
    lex_with_spans(input)
        .into_iter()
        .map(|(lexeme, _)| lexeme)
        .collect()
}

/// Lex and return lexemes along with their byte spans.
pub fn lex_with_spans(input: &str) -> Vec<(Lexeme<'_>, Range<usize>)> {
    let mut lexemes = Vec::new();
    let mut lexer = TokenKind::lexer(input);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let text = lexer.slice();
        // Unrecognised input is still content.
        let kind = result.unwrap_or(TokenKind::Text);
        lexemes.push((Lexeme { kind, text }, span));
    }

    lexemes
}
