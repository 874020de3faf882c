//! Token scanner for the language's surface syntax.
//!
//! Raw tokenization is handled entirely by the logos derive lexer. This
//! module maps the raw matches onto position-carrying [`Token`]s, and turns
//! unterminated literals and unexpected characters into syntax errors.

use logos::{Lexer, Logos};

use super::FrontendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Punct,
    LineComment,
    BlockComment,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Punct => "punct",
            TokenKind::LineComment => "line-comment",
            TokenKind::BlockComment => "block-comment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Verbatim source text, including quotes and comment markers.
    pub text: String,
    /// 1-based source line of the first byte.
    pub line: u32,
    /// 1-based source column (in bytes) of the first byte.
    pub column: u32,
}

/// Consume a string literal after its opening quote. Escapes are skipped as
/// two bytes; continuation bytes of multi-byte scalars can never equal the
/// ASCII quote, so byte scanning is safe. Returns false when the literal is
/// unterminated (end of input, line break, or dangling escape).
fn lex_string(lex: &mut Lexer<'_, RawToken>) -> bool {
    let quote = lex.slice().as_bytes()[0];
    let rest = lex.remainder().as_bytes();

    let mut i = 0;
    while i < rest.len() {
        match rest[i] {
            b'\\' => i += 2,
            b'\n' => return false,
            b if b == quote => {
                lex.bump(i + 1);
                return true;
            }
            _ => i += 1,
        }
    }

    false
}

/// Consume a block comment after its opening marker. Returns false when no
/// closing marker exists before the end of input.
fn lex_block_comment(lex: &mut Lexer<'_, RawToken>) -> bool {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            true
        }
        None => {
            lex.bump(lex.remainder().len());
            false
        }
    }
}

/// Raw token classes. Longest-match resolves the overlaps (`//` over `/`,
/// `..=` over `..` over `.`); the quote and comment openers use callbacks
/// because their ends are not regular enough for a pattern that also has to
/// detect unterminated input.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\x0c]+")]
enum RawToken {
    #[regex(r"//[^\n]*")]
    LineComment,

    #[token("/*", lex_block_comment)]
    BlockComment(bool),

    #[token("\"", lex_string)]
    #[token("'", lex_string)]
    Str(bool),

    #[regex(r"0[xob][a-zA-Z0-9_]*")]
    #[regex(r"[0-9][0-9_]*(\.[0-9][0-9_]*)?")]
    Number,

    #[regex(r"[A-Za-z_\x{80}-\x{10FFFF}][A-Za-z0-9_\x{80}-\x{10FFFF}]*", priority = 3)]
    Identifier,

    #[regex(
        r"<<=|>>=|\.\.\.|\.\.=|::|->|=>|==|!=|<=|>=|&&|\|\||<<|>>|\+=|-=|\*=|/=|%=|&=|\|=|\^=|\.\."
    )]
    Operator,

    // Any remaining ASCII punctuation, one character at a time. Quotes are
    // excluded; they belong to the string callbacks above.
    #[regex(r"[!#-&(-/:-@\[-`{-~]")]
    Punct,
}

/// Byte offsets of the first byte of every line.
fn line_starts(source: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, byte) in source.bytes().enumerate() {
        if byte == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

/// Tokenize a whole source stream with location information. Comments are
/// kept as tokens so the canonical emitter can preserve them.
pub(super) fn scan(source: &str, file: &str) -> Result<Vec<Token>, FrontendError> {
    let line_starts = line_starts(source);
    let position = |offset: usize| -> (u32, u32) {
        let line = line_starts.partition_point(|start| *start <= offset);
        let column = offset - line_starts[line - 1] + 1;
        (line as u32, column as u32)
    };
    let syntax_error = |offset: usize, message: String| -> FrontendError {
        let (line, column) = position(offset);
        FrontendError::Syntax { file: file.to_string(), line, column, message }
    };

    let mut lexer = RawToken::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();

        let raw = match result {
            Ok(raw) => raw,
            Err(()) => {
                return Err(syntax_error(
                    span.start,
                    format!("unexpected character {:?}", lexer.slice()),
                ));
            }
        };

        let kind = match raw {
            RawToken::LineComment => TokenKind::LineComment,
            RawToken::BlockComment(true) => TokenKind::BlockComment,
            RawToken::BlockComment(false) => {
                return Err(syntax_error(span.start, "unterminated block comment".to_string()));
            }
            RawToken::Str(true) => TokenKind::String,
            RawToken::Str(false) => {
                return Err(syntax_error(span.start, "unterminated string literal".to_string()));
            }
            RawToken::Number => TokenKind::Number,
            RawToken::Identifier => TokenKind::Identifier,
            RawToken::Operator | RawToken::Punct => TokenKind::Punct,
        };

        let (line, column) = position(span.start);
        tokens.push(Token { kind, text: lexer.slice().to_string(), line, column });
    }

    Ok(tokens)
}
