//! Facade over the language frontend.
//!
//! The driver only needs "parse a stream, then drive a writer over the
//! result". Everything behind [`Frontend`] is replaceable; the bundled
//! implementation is a token-stream scanner that is sufficient for the
//! canonical/minify/deflate emitters and the parse-tree dumps.

mod emit;
mod scanner;

pub use emit::CanonicalStyle;
pub use scanner::{Token, TokenKind};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("{file}:{line}:{column}: {message}")]
    Syntax {
        file: String,
        line: u32,
        column: u32,
        message: String,
    },

    #[error("Emit failed: {0}")]
    Emit(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-parse settings handed to the frontend by the driver.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    /// Display name of the stream, used in diagnostics.
    pub filename: String,
    /// Import name of the package the stream belongs to, if known.
    pub import_name: Option<String>,
    /// Retain source location information for serialized dumps.
    pub tracking: bool,
}

impl ParseContext {
    pub fn for_file(filename: impl Into<String>) -> Self {
        Self { filename: filename.into(), ..Default::default() }
    }

    pub fn with_import_name(mut self, import_name: Option<String>) -> Self {
        self.import_name = import_name;
        self
    }

    pub fn with_tracking(mut self, tracking: bool) -> Self {
        self.tracking = tracking;
        self
    }
}

/// The parsed representation of one source stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxTree {
    tokens: Vec<Token>,
    tracking: bool,
}

impl SyntaxTree {
    pub(crate) fn new(tokens: Vec<Token>, tracking: bool) -> Self {
        Self { tokens, tracking }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Canonical source form. Fails when the stream's nesting is malformed
    /// (e.g. unbalanced braces), which the scanner alone cannot reject.
    pub fn write_canonical(
        &self,
        out: &mut dyn std::io::Write,
        style: &CanonicalStyle,
    ) -> Result<(), FrontendError> {
        emit::write_canonical(&self.tokens, out, style)
    }

    /// Minified source form. Cannot fail once parsing succeeded, apart from
    /// the underlying writer.
    pub fn write_minified(&self, out: &mut dyn std::io::Write) -> Result<(), FrontendError> {
        emit::write_minified(&self.tokens, out)
    }

    pub fn minified_to_vec(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail.
        emit::write_minified(&self.tokens, &mut buffer).expect("in-memory minify");
        buffer
    }

    /// Serialized parse tree as JSON. Locations are included only when the
    /// tree was parsed with tracking enabled.
    pub fn to_json_value(&self) -> serde_json::Value {
        emit::tree_to_json(&self.tokens, self.tracking)
    }

    /// Serialized parse tree as a protobuf message.
    pub fn to_protobuf(&self) -> Vec<u8> {
        emit::tree_to_protobuf(&self.tokens)
    }
}

/// Parse a stream into a [`SyntaxTree`].
#[cfg_attr(test, mockall::automock)]
pub trait Frontend: Send + Sync {
    fn parse(&self, source: &str, context: &ParseContext) -> Result<SyntaxTree, FrontendError>;
}

/// The bundled token-stream frontend.
#[derive(Debug, Default)]
pub struct TokenFrontend;

impl Frontend for TokenFrontend {
    fn parse(&self, source: &str, context: &ParseContext) -> Result<SyntaxTree, FrontendError> {
        let tokens = scanner::scan(source, &context.filename)?;
        Ok(SyntaxTree::new(tokens, context.tracking))
    }
}
