//! Emit back-ends over a token stream: canonical source, minified source,
//! and serialized parse-tree dumps (JSON, protobuf).

use std::io::Write;

use prost::Message;
use serde_json::json;

use super::scanner::{Token, TokenKind};
use super::FrontendError;

/// Canonical formatting settings, derived from the format configuration.
#[derive(Debug, Clone)]
pub struct CanonicalStyle {
    /// One level of indentation, e.g. two spaces or one tab.
    pub indent_unit: String,
}

impl Default for CanonicalStyle {
    fn default() -> Self {
        Self { indent_unit: "  ".to_string() }
    }
}

/// Words that take a space before a following parenthesis; everything else
/// identifier-shaped is treated as a call head.
const KEYWORDS: &[&str] = &[
    "const", "else", "enum", "fn", "for", "if", "impl", "import", "in", "let", "match", "pub",
    "pure", "ret", "scope", "struct", "switch", "trait", "type", "union", "use", "var", "while",
];

/// No space after one of these.
const TIGHT_AFTER: &[&str] = &["(", "[", ".", "::", "@", "#", "!"];

/// No space before one of these.
const TIGHT_BEFORE: &[&str] = &[")", "]", ",", ";", ".", "::", ":"];

fn is_wordlike(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::Identifier | TokenKind::Number)
}

fn wants_space(prev: &Token, next: &Token) -> bool {
    if TIGHT_AFTER.contains(&prev.text.as_str()) {
        return false;
    }
    if TIGHT_BEFORE.contains(&next.text.as_str()) {
        return false;
    }

    if next.text == "(" || next.text == "[" {
        // Call or index position binds tightly to its head; keywords keep
        // their separating space.
        return match prev.kind {
            TokenKind::Identifier => KEYWORDS.contains(&prev.text.as_str()),
            _ => !matches!(prev.text.as_str(), ")" | "]"),
        };
    }

    true
}

pub(super) fn write_canonical(
    tokens: &[Token],
    out: &mut dyn Write,
    style: &CanonicalStyle,
) -> Result<(), FrontendError> {
    let mut result = String::new();
    let mut line = String::new();
    let mut depth: usize = 0;
    let mut prev: Option<&Token> = None;

    let flush = |result: &mut String, line: &mut String, depth: usize, style: &CanonicalStyle| {
        if !line.is_empty() {
            for _ in 0..depth {
                result.push_str(&style.indent_unit);
            }
            result.push_str(line);
            result.push('\n');
            line.clear();
        }
    };

    let mut iter = tokens.iter().peekable();
    while let Some(token) = iter.next() {
        match (token.kind, token.text.as_str()) {
            (TokenKind::Punct, "{") => {
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push('{');
                flush(&mut result, &mut line, depth, style);
                depth += 1;
                prev = None;
            }
            (TokenKind::Punct, "}") => {
                if depth == 0 {
                    return Err(FrontendError::Emit(format!(
                        "unbalanced '}}' at line {}",
                        token.line
                    )));
                }
                flush(&mut result, &mut line, depth, style);
                depth -= 1;
                line.push('}');
                if iter.peek().is_some_and(|next| next.text == ";") {
                    iter.next();
                    line.push(';');
                }
                flush(&mut result, &mut line, depth, style);
                prev = None;
            }
            (TokenKind::Punct, ";") => {
                line.push(';');
                flush(&mut result, &mut line, depth, style);
                prev = None;
            }
            (TokenKind::LineComment, _) => {
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push_str(&token.text);
                flush(&mut result, &mut line, depth, style);
                prev = None;
            }
            _ => {
                if let Some(prev) = prev {
                    if wants_space(prev, token) {
                        line.push(' ');
                    }
                } // line start: no leading space
                line.push_str(&token.text);
                prev = Some(token);
            }
        }
    }

    flush(&mut result, &mut line, depth, style);

    if depth != 0 {
        return Err(FrontendError::Emit(format!(
            "missing {depth} closing brace(s) at end of stream"
        )));
    }

    out.write_all(result.as_bytes())?;
    Ok(())
}

pub(super) fn write_minified(tokens: &[Token], out: &mut dyn Write) -> Result<(), FrontendError> {
    let mut result = String::new();
    let mut prev: Option<&Token> = None;

    // Characters that can fuse with a neighbor into a longer operator.
    const FUSIBLE: &str = "=<>!&|+-*/%^.:";

    for token in tokens {
        // Comments do not survive minification.
        if matches!(token.kind, TokenKind::LineComment | TokenKind::BlockComment) {
            continue;
        }

        if let Some(prev) = prev {
            let fused_punct = prev.kind == TokenKind::Punct
                && token.kind == TokenKind::Punct
                && prev.text.chars().last().is_some_and(|a| FUSIBLE.contains(a))
                && token.text.chars().next().is_some_and(|b| FUSIBLE.contains(b));

            if (is_wordlike(prev.kind) && is_wordlike(token.kind)) || fused_punct {
                result.push(' ');
            }
        }

        result.push_str(&token.text);
        prev = Some(token);
    }

    out.write_all(result.as_bytes())?;
    Ok(())
}

pub(super) fn tree_to_json(tokens: &[Token], tracking: bool) -> serde_json::Value {
    let nodes: Vec<serde_json::Value> = tokens
        .iter()
        .map(|token| {
            if tracking {
                json!({
                    "kind": token.kind.as_str(),
                    "text": token.text,
                    "line": token.line,
                    "column": token.column,
                })
            } else {
                json!({ "kind": token.kind.as_str(), "text": token.text })
            }
        })
        .collect();

    json!({ "tokens": nodes })
}

#[derive(Clone, PartialEq, Message)]
struct TokenRecord {
    #[prost(uint32, tag = "1")]
    kind: u32,
    #[prost(string, tag = "2")]
    text: String,
    #[prost(uint32, tag = "3")]
    line: u32,
    #[prost(uint32, tag = "4")]
    column: u32,
}

#[derive(Clone, PartialEq, Message)]
struct TreeRecord {
    #[prost(message, repeated, tag = "1")]
    tokens: Vec<TokenRecord>,
}

pub(super) fn tree_to_protobuf(tokens: &[Token]) -> Vec<u8> {
    let record = TreeRecord {
        tokens: tokens
            .iter()
            .map(|token| TokenRecord {
                kind: token.kind as u32,
                text: token.text.clone(),
                line: token.line,
                column: token.column,
            })
            .collect(),
    };

    record.encode_to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{Frontend, ParseContext, TokenFrontend};

    fn tree(source: &str) -> crate::frontend::SyntaxTree {
        TokenFrontend.parse(source, &ParseContext::for_file("test.nit")).unwrap()
    }

    fn canonical(source: &str) -> String {
        let mut out = Vec::new();
        tree(source)
            .write_canonical(&mut out, &CanonicalStyle::default())
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    fn minified(source: &str) -> String {
        String::from_utf8(tree(source).minified_to_vec()).unwrap()
    }

    #[test]
    fn test_canonical_layout() {
        let out = canonical("scope demo{pub fn foo():i32{ret 20;}}");
        assert_eq!(
            out,
            "scope demo {\n  pub fn foo(): i32 {\n    ret 20;\n  }\n}\n"
        );
    }

    #[test]
    fn test_canonical_is_idempotent() {
        let once = canonical("@use \"v1.0\";\nimport std::io;\nfn main(){print(\"hi\");ret 0;}");
        assert_eq!(canonical(&once), once);
    }

    #[test]
    fn test_canonical_preserves_line_comments() {
        let out = canonical("fn f() { // note\nret 1; }");
        assert!(out.contains("// note\n"));
    }

    #[test]
    fn test_canonical_rejects_unbalanced_braces() {
        let result = tree("fn f() {").write_canonical(&mut Vec::new(), &CanonicalStyle::default());
        assert!(result.is_err());
        let result = tree("}").write_canonical(&mut Vec::new(), &CanonicalStyle::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_canonical_keyword_spacing() {
        let out = canonical("if(x){ret 1;}");
        assert!(out.starts_with("if (x)"));
        let out = canonical("foo (x);");
        assert!(out.starts_with("foo(x);"));
    }

    #[test]
    fn test_minify_drops_comments_and_whitespace() {
        let out = minified("fn main() { // say hi\n  print(\"hi\");\n  ret 0;\n}");
        assert_eq!(out, "fn main(){print(\"hi\");ret 0;}");
    }

    #[test]
    fn test_minify_keeps_operator_boundaries() {
        // `=` after `+` would fuse into `+=` without a separator.
        let out = minified("a = b + +c;");
        assert_eq!(out, "a=b+ +c;");

        let reparsed = tree(&out);
        let texts: Vec<&str> = reparsed.tokens().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["a", "=", "b", "+", "+", "c", ";"]);
    }

    #[test]
    fn test_minify_roundtrips_to_same_tokens() {
        let source = "@use \"v1.0\";\nscope ex {\n  pub fn pure bar(x: i32): i32 {\n    ret x + y.len();\n  }\n}\n";
        let original = tree(source);
        let reparsed = tree(&minified(source));

        let strip = |t: &crate::frontend::SyntaxTree| -> Vec<(TokenKind, String)> {
            t.tokens()
                .iter()
                .filter(|t| !matches!(t.kind, TokenKind::LineComment | TokenKind::BlockComment))
                .map(|t| (t.kind, t.text.clone()))
                .collect()
        };
        assert_eq!(strip(&original), strip(&reparsed));
    }

    #[test]
    fn test_json_dump_tracking() {
        let value = tree("ret 0;").to_json_value();
        assert_eq!(value["tokens"][0]["kind"], "identifier");
        assert!(value["tokens"][0].get("line").is_none());

        let tracked = TokenFrontend
            .parse("ret 0;", &ParseContext::for_file("t").with_tracking(true))
            .unwrap()
            .to_json_value();
        assert_eq!(tracked["tokens"][0]["line"], 1);
        assert_eq!(tracked["tokens"][0]["column"], 1);
    }

    #[test]
    fn test_protobuf_dump_is_nonempty_and_stable() {
        let a = tree("ret 0;").to_protobuf();
        let b = tree("ret 0;").to_protobuf();
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }
}
