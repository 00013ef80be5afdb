//! Token definitions for KernelScript

use crate::utils::Location;
use serde::Serialize;
use std::fmt;

/// Reserved words, matched case-insensitively and stored lowercase
pub const KEYWORDS: &[&str] = &[
    "int", "float", "double", "char", "void", "bool",
    "struct", "union", "enum", "typedef",
    "if", "else", "while", "for", "do", "switch", "case", "default",
    "break", "continue", "return", "goto",
    "const", "static", "extern", "register", "volatile",
    "sizeof", "typeof", "alignof",
    "true", "false", "null",
    "signed", "unsigned", "short", "long",
];

/// Operators, longest first so that scanning is maximal munch
pub const OPERATORS: &[&str] = &[
    "<<=", ">>=",
    "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||",
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=",
    "-", "+", "*", "/", "%", "=", "&", "|", "^", "~", "!", "<", ">",
    "?", ":", ".", ",", ";", "(", ")", "[", "]", "{", "}",
];

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

impl Token {
    pub fn new(kind: TokenKind, location: Location) -> Self {
        Self { kind, location }
    }

    /// Sentinel returned by the parser when reading past the last token
    pub fn eof(location: Location) -> Self {
        Self { kind: TokenKind::Eof, location }
    }

    pub fn is_operator(&self, op: &str) -> bool {
        matches!(&self.kind, TokenKind::Operator(o) if o == op)
    }

    pub fn is_keyword(&self, kw: &str) -> bool {
        matches!(&self.kind, TokenKind::Keyword(k) if k == kw)
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// Reconstruct the source text of this token.
    ///
    /// String and character values are re-escaped, so lexing the result
    /// yields the same decoded value again.
    pub fn to_source(&self) -> String {
        match &self.kind {
            TokenKind::Str(s) => format!("\"{}\"", escape(s, '"')),
            TokenKind::Char(c) => format!("'{}'", escape(c, '\'')),
            _ => self.kind.to_string(),
        }
    }
}

fn escape(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '\0' if quote == '\'' => out.push_str("\\0"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// A numeric literal, converted at lex time
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum NumberValue {
    Int(i128),
    Float(f64),
}

impl NumberValue {
    pub fn is_zero(&self) -> bool {
        match self {
            NumberValue::Int(n) => *n == 0,
            NumberValue::Float(f) => *f == 0.0,
        }
    }
}

impl fmt::Display for NumberValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberValue::Int(n) => write!(f, "{}", n),
            NumberValue::Float(x) => write!(f, "{:?}", x),
        }
    }
}

/// Token kinds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TokenKind {
    /// Preprocessor directive word (`#include`)
    Preproc(String),
    Number(NumberValue),
    /// String literal, escapes decoded
    Str(String),
    /// Character literal, escapes decoded
    Char(String),
    /// Identifier, original casing
    Ident(String),
    /// Keyword, lowercase spelling
    Keyword(String),
    Operator(String),
    /// End of input
    Eof,
}

impl TokenKind {
    /// Upper-case category name, used in diagnostics
    pub fn category(&self) -> &'static str {
        match self {
            TokenKind::Preproc(_) => "PREPROC",
            TokenKind::Number(_) => "NUMBER",
            TokenKind::Str(_) => "STRING",
            TokenKind::Char(_) => "CHAR",
            TokenKind::Ident(_) => "ID",
            TokenKind::Keyword(_) => "KEYWORD",
            TokenKind::Operator(_) => "OPERATOR",
            TokenKind::Eof => "EOF",
        }
    }

    /// Try to convert an identifier to a keyword
    pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
        let lower = s.to_ascii_lowercase();
        KEYWORDS
            .contains(&lower.as_str())
            .then(|| TokenKind::Keyword(lower))
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Preproc(s)
            | TokenKind::Str(s)
            | TokenKind::Char(s)
            | TokenKind::Ident(s)
            | TokenKind::Keyword(s)
            | TokenKind::Operator(s) => write!(f, "{}", s),
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::Eof => Ok(()),
        }
    }
}
