//! Lexer for KernelScript
//!
//! Converts source code into a lazy stream of tokens. Whitespace and
//! comments are skipped first; then the first matching alternative wins, in
//! this order: preprocessor word, hex, octal, float, decimal, string, char,
//! identifier/keyword, operator. Anything else is a lex error.

use log::trace;

use crate::frontend::token::{NumberValue, Token, TokenKind, OPERATORS};
use crate::utils::{Error, Location, Result};

/// Start lexing `source`. `filename` is only used in diagnostics.
pub fn lex(source: &str, filename: Option<&str>) -> Lexer {
    Lexer::new(source, filename)
}

/// Lex the whole input into an indexable token vector
pub fn tokenize(source: &str, filename: Option<&str>) -> Result<Vec<Token>> {
    lex(source, filename).collect()
}

/// The lexer state
pub struct Lexer {
    source: Vec<char>,
    /// Current position in source
    pos: usize,
    line: usize,
    /// Position of the first character of the current line
    line_start: usize,
    filename: Option<String>,
    /// Set after an error; the stream ends there
    failed: bool,
}

impl Lexer {
    pub fn new(source: &str, filename: Option<&str>) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            line_start: 0,
            filename: filename.map(str::to_string),
            failed: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.source.get(self.pos + offset).copied()
    }

    fn location_of(&self, pos: usize) -> Location {
        Location::new(self.line, pos - self.line_start + 1)
    }

    fn error(&self, message: String, pos: usize) -> Error {
        let err = Error::lex(message, self.location_of(pos));
        match &self.filename {
            Some(name) => err.with_filename(name.clone()),
            None => err,
        }
    }

    /// Advance over `n` characters, keeping the line counter in sync
    fn bump(&mut self, n: usize) {
        for _ in 0..n {
            if self.peek() == Some('\n') {
                self.line += 1;
                self.line_start = self.pos + 1;
            }
            self.pos += 1;
        }
    }

    /// Length of the run of characters satisfying `pred`, starting at `from`
    fn run_len(&self, from: usize, pred: impl Fn(char) -> bool) -> usize {
        self.source[from.min(self.source.len())..]
            .iter()
            .take_while(|&&c| pred(c))
            .count()
    }

    fn text(&self, from: usize, len: usize) -> String {
        self.source[from..from + len].iter().collect()
    }

    /// Skip whitespace, newlines and comments
    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' => self.bump(1),
                '/' if self.peek_at(1) == Some('/') => {
                    let len = self.run_len(self.pos, |c| c != '\n');
                    self.bump(len);
                }
                '/' if self.peek_at(1) == Some('*') => {
                    self.bump(2);
                    // An unterminated block comment runs to end of input
                    while self.pos < self.source.len() {
                        if self.peek() == Some('*') && self.peek_at(1) == Some('/') {
                            self.bump(2);
                            break;
                        }
                        self.bump(1);
                    }
                }
                _ => break,
            }
        }
    }

    fn match_preproc(&self) -> usize {
        if self.peek() != Some('#') {
            return 0;
        }
        match self.peek_at(1) {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                2 + self.run_len(self.pos + 2, |c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => 0,
        }
    }

    fn match_hex(&self) -> usize {
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            let digits = self.run_len(self.pos + 2, |c| c.is_ascii_hexdigit());
            if digits > 0 {
                return 2 + digits;
            }
        }
        0
    }

    fn match_octal(&self) -> usize {
        if self.peek() == Some('0') {
            let digits = self.run_len(self.pos + 1, |c| ('0'..='7').contains(&c));
            if digits > 0 {
                return 1 + digits;
            }
        }
        0
    }

    fn match_exponent(&self, from: usize) -> usize {
        if !matches!(self.source.get(from), Some('e') | Some('E')) {
            return 0;
        }
        let sign = usize::from(matches!(self.source.get(from + 1), Some('+') | Some('-')));
        let digits = self.run_len(from + 1 + sign, |c| c.is_ascii_digit());
        if digits > 0 {
            1 + sign + digits
        } else {
            0
        }
    }

    fn match_float(&self) -> usize {
        let int_digits = self.run_len(self.pos, |c| c.is_ascii_digit());
        if int_digits > 0 {
            if self.source.get(self.pos + int_digits) != Some(&'.') {
                return 0;
            }
            let frac = self.run_len(self.pos + int_digits + 1, |c| c.is_ascii_digit());
            let len = int_digits + 1 + frac;
            return len + self.match_exponent(self.pos + len);
        }
        if self.peek() == Some('.') {
            let frac = self.run_len(self.pos + 1, |c| c.is_ascii_digit());
            if frac > 0 {
                let len = 1 + frac;
                return len + self.match_exponent(self.pos + len);
            }
        }
        0
    }

    /// Length of a quoted literal including both quotes, or `None` when it
    /// is not terminated
    fn match_quoted(&self, quote: char) -> Option<usize> {
        let mut i = self.pos + 1;
        loop {
            match self.source.get(i) {
                None => return None,
                Some('\\') => {
                    if i + 1 >= self.source.len() {
                        return None;
                    }
                    i += 2;
                }
                Some(&c) if c == quote => return Some(i + 1 - self.pos),
                Some(_) => i += 1,
            }
        }
    }

    fn match_operator(&self) -> Option<&'static str> {
        OPERATORS.iter().copied().find(|op| {
            op.chars()
                .enumerate()
                .all(|(i, c)| self.peek_at(i) == Some(c))
        })
    }

    /// Integer literal digits in `radix`. Literals too wide for `i128`
    /// keep their magnitude as a float.
    fn number(text: &str, radix: u32) -> NumberValue {
        i128::from_str_radix(text, radix)
            .map(NumberValue::Int)
            .unwrap_or_else(|_| {
                let value = text
                    .chars()
                    .filter_map(|c| c.to_digit(radix))
                    .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
                NumberValue::Float(value)
            })
    }

    fn scan(&mut self) -> Result<Option<Token>> {
        self.skip_trivia();
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        let location = self.location_of(start);

        let (kind, len) = if let len @ 1.. = self.match_preproc() {
            (TokenKind::Preproc(self.text(start, len)), len)
        } else if let len @ 1.. = self.match_hex() {
            let digits = self.text(start + 2, len - 2);
            (TokenKind::Number(Self::number(&digits, 16)), len)
        } else if let len @ 1.. = self.match_octal() {
            let digits = self.text(start + 1, len - 1);
            (TokenKind::Number(Self::number(&digits, 8)), len)
        } else if let len @ 1.. = self.match_float() {
            let text = self.text(start, len);
            let value = text
                .parse::<f64>()
                .map_err(|_| self.error(format!("malformed float literal: {}", text), start))?;
            (TokenKind::Number(NumberValue::Float(value)), len)
        } else if c.is_ascii_digit() {
            let len = self.run_len(start, |c| c.is_ascii_digit());
            let digits = self.text(start, len);
            (TokenKind::Number(Self::number(&digits, 10)), len)
        } else if c == '"' || c == '\'' {
            let len = self.match_quoted(c).ok_or_else(|| {
                let what = if c == '"' { "string" } else { "character" };
                self.error(format!("unterminated {} literal", what), start)
            })?;
            let body = self.text(start + 1, len - 2);
            if c == '"' {
                (TokenKind::Str(unescape(&body, false)), len)
            } else {
                (TokenKind::Char(unescape(&body, true)), len)
            }
        } else if c.is_ascii_alphabetic() || c == '_' {
            let len = self.run_len(start, |c| c.is_ascii_alphanumeric() || c == '_');
            let text = self.text(start, len);
            let kind = TokenKind::keyword_from_str(&text).unwrap_or(TokenKind::Ident(text));
            (kind, len)
        } else if let Some(op) = self.match_operator() {
            (TokenKind::Operator(op.to_string()), op.chars().count())
        } else {
            return Err(self.error(format!("unrecognized character {:?}", c), start));
        };

        self.bump(len);
        trace!("lexed {} {:?} at {}", kind.category(), kind.to_string(), location);
        Ok(Some(Token::new(kind, location)))
    }
}

impl Iterator for Lexer {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.scan() {
            Ok(token) => token.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Decode escape sequences in a string or character literal body.
///
/// Recognized: `\n \t \" \' \\`, plus `\0` in character literals. Anything
/// else after a backslash is kept as the two source characters.
fn unescape(body: &str, char_literal: bool) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            Some('0') if char_literal => out.push('\0'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, None)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn op(s: &str) -> TokenKind {
        TokenKind::Operator(s.to_string())
    }

    fn ident(s: &str) -> TokenKind {
        TokenKind::Ident(s.to_string())
    }

    fn kw(s: &str) -> TokenKind {
        TokenKind::Keyword(s.to_string())
    }

    #[test]
    fn test_simple_tokens() {
        assert_eq!(
            kinds("int main() { }"),
            vec![kw("int"), ident("main"), op("("), op(")"), op("{"), op("}")]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 0x1F 017 3.5 .25 1.5e3 08"),
            vec![
                TokenKind::Number(NumberValue::Int(42)),
                TokenKind::Number(NumberValue::Int(31)),
                TokenKind::Number(NumberValue::Int(15)),
                TokenKind::Number(NumberValue::Float(3.5)),
                TokenKind::Number(NumberValue::Float(0.25)),
                TokenKind::Number(NumberValue::Float(1500.0)),
                TokenKind::Number(NumberValue::Int(8)),
            ]
        );
    }

    #[test]
    fn test_integer_literals_wider_than_i64() {
        let tokens = tokenize("unsigned long m = 0xFFFFFFFFFFFFFFFF;", None).unwrap();
        assert_eq!(
            tokens[4].kind,
            TokenKind::Number(NumberValue::Int(i128::from(u64::MAX)))
        );

        let huge = format!("1{}", "0".repeat(40));
        match kinds(&huge).as_slice() {
            [TokenKind::Number(NumberValue::Float(f))] => assert!((f / 1e40 - 1.0).abs() < 1e-9),
            other => panic!("expected one float, got {:?}", other),
        }
    }

    #[test]
    fn test_strings_and_chars() {
        assert_eq!(
            kinds(r#""a\tb\"c" "x\qy" '\n' '\0' 'z'"#),
            vec![
                TokenKind::Str("a\tb\"c".to_string()),
                TokenKind::Str("x\\qy".to_string()),
                TokenKind::Char("\n".to_string()),
                TokenKind::Char("\0".to_string()),
                TokenKind::Char("z".to_string()),
            ]
        );
    }

    #[test]
    fn test_keywords_fold_case_but_identifiers_keep_it() {
        assert_eq!(
            kinds("WHILE Counter NULL"),
            vec![kw("while"), ident("Counter"), kw("null")]
        );
    }

    #[test]
    fn test_maximal_munch_operators() {
        assert_eq!(
            kinds("a <<= b->c++ && d"),
            vec![
                ident("a"),
                op("<<="),
                ident("b"),
                op("->"),
                ident("c"),
                op("++"),
                op("&&"),
                ident("d"),
            ]
        );
    }

    #[test]
    fn test_preprocessor_word() {
        assert_eq!(
            kinds("#include <stdio.h>"),
            vec![
                TokenKind::Preproc("#include".to_string()),
                op("<"),
                ident("stdio"),
                op("."),
                ident("h"),
                op(">"),
            ]
        );
    }

    #[test]
    fn test_comments_and_line_tracking() {
        let tokens = tokenize("a // one\n/* two\nthree */ b\n  c", None).unwrap();
        let positions: Vec<_> = tokens.iter().map(|t| (t.location.line, t.location.column)).collect();
        assert_eq!(positions, vec![(1, 1), (3, 10), (4, 3)]);
    }

    #[test]
    fn test_unterminated_block_comment_consumes_rest() {
        assert_eq!(kinds("x /* never closed\n y z"), vec![ident("x")]);
    }

    #[test]
    fn test_mismatch_is_lex_error() {
        let err = tokenize("int x = 1;\nx = $;", Some("demo.ks")).unwrap_err();
        assert!(matches!(err, Error::Lex { .. }));
        assert_eq!(err.location(), Some(Location::new(2, 5)));
        assert_eq!(err.filename(), Some("demo.ks"));
    }

    #[test]
    fn test_lexing_is_lazy() {
        let mut lexer = lex("a b $", None);
        assert!(matches!(lexer.next(), Some(Ok(_))));
        assert!(matches!(lexer.next(), Some(Ok(_))));
        assert!(matches!(lexer.next(), Some(Err(_))));
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_decoded_literals_survive_relexing() {
        let source = r#""tab\there \"q\" back\\slash odd\z" 'it\'s' '\0'"#;
        for token in tokenize(source, None).unwrap() {
            let relexed = tokenize(&token.to_source(), None).unwrap();
            assert_eq!(relexed.len(), 1);
            assert_eq!(relexed[0].kind, token.kind);
        }
    }
}
