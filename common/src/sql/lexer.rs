//! Minimal lexical view of a SQL statement.
//!
//! Just enough structure for the rewrite rules: words, numbers, quoted
//! identifiers, string literals, comments, whitespace and single-character
//! symbols. Every byte of the input belongs to exactly one token, so
//! concatenating token texts reproduces the input.

use std::borrow::Cow;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Number,
    QuotedIdent,
    StringLit,
    Comment,
    Whitespace,
    Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
}

impl<'a> Token<'a> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn span(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// whitespace and comments
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }

    /// case-insensitive keyword / bare identifier comparison
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(word)
    }

    pub fn is_symbol(&self, symbol: char) -> bool {
        self.kind == TokenKind::Symbol && self.text.len() == 1 && self.text.starts_with(symbol)
    }

    /// identifier name for words and quoted identifiers (quotes removed)
    pub fn ident_name(&self) -> Option<Cow<'a, str>> {
        match self.kind {
            TokenKind::Word => Some(Cow::Borrowed(self.text)),
            TokenKind::QuotedIdent => Some(unquote(self.text, '"')),
            _ => None,
        }
    }
}

fn unquote(text: &str, quote: char) -> Cow<'_, str> {
    let inner = text.strip_prefix(quote).unwrap_or(text);
    let inner = inner.strip_suffix(quote).unwrap_or(inner);
    let doubled: String = [quote, quote].iter().collect();

    if inner.contains(&doubled) {
        Cow::Owned(inner.replace(&doubled, &quote.to_string()))
    } else {
        Cow::Borrowed(inner)
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_word_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

/// end offset of a quoted run starting at `start`, honoring doubled quotes
fn scan_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

pub fn tokenize(sql: &str) -> Vec<Token<'_>> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let b = bytes[i];

        let kind = if b.is_ascii_whitespace() {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            TokenKind::Whitespace
        } else if b == b'-' && bytes.get(i + 1) == Some(&b'-') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            TokenKind::Comment
        } else if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i = sql[i + 2..].find("*/").map_or(bytes.len(), |p| i + 2 + p + 2);
            TokenKind::Comment
        } else if b == b'\'' {
            i = scan_quoted(bytes, i, b'\'');
            TokenKind::StringLit
        } else if b == b'"' {
            i = scan_quoted(bytes, i, b'"');
            TokenKind::QuotedIdent
        } else if b.is_ascii_digit() {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
            TokenKind::Number
        } else if is_word_start(b) {
            while i < bytes.len() && is_word_byte(bytes[i]) {
                i += 1;
            }
            TokenKind::Word
        } else {
            i += 1;
            TokenKind::Symbol
        };

        tokens.push(Token {
            kind,
            text: &sql[start..i],
            start,
        });
    }

    tokens
}

/// indices of non-trivia tokens
pub fn significant(tokens: &[Token<'_>]) -> Vec<usize> {
    tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_trivia())
        .map(|(i, _)| i)
        .collect()
}

/// true when a bare word equal to `word` (case-insensitive) appears outside literals
pub fn mentions_word(tokens: &[Token<'_>], word: &str) -> bool {
    tokens.iter().any(|t| t.is_word(word))
}

/// apply non-overlapping byte-range replacements
pub fn splice(sql: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(range, _)| range.start);

    let mut out = String::with_capacity(sql.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        if range.start < cursor {
            continue;
        }
        out.push_str(&sql[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&sql[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<(TokenKind, &str)> {
        tokenize(sql)
            .into_iter()
            .filter(|t| t.kind != TokenKind::Whitespace)
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_tokenize_round_trips_input() {
        let sql = "SELECT a.\"col.1\", 'it''s' -- note\nFROM t /* c */ WHERE x >= 1.5;";
        let joined: String = tokenize(sql).iter().map(|t| t.text).collect();
        assert_eq!(joined, sql);
    }

    #[test]
    fn test_tokenize_dotted_column_reference() {
        assert_eq!(
            kinds("a.col.1"),
            vec![
                (TokenKind::Word, "a"),
                (TokenKind::Symbol, "."),
                (TokenKind::Word, "col"),
                (TokenKind::Symbol, "."),
                (TokenKind::Number, "1"),
            ]
        );
    }

    #[test]
    fn test_tokenize_literals_are_opaque() {
        assert_eq!(
            kinds("'a;b' \"x\"\"y\""),
            vec![(TokenKind::StringLit, "'a;b'"), (TokenKind::QuotedIdent, "\"x\"\"y\"")]
        );
    }

    #[test]
    fn test_ident_name_unescapes() {
        let tokens = tokenize("\"x\"\"y\"");
        assert_eq!(tokens[0].ident_name().unwrap(), "x\"y");
    }

    #[test]
    fn test_unterminated_literal_runs_to_end() {
        let tokens = tokenize("'open");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::StringLit);
    }

    #[test]
    fn test_splice_replaces_ranges() {
        let out = splice("abc def", vec![(4..7, "xyz".to_string()), (0..1, "A".to_string())]);
        assert_eq!(out, "Abc xyz");
    }
}
