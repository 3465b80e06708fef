pub mod lexer;
pub mod normalize;
pub mod patch;

pub use normalize::normalize;
pub use patch::{HeuristicPatcher, PatchRule, Patched};

use lexer::{tokenize, TokenKind};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

/// keywords that mark a statement as data-modifying
const MUTATING_KEYWORDS: [&str; 6] = ["insert", "update", "delete", "create", "alter", "drop"];

/// a statement that has been through the normalizer.
///
/// only the normalizer, the patcher and the healer construct this, so the
/// executor can never run text that skipped normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NormalizedSql(String);

impl NormalizedSql {
    pub(crate) fn new(sql: String) -> Self {
        Self(sql)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for NormalizedSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedSql {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// output of one rewrite stage; the input is left untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub sql: NormalizedSql,
    pub changed: bool,
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_bare_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// double-quote a column name unless it is usable bare
pub fn quote_identifier(name: &str) -> Cow<'_, str> {
    if is_bare_identifier(name) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

/// render `value` as a single-quoted string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// insert/update/delete/create/alter/drop as a keyword outside literals
pub fn is_mutating(sql: &str) -> bool {
    tokenize(sql).iter().any(|t| {
        t.kind == TokenKind::Word && MUTATING_KEYWORDS.iter().any(|k| t.text.eq_ignore_ascii_case(k))
    })
}
