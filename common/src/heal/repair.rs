use crate::catalog::ColumnIndex;
use crate::sql::lexer::{significant, splice, tokenize, TokenKind};
use crate::sql::{quote_identifier, quote_literal, NormalizedSql};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

// postgres, unqualified: column "x" does not exist
static QUOTED_MISSING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)column "((?:[^"]|"")+)" does not exist"#).unwrap());

// postgres, qualified: column t.x does not exist
static BARE_MISSING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)column ([^\s\x22]+) does not exist").unwrap());

// sqlite: no such column: t.x
static SQLITE_MISSING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)no such column: ([^\s\x22]+)").unwrap());

/// the single repair applied before a retry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Repair {
    /// a double-quoted value the engine read as a column became a string literal
    Literal { value: String },
    /// a hallucinated column was replaced by its closest catalog column
    Column { from: String, to: String, score: f64 },
}

impl fmt::Display for Repair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repair::Literal { value } => write!(f, "literal:{}", value),
            Repair::Column { from, to, .. } => write!(f, "column:{}->{}", from, to),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Healed {
    pub sql: NormalizedSql,
    pub repair: Repair,
}

/// the missing column named by an engine error, with any table alias removed
pub fn missing_column(error: &str) -> Option<String> {
    if let Some(caps) = QUOTED_MISSING.captures(error) {
        return Some(caps[1].replace("\"\"", "\""));
    }

    let caps = BARE_MISSING
        .captures(error)
        .or_else(|| SQLITE_MISSING.captures(error))?;
    let name = &caps[1];
    let name = name.split_once('.').map_or(name, |(_, column)| column);

    (!name.is_empty()).then(|| name.to_string())
}

pub fn is_missing_column_error(error: &str) -> bool {
    missing_column(error).is_some()
}

/// values the generator double-quoted by mistake: capitalised or spaced names
/// never occur among the lower-case catalog columns
fn looks_like_value(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase) || name.contains(' ')
}

/// double-quoted occurrences of `value` become string literals. qualified
/// references (`p."Rice"`) are column references and stay untouched.
fn literalize(sql: &str, value: &str) -> Option<String> {
    let tokens = tokenize(sql);
    let order = significant(&tokens);

    let edits: Vec<_> = order
        .iter()
        .enumerate()
        .filter(|&(pos, &i)| {
            let qualified = pos > 0 && tokens[order[pos - 1]].is_symbol('.');
            let token = &tokens[i];
            token.kind == TokenKind::QuotedIdent
                && !qualified
                && token.ident_name().is_some_and(|n| n == value)
        })
        .map(|(_, &i)| (tokens[i].span(), quote_literal(value)))
        .collect();

    (!edits.is_empty()).then(|| splice(sql, edits))
}

/// replace whole identifier tokens naming `bad`; words compare case-insensitively
/// since the engine folds unquoted names
fn substitute(sql: &str, bad: &str, good: &str) -> Option<String> {
    let replacement = quote_identifier(good).into_owned();
    let edits: Vec<_> = tokenize(sql)
        .into_iter()
        .filter(|t| match t.kind {
            TokenKind::Word => t.text.eq_ignore_ascii_case(bad),
            TokenKind::QuotedIdent => t.ident_name().is_some_and(|n| n == bad),
            _ => false,
        })
        .map(|t| (t.span(), replacement.clone()))
        .collect();

    (!edits.is_empty()).then(|| splice(sql, edits))
}

/// derive a repaired statement from a missing-column failure.
///
/// literal repair is tried first; otherwise the closest catalog column at or
/// above `floor` replaces every occurrence of the missing one. `None` when the
/// error is of another kind or no repair changes the statement.
pub fn heal(sql: &NormalizedSql, error: &str, index: &ColumnIndex, floor: f64) -> Option<Healed> {
    let missing = missing_column(error)?;

    if looks_like_value(&missing) {
        if let Some(rewritten) = literalize(sql.as_str(), &missing) {
            return Some(Healed {
                sql: NormalizedSql::new(rewritten),
                repair: Repair::Literal { value: missing },
            });
        }
    }

    let Some(found) = index.closest(&missing, floor) else {
        tracing::debug!(column = %missing, floor, "no catalog column close enough");
        return None;
    };

    let rewritten = substitute(sql.as_str(), &missing, found.name)?;
    if rewritten == sql.as_str() {
        return None;
    }

    Some(Healed {
        sql: NormalizedSql::new(rewritten),
        repair: Repair::Column {
            from: missing,
            to: found.name.to_string(),
            score: found.score,
        },
    })
}
