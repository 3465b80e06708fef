use crate::agent::SQL_HEADER;
use crate::sql::lexer::{splice, tokenize, Token, TokenKind};
use crate::sql::{NormalizedSql, Rewrite};

const FENCE: &str = "```";

const CHAT_MARKERS: [&str; 2] = ["<|start_header_id|>", "<|eot_id|>"];

/// turn raw backend output into a single statement.
///
/// steps, in order: drop an echoed prompt and chat-template chatter, strip
/// the markdown fence around the statement, keep only the first statement,
/// then quote dotted column references (`a.col.1` -> `a."col.1"`). every cut
/// ignores string literals, quoted identifiers and comments. idempotent.
#[tracing::instrument(skip_all, fields(raw_len = raw.len()))]
pub fn normalize(raw: &str) -> Rewrite {
    let text = strip_echoed_prompt(raw);
    let text = strip_fence(text.trim());
    let text = first_statement(text.trim());
    let text = quote_dotted_columns(text);

    let changed = text != raw;
    if changed {
        tracing::debug!(normalized = %text, "normalizer rewrote statement");
    }

    Rewrite {
        sql: NormalizedSql::new(text),
        changed,
    }
}

fn is_opaque(token: &Token<'_>) -> bool {
    matches!(
        token.kind,
        TokenKind::StringLit | TokenKind::QuotedIdent | TokenKind::Comment
    )
}

/// first offset where `needle` starts outside literals and comments
fn find_outside_literals(text: &str, needle: &str) -> Option<usize> {
    tokenize(text)
        .iter()
        .filter(|t| !is_opaque(t))
        .map(|t| t.start)
        .find(|&start| text[start..].starts_with(needle))
}

/// start of the closest line opening a `###` prompt section before `pos`
fn section_start_before(text: &str, pos: usize) -> usize {
    std::iter::once(0)
        .chain(text[..pos].match_indices('\n').map(|(i, _)| i + 1))
        .filter(|&line| line < pos && text[line..].starts_with("###"))
        .last()
        .unwrap_or(0)
}

fn strip_echoed_prompt(raw: &str) -> &str {
    // scanning restarts at each prompt section so stray quotes in the
    // echoed question cannot hide the header
    let header = raw
        .match_indices(SQL_HEADER)
        .map(|(pos, _)| pos)
        .filter(|&pos| {
            let from = section_start_before(raw, pos);
            tokenize(&raw[from..pos + SQL_HEADER.len()])
                .iter()
                .any(|t| from + t.start == pos && !is_opaque(t))
        })
        .last();

    let text = match header {
        Some(pos) => &raw[pos + SQL_HEADER.len()..],
        None => raw,
    };

    CHAT_MARKERS
        .iter()
        .filter_map(|marker| find_outside_literals(text, marker))
        .min()
        .map_or(text, |cut| &text[..cut])
}

/// drop an opening fence (with optional `sql` tag) and everything from the
/// closing fence on
fn strip_fence(text: &str) -> &str {
    let body = match text.strip_prefix(FENCE) {
        Some(rest) => strip_sql_tag(rest),
        None => text,
    };

    find_outside_literals(body, FENCE).map_or(body, |cut| &body[..cut])
}

fn strip_sql_tag(text: &str) -> &str {
    let tagged = text.get(..3).is_some_and(|tag| tag.eq_ignore_ascii_case("sql"))
        && !text[3..]
            .bytes()
            .next()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_');

    if tagged {
        &text[3..]
    } else {
        text
    }
}

/// text up to and including the first `;` outside literals and comments
fn first_statement(text: &str) -> &str {
    tokenize(text)
        .iter()
        .find(|t| t.is_symbol(';'))
        .map_or(text, |t| &text[..t.end()])
}

/// `alias.identifier.digits` -> `alias."identifier.digits"`
fn quote_dotted_columns(text: &str) -> String {
    let tokens = tokenize(text);
    let mut edits = Vec::new();
    let mut i = 0;

    while i + 4 < tokens.len() {
        if is_dotted_reference(&tokens[i..]) {
            let column = &tokens[i + 2];
            let digits = &tokens[i + 4];
            edits.push((
                column.start..digits.end(),
                format!("\"{}.{}\"", column.text, digits.text),
            ));
            i += 5;
        } else {
            i += 1;
        }
    }

    splice(text, edits)
}

fn is_dotted_reference(window: &[Token<'_>]) -> bool {
    let shape = window[0].kind == TokenKind::Word
        && window[1].is_symbol('.')
        && window[2].kind == TokenKind::Word
        && window[3].is_symbol('.')
        && window[4].kind == TokenKind::Number
        && window[4].text.bytes().all(|b| b.is_ascii_digit());

    // `a.col.1x` is not a dotted reference
    let bounded = window
        .get(5)
        .map_or(true, |next| !matches!(next.kind, TokenKind::Word | TokenKind::Number));

    shape && bounded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(raw: &str) -> String {
        normalize(raw).sql.into_string()
    }

    #[test]
    fn test_normalize_quotes_dotted_column() {
        assert_eq!(norm("SELECT a.col.1 FROM t a;"), "SELECT a.\"col.1\" FROM t a;");
    }

    #[test]
    fn test_normalize_strips_fences() {
        let raw = "```sql\nSELECT COUNT(*) FROM regions;\n```";
        assert_eq!(norm(raw), "SELECT COUNT(*) FROM regions;");
    }

    #[test]
    fn test_normalize_keeps_first_statement() {
        let raw = "SELECT 1; SELECT 2; this query returns one";
        assert_eq!(norm(raw), "SELECT 1;");
    }

    #[test]
    fn test_normalize_ignores_semicolon_in_literal() {
        let raw = "SELECT * FROM t WHERE name = 'a;b'; DROP TABLE t;";
        assert_eq!(norm(raw), "SELECT * FROM t WHERE name = 'a;b';");
    }

    #[test]
    fn test_normalize_without_terminator_keeps_text() {
        assert_eq!(norm("  SELECT 1  "), "SELECT 1");
    }

    #[test]
    fn test_normalize_drops_echoed_prompt_and_chatter() {
        let raw = "### Task\nquestion\n### SQL\nSELECT 1;<|eot_id|>assistant\nmore";
        assert_eq!(norm(raw), "SELECT 1;");
    }

    #[test]
    fn test_normalize_leaves_literals_alone() {
        let raw = "SELECT a.x FROM t a WHERE a.name = 'a.col.1';";
        assert_eq!(norm(raw), raw);
        assert!(!normalize(raw).changed);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "SELECT a.col.1 FROM t a;",
            "```sql\nSELECT p.age_group.2, p.x FROM population_stats p; extra\n```",
            "SELECT a.\"col.1\" FROM t a",
            "### SQL\n select 1 ; select 2",
            "",
        ];

        for raw in inputs {
            let once = norm(raw);
            let twice = norm(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", raw);
            assert!(!normalize(&once).changed);
        }
    }

    #[test]
    fn test_normalize_ignores_header_in_comment() {
        assert_eq!(norm("SELECT 1; -- ### SQL"), "SELECT 1;");
    }

    #[test]
    fn test_normalize_ignores_header_in_literal() {
        let raw = "SELECT '### SQL' AS h;";
        assert_eq!(norm(raw), raw);
    }

    #[test]
    fn test_normalize_keeps_fence_inside_literal() {
        let raw = "SELECT * FROM notes WHERE note = '```';";
        assert_eq!(norm(raw), raw);
        assert!(!normalize(raw).changed);
    }

    #[test]
    fn test_normalize_ignores_chat_marker_in_literal() {
        let raw = "SELECT * FROM t WHERE tag = '<|eot_id|>';";
        assert_eq!(norm(raw), raw);
    }

    #[test]
    fn test_normalize_finds_header_after_quoted_question() {
        let prompt = crate::agent::build_generation_prompt("what's the 'total population", "CREATE TABLE t (x INT);");
        let raw = format!("{}SELECT x FROM t;", prompt);
        assert_eq!(norm(&raw), "SELECT x FROM t;");
    }

    #[test]
    fn test_normalize_uses_last_header() {
        let raw = "### SQL\nSELECT 1;\n### SQL\nSELECT 2;";
        assert_eq!(norm(raw), "SELECT 2;");
    }

    #[test]
    fn test_normalize_drops_text_after_closing_fence() {
        let raw = "```SQL\nSELECT COUNT(*) FROM regions\n```\nThis counts the regions.";
        assert_eq!(norm(raw), "SELECT COUNT(*) FROM regions");
    }

    #[test]
    fn test_normalize_requires_word_boundary_after_digits() {
        let raw = "SELECT a.col.1x FROM t a;";
        assert_eq!(norm(raw), raw);
    }
}
