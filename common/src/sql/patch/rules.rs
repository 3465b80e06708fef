use crate::sql::lexer::{mentions_word, significant, splice, tokenize, Token, TokenKind};
use crate::sql::patch::PatchRule;
use crate::sql::quote_literal;
use regex::Regex;
use std::collections::HashMap;
use std::ops::Range;

/// words that can follow a table name without being its alias
const NON_ALIAS_WORDS: [&str; 17] = [
    "on", "where", "join", "inner", "left", "right", "full", "cross", "outer", "natural",
    "group", "order", "limit", "using", "union", "having", "as",
];

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
}

fn is_alias_word(token: &Token<'_>) -> bool {
    token.kind == TokenKind::Word && !NON_ALIAS_WORDS.iter().any(|w| token.is_word(w))
}

/// replace every bare word equal to a key of `map`
fn replace_words(sql: &str, map: &[(String, String)]) -> Option<String> {
    let edits: Vec<(Range<usize>, String)> = tokenize(sql)
        .iter()
        .filter(|t| t.kind == TokenKind::Word)
        .filter_map(|t| {
            map.iter()
                .find(|(bad, _)| bad == t.text)
                .map(|(_, good)| (t.span(), good.clone()))
        })
        .collect();

    (!edits.is_empty()).then(|| splice(sql, edits))
}

/// alias (lower-cased) -> table (lower-cased) for `FROM t a` / `JOIN t AS a`
fn table_aliases(tokens: &[Token<'_>], sig: &[usize]) -> HashMap<String, String> {
    let mut aliases = HashMap::new();
    let tok = |k: usize| sig.get(k).map(|&i| &tokens[i]);

    for p in 0..sig.len() {
        let Some(keyword) = tok(p) else { break };
        if !(keyword.is_word("from") || keyword.is_word("join")) {
            continue;
        }
        let Some(table) = tok(p + 1).filter(|t| t.kind == TokenKind::Word) else {
            continue;
        };
        let table = table.text.to_ascii_lowercase();
        aliases.insert(table.clone(), table.clone());

        let mut q = p + 2;
        if tok(q).is_some_and(|t| t.is_word("as")) {
            q += 1;
        }
        if let Some(alias) = tok(q).filter(|t| is_alias_word(t)) {
            aliases.insert(alias.text.to_ascii_lowercase(), table);
        }
    }

    aliases
}

/// drops a type keyword injected mid-expression (`SELECT BIGINT SUM(x)`).
/// cast targets (`AS BIGINT`, `::BIGINT`) and DDL are left alone.
pub struct StripTypeKeyword {
    keyword: &'static str,
}

impl StripTypeKeyword {
    pub fn new(keyword: &'static str) -> Self {
        Self { keyword }
    }
}

impl PatchRule for StripTypeKeyword {
    fn name(&self) -> &'static str {
        "strip_type_keyword"
    }

    fn applies_to(&self, sql: &str) -> bool {
        contains_ignore_case(sql, self.keyword)
    }

    fn rewrite(&self, sql: &str) -> Option<String> {
        let tokens = tokenize(sql);
        if mentions_word(&tokens, "create") || mentions_word(&tokens, "alter") {
            return None;
        }

        let sig = significant(&tokens);
        let mut edits = Vec::new();

        for (pos, &ti) in sig.iter().enumerate() {
            let token = &tokens[ti];
            if !token.is_word(self.keyword) {
                continue;
            }

            let is_cast_target = pos
                .checked_sub(1)
                .map(|p| &tokens[sig[p]])
                .is_some_and(|prev| prev.is_word("as") || prev.is_symbol(':'));
            if is_cast_target {
                continue;
            }

            // only the `KEYWORD <space> expr` shape
            if let Some(space) = tokens.get(ti + 1).filter(|t| t.kind == TokenKind::Whitespace) {
                edits.push((token.start..space.end(), String::new()));
            }
        }

        (!edits.is_empty()).then(|| splice(sql, edits))
    }
}

/// exact identifier renames for invented column names
pub struct RenameColumns {
    map: Vec<(String, String)>,
}

impl RenameColumns {
    pub fn new<'a>(map: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            map: map
                .into_iter()
                .map(|(bad, good)| (bad.to_string(), good.to_string()))
                .collect(),
        }
    }
}

impl PatchRule for RenameColumns {
    fn name(&self) -> &'static str {
        "rename_columns"
    }

    fn applies_to(&self, sql: &str) -> bool {
        self.map.iter().any(|(bad, _)| sql.contains(bad.as_str()))
    }

    fn rewrite(&self, sql: &str) -> Option<String> {
        replace_words(sql, &self.map)
    }
}

/// column names of one fact table used against another.
/// fires when `target` is referenced and `source` is not.
pub struct RemapBleedColumns {
    target: String,
    source: String,
    map: Vec<(String, String)>,
}

impl RemapBleedColumns {
    pub fn new<'a>(
        target: &str,
        source: &str,
        map: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        Self {
            target: target.to_string(),
            source: source.to_string(),
            map: map
                .into_iter()
                .map(|(bad, good)| (bad.to_string(), good.to_string()))
                .collect(),
        }
    }
}

impl PatchRule for RemapBleedColumns {
    fn name(&self) -> &'static str {
        "remap_bleed_columns"
    }

    fn applies_to(&self, sql: &str) -> bool {
        sql.contains(self.target.as_str()) && !sql.contains(self.source.as_str())
    }

    fn rewrite(&self, sql: &str) -> Option<String> {
        let tokens = tokenize(sql);
        if !mentions_word(&tokens, &self.target) || mentions_word(&tokens, &self.source) {
            return None;
        }
        replace_words(sql, &self.map)
    }
}

/// filters on a column an isolated fact table does not have.
///
/// `AND col ...` is removed, `WHERE col ...` becomes `WHERE 1=1` so the
/// clause structure survives. a capitalised quoted identifier right after
/// `SELECT` is turned into a string literal.
pub struct NeutralizeIsolatedFilters {
    table: String,
    and_filter: Regex,
    where_filter: Regex,
}

impl NeutralizeIsolatedFilters {
    pub fn new(table: &str, column: &str) -> Self {
        let predicate = format!(
            r"(?:\w+\.)?{}\s*(?:ILIKE|LIKE|=)\s*'(?:[^']|'')*'",
            regex::escape(column)
        );

        Self {
            table: table.to_string(),
            and_filter: Regex::new(&format!(r"(?i)\s*\bAND\s+{}", predicate))
                .expect("escaped filter pattern"),
            where_filter: Regex::new(&format!(r"(?i)\bWHERE\s+{}", predicate))
                .expect("escaped filter pattern"),
        }
    }
}

fn literalize_selected_value(sql: &str) -> String {
    let tokens = tokenize(sql);
    let sig = significant(&tokens);

    let edits: Vec<(Range<usize>, String)> = sig
        .windows(2)
        .filter(|w| tokens[w[0]].is_word("select"))
        .map(|w| &tokens[w[1]])
        .filter(|t| t.kind == TokenKind::QuotedIdent)
        .filter_map(|t| {
            let name = t.ident_name()?;
            name.starts_with(|c: char| c.is_uppercase())
                .then(|| (t.span(), quote_literal(&name)))
        })
        .collect();

    splice(sql, edits)
}

impl PatchRule for NeutralizeIsolatedFilters {
    fn name(&self) -> &'static str {
        "neutralize_isolated_filters"
    }

    fn applies_to(&self, sql: &str) -> bool {
        sql.contains(self.table.as_str())
    }

    fn rewrite(&self, sql: &str) -> Option<String> {
        if !mentions_word(&tokenize(sql), &self.table) {
            return None;
        }

        let without_and = self.and_filter.replace_all(sql, "");
        let neutral = self.where_filter.replace_all(&without_and, "WHERE 1=1");
        let patched = literalize_selected_value(&neutral);

        (patched != sql).then_some(patched)
    }
}

/// a lookup table joined directly on a key it does not have.
///
/// `JOIN languages l ON s.tru_id = l.tru_id` (or `s.language_id = l.id`,
/// or `s.x = l.state`) becomes a join through the bridge fact table:
/// `JOIN language_stats ls_l ON s.state = ls_l.state AND s.tru_id = ls_l.tru_id
///  JOIN languages l ON ls_l.language_id = l.id`.
/// the area key is dropped when `s` is a state-level table.
pub struct BridgeLookupJoins {
    lookup: String,
    lookup_key: String,
    bridge: String,
    bridge_key: String,
    bridge_alias_prefix: String,
    region_key: String,
    area_key: String,
    state_level_tables: Vec<String>,
}

impl BridgeLookupJoins {
    pub fn census_languages() -> Self {
        Self {
            lookup: "languages".to_string(),
            lookup_key: "id".to_string(),
            bridge: "language_stats".to_string(),
            bridge_key: "language_id".to_string(),
            bridge_alias_prefix: "ls_".to_string(),
            region_key: "state".to_string(),
            area_key: "tru_id".to_string(),
            state_level_tables: vec!["regions".to_string()],
        }
    }

    fn is_broken_predicate(&self, left_col: &str, right_col: &str) -> bool {
        let eq = |a: &str, b: &str| a.eq_ignore_ascii_case(b);

        (eq(left_col, &self.area_key) && eq(right_col, &self.area_key))
            || (eq(left_col, &self.bridge_key) && eq(right_col, &self.lookup_key))
            || eq(right_col, &self.region_key)
    }

    fn bridged_join(&self, lookup_alias: &str, stats_alias: &str, state_level: bool) -> String {
        let bridge_alias = format!("{}{}", self.bridge_alias_prefix, lookup_alias);

        let mut condition = format!(
            "{s}.{k} = {b}.{k}",
            s = stats_alias,
            b = bridge_alias,
            k = self.region_key
        );
        if !state_level {
            condition.push_str(&format!(
                " AND {s}.{k} = {b}.{k}",
                s = stats_alias,
                b = bridge_alias,
                k = self.area_key
            ));
        }

        format!(
            "JOIN {bridge} {b} ON {condition} JOIN {lookup} {l} ON {b}.{bk} = {l}.{lk}",
            bridge = self.bridge,
            b = bridge_alias,
            lookup = self.lookup,
            l = lookup_alias,
            bk = self.bridge_key,
            lk = self.lookup_key,
        )
    }
}

impl PatchRule for BridgeLookupJoins {
    fn name(&self) -> &'static str {
        "bridge_lookup_joins"
    }

    fn applies_to(&self, sql: &str) -> bool {
        sql.contains(self.lookup.as_str()) && !sql.contains(self.bridge.as_str())
    }

    fn rewrite(&self, sql: &str) -> Option<String> {
        let tokens = tokenize(sql);
        if mentions_word(&tokens, &self.bridge) {
            return None;
        }

        let sig = significant(&tokens);
        let aliases = table_aliases(&tokens, &sig);
        let tok = |k: usize| sig.get(k).map(|&i| &tokens[i]);
        let word = |k: usize| tok(k).filter(|t| t.kind == TokenKind::Word);
        let symbol = |k: usize, c: char| tok(k).is_some_and(|t| t.is_symbol(c));

        let mut edits = Vec::new();

        for p in 0..sig.len() {
            let (Some(join), Some(table)) = (tok(p), tok(p + 1)) else {
                break;
            };
            if !join.is_word("join") || !table.is_word(&self.lookup) {
                continue;
            }

            let mut q = p + 2;
            if tok(q).is_some_and(|t| t.is_word("as")) {
                q += 1;
            }
            let Some(lookup_alias) = tok(q).filter(|t| is_alias_word(t)) else {
                continue;
            };
            if !tok(q + 1).is_some_and(|t| t.is_word("on")) {
                continue;
            }

            // <stats>.<col> = <lookup>.<col>
            let q = q + 2;
            let (Some(stats), Some(left_col), Some(rhs_alias), Some(right_col)) =
                (word(q), word(q + 2), word(q + 4), word(q + 6))
            else {
                continue;
            };
            if !symbol(q + 1, '.') || !symbol(q + 3, '=') || !symbol(q + 5, '.') {
                continue;
            }
            if !rhs_alias.text.eq_ignore_ascii_case(lookup_alias.text)
                || !self.is_broken_predicate(left_col.text, right_col.text)
            {
                continue;
            }

            let state_level = aliases
                .get(&stats.text.to_ascii_lowercase())
                .is_some_and(|t| self.state_level_tables.contains(t));

            edits.push((
                join.start..right_col.end(),
                self.bridged_join(lookup_alias.text, stats.text, state_level),
            ));
        }

        (!edits.is_empty()).then(|| splice(sql, edits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_type_keyword() {
        let rule = StripTypeKeyword::new("BIGINT");
        assert_eq!(
            rule.rewrite("SELECT BIGINT SUM(total_person) FROM population_stats;").unwrap(),
            "SELECT SUM(total_person) FROM population_stats;"
        );
    }

    #[test]
    fn test_strip_type_keyword_keeps_casts_and_ddl() {
        let rule = StripTypeKeyword::new("BIGINT");
        assert!(rule.rewrite("SELECT CAST(x AS BIGINT) FROM t;").is_none());
        assert!(rule.rewrite("SELECT x::BIGINT FROM t;").is_none());
        assert!(rule.rewrite("CREATE TABLE t (x BIGINT NOT NULL);").is_none());
    }

    #[test]
    fn test_rename_columns_is_token_exact() {
        let rule = RenameColumns::new([("illiterate_person", "illiterate_persons")]);

        assert_eq!(
            rule.rewrite("SELECT e.illiterate_person, illiterate_persons FROM education_stats e;")
                .unwrap(),
            "SELECT e.illiterate_persons, illiterate_persons FROM education_stats e;"
        );
        assert!(rule.rewrite("SELECT 'illiterate_person' FROM t;").is_none());
    }

    #[test]
    fn test_remap_bleed_columns_gated_on_absent_table() {
        let rule = RemapBleedColumns::new("education_stats", "religion_stats", [("tot_p", "total_person")]);

        let sql = "SELECT e.tot_p FROM education_stats e;";
        assert!(rule.applies_to(sql));
        assert_eq!(rule.rewrite(sql).unwrap(), "SELECT e.total_person FROM education_stats e;");

        let joined = "SELECT r.tot_p FROM education_stats e JOIN religion_stats r ON e.state = r.state;";
        assert!(!rule.applies_to(joined));
    }

    #[test]
    fn test_neutralize_and_filter() {
        let rule = NeutralizeIsolatedFilters::new("crop_stats", "state_name");
        let sql = "SELECT SUM(c.production) FROM crop_stats c WHERE c.crop ILIKE '%rice%' AND c.state_name ILIKE '%Punjab%';";

        assert_eq!(
            rule.rewrite(sql).unwrap(),
            "SELECT SUM(c.production) FROM crop_stats c WHERE c.crop ILIKE '%rice%';"
        );
    }

    #[test]
    fn test_neutralize_where_filter_keeps_structure() {
        let rule = NeutralizeIsolatedFilters::new("crop_stats", "state_name");
        let sql = "SELECT crop FROM crop_stats WHERE state_name = 'Bihar' AND season ILIKE '%rabi%';";

        assert_eq!(
            rule.rewrite(sql).unwrap(),
            "SELECT crop FROM crop_stats WHERE 1=1 AND season ILIKE '%rabi%';"
        );
    }

    #[test]
    fn test_neutralize_literalizes_selected_value() {
        let rule = NeutralizeIsolatedFilters::new("crop_stats", "state_name");
        let sql = "SELECT \"Rice\", production FROM crop_stats;";

        assert_eq!(rule.rewrite(sql).unwrap(), "SELECT 'Rice', production FROM crop_stats;");
    }

    #[test]
    fn test_bridge_join_with_area_key() {
        let rule = BridgeLookupJoins::census_languages();
        let sql = "SELECT l.name, SUM(p.total_person) FROM population_stats p JOIN languages l ON p.tru_id = l.tru_id GROUP BY l.name;";

        assert_eq!(
            rule.rewrite(sql).unwrap(),
            "SELECT l.name, SUM(p.total_person) FROM population_stats p \
             JOIN language_stats ls_l ON p.state = ls_l.state AND p.tru_id = ls_l.tru_id \
             JOIN languages l ON ls_l.language_id = l.id GROUP BY l.name;"
        );
    }

    #[test]
    fn test_bridge_join_state_level_table() {
        let rule = BridgeLookupJoins::census_languages();
        let sql = "SELECT l.name FROM regions AS r JOIN languages l ON r.state = l.state;";

        assert_eq!(
            rule.rewrite(sql).unwrap(),
            "SELECT l.name FROM regions AS r JOIN language_stats ls_l ON r.state = ls_l.state \
             JOIN languages l ON ls_l.language_id = l.id;"
        );
    }

    #[test]
    fn test_bridge_join_preserves_trailing_predicate() {
        let rule = BridgeLookupJoins::census_languages();
        let sql = "SELECT * FROM population_stats p JOIN languages l ON p.language_id = l.id AND l.name ILIKE '%tamil%';";

        let patched = rule.rewrite(sql).unwrap();
        assert!(patched.ends_with("ON ls_l.language_id = l.id AND l.name ILIKE '%tamil%';"));
    }

    #[test]
    fn test_bridge_join_ignores_valid_lookup_join() {
        let rule = BridgeLookupJoins::census_languages();
        let sql = "SELECT l.name FROM population_stats p JOIN languages l ON p.age = l.code;";
        assert!(rule.rewrite(sql).is_none());
    }

    #[test]
    fn test_table_aliases() {
        let sql = "SELECT * FROM regions r JOIN tru AS t ON r.state = t.state JOIN crop_stats WHERE 1=1";
        let tokens = tokenize(sql);
        let aliases = table_aliases(&tokens, &significant(&tokens));

        assert_eq!(aliases.get("r").map(String::as_str), Some("regions"));
        assert_eq!(aliases.get("t").map(String::as_str), Some("tru"));
        assert_eq!(aliases.get("crop_stats").map(String::as_str), Some("crop_stats"));
        assert!(!aliases.contains_key("where"));
    }
}
