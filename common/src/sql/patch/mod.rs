pub mod rules;

pub use rules::{
    BridgeLookupJoins, NeutralizeIsolatedFilters, RemapBleedColumns, RenameColumns,
    StripTypeKeyword,
};

use crate::sql::NormalizedSql;

/// one named rewrite for a known generator hallucination
pub trait PatchRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// cheap substring gate; `rewrite` is only called when this holds
    fn applies_to(&self, sql: &str) -> bool;

    /// rewritten statement, `None` when nothing matched
    fn rewrite(&self, sql: &str) -> Option<String>;
}

/// result of running the patcher over one statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patched {
    pub sql: NormalizedSql,
    pub applied: Vec<&'static str>,
}

impl Patched {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// ordered table of rewrite rules with a hard length guard
pub struct HeuristicPatcher {
    rules: Vec<Box<dyn PatchRule>>,
    length_limit: usize,
}

impl HeuristicPatcher {
    pub fn new(rules: Vec<Box<dyn PatchRule>>, length_limit: usize) -> Self {
        Self {
            rules,
            length_limit,
        }
    }

    /// rules for the hallucinations observed against the census schema
    pub fn census(length_limit: usize) -> Self {
        let rules: Vec<Box<dyn PatchRule>> = vec![
            Box::new(StripTypeKeyword::new("BIGINT")),
            Box::new(RenameColumns::new([
                ("illiterate_person", "illiterate_persons"),
                ("scheduled_castes_population_person", "scheduled_castes_person"),
                ("scheduled_tribes_population_person", "scheduled_tribes_person"),
                ("language_name", "name"),
            ])),
            Box::new(RemapBleedColumns::new(
                "education_stats",
                "religion_stats",
                [
                    ("tot_p", "total_person"),
                    ("p_lit", "literates_person"),
                    ("p_ill", "illiterate_persons"),
                    ("no_hh", "no_of_households"),
                    ("tot_m", "total_male"),
                    ("tot_f", "total_female"),
                    ("p_06", "population_in_the_age_group_06_person"),
                ],
            )),
            Box::new(NeutralizeIsolatedFilters::new("crop_stats", "state_name")),
            Box::new(BridgeLookupJoins::census_languages()),
        ];

        Self::new(rules, length_limit)
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|r| r.name())
    }

    #[tracing::instrument(skip_all, fields(sql_len = sql.as_str().len()))]
    pub fn apply(&self, sql: &NormalizedSql) -> Patched {
        if sql.as_str().len() > self.length_limit {
            tracing::debug!(limit = self.length_limit, "statement too long, patching skipped");
            return Patched {
                sql: sql.clone(),
                applied: Vec::new(),
            };
        }

        let mut current = sql.as_str().to_string();
        let mut applied = Vec::new();

        for rule in &self.rules {
            if !rule.applies_to(&current) {
                continue;
            }

            if let Some(next) = rule.rewrite(&current) {
                if next != current {
                    tracing::info!(rule = rule.name(), before = %current, after = %next, "applied sql patch");
                    applied.push(rule.name());
                    current = next;
                }
            }
        }

        Patched {
            sql: NormalizedSql::new(current),
            applied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::normalize;

    fn patch(sql: &str) -> Patched {
        HeuristicPatcher::census(2000).apply(&normalize(sql).sql)
    }

    #[test]
    fn test_patcher_identity_on_clean_statements() {
        let statements = [
            "SELECT SUM(p.total_person) FROM population_stats p JOIN regions r ON p.state = r.state;",
            "SELECT name FROM languages ORDER BY name;",
            "SELECT CAST(total_person AS BIGINT) FROM education_stats e JOIN religion_stats r ON e.state = r.state;",
            "INSERT INTO regions (state, area_name) VALUES (1, 'Kerala');",
            "SELECT crop, production FROM crop_stats WHERE season ILIKE '%kharif%';",
        ];

        for sql in statements {
            let patched = patch(sql);
            assert!(!patched.changed(), "unexpected patch for {}", sql);
            assert_eq!(patched.sql.as_str(), sql);
        }
    }

    #[test]
    fn test_patcher_neutralizes_isolated_filter() {
        let patched = patch(
            "SELECT SUM(production) FROM crop_stats WHERE state_name ILIKE '%Kerala%';",
        );

        assert_eq!(patched.sql.as_str(), "SELECT SUM(production) FROM crop_stats WHERE 1=1;");
        assert_eq!(patched.applied, vec!["neutralize_isolated_filters"]);
    }

    #[test]
    fn test_patcher_applies_rules_in_order() {
        let patched = patch(
            "SELECT BIGINT SUM(illiterate_person) FROM education_stats WHERE tot_p > 0;",
        );

        assert_eq!(
            patched.sql.as_str(),
            "SELECT SUM(illiterate_persons) FROM education_stats WHERE total_person > 0;"
        );
        assert_eq!(
            patched.applied,
            vec!["strip_type_keyword", "rename_columns", "remap_bleed_columns"]
        );
    }

    #[test]
    fn test_patcher_length_guard() {
        let long = format!(
            "SELECT illiterate_person FROM education_stats WHERE note = '{}';",
            "x".repeat(2100)
        );
        let patched = patch(&long);
        assert!(!patched.changed());
        assert_eq!(patched.sql.as_str(), long);
    }

    #[test]
    fn test_census_rule_order() {
        let names: Vec<_> = HeuristicPatcher::census(2000).rule_names().collect();
        assert_eq!(
            names,
            vec![
                "strip_type_keyword",
                "rename_columns",
                "remap_bleed_columns",
                "neutralize_isolated_filters",
                "bridge_lookup_joins",
            ]
        );
    }
}
