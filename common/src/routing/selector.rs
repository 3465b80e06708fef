use serde::Serialize;
use std::collections::BTreeSet;

pub const CENSUS_CORE_TABLES: [&str; 5] = ["regions", "tru", "languages", "religions", "age_groups"];

/// tables an active intent contributes, optionally gated on other intents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSelectionRule {
    pub intent: String,
    pub adds: Vec<String>,
    pub requires: BTreeSet<String>,
}

impl TableSelectionRule {
    pub fn new(intent: &str, adds: &[&str]) -> Self {
        Self {
            intent: intent.to_string(),
            adds: adds.iter().map(|t| t.to_string()).collect(),
            requires: BTreeSet::new(),
        }
    }

    pub fn requires(mut self, intents: &[&str]) -> Self {
        self.requires.extend(intents.iter().map(|i| i.to_string()));
        self
    }

    fn matches(&self, active: &BTreeSet<String>) -> bool {
        active.contains(&self.intent) && self.requires.is_subset(active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSelection {
    /// everything handed to the schema renderer
    pub tables: BTreeSet<String>,
    /// intent-driven additions in the order they were kept
    pub optional: Vec<String>,
    /// additions cut by the cap
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<String>,
    /// intent that short-circuited selection to its own tables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isolated_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TableSelector {
    core: BTreeSet<String>,
    rules: Vec<TableSelectionRule>,
    isolating: Vec<(String, BTreeSet<String>)>,
    max_optional: usize,
}

impl TableSelector {
    pub fn new<'a>(
        core: impl IntoIterator<Item = &'a str>,
        rules: Vec<TableSelectionRule>,
        max_optional: usize,
    ) -> Self {
        Self {
            core: core.into_iter().map(str::to_string).collect(),
            rules,
            isolating: Vec::new(),
            max_optional,
        }
    }

    /// when `intent` is active the selection is exactly `tables`, checked in
    /// declaration order
    pub fn isolate(mut self, intent: &str, tables: &[&str]) -> Self {
        self.isolating.push((
            intent.to_string(),
            tables.iter().map(|t| t.to_string()).collect(),
        ));
        self
    }

    pub fn census(max_optional: usize) -> Self {
        let rules = vec![
            TableSelectionRule::new("religion", &["religion_stats"]),
            TableSelectionRule::new("language", &["language_stats"]),
            TableSelectionRule::new("population", &["population_stats"]),
            TableSelectionRule::new("health", &["healthcare_stats"]),
            TableSelectionRule::new("age", &["population_stats"]),
            TableSelectionRule::new("occupation", &["occupation_stats", "education_stats"]),
            TableSelectionRule::new("education", &["education_stats", "religion_stats"]),
            TableSelectionRule::new("agriculture", &["crop_stats"]),
        ];

        Self::new(CENSUS_CORE_TABLES, rules, max_optional).isolate("agriculture", &["crop_stats"])
    }

    pub fn core(&self) -> &BTreeSet<String> {
        &self.core
    }

    pub fn max_optional(&self) -> usize {
        self.max_optional
    }

    #[tracing::instrument(skip_all, fields(intents = ?intents))]
    pub fn select(&self, intents: &BTreeSet<String>) -> TableSelection {
        if let Some((intent, tables)) = self.isolating.iter().find(|(i, _)| intents.contains(i)) {
            tracing::info!(intent = %intent, "isolating intent detected");
            return TableSelection {
                tables: tables.clone(),
                optional: tables.iter().cloned().collect(),
                dropped: Vec::new(),
                isolated_by: Some(intent.clone()),
            };
        }

        let mut optional: Vec<String> = Vec::new();
        for rule in self.rules.iter().filter(|r| r.matches(intents)) {
            for table in &rule.adds {
                if !self.core.contains(table) && !optional.contains(table) {
                    optional.push(table.clone());
                }
            }
        }

        let dropped = if optional.len() > self.max_optional {
            optional.split_off(self.max_optional)
        } else {
            Vec::new()
        };
        if !dropped.is_empty() {
            tracing::warn!(dropped = ?dropped, cap = self.max_optional, "optional tables over cap");
        }

        let tables = self.core.iter().chain(optional.iter()).cloned().collect();
        TableSelection {
            tables,
            optional,
            dropped,
            isolated_by: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_select_no_intents_is_core() {
        let selector = TableSelector::census(6);
        let selection = selector.select(&BTreeSet::new());

        assert_eq!(&selection.tables, selector.core());
        assert!(selection.optional.is_empty());
    }

    #[test]
    fn test_select_population() {
        let selection = TableSelector::census(6).select(&set(&["population"]));

        let mut expected = set(&CENSUS_CORE_TABLES);
        expected.insert("population_stats".to_string());
        assert_eq!(selection.tables, expected);
    }

    #[test]
    fn test_select_isolating_intent() {
        let selection = TableSelector::census(6).select(&set(&["agriculture", "population"]));

        assert_eq!(selection.tables, set(&["crop_stats"]));
        assert_eq!(selection.isolated_by.as_deref(), Some("agriculture"));
    }

    #[test]
    fn test_select_deduplicates_in_rule_order() {
        let selection = TableSelector::census(6).select(&set(&["education", "occupation", "religion"]));

        assert_eq!(
            selection.optional,
            vec!["religion_stats", "occupation_stats", "education_stats"]
        );
    }

    #[test]
    fn test_select_caps_first_encountered() {
        let selection = TableSelector::census(2).select(&set(&[
            "religion",
            "language",
            "population",
            "health",
        ]));

        assert_eq!(selection.optional, vec!["religion_stats", "language_stats"]);
        assert_eq!(selection.dropped, vec!["population_stats", "healthcare_stats"]);
        assert_eq!(selection.tables.len(), CENSUS_CORE_TABLES.len() + 2);
    }

    #[test]
    fn test_rule_requires_other_intents() {
        let rules = vec![TableSelectionRule::new("health", &["nfhs_women"]).requires(&["population"])];
        let selector = TableSelector::new(["regions"], rules, 6);

        assert!(!selector.select(&set(&["health"])).tables.contains("nfhs_women"));
        assert!(selector
            .select(&set(&["health", "population"]))
            .tables
            .contains("nfhs_women"));
    }

    #[test]
    fn test_optional_never_exceeds_cap() {
        let all = set(&[
            "religion", "language", "population", "health", "age", "occupation", "education",
        ]);
        for cap in 0..8 {
            let selection = TableSelector::census(cap).select(&all);
            assert!(selection.optional.len() <= cap);
            assert!(selection.tables.is_superset(&set(&CENSUS_CORE_TABLES)));
        }
    }
}
