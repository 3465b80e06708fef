use std::collections::BTreeSet;

/// how a term must appear in the lower-cased question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// plain substring containment
    #[default]
    Substring,
    /// bounded by non-alphanumeric characters or the text edges
    WholeWord,
}

/// a named topic with strong terms (activate alone) and weak terms
/// (activate only once something strong matched)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub name: String,
    pub strong: BTreeSet<String>,
    pub weak: BTreeSet<String>,
}

pub trait IntentClassifier: Send + Sync {
    fn classify(&self, question: &str) -> BTreeSet<String>;
}

#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    intents: Vec<Intent>,
    mode: MatchMode,
}

#[derive(Debug, Clone, Default)]
pub struct KeywordClassifierBuilder {
    intents: Vec<Intent>,
    mode: MatchMode,
}

fn normalize_terms<I, S>(terms: I) -> impl Iterator<Item = String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    terms
        .into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
}

impl KeywordClassifierBuilder {
    pub fn intent<S: AsRef<str>>(mut self, name: &str, strong: &[S], weak: &[S]) -> Self {
        self.intents.push(Intent {
            name: name.to_string(),
            strong: normalize_terms(strong).collect(),
            weak: normalize_terms(weak).collect(),
        });
        self
    }

    /// add strong terms to an already declared intent
    pub fn extend_strong<I, S>(mut self, name: &str, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self.intents.iter_mut().find(|i| i.name == name) {
            Some(intent) => intent.strong.extend(normalize_terms(terms)),
            None => tracing::warn!(intent = name, "cannot extend unknown intent"),
        }
        self
    }

    pub fn match_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn build(self) -> KeywordClassifier {
        KeywordClassifier {
            intents: self.intents,
            mode: self.mode,
        }
    }
}

impl KeywordClassifier {
    pub fn builder() -> KeywordClassifierBuilder {
        KeywordClassifierBuilder::default()
    }

    /// builder preloaded with the census intents
    pub fn census_builder() -> KeywordClassifierBuilder {
        let none: &[&str] = &[];
        Self::builder()
            .intent(
                "population",
                &[
                    "population", "people", "persons", "count", "total", "live", "living",
                    "men", "women", "male", "female", "boys", "girls", "sex ratio", "gender",
                    "households", "dwellers", "villagers", "citizens", "residents",
                ],
                &[
                    "most", "least", "largest", "smallest", "fewest", "more", "less",
                    "higher", "lower", "ratio", "gap", "difference", "percentage", "percent",
                ],
            )
            .intent(
                "religion",
                &[
                    "religion", "religious", "faith", "community", "parsi", "parsis",
                    "zoroastrian", "zoroastrians",
                ],
                none,
            )
            .intent(
                "language",
                &["language", "languages", "spoken", "speakers", "mother tongue"],
                none,
            )
            .intent(
                "education",
                &[
                    "literacy", "literate", "illiterate", "education", "educated", "schooling",
                    "school", "university", "college", "degree", "diploma", "pre-primary",
                ],
                &["rate"],
            )
            .intent(
                "occupation",
                &[
                    "work", "working", "worker", "employment", "non-worker", "workforce",
                    "participation", "job", "jobs", "employed", "unemployed", "cultivator",
                    "labourer", "agricultural", "paid", "cash", "marginal", "main", "industry",
                    "industries", "engaged",
                ],
                none,
            )
            .intent(
                "health",
                &[
                    "health", "mortality", "fertility", "disease", "anaemia", "diabetes",
                    "vaccinated", "vaccination", "vaccine", "vaccines", "stunting", "stunted",
                    "wasting", "wasted", "underweight", "overweight", "obese", "obesity", "bmi",
                    "birth", "births", "delivery", "deliveries", "antenatal", "postnatal",
                    "breastfed", "breastfeeding", "diet", "nutrition", "blood sugar",
                    "blood pressure", "hypertension", "hygienic", "menstruation", "sanitation",
                    "clean fuel", "cooking fuel", "electricity", "drinking water", "water",
                    "toilet", "internet", "bank account", "mobile phone", "insurance",
                    "violence", "crime", "tobacco", "alcohol", "smoking", "fever", "ari",
                    "diarrhoea", "treatment", "advice", "vitamin", "iodized", "salt", "cancer",
                    "screening", "c-section", "hiv", "aids", "condom", "knowledge", "anaemic",
                    "pregnant", "pregnancy", "married", "marriage", "waist", "hip", "folic",
                    "acid", "decision", "owning", "house", "land", "registered",
                    "registration", "authority",
                ],
                none,
            )
            .intent(
                "age",
                &[
                    "age", "children", "elderly", "youth", "adult", "adults", "working age",
                    "teenagers", "seniors", "0-6", "15-49", "60+",
                ],
                none,
            )
            .intent(
                "agriculture",
                &[
                    "agriculture", "agricultural", "crop", "crops", "farming", "sown", "sowing",
                    "harvest", "harvesting", "yield", "production", "area", "dafw", "hectare",
                    "hectares", "tonnes", "metric", "rice", "wheat", "maize", "jute",
                    "sugarcane", "cotton", "oilseeds", "pulses", "cereals", "millet", "millets",
                    "foodgrains", "nutri", "soybean", "barley", "groundnut", "ragi", "jowar",
                    "bajra", "tur", "gram", "lentil",
                ],
                &["normal", "season", "growth"],
            )
    }

    pub fn census() -> Self {
        Self::census_builder().build()
    }

    pub fn intents(&self) -> &[Intent] {
        &self.intents
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    fn any_present<'a>(&self, text: &str, mut terms: impl Iterator<Item = &'a String>) -> bool {
        terms.any(|term| contains_term(text, term, self.mode))
    }
}

fn contains_term(text: &str, term: &str, mode: MatchMode) -> bool {
    match mode {
        MatchMode::Substring => text.contains(term),
        MatchMode::WholeWord => text.match_indices(term).any(|(pos, _)| {
            let before = text[..pos].chars().next_back();
            let after = text[pos + term.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        }),
    }
}

impl IntentClassifier for KeywordClassifier {
    #[tracing::instrument(skip_all)]
    fn classify(&self, question: &str) -> BTreeSet<String> {
        let text = question.to_lowercase();

        let mut active: BTreeSet<String> = self
            .intents
            .iter()
            .filter(|i| self.any_present(&text, i.strong.iter()))
            .map(|i| i.name.clone())
            .collect();

        if !active.is_empty() {
            let corroborated: Vec<String> = self
                .intents
                .iter()
                .filter(|i| !active.contains(&i.name))
                .filter(|i| self.any_present(&text, i.weak.iter()))
                .map(|i| i.name.clone())
                .collect();
            active.extend(corroborated);
        }

        tracing::debug!(intents = ?active, "classified question");
        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_classify_population_question() {
        let intents = KeywordClassifier::census().classify("What is the total population in rural Kerala?");
        assert_eq!(intents, set(&["population"]));
    }

    #[test]
    fn test_classify_no_keywords() {
        let classifier = KeywordClassifier::census();
        assert!(classifier.classify("zzz").is_empty());
        assert!(classifier.classify("").is_empty());
    }

    #[test]
    fn test_weak_terms_never_activate_alone() {
        let intents = KeywordClassifier::census().classify("which is the most?");
        assert!(intents.is_empty());
    }

    #[test]
    fn test_weak_terms_corroborate() {
        let intents = KeywordClassifier::census().classify("How many people live in Goa and what is the growth?");
        assert_eq!(intents, set(&["agriculture", "population"]));
    }

    #[test]
    fn test_substring_mode_matches_inside_words() {
        let intents = KeywordClassifier::census().classify("Count of WOMEN");
        assert_eq!(intents, set(&["population"]));
    }

    #[test]
    fn test_whole_word_mode() {
        let classifier = KeywordClassifier::builder()
            .intent("agriculture", &["tur", "mother tongue"], &[])
            .match_mode(MatchMode::WholeWord)
            .build();

        assert!(classifier.classify("tur dal output").contains("agriculture"));
        assert!(classifier.classify("what is their mother tongue?").contains("agriculture"));
        assert!(classifier.classify("nature reserves").is_empty());
    }

    #[test]
    fn test_extend_strong() {
        let classifier = KeywordClassifier::census_builder()
            .extend_strong("language", ["Malayalam", " tamil "])
            .build();

        assert_eq!(classifier.classify("Malayalam"), set(&["language"]));
        assert_eq!(classifier.classify("tamil"), set(&["language"]));
    }

    #[test]
    fn test_extend_unknown_intent_is_ignored() {
        let classifier = KeywordClassifier::builder()
            .intent("age", &["age"], &[])
            .extend_strong("sports", ["cricket"])
            .build();

        assert_eq!(classifier.intents().len(), 1);
        assert!(classifier.classify("cricket").is_empty());
    }
}
