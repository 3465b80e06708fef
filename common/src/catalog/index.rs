use crate::heal::similarity::ratio;
use std::collections::BTreeSet;

/// de-duplicated, sorted set of every column name in a catalog snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnIndex {
    names: BTreeSet<String>,
}

/// a column name that cleared the similarity floor
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMatch<'a> {
    pub name: &'a str,
    pub score: f64,
}

impl ColumnIndex {
    pub(crate) fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            names: names.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// best other column by similarity ratio, `None` below `floor`.
    /// ties keep the lexicographically first name.
    pub fn closest(&self, name: &str, floor: f64) -> Option<ColumnMatch<'_>> {
        let mut best: Option<ColumnMatch<'_>> = None;

        for candidate in &self.names {
            if candidate == name {
                continue;
            }

            let score = ratio(name, candidate);
            if score < floor {
                continue;
            }

            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(ColumnMatch {
                    name: candidate,
                    score,
                });
            }
        }

        best
    }
}
