//! Category matching: deciding which discovered category links belong to the
//! requested part query.

use std::collections::BTreeMap;

/// Strategy for matching category links against a part query.
///
/// The matching policy is a seam: the default [`SynonymMatcher`] works from a
/// fixed Dutch synonym table, but callers can plug in their own (a stemmer, a
/// learned model) without touching the navigation code.
pub trait CategoryMatcher: Send + Sync {
    /// Expand a query into the set of terms to match against, the query
    /// itself included.
    fn expand(&self, query: &str) -> Vec<String>;

    /// Return the term that matches the candidate text, if any.
    ///
    /// Matching is case-insensitive and substring-based in both directions:
    /// a term contained in the candidate or a candidate contained in the
    /// term both count.
    fn match_term(&self, query: &str, candidate: &str) -> Option<String> {
        let candidate = candidate.trim().to_lowercase();
        if candidate.is_empty() {
            return None;
        }
        self.expand(query).into_iter().find(|term| {
            let term_lower = term.to_lowercase();
            candidate.contains(&term_lower) || term_lower.contains(&candidate)
        })
    }
}

/// Default matcher backed by a fixed Dutch auto-part synonym table.
#[derive(Debug, Clone, Default)]
pub struct SynonymMatcher {
    extra: BTreeMap<String, Vec<String>>,
}

/// Built-in synonym groups, keyed by the stem a user is likely to type.
const SYNONYM_TABLE: &[(&str, &[&str])] = &[
    ("rem", &["remschijf", "remblok", "remklauw", "handrem"]),
    ("accu", &["accubak", "batterij"]),
    ("motor", &["motorblok", "motor", "aandrijving"]),
    ("uitlaat", &["uitlaatsysteem", "demper", "katalysator"]),
    ("bumper", &["voorbumper", "achterbumper"]),
    ("koplamp", &["koplamp", "achterlicht", "verlichting"]),
];

impl SynonymMatcher {
    /// Matcher with the built-in table only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a custom synonym group on top of the built-in table.
    pub fn with_synonyms(mut self, stem: &str, synonyms: &[&str]) -> Self {
        self.extra.insert(
            stem.to_lowercase(),
            synonyms.iter().map(|s| s.to_lowercase()).collect(),
        );
        self
    }
}

impl CategoryMatcher for SynonymMatcher {
    fn expand(&self, query: &str) -> Vec<String> {
        let query = query.trim().to_lowercase();
        let mut terms = vec![query.clone()];

        for (stem, synonyms) in SYNONYM_TABLE {
            if query.contains(stem) {
                for synonym in *synonyms {
                    if !terms.iter().any(|t| t == synonym) {
                        terms.push((*synonym).to_string());
                    }
                }
            }
        }
        for (stem, synonyms) in &self.extra {
            if query.contains(stem.as_str()) {
                for synonym in synonyms {
                    if !terms.contains(synonym) {
                        terms.push(synonym.clone());
                    }
                }
            }
        }

        terms
    }
}
