//! Keyword matching and scoring against the configured keyword set

use serde::{Deserialize, Serialize};

/// Keywords found in a document and the resulting 0-100 score.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchResult {
    /// In configured order and configured casing.
    pub matched_keywords: Vec<String>,
    pub score: u8,
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        !self.matched_keywords.is_empty()
    }

    pub fn keywords_joined(&self) -> String {
        self.matched_keywords.join(", ")
    }
}

/// Case-insensitive substring matcher. No tokenization or stemming.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
    lowered: Vec<String>,
}

impl KeywordMatcher {
    /// `keywords` is expected to be deduplicated already (see `config::normalize_keywords`).
    pub fn new(keywords: Vec<String>) -> Self {
        let lowered = keywords.iter().map(|k| k.to_lowercase()).collect();
        Self { keywords, lowered }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn match_text(&self, text: &str) -> MatchResult {
        if self.keywords.is_empty() {
            return MatchResult::default();
        }

        let haystack = text.to_lowercase();
        let matched_keywords: Vec<String> = self
            .keywords
            .iter()
            .zip(&self.lowered)
            .filter(|(_, lowered)| haystack.contains(lowered.as_str()))
            .map(|(original, _)| original.clone())
            .collect();

        let score = score(matched_keywords.len(), self.keywords.len());
        MatchResult { matched_keywords, score }
    }
}

/// `round(100 * matched / total)`, 0 for an empty keyword set.
pub fn score(matched: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (100.0 * matched as f64 / total as f64).round().min(100.0) as u8
}
