use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: String,
    pub short_summary: String,
    pub themes: Vec<String>,
    pub full_summary: String,
}

/// One `## Title:` block of the short-summary markdown file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookEntry {
    pub title: String,
    pub short_summary: String,
    pub themes: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScoreMetric {
    Similarity,
    Distance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexHit {
    pub title: String,
    pub raw_score: f64,
    pub metric: ScoreMetric,
    pub short_summary: String,
    pub themes: Vec<String>,
}

impl IndexHit {
    /// Relevance with higher meaning closer, whatever the backend reported.
    pub fn relevance(&self) -> f64 {
        match self.metric {
            ScoreMetric::Similarity => self.raw_score,
            ScoreMetric::Distance => 1.0 - self.raw_score,
        }
    }

    pub fn into_candidate(self) -> RetrievedCandidate {
        RetrievedCandidate {
            score: self.relevance(),
            title: self.title,
            short_summary: self.short_summary,
            themes: self.themes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedCandidate {
    pub title: String,
    pub score: f64,
    pub short_summary: String,
    pub themes: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MatchMethod {
    Exact,
    Containment,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleMatch {
    pub title: String,
    pub method: MatchMethod,
    pub score: f64,
}

/// Outcome of one pipeline pass. Built only by the orchestrator, so
/// `chosen_title` is always a catalog key.
#[derive(Debug, Clone, Serialize)]
pub struct ChainResult {
    chosen_title: String,
    rationale: String,
    full_summary: String,
    candidates: Vec<RetrievedCandidate>,
    match_score: f64,
    final_answer: Option<String>,
}

impl ChainResult {
    pub(crate) fn new(
        resolved: TitleMatch,
        rationale: String,
        full_summary: String,
        candidates: Vec<RetrievedCandidate>,
        final_answer: Option<String>,
    ) -> Self {
        Self {
            chosen_title: resolved.title,
            rationale,
            full_summary,
            candidates,
            match_score: resolved.score,
            final_answer,
        }
    }

    pub fn chosen_title(&self) -> &str {
        &self.chosen_title
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    pub fn full_summary(&self) -> &str {
        &self.full_summary
    }

    pub fn candidates(&self) -> &[RetrievedCandidate] {
        &self.candidates
    }

    pub fn match_score(&self) -> f64 {
        self.match_score
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub min_books: usize,
    pub title_header_regex: &'static str,
    pub themes_regex: &'static str,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            min_books: 10,
            title_header_regex: r"(?m)^##\s*Title:\s*",
            themes_regex: r"(?mi)^Themes:\s*(.+)$",
        }
    }
}
