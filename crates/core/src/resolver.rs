use crate::catalog::CatalogStore;
use crate::config::ResolverConfig;
use crate::models::{MatchMethod, TitleMatch};
use crate::text::{normalize_title, normalize_whitespace};

/// Float slack for the margin comparison, so a lead equal to the margin is
/// not flipped either way by rounding.
const MARGIN_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
struct IndexedTitle {
    canonical: String,
    /// Lowercased with whitespace collapsed; punctuation and accents kept.
    loose: String,
    normalized: String,
    chars: Vec<char>,
}

/// Maps noisy title strings onto canonical catalog titles.
///
/// Matching runs in three layers and the first unambiguous hit wins:
/// equality (first on the case-folded title, then on the fully folded form),
/// containment in either direction, then a Levenshtein
/// ratio above the acceptance threshold with a clear lead over the runner-up.
/// Titles are held in sorted canonical order so results never depend on how
/// the catalog was enumerated.
#[derive(Debug, Clone)]
pub struct TitleResolver {
    titles: Vec<IndexedTitle>,
    config: ResolverConfig,
}

impl TitleResolver {
    pub fn new<'a>(titles: impl IntoIterator<Item = &'a str>, config: ResolverConfig) -> Self {
        let mut canonical: Vec<&str> = titles.into_iter().collect();
        canonical.sort_unstable();
        canonical.dedup();

        let titles = canonical
            .into_iter()
            .map(|title| {
                let normalized = normalize_title(title);
                IndexedTitle {
                    canonical: title.to_string(),
                    loose: loose_title(title),
                    chars: normalized.chars().collect(),
                    normalized,
                }
            })
            .collect();

        Self { titles, config }
    }

    pub fn from_catalog(catalog: &CatalogStore, config: ResolverConfig) -> Self {
        Self::new(catalog.all_titles(), config)
    }

    pub fn config(&self) -> ResolverConfig {
        self.config
    }

    pub fn resolve(&self, requested_title: &str) -> Option<TitleMatch> {
        let loose = loose_title(requested_title);
        if loose.is_empty() {
            return None;
        }
        let query = normalize_title(requested_title);

        self.exact(&loose, &query).or_else(|| {
            if query.is_empty() {
                return None;
            }
            self.containment(&query).or_else(|| self.fuzzy(&query))
        })
    }

    /// Titles that only differ in punctuation or accents fold to the same key,
    /// so the case-folded form is tried before the folded one.
    fn exact(&self, loose: &str, query: &str) -> Option<TitleMatch> {
        let entry = single(self.titles.iter().filter(|entry| entry.loose == loose)).or_else(|| {
            if query.is_empty() {
                return None;
            }
            single(self.titles.iter().filter(|entry| entry.normalized == query))
        })?;
        Some(TitleMatch {
            title: entry.canonical.clone(),
            method: MatchMethod::Exact,
            score: 1.0,
        })
    }

    fn containment(&self, query: &str) -> Option<TitleMatch> {
        let entry = single(self.titles.iter().filter(|entry| {
            entry.normalized.contains(query) || query.contains(entry.normalized.as_str())
        }))?;

        let query_chars: Vec<char> = query.chars().collect();
        Some(TitleMatch {
            title: entry.canonical.clone(),
            method: MatchMethod::Containment,
            score: similarity_chars(&query_chars, &entry.chars),
        })
    }

    fn fuzzy(&self, query: &str) -> Option<TitleMatch> {
        let query_chars: Vec<char> = query.chars().collect();

        let mut best: Option<(&IndexedTitle, f64)> = None;
        let mut runner_up: Option<f64> = None;

        for entry in &self.titles {
            let score = similarity_chars(&query_chars, &entry.chars);
            match best {
                Some((_, best_score)) if score <= best_score => {
                    if runner_up.map_or(true, |second| score > second) {
                        runner_up = Some(score);
                    }
                }
                _ => {
                    runner_up = best.map(|(_, previous)| previous);
                    best = Some((entry, score));
                }
            }
        }

        let (entry, score) = best?;
        if score <= self.config.acceptance_threshold {
            return None;
        }
        if let Some(second) = runner_up {
            if !clear_lead(score, second, self.config.ambiguity_margin) {
                return None;
            }
        }

        Some(TitleMatch {
            title: entry.canonical.clone(),
            method: MatchMethod::Fuzzy,
            score,
        })
    }
}

fn loose_title(text: &str) -> String {
    normalize_whitespace(&text.to_lowercase())
}

/// A lead of exactly `margin` counts as unambiguous.
fn clear_lead(best: f64, second: f64, margin: f64) -> bool {
    best - second + MARGIN_TOLERANCE >= margin
}

fn single<T>(mut matches: impl Iterator<Item = T>) -> Option<T> {
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first)
}

/// Normalized Levenshtein ratio in `[0, 1]`, where 1 means identical.
pub fn similarity(left: &str, right: &str) -> f64 {
    let left: Vec<char> = left.chars().collect();
    let right: Vec<char> = right.chars().collect();
    similarity_chars(&left, &right)
}

fn similarity_chars(left: &[char], right: &[char]) -> f64 {
    let longest = left.len().max(right.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(left, right) as f64 / longest as f64
}

fn levenshtein(left: &[char], right: &[char]) -> usize {
    if right.is_empty() {
        return left.len();
    }

    let mut prev: Vec<usize> = (0..=right.len()).collect();
    let mut curr: Vec<usize> = vec![0; right.len() + 1];

    for (i, left_char) in left.iter().enumerate() {
        curr[0] = i + 1;
        for (j, right_char) in right.iter().enumerate() {
            let cost = usize::from(left_char != right_char);
            let deletion = prev[j + 1] + 1;
            let insertion = curr[j] + 1;
            let substitution = prev[j] + cost;
            curr[j + 1] = deletion.min(insertion).min(substitution);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[right.len()]
}
