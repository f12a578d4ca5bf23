use crate::{BookEntry, BookRecord, IngestError};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_FULL_SUMMARIES_PATH: &str = "data/book_summaries_full.json";

/// Read-only map from canonical title to its record.
#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    records: BTreeMap<String, BookRecord>,
}

impl CatalogStore {
    /// Builds the store from the full-summary map, attaching the short summary
    /// and themes of every entry whose title is catalogued.
    pub fn from_parts(full_summaries: BTreeMap<String, String>, entries: &[BookEntry]) -> Self {
        let mut by_title: HashMap<&str, &BookEntry> = HashMap::with_capacity(entries.len());
        for entry in entries {
            if full_summaries.contains_key(&entry.title) {
                by_title.insert(entry.title.as_str(), entry);
            } else {
                warn!(title = %entry.title, "entry has no full summary; leaving it out of the catalog");
            }
        }

        let records = full_summaries
            .into_iter()
            .map(|(title, full_summary)| {
                let (short_summary, themes) = by_title
                    .get(title.as_str())
                    .map(|entry| (entry.short_summary.clone(), entry.themes.clone()))
                    .unwrap_or_default();
                let record = BookRecord {
                    title: title.clone(),
                    short_summary,
                    themes,
                    full_summary,
                };
                (title, record)
            })
            .collect();

        Self { records }
    }

    pub fn from_records(records: impl IntoIterator<Item = BookRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.title.clone(), record))
                .collect(),
        }
    }

    pub fn load(path: &Path, entries: &[BookEntry]) -> Result<Self, IngestError> {
        let full_summaries = load_full_summaries(path)?;
        let store = Self::from_parts(full_summaries, entries);
        info!(path = %path.display(), books = store.len(), "catalog loaded");
        Ok(store)
    }

    pub fn lookup_exact(&self, title: &str) -> Option<&BookRecord> {
        self.records.get(title)
    }

    /// Canonical titles in sorted order.
    pub fn all_titles(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn records(&self) -> impl Iterator<Item = &BookRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn load_full_summaries(path: &Path) -> Result<BTreeMap<String, String>, IngestError> {
    let raw = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;

    let object = value.as_object().ok_or_else(|| {
        IngestError::InvalidCatalog(format!(
            "{} must hold a JSON object of title to summary",
            path.display()
        ))
    })?;

    if object.is_empty() {
        return Err(IngestError::InvalidCatalog(format!(
            "{} has no books",
            path.display()
        )));
    }

    object
        .iter()
        .map(|(title, summary)| match summary.as_str() {
            Some(summary) if !title.trim().is_empty() => Ok((title.clone(), summary.to_string())),
            _ => Err(IngestError::InvalidCatalog(format!(
                "entry {title:?} must map a non-empty title to a string summary"
            ))),
        })
        .collect()
}
