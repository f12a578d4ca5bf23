use crate::embeddings::{cosine_similarity, Embedder};
use crate::ingest::build_document_text;
use crate::traits::VectorIndex;
use crate::{BookEntry, IndexHit, ScoreMetric, SearchError};
use async_trait::async_trait;

struct IndexedBook {
    entry: BookEntry,
    vector: Vec<f32>,
}

/// Brute-force cosine index held in process memory. Built once, then only read.
pub struct MemoryVectorIndex {
    books: Vec<IndexedBook>,
    vector_size: usize,
}

impl MemoryVectorIndex {
    pub fn new(
        entries: Vec<BookEntry>,
        embeddings: Vec<Vec<f32>>,
        vector_size: usize,
    ) -> Result<Self, SearchError> {
        if entries.len() != embeddings.len() {
            return Err(SearchError::Request(format!(
                "embedding count {} doesn't match book count {}",
                embeddings.len(),
                entries.len()
            )));
        }

        let books = entries
            .into_iter()
            .zip(embeddings)
            .map(|(entry, vector)| {
                if vector.len() != vector_size {
                    return Err(SearchError::Request(format!(
                        "embedding dimension {} != {}",
                        vector.len(),
                        vector_size
                    )));
                }
                Ok(IndexedBook { entry, vector })
            })
            .collect::<Result<Vec<_>, SearchError>>()?;

        Ok(Self { books, vector_size })
    }

    /// Embeds every entry's document text and indexes the results.
    pub async fn build<E>(entries: Vec<BookEntry>, embedder: &E) -> Result<Self, SearchError>
    where
        E: Embedder + Sync,
    {
        let documents: Vec<String> = entries.iter().map(build_document_text).collect();
        let embeddings = if documents.is_empty() {
            Vec::new()
        } else {
            embedder.embed_texts(&documents).await?
        };
        Self::new(entries, embeddings, embedder.dimensions())
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn query(&self, query_vector: &[f32], k: usize) -> Result<Vec<IndexHit>, SearchError> {
        if query_vector.len() != self.vector_size {
            return Err(SearchError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.vector_size
            )));
        }

        let mut scored: Vec<(f64, &IndexedBook)> = self
            .books
            .iter()
            .map(|book| (1.0 - cosine_similarity(query_vector, &book.vector), book))
            .collect();
        scored.sort_by(|left, right| left.0.total_cmp(&right.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(distance, book)| IndexHit {
                title: book.entry.title.clone(),
                raw_score: distance,
                metric: ScoreMetric::Distance,
                short_summary: book.entry.short_summary.clone(),
                themes: book.entry.themes.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str) -> BookEntry {
        BookEntry {
            title: title.to_string(),
            short_summary: String::new(),
            themes: Vec::new(),
        }
    }

    #[tokio::test]
    async fn nearest_books_come_first_as_distances() -> Result<(), SearchError> {
        let index = MemoryVectorIndex::new(
            vec![entry("East"), entry("North"), entry("North East")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
            2,
        )?;

        let hits = index.query(&[0.0, 1.0], 2).await?;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "North");
        assert_eq!(hits[0].metric, ScoreMetric::Distance);
        assert!(hits[0].raw_score.abs() < 1e-6);
        assert_eq!(hits[1].title, "North East");
        Ok(())
    }

    #[tokio::test]
    async fn equal_distances_keep_insertion_order() -> Result<(), SearchError> {
        let index = MemoryVectorIndex::new(
            vec![entry("First"), entry("Second")],
            vec![vec![1.0, 0.0], vec![1.0, 0.0]],
            2,
        )?;

        let titles: Vec<_> = index
            .query(&[1.0, 0.0], 5)
            .await?
            .into_iter()
            .map(|hit| hit.title)
            .collect();
        assert_eq!(titles, vec!["First", "Second"]);
        Ok(())
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        assert!(MemoryVectorIndex::new(vec![entry("A")], Vec::new(), 2).is_err());
        assert!(MemoryVectorIndex::new(vec![entry("A")], vec![vec![1.0]], 2).is_err());
    }
}
