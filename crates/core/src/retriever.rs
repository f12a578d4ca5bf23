use crate::embeddings::Embedder;
use crate::traits::VectorIndex;
use crate::{RetrievedCandidate, SearchError};
use tracing::debug;

pub struct Retriever<E, V> {
    embedder: E,
    index: V,
}

impl<E, V> Retriever<E, V>
where
    E: Embedder + Send + Sync,
    V: VectorIndex + Send + Sync,
{
    pub fn new(embedder: E, index: V) -> Self {
        Self { embedder, index }
    }

    /// Top-`k` books for `query`, most relevant first. Equal scores keep the
    /// order the index returned them in; short indexes yield fewer than `k`.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedCandidate>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }
        if k == 0 {
            return Err(SearchError::Request("k must be greater than zero".to_string()));
        }

        let query_vector = self.embedder.embed(query).await?;
        let hits = self.index.query(&query_vector, k).await?;

        let mut candidates: Vec<RetrievedCandidate> =
            hits.into_iter().map(|hit| hit.into_candidate()).collect();
        candidates.sort_by(|left, right| right.score.total_cmp(&left.score));
        candidates.truncate(k);

        debug!(k, returned = candidates.len(), "retrieval done");
        Ok(candidates)
    }
}
