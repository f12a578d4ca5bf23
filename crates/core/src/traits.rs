use crate::chat::{AssistantTurn, ChatMessage, ToolDefinition};
use crate::{BookEntry, IndexHit, ModelError, SearchError};
use async_trait::async_trait;
use std::sync::Arc;

/// Read side of a vector index. Retrieval only ever needs this half.
#[async_trait]
pub trait VectorIndex {
    async fn query(&self, query_vector: &[f32], k: usize) -> Result<Vec<IndexHit>, SearchError>;
}

#[async_trait]
pub trait VectorIndexWriter {
    async fn ensure_collection(&self, vector_size: usize) -> Result<(), SearchError>;

    async fn upsert_books(
        &self,
        entries: &[BookEntry],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError>;
}

/// A chat backend that understands function-style tool declarations.
#[async_trait]
pub trait ReasoningService {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn, ModelError>;
}

#[async_trait]
impl<T> VectorIndex for Arc<T>
where
    T: VectorIndex + Send + Sync + ?Sized,
{
    async fn query(&self, query_vector: &[f32], k: usize) -> Result<Vec<IndexHit>, SearchError> {
        self.as_ref().query(query_vector, k).await
    }
}

#[async_trait]
impl<T> ReasoningService for Arc<T>
where
    T: ReasoningService + Send + Sync + ?Sized,
{
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn, ModelError> {
        self.as_ref().complete(messages, tools).await
    }
}
