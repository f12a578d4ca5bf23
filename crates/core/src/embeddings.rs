use crate::SearchError;
use async_trait::async_trait;
use std::sync::Arc;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

#[async_trait]
pub trait Embedder {
    fn dimensions(&self) -> usize;

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut vectors = self.embed_texts(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| SearchError::BackendResponse {
            backend: "embedder".to_string(),
            details: "no embedding returned for query".to_string(),
        })
    }
}

#[async_trait]
impl<T> Embedder for Arc<T>
where
    T: Embedder + Send + Sync + ?Sized,
{
    fn dimensions(&self) -> usize {
        self.as_ref().dimensions()
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        self.as_ref().embed_texts(texts).await
    }
}

/// Hashed character-trigram embedder. Deterministic and offline, so the whole
/// pipeline can run without an embeddings API.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    f64::from(dot / (left_norm * right_norm))
}
