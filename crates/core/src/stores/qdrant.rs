use crate::ingest::{build_document_text, point_id, slugify};
use crate::text::truncate_chars;
use crate::traits::{VectorIndex, VectorIndexWriter};
use crate::{BookEntry, IndexHit, ScoreMetric, SearchError};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const BACKEND: &str = "qdrant";
const MAX_ERROR_BODY_CHARS: usize = 500;

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantStore {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        vector_size: usize,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            endpoint: endpoint.into(),
            collection: collection.into(),
            client: Client::builder().timeout(timeout).build()?,
            vector_size,
        })
    }

    fn collection_url(&self, suffix: &str) -> Result<Url, SearchError> {
        let url = Url::parse(&format!(
            "{}/collections/{}{}",
            self.endpoint.trim_end_matches('/'),
            self.collection,
            suffix
        ))?;
        Ok(url)
    }
}

#[async_trait]
impl VectorIndexWriter for QdrantStore {
    async fn ensure_collection(&self, vector_size: usize) -> Result<(), SearchError> {
        if self.vector_size != vector_size {
            return Err(SearchError::Request(format!(
                "configured vector size {} does not match requested {}",
                self.vector_size, vector_size
            )));
        }

        let response = self.client.get(self.collection_url("")?).send().await?;

        if response.status() != StatusCode::NOT_FOUND {
            let parsed = read_json(response).await?;
            let existing = parsed
                .pointer("/result/config/params/vectors/size")
                .and_then(Value::as_u64);
            return match existing {
                Some(size) if size as usize != vector_size => Err(SearchError::Request(format!(
                    "collection {} stores vectors of size {size}, not {vector_size}",
                    self.collection
                ))),
                _ => Ok(()),
            };
        }

        let response = self
            .client
            .put(self.collection_url("")?)
            .json(&json!({
                "vectors": {
                    "size": vector_size,
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?;
        read_json(response).await?;

        info!(collection = %self.collection, vector_size, "qdrant collection created");
        Ok(())
    }

    async fn upsert_books(
        &self,
        entries: &[BookEntry],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError> {
        if entries.len() != embeddings.len() {
            return Err(SearchError::Request(format!(
                "embedding count {} doesn't match book count {}",
                embeddings.len(),
                entries.len()
            )));
        }

        let points = entries
            .iter()
            .zip(embeddings.iter())
            .map(|(entry, embedding)| {
                if embedding.len() != self.vector_size {
                    return Err(SearchError::Request(format!(
                        "embedding dimension {} != {}",
                        embedding.len(),
                        self.vector_size
                    )));
                }

                Ok(json!({
                    "id": point_id(&entry.title),
                    "vector": embedding,
                    "payload": {
                        "title": entry.title,
                        "slug": slugify(&entry.title),
                        "short_summary": entry.short_summary,
                        "themes": entry.themes,
                        "document": build_document_text(entry),
                        "source": "book_summaries.md",
                    },
                }))
            })
            .collect::<Result<Vec<_>, SearchError>>()?;

        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(self.collection_url("/points?wait=true")?)
            .json(&json!({ "points": points }))
            .send()
            .await?;
        read_json(response).await?;

        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn query(&self, query_vector: &[f32], k: usize) -> Result<Vec<IndexHit>, SearchError> {
        if query_vector.len() != self.vector_size {
            return Err(SearchError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.vector_size
            )));
        }

        let response = self
            .client
            .post(self.collection_url("/points/search")?)
            .json(&json!({
                "vector": query_vector,
                "limit": k,
                "with_payload": true,
            }))
            .send()
            .await?;

        let parsed = read_json(response).await?;
        let hits = parse_search_hits(&parsed)?;
        debug!(collection = %self.collection, hits = hits.len(), "qdrant search done");
        Ok(hits)
    }
}

/// Decodes a successful response; any other status becomes a backend error
/// carrying the start of the body.
async fn read_json(response: Response) -> Result<Value, SearchError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(backend_error(status, &body));
    }
    Ok(serde_json::from_str(&body)?)
}

fn backend_error(status: StatusCode, body: &str) -> SearchError {
    SearchError::BackendResponse {
        backend: BACKEND.to_string(),
        details: format!("{status}: {}", truncate_chars(body.trim(), MAX_ERROR_BODY_CHARS)),
    }
}

fn parse_search_hits(parsed: &Value) -> Result<Vec<IndexHit>, SearchError> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::BackendResponse {
            backend: BACKEND.to_string(),
            details: "search response has no result array".to_string(),
        })?;

    let mut result = Vec::with_capacity(hits.len());
    for hit in hits {
        let Some(title) = hit.pointer("/payload/title").and_then(Value::as_str) else {
            let id = hit.pointer("/id").unwrap_or(&Value::Null);
            warn!(%id, "qdrant hit has no title payload; skipped");
            continue;
        };
        let score = match hit.pointer("/score").and_then(Value::as_f64) {
            Some(score) => score,
            None => {
                warn!(title, "qdrant hit has no score; ranking it last");
                0.0
            }
        };
        let short_summary = hit
            .pointer("/payload/short_summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        result.push(IndexHit {
            title: title.to_string(),
            raw_score: score,
            metric: ScoreMetric::Similarity,
            short_summary,
            themes: payload_themes(hit.pointer("/payload/themes")),
        });
    }

    Ok(result)
}

/// Themes are stored as a list; older payloads kept one comma-joined string.
fn payload_themes(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|theme| !theme.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_hits_keep_backend_order_and_payload() -> Result<(), SearchError> {
        let response = json!({
            "result": [
                {
                    "id": 1,
                    "score": 0.91,
                    "payload": {
                        "title": "1984",
                        "short_summary": "Big Brother watches.",
                        "themes": ["surveillance", "control"]
                    }
                },
                { "id": 2, "score": 0.5, "payload": {} },
                {
                    "id": 3,
                    "score": 0.42,
                    "payload": { "title": "Dune", "themes": "power, ecology" }
                }
            ],
            "status": "ok"
        });

        let hits = parse_search_hits(&response)?;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "1984");
        assert_eq!(hits[0].metric, ScoreMetric::Similarity);
        assert_eq!(hits[0].themes, vec!["surveillance", "control"]);
        assert_eq!(hits[1].title, "Dune");
        assert_eq!(hits[1].themes, vec!["power", "ecology"]);
        assert!(hits[1].short_summary.is_empty());
        Ok(())
    }

    #[test]
    fn missing_result_array_is_a_backend_error() {
        let response = json!({ "status": { "error": "collection not found" } });
        assert!(matches!(
            parse_search_hits(&response),
            Err(SearchError::BackendResponse { .. })
        ));
    }

    #[tokio::test]
    async fn mismatched_query_dimension_is_rejected_before_any_request() -> Result<(), SearchError> {
        let store = QdrantStore::new("http://127.0.0.1:9", "books", 4, Duration::from_secs(1))?;
        let result = store.query(&[0.1, 0.2], 3).await;
        assert!(matches!(result, Err(SearchError::Request(_))));
        Ok(())
    }

    #[test]
    fn hit_without_score_is_kept_with_zero_relevance() -> Result<(), SearchError> {
        let response = json!({
            "result": [{ "id": 7, "payload": { "title": "Animal Farm" } }]
        });
        let hits = parse_search_hits(&response)?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Animal Farm");
        assert_eq!(hits[0].raw_score, 0.0);
        Ok(())
    }

    #[test]
    fn backend_errors_carry_status_and_truncated_body() {
        let body = format!("  {{\"status\":{{\"error\":\"{}\"}}}}", "x".repeat(2_000));
        match backend_error(StatusCode::BAD_REQUEST, &body) {
            SearchError::BackendResponse { backend, details } => {
                assert_eq!(backend, "qdrant");
                assert!(details.starts_with("400 Bad Request: {\"status\""));
                assert!(details.ends_with('…'));
                assert!(details.chars().count() < 600);
            }
            other => panic!("expected a backend response error, got {other:?}"),
        }
    }
}
