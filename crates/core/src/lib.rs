pub mod catalog;
pub mod chat;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod models;
pub mod openai;
pub mod orchestrator;
pub mod prompts;
pub mod resolver;
pub mod retriever;
pub mod stores;
pub mod text;
pub mod tools;
pub mod traits;

pub use catalog::{load_full_summaries, CatalogStore, DEFAULT_FULL_SUMMARIES_PATH};
pub use chat::{AssistantTurn, ChatMessage, ToolCall, ToolDefinition};
pub use config::{ChainSettings, OpenAiConfig, ResolverConfig, DEFAULT_TOP_K};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{ChainError, ConfigError, IngestError, ModelError, SearchError};
pub use ingest::{
    build_document_text, load_book_summaries, parse_book_summaries, point_id, slugify,
    IngestionReport, SkippedBlock, DEFAULT_SHORT_SUMMARIES_PATH,
};
pub use models::{
    BookEntry, BookRecord, ChainResult, IndexHit, IngestionOptions, MatchMethod,
    RetrievedCandidate, ScoreMetric, TitleMatch,
};
pub use openai::OpenAiClient;
pub use orchestrator::{ChainOrchestrator, ChainState};
pub use resolver::TitleResolver;
pub use retriever::Retriever;
pub use stores::{MemoryVectorIndex, QdrantStore};
pub use tools::{SummaryTool, ToolDispatcher, ToolRequest, ToolResult, GET_SUMMARY_BY_TITLE};
pub use traits::{ReasoningService, VectorIndex, VectorIndexWriter};
