use crate::orchestrator::ChainState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("expected at least {expected} book entries, found {found}")]
    TooFewBooks { expected: usize, found: usize },
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("store not available yet: {0}")]
    NotReady(String),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid client configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("reasoning service returned {status}: {details}")]
    BackendResponse { status: u16, details: String },

    #[error("malformed completion: {0}")]
    Malformed(String),

    #[error("model answered without calling a tool")]
    MissingToolCall,

    #[error("model requested {0} tool calls, expected exactly one")]
    MultipleToolCalls(usize),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),
}

impl ModelError {
    /// Failures worth another attempt against the same backend.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(error) => error.is_timeout() || error.is_connect() || error.is_request(),
            Self::BackendResponse { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("acceptance threshold must be within [0, 1], got {0}")]
    Threshold(f64),

    #[error("ambiguity margin must be within [0, 1), got {0}")]
    Margin(f64),

    #[error("top_k must be greater than zero")]
    TopK,

    #[error("max_attempts must be greater than zero")]
    MaxAttempts,
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("retrieval failed: {0}")]
    RetrievalFailed(#[source] SearchError),

    #[error("model failed: {0}")]
    ModelFailed(#[source] ModelError),

    #[error("model requested a title that is not in the catalog: {requested_title:?}")]
    ToolMismatch { requested_title: String },
}

impl ChainError {
    /// Terminal state the pipeline stopped in.
    pub fn state(&self) -> ChainState {
        match self {
            Self::EmptyPrompt | Self::RetrievalFailed(_) => ChainState::RetrievalFailed,
            Self::ModelFailed(_) => ChainState::ModelFailed,
            Self::ToolMismatch { .. } => ChainState::ToolMismatch,
        }
    }
}
