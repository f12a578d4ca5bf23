use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use smart_librarian_core::config::{DEFAULT_ACCEPTANCE_THRESHOLD, DEFAULT_AMBIGUITY_MARGIN};
use smart_librarian_core::{
    build_document_text, load_book_summaries, BookEntry, CatalogStore, ChainOrchestrator,
    ChainResult, ChainSettings, CharacterNgramEmbedder, Embedder, IngestionOptions,
    MemoryVectorIndex, OpenAiClient, OpenAiConfig, QdrantStore, ResolverConfig, Retriever,
    SummaryTool, ToolResult, VectorIndex, VectorIndexWriter, DEFAULT_FULL_SUMMARIES_PATH,
    DEFAULT_SHORT_SUMMARIES_PATH, DEFAULT_TOP_K,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type SharedEmbedder = Arc<dyn Embedder + Send + Sync>;
type SharedIndex = Arc<dyn VectorIndex + Send + Sync>;

#[derive(Parser)]
#[command(name = "smart-librarian", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    openai_api_key: String,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    openai_base_url: String,

    /// Chat model used to pick the title
    #[arg(long, env = "OPENAI_CHAT_MODEL", default_value = "gpt-4o-mini")]
    chat_model: String,

    /// Embedding model
    #[arg(long, env = "OPENAI_EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    embedding_model: String,

    /// Vector size produced by the embedding model
    #[arg(long, env = "OPENAI_EMBEDDING_DIMENSIONS", default_value = "1536")]
    embedding_dimensions: usize,

    /// Sampling temperature for the chat model
    #[arg(long, env = "OPENAI_TEMPERATURE", default_value = "0.2")]
    temperature: f32,

    /// Attempts per OpenAI request, including the first
    #[arg(long, env = "OPENAI_MAX_ATTEMPTS", default_value = "3")]
    max_attempts: u32,

    /// Timeout for every remote request, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "60")]
    timeout_secs: u64,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, env = "QDRANT_COLLECTION", default_value = "books_v1")]
    qdrant_collection: String,

    /// Markdown file with short summaries and themes
    #[arg(long, default_value = DEFAULT_SHORT_SUMMARIES_PATH)]
    summaries_file: PathBuf,

    /// JSON object mapping titles to full summaries
    #[arg(long, default_value = DEFAULT_FULL_SUMMARIES_PATH)]
    full_summaries_file: PathBuf,

    /// Embedding backend
    #[arg(long, value_enum, env = "LIBRARIAN_EMBEDDER", default_value_t = EmbedderKind::Openai)]
    embedder: EmbedderKind,

    /// Vector index backend; `memory` indexes the summaries file at startup
    #[arg(long, value_enum, env = "LIBRARIAN_INDEX", default_value_t = IndexKind::Qdrant)]
    index: IndexKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EmbedderKind {
    Openai,
    Ngram,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum IndexKind {
    Qdrant,
    Memory,
}

#[derive(Subcommand)]
enum Command {
    /// Embed the short summaries and upsert them into Qdrant.
    Ingest {
        /// Where to write the ingestion manifest.
        #[arg(long, default_value = "data/ingest_manifest.json")]
        manifest: PathBuf,
    },
    /// Recommend one book for a request and print its full summary.
    Ask {
        /// What the reader is looking for.
        #[arg(long)]
        prompt: String,
        /// Number of candidates passed to the model.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        /// Let the model write a closing answer after the tool call.
        #[arg(long, default_value_t = false)]
        final_answer: bool,
        /// Fuzzy title scores must be above this to resolve.
        #[arg(long, default_value_t = DEFAULT_ACCEPTANCE_THRESHOLD)]
        threshold: f64,
        /// Minimum lead of the best fuzzy score over the runner-up.
        #[arg(long, default_value_t = DEFAULT_AMBIGUITY_MARGIN)]
        margin: f64,
        /// Print the result as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Resolve a title against the catalog, as the model's tool would.
    Lookup {
        /// Title to look up; case and small typos are tolerated.
        #[arg(long)]
        title: String,
        #[arg(long, default_value_t = DEFAULT_ACCEPTANCE_THRESHOLD)]
        threshold: f64,
        #[arg(long, default_value_t = DEFAULT_AMBIGUITY_MARGIN)]
        margin: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        embedder = ?cli.embedder,
        index = ?cli.index,
        "smart-librarian boot"
    );

    match &cli.command {
        Command::Ingest { manifest } => ingest(&cli, manifest).await,
        Command::Ask {
            prompt,
            top_k,
            final_answer,
            threshold,
            margin,
            json,
        } => {
            let settings = ChainSettings {
                top_k: *top_k,
                resolver: ResolverConfig {
                    acceptance_threshold: *threshold,
                    ambiguity_margin: *margin,
                },
                compose_final_answer: *final_answer,
            };
            ask(&cli, prompt, settings, *json).await
        }
        Command::Lookup {
            title,
            threshold,
            margin,
        } => lookup(
            &cli,
            title,
            ResolverConfig {
                acceptance_threshold: *threshold,
                ambiguity_margin: *margin,
            },
        ),
    }
}

async fn ingest(cli: &Cli, manifest: &Path) -> anyhow::Result<()> {
    let entries = load_entries(&cli.summaries_file)?;
    let embedder = build_embedder(cli, None)?;

    info!(
        data_file = %cli.summaries_file.display(),
        book_count = entries.len(),
        "embedding book summaries"
    );
    let documents: Vec<String> = entries.iter().map(build_document_text).collect();
    let embeddings = embedder.embed_texts(&documents).await?;

    let store = QdrantStore::new(
        &cli.qdrant_url,
        &cli.qdrant_collection,
        embedder.dimensions(),
        request_timeout(cli),
    )?;
    store.ensure_collection(embedder.dimensions()).await?;
    store.upsert_books(&entries, &embeddings).await?;

    let ingested_at = Utc::now().to_rfc3339();
    let report = serde_json::json!({
        "collection": cli.qdrant_collection,
        "count": entries.len(),
        "data_file": cli.summaries_file.display().to_string(),
        "embedder": format!("{:?}", cli.embedder).to_lowercase(),
        "ingested_at": ingested_at,
    });
    if let Some(parent) = manifest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(manifest, serde_json::to_string_pretty(&report)?)
        .await
        .with_context(|| format!("writing manifest {}", manifest.display()))?;

    println!(
        "{} books upserted into '{}' at {}",
        entries.len(),
        cli.qdrant_collection,
        ingested_at
    );
    Ok(())
}

async fn ask(cli: &Cli, prompt: &str, settings: ChainSettings, json: bool) -> anyhow::Result<()> {
    let entries = load_entries(&cli.summaries_file)?;
    let catalog = Arc::new(CatalogStore::load(&cli.full_summaries_file, &entries)?);

    let client = Arc::new(openai_client(cli)?);
    let embedder = build_embedder(cli, Some(&client))?;
    let index = build_index(cli, entries, &embedder).await?;

    let chain = ChainOrchestrator::new(Retriever::new(embedder, index), client, catalog, settings)?;
    let result = chain.answer(prompt).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn lookup(cli: &Cli, title: &str, config: ResolverConfig) -> anyhow::Result<()> {
    config.validate()?;
    let entries = load_entries(&cli.summaries_file)?;
    let catalog = Arc::new(CatalogStore::load(&cli.full_summaries_file, &entries)?);
    let tool = SummaryTool::new(catalog, config);

    match tool.get_summary_by_title(title) {
        ToolResult::Found {
            matched,
            full_summary,
        } => {
            println!(
                "{} ({:?} match, score={:.3})",
                matched.title, matched.method, matched.score
            );
            println!("{full_summary}");
            Ok(())
        }
        ToolResult::NotFound { requested_title } => {
            bail!("title not found: {requested_title}")
        }
    }
}

fn load_entries(path: &Path) -> anyhow::Result<Vec<BookEntry>> {
    let report = load_book_summaries(path, &IngestionOptions::default())
        .with_context(|| format!("reading book summaries from {}", path.display()))?;

    for skipped in &report.skipped_blocks {
        warn!(block = skipped.index, reason = %skipped.reason, "skipped summary block");
    }
    Ok(report.entries)
}

fn request_timeout(cli: &Cli) -> Duration {
    Duration::from_secs(cli.timeout_secs)
}

fn openai_client(cli: &Cli) -> anyhow::Result<OpenAiClient> {
    if cli.openai_api_key.trim().is_empty() {
        bail!("OPENAI_API_KEY is not set; export it or add it to .env");
    }

    let config = OpenAiConfig {
        api_key: cli.openai_api_key.clone(),
        base_url: cli.openai_base_url.clone(),
        chat_model: cli.chat_model.clone(),
        embedding_model: cli.embedding_model.clone(),
        embedding_dimensions: cli.embedding_dimensions,
        temperature: cli.temperature,
        timeout: request_timeout(cli),
        max_attempts: cli.max_attempts,
    };
    Ok(OpenAiClient::new(config)?)
}

/// Reuses `client` for embeddings when one was already built for chat.
fn build_embedder(cli: &Cli, client: Option<&Arc<OpenAiClient>>) -> anyhow::Result<SharedEmbedder> {
    let embedder: SharedEmbedder = match (cli.embedder, client) {
        (EmbedderKind::Ngram, _) => Arc::new(CharacterNgramEmbedder::default()),
        (EmbedderKind::Openai, Some(client)) => client.clone(),
        (EmbedderKind::Openai, None) => Arc::new(openai_client(cli)?),
    };
    Ok(embedder)
}

async fn build_index(
    cli: &Cli,
    entries: Vec<BookEntry>,
    embedder: &SharedEmbedder,
) -> anyhow::Result<SharedIndex> {
    let index: SharedIndex = match cli.index {
        IndexKind::Qdrant => Arc::new(QdrantStore::new(
            &cli.qdrant_url,
            &cli.qdrant_collection,
            embedder.dimensions(),
            request_timeout(cli),
        )?),
        IndexKind::Memory => {
            let index = MemoryVectorIndex::build(entries, embedder).await?;
            info!(book_count = index.len(), "in-memory index ready");
            Arc::new(index)
        }
    };
    Ok(index)
}

fn print_result(result: &ChainResult) {
    println!("Recommended: {}", result.chosen_title());
    if !result.rationale().is_empty() {
        println!("Why: {}", result.rationale());
    }
    println!();
    println!("{}", result.full_summary());

    if let Some(answer) = result.final_answer() {
        println!();
        println!("{answer}");
    }

    println!();
    println!("candidates:");
    for candidate in result.candidates() {
        println!("  score={:.4} {}", candidate.score, candidate.title);
    }
}
