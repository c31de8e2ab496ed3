use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use repoctx_core::Config;
use repoctx_core::config::EmbedProviderKind;
#[cfg(feature = "mock")]
use repoctx_embed::mock::MockEmbedder;
use repoctx_embed::{AnyEmbedder, EmbedProvider, ollama::OllamaEmbedder};
use repoctx_index::{
    CanonicalType, ChunkStore, CodeIndexer, CodeRetriever, ExpansionEngine, ExpansionError,
    ExpansionRequest, IndexError, IndexWatcher, Intent, Scope, chunk_display_header,
    format_as_context,
};
use repoctx_store::QdrantOps;
use serde_json::json;

/// Dependency-aware code chunk indexing with rulebook-gated context expansion.
#[derive(Parser, Debug)]
#[command(name = "repoctx", version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replace the index of a repository with the current checkout
    Index {
        path: PathBuf,
        #[arg(long)]
        repo_url: String,
    },
    /// Index a checkout, then keep it in sync until interrupted
    Watch {
        path: PathBuf,
        #[arg(long)]
        repo_url: String,
    },
    /// Nearest chunks to a natural-language query
    Retrieve {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        repo_url: Option<String>,
        /// Print an XML context block instead of JSON
        #[arg(long)]
        xml: bool,
    },
    /// Related chunks around source chunks, if a rule allows it
    Expand {
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        types: Vec<CanonicalType>,
        #[arg(long, default_value = "same_file")]
        scope: Scope,
        #[arg(long)]
        max_chunks: usize,
        #[arg(long)]
        intent: Intent,
        #[arg(long)]
        repo_url: Option<String>,
    },
    /// Print the loaded expansion rulebook
    Rules,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    let config_path = repoctx_core::resolve_config_path(cli.config);
    let config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    config.validate()?;
    tracing::debug!(path = %config_path.display(), rules = config.expansion_rules.len(), "config loaded");

    match cli.command {
        Command::Rules => print_json(&config.expansion_rules),
        Command::Index { path, repo_url } => {
            let root = canonical_root(&path)?;
            let indexer = build_indexer(&config)?;
            let report = indexer.index_repository(&root, &repo_url).await?;
            print_json(&report)
        }
        Command::Watch { path, repo_url } => {
            let root = canonical_root(&path)?;
            let indexer = Arc::new(build_indexer(&config)?);
            let report = indexer.index_repository(&root, &repo_url).await?;
            tracing::info!(chunks = report.chunks_created, "initial index built");

            let _watcher = IndexWatcher::start(
                &root,
                repo_url,
                indexer,
                Duration::from_millis(config.ingest.watch_debounce_ms),
            )?;
            tracing::info!(root = %root.display(), "watching for changes");
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for shutdown signal")?;
            tracing::info!("received shutdown signal");
            Ok(())
        }
        Command::Retrieve {
            query,
            top_k,
            repo_url,
            xml,
        } => {
            let retriever = build_retriever(&config)?;
            let hits = retriever
                .retrieve(&query, top_k, repo_url.as_deref())
                .await?;
            if xml {
                println!(
                    "{}",
                    format_as_context(hits.iter().map(|h| (&h.chunk, f64::from(h.score))))
                );
                return Ok(());
            }
            let out: Vec<_> = hits
                .iter()
                .map(|h| {
                    json!({
                        "score": h.score,
                        "header": chunk_display_header(&h.chunk),
                        "chunk": h.chunk,
                    })
                })
                .collect();
            print_json(&out)
        }
        Command::Expand {
            ids,
            types,
            scope,
            max_chunks,
            intent,
            repo_url,
        } => {
            let retriever = build_retriever(&config)?;
            let request = ExpansionRequest {
                source_ids: ids,
                requested: types.into_iter().collect::<BTreeSet<_>>(),
                scope,
                max_chunks,
                intent,
                repo_url,
            };
            match retriever.expand(&request).await {
                Ok(expansion) => print_json(&expansion),
                Err(IndexError::Expansion(ExpansionError::Denied(violation))) => {
                    print_json(&json!({ "chunks": [], "denied": violation.to_string() }))
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn canonical_root(path: &Path) -> anyhow::Result<PathBuf> {
    let root = std::fs::canonicalize(path)
        .with_context(|| format!("cannot resolve {}", path.display()))?;
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    Ok(root)
}

fn create_embedder(config: &Config) -> anyhow::Result<AnyEmbedder> {
    match config.embedding.provider {
        EmbedProviderKind::Ollama => Ok(AnyEmbedder::Ollama(OllamaEmbedder::new(
            &config.embedding.base_url,
            config.embedding.model.clone(),
        ))),
        #[cfg(feature = "mock")]
        EmbedProviderKind::Mock => Ok(AnyEmbedder::Mock(MockEmbedder::default())),
        #[cfg(not(feature = "mock"))]
        EmbedProviderKind::Mock => bail!("embedding provider mock requires the `mock` feature"),
    }
}

fn create_store(config: &Config) -> anyhow::Result<ChunkStore> {
    let qdrant = QdrantOps::new(&config.qdrant.url)
        .with_context(|| format!("cannot create Qdrant client for {}", config.qdrant.url))?;
    Ok(ChunkStore::new(Arc::new(qdrant), config.qdrant.collection.clone()))
}

fn build_indexer(config: &Config) -> anyhow::Result<CodeIndexer<AnyEmbedder>> {
    let provider = create_embedder(config)?;
    tracing::info!(provider = provider.name(), "embedding provider ready");
    Ok(CodeIndexer::new(
        create_store(config)?,
        Arc::new(provider),
        config.indexer_config(),
    ))
}

fn build_retriever(config: &Config) -> anyhow::Result<CodeRetriever<AnyEmbedder>> {
    let store = create_store(config)?;
    let engine = ExpansionEngine::new(
        store.clone(),
        Arc::new(config.rulebook()),
        config.expansion_config(),
    );
    Ok(CodeRetriever::new(
        store,
        Arc::new(create_embedder(config)?),
        engine,
        config.retrieval_config(),
    ))
}
