//! Repository ingestion: walk → extract → embed → store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use repoctx_embed::{EmbedProvider, embed_with_timeout};
use serde::Serialize;
use tracing::Instrument;

use crate::chunk::Chunk;
use crate::context::contextualize_for_embedding;
use crate::error::Result;
use crate::extract::{ChunkingConfig, ExtractorRegistry};
use crate::store::ChunkStore;

/// Indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub chunking: ChunkingConfig,
    /// File extensions (without dot) that are ingested.
    pub allowed_extensions: Vec<String>,
    /// Directory names never descended into.
    pub ignore_dirs: Vec<String>,
    /// Files processed at the same time.
    pub concurrency: usize,
    /// Upper bound on one embedding call.
    pub embed_timeout: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            allowed_extensions: ["md", "txt", "py", "js", "html"]
                .map(str::to_owned)
                .to_vec(),
            ignore_dirs: [".git", "__pycache__", "node_modules", "venv"]
                .map(str::to_owned)
                .to_vec(),
            concurrency: 4,
            embed_timeout: Duration::from_secs(30),
        }
    }
}

/// Summary of an indexing run.
#[derive(Debug, Default, Serialize)]
pub struct IndexReport {
    pub files_scanned: usize,
    pub files_indexed: usize,
    pub chunks_created: usize,
    pub chunks_skipped: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct FileOutcome {
    created: usize,
    skipped: usize,
}

/// Orchestrates ingestion of repository snapshots.
pub struct CodeIndexer<P: EmbedProvider> {
    store: ChunkStore,
    provider: Arc<P>,
    registry: ExtractorRegistry,
    config: IndexerConfig,
}

impl<P: EmbedProvider> CodeIndexer<P> {
    #[must_use]
    pub fn new(store: ChunkStore, provider: Arc<P>, config: IndexerConfig) -> Self {
        Self {
            registry: ExtractorRegistry::new(config.chunking),
            store,
            provider,
            config,
        }
    }

    /// Replace the index of `repo_url` with the contents of `root`.
    ///
    /// Every prior chunk of `repo_url` is deleted first; chunk ids are not stable
    /// across runs. Per-file and per-chunk failures are recorded in the report.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding probe, collection setup or repository
    /// cleanup fails.
    pub async fn index_repository(&self, root: &Path, repo_url: &str) -> Result<IndexReport> {
        let start = Instant::now();
        let mut report = IndexReport::default();

        self.prepare_collection().await?;
        self.store.clear_repo(repo_url).await?;

        let files = self.collect_files(root);
        report.files_scanned = files.len();
        tracing::info!(total = files.len(), repo = repo_url, "indexing started");

        let total = files.len();
        let tasks = files.iter().enumerate().map(|(i, path)| {
            let rel_path = relative_path(root, path);
            let span = tracing::info_span!("index_file", file = %rel_path);
            async move {
                let outcome = self.index_file(path, &rel_path, repo_url).await;
                if let Ok(outcome) = &outcome {
                    tracing::info!(
                        progress = format_args!("{}/{total}", i + 1),
                        created = outcome.created,
                        skipped = outcome.skipped,
                    );
                }
                (rel_path, outcome)
            }
            .instrument(span)
        });
        let results: Vec<_> = futures::stream::iter(tasks)
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        for (rel_path, outcome) in results {
            match outcome {
                Ok(outcome) => {
                    if outcome.created > 0 {
                        report.files_indexed += 1;
                    }
                    report.chunks_created += outcome.created;
                    report.chunks_skipped += outcome.skipped;
                }
                Err(e) => {
                    tracing::warn!(file = %rel_path, "file not indexed: {e}");
                    report.errors.push(format!("{rel_path}: {e}"));
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            files = report.files_indexed,
            chunks = report.chunks_created,
            skipped = report.chunks_skipped,
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "indexing finished"
        );
        Ok(report)
    }

    /// Re-extract one file (for the watcher). A deleted or no longer eligible
    /// file only has its chunks removed.
    ///
    /// # Errors
    ///
    /// Returns an error if reading, embedding setup or the store fails.
    pub async fn reindex_file(&self, root: &Path, abs_path: &Path, repo_url: &str) -> Result<usize> {
        let rel_path = relative_path(root, abs_path);
        self.prepare_collection().await?;
        self.store.clear_file(repo_url, &rel_path).await?;

        if !abs_path.is_file() || !self.is_indexable(root, abs_path) {
            tracing::debug!(file = %rel_path, "removed from index");
            return Ok(0);
        }
        let outcome = self.index_file(abs_path, &rel_path, repo_url).await?;
        Ok(outcome.created)
    }

    async fn prepare_collection(&self) -> Result<()> {
        let probe =
            embed_with_timeout(self.provider.as_ref(), "probe", self.config.embed_timeout).await?;
        let vector_size = u64::try_from(probe.len())?;
        self.store.ensure_collection(vector_size).await
    }

    async fn index_file(&self, abs_path: &Path, rel_path: &str, repo_url: &str) -> Result<FileOutcome> {
        let bytes = tokio::fs::read(abs_path).await?;
        let source = String::from_utf8_lossy(&bytes);
        let drafts = self.registry.extract(abs_path, &source);

        let mut outcome = FileOutcome::default();
        let mut batch = Vec::with_capacity(drafts.len());

        for (n, draft) in drafts.into_iter().enumerate() {
            let chunk_number = u32::try_from(n)?;
            let id = uuid::Uuid::new_v4().to_string();
            let chunk = Chunk::from_draft(draft, id, repo_url, rel_path, chunk_number);
            let text = contextualize_for_embedding(&chunk);

            match embed_with_timeout(self.provider.as_ref(), &text, self.config.embed_timeout).await {
                Ok(vector) => batch.push((chunk, vector)),
                Err(e) => {
                    tracing::warn!(chunk_number, "skipping chunk: {e}");
                    outcome.skipped += 1;
                }
            }
        }

        outcome.created = batch.len();
        self.store.upsert(batch).await?;
        tracing::debug!("{rel_path}: {} chunks indexed", outcome.created);
        Ok(outcome)
    }

    fn collect_files(&self, root: &Path) -> Vec<PathBuf> {
        let ignore_dirs = self.config.ignore_dirs.clone();
        let mut files: Vec<PathBuf> = ignore::WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .filter_entry(move |e| {
                let is_dir = e.file_type().is_some_and(|ft| ft.is_dir());
                !(is_dir
                    && e
                        .file_name()
                        .to_str()
                        .is_some_and(|name| ignore_dirs.iter().any(|d| d == name)))
            })
            .build()
            .flatten()
            .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()) && self.is_allowed(e.path()))
            .map(ignore::DirEntry::into_path)
            .collect();
        files.sort();
        files
    }

    /// Whether `path` under `root` would be picked up by an ingest.
    #[must_use]
    pub fn is_indexable(&self, root: &Path, path: &Path) -> bool {
        self.is_allowed(path) && !self.in_ignored_dir(root, path)
    }

    fn is_allowed(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.config
                    .allowed_extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }

    fn in_ignored_dir(&self, root: &Path, path: &Path) -> bool {
        path.strip_prefix(root)
            .unwrap_or(path)
            .components()
            .any(|c| {
                c.as_os_str()
                    .to_str()
                    .is_some_and(|name| self.config.ignore_dirs.iter().any(|d| d == name))
            })
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
