use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify_debouncer_mini::{DebounceEventResult, DebouncedEventKind, new_debouncer};
use repoctx_embed::EmbedProvider;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::indexer::CodeIndexer;

/// Keeps one repository checkout's chunks in sync with its files.
///
/// Dropping the watcher stops the filesystem subscription and the reindex task.
pub struct IndexWatcher {
    handle: tokio::task::JoinHandle<()>,
}

impl IndexWatcher {
    /// # Errors
    ///
    /// Returns an error if the filesystem watcher cannot be initialized.
    pub fn start<P: EmbedProvider + 'static>(
        root: &Path,
        repo_url: impl Into<String>,
        indexer: Arc<CodeIndexer<P>>,
        debounce: Duration,
    ) -> Result<Self> {
        let (notify_tx, mut notify_rx) = mpsc::channel::<PathBuf>(64);

        let filter_root = root.to_path_buf();
        let filter_indexer = Arc::clone(&indexer);
        let mut debouncer = new_debouncer(debounce, move |events: DebounceEventResult| {
            let events = match events {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!("index watcher error: {e}");
                    return;
                }
            };

            let paths: HashSet<PathBuf> = events
                .into_iter()
                .filter(|e| {
                    e.kind == DebouncedEventKind::Any
                        && filter_indexer.is_indexable(&filter_root, &e.path)
                })
                .map(|e| e.path)
                .collect();

            for path in paths {
                let _ = notify_tx.blocking_send(path);
            }
        })?;

        debouncer
            .watcher()
            .watch(root, notify::RecursiveMode::Recursive)?;

        let root = root.to_path_buf();
        let repo_url = repo_url.into();
        let handle = tokio::spawn(async move {
            let _debouncer = debouncer;
            while let Some(path) = notify_rx.recv().await {
                match indexer.reindex_file(&root, &path, &repo_url).await {
                    Ok(created) => {
                        tracing::info!(path = %path.display(), created, "reindexed");
                    }
                    Err(e) => tracing::warn!(path = %path.display(), "reindex failed: {e}"),
                }
            }
        });

        Ok(Self { handle })
    }
}

impl Drop for IndexWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use repoctx_embed::mock::MockEmbedder;
    use repoctx_store::InMemoryVectorStore;

    use super::*;
    use crate::indexer::IndexerConfig;
    use crate::store::ChunkStore;

    fn test_indexer() -> (Arc<CodeIndexer<MockEmbedder>>, Arc<InMemoryVectorStore>) {
        let backend = Arc::new(InMemoryVectorStore::new());
        let store = ChunkStore::new(backend.clone(), "chunks");
        (
            Arc::new(CodeIndexer::new(
                store,
                Arc::new(MockEmbedder::default()),
                IndexerConfig::default(),
            )),
            backend,
        )
    }

    #[tokio::test]
    async fn start_with_valid_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (indexer, _) = test_indexer();
        let watcher = IndexWatcher::start(dir.path(), "r", indexer, Duration::from_millis(50));
        assert!(watcher.is_ok());
    }

    #[tokio::test]
    async fn start_with_nonexistent_directory_fails() {
        let (indexer, _) = test_indexer();
        let result = IndexWatcher::start(
            Path::new("/nonexistent/path/xyz"),
            "r",
            indexer,
            Duration::from_millis(50),
        );
        assert!(matches!(result, Err(crate::IndexError::Watcher(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn new_file_gets_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let (indexer, backend) = test_indexer();
        let _watcher =
            IndexWatcher::start(dir.path(), "r", indexer, Duration::from_millis(50)).unwrap();

        std::fs::write(dir.path().join("new.py"), "def fresh():\n    pass\n").unwrap();

        let mut indexed = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if backend.len("chunks") == 1 {
                indexed = true;
                break;
            }
        }
        assert!(indexed);
    }
}
