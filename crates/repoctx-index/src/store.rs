//! Chunk-level adapter over a [`VectorStore`] collection.

use std::collections::BTreeSet;
use std::sync::Arc;

use repoctx_store::{
    FieldCondition, PayloadPoint, ScrollRequest, VectorFilter, VectorPoint, VectorStore,
};

use crate::chunk::{Chunk, ChunkMeta, ConcreteType, META_FIELDS};
use crate::error::Result;

pub const DEFAULT_COLLECTION: &str = "repoctx_chunks";

/// Payload fields that get a keyword index so scans stay filter-bound.
const INDEXED_FIELDS: &[&str] = &["repo_url", "file_path", "chunk_type"];

/// A search result with its decoded chunk.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Chunk store backed by one vector collection.
#[derive(Clone)]
pub struct ChunkStore {
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl std::fmt::Debug for ChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStore")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl ChunkStore {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection and its keyword indexes if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector store operation fails.
    pub async fn ensure_collection(&self, vector_size: u64) -> Result<()> {
        if self.store.collection_exists(&self.collection).await? {
            return Ok(());
        }
        self.store
            .ensure_collection(&self.collection, vector_size)
            .await?;
        for field in INDEXED_FIELDS {
            self.store
                .create_keyword_index(&self.collection, field)
                .await?;
        }
        tracing::info!(collection = %self.collection, vector_size, "collection created");
        Ok(())
    }

    /// Remove every chunk of `repo_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector store operation fails.
    pub async fn clear_repo(&self, repo_url: &str) -> Result<()> {
        self.delete_where(vec![FieldCondition::text("repo_url", repo_url)])
            .await
    }

    /// Remove every chunk of one file of `repo_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector store operation fails.
    pub async fn clear_file(&self, repo_url: &str, file_path: &str) -> Result<()> {
        self.delete_where(vec![
            FieldCondition::text("repo_url", repo_url),
            FieldCondition::text("file_path", file_path),
        ])
        .await
    }

    async fn delete_where(&self, conditions: Vec<FieldCondition>) -> Result<()> {
        if !self.store.collection_exists(&self.collection).await? {
            return Ok(());
        }
        self.store
            .delete_by_filter(&self.collection, VectorFilter::must(conditions))
            .await?;
        Ok(())
    }

    /// Upsert chunks with their embeddings. Idempotent by chunk id.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector store operation fails.
    pub async fn upsert(&self, chunks: Vec<(Chunk, Vec<f32>)>) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let points = chunks
            .into_iter()
            .map(|(chunk, vector)| VectorPoint {
                payload: chunk.to_payload(),
                id: chunk.id,
                vector,
            })
            .collect();
        self.store.upsert(&self.collection, points).await?;
        Ok(())
    }

    /// Nearest chunks to `vector`, optionally restricted to one repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector store operation fails.
    pub async fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        repo_url: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let filter = repo_url.map(|url| VectorFilter::must(vec![FieldCondition::text("repo_url", url)]));
        let hits = self
            .store
            .search(&self.collection, vector, u64::try_from(limit)?, filter)
            .await?;

        Ok(hits
            .into_iter()
            .filter_map(|hit| match Chunk::from_payload(hit.id, &hit.payload) {
                Ok(chunk) => Some(ScoredChunk {
                    chunk,
                    score: hit.score,
                }),
                Err(e) => {
                    tracing::warn!("skipping search hit: {e}");
                    None
                }
            })
            .collect())
    }

    /// Full chunks for `ids`. Unknown or malformed ids are dropped; order follows the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector store operation fails.
    pub async fn fetch(&self, ids: Vec<String>) -> Result<Vec<Chunk>> {
        let ids = chunk_ids(ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let points = self.store.get_by_ids(&self.collection, ids, None).await?;
        Ok(points
            .into_iter()
            .filter_map(|p| match Chunk::from_payload(p.id, &p.payload) {
                Ok(chunk) => Some(chunk),
                Err(e) => {
                    tracing::warn!("dropping unreadable chunk: {e}");
                    None
                }
            })
            .collect())
    }

    /// Ranking projection for `ids`. Unknown or malformed ids are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector store operation fails.
    pub async fn fetch_meta(&self, ids: Vec<String>) -> Result<Vec<ChunkMeta>> {
        let ids = chunk_ids(ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let points = self
            .store
            .get_by_ids(&self.collection, ids, Some(meta_projection()))
            .await?;
        Ok(points.into_iter().map(point_meta).collect())
    }

    /// Start a capped, paginated scan of ranking projections matching `filter`.
    #[must_use]
    pub fn scan_meta(&self, filter: VectorFilter, page_size: usize, cap: usize) -> MetaScan<'_> {
        MetaScan {
            store: self,
            filter,
            page_size: page_size.max(1),
            remaining: cap,
            offset: None,
            exhausted: false,
            scanned: 0,
        }
    }
}

/// Keep only ids that can name a stored chunk (UUIDs).
fn chunk_ids(ids: Vec<String>) -> Vec<String> {
    ids.into_iter()
        .filter(|id| {
            let valid = uuid::Uuid::parse_str(id).is_ok();
            if !valid {
                tracing::debug!(id = %id, "ignoring malformed chunk id");
            }
            valid
        })
        .collect()
}

fn meta_projection() -> Vec<String> {
    META_FIELDS.iter().map(|f| (*f).to_owned()).collect()
}

fn point_meta(point: PayloadPoint) -> ChunkMeta {
    ChunkMeta::from_payload(point.id, &point.payload)
}

/// Filter selecting chunks in `files` of the given repositories, optionally
/// limited to `types`. An empty `types` set applies no type restriction.
#[must_use]
pub fn same_file_filter(
    repos: &BTreeSet<String>,
    files: &BTreeSet<String>,
    types: &BTreeSet<ConcreteType>,
) -> VectorFilter {
    let mut must = vec![
        FieldCondition::any_text("repo_url", repos.iter().cloned().collect()),
        FieldCondition::any_text("file_path", files.iter().cloned().collect()),
    ];
    if !types.is_empty() {
        must.push(FieldCondition::any_text(
            "chunk_type",
            types.iter().map(|t| t.as_str().to_owned()).collect(),
        ));
    }
    VectorFilter::must(must)
}

/// Page-by-page scan that never yields more than its cap in total.
pub struct MetaScan<'a> {
    store: &'a ChunkStore,
    filter: VectorFilter,
    page_size: usize,
    remaining: usize,
    offset: Option<String>,
    exhausted: bool,
    scanned: usize,
}

impl MetaScan<'_> {
    /// Next page, or `None` once the matches or the cap are exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector store operation fails.
    pub async fn next_page(&mut self) -> Result<Option<Vec<ChunkMeta>>> {
        if self.exhausted || self.remaining == 0 {
            return Ok(None);
        }
        let page_size = self.page_size.min(self.remaining);
        let request = ScrollRequest {
            filter: self.filter.clone(),
            projection: Some(meta_projection()),
            page_size: u32::try_from(page_size)?,
            offset: self.offset.take(),
        };
        let mut page = self
            .store
            .store
            .scroll(&self.store.collection, request)
            .await?;

        page.points.truncate(self.remaining);
        self.remaining -= page.points.len();
        self.scanned += page.points.len();
        self.offset = page.next_offset;
        if self.offset.is_none() || page.points.is_empty() {
            self.exhausted = true;
        }
        if page.points.is_empty() {
            return Ok(None);
        }
        Ok(Some(page.points.into_iter().map(point_meta).collect()))
    }

    /// Points yielded so far.
    #[must_use]
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    /// Whether the scan stopped because of the cap while more matches may remain.
    #[must_use]
    pub fn hit_cap(&self) -> bool {
        self.remaining == 0 && !self.exhausted
    }
}
