//! Expansion ranking: score chunks related to a source set, scan light, hydrate winners.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::chunk::{CanonicalType, Chunk, ChunkMeta, concrete_allow_list};
use crate::error::{ExpansionError, Result};
use crate::rulebook::{Intent, Rulebook, Scope};
use crate::store::{ChunkStore, same_file_filter};

const SAME_FILE: f64 = 2.0;
const CALLED_BY_SOURCE: f64 = 3.0;
const CALLS_SOURCE: f64 = 2.0;
const SAME_CLASS: f64 = 1.5;
const LOCALITY_WINDOW: u64 = 2;
const LOCALITY_STEP: f64 = 0.5;

/// Bounds applied to every expansion.
#[derive(Debug, Clone, Copy)]
pub struct ExpansionConfig {
    /// Hard ceiling on points scanned per expansion (default: 2048).
    pub scan_cap: usize,
    /// Points requested per scan page (default: 256).
    pub page_size: usize,
    /// Minimum ranking pool size (default: 32).
    pub pool_floor: usize,
    /// Pool size as a multiple of `max_chunks` (default: 8).
    pub pool_multiplier: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            scan_cap: 2048,
            page_size: 256,
            pool_floor: 32,
            pool_multiplier: 8,
        }
    }
}

impl ExpansionConfig {
    /// Ranking pool capacity for a request; never below `max_chunks`.
    #[must_use]
    pub fn pool_size(&self, max_chunks: usize) -> usize {
        self.pool_floor
            .max(max_chunks.saturating_mul(self.pool_multiplier))
            .max(max_chunks)
    }
}

/// A caller's request to widen retrieved context around some source chunks.
#[derive(Debug, Clone)]
pub struct ExpansionRequest {
    pub source_ids: Vec<String>,
    pub requested: BTreeSet<CanonicalType>,
    pub scope: Scope,
    pub max_chunks: usize,
    pub intent: Intent,
    /// Restrict candidates to this repository instead of the sources' repositories.
    pub repo_url: Option<String>,
}

/// A hydrated expansion result.
#[derive(Debug, Clone, Serialize)]
pub struct RankedChunk {
    pub chunk: Chunk,
    pub score: f64,
}

/// Outcome of one expansion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Expansion {
    /// Winners in descending score order.
    pub chunks: Vec<RankedChunk>,
    /// Name of the rule that licensed the request.
    pub rule: Option<String>,
    pub scanned: usize,
    /// The scan stopped at the cap with matches left unseen.
    pub truncated: bool,
}

/// Relation score of `candidate` against all `sources`.
///
/// Zero or less means no relation signal.
#[must_use]
pub fn relation_score(
    candidate: &ChunkMeta,
    sources: &[ChunkMeta],
    source_files: &BTreeSet<String>,
) -> f64 {
    let mut score = 0.0;

    if candidate
        .file_path
        .as_ref()
        .is_some_and(|f| source_files.contains(f))
    {
        score += SAME_FILE;
    }

    for source in sources {
        if let Some(identifier) = &candidate.identifier
            && source.uses.contains(identifier)
        {
            score += CALLED_BY_SOURCE;
        }
        if let Some(identifier) = &source.identifier
            && candidate.uses.contains(identifier)
        {
            score += CALLS_SOURCE;
        }
        if candidate.class_name.is_some() && candidate.class_name == source.class_name {
            score += SAME_CLASS;
        }
        if let (Some(a), Some(b)) = (candidate.chunk_number, source.chunk_number) {
            let distance = a.abs_diff(b);
            if distance <= LOCALITY_WINDOW {
                #[allow(clippy::cast_precision_loss)]
                let steps = (LOCALITY_WINDOW - distance) as f64;
                score += steps * LOCALITY_STEP;
            }
        }
    }

    score
}

#[derive(Debug, Clone)]
struct Ranked {
    score: f64,
    seq: usize,
    id: String,
}

impl Ranked {
    /// Greater is better: higher score, then earlier scan position.
    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.rank_cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank_cmp(other)
    }
}

/// Bounded pool keeping the best `capacity` candidates seen so far.
#[derive(Debug)]
struct TopK {
    capacity: usize,
    heap: BinaryHeap<Reverse<Ranked>>,
}

impl TopK {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1)),
        }
    }

    fn offer(&mut self, candidate: Ranked) {
        if self.capacity == 0 {
            return;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(candidate));
            return;
        }
        if let Some(mut worst) = self.heap.peek_mut()
            && candidate > worst.0
        {
            *worst = Reverse(candidate);
        }
    }

    /// Best first.
    fn into_sorted(self) -> Vec<Ranked> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(r)| r)
            .collect()
    }
}

/// Rulebook-gated expansion over a [`ChunkStore`].
#[derive(Debug, Clone)]
pub struct ExpansionEngine {
    store: ChunkStore,
    rulebook: Arc<Rulebook>,
    config: ExpansionConfig,
}

impl ExpansionEngine {
    #[must_use]
    pub fn new(store: ChunkStore, rulebook: Arc<Rulebook>, config: ExpansionConfig) -> Self {
        Self {
            store,
            rulebook,
            config,
        }
    }

    #[must_use]
    pub fn rulebook(&self) -> &Rulebook {
        &self.rulebook
    }

    /// Gate `request` through the rulebook, then rank related chunks.
    ///
    /// # Errors
    ///
    /// Returns [`ExpansionError::Denied`] (wrapped in `IndexError::Expansion`) when no
    /// rule licenses the request; callers must then use no expanded chunks at all.
    /// Store failures propagate.
    pub async fn expand(&self, request: &ExpansionRequest) -> Result<Expansion> {
        if request.source_ids.is_empty() {
            return Ok(Expansion::default());
        }

        let sources = self.store.fetch_meta(request.source_ids.clone()).await?;
        if sources.is_empty() {
            tracing::debug!("no source chunk could be hydrated");
            return Ok(Expansion::default());
        }

        let rule = self
            .rulebook
            .validate(
                request.intent,
                &sources,
                &request.requested,
                request.scope,
                request.max_chunks,
            )
            .map_err(|violation| {
                tracing::warn!("expansion denied: {violation}");
                ExpansionError::Denied(violation)
            })?;
        let rule_name = rule.name.clone();
        tracing::debug!(rule = %rule_name, "expansion allowed");

        if request.max_chunks == 0 {
            return Ok(Expansion {
                rule: Some(rule_name),
                ..Expansion::default()
            });
        }

        let mut expansion = match request.scope {
            Scope::SameFile => self.rank_same_file(request, &sources).await?,
        };
        expansion.rule = Some(rule_name);
        Ok(expansion)
    }

    async fn rank_same_file(
        &self,
        request: &ExpansionRequest,
        sources: &[ChunkMeta],
    ) -> Result<Expansion> {
        let source_files: BTreeSet<String> =
            sources.iter().filter_map(|s| s.file_path.clone()).collect();
        let repos: BTreeSet<String> = match &request.repo_url {
            Some(url) => BTreeSet::from([url.clone()]),
            None => sources.iter().filter_map(|s| s.repo_url.clone()).collect(),
        };
        if source_files.is_empty() || repos.is_empty() {
            return Ok(Expansion::default());
        }

        let allow = concrete_allow_list(&request.requested);
        let filter = same_file_filter(&repos, &source_files, &allow);
        let source_ids: HashSet<&str> = sources.iter().map(|s| s.id.as_str()).collect();

        let mut pool = TopK::new(self.config.pool_size(request.max_chunks));
        let mut scan = self
            .store
            .scan_meta(filter, self.config.page_size, self.config.scan_cap);
        let mut seq = 0usize;
        while let Some(page) = scan.next_page().await? {
            for candidate in page {
                seq += 1;
                if source_ids.contains(candidate.id.as_str()) {
                    continue;
                }
                let score = relation_score(&candidate, sources, &source_files);
                if score <= 0.0 {
                    continue;
                }
                pool.offer(Ranked {
                    score,
                    seq,
                    id: candidate.id,
                });
            }
        }

        let scanned = scan.scanned();
        let truncated = scan.hit_cap();
        if truncated {
            tracing::debug!(scanned, "expansion scan reached its cap");
        }

        let mut winners = pool.into_sorted();
        winners.truncate(request.max_chunks);

        let chunks = self.hydrate(winners).await?;
        tracing::info!(
            sources = sources.len(),
            scanned,
            returned = chunks.len(),
            "expansion ranked"
        );
        Ok(Expansion {
            chunks,
            rule: None,
            scanned,
            truncated,
        })
    }

    /// Fetch full chunks for `winners`, keeping their rank order. Missing ids are dropped.
    async fn hydrate(&self, winners: Vec<Ranked>) -> Result<Vec<RankedChunk>> {
        let ids = winners.iter().map(|w| w.id.clone()).collect();
        let mut by_id: HashMap<String, Chunk> = self
            .store
            .fetch(ids)
            .await?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        Ok(winners
            .into_iter()
            .filter_map(|w| {
                by_id
                    .remove(&w.id)
                    .map(|chunk| RankedChunk {
                        chunk,
                        score: w.score,
                    })
            })
            .collect())
    }
}
