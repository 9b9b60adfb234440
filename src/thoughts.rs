//! Thought persistence and the session-scoped query surface

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::session_lock::SessionLocks;
use crate::types::{Thought, ThoughtKind, ThoughtSearchResult};
use crate::vector_store::{Filter, PointRecord, VectorStore};
use crate::EngineConfig;

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Page size used when scrolling a whole session out of the backend
const SCROLL_PAGE: usize = 256;

/// Cap on `get_chained_thoughts` traversal; parent links are logically
/// unbounded so the walk needs a hard stop.
const MAX_CHAIN_WALK: usize = 64;

/// Store for thoughts, scoped by session.
///
/// Reads are lenient: a missing or unavailable backing collection degrades
/// to an empty result instead of an error, so an empty answer means
/// "currently unavailable or truly empty", never proof of absence.
pub struct ThoughtStore {
    backend: Arc<dyn VectorStore>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    config: EngineConfig,
    locks: SessionLocks,
    skipped_payloads: AtomicU64,
}

impl std::fmt::Debug for ThoughtStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThoughtStore")
            .field("collection", &self.config.thoughts_collection)
            .finish()
    }
}

impl ThoughtStore {
    pub fn new(
        backend: Arc<dyn VectorStore>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            backend,
            embedder,
            config,
            locks: SessionLocks::new(),
            skipped_payloads: AtomicU64::new(0),
        })
    }

    /// The dimension this store writes at: the embedder's if configured,
    /// otherwise the configured default.
    pub fn write_dimension(&self) -> usize {
        self.embedder
            .as_ref()
            .map(|e| e.dimension())
            .unwrap_or(self.config.dimension)
    }

    /// Stored points whose payload failed to parse and were skipped from
    /// query results since this store was created.
    pub fn skipped_payload_count(&self) -> u64 {
        self.skipped_payloads.load(Ordering::Relaxed)
    }

    /// Save a single thought (upsert-by-id, so retries are idempotent)
    pub async fn save_thought(&self, thought: &Thought) -> Result<()> {
        let _guard = self.locks.acquire(&thought.session_id).await;
        self.ensure_thoughts_collection().await?;
        let point = self.to_point(thought).await?;
        self.backend
            .upsert(&self.config.thoughts_collection, vec![point])
            .await?;
        tracing::debug!(
            session = %thought.session_id,
            thought = %thought.id,
            "saved thought"
        );
        Ok(())
    }

    /// Save a batch of thoughts for one session.
    ///
    /// Chunks are applied sequentially so the backend sees duplicate ids in
    /// write order within one logical save.
    pub async fn save_thoughts(&self, session_id: &str, thoughts: &[Thought]) -> Result<()> {
        if thoughts.is_empty() {
            return Ok(());
        }

        let _guard = self.locks.acquire(session_id).await;
        self.ensure_thoughts_collection().await?;

        for chunk in thoughts.chunks(self.config.batch_size) {
            let mut points = Vec::with_capacity(chunk.len());
            let vectors = self.embed_contents(chunk).await?;
            for (i, thought) in chunk.iter().enumerate() {
                points.push(PointRecord {
                    id: thought.id.to_string(),
                    vector: vectors.as_ref().and_then(|v| v.get(i).cloned()),
                    payload: thought.to_payload(),
                });
            }
            self.backend
                .upsert(&self.config.thoughts_collection, points)
                .await?;
        }

        tracing::debug!(session = %session_id, count = thoughts.len(), "saved thought batch");
        Ok(())
    }

    /// All thoughts for a session, ascending by timestamp
    pub async fn get_thoughts(&self, session_id: &str) -> Result<Vec<Thought>> {
        let filter = Filter::new().must_match("session_id", session_id);
        let mut thoughts = self.read_thoughts(filter).await;
        thoughts.sort_by_key(|t| t.timestamp);
        Ok(thoughts)
    }

    /// Thoughts within a closed time range, ascending by timestamp
    pub async fn get_thoughts_in_range(
        &self,
        session_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Thought>> {
        let mut thoughts = self.get_thoughts(session_id).await?;
        thoughts.retain(|t| t.timestamp >= from && t.timestamp <= to);
        Ok(thoughts)
    }

    /// Thoughts of one kind, ascending by timestamp
    pub async fn get_thoughts_by_kind(
        &self,
        session_id: &str,
        kind: &ThoughtKind,
    ) -> Result<Vec<Thought>> {
        let filter = Filter::new()
            .must_match("session_id", session_id)
            .must_match("type", kind.as_str());
        let mut thoughts = self.read_thoughts(filter).await;
        thoughts.sort_by_key(|t| t.timestamp);
        Ok(thoughts)
    }

    /// The most recent thoughts, newest first
    pub async fn get_recent_thoughts(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Thought>> {
        let mut thoughts = self.get_thoughts(session_id).await?;
        thoughts.reverse();
        thoughts.truncate(limit);
        Ok(thoughts)
    }

    /// Semantic search scoped to a session.
    ///
    /// With an embedding provider this is nearest-neighbor search; without
    /// one it falls back to a case-insensitive substring scan over content.
    pub async fn search_thoughts(
        &self,
        session_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ThoughtSearchResult>> {
        match &self.embedder {
            Some(embedder) => {
                let vectors = embedder.embed(std::slice::from_ref(&query.to_string())).await?;
                let vector = match vectors.first() {
                    Some(v) => v.clone(),
                    None => return Ok(Vec::new()),
                };

                let filter = Filter::new().must_match("session_id", session_id);
                let hits = match self
                    .backend
                    .search(&self.config.thoughts_collection, &vector, &filter, limit, None)
                    .await
                {
                    Ok(hits) => hits,
                    Err(e) => {
                        tracing::warn!(error = %e, "search degraded to empty result");
                        return Ok(Vec::new());
                    }
                };

                let mut results = Vec::new();
                for hit in hits {
                    if let Some(thought) = self.decode(&hit.payload) {
                        results.push(ThoughtSearchResult {
                            thought,
                            score: hit.score,
                            rank: results.len() + 1,
                        });
                    }
                }
                Ok(results)
            }
            None => self.search_text_fallback(session_id, query, limit).await,
        }
    }

    /// Walk `parent_thought_id` child links from a starting thought.
    ///
    /// This is the lightweight reasoning tree, distinct from the relation
    /// graph. The walk is iterative with a visited set and a depth cap, so
    /// malformed parent cycles cannot hang it. Returns the start thought
    /// followed by its descendants in traversal order; an unknown start id
    /// yields an empty vec.
    pub async fn get_chained_thoughts(
        &self,
        session_id: &str,
        parent_id: Uuid,
    ) -> Result<Vec<Thought>> {
        let thoughts = self.get_thoughts(session_id).await?;

        let root = match thoughts.iter().find(|t| t.id == parent_id) {
            Some(root) => root.clone(),
            None => return Ok(Vec::new()),
        };

        let mut children: std::collections::HashMap<Uuid, Vec<&Thought>> =
            std::collections::HashMap::new();
        for thought in &thoughts {
            if let Some(parent) = thought.parent_thought_id {
                children.entry(parent).or_default().push(thought);
            }
        }

        let mut chain = vec![root];
        let mut visited: std::collections::HashSet<Uuid> =
            std::collections::HashSet::from([parent_id]);
        let mut stack: Vec<&Thought> = children
            .get(&parent_id)
            .map(|c| c.iter().rev().copied().collect())
            .unwrap_or_default();

        while let Some(thought) = stack.pop() {
            if chain.len() >= MAX_CHAIN_WALK || !visited.insert(thought.id) {
                continue;
            }
            chain.push(thought.clone());
            if let Some(next) = children.get(&thought.id) {
                stack.extend(next.iter().rev().copied());
            }
        }

        Ok(chain)
    }

    /// Delete everything a session wrote: thoughts, relations and results
    pub async fn clear_session(&self, session_id: &str) -> Result<()> {
        let _guard = self.locks.acquire(session_id).await;

        let filter = Filter::new().must_match("session_id", session_id);
        let collections = [
            &self.config.thoughts_collection,
            &self.config.relations_collection,
            &self.config.results_collection,
        ];

        for collection in collections {
            if self.backend.collection_exists(collection).await? {
                self.backend.delete_by_filter(collection, &filter).await?;
            }
        }

        tracing::info!(session = %session_id, "cleared session");
        Ok(())
    }

    // ─── internals ────────────────────────────────────────────────────────

    async fn ensure_thoughts_collection(&self) -> Result<()> {
        ensure_collection(
            self.backend.as_ref(),
            &self.config.thoughts_collection,
            self.write_dimension(),
            self.config.distance,
        )
        .await
    }

    async fn to_point(&self, thought: &Thought) -> Result<PointRecord> {
        let vector = self
            .embed_contents(std::slice::from_ref(thought))
            .await?
            .and_then(|v| v.into_iter().next());
        Ok(PointRecord {
            id: thought.id.to_string(),
            vector,
            payload: thought.to_payload(),
        })
    }

    async fn embed_contents(&self, thoughts: &[Thought]) -> Result<Option<Vec<Vec<f32>>>> {
        match &self.embedder {
            Some(embedder) => {
                let texts: Vec<String> = thoughts.iter().map(|t| t.content.clone()).collect();
                Ok(Some(embedder.embed(&texts).await?))
            }
            None => Ok(None),
        }
    }

    /// Scroll every matching point out of the thoughts collection, skipping
    /// unparseable payloads. Backend failures degrade to an empty vec.
    async fn read_thoughts(&self, filter: Filter) -> Vec<Thought> {
        let mut thoughts = Vec::new();
        let mut cursor = None;

        loop {
            let page = match self
                .backend
                .scroll(&self.config.thoughts_collection, &filter, SCROLL_PAGE, cursor)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(error = %e, "thought read degraded to empty result");
                    return Vec::new();
                }
            };

            for point in &page.points {
                if let Some(thought) = self.decode(&point.payload) {
                    thoughts.push(thought);
                }
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        thoughts
    }

    fn decode(&self, payload: &serde_json::Value) -> Option<Thought> {
        match Thought::from_payload(payload) {
            Ok(thought) => Some(thought),
            Err(e) => {
                self.skipped_payloads.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "skipping unparseable thought payload");
                None
            }
        }
    }

    async fn search_text_fallback(
        &self,
        session_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ThoughtSearchResult>> {
        let needle = query.to_lowercase();
        let mut matches: Vec<Thought> = self
            .get_thoughts(session_id)
            .await?
            .into_iter()
            .filter(|t| t.content.to_lowercase().contains(&needle))
            .collect();

        matches.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);

        Ok(matches
            .into_iter()
            .enumerate()
            .map(|(i, thought)| ThoughtSearchResult {
                score: thought.relevance,
                thought,
                rank: i + 1,
            })
            .collect())
    }
}

/// Create a collection if it does not exist yet, tolerating creation races.
pub(crate) async fn ensure_collection(
    backend: &dyn VectorStore,
    name: &str,
    dimension: usize,
    distance: crate::types::Distance,
) -> Result<()> {
    if backend.collection_exists(name).await? {
        return Ok(());
    }
    match backend.create_collection(name, dimension, distance).await {
        Ok(()) => {
            tracing::info!(collection = %name, dimension, "created collection");
            Ok(())
        }
        // Another writer may have created it between the check and the call.
        Err(e) => {
            if backend.collection_exists(name).await? {
                Ok(())
            } else {
                Err(e)
            }
        }
    }
}
