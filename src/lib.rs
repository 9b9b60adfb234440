//! # Noema - Thought-Graph Memory Engine for AI Agents
//!
//! Persists atomic units of reasoning ("thoughts") with typed relations
//! between them on top of a remote vector-search backend, infers relations
//! for new thoughts, reconstructs causal reasoning traces, and keeps the
//! backing collections dimensionally consistent behind named cognitive
//! memory layers.

pub mod admin;
pub mod causal;
pub mod embedding;
pub mod error;
pub mod inference;
pub mod layers;
pub mod relations;
pub mod session_lock;
pub mod thoughts;
pub mod types;
pub mod vector_store;

pub use admin::{CollectionAdmin, HealReport, HealthEntry, HealthReport};
pub use causal::{CausalChain, CausalChainFinder, ChainStats};
pub use embedding::{EmbeddingProvider, HashEmbeddingProvider, DEFAULT_DIMENSION};
pub use error::{MemoryError, Result};
pub use inference::RelationInferenceEngine;
pub use layers::{MemoryLayerManager, MemorySnapshot, SystemStats};
pub use relations::{RelationGraph, ResultStore};
pub use session_lock::SessionLocks;
pub use thoughts::ThoughtStore;
pub use types::{
    parse_point_id, CollectionInfo, CollectionLink, CollectionLinkKind, CollectionStatus,
    Distance, MemoryLayer, MemoryLayerMapping, Relation, RelationKind, ResultKind, SessionId,
    Thought, ThoughtKind, ThoughtOrigin, ThoughtResult, ThoughtSearchResult,
};
pub use vector_store::{
    CollectionMeta, Filter, InMemoryVectorStore, PointRecord, ScrollPage, SearchHit, VectorStore,
};

#[cfg(feature = "qdrant")]
pub use vector_store::qdrant::QdrantStore;

use std::sync::Arc;

/// Engine-wide configuration: collection names, vector geometry, and the
/// knobs of the inference heuristic.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub thoughts_collection: String,
    pub relations_collection: String,
    pub results_collection: String,
    /// Vector dimension used when no embedding provider dictates one
    pub dimension: usize,
    pub distance: Distance,
    /// Chunk size for batch saves
    pub batch_size: usize,
    /// How many recent thoughts relation inference compares against
    pub recent_window: usize,
    /// Cosine similarity a pair must clear before a relation is inferred
    pub similarity_threshold: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thoughts_collection: "agent_thoughts".into(),
            relations_collection: "thought_relations".into(),
            results_collection: "thought_results".into(),
            dimension: embedding::DEFAULT_DIMENSION,
            distance: Distance::Cosine,
            batch_size: 100,
            recent_window: 10,
            similarity_threshold: 0.7,
        }
    }
}

/// Main entry point bundling the stores, the inference engine, the chain
/// finder and the administrative layers over one shared backend.
#[derive(Clone)]
pub struct MemoryEngine {
    config: EngineConfig,
    thoughts: Arc<ThoughtStore>,
    relations: Arc<RelationGraph>,
    results: Arc<ResultStore>,
    inference: Arc<RelationInferenceEngine>,
    causal: Arc<CausalChainFinder>,
    admin: Arc<CollectionAdmin>,
    layers: Arc<MemoryLayerManager>,
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("thoughts", &self.config.thoughts_collection)
            .finish()
    }
}

impl MemoryEngine {
    /// Build an engine over a backend, optionally with an embedding
    /// provider. Without one, search degrades to substring matching and
    /// relation inference is a no-op.
    pub fn new(
        backend: Arc<dyn VectorStore>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        config: EngineConfig,
    ) -> Self {
        let thoughts = ThoughtStore::new(backend.clone(), embedder.clone(), config.clone());
        let relations = RelationGraph::new(backend.clone(), config.clone());
        let results = ResultStore::new(backend.clone(), relations.clone(), config.clone());
        let inference = Arc::new(RelationInferenceEngine::new(
            thoughts.clone(),
            relations.clone(),
            embedder,
            config.clone(),
        ));
        let causal = Arc::new(CausalChainFinder::new(relations.clone(), thoughts.clone()));
        let admin = CollectionAdmin::new(backend, config.clone());
        let layers = Arc::new(MemoryLayerManager::new(admin.clone(), config.clone()));

        Self {
            config,
            thoughts,
            relations,
            results,
            inference,
            causal,
            admin,
            layers,
        }
    }

    /// Zero-config engine: in-memory backend plus the hash embedder.
    /// Intended for tests, demos and local development.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryVectorStore::new()),
            Some(Arc::new(HashEmbeddingProvider::default())),
            EngineConfig::default(),
        )
    }

    /// Ensure every layer-mapped collection exists
    pub async fn initialize(&self) -> Result<()> {
        self.layers.initialize().await
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn thoughts(&self) -> &ThoughtStore {
        &self.thoughts
    }

    pub fn relations(&self) -> &RelationGraph {
        &self.relations
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn admin(&self) -> &CollectionAdmin {
        &self.admin
    }

    pub fn layers(&self) -> &MemoryLayerManager {
        &self.layers
    }

    /// Save a thought and infer relations to recent thoughts in its session
    pub async fn remember(&self, thought: &Thought) -> Result<Vec<Relation>> {
        self.inference.save_with_relations(thought).await
    }

    /// Record an outcome for a thought (writes the implicit relation too)
    pub async fn record_result(&self, result: &ThoughtResult) -> Result<()> {
        self.results.save_result(result).await
    }

    /// Semantic recall scoped to a session
    pub async fn recall(
        &self,
        session_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ThoughtSearchResult>> {
        self.thoughts.search_thoughts(session_id, query, limit).await
    }

    /// Reconstruct reasoning traces starting from a thought
    pub async fn explain(
        &self,
        session_id: &str,
        start: uuid::Uuid,
        max_depth: usize,
    ) -> Result<Vec<CausalChain>> {
        self.causal.find_causal_chains(session_id, start, max_depth).await
    }

    /// Point-in-time aggregate of collections, links and layer statistics
    pub async fn snapshot(&self) -> Result<MemorySnapshot> {
        self.layers.create_snapshot().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parent_child_scenario_infers_refines() {
        let engine = MemoryEngine::in_memory();

        let t1 = Thought::new("s1", ThoughtKind::Observation, "user asked for weather");
        engine.remember(&t1).await.unwrap();

        let t2 = Thought::new("s1", ThoughtKind::Analytical, "user wants forecast")
            .with_parent(t1.id);
        let created = engine.remember(&t2).await.unwrap();

        let refines: Vec<_> = created
            .iter()
            .filter(|r| r.kind == RelationKind::Refines)
            .collect();
        assert_eq!(refines.len(), 1);
        assert_eq!(refines[0].source_thought_id, t1.id);
        assert_eq!(refines[0].target_thought_id, t2.id);
    }

    #[tokio::test]
    async fn full_flow_remember_recall_explain() {
        let engine = MemoryEngine::in_memory();
        engine.initialize().await.unwrap();

        let observation = Thought::new(
            "s1",
            ThoughtKind::Observation,
            "deploy pipeline failed on the migration step",
        );
        engine.remember(&observation).await.unwrap();

        let analysis = Thought::new(
            "s1",
            ThoughtKind::Analytical,
            "deploy pipeline failed because the migration step timed out",
        );
        engine.remember(&analysis).await.unwrap();

        let recalled = engine.recall("s1", "deploy pipeline failed", 5).await.unwrap();
        assert!(!recalled.is_empty());

        let chains = engine.explain("s1", observation.id, 5).await.unwrap();
        assert!(chains.iter().any(|c| c.thought_ids.contains(&analysis.id)));

        let result = ThoughtResult::new(
            "s1",
            analysis.id,
            ResultKind::Action,
            "raised the migration timeout",
            true,
        );
        engine.record_result(&result).await.unwrap();

        let snapshot = engine.snapshot().await.unwrap();
        assert!(snapshot.stats.total_vectors >= 3);
    }

    #[tokio::test]
    async fn snapshot_on_fresh_engine_counts_layer_collections() {
        let engine = MemoryEngine::in_memory();
        engine.initialize().await.unwrap();

        let snapshot = engine.snapshot().await.unwrap();
        assert_eq!(snapshot.layer_counts.len(), 5);
        assert!(snapshot.stats.collection_count >= 8);
        assert_eq!(snapshot.stats.total_vectors, 0);
    }
}
