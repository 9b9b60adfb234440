//! Typed relation edges between thoughts, and outcome records

use crate::error::Result;
use crate::thoughts::ensure_collection;
use crate::types::{Relation, RelationKind, ThoughtResult};
use crate::vector_store::{Filter, PointRecord, VectorStore};
use crate::EngineConfig;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

const SCROLL_PAGE: usize = 256;

/// Store for the directed, typed edges of the thought graph.
///
/// Edges are many-to-many, cycles are allowed, and referential integrity to
/// thought ids is best-effort: deleting a thought does not cascade here.
pub struct RelationGraph {
    backend: Arc<dyn VectorStore>,
    config: EngineConfig,
    skipped_payloads: AtomicU64,
}

impl std::fmt::Debug for RelationGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationGraph")
            .field("collection", &self.config.relations_collection)
            .finish()
    }
}

impl RelationGraph {
    pub fn new(backend: Arc<dyn VectorStore>, config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            backend,
            config,
            skipped_payloads: AtomicU64::new(0),
        })
    }

    /// Stored relation points skipped because their payload failed to parse
    pub fn skipped_payload_count(&self) -> u64 {
        self.skipped_payloads.load(Ordering::Relaxed)
    }

    /// Save a relation (upsert-by-id)
    pub async fn save_relation(&self, relation: &Relation) -> Result<()> {
        ensure_collection(
            self.backend.as_ref(),
            &self.config.relations_collection,
            self.config.dimension,
            self.config.distance,
        )
        .await?;

        self.backend
            .upsert(
                &self.config.relations_collection,
                vec![PointRecord {
                    id: relation.id.to_string(),
                    vector: None,
                    payload: relation.to_payload(),
                }],
            )
            .await?;

        tracing::debug!(
            session = %relation.session_id,
            kind = %relation.kind,
            source = %relation.source_thought_id,
            target = %relation.target_thought_id,
            "saved relation"
        );
        Ok(())
    }

    /// All relations for a session, ascending by creation time
    pub async fn get_relations(&self, session_id: &str) -> Result<Vec<Relation>> {
        let filter = Filter::new().must_match("session_id", session_id);
        let mut relations = self.read_relations(filter).await;
        relations.sort_by_key(|r| r.created_at);
        Ok(relations)
    }

    /// Relations where the thought appears as source or target
    pub async fn get_relations_for_thought(
        &self,
        session_id: &str,
        thought_id: Uuid,
    ) -> Result<Vec<Relation>> {
        let id = thought_id.to_string();
        let as_source = Filter::new()
            .must_match("session_id", session_id)
            .must_match("source_thought_id", id.clone());
        let as_target = Filter::new()
            .must_match("session_id", session_id)
            .must_match("target_thought_id", id);

        let mut relations = self.read_relations(as_source).await;
        relations.extend(self.read_relations(as_target).await);

        // A self-edge matches both scrolls.
        let mut seen = std::collections::HashSet::new();
        relations.retain(|r| seen.insert(r.id));
        relations.sort_by_key(|r| r.created_at);
        Ok(relations)
    }

    /// Outgoing edges from a thought
    pub async fn get_outgoing(&self, session_id: &str, source_id: Uuid) -> Result<Vec<Relation>> {
        let filter = Filter::new()
            .must_match("session_id", session_id)
            .must_match("source_thought_id", source_id.to_string());
        let mut relations = self.read_relations(filter).await;
        relations.sort_by_key(|r| r.created_at);
        Ok(relations)
    }

    async fn read_relations(&self, filter: Filter) -> Vec<Relation> {
        let mut relations = Vec::new();
        let mut cursor = None;

        loop {
            let page = match self
                .backend
                .scroll(&self.config.relations_collection, &filter, SCROLL_PAGE, cursor)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(error = %e, "relation read degraded to empty result");
                    return Vec::new();
                }
            };

            for point in &page.points {
                match Relation::from_payload(&point.payload) {
                    Ok(relation) => relations.push(relation),
                    Err(e) => {
                        self.skipped_payloads.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %e, "skipping unparseable relation payload");
                    }
                }
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        relations
    }
}

/// Store for outcome records attached to thoughts.
///
/// Every save also writes the implicit relation from the producing thought
/// to the result: `leads_to` on success, `triggers` on failure.
pub struct ResultStore {
    backend: Arc<dyn VectorStore>,
    relations: Arc<RelationGraph>,
    config: EngineConfig,
    skipped_payloads: AtomicU64,
}

impl std::fmt::Debug for ResultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStore")
            .field("collection", &self.config.results_collection)
            .finish()
    }
}

impl ResultStore {
    pub fn new(
        backend: Arc<dyn VectorStore>,
        relations: Arc<RelationGraph>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            backend,
            relations,
            config,
            skipped_payloads: AtomicU64::new(0),
        })
    }

    pub fn skipped_payload_count(&self) -> u64 {
        self.skipped_payloads.load(Ordering::Relaxed)
    }

    /// Save a result and its implicit outcome relation
    pub async fn save_result(&self, result: &ThoughtResult) -> Result<()> {
        ensure_collection(
            self.backend.as_ref(),
            &self.config.results_collection,
            self.config.dimension,
            self.config.distance,
        )
        .await?;

        self.backend
            .upsert(
                &self.config.results_collection,
                vec![PointRecord {
                    id: result.id.to_string(),
                    vector: None,
                    payload: result.to_payload(),
                }],
            )
            .await?;

        let kind = if result.success {
            RelationKind::LeadsTo
        } else {
            RelationKind::Triggers
        };
        let relation = Relation::new(
            result.session_id.clone(),
            result.thought_id,
            result.id,
            kind,
        )
        .with_strength(result.confidence);
        self.relations.save_relation(&relation).await?;

        tracing::debug!(
            session = %result.session_id,
            thought = %result.thought_id,
            kind = %result.kind,
            success = result.success,
            "saved result"
        );
        Ok(())
    }

    /// All results for a session, ascending by creation time
    pub async fn get_results(&self, session_id: &str) -> Result<Vec<ThoughtResult>> {
        let filter = Filter::new().must_match("session_id", session_id);
        let mut results = self.read_results(filter).await;
        results.sort_by_key(|r| r.created_at);
        Ok(results)
    }

    /// Results produced by one thought
    pub async fn get_results_for_thought(
        &self,
        session_id: &str,
        thought_id: Uuid,
    ) -> Result<Vec<ThoughtResult>> {
        let filter = Filter::new()
            .must_match("session_id", session_id)
            .must_match("thought_id", thought_id.to_string());
        let mut results = self.read_results(filter).await;
        results.sort_by_key(|r| r.created_at);
        Ok(results)
    }

    async fn read_results(&self, filter: Filter) -> Vec<ThoughtResult> {
        let mut results = Vec::new();
        let mut cursor = None;

        loop {
            let page = match self
                .backend
                .scroll(&self.config.results_collection, &filter, SCROLL_PAGE, cursor)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(error = %e, "result read degraded to empty result");
                    return Vec::new();
                }
            };

            for point in &page.points {
                match ThoughtResult::from_payload(&point.payload) {
                    Ok(result) => results.push(result),
                    Err(e) => {
                        self.skipped_payloads.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %e, "skipping unparseable result payload");
                    }
                }
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResultKind;
    use crate::vector_store::InMemoryVectorStore;

    fn graph_and_results() -> (Arc<RelationGraph>, Arc<ResultStore>) {
        let backend: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        let graph = RelationGraph::new(backend.clone(), EngineConfig::default());
        let results = ResultStore::new(backend, graph.clone(), EngineConfig::default());
        (graph, results)
    }

    #[tokio::test]
    async fn relation_round_trip() {
        let (graph, _) = graph_and_results();
        let relation = Relation::new("s1", Uuid::new_v4(), Uuid::new_v4(), RelationKind::Supports)
            .with_strength(0.8);
        graph.save_relation(&relation).await.unwrap();

        assert_eq!(graph.get_relations("s1").await.unwrap(), vec![relation]);
    }

    #[tokio::test]
    async fn relations_for_thought_cover_both_directions() {
        let (graph, _) = graph_and_results();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        graph
            .save_relation(&Relation::new("s1", a, b, RelationKind::LeadsTo))
            .await
            .unwrap();
        graph
            .save_relation(&Relation::new("s1", c, a, RelationKind::Supports))
            .await
            .unwrap();
        graph
            .save_relation(&Relation::new("s1", b, c, RelationKind::Contradicts))
            .await
            .unwrap();

        let touching_a = graph.get_relations_for_thought("s1", a).await.unwrap();
        assert_eq!(touching_a.len(), 2);

        let outgoing_a = graph.get_outgoing("s1", a).await.unwrap();
        assert_eq!(outgoing_a.len(), 1);
        assert_eq!(outgoing_a[0].target_thought_id, b);
    }

    #[tokio::test]
    async fn empty_graph_reads_empty() {
        let (graph, _) = graph_and_results();
        assert!(graph.get_relations("none").await.unwrap().is_empty());
        assert!(graph
            .get_relations_for_thought("none", Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn successful_result_links_with_leads_to() {
        let (graph, results) = graph_and_results();
        let thought_id = Uuid::new_v4();
        let result = ThoughtResult::new("s1", thought_id, ResultKind::Action, "ran the job", true)
            .with_confidence(0.9);

        results.save_result(&result).await.unwrap();

        let stored = results.get_results("s1").await.unwrap();
        assert_eq!(stored, vec![result.clone()]);

        let relations = graph.get_outgoing("s1", thought_id).await.unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].kind, RelationKind::LeadsTo);
        assert_eq!(relations[0].target_thought_id, result.id);
        assert!((relations[0].strength - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn failed_result_links_with_triggers() {
        let (graph, results) = graph_and_results();
        let thought_id = Uuid::new_v4();
        let result =
            ThoughtResult::new("s1", thought_id, ResultKind::Error, "timeout talking to API", false);

        results.save_result(&result).await.unwrap();

        let relations = graph.get_outgoing("s1", thought_id).await.unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].kind, RelationKind::Triggers);
    }

    #[tokio::test]
    async fn results_for_thought_are_scoped() {
        let (_, results) = graph_and_results();
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();

        results
            .save_result(&ThoughtResult::new("s1", t1, ResultKind::Response, "a", true))
            .await
            .unwrap();
        results
            .save_result(&ThoughtResult::new("s1", t2, ResultKind::Response, "b", true))
            .await
            .unwrap();

        let for_t1 = results.get_results_for_thought("s1", t1).await.unwrap();
        assert_eq!(for_t1.len(), 1);
        assert_eq!(for_t1[0].content, "a");
    }
}
