//! Automatic relation inference for newly saved thoughts.
//!
//! The kind table below is a fixed heuristic, not a learned model; it is the
//! first thing to swap out if a smarter classifier becomes available.

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::relations::RelationGraph;
use crate::thoughts::ThoughtStore;
use crate::types::{Relation, RelationKind, Thought, ThoughtKind};
use crate::vector_store::cosine_similarity;
use crate::EngineConfig;

use std::sync::Arc;

/// Links each new thought to recent thoughts in its session by embedding
/// similarity plus kind heuristics.
pub struct RelationInferenceEngine {
    thoughts: Arc<ThoughtStore>,
    relations: Arc<RelationGraph>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    config: EngineConfig,
}

impl std::fmt::Debug for RelationInferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationInferenceEngine")
            .field("recent_window", &self.config.recent_window)
            .field("similarity_threshold", &self.config.similarity_threshold)
            .finish()
    }
}

impl RelationInferenceEngine {
    pub fn new(
        thoughts: Arc<ThoughtStore>,
        relations: Arc<RelationGraph>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            thoughts,
            relations,
            embedder,
            config,
        }
    }

    /// Persist a thought, then infer relations against the most recent
    /// thoughts in the session. Returns the relations that were created.
    ///
    /// Without an embedding provider this is just a save: similarity is
    /// treated as 0 and nothing clears the threshold.
    pub async fn save_with_relations(&self, thought: &Thought) -> Result<Vec<Relation>> {
        let recent = self
            .thoughts
            .get_recent_thoughts(&thought.session_id, self.config.recent_window)
            .await?;

        self.thoughts.save_thought(thought).await?;

        let embedder = match &self.embedder {
            Some(embedder) => embedder,
            None => return Ok(Vec::new()),
        };
        if recent.is_empty() {
            return Ok(Vec::new());
        }

        // One batch call: the new content first, then the recent ones.
        let mut texts: Vec<String> = Vec::with_capacity(recent.len() + 1);
        texts.push(thought.content.clone());
        texts.extend(recent.iter().map(|t| t.content.clone()));
        let vectors = embedder.embed(&texts).await?;

        let (new_vector, recent_vectors) = match vectors.split_first() {
            Some(split) => split,
            None => return Ok(Vec::new()),
        };

        let mut created = Vec::new();
        for (existing, existing_vector) in recent.iter().zip(recent_vectors) {
            if existing.id == thought.id {
                continue;
            }

            let similarity = cosine_similarity(new_vector, existing_vector);
            let is_parent = thought.parent_thought_id == Some(existing.id);

            // The parent link is explicit evidence; it does not need to
            // clear the similarity bar.
            if !is_parent && similarity <= self.config.similarity_threshold {
                continue;
            }

            let kind = if is_parent {
                RelationKind::Refines
            } else {
                infer_kind(&existing.kind, &thought.kind)
            };

            let relation = Relation::new(
                thought.session_id.clone(),
                existing.id,
                thought.id,
                kind,
            )
            .with_strength(similarity.clamp(0.0, 1.0));

            self.relations.save_relation(&relation).await?;
            created.push(relation);
        }

        if !created.is_empty() {
            tracing::debug!(
                session = %thought.session_id,
                thought = %thought.id,
                inferred = created.len(),
                "inferred relations"
            );
        }
        Ok(created)
    }
}

/// Kind lookup for an inferred relation from an existing thought to a new
/// one. Arms are ordered by priority; first match wins.
fn infer_kind(existing: &ThoughtKind, new: &ThoughtKind) -> RelationKind {
    match (existing, new) {
        (ThoughtKind::Observation, ThoughtKind::Analytical) => RelationKind::LeadsTo,
        (ThoughtKind::Analytical, ThoughtKind::Decision) => RelationKind::LeadsTo,
        (ThoughtKind::Emotional, ThoughtKind::SelfReflection) => RelationKind::Triggers,
        (ThoughtKind::MemoryRecall, _) => RelationKind::Supports,
        (_, ThoughtKind::Synthesis) => RelationKind::PartOf,
        (_, ThoughtKind::Decision) => RelationKind::LeadsTo,
        _ => RelationKind::SimilarTo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbeddingProvider;
    use crate::vector_store::InMemoryVectorStore;

    fn engine_with_embeddings() -> (RelationInferenceEngine, Arc<RelationGraph>) {
        let backend: Arc<dyn crate::vector_store::VectorStore> =
            Arc::new(InMemoryVectorStore::new());
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbeddingProvider::new(64));
        let config = EngineConfig::default();
        let thoughts = ThoughtStore::new(backend.clone(), Some(embedder.clone()), config.clone());
        let relations = RelationGraph::new(backend, config.clone());
        (
            RelationInferenceEngine::new(thoughts, relations.clone(), Some(embedder), config),
            relations,
        )
    }

    #[tokio::test]
    async fn identical_content_analytical_to_decision_infers_leads_to() {
        let (engine, _) = engine_with_embeddings();

        let first = Thought::new("s1", ThoughtKind::Analytical, "ship the fix today");
        engine.save_with_relations(&first).await.unwrap();

        let second = Thought::new("s1", ThoughtKind::Decision, "ship the fix today");
        let created = engine.save_with_relations(&second).await.unwrap();

        assert_eq!(created.len(), 1);
        assert_eq!(created[0].kind, RelationKind::LeadsTo);
        assert_eq!(created[0].source_thought_id, first.id);
        assert_eq!(created[0].target_thought_id, second.id);
        assert!((created[0].strength - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn parent_override_fires_below_similarity_threshold() {
        let (engine, relations) = engine_with_embeddings();

        let parent = Thought::new("s1", ThoughtKind::Observation, "user asked for weather");
        engine.save_with_relations(&parent).await.unwrap();

        // Content deliberately shares no tokens with the parent.
        let child = Thought::new("s1", ThoughtKind::Analytical, "forecast intent probable")
            .with_parent(parent.id);
        let created = engine.save_with_relations(&child).await.unwrap();

        let refine: Vec<_> = created
            .iter()
            .filter(|r| r.kind == RelationKind::Refines)
            .collect();
        assert_eq!(refine.len(), 1);
        assert_eq!(refine[0].source_thought_id, parent.id);
        assert_eq!(refine[0].target_thought_id, child.id);

        let stored = relations.get_relations("s1").await.unwrap();
        assert!(stored.iter().any(|r| r.kind == RelationKind::Refines));
    }

    #[tokio::test]
    async fn dissimilar_thoughts_create_no_relation() {
        let (engine, _) = engine_with_embeddings();

        engine
            .save_with_relations(&Thought::new(
                "s1",
                ThoughtKind::Observation,
                "kernel panic on boot",
            ))
            .await
            .unwrap();
        let created = engine
            .save_with_relations(&Thought::new(
                "s1",
                ThoughtKind::Observation,
                "lunch menu looks great",
            ))
            .await
            .unwrap();

        assert!(created.is_empty());
    }

    #[tokio::test]
    async fn no_embedder_means_plain_save() {
        let backend: Arc<dyn crate::vector_store::VectorStore> =
            Arc::new(InMemoryVectorStore::new());
        let config = EngineConfig::default();
        let thoughts = ThoughtStore::new(backend.clone(), None, config.clone());
        let relations = RelationGraph::new(backend, config.clone());
        let engine = RelationInferenceEngine::new(thoughts.clone(), relations, None, config);

        engine
            .save_with_relations(&Thought::new("s1", ThoughtKind::Observation, "same text"))
            .await
            .unwrap();
        let created = engine
            .save_with_relations(&Thought::new("s1", ThoughtKind::Observation, "same text"))
            .await
            .unwrap();

        assert!(created.is_empty());
        assert_eq!(thoughts.get_thoughts("s1").await.unwrap().len(), 2);
    }

    #[test]
    fn kind_table_priorities() {
        use ThoughtKind::*;
        assert_eq!(infer_kind(&Observation, &Analytical), RelationKind::LeadsTo);
        assert_eq!(infer_kind(&Analytical, &Decision), RelationKind::LeadsTo);
        assert_eq!(
            infer_kind(&Emotional, &SelfReflection),
            RelationKind::Triggers
        );
        // MemoryRecall as source wins over the new-side columns.
        assert_eq!(infer_kind(&MemoryRecall, &Synthesis), RelationKind::Supports);
        assert_eq!(infer_kind(&MemoryRecall, &Decision), RelationKind::Supports);
        assert_eq!(infer_kind(&Observation, &Synthesis), RelationKind::PartOf);
        assert_eq!(infer_kind(&Observation, &Decision), RelationKind::LeadsTo);
        assert_eq!(infer_kind(&Question, &Observation), RelationKind::SimilarTo);
    }
}
