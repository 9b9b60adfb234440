//! Cognitive memory layers mapped onto backing collections

use crate::admin::CollectionAdmin;
use crate::error::{MemoryError, Result};
use crate::types::{
    CollectionInfo, CollectionLink, CollectionStatus, MemoryLayer, MemoryLayerMapping,
};
use crate::EngineConfig;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const WORKING_MEMORY: &str = "working_memory";
pub const EPISODIC_MEMORY: &str = "episodic_memory";
pub const SEMANTIC_MEMORY: &str = "semantic_memory";
pub const PROCEDURAL_MEMORY: &str = "procedural_memory";
pub const AUTOBIOGRAPHICAL_MEMORY: &str = "autobiographical_memory";

/// Whole-system statistics included in a snapshot
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemStats {
    pub collection_count: usize,
    pub total_vectors: usize,
    pub healthy_collections: usize,
    pub unhealthy_collections: usize,
    pub link_count: usize,
    /// Configured dimension -> number of collections using it
    pub dimension_histogram: BTreeMap<usize, usize>,
}

/// Point-in-time aggregate of the memory system
#[derive(Debug, Clone, Serialize)]
pub struct MemorySnapshot {
    pub taken_at: DateTime<Utc>,
    pub collections: Vec<CollectionInfo>,
    pub links: Vec<CollectionLink>,
    /// Sum of point counts across each layer's collections
    pub layer_counts: Vec<(MemoryLayer, usize)>,
    pub stats: SystemStats,
}

/// Maps the five cognitive layers onto collection sets and aggregates
/// per-layer and system-wide statistics.
pub struct MemoryLayerManager {
    admin: Arc<CollectionAdmin>,
    config: EngineConfig,
    mappings: Vec<MemoryLayerMapping>,
}

impl std::fmt::Debug for MemoryLayerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLayerManager")
            .field("layers", &self.mappings.len())
            .finish()
    }
}

impl MemoryLayerManager {
    /// Manager with the default layer mapping
    pub fn new(admin: Arc<CollectionAdmin>, config: EngineConfig) -> Self {
        let mappings = default_mappings(&config);
        Self {
            admin,
            config,
            mappings,
        }
    }

    /// Manager with a caller-supplied mapping
    pub fn with_mappings(
        admin: Arc<CollectionAdmin>,
        config: EngineConfig,
        mappings: Vec<MemoryLayerMapping>,
    ) -> Self {
        Self {
            admin,
            config,
            mappings,
        }
    }

    pub fn mappings(&self) -> &[MemoryLayerMapping] {
        &self.mappings
    }

    pub fn mapping_for(&self, layer: MemoryLayer) -> Option<&MemoryLayerMapping> {
        self.mappings.iter().find(|m| m.layer == layer)
    }

    /// Ensure every collection referenced by a layer mapping exists.
    ///
    /// Collections are independent, so creations run concurrently.
    pub async fn initialize(&self) -> Result<()> {
        let creations: Vec<_> = self
            .mappings
            .iter()
            .flat_map(|mapping| mapping.collections.iter())
            .map(|name| {
                self.admin
                    .ensure_collection(name, self.config.dimension, self.config.distance)
            })
            .collect();
        futures::future::try_join_all(creations).await?;
        tracing::info!(layers = self.mappings.len(), "memory layers initialized");
        Ok(())
    }

    /// Reverse lookup: which layer owns a collection.
    ///
    /// A collection mapped into several layers resolves to the first match
    /// in declared layer order (Working first, Autobiographical last).
    pub fn layer_for_collection(&self, name: &str) -> Option<MemoryLayer> {
        self.mappings
            .iter()
            .find(|m| m.collections.iter().any(|c| c == name))
            .map(|m| m.layer)
    }

    /// Delete and recreate (empty) every collection in a layer. Destroys
    /// data; requires `confirm = true`.
    pub async fn clear_layer(&self, layer: MemoryLayer, confirm: bool) -> Result<()> {
        if !confirm {
            return Err(MemoryError::ConfirmationRequired(format!(
                "clearing the {layer} layer deletes its collections"
            )));
        }

        let mapping = self.mapping_for(layer).ok_or_else(|| {
            MemoryError::NotFound(format!("layer {layer} has no mapping"))
        })?;

        for name in &mapping.collections {
            tracing::warn!(layer = %layer, collection = %name, "clearing layer collection");
            self.admin.delete_collection(name).await?;
            self.admin
                .ensure_collection(name, self.config.dimension, self.config.distance)
                .await?;
        }
        Ok(())
    }

    /// Aggregate the full collection list, link graph, per-layer counts and
    /// system-wide statistics.
    pub async fn create_snapshot(&self) -> Result<MemorySnapshot> {
        let collections = self.admin.list_collections().await?;
        let links = self.admin.links().await;

        let layer_counts = self
            .mappings
            .iter()
            .map(|mapping| {
                let total = collections
                    .iter()
                    .filter(|c| mapping.collections.iter().any(|name| name == &c.name))
                    .map(|c| c.points_count)
                    .sum();
                (mapping.layer, total)
            })
            .collect();

        let mut stats = SystemStats {
            collection_count: collections.len(),
            link_count: links.len(),
            ..SystemStats::default()
        };
        for info in &collections {
            stats.total_vectors += info.points_count;
            if info.status == CollectionStatus::Green {
                stats.healthy_collections += 1;
            } else {
                stats.unhealthy_collections += 1;
            }
            *stats.dimension_histogram.entry(info.vector_size).or_insert(0) += 1;
        }

        Ok(MemorySnapshot {
            taken_at: Utc::now(),
            collections,
            links,
            layer_counts,
            stats,
        })
    }
}

/// Default layer mapping: the thought-graph collections join the layers
/// closest to their role, alongside one dedicated collection per layer.
pub fn default_mappings(config: &EngineConfig) -> Vec<MemoryLayerMapping> {
    vec![
        MemoryLayerMapping::new(
            MemoryLayer::Working,
            vec![WORKING_MEMORY.into(), config.thoughts_collection.clone()],
            "active reasoning context and in-flight thoughts",
            0.3,
        ),
        MemoryLayerMapping::new(
            MemoryLayer::Episodic,
            vec![EPISODIC_MEMORY.into(), config.results_collection.clone()],
            "events, experiences and outcomes over time",
            0.6,
        ),
        MemoryLayerMapping::new(
            MemoryLayer::Semantic,
            vec![SEMANTIC_MEMORY.into(), config.relations_collection.clone()],
            "distilled facts and the structure between them",
            0.8,
        ),
        MemoryLayerMapping::new(
            MemoryLayer::Procedural,
            vec![PROCEDURAL_MEMORY.into()],
            "learned skills and procedures",
            0.9,
        ),
        MemoryLayerMapping::new(
            MemoryLayer::Autobiographical,
            vec![AUTOBIOGRAPHICAL_MEMORY.into()],
            "the agent's own history",
            1.0,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::{InMemoryVectorStore, PointRecord, VectorStore};

    fn manager() -> (MemoryLayerManager, Arc<InMemoryVectorStore>) {
        let backend = Arc::new(InMemoryVectorStore::new());
        let config = EngineConfig::default();
        let admin = CollectionAdmin::new(backend.clone(), config.clone());
        (MemoryLayerManager::new(admin, config), backend)
    }

    #[tokio::test]
    async fn initialize_creates_every_mapped_collection() {
        let (manager, backend) = manager();
        manager.initialize().await.unwrap();

        for mapping in manager.mappings() {
            for name in &mapping.collections {
                assert!(backend.collection_exists(name).await.unwrap(), "{name}");
            }
        }
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let (manager, _) = manager();
        manager.initialize().await.unwrap();
        manager.initialize().await.unwrap();
    }

    #[tokio::test]
    async fn reverse_lookup_uses_layer_precedence() {
        let (manager, _) = manager();
        assert_eq!(
            manager.layer_for_collection(WORKING_MEMORY),
            Some(MemoryLayer::Working)
        );
        assert_eq!(
            manager.layer_for_collection(PROCEDURAL_MEMORY),
            Some(MemoryLayer::Procedural)
        );
        assert_eq!(manager.layer_for_collection("unmapped"), None);

        // Overlapping mapping: first declared layer wins.
        let backend = Arc::new(InMemoryVectorStore::new());
        let config = EngineConfig::default();
        let admin = CollectionAdmin::new(backend, config.clone());
        let overlapping = MemoryLayerManager::with_mappings(
            admin,
            config,
            vec![
                MemoryLayerMapping::new(MemoryLayer::Working, vec!["shared".into()], "", 0.5),
                MemoryLayerMapping::new(MemoryLayer::Semantic, vec!["shared".into()], "", 0.5),
            ],
        );
        assert_eq!(
            overlapping.layer_for_collection("shared"),
            Some(MemoryLayer::Working)
        );
    }

    #[tokio::test]
    async fn clear_layer_requires_confirmation() {
        let (manager, _) = manager();
        manager.initialize().await.unwrap();

        let err = manager
            .clear_layer(MemoryLayer::Working, false)
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::ConfirmationRequired(_)));
    }

    #[tokio::test]
    async fn clear_layer_empties_its_collections() {
        let (manager, backend) = manager();
        manager.initialize().await.unwrap();

        backend
            .upsert(
                WORKING_MEMORY,
                vec![PointRecord {
                    id: "p1".into(),
                    vector: None,
                    payload: serde_json::json!({}),
                }],
            )
            .await
            .unwrap();

        manager.clear_layer(MemoryLayer::Working, true).await.unwrap();

        let meta = backend.collection_info(WORKING_MEMORY).await.unwrap().unwrap();
        assert_eq!(meta.points_count, 0);
        assert_eq!(meta.vector_size, EngineConfig::default().dimension);
    }

    #[tokio::test]
    async fn snapshot_aggregates_counts_and_stats() {
        let (manager, backend) = manager();
        manager.initialize().await.unwrap();

        for id in ["a", "b", "c"] {
            backend
                .upsert(
                    EPISODIC_MEMORY,
                    vec![PointRecord {
                        id: id.into(),
                        vector: None,
                        payload: serde_json::json!({}),
                    }],
                )
                .await
                .unwrap();
        }

        let snapshot = manager.create_snapshot().await.unwrap();

        assert_eq!(snapshot.stats.collection_count, snapshot.collections.len());
        assert_eq!(snapshot.stats.total_vectors, 3);
        assert_eq!(snapshot.stats.healthy_collections, snapshot.collections.len());
        assert_eq!(snapshot.stats.unhealthy_collections, 0);
        assert!(snapshot.stats.link_count >= 5);

        let episodic = snapshot
            .layer_counts
            .iter()
            .find(|(layer, _)| *layer == MemoryLayer::Episodic)
            .unwrap();
        assert_eq!(episodic.1, 3);

        let dim = EngineConfig::default().dimension;
        assert_eq!(
            snapshot.stats.dimension_histogram.get(&dim),
            Some(&(snapshot.collections.len()))
        );
    }
}
