//! Collection administration: lifecycle, dimension health, destructive
//! repair, and the declared collection-link graph.

use crate::error::{MemoryError, Result};
use crate::layers;
use crate::thoughts::ensure_collection;
use crate::types::{
    CollectionInfo, CollectionLink, CollectionLinkKind, CollectionStatus, Distance,
};
use crate::vector_store::VectorStore;
use crate::EngineConfig;

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health-check entry for one collection
#[derive(Debug, Clone, Serialize)]
pub struct HealthEntry {
    pub name: String,
    pub vector_size: usize,
    pub points_count: usize,
    pub status: CollectionStatus,
    /// True when the configured size is nonzero and differs from the
    /// expected dimension. A never-written collection (size 0) is exempt.
    pub dimension_mismatch: bool,
}

/// Result of a dimension health check
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub expected_dimension: usize,
    pub entries: Vec<HealthEntry>,
}

impl HealthReport {
    pub fn mismatched(&self) -> Vec<&HealthEntry> {
        self.entries.iter().filter(|e| e.dimension_mismatch).collect()
    }

    pub fn is_healthy(&self) -> bool {
        self.entries.iter().all(|e| !e.dimension_mismatch)
    }
}

/// Result of a destructive auto-heal pass
#[derive(Debug, Clone, Serialize)]
pub struct HealReport {
    pub target_dimension: usize,
    /// Collections that were deleted and recreated empty
    pub healed: Vec<String>,
}

/// Administrative surface over the backend's collections.
///
/// Caches (purpose registry, link list) live behind an `RwLock` so one admin
/// instance can be shared across concurrent callers.
pub struct CollectionAdmin {
    backend: Arc<dyn VectorStore>,
    config: EngineConfig,
    purposes: RwLock<HashMap<String, String>>,
    links: RwLock<Vec<CollectionLink>>,
}

impl std::fmt::Debug for CollectionAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionAdmin")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl CollectionAdmin {
    pub fn new(backend: Arc<dyn VectorStore>, config: EngineConfig) -> Arc<Self> {
        let purposes = seed_purposes(&config);
        let links = seed_links(&config);
        Arc::new(Self {
            backend,
            config,
            purposes: RwLock::new(purposes),
            links: RwLock::new(links),
        })
    }

    /// Every backend collection, merged with the purpose registry and the
    /// declared link graph.
    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let names = self.backend.list_collections().await?;
        let purposes = self.purposes.read().await;
        let links = self.links.read().await;

        let mut infos = Vec::with_capacity(names.len());
        for name in names {
            let Some(meta) = self.backend.collection_info(&name).await? else {
                // Dropped between the list and the info call.
                continue;
            };

            let linked: Vec<String> = linked_names(&links, &name);
            infos.push(CollectionInfo {
                purpose: purposes.get(&name).cloned(),
                linked_collections: linked,
                name: meta.name,
                vector_size: meta.vector_size,
                points_count: meta.points_count,
                distance: meta.distance,
                status: meta.status,
            });
        }
        Ok(infos)
    }

    /// Create a collection if absent
    pub async fn ensure_collection(
        &self,
        name: &str,
        vector_size: usize,
        distance: Distance,
    ) -> Result<()> {
        ensure_collection(self.backend.as_ref(), name, vector_size, distance).await
    }

    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        self.backend.delete_collection(name).await?;
        tracing::info!(collection = %name, "deleted collection");
        Ok(())
    }

    /// Register a human-readable purpose for a collection
    pub async fn set_purpose(&self, name: impl Into<String>, purpose: impl Into<String>) {
        self.purposes.write().await.insert(name.into(), purpose.into());
    }

    /// Flag every collection whose configured dimension disagrees with the
    /// expected one. Detection only; nothing is repaired here.
    pub async fn health_check(&self, expected_dimension: usize) -> Result<HealthReport> {
        let names = self.backend.list_collections().await?;
        let mut entries = Vec::with_capacity(names.len());

        for name in names {
            let Some(meta) = self.backend.collection_info(&name).await? else {
                continue;
            };
            let mismatch = meta.vector_size != 0 && meta.vector_size != expected_dimension;
            if mismatch {
                tracing::warn!(
                    collection = %name,
                    actual = meta.vector_size,
                    expected = expected_dimension,
                    "dimension mismatch"
                );
            }
            entries.push(HealthEntry {
                name,
                vector_size: meta.vector_size,
                points_count: meta.points_count,
                status: meta.status,
                dimension_mismatch: mismatch,
            });
        }

        Ok(HealthReport {
            expected_dimension,
            entries,
        })
    }

    /// Delete and recreate every mismatched collection empty at the target
    /// dimension. Destroys data; requires `confirm = true`.
    pub async fn auto_heal(&self, target_dimension: usize, confirm: bool) -> Result<HealReport> {
        if !confirm {
            return Err(MemoryError::ConfirmationRequired(
                "auto_heal deletes and recreates mismatched collections".into(),
            ));
        }

        let report = self.health_check(target_dimension).await?;
        let mut healed = Vec::new();

        for entry in report.mismatched() {
            tracing::warn!(
                collection = %entry.name,
                points_lost = entry.points_count,
                target = target_dimension,
                "auto-heal recreating collection"
            );
            self.backend.delete_collection(&entry.name).await?;
            self.backend
                .create_collection(&entry.name, target_dimension, self.config.distance)
                .await?;
            healed.push(entry.name.clone());
        }

        Ok(HealReport {
            target_dimension,
            healed,
        })
    }

    /// Declare a link between two collections
    pub async fn add_link(&self, link: CollectionLink) {
        self.links.write().await.push(link);
    }

    /// Links touching a collection, in either direction
    pub async fn links_for(&self, name: &str) -> Vec<CollectionLink> {
        self.links
            .read()
            .await
            .iter()
            .filter(|l| l.source == name || l.target == name)
            .cloned()
            .collect()
    }

    /// Links touching a collection, restricted to one kind
    pub async fn links_by_kind(&self, name: &str, kind: CollectionLinkKind) -> Vec<CollectionLink> {
        self.links
            .read()
            .await
            .iter()
            .filter(|l| l.kind == kind && (l.source == name || l.target == name))
            .cloned()
            .collect()
    }

    /// All declared links
    pub async fn links(&self) -> Vec<CollectionLink> {
        self.links.read().await.clone()
    }

    /// Human-readable overview of the collection landscape, grouped by
    /// name-substring heuristics. Presentational only; nothing downstream
    /// makes decisions from this text.
    pub async fn generate_memory_map(&self) -> Result<String> {
        let collections = self.list_collections().await?;
        let links = self.links.read().await.clone();

        let mut graph_section = String::new();
        let mut layer_section = String::new();
        let mut other_section = String::new();

        for info in &collections {
            let line = format!(
                "  {}: {} points, dim {}, status {}{}\n",
                info.name,
                info.points_count,
                info.vector_size,
                info.status,
                info.purpose
                    .as_deref()
                    .map(|p| format!(" ({p})"))
                    .unwrap_or_default(),
            );
            if ["thought", "relation", "result"]
                .iter()
                .any(|s| info.name.contains(s))
            {
                graph_section.push_str(&line);
            } else if info.name.contains("memory") {
                layer_section.push_str(&line);
            } else {
                other_section.push_str(&line);
            }
        }

        let mut out = String::from("MEMORY MAP\n==========\n");
        for (title, body) in [
            ("Thought graph", graph_section),
            ("Memory layers", layer_section),
            ("Other", other_section),
        ] {
            if !body.is_empty() {
                out.push_str(&format!("\n{title}:\n{body}"));
            }
        }

        if !links.is_empty() {
            out.push_str("\nDeclared links:\n");
            for link in &links {
                out.push_str(&format!(
                    "  {} --{}--> {} (strength {:.2})\n",
                    link.source, link.kind, link.target, link.strength
                ));
            }
        }

        Ok(out)
    }
}

fn linked_names(links: &[CollectionLink], name: &str) -> Vec<String> {
    let mut linked: Vec<String> = links
        .iter()
        .filter_map(|l| {
            if l.source == name {
                Some(l.target.clone())
            } else if l.target == name {
                Some(l.source.clone())
            } else {
                None
            }
        })
        .collect();
    linked.sort();
    linked.dedup();
    linked
}

fn seed_purposes(config: &EngineConfig) -> HashMap<String, String> {
    HashMap::from([
        (
            config.thoughts_collection.clone(),
            "atomic reasoning units, one point per thought".to_string(),
        ),
        (
            config.relations_collection.clone(),
            "typed directed edges between thoughts".to_string(),
        ),
        (
            config.results_collection.clone(),
            "outcome records attached to thoughts".to_string(),
        ),
        (
            layers::WORKING_MEMORY.to_string(),
            "active reasoning context".to_string(),
        ),
        (
            layers::EPISODIC_MEMORY.to_string(),
            "events and experiences over time".to_string(),
        ),
        (
            layers::SEMANTIC_MEMORY.to_string(),
            "distilled facts and concepts".to_string(),
        ),
        (
            layers::PROCEDURAL_MEMORY.to_string(),
            "learned skills and procedures".to_string(),
        ),
        (
            layers::AUTOBIOGRAPHICAL_MEMORY.to_string(),
            "the agent's own history".to_string(),
        ),
    ])
}

fn seed_links(config: &EngineConfig) -> Vec<CollectionLink> {
    vec![
        CollectionLink::new(
            config.relations_collection.clone(),
            config.thoughts_collection.clone(),
            CollectionLinkKind::DependsOn,
            1.0,
        )
        .with_description("edges reference thought ids"),
        CollectionLink::new(
            config.results_collection.clone(),
            config.thoughts_collection.clone(),
            CollectionLinkKind::DependsOn,
            1.0,
        )
        .with_description("results attach to thoughts"),
        CollectionLink::new(
            layers::EPISODIC_MEMORY,
            layers::WORKING_MEMORY,
            CollectionLinkKind::Extends,
            0.8,
        ),
        CollectionLink::new(
            layers::SEMANTIC_MEMORY,
            layers::EPISODIC_MEMORY,
            CollectionLinkKind::RelatedTo,
            0.6,
        ),
        CollectionLink::new(
            layers::AUTOBIOGRAPHICAL_MEMORY,
            layers::EPISODIC_MEMORY,
            CollectionLinkKind::Aggregates,
            0.7,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::InMemoryVectorStore;

    fn admin() -> (Arc<CollectionAdmin>, Arc<InMemoryVectorStore>) {
        let backend = Arc::new(InMemoryVectorStore::new());
        (
            CollectionAdmin::new(backend.clone(), EngineConfig::default()),
            backend,
        )
    }

    #[tokio::test]
    async fn health_check_flags_only_real_mismatches() {
        let (admin, _) = admin();
        admin
            .ensure_collection("legacy", 1536, Distance::Cosine)
            .await
            .unwrap();
        admin
            .ensure_collection("current", 768, Distance::Cosine)
            .await
            .unwrap();
        admin
            .ensure_collection("unwritten", 0, Distance::Cosine)
            .await
            .unwrap();

        let report = admin.health_check(768).await.unwrap();
        assert!(!report.is_healthy());

        let flagged: Vec<&str> = report
            .mismatched()
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(flagged, vec!["legacy"]);
    }

    #[tokio::test]
    async fn auto_heal_requires_confirmation() {
        let (admin, _) = admin();
        let err = admin.auto_heal(768, false).await.unwrap_err();
        assert!(matches!(err, MemoryError::ConfirmationRequired(_)));
    }

    #[tokio::test]
    async fn auto_heal_recreates_mismatched_collections_empty() {
        let (admin, backend) = admin();
        admin
            .ensure_collection("legacy", 1536, Distance::Cosine)
            .await
            .unwrap();
        backend
            .upsert(
                "legacy",
                vec![crate::vector_store::PointRecord {
                    id: "p1".into(),
                    vector: Some(vec![0.0; 1536]),
                    payload: serde_json::json!({}),
                }],
            )
            .await
            .unwrap();

        let report = admin.auto_heal(768, true).await.unwrap();
        assert_eq!(report.healed, vec!["legacy"]);

        // Data loss is observable: right dimension, zero points.
        let meta = backend.collection_info("legacy").await.unwrap().unwrap();
        assert_eq!(meta.vector_size, 768);
        assert_eq!(meta.points_count, 0);
    }

    #[tokio::test]
    async fn auto_heal_leaves_healthy_collections_alone() {
        let (admin, backend) = admin();
        admin
            .ensure_collection("current", 768, Distance::Cosine)
            .await
            .unwrap();
        backend
            .upsert(
                "current",
                vec![crate::vector_store::PointRecord {
                    id: "p1".into(),
                    vector: Some(vec![0.0; 768]),
                    payload: serde_json::json!({}),
                }],
            )
            .await
            .unwrap();

        let report = admin.auto_heal(768, true).await.unwrap();
        assert!(report.healed.is_empty());
        let meta = backend.collection_info("current").await.unwrap().unwrap();
        assert_eq!(meta.points_count, 1);
    }

    #[tokio::test]
    async fn links_are_seeded_and_queryable() {
        let (admin, _) = admin();
        let config = EngineConfig::default();

        let for_thoughts = admin.links_for(&config.thoughts_collection).await;
        assert_eq!(for_thoughts.len(), 2);

        let depends = admin
            .links_by_kind(&config.relations_collection, CollectionLinkKind::DependsOn)
            .await;
        assert_eq!(depends.len(), 1);
        assert_eq!(depends[0].target, config.thoughts_collection);

        admin
            .add_link(CollectionLink::new(
                "scratch",
                config.thoughts_collection.clone(),
                CollectionLinkKind::Mirrors,
                0.4,
            ))
            .await;
        assert_eq!(admin.links_for("scratch").await.len(), 1);
    }

    #[tokio::test]
    async fn list_collections_merges_purposes_and_links() {
        let (admin, _) = admin();
        let config = EngineConfig::default();
        admin
            .ensure_collection(&config.thoughts_collection, 384, Distance::Cosine)
            .await
            .unwrap();

        let infos = admin.list_collections().await.unwrap();
        let thoughts = infos
            .iter()
            .find(|i| i.name == config.thoughts_collection)
            .unwrap();
        assert!(thoughts.purpose.is_some());
        assert_eq!(thoughts.linked_collections.len(), 2);
    }

    #[tokio::test]
    async fn memory_map_groups_by_name() {
        let (admin, _) = admin();
        let config = EngineConfig::default();
        admin
            .ensure_collection(&config.thoughts_collection, 384, Distance::Cosine)
            .await
            .unwrap();
        admin
            .ensure_collection(crate::layers::EPISODIC_MEMORY, 384, Distance::Cosine)
            .await
            .unwrap();

        let map = admin.generate_memory_map().await.unwrap();
        assert!(map.contains("Thought graph"));
        assert!(map.contains("Memory layers"));
        assert!(map.contains("Declared links"));
    }
}
