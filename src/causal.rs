//! Causal-chain reconstruction over the relation graph.
//!
//! Cost is exponential in branching factor times depth, so `max_depth`
//! should stay small (5-10) and anything aggregating over many start nodes
//! must sample starts instead of enumerating them all; see
//! [`CausalChainFinder::sampled_chain_stats`].

use crate::error::Result;
use crate::relations::RelationGraph;
use crate::thoughts::ThoughtStore;
use crate::types::{Relation, RelationKind};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// A linear reasoning trace: a path of thoughts joined by directed relations.
#[derive(Debug, Clone, PartialEq)]
pub struct CausalChain {
    /// Nodes along the path, starting at the requested thought
    pub thought_ids: Vec<Uuid>,
    /// Edge kinds between consecutive nodes (one fewer than the nodes)
    pub edge_kinds: Vec<RelationKind>,
}

impl CausalChain {
    /// Number of nodes in the chain
    pub fn len(&self) -> usize {
        self.thought_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thought_ids.is_empty()
    }

    /// Render the chain as a one-line trace, e.g. `a --leads_to--> b`
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (i, id) in self.thought_ids.iter().enumerate() {
            if i > 0 {
                out.push_str(&format!(" --{}--> ", self.edge_kinds[i - 1]));
            }
            out.push_str(&id.to_string());
        }
        out
    }
}

/// Aggregate view over sampled causal chains
#[derive(Debug, Clone, Default)]
pub struct ChainStats {
    pub sampled_starts: usize,
    pub chains_found: usize,
    pub longest_chain: usize,
    pub average_length: f32,
}

/// Walks outgoing relation edges to reconstruct reasoning traces.
pub struct CausalChainFinder {
    relations: Arc<RelationGraph>,
    thoughts: Arc<ThoughtStore>,
}

impl std::fmt::Debug for CausalChainFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CausalChainFinder").finish()
    }
}

enum Frame {
    Enter(Uuid, Option<RelationKind>),
    Leave(bool),
}

impl CausalChainFinder {
    pub fn new(relations: Arc<RelationGraph>, thoughts: Arc<ThoughtStore>) -> Self {
        Self {
            relations,
            thoughts,
        }
    }

    /// All maximal chains reachable from `start` along outgoing edges.
    ///
    /// The traversal is an explicit stack-based depth-first search with a
    /// branch-scoped visited set: a node blocked on one branch may still
    /// appear on a different branch, while a cycle on the current branch
    /// terminates it. A branch is recorded when it hits `max_depth` nodes or
    /// runs out of unvisited outgoing edges; single-node chains are dropped.
    pub async fn find_causal_chains(
        &self,
        session_id: &str,
        start: Uuid,
        max_depth: usize,
    ) -> Result<Vec<CausalChain>> {
        let relations = self.relations.get_relations(session_id).await?;
        Ok(chains_from(&relations, start, max_depth))
    }

    /// Chain statistics over a sample of start nodes.
    ///
    /// Enumerating chains from every thought is exponential in the worst
    /// case, so this takes the `sample` oldest thoughts as starting points
    /// and reports how representative the sample was via `sampled_starts`.
    pub async fn sampled_chain_stats(
        &self,
        session_id: &str,
        sample: usize,
        max_depth: usize,
    ) -> Result<ChainStats> {
        let thoughts = self.thoughts.get_thoughts(session_id).await?;
        let relations = self.relations.get_relations(session_id).await?;

        let mut stats = ChainStats::default();
        let mut total_len = 0usize;

        for thought in thoughts.iter().take(sample) {
            stats.sampled_starts += 1;
            for chain in chains_from(&relations, thought.id, max_depth) {
                stats.chains_found += 1;
                stats.longest_chain = stats.longest_chain.max(chain.len());
                total_len += chain.len();
            }
        }

        if stats.chains_found > 0 {
            stats.average_length = total_len as f32 / stats.chains_found as f32;
        }
        Ok(stats)
    }
}

fn chains_from(relations: &[Relation], start: Uuid, max_depth: usize) -> Vec<CausalChain> {
    let mut adjacency: HashMap<Uuid, Vec<&Relation>> = HashMap::new();
    for relation in relations {
        adjacency
            .entry(relation.source_thought_id)
            .or_default()
            .push(relation);
    }

    let mut chains = Vec::new();
    let mut path: Vec<Uuid> = Vec::new();
    let mut edges: Vec<RelationKind> = Vec::new();
    let mut visited: HashSet<Uuid> = HashSet::new();
    let mut stack = vec![Frame::Enter(start, None)];

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(node, via) => {
                if visited.contains(&node) {
                    continue;
                }
                visited.insert(node);
                path.push(node);
                if let Some(kind) = via {
                    edges.push(kind);
                }
                stack.push(Frame::Leave(via.is_some()));

                let next: Vec<&Relation> = if path.len() >= max_depth {
                    Vec::new()
                } else {
                    adjacency
                        .get(&node)
                        .map(|out| {
                            out.iter()
                                .filter(|r| !visited.contains(&r.target_thought_id))
                                .copied()
                                .collect()
                        })
                        .unwrap_or_default()
                };

                if next.is_empty() {
                    if path.len() > 1 {
                        chains.push(CausalChain {
                            thought_ids: path.clone(),
                            edge_kinds: edges.clone(),
                        });
                    }
                } else {
                    for relation in next.into_iter().rev() {
                        stack.push(Frame::Enter(relation.target_thought_id, Some(relation.kind)));
                    }
                }
            }
            Frame::Leave(had_edge) => {
                if let Some(node) = path.pop() {
                    visited.remove(&node);
                }
                if had_edge {
                    edges.pop();
                }
            }
        }
    }

    chains
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Thought, ThoughtKind};
    use crate::vector_store::InMemoryVectorStore;
    use crate::EngineConfig;

    fn finder() -> (CausalChainFinder, Arc<RelationGraph>, Arc<ThoughtStore>) {
        let backend: Arc<dyn crate::vector_store::VectorStore> =
            Arc::new(InMemoryVectorStore::new());
        let config = EngineConfig::default();
        let relations = RelationGraph::new(backend.clone(), config.clone());
        let thoughts = ThoughtStore::new(backend, None, config);
        (
            CausalChainFinder::new(relations.clone(), thoughts.clone()),
            relations,
            thoughts,
        )
    }

    async fn link(graph: &RelationGraph, from: Uuid, to: Uuid, kind: RelationKind) {
        graph
            .save_relation(&Relation::new("s1", from, to, kind))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn linear_graph_yields_one_full_chain() {
        let (finder, graph, _) = finder();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        link(&graph, a, b, RelationKind::LeadsTo).await;
        link(&graph, b, c, RelationKind::LeadsTo).await;

        let chains = finder.find_causal_chains("s1", a, 5).await.unwrap();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].thought_ids, vec![a, b, c]);
        assert_eq!(
            chains[0].edge_kinds,
            vec![RelationKind::LeadsTo, RelationKind::LeadsTo]
        );
    }

    #[tokio::test]
    async fn cycle_terminates_with_depth_bounded_chain() {
        let (finder, graph, _) = finder();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        link(&graph, a, b, RelationKind::LeadsTo).await;
        link(&graph, b, a, RelationKind::CausedBy).await;

        let chains = finder.find_causal_chains("s1", a, 5).await.unwrap();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].thought_ids, vec![a, b]);
    }

    #[tokio::test]
    async fn branching_produces_a_chain_per_branch() {
        let (finder, graph, _) = finder();
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        link(&graph, a, b, RelationKind::LeadsTo).await;
        link(&graph, a, c, RelationKind::Supports).await;
        link(&graph, c, d, RelationKind::LeadsTo).await;

        let mut chains = finder.find_causal_chains("s1", a, 5).await.unwrap();
        chains.sort_by_key(|c| c.len());

        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].thought_ids, vec![a, b]);
        assert_eq!(chains[1].thought_ids, vec![a, c, d]);
    }

    #[tokio::test]
    async fn node_can_reappear_across_branches() {
        let (finder, graph, _) = finder();
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        // Diamond: both branches converge on d.
        link(&graph, a, b, RelationKind::LeadsTo).await;
        link(&graph, a, c, RelationKind::LeadsTo).await;
        link(&graph, b, d, RelationKind::LeadsTo).await;
        link(&graph, c, d, RelationKind::LeadsTo).await;

        let chains = finder.find_causal_chains("s1", a, 5).await.unwrap();
        assert_eq!(chains.len(), 2);
        assert!(chains.iter().all(|c| c.thought_ids.last() == Some(&d)));
    }

    #[tokio::test]
    async fn max_depth_truncates_chains() {
        let (finder, graph, _) = finder();
        let ids: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
        for pair in ids.windows(2) {
            link(&graph, pair[0], pair[1], RelationKind::LeadsTo).await;
        }

        let chains = finder.find_causal_chains("s1", ids[0], 3).await.unwrap();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].thought_ids, ids[..3].to_vec());
    }

    #[tokio::test]
    async fn isolated_start_yields_no_chains() {
        let (finder, _, _) = finder();
        let chains = finder
            .find_causal_chains("s1", Uuid::new_v4(), 5)
            .await
            .unwrap();
        assert!(chains.is_empty());
    }

    #[tokio::test]
    async fn stats_sample_start_nodes() {
        let (finder, graph, thoughts) = finder();

        let a = Thought::new("s1", ThoughtKind::Observation, "a");
        let b = Thought::new("s1", ThoughtKind::Analytical, "b");
        let c = Thought::new("s1", ThoughtKind::Decision, "c");
        for t in [&a, &b, &c] {
            thoughts.save_thought(t).await.unwrap();
        }
        link(&graph, a.id, b.id, RelationKind::LeadsTo).await;
        link(&graph, b.id, c.id, RelationKind::LeadsTo).await;

        let stats = finder.sampled_chain_stats("s1", 2, 5).await.unwrap();
        assert_eq!(stats.sampled_starts, 2);
        assert!(stats.chains_found >= 1);
        assert_eq!(stats.longest_chain, 3);
    }

    #[test]
    fn summary_renders_edges() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let chain = CausalChain {
            thought_ids: vec![a, b],
            edge_kinds: vec![RelationKind::LeadsTo],
        };
        assert_eq!(chain.summary(), format!("{a} --leads_to--> {b}"));
    }
}
