//! Vector backend client seam.
//!
//! The engine never implements nearest-neighbor search itself; everything
//! goes through the [`VectorStore`] trait. [`InMemoryVectorStore`] is the
//! zero-config substrate used by tests and demos, and the `qdrant` feature
//! adds a REST adapter for a real remote backend.

use crate::error::{MemoryError, Result};
use crate::types::{CollectionStatus, Distance};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// A point to upsert: caller-assigned id, optional vector, JSON payload.
///
/// A `None` vector means the writer had no embedding provider; the point is
/// still stored and remains reachable through payload-filtered scrolls.
#[derive(Debug, Clone)]
pub struct PointRecord {
    pub id: String,
    pub vector: Option<Vec<f32>>,
    pub payload: Value,
}

/// A nearest-neighbor hit
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    /// Higher is better.
    pub score: f32,
    pub payload: Value,
}

/// One page of a payload-filtered scroll
#[derive(Debug, Clone)]
pub struct ScrollPage {
    pub points: Vec<PointRecord>,
    /// Pass back as the next call's cursor; `None` means exhausted.
    pub next_cursor: Option<String>,
}

/// Collection metadata as reported by the backend
#[derive(Debug, Clone)]
pub struct CollectionMeta {
    pub name: String,
    /// Configured vector dimension; 0 when no vector config exists
    pub vector_size: usize,
    pub points_count: usize,
    pub distance: Distance,
    pub status: CollectionStatus,
}

/// Conjunction of exact-match conditions over payload fields
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub must: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`
    pub fn must_match(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.must.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
    }

    /// Evaluate this filter against a payload
    pub fn matches(&self, payload: &Value) -> bool {
        self.must
            .iter()
            .all(|(field, value)| payload.get(field) == Some(value))
    }
}

/// Client interface to the remote vector-search backend.
///
/// Operations are plain pass-throughs: no retries, no caching. Transient
/// backend failures surface immediately as [`MemoryError::Backend`]; the
/// stores above decide how lenient to be.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn collection_exists(&self, collection: &str) -> Result<bool>;
    async fn create_collection(
        &self,
        collection: &str,
        vector_size: usize,
        distance: Distance,
    ) -> Result<()>;
    async fn delete_collection(&self, collection: &str) -> Result<()>;
    async fn collection_info(&self, collection: &str) -> Result<Option<CollectionMeta>>;
    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn upsert(&self, collection: &str, points: Vec<PointRecord>) -> Result<()>;
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: &Filter,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchHit>>;
    async fn scroll(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
        cursor: Option<String>,
    ) -> Result<ScrollPage>;
    async fn delete_points(&self, collection: &str, ids: &[String]) -> Result<()>;
    async fn delete_by_filter(&self, collection: &str, filter: &Filter) -> Result<()>;
    async fn count(&self, collection: &str, filter: &Filter) -> Result<usize>;
}

#[derive(Debug, Clone)]
struct MemPoint {
    vector: Option<Vec<f32>>,
    payload: Value,
}

#[derive(Debug, Default)]
struct MemCollection {
    vector_size: usize,
    distance: Distance,
    points: BTreeMap<String, MemPoint>,
}

/// Brute-force in-memory backend.
///
/// Not intended for production volumes; it exists so the engine (and its
/// tests) run with zero external services, the same role the hash embedder
/// plays for embeddings.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, MemCollection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn score(distance: Distance, a: &[f32], b: &[f32]) -> f32 {
        match distance {
            Distance::Cosine => cosine_similarity(a, b),
            Distance::Dot => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            Distance::Euclid => {
                let d: f32 = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                // Distance converted to a higher-is-better score.
                1.0 / (1.0 + d)
            }
        }
    }
}

/// Cosine similarity, defined as 0 when either vector has zero magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(collection))
    }

    async fn create_collection(
        &self,
        collection: &str,
        vector_size: usize,
        distance: Distance,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(collection) {
            return Err(MemoryError::Backend(format!(
                "collection `{collection}` already exists"
            )));
        }
        collections.insert(
            collection.to_string(),
            MemCollection {
                vector_size,
                distance,
                points: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        self.collections.write().await.remove(collection);
        Ok(())
    }

    async fn collection_info(&self, collection: &str) -> Result<Option<CollectionMeta>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|c| CollectionMeta {
                name: collection.to_string(),
                vector_size: c.vector_size,
                points_count: c.points.len(),
                distance: c.distance,
                status: CollectionStatus::Green,
            }))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn upsert(&self, collection: &str, points: Vec<PointRecord>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let col = collections
            .get_mut(collection)
            .ok_or_else(|| MemoryError::Backend(format!("unknown collection `{collection}`")))?;

        for point in points {
            if let Some(vector) = &point.vector {
                if col.vector_size != 0 && vector.len() != col.vector_size {
                    return Err(MemoryError::Backend(format!(
                        "vector dimension mismatch: got {}, expected {}",
                        vector.len(),
                        col.vector_size
                    )));
                }
            }
            col.points.insert(
                point.id,
                MemPoint {
                    vector: point.vector,
                    payload: point.payload,
                },
            );
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: &Filter,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read().await;
        let col = collections
            .get(collection)
            .ok_or_else(|| MemoryError::Backend(format!("unknown collection `{collection}`")))?;

        let mut hits: Vec<SearchHit> = col
            .points
            .iter()
            .filter(|(_, p)| filter.matches(&p.payload))
            .filter_map(|(id, p)| {
                let stored = p.vector.as_ref()?;
                let score = Self::score(col.distance, vector, stored);
                if let Some(threshold) = score_threshold {
                    if score < threshold {
                        return None;
                    }
                }
                Some(SearchHit {
                    id: id.clone(),
                    score,
                    payload: p.payload.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
        cursor: Option<String>,
    ) -> Result<ScrollPage> {
        let collections = self.collections.read().await;
        let col = collections
            .get(collection)
            .ok_or_else(|| MemoryError::Backend(format!("unknown collection `{collection}`")))?;

        let mut points = Vec::new();
        let mut next_cursor = None;

        let iter: Box<dyn Iterator<Item = (&String, &MemPoint)> + '_> = match &cursor {
            Some(after) => Box::new(
                col.points
                    .range::<String, _>((
                        std::ops::Bound::Excluded(after.clone()),
                        std::ops::Bound::Unbounded,
                    ))
                    .map(|(k, v)| (k, v)),
            ),
            None => Box::new(col.points.iter()),
        };

        for (id, point) in iter {
            if !filter.matches(&point.payload) {
                continue;
            }
            if points.len() == limit {
                // More matches remain past this page.
                next_cursor = points.last().map(|p: &PointRecord| p.id.clone());
                break;
            }
            points.push(PointRecord {
                id: id.clone(),
                vector: point.vector.clone(),
                payload: point.payload.clone(),
            });
        }

        Ok(ScrollPage {
            points,
            next_cursor,
        })
    }

    async fn delete_points(&self, collection: &str, ids: &[String]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let col = collections
            .get_mut(collection)
            .ok_or_else(|| MemoryError::Backend(format!("unknown collection `{collection}`")))?;
        for id in ids {
            col.points.remove(id);
        }
        Ok(())
    }

    async fn delete_by_filter(&self, collection: &str, filter: &Filter) -> Result<()> {
        let mut collections = self.collections.write().await;
        let col = collections
            .get_mut(collection)
            .ok_or_else(|| MemoryError::Backend(format!("unknown collection `{collection}`")))?;
        col.points.retain(|_, p| !filter.matches(&p.payload));
        Ok(())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<usize> {
        let collections = self.collections.read().await;
        let col = collections
            .get(collection)
            .ok_or_else(|| MemoryError::Backend(format!("unknown collection `{collection}`")))?;
        Ok(col
            .points
            .values()
            .filter(|p| filter.matches(&p.payload))
            .count())
    }
}

#[cfg(feature = "qdrant")]
pub mod qdrant {
    //! REST adapter for a Qdrant-compatible backend.
    //!
    //! Timeouts and cancellation ride on the configured `reqwest` client;
    //! this adapter never retries.

    use super::*;
    use serde_json::json;

    pub struct QdrantStore {
        client: reqwest::Client,
        base_url: String,
        api_key: Option<String>,
    }

    impl QdrantStore {
        pub fn new(base_url: impl Into<String>) -> Self {
            Self {
                client: reqwest::Client::new(),
                base_url: base_url.into().trim_end_matches('/').to_string(),
                api_key: None,
            }
        }

        pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
            self.api_key = Some(api_key.into());
            self
        }

        fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
            let mut req = self
                .client
                .request(method, format!("{}{}", self.base_url, path));
            if let Some(key) = &self.api_key {
                req = req.header("api-key", key);
            }
            req
        }

        async fn send(&self, req: reqwest::RequestBuilder) -> Result<Value> {
            let response = req
                .send()
                .await
                .map_err(|e| MemoryError::Backend(format!("qdrant request failed: {e}")))?;

            let status = response.status();
            let body: Value = response
                .json()
                .await
                .map_err(|e| MemoryError::Backend(format!("qdrant response invalid: {e}")))?;

            if !status.is_success() {
                return Err(MemoryError::Backend(format!(
                    "qdrant returned {status}: {body}"
                )));
            }

            Ok(body.get("result").cloned().unwrap_or(Value::Null))
        }

        fn filter_json(filter: &Filter) -> Option<Value> {
            if filter.is_empty() {
                return None;
            }
            let must: Vec<Value> = filter
                .must
                .iter()
                .map(|(key, value)| json!({"key": key, "match": {"value": value}}))
                .collect();
            Some(json!({ "must": must }))
        }

        async fn zero_vector(&self, collection: &str) -> Result<Vec<f32>> {
            let info = self.collection_info(collection).await?.ok_or_else(|| {
                MemoryError::Backend(format!("unknown collection `{collection}`"))
            })?;
            Ok(vec![0.0; info.vector_size])
        }
    }

    fn parse_distance(s: &str) -> Distance {
        match s {
            "Dot" => Distance::Dot,
            "Euclid" => Distance::Euclid,
            _ => Distance::Cosine,
        }
    }

    fn parse_status(s: &str) -> CollectionStatus {
        match s {
            "yellow" => CollectionStatus::Yellow,
            "red" => CollectionStatus::Red,
            _ => CollectionStatus::Green,
        }
    }

    #[async_trait]
    impl VectorStore for QdrantStore {
        fn name(&self) -> &'static str {
            "qdrant"
        }

        async fn collection_exists(&self, collection: &str) -> Result<bool> {
            let result = self
                .send(self.request(
                    reqwest::Method::GET,
                    &format!("/collections/{collection}/exists"),
                ))
                .await?;
            Ok(result
                .get("exists")
                .and_then(Value::as_bool)
                .unwrap_or(false))
        }

        async fn create_collection(
            &self,
            collection: &str,
            vector_size: usize,
            distance: Distance,
        ) -> Result<()> {
            let body = json!({
                "vectors": { "size": vector_size, "distance": distance.as_str() }
            });
            self.send(
                self.request(reqwest::Method::PUT, &format!("/collections/{collection}"))
                    .json(&body),
            )
            .await?;
            Ok(())
        }

        async fn delete_collection(&self, collection: &str) -> Result<()> {
            self.send(self.request(
                reqwest::Method::DELETE,
                &format!("/collections/{collection}"),
            ))
            .await?;
            Ok(())
        }

        async fn collection_info(&self, collection: &str) -> Result<Option<CollectionMeta>> {
            if !self.collection_exists(collection).await? {
                return Ok(None);
            }

            let result = self
                .send(self.request(reqwest::Method::GET, &format!("/collections/{collection}")))
                .await?;

            let vectors = result
                .pointer("/config/params/vectors")
                .cloned()
                .unwrap_or(Value::Null);

            Ok(Some(CollectionMeta {
                name: collection.to_string(),
                vector_size: vectors
                    .get("size")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as usize,
                points_count: result
                    .get("points_count")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as usize,
                distance: parse_distance(
                    vectors.get("distance").and_then(Value::as_str).unwrap_or(""),
                ),
                status: parse_status(
                    result.get("status").and_then(Value::as_str).unwrap_or(""),
                ),
            }))
        }

        async fn list_collections(&self) -> Result<Vec<String>> {
            let result = self
                .send(self.request(reqwest::Method::GET, "/collections"))
                .await?;
            Ok(result
                .get("collections")
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(|c| c.get("name").and_then(Value::as_str))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn upsert(&self, collection: &str, points: Vec<PointRecord>) -> Result<()> {
            // Points written without an embedding still need a vector on the
            // wire; pad with zeros at the collection's configured dimension.
            let pad = if points.iter().any(|p| p.vector.is_none()) {
                Some(self.zero_vector(collection).await?)
            } else {
                None
            };

            let points_json: Vec<Value> = points
                .into_iter()
                .map(|p| {
                    let vector = p
                        .vector
                        .or_else(|| pad.clone())
                        .unwrap_or_default();
                    json!({"id": p.id, "vector": vector, "payload": p.payload})
                })
                .collect();

            self.send(
                self.request(
                    reqwest::Method::PUT,
                    &format!("/collections/{collection}/points?wait=true"),
                )
                .json(&json!({ "points": points_json })),
            )
            .await?;
            Ok(())
        }

        async fn search(
            &self,
            collection: &str,
            vector: &[f32],
            filter: &Filter,
            limit: usize,
            score_threshold: Option<f32>,
        ) -> Result<Vec<SearchHit>> {
            let mut body = json!({
                "vector": vector,
                "limit": limit,
                "with_payload": true,
            });
            if let Some(filter) = Self::filter_json(filter) {
                body["filter"] = filter;
            }
            if let Some(threshold) = score_threshold {
                body["score_threshold"] = json!(threshold);
            }

            let result = self
                .send(
                    self.request(
                        reqwest::Method::POST,
                        &format!("/collections/{collection}/points/search"),
                    )
                    .json(&body),
                )
                .await?;

            Ok(result
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(|hit| {
                            Some(SearchHit {
                                id: point_id_string(hit.get("id")?),
                                score: hit.get("score")?.as_f64()? as f32,
                                payload: hit.get("payload").cloned().unwrap_or(Value::Null),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn scroll(
            &self,
            collection: &str,
            filter: &Filter,
            limit: usize,
            cursor: Option<String>,
        ) -> Result<ScrollPage> {
            let mut body = json!({
                "limit": limit,
                "with_payload": true,
                "with_vector": false,
            });
            if let Some(filter) = Self::filter_json(filter) {
                body["filter"] = filter;
            }
            if let Some(cursor) = cursor {
                body["offset"] = json!(cursor);
            }

            let result = self
                .send(
                    self.request(
                        reqwest::Method::POST,
                        &format!("/collections/{collection}/points/scroll"),
                    )
                    .json(&body),
                )
                .await?;

            let points = result
                .get("points")
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(|p| {
                            Some(PointRecord {
                                id: point_id_string(p.get("id")?),
                                vector: None,
                                payload: p.get("payload").cloned().unwrap_or(Value::Null),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();

            let next_cursor = result
                .get("next_page_offset")
                .filter(|v| !v.is_null())
                .map(point_id_string);

            Ok(ScrollPage {
                points,
                next_cursor,
            })
        }

        async fn delete_points(&self, collection: &str, ids: &[String]) -> Result<()> {
            self.send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/collections/{collection}/points/delete?wait=true"),
                )
                .json(&json!({ "points": ids })),
            )
            .await?;
            Ok(())
        }

        async fn delete_by_filter(&self, collection: &str, filter: &Filter) -> Result<()> {
            let filter_json = Self::filter_json(filter).unwrap_or_else(|| json!({}));
            self.send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/collections/{collection}/points/delete?wait=true"),
                )
                .json(&json!({ "filter": filter_json })),
            )
            .await?;
            Ok(())
        }

        async fn count(&self, collection: &str, filter: &Filter) -> Result<usize> {
            let mut body = json!({ "exact": true });
            if let Some(filter) = Self::filter_json(filter) {
                body["filter"] = filter;
            }

            let result = self
                .send(
                    self.request(
                        reqwest::Method::POST,
                        &format!("/collections/{collection}/points/count"),
                    )
                    .json(&body),
                )
                .await?;

            Ok(result.get("count").and_then(Value::as_u64).unwrap_or(0) as usize)
        }
    }

    /// Qdrant point ids may come back as strings or integers.
    fn point_id_string(id: &Value) -> String {
        match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
