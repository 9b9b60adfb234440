//! Thought, relation and result types plus the collection-level records

use crate::error::{MemoryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Unique identifier for sessions/conversations
pub type SessionId = String;

/// An atomic unit of agent reasoning.
///
/// Thoughts are immutable once written: there is no update path, and a
/// correction is a new thought pointing at the old one via
/// `parent_thought_id`. Ids are caller-assigned, so saving the same thought
/// twice replaces the stored point instead of duplicating it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thought {
    /// Unique identifier (used directly as the backend point id)
    pub id: Uuid,
    /// Session/conversation this thought belongs to
    pub session_id: SessionId,
    /// Kind of thought (drives relation inference)
    pub kind: ThoughtKind,
    /// How the thought came to be
    pub origin: ThoughtOrigin,
    /// The thought content
    pub content: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
    /// Relevance score (0.0 - 1.0)
    pub relevance: f32,
    /// When the thought was produced
    pub timestamp: DateTime<Utc>,
    /// Parent thought in a reasoning chain, if any
    pub parent_thought_id: Option<Uuid>,
    /// Free-form topic label
    pub topic: Option<String>,
    /// Tags associated with this thought
    pub tags: Vec<String>,
    /// Additional metadata (flexible key-value storage)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Thought {
    /// Create a new thought with default scores
    pub fn new(
        session_id: impl Into<SessionId>,
        kind: ThoughtKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            kind,
            origin: ThoughtOrigin::Autonomous,
            content: content.into(),
            confidence: 0.5,
            relevance: 0.5,
            timestamp: Utc::now(),
            parent_thought_id: None,
            topic: None,
            tags: Vec::new(),
            metadata: None,
        }
    }

    /// Set the origin
    pub fn with_origin(mut self, origin: ThoughtOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Set the parent thought
    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_thought_id = Some(parent_id);
        self
    }

    /// Set the topic
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set tags
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the confidence score
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Set the relevance score
    pub fn with_relevance(mut self, relevance: f32) -> Self {
        self.relevance = relevance.clamp(0.0, 1.0);
        self
    }

    /// Set metadata
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Encode this thought as a backend point payload
    pub fn to_payload(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("id".into(), json!(self.id.to_string()));
        map.insert("session_id".into(), json!(self.session_id));
        map.insert("type".into(), json!(self.kind.as_str()));
        map.insert("origin".into(), json!(self.origin.as_str()));
        map.insert("content".into(), json!(self.content));
        map.insert("confidence".into(), json!(self.confidence as f64));
        map.insert("relevance".into(), json!(self.relevance as f64));
        map.insert("timestamp".into(), json!(encode_time(&self.timestamp)));
        if let Some(parent) = &self.parent_thought_id {
            map.insert("parent_thought_id".into(), json!(parent.to_string()));
        }
        if let Some(topic) = &self.topic {
            map.insert("topic".into(), json!(topic));
        }
        if !self.tags.is_empty() {
            map.insert("tags".into(), json!(self.tags));
        }
        if let Some(meta) = &self.metadata {
            map.insert("metadata_json".into(), json!(meta.to_string()));
        }
        Value::Object(map)
    }

    /// Decode a thought from a stored point payload.
    ///
    /// Strict on required fields: callers treat an `Err` as a skippable
    /// corrupt point, not a query failure.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        Ok(Self {
            id: field_uuid(payload, "id")?,
            session_id: field_str(payload, "session_id")?,
            kind: ThoughtKind::from(field_str(payload, "type")?),
            origin: ThoughtOrigin::from(field_str(payload, "origin")?),
            content: field_str(payload, "content")?,
            confidence: field_score(payload, "confidence")?,
            relevance: field_score(payload, "relevance")?,
            timestamp: field_time(payload, "timestamp")?,
            parent_thought_id: opt_field_uuid(payload, "parent_thought_id")?,
            topic: opt_field_str(payload, "topic"),
            tags: field_tags(payload),
            metadata: opt_field_metadata(payload)?,
        })
    }
}

/// Kinds of thoughts.
///
/// The vocabulary is closed here, but callers outside this engine may mint
/// new kinds; those round-trip through [`ThoughtKind::Other`] unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum ThoughtKind {
    /// Something noticed about the world or the conversation
    Observation,
    /// Reasoning over existing material
    Analytical,
    /// A committed choice
    Decision,
    /// Affective reaction
    Emotional,
    /// The agent reflecting on its own behavior
    SelfReflection,
    /// Recall of previously stored material
    MemoryRecall,
    /// Combination of several prior thoughts
    Synthesis,
    /// An open question the agent poses itself
    Question,
    /// Caller-defined kind outside the closed vocabulary
    Other(String),
}

impl ThoughtKind {
    /// String tag used on the wire
    pub fn as_str(&self) -> &str {
        match self {
            ThoughtKind::Observation => "observation",
            ThoughtKind::Analytical => "analytical",
            ThoughtKind::Decision => "decision",
            ThoughtKind::Emotional => "emotional",
            ThoughtKind::SelfReflection => "self_reflection",
            ThoughtKind::MemoryRecall => "memory_recall",
            ThoughtKind::Synthesis => "synthesis",
            ThoughtKind::Question => "question",
            ThoughtKind::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for ThoughtKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "observation" => ThoughtKind::Observation,
            "analytical" => ThoughtKind::Analytical,
            "decision" => ThoughtKind::Decision,
            "emotional" => ThoughtKind::Emotional,
            "self_reflection" => ThoughtKind::SelfReflection,
            "memory_recall" => ThoughtKind::MemoryRecall,
            "synthesis" => ThoughtKind::Synthesis,
            "question" => ThoughtKind::Question,
            _ => ThoughtKind::Other(s),
        }
    }
}

impl From<ThoughtKind> for String {
    fn from(kind: ThoughtKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ThoughtKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a thought came to be
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum ThoughtOrigin {
    /// Produced in direct response to external input
    Reactive,
    /// Produced by the agent's own background reasoning
    Autonomous,
    /// Produced as a continuation of another thought
    Chained,
    /// Caller-defined origin outside the closed vocabulary
    Other(String),
}

impl ThoughtOrigin {
    /// String tag used on the wire
    pub fn as_str(&self) -> &str {
        match self {
            ThoughtOrigin::Reactive => "reactive",
            ThoughtOrigin::Autonomous => "autonomous",
            ThoughtOrigin::Chained => "chained",
            ThoughtOrigin::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for ThoughtOrigin {
    fn from(s: String) -> Self {
        match s.as_str() {
            "reactive" => ThoughtOrigin::Reactive,
            "autonomous" => ThoughtOrigin::Autonomous,
            "chained" => ThoughtOrigin::Chained,
            _ => ThoughtOrigin::Other(s),
        }
    }
}

impl From<ThoughtOrigin> for String {
    fn from(origin: ThoughtOrigin) -> Self {
        origin.as_str().to_string()
    }
}

impl std::fmt::Display for ThoughtOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed directed edge between two thoughts.
///
/// The graph is many-to-many and cycles are permitted. Referential integrity
/// to thought ids is best-effort: an edge may outlive either endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relation {
    /// Unique identifier
    pub id: Uuid,
    /// Session this relation belongs to
    pub session_id: SessionId,
    /// Source thought
    pub source_thought_id: Uuid,
    /// Target thought
    pub target_thought_id: Uuid,
    /// Type of relationship
    pub kind: RelationKind,
    /// Strength of the relation (0.0 - 1.0)
    pub strength: f32,
    /// When the relation was created
    pub created_at: DateTime<Utc>,
    /// Additional metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Relation {
    /// Create a new relation with default strength
    pub fn new(
        session_id: impl Into<SessionId>,
        source: Uuid,
        target: Uuid,
        kind: RelationKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            source_thought_id: source,
            target_thought_id: target,
            kind,
            strength: 0.5,
            created_at: Utc::now(),
            metadata: None,
        }
    }

    /// Set the strength
    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength.clamp(0.0, 1.0);
        self
    }

    /// Set metadata
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Encode this relation as a backend point payload
    pub fn to_payload(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("id".into(), json!(self.id.to_string()));
        map.insert("session_id".into(), json!(self.session_id));
        map.insert(
            "source_thought_id".into(),
            json!(self.source_thought_id.to_string()),
        );
        map.insert(
            "target_thought_id".into(),
            json!(self.target_thought_id.to_string()),
        );
        map.insert("relation_type".into(), json!(self.kind.as_str()));
        map.insert("strength".into(), json!(self.strength as f64));
        map.insert("created_at".into(), json!(encode_time(&self.created_at)));
        if let Some(meta) = &self.metadata {
            map.insert("metadata_json".into(), json!(meta.to_string()));
        }
        Value::Object(map)
    }

    /// Decode a relation from a stored point payload
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let kind_str = field_str(payload, "relation_type")?;
        let kind = RelationKind::parse(&kind_str).ok_or_else(|| {
            MemoryError::Validation(format!("unknown relation type `{kind_str}`"))
        })?;

        Ok(Self {
            id: field_uuid(payload, "id")?,
            session_id: field_str(payload, "session_id")?,
            source_thought_id: field_uuid(payload, "source_thought_id")?,
            target_thought_id: field_uuid(payload, "target_thought_id")?,
            kind,
            strength: field_score(payload, "strength")?,
            created_at: field_time(payload, "created_at")?,
            metadata: opt_field_metadata(payload)?,
        })
    }
}

/// Closed vocabulary of relation types between thoughts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Source was caused by target
    CausedBy,
    /// Source leads to target
    LeadsTo,
    /// Conflicting content
    Contradicts,
    /// Source lends evidence to target
    Supports,
    /// Target sharpens or corrects source
    Refines,
    /// Target generalizes source
    Abstracts,
    /// Target expands on source
    Elaborates,
    /// Semantic similarity without a causal reading
    SimilarTo,
    /// Target is an instance of source
    InstanceOf,
    /// Source is a component of target
    PartOf,
    /// Source set target in motion
    Triggers,
    /// Target settles the question raised by source
    Resolves,
}

impl RelationKind {
    /// All relation kinds
    pub const ALL: &[RelationKind] = &[
        RelationKind::CausedBy,
        RelationKind::LeadsTo,
        RelationKind::Contradicts,
        RelationKind::Supports,
        RelationKind::Refines,
        RelationKind::Abstracts,
        RelationKind::Elaborates,
        RelationKind::SimilarTo,
        RelationKind::InstanceOf,
        RelationKind::PartOf,
        RelationKind::Triggers,
        RelationKind::Resolves,
    ];

    /// String tag used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::CausedBy => "caused_by",
            RelationKind::LeadsTo => "leads_to",
            RelationKind::Contradicts => "contradicts",
            RelationKind::Supports => "supports",
            RelationKind::Refines => "refines",
            RelationKind::Abstracts => "abstracts",
            RelationKind::Elaborates => "elaborates",
            RelationKind::SimilarTo => "similar_to",
            RelationKind::InstanceOf => "instance_of",
            RelationKind::PartOf => "part_of",
            RelationKind::Triggers => "triggers",
            RelationKind::Resolves => "resolves",
        }
    }

    /// Parse a wire tag; the vocabulary is closed so unknown tags fail
    pub fn parse(s: &str) -> Option<Self> {
        RelationKind::ALL.iter().copied().find(|k| k.as_str() == s)
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome record attached to a thought.
///
/// Saving a result also writes an implicit relation from the thought:
/// `leads_to` on success, `triggers` on failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThoughtResult {
    /// Unique identifier
    pub id: Uuid,
    /// Session this result belongs to
    pub session_id: SessionId,
    /// Thought that produced this result
    pub thought_id: Uuid,
    /// Kind of outcome
    pub kind: ResultKind,
    /// Result content
    pub content: String,
    /// Whether the outcome succeeded
    pub success: bool,
    /// Confidence in the outcome (0.0 - 1.0)
    pub confidence: f32,
    /// When the result was recorded
    pub created_at: DateTime<Utc>,
    /// Wall-clock execution time, if measured
    pub execution_time_ms: Option<u64>,
    /// Additional metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ThoughtResult {
    /// Create a new result record
    pub fn new(
        session_id: impl Into<SessionId>,
        thought_id: Uuid,
        kind: ResultKind,
        content: impl Into<String>,
        success: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            thought_id,
            kind,
            content: content.into(),
            success,
            confidence: 0.5,
            created_at: Utc::now(),
            execution_time_ms: None,
            metadata: None,
        }
    }

    /// Set the confidence
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Set the execution time
    pub fn with_execution_time_ms(mut self, ms: u64) -> Self {
        self.execution_time_ms = Some(ms);
        self
    }

    /// Set metadata
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Encode this result as a backend point payload
    pub fn to_payload(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("id".into(), json!(self.id.to_string()));
        map.insert("session_id".into(), json!(self.session_id));
        map.insert("thought_id".into(), json!(self.thought_id.to_string()));
        map.insert("result_type".into(), json!(self.kind.as_str()));
        map.insert("content".into(), json!(self.content));
        map.insert("success".into(), json!(self.success));
        map.insert("confidence".into(), json!(self.confidence as f64));
        map.insert("created_at".into(), json!(encode_time(&self.created_at)));
        if let Some(ms) = self.execution_time_ms {
            map.insert("execution_time_ms".into(), json!(ms));
        }
        if let Some(meta) = &self.metadata {
            map.insert("metadata_json".into(), json!(meta.to_string()));
        }
        Value::Object(map)
    }

    /// Decode a result from a stored point payload
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let kind_str = field_str(payload, "result_type")?;
        let kind = ResultKind::parse(&kind_str).ok_or_else(|| {
            MemoryError::Validation(format!("unknown result type `{kind_str}`"))
        })?;

        let success = payload
            .get("success")
            .and_then(Value::as_bool)
            .ok_or_else(|| MemoryError::Validation("missing field `success`".into()))?;

        let execution_time_ms = payload.get("execution_time_ms").and_then(Value::as_u64);

        Ok(Self {
            id: field_uuid(payload, "id")?,
            session_id: field_str(payload, "session_id")?,
            thought_id: field_uuid(payload, "thought_id")?,
            kind,
            content: field_str(payload, "content")?,
            success,
            confidence: field_score(payload, "confidence")?,
            created_at: field_time(payload, "created_at")?,
            execution_time_ms,
            metadata: opt_field_metadata(payload)?,
        })
    }
}

/// Kinds of outcomes a thought can produce
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// An action the agent took
    Action,
    /// A response delivered to the user
    Response,
    /// A new insight worth keeping
    Insight,
    /// A decision that was made
    Decision,
    /// A capability the agent acquired
    SkillLearned,
    /// A fact the agent established
    FactDiscovered,
    /// A failure outcome
    Error,
    /// Work postponed for later
    Deferred,
}

impl ResultKind {
    /// All result kinds
    pub const ALL: &[ResultKind] = &[
        ResultKind::Action,
        ResultKind::Response,
        ResultKind::Insight,
        ResultKind::Decision,
        ResultKind::SkillLearned,
        ResultKind::FactDiscovered,
        ResultKind::Error,
        ResultKind::Deferred,
    ];

    /// String tag used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::Action => "action",
            ResultKind::Response => "response",
            ResultKind::Insight => "insight",
            ResultKind::Decision => "decision",
            ResultKind::SkillLearned => "skill_learned",
            ResultKind::FactDiscovered => "fact_discovered",
            ResultKind::Error => "error",
            ResultKind::Deferred => "deferred",
        }
    }

    /// Parse a wire tag
    pub fn parse(s: &str) -> Option<Self> {
        ResultKind::ALL.iter().copied().find(|k| k.as_str() == s)
    }
}

impl std::fmt::Display for ResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Distance metric configured on a collection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Distance {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
            Distance::Dot => "Dot",
            Distance::Euclid => "Euclid",
        }
    }
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Health status reported by the backend for a collection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum CollectionStatus {
    #[default]
    Green,
    Yellow,
    Red,
}

impl std::fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionStatus::Green => write!(f, "green"),
            CollectionStatus::Yellow => write!(f, "yellow"),
            CollectionStatus::Red => write!(f, "red"),
        }
    }
}

/// Backend collection metadata merged with the static purpose registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    /// Configured vector dimension; 0 for a collection with no vector config
    pub vector_size: usize,
    pub points_count: usize,
    pub distance: Distance,
    pub status: CollectionStatus,
    pub purpose: Option<String>,
    pub linked_collections: Vec<String>,
}

/// Declared relation between two collections.
///
/// This is a static graph over collections, not to be confused with the
/// per-thought relation graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionLink {
    pub source: String,
    pub target: String,
    pub kind: CollectionLinkKind,
    pub strength: f32,
    pub description: Option<String>,
}

impl CollectionLink {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        kind: CollectionLinkKind,
        strength: f32,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            strength: strength.clamp(0.0, 1.0),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Kinds of declared collection-to-collection relations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CollectionLinkKind {
    DependsOn,
    Indexes,
    Extends,
    Mirrors,
    Aggregates,
    PartOf,
    RelatedTo,
}

impl CollectionLinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionLinkKind::DependsOn => "depends_on",
            CollectionLinkKind::Indexes => "indexes",
            CollectionLinkKind::Extends => "extends",
            CollectionLinkKind::Mirrors => "mirrors",
            CollectionLinkKind::Aggregates => "aggregates",
            CollectionLinkKind::PartOf => "part_of",
            CollectionLinkKind::RelatedTo => "related_to",
        }
    }
}

impl std::fmt::Display for CollectionLinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The five cognitive memory layers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MemoryLayer {
    Working,
    Episodic,
    Semantic,
    Procedural,
    Autobiographical,
}

impl MemoryLayer {
    /// All layers, in precedence order for reverse lookups
    pub const ALL: &[MemoryLayer] = &[
        MemoryLayer::Working,
        MemoryLayer::Episodic,
        MemoryLayer::Semantic,
        MemoryLayer::Procedural,
        MemoryLayer::Autobiographical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryLayer::Working => "working",
            MemoryLayer::Episodic => "episodic",
            MemoryLayer::Semantic => "semantic",
            MemoryLayer::Procedural => "procedural",
            MemoryLayer::Autobiographical => "autobiographical",
        }
    }
}

impl std::fmt::Display for MemoryLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Maps a cognitive layer onto the collections that back it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryLayerMapping {
    pub layer: MemoryLayer,
    pub collections: Vec<String>,
    pub description: String,
    /// How strongly this layer resists cleanup (0.0 - 1.0)
    pub retention_priority: f32,
}

impl MemoryLayerMapping {
    pub fn new(
        layer: MemoryLayer,
        collections: Vec<String>,
        description: impl Into<String>,
        retention_priority: f32,
    ) -> Self {
        Self {
            layer,
            collections,
            description: description.into(),
            retention_priority: retention_priority.clamp(0.0, 1.0),
        }
    }
}

/// Search result combining a thought with its relevance score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtSearchResult {
    pub thought: Thought,
    /// Relevance score (higher is better)
    pub score: f32,
    /// Rank in results (1-based)
    pub rank: usize,
}

/// Parse a caller-supplied point id string.
///
/// This is the one place a read path raises: malformed input, not absence.
pub fn parse_point_id(s: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(s)?)
}

// ─── Payload field helpers ────────────────────────────────────────────────

fn encode_time(ts: &DateTime<Utc>) -> String {
    // Full precision so a decoded timestamp compares equal to the original.
    ts.to_rfc3339()
}

fn field_str(payload: &Value, key: &str) -> Result<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| MemoryError::Validation(format!("missing field `{key}`")))
}

fn opt_field_str(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

fn field_uuid(payload: &Value, key: &str) -> Result<Uuid> {
    let s = field_str(payload, key)?;
    Uuid::parse_str(&s)
        .map_err(|_| MemoryError::Validation(format!("field `{key}` is not a UUID: {s}")))
}

fn opt_field_uuid(payload: &Value, key: &str) -> Result<Option<Uuid>> {
    match payload.get(key).and_then(Value::as_str) {
        Some(s) => Uuid::parse_str(s)
            .map(Some)
            .map_err(|_| MemoryError::Validation(format!("field `{key}` is not a UUID: {s}"))),
        None => Ok(None),
    }
}

fn field_score(payload: &Value, key: &str) -> Result<f32> {
    payload
        .get(key)
        .and_then(Value::as_f64)
        .map(|v| v as f32)
        .ok_or_else(|| MemoryError::Validation(format!("missing field `{key}`")))
}

fn field_time(payload: &Value, key: &str) -> Result<DateTime<Utc>> {
    let s = field_str(payload, key)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| MemoryError::Validation(format!("field `{key}` is not a timestamp: {s}")))
}

fn field_tags(payload: &Value) -> Vec<String> {
    payload
        .get("tags")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn opt_field_metadata(payload: &Value) -> Result<Option<Value>> {
    match payload.get("metadata_json").and_then(Value::as_str) {
        Some(s) => Ok(Some(serde_json::from_str(s)?)),
        None => Ok(None),
    }
}
