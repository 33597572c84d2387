//! Core data models for the tool catalog, knowledge store, and routing pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tool manifest entry as supplied by a skill before ingest.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolManifestEntry {
    pub skill_name: String,
    pub command_name: String,
    pub category: String,
    pub description: String,
    pub routing_keywords: Vec<String>,
    pub intents: Vec<String>,
    pub file_path: String,
    pub input_schema: String,
    pub skill_tools_refers: Vec<String>,
    pub metadata: String,
}

impl ToolManifestEntry {
    pub fn id(&self) -> String {
        format!("{}.{}", self.skill_name, self.command_name)
    }

    /// Canonical embedding-input string. Must stay byte-identical across
    /// online and offline embedding paths (Invariant I3).
    pub fn embedding_input(&self) -> String {
        format!(
            "{}\n{}\n{}",
            self.command_name,
            self.description,
            self.intents.join(" | ")
        )
    }
}

/// A tool row persisted in the store.
#[derive(Debug, Clone)]
pub struct ToolRecord {
    pub id: String,
    pub skill_name: String,
    pub command_name: String,
    pub tool_name: String,
    pub category: String,
    pub description: String,
    pub routing_keywords: Vec<String>,
    pub intents: Vec<String>,
    pub file_path: String,
    pub input_schema: String,
    pub skill_tools_refers: Vec<String>,
    pub embedding: Vec<f32>,
    pub metadata: String,
}

/// A chunk of a knowledge document's body text, ready for storage.
#[derive(Debug, Clone)]
pub struct KnowledgeChunk {
    pub id: String,
    pub source: String,
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: String,
}

/// Entity kinds in the knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Skill,
    Tool,
    Concept,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Skill => "SKILL",
            EntityType::Tool => "TOOL",
            EntityType::Concept => "CONCEPT",
        }
    }
}

impl std::str::FromStr for EntityType {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SKILL" => Ok(EntityType::Skill),
            "TOOL" => Ok(EntityType::Tool),
            "CONCEPT" => Ok(EntityType::Concept),
            other => Err(anyhow::anyhow!("unknown entity type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    pub description: String,
    pub aliases: Vec<String>,
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
}

/// Relation kinds emitted during skill registration and catalog ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    Contains,
    RelatedTo,
    DocumentedIn,
    Sibling,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Contains => "CONTAINS",
            RelationType::RelatedTo => "RELATED_TO",
            RelationType::DocumentedIn => "DOCUMENTED_IN",
            RelationType::Sibling => "SIBLING",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Relation {
    pub id: String,
    pub source_entity_id: String,
    pub target_entity_id: String,
    pub relation_type: String,
    pub source_doc: Option<String>,
    pub confidence: f32,
    pub metadata: String,
}

/// A graph edge between two tools, built from the relationship rules in
/// `catalog::build_relationship_graph`.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeFamily {
    SameSkill,
    SharedReference,
    KeywordOverlap,
}

#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub src: String,
    pub dst: String,
    pub family: EdgeFamily,
    pub weight: f32,
}

/// The persisted relationship graph for one catalog generation.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    pub edges: Vec<GraphEdge>,
}

impl GraphSnapshot {
    /// Sum of outgoing edge weights from `anchor` to `candidate`.
    pub fn outgoing_weight(&self, anchor: &str, candidate: &str) -> f32 {
        self.edges
            .iter()
            .filter(|e| e.src == anchor && e.dst == candidate)
            .map(|e| e.weight)
            .sum()
    }

    /// Stable ordering used for idempotency checks (Invariant for P3).
    pub fn sorted(mut self) -> Self {
        self.edges.sort_by(|a, b| {
            a.src
                .cmp(&b.src)
                .then_with(|| a.dst.cmp(&b.dst))
                .then_with(|| family_order(&a.family).cmp(&family_order(&b.family)))
        });
        self
    }
}

fn family_order(f: &EdgeFamily) -> u8 {
    match f {
        EdgeFamily::SameSkill => 0,
        EdgeFamily::SharedReference => 1,
        EdgeFamily::KeywordOverlap => 2,
    }
}

/// Confidence band attached by the calibrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// A single ranked result returned by the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    pub id: String,
    pub skill_name: String,
    pub command_name: String,
    pub category: String,
    pub final_score: f32,
    pub confidence: Confidence,
    pub vector_score: f32,
    pub keyword_score: f32,
    pub keywords: Vec<String>,
    pub content_preview: String,
}
