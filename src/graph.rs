//! `KnowledgeGraph`: entities and relations derived from skill registration,
//! and the bounded-hop relevance query used by `KGRerank`.
//!
//! Entities and relations are deduplicated at the database layer (Invariant
//! I4: `UNIQUE(name, entity_type)` and `UNIQUE(source, target, relation_type)`
//! in the migrations), so `register_skill` is safe to call repeatedly —
//! re-registering a skill is a no-op for triples that already exist.

use anyhow::Result;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

use crate::models::{Entity, EntityType, Relation, RelationType, ToolRecord};

const MAX_HOPS: u32 = 2;
const KG_APPLY_SCALE: f32 = 0.1;
const KG_BOOST_CAP: f32 = 0.15;

pub struct KnowledgeGraph<'a> {
    pool: &'a SqlitePool,
}

impl<'a> KnowledgeGraph<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a skill and its tools as graph entities (spec §4.7, "Bridge
    /// 4"): one `SKILL` entity, one `TOOL` entity per tool, one `CONCEPT`
    /// entity per distinct routing keyword, a `CONTAINS` relation from the
    /// skill to each tool, and a `RELATED_TO` relation from each tool to
    /// every concept it names. Duplicate triples are no-ops (unique indexes
    /// on `kg_entities`/`kg_relations`).
    pub async fn register_skill(&self, skill_name: &str, tools: &[ToolRecord]) -> Result<()> {
        let skill_id = self
            .upsert_entity(skill_name, EntityType::Skill, "", &[])
            .await?;

        for tool in tools {
            let tool_id = self
                .upsert_entity(&tool.tool_name, EntityType::Tool, &tool.description, &[])
                .await?;
            self.upsert_relation(&skill_id, &tool_id, RelationType::Contains, None)
                .await?;

            for keyword in &tool.routing_keywords {
                let concept_name = format!("CONCEPT:{keyword}");
                let concept_id = self
                    .upsert_entity(&concept_name, EntityType::Concept, keyword, &[])
                    .await?;
                self.upsert_relation(&tool_id, &concept_id, RelationType::RelatedTo, None)
                    .await?;
            }
        }
        Ok(())
    }

    async fn upsert_entity(
        &self,
        name: &str,
        entity_type: EntityType,
        description: &str,
        aliases: &[String],
    ) -> Result<String> {
        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM kg_entities WHERE name = ? AND entity_type = ?")
                .bind(name)
                .bind(entity_type.as_str())
                .fetch_optional(self.pool)
                .await?;
        if let Some(id) = existing {
            return Ok(id);
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO kg_entities (id, name, entity_type, description, aliases, confidence, created_at) VALUES (?, ?, ?, ?, ?, 1.0, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(entity_type.as_str())
        .bind(description)
        .bind(aliases.join(","))
        .bind(Utc::now().timestamp())
        .execute(self.pool)
        .await?;
        Ok(id)
    }

    async fn upsert_relation(
        &self,
        source_id: &str,
        target_id: &str,
        relation_type: RelationType,
        source_doc: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO kg_relations (id, source_entity_id, target_entity_id, relation_type, source_doc, confidence, metadata) VALUES (?, ?, ?, ?, ?, 1.0, '{}')",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(source_id)
        .bind(target_id)
        .bind(relation_type.as_str())
        .bind(source_doc)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn entity_by_name(&self, name: &str) -> Result<Option<Entity>> {
        let row = sqlx::query("SELECT * FROM kg_entities WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(|row| row_to_entity(&row)))
    }

    pub async fn relations(&self) -> Result<Vec<Relation>> {
        let rows = sqlx::query("SELECT * FROM kg_relations").fetch_all(self.pool).await?;
        Ok(rows.iter().map(row_to_relation).collect())
    }

    /// Bounded BFS over the relation graph (undirected, ≤2 hops) starting
    /// from the `CONCEPT:<keyword>` entities exactly matching `keywords`
    /// (case-insensitively). Returns a relevance score per `TOOL` entity
    /// name: `Σ (1/2)^(hop-1) × edge_confidence` over every path that
    /// reaches it.
    pub async fn query_tool_relevance(&self, keywords: &[String]) -> Result<HashMap<String, f32>> {
        let entities_rows = sqlx::query("SELECT * FROM kg_entities").fetch_all(self.pool).await?;
        let entities: Vec<Entity> = entities_rows.iter().map(row_to_entity).collect();
        let id_to_entity: HashMap<&str, &Entity> = entities.iter().map(|e| (e.id.as_str(), e)).collect();

        let relation_rows = sqlx::query("SELECT * FROM kg_relations").fetch_all(self.pool).await?;
        let relations: Vec<Relation> = relation_rows.iter().map(row_to_relation).collect();

        let mut adjacency: HashMap<&str, Vec<(&str, f32)>> = HashMap::new();
        for rel in &relations {
            adjacency
                .entry(rel.source_entity_id.as_str())
                .or_default()
                .push((rel.target_entity_id.as_str(), rel.confidence));
            adjacency
                .entry(rel.target_entity_id.as_str())
                .or_default()
                .push((rel.source_entity_id.as_str(), rel.confidence));
        }

        let concept_names: HashSet<String> = keywords
            .iter()
            .map(|k| format!("concept:{}", k.to_lowercase()))
            .collect();
        let seeds: Vec<&str> = entities
            .iter()
            .filter(|e| {
                e.entity_type == EntityType::Concept.as_str()
                    && concept_names.contains(&e.name.to_lowercase())
            })
            .map(|e| e.id.as_str())
            .collect();

        let mut scores: HashMap<String, f32> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::new();

        for seed in seeds {
            visited.insert(seed);
            let mut queue: VecDeque<(&str, u32, f32)> = VecDeque::new();
            queue.push_back((seed, 1, 1.0));

            while let Some((node, hop, confidence)) = queue.pop_front() {
                if hop > MAX_HOPS {
                    continue;
                }
                if let Some(entity) = id_to_entity.get(node) {
                    if entity.entity_type == EntityType::Tool.as_str() {
                        let decay = 0.5f32.powi(hop as i32 - 1);
                        *scores.entry(entity.name.clone()).or_insert(0.0) += decay * confidence;
                    }
                }
                if hop == MAX_HOPS {
                    continue;
                }
                for (neighbor, edge_confidence) in adjacency.get(node).cloned().unwrap_or_default() {
                    if visited.insert(neighbor) {
                        queue.push_back((neighbor, hop + 1, edge_confidence));
                    }
                }
            }
        }

        Ok(scores)
    }
}

/// Scale a raw KG relevance score into the bounded rerank contribution:
/// `kg_rerank_scale × kg_score × 0.1`, capped at `0.15`.
pub fn kg_boost(kg_score: f32, kg_rerank_scale: f32) -> f32 {
    (kg_rerank_scale * kg_score * KG_APPLY_SCALE).min(KG_BOOST_CAP).max(0.0)
}

fn row_to_entity(row: &sqlx::sqlite::SqliteRow) -> Entity {
    let aliases: String = row.get("aliases");
    Entity {
        id: row.get("id"),
        name: row.get("name"),
        entity_type: row.get("entity_type"),
        description: row.get("description"),
        aliases: if aliases.is_empty() {
            vec![]
        } else {
            aliases.split(',').map(|s| s.to_string()).collect()
        },
        confidence: row.get("confidence"),
        created_at: chrono::DateTime::from_timestamp(row.get::<i64, _>("created_at"), 0)
            .unwrap_or_else(Utc::now),
    }
}

fn row_to_relation(row: &sqlx::sqlite::SqliteRow) -> Relation {
    Relation {
        id: row.get("id"),
        source_entity_id: row.get("source_entity_id"),
        target_entity_id: row.get("target_entity_id"),
        relation_type: row.get("relation_type"),
        source_doc: row.get("source_doc"),
        confidence: row.get("confidence"),
        metadata: row.get("metadata"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kg_boost_is_capped() {
        assert_eq!(kg_boost(100.0, 1.0), KG_BOOST_CAP);
    }

    #[test]
    fn test_kg_boost_scales_linearly_below_cap() {
        let boost = kg_boost(0.5, 1.0);
        assert!((boost - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_kg_boost_nonnegative() {
        assert_eq!(kg_boost(0.0, 1.0), 0.0);
    }

    fn tool(id: &str, keywords: &[&str]) -> ToolRecord {
        ToolRecord {
            id: id.to_string(),
            skill_name: "git".to_string(),
            command_name: id.to_string(),
            tool_name: id.to_string(),
            category: "write".to_string(),
            description: "desc".to_string(),
            routing_keywords: keywords.iter().map(|s| s.to_string()).collect(),
            intents: vec![],
            file_path: String::new(),
            input_schema: "{}".to_string(),
            skill_tools_refers: vec![],
            embedding: vec![],
            metadata: "{}".to_string(),
        }
    }

    async fn memory_pool() -> SqlitePool {
        // A pooled `:memory:` database hands each connection its own empty
        // database, so this is pinned to a single connection.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_register_skill_creates_concept_entities() {
        let pool = memory_pool().await;
        let kg = KnowledgeGraph::new(&pool);
        kg.register_skill("git", &[tool("git.commit", &["commit", "save"])])
            .await
            .unwrap();

        let entity = kg.entity_by_name("CONCEPT:commit").await.unwrap();
        assert!(entity.is_some());
        assert_eq!(entity.unwrap().entity_type, "CONCEPT");
    }

    #[tokio::test]
    async fn test_register_skill_is_idempotent() {
        let pool = memory_pool().await;
        let kg = KnowledgeGraph::new(&pool);
        let tools = [tool("git.commit", &["commit"])];
        kg.register_skill("git", &tools).await.unwrap();
        kg.register_skill("git", &tools).await.unwrap();

        let relations = kg.relations().await.unwrap();
        let contains_count = relations.iter().filter(|r| r.relation_type == "CONTAINS").count();
        assert_eq!(contains_count, 1);
    }

    #[tokio::test]
    async fn test_query_tool_relevance_finds_registered_tool() {
        let pool = memory_pool().await;
        let kg = KnowledgeGraph::new(&pool);
        kg.register_skill("git", &[tool("git.commit", &["commit"])])
            .await
            .unwrap();

        let scores = kg.query_tool_relevance(&["commit".to_string()]).await.unwrap();
        assert!(scores.contains_key("git.commit"));
        assert!(scores["git.commit"] > 0.0);
    }

    #[tokio::test]
    async fn test_query_tool_relevance_ignores_substring_tool_name_match() {
        let pool = memory_pool().await;
        let kg = KnowledgeGraph::new(&pool);
        kg.register_skill(
            "git",
            &[
                tool("git.commit", &["commit"]),
                tool("docs.commit-guide", &["style"]),
            ],
        )
        .await
        .unwrap();

        let scores = kg.query_tool_relevance(&["commit".to_string()]).await.unwrap();
        assert!(scores.contains_key("git.commit"));
        assert!(!scores.contains_key("docs.commit-guide"));
    }
}
