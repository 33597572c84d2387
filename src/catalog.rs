//! `ToolCatalog`: indexes skill manifests into the vector store and keyword
//! index, and derives the relationship graph between tools.
//!
//! Reindexing a skill is transactional per-skill (old rows for that skill are
//! replaced atomically) so a crash mid-reindex never leaves half the skill's
//! tools visible. `build_relationship_graph` is pure and deterministic: the
//! same tool set always yields the same [`GraphSnapshot`] once sorted
//! (Testable Property P3).

use anyhow::Result;
use sqlx::Row;
use std::collections::HashSet;

use crate::config::GraphConfig;
use crate::db::VectorStore;
use crate::embedding::{vec_to_blob, Embedder};
use crate::error::CoreError;
use crate::keyword::KeywordIndex;
use crate::models::{EdgeFamily, GraphEdge, GraphSnapshot, ToolManifestEntry, ToolRecord};

/// Embed and persist one skill's tools, replacing any prior rows for that
/// skill. Returns the freshly written records.
pub async fn index_skill_tools(
    store: &VectorStore,
    embedder: &dyn Embedder,
    skill_name: &str,
    entries: &[ToolManifestEntry],
) -> Result<Vec<ToolRecord>> {
    let mut seen_ids = HashSet::with_capacity(entries.len());
    for entry in entries {
        if !seen_ids.insert(entry.id()) {
            return Err(CoreError::Conflict(format!(
                "duplicate tool id in ingest batch: {}",
                entry.id()
            ))
            .into());
        }
    }

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let embedding = embedder.embed(&entry.embedding_input()).await?;
        if embedding.len() != store.dimension {
            return Err(CoreError::DimensionMismatch {
                expected: store.dimension,
                actual: embedding.len(),
            }
            .into());
        }
        records.push(ToolRecord {
            id: entry.id(),
            skill_name: entry.skill_name.clone(),
            command_name: entry.command_name.clone(),
            tool_name: entry.id(),
            category: entry.category.clone(),
            description: entry.description.clone(),
            routing_keywords: entry.routing_keywords.clone(),
            intents: entry.intents.clone(),
            file_path: entry.file_path.clone(),
            input_schema: entry.input_schema.clone(),
            skill_tools_refers: entry.skill_tools_refers.clone(),
            embedding,
            metadata: entry.metadata.clone(),
        });
    }

    let mut tx = store.pool.begin().await?;
    sqlx::query("DELETE FROM tools WHERE skill_name = ?")
        .bind(skill_name)
        .execute(&mut *tx)
        .await?;

    for record in &records {
        sqlx::query(
            r#"
            INSERT INTO tools
                (id, skill_name, command_name, tool_name, category, description,
                 routing_keywords, intents, file_path, input_schema, skill_tools_refers,
                 embedding, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.skill_name)
        .bind(&record.command_name)
        .bind(&record.tool_name)
        .bind(&record.category)
        .bind(&record.description)
        .bind(record.routing_keywords.join(","))
        .bind(record.intents.join(","))
        .bind(&record.file_path)
        .bind(&record.input_schema)
        .bind(record.skill_tools_refers.join(","))
        .bind(vec_to_blob(&record.embedding))
        .bind(&record.metadata)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    let keyword_index = KeywordIndex::new(&store.pool);
    let keep_ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
    keyword_index
        .delete_where_skill(skill_name, &keep_ids)
        .await?;
    keyword_index.bulk_upsert(&records).await?;

    Ok(records)
}

/// Reindex every listed skill, then rebuild and return the full relationship
/// graph over the resulting catalog.
pub async fn reindex_all(
    store: &VectorStore,
    embedder: &dyn Embedder,
    skills: &[(String, Vec<ToolManifestEntry>)],
    graph_config: &GraphConfig,
) -> Result<GraphSnapshot> {
    for (skill_name, entries) in skills {
        index_skill_tools(store, embedder, skill_name, entries).await?;
    }
    let all = fetch_all_tools(store).await?;
    Ok(build_relationship_graph(&all, graph_config))
}

pub(crate) async fn fetch_all_tools(store: &VectorStore) -> Result<Vec<ToolRecord>> {
    let rows = sqlx::query("SELECT * FROM tools").fetch_all(&store.pool).await?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let keywords: String = row.get("routing_keywords");
        let intents: String = row.get("intents");
        let refers: String = row.get("skill_tools_refers");
        out.push(ToolRecord {
            id: row.get("id"),
            skill_name: row.get("skill_name"),
            command_name: row.get("command_name"),
            tool_name: row.get("tool_name"),
            category: row.get("category"),
            description: row.get("description"),
            routing_keywords: split_csv(&keywords),
            intents: split_csv(&intents),
            file_path: row.get("file_path"),
            input_schema: row.get("input_schema"),
            skill_tools_refers: split_csv(&refers),
            embedding: crate::embedding::blob_to_vec(row.get("embedding")),
            metadata: row.get("metadata"),
        });
    }
    Ok(out)
}

fn split_csv(s: &str) -> Vec<String> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split(',').map(|p| p.to_string()).collect()
    }
}

/// Build the tool-to-tool relationship graph:
/// - `SameSkill`: every pair of tools belonging to the same skill.
/// - `SharedReference`: pairs whose `skill_tools_refers` lists intersect.
/// - `KeywordOverlap`: pairs whose `routing_keywords` Jaccard similarity is
///   at least `keyword_overlap_threshold`, weighted by that similarity.
///
/// Edges are undirected in meaning but stored as two directed rows so
/// `outgoing_weight` doesn't need to special-case direction.
pub fn build_relationship_graph(tools: &[ToolRecord], config: &GraphConfig) -> GraphSnapshot {
    let mut edges = Vec::new();

    for i in 0..tools.len() {
        for j in (i + 1)..tools.len() {
            let a = &tools[i];
            let b = &tools[j];

            if a.skill_name == b.skill_name {
                push_pair(&mut edges, a, b, EdgeFamily::SameSkill, config.same_skill_weight);
            }

            if shares_reference(a, b) {
                push_pair(
                    &mut edges,
                    a,
                    b,
                    EdgeFamily::SharedReference,
                    config.shared_ref_weight,
                );
            }

            let jaccard = keyword_jaccard(&a.routing_keywords, &b.routing_keywords);
            if jaccard >= config.keyword_overlap_threshold {
                push_pair(&mut edges, a, b, EdgeFamily::KeywordOverlap, jaccard);
            }
        }
    }

    GraphSnapshot { edges }.sorted()
}

fn push_pair(edges: &mut Vec<GraphEdge>, a: &ToolRecord, b: &ToolRecord, family: EdgeFamily, weight: f32) {
    edges.push(GraphEdge {
        src: a.id.clone(),
        dst: b.id.clone(),
        family: family.clone(),
        weight,
    });
    edges.push(GraphEdge {
        src: b.id.clone(),
        dst: a.id.clone(),
        family,
        weight,
    });
}

fn shares_reference(a: &ToolRecord, b: &ToolRecord) -> bool {
    let a_refs: HashSet<&String> = a.skill_tools_refers.iter().collect();
    b.skill_tools_refers.iter().any(|r| a_refs.contains(r))
}

fn keyword_jaccard(a: &[String], b: &[String]) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let set_a: HashSet<&String> = a.iter().collect();
    let set_b: HashSet<&String> = b.iter().collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}
