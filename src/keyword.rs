//! BM25 keyword index over the `tools` table, backed by SQLite FTS5.
//!
//! Field boosts (`tool_name`, `intents`, `routing_keywords`, `description`)
//! are live configuration — see [`crate::config::HybridConfig`] — not
//! compile-time constants; [`FieldBoosts`] carries the resolved values from
//! config into a `search` call.
//!
//! `sqlx::SqlitePool` already serializes writers internally via its
//! connection pool and SQLite's own locking; [`KeywordIndex`] adds an
//! explicit per-table write mutex on top so a single logical "writer" is
//! never created per call, matching the no-writer-per-call discipline this
//! index must uphold.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::sync::Mutex;

use crate::config::HybridConfig;
use crate::models::ToolRecord;

/// Per-field BM25 boosts, resolved from [`HybridConfig`] at the call site.
#[derive(Debug, Clone, Copy)]
pub struct FieldBoosts {
    pub tool_name: f32,
    pub intents: f32,
    pub routing_keywords: f32,
    pub description: f32,
}

impl From<&HybridConfig> for FieldBoosts {
    fn from(config: &HybridConfig) -> Self {
        Self {
            tool_name: config.field_boost_tool_name,
            intents: config.field_boost_intents,
            routing_keywords: config.field_boost_routing_keywords,
            description: config.field_boost_description,
        }
    }
}

pub struct KeywordIndex<'a> {
    pool: &'a SqlitePool,
    writer_lock: Mutex<()>,
}

impl<'a> KeywordIndex<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self {
            pool,
            writer_lock: Mutex::new(()),
        }
    }

    pub async fn upsert(&self, tool: &ToolRecord) -> Result<()> {
        let _guard = self.writer_lock.lock().unwrap();
        sqlx::query("DELETE FROM tools_fts WHERE id = ?")
            .bind(&tool.id)
            .execute(self.pool)
            .await?;
        insert_row(self.pool, tool).await
    }

    pub async fn bulk_upsert(&self, tools: &[ToolRecord]) -> Result<()> {
        let _guard = self.writer_lock.lock().unwrap();
        let mut tx = self.pool.begin().await?;
        for tool in tools {
            sqlx::query("DELETE FROM tools_fts WHERE id = ?")
                .bind(&tool.id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO tools_fts (id, tool_name, routing_keywords, intents, description) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&tool.id)
            .bind(&tool.tool_name)
            .bind(tool.routing_keywords.join(" "))
            .bind(tool.intents.join(" | "))
            .bind(&tool.description)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete_where_skill(&self, skill_name: &str, keep_ids: &[String]) -> Result<()> {
        let _guard = self.writer_lock.lock().unwrap();
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM tools WHERE skill_name = ?")
            .bind(skill_name)
            .fetch_all(self.pool)
            .await?;
        for id in ids {
            if !keep_ids.contains(&id) {
                sqlx::query("DELETE FROM tools_fts WHERE id = ?")
                    .bind(&id)
                    .execute(self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// BM25 search returning `(id, score)` ordered best-first. SQLite FTS5's
    /// `bm25()` returns more-negative-is-better; negated here so higher is
    /// better everywhere downstream.
    pub async fn search(
        &self,
        query_text: &str,
        k: usize,
        boosts: FieldBoosts,
    ) -> Result<Vec<(String, f32)>> {
        if query_text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let match_query = build_match_query(query_text);

        let rows = sqlx::query(
            r#"
            SELECT id, bm25(tools_fts, 0.0, ?, ?, ?, ?) AS score
            FROM tools_fts
            WHERE tools_fts MATCH ?
            ORDER BY score
            LIMIT ?
            "#,
        )
        .bind(boosts.tool_name)
        .bind(boosts.routing_keywords)
        .bind(boosts.intents)
        .bind(boosts.description)
        .bind(&match_query)
        .bind(k as i64)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let score: f64 = row.get("score");
                (row.get("id"), -score as f32)
            })
            .collect())
    }
}

async fn insert_row(pool: &SqlitePool, tool: &ToolRecord) -> Result<()> {
    sqlx::query(
        "INSERT INTO tools_fts (id, tool_name, routing_keywords, intents, description) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&tool.id)
    .bind(&tool.tool_name)
    .bind(tool.routing_keywords.join(" "))
    .bind(tool.intents.join(" | "))
    .bind(&tool.description)
    .execute(pool)
    .await?;
    Ok(())
}

/// Lowercase the query; stopwords are deliberately not removed so intent
/// phrases keep their shape. Multi-token queries default to OR across terms;
/// a quoted phrase is passed through for positional matching.
fn build_match_query(query_text: &str) -> String {
    let lowered = query_text.to_lowercase();
    if lowered.contains('"') {
        return lowered;
    }
    lowered
        .split_whitespace()
        .map(|t| sanitize_term(t))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn sanitize_term(term: &str) -> String {
    term.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_match_query_ors_tokens() {
        assert_eq!(build_match_query("git commit"), "git OR commit");
    }

    #[test]
    fn test_build_match_query_preserves_phrase() {
        assert_eq!(build_match_query("\"git commit\""), "\"git commit\"");
    }

    #[test]
    fn test_sanitize_term_strips_punctuation() {
        assert_eq!(sanitize_term("commit;"), "commit");
    }

    #[test]
    fn test_field_boosts_from_config() {
        let config = HybridConfig {
            kappa: 60.0,
            field_boost_tool_name: 9.0,
            field_boost_intents: 7.0,
            field_boost_routing_keywords: 2.0,
            field_boost_description: 0.5,
        };
        let boosts = FieldBoosts::from(&config);
        assert_eq!(boosts.tool_name, 9.0);
        assert_eq!(boosts.intents, 7.0);
        assert_eq!(boosts.routing_keywords, 2.0);
        assert_eq!(boosts.description, 0.5);
    }

    fn tool(id: &str, tool_name: &str, description: &str) -> ToolRecord {
        ToolRecord {
            id: id.to_string(),
            skill_name: "git".to_string(),
            command_name: id.to_string(),
            tool_name: tool_name.to_string(),
            category: "write".to_string(),
            description: description.to_string(),
            routing_keywords: vec![],
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
    async fn test_search_respects_configured_field_boosts() {
        let pool = memory_pool().await;
        let index = KeywordIndex::new(&pool);
        // "deploy" only in tool_name for one tool, only in description for
        // the other — boosting tool_name to dwarf description flips which
        // one ranks first relative to boosting description instead.
        index
            .bulk_upsert(&[
                tool("svc.deploy", "deploy", "ships nothing notable"),
                tool("svc.other", "other", "used to deploy things"),
            ])
            .await
            .unwrap();

        let tool_name_favored = FieldBoosts {
            tool_name: 10.0,
            intents: 1.0,
            routing_keywords: 1.0,
            description: 0.1,
        };
        let ranked = index.search("deploy", 10, tool_name_favored).await.unwrap();
        assert_eq!(ranked[0].0, "svc.deploy");

        let description_favored = FieldBoosts {
            tool_name: 0.1,
            intents: 1.0,
            routing_keywords: 1.0,
            description: 10.0,
        };
        let ranked = index.search("deploy", 10, description_favored).await.unwrap();
        assert_eq!(ranked[0].0, "svc.other");
    }
}
