//! `IngestPipeline`: chunk a knowledge document, embed each chunk, and
//! replace its rows in one transaction.
//!
//! Re-ingesting the same `source` deletes its old chunks and writes the new
//! ones atomically — a reader never observes a source with a mix of old and
//! new chunk indices. This mirrors the delete-then-insert transaction shape
//! used for tool catalog reindexing in [`crate::catalog`].

use anyhow::Result;

use crate::chunk::{chunk_text, into_knowledge_chunk};
use crate::config::IngestConfig;
use crate::db::VectorStore;
use crate::embedding::{vec_to_blob, Embedder};
use crate::error::CoreError;
use crate::models::KnowledgeChunk;

/// Parse is external to this core (spec-excluded); callers hand in already
/// extracted plaintext. Image extraction, when `extract_images` is set, is a
/// side artifact recorded in `metadata` and never participates in search.
pub async fn ingest_document(
    store: &VectorStore,
    embedder: &dyn Embedder,
    ingest_config: &IngestConfig,
    source: &str,
    text: &str,
) -> Result<Vec<KnowledgeChunk>> {
    let specs = chunk_text(
        source,
        text,
        ingest_config.chunk_size_tokens,
        ingest_config.overlap_tokens,
    );

    let mut chunks = Vec::with_capacity(specs.len());
    for spec in specs {
        let embedding = embedder.embed(&spec.text).await?;
        if embedding.len() != store.dimension {
            return Err(CoreError::DimensionMismatch {
                expected: store.dimension,
                actual: embedding.len(),
            }
            .into());
        }
        chunks.push(into_knowledge_chunk(source, spec, embedding));
    }

    replace_chunks(store, source, &chunks).await?;
    Ok(chunks)
}

async fn replace_chunks(store: &VectorStore, source: &str, chunks: &[KnowledgeChunk]) -> Result<()> {
    let mut tx = store.pool.begin().await?;

    sqlx::query("DELETE FROM knowledge_chunks WHERE source = ?")
        .bind(source)
        .execute(&mut *tx)
        .await?;

    for chunk in chunks {
        sqlx::query(
            "INSERT INTO knowledge_chunks (id, source, chunk_index, content, embedding, metadata) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(&chunk.source)
        .bind(chunk.chunk_index)
        .bind(&chunk.content)
        .bind(vec_to_blob(&chunk.embedding))
        .bind(&chunk.metadata)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::db::get_vector_store;
    use crate::embedding::DeterministicEmbedder;

    // A unique tempdir-backed path per test, not `:memory:` — the store
    // factory caches by path alone (not dimension), so two tests sharing
    // `:memory:` with different dimensions would race on the same cached
    // handle.
    async fn test_store(dir: &std::path::Path, dimension: usize) -> std::sync::Arc<VectorStore> {
        let cfg = StoreConfig {
            storage_path: dir.join("store.db"),
            dimension,
            index_cache_size_bytes: 1024,
            max_cached_tables: 16,
        };
        get_vector_store(&cfg).await.unwrap()
    }

    #[tokio::test]
    async fn test_ingest_then_reingest_replaces_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path(), 8).await;
        let embedder = DeterministicEmbedder::new(8);
        let ingest_config = IngestConfig {
            chunk_size_tokens: 5,
            overlap_tokens: 1,
            extract_images: false,
        };

        let first = ingest_document(&store, &embedder, &ingest_config, "doc1", "a b c d e f g h i j")
            .await
            .unwrap();
        assert!(first.len() > 1);

        let second = ingest_document(&store, &embedder, &ingest_config, "doc1", "only a few words")
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_chunks WHERE source = 'doc1'")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, second.len() as i64);
    }

    #[tokio::test]
    async fn test_ingest_document_rejects_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path(), 8).await;
        let embedder = DeterministicEmbedder::new(4);
        let ingest_config = IngestConfig {
            chunk_size_tokens: 5,
            overlap_tokens: 1,
            extract_images: false,
        };

        let err = ingest_document(&store, &embedder, &ingest_config, "doc1", "a b c d e")
            .await
            .unwrap_err();
        let core_err = err.downcast_ref::<CoreError>().expect("expected a CoreError");
        assert_eq!(core_err.code(), "dimension_mismatch");
    }
}
