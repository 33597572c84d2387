//! Token-aware text chunker with configurable overlap.
//!
//! Splits a knowledge document's plaintext into an ordered, contiguous
//! sequence of chunks. "Tokens" here are whitespace-delimited words — a
//! simplification of a real subword tokenizer that keeps the chunker
//! dependency-free and deterministic, which is all `chunk_index` density
//! (Invariant, §3) requires.
//!
//! Each chunk receives a deterministic UUID derived from its source and
//! index, plus a SHA-256 hash of its text for staleness detection.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::KnowledgeChunk;

pub struct ChunkSpec {
    pub id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// Split `text` into token windows of `chunk_size_tokens` words with
/// `overlap_tokens` words of overlap between consecutive windows. Returns
/// chunks with contiguous indices starting at 0.
pub fn chunk_text(source: &str, text: &str, chunk_size_tokens: usize, overlap_tokens: usize) -> Vec<ChunkSpec> {
    let tokens: Vec<&str> = text.split_whitespace().collect();

    if tokens.is_empty() {
        return vec![make_chunk(source, 0, "")];
    }

    let stride = chunk_size_tokens.saturating_sub(overlap_tokens).max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0i64;

    while start < tokens.len() {
        let end = (start + chunk_size_tokens).min(tokens.len());
        let piece = tokens[start..end].join(" ");
        chunks.push(make_chunk(source, index, &piece));
        index += 1;

        if end == tokens.len() {
            break;
        }
        start += stride;
    }

    chunks
}

fn make_chunk(source: &str, index: i64, text: &str) -> ChunkSpec {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    ChunkSpec {
        id: Uuid::new_v4().to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}

/// Pair a [`ChunkSpec`] with its embedding to produce a storable
/// [`KnowledgeChunk`].
pub fn into_knowledge_chunk(source: &str, spec: ChunkSpec, embedding: Vec<f32>) -> KnowledgeChunk {
    KnowledgeChunk {
        id: spec.id,
        source: source.to_string(),
        chunk_index: spec.chunk_index,
        content: spec.text,
        embedding,
        metadata: "{}".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("doc1", "hello world", 700, 64);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn test_empty_text() {
        let chunks = chunk_text("doc1", "", 700, 64);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn test_chunk_indices_contiguous_and_dense() {
        let text = (0..500)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text("doc1", &text, 50, 10);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
        }
    }

    #[test]
    fn test_overlap_produces_shared_tokens() {
        let text = (0..100)
            .map(|i| format!("t{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text("doc1", &text, 20, 5);
        assert!(chunks[0].text.ends_with("t19"));
        assert!(chunks[1].text.starts_with("t15"));
    }

    #[test]
    fn test_deterministic() {
        let text = "alpha beta gamma delta epsilon zeta";
        let c1 = chunk_text("doc1", text, 3, 1);
        let c2 = chunk_text("doc1", text, 3, 1);
        assert_eq!(c1.len(), c2.len());
        for (a, b) in c1.iter().zip(c2.iter()) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.hash, b.hash);
        }
    }
}
