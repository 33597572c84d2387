//! `HybridSearch`: fan out to the vector and keyword branches, fuse with
//! weighted Reciprocal Rank Fusion, and apply the intent-overlap boost.
//!
//! Each branch is over-fetched to `k_raw = max(k * 4, 50)` candidates before
//! fusion so reranking downstream (relationship graph, knowledge graph) has
//! enough of the tail to work with, then trimmed back to `k` after fusion.

use anyhow::Result;

use crate::catalog::fetch_all_tools;
use crate::db::VectorStore;
use crate::embedding::{cosine_similarity, Embedder};
use crate::error::CoreError;
use crate::intent::{FusionWeights, QueryIntent};
use crate::keyword::{FieldBoosts, KeywordIndex};
use crate::models::ToolRecord;

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub tool: ToolRecord,
    pub fused_score: f32,
    pub vector_score: f32,
    pub keyword_score: f32,
}

fn k_raw(k: usize) -> usize {
    (k * 4).max(50)
}

/// Min-max normalize scores into `[0.0, 1.0]`. A flat input (all equal
/// scores, including the empty and single-element cases) maps to all zeros
/// rather than dividing by zero.
fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if range < f32::EPSILON {
        return vec![0.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / range).collect()
}

pub async fn hybrid_search(
    store: &VectorStore,
    keyword_index: &KeywordIndex<'_>,
    embedder: &dyn Embedder,
    query_text: &str,
    k: usize,
    category: Option<&str>,
    weights: FusionWeights,
    kappa: f32,
    intent: &QueryIntent,
    field_boosts: FieldBoosts,
) -> Result<Vec<SearchResult>> {
    let raw_k = k_raw(k);
    let all_tools = fetch_all_tools(store).await?;
    let by_id: std::collections::HashMap<&str, &ToolRecord> =
        all_tools.iter().map(|t| (t.id.as_str(), t)).collect();

    // Vector and keyword branches run concurrently (spec §5 "two concurrent
    // branches per query, join point is the fusion stage"); fusion below
    // observes whichever finished first but is order-independent.
    let embed_future = async {
        embedder
            .embed(query_text)
            .await
            .map_err(|e| anyhow::Error::new(CoreError::Embedder(e.to_string())))
    };
    let keyword_future = keyword_index.search(query_text, raw_k, field_boosts);
    let (query_embedding, mut keyword_hits) = tokio::try_join!(embed_future, keyword_future)?;

    // Vector branch: cosine similarity against every tool's embedding,
    // filtered by category up front (a category miss should never occupy a
    // fusion slot the matching tools could have used).
    let mut vector_hits: Vec<(String, f32)> = all_tools
        .iter()
        .filter(|t| category.map(|c| c == t.category).unwrap_or(true))
        .map(|t| (t.id.clone(), cosine_similarity(&query_embedding, &t.embedding)))
        .collect();
    vector_hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    vector_hits.truncate(raw_k);

    // Keyword branch (already awaited above alongside the embed call).
    if let Some(cat) = category {
        keyword_hits.retain(|(id, _)| by_id.get(id.as_str()).map(|t| t.category == cat).unwrap_or(false));
    }

    let vector_norm = min_max_normalize(&vector_hits.iter().map(|(_, s)| *s).collect::<Vec<_>>());
    let keyword_norm = min_max_normalize(&keyword_hits.iter().map(|(_, s)| *s).collect::<Vec<_>>());

    let mut vector_rank: std::collections::HashMap<&str, (usize, f32)> = std::collections::HashMap::new();
    for (rank, ((id, _), norm)) in vector_hits.iter().zip(vector_norm.iter()).enumerate() {
        vector_rank.insert(id.as_str(), (rank + 1, *norm));
    }
    let mut keyword_rank: std::collections::HashMap<&str, (usize, f32)> = std::collections::HashMap::new();
    for (rank, ((id, _), norm)) in keyword_hits.iter().zip(keyword_norm.iter()).enumerate() {
        keyword_rank.insert(id.as_str(), (rank + 1, *norm));
    }

    let mut candidate_ids: Vec<&str> = vector_rank.keys().chain(keyword_rank.keys()).cloned().collect();
    candidate_ids.sort_unstable();
    candidate_ids.dedup();

    let mut results = Vec::with_capacity(candidate_ids.len());
    for id in candidate_ids {
        let tool = match by_id.get(id) {
            Some(t) => (*t).clone(),
            None => continue,
        };

        let (v_present, v_score) = vector_rank
            .get(id)
            .map(|(rank, norm)| (true, (*rank, *norm)))
            .unwrap_or((false, (usize::MAX, 0.0)));
        let (k_present, k_score) = keyword_rank
            .get(id)
            .map(|(rank, norm)| (true, (*rank, *norm)))
            .unwrap_or((false, (usize::MAX, 0.0)));

        let vector_rrf = if v_present {
            weights.vector_weight / (kappa + v_score.0 as f32)
        } else {
            0.0
        };
        let keyword_rrf = if k_present {
            weights.keyword_weight / (kappa + k_score.0 as f32)
        } else {
            0.0
        };

        let overlap = intent.overlap_count(&tool.routing_keywords, &tool.intents);
        let intent_boost = (0.1 * overlap as f32).min(0.3);

        results.push(SearchResult {
            fused_score: vector_rrf + keyword_rrf + intent_boost,
            vector_score: v_score.1,
            keyword_score: k_score.1,
            tool,
        });
    }

    results.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.tool.id.cmp(&b.tool.id))
    });
    results.truncate(k);

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max_normalize_range() {
        let out = min_max_normalize(&[1.0, 2.0, 3.0]);
        assert_eq!(out, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_min_max_normalize_flat() {
        let out = min_max_normalize(&[5.0, 5.0, 5.0]);
        assert_eq!(out, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_min_max_normalize_empty() {
        assert!(min_max_normalize(&[]).is_empty());
    }

    #[test]
    fn test_k_raw_floor() {
        assert_eq!(k_raw(5), 50);
        assert_eq!(k_raw(20), 80);
    }
}
