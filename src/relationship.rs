//! `RelationshipRerank`: boosts candidates connected to the current top
//! results via the tool relationship graph.
//!
//! The top 3 fused results act as anchors; every candidate (anchors
//! included) receives `graph_boost = clamp(Σ outgoing edge weight from each
//! anchor, 0, 0.2)`, added to its fused score. Reranking is stable: ties
//! break on tool id so repeated runs over the same inputs produce the same
//! order (Testable Property P3).

use crate::models::GraphSnapshot;
use crate::search::SearchResult;

const ANCHOR_COUNT: usize = 3;
const MAX_GRAPH_BOOST: f32 = 0.2;

pub fn apply_relationship_rerank(mut results: Vec<SearchResult>, graph: &GraphSnapshot) -> Vec<SearchResult> {
    if results.is_empty() {
        return results;
    }

    let anchors: Vec<String> = results
        .iter()
        .take(ANCHOR_COUNT)
        .map(|r| r.tool.id.clone())
        .collect();

    for result in &mut results {
        let raw_boost: f32 = anchors
            .iter()
            .filter(|a| a.as_str() != result.tool.id)
            .map(|anchor| graph.outgoing_weight(anchor, &result.tool.id))
            .sum();
        let boost = raw_boost.clamp(0.0, MAX_GRAPH_BOOST);
        result.fused_score += boost;
    }

    results.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.tool.id.cmp(&b.tool.id))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EdgeFamily, GraphEdge, ToolRecord};

    fn result(id: &str, score: f32) -> SearchResult {
        SearchResult {
            tool: ToolRecord {
                id: id.to_string(),
                skill_name: "s".to_string(),
                command_name: id.to_string(),
                tool_name: id.to_string(),
                category: "c".to_string(),
                description: String::new(),
                routing_keywords: vec![],
                intents: vec![],
                file_path: String::new(),
                input_schema: "{}".to_string(),
                skill_tools_refers: vec![],
                embedding: vec![],
                metadata: "{}".to_string(),
            },
            fused_score: score,
            vector_score: 0.0,
            keyword_score: 0.0,
        }
    }

    #[test]
    fn test_connected_candidate_gets_boosted() {
        let results = vec![result("a", 1.0), result("b", 0.5), result("c", 0.1)];
        let graph = GraphSnapshot {
            edges: vec![GraphEdge {
                src: "a".into(),
                dst: "c".into(),
                family: EdgeFamily::SameSkill,
                weight: 0.6,
            }],
        };
        let reranked = apply_relationship_rerank(results, &graph);
        let c = reranked.iter().find(|r| r.tool.id == "c").unwrap();
        assert!((c.fused_score - (0.1 + 0.6)).abs() < 1e-6);
    }

    #[test]
    fn test_boost_is_clamped() {
        let results = vec![result("a", 1.0), result("b", 0.9), result("c", 0.1)];
        let graph = GraphSnapshot {
            edges: vec![
                GraphEdge {
                    src: "a".into(),
                    dst: "c".into(),
                    family: EdgeFamily::SameSkill,
                    weight: 0.6,
                },
                GraphEdge {
                    src: "b".into(),
                    dst: "c".into(),
                    family: EdgeFamily::SharedReference,
                    weight: 0.8,
                },
            ],
        };
        let reranked = apply_relationship_rerank(results, &graph);
        let c = reranked.iter().find(|r| r.tool.id == "c").unwrap();
        assert!((c.fused_score - (0.1 + MAX_GRAPH_BOOST)).abs() < 1e-6);
    }

    #[test]
    fn test_empty_results_noop() {
        let graph = GraphSnapshot::default();
        assert!(apply_relationship_rerank(vec![], &graph).is_empty());
    }
}
