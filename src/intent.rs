//! Lexicon-based intent extraction and fusion-weight selection.
//!
//! Extraction is a pure function of a query string and the configured
//! `action_vocab`/`target_vocab`: tokenize on Unicode word boundaries, strip
//! a small fixed stopword set, then scan left-to-right for the first token
//! matching each vocabulary. No embedding or network call is involved, so
//! intent extraction never fails and never blocks.

use std::collections::HashSet;

use crate::config::IntentConfig;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "for", "to", "of", "in", "on", "with", "and", "or", "is", "me", "my", "i",
    "please", "can", "you", "it", "that", "this", "be", "do",
];

/// Action tokens that belong to the `git` skill even though they are not
/// literally the token `git` — used by the fusion-weight rule "action == git
/// (or recognized git subaction)".
const GIT_SUBACTIONS: &[&str] = &[
    "git", "commit", "push", "pull", "checkout", "branch", "merge", "clone", "fetch", "rebase",
    "status",
];

/// `(action, target, context, keywords)` per spec §4.4. `action`/`target`
/// hold the first vocabulary match in token order; `context` is whatever is
/// left after removing them; `keywords` is every non-stopword token in
/// original order (used for the hybrid-search intent-overlap boost and the
/// knowledge-graph rerank's concept lookup).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryIntent {
    pub action: Option<String>,
    pub target: Option<String>,
    pub context: Vec<String>,
    pub keywords: Vec<String>,
}

impl QueryIntent {
    pub fn is_empty(&self) -> bool {
        self.action.is_none() && self.target.is_none()
    }

    /// Count of distinct query keywords present in `routing_keywords ∪
    /// intents` (spec §4.5, used for the hybrid-search intent boost).
    pub fn overlap_count(&self, routing_keywords: &[String], intents: &[String]) -> usize {
        self.overlap_count_with_category(routing_keywords, intents, "")
    }

    /// Count of distinct query keywords present in `routing_keywords ∪
    /// intents ∪ {category}` (spec §4.8, used for attribute-overlap
    /// promotion). `category` is folded in as a single extra token source.
    pub fn overlap_count_with_category(
        &self,
        routing_keywords: &[String],
        intents: &[String],
        category: &str,
    ) -> usize {
        let mine: HashSet<String> = self.keywords.iter().map(|s| s.to_lowercase()).collect();
        routing_keywords
            .iter()
            .flat_map(|k| k.split_whitespace())
            .chain(intents.iter().flat_map(|i| i.split_whitespace()))
            .chain(category.split_whitespace())
            .map(|w| w.to_lowercase())
            .filter(|w| mine.contains(w))
            .collect::<HashSet<_>>()
            .len()
    }
}

pub fn extract_intent(query: &str, config: &IntentConfig) -> QueryIntent {
    let tokens: Vec<String> = query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect();

    let keywords: Vec<String> = tokens.iter().filter(|t| !STOPWORDS.contains(&t.as_str())).cloned().collect();

    let action_set: HashSet<&String> = config.action_vocab.iter().collect();
    let target_set: HashSet<&String> = config.target_vocab.iter().collect();

    let action = keywords.iter().find(|t| action_set.contains(t)).cloned();
    let target = keywords
        .iter()
        .find(|t| target_set.contains(t) && Some((*t).clone()) != action)
        .cloned();

    let context: Vec<String> = keywords
        .iter()
        .filter(|t| Some((*t).clone()) != action && Some((*t).clone()) != target)
        .cloned()
        .collect();

    QueryIntent {
        action,
        target,
        context,
        keywords,
    }
}

/// Per-query weighting consumed by every downstream stage (spec §4.4). All
/// fields default to `1.0`; rules are applied in order and later rules
/// override the fields they name, not the whole struct.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub vector_weight: f32,
    pub keyword_weight: f32,
    pub zk_proximity_scale: f32,
    pub zk_entity_scale: f32,
    pub kg_rerank_scale: f32,
}

impl FusionWeights {
    pub const BALANCED: FusionWeights = FusionWeights {
        vector_weight: 1.0,
        keyword_weight: 1.0,
        zk_proximity_scale: 1.0,
        zk_entity_scale: 1.0,
        kg_rerank_scale: 1.0,
    };
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self::BALANCED
    }
}

const KNOWLEDGE_TARGETS: &[&str] = &["knowledge", "docs"];
const STRUCTURED_TARGETS: &[&str] = &["code", "database", "skill"];

pub fn fusion_weights_for(intent: &QueryIntent) -> FusionWeights {
    let mut weights = FusionWeights::BALANCED;

    if let Some(target) = &intent.target {
        if KNOWLEDGE_TARGETS.contains(&target.as_str()) {
            weights.kg_rerank_scale = 1.3;
            weights.vector_weight = 0.9;
        }
        if STRUCTURED_TARGETS.contains(&target.as_str()) {
            weights.vector_weight = 1.2;
            weights.keyword_weight = 1.3;
        }
    }

    if let Some(action) = &intent.action {
        if GIT_SUBACTIONS.contains(&action.as_str()) {
            weights.keyword_weight = 1.4;
        }
    }

    weights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> IntentConfig {
        IntentConfig {
            action_vocab: vec!["commit".into(), "search".into(), "push".into()],
            target_vocab: vec!["git".into(), "code".into(), "knowledge".into()],
        }
    }

    #[test]
    fn test_extract_action_and_target() {
        let intent = extract_intent("please commit the code for me", &config());
        assert_eq!(intent.action, Some("commit".to_string()));
        assert_eq!(intent.target, Some("code".to_string()));
    }

    #[test]
    fn test_extract_empty_for_unrelated_query() {
        let intent = extract_intent("what is the weather today", &config());
        assert!(intent.is_empty());
    }

    #[test]
    fn test_keywords_preserve_order_and_drop_stopwords() {
        let intent = extract_intent("please commit the code for me", &config());
        assert_eq!(
            intent.keywords,
            vec!["commit".to_string(), "code".to_string()]
        );
    }

    #[test]
    fn test_fusion_weights_balanced_default() {
        let none = QueryIntent::default();
        assert_eq!(fusion_weights_for(&none), FusionWeights::BALANCED);
    }

    #[test]
    fn test_fusion_weights_knowledge_target() {
        let intent = QueryIntent {
            action: None,
            target: Some("knowledge".into()),
            context: vec![],
            keywords: vec![],
        };
        let w = fusion_weights_for(&intent);
        assert_eq!(w.kg_rerank_scale, 1.3);
        assert_eq!(w.vector_weight, 0.9);
    }

    #[test]
    fn test_fusion_weights_structured_target() {
        let intent = QueryIntent {
            action: None,
            target: Some("code".into()),
            context: vec![],
            keywords: vec![],
        };
        let w = fusion_weights_for(&intent);
        assert_eq!(w.vector_weight, 1.2);
        assert_eq!(w.keyword_weight, 1.3);
    }

    #[test]
    fn test_fusion_weights_git_action_overrides_keyword_weight() {
        let intent = QueryIntent {
            action: Some("commit".into()),
            target: None,
            context: vec![],
            keywords: vec![],
        };
        let w = fusion_weights_for(&intent);
        assert_eq!(w.keyword_weight, 1.4);
        assert_eq!(w.vector_weight, 1.0);
    }

    #[test]
    fn test_overlap_count_matches_routing_keywords_and_intents() {
        let intent = QueryIntent {
            action: None,
            target: None,
            context: vec![],
            keywords: vec!["commit".into(), "git".into()],
        };
        assert_eq!(
            intent.overlap_count(&["commit".to_string()], &["push changes".to_string()]),
            1
        );
        assert_eq!(
            intent.overlap_count(&[], &["commit changes".to_string()]),
            1
        );
        assert_eq!(intent.overlap_count(&[], &["unrelated".to_string()]), 0);
    }
}
