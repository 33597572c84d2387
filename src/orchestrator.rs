//! Top-level composition: translation → intent extraction → fusion weights
//! → hybrid search → relationship rerank → knowledge-graph rerank →
//! confidence calibration.
//!
//! This is the one place all the leaf modules meet; every other module is
//! usable standalone and tested that way.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::calibration::calibrate_ranked;
use crate::catalog;
use crate::config::Config;
use crate::db::{get_vector_store, VectorStore};
use crate::embedding::{create_embedder, is_already_english, Embedder, Translator};
use crate::error::CoreError;
use crate::graph::{kg_boost, KnowledgeGraph};
use crate::intent::{extract_intent, fusion_weights_for};
use crate::keyword::{FieldBoosts, KeywordIndex};
use crate::models::{GraphSnapshot, Hit, KnowledgeChunk, ToolManifestEntry};
use crate::relationship::apply_relationship_rerank;
use crate::search::hybrid_search;

/// Cache key for the search-result LRU: caching is only valid because
/// [`crate::embedding::Embedder`] implementations are required to be pure
/// (same text always yields the same vector), so a `(query, k, category)`
/// triple fully determines the result list for a given catalog generation.
type SearchCacheKey = (String, usize, Option<String>);

/// Process-wide-per-orchestrator LRU of recent search results (spec §5
/// "Search result cache"). Bounded by `search.cache_max_size`; a cap of `0`
/// disables caching entirely.
struct SearchCache {
    max_entries: usize,
    entries: HashMap<SearchCacheKey, Vec<Hit>>,
    lru_order: Vec<SearchCacheKey>,
}

impl SearchCache {
    fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            entries: HashMap::new(),
            lru_order: Vec::new(),
        }
    }

    fn get(&mut self, key: &SearchCacheKey) -> Option<Vec<Hit>> {
        let hit = self.entries.get(key).cloned();
        if hit.is_some() {
            self.lru_order.retain(|k| k != key);
            self.lru_order.push(key.clone());
        }
        hit
    }

    fn insert(&mut self, key: SearchCacheKey, value: Vec<Hit>) {
        if self.max_entries == 0 {
            return;
        }
        self.entries.insert(key.clone(), value);
        self.lru_order.retain(|k| k != &key);
        self.lru_order.push(key);
        while self.entries.len() > self.max_entries {
            if let Some(oldest) = self.lru_order.first().cloned() {
                self.lru_order.remove(0);
                self.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.lru_order.clear();
    }
}

pub struct Orchestrator {
    store: Arc<VectorStore>,
    embedder: Box<dyn Embedder>,
    translator: Option<Box<dyn Translator>>,
    config: Config,
    graph: Mutex<GraphSnapshot>,
    search_cache: Mutex<SearchCache>,
}

impl Orchestrator {
    pub async fn new(config: Config) -> Result<Self> {
        let store = get_vector_store(&config.store).await?;
        let embedder = create_embedder(&config.embedding, config.store.dimension)?;
        let cache_max_size = config.search.cache_max_size;
        Ok(Self {
            store,
            embedder,
            translator: None,
            config,
            graph: Mutex::new(GraphSnapshot::default()),
            search_cache: Mutex::new(SearchCache::new(cache_max_size)),
        })
    }

    pub fn with_translator(mut self, translator: Box<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Reindex the given skills' tools, then rebuild the relationship graph
    /// and knowledge-graph entities over the resulting catalog. Each skill is
    /// indexed (embedded + upserted) exactly once.
    pub async fn reindex(&self, skills: &[(String, Vec<ToolManifestEntry>)]) -> Result<()> {
        let kg = KnowledgeGraph::new(&self.store.pool);
        for (skill_name, entries) in skills {
            let records =
                catalog::index_skill_tools(&self.store, self.embedder.as_ref(), skill_name, entries).await?;
            kg.register_skill(skill_name, &records).await?;
        }

        let all_tools = catalog::fetch_all_tools(&self.store).await?;
        let snapshot = catalog::build_relationship_graph(&all_tools, &self.config.graph);
        *self.graph.lock().unwrap() = snapshot;
        self.search_cache.lock().unwrap().clear();
        Ok(())
    }

    pub async fn ingest(&self, source: &str, text: &str) -> Result<Vec<KnowledgeChunk>> {
        crate::ingest::ingest_document(&self.store, self.embedder.as_ref(), &self.config.ingest, source, text).await
    }

    pub async fn search(&self, query_text: &str, k: usize, category: Option<&str>) -> Result<Vec<Hit>> {
        let cache_key: SearchCacheKey = (query_text.to_string(), k, category.map(|c| c.to_string()));
        if let Some(cached) = self.search_cache.lock().unwrap().get(&cache_key) {
            return Ok(cached);
        }

        let translated = match &self.translator {
            Some(translator) if !is_already_english(query_text) => {
                translator.translate_to_english(query_text).await?
            }
            _ => query_text.to_string(),
        };

        let intent = extract_intent(&translated, &self.config.intent);
        let weights = fusion_weights_for(&intent);

        let keyword_index = KeywordIndex::new(&self.store.pool);
        let mut results = match hybrid_search(
            &self.store,
            &keyword_index,
            self.embedder.as_ref(),
            &translated,
            k,
            category,
            weights,
            self.config.hybrid.kappa,
            &intent,
            FieldBoosts::from(&self.config.hybrid),
        )
        .await
        {
            Ok(results) => results,
            // EmbedderError during search degrades to an empty result set
            // rather than a hard failure (spec §7): the vector branch is
            // unusable, but failing the whole query would be worse than
            // telling the caller "no confident match" below.
            Err(e) if matches!(e.downcast_ref::<CoreError>(), Some(CoreError::Embedder(_))) => {
                tracing::warn!(error = %e, "embedder failed during search, returning degraded empty result");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let graph_snapshot = self.graph.lock().unwrap().clone();
        results = apply_relationship_rerank(results, &graph_snapshot);

        if !intent.keywords.is_empty() {
            let kg = KnowledgeGraph::new(&self.store.pool);
            let kg_scores = kg.query_tool_relevance(&intent.keywords).await?;
            for result in &mut results {
                if let Some(score) = kg_scores.get(&result.tool.tool_name) {
                    result.fused_score += kg_boost(*score, weights.kg_rerank_scale);
                }
            }
            results.sort_by(|a, b| {
                b.fused_score
                    .partial_cmp(&a.fused_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.tool.id.cmp(&b.tool.id))
            });
        }

        let scored: Vec<(f32, usize)> = results
            .iter()
            .map(|r| {
                (
                    r.fused_score,
                    intent.overlap_count_with_category(
                        &r.tool.routing_keywords,
                        &r.tool.intents,
                        &r.tool.category,
                    ),
                )
            })
            .collect();
        let calibrated = calibrate_ranked(&scored);

        let hits: Vec<Hit> = results
            .into_iter()
            .zip(calibrated)
            .map(|(result, calib)| Hit {
                id: result.tool.id,
                skill_name: result.tool.skill_name,
                command_name: result.tool.command_name,
                category: result.tool.category,
                final_score: calib.calibrated_score,
                confidence: calib.confidence,
                vector_score: result.vector_score,
                keyword_score: result.keyword_score,
                keywords: result.tool.routing_keywords,
                content_preview: result.tool.description,
            })
            .collect();

        self.search_cache.lock().unwrap().insert(cache_key, hits.clone());
        Ok(hits)
    }

    /// Best single match, or `None` if the catalog is empty.
    pub async fn route(&self, query_text: &str) -> Result<Option<Hit>> {
        Ok(self.search(query_text, 1, None).await?.into_iter().next())
    }

    /// `search` wrapped in a per-call deadline (spec §5 "Timeouts"). The
    /// underlying pipeline has no internal cancellation points to preempt
    /// mid-fusion, so a firing deadline degrades to the last cached result
    /// for this exact query with every hit's confidence forced to `Low`
    /// ("best-effort partial hits"); if nothing is cached yet, the deadline
    /// is surfaced as [`CoreError::DeadlineExceeded`].
    pub async fn search_with_deadline(
        &self,
        query_text: &str,
        k: usize,
        category: Option<&str>,
        deadline: std::time::Duration,
    ) -> Result<Vec<Hit>> {
        match tokio::time::timeout(deadline, self.search(query_text, k, category)).await {
            Ok(result) => result,
            Err(_) => {
                let cache_key: SearchCacheKey = (query_text.to_string(), k, category.map(|c| c.to_string()));
                let cached = self.search_cache.lock().unwrap().get(&cache_key);
                match cached {
                    Some(mut hits) => {
                        for hit in &mut hits {
                            hit.confidence = crate::models::Confidence::Low;
                        }
                        Ok(hits)
                    }
                    None => Err(CoreError::DeadlineExceeded.into()),
                }
            }
        }
    }
}
