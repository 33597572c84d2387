//! Configuration parsing and validation.
//!
//! The retrieval core is configured via a TOML file (default:
//! `config/hrouter.toml`). The core never parses configuration files itself
//! in production use — [`load_config`] is a convenience wrapper for the CLI
//! and tests; library callers may construct [`Config`] directly.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub hybrid: HybridConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_index_cache_bytes")]
    pub index_cache_size_bytes: u64,
    #[serde(default = "default_max_cached_tables")]
    pub max_cached_tables: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            dimension: default_dimension(),
            index_cache_size_bytes: default_index_cache_bytes(),
            max_cached_tables: default_max_cached_tables(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(".cache/hrouter")
}
fn default_dimension() -> usize {
    1024
}
fn default_index_cache_bytes() -> u64 {
    512 * 1024 * 1024
}
fn default_max_cached_tables() -> usize {
    16
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_profile")]
    pub active_profile: String,
    #[serde(default = "default_cache_max_size")]
    pub cache_max_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            active_profile: default_profile(),
            cache_max_size: default_cache_max_size(),
        }
    }
}

fn default_profile() -> String {
    "balanced".to_string()
}
fn default_cache_max_size() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct HybridConfig {
    #[serde(default = "default_kappa")]
    pub kappa: f32,
    #[serde(default = "default_boost_tool_name")]
    pub field_boost_tool_name: f32,
    #[serde(default = "default_boost_intents")]
    pub field_boost_intents: f32,
    #[serde(default = "default_boost_routing_keywords")]
    pub field_boost_routing_keywords: f32,
    #[serde(default = "default_boost_description")]
    pub field_boost_description: f32,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            kappa: default_kappa(),
            field_boost_tool_name: default_boost_tool_name(),
            field_boost_intents: default_boost_intents(),
            field_boost_routing_keywords: default_boost_routing_keywords(),
            field_boost_description: default_boost_description(),
        }
    }
}

fn default_kappa() -> f32 {
    60.0
}
fn default_boost_tool_name() -> f32 {
    5.0
}
fn default_boost_intents() -> f32 {
    4.0
}
fn default_boost_routing_keywords() -> f32 {
    3.0
}
fn default_boost_description() -> f32 {
    1.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_chunk_size_tokens")]
    pub chunk_size_tokens: usize,
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
    #[serde(default)]
    pub extract_images: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: default_chunk_size_tokens(),
            overlap_tokens: default_overlap_tokens(),
            extract_images: false,
        }
    }
}

fn default_chunk_size_tokens() -> usize {
    512
}
fn default_overlap_tokens() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct GraphConfig {
    #[serde(default = "default_same_skill_weight")]
    pub same_skill_weight: f32,
    #[serde(default = "default_shared_ref_weight")]
    pub shared_ref_weight: f32,
    #[serde(default = "default_keyword_overlap_threshold")]
    pub keyword_overlap_threshold: f32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            same_skill_weight: default_same_skill_weight(),
            shared_ref_weight: default_shared_ref_weight(),
            keyword_overlap_threshold: default_keyword_overlap_threshold(),
        }
    }
}

fn default_same_skill_weight() -> f32 {
    0.6
}
fn default_shared_ref_weight() -> f32 {
    0.8
}
fn default_keyword_overlap_threshold() -> f32 {
    0.3
}

#[derive(Debug, Deserialize, Clone)]
pub struct IntentConfig {
    #[serde(default = "default_action_vocab")]
    pub action_vocab: Vec<String>,
    #[serde(default = "default_target_vocab")]
    pub target_vocab: Vec<String>,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            action_vocab: default_action_vocab(),
            target_vocab: default_target_vocab(),
        }
    }
}

fn default_action_vocab() -> Vec<String> {
    [
        "search", "commit", "create", "analyze", "research", "run", "push", "pull", "status",
        "delete", "update", "list",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_target_vocab() -> Vec<String> {
    [
        "knowledge", "code", "git", "web", "skill", "database", "docs", "file",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "deterministic".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.store.dimension == 0 {
        anyhow::bail!("store.dimension must be > 0");
    }
    if config.hybrid.kappa <= 0.0 {
        anyhow::bail!("hybrid.kappa must be > 0");
    }
    if config.store.max_cached_tables == 0 {
        anyhow::bail!("store.max_cached_tables must be > 0");
    }
    if config.ingest.chunk_size_tokens == 0 {
        anyhow::bail!("ingest.chunk_size_tokens must be > 0");
    }
    if config.ingest.overlap_tokens >= config.ingest.chunk_size_tokens {
        anyhow::bail!("ingest.overlap_tokens must be < ingest.chunk_size_tokens");
    }
    if config.search.active_profile != "balanced" {
        anyhow::bail!(
            "Unknown calibration profile: '{}'. Only 'balanced' is defined.",
            config.search.active_profile
        );
    }

    match config.embedding.provider.as_str() {
        "deterministic" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be deterministic or openai.",
            other
        ),
    }
    if config.embedding.provider == "openai" && config.embedding.model.is_none() {
        anyhow::bail!("embedding.model must be specified when provider is 'openai'");
    }

    Ok(config)
}
