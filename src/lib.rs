//! # Hybrid Router
//!
//! **The hybrid retrieval and routing core of an AI-agent platform.**
//!
//! Given a natural-language query, this crate selects one or more *tools*
//! (commands attached to skills) to invoke. It combines dense vector
//! similarity, sparse keyword relevance (BM25), weighted reciprocal-rank
//! fusion, confidence calibration, intent-driven reweighting, and a
//! relationship-graph rerank on top of a single-factory, bounded-cache
//! columnar store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌──────────────┐
//! │ ToolCatalog  │──▶│  VectorStore   │──▶│ KeywordIndex │
//! │ (ingest)     │   │  (sqlx/SQLite) │   │ (FTS5/BM25)  │
//! └──────────────┘   └───────┬───────┘   └──────┬───────┘
//!                            │                   │
//!                            ▼                   ▼
//!                      ┌──────────────────────────────┐
//!                      │        HybridSearch           │
//!                      │  (weighted RRF + intent boost)│
//!                      └───────────────┬───────────────┘
//!                                      ▼
//!                      RelationshipRerank → KGRerank → ConfidenceCalibrator
//!                                      │
//!                                      ▼
//!                               Orchestrator (search/route)
//! ```
//!
//! ## Data Flow
//!
//! 1. A query enters the [`orchestrator::Orchestrator`]; an optional
//!    [`embedding::Translator`] normalizes non-English queries.
//! 2. [`intent::extract_intent`] produces `(action, target, context,
//!    keywords)`; [`intent::fusion_weights_for`] computes the
//!    [`intent::FusionWeights`] that parameterize every downstream stage.
//! 3. [`search::hybrid_search`] fans out vector and keyword searches in
//!    parallel over the tool table and fuses them with weighted RRF.
//! 4. [`relationship::apply_relationship_rerank`] boosts candidates
//!    connected to the current top results via the tool relationship graph.
//! 5. [`graph::KnowledgeGraph::query_tool_relevance`] adds a bounded,
//!    multi-hop knowledge-graph rerank contribution.
//! 6. [`calibration::calibrate_ranked`] attaches a `high`/`medium`/`low`
//!    confidence band and a bounded `final_score` to each result.
//!
//! Indexing flows the other way: [`catalog::index_skill_tools`] and
//! [`ingest::ingest_document`] write rows and BM25 postings with
//! delete-by-key preceding insert, so re-ingest is always idempotent.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`error`] | Structured error types shared across the core |
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types: tool/knowledge rows, graph entities, `Hit` |
//! | [`db`] | Single-factory `VectorStore` and its bounded table cache |
//! | [`migrate`] | Idempotent schema migrations |
//! | [`embedding`] | `Embedder`/`Translator` oracles and vector utilities |
//! | [`keyword`] | BM25 keyword index with per-field boosts |
//! | [`chunk`] | Token-aware chunker for knowledge documents |
//! | [`catalog`] | Tool catalog ingest and relationship-graph construction |
//! | [`intent`] | Intent extraction and per-query fusion weights |
//! | [`search`] | Hybrid vector+keyword search with weighted RRF |
//! | [`relationship`] | Relationship-graph rerank |
//! | [`graph`] | Knowledge graph entities/relations and KG rerank |
//! | [`calibration`] | Confidence calibration and clear-winner promotion |
//! | [`ingest`] | Knowledge-document chunk ingest with source-keyed replace |
//! | [`orchestrator`] | Public `search`/`route`/`reindex`/`ingest` surface |
//! | [`server`] | HTTP surface (Axum) exposing the orchestrator |
//!
//! ## Configuration
//!
//! The core is configured via a TOML file (default: `config/hrouter.toml`).
//! See [`config`] for all available options and [`config::load_config`] for
//! validation rules.

pub mod calibration;
pub mod catalog;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod intent;
pub mod keyword;
pub mod migrate;
pub mod models;
pub mod orchestrator;
pub mod relationship;
pub mod search;
pub mod server;
