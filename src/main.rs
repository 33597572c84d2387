//! # Hybrid Router CLI
//!
//! `hrouter` is the command-line surface over [`hybrid_router`]'s retrieval
//! and routing core: initialize the store, reindex a skill manifest, search
//! or route a query, ingest a knowledge document, and serve the HTTP
//! surface.
//!
//! ## Architecture
//!
//! ```text
//! Skill manifest (JSON) → reindex → VectorStore + KeywordIndex + KnowledgeGraph
//! Query → search/route → Orchestrator → ranked Hits
//! Document → ingest → IngestPipeline → knowledge_chunks
//! ```

use clap::{Parser, Subcommand};
use hybrid_router::config;
use hybrid_router::models::ToolManifestEntry;
use hybrid_router::orchestrator::Orchestrator;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "hrouter",
    about = "Hybrid vector/keyword retrieval and tool-routing core",
    version
)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./config/hrouter.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the store schema
    Init,

    /// Reindex a skill manifest into the tool catalog, keyword index, and
    /// knowledge graph
    Index {
        /// Path to a JSON skill manifest (array of `{skill_name, tools}`)
        manifest: PathBuf,
    },

    /// Search indexed tools
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(long, default_value_t = 10)]
        k: usize,

        /// Restrict results to one category
        #[arg(long)]
        category: Option<String>,
    },

    /// Return the single best-routed tool for a query
    Route {
        /// Search query
        query: String,
    },

    /// Ingest a plaintext knowledge document
    Ingest {
        /// Stable source key for the document (path or URI)
        source: String,

        /// Path to the document's already-extracted plaintext
        text_file: PathBuf,
    },

    /// Start the HTTP server
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

#[derive(Subcommand)]
enum ServeService {
    /// Start the MCP-backing HTTP server
    Mcp,
}

/// One skill's worth of tool manifest entries, as supplied by the skill
/// loader (out of scope for this core; the CLI reads its serialized form).
#[derive(Deserialize)]
struct SkillManifest {
    skill_name: String,
    tools: Vec<ToolManifestEntry>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = hybrid_router::db::get_vector_store(&cfg.store).await?;
            hybrid_router::migrate::run_migrations(&store.pool).await?;
            println!("Store initialized at {}", cfg.store.storage_path.display());
        }
        Commands::Index { manifest } => {
            let raw = std::fs::read_to_string(&manifest)?;
            let manifests: Vec<SkillManifest> = serde_json::from_str(&raw)?;
            let skills: Vec<(String, Vec<ToolManifestEntry>)> = manifests
                .into_iter()
                .map(|m| (m.skill_name, m.tools))
                .collect();

            let orchestrator = Orchestrator::new(cfg).await?;
            orchestrator.reindex(&skills).await?;
            println!("Reindexed {} skill(s)", skills.len());
        }
        Commands::Search { query, k, category } => {
            let orchestrator = Orchestrator::new(cfg).await?;
            let hits = orchestrator.search(&query, k, category.as_deref()).await?;
            print_hits(&hits);
        }
        Commands::Route { query } => {
            let orchestrator = Orchestrator::new(cfg).await?;
            match orchestrator.route(&query).await? {
                Some(hit) => print_hits(std::slice::from_ref(&hit)),
                None => println!("No route found."),
            }
        }
        Commands::Ingest { source, text_file } => {
            let text = std::fs::read_to_string(&text_file)?;
            let orchestrator = Orchestrator::new(cfg).await?;
            let chunks = orchestrator.ingest(&source, &text).await?;
            println!("Ingested {} chunk(s) for source '{}'", chunks.len(), source);
        }
        Commands::Serve { service } => match service {
            ServeService::Mcp => {
                hybrid_router::server::run_server(cfg).await?;
            }
        },
    }

    Ok(())
}

fn print_hits(hits: &[hybrid_router::models::Hit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{:>2}. {:<32} [{:?}] final={:.3} vector={:.3} keyword={:.3} — {}",
            rank + 1,
            hit.id,
            hit.confidence,
            hit.final_score,
            hit.vector_score,
            hit.keyword_score,
            hit.content_preview,
        );
    }
}
