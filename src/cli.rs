//! Noema CLI - administrative tool for the thought-graph memory engine
//!
//! Usage:
//!   noema init                      Create the layer-mapped collections
//!   noema collections               List collections with purposes
//!   noema health --dim 384          Check dimensional consistency
//!   noema heal --dim 384 --confirm  Destructively recreate mismatches
//!   noema map                       Print the memory map report
//!   noema snapshot [--json]         Print a system snapshot
//!   noema layers                    Show the layer mapping
//!
//! Without `--url` the CLI runs against an in-process backend, which is
//! only useful for demos; point it at a real backend for actual admin work.

use clap::{Parser, Subcommand};
use colored::*;
use noema::{EngineConfig, MemoryEngine, MemoryLayer};

#[derive(Parser)]
#[command(name = "noema")]
#[command(about = "Noema - thought-graph memory engine for AI agents")]
#[command(version)]
struct Cli {
    /// Vector backend URL (requires the `qdrant` feature)
    #[arg(long, env = "NOEMA_BACKEND_URL")]
    url: Option<String>,

    /// Backend API key
    #[arg(long, env = "NOEMA_BACKEND_API_KEY")]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create every collection referenced by the layer mapping
    Init,

    /// List collections with purposes and links
    Collections,

    /// Check that every collection matches the expected dimension
    Health {
        /// Expected embedding dimension
        #[arg(short, long, default_value_t = noema::DEFAULT_DIMENSION)]
        dim: usize,
    },

    /// Delete and recreate mismatched collections empty (destructive)
    Heal {
        /// Target embedding dimension
        #[arg(short, long, default_value_t = noema::DEFAULT_DIMENSION)]
        dim: usize,

        /// Acknowledge that mismatched collections lose all data
        #[arg(long)]
        confirm: bool,
    },

    /// Print the categorized memory map report
    Map,

    /// Print a point-in-time snapshot of the memory system
    Snapshot {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the cognitive layer mapping
    Layers,

    /// Reconstruct causal chains from a thought
    Chains {
        /// Session id
        #[arg(short, long)]
        session: String,

        /// Starting thought id
        start: String,

        /// Maximum chain length in nodes
        #[arg(short, long, default_value = "5")]
        depth: usize,
    },
}

fn build_engine(url: Option<String>, api_key: Option<String>) -> anyhow::Result<MemoryEngine> {
    match url {
        #[cfg(feature = "qdrant")]
        Some(url) => {
            let mut store = noema::QdrantStore::new(url);
            if let Some(key) = api_key {
                store = store.with_api_key(key);
            }
            Ok(MemoryEngine::new(
                std::sync::Arc::new(store),
                Some(std::sync::Arc::new(noema::HashEmbeddingProvider::default())),
                EngineConfig::default(),
            ))
        }
        #[cfg(not(feature = "qdrant"))]
        Some(_) => {
            anyhow::bail!("--url requires a build with the `qdrant` feature")
        }
        None => {
            let _ = api_key;
            eprintln!(
                "{}",
                "no --url given, using an in-process backend (demo mode)".yellow()
            );
            Ok(MemoryEngine::in_memory())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let engine = build_engine(cli.url, cli.api_key)?;

    match cli.command {
        Commands::Init => cmd_init(&engine).await,
        Commands::Collections => cmd_collections(&engine).await,
        Commands::Health { dim } => cmd_health(&engine, dim).await,
        Commands::Heal { dim, confirm } => cmd_heal(&engine, dim, confirm).await,
        Commands::Map => cmd_map(&engine).await,
        Commands::Snapshot { json } => cmd_snapshot(&engine, json).await,
        Commands::Layers => cmd_layers(&engine),
        Commands::Chains {
            session,
            start,
            depth,
        } => cmd_chains(&engine, &session, &start, depth).await,
    }
}

async fn cmd_chains(
    engine: &MemoryEngine,
    session: &str,
    start: &str,
    depth: usize,
) -> anyhow::Result<()> {
    let start = noema::parse_point_id(start)?;
    let chains = engine.explain(session, start, depth).await?;

    if chains.is_empty() {
        println!("{}", "no outgoing chains from this thought".yellow());
        return Ok(());
    }
    for chain in chains {
        println!("{}", chain.summary());
    }
    Ok(())
}

async fn cmd_init(engine: &MemoryEngine) -> anyhow::Result<()> {
    engine.initialize().await?;
    println!("{}", "layer collections ready".green());
    Ok(())
}

async fn cmd_collections(engine: &MemoryEngine) -> anyhow::Result<()> {
    let infos = engine.admin().list_collections().await?;
    if infos.is_empty() {
        println!("{}", "no collections (run `noema init` first?)".yellow());
        return Ok(());
    }

    for info in infos {
        println!(
            "{}  dim {}  points {}  status {}",
            info.name.bold(),
            info.vector_size,
            info.points_count,
            paint_status(&info.status.to_string()),
        );
        if let Some(purpose) = info.purpose {
            println!("    {}", purpose.dimmed());
        }
        if !info.linked_collections.is_empty() {
            println!("    linked: {}", info.linked_collections.join(", ").dimmed());
        }
    }
    Ok(())
}

async fn cmd_health(engine: &MemoryEngine, dim: usize) -> anyhow::Result<()> {
    let report = engine.admin().health_check(dim).await?;

    for entry in &report.entries {
        let marker = if entry.dimension_mismatch {
            format!("MISMATCH (expected {dim})").red().to_string()
        } else {
            "ok".green().to_string()
        };
        println!(
            "{}  dim {}  points {}  {}",
            entry.name.bold(),
            entry.vector_size,
            entry.points_count,
            marker
        );
    }

    if report.is_healthy() {
        println!("\n{}", "all collections consistent".green());
    } else {
        println!(
            "\n{} mismatched collection(s); run `noema heal --dim {} --confirm` to rebuild them {}",
            report.mismatched().len().to_string().red(),
            dim,
            "(destroys their data)".red().bold(),
        );
    }
    Ok(())
}

async fn cmd_heal(engine: &MemoryEngine, dim: usize, confirm: bool) -> anyhow::Result<()> {
    let report = engine.admin().auto_heal(dim, confirm).await?;

    if report.healed.is_empty() {
        println!("{}", "nothing to heal".green());
    } else {
        for name in &report.healed {
            println!("{} {}", "recreated".red(), name.bold());
        }
        println!(
            "{} collection(s) now empty at dim {}",
            report.healed.len(),
            report.target_dimension
        );
    }
    Ok(())
}

async fn cmd_map(engine: &MemoryEngine) -> anyhow::Result<()> {
    println!("{}", engine.admin().generate_memory_map().await?);
    Ok(())
}

async fn cmd_snapshot(engine: &MemoryEngine, json: bool) -> anyhow::Result<()> {
    let snapshot = engine.snapshot().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("{} {}", "snapshot at".bold(), snapshot.taken_at);
    println!(
        "collections: {} ({} healthy, {} unhealthy)",
        snapshot.stats.collection_count,
        snapshot.stats.healthy_collections.to_string().green(),
        snapshot.stats.unhealthy_collections.to_string().red(),
    );
    println!(
        "vectors: {}   links: {}",
        snapshot.stats.total_vectors, snapshot.stats.link_count
    );
    for (dim, count) in &snapshot.stats.dimension_histogram {
        println!("  dim {dim}: {count} collection(s)");
    }
    println!("{}", "per-layer vectors:".bold());
    for (layer, count) in &snapshot.layer_counts {
        println!("  {layer}: {count}");
    }
    Ok(())
}

fn cmd_layers(engine: &MemoryEngine) -> anyhow::Result<()> {
    for mapping in engine.layers().mappings() {
        println!(
            "{} (retention {:.1})",
            mapping.layer.to_string().bold(),
            mapping.retention_priority
        );
        println!("    {}", mapping.description.dimmed());
        for name in &mapping.collections {
            let owner = engine
                .layers()
                .layer_for_collection(name)
                .map(|l: MemoryLayer| l.to_string())
                .unwrap_or_default();
            println!("    {name} (owned by {owner})");
        }
    }
    Ok(())
}

fn paint_status(status: &str) -> ColoredString {
    match status {
        "green" => status.green(),
        "yellow" => status.yellow(),
        _ => status.red(),
    }
}
