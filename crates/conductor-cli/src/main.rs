//! `conductor` command-line front end.

mod config;

use clap::{Parser, Subcommand};
use conductor_security::CredentialResolver;
use conductor_tools::{Catalog, DiscoveryIndex, HashingEmbedding};
use config::ConductorConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conductor", about = "Conductor: supervisor/worker tool orchestration")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "conductor.toml")]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a hub & spoke discovery query against the catalog
    Query {
        /// Free-text description of the tool you need
        text: String,
        /// Restrict hubs and spokes to one domain (overrides config)
        #[arg(long)]
        domain: Option<String>,
        /// Number of results (overrides config)
        #[arg(short)]
        k: Option<usize>,
        /// Catalog JSON file (overrides config)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Validate the config and catalog and print the effective limits
    Check {
        /// Catalog JSON file (overrides config)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load the catalog and embed descriptors that ship without a vector.
async fn load_catalog(path: &Path) -> anyhow::Result<Catalog> {
    let catalog = Catalog::load(path).await.map_err(|e| {
        anyhow::anyhow!("Failed to load catalog '{}': {}", path.display(), e)
    })?;
    let embedder = embedder_for(&catalog);
    Ok(catalog.embed_missing(&embedder).await?)
}

/// Match the dimension of any embeddings the catalog already carries.
fn embedder_for(catalog: &Catalog) -> HashingEmbedding {
    catalog
        .dimension()
        .map_or_else(HashingEmbedding::default, HashingEmbedding::new)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = ConductorConfig::load(&cli.config).await?;
    config.run.validate()?;

    let config_dir = cli
        .config
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    match cli.command {
        Commands::Query {
            text,
            domain,
            k,
            catalog,
        } => {
            let path = config.catalog_path(catalog.as_deref(), &config_dir)?;
            let catalog = load_catalog(&path).await?;
            let embedder = embedder_for(&catalog);
            let index = DiscoveryIndex::new(
                Arc::new(catalog),
                Arc::new(embedder),
                config.run.discovery.clone(),
            );

            let domain = domain.or_else(|| config.run.default_domain_filter.clone());
            let k = k.unwrap_or(config.run.discovery.top_k);
            let matches = index.query(&text, domain.as_deref(), k).await?;

            if matches.is_empty() {
                println!("No tools found.");
            }
            for (rank, m) in matches.iter().enumerate() {
                let via = m
                    .via
                    .as_deref()
                    .map(|hub| format!(" (via {hub})"))
                    .unwrap_or_default();
                println!(
                    "{:>2}. {:.3}  hops={}  {} [{}]{via}",
                    rank + 1,
                    m.score,
                    m.hops,
                    m.tool_id(),
                    m.descriptor.domain
                );
            }
        }
        Commands::Check { catalog } => {
            let run = &config.run;
            println!("Run limits:");
            println!("  recursion_limit            {}", run.recursion_limit);
            println!("  max_tool_calls_per_worker  {}", run.max_tool_calls_per_worker);
            println!("  max_todo_retries           {}", run.max_todo_retries);
            println!("  max_attempts               {}", run.max_attempts);
            println!("  max_parallel_workers       {}", run.max_parallel_workers);
            println!(
                "  backoff                    {}ms..{}ms, jitter {}",
                run.base_delay_ms, run.max_delay_ms, run.jitter
            );
            println!("  dispatch_timeout           {}ms", run.dispatch_timeout_ms);

            let path = config.catalog_path(catalog.as_deref(), &config_dir)?;
            let catalog = load_catalog(&path).await?;
            info!(tools = catalog.len(), "Catalog is valid");

            let resolver = CredentialResolver::new(Arc::new(config.credential_backend()));
            println!("Catalog: {} tools ({})", catalog.len(), path.display());
            for domain in catalog.domains() {
                let tools = catalog.iter().filter(|t| t.domain == domain).count();
                let credential = match resolver.resolve(&run.user_id, &domain).await {
                    Ok(_) => "connected",
                    Err(_) => "no credential",
                };
                println!("  {domain:<20} {tools:>3} tools  {credential}");
            }
        }
    }

    Ok(())
}
