//! Magpie Server - HTTP control surface for the ingestion service.

mod app;

use anyhow::Context as _;
use app::AppState;
use clap::Parser;
use magpie_chunk::ChunkingEngine;
use magpie_config::Config;
use magpie_crawl::Crawler;
use magpie_embed::{DenseClient, SparseClient};
use magpie_jobs::{IngestContext, Orchestrator, RenderManager};
use magpie_vector::{QdrantClient, VectorStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Magpie - hybrid-index ingestion service
#[derive(Parser)]
#[command(name = "magpie-server")]
#[command(version)]
#[command(about = "Ingest documents, URL lists, and site crawls into a hybrid vector index", long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, env = "MAGPIE_CONFIG", default_value = "magpie.toml")]
    config: PathBuf,

    /// Override the bind address from the config file
    #[arg(long, env = "MAGPIE_BIND")]
    bind: Option<String>,

    /// Write a commented default config file and exit
    #[arg(long)]
    init_config: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.init_config {
        std::fs::write(&cli.config, Config::default_config_string())
            .with_context(|| format!("failed to write {}", cli.config.display()))?;
        println!("Wrote default config to {}", cli.config.display());
        return Ok(());
    }

    let config = Config::load_from(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    let state = build_state(&config)?;
    let bind = cli.bind.unwrap_or_else(|| config.server.bind.clone());

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("magpie-server listening on http://{bind}");

    axum::serve(listener, app::router(state))
        .await
        .context("server shutdown")?;
    Ok(())
}

fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let dense = DenseClient::from_config(&config.embedding)?;
    let sparse = SparseClient::from_config(&config.embedding)?;
    let qdrant = QdrantClient::from_config(&config.qdrant)?;

    let store = VectorStore::new(qdrant, dense.clone(), sparse, config.embedding.dimension);
    let engine = Arc::new(ChunkingEngine::new(
        Arc::new(dense),
        config.embedding.window,
    ));
    let crawler = Arc::new(Crawler::from_config(&config.crawl)?);
    let renderer = Arc::new(RenderManager::new(config.render.clone()));

    let ctx = IngestContext {
        store,
        engine,
        crawler,
        renderer,
        batch_size: config.server.upsert_batch_size,
    };

    Ok(AppState {
        orchestrator: Orchestrator::new(ctx),
    })
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("magpie=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("magpie=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
