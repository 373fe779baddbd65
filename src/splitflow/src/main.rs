//! Splitflow — Bayesian traffic-splitting service for A/B campaigns.
//!
//! Main entry point that wires the engine together and starts the server.

use clap::Parser;
use splitflow_api::ApiServer;
use splitflow_core::AppConfig;
use splitflow_engine::{AssignmentCoordinator, VariantStore};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "splitflow")]
#[command(about = "Bayesian traffic-splitting service for A/B campaigns")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "SPLITFLOW__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "SPLITFLOW__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Exploration rate for epsilon-greedy allocation (overrides config)
    #[arg(long, env = "SPLITFLOW__ENGINE__EPSILON")]
    epsilon: Option<f64>,

    /// Default allocation strategy (overrides config)
    #[arg(long, env = "SPLITFLOW__ENGINE__DEFAULT_STRATEGY")]
    strategy: Option<String>,

    /// Seed the "Test Home Page" demo campaign at startup
    #[arg(long, default_value_t = false)]
    seed_demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "splitflow=info,splitflow_engine=info,splitflow_api=info,tower_http=info".into()
                }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Splitflow starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(epsilon) = cli.epsilon {
        config.engine.epsilon = epsilon;
    }
    if let Some(strategy) = cli.strategy {
        config.engine.default_strategy = strategy;
    }
    config.validate()?;

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        epsilon = config.engine.epsilon,
        default_strategy = %config.engine.default_strategy,
        "Configuration loaded"
    );

    // Initialize the engine
    let store = Arc::new(VariantStore::new());
    let coordinator = Arc::new(AssignmentCoordinator::new());

    if cli.seed_demo {
        match store.seed_demo_data() {
            Ok(()) => info!("Demo campaign seeded"),
            Err(e) => error!(error = %e, "Failed to seed demo campaign"),
        }
    }

    // Start API server
    let api_server = ApiServer::new(config, store, coordinator);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Splitflow is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
