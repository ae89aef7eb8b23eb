//! exoseer-vet - Transit Vetting Service
//!
//! `serve` runs the HTTP API; `analyze` vets a single light curve file and
//! prints the report as JSON.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exoseer_common::config::{ConfigResolver, TomlConfig};
use exoseer_vet::advisor::{Advisor, ChatCompletionsAdvisor};
use exoseer_vet::services::photometry::DEFAULT_CLIP_SIGMA;
use exoseer_vet::services::{DirectoryPhotometry, ExoplanetArchiveClient};
use exoseer_vet::types::{Candidate, LightCurveSeries};
use exoseer_vet::workflow::{Pipeline, PipelineConfig};
use exoseer_vet::{build_router, AppState};

/// Command-line arguments for exoseer-vet
#[derive(Parser, Debug)]
#[command(name = "exoseer-vet")]
#[command(about = "Transit vetting pipeline and HTTP service")]
#[command(version)]
struct Cli {
    /// Configuration file (overrides EXOSEER_CONFIG and the platform default)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,
    },

    /// Vet one light curve and print the report
    Analyze {
        /// Light curve JSON file ({"time": [...], "flux": [...], ...})
        #[arg(short, long)]
        light_curve: PathBuf,

        /// Candidate JSON file (name, star_radius, orbital_period, ...)
        #[arg(long)]
        candidate: Option<PathBuf>,

        /// Target name when no candidate file is given
        #[arg(short, long)]
        target: Option<String>,

        /// Seed for the centroid estimator
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolver = ConfigResolver::new(cli.config.clone());
    let config = resolver
        .load()
        .context("Failed to load configuration")?;

    init_tracing(&config.logging.level);

    info!(
        "Starting exoseer-vet v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match resolver.config_path() {
        Some(path) if path.exists() => info!("Configuration: {}", path.display()),
        _ => info!("Configuration: compiled defaults"),
    }

    match cli.command {
        Command::Serve { port, host } => serve(config, port, host).await,
        Command::Analyze {
            light_curve,
            candidate,
            target,
            seed,
        } => analyze(config, &light_curve, candidate.as_deref(), target, seed).await,
    }
}

/// Logs go to stderr so `analyze` output stays machine-readable
fn init_tracing(level: &str) {
    let default_filter = format!("exoseer_vet={level},tower_http={level}");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Pipeline with the configured advisor attached when enabled
fn build_pipeline(config: &TomlConfig, seed: Option<u64>) -> Result<Pipeline> {
    let mut pipeline_config = PipelineConfig::from_toml(config);
    if seed.is_some() {
        pipeline_config.centroid_seed = seed;
    }

    let pipeline = Pipeline::new(pipeline_config);
    if !config.advisor.enabled {
        info!("Advisor disabled, stages use numeric results and defaults");
        return Ok(pipeline);
    }

    let advisor = ChatCompletionsAdvisor::new(&config.advisor)
        .context("Failed to initialize advisor client")?;
    info!(
        "Advisor: {} at {} (timeout {}s)",
        advisor.name(),
        config.advisor.endpoint,
        config.advisor.timeout_secs
    );
    Ok(pipeline.with_advisor(Arc::new(advisor)))
}

async fn serve(config: TomlConfig, port: Option<u16>, host: Option<String>) -> Result<()> {
    let pipeline = build_pipeline(&config, None)?;

    let catalog = ExoplanetArchiveClient::new(&config.catalog)
        .context("Failed to initialize catalog client")?;
    info!("Catalog: {}", config.catalog.tap_url);

    let data_dir = config.photometry.data_dir();
    let photometry = DirectoryPhotometry::new(&data_dir)
        .with_clip_sigma(config.photometry.clip_sigma.unwrap_or(DEFAULT_CLIP_SIGMA));
    info!("Light curves: {}", data_dir.display());

    let state = AppState::new(pipeline, Arc::new(catalog), Arc::new(photometry));
    let app = build_router(state);

    let host = host.unwrap_or(config.server.host);
    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn analyze(
    config: TomlConfig,
    light_curve: &Path,
    candidate: Option<&Path>,
    target: Option<String>,
    seed: Option<u64>,
) -> Result<()> {
    let content = std::fs::read_to_string(light_curve)
        .with_context(|| format!("Failed to read {}", light_curve.display()))?;
    let mut series: LightCurveSeries = serde_json::from_str(&content)
        .with_context(|| format!("Invalid light curve {}", light_curve.display()))?;
    series.length = series.time.len();

    let candidate = match candidate {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<Candidate>(&content)
                .with_context(|| format!("Invalid candidate {}", path.display()))?
        }
        None => {
            let name = target
                .or_else(|| (!series.target_name.is_empty()).then(|| series.target_name.clone()))
                .or_else(|| {
                    light_curve
                        .file_stem()
                        .map(|stem| stem.to_string_lossy().into_owned())
                })
                .unwrap_or_else(|| "unknown".to_string());
            Candidate::named(name)
        }
    };
    if series.target_name.is_empty() {
        series.target_name = candidate.name.clone();
    }

    let pipeline = build_pipeline(&config, seed)?;
    let report = pipeline.run(&series, &candidate).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
