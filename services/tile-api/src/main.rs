//! Tile overlay API service.
//!
//! HTTP server producing lazily-expanding KML overlay documents and
//! dynamically composited map tiles for 3-D globe viewers.

mod cache;
mod compositor;
mod fetch;
mod handlers;
mod state;
mod warp;

use anyhow::Result;
use axum::{extract::Extension, routing::get, Router};
use clap::Parser;
use std::{env, net::SocketAddr, sync::Arc};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "tile-api")]
#[command(about = "Dynamic KML overlay and tile reprojection server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Public base URL substituted into recursive document links
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    public_url: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of worker threads (default: number of CPU cores)
    #[arg(long)]
    worker_threads: Option<usize>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // One worker per processor unless overridden by CLI or environment.
    let workers = args
        .worker_threads
        .or_else(|| {
            env::var("TILE_API_WORKER_THREADS")
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .unwrap_or_else(num_cpus::get);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .enable_all()
        .build()?;
    runtime.block_on(async_main(args, workers))?;
    Ok(())
}

async fn async_main(args: Args, workers: usize) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    info!(workers, "Starting tile overlay server");

    let state = Arc::new(AppState::new(&args.public_url, workers)?);

    let app = Router::new()
        // LOD document endpoint (recursive re-entry point)
        .route("/", get(handlers::document_handler))
        // Dynamic tile compositor
        .route("/tiles", get(handlers::tile_handler))
        .route("/tiles/", get(handlers::tile_handler))
        // Transparent fallback image
        .route("/placeholder.png", get(handlers::placeholder_handler))
        // Health and metrics
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(Extension(state))
        .layer(Extension(prometheus_handle))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = args.listen.parse()?;
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
