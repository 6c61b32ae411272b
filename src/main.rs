//! bucket-index -- serves a cached listing of an object storage bucket.
//!
//! Startup lists the whole bucket before binding the listener; if that
//! listing fails the process exits without serving.  SIGTERM/SIGINT stop
//! accepting connections and let in-flight requests finish.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use bucket_index::config::{Config, LoggingConfig};

/// Command-line arguments for the bucket index server.
///
/// Everything else is configured through the environment.
#[derive(Parser, Debug)]
#[command(
    name = "bucket-index",
    version,
    about = "Cached HTML/JSON index of an object storage bucket"
)]
struct Cli {
    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

/// Initialize tracing.  `RUST_LOG` wins over `LOG_LEVEL` when set.
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Configuration errors are reported before logging is set up.
    let config = Config::from_env()?;
    init_tracing(&config.logging);

    let bind_addr = cli.bind.unwrap_or_else(|| config.bind_addr());

    bucket_index::metrics::init_metrics();
    bucket_index::metrics::describe_metrics();
    info!("Prometheus metrics initialized");

    let lister = bucket_index::storage::aws::S3Lister::new(&config.storage).await?;

    // The initial listing must succeed before anything is served.
    let cache = bucket_index::cache::Cache::new(
        Arc::new(lister),
        config.site.clone(),
        config.cache.clone(),
    )
    .await?;

    let state = Arc::new(bucket_index::AppState {
        cache: Arc::new(cache),
    });

    let app = bucket_index::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("bucket-index shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
