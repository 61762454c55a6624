use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use catalog_ratelimit::config::{LoggingConfig, ServiceConfig};
use catalog_ratelimit::ratelimit::RateLimiter;
use catalog_ratelimit::replay::Replayer;

/// Replay request lines (`<policy> [client]`) from stdin through the catalog
/// rate limiter and print one JSON decision per line.
#[derive(Debug, Parser)]
#[command(name = "catalog-ratelimit", version, about)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the maximum number of tracked tokens
    #[arg(long)]
    capacity: Option<usize>,

    /// Override the counter window in milliseconds
    #[arg(long)]
    window_ms: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServiceConfig::from_file(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(capacity) = cli.capacity {
        config.limiter.capacity = capacity;
    }
    if let Some(window_ms) = cli.window_ms {
        config.limiter.window_ms = window_ms;
    }
    config.logging.json |= cli.json_logs;
    config.validate()?;

    init_tracing(&config.logging);

    info!("Starting catalog rate limiter replay");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        capacity = config.limiter.capacity,
        window_ms = config.limiter.window_ms,
        policies = config.policies.len(),
        "Configuration loaded"
    );

    let limiter_config = config.limiter.limiter_config();
    let limiter = RateLimiter::new(limiter_config)?;
    let replayer = Replayer::new(&limiter, &config.policies, limiter_config.window);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut checked = 0u64;
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut shutdown => break,
        };
        let Some(line) = line else {
            break;
        };

        if let Some(output) = replayer.replay_line(&line).await {
            let mut rendered = serde_json::to_vec(&output)?;
            rendered.push(b'\n');
            stdout.write_all(&rendered).await?;
            checked += 1;
        }
    }
    stdout.flush().await?;

    info!(
        checked = checked,
        tracked_tokens = limiter.counter_count(),
        "Catalog rate limiter replay finished"
    );
    Ok(())
}

/// Install the tracing subscriber. Logs go to stderr; stdout carries decisions.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping replay");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping replay");
        }
    }
}
