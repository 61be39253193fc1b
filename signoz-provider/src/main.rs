//! signoz-provider: reconciles SigNoz dashboards, alert rules and
//! notification channels against declarative records.
//!
//! Records are loaded from JSON manifests into the in-memory store; one
//! controller per managed kind keeps the remote side in sync until the
//! process receives SIGINT or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signoz_provider::apis::{register_all, Registry};
use signoz_provider::controller::{ControllerOptions, ControllerSet};
use signoz_provider::reconciler::{self, ShutdownSignal};
use signoz_provider::store::MemoryStore;

/// SigNoz provider
#[derive(Parser, Debug)]
#[command(name = "signoz-provider", version, about)]
struct Args {
    /// JSON manifest with records to load (repeatable)
    #[arg(long = "manifests", short = 'm')]
    manifests: Vec<PathBuf>,

    /// Interval in seconds between full resyncs
    #[arg(long, default_value = "600", value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: u64,

    /// Reconciles running at once, per kind
    #[arg(long, default_value = "10", value_parser = parse_concurrency)]
    max_concurrent_reconciles: usize,

    /// Enable debug logging
    #[arg(long, short = 'd')]
    debug: bool,
}

fn parse_concurrency(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug {
        "signoz_provider=debug"
    } else {
        "signoz_provider=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting signoz-provider");

    let store = Arc::new(MemoryStore::new());
    for path in &args.manifests {
        let count = store
            .load_manifest(path)
            .await
            .with_context(|| format!("failed to load manifest {}", path.display()))?;
        info!("Loaded {} records from {}", count, path.display());
    }

    let mut registry = Registry::default();
    register_all(&mut registry)?;

    let options = ControllerOptions {
        poll_interval: Duration::from_secs(args.poll_interval),
        max_concurrent_reconciles: args.max_concurrent_reconciles,
        ..Default::default()
    };
    let mut controllers = ControllerSet::new(options);
    reconciler::setup(&mut controllers, &registry, store.clone());
    info!("Controllers: {:?}", controllers.kinds());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sigint = signal(SignalKind::interrupt()).context("failed to set up SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to set up SIGTERM handler")?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
        let _ = shutdown_tx.send(true);
    });

    controllers
        .run(store.as_ref(), ShutdownSignal::new(shutdown_rx))
        .await;

    info!("Provider stopped");
    Ok(())
}
