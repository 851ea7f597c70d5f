//! pacer-daemon - SLA compliance sweep daemon binary.
//!
//! Loads configuration, wires the sweep runner, and either runs a single
//! sweep (`--once`, report printed as JSON) or the interval scheduler.
//! The binary ships with the in-memory store so it can run standalone;
//! production deployments embed the library and supply their own
//! [`pacer_daemon::EntityStore`] implementation.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pacer_daemon::{
    DaemonConfig, InMemoryStore, LoggingDispatcher, SweepMetrics, SweepOptions, SweepRunner,
    SweepScheduler, SweepScope,
};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// SLA compliance sweep daemon.
#[derive(Parser, Debug)]
#[command(name = "pacer-daemon")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "pacer.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run a single sweep and print the report instead of scheduling.
    #[arg(long)]
    once: bool,

    /// Evaluate without persisting violations or dispatching
    /// notifications.
    #[arg(long)]
    dry_run: bool,

    /// Restrict the sweep to one tenant (implies --once).
    #[arg(long)]
    tenant: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&cli.log_level).context("invalid log level")?)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = if cli.config.exists() {
        DaemonConfig::from_file(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?
    } else {
        info!(path = %cli.config.display(), "no configuration file, using defaults");
        DaemonConfig::default()
    };

    let store = Arc::new(InMemoryStore::new());
    let metrics = Arc::new(SweepMetrics::new().context("registering metrics")?);
    let runner = SweepRunner::new(
        Arc::clone(&store) as Arc<dyn pacer_daemon::EntityStore>,
        Arc::new(LoggingDispatcher),
        store as Arc<dyn pacer_daemon::TenantDirectory>,
        SweepOptions {
            max_concurrent_tenants: config.sweep.max_concurrent_tenants,
            evaluator: config.evaluator_config(),
        },
        metrics,
    );

    let dry_run = cli.dry_run || config.sweep.dry_run;
    if cli.once || cli.tenant.is_some() {
        let scope = match cli.tenant {
            Some(tenant_id) => SweepScope::Tenant(tenant_id),
            None => SweepScope::All,
        };
        let report = runner.run_sweep(scope, dry_run).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let scheduler = SweepScheduler::new(
        runner,
        Duration::from_secs(config.sweep.interval_secs),
        dry_run,
    );
    let shutdown = scheduler.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    scheduler.run().await;
    Ok(())
}
