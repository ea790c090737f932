//! coachdesk REST server
//!
//! Serves the platform over HTTP on top of the durable store and runs the
//! maintenance sweep once a day.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use coachdesk::config::ServerConfig;
use coachdesk::schedule::next_sweep_at;
use coachdesk::storage::{open_database, PersistentStores};
use coachdesk::{transport, Platform, SweepPolicy, SystemClock};

/// Command-line flags; each overrides its `COACHDESK_*` variable.
#[derive(Debug, Parser)]
#[command(name = "coachdesk-server", version, about = "coachdesk REST server")]
struct Args {
    /// Address to listen on.
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Database directory.
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Load demo data on startup.
    #[arg(long)]
    seed: bool,

    /// Hour of day (UTC) of the daily sweep.
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
    sweep_hour: Option<u32>,

    /// Browser origin allowed to call the API (repeatable).
    #[arg(long = "cors-origin")]
    cors_origins: Vec<String>,
}

impl Args {
    fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if self.seed {
            config.seed = true;
        }
        if let Some(hour) = self.sweep_hour {
            config.sweep_hour = hour;
        }
        if !self.cors_origins.is_empty() {
            config.cors_origins = self.cors_origins;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = args.apply(ServerConfig::from_env()?);
    config.validate()?;
    tracing::info!(?config, "starting coachdesk-server");

    let database = Arc::new(open_database(&config.data_dir, None)?);
    let platform = Platform::new(database.stores(), Arc::new(SystemClock), SweepPolicy::default());

    if config.seed {
        let report = platform.seed_demo_data()?;
        tracing::info!(exercises = report.exercises, users = report.users.len(), "seed finished");
    }

    tokio::spawn(daily_sweep(platform.clone(), Arc::clone(&database), config.sweep_hour));

    let listener = TcpListener::bind(config.bind).await?;
    let origins = transport::parse_origins(&config.cors_origins)?;
    transport::serve(listener, transport::router(platform, &origins), shutdown_signal()).await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn daily_sweep(platform: Platform, database: Arc<PersistentStores>, hour: u32) {
    loop {
        let now = Utc::now();
        let next = next_sweep_at(now, hour);
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::info!(at = %next, "next sweep scheduled");
        tokio::time::sleep(wait).await;

        let platform = platform.clone();
        let database = Arc::clone(&database);
        let outcome = tokio::task::spawn_blocking(move || {
            platform.run_sweep()?;
            if database.needs_compaction() {
                database.compact()?;
            }
            Ok::<_, coachdesk::CoachError>(())
        })
        .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "daily sweep failed"),
            Err(e) => tracing::error!(error = %e, "daily sweep task panicked"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
