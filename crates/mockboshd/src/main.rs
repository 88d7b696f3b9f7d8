//! mockboshd — a mock BOSH Director.
//!
//! Serves the Director REST API over an in-memory store seeded with sample
//! `cf`, `redis` and `mysql` deployments. Long-running operations are
//! simulated with time-scaled tasks.
//!
//! # Usage
//!
//! ```text
//! mockboshd --port 25555 --speed 10 --debug
//! mockboshd --config mockboshd.toml --username ops --password secret
//! ```

mod config;

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mockbosh_api::{ApiState, Credentials};
use mockbosh_state::EntityStore;

use crate::config::ServerConfig;

const DEBUG_FILTER: &str =
    "info,mockboshd=debug,mockbosh_api=debug,mockbosh_tasks=debug,mockbosh_state=debug,tower_http=debug";

#[derive(Parser)]
#[command(name = "mockboshd", version, about = "Mock BOSH Director")]
struct Cli {
    /// TOML config file; flags given on the command line override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on [default: 25555].
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind [default: 0.0.0.0].
    #[arg(long)]
    bind: Option<String>,

    /// Basic-auth username [default: admin].
    #[arg(long)]
    username: Option<String>,

    /// Basic-auth password [default: admin].
    #[arg(long)]
    password: Option<String>,

    /// Simulation speed multiplier [default: 1.0].
    #[arg(long)]
    speed: Option<f64>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(username) = self.username {
            config.username = username;
        }
        if let Some(password) = self.password {
            config.password = password;
        }
        if let Some(speed) = self.speed {
            config.speed = speed;
        }
        config.debug |= self.debug;
        Ok(config)
    }
}

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { DEBUG_FILTER } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Ctrl-C received"),
        () = terminate => info!("SIGTERM received"),
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config()?;
    init_tracing(config.debug);

    let store = EntityStore::with_fixtures()?;
    let state = ApiState::new(
        store,
        config.speed,
        Credentials::new(&config.username, &config.password),
    );
    if state.simulator.speed() != config.speed {
        warn!(requested = config.speed, "speed must be positive; using 1.0");
    }

    let addr = config.listen_addr()?;
    let router = mockbosh_api::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        %addr,
        username = %config.username,
        speed = state.simulator.speed(),
        "mock BOSH Director listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("mock BOSH Director stopped");
    Ok(())
}
