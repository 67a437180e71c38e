use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use state_gateway::config;
use state_gateway::lifecycle::Controller;

#[derive(Debug, Parser)]
#[command(name = "state-gateway", about = "etcd-backed Terraform remote state gateway")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "STATE_GATEWAY_CONFIG", default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "state_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match config::load_config(&args.config) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(path = %args.config.display(), error = %err, "cannot load configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        endpoints = ?config.etcd.endpoints,
        address = %config.server.address,
        port = config.server.port,
        remote_termination = config.server.remote_termination,
        "configuration loaded"
    );

    match Controller::new(config).run().await {
        Ok(()) => {
            tracing::info!("shutdown complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "exiting after fatal error");
            ExitCode::FAILURE
        }
    }
}
