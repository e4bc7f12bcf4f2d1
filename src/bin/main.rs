//! Clinical document signing server.
//!
//! Serves the signing API and the public verification endpoints over HTTP.

use clap::Parser;
use medsign::adapters::http::{routes, AppState};
use medsign::infra::config::{ConfigManager, ServiceConfiguration};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "medsign-server")]
#[command(about = "Clinical document signing and verification service")]
#[command(version)]
struct Cli {
    /// Address to bind to (overrides the config file)
    #[arg(short, long)]
    bind: Option<String>,

    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory for journals and stored blobs (overrides the config file)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let log_level = if cli.verbose || config.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let addr: SocketAddr = match config.bind_address.parse() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Invalid bind address {}: {e}", config.bind_address);
            std::process::exit(1);
        }
    };

    let components = match medsign::bootstrap(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to initialize service: {e}");
            std::process::exit(1);
        }
    };
    log::info!(
        "Signature registry loaded with {} records",
        components.registry.len()
    );

    let state = Arc::new(AppState::new(
        components.workflow,
        components.verification,
        config.public_base_url.clone(),
        config.official_validator_url.clone(),
    ));

    log::info!("Listening on {addr}");
    warp::serve(routes(state)).run(addr).await;
}

fn load_config(cli: &Cli) -> medsign::Result<ServiceConfiguration> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = manager.load_or_create_default()?;

    if let Some(bind) = &cli.bind {
        config.bind_address = bind.clone();
    }
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    Ok(config)
}
