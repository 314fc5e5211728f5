use std::path::PathBuf;

use clap::Parser;

use replay_proxy::config::{read_config, validate_config, ConfigError, ProxyConfig};
use replay_proxy::lifecycle::startup;
use replay_proxy::observability::init_logging;

/// Reverse proxy that transparently retries requests failing with 5xx.
#[derive(Debug, Parser)]
#[command(name = "replay-proxy", version)]
struct Cli {
    /// TOML configuration file, watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fixed backend URL, replacing any configured balancer.
    #[arg(short, long)]
    backend: Option<String>,

    /// Listen address (e.g., "127.0.0.1:8080").
    #[arg(long)]
    bind: Option<String>,

    /// Attempts per request, including the first.
    #[arg(short, long)]
    retries: Option<u32>,
}

impl Cli {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(backend) = &self.backend {
            config.upstream.backend = Some(backend.clone());
            config.upstream.balancer = None;
        }
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(retries) = self.retries {
            config.upstream.retries = retries;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    init_logging(&config.observability)?;
    tracing::info!("replay-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    startup::run(config, cli.config).await?;
    Ok(())
}
