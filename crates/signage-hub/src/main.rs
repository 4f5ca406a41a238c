//! Signage synchronization hub.
//!
//! Run:
//!   signage-hub --config hub.toml
//!   signage-hub --bind 0.0.0.0:8080 --library library.json
//!
//! Displays connect to `ws://host:8080/?locationId=3`; controllers connect
//! without a location and declare it in their messages.

use clap::Parser;
use signage_hub::config::HubConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "signage-hub", version, about = "Location-scoped signage synchronization hub")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "SIGNAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address (overrides the config file).
    #[arg(long, env = "SIGNAGE_BIND")]
    bind: Option<SocketAddr>,

    /// JSON content repository file (overrides the config file).
    #[arg(long, env = "SIGNAGE_LIBRARY")]
    library: Option<PathBuf>,

    /// Per-connection outbound queue capacity (overrides the config file).
    #[arg(long, env = "SIGNAGE_OUTBOUND_QUEUE")]
    outbound_queue: Option<usize>,

    /// Don't send current content to displays as they connect.
    #[arg(long)]
    no_replay_on_connect: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<HubConfig> {
        let mut config = match &self.config {
            Some(path) => HubConfig::load(path)?,
            None => HubConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(library) = self.library {
            config.library = Some(library);
        }
        if let Some(queue) = self.outbound_queue {
            config.outbound_queue = queue;
        }
        if self.no_replay_on_connect {
            config.replay_on_connect = false;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config()?;

    let directive = config.log_filter.as_deref().unwrap_or("signage_hub=info");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    tracing::info!("Starting signage hub on {}", config.bind);
    signage_hub::server::run(config).await
}
