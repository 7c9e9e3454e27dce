//! ccnet - computer terminal messaging over QUIC
//!
//! Runs either the server main context or a client connected to one.

mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::{AppConfig, DEFAULT_CONFIG_PATH};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Computer terminal messaging server and client", long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Host computers and accept client connections
    Serve {
        /// Address to bind, overriding `server.bind`
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Connect to a running server
    Connect {
        /// Server address, overriding `client.server`
        #[arg(long)]
        server: Option<SocketAddr>,
    },
}

/// RUST_LOG wins over the configured filter, which wins over `info`.
fn log_filter(configured: Option<&str>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    configured
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging depends on the config, so problems with it are reported once
    // the subscriber is up.
    let loaded = AppConfig::read(&cli.config);
    let configured_filter = match &loaded {
        Ok(Some(config)) => config.log.filter.clone(),
        _ => None,
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(configured_filter.as_deref()))
        .init();

    info!("Starting ccnet v{}", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(Some(config)) => config,
        Ok(None) => {
            warn!("{} not found. Using defaults", cli.config.display());
            AppConfig::default()
        }
        Err(err) => {
            warn!("{err:#}. Using defaults");
            AppConfig::default()
        }
    };

    match cli.command {
        Command::Serve { bind } => {
            let mut settings = config.server;
            if let Some(bind) = bind {
                settings.bind = bind;
            }
            ccnet_server::run_server(settings, config.link).await
        }
        Command::Connect { server } => {
            let mut settings = config.client;
            if let Some(server) = server {
                settings.server = server;
            }
            ccnet_client::run_client(settings, config.link).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_accepts_bind_override() {
        let cli = Cli::try_parse_from(["ccnet", "serve", "--bind", "0.0.0.0:7000"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        match cli.command {
            Command::Serve { bind } => assert_eq!(bind.unwrap().port(), 7000),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["ccnet", "connect", "--config", "alt.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
        assert!(matches!(cli.command, Command::Connect { server: None }));
    }
}
