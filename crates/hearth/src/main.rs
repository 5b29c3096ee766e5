//! The `hearth` server binary.

use std::path::PathBuf;

use clap::Parser;
use hearth::prelude::*;
use hearth::init_logging;

/// Real-time session server for small multiplayer worlds.
#[derive(Debug, Parser)]
#[command(name = "hearth", version, about)]
struct Cli {
    /// Configuration file path. Defaults are used if it doesn't exist.
    #[arg(short, long, value_name = "FILE", default_value = "hearth.toml")]
    config: PathBuf,

    /// Bind address (e.g. 0.0.0.0:8080), overriding the config file.
    #[arg(short, long, value_name = "ADDRESS")]
    bind: Option<String>,

    /// Log filter (trace, debug, info, warn, error), overriding the config file.
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), HearthError> {
    let cli = Cli::parse();

    let mut config = HearthConfig::load(&cli.config).await?;
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json_logs {
        config.logging.json_format = true;
    }
    config.validate()?;
    init_logging(&config.logging)?;

    tracing::info!(
        config = %cli.config.display(),
        bind = %config.server.bind_address,
        accounts = config.accounts.len(),
        "starting hearth"
    );

    let tokens: MemoryTokenStore = config
        .accounts
        .iter()
        .map(|a| (a.player_id(), a.token.clone()))
        .collect();
    let players: MemoryPlayerStore = config
        .accounts
        .iter()
        .map(|a| {
            let record = PlayerRecord {
                name: a.name.clone(),
                position: a.position(),
            };
            (a.player_id(), record)
        })
        .collect();

    let server = HearthServerBuilder::from_config(&config)
        .build(TokenAuthenticator::new(tokens), players)
        .await?;

    server.run_until(shutdown_signal()).await
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("received shutdown signal");
}
