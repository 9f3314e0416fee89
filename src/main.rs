//! # revo
//!
//! Terminal client for the Revo agent platform. Streams the real-time
//! endpoint, issues REST calls and manages the stored API token.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use revo_bindings::ConnectionStatus;
use revo_core::{Envelope, WILDCARD};
use revo_http::{ApiClient, ApiConfig, DashboardApi, FileTokenStore, MemoryTokenStore, TokenStore};
use revo_realtime::{ConnectionEvent, ConnectionManager, ConnectionState, RealtimeConfig};
use revo_settings::RevoSettings;
use tracing::{info, warn};

/// Revo platform client.
#[derive(Parser, Debug)]
#[command(name = "revo", version, about = "Revo platform client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream real-time messages until interrupted.
    Watch {
        /// Channel to subscribe to (repeatable). Defaults to configured channels.
        #[arg(long = "channel", short)]
        channels: Vec<String>,
        /// Real-time endpoint, overriding settings.
        #[arg(long)]
        url: Option<String>,
    },
    /// GET an API endpoint and print the JSON response.
    Get {
        /// Endpoint path relative to the API base URL.
        endpoint: String,
    },
    /// List agents.
    Agents,
    /// Check backend health.
    Health,
    /// Store an API token.
    Login {
        /// Bearer token.
        token: String,
    },
    /// Remove the stored API token.
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match revo_settings::load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("warning: using default settings: {e}");
            RevoSettings::default()
        }
    };
    revo_telemetry::init_telemetry(&settings.logging).context("failed to initialize logging")?;

    match cli.command {
        Command::Watch { channels, url } => watch(&settings, channels, url).await,
        Command::Get { endpoint } => {
            let client = api_client(&settings);
            let body: serde_json::Value = client
                .get(&endpoint)
                .await
                .with_context(|| format!("GET {endpoint} failed"))?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Command::Agents => {
            let api = DashboardApi::new(api_client(&settings));
            let agents = api.agents().await.context("failed to list agents")?;
            if agents.is_empty() {
                println!("no agents");
            }
            for agent in agents {
                println!("{:<24} {:<10} {}", agent.id.as_str(), agent.status.label(), agent.name);
            }
            Ok(())
        }
        Command::Health => {
            let api = DashboardApi::new(api_client(&settings));
            let health = api.health().await.context("health check failed")?;
            let version = health.version.as_deref().unwrap_or("unknown");
            println!("{} (version {version})", health.status);
            if !health.is_healthy() {
                bail!("backend reports {}", health.status);
            }
            Ok(())
        }
        Command::Login { token } => {
            let store = file_token_store(&settings);
            store.set_token(token.trim()).context("failed to store token")?;
            println!("token saved to {}", store.path().display());
            Ok(())
        }
        Command::Logout => {
            let store = file_token_store(&settings);
            store.clear().context("failed to clear token")?;
            println!("token removed");
            Ok(())
        }
    }
}

fn file_token_store(settings: &RevoSettings) -> FileTokenStore {
    settings
        .api
        .token_file
        .as_ref()
        .map_or_else(FileTokenStore::default_location, |path| {
            FileTokenStore::new(PathBuf::from(path))
        })
}

/// Configured token wins over the token file.
fn token_store(settings: &RevoSettings) -> Arc<dyn TokenStore> {
    match &settings.api.token {
        Some(token) => Arc::new(MemoryTokenStore::new(Some(token.clone()))),
        None => Arc::new(file_token_store(settings)),
    }
}

fn api_client(settings: &RevoSettings) -> ApiClient {
    ApiClient::new(ApiConfig::from(&settings.api)).with_token_store(token_store(settings))
}

async fn watch(settings: &RevoSettings, channels: Vec<String>, url: Option<String>) -> Result<()> {
    let mut config = RealtimeConfig::from(&settings.realtime);
    if let Some(url) = url {
        config.url = url;
    }
    if !channels.is_empty() {
        config = config.with_channels(channels);
    }
    if let Some(token) = token_store(settings).token() {
        config = config.with_auth_token(token);
    }
    info!(url = %config.url, channels = ?config.channels, "watching real-time endpoint");

    let manager = ConnectionManager::websocket(config);
    let status = ConnectionStatus::new(&manager);
    let mut status_rx = status.subscribe();

    let _messages = manager.subscribe(WILDCARD, |envelope: &Envelope| match envelope.encode() {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(error = %e, "failed to encode message for output"),
    });
    let _errors = manager.on_event(|event| {
        if let ConnectionEvent::Error { message } = event {
            eprintln!("connection error: {message}");
        }
    });

    manager.connect();
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for ctrl-c")?;
                info!("interrupted, closing connection");
                manager.disconnect();
                return Ok(());
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let snapshot = *status_rx.borrow_and_update();
                eprintln!("[{snapshot}]");
                match snapshot.state {
                    ConnectionState::Failed => bail!("{snapshot}"),
                    ConnectionState::Disconnected => return Ok(()),
                    _ => {}
                }
            }
        }
    }
}
