use async_trait::async_trait;
use clap::{Parser, Subcommand};

use tether_client::{run_session, Connection, MessageSink, SessionOutcome};
use tether_core::config::Config;
use tether_core::protocol::Credential;
use tether_core::types::Payload;

#[derive(Parser)]
#[command(
    name = "tether",
    about = "Connect a client session to an orchestrator over WebSocket",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, authenticate, and print inbound payloads until the peer closes
    Connect {
        /// WebSocket endpoint, e.g. ws://localhost:8000/ws/agent
        #[arg(long, env = "TETHER_ENDPOINT")]
        endpoint: Option<String>,

        /// Client name presented in the auth request
        #[arg(long, env = "TETHER_CLIENT_NAME")]
        name: Option<String>,

        /// Auth token presented in the auth request
        #[arg(long, env = "TETHER_TOKEN")]
        token: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
}

/// Prints each inbound payload to stdout.
struct ConsoleSink;

#[async_trait]
impl MessageSink for ConsoleSink {
    async fn deliver(&self, payload: Payload) -> anyhow::Result<()> {
        match payload {
            Payload::Text(text) => println!("{text}"),
            Payload::Binary(bytes) => println!("<binary frame, {} bytes>", bytes.len()),
        }
        Ok(())
    }
}

/// Credential from flags, falling back to config.
fn resolve_credential(
    config: &Config,
    name: Option<String>,
    token: Option<String>,
) -> anyhow::Result<Credential> {
    let from_config = config.credential();
    let name = name
        .or_else(|| from_config.as_ref().map(|c| c.name.clone()))
        .ok_or_else(|| anyhow::anyhow!("no client name: pass --name or set credentials.name"))?;
    let token = token
        .or_else(|| from_config.as_ref().map(|c| c.token.clone()))
        .or_else(|| config.credentials.as_ref().and_then(|c| c.resolve_token()))
        .ok_or_else(|| anyhow::anyhow!("no auth token: pass --token or set credentials.token"))?;
    Ok(Credential { name, token })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => Config::load(std::path::Path::new(path))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Connect {
            endpoint,
            name,
            token,
        } => {
            let endpoint = endpoint
                .or_else(|| config.endpoint.clone())
                .ok_or_else(|| {
                    anyhow::anyhow!("no endpoint: pass --endpoint or set endpoint in config")
                })?;
            let credential = resolve_credential(&config, name, token)?;

            tracing::info!(endpoint = %endpoint, name = %credential.name, "Connecting");

            let mut conn = Connection::new(endpoint);
            let events = conn.connect()?;
            match run_session(&conn, events, &credential, &ConsoleSink).await {
                SessionOutcome::Closed(reason) => {
                    tracing::info!(reason = ?reason, "Session closed");
                }
                SessionOutcome::Failed(error) => {
                    return Err(error.into());
                }
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::config::CredentialsConfig;

    #[test]
    fn test_flags_override_config_credential() {
        let config = Config {
            credentials: Some(CredentialsConfig {
                name: Some("from-config".into()),
                token: Some("config-token".into()),
                token_env: None,
            }),
            ..Default::default()
        };
        let credential =
            resolve_credential(&config, Some("from-flag".into()), None).unwrap();
        assert_eq!(credential.name, "from-flag");
        assert_eq!(credential.token, "config-token");
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let credential = resolve_credential(&Config::default(), Some("agent".into()), None);
        assert!(credential.is_err());
    }
}
