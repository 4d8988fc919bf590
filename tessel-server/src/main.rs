use clap::{Parser, Subcommand};
use client::{ClientError, ConfigClient};
use config::Config;
use server::{UpdateConfigBody, run_server};
use tessel_core::{DEFAULT_NAMESPACE, unix_now};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod client;
mod config;
mod server;

#[derive(Parser)]
#[command(name = "tessel")]
#[command(about = "Namespaced config store with coherent local caching")]
struct Cli {
    /// Address of a running tessel server
    #[arg(long, global = true, env = "TESSEL_ADDR", default_value = "http://127.0.0.1:8080")]
    addr: String,

    /// Namespace for set/get/del/list
    #[arg(short, long, global = true, env = "TESSEL_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Server {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: String,
    },
    #[command(flatten)]
    Client(ClientCommand),
}

/// Commands sent to a running server.
#[derive(Subcommand)]
enum ClientCommand {
    /// Store a JSON value under a key
    Set { key: String, value: String },
    /// Print the value stored under a key
    Get { key: String },
    /// Delete a key
    Del { key: String },
    /// List keys in the namespace
    List,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tessel=info,tessel_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Client(command) => command,
        Commands::Server { config } => {
            tracing::info!("Starting Tessel server with config: {}", config);

            let cfg = match Config::from_file(&config) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Failed to load config: {}", e);
                    std::process::exit(1);
                }
            };

            if let Err(e) = run_server(cfg).await {
                tracing::error!("Server error: {:#}", e);
                std::process::exit(1);
            }
            return;
        }
    };

    let client = match ConfigClient::new(&cli.addr) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(message) = run_command(&client, &cli.namespace, command).await {
        eprintln!("{}", message);
        std::process::exit(1);
    }
}

async fn run_command(client: &ConfigClient, namespace: &str, command: ClientCommand) -> Result<(), String> {
    match command {
        ClientCommand::Set { key, value } => {
            let key = non_blank(&key)?;
            let body = UpdateConfigBody {
                data: client::encode_data(value.as_bytes()),
                format: Some("json".to_string()),
                source: Some("cli".to_string()),
                timestamp: Some(unix_now()),
            };
            client
                .set(namespace, key, &body)
                .await
                .map_err(|e| format!("failed to set config: {}", e))?;
            println!("set {}/{}", namespace, key);
        }
        ClientCommand::Get { key } => {
            let key = non_blank(&key)?;
            match client.get(namespace, key).await {
                Ok(record) if !record.value.is_null_like() => {
                    println!("{}", String::from_utf8_lossy(record.value.data()));
                }
                Ok(_) | Err(ClientError::NotFound) => {
                    return Err("not found".to_string());
                }
                Err(e) => return Err(format!("failed to get config: {}", e)),
            }
        }
        ClientCommand::Del { key } => {
            let key = non_blank(&key)?;
            client
                .delete(namespace, key)
                .await
                .map_err(|e| format!("failed to delete config: {}", e))?;
            println!("deleted {}/{}", namespace, key);
        }
        ClientCommand::List => {
            let paths = client
                .list(namespace)
                .await
                .map_err(|e| format!("failed to list config: {}", e))?;
            for path in paths {
                println!("{}", path);
            }
        }
    }

    Ok(())
}

/// Paths are opaque: only an all-whitespace key is rejected, nothing is trimmed.
fn non_blank(key: &str) -> Result<&str, String> {
    if key.trim().is_empty() {
        return Err("key cannot be blank".to_string());
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_blank_keeps_key_verbatim() {
        assert_eq!(non_blank(" a"), Ok(" a"));
        assert_eq!(non_blank("a/b "), Ok("a/b "));
        assert!(non_blank("   ").is_err());
        assert!(non_blank("").is_err());
    }

    #[test]
    fn test_client_commands_parse_at_top_level() {
        let cli = Cli::try_parse_from(["tessel", "--namespace", "tenant-a", "get", "feature.x"]).unwrap();
        assert_eq!(cli.namespace, "tenant-a");
        assert!(matches!(
            cli.command,
            Commands::Client(ClientCommand::Get { ref key }) if key == "feature.x"
        ));

        let cli = Cli::try_parse_from(["tessel", "server", "--config", "dev.yaml"]).unwrap();
        assert!(matches!(cli.command, Commands::Server { ref config } if config == "dev.yaml"));
    }
}
