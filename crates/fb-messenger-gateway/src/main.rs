//! fb-messenger-gateway: Facebook Messenger webhook server
//!
//! Usage:
//!   fb-messenger-gateway            - Start the webhook server
//!   fb-messenger-gateway --help     - Show help
//!   fb-messenger-gateway --version  - Show version

mod handler;

use std::sync::Arc;

use fb_messenger::server::start_webhook_server;
use fb_messenger::{Messenger, MessengerConfig, WebhookState};
use tracing_subscriber::EnvFilter;

use crate::handler::LoggingHandler;

/// Default webhook port
const DEFAULT_PORT: u16 = 3000;

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// Serve the webhook
    Server,
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match parse_args(std::env::args().skip(1)) {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("fb-messenger-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = MessengerConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;
    let port = webhook_port(std::env::var("WEBHOOK_PORT").ok().as_deref())?;

    tracing::info!("Starting fb-messenger-gateway...");
    tracing::info!("Graph API: {}", config.graph_url);
    if config.verify_token.is_none() {
        tracing::warn!("FB_VERIFY_TOKEN not set; webhook verification will be rejected");
    }

    let messenger = Messenger::from_config(config)
        .map_err(|e| anyhow::anyhow!("Failed to create Messenger client: {}", e))?;

    let state = WebhookState {
        messenger: Arc::new(messenger),
        handler: Arc::new(LoggingHandler),
    };

    start_webhook_server(state, port).await?;

    Ok(())
}

/// Parse command line arguments
fn parse_args<I>(args: I) -> RunMode
where
    I: IntoIterator<Item = String>,
{
    for arg in args {
        match arg.as_str() {
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Server
}

/// Resolve the listen port from `WEBHOOK_PORT`
fn webhook_port(value: Option<&str>) -> anyhow::Result<u16> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v
            .parse()
            .map_err(|_| anyhow::anyhow!("WEBHOOK_PORT is not a valid port: {}", v)),
        None => Ok(DEFAULT_PORT),
    }
}

/// Print help message
fn print_help() {
    println!("fb-messenger-gateway - Facebook Messenger webhook server");
    println!();
    println!("Usage:");
    println!("  fb-messenger-gateway            Start the webhook server");
    println!("  fb-messenger-gateway --help     Show this help message");
    println!("  fb-messenger-gateway --version  Show version");
    println!();
    println!("Environment Variables:");
    println!("  FB_PAGE_ACCESS_TOKEN     Page access token (required)");
    println!("  FB_VERIFY_TOKEN          Webhook verify token");
    println!("  FB_GRAPH_URL             Graph API base URL (default: https://graph.facebook.com/v2.11)");
    println!("  FB_TIMEOUT_SECS          Request timeout in seconds (default: 30)");
    println!("  FB_BODY_ENCODING         json or form (default: json)");
    println!("  FB_ACCEPT_INVALID_CERTS  Disable TLS verification (default: false)");
    println!("  WEBHOOK_PORT             Webhook port (default: 3000)");
}
