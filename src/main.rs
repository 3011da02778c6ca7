//! Wiring & DI. Entry point: resolve credentials, authenticate, serve tools over stdio.
//! No business logic here; login is delegated to AuthService, tools to ToolDispatcher.

use dotenv::dotenv;
use insta_dm_mcp::adapters::instagram::InstagramClient;
use insta_dm_mcp::adapters::mcp::McpServer;
use insta_dm_mcp::adapters::persistence::SessionJson;
use insta_dm_mcp::ports::{AuthPort, InstagramGateway, SessionStorePort, ToolHandler};
use insta_dm_mcp::shared::cli::CliArgs;
use insta_dm_mcp::shared::config::{AppConfig, credentials_from_env};
use insta_dm_mcp::usecases::{AuthService, MessagingService, PhotoUploadTracker, ToolDispatcher};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    let cli = CliArgs::parse_known(std::env::args());
    let (cfg, cfg_error) = match AppConfig::load() {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    // stdout is the protocol channel: logs go to stderr (and optionally a file).
    let (file_layer, _log_guard) = match cfg.log_dir.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "insta-dm-mcp.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }
    if let Some(e) = cfg_error {
        warn!(error = %e, "invalid INSTA_MCP_* configuration, using defaults");
    }

    // --- Credentials: fatal when incomplete ---
    let credentials = match credentials_from_env(cli.username.clone(), cli.password.clone()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Instagram credentials are required. Provide via CLI args or environment variables.");
            std::process::exit(1);
        }
    };

    let photo_mode = cfg.photo_mode().map_err(|e| anyhow::anyhow!("{}", e))?;
    let session_dir = cfg.session_dir_or_default(cli.session_dir.as_deref());
    info!(
        username = %credentials.username,
        session_dir = %session_dir.display(),
        ?photo_mode,
        "starting"
    );

    // --- Authenticated client (one per process, injected everywhere) ---
    let client = Arc::new(
        InstagramClient::new(&credentials.username, cfg.client_options())
            .map_err(|e| anyhow::anyhow!("{}", e))?,
    );
    let store: Arc<dyn SessionStorePort> = Arc::new(SessionJson::new(&session_dir));
    let auth: Arc<dyn AuthPort> = Arc::clone(&client) as Arc<dyn AuthPort>;
    let user_id = AuthService::new(auth, store)
        .login(&credentials)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    info!(user_id = %user_id, "authenticated");

    // --- Tools ---
    let gateway: Arc<dyn InstagramGateway> = Arc::clone(&client) as Arc<dyn InstagramGateway>;
    let uploads = PhotoUploadTracker::new(cfg.upload_retention_or_default());
    let messaging = Arc::new(MessagingService::new(gateway, photo_mode, uploads.clone()));
    let tools: Arc<dyn ToolHandler> = Arc::new(ToolDispatcher::new(messaging));

    // --- Serve until the host closes stdin ---
    info!("Starting MCP server on stdio");
    McpServer::new(tools)
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let pending = uploads.pending_count();
    if pending > 0 {
        warn!(pending, "exiting with background photo uploads still pending");
    }
    Ok(())
}
