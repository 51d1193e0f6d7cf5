//! McpGate server
//!
//! Loads configuration from the environment, opens the store and vault,
//! starts the gateway engine and serves the MCP endpoint until Ctrl-C.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use mcpgate_core::GatewayConfig;
use mcpgate_gateway::{Gateway, GatewayDependencies, GatewayServer};
use mcpgate_storage::{CredentialVault, Database, SqliteBackendRepository, SqliteRequestLogRepository};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Log file prefix, e.g. `mcpgate.2026-10-18.log`
const LOG_PREFIX: &str = "mcpgate";

/// Console and daily-rotated file logging.
///
/// `RUST_LOG` takes precedence over the built-in defaults. The returned
/// guard flushes the file writer and must live until exit.
fn init_tracing(logs_dir: &Path) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    if let Err(e) = std::fs::create_dir_all(logs_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
    }

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix("log")
        .build(logs_dir)
        .context("Failed to create log file appender")?;
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("info")
            .add_directive("mcpgate=debug".parse()?)
            .add_directive("mcpgate_core=debug".parse()?)
            .add_directive("mcpgate_gateway=debug".parse()?)
            .add_directive("mcpgate_storage=debug".parse()?)
            .add_directive("rmcp=warn".parse()?),
    };

    let console_layer = fmt::layer()
        .with_ansi(true)
        .compact()
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the server runs until killed
        warn!(error = %e, "[Server] Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (for development)
    dotenvy::dotenv().ok();

    let config = GatewayConfig::from_env().context("Invalid configuration")?;
    let _log_guard = init_tracing(&config.log_dir)?;

    info!(version = env!("CARGO_PKG_VERSION"), "[Server] Starting McpGate");
    info!(?config, "[Server] Configuration loaded");

    let vault = Arc::new(
        CredentialVault::from_hex_key(&config.encryption_key_hex)
            .context("Failed to initialize credential vault")?,
    );

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
    }
    let db = Database::open(&config.database_path).context("Failed to open database")?;
    let db = Arc::new(Mutex::new(db));

    let dependencies = GatewayDependencies::new(
        Arc::new(SqliteBackendRepository::new(db.clone())),
        Arc::new(SqliteRequestLogRepository::new(db)),
        vault,
    );
    let addr = config.addr()?;
    let gateway = Arc::new(Gateway::new(dependencies));
    gateway
        .start(config.reload_interval, config.health_check_interval)
        .await;

    let server = GatewayServer::new(addr, config.cors_origins.clone(), gateway.clone());
    let served = server.run(shutdown_signal()).await;
    if let Err(e) = &served {
        error!(error = %e, "[Server] HTTP server stopped with error");
    }

    gateway.shutdown().await;
    info!("[Server] Stopped");
    served
}
