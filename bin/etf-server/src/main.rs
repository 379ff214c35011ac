//! etf-server – entry point.
//!
//! Startup order:
//! 1. Parse the command line and configuration from environment variables.
//! 2. Initialise structured tracing (JSON or pretty, optional daily log file).
//! 3. Open the SQLite database, run pending migrations and seed the ETF catalogue.
//! 4. Start the investment-day scheduler in a background task.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

use etf_server::config::{Config, DEV_JWT_SECRET};
use etf_server::entities::{database_file, EtfStore, SqliteStore};
use etf_server::routes;
use etf_server::services::scheduler::Scheduler;
use etf_server::state::AppState;

#[derive(Parser)]
#[command(name = "etf-server", version, about = "ETF investment backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Run the HTTP server and scheduler (default)")]
    Serve,

    #[command(about = "Create the database schema and seed the ETF catalogue")]
    InitDb {
        #[arg(long, help = "Delete the existing database file first")]
        reset: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Command line & configuration ────────────────────────────────────────
    let cli = Cli::parse();
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let _log_guard = init_tracing(&cfg);
    info!(version = env!("CARGO_PKG_VERSION"), "etf-server starting");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cfg).await,
        Command::InitDb { reset } => init_db(&cfg, reset).await,
    }
}

/// Install the global subscriber. The returned guard flushes the log file on drop.
fn init_tracing(cfg: &Config) -> Option<WorkerGuard> {
    // Warn loudly if the configured value is not a valid filter expression.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: ETF_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let (writer, guard) = match &cfg.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "etf-server.log");
            let (file, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(std::io::stdout.and(file)), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(cfg.log_dir.is_none())
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
    guard
}

async fn init_db(cfg: &Config, reset: bool) -> anyhow::Result<()> {
    if reset {
        match database_file(&cfg.database_url) {
            Some(path) if path.exists() => {
                tokio::fs::remove_file(&path).await?;
                info!(path = %path.display(), "removed existing database");
            }
            Some(_) => {}
            None => warn!(database_url = %cfg.database_url, "nothing to reset for this database"),
        }
    }

    let store = SqliteStore::connect(&cfg.database_url).await?;
    let inserted = store.seed_etfs().await?;
    info!(database_url = %cfg.database_url, inserted, "database initialised");
    store.close().await;
    Ok(())
}

async fn serve(cfg: Config) -> anyhow::Result<()> {
    if cfg.jwt_secret == DEV_JWT_SECRET {
        warn!("JWT_SECRET_KEY is not set; using the development secret");
    }

    // ── 3. Database ────────────────────────────────────────────────────────────
    let store = SqliteStore::connect(&cfg.database_url).await?;
    let inserted = store.seed_etfs().await?;
    info!(database_url = %cfg.database_url, seeded = inserted, "database ready");

    let addr: SocketAddr = cfg.bind_address.parse()?;
    let state = Arc::new(AppState::with_http_advisor(cfg, store)?);

    // ── 4. Scheduler ───────────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = if state.config.scheduler_enabled {
        Some(Scheduler::new(Arc::clone(&state)).spawn(shutdown_rx))
    } else {
        info!("scheduler disabled");
        None
    };

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            warn!(error = %e, "scheduler task ended abnormally");
        }
    }
    state.store.close().await;

    info!("etf-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
