//! Strictly Chess - Unified CLI
//!
//! Runs the session server, or talks to a running one.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use std::sync::Arc;
use std::time::Duration;
use strictly_chess::StandardChess;
use strictly_server::{
    MemorySessionStore, ServerConfig, SessionClient, SessionId, SessionManager, SessionStore,
    SessionWatcher, SqliteSessionStore, StoreBackend, SyncEvent, purge_loop, router,
};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    initialize_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            host,
            memory,
            database_url,
            session_ttl_secs,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(port) = port {
                config = config.with_port(port);
            }
            if let Some(host) = host {
                config = config.with_host(host);
            }
            if memory {
                config = config.with_store(StoreBackend::Memory);
            }
            if let Some(url) = database_url {
                config = config.with_database_url(url);
            }
            if let Some(secs) = session_ttl_secs {
                config = config.with_session_ttl_secs(secs);
            }
            run_server(config).await
        }
        Command::New { server_url } => create_session(server_url).await,
        Command::Watch {
            session_id,
            server_url,
            config,
            interval_ms,
        } => {
            let config = load_config(config.as_deref())?;
            let interval = interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.poll_interval());
            watch_session(server_url, session_id, interval).await
        }
    }
}

/// Defaults, then the config file, then the environment.
#[instrument]
fn load_config(path: Option<&std::path::Path>) -> Result<ServerConfig> {
    let config = match path {
        Some(path) => ServerConfig::from_file(path)?,
        None => {
            info!("No config file given, using defaults");
            ServerConfig::default()
        }
    };
    Ok(config.with_env()?)
}

/// Opens the configured store and serves until Ctrl-C.
#[instrument(skip(config))]
async fn run_server(config: ServerConfig) -> Result<()> {
    info!(
        host = %config.host(),
        port = config.port(),
        store = %config.store(),
        ttl_secs = config.session_ttl_secs(),
        "Starting Strictly Chess server"
    );

    match config.store() {
        StoreBackend::Memory => {
            let store = MemorySessionStore::new(config.session_ttl());
            serve(&config, store).await
        }
        StoreBackend::Sqlite => {
            let store = SqliteSessionStore::open(config.database_url(), config.session_ttl())?;
            serve(&config, store).await
        }
    }
}

async fn serve<S>(config: &ServerConfig, store: S) -> Result<()>
where
    S: SessionStore + 'static,
{
    let manager = Arc::new(SessionManager::new(Arc::new(store), StandardChess::new()));
    let purger = tokio::spawn(purge_loop(manager.clone(), config.purge_interval()));

    let app = router(manager);
    let listener = tokio::net::TcpListener::bind((config.host().as_str(), *config.port())).await?;
    info!(addr = %listener.local_addr()?, "Server ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purger.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[instrument]
async fn create_session(server_url: String) -> Result<()> {
    let client = SessionClient::new(server_url);
    let snapshot = client.new_session().await?;
    println!("{}", snapshot.session_id);
    Ok(())
}

#[instrument]
async fn watch_session(server_url: String, session_id: String, interval: Duration) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut watcher = SessionWatcher::new(
        SessionClient::new(server_url),
        SessionId::from(session_id),
        event_tx,
    )
    .with_poll_interval(interval);

    let task = tokio::spawn(async move { watcher.run().await });

    while let Some(event) = event_rx.recv().await {
        match event {
            SyncEvent::Changed(snapshot) => {
                let last = snapshot
                    .last_move
                    .as_ref()
                    .map(|m| m.san.as_str())
                    .unwrap_or("-");
                println!(
                    "v{} {} to move ({}) last: {}  {}",
                    snapshot.version,
                    snapshot.turn.name(),
                    snapshot.status,
                    last,
                    snapshot.position
                );
            }
            SyncEvent::Ended(snapshot) => {
                println!("{}", snapshot.outcome_message().unwrap_or_default());
            }
            SyncEvent::Expired => {
                println!("Session expired");
            }
        }
    }

    task.await??;
    Ok(())
}

fn initialize_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,strictly_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
