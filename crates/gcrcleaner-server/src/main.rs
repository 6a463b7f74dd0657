//! Server binary: binds the HTTP surface and wires the engine to a real
//! registry transport.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use gcrcleaner_core::cache::{DedupCache, TimerCache};
use gcrcleaner_core::observability::{LogFormat, directive_for, init_logging};
use gcrcleaner_engine::Cleaner;
use gcrcleaner_registry::{
    ChainKeychain, DockerConfig, HttpRegistryClient, Keychain, MetadataServer, RegistryClient,
    StaticToken,
};
use gcrcleaner_server::{AppState, service_router};

/// Default in-flight deletions per repository in server mode.
const DEFAULT_CONCURRENCY: usize = 20;

/// How long processed message ids are remembered.
const DEDUP_LIFETIME: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let level = std::env::var("GCRCLEANER_LOG").unwrap_or_default();
    init_logging(LogFormat::Json, directive_for(&level));

    let port: u16 = match std::env::var("PORT") {
        Ok(value) => value.parse().context("PORT must be a port number")?,
        Err(_) => 8080,
    };

    let concurrency: usize = match std::env::var("GCRCLEANER_CONCURRENCY") {
        Ok(value) => value
            .parse()
            .context("GCRCLEANER_CONCURRENCY must be an integer")?,
        Err(_) => DEFAULT_CONCURRENCY,
    };

    let mut keychain = ChainKeychain::new();
    if let Ok(token) = std::env::var("GCRCLEANER_TOKEN") {
        if !token.is_empty() {
            tracing::debug!("using token from GCRCLEANER_TOKEN for authentication");
            keychain = keychain.with(StaticToken::new(token));
        }
    }
    keychain = keychain
        .with(MetadataServer::new().context("failed to set up metadata keychain")?)
        .with(DockerConfig::new());
    let keychain: Arc<dyn Keychain> = Arc::new(keychain);

    let registry: Arc<dyn RegistryClient> = Arc::new(
        HttpRegistryClient::new(keychain).context("failed to set up registry client")?,
    );
    let cleaner = Arc::new(Cleaner::new(registry, concurrency));
    let cache: Arc<dyn DedupCache> = Arc::new(TimerCache::new(DEDUP_LIFETIME));

    let app = service_router(AppState::new(cleaner, Arc::clone(&cache)));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(port, "server is listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited")?;

    cache.stop();
    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("server received stop, shutting down");
}
