//! Courtside Back binary entrypoint wiring REST, WebSocket, SSE, and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "couch-store")]
use courtside_back::dao::game_store::couchdb::{CouchConfig, CouchGameStore};
use courtside_back::{
    config::AppConfig,
    dao::{
        game_store::{GameStore, file::FileGameStore, memory::MemoryGameStore},
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    spawn_storage_supervisor(app_state.clone());
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    app_state.shutdown().await;
    Ok(())
}

/// Pick the storage backend from `STORE_BACKEND` and hand it to the supervisor, which
/// keeps the application in degraded mode until the backend is reachable.
fn spawn_storage_supervisor(state: SharedState) {
    let backend = env::var("STORE_BACKEND").unwrap_or_else(|_| "file".into());
    match backend.as_str() {
        "memory" => {
            let store = MemoryGameStore::new();
            tokio::spawn(storage_supervisor::run(state, "memory", move || {
                let store: Arc<dyn GameStore> = Arc::new(store.clone());
                async move { Ok(store) }
            }));
        }
        #[cfg(feature = "couch-store")]
        "couch" => {
            tokio::spawn(storage_supervisor::run(state, "couch", || async {
                let config = CouchConfig::from_env()?;
                let store = CouchGameStore::connect(config).await?;
                Ok::<Arc<dyn GameStore>, StorageError>(Arc::new(store))
            }));
        }
        other => {
            if other != "file" {
                warn!(backend = other, "unknown STORE_BACKEND; using the file store");
            }
            let dir = state.config().store_dir().clone();
            tokio::spawn(storage_supervisor::run(state, "file", move || {
                let dir = dir.clone();
                async move {
                    let store = FileGameStore::open(dir).await?;
                    Ok::<Arc<dyn GameStore>, StorageError>(Arc::new(store))
                }
            }));
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "cannot install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
}
